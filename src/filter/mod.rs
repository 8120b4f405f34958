//! Profile matching for listings.
//!
//! [`FilterEngine::evaluate`] runs every matcher against a listing and
//! collects one [`FilterReason`] per violated criterion. Listings that do
//! not state a value for a criterion pass it.

use std::fmt;

use crate::models::{Listing, SearchProfile};

/// Why a listing was rejected for a profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterReason {
    PriceTooLow,
    PriceTooHigh,
    TooFewRooms,
    TooManyRooms,
    AreaTooSmall,
    AreaTooLarge,
    WrongCity,
    WrongDistrict,
    WrongPostalCode,
    NoBalcony,
    NoBuiltInKitchen,
    NoElevator,
    NoPets,
    BuildingTooOld,
    BuildingTooNew,
    ExcludedKeyword(String),
}

impl FilterReason {
    /// Stable snake-case code used in logs.
    pub fn code(&self) -> String {
        let code = match self {
            Self::PriceTooLow => "price_too_low",
            Self::PriceTooHigh => "price_too_high",
            Self::TooFewRooms => "too_few_rooms",
            Self::TooManyRooms => "too_many_rooms",
            Self::AreaTooSmall => "area_too_small",
            Self::AreaTooLarge => "area_too_large",
            Self::WrongCity => "wrong_city",
            Self::WrongDistrict => "wrong_district",
            Self::WrongPostalCode => "wrong_postal_code",
            Self::NoBalcony => "no_balcony",
            Self::NoBuiltInKitchen => "no_built_in_kitchen",
            Self::NoElevator => "no_elevator",
            Self::NoPets => "no_pets",
            Self::BuildingTooOld => "building_too_old",
            Self::BuildingTooNew => "building_too_new",
            Self::ExcludedKeyword(keyword) => return format!("excluded_keyword:{keyword}"),
        };
        code.to_string()
    }
}

impl fmt::Display for FilterReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.code())
    }
}

/// Result of evaluating one listing against one profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterVerdict {
    pub passed: bool,
    pub reasons: Vec<FilterReason>,
}

impl FilterVerdict {
    pub fn reason_codes(&self) -> Vec<String> {
        self.reasons.iter().map(FilterReason::code).collect()
    }
}

impl fmt::Display for FilterVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.passed {
            return f.write_str("passed");
        }
        f.write_str(&self.reason_codes().join(","))
    }
}

type Matcher = fn(&Listing, &SearchProfile, &mut Vec<FilterReason>);

/// Evaluation order; reasons appear in this order.
const MATCHERS: [Matcher; 7] = [
    match_price,
    match_rooms,
    match_area,
    match_location,
    match_amenities,
    match_build_year,
    match_keywords,
];

/// Stateless evaluator of search profiles.
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterEngine;

impl FilterEngine {
    pub fn new() -> Self {
        Self
    }

    pub fn evaluate(&self, listing: &Listing, profile: &SearchProfile) -> FilterVerdict {
        let mut reasons = Vec::new();
        for matcher in MATCHERS {
            matcher(listing, profile, &mut reasons);
        }
        FilterVerdict {
            passed: reasons.is_empty(),
            reasons,
        }
    }
}

fn check_range<T: PartialOrd + Copy>(
    value: Option<T>,
    min: Option<T>,
    max: Option<T>,
    below: FilterReason,
    above: FilterReason,
    reasons: &mut Vec<FilterReason>,
) {
    let Some(value) = value else {
        return;
    };
    if min.is_some_and(|min| value < min) {
        reasons.push(below);
    }
    if max.is_some_and(|max| value > max) {
        reasons.push(above);
    }
}

fn match_price(listing: &Listing, profile: &SearchProfile, reasons: &mut Vec<FilterReason>) {
    check_range(
        listing.price,
        profile.min_price,
        profile.max_price,
        FilterReason::PriceTooLow,
        FilterReason::PriceTooHigh,
        reasons,
    );
}

fn match_rooms(listing: &Listing, profile: &SearchProfile, reasons: &mut Vec<FilterReason>) {
    check_range(
        listing.rooms,
        profile.min_rooms,
        profile.max_rooms,
        FilterReason::TooFewRooms,
        FilterReason::TooManyRooms,
        reasons,
    );
}

fn match_area(listing: &Listing, profile: &SearchProfile, reasons: &mut Vec<FilterReason>) {
    check_range(
        listing.area,
        profile.min_area,
        profile.max_area,
        FilterReason::AreaTooSmall,
        FilterReason::AreaTooLarge,
        reasons,
    );
}

fn match_build_year(listing: &Listing, profile: &SearchProfile, reasons: &mut Vec<FilterReason>) {
    check_range(
        listing.build_year,
        profile.min_build_year,
        profile.max_build_year,
        FilterReason::BuildingTooOld,
        FilterReason::BuildingTooNew,
        reasons,
    );
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

fn match_location(listing: &Listing, profile: &SearchProfile, reasons: &mut Vec<FilterReason>) {
    if let (Some(wanted), Some(actual)) = (
        non_empty(profile.city.as_deref()),
        non_empty(listing.city.as_deref()),
    ) {
        if wanted.to_lowercase() != actual.to_lowercase() {
            reasons.push(FilterReason::WrongCity);
        }
    }

    if let Some(district) = non_empty(listing.district.as_deref()) {
        if !profile.districts.is_empty() && !district_matches(district, &profile.districts) {
            reasons.push(FilterReason::WrongDistrict);
        }
    }

    if let Some(code) = non_empty(listing.postal_code.as_deref()) {
        if !profile.postal_codes.is_empty() && !postal_code_matches(code, &profile.postal_codes) {
            reasons.push(FilterReason::WrongPostalCode);
        }
    }
}

fn district_matches(district: &str, wanted: &[String]) -> bool {
    let district = district.to_lowercase();
    wanted.iter().any(|d| {
        let d = d.to_lowercase();
        district == d || district.contains(&d)
    })
}

/// Exact match or prefix match ("10" accepts "10115").
pub fn postal_code_matches(code: &str, wanted: &[String]) -> bool {
    wanted.iter().any(|p| code == p || code.starts_with(p.as_str()))
}

fn match_amenities(listing: &Listing, profile: &SearchProfile, reasons: &mut Vec<FilterReason>) {
    let required = |flag: Option<bool>| flag == Some(true);

    if required(profile.balcony) && !listing.has_balcony {
        reasons.push(FilterReason::NoBalcony);
    }
    if required(profile.built_in_kitchen) && !listing.has_built_in_kitchen {
        reasons.push(FilterReason::NoBuiltInKitchen);
    }
    if required(profile.elevator) && !listing.has_elevator {
        reasons.push(FilterReason::NoElevator);
    }
    // Unknown pet policy passes.
    if required(profile.pets_allowed) && listing.pets_allowed == Some(false) {
        reasons.push(FilterReason::NoPets);
    }
}

fn match_keywords(listing: &Listing, profile: &SearchProfile, reasons: &mut Vec<FilterReason>) {
    if profile.exclude_keywords.is_empty() {
        return;
    }
    let text = format!("{} {}", listing.title, listing.description).to_lowercase();
    let hit = profile
        .exclude_keywords
        .iter()
        .filter(|keyword| !keyword.trim().is_empty())
        .find(|keyword| text.contains(&keyword.to_lowercase()));
    if let Some(keyword) = hit {
        reasons.push(FilterReason::ExcludedKeyword(keyword.clone()));
    }
}
