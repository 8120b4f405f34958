use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Operator-defined search criteria. Every bound is optional; `None` means
/// "no constraint".
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SearchProfile {
    pub id: i64,
    pub name: String,
    pub city: Option<String>,
    pub districts: Vec<String>,
    /// Postal codes or prefixes ("10" matches "10115").
    pub postal_codes: Vec<String>,
    pub min_price: Option<u32>,
    pub max_price: Option<u32>,
    pub min_rooms: Option<f64>,
    pub max_rooms: Option<f64>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub balcony: Option<bool>,
    pub built_in_kitchen: Option<bool>,
    pub elevator: Option<bool>,
    pub pets_allowed: Option<bool>,
    pub min_build_year: Option<i32>,
    pub max_build_year: Option<i32>,
    pub exclude_keywords: Vec<String>,
    /// Pre-built search URL that overrides the criteria-derived one.
    pub search_url: Option<String>,
    pub active: bool,
}

impl Default for SearchProfile {
    fn default() -> Self {
        Self {
            id: 0,
            name: String::new(),
            city: None,
            districts: Vec::new(),
            postal_codes: Vec::new(),
            min_price: None,
            max_price: None,
            min_rooms: None,
            max_rooms: None,
            min_area: None,
            max_area: None,
            balcony: None,
            built_in_kitchen: None,
            elevator: None,
            pets_allowed: None,
            min_build_year: None,
            max_build_year: None,
            exclude_keywords: Vec::new(),
            search_url: None,
            active: true,
        }
    }
}

/// One rental listing as seen on the source, before or after persistence.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Listing {
    pub external_id: String,
    pub title: String,
    pub url: String,
    pub address: String,
    pub city: Option<String>,
    pub district: Option<String>,
    pub postal_code: Option<String>,
    /// Cold rent in whole euros.
    pub price: Option<u32>,
    pub rooms: Option<f64>,
    /// Living space in square meters.
    pub area: Option<f64>,
    pub build_year: Option<i32>,
    pub has_balcony: bool,
    pub has_built_in_kitchen: bool,
    pub has_elevator: bool,
    pub pets_allowed: Option<bool>,
    pub available_from: Option<String>,
    pub description: String,
    pub landlord_name: Option<String>,
    pub contact_form_url: Option<String>,
    pub profile_id: Option<i64>,
    pub notified: bool,
    pub contacted: bool,
    pub discovered_at: DateTime<Utc>,
}

impl Listing {
    /// Bare listing carrying only its identifier.
    pub fn new(external_id: impl Into<String>) -> Self {
        Self {
            external_id: external_id.into(),
            title: String::new(),
            url: String::new(),
            address: String::new(),
            city: None,
            district: None,
            postal_code: None,
            price: None,
            rooms: None,
            area: None,
            build_year: None,
            has_balcony: false,
            has_built_in_kitchen: false,
            has_elevator: false,
            pets_allowed: None,
            available_from: None,
            description: String::new(),
            landlord_name: None,
            contact_form_url: None,
            profile_id: None,
            notified: false,
            contacted: false,
            discovered_at: Utc::now(),
        }
    }

    /// Combines a detail record with the search-result record it was
    /// fetched for. Detail values win; anything the detail page did not
    /// yield is taken from `basic`.
    pub fn enriched_with(basic: Listing, detail: Listing) -> Listing {
        fn text(detail: String, basic: String) -> String {
            if detail.trim().is_empty() {
                basic
            } else {
                detail
            }
        }

        Listing {
            external_id: basic.external_id,
            title: text(detail.title, basic.title),
            url: text(detail.url, basic.url),
            address: text(detail.address, basic.address),
            city: detail.city.or(basic.city),
            district: detail.district.or(basic.district),
            postal_code: detail.postal_code.or(basic.postal_code),
            price: detail.price.or(basic.price),
            rooms: detail.rooms.or(basic.rooms),
            area: detail.area.or(basic.area),
            build_year: detail.build_year.or(basic.build_year),
            has_balcony: detail.has_balcony || basic.has_balcony,
            has_built_in_kitchen: detail.has_built_in_kitchen || basic.has_built_in_kitchen,
            has_elevator: detail.has_elevator || basic.has_elevator,
            pets_allowed: detail.pets_allowed.or(basic.pets_allowed),
            available_from: detail.available_from.or(basic.available_from),
            description: text(detail.description, basic.description),
            landlord_name: detail.landlord_name.or(basic.landlord_name),
            contact_form_url: detail.contact_form_url.or(basic.contact_form_url),
            profile_id: basic.profile_id,
            notified: false,
            contacted: false,
            discovered_at: basic.discovered_at,
        }
    }

    /// District if known, otherwise city, otherwise the raw address.
    pub fn locality(&self) -> &str {
        self.district
            .as_deref()
            .or(self.city.as_deref())
            .unwrap_or(&self.address)
    }
}

/// Person on whose behalf contact requests are written and submitted.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ApplicantProfile {
    pub salutation: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
}

impl ApplicantProfile {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim())
            .trim()
            .to_string()
    }
}

/// Outcome of a contact submission.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AttemptStatus {
    Pending,
    Sent,
    Failed,
}

/// Audit record of one attempt to reach a landlord.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactAttempt {
    pub id: u64,
    pub external_id: String,
    pub message: String,
    pub status: AttemptStatus,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Kind of entry in the activity log.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    ListingFound,
    NotificationSent,
    ContactSent,
    ContactFailed,
    PreviewSent,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActivityEntry {
    pub kind: ActivityKind,
    pub external_id: String,
    pub details: Option<String>,
    pub at: DateTime<Utc>,
}

impl ActivityEntry {
    pub fn new(kind: ActivityKind, external_id: impl Into<String>) -> Self {
        Self {
            kind,
            external_id: external_id.into(),
            details: None,
            at: Utc::now(),
        }
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }
}
