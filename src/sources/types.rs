use reqwest::Url;
use serde::Serialize;

use crate::models::SearchProfile;
use crate::sources::error::SourceError;

/// Query parameters for one search request, derived from a profile.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SearchParams {
    /// City to search in; nationwide when unset
    pub location: Option<String>,
    /// Minimum cold rent (EUR)
    pub min_price: Option<u32>,
    /// Maximum cold rent (EUR)
    pub max_price: Option<u32>,
    /// Minimum number of rooms
    pub min_rooms: Option<f64>,
    /// Maximum number of rooms
    pub max_rooms: Option<f64>,
    /// Minimum size in square meters
    pub min_sqm: Option<f64>,
    /// Maximum size in square meters
    pub max_sqm: Option<f64>,
    /// Required equipment codes (balcony, builtinkitchen, lift)
    pub equipment: Vec<&'static str>,
    /// Postal codes passed through as geocodes
    pub postal_codes: Vec<String>,
}

impl SearchParams {
    pub fn from_profile(profile: &SearchProfile) -> Self {
        let mut equipment = Vec::new();
        if profile.balcony == Some(true) {
            equipment.push("balcony");
        }
        if profile.built_in_kitchen == Some(true) {
            equipment.push("builtinkitchen");
        }
        if profile.elevator == Some(true) {
            equipment.push("lift");
        }

        Self {
            location: profile.city.clone().filter(|c| !c.trim().is_empty()),
            min_price: profile.min_price,
            max_price: profile.max_price,
            min_rooms: profile.min_rooms,
            max_rooms: profile.max_rooms,
            min_sqm: profile.min_area,
            max_sqm: profile.max_area,
            equipment,
            postal_codes: profile.postal_codes.clone(),
        }
    }

    /// Rental search URL sorted newest first.
    pub fn to_url(&self, base: &Url) -> Result<Url, SourceError> {
        let path = match &self.location {
            Some(city) => format!("/Suche/de/{}/wohnung-mieten", slug(city)),
            None => "/Suche/de/wohnung-mieten".to_string(),
        };
        let mut url = base.join(&path).map_err(|e| SourceError::InvalidUrl {
            url: format!("{base}{path}"),
            reason: e.to_string(),
        })?;

        {
            let mut query = url.query_pairs_mut();
            query.append_pair("sorting", "2");
            if let Some(price) = range(self.min_price, self.max_price, |v| v.to_string()) {
                query.append_pair("price", &price);
            }
            if let Some(rooms) = range(self.min_rooms, self.max_rooms, |v| format!("{v:.1}")) {
                query.append_pair("numberofrooms", &rooms);
            }
            if let Some(space) = range(self.min_sqm, self.max_sqm, |v| v.to_string()) {
                query.append_pair("livingspace", &space);
            }
            if !self.equipment.is_empty() {
                query.append_pair("equipment", &self.equipment.join(","));
            }
            if !self.postal_codes.is_empty() {
                query.append_pair("geocodes", &self.postal_codes.join(","));
            }
        }

        Ok(url)
    }
}

/// Search URL for `profile`: its own `search_url` (forced to newest-first)
/// or one built from its criteria.
pub fn search_url(base: &Url, profile: &SearchProfile) -> Result<Url, SourceError> {
    match profile.search_url.as_deref().map(str::trim) {
        Some(custom) if !custom.is_empty() => {
            let mut url = Url::parse(custom).map_err(|e| SourceError::InvalidUrl {
                url: custom.to_string(),
                reason: e.to_string(),
            })?;
            if !url.query_pairs().any(|(key, _)| key == "sorting") {
                url.query_pairs_mut().append_pair("sorting", "2");
            }
            Ok(url)
        }
        _ => SearchParams::from_profile(profile).to_url(base),
    }
}

fn range<T: Copy>(min: Option<T>, max: Option<T>, fmt: impl Fn(T) -> String) -> Option<String> {
    match (min, max) {
        (Some(min), Some(max)) => Some(format!("{}-{}", fmt(min), fmt(max))),
        (Some(min), None) => Some(format!("{}-", fmt(min))),
        (None, Some(max)) => Some(format!("-{}", fmt(max))),
        (None, None) => None,
    }
}

fn slug(city: &str) -> String {
    city.trim().to_lowercase().split_whitespace().collect::<Vec<_>>().join("-")
}
