//! HTML extraction for IS24 result lists and exposé pages.

use std::collections::HashSet;

use reqwest::Url;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;

use crate::models::Listing;
use crate::sources::error::SourceError;

const RESULT_CARDS: &str = "article[data-obid], li.result-list__listing[data-id]";
const EXPOSE_LINKS: &str = r#"a[href*="/expose/"]"#;
const JSON_LD: &str = r#"script[type="application/ld+json"]"#;

fn selector(css: &str) -> Result<Selector, SourceError> {
    Selector::parse(css).map_err(|e| SourceError::Parse(format!("selector {css:?}: {e}")))
}

fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

fn first_text(root: ElementRef<'_>, css: &str) -> Result<Option<String>, SourceError> {
    let sel = selector(css)?;
    Ok(root
        .select(&sel)
        .map(text_of)
        .find(|text| !text.is_empty()))
}

/// Parses German-formatted numbers such as `1.234,56 €` or `2,5 Zi.`.
pub fn parse_german_number(raw: &str) -> Option<f64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == ',' || *c == '.')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    let normalized = if cleaned.contains(',') {
        cleaned.replace('.', "").replacen(',', ".", 1)
    } else if cleaned.matches('.').count() == 1
        && cleaned.split('.').nth(1).is_some_and(|frac| frac.len() != 3)
    {
        cleaned
    } else {
        cleaned.replace('.', "")
    };
    normalized.trim_matches('.').parse().ok()
}

fn parse_price(raw: &str) -> Option<u32> {
    parse_german_number(raw).map(|v| v.round() as u32)
}

/// Splits `Street 1, District, 10115 City` style addresses into
/// `(postal_code, district, city)`.
pub fn split_address(address: &str) -> (Option<String>, Option<String>, Option<String>) {
    let parts: Vec<&str> = address
        .split(',')
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .collect();

    let postal_code = parts.iter().find_map(|part| {
        part.split_whitespace()
            .find(|token| token.len() == 5 && token.chars().all(|c| c.is_ascii_digit()))
            .map(str::to_string)
    });
    let strip_postal = |part: &str| -> String {
        part.split_whitespace()
            .filter(|token| Some(*token) != postal_code.as_deref())
            .collect::<Vec<_>>()
            .join(" ")
    };

    let city = parts
        .last()
        .map(|p| strip_postal(p))
        .filter(|c| !c.is_empty());
    let district = if parts.len() >= 3 {
        Some(strip_postal(parts[parts.len() - 2])).filter(|d| !d.is_empty())
    } else {
        None
    };

    (postal_code, district, city)
}

fn expose_url(base: &Url, external_id: &str) -> String {
    base.join(&format!("/expose/{external_id}"))
        .map(|u| u.to_string())
        .unwrap_or_else(|_| format!("{base}expose/{external_id}"))
}

fn expose_id(href: &str) -> Option<&str> {
    let rest = href.split("/expose/").nth(1)?;
    let id = rest
        .split(|c: char| !c.is_ascii_digit())
        .next()
        .filter(|id| !id.is_empty())?;
    Some(id)
}

/// Listings on a search result page, in page order.
///
/// Falls back to bare listings built from exposé links when no result
/// cards are present.
pub fn parse_search_results(html: &str, base: &Url) -> Result<Vec<Listing>, SourceError> {
    let document = Html::parse_document(html);
    let cards = selector(RESULT_CARDS)?;
    let criteria = selector("dl dd")?;
    let features = selector(".result-list-entry__secondary-criteria li, .criteria-tag")?;

    let mut seen = HashSet::new();
    let mut listings = Vec::new();

    for card in document.select(&cards) {
        let value = card.value();
        let Some(id) = value.attr("data-obid").or_else(|| value.attr("data-id")) else {
            continue;
        };
        if !seen.insert(id.to_string()) {
            continue;
        }

        let mut listing = Listing::new(id);
        listing.url = expose_url(base, id);
        listing.title = first_text(card, "h2, h5")?.unwrap_or_default();
        if let Some(address) =
            first_text(card, ".result-list-entry__address, .result-list-entry__map-link")?
        {
            let (postal_code, district, city) = split_address(&address);
            listing.postal_code = postal_code;
            listing.district = district;
            listing.city = city;
            listing.address = address;
        }

        for dd in card.select(&criteria).map(text_of) {
            if dd.contains('€') {
                listing.price = listing.price.or_else(|| parse_price(&dd));
            } else if dd.contains("m²") {
                listing.area = listing.area.or_else(|| parse_german_number(&dd));
            } else if dd.contains("Zi") {
                listing.rooms = listing.rooms.or_else(|| parse_german_number(&dd));
            }
        }

        for feature in card.select(&features).map(|f| text_of(f).to_lowercase()) {
            if feature.contains("balkon") {
                listing.has_balcony = true;
            }
            if feature.contains("einbauküche") {
                listing.has_built_in_kitchen = true;
            }
            if feature.contains("aufzug") {
                listing.has_elevator = true;
            }
        }

        listings.push(listing);
    }

    if listings.is_empty() {
        let links = selector(EXPOSE_LINKS)?;
        for link in document.select(&links) {
            let Some(id) = link.value().attr("href").and_then(expose_id) else {
                continue;
            };
            if seen.insert(id.to_string()) {
                let mut listing = Listing::new(id);
                listing.url = expose_url(base, id);
                listing.title = text_of(link);
                listings.push(listing);
            }
        }
    }

    Ok(listings)
}

fn json_ld_listing(document: &Html) -> Result<Option<Value>, SourceError> {
    let scripts = selector(JSON_LD)?;
    for script in document.select(&scripts) {
        let raw: String = script.text().collect();
        let Ok(value) = serde_json::from_str::<Value>(&raw) else {
            continue;
        };
        let typed = value
            .get("@type")
            .and_then(Value::as_str)
            .is_some_and(|t| matches!(t, "Apartment" | "RealEstateListing" | "Product"));
        if typed {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn json_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_german_number(s),
        _ => None,
    }
}

fn json_str(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn yes_no(raw: &str) -> Option<bool> {
    let lower = raw.trim().to_lowercase();
    if lower.starts_with("ja") {
        Some(true)
    } else if lower.starts_with("nein") {
        Some(false)
    } else {
        None
    }
}

/// Detail record for one exposé page.
pub fn parse_expose(html: &str, external_id: &str, base: &Url) -> Result<Listing, SourceError> {
    let document = Html::parse_document(html);
    let root = document.root_element();
    let mut listing = Listing::new(external_id);
    listing.url = expose_url(base, external_id);

    if let Some(data) = json_ld_listing(&document)? {
        listing.title = json_str(&data, "name").unwrap_or_default();
        listing.description = json_str(&data, "description").unwrap_or_default();
        if let Some(address) = data.get("address") {
            listing.city = json_str(address, "addressLocality");
            listing.postal_code = json_str(address, "postalCode");
            listing.address = json_str(address, "streetAddress").unwrap_or_default();
        }
        listing.price = data
            .get("offers")
            .and_then(|offers| offers.get("price"))
            .and_then(json_number)
            .map(|p| p.round() as u32);
    }

    if listing.title.is_empty() {
        listing.title = first_text(root, "#expose-title")?.unwrap_or_default();
    }
    if listing.address.is_empty() {
        if let Some(address) = first_text(root, ".address-block")? {
            let (postal_code, district, city) = split_address(&address);
            listing.postal_code = listing.postal_code.or(postal_code);
            listing.district = district;
            listing.city = listing.city.or(city);
            listing.address = address;
        }
    }
    if listing.price.is_none() {
        listing.price = first_text(root, ".is24qa-kaltmiete")?
            .as_deref()
            .and_then(parse_price);
    }
    listing.rooms = first_text(root, ".is24qa-zi")?
        .as_deref()
        .and_then(parse_german_number);
    listing.area = first_text(root, ".is24qa-wohnflaeche-ca, .is24qa-wohnflaeche")?
        .as_deref()
        .and_then(parse_german_number);
    listing.build_year = first_text(root, ".is24qa-baujahr")?
        .and_then(|year| year.trim().parse().ok());
    listing.available_from = first_text(root, ".is24qa-bezugsfrei-ab")?;
    listing.pets_allowed = first_text(root, ".is24qa-haustiere")?
        .as_deref()
        .and_then(yes_no);
    if listing.description.is_empty() {
        listing.description = first_text(root, ".is24qa-objektbeschreibung")?.unwrap_or_default();
    }

    let present = |css: &str| -> Result<bool, SourceError> {
        Ok(document.select(&selector(css)?).next().is_some())
    };
    listing.has_balcony =
        present(".is24qa-balkon-terrasse-label, .is24qa-balkon-terrasse-ja")?;
    listing.has_built_in_kitchen =
        present(".is24qa-einbaukueche-label, .is24qa-einbaukueche-ja")?;
    listing.has_elevator = present(".is24qa-personenaufzug-label, .is24qa-personenaufzug-ja")?;

    listing.landlord_name = first_text(root, ".realtor-title")?;
    let contact = selector(r#"a[href*="kontaktformular"]"#)?;
    listing.contact_form_url = document
        .select(&contact)
        .filter_map(|a| a.value().attr("href"))
        .find_map(|href| base.join(href).ok())
        .map(|u| u.to_string());

    Ok(listing)
}
