//! Telegram HTML message bodies.

use std::fmt::Write;

use crate::models::Listing;

/// Escapes the characters Telegram's HTML parse mode reserves.
pub fn escape_html(raw: &str) -> String {
    raw.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn location(listing: &Listing) -> Option<String> {
    if !listing.address.trim().is_empty() {
        return Some(listing.address.clone());
    }
    match (&listing.district, &listing.city) {
        (Some(district), Some(city)) => Some(format!("{district}, {city}")),
        (None, Some(city)) => Some(city.clone()),
        (Some(district), None) => Some(district.clone()),
        (None, None) => None,
    }
}

fn features(listing: &Listing) -> Vec<&'static str> {
    let mut features = Vec::new();
    if listing.has_balcony {
        features.push("Balkon");
    }
    if listing.has_built_in_kitchen {
        features.push("EBK");
    }
    if listing.has_elevator {
        features.push("Aufzug");
    }
    features
}

// `write!` into a String cannot fail.
pub fn new_listing(listing: &Listing) -> String {
    let mut out = String::from("🏠 <b>Neue Wohnung gefunden!</b>\n\n");
    let _ = writeln!(out, "<b>{}</b>\n", escape_html(&listing.title));

    if let Some(location) = location(listing) {
        let _ = writeln!(out, "📍 {}", escape_html(&location));
    }
    out.push('\n');

    if let Some(price) = listing.price {
        let _ = writeln!(out, "💰 <b>{price} €</b> Kaltmiete");
    }
    if let Some(rooms) = listing.rooms {
        let _ = writeln!(out, "🚪 {rooms:.1} Zimmer");
    }
    if let Some(area) = listing.area {
        let _ = writeln!(out, "📐 {area:.0} m²");
    }
    let features = features(listing);
    if !features.is_empty() {
        let _ = writeln!(out, "✨ {}", features.join(", "));
    }
    if let Some(from) = &listing.available_from {
        let _ = writeln!(out, "📅 Ab {}", escape_html(from));
    }
    if let Some(landlord) = &listing.landlord_name {
        let _ = writeln!(out, "\n👤 {}", escape_html(landlord));
    }
    out
}

pub fn contact_sent(listing: &Listing) -> String {
    format!(
        "✅ <b>Kontaktanfrage gesendet</b>\n\n<b>{}</b>\n📍 {}\n🔗 {}",
        escape_html(&listing.title),
        escape_html(location(listing).as_deref().unwrap_or("-")),
        escape_html(&listing.url),
    )
}

pub fn contact_failed(listing: &Listing, error: &str) -> String {
    format!(
        "❌ <b>Kontaktanfrage fehlgeschlagen</b>\n\n<b>{}</b>\n📍 {}\n🔗 {}\n\n<b>Fehler:</b> {}",
        escape_html(&listing.title),
        escape_html(location(listing).as_deref().unwrap_or("-")),
        escape_html(&listing.url),
        escape_html(error),
    )
}

pub fn preview(listing: &Listing, message: &str) -> String {
    let price = listing
        .price
        .map(|p| format!("{p} €"))
        .unwrap_or_else(|| "? €".to_string());
    let rooms = listing
        .rooms
        .map(|r| format!("{r:.1} Zimmer"))
        .unwrap_or_else(|| "? Zimmer".to_string());
    format!(
        "🧪 <b>Vorschau-Modus: Nachricht</b>\n\n<b>Wohnung:</b> {}\n📍 {}\n💰 {} | 🚪 {}\n🔗 {}\n\n<b>━━━ Nachricht ━━━</b>\n\n<pre>{}</pre>",
        escape_html(&listing.title),
        escape_html(location(listing).as_deref().unwrap_or("-")),
        price,
        rooms,
        escape_html(&listing.url),
        escape_html(message),
    )
}

pub fn error(message: &str) -> String {
    format!("⚠️ <b>Bot-Fehler</b>\n\n{}", escape_html(message))
}
