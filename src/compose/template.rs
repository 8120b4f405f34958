use std::path::Path;

use anyhow::{Context, Result};

use crate::compose::traits::Composer;
use crate::models::{ApplicantProfile, Listing};

pub const DEFAULT_TEMPLATE: &str = "Sehr geehrte Damen und Herren,

mit großem Interesse habe ich Ihre Wohnung in {locality} gesehen.

{details}

Ich suche eine Wohnung, in der ich mich langfristig wohlfühlen kann. Selbstauskunft, Einkommens- und Bonitätsnachweise reiche ich gerne nach.

Über eine Einladung zur Besichtigung würde ich mich sehr freuen. Gerne können Sie mich auch telefonisch oder per E-Mail kontaktieren.

Vielen Dank für Ihre Zeit.

Beste Grüße
{name}
";

/// The generic personalised paragraph for `listing`, built from its
/// amenities and location.
pub fn generic_details(listing: &Listing) -> String {
    let mut details = Vec::new();
    if listing.has_balcony {
        details.push("der Balkon".to_string());
    }
    if listing.has_built_in_kitchen {
        details.push("die Einbauküche".to_string());
    }
    if let Some(area) = listing.area {
        details.push(format!("die großzügige Wohnfläche von {area:.0} m²"));
    }
    if let Some(district) = listing.district.as_deref().filter(|d| !d.is_empty()) {
        details.push(format!("die Lage in {district}"));
    }

    match details.as_slice() {
        [] => "Die Bilder haben mich direkt angesprochen und die Wohnung entspricht genau meinen Vorstellungen.".to_string(),
        [only] => format!("Die Bilder haben mich direkt angesprochen, besonders {only}."),
        [first, second, ..] => {
            format!("Die Bilder haben mich direkt angesprochen, besonders {first} und {second}.")
        }
    }
}

/// Fills `{placeholder}` slots of a text template.
///
/// Supported: `{title}`, `{locality}`, `{address}`, `{city}`, `{district}`,
/// `{price}`, `{rooms}`, `{area}`, `{landlord}`, `{details}`, `{name}`,
/// `{first_name}`, `{last_name}`, `{email}`, `{phone}`. Unknown slots are
/// left as they are.
pub struct TemplateComposer {
    template: String,
    applicant: ApplicantProfile,
}

impl TemplateComposer {
    pub fn new(template: impl Into<String>, applicant: ApplicantProfile) -> Self {
        Self {
            template: template.into(),
            applicant,
        }
    }

    pub fn with_default_template(applicant: ApplicantProfile) -> Self {
        Self::new(DEFAULT_TEMPLATE, applicant)
    }

    pub fn from_file(path: impl AsRef<Path>, applicant: ApplicantProfile) -> Result<Self> {
        let path = path.as_ref();
        let template = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read message template {}", path.display()))?;
        Ok(Self::new(template, applicant))
    }
}

impl Composer for TemplateComposer {
    fn compose(&self, listing: &Listing) -> String {
        let opt = |value: Option<String>| value.unwrap_or_default();
        let slots = [
            ("{title}", listing.title.clone()),
            ("{locality}", listing.locality().to_string()),
            ("{address}", listing.address.clone()),
            ("{city}", opt(listing.city.clone())),
            ("{district}", opt(listing.district.clone())),
            ("{price}", opt(listing.price.map(|p| p.to_string()))),
            ("{rooms}", opt(listing.rooms.map(|r| format!("{r:.1}")))),
            ("{area}", opt(listing.area.map(|a| format!("{a:.0}")))),
            ("{landlord}", opt(listing.landlord_name.clone())),
            ("{details}", generic_details(listing)),
            ("{name}", self.applicant.full_name()),
            ("{first_name}", self.applicant.first_name.clone()),
            ("{last_name}", self.applicant.last_name.clone()),
            ("{email}", self.applicant.email.clone()),
            ("{phone}", self.applicant.phone.clone()),
        ];

        let mut text = self.template.clone();
        for (slot, value) in slots {
            text = text.replace(slot, &value);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn applicant() -> ApplicantProfile {
        ApplicantProfile {
            first_name: "Alex".to_string(),
            last_name: "Muster".to_string(),
            ..ApplicantProfile::default()
        }
    }

    #[test]
    fn default_template_is_filled() {
        let mut listing = Listing::new("1");
        listing.city = Some("Berlin".to_string());
        listing.district = Some("Mitte".to_string());
        listing.has_balcony = true;

        let text = TemplateComposer::with_default_template(applicant()).compose(&listing);
        assert!(text.contains("Ihre Wohnung in Mitte gesehen"));
        assert!(text.contains("besonders der Balkon und die Lage in Mitte."));
        assert!(text.ends_with("Beste Grüße\nAlex Muster\n"));
        assert!(!text.contains('{'));
    }

    #[test]
    fn custom_template_keeps_unknown_slots() {
        let mut listing = Listing::new("1");
        listing.price = Some(900);
        listing.rooms = Some(2.0);
        let text = TemplateComposer::new("{price} € / {rooms} / {unknown}", applicant())
            .compose(&listing);
        assert_eq!(text, "900 € / 2.0 / {unknown}");
    }

    #[test]
    fn generic_details_without_facts() {
        let listing = Listing::new("1");
        assert!(generic_details(&listing).contains("genau meinen Vorstellungen"));
    }

    #[test]
    fn generic_details_uses_first_two_facts() {
        let mut listing = Listing::new("1");
        listing.has_built_in_kitchen = true;
        listing.area = Some(72.4);
        listing.district = Some("Altona".to_string());
        assert_eq!(
            generic_details(&listing),
            "Die Bilder haben mich direkt angesprochen, besonders die Einbauküche und die großzügige Wohnfläche von 72 m²."
        );
    }
}
