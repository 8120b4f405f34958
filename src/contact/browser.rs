use std::ffi::OsStr;
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use headless_chrome::{Browser, LaunchOptions, Tab};
use tracing::{debug, info};

use crate::contact::traits::Submitter;
use crate::models::{ApplicantProfile, Listing};
use crate::sources::user_agents::UserAgentRotator;

const FORM_SELECTOR: &str = r#"form[data-qa="contactForm"], .contact-form, #contactForm"#;
const FORM_TIMEOUT: Duration = Duration::from_secs(20);

const SALUTATION_FIELDS: &[&str] = &[
    r#"select[name="salutation"]"#,
    r#"select[name="contactFormMessage.salutation"]"#,
    r#"select[data-qa="salutation"]"#,
];
const FIRST_NAME_FIELDS: &[&str] = &[
    r#"input[name="firstName"]"#,
    r#"input[name="contactFormMessage.firstName"]"#,
    r#"input[data-qa="firstName"]"#,
];
const LAST_NAME_FIELDS: &[&str] = &[
    r#"input[name="lastName"]"#,
    r#"input[name="contactFormMessage.lastName"]"#,
    r#"input[data-qa="lastName"]"#,
];
const EMAIL_FIELDS: &[&str] = &[
    r#"input[name="contactFormMessage.emailAddress"]"#,
    r#"input[name="email"]"#,
    r#"input[type="email"]"#,
];
const PHONE_FIELDS: &[&str] = &[
    r#"input[name="contactFormMessage.phoneNumber"]"#,
    r#"input[name="phone"]"#,
    r#"input[type="tel"]"#,
];
const MESSAGE_FIELDS: &[&str] = &[
    r#"textarea[name="contactFormMessage.message"]"#,
    r#"textarea[name="message"]"#,
    r#"textarea[data-qa="message"]"#,
    "textarea",
];
const SUBMIT_BUTTONS: &[&str] = &[
    r#"button[data-qa="sendButton"]"#,
    r#"button[type="submit"]"#,
    r#"input[type="submit"]"#,
    ".is24qa-submit",
];

/// Randomised pauses between browser actions.
#[derive(Debug, Clone, Copy)]
pub struct HumanPacing {
    pub type_delay: Duration,
    pub action_delay: Duration,
}

impl Default for HumanPacing {
    fn default() -> Self {
        Self {
            type_delay: Duration::from_millis(80),
            action_delay: Duration::from_millis(400),
        }
    }
}

impl HumanPacing {
    fn jitter(base: Duration, max_extra: Duration) -> Duration {
        let extra = max_extra.as_millis() as u64;
        if extra == 0 {
            return base;
        }
        base + Duration::from_millis(rand::random_range(0..extra))
    }

    /// Per-keystroke delay, up to 50% above `type_delay`.
    pub fn keystroke(&self) -> Duration {
        Self::jitter(self.type_delay, self.type_delay / 2)
    }

    /// Pause between form fields, up to twice `action_delay`.
    pub fn action(&self) -> Duration {
        Self::jitter(self.action_delay, self.action_delay)
    }

    /// Longer pause before navigation-level steps, 0.5 to 2 seconds.
    pub fn think(&self) -> Duration {
        Self::jitter(Duration::from_millis(500), Duration::from_millis(1500))
    }
}

/// Fills and submits the exposé contact form in headless Chrome.
pub struct BrowserSubmitter {
    base_url: String,
    chrome_path: Option<PathBuf>,
    cookie: Option<String>,
    applicant: ApplicantProfile,
    pacing: HumanPacing,
}

impl BrowserSubmitter {
    pub fn new(
        base_url: impl Into<String>,
        chrome_path: Option<PathBuf>,
        cookie: Option<String>,
        applicant: ApplicantProfile,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            chrome_path,
            cookie: cookie.filter(|c| !c.trim().is_empty()),
            applicant,
            pacing: HumanPacing::default(),
        }
    }

    pub fn with_pacing(mut self, pacing: HumanPacing) -> Self {
        self.pacing = pacing;
        self
    }
}

#[async_trait]
impl Submitter for BrowserSubmitter {
    async fn submit(&self, listing: &Listing, message: &str) -> Result<()> {
        let session = FormSession {
            base_url: self.base_url.clone(),
            contact_url: contact_url(listing, &self.base_url),
            chrome_path: self.chrome_path.clone(),
            cookie: self.cookie.clone(),
            applicant: self.applicant.clone(),
            pacing: self.pacing,
            message: message.to_string(),
        };
        info!(id = %listing.external_id, url = %session.contact_url, "submitting contact form");

        tokio::task::spawn_blocking(move || session.run())
            .await
            .context("Browser task panicked")?
    }
}

/// The contact form URL for `listing`, defaulting to the exposé's e-mail
/// contact anchor.
pub fn contact_url(listing: &Listing, base_url: &str) -> String {
    match listing.contact_form_url.as_deref() {
        Some(url) if !url.is_empty() => url.to_string(),
        _ => format!(
            "{}/expose/{}#/basicContact/email",
            base_url.trim_end_matches('/'),
            listing.external_id
        ),
    }
}

/// `name=value` pairs of a Cookie header.
pub fn cookie_pairs(cookie: &str) -> Vec<(String, String)> {
    cookie
        .split(';')
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            (!name.is_empty()).then(|| (name.to_string(), value.trim().to_string()))
        })
        .collect()
}

fn js_string(raw: &str) -> String {
    serde_json::Value::String(raw.to_string()).to_string()
}

fn set_value_script(selector: &str, value: &str) -> String {
    format!(
        "(() => {{ const el = document.querySelector({}); if (!el) return false; \
         el.value = {}; el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()",
        js_string(selector),
        js_string(value)
    )
}

struct FormSession {
    base_url: String,
    contact_url: String,
    chrome_path: Option<PathBuf>,
    cookie: Option<String>,
    applicant: ApplicantProfile,
    pacing: HumanPacing,
    message: String,
}

impl FormSession {
    fn run(self) -> Result<()> {
        let options = LaunchOptions::default_builder()
            .headless(true)
            .sandbox(false)
            .path(self.chrome_path.clone())
            .args(vec![OsStr::new("--disable-blink-features=AutomationControlled")])
            .build()
            .context("Failed to build launch options")?;
        let browser = Browser::new(options).context("Failed to launch Chrome browser")?;
        let tab = browser.new_tab()?;
        tab.set_user_agent(UserAgentRotator::default().next(), Some("de-DE,de;q=0.9"), None)?;

        if let Some(cookie) = &self.cookie {
            tab.navigate_to(&self.base_url)?.wait_until_navigated()?;
            for (name, value) in cookie_pairs(cookie) {
                let script = format!(
                    "document.cookie = {} + '=' + {} + '; path=/'",
                    js_string(&name),
                    js_string(&value)
                );
                tab.evaluate(&script, false)?;
            }
        }

        tab.navigate_to(&self.contact_url)?.wait_until_navigated()?;
        thread::sleep(self.pacing.think());
        tab.wait_for_element_with_custom_timeout(FORM_SELECTOR, FORM_TIMEOUT)
            .context("Contact form did not appear")?;

        self.fill(&tab)?;

        thread::sleep(self.pacing.think());
        self.press_submit(&tab)?;
        thread::sleep(Duration::from_secs(2));
        Ok(())
    }

    fn fill(&self, tab: &Tab) -> Result<()> {
        let applicant = &self.applicant;
        if !applicant.salutation.is_empty() {
            for selector in SALUTATION_FIELDS {
                tab.evaluate(&set_value_script(selector, &applicant.salutation), false)?;
            }
            thread::sleep(self.pacing.action());
        }
        self.try_type(tab, FIRST_NAME_FIELDS, &applicant.first_name);
        self.try_type(tab, LAST_NAME_FIELDS, &applicant.last_name);
        self.try_type(tab, EMAIL_FIELDS, &applicant.email);
        self.try_type(tab, PHONE_FIELDS, &applicant.phone);

        if !self.try_type(tab, MESSAGE_FIELDS, &self.message) {
            return Err(anyhow!("No message field on contact form"));
        }
        Ok(())
    }

    /// Types `value` into the first matching field. Returns whether a field
    /// was filled.
    fn try_type(&self, tab: &Tab, selectors: &[&str], value: &str) -> bool {
        if value.is_empty() {
            return false;
        }
        for selector in selectors {
            let Ok(element) = tab.find_element(selector) else {
                continue;
            };
            // Clear any prefilled value first.
            if tab.evaluate(&set_value_script(selector, ""), false).is_err()
                || element.click().is_err()
            {
                continue;
            }
            let typed = value.chars().all(|c| {
                let ok = tab.type_str(&c.to_string()).is_ok();
                thread::sleep(self.pacing.keystroke());
                ok
            });
            if typed {
                debug!(selector, "field filled");
                thread::sleep(self.pacing.action());
                return true;
            }
        }
        false
    }

    fn press_submit(&self, tab: &Tab) -> Result<()> {
        for selector in SUBMIT_BUTTONS {
            if let Ok(button) = tab.find_element(selector) {
                if button.click().is_ok() {
                    debug!(selector, "submit clicked");
                    return Ok(());
                }
            }
        }
        tab.evaluate(
            "(() => { const f = document.querySelector('form'); if (!f) return false; f.submit(); return true; })()",
            false,
        )
        .context("Failed to submit contact form")?;
        Ok(())
    }
}
