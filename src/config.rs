use std::env::VarError;
use std::path::PathBuf;
use std::time::Duration;

use chrono::NaiveTime;
use chrono_tz::Tz;
use thiserror::Error;

use crate::compose::openai;
use crate::mode::ActionMode;
use crate::models::ApplicantProfile;
use crate::notify::telegram;
use crate::scheduler::QuietHours;
use crate::sources::is24;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TelegramConfig {
    pub bot_token: String,
    pub chat_id: i64,
    pub api_base: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub api_base: String,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub log_level: String,
    pub poll_interval: Duration,
    pub fetch_details: bool,
    /// `None` keeps all state in memory.
    pub store_path: Option<PathBuf>,
    pub profiles_path: PathBuf,

    pub max_requests_per_minute: usize,
    pub min_delay: Duration,
    pub max_delay: Duration,
    pub quiet_hours: Option<QuietHours>,

    pub source_base_url: String,
    pub is24_cookie: Option<String>,
    pub request_timeout: Duration,

    pub telegram: Option<TelegramConfig>,
    pub openai: Option<OpenAiConfig>,

    pub contact_enabled: bool,
    pub initial_mode: ActionMode,
    pub message_template: Option<PathBuf>,
    pub chrome_path: Option<PathBuf>,
    /// Base pause between keystrokes when filling the contact form.
    pub type_delay: Duration,
    /// Base pause between form fields.
    pub action_delay: Duration,
    pub applicant: ApplicantProfile,
}

/// Loads `.env` (if present) and reads the configuration from the process
/// environment.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    build_config(|key| std::env::var(key))
}

/// Builds the configuration from an env-var lookup function. Empty values
/// count as unset.
pub fn build_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, VarError>,
{
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let or_default = |var: &str, default: &str| -> String {
        optional(var).unwrap_or_else(|| default.to_string())
    };
    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };
    let parse_bool = |var: &str, default: bool| -> Result<bool, ConfigError> {
        match optional(var).map(|v| v.to_ascii_lowercase()) {
            None => Ok(default),
            Some(v) => match v.as_str() {
                "true" | "1" | "yes" | "on" => Ok(true),
                "false" | "0" | "no" | "off" => Ok(false),
                other => Err(invalid(var, format!("expected a boolean, got \"{other}\""))),
            },
        }
    };
    let parse_time = |var: &str, default: &str| -> Result<NaiveTime, ConfigError> {
        let raw = or_default(var, default);
        NaiveTime::parse_from_str(&raw, "%H:%M").map_err(|e| invalid(var, e.to_string()))
    };

    let log_level = or_default("SCOUT_LOG_LEVEL", "info");
    let poll_secs = parse_u64("SCOUT_POLL_INTERVAL_SECS", "300")?;
    if poll_secs == 0 {
        return Err(invalid("SCOUT_POLL_INTERVAL_SECS", "must be positive".to_string()));
    }
    let fetch_details = parse_bool("SCOUT_FETCH_DETAILS", true)?;
    let store_path = match lookup("SCOUT_STORE_PATH") {
        Ok(raw) if raw.trim().is_empty() => None,
        Ok(raw) => Some(PathBuf::from(raw.trim())),
        Err(_) => Some(PathBuf::from("data/listings.json")),
    };
    let profiles_path = PathBuf::from(or_default("SCOUT_PROFILES_PATH", "config/profiles.yaml"));

    let max_requests_per_minute = parse_u64("SCOUT_MAX_REQUESTS_PER_MINUTE", "10")? as usize;
    if max_requests_per_minute == 0 {
        return Err(invalid(
            "SCOUT_MAX_REQUESTS_PER_MINUTE",
            "must be positive".to_string(),
        ));
    }
    let min_delay = Duration::from_millis(parse_u64("SCOUT_MIN_DELAY_MS", "2000")?);
    let max_delay = Duration::from_millis(parse_u64("SCOUT_MAX_DELAY_MS", "8000")?);

    let timezone: Tz = or_default("SCOUT_TIMEZONE", "Europe/Berlin")
        .parse()
        .map_err(|e: <Tz as std::str::FromStr>::Err| invalid("SCOUT_TIMEZONE", e.to_string()))?;
    let quiet_hours = if parse_bool("SCOUT_QUIET_HOURS_ENABLED", false)? {
        Some(QuietHours::new(
            parse_time("SCOUT_QUIET_HOURS_START", "22:00")?,
            parse_time("SCOUT_QUIET_HOURS_END", "07:00")?,
            timezone,
        ))
    } else {
        None
    };

    let source_base_url = or_default("SCOUT_SOURCE_BASE_URL", is24::DEFAULT_BASE_URL);
    let is24_cookie = optional("IS24_COOKIE");
    let request_timeout = Duration::from_secs(parse_u64("SCOUT_REQUEST_TIMEOUT_SECS", "30")?);

    let telegram = match (optional("TELEGRAM_BOT_TOKEN"), optional("TELEGRAM_CHAT_ID")) {
        (Some(bot_token), Some(chat_id)) => Some(TelegramConfig {
            bot_token,
            chat_id: chat_id
                .parse()
                .map_err(|e: std::num::ParseIntError| invalid("TELEGRAM_CHAT_ID", e.to_string()))?,
            api_base: or_default("TELEGRAM_API_BASE", telegram::DEFAULT_API_BASE),
        }),
        (None, None) => None,
        (Some(_), None) => return Err(ConfigError::MissingEnvVar("TELEGRAM_CHAT_ID".to_string())),
        (None, Some(_)) => {
            return Err(ConfigError::MissingEnvVar("TELEGRAM_BOT_TOKEN".to_string()))
        }
    };

    let openai = optional("OPENAI_API_KEY").map(|api_key| OpenAiConfig {
        api_key,
        model: or_default("OPENAI_MODEL", openai::DEFAULT_MODEL),
        api_base: or_default("OPENAI_API_BASE", openai::DEFAULT_API_BASE),
    });

    let contact_enabled = parse_bool("SCOUT_CONTACT_ENABLED", true)?;
    let initial_mode: ActionMode = or_default("SCOUT_INITIAL_MODE", "off")
        .parse()
        .map_err(|e: crate::mode::ParseActionModeError| invalid("SCOUT_INITIAL_MODE", e.to_string()))?;
    let message_template = optional("SCOUT_MESSAGE_TEMPLATE").map(PathBuf::from);
    let chrome_path = optional("CHROME_PATH").map(PathBuf::from);
    let type_delay = Duration::from_millis(parse_u64("SCOUT_TYPE_DELAY_MS", "80")?);
    let action_delay = Duration::from_millis(parse_u64("SCOUT_ACTION_DELAY_MS", "400")?);
    let applicant = ApplicantProfile {
        salutation: optional("SCOUT_APPLICANT_SALUTATION").unwrap_or_default(),
        first_name: optional("SCOUT_APPLICANT_FIRST_NAME").unwrap_or_default(),
        last_name: optional("SCOUT_APPLICANT_LAST_NAME").unwrap_or_default(),
        email: optional("SCOUT_APPLICANT_EMAIL").unwrap_or_default(),
        phone: optional("SCOUT_APPLICANT_PHONE").unwrap_or_default(),
    };

    Ok(AppConfig {
        log_level,
        poll_interval: Duration::from_secs(poll_secs),
        fetch_details,
        store_path,
        profiles_path,
        max_requests_per_minute,
        min_delay,
        max_delay,
        quiet_hours,
        source_base_url,
        is24_cookie,
        request_timeout,
        telegram,
        openai,
        contact_enabled,
        initial_mode,
        message_template,
        chrome_path,
        type_delay,
        action_delay,
        applicant,
    })
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from_map<'a>(
        map: &'a HashMap<&'a str, &'a str>,
    ) -> impl Fn(&str) -> Result<String, VarError> + 'a {
        move |key| {
            map.get(key)
                .map(|v| (*v).to_string())
                .ok_or(VarError::NotPresent)
        }
    }

    #[test]
    fn defaults_apply_to_empty_environment() {
        let map = HashMap::new();
        let cfg = build_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.log_level, "info");
        assert_eq!(cfg.poll_interval, Duration::from_secs(300));
        assert!(cfg.fetch_details);
        assert_eq!(cfg.store_path, Some(PathBuf::from("data/listings.json")));
        assert_eq!(cfg.profiles_path, PathBuf::from("config/profiles.yaml"));
        assert_eq!(cfg.max_requests_per_minute, 10);
        assert_eq!(cfg.min_delay, Duration::from_millis(2000));
        assert_eq!(cfg.max_delay, Duration::from_millis(8000));
        assert!(cfg.quiet_hours.is_none());
        assert_eq!(cfg.source_base_url, "https://www.immobilienscout24.de");
        assert!(cfg.telegram.is_none());
        assert!(cfg.openai.is_none());
        assert!(cfg.contact_enabled);
        assert_eq!(cfg.initial_mode, ActionMode::Off);
        assert_eq!(cfg.type_delay, Duration::from_millis(80));
        assert_eq!(cfg.action_delay, Duration::from_millis(400));
    }

    #[test]
    fn form_pacing_is_configurable() {
        let map = HashMap::from([("SCOUT_TYPE_DELAY_MS", "20"), ("SCOUT_ACTION_DELAY_MS", "0")]);
        let cfg = build_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.type_delay, Duration::from_millis(20));
        assert_eq!(cfg.action_delay, Duration::ZERO);

        let map = HashMap::from([("SCOUT_TYPE_DELAY_MS", "fast")]);
        assert!(matches!(
            build_config(lookup_from_map(&map)),
            Err(ConfigError::InvalidEnvVar { ref var, .. }) if var == "SCOUT_TYPE_DELAY_MS"
        ));
    }

    #[test]
    fn empty_store_path_means_in_memory() {
        let map = HashMap::from([("SCOUT_STORE_PATH", "")]);
        let cfg = build_config(lookup_from_map(&map)).unwrap();
        assert_eq!(cfg.store_path, None);
    }

    #[test]
    fn quiet_hours_are_parsed_in_zone() {
        let map = HashMap::from([
            ("SCOUT_QUIET_HOURS_ENABLED", "true"),
            ("SCOUT_QUIET_HOURS_START", "23:00"),
            ("SCOUT_QUIET_HOURS_END", "06:30"),
            ("SCOUT_TIMEZONE", "Europe/Vienna"),
        ]);
        let quiet = build_config(lookup_from_map(&map))
            .unwrap()
            .quiet_hours
            .unwrap();
        assert_eq!(quiet.start, NaiveTime::from_hms_opt(23, 0, 0).unwrap());
        assert_eq!(quiet.end, NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        assert_eq!(quiet.timezone, chrono_tz::Europe::Vienna);
    }

    #[test]
    fn telegram_requires_token_and_chat() {
        let map = HashMap::from([("TELEGRAM_BOT_TOKEN", "123:abc")]);
        let err = build_config(lookup_from_map(&map)).unwrap_err();
        assert!(matches!(err, ConfigError::MissingEnvVar(ref v) if v == "TELEGRAM_CHAT_ID"));

        let map = HashMap::from([("TELEGRAM_BOT_TOKEN", "123:abc"), ("TELEGRAM_CHAT_ID", "-10042")]);
        let telegram = build_config(lookup_from_map(&map)).unwrap().telegram.unwrap();
        assert_eq!(telegram.chat_id, -100_42);
        assert_eq!(telegram.api_base, "https://api.telegram.org");
    }

    #[test]
    fn invalid_values_name_the_variable() {
        let cases = [
            ("SCOUT_POLL_INTERVAL_SECS", "soon"),
            ("SCOUT_POLL_INTERVAL_SECS", "0"),
            ("SCOUT_FETCH_DETAILS", "maybe"),
            ("SCOUT_TIMEZONE", "Mars/Olympus"),
            ("SCOUT_INITIAL_MODE", "aggressive"),
            ("SCOUT_MAX_REQUESTS_PER_MINUTE", "0"),
        ];
        for (var, value) in cases {
            let map = HashMap::from([(var, value)]);
            match build_config(lookup_from_map(&map)) {
                Err(ConfigError::InvalidEnvVar { var: got, .. }) => assert_eq!(got, var),
                other => panic!("{var}={value}: expected InvalidEnvVar, got {other:?}"),
            }
        }
    }

    #[test]
    fn openai_and_applicant_settings() {
        let map = HashMap::from([
            ("OPENAI_API_KEY", "sk-test"),
            ("SCOUT_INITIAL_MODE", "preview"),
            ("SCOUT_APPLICANT_FIRST_NAME", "Alex"),
            ("SCOUT_APPLICANT_LAST_NAME", "Muster"),
        ]);
        let cfg = build_config(lookup_from_map(&map)).unwrap();
        let openai = cfg.openai.unwrap();
        assert_eq!(openai.model, "gpt-4o-mini");
        assert_eq!(openai.api_base, "https://api.openai.com");
        assert_eq!(cfg.initial_mode, ActionMode::Preview);
        assert_eq!(cfg.applicant.full_name(), "Alex Muster");
    }
}
