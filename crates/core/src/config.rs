use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{NaiveTime, Weekday};
use chrono_tz::Tz;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rules::BusinessRules;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub booking: BookingConfig,
    pub llm: LlmConfig,
    pub calendar: CalendarConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub weekdays: Vec<Weekday>,
    pub slot_minutes: u32,
    pub timezone: Tz,
    pub suggestion_limit: usize,
    pub search_horizon_days: i64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub provider: LlmProvider,
    pub api_key: Option<SecretString>,
    pub base_url: Option<String>,
    pub model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Clone, Debug)]
pub struct CalendarConfig {
    pub events_file: Option<PathBuf>,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    OpenAi,
    Groq,
    Ollama,
}

impl LlmProvider {
    /// OpenAI-compatible chat-completions roots; all three providers speak
    /// the same wire shape.
    pub fn default_base_url(&self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Groq => "https://api.groq.com/openai/v1",
            Self::Ollama => "http://localhost:11434/v1",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub open_time: Option<String>,
    pub close_time: Option<String>,
    pub weekdays: Option<String>,
    pub slot_minutes: Option<u32>,
    pub timezone: Option<String>,
    pub events_file: Option<PathBuf>,
    pub llm_enabled: Option<bool>,
    pub log_level: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid value for `{key}`: `{value}`")]
    InvalidValue { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            booking: BookingConfig {
                open_time: clock(10, 0),
                close_time: clock(18, 0),
                weekdays: vec![
                    Weekday::Mon,
                    Weekday::Tue,
                    Weekday::Wed,
                    Weekday::Thu,
                    Weekday::Fri,
                ],
                slot_minutes: 60,
                timezone: Tz::UTC,
                suggestion_limit: 3,
                search_horizon_days: 14,
            },
            llm: LlmConfig {
                enabled: false,
                provider: LlmProvider::Groq,
                api_key: None,
                base_url: None,
                model: "llama3-8b-8192".to_string(),
                timeout_secs: 15,
                max_retries: 2,
            },
            calendar: CalendarConfig { events_file: None },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn clock(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap_or(NaiveTime::MIN)
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "openai" | "open_ai" => Ok(Self::OpenAi),
            "groq" => Ok(Self::Groq),
            "ollama" => Ok(Self::Ollama),
            other => Err(ConfigError::Validation(format!(
                "unsupported llm provider `{other}` (expected openai|groq|ollama)"
            ))),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    /// Precedence, lowest to highest: built-in defaults, config file,
    /// `SLOTWISE_*` environment variables, programmatic overrides. Validation
    /// runs last and fails fast with an actionable message.
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch)?;
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("slotwise.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides)?;
        config.validate()?;

        Ok(config)
    }

    /// The immutable rule set handed to the engine for every evaluation.
    pub fn business_rules(&self) -> BusinessRules {
        BusinessRules::from(&self.booking)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) -> Result<(), ConfigError> {
        if let Some(booking) = patch.booking {
            if let Some(value) = booking.open_time {
                self.booking.open_time = parse_time("booking.open_time", &value)?;
            }
            if let Some(value) = booking.close_time {
                self.booking.close_time = parse_time("booking.close_time", &value)?;
            }
            if let Some(values) = booking.weekdays {
                self.booking.weekdays = parse_weekdays("booking.weekdays", values.iter())?;
            }
            if let Some(slot_minutes) = booking.slot_minutes {
                self.booking.slot_minutes = slot_minutes;
            }
            if let Some(value) = booking.timezone {
                self.booking.timezone = parse_timezone("booking.timezone", &value)?;
            }
            if let Some(suggestion_limit) = booking.suggestion_limit {
                self.booking.suggestion_limit = suggestion_limit;
            }
            if let Some(search_horizon_days) = booking.search_horizon_days {
                self.booking.search_horizon_days = search_horizon_days;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(enabled) = llm.enabled {
                self.llm.enabled = enabled;
            }
            if let Some(provider) = llm.provider {
                self.llm.provider = provider;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = Some(base_url);
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = llm.max_retries {
                self.llm.max_retries = max_retries;
            }
        }

        if let Some(calendar) = patch.calendar {
            if let Some(events_file) = calendar.events_file {
                self.calendar.events_file = Some(events_file);
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("SLOTWISE_BOOKING_OPEN_TIME") {
            self.booking.open_time = parse_time("SLOTWISE_BOOKING_OPEN_TIME", &value)?;
        }
        if let Some(value) = read_env("SLOTWISE_BOOKING_CLOSE_TIME") {
            self.booking.close_time = parse_time("SLOTWISE_BOOKING_CLOSE_TIME", &value)?;
        }
        if let Some(value) = read_env("SLOTWISE_BOOKING_WEEKDAYS") {
            self.booking.weekdays =
                parse_weekdays("SLOTWISE_BOOKING_WEEKDAYS", value.split(','))?;
        }
        if let Some(value) = read_env("SLOTWISE_BOOKING_SLOT_MINUTES") {
            self.booking.slot_minutes = parse_u32("SLOTWISE_BOOKING_SLOT_MINUTES", &value)?;
        }
        if let Some(value) = read_env("SLOTWISE_BOOKING_TIMEZONE") {
            self.booking.timezone = parse_timezone("SLOTWISE_BOOKING_TIMEZONE", &value)?;
        }
        if let Some(value) = read_env("SLOTWISE_BOOKING_SUGGESTION_LIMIT") {
            self.booking.suggestion_limit =
                parse_usize("SLOTWISE_BOOKING_SUGGESTION_LIMIT", &value)?;
        }
        if let Some(value) = read_env("SLOTWISE_BOOKING_SEARCH_HORIZON_DAYS") {
            self.booking.search_horizon_days =
                parse_i64("SLOTWISE_BOOKING_SEARCH_HORIZON_DAYS", &value)?;
        }

        if let Some(value) = read_env("SLOTWISE_LLM_ENABLED") {
            self.llm.enabled = parse_bool("SLOTWISE_LLM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("SLOTWISE_LLM_PROVIDER") {
            self.llm.provider = value.parse()?;
        }
        if let Some(value) = read_env("SLOTWISE_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("SLOTWISE_LLM_BASE_URL") {
            self.llm.base_url = Some(value);
        }
        if let Some(value) = read_env("SLOTWISE_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("SLOTWISE_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("SLOTWISE_LLM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("SLOTWISE_LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_u32("SLOTWISE_LLM_MAX_RETRIES", &value)?;
        }

        if let Some(value) = read_env("SLOTWISE_CALENDAR_EVENTS_FILE") {
            self.calendar.events_file = Some(PathBuf::from(value));
        }

        let log_level =
            read_env("SLOTWISE_LOGGING_LEVEL").or_else(|| read_env("SLOTWISE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("SLOTWISE_LOGGING_FORMAT").or_else(|| read_env("SLOTWISE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) -> Result<(), ConfigError> {
        if let Some(value) = overrides.open_time {
            self.booking.open_time = parse_time("override booking.open_time", &value)?;
        }
        if let Some(value) = overrides.close_time {
            self.booking.close_time = parse_time("override booking.close_time", &value)?;
        }
        if let Some(value) = overrides.weekdays {
            self.booking.weekdays = parse_weekdays("override booking.weekdays", value.split(','))?;
        }
        if let Some(slot_minutes) = overrides.slot_minutes {
            self.booking.slot_minutes = slot_minutes;
        }
        if let Some(value) = overrides.timezone {
            self.booking.timezone = parse_timezone("override booking.timezone", &value)?;
        }
        if let Some(events_file) = overrides.events_file {
            self.calendar.events_file = Some(events_file);
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_booking(&self.booking)?;
        validate_llm(&self.llm)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then(|| path.to_path_buf());
    }

    [PathBuf::from("slotwise.toml"), PathBuf::from("config/slotwise.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_booking(booking: &BookingConfig) -> Result<(), ConfigError> {
    if booking.open_time >= booking.close_time {
        return Err(ConfigError::Validation(format!(
            "booking.open_time ({}) must be before booking.close_time ({})",
            booking.open_time.format("%H:%M"),
            booking.close_time.format("%H:%M"),
        )));
    }

    if booking.weekdays.is_empty() {
        return Err(ConfigError::Validation(
            "booking.weekdays must name at least one working day".to_string(),
        ));
    }

    if !(5..=480).contains(&booking.slot_minutes) {
        return Err(ConfigError::Validation(
            "booking.slot_minutes must be in range 5..=480".to_string(),
        ));
    }

    let span_minutes =
        (booking.close_time - booking.open_time).num_minutes();
    if span_minutes < i64::from(booking.slot_minutes) {
        return Err(ConfigError::Validation(
            "booking hours are shorter than a single slot".to_string(),
        ));
    }

    if !(1..=10).contains(&booking.suggestion_limit) {
        return Err(ConfigError::Validation(
            "booking.suggestion_limit must be in range 1..=10".to_string(),
        ));
    }

    if !(1..=60).contains(&booking.search_horizon_days) {
        return Err(ConfigError::Validation(
            "booking.search_horizon_days must be in range 1..=60".to_string(),
        ));
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if !llm.enabled {
        return Ok(());
    }

    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    match llm.provider {
        LlmProvider::OpenAi | LlmProvider::Groq => {
            let missing = llm
                .api_key
                .as_ref()
                .map(|value| value.expose_secret().trim().is_empty())
                .unwrap_or(true);
            if missing {
                return Err(ConfigError::Validation(
                    "llm.api_key is required for openai/groq providers".to_string(),
                ));
            }
        }
        LlmProvider::Ollama => {}
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_time(key: &str, value: &str) -> Result<NaiveTime, ConfigError> {
    let trimmed = value.trim();
    NaiveTime::parse_from_str(trimmed, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(trimmed, "%H:%M:%S"))
        .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() })
}

fn parse_weekday(key: &str, value: &str) -> Result<Weekday, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "mon" | "monday" => Ok(Weekday::Mon),
        "tue" | "tues" | "tuesday" => Ok(Weekday::Tue),
        "wed" | "wednesday" => Ok(Weekday::Wed),
        "thu" | "thurs" | "thursday" => Ok(Weekday::Thu),
        "fri" | "friday" => Ok(Weekday::Fri),
        "sat" | "saturday" => Ok(Weekday::Sat),
        "sun" | "sunday" => Ok(Weekday::Sun),
        _ => Err(ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() }),
    }
}

fn parse_weekdays<S: AsRef<str>>(
    key: &str,
    values: impl IntoIterator<Item = S>,
) -> Result<Vec<Weekday>, ConfigError> {
    let mut weekdays = Vec::new();
    for value in values {
        let day = parse_weekday(key, value.as_ref())?;
        if !weekdays.contains(&day) {
            weekdays.push(day);
        }
    }
    Ok(weekdays)
}

fn parse_timezone(key: &str, value: &str) -> Result<Tz, ConfigError> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|_| ConfigError::InvalidValue { key: key.to_string(), value: value.to_string() })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_i64(key: &str, value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_usize(key: &str, value: &str) -> Result<usize, ConfigError> {
    value.parse::<usize>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    booking: Option<BookingPatch>,
    llm: Option<LlmPatch>,
    calendar: Option<CalendarPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingPatch {
    open_time: Option<String>,
    close_time: Option<String>,
    weekdays: Option<Vec<String>>,
    slot_minutes: Option<u32>,
    timezone: Option<String>,
    suggestion_limit: Option<usize>,
    search_horizon_days: Option<i64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    provider: Option<LlmProvider>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct CalendarPatch {
    events_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}
