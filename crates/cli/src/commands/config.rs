use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use slotwise_core::config::{AppConfig, LoadOptions};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_key: &str| {
        field_source(key_path, env_key, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let weekdays = config
        .booking
        .weekdays
        .iter()
        .map(|day| day.to_string())
        .collect::<Vec<_>>()
        .join(",");

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "booking.open_time",
        &config.booking.open_time.format("%H:%M").to_string(),
        source("booking.open_time", "SLOTWISE_BOOKING_OPEN_TIME"),
    ));
    lines.push(render_line(
        "booking.close_time",
        &config.booking.close_time.format("%H:%M").to_string(),
        source("booking.close_time", "SLOTWISE_BOOKING_CLOSE_TIME"),
    ));
    lines.push(render_line(
        "booking.weekdays",
        &weekdays,
        source("booking.weekdays", "SLOTWISE_BOOKING_WEEKDAYS"),
    ));
    lines.push(render_line(
        "booking.slot_minutes",
        &config.booking.slot_minutes.to_string(),
        source("booking.slot_minutes", "SLOTWISE_BOOKING_SLOT_MINUTES"),
    ));
    lines.push(render_line(
        "booking.timezone",
        &config.booking.timezone.to_string(),
        source("booking.timezone", "SLOTWISE_BOOKING_TIMEZONE"),
    ));
    lines.push(render_line(
        "booking.suggestion_limit",
        &config.booking.suggestion_limit.to_string(),
        source("booking.suggestion_limit", "SLOTWISE_BOOKING_SUGGESTION_LIMIT"),
    ));
    lines.push(render_line(
        "booking.search_horizon_days",
        &config.booking.search_horizon_days.to_string(),
        source("booking.search_horizon_days", "SLOTWISE_BOOKING_SEARCH_HORIZON_DAYS"),
    ));

    lines.push(render_line(
        "llm.enabled",
        &config.llm.enabled.to_string(),
        source("llm.enabled", "SLOTWISE_LLM_ENABLED"),
    ));
    lines.push(render_line(
        "llm.provider",
        &format!("{:?}", config.llm.provider),
        source("llm.provider", "SLOTWISE_LLM_PROVIDER"),
    ));
    lines.push(render_line(
        "llm.model",
        &config.llm.model,
        source("llm.model", "SLOTWISE_LLM_MODEL"),
    ));
    lines.push(render_line(
        "llm.base_url",
        config.llm.base_url.as_deref().unwrap_or("<unset>"),
        source("llm.base_url", "SLOTWISE_LLM_BASE_URL"),
    ));

    let llm_api_key = if config.llm.api_key.is_some() { "<redacted>" } else { "<unset>" };
    lines.push(render_line(
        "llm.api_key",
        llm_api_key,
        source("llm.api_key", "SLOTWISE_LLM_API_KEY"),
    ));
    lines.push(render_line(
        "llm.timeout_secs",
        &config.llm.timeout_secs.to_string(),
        source("llm.timeout_secs", "SLOTWISE_LLM_TIMEOUT_SECS"),
    ));
    lines.push(render_line(
        "llm.max_retries",
        &config.llm.max_retries.to_string(),
        source("llm.max_retries", "SLOTWISE_LLM_MAX_RETRIES"),
    ));

    let events_file = config
        .calendar
        .events_file
        .as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<unset>".to_string());
    lines.push(render_line(
        "calendar.events_file",
        &events_file,
        source("calendar.events_file", "SLOTWISE_CALENDAR_EVENTS_FILE"),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", "SLOTWISE_LOGGING_LEVEL"),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", "SLOTWISE_LOGGING_FORMAT"),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("slotwise.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/slotwise.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_key: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if env::var_os(env_key).is_some() {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}
