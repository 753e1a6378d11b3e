use std::env;
use std::fs;
use std::sync::{Mutex, OnceLock};

use serde_json::Value;
use slotwise_cli::commands::{chat, config, doctor};

const PINNED_NOW: &str = "2025-03-04T09:00:00Z";

#[test]
fn chat_books_a_clean_request() {
    with_env(&[], || {
        let result = chat::run("book a meeting tomorrow at 2pm", Some(PINNED_NOW), true);
        assert_eq!(result.exit_code, 0, "expected successful chat turn");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["summary"]["kind"], "booked");
        assert_eq!(payload["summary"]["title"], "Meeting");
        assert_eq!(payload["summary"]["window"]["start"], "2025-03-05T14:00:00Z");
    });
}

#[test]
fn chat_rejects_weekend_requests_with_alternatives() {
    with_env(&[], || {
        let result = chat::run("book this saturday at noon", Some(PINNED_NOW), true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["summary"]["kind"], "rejected");
        assert_eq!(payload["summary"]["reason"], "non_working_day");
        let alternatives = payload["summary"]["alternatives"].as_array().expect("alternatives");
        assert_eq!(alternatives[0]["start"], "2025-03-10T12:00:00Z");
    });
}

#[test]
fn chat_reports_conflicts_from_the_fixture_calendar() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let events_path = dir.path().join("events.toml");
    fs::write(
        &events_path,
        r#"
[[events]]
start = "2025-03-05T14:00:00Z"
end = "2025-03-05T15:00:00Z"
title = "Existing appointment"
"#,
    )
    .expect("write events fixture");

    let events_path = events_path.to_string_lossy().to_string();
    with_env(&[("SLOTWISE_CALENDAR_EVENTS_FILE", &events_path)], || {
        let result = chat::run("book tomorrow at 14:30", Some(PINNED_NOW), true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["summary"]["kind"], "rejected");
        assert_eq!(payload["summary"]["reason"], "conflict");
        let alternatives = payload["summary"]["alternatives"].as_array().expect("alternatives");
        assert_eq!(alternatives[0]["start"], "2025-03-05T15:00:00Z");
    });
}

#[test]
fn chat_lists_availability_for_a_day() {
    with_env(&[], || {
        let result = chat::run("what's free tomorrow?", Some(PINNED_NOW), true);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["summary"]["kind"], "availability");
        assert_eq!(payload["summary"]["date"], "2025-03-05");
        assert_eq!(payload["summary"]["slots"].as_array().map(Vec::len), Some(8));
    });
}

#[test]
fn chat_rejects_malformed_now_pins() {
    with_env(&[], || {
        let result = chat::run("book tomorrow at 2pm", Some("yesterday-ish"), true);
        assert_eq!(result.exit_code, 3, "expected invalid argument failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "chat");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "invalid_argument");
    });
}

#[test]
fn chat_fails_fast_on_invalid_config() {
    with_env(&[("SLOTWISE_BOOKING_OPEN_TIME", "19:00")], || {
        let result = chat::run("book tomorrow at 2pm", Some(PINNED_NOW), true);
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn chat_surfaces_broken_fixture_files() {
    let dir = tempfile::TempDir::new().expect("temp dir");
    let events_path = dir.path().join("events.toml");
    fs::write(
        &events_path,
        r#"
[[events]]
start = "2025-03-05T15:00:00Z"
end = "2025-03-05T14:00:00Z"
title = "Inverted"
"#,
    )
    .expect("write events fixture");

    let events_path = events_path.to_string_lossy().to_string();
    with_env(&[("SLOTWISE_CALENDAR_EVENTS_FILE", &events_path)], || {
        let result = chat::run("book tomorrow at 2pm", Some(PINNED_NOW), true);
        assert_eq!(result.exit_code, 4, "expected fixture failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "calendar_fixture");
    });
}

#[test]
fn doctor_passes_with_default_config() {
    with_env(&[], || {
        let output = doctor::run(true);
        let payload = parse_payload(&output);

        assert_eq!(payload["overall_status"], "pass");
        let checks = payload["checks"].as_array().expect("checks");
        assert_eq!(checks.len(), 3);
        assert!(checks.iter().all(|check| check["status"] == "pass"));
    });
}

#[test]
fn doctor_reports_config_failures_and_skips_the_rest() {
    with_env(&[("SLOTWISE_BOOKING_OPEN_TIME", "19:00")], || {
        let output = doctor::run(true);
        let payload = parse_payload(&output);

        assert_eq!(payload["overall_status"], "fail");
        let checks = payload["checks"].as_array().expect("checks");
        assert_eq!(checks[0]["name"], "config_validation");
        assert_eq!(checks[0]["status"], "fail");
        assert_eq!(checks[1]["status"], "skipped");
        assert_eq!(checks[2]["status"], "skipped");
    });
}

#[test]
fn config_attributes_sources_and_redacts_the_api_key() {
    with_env(
        &[
            ("SLOTWISE_LLM_ENABLED", "true"),
            ("SLOTWISE_LLM_API_KEY", "sk-super-secret"),
            ("SLOTWISE_BOOKING_OPEN_TIME", "09:00"),
        ],
        || {
            let output = config::run();

            assert!(output
                .contains("- booking.open_time = 09:00 (source: env (SLOTWISE_BOOKING_OPEN_TIME))"));
            assert!(output.contains("- booking.close_time = 18:00 (source: default)"));
            assert!(output.contains("- llm.api_key = <redacted> (source: env (SLOTWISE_LLM_API_KEY))"));
            assert!(!output.contains("sk-super-secret"));
        },
    );
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "SLOTWISE_BOOKING_OPEN_TIME",
        "SLOTWISE_BOOKING_CLOSE_TIME",
        "SLOTWISE_BOOKING_WEEKDAYS",
        "SLOTWISE_BOOKING_SLOT_MINUTES",
        "SLOTWISE_BOOKING_TIMEZONE",
        "SLOTWISE_BOOKING_SUGGESTION_LIMIT",
        "SLOTWISE_BOOKING_SEARCH_HORIZON_DAYS",
        "SLOTWISE_LLM_ENABLED",
        "SLOTWISE_LLM_PROVIDER",
        "SLOTWISE_LLM_API_KEY",
        "SLOTWISE_LLM_BASE_URL",
        "SLOTWISE_LLM_MODEL",
        "SLOTWISE_LLM_TIMEOUT_SECS",
        "SLOTWISE_LLM_MAX_RETRIES",
        "SLOTWISE_CALENDAR_EVENTS_FILE",
        "SLOTWISE_LOGGING_LEVEL",
        "SLOTWISE_LOGGING_FORMAT",
        "SLOTWISE_LOG_LEVEL",
        "SLOTWISE_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
