use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use slotwise_agent::{AgentRuntime, HttpLlmClient};
use slotwise_core::availability::InMemoryCalendar;
use slotwise_core::config::{AppConfig, LoadOptions};
use slotwise_core::domain::{CalendarEvent, EventId, TimeWindow};

use super::CommandResult;

/// One chat turn: load config, hydrate the fixture calendar, run the agent,
/// print the reply. `--now` pins the reference instant for reproducible runs.
pub fn run(message: &str, now: Option<&str>, json_output: bool) -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure("chat", "config_validation", error.to_string(), 2)
        }
    };

    let now = match now {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(instant) => instant.with_timezone(&Utc),
            Err(error) => {
                return CommandResult::failure(
                    "chat",
                    "invalid_argument",
                    format!("--now must be RFC 3339 (e.g. 2025-03-04T09:00:00Z): {error}"),
                    3,
                )
            }
        },
        None => Utc::now(),
    };

    let calendar = match load_fixture_calendar(config.calendar.events_file.as_deref()) {
        Ok(calendar) => calendar,
        Err(error) => return CommandResult::failure("chat", "calendar_fixture", error, 4),
    };

    let rules = config.business_rules();
    let runtime = if config.llm.enabled {
        match HttpLlmClient::from_config(&config.llm) {
            Ok(client) => AgentRuntime::with_llm(rules, Box::new(client)),
            Err(error) => {
                return CommandResult::failure("chat", "llm_init", error.to_string(), 5)
            }
        }
    } else {
        AgentRuntime::new(rules)
    };

    let async_runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(async_runtime) => async_runtime,
        Err(error) => {
            return CommandResult::failure(
                "chat",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                6,
            )
        }
    };

    let reply = async_runtime.block_on(runtime.handle_message(message, now, &calendar));

    let output = if json_output {
        serde_json::to_string_pretty(&reply).unwrap_or_else(|error| {
            format!("{{\"error\":\"reply serialization failed: {error}\"}}")
        })
    } else {
        reply.text
    };

    CommandResult { exit_code: 0, output }
}

#[derive(Debug, Default, Deserialize)]
struct EventsFile {
    #[serde(default)]
    events: Vec<EventFixture>,
}

#[derive(Debug, Deserialize)]
struct EventFixture {
    start: String,
    end: String,
    title: String,
}

/// The fixture file is a TOML list of `[[events]]` with RFC 3339 instants.
/// No file configured means an empty calendar.
pub(crate) fn load_fixture_calendar(path: Option<&Path>) -> Result<InMemoryCalendar, String> {
    let Some(path) = path else {
        return Ok(InMemoryCalendar::new());
    };

    let raw = fs::read_to_string(path)
        .map_err(|error| format!("could not read events file `{}`: {error}", path.display()))?;
    let file: EventsFile = toml::from_str(&raw)
        .map_err(|error| format!("could not parse events file `{}`: {error}", path.display()))?;

    let mut events = Vec::with_capacity(file.events.len());
    for (index, fixture) in file.events.into_iter().enumerate() {
        let start = parse_instant(&fixture.start, index)?;
        let end = parse_instant(&fixture.end, index)?;
        let window = TimeWindow::new(start, end)
            .map_err(|error| format!("event {} has an invalid window: {error}", index + 1))?;
        events.push(CalendarEvent {
            id: EventId(format!("fixture-{}", index + 1)),
            window,
            title: fixture.title,
        });
    }
    Ok(InMemoryCalendar::with_events(events))
}

fn parse_instant(raw: &str, index: usize) -> Result<DateTime<Utc>, String> {
    DateTime::parse_from_rfc3339(raw)
        .map(|instant| instant.with_timezone(&Utc))
        .map_err(|error| format!("event {} has an invalid instant `{raw}`: {error}", index + 1))
}
