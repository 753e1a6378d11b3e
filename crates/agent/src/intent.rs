use serde::Deserialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Intent {
    BookAppointment,
    CheckAvailability,
    CancelAppointment,
    General,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confidence {
    High,
    Medium,
    Low,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExtractedIntent {
    pub intent: Intent,
    pub date_text: Option<String>,
    pub time_text: Option<String>,
    pub duration_minutes: Option<i64>,
    pub title: Option<String>,
    pub confidence: Confidence,
}

impl ExtractedIntent {
    /// The text handed to the date/time parser: the model's normalized
    /// fields when present, otherwise the raw message.
    pub fn schedule_phrase(&self, raw_text: &str) -> String {
        match (&self.date_text, &self.time_text) {
            (Some(date), Some(time)) => format!("{date} {time}"),
            (Some(date), None) => date.clone(),
            (None, Some(time)) => time.clone(),
            (None, None) => raw_text.to_owned(),
        }
    }
}

/// Pulls the first JSON object out of a model reply that may carry prose
/// around it.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end >= start).then(|| &text[start..=end])
}

/// Decodes a model reply into an intent. Any shape problem yields `None` so
/// the caller can fall back to keyword extraction.
pub fn decode_llm_intent(raw_response: &str) -> Option<ExtractedIntent> {
    let block = extract_json_block(raw_response)?;
    let raw: RawIntent = serde_json::from_str(block).ok()?;

    let intent = match raw.intent?.as_str() {
        "book_appointment" => Intent::BookAppointment,
        "check_availability" => Intent::CheckAvailability,
        "cancel_appointment" => Intent::CancelAppointment,
        _ => Intent::General,
    };
    let confidence = match raw.confidence.as_deref() {
        Some("high") => Confidence::High,
        Some("medium") => Confidence::Medium,
        _ => Confidence::Low,
    };

    Some(ExtractedIntent {
        intent,
        date_text: clean_field(raw.date),
        time_text: clean_field(raw.time),
        duration_minutes: raw.duration_minutes,
        title: clean_field(raw.appointment_type),
        confidence,
    })
}

fn clean_field(value: Option<String>) -> Option<String> {
    value.map(|value| value.trim().to_owned()).filter(|value| !value.is_empty() && value != "null")
}

#[derive(Deserialize)]
struct RawIntent {
    intent: Option<String>,
    date: Option<String>,
    time: Option<String>,
    duration_minutes: Option<i64>,
    appointment_type: Option<String>,
    confidence: Option<String>,
}

/// Deterministic keyword extraction, used whenever the model is absent or
/// unusable. Coarse on purpose: the date/time parser works on the raw text,
/// so this only has to pick the intent.
#[derive(Clone, Debug, Default)]
pub struct KeywordExtractor;

impl KeywordExtractor {
    pub fn new() -> Self {
        Self
    }

    pub fn extract(&self, text: &str) -> ExtractedIntent {
        let normalized = text.to_lowercase();

        let intent = if contains_any(&normalized, &["cancel", "delete", "remove", "call off"]) {
            Intent::CancelAppointment
        } else if contains_any(&normalized, &["book", "schedule", "appointment", "reserve", "set up"])
        {
            Intent::BookAppointment
        } else if contains_any(
            &normalized,
            &["available", "availability", "free", "slots", "open", "check", "show"],
        ) {
            Intent::CheckAvailability
        } else {
            Intent::General
        };

        ExtractedIntent {
            intent,
            date_text: None,
            time_text: None,
            duration_minutes: None,
            title: detect_title(&normalized),
            confidence: Confidence::Low,
        }
    }
}

fn contains_any(text: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| text.contains(needle))
}

fn detect_title(normalized: &str) -> Option<String> {
    if normalized.contains("meeting") {
        Some("Meeting".to_owned())
    } else if normalized.contains("interview") {
        Some("Interview".to_owned())
    } else if normalized.contains("call") {
        Some("Call".to_owned())
    } else if normalized.contains("demo") {
        Some("Demo".to_owned())
    } else {
        None
    }
}
