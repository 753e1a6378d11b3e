//! Prompt construction for intent extraction. The model only ever sees the
//! extraction task; policy and validation stay in the core.

use chrono::{DateTime, Days, Utc};

use slotwise_core::rules::BusinessRules;

pub fn system_prompt() -> &'static str {
    "You are a professional appointment assistant. You help users schedule \
     appointments, check calendar availability, and get clear, efficient \
     answers. You extract structured data; you never decide whether a slot \
     is legal or free."
}

/// The extraction prompt carries current-date context so the model can
/// normalize relative phrases to ISO dates itself.
pub fn intent_prompt(user_message: &str, now: DateTime<Utc>, rules: &BusinessRules) -> String {
    let today = rules.local(now).date_naive();
    let tomorrow = today.checked_add_days(Days::new(1)).unwrap_or(today);
    let day_after = today.checked_add_days(Days::new(2)).unwrap_or(today);

    format!(
        r#"Extract appointment information from: "{user_message}"

CURRENT CONTEXT:
- Today is {today} ({weekday})
- Tomorrow is {tomorrow}
- Day after tomorrow is {day_after}

BUSINESS RULES:
- Working hours: {open} to {close}
- Appointments are only taken on working days

Convert ALL date expressions to YYYY-MM-DD and times to 24-hour HH:MM.

Examples:
- "tomorrow" -> "{tomorrow}"
- "5 july 2025" -> "2025-07-05"
- "next monday" -> calculate the actual date

Return ONLY this JSON, nothing else:
{{
    "intent": "book_appointment|check_availability|cancel_appointment|general_query",
    "date": "YYYY-MM-DD or null",
    "time": "HH:MM or null",
    "duration_minutes": 60,
    "appointment_type": "meeting|appointment|etc or null",
    "confidence": "high|medium|low"
}}"#,
        weekday = today.format("%A"),
        open = rules.open_time.format("%H:%M"),
        close = rules.close_time.format("%H:%M"),
    )
}
