//! Turns rule-engine verdicts into user-facing text plus a machine-usable
//! summary. Pure rendering: no I/O, no side effects.

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use serde::Serialize;

use crate::availability::DayAvailability;
use crate::domain::{EventId, SlotRequest, TimeWindow, VerdictReason};
use crate::errors::ProviderError;
use crate::rules::BusinessRules;

const MAX_LISTED_SLOTS: usize = 5;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Reply {
    pub text: String,
    pub summary: ReplySummary,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReplySummary {
    Booked { event_id: EventId, title: String, window: TimeWindow },
    Rejected { reason: VerdictReason, requested: TimeWindow, alternatives: Vec<TimeWindow> },
    Availability { date: NaiveDate, slots: Vec<TimeWindow>, alternative_days: Vec<DayAvailability> },
    Clarification,
    CalendarUnavailable,
    Unsupported,
    Help,
}

pub fn booking_confirmed(
    rules: &BusinessRules,
    title: &str,
    window: &TimeWindow,
    event_id: &EventId,
) -> Reply {
    let text = format!(
        "Booked: {title} on {}. The event is on your calendar.",
        display_window(rules, window)
    );
    Reply {
        text,
        summary: ReplySummary::Booked {
            event_id: event_id.clone(),
            title: title.to_owned(),
            window: *window,
        },
    }
}

pub fn rejection(
    rules: &BusinessRules,
    request: &SlotRequest,
    reason: VerdictReason,
    alternatives: &[TimeWindow],
) -> Reply {
    let text = match reason {
        VerdictReason::NonWorkingDay => {
            let weekday = rules.local(request.requested_window.start()).weekday();
            let mut text = format!(
                "We don't take appointments on {}. Business days are {}.",
                weekday_name(weekday),
                weekdays_display(rules)
            );
            text.push_str(&alternatives_block(
                rules,
                alternatives,
                "Closest matches at the same time:",
            ));
            text
        }
        VerdictReason::OutsideHours => {
            let mut text = format!(
                "That time is outside business hours ({}).",
                hours_display(rules)
            );
            text.push_str(&alternatives_block(rules, alternatives, "Nearest openings:"));
            text
        }
        VerdictReason::Conflict => {
            let mut text =
                "That time overlaps an existing appointment.".to_owned();
            text.push_str(&alternatives_block(rules, alternatives, "Next free slots:"));
            text
        }
        VerdictReason::NoAvailability => format!(
            "That time overlaps an existing appointment, and I couldn't find a free {}-minute slot in the next {} days. Try a different week or a shorter appointment.",
            request.requested_window.duration().num_minutes(),
            rules.search_horizon_days
        ),
    };

    Reply {
        text,
        summary: ReplySummary::Rejected {
            reason,
            requested: request.requested_window,
            alternatives: alternatives.to_vec(),
        },
    }
}

pub fn availability(
    rules: &BusinessRules,
    date: NaiveDate,
    slots: Vec<TimeWindow>,
    alternative_days: Vec<DayAvailability>,
) -> Reply {
    let text = if !slots.is_empty() {
        format!(
            "Open slots on {}:\n{}",
            display_date(date),
            numbered_windows(rules, &slots)
        )
    } else if !alternative_days.is_empty() {
        let mut lines = vec![format!(
            "No open slots on {}. Days with availability:",
            display_date(date)
        )];
        for (index, day) in alternative_days.iter().enumerate() {
            let first = day
                .slots
                .first()
                .map(|slot| display_time(rules, slot.start()))
                .unwrap_or_default();
            lines.push(format!(
                "  {}. {} ({} open, first at {first})",
                index + 1,
                display_date(day.date),
                day.slots.len()
            ));
        }
        lines.join("\n")
    } else {
        format!(
            "No open slots on {}, and nothing free in the next {} days.",
            display_date(date),
            rules.search_horizon_days
        )
    };

    Reply { text, summary: ReplySummary::Availability { date, slots, alternative_days } }
}

pub fn clarification(prompt: impl Into<String>) -> Reply {
    Reply { text: prompt.into(), summary: ReplySummary::Clarification }
}

pub fn calendar_unavailable(error: &ProviderError) -> Reply {
    Reply { text: error.user_message().to_owned(), summary: ReplySummary::CalendarUnavailable }
}

/// The slot passed validation but the create call failed; the distinction
/// matters because nothing was booked.
pub fn booking_failed(rules: &BusinessRules, window: &TimeWindow) -> Reply {
    let text = format!(
        "The slot on {} was free when I checked, but creating the event failed. Nothing was booked; please try again shortly.",
        display_window(rules, window)
    );
    Reply { text, summary: ReplySummary::CalendarUnavailable }
}

pub fn cancellation_unsupported() -> Reply {
    Reply {
        text: "I can't cancel appointments yet. Please remove the event directly in your calendar."
            .to_owned(),
        summary: ReplySummary::Unsupported,
    }
}

pub fn help(rules: &BusinessRules) -> Reply {
    let text = format!(
        "I can book appointments and check availability.\n\
         Try:\n\
         \x20 - book an appointment tomorrow at 2 PM\n\
         \x20 - what's free next monday?\n\
         Business hours are {}, {}.",
        hours_display(rules),
        weekdays_display(rules)
    );
    Reply { text, summary: ReplySummary::Help }
}

fn alternatives_block(rules: &BusinessRules, alternatives: &[TimeWindow], intro: &str) -> String {
    if alternatives.is_empty() {
        return format!(
            "\nI couldn't find a nearby opening within the next {} days.",
            rules.search_horizon_days
        );
    }
    format!("\n{intro}\n{}", numbered_windows(rules, alternatives))
}

fn numbered_windows(rules: &BusinessRules, windows: &[TimeWindow]) -> String {
    let mut lines: Vec<String> = windows
        .iter()
        .take(MAX_LISTED_SLOTS)
        .enumerate()
        .map(|(index, window)| format!("  {}. {}", index + 1, display_window(rules, window)))
        .collect();
    if windows.len() > MAX_LISTED_SLOTS {
        lines.push(format!("  ...and {} more", windows.len() - MAX_LISTED_SLOTS));
    }
    lines.join("\n")
}

fn display_window(rules: &BusinessRules, window: &TimeWindow) -> String {
    format!(
        "{} from {} to {}",
        display_date(rules.local_date(window.start())),
        display_time(rules, window.start()),
        display_time(rules, window.end())
    )
}

fn display_date(date: NaiveDate) -> String {
    date.format("%A, %B %d, %Y").to_string()
}

fn display_time(rules: &BusinessRules, instant: DateTime<Utc>) -> String {
    rules.local(instant).format("%I:%M %p").to_string()
}

fn display_clock(time: NaiveTime) -> String {
    time.format("%I:%M %p").to_string()
}

fn hours_display(rules: &BusinessRules) -> String {
    format!("{} to {}", display_clock(rules.open_time), display_clock(rules.close_time))
}

fn weekdays_display(rules: &BusinessRules) -> String {
    let weekday_week = [Weekday::Mon, Weekday::Tue, Weekday::Wed, Weekday::Thu, Weekday::Fri];
    if rules.allowed_weekdays.len() == weekday_week.len()
        && weekday_week.iter().all(|day| rules.allowed_weekdays.contains(day))
    {
        return "Monday to Friday".to_owned();
    }
    rules
        .allowed_weekdays
        .iter()
        .map(|day| weekday_name(*day))
        .collect::<Vec<_>>()
        .join(", ")
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, NaiveDate, TimeZone, Utc};

    use super::{availability, booking_confirmed, help, rejection};
    use crate::availability::DayAvailability;
    use crate::domain::{EventId, SlotRequest, TimeWindow, VerdictReason};
    use crate::testing::default_rules;

    fn window(day: u32, hour: u32) -> TimeWindow {
        TimeWindow::with_duration(
            Utc.with_ymd_and_hms(2025, 3, day, hour, 0, 0).unwrap(),
            Duration::minutes(60),
        )
        .expect("window")
    }

    fn request(day: u32, hour: u32) -> SlotRequest {
        SlotRequest {
            requested_window: window(day, hour),
            raw_text: "book something".to_owned(),
        }
    }

    #[test]
    fn confirmation_names_the_slot_and_carries_the_event_id() {
        let reply = booking_confirmed(
            &default_rules(),
            "Intro call",
            &window(5, 14),
            &EventId("evt-7".to_owned()),
        );

        assert!(reply.text.contains("Wednesday, March 05, 2025"));
        assert!(reply.text.contains("02:00 PM"));
        let summary = serde_json::to_value(&reply.summary).expect("summary json");
        assert_eq!(summary["kind"], "booked");
        assert_eq!(summary["event_id"], "evt-7");
    }

    #[test]
    fn weekend_rejection_names_the_day_and_lists_alternatives() {
        let reply = rejection(
            &default_rules(),
            &request(8, 12),
            VerdictReason::NonWorkingDay,
            &[window(10, 12), window(11, 12)],
        );

        assert!(reply.text.contains("Saturday"));
        assert!(reply.text.contains("Monday to Friday"));
        assert!(reply.text.contains("1. Monday, March 10, 2025"));
        let summary = serde_json::to_value(&reply.summary).expect("summary json");
        assert_eq!(summary["kind"], "rejected");
        assert_eq!(summary["reason"], "non_working_day");
    }

    #[test]
    fn outside_hours_rejection_states_the_hours() {
        let reply = rejection(
            &default_rules(),
            &request(5, 8),
            VerdictReason::OutsideHours,
            &[window(5, 10)],
        );

        assert!(reply.text.contains("10:00 AM to 06:00 PM"));
        assert!(reply.text.contains("1. Wednesday, March 05, 2025 from 10:00 AM"));
    }

    #[test]
    fn exhausted_search_explains_the_horizon() {
        let reply = rejection(&default_rules(), &request(5, 14), VerdictReason::NoAvailability, &[]);
        assert!(reply.text.contains("next 14 days"));
    }

    #[test]
    fn availability_listing_truncates_long_days() {
        let slots: Vec<_> = (10..18).map(|hour| window(5, hour)).collect();
        let reply = availability(
            &default_rules(),
            NaiveDate::from_ymd_opt(2025, 3, 5).expect("date"),
            slots,
            Vec::new(),
        );

        assert!(reply.text.contains("...and 3 more"));
    }

    #[test]
    fn empty_day_offers_other_days() {
        let reply = availability(
            &default_rules(),
            NaiveDate::from_ymd_opt(2025, 3, 5).expect("date"),
            Vec::new(),
            vec![DayAvailability {
                date: NaiveDate::from_ymd_opt(2025, 3, 6).expect("date"),
                slots: vec![window(6, 10)],
            }],
        );

        assert!(reply.text.contains("No open slots on Wednesday, March 05, 2025"));
        assert!(reply.text.contains("Thursday, March 06, 2025 (1 open, first at 10:00 AM)"));
    }

    #[test]
    fn help_states_the_configured_rules() {
        let reply = help(&default_rules());
        assert!(reply.text.contains("10:00 AM to 06:00 PM"));
        assert!(reply.text.contains("Monday to Friday"));
    }
}
