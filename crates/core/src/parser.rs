//! Natural-language date/time parsing for booking requests.
//!
//! Resolves phrases like `tomorrow at 2pm`, `next monday morning`, or
//! `2025-03-05 14:00` against a reference instant in the configured zone.
//! Fixed defaults, chosen once and documented here rather than guessed per
//! request: `morning` maps to the opening time, `noon` to 12:00,
//! `afternoon` to 14:00, `evening` to 17:00; a bare hour after `at` is read
//! as 24-hour clock; a date with no time of day defaults to the opening
//! time and is flagged so callers can offer the day's slots instead.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, NaiveTime, Utc, Weekday};
use regex::Regex;

use crate::domain::TimeWindow;
use crate::errors::ParseError;
use crate::rules::BusinessRules;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ParsedSlot {
    pub window: TimeWindow,
    /// False when the text named a day but no time of day. The window then
    /// starts at the opening time, and callers should offer the day's open
    /// slots rather than silently booking the default hour.
    pub explicit_time: bool,
}

const MONTHS: &str = "jan(?:uary)?|feb(?:ruary)?|mar(?:ch)?|apr(?:il)?|may|june?|july?|aug(?:ust)?|sep(?:t(?:ember)?)?|oct(?:ober)?|nov(?:ember)?|dec(?:ember)?";

struct Patterns {
    iso_date: Regex,
    in_n_days: Regex,
    weekday: Regex,
    month_day: Regex,
    day_month: Regex,
    time_hm: Regex,
    time_h_meridiem: Regex,
    at_hour: Regex,
    duration: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        iso_date: compile(r"\b(\d{4})-(\d{1,2})-(\d{1,2})\b"),
        in_n_days: compile(r"\bin\s+(\d{1,3})\s+days?\b"),
        weekday: compile(
            r"\b(?:(?:next|this)\s+)?(monday|tuesday|wednesday|thursday|friday|saturday|sunday|tues|thurs|mon|tue|wed|thu|fri|sat|sun)\b",
        ),
        month_day: compile(&format!(r"\b({MONTHS})\s+(\d{{1,2}})(?:st|nd|rd|th)?\b")),
        day_month: compile(&format!(r"\b(\d{{1,2}})(?:st|nd|rd|th)?\s+({MONTHS})\b")),
        time_hm: compile(r"\b(\d{1,2}):(\d{2})\s*(am|pm)?\b"),
        time_h_meridiem: compile(r"\b(\d{1,2})\s*(am|pm)\b"),
        at_hour: compile(r"\bat\s+(\d{1,2})\b"),
        duration: compile(r"\b(\d{1,3})\s*(minutes?|mins?|hours?|hrs?)\b"),
    })
}

fn compile(pattern: &str) -> Regex {
    // The pattern set is fixed at compile time; a failure here is a typo in
    // this file, caught by the unit tests.
    Regex::new(pattern).unwrap_or_else(|error| panic!("invalid parser pattern: {error}"))
}

/// Resolves `text` to a concrete window against `reference_now`, read in the
/// configured time zone. Fails only when neither a date nor a time can be
/// recognized; the caller treats that as "ask the user", not a hard error.
pub fn parse(
    text: &str,
    reference_now: DateTime<Utc>,
    rules: &BusinessRules,
) -> Result<ParsedSlot, ParseError> {
    let normalized = text.to_lowercase();
    let today = rules.local_date(reference_now);

    let date = resolve_date(&normalized, today)?;
    let time = resolve_time(&normalized, rules);
    if date.is_none() && time.is_none() {
        return Err(ParseError::Unrecognized(text.trim().to_owned()));
    }

    let date = date.unwrap_or(today);
    let (time, explicit_time) = match time {
        Some(time) => (time, true),
        None => (rules.open_time, false),
    };
    let duration = resolve_duration(&normalized).unwrap_or(rules.slot_duration);

    let start = rules
        .resolve_local(date, time)
        .ok_or_else(|| ParseError::InvalidDate(text.trim().to_owned()))?;
    let window = TimeWindow::with_duration(start, duration)
        .map_err(|_| ParseError::Unrecognized(text.trim().to_owned()))?;

    Ok(ParsedSlot { window, explicit_time })
}

fn resolve_date(text: &str, today: NaiveDate) -> Result<Option<NaiveDate>, ParseError> {
    let p = patterns();

    if let Some(caps) = p.iso_date.captures(text) {
        let date = caps[1]
            .parse::<i32>()
            .ok()
            .zip(caps[2].parse::<u32>().ok())
            .zip(caps[3].parse::<u32>().ok())
            .and_then(|((year, month), day)| NaiveDate::from_ymd_opt(year, month, day));
        return match date {
            Some(date) => Ok(Some(date)),
            None => Err(ParseError::InvalidDate(caps[0].to_owned())),
        };
    }

    if text.contains("day after tomorrow") || text.contains("overmorrow") {
        return Ok(today.checked_add_days(Days::new(2)));
    }
    if text.contains("tomorrow") {
        return Ok(today.checked_add_days(Days::new(1)));
    }
    if text.contains("today") || text.contains("tonight") {
        return Ok(Some(today));
    }

    if let Some(caps) = p.in_n_days.captures(text) {
        if let Ok(days) = caps[1].parse::<u64>() {
            return Ok(today.checked_add_days(Days::new(days)));
        }
    }

    if let Some(caps) = p.weekday.captures(text) {
        if let Some(target) = weekday_from_name(&caps[1]) {
            return Ok(upcoming_weekday(today, target));
        }
    }

    if let Some(caps) = p.month_day.captures(text) {
        if let Some(month) = month_number(&caps[1]) {
            if let Ok(day) = caps[2].parse::<u32>() {
                return calendar_date(today, month, day, &caps[0]).map(Some);
            }
        }
    }
    if let Some(caps) = p.day_month.captures(text) {
        if let Some(month) = month_number(&caps[2]) {
            if let Ok(day) = caps[1].parse::<u32>() {
                return calendar_date(today, month, day, &caps[0]).map(Some);
            }
        }
    }

    Ok(None)
}

/// The next occurrence of `target`, strictly after today.
fn upcoming_weekday(today: NaiveDate, target: Weekday) -> Option<NaiveDate> {
    let ahead = (i64::from(target.num_days_from_monday())
        - i64::from(today.weekday().num_days_from_monday()))
    .rem_euclid(7);
    let days = if ahead == 0 { 7 } else { ahead };
    today.checked_add_days(Days::new(days.unsigned_abs()))
}

/// Month/day in the current year, rolled to the next year once the date has
/// already passed.
fn calendar_date(
    today: NaiveDate,
    month: u32,
    day: u32,
    matched: &str,
) -> Result<NaiveDate, ParseError> {
    for year in [today.year(), today.year() + 1] {
        if let Some(date) = NaiveDate::from_ymd_opt(year, month, day) {
            if date >= today {
                return Ok(date);
            }
        }
    }
    Err(ParseError::InvalidDate(matched.to_owned()))
}

fn weekday_from_name(name: &str) -> Option<Weekday> {
    match name {
        "monday" | "mon" => Some(Weekday::Mon),
        "tuesday" | "tues" | "tue" => Some(Weekday::Tue),
        "wednesday" | "wed" => Some(Weekday::Wed),
        "thursday" | "thurs" | "thu" => Some(Weekday::Thu),
        "friday" | "fri" => Some(Weekday::Fri),
        "saturday" | "sat" => Some(Weekday::Sat),
        "sunday" | "sun" => Some(Weekday::Sun),
        _ => None,
    }
}

fn month_number(name: &str) -> Option<u32> {
    let prefix = name.get(..3)?;
    match prefix {
        "jan" => Some(1),
        "feb" => Some(2),
        "mar" => Some(3),
        "apr" => Some(4),
        "may" => Some(5),
        "jun" => Some(6),
        "jul" => Some(7),
        "aug" => Some(8),
        "sep" => Some(9),
        "oct" => Some(10),
        "nov" => Some(11),
        "dec" => Some(12),
        _ => None,
    }
}

fn resolve_time(text: &str, rules: &BusinessRules) -> Option<NaiveTime> {
    numeric_hm(text)
        .or_else(|| numeric_hour_meridiem(text))
        .or_else(|| bare_at_hour(text))
        .or_else(|| named_time(text, rules))
}

fn numeric_hm(text: &str) -> Option<NaiveTime> {
    let caps = patterns().time_hm.captures(text)?;
    let hour = caps[1].parse::<u32>().ok()?;
    let minute = caps[2].parse::<u32>().ok()?;
    let hour = match caps.get(3) {
        Some(meridiem) => to_24h(hour, meridiem.as_str())?,
        None if hour < 24 => hour,
        None => return None,
    };
    NaiveTime::from_hms_opt(hour, minute, 0)
}

fn numeric_hour_meridiem(text: &str) -> Option<NaiveTime> {
    let caps = patterns().time_h_meridiem.captures(text)?;
    let hour = to_24h(caps[1].parse::<u32>().ok()?, &caps[2])?;
    NaiveTime::from_hms_opt(hour, 0, 0)
}

/// Bare `at N` reads as 24-hour clock, matching the upstream intent format.
fn bare_at_hour(text: &str) -> Option<NaiveTime> {
    let caps = patterns().at_hour.captures(text)?;
    let hour = caps[1].parse::<u32>().ok()?;
    NaiveTime::from_hms_opt(hour, 0, 0)
}

fn named_time(text: &str, rules: &BusinessRules) -> Option<NaiveTime> {
    if text.contains("noon") || text.contains("midday") {
        return NaiveTime::from_hms_opt(12, 0, 0);
    }
    if text.contains("morning") {
        return Some(rules.open_time);
    }
    if text.contains("afternoon") {
        return NaiveTime::from_hms_opt(14, 0, 0);
    }
    if text.contains("evening") {
        return NaiveTime::from_hms_opt(17, 0, 0);
    }
    None
}

fn to_24h(hour: u32, meridiem: &str) -> Option<u32> {
    if !(1..=12).contains(&hour) {
        return None;
    }
    match (meridiem, hour) {
        ("am", 12) => Some(0),
        ("am", hour) => Some(hour),
        ("pm", 12) => Some(12),
        ("pm", hour) => Some(hour + 12),
        _ => None,
    }
}

fn resolve_duration(text: &str) -> Option<Duration> {
    let caps = patterns().duration.captures(text)?;
    let amount = caps[1].parse::<i64>().ok()?;
    let minutes = if caps[2].starts_with('h') { amount * 60 } else { amount };
    (5..=480).contains(&minutes).then(|| Duration::minutes(minutes))
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone, Utc};

    use super::parse;
    use crate::errors::ParseError;
    use crate::testing::default_rules;

    // Tuesday 2025-03-04, 09:00 UTC.
    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap()
    }

    #[test]
    fn resolves_common_phrases() {
        struct Case {
            text: &'static str,
            start: (i32, u32, u32, u32, u32),
            minutes: i64,
        }

        let cases = vec![
            Case { text: "tomorrow at 2pm", start: (2025, 3, 5, 14, 0), minutes: 60 },
            Case { text: "book me tomorrow at 2 pm", start: (2025, 3, 5, 14, 0), minutes: 60 },
            Case { text: "tomorrow 14:30", start: (2025, 3, 5, 14, 30), minutes: 60 },
            Case { text: "2025-03-05 14:00", start: (2025, 3, 5, 14, 0), minutes: 60 },
            Case { text: "day after tomorrow at 9am", start: (2025, 3, 6, 9, 0), minutes: 60 },
            Case { text: "today at 16:00", start: (2025, 3, 4, 16, 0), minutes: 60 },
            Case { text: "this saturday at noon", start: (2025, 3, 8, 12, 0), minutes: 60 },
            Case { text: "next monday morning", start: (2025, 3, 10, 10, 0), minutes: 60 },
            Case { text: "friday afternoon", start: (2025, 3, 7, 14, 0), minutes: 60 },
            Case { text: "wednesday evening", start: (2025, 3, 5, 17, 0), minutes: 60 },
            Case { text: "in 3 days at 11:00", start: (2025, 3, 7, 11, 0), minutes: 60 },
            Case { text: "march 7 at 10am", start: (2025, 3, 7, 10, 0), minutes: 60 },
            Case { text: "7 march at 10am", start: (2025, 3, 7, 10, 0), minutes: 60 },
            Case { text: "january 2 at 10am", start: (2026, 1, 2, 10, 0), minutes: 60 },
            Case { text: "at 15:00", start: (2025, 3, 4, 15, 0), minutes: 60 },
            Case { text: "tomorrow at 8am for 30 minutes", start: (2025, 3, 5, 8, 0), minutes: 30 },
            Case { text: "tomorrow at 3pm for 2 hours", start: (2025, 3, 5, 15, 0), minutes: 120 },
            Case { text: "12pm tomorrow", start: (2025, 3, 5, 12, 0), minutes: 60 },
            Case { text: "12am tomorrow", start: (2025, 3, 5, 0, 0), minutes: 60 },
            Case { text: "meet at 14", start: (2025, 3, 4, 14, 0), minutes: 60 },
        ];

        let rules = default_rules();
        for case in cases {
            let parsed = parse(case.text, now(), &rules)
                .unwrap_or_else(|error| panic!("`{}` should parse: {error}", case.text));
            let (year, month, day, hour, minute) = case.start;
            let expected = Utc.with_ymd_and_hms(year, month, day, hour, minute, 0).unwrap();
            assert_eq!(parsed.window.start(), expected, "start of `{}`", case.text);
            assert_eq!(
                parsed.window.duration(),
                Duration::minutes(case.minutes),
                "duration of `{}`",
                case.text
            );
            assert!(parsed.explicit_time, "`{}` names a time", case.text);
        }
    }

    #[test]
    fn bare_day_defaults_to_opening_time_without_claiming_a_time() {
        let parsed = parse("tomorrow", now(), &default_rules()).expect("parse");
        assert_eq!(parsed.window.start(), Utc.with_ymd_and_hms(2025, 3, 5, 10, 0, 0).unwrap());
        assert!(!parsed.explicit_time);
    }

    #[test]
    fn unrecognizable_text_is_a_parse_error() {
        let error = parse("can you help me?", now(), &default_rules())
            .expect_err("no date or time present");
        assert!(matches!(error, ParseError::Unrecognized(_)));
    }

    #[test]
    fn impossible_dates_are_rejected() {
        let error =
            parse("2025-02-30 at 10:00", now(), &default_rules()).expect_err("invalid date");
        assert_eq!(error, ParseError::InvalidDate("2025-02-30".to_owned()));
    }

    #[test]
    fn weekday_mentions_always_land_in_the_future() {
        // Asking for "tuesday" on a Tuesday means next week.
        let parsed = parse("tuesday at 11am", now(), &default_rules()).expect("parse");
        assert_eq!(parsed.window.start(), Utc.with_ymd_and_hms(2025, 3, 11, 11, 0, 0).unwrap());
    }

    #[test]
    fn out_of_range_durations_fall_back_to_the_slot_length() {
        let parsed = parse("tomorrow at 2pm for 900 minutes", now(), &default_rules())
            .expect("parse");
        assert_eq!(parsed.window.duration(), Duration::minutes(60));
    }
}
