//! Shared fixtures for unit tests.

use chrono::{Duration, NaiveTime, Weekday};
use chrono_tz::Tz;

use crate::rules::BusinessRules;

/// 10:00-18:00, Monday to Friday, one-hour slots in UTC; the stock
/// configuration the scenario tests are written against.
pub(crate) fn default_rules() -> BusinessRules {
    BusinessRules {
        open_time: NaiveTime::from_hms_opt(10, 0, 0).expect("open time"),
        close_time: NaiveTime::from_hms_opt(18, 0, 0).expect("close time"),
        allowed_weekdays: vec![
            Weekday::Mon,
            Weekday::Tue,
            Weekday::Wed,
            Weekday::Thu,
            Weekday::Fri,
        ],
        slot_duration: Duration::minutes(60),
        timezone: Tz::UTC,
        suggestion_limit: 3,
        search_horizon_days: 14,
    }
}
