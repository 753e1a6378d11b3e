use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::WindowError;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventId(pub String);

/// Half-open interval of wall-clock time. The start always precedes the end;
/// values are only constructed through [`TimeWindow::new`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawWindow")]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if start >= end {
            return Err(WindowError::StartNotBeforeEnd { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn with_duration(start: DateTime<Utc>, duration: Duration) -> Result<Self, WindowError> {
        Self::new(start, start + duration)
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> Duration {
        self.end - self.start
    }

    /// Half-open overlap: windows that merely abut do not intersect.
    pub fn overlaps(&self, other: &TimeWindow) -> bool {
        self.start < other.end && other.start < self.end
    }
}

#[derive(Deserialize)]
struct RawWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TryFrom<RawWindow> for TimeWindow {
    type Error = WindowError;

    fn try_from(raw: RawWindow) -> Result<Self, Self::Error> {
        Self::new(raw.start, raw.end)
    }
}

/// An event already on the calendar. Owned by the provider; this core only
/// ever reads them.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CalendarEvent {
    pub id: EventId,
    pub window: TimeWindow,
    pub title: String,
}

/// One booking attempt, built per chat turn and discarded with the reply.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SlotRequest {
    pub requested_window: TimeWindow,
    pub raw_text: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerdictReason {
    NonWorkingDay,
    OutsideHours,
    Conflict,
    NoAvailability,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SlotVerdict {
    pub accepted: bool,
    pub reason: Option<VerdictReason>,
    pub alternatives: Vec<TimeWindow>,
}

impl SlotVerdict {
    pub fn accepted() -> Self {
        Self { accepted: true, reason: None, alternatives: Vec::new() }
    }

    pub fn rejected(reason: VerdictReason, alternatives: Vec<TimeWindow>) -> Self {
        Self { accepted: false, reason: Some(reason), alternatives }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::{TimeWindow, VerdictReason};
    use crate::errors::WindowError;

    fn window(start_hour: u32, end_hour: u32) -> TimeWindow {
        TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 3, 5, start_hour, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 5, end_hour, 0, 0).unwrap(),
        )
        .expect("test window")
    }

    #[test]
    fn rejects_inverted_window() {
        let start = Utc.with_ymd_and_hms(2025, 3, 5, 15, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2025, 3, 5, 14, 0, 0).unwrap();
        let error = TimeWindow::new(start, end).expect_err("inverted window should fail");
        assert_eq!(error, WindowError::StartNotBeforeEnd { start, end });
    }

    #[test]
    fn rejects_empty_window() {
        let instant = Utc.with_ymd_and_hms(2025, 3, 5, 15, 0, 0).unwrap();
        assert!(TimeWindow::new(instant, instant).is_err());
    }

    #[test]
    fn overlap_is_half_open() {
        assert!(window(14, 15).overlaps(&window(14, 15)));
        assert!(window(14, 15).overlaps(&window(14, 16)));
        assert!(window(13, 15).overlaps(&window(14, 16)));
    }

    #[test]
    fn abutting_windows_do_not_overlap() {
        assert!(!window(14, 15).overlaps(&window(15, 16)));
        assert!(!window(15, 16).overlaps(&window(14, 15)));
        assert!(!window(10, 11).overlaps(&window(12, 13)));
    }

    #[test]
    fn verdict_reason_serializes_snake_case() {
        let serialized = serde_json::to_string(&VerdictReason::NonWorkingDay).expect("serialize");
        assert_eq!(serialized, "\"non_working_day\"");
    }
}
