use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;

use crate::domain::{CalendarEvent, EventId, TimeWindow};
use crate::errors::ProviderError;
use crate::rules::BusinessRules;

/// The external calendar backend, reduced to the two calls this core needs.
/// Authentication and transport concerns live entirely behind this trait.
#[async_trait]
pub trait CalendarProvider: Send + Sync {
    /// Events overlapping the window, ordered by start time.
    async fn list_events(&self, window: &TimeWindow) -> Result<Vec<CalendarEvent>, ProviderError>;

    async fn create_event(
        &self,
        window: &TimeWindow,
        title: &str,
    ) -> Result<EventId, ProviderError>;
}

/// One day of bookable slots, used for availability listings and
/// alternative-day suggestions.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DayAvailability {
    pub date: NaiveDate,
    pub slots: Vec<TimeWindow>,
}

/// Free/busy queries over the provider, constrained by the business rules.
pub struct AvailabilityChecker {
    rules: BusinessRules,
}

impl AvailabilityChecker {
    pub fn new(rules: BusinessRules) -> Self {
        Self { rules }
    }

    /// The day's slot grid minus anything already booked; closed days have no
    /// slots, and slots that have already begun are not offered.
    pub async fn free_slots(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
        provider: &dyn CalendarProvider,
    ) -> Result<Vec<TimeWindow>, ProviderError> {
        if !self.rules.is_working_day(date.weekday()) {
            return Ok(Vec::new());
        }

        let slots = self.rules.day_slots(date, self.rules.slot_duration);
        let Some(day_span) = slots
            .first()
            .zip(slots.last())
            .and_then(|(first, last)| TimeWindow::new(first.start(), last.end()).ok())
        else {
            return Ok(Vec::new());
        };

        let events = provider.list_events(&day_span).await?;
        Ok(slots
            .into_iter()
            .filter(|slot| {
                slot.start() > now && !events.iter().any(|event| event.window.overlaps(slot))
            })
            .collect())
    }

    /// Working days strictly after `after`, bounded by the search horizon.
    pub fn next_open_days(&self, after: NaiveDate, limit: usize) -> Vec<NaiveDate> {
        let mut days = Vec::new();
        let mut date = after;
        for _ in 0..self.rules.search_horizon_days {
            let Some(next) = date.succ_opt() else { break };
            date = next;
            if self.rules.is_working_day(date.weekday()) {
                days.push(date);
                if days.len() == limit {
                    break;
                }
            }
        }
        days
    }

    /// Upcoming days that still have at least one free slot, for when the
    /// requested day is full or closed.
    pub async fn alternative_days(
        &self,
        after: NaiveDate,
        now: DateTime<Utc>,
        provider: &dyn CalendarProvider,
    ) -> Result<Vec<DayAvailability>, ProviderError> {
        let horizon = usize::try_from(self.rules.search_horizon_days).unwrap_or(0);
        let mut alternatives = Vec::new();
        for date in self.next_open_days(after, horizon) {
            let slots = self.free_slots(date, now, provider).await?;
            if !slots.is_empty() {
                alternatives.push(DayAvailability { date, slots });
                if alternatives.len() == self.rules.suggestion_limit {
                    break;
                }
            }
        }
        Ok(alternatives)
    }
}

/// Deterministic provider backing tests and the CLI fixture path. Events live
/// behind a mutex; ids are handed out sequentially.
#[derive(Debug, Default)]
pub struct InMemoryCalendar {
    events: Mutex<Vec<CalendarEvent>>,
    next_id: AtomicU64,
}

impl InMemoryCalendar {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_events(events: Vec<CalendarEvent>) -> Self {
        Self { events: Mutex::new(events), next_id: AtomicU64::new(0) }
    }

    pub fn snapshot(&self) -> Vec<CalendarEvent> {
        self.events.lock().map(|events| events.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl CalendarProvider for InMemoryCalendar {
    async fn list_events(&self, window: &TimeWindow) -> Result<Vec<CalendarEvent>, ProviderError> {
        let events = self
            .events
            .lock()
            .map_err(|_| ProviderError::Unavailable("event store poisoned".to_owned()))?;
        let mut hits: Vec<CalendarEvent> =
            events.iter().filter(|event| event.window.overlaps(window)).cloned().collect();
        hits.sort_by_key(|event| event.window.start());
        Ok(hits)
    }

    async fn create_event(
        &self,
        window: &TimeWindow,
        title: &str,
    ) -> Result<EventId, ProviderError> {
        let mut events = self
            .events
            .lock()
            .map_err(|_| ProviderError::Unavailable("event store poisoned".to_owned()))?;
        let id = EventId(format!("evt-{}", self.next_id.fetch_add(1, Ordering::Relaxed) + 1));
        events.push(CalendarEvent {
            id: id.clone(),
            window: *window,
            title: title.to_owned(),
        });
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, TimeZone, Utc};

    use super::{AvailabilityChecker, CalendarProvider, InMemoryCalendar};
    use crate::domain::{CalendarEvent, EventId, TimeWindow};
    use crate::testing::default_rules;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 3, day).expect("date")
    }

    fn now() -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 4, 9, 0, 0).unwrap()
    }

    fn event(day: u32, start_hour: u32, end_hour: u32) -> CalendarEvent {
        CalendarEvent {
            id: EventId(format!("fixture-{day}-{start_hour}")),
            window: TimeWindow::new(
                Utc.with_ymd_and_hms(2025, 3, day, start_hour, 0, 0).unwrap(),
                Utc.with_ymd_and_hms(2025, 3, day, end_hour, 0, 0).unwrap(),
            )
            .expect("event window"),
            title: "Busy".to_owned(),
        }
    }

    #[tokio::test]
    async fn free_slots_drop_booked_grid_entries() {
        let checker = AvailabilityChecker::new(default_rules());
        let calendar = InMemoryCalendar::with_events(vec![event(5, 14, 15)]);

        let slots = checker.free_slots(date(5), now(), &calendar).await.expect("free slots");

        assert_eq!(slots.len(), 7);
        assert!(slots
            .iter()
            .all(|slot| slot.start() != Utc.with_ymd_and_hms(2025, 3, 5, 14, 0, 0).unwrap()));
    }

    #[tokio::test]
    async fn closed_days_have_no_slots() {
        let checker = AvailabilityChecker::new(default_rules());
        let calendar = InMemoryCalendar::new();

        // 2025-03-08 is a Saturday.
        let slots = checker.free_slots(date(8), now(), &calendar).await.expect("free slots");
        assert!(slots.is_empty());
    }

    #[tokio::test]
    async fn slots_already_started_are_not_offered() {
        let checker = AvailabilityChecker::new(default_rules());
        let calendar = InMemoryCalendar::new();
        let midday = Utc.with_ymd_and_hms(2025, 3, 5, 13, 30, 0).unwrap();

        let slots = checker.free_slots(date(5), midday, &calendar).await.expect("free slots");

        assert_eq!(slots.len(), 4);
        assert!(slots.iter().all(|slot| slot.start() > midday));
    }

    #[test]
    fn next_open_days_skip_the_weekend() {
        let checker = AvailabilityChecker::new(default_rules());

        // Friday 2025-03-07; the next three working days cross a weekend.
        let days = checker.next_open_days(date(7), 3);
        assert_eq!(days, vec![date(10), date(11), date(12)]);
    }

    #[tokio::test]
    async fn alternative_days_skip_fully_booked_days() {
        let checker = AvailabilityChecker::new(default_rules());
        let calendar = InMemoryCalendar::with_events(vec![event(5, 10, 18)]);

        let days = checker.alternative_days(date(4), now(), &calendar).await.expect("days");

        assert_eq!(days.len(), 3);
        assert_eq!(days[0].date, date(6));
        assert!(!days[0].slots.is_empty());
    }

    #[tokio::test]
    async fn in_memory_listing_is_ordered_and_filtered() {
        let calendar =
            InMemoryCalendar::with_events(vec![event(6, 12, 13), event(5, 14, 15), event(5, 10, 11)]);
        let query = TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 3, 5, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 6, 0, 0, 0).unwrap(),
        )
        .expect("query window");

        let events = calendar.list_events(&query).await.expect("list");

        assert_eq!(events.len(), 2);
        assert!(events[0].window.start() < events[1].window.start());
    }

    #[tokio::test]
    async fn created_events_become_visible_with_fresh_ids() {
        let calendar = InMemoryCalendar::new();
        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 3, 5, 14, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 3, 5, 15, 0, 0).unwrap(),
        )
        .expect("window");

        let id = calendar.create_event(&window, "Intro call").await.expect("create");
        assert_eq!(id.0, "evt-1");

        let listed = calendar.list_events(&window).await.expect("list");
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].title, "Intro call");
    }
}
