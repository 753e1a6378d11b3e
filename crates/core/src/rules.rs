use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveTime, TimeZone, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use tracing::debug;

use crate::availability::CalendarProvider;
use crate::config::BookingConfig;
use crate::domain::{SlotVerdict, TimeWindow, VerdictReason};
use crate::errors::ProviderError;

/// Immutable booking constraints, built once from configuration and passed
/// into every evaluation. Never a process-wide singleton.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusinessRules {
    pub open_time: NaiveTime,
    pub close_time: NaiveTime,
    pub allowed_weekdays: Vec<Weekday>,
    pub slot_duration: Duration,
    pub timezone: Tz,
    pub suggestion_limit: usize,
    pub search_horizon_days: i64,
}

impl From<&BookingConfig> for BusinessRules {
    fn from(config: &BookingConfig) -> Self {
        Self {
            open_time: config.open_time,
            close_time: config.close_time,
            allowed_weekdays: config.weekdays.clone(),
            slot_duration: Duration::minutes(i64::from(config.slot_minutes)),
            timezone: config.timezone,
            suggestion_limit: config.suggestion_limit,
            search_horizon_days: config.search_horizon_days,
        }
    }
}

impl BusinessRules {
    pub fn is_working_day(&self, day: Weekday) -> bool {
        self.allowed_weekdays.contains(&day)
    }

    pub fn local(&self, instant: DateTime<Utc>) -> DateTime<Tz> {
        instant.with_timezone(&self.timezone)
    }

    pub fn local_date(&self, instant: DateTime<Utc>) -> NaiveDate {
        self.local(instant).date_naive()
    }

    /// Resolves a local wall-clock reading to an instant. Returns `None` for
    /// readings that do not exist in the configured zone (DST gaps).
    pub fn resolve_local(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.timezone
            .from_local_datetime(&date.and_time(time))
            .earliest()
            .map(|stamp| stamp.with_timezone(&Utc))
    }

    /// The day's slot grid: candidate windows of `duration`, anchored at
    /// `open_time` and stepped by `slot_duration`, whose end still fits
    /// before `close_time`.
    pub fn day_slots(&self, date: NaiveDate, duration: Duration) -> Vec<TimeWindow> {
        let open = minutes_from_midnight(self.open_time);
        let close = minutes_from_midnight(self.close_time);
        let length = duration.num_minutes();
        let step = self.slot_duration.num_minutes().max(1);

        let mut slots = Vec::new();
        let mut cursor = open;
        while cursor + length <= close {
            if let Some(window) = self.grid_window(date, cursor, length) {
                slots.push(window);
            }
            cursor += step;
        }
        slots
    }

    fn grid_window(&self, date: NaiveDate, start_minute: i64, length: i64) -> Option<TimeWindow> {
        let start_time = time_from_minutes(start_minute)?;
        let start = self.resolve_local(date, start_time)?;
        TimeWindow::with_duration(start, Duration::minutes(length)).ok()
    }

    fn latest_start_minute(&self, duration: Duration) -> Option<i64> {
        let open = minutes_from_midnight(self.open_time);
        let close = minutes_from_midnight(self.close_time);
        let latest = close - duration.num_minutes();
        (latest >= open).then_some(latest)
    }
}

fn minutes_from_midnight(time: NaiveTime) -> i64 {
    i64::from(time.hour()) * 60 + i64::from(time.minute())
}

fn time_from_minutes(minutes: i64) -> Option<NaiveTime> {
    let hour = u32::try_from(minutes / 60).ok()?;
    let minute = u32::try_from(minutes % 60).ok()?;
    NaiveTime::from_hms_opt(hour, minute, 0)
}

/// Deterministic slot validation. The conversational layer consults this
/// engine and relays its verdicts; it can never override them.
pub struct SlotRuleEngine {
    rules: BusinessRules,
}

impl SlotRuleEngine {
    pub fn new(rules: BusinessRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &BusinessRules {
        &self.rules
    }

    /// Validation order, first failure wins: working day, business hours,
    /// conflicts. The weekday and hours checks are deterministic and do not
    /// touch the provider; a provider failure during the conflict check
    /// propagates rather than passing as "free".
    pub async fn evaluate(
        &self,
        window: &TimeWindow,
        now: DateTime<Utc>,
        provider: &dyn CalendarProvider,
    ) -> Result<SlotVerdict, ProviderError> {
        let local_start = self.rules.local(window.start());

        if !self.rules.is_working_day(local_start.weekday()) {
            debug!(weekday = %local_start.weekday(), "slot rejected: non-working day");
            return Ok(SlotVerdict::rejected(
                VerdictReason::NonWorkingDay,
                self.same_time_on_working_days(window, now),
            ));
        }

        if !self.fits_business_hours(window) {
            debug!(start = %local_start.time(), "slot rejected: outside business hours");
            return Ok(SlotVerdict::rejected(
                VerdictReason::OutsideHours,
                self.nearest_in_hours(window, now),
            ));
        }

        let existing = provider.list_events(window).await?;
        let conflict_count =
            existing.iter().filter(|event| event.window.overlaps(window)).count();
        if conflict_count == 0 {
            return Ok(SlotVerdict::accepted());
        }

        debug!(conflicts = conflict_count, "slot rejected: collides with existing events");
        let alternatives = self.scan_free_slots(window, now, provider).await?;
        if alternatives.is_empty() {
            return Ok(SlotVerdict::rejected(VerdictReason::NoAvailability, Vec::new()));
        }
        Ok(SlotVerdict::rejected(VerdictReason::Conflict, alternatives))
    }

    fn fits_business_hours(&self, window: &TimeWindow) -> bool {
        let start = self.rules.local(window.start());
        let end = self.rules.local(window.end());
        start.date_naive() == end.date_naive()
            && start.time() >= self.rules.open_time
            && end.time() <= self.rules.close_time
    }

    /// Next working days at the requested time of day, strictly in the
    /// future, up to the suggestion limit.
    fn same_time_on_working_days(&self, window: &TimeWindow, now: DateTime<Utc>) -> Vec<TimeWindow> {
        let local_start = self.rules.local(window.start());
        let time_of_day = local_start.time();
        let duration = window.duration();

        let mut alternatives = Vec::new();
        let mut date = local_start.date_naive();
        for _ in 0..self.rules.search_horizon_days {
            let Some(next) = date.succ_opt() else { break };
            date = next;
            if !self.rules.is_working_day(date.weekday()) {
                continue;
            }
            let Some(start) = self.rules.resolve_local(date, time_of_day) else { continue };
            if start <= now {
                continue;
            }
            if let Ok(candidate) = TimeWindow::with_duration(start, duration) {
                alternatives.push(candidate);
                if alternatives.len() == self.rules.suggestion_limit {
                    break;
                }
            }
        }
        alternatives
    }

    /// The requested start clamped into the day's legal range, then open-time
    /// starts on the following working days.
    fn nearest_in_hours(&self, window: &TimeWindow, now: DateTime<Utc>) -> Vec<TimeWindow> {
        let duration = window.duration();
        let Some(latest_start) = self.rules.latest_start_minute(duration) else {
            return Vec::new();
        };

        let local_start = self.rules.local(window.start());
        let requested_minute = minutes_from_midnight(local_start.time());
        let open_minute = minutes_from_midnight(self.rules.open_time);
        let clamped_minute = requested_minute.clamp(open_minute, latest_start);

        let mut alternatives = Vec::new();
        let mut date = local_start.date_naive();

        if self.rules.is_working_day(date.weekday()) {
            if let Some(candidate) = self.future_window(date, clamped_minute, duration, now) {
                alternatives.push(candidate);
            }
        }

        for _ in 0..self.rules.search_horizon_days {
            if alternatives.len() >= self.rules.suggestion_limit {
                break;
            }
            let Some(next) = date.succ_opt() else { break };
            date = next;
            if !self.rules.is_working_day(date.weekday()) {
                continue;
            }
            if let Some(candidate) = self.future_window(date, open_minute, duration, now) {
                alternatives.push(candidate);
            }
        }
        alternatives
    }

    fn future_window(
        &self,
        date: NaiveDate,
        start_minute: i64,
        duration: Duration,
        now: DateTime<Utc>,
    ) -> Option<TimeWindow> {
        let start_time = time_from_minutes(start_minute)?;
        let start = self.rules.resolve_local(date, start_time)?;
        if start <= now {
            return None;
        }
        TimeWindow::with_duration(start, duration).ok()
    }

    /// Forward scan of the slot grid for free windows of the requested
    /// duration, bounded by the search horizon.
    async fn scan_free_slots(
        &self,
        window: &TimeWindow,
        now: DateTime<Utc>,
        provider: &dyn CalendarProvider,
    ) -> Result<Vec<TimeWindow>, ProviderError> {
        let duration = window.duration();
        let Ok(scan_window) =
            TimeWindow::with_duration(window.start(), Duration::days(self.rules.search_horizon_days))
        else {
            return Ok(Vec::new());
        };
        let events = provider.list_events(&scan_window).await?;

        let mut free = Vec::new();
        let mut date = self.rules.local_date(window.start());
        for day in 0..=self.rules.search_horizon_days {
            if day > 0 {
                let Some(next) = date.succ_opt() else { break };
                date = next;
            }
            if !self.rules.is_working_day(date.weekday()) {
                continue;
            }
            for slot in self.rules.day_slots(date, duration) {
                if slot.start() < window.start() || slot.start() <= now {
                    continue;
                }
                if events.iter().any(|event| event.window.overlaps(&slot)) {
                    continue;
                }
                free.push(slot);
                if free.len() == self.rules.suggestion_limit {
                    return Ok(free);
                }
            }
        }
        Ok(free)
    }
}
