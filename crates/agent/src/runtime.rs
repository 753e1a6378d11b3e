use chrono::{DateTime, Days, Duration, NaiveDate, Utc};
use tracing::{debug, info, warn};
use uuid::Uuid;

use slotwise_core::availability::{AvailabilityChecker, CalendarProvider};
use slotwise_core::compose::{self, Reply};
use slotwise_core::domain::{SlotRequest, TimeWindow, VerdictReason};
use slotwise_core::errors::ParseError;
use slotwise_core::parser;
use slotwise_core::rules::{BusinessRules, SlotRuleEngine};

use crate::intent::{decode_llm_intent, ExtractedIntent, Intent, KeywordExtractor};
use crate::llm::LlmClient;
use crate::prompts;

const BOOKING_CLARIFICATION: &str = "I'd be happy to book that. When would you like the \
                                     appointment? For example: `tomorrow at 2 PM` or `next monday \
                                     morning`.";

/// One conversation turn: extract intent, run the deterministic pipeline,
/// render a reply. Never returns an error; every failure path becomes a
/// user-facing message.
pub struct AgentRuntime {
    rules: BusinessRules,
    engine: SlotRuleEngine,
    checker: AvailabilityChecker,
    fallback: KeywordExtractor,
    llm: Option<Box<dyn LlmClient>>,
}

impl AgentRuntime {
    pub fn new(rules: BusinessRules) -> Self {
        Self {
            engine: SlotRuleEngine::new(rules.clone()),
            checker: AvailabilityChecker::new(rules.clone()),
            fallback: KeywordExtractor::new(),
            llm: None,
            rules,
        }
    }

    pub fn with_llm(rules: BusinessRules, llm: Box<dyn LlmClient>) -> Self {
        Self { llm: Some(llm), ..Self::new(rules) }
    }

    pub async fn handle_message(
        &self,
        text: &str,
        now: DateTime<Utc>,
        provider: &dyn CalendarProvider,
    ) -> Reply {
        let correlation_id = Uuid::new_v4().to_string();
        let intent = self.extract_intent(text, now, &correlation_id).await;
        info!(
            event_name = "agent.turn.intent",
            correlation_id = %correlation_id,
            intent = ?intent.intent,
            "intent extracted"
        );

        let reply = match intent.intent {
            Intent::BookAppointment => self.handle_booking(text, &intent, now, provider).await,
            Intent::CheckAvailability => self.handle_availability(text, &intent, now, provider).await,
            Intent::CancelAppointment => compose::cancellation_unsupported(),
            Intent::General => compose::help(&self.rules),
        };

        info!(
            event_name = "agent.turn.reply",
            correlation_id = %correlation_id,
            "turn complete"
        );
        reply
    }

    /// Model first when configured, deterministic keywords otherwise. Any
    /// model failure degrades to the fallback instead of surfacing.
    async fn extract_intent(
        &self,
        text: &str,
        now: DateTime<Utc>,
        correlation_id: &str,
    ) -> ExtractedIntent {
        if let Some(llm) = &self.llm {
            let prompt = prompts::intent_prompt(text, now, &self.rules);
            match llm.complete(prompts::system_prompt(), &prompt).await {
                Ok(response) => {
                    if let Some(intent) = decode_llm_intent(&response) {
                        return intent;
                    }
                    warn!(
                        event_name = "agent.intent.undecodable",
                        correlation_id = %correlation_id,
                        "model reply had no usable JSON, falling back to keywords"
                    );
                }
                Err(error) => {
                    warn!(
                        event_name = "agent.intent.llm_failed",
                        correlation_id = %correlation_id,
                        error = %error,
                        "model call failed, falling back to keywords"
                    );
                }
            }
        }
        self.fallback.extract(text)
    }

    async fn handle_booking(
        &self,
        raw_text: &str,
        intent: &ExtractedIntent,
        now: DateTime<Utc>,
        provider: &dyn CalendarProvider,
    ) -> Reply {
        let phrase = intent.schedule_phrase(raw_text);
        let parsed = match parser::parse(&phrase, now, &self.rules) {
            Ok(parsed) => parsed,
            Err(error) => {
                debug!(error = %error, "booking request did not parse");
                return compose::clarification(BOOKING_CLARIFICATION);
            }
        };

        // A day with no stated time is an invitation to choose, not a booking.
        if !parsed.explicit_time {
            return self.day_listing(self.rules.local_date(parsed.window.start()), now, provider).await;
        }

        let window = intent
            .duration_minutes
            .filter(|minutes| (5..=480).contains(minutes))
            .map(Duration::minutes)
            .and_then(|duration| TimeWindow::with_duration(parsed.window.start(), duration).ok())
            .unwrap_or(parsed.window);

        let request = SlotRequest { requested_window: window, raw_text: raw_text.to_owned() };
        let verdict = match self.engine.evaluate(&window, now, provider).await {
            Ok(verdict) => verdict,
            Err(error) => return compose::calendar_unavailable(&error),
        };

        if !verdict.accepted {
            let reason = verdict.reason.unwrap_or(VerdictReason::Conflict);
            return compose::rejection(&self.rules, &request, reason, &verdict.alternatives);
        }

        let title = intent.title.as_deref().unwrap_or("Appointment");
        match provider.create_event(&window, title).await {
            Ok(event_id) => compose::booking_confirmed(&self.rules, title, &window, &event_id),
            Err(error) => {
                warn!(error = %error, "event creation failed after a clean verdict");
                compose::booking_failed(&self.rules, &window)
            }
        }
    }

    async fn handle_availability(
        &self,
        raw_text: &str,
        intent: &ExtractedIntent,
        now: DateTime<Utc>,
        provider: &dyn CalendarProvider,
    ) -> Reply {
        let phrase = intent.schedule_phrase(raw_text);
        let date = match parser::parse(&phrase, now, &self.rules) {
            Ok(parsed) => self.rules.local_date(parsed.window.start()),
            // "what's free?" with no day means the next day, matching the
            // assistant's conversational default.
            Err(ParseError::Unrecognized(_)) => {
                let today = self.rules.local_date(now);
                today.checked_add_days(Days::new(1)).unwrap_or(today)
            }
            Err(error) => {
                debug!(error = %error, "availability request did not parse");
                return compose::clarification(
                    "Which day should I check? For example: `what's free next monday?`",
                );
            }
        };

        self.day_listing(date, now, provider).await
    }

    async fn day_listing(
        &self,
        date: NaiveDate,
        now: DateTime<Utc>,
        provider: &dyn CalendarProvider,
    ) -> Reply {
        let slots = match self.checker.free_slots(date, now, provider).await {
            Ok(slots) => slots,
            Err(error) => return compose::calendar_unavailable(&error),
        };

        let alternative_days = if slots.is_empty() {
            match self.checker.alternative_days(date, now, provider).await {
                Ok(days) => days,
                Err(error) => return compose::calendar_unavailable(&error),
            }
        } else {
            Vec::new()
        };

        compose::availability(&self.rules, date, slots, alternative_days)
    }
}
