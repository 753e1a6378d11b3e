//! Agent runtime - LLM-backed intent extraction and conversation orchestration.
//!
//! This crate is the conversational front of the slotwise system:
//! - Extracts structured booking intent from natural-language chat text
//! - Falls back to deterministic keyword extraction when the model fails
//! - Routes intents through the core pipeline (parse, validate, book)
//! - Renders every outcome as a user-facing reply; nothing here errors out
//!
//! # Architecture
//!
//! Each chat turn runs a constrained loop:
//! 1. **Intent extraction** (`intent`, `llm`, `prompts`) - NL → `ExtractedIntent`
//! 2. **Normalization** - the core date/time parser resolves the request
//! 3. **Validation** - the core rule engine produces a verdict
//! 4. **Response** - the core composer renders text plus a machine summary
//!
//! # Safety principle
//!
//! The model is strictly a translator. It never decides whether a slot is
//! legal or free; those are deterministic verdicts from the core rule
//! engine, which the runtime relays untouched.

pub mod intent;
pub mod llm;
pub mod prompts;
pub mod runtime;

pub use intent::{ExtractedIntent, Intent, KeywordExtractor};
pub use llm::{HttpLlmClient, LlmClient};
pub use runtime::AgentRuntime;
