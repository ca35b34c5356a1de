pub mod errors;
pub mod extraction;
pub mod intent;
pub mod itinerary;
pub mod models;
pub mod personalization;
pub mod planner;
pub mod profile;
pub mod prompts;
pub mod sanitize;
pub mod security;
pub mod turn;
pub mod validator;

pub use errors::{classify_failure, suggested_backoff, GatewayError, GatewayErrorKind};
pub use extraction::{merge_extracted, parse_extraction, ExtractedSlots, ExtractionOutcome, MergeSummary};
pub use intent::{detect_trivial_intent, normalize_text, TrivialIntent, TurnIntent};
pub use models::*;
pub use personalization::{personalize_prompt, PersonalizationMetadata, PersonalizedPrompt};
pub use planner::{plan_slots, question_for, refresh_plan_readiness, NextAction, RequiredSlot, SlotPlan};
pub use profile::{Locale, TravelClass, UserProfile};
pub use sanitize::{sanitize_text, sanitize_value};
pub use security::{SecurityFilter, SecurityHit, SECURITY_REFUSAL};
pub use validator::OutputValidator;
pub use turn::{TurnInput, TurnOutcome, TurnOutput};
