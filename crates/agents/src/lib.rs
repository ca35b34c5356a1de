pub mod classifier;
pub mod extractor;
pub mod gateway;
pub mod generator;
pub mod http_client;

use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures::FutureExt;
use thiserror::Error;
use tracing::{info, instrument, warn};
use tripwise_core::{
    detect_trivial_intent, personalize_prompt, refresh_plan_readiness, ClarificationState,
    GatewayError, OutputValidator, PersonalizationMetadata, SecurityFilter, SecurityHit,
    ThoughtChain, TurnInput, TurnIntent, TurnOutcome, TurnOutput, UserProfile,
    ValidationReport, SECURITY_REFUSAL,
};
use tripwise_observability::AppMetrics;
use uuid::Uuid;

pub use classifier::IntentClassifier;
pub use extractor::SlotExtractor;
pub use gateway::{GatewayConfig, ModelClient, ModelGateway, ModelRequest, ResponseFormat};
pub use generator::{GeneratedItinerary, ItineraryGenerator};
pub use http_client::{HttpModelClient, ModelRuntimeConfig};

pub const NON_TRAVEL_REFUSAL: &str = "I'm a travel planner, so I can only help with trips. Where would you like to go?";
pub const DETAILS_PROMPT: &str = "Please tell me about your trip: where you'd like to go, who's coming, and roughly when.";
pub const GENERIC_FAILURE: &str = "Something went wrong while planning your trip. Please try again.";

#[derive(Debug, Error)]
pub enum TurnError {
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl TurnError {
    /// The only wording that reaches the traveler.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Gateway(err) => err.user_message(),
            Self::Internal(_) => GENERIC_FAILURE,
        }
    }
}

struct TurnReply {
    prompt: Option<String>,
    state: ClarificationState,
    personalization: Option<PersonalizationMetadata>,
    outcome: TurnOutcome,
    validation: Option<ValidationReport>,
}

impl TurnReply {
    fn text(prompt: impl Into<String>, state: ClarificationState, outcome: TurnOutcome) -> Self {
        Self {
            prompt: Some(prompt.into()),
            state,
            personalization: None,
            outcome,
            validation: None,
        }
    }
}

/// Per-turn state machine. Branches, first match wins:
/// security, trivial filler, first-turn intent gate, extraction and planning,
/// form fast path, details prompt.
#[derive(Clone)]
pub struct DialogueOrchestrator {
    classifier: IntentClassifier,
    extractor: SlotExtractor,
    generator: ItineraryGenerator,
    validator: OutputValidator,
    filter: SecurityFilter,
    metrics: Arc<AppMetrics>,
}

impl DialogueOrchestrator {
    pub fn new(gateway: Arc<ModelGateway>, metrics: Arc<AppMetrics>) -> Self {
        Self {
            classifier: IntentClassifier::new(gateway.clone()),
            extractor: SlotExtractor::new(gateway.clone()),
            generator: ItineraryGenerator::new(gateway),
            validator: OutputValidator::new(),
            filter: SecurityFilter::new(),
            metrics,
        }
    }

    pub fn metrics(&self) -> &Arc<AppMetrics> {
        &self.metrics
    }

    /// Never fails: errors and panics become a user-safe prompt. Failures
    /// before or during extraction return the incoming state unchanged; a
    /// failed itinerary call keeps what extraction merged.
    #[instrument(skip(self, input), fields(turn_id = %Uuid::new_v4()))]
    pub async fn handle_turn(&self, input: TurnInput) -> TurnOutput {
        let started = Instant::now();
        self.metrics.inc_turn();

        let prior_state = input.current_state.clone();
        let mut chain = ThoughtChain::new();
        let result = AssertUnwindSafe(self.run_turn(input, &mut chain))
            .catch_unwind()
            .await;

        let reply = match result {
            Ok(Ok(reply)) => reply,
            Ok(Err(err)) => failed(err, prior_state),
            Err(_) => {
                warn!("turn panicked");
                TurnReply::text(GENERIC_FAILURE, prior_state, TurnOutcome::Failed)
            }
        };

        let elapsed = started.elapsed();
        self.metrics.observe_latency(elapsed);
        info!(
            outcome = ?reply.outcome,
            steps = chain.len(),
            elapsed_ms = elapsed.as_millis() as u64,
            "turn handled"
        );

        TurnOutput {
            next_prompt: reply.prompt,
            updated_state: reply.state,
            thought_chain: chain,
            personalization_metadata: reply.personalization,
            outcome: reply.outcome,
            validation: reply.validation,
        }
    }

    async fn run_turn(
        &self,
        input: TurnInput,
        chain: &mut ThoughtChain,
    ) -> Result<TurnReply, TurnError> {
        let TurnInput {
            free_text_input,
            current_state: mut state,
            recent_messages,
            user_profile,
        } = input;
        let profile = user_profile.as_ref();
        let utterance = free_text_input.trim();

        if !utterance.is_empty() {
            if let Some(hit) = self.filter.check_turn(utterance, &state) {
                return Ok(self.reject(hit, state, chain));
            }

            let trivial = detect_trivial_intent(utterance);
            if let Some(reply) = trivial.canned_reply() {
                chain.record("trivial_intent", utterance, reply);
                return Ok(TurnReply::text(reply, state, TurnOutcome::Trivial));
            }

            if state.filled_slot_count() == 0 {
                let intent = self.classifier.classify(utterance, chain).await?;
                if intent != TurnIntent::Travel {
                    self.metrics.inc_non_travel();
                    return Ok(TurnReply::text(NON_TRAVEL_REFUSAL, state, TurnOutcome::NonTravel));
                }
            }

            self.extractor
                .extract_and_merge(utterance, &mut state, &recent_messages, profile, chain)
                .await?;

            let plan = refresh_plan_readiness(&mut state);
            info!(
                next_action = %plan.next_action.as_action(),
                missing = plan.missing.len(),
                "slots planned"
            );
            return match plan.next_question() {
                None => Ok(self.generate(state, profile, chain).await),
                Some(question) => Ok(self.ask(question, state, profile)),
            };
        }

        if state.filled_slot_count() > 0 {
            if let Some(hit) = self.filter.check_state(&state) {
                return Ok(self.reject(hit, state, chain));
            }
            refresh_plan_readiness(&mut state);
            info!(filled = state.filled_slot_count(), "form submission, generating directly");
            return Ok(self.generate(state, profile, chain).await);
        }

        Ok(TurnReply::text(DETAILS_PROMPT, state, TurnOutcome::PromptForDetails))
    }

    fn reject(&self, hit: SecurityHit, state: ClarificationState, chain: &mut ThoughtChain) -> TurnReply {
        self.metrics.inc_security_rejection();
        warn!(field = %hit.field, pattern = hit.pattern, "adversarial input rejected");
        chain.record("security", format!("field={}", hit.field), hit.pattern);
        TurnReply::text(SECURITY_REFUSAL, state, TurnOutcome::SecurityRejected)
    }

    fn ask(&self, question: String, state: ClarificationState, profile: Option<&UserProfile>) -> TurnReply {
        let personalized = profile.and_then(|profile| personalize_prompt(&question, profile));
        match personalized {
            Some(personalized) => TurnReply {
                prompt: Some(personalized.text),
                state,
                personalization: Some(personalized.metadata),
                outcome: TurnOutcome::Question,
                validation: None,
            },
            None => TurnReply::text(question, state, TurnOutcome::Question),
        }
    }

    /// A failed generation keeps `state` as given, so slots merged earlier in
    /// the turn survive and an empty follow-up turn takes the form path.
    async fn generate(
        &self,
        state: ClarificationState,
        profile: Option<&UserProfile>,
        chain: &mut ThoughtChain,
    ) -> TurnReply {
        let generated = match self.generator.generate(&state, profile, chain).await {
            Ok(generated) => generated,
            Err(err) => return failed(err.into(), state),
        };
        let report = self
            .validator
            .validate(&generated.raw, generated.document.as_ref(), &state);

        self.metrics.inc_itinerary();
        info!(
            is_valid = report.is_valid,
            content_safety_errors = report.content_safety.errors.len(),
            semantic_errors = report.semantic.errors.len(),
            business_logic_errors = report.business_logic.errors.len(),
            warnings = report.warning_count(),
            "itinerary validated"
        );
        for note in &report.notes {
            info!(%note, "itinerary note");
        }
        if !report.is_valid {
            // Delivered anyway; the sanitized text is always forwarded.
            self.metrics.inc_validation_failure();
            warn!(
                errors = ?[
                    &report.content_safety.errors,
                    &report.semantic.errors,
                    &report.business_logic.errors,
                ],
                "itinerary failed validation"
            );
        }

        TurnReply {
            prompt: Some(report.sanitized_output.clone()),
            state,
            personalization: None,
            outcome: TurnOutcome::Itinerary,
            validation: Some(report),
        }
    }
}

fn failed(err: TurnError, state: ClarificationState) -> TurnReply {
    match &err {
        TurnError::Gateway(gateway_err) => warn!(
            kind = gateway_err.kind.as_str(),
            suggested_backoff_ms = gateway_err.suggested_backoff.map(|d| d.as_millis() as u64),
            "turn failed at model gateway"
        ),
        TurnError::Internal(_) => warn!(error = %err, "turn failed"),
    }
    TurnReply::text(err.user_message(), state, TurnOutcome::Failed)
}
