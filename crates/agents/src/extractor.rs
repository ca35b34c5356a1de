use std::sync::Arc;

use tracing::{info, warn};
use tripwise_core::prompts::{extraction_context, extraction_schema, PLANNER_PERSONA};
use tripwise_core::{
    merge_extracted, parse_extraction, ChatMessage, ClarificationState, ExtractionOutcome,
    GatewayError, MergeSummary, SecurityFilter, ThoughtChain, UserProfile,
};

use crate::gateway::{ModelGateway, ModelRequest, ResponseFormat};

/// Pulls every recognised slot out of one utterance and merges it into state.
#[derive(Clone)]
pub struct SlotExtractor {
    gateway: Arc<ModelGateway>,
    filter: SecurityFilter,
}

impl SlotExtractor {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self {
            gateway,
            filter: SecurityFilter::new(),
        }
    }

    /// On a gateway error the state is left untouched. Otherwise the
    /// utterance is appended to `inputHistory` exactly once, even when the
    /// reply could not be parsed.
    pub async fn extract_and_merge(
        &self,
        utterance: &str,
        state: &mut ClarificationState,
        history: &[ChatMessage],
        profile: Option<&UserProfile>,
        chain: &mut ThoughtChain,
    ) -> Result<MergeSummary, GatewayError> {
        let (history, dropped) = self.filter.screen_messages(history);
        if dropped > 0 {
            warn!(dropped, "flagged messages left out of the history window");
        }
        let context = extraction_context(utterance, state, &history, profile);
        let reply = self
            .gateway
            .invoke(ModelRequest {
                purpose: "extraction",
                instructions: PLANNER_PERSONA.to_string(),
                input: context.clone(),
                format: ResponseFormat::JsonSchema {
                    name: "trip_slots",
                    schema: extraction_schema(),
                },
            })
            .await?;
        chain.record("slot_extraction", context, reply.as_str());

        let summary = match parse_extraction(&reply) {
            ExtractionOutcome::Parsed(slots) => merge_extracted(state, &slots, &self.filter),
            ExtractionOutcome::Unparsable { reason } => {
                warn!(%reason, "extraction reply unparsable, nothing merged");
                MergeSummary::default()
            }
        };
        state.record_utterance(utterance);

        if !summary.rejected.is_empty() {
            warn!(fields = ?summary.rejected, "extracted values dropped by security filter");
        }
        info!(updated = ?summary.updated, "slots merged");
        Ok(summary)
    }
}
