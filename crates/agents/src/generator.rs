use std::sync::Arc;

use serde_json::Value;
use tracing::{info, warn};
use tripwise_core::extraction::parse_json_object;
use tripwise_core::itinerary::itinerary_schema;
use tripwise_core::prompts::{generation_brief, PLANNER_PERSONA};
use tripwise_core::{ClarificationState, GatewayError, ThoughtChain, UserProfile};

use crate::gateway::{ModelGateway, ModelRequest, ResponseFormat};

#[derive(Debug, Clone)]
pub struct GeneratedItinerary {
    pub raw: String,
    /// `None` when the reply was not a JSON object.
    pub document: Option<Value>,
}

/// Single-shot itinerary generation. No retry, no regeneration.
#[derive(Clone)]
pub struct ItineraryGenerator {
    gateway: Arc<ModelGateway>,
}

impl ItineraryGenerator {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }

    pub async fn generate(
        &self,
        state: &ClarificationState,
        profile: Option<&UserProfile>,
        chain: &mut ThoughtChain,
    ) -> Result<GeneratedItinerary, GatewayError> {
        let brief = generation_brief(state, profile);
        let raw = self
            .gateway
            .invoke(ModelRequest {
                purpose: "itinerary",
                instructions: PLANNER_PERSONA.to_string(),
                input: brief.clone(),
                format: ResponseFormat::JsonSchema {
                    name: "travel_itinerary",
                    schema: itinerary_schema(),
                },
            })
            .await?;
        chain.record("itinerary_generation", brief, raw.as_str());

        let document = match parse_json_object(&raw) {
            Ok(map) => Some(Value::Object(map)),
            Err(reason) => {
                warn!(%reason, "itinerary reply is not a JSON object");
                None
            }
        };
        info!(
            parsed = document.is_some(),
            response_chars = raw.len(),
            "itinerary generated"
        );
        Ok(GeneratedItinerary { raw, document })
    }
}
