use std::sync::Arc;

use tracing::info;
use tripwise_core::prompts::{intent_classification_prompt, PLANNER_PERSONA};
use tripwise_core::{GatewayError, ThoughtChain, TurnIntent};

use crate::gateway::{ModelGateway, ModelRequest, ResponseFormat};

/// First-turn travel/greeting/other gate. One model call.
#[derive(Clone)]
pub struct IntentClassifier {
    gateway: Arc<ModelGateway>,
}

impl IntentClassifier {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }

    pub async fn classify(
        &self,
        utterance: &str,
        chain: &mut ThoughtChain,
    ) -> Result<TurnIntent, GatewayError> {
        let prompt = intent_classification_prompt(utterance);
        let reply = self
            .gateway
            .invoke(ModelRequest {
                purpose: "intent",
                instructions: PLANNER_PERSONA.to_string(),
                input: prompt.clone(),
                format: ResponseFormat::Text,
            })
            .await?;

        let intent = TurnIntent::parse_label(&reply);
        chain.record("intent_classification", prompt, reply);
        info!(intent = intent.as_str(), "first turn classified");
        Ok(intent)
    }
}
