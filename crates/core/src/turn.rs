use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::models::{ChatMessage, ClarificationState, ThoughtChain, ValidationReport};
use crate::personalization::PersonalizationMetadata;
use crate::profile::UserProfile;

fn profile_from_blob<'de, D>(deserializer: D) -> Result<Option<UserProfile>, D::Error>
where
    D: Deserializer<'de>,
{
    let blob = Option::<Value>::deserialize(deserializer)?;
    Ok(blob
        .filter(|value| !value.is_null())
        .map(|value| UserProfile::from_blob(&value)))
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TurnInput {
    pub free_text_input: String,
    pub current_state: ClarificationState,
    pub recent_messages: Vec<ChatMessage>,
    #[serde(deserialize_with = "profile_from_blob")]
    pub user_profile: Option<UserProfile>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnOutcome {
    SecurityRejected,
    Trivial,
    NonTravel,
    Question,
    Itinerary,
    PromptForDetails,
    Failed,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TurnOutput {
    pub next_prompt: Option<String>,
    pub updated_state: ClarificationState,
    pub thought_chain: ThoughtChain,
    pub personalization_metadata: Option<PersonalizationMetadata>,
    pub outcome: TurnOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation: Option<ValidationReport>,
}
