use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    Solo,
    Couple,
    Family,
    Friends,
}

impl GroupType {
    /// Maps free-text group descriptions in any casing onto the closed set.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "solo" | "alone" | "single" | "myself" | "just me" | "me" => Some(Self::Solo),
            "couple" | "partner" | "honeymoon" | "two of us" | "with my partner" | "with spouse" => {
                Some(Self::Couple)
            }
            "family" | "kids" | "children" | "with kids" | "with family" | "parents" => {
                Some(Self::Family)
            }
            "friends" | "group" | "mates" | "buddies" | "gang" | "with friends" => {
                Some(Self::Friends)
            }
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Solo => "solo",
            Self::Couple => "couple",
            Self::Family => "family",
            Self::Friends => "friends",
        }
    }
}

fn lenient_group_type<'de, D>(deserializer: D) -> Result<Option<GroupType>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(value
        .as_ref()
        .and_then(|value| value.as_str())
        .and_then(GroupType::parse))
}

/// Trip-planning slots collected across turns. The caller owns this value and
/// hands it back on every turn; nothing is persisted server side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClarificationState {
    pub destination: Option<String>,
    pub source: Option<String>,
    pub travel_dates: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub duration: Option<String>,
    #[serde(deserialize_with = "lenient_group_type")]
    pub group_type: Option<GroupType>,
    pub budget: Option<String>,
    pub domestic_or_international: Option<String>,
    pub mode_of_transport: Option<String>,
    pub car_model: Option<String>,
    pub flight_preferences: Option<String>,
    pub accommodation: Option<String>,
    pub travel_pace: Option<String>,
    pub occasion: Option<String>,
    pub food_preference: Option<String>,
    pub special_needs: Option<String>,
    pub climate_preference: Option<String>,
    pub interests: BTreeSet<String>,
    pub trip_theme: Option<String>,
    pub flexible_budget: bool,
    pub flexible_dates: bool,
    pub input_history: Vec<String>,
    pub is_plan_ready: bool,
}

/// Wire names of every free-text slot, in canonical order.
pub const TEXT_SLOT_KEYS: [&str; 18] = [
    "destination",
    "source",
    "travelDates",
    "startDate",
    "endDate",
    "duration",
    "budget",
    "domesticOrInternational",
    "modeOfTransport",
    "carModel",
    "flightPreferences",
    "accommodation",
    "travelPace",
    "occasion",
    "foodPreference",
    "specialNeeds",
    "climatePreference",
    "tripTheme",
];

impl ClarificationState {
    pub fn text_slot(&self, key: &str) -> Option<&str> {
        let slot = match key {
            "destination" => &self.destination,
            "source" => &self.source,
            "travelDates" => &self.travel_dates,
            "startDate" => &self.start_date,
            "endDate" => &self.end_date,
            "duration" => &self.duration,
            "budget" => &self.budget,
            "domesticOrInternational" => &self.domestic_or_international,
            "modeOfTransport" => &self.mode_of_transport,
            "carModel" => &self.car_model,
            "flightPreferences" => &self.flight_preferences,
            "accommodation" => &self.accommodation,
            "travelPace" => &self.travel_pace,
            "occasion" => &self.occasion,
            "foodPreference" => &self.food_preference,
            "specialNeeds" => &self.special_needs,
            "climatePreference" => &self.climate_preference,
            "tripTheme" => &self.trip_theme,
            _ => return None,
        };
        slot.as_deref().filter(|value| !value.trim().is_empty())
    }

    pub fn text_slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        let slot = match key {
            "destination" => &mut self.destination,
            "source" => &mut self.source,
            "travelDates" => &mut self.travel_dates,
            "startDate" => &mut self.start_date,
            "endDate" => &mut self.end_date,
            "duration" => &mut self.duration,
            "budget" => &mut self.budget,
            "domesticOrInternational" => &mut self.domestic_or_international,
            "modeOfTransport" => &mut self.mode_of_transport,
            "carModel" => &mut self.car_model,
            "flightPreferences" => &mut self.flight_preferences,
            "accommodation" => &mut self.accommodation,
            "travelPace" => &mut self.travel_pace,
            "occasion" => &mut self.occasion,
            "foodPreference" => &mut self.food_preference,
            "specialNeeds" => &mut self.special_needs,
            "climatePreference" => &mut self.climate_preference,
            "tripTheme" => &mut self.trip_theme,
            _ => return None,
        };
        Some(slot)
    }

    /// Filled free-text slots as `(wire name, value)` pairs in canonical order.
    pub fn filled_text_slots(&self) -> Vec<(&'static str, &str)> {
        TEXT_SLOT_KEYS
            .iter()
            .filter_map(|key| self.text_slot(key).map(|value| (*key, value)))
            .collect()
    }

    /// Every string the state carries, including interests and prior utterances.
    /// Used to re-screen state that may have been tampered with client side.
    pub fn all_strings(&self) -> Vec<(String, &str)> {
        let mut out = self
            .filled_text_slots()
            .into_iter()
            .map(|(key, value)| (key.to_string(), value))
            .collect::<Vec<_>>();
        for interest in &self.interests {
            out.push(("interests".to_string(), interest.as_str()));
        }
        for (idx, utterance) in self.input_history.iter().enumerate() {
            out.push((format!("inputHistory[{idx}]"), utterance.as_str()));
        }
        out
    }

    pub fn filled_slot_count(&self) -> usize {
        let mut count = self.filled_text_slots().len();
        if self.group_type.is_some() {
            count += 1;
        }
        if !self.interests.is_empty() {
            count += 1;
        }
        count
    }

    pub fn has_structured_dates(&self) -> bool {
        self.text_slot("startDate").is_some() && self.text_slot("endDate").is_some()
    }

    /// Appends the raw utterance. History is append-only.
    pub fn record_utterance(&mut self, utterance: &str) {
        self.input_history.push(utterance.to_string());
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    #[serde(alias = "model", alias = "bot")]
    Assistant,
    System,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
            Self::System => "system",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtStep {
    pub step: String,
    pub prompt: String,
    pub response: String,
    pub at: DateTime<Utc>,
}

/// Diagnostic trace of one turn. Never read back for control flow.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ThoughtChain {
    steps: Vec<ThoughtStep>,
}

impl ThoughtChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(
        &mut self,
        step: impl Into<String>,
        prompt: impl Into<String>,
        response: impl Into<String>,
    ) {
        self.steps.push(ThoughtStep {
            step: step.into(),
            prompt: prompt.into(),
            response: response.into(),
            at: Utc::now(),
        });
    }

    pub fn steps(&self) -> &[ThoughtStep] {
        &self.steps
    }

    pub fn step_names(&self) -> Vec<&str> {
        self.steps.iter().map(|step| step.step.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryFindings {
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

impl CategoryFindings {
    pub fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub content_safety: CategoryFindings,
    pub semantic: CategoryFindings,
    pub business_logic: CategoryFindings,
    /// Observations that are logged but neither warn nor fail.
    pub notes: Vec<String>,
    pub is_valid: bool,
    pub sanitized_output: String,
}

impl ValidationReport {
    pub fn error_count(&self) -> usize {
        self.content_safety.errors.len()
            + self.semantic.errors.len()
            + self.business_logic.errors.len()
    }

    pub fn warning_count(&self) -> usize {
        self.content_safety.warnings.len()
            + self.semantic.warnings.len()
            + self.business_logic.warnings.len()
    }
}
