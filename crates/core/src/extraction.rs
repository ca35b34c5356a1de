use serde_json::{Map, Value};

use crate::models::{ClarificationState, GroupType, TEXT_SLOT_KEYS};
use crate::security::SecurityFilter;

/// Model reply for one extraction call, already decoded into a JSON object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedSlots {
    fields: Map<String, Value>,
}

impl ExtractedSlots {
    pub fn from_map(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionOutcome {
    Parsed(ExtractedSlots),
    Unparsable { reason: String },
}

impl ExtractionOutcome {
    /// Unparsable replies count as "nothing extracted".
    pub fn into_slots(self) -> ExtractedSlots {
        match self {
            Self::Parsed(slots) => slots,
            Self::Unparsable { .. } => ExtractedSlots::default(),
        }
    }
}

/// Pulls the outermost JSON object out of a model reply, tolerating code
/// fences and surrounding prose.
pub fn parse_json_object(raw: &str) -> Result<Map<String, Value>, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("empty response".to_string());
    }

    let start = trimmed.find('{').ok_or_else(|| "no JSON object found".to_string())?;
    let end = trimmed.rfind('}').ok_or_else(|| "unterminated JSON object".to_string())?;
    if end < start {
        return Err("unterminated JSON object".to_string());
    }

    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err("response is not a JSON object".to_string()),
        Err(err) => Err(format!("invalid JSON: {err}")),
    }
}

pub fn parse_extraction(raw: &str) -> ExtractionOutcome {
    match parse_json_object(raw) {
        Ok(map) => ExtractionOutcome::Parsed(ExtractedSlots::from_map(map)),
        Err(reason) => ExtractionOutcome::Unparsable { reason },
    }
}

/// A usable string: present, non-empty, and not the word "null" echoed back.
pub fn meaningful_string(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(text) => text.trim().to_string(),
        Value::Number(number) => number.to_string(),
        _ => return None,
    };

    if text.is_empty() || text.eq_ignore_ascii_case("null") {
        None
    } else {
        Some(text)
    }
}

fn meaningful_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.trim().to_lowercase().as_str() {
            "true" | "yes" | "y" | "flexible" => Some(true),
            "false" | "no" | "n" | "fixed" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn meaningful_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(meaningful_string).collect(),
        Value::String(_) => meaningful_string(value)
            .map(|text| {
                text.split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty() && !item.eq_ignore_ascii_case("null"))
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeSummary {
    pub updated: Vec<String>,
    /// Fields whose extracted value tripped the security filter and was dropped.
    pub rejected: Vec<String>,
}

/// Overwrites state fields with meaningful extracted values only. `inputHistory`
/// and `isPlanReady` are never taken from the payload.
pub fn merge_extracted(
    state: &mut ClarificationState,
    slots: &ExtractedSlots,
    filter: &SecurityFilter,
) -> MergeSummary {
    let mut summary = MergeSummary::default();

    for key in TEXT_SLOT_KEYS {
        let Some(value) = slots.get(key).and_then(meaningful_string) else {
            continue;
        };
        if filter.is_adversarial(&value) {
            summary.rejected.push(key.to_string());
            continue;
        }
        if let Some(slot) = state.text_slot_mut(key) {
            *slot = Some(value);
            summary.updated.push(key.to_string());
        }
    }

    if let Some(raw) = slots.get("groupType").and_then(meaningful_string) {
        if let Some(group_type) = GroupType::parse(&raw) {
            state.group_type = Some(group_type);
            summary.updated.push("groupType".to_string());
        }
    }

    if let Some(items) = slots.get("interests").map(meaningful_list) {
        let mut added = false;
        for item in items {
            if filter.is_adversarial(&item) {
                summary.rejected.push("interests".to_string());
                continue;
            }
            added |= state.interests.insert(item);
        }
        if added {
            summary.updated.push("interests".to_string());
        }
    }

    if let Some(flag) = slots.get("flexibleBudget").and_then(meaningful_bool) {
        state.flexible_budget = flag;
        summary.updated.push("flexibleBudget".to_string());
    }
    if let Some(flag) = slots.get("flexibleDates").and_then(meaningful_bool) {
        state.flexible_dates = flag;
        summary.updated.push("flexibleDates".to_string());
    }

    summary
}
