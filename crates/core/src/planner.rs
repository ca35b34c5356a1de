use serde::{Deserialize, Serialize};

use crate::models::ClarificationState;

/// Slots that can gate planning, in canonical ask order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RequiredSlot {
    #[serde(rename = "destination")]
    Destination,
    #[serde(rename = "groupType")]
    GroupType,
    #[serde(rename = "budget")]
    Budget,
    #[serde(rename = "travelDates")]
    TravelDates,
}

impl RequiredSlot {
    pub const CANONICAL_ORDER: [RequiredSlot; 4] = [
        RequiredSlot::Destination,
        RequiredSlot::GroupType,
        RequiredSlot::Budget,
        RequiredSlot::TravelDates,
    ];

    pub fn as_key(self) -> &'static str {
        match self {
            Self::Destination => "destination",
            Self::GroupType => "groupType",
            Self::Budget => "budget",
            Self::TravelDates => "travelDates",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextAction {
    PlanReady,
    Ask(RequiredSlot),
}

impl NextAction {
    pub fn as_action(&self) -> String {
        match self {
            Self::PlanReady => "plan_ready".to_string(),
            Self::Ask(slot) => format!("ask_{}", slot.as_key()),
        }
    }

    pub fn is_plan_ready(&self) -> bool {
        matches!(self, Self::PlanReady)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotPlan {
    pub missing: Vec<RequiredSlot>,
    pub next_action: NextAction,
}

impl SlotPlan {
    pub fn next_question(&self) -> Option<String> {
        match self.next_action {
            NextAction::PlanReady => None,
            NextAction::Ask(slot) => Some(question_for(slot.as_key())),
        }
    }
}

fn is_required(state: &ClarificationState, slot: RequiredSlot) -> bool {
    match slot {
        RequiredSlot::Destination | RequiredSlot::GroupType => true,
        RequiredSlot::Budget => !state.flexible_budget,
        // A start/end pair is as good as a free-text date range.
        RequiredSlot::TravelDates => !state.flexible_dates && !state.has_structured_dates(),
    }
}

fn is_filled(state: &ClarificationState, slot: RequiredSlot) -> bool {
    match slot {
        RequiredSlot::GroupType => state.group_type.is_some(),
        other => state.text_slot(other.as_key()).is_some(),
    }
}

/// Computes which required slots are still missing and what to ask next.
pub fn plan_slots(state: &ClarificationState) -> SlotPlan {
    let missing = RequiredSlot::CANONICAL_ORDER
        .into_iter()
        .filter(|slot| is_required(state, *slot) && !is_filled(state, *slot))
        .collect::<Vec<_>>();

    let next_action = match missing.first() {
        Some(slot) => NextAction::Ask(*slot),
        None => NextAction::PlanReady,
    };

    SlotPlan {
        missing,
        next_action,
    }
}

/// Runs the planner and writes the readiness flag back into the state.
pub fn refresh_plan_readiness(state: &mut ClarificationState) -> SlotPlan {
    let plan = plan_slots(state);
    state.is_plan_ready = plan.next_action.is_plan_ready();
    plan
}

pub fn question_for(slot: &str) -> String {
    let text = match slot {
        "destination" => "Where would you like to go?",
        "groupType" => "Who will you be traveling with: solo, as a couple, with family, or with friends?",
        "budget" => "What budget do you have in mind for this trip?",
        "travelDates" => "When would you like to travel?",
        "duration" => "How many days would you like the trip to last?",
        "source" => "Where will you be traveling from?",
        "accommodation" => "What kind of accommodation do you prefer?",
        "modeOfTransport" => "How would you like to get there: flight, train, bus, or by car?",
        "interests" => "What are you most interested in doing on this trip?",
        "travelPace" => "Do you prefer a relaxed or a packed itinerary?",
        "foodPreference" => "Do you have any food preferences or dietary requirements?",
        _ => return format!("Could you tell me more about your {}?", humanize_key(slot)),
    };
    text.to_string()
}

fn humanize_key(key: &str) -> String {
    let mut out = String::with_capacity(key.len() + 4);
    for ch in key.chars() {
        if ch.is_uppercase() {
            out.push(' ');
            out.extend(ch.to_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}
