//! Fixed shape of the generated itinerary document. The presentation layer
//! reads these keys directly, so they must not drift.

use serde_json::{json, Value};

pub const TRIP_OVERVIEW: &str = "tripOverview";
pub const DAILY_ITINERARY: &str = "dailyItinerary";
pub const ACCOMMODATIONS: &str = "accommodations";
pub const RESTAURANTS: &str = "restaurants";
pub const TRANSPORTATION: &str = "transportation";
pub const PRACTICAL_INFO: &str = "practicalInfo";
pub const BUDGET_BREAKDOWN: &str = "budgetBreakdown";

pub const CORE_BUDGET_CATEGORIES: [&str; 4] =
    ["accommodation", "food", "activities", "transportation"];

fn string() -> Value {
    json!({ "type": "string" })
}

fn string_list() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

fn object(properties: Value) -> Value {
    let required = properties
        .as_object()
        .map(|map| map.keys().cloned().map(Value::String).collect::<Vec<_>>())
        .unwrap_or_default();
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
        "additionalProperties": false
    })
}

/// JSON schema handed to the model for structured output.
pub fn itinerary_schema() -> Value {
    let activity = object(json!({
        "time": string(),
        "title": string(),
        "description": string(),
        "location": string(),
        "estimatedCost": string()
    }));
    let day = object(json!({
        "day": { "type": "integer" },
        "date": string(),
        "title": string(),
        "activities": { "type": "array", "items": activity }
    }));
    let accommodation = object(json!({
        "name": string(),
        "type": string(),
        "location": string(),
        "pricePerNight": string(),
        "description": string()
    }));
    let restaurant = object(json!({
        "name": string(),
        "cuisine": string(),
        "location": string(),
        "priceRange": string(),
        "description": string()
    }));

    object(json!({
        TRIP_OVERVIEW: object(json!({
            "title": string(),
            "destination": string(),
            "duration": string(),
            "summary": string(),
            "bestTimeToVisit": string(),
            "travelStyle": string()
        })),
        DAILY_ITINERARY: { "type": "array", "items": day },
        ACCOMMODATIONS: { "type": "array", "items": accommodation },
        RESTAURANTS: { "type": "array", "items": restaurant },
        TRANSPORTATION: object(json!({
            "gettingThere": string(),
            "localTransport": string(),
            "tips": string_list()
        })),
        PRACTICAL_INFO: object(json!({
            "visaRequirements": string(),
            "currency": string(),
            "language": string(),
            "emergencyNumbers": string(),
            "packingTips": string_list(),
            "safetyTips": string_list()
        })),
        BUDGET_BREAKDOWN: object(json!({
            "accommodation": { "type": "number" },
            "food": { "type": "number" },
            "activities": { "type": "number" },
            "transportation": { "type": "number" },
            "miscellaneous": { "type": "number" },
            "total": { "type": "number" },
            "currency": string()
        }))
    }))
}
