use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::profile::{Locale, TravelClass, UserProfile};

pub const PERSONALIZATION_THRESHOLD: f64 = 0.1;

static GENERIC_OPENER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^(?:hi|hello|hey|great|sure|okay|ok|perfect)\b[!,.]*\s*").expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PersonalizationMetadata {
    pub completeness: f64,
    pub applied: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PersonalizedPrompt {
    pub text: String,
    pub metadata: PersonalizationMetadata,
}

/// Weighted share of the profile sections that carry data, in `0.0..=1.0`.
pub fn profile_completeness(profile: &UserProfile) -> f64 {
    let has_language = profile.language() != Locale::Unknown;
    let has_currency = profile.currency().is_some();
    let has_city = profile.city().is_some();
    let has_travel_prefs = profile.travel_prefs.as_ref().is_some_and(|prefs| {
        prefs.travel_class.is_some()
            || prefs.seat_preference.is_some()
            || prefs.accommodation_type.is_some()
            || !prefs.preferred_airlines.is_empty()
    });
    let has_activities = !profile.activity_preferences.is_empty();
    let has_behavior = profile.behavior_profile.as_ref().is_some_and(|behavior| {
        behavior.planning_style.is_some()
            || behavior.spending_pattern.is_some()
            || behavior.booking_lead_time.is_some()
    });

    let weighted = [
        (has_language, 0.15),
        (has_currency, 0.15),
        (has_city, 0.15),
        (has_travel_prefs, 0.2),
        (has_activities, 0.2),
        (has_behavior, 0.15),
    ];
    let total: f64 = weighted.iter().map(|(_, weight)| weight).sum();
    let score: f64 = weighted
        .iter()
        .filter(|(present, _)| *present)
        .map(|(_, weight)| weight)
        .sum();

    (score / total).clamp(0.0, 1.0)
}

fn nationality_opener(profile: &UserProfile) -> Option<&'static str> {
    let nationality = profile
        .locale
        .as_ref()
        .and_then(|locale| locale.nationality.as_deref())
        .or_else(|| profile.country())
        .map(|value| value.trim().to_lowercase());

    let by_country = nationality.as_deref().and_then(|value| match value {
        "in" | "ind" | "india" | "indian" => Some("Namaste!"),
        "es" | "mx" | "ar" | "co" | "spain" | "mexico" | "spanish" | "mexican" => Some("¡Hola!"),
        "fr" | "france" | "french" => Some("Bonjour!"),
        "de" | "at" | "germany" | "austria" | "german" => Some("Hallo!"),
        "it" | "italy" | "italian" => Some("Ciao!"),
        "jp" | "japan" | "japanese" => Some("Konnichiwa!"),
        "il" | "israel" | "israeli" => Some("Shalom!"),
        _ => None,
    });

    by_country.or(match profile.language() {
        Locale::Hi => Some("Namaste!"),
        Locale::Es => Some("¡Hola!"),
        Locale::Fr => Some("Bonjour!"),
        Locale::De => Some("Hallo!"),
        Locale::It => Some("Ciao!"),
        Locale::Ja => Some("Konnichiwa!"),
        Locale::He => Some("Shalom!"),
        Locale::En | Locale::Unknown => None,
    })
}

fn travel_class_clause(class: TravelClass) -> Option<&'static str> {
    match class {
        TravelClass::Economy => Some("I'll keep the suggestions budget-friendly."),
        TravelClass::Business | TravelClass::First => {
            Some("I'll prioritize premium options for you.")
        }
        TravelClass::PremiumEconomy => None,
    }
}

/// Template-only adjustment of an outgoing prompt. Returns `None` when the
/// profile is too sparse to personalize.
pub fn personalize_prompt(prompt: &str, profile: &UserProfile) -> Option<PersonalizedPrompt> {
    let completeness = profile_completeness(profile);
    if completeness <= PERSONALIZATION_THRESHOLD {
        return None;
    }

    let mut text = prompt.trim().to_string();
    let mut applied = Vec::new();

    if let Some(opener) = nationality_opener(profile) {
        let body = GENERIC_OPENER.replace(&text, "").to_string();
        text = format!("{opener} {body}");
        applied.push("nationality_greeting".to_string());
    }

    if let Some(clause) = profile.travel_class().and_then(travel_class_clause) {
        text = format!("{text} {clause}");
        applied.push("travel_class".to_string());
    }

    Some(PersonalizedPrompt {
        text,
        metadata: PersonalizationMetadata {
            completeness,
            applied,
        },
    })
}
