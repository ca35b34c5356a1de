use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Locale {
    En,
    Es,
    Fr,
    De,
    It,
    Hi,
    Ja,
    He,
    Unknown,
}

impl Locale {
    pub fn from_optional_str(value: Option<&str>) -> Self {
        let Some(value) = value else {
            return Self::Unknown;
        };
        let lowered = value.trim().to_lowercase();
        let primary = lowered
            .split(&['-', '_'][..])
            .next()
            .unwrap_or_default();
        match primary {
            "en" | "english" => Self::En,
            "es" | "spanish" | "español" => Self::Es,
            "fr" | "french" | "français" => Self::Fr,
            "de" | "german" | "deutsch" => Self::De,
            "it" | "italian" | "italiano" => Self::It,
            "hi" | "hindi" => Self::Hi,
            "ja" | "japanese" => Self::Ja,
            "he" | "hebrew" => Self::He,
            _ => Self::Unknown,
        }
    }

    pub fn as_code(self) -> &'static str {
        match self {
            Self::En => "en",
            Self::Es => "es",
            Self::Fr => "fr",
            Self::De => "de",
            Self::It => "it",
            Self::Hi => "hi",
            Self::Ja => "ja",
            Self::He => "he",
            Self::Unknown => "unknown",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TravelClass {
    Economy,
    PremiumEconomy,
    Business,
    First,
}

impl TravelClass {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace(&['-', '_'][..], " ").as_str() {
            "economy" | "coach" | "budget" => Some(Self::Economy),
            "premium economy" | "premium" => Some(Self::PremiumEconomy),
            "business" | "business class" => Some(Self::Business),
            "first" | "first class" => Some(Self::First),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocalePrefs {
    pub language: Option<String>,
    pub currency: Option<String>,
    pub timezone: Option<String>,
    pub nationality: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Address {
    pub city: Option<String>,
    pub state: Option<String>,
    pub country: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TravelPrefs {
    pub travel_class: Option<TravelClass>,
    pub seat_preference: Option<String>,
    pub accommodation_type: Option<String>,
    pub preferred_airlines: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Notifications {
    pub email: Option<bool>,
    pub push: Option<bool>,
    pub sms: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    pub planning_style: Option<String>,
    pub spending_pattern: Option<String>,
    pub booking_lead_time: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TravelConstraints {
    pub mobility: Option<String>,
    pub dietary: Vec<String>,
    pub max_flight_hours: Option<u32>,
}

/// Client-side profile. Every part is optional and missing data degrades to
/// defaults; the parser never fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub locale: Option<LocalePrefs>,
    pub address: Option<Address>,
    pub travel_prefs: Option<TravelPrefs>,
    pub notifications: Option<Notifications>,
    pub behavior_profile: Option<BehaviorProfile>,
    /// Activity name to a 1-10 interest score.
    pub activity_preferences: BTreeMap<String, u8>,
    pub travel_constraints: Option<TravelConstraints>,
    pub contextual_intelligence: BTreeMap<String, String>,
    pub personality_insights: BTreeMap<String, String>,
    pub ai_learning_data: BTreeMap<String, String>,
}

impl UserProfile {
    /// Builds a profile from a client blob: either flat dotted keys
    /// (`"address.city"`) or nested objects. Unknown keys are ignored.
    pub fn from_blob(blob: &Value) -> Self {
        let mut flat = BTreeMap::new();
        if let Value::Object(map) = blob {
            flatten_into("", map, &mut flat);
        }

        let mut profile = Self::default();
        for (key, value) in &flat {
            profile.apply(key, value);
        }
        profile
    }

    fn apply(&mut self, key: &str, value: &Value) {
        let (section, field) = key.split_once('.').unwrap_or((key, ""));
        match (section, field) {
            ("locale", "language") | ("locale", "lang") => {
                set_text(&mut self.locale.get_or_insert_with(Default::default).language, value)
            }
            ("locale", "") => {
                set_text(&mut self.locale.get_or_insert_with(Default::default).language, value)
            }
            ("locale", "currency") | ("currency", "") => {
                set_text(&mut self.locale.get_or_insert_with(Default::default).currency, value)
            }
            ("locale", "timezone") => {
                set_text(&mut self.locale.get_or_insert_with(Default::default).timezone, value)
            }
            ("locale", "nationality") | ("nationality", "") => set_text(
                &mut self.locale.get_or_insert_with(Default::default).nationality,
                value,
            ),
            ("address", "city") => {
                set_text(&mut self.address.get_or_insert_with(Default::default).city, value)
            }
            ("address", "state") => {
                set_text(&mut self.address.get_or_insert_with(Default::default).state, value)
            }
            ("address", "country") => {
                set_text(&mut self.address.get_or_insert_with(Default::default).country, value)
            }
            ("travelPrefs", "travelClass") => {
                if let Some(class) = text(value).as_deref().and_then(TravelClass::parse) {
                    self.travel_prefs.get_or_insert_with(Default::default).travel_class =
                        Some(class);
                }
            }
            ("travelPrefs", "seatPreference") => set_text(
                &mut self
                    .travel_prefs
                    .get_or_insert_with(Default::default)
                    .seat_preference,
                value,
            ),
            ("travelPrefs", "accommodationType") => set_text(
                &mut self
                    .travel_prefs
                    .get_or_insert_with(Default::default)
                    .accommodation_type,
                value,
            ),
            ("travelPrefs", field) if field.starts_with("preferredAirlines") => {
                let airlines = list(value);
                if !airlines.is_empty() {
                    self.travel_prefs
                        .get_or_insert_with(Default::default)
                        .preferred_airlines
                        .extend(airlines);
                }
            }
            ("notifications", channel) => {
                let Some(flag) = boolean(value) else {
                    return;
                };
                let notifications = self.notifications.get_or_insert_with(Default::default);
                match channel {
                    "email" => notifications.email = Some(flag),
                    "push" => notifications.push = Some(flag),
                    "sms" => notifications.sms = Some(flag),
                    _ => {}
                }
            }
            ("behaviorProfile", "planningStyle") => set_text(
                &mut self
                    .behavior_profile
                    .get_or_insert_with(Default::default)
                    .planning_style,
                value,
            ),
            ("behaviorProfile", "spendingPattern") => set_text(
                &mut self
                    .behavior_profile
                    .get_or_insert_with(Default::default)
                    .spending_pattern,
                value,
            ),
            ("behaviorProfile", "bookingLeadTime") => set_text(
                &mut self
                    .behavior_profile
                    .get_or_insert_with(Default::default)
                    .booking_lead_time,
                value,
            ),
            ("activityPreferences", activity) if !activity.is_empty() => {
                if let Some(score) = preference_score(value) {
                    self.activity_preferences.insert(activity.to_string(), score);
                }
            }
            ("travelConstraints", "mobility") => set_text(
                &mut self
                    .travel_constraints
                    .get_or_insert_with(Default::default)
                    .mobility,
                value,
            ),
            ("travelConstraints", field) if field.starts_with("dietary") => {
                let items = list(value);
                if !items.is_empty() {
                    self.travel_constraints
                        .get_or_insert_with(Default::default)
                        .dietary
                        .extend(items);
                }
            }
            ("travelConstraints", "maxFlightHours") => {
                if let Some(hours) = number(value).filter(|hours| *hours > 0.0) {
                    self.travel_constraints
                        .get_or_insert_with(Default::default)
                        .max_flight_hours = Some(hours.round() as u32);
                }
            }
            ("contextualIntelligence", field) if !field.is_empty() => {
                insert_text(&mut self.contextual_intelligence, field, value)
            }
            ("personalityInsights", field) if !field.is_empty() => {
                insert_text(&mut self.personality_insights, field, value)
            }
            ("aiLearningData", field) if !field.is_empty() => {
                insert_text(&mut self.ai_learning_data, field, value)
            }
            _ => {}
        }
    }

    pub fn language(&self) -> Locale {
        Locale::from_optional_str(
            self.locale
                .as_ref()
                .and_then(|locale| locale.language.as_deref()),
        )
    }

    pub fn currency(&self) -> Option<&str> {
        self.locale.as_ref()?.currency.as_deref()
    }

    pub fn city(&self) -> Option<&str> {
        self.address.as_ref()?.city.as_deref()
    }

    pub fn country(&self) -> Option<&str> {
        self.address.as_ref()?.country.as_deref()
    }

    pub fn travel_class(&self) -> Option<TravelClass> {
        self.travel_prefs.as_ref()?.travel_class
    }
}

fn flatten_into(prefix: &str, map: &Map<String, Value>, out: &mut BTreeMap<String, Value>) {
    for (key, value) in map {
        let full = if prefix.is_empty() {
            key.clone()
        } else {
            format!("{prefix}.{key}")
        };
        match value {
            Value::Object(inner) => flatten_into(&full, inner, out),
            // Some clients store nested sections as JSON strings.
            Value::String(raw) if raw.trim_start().starts_with('{') => {
                match serde_json::from_str::<Value>(raw) {
                    Ok(Value::Object(inner)) => flatten_into(&full, &inner, out),
                    _ => {
                        out.insert(full, value.clone());
                    }
                }
            }
            other => {
                out.insert(full, other.clone());
            }
        }
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(raw) => {
            let trimmed = raw.trim();
            (!trimmed.is_empty() && !trimmed.eq_ignore_ascii_case("null"))
                .then(|| trimmed.to_string())
        }
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn set_text(slot: &mut Option<String>, value: &Value) {
    if let Some(value) = text(value) {
        *slot = Some(value);
    }
}

fn insert_text(map: &mut BTreeMap<String, String>, key: &str, value: &Value) {
    if let Some(value) = text(value) {
        map.insert(key.to_string(), value);
    }
}

fn number(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(number) => number.as_f64(),
        Value::String(raw) => raw.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed.filter(|value| value.is_finite())
}

fn boolean(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(raw) => match raw.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        Value::String(raw) if raw.trim_start().starts_with('[') => {
            serde_json::from_str::<Vec<Value>>(raw)
                .map(|items| items.iter().filter_map(text).collect())
                .unwrap_or_default()
        }
        other => text(other)
            .map(|raw| {
                raw.split(',')
                    .map(|item| item.trim().to_string())
                    .filter(|item| !item.is_empty())
                    .collect()
            })
            .unwrap_or_default(),
    }
}

/// Scores outside 1-10 are clamped; non-numeric scores are dropped.
pub fn preference_score(value: &Value) -> Option<u8> {
    number(value).map(|score| score.round().clamp(1.0, 10.0) as u8)
}
