use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::itinerary::{
    ACCOMMODATIONS, BUDGET_BREAKDOWN, CORE_BUDGET_CATEGORIES, DAILY_ITINERARY, PRACTICAL_INFO,
    RESTAURANTS, TRANSPORTATION, TRIP_OVERVIEW,
};
use crate::models::{CategoryFindings, ClarificationState, ValidationReport};
use crate::sanitize::{sanitize_text, sanitize_value};

pub const MAX_ACTIVITIES_PER_DAY: usize = 15;
pub const MAX_MARKETING_PHRASES: usize = 3;
pub const MIN_PLAUSIBLE_BUDGET: f64 = 50.0;
pub const MAX_PLAUSIBLE_BUDGET: f64 = 1_000_000.0;

static BLOCKLIST: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        (
            "self_harm",
            r"(?i)\b(?:suicide|self[-\s]?harm|kill\s+(?:yourself|myself)|end\s+your\s+life)\b",
        ),
        (
            "weapons",
            r"(?i)\b(?:(?:buy|purchase|acquire|smuggle)\s+(?:a\s+|some\s+)?(?:guns?|firearms?|weapons?|explosives?|ammunition)|bomb[-\s]?making|(?:make|build)\s+a\s+bomb)\b",
        ),
        (
            "illegal_drugs",
            r"(?i)\b(?:(?:buy|score|purchase|get)\s+(?:some\s+)?(?:cocaine|heroin|meth(?:amphetamine)?|mdma|ecstasy|lsd|illegal\s+drugs)|drug\s+dealers?)\b",
        ),
        (
            "exploitation",
            r"(?i)\b(?:child\s+(?:exploitation|abuse|prostitution)|human\s+trafficking|sex\s+tourism|underage\s+(?:sex|prostitut\w*))\b",
        ),
        (
            "terrorism",
            r"(?i)\b(?:terrorist\s+(?:attack|training|cell)|join\s+(?:isis|al[-\s]?qaeda)|plan\s+an\s+attack)\b",
        ),
        (
            "hate_speech",
            r"(?i)\b(?:hate\s+speech|racial\s+slurs?|inferior\s+(?:race|people)|ethnic\s+cleansing)\b",
        ),
        (
            "scam",
            r"(?i)\b(?:wire\s+(?:money|funds)\s+to|send\s+(?:your\s+)?(?:bank|card|credit\s+card)\s+details|pay\s+(?:only\s+)?(?:in\s+|with\s+)?(?:gift\s+cards|crypto(?:currency)?)|guaranteed\s+(?:visa\s+approval|winnings))\b",
        ),
        (
            "alarmism",
            r"(?i)\b(?:you\s+will\s+(?:die|be\s+killed)|certain\s+death|death\s+trap|guaranteed\s+to\s+be\s+(?:robbed|attacked|kidnapped))\b",
        ),
    ]
    .into_iter()
    .map(|(category, pattern)| (category, Regex::new(pattern).expect("valid blocklist pattern")))
    .collect()
});

static MARKETING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:book\s+now|limited[-\s]time\s+offer|best\s+price\s+guaranteed?|don'?t\s+miss\s+out|act\s+fast|exclusive\s+deal|once[-\s]in[-\s]a[-\s]lifetime|click\s+here|hurry)\b",
    )
    .expect("valid marketing pattern")
});

static DAY_COUNT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)(\d{1,3})\s*-?\s*days?\b").expect("valid regex"));

static CLOCK_TIME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(\d{1,2})(?::(\d{2}))?\s*(a\.?m\.?|p\.?m\.?)?").expect("valid regex")
});

/// Checks generated itineraries for unsafe content, internal consistency and
/// plausibility against what the user asked for. Never blocks: the sanitized
/// output is always produced.
#[derive(Debug, Clone, Copy, Default)]
pub struct OutputValidator;

impl OutputValidator {
    pub fn new() -> Self {
        Self
    }

    pub fn validate(
        &self,
        raw: &str,
        document: Option<&Value>,
        state: &ClarificationState,
    ) -> ValidationReport {
        let mut report = ValidationReport {
            content_safety: check_content_safety(raw),
            ..Default::default()
        };

        match document {
            Some(document) => {
                report.semantic = check_semantics(document);
                let (business, notes) = check_business_logic(document, state);
                report.business_logic = business;
                report.notes = notes;
            }
            None => report
                .semantic
                .error("itinerary response is not a JSON document"),
        }

        report.is_valid = report.error_count() == 0;
        report.sanitized_output = match document {
            Some(document) => serde_json::to_string_pretty(&sanitize_value(document))
                .unwrap_or_else(|_| sanitize_text(raw)),
            None => sanitize_text(raw),
        };
        report
    }
}

pub fn check_content_safety(raw: &str) -> CategoryFindings {
    let mut findings = CategoryFindings::default();

    for (category, pattern) in BLOCKLIST.iter() {
        if pattern.is_match(raw) {
            findings.error(format!("blocked content detected: {category}"));
        }
    }

    let marketing = MARKETING.find_iter(raw).count();
    if marketing > MAX_MARKETING_PHRASES {
        findings.warn(format!(
            "excessive promotional phrasing ({marketing} occurrences)"
        ));
    }

    findings
}

pub fn check_semantics(document: &Value) -> CategoryFindings {
    let mut findings = CategoryFindings::default();

    if !document.get(TRIP_OVERVIEW).is_some_and(Value::is_object) {
        findings.error("trip overview is missing");
    }

    let Some(days) = document.get(DAILY_ITINERARY).and_then(Value::as_array) else {
        findings.error("day-by-day itinerary is missing");
        return findings;
    };
    if days.is_empty() {
        findings.error("day-by-day itinerary contains no days");
    }

    for (idx, day) in days.iter().enumerate() {
        let position = idx + 1;
        match day_number(day) {
            Some(number) if number == position as u64 => {}
            Some(number) => findings.error(format!(
                "day at position {position} is numbered {number}"
            )),
            None => findings.error(format!("day at position {position} has no day number")),
        }

        let activities = day
            .get("activities")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default();
        if activities.is_empty() {
            findings.warn(format!("day {position} has no activities"));
        } else if activities.len() > MAX_ACTIVITIES_PER_DAY {
            findings.warn(format!(
                "day {position} lists {} activities",
                activities.len()
            ));
        }

        // AM/PM slips are common, so out-of-order times only warn.
        let times = activities
            .iter()
            .filter_map(|activity| activity.get("time").and_then(Value::as_str))
            .filter_map(parse_clock_minutes)
            .collect::<Vec<_>>();
        if times.windows(2).any(|pair| pair[1] <= pair[0]) {
            findings.warn(format!("day {position} activity times are not in order"));
        }
    }

    let accommodations = document
        .get(ACCOMMODATIONS)
        .and_then(Value::as_array)
        .map(Vec::len)
        .unwrap_or(0);
    if accommodations > days.len() + 2 {
        findings.warn(format!(
            "{accommodations} accommodations listed for a {}-day trip",
            days.len()
        ));
    }

    match document.get(BUDGET_BREAKDOWN).and_then(Value::as_object) {
        Some(budget) => {
            let missing = CORE_BUDGET_CATEGORIES
                .iter()
                .filter(|category| budget.get(**category).map_or(true, Value::is_null))
                .copied()
                .collect::<Vec<_>>();
            if !missing.is_empty() {
                findings.warn(format!(
                    "budget breakdown is missing: {}",
                    missing.join(", ")
                ));
            }
        }
        None => findings.warn(format!(
            "budget breakdown is missing: {}",
            CORE_BUDGET_CATEGORIES.join(", ")
        )),
    }

    findings
}

/// Returns the business-logic findings plus log-only observations.
pub fn check_business_logic(
    document: &Value,
    state: &ClarificationState,
) -> (CategoryFindings, Vec<String>) {
    let mut findings = CategoryFindings::default();
    let mut notes = Vec::new();

    let generated = document
        .get(DAILY_ITINERARY)
        .and_then(Value::as_array)
        .map(Vec::len);
    let stated = stated_day_count(state);

    if let (Some(generated), Some(stated)) = (generated, stated) {
        let difference = generated.abs_diff(stated);
        match difference {
            0 | 1 => {}
            2 => notes.push(format!(
                "generated {generated} days against a stated {stated}"
            )),
            3..=5 => findings.warn(format!(
                "generated {generated} days but {stated} were requested"
            )),
            _ if stated > 10 && generated < 5 => findings.warn(format!(
                "only {generated} of {stated} requested days were generated"
            )),
            _ => findings.error(format!(
                "generated {generated} days but {stated} were requested"
            )),
        }
    }

    if let Some(total) = budget_total(document) {
        if !(MIN_PLAUSIBLE_BUDGET..=MAX_PLAUSIBLE_BUDGET).contains(&total) {
            findings.warn(format!("budget total {total} looks implausible"));
        }
    }

    for (section, label) in [
        (TRANSPORTATION, "transportation"),
        (RESTAURANTS, "restaurant"),
        (PRACTICAL_INFO, "practical info"),
    ] {
        if is_weak(document.get(section)) {
            findings.warn(format!("{label} section is missing or empty"));
        }
    }

    (findings, notes)
}

fn day_number(day: &Value) -> Option<u64> {
    match day.get("day")? {
        Value::Number(number) => number
            .as_u64()
            .or_else(|| number.as_f64().filter(|value| value.fract() == 0.0 && *value >= 0.0).map(|value| value as u64)),
        Value::String(text) => text
            .trim()
            .trim_start_matches(|ch: char| !ch.is_ascii_digit())
            .parse()
            .ok(),
        _ => None,
    }
}

/// Minutes since midnight for "09:30", "9:30 PM" or "9 am". Bare words like
/// "Morning" are not times.
pub fn parse_clock_minutes(text: &str) -> Option<u32> {
    let captures = CLOCK_TIME.captures(text)?;
    let hour: u32 = captures.get(1)?.as_str().parse().ok()?;
    let minutes = captures.get(2);
    let meridiem = captures
        .get(3)
        .map(|value| value.as_str().to_lowercase().replace('.', ""));
    if minutes.is_none() && meridiem.is_none() {
        return None;
    }
    let minute: u32 = minutes.map_or(Some(0), |value| value.as_str().parse().ok())?;
    if minute > 59 {
        return None;
    }

    let hour = match meridiem.as_deref() {
        Some("am") if hour == 12 => 0,
        Some("pm") if hour < 12 => hour + 12,
        Some(_) if hour > 12 || hour == 0 => return None,
        _ => hour,
    };
    if hour > 23 {
        return None;
    }
    Some(hour * 60 + minute)
}

fn parse_day_count(text: &str) -> Option<usize> {
    DAY_COUNT
        .captures(text)
        .and_then(|captures| captures.get(1))
        .and_then(|value| value.as_str().parse().ok())
        .filter(|days| *days > 0)
}

/// Day count the traveler asked for. The model's own overview is not consulted.
fn stated_day_count(state: &ClarificationState) -> Option<usize> {
    state
        .text_slot("duration")
        .and_then(parse_day_count)
        .or_else(|| state.text_slot("travelDates").and_then(parse_day_count))
}

/// Normalizes "$1,200", "INR 45,000" or a bare number into a float.
pub fn normalize_amount(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => {
            let digits = text
                .chars()
                .filter(|ch| ch.is_ascii_digit() || *ch == '.')
                .collect::<String>();
            digits.trim_matches('.').parse().ok()
        }
        _ => None,
    }
}

fn budget_total(document: &Value) -> Option<f64> {
    let budget = document.get(BUDGET_BREAKDOWN)?.as_object()?;
    if let Some(total) = budget.get("total").and_then(normalize_amount) {
        return Some(total);
    }

    let parts = CORE_BUDGET_CATEGORIES
        .iter()
        .filter_map(|category| budget.get(*category).and_then(normalize_amount))
        .collect::<Vec<_>>();
    (!parts.is_empty()).then(|| parts.iter().sum())
}

fn is_weak(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(text)) => text.trim().is_empty(),
        Some(Value::Array(items)) => items.iter().all(|item| is_weak(Some(item))),
        Some(Value::Object(map)) => map.values().all(|item| is_weak(Some(item))),
        Some(_) => false,
    }
}
