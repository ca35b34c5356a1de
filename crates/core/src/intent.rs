use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Collapses runs of whitespace and trims.
pub fn normalize_text(input: &str) -> String {
    input
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim()
        .to_string()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrivialIntent {
    Greeting,
    Thanks,
    Goodbye,
    None,
}

impl TrivialIntent {
    pub fn canned_reply(self) -> Option<&'static str> {
        match self {
            Self::Greeting => Some(
                "Hello! I'm your travel planner. Tell me where you'd like to go and I'll help you plan the trip.",
            ),
            Self::Thanks => Some(
                "You're welcome! Let me know if you'd like to adjust anything or plan another trip.",
            ),
            Self::Goodbye => Some("Goodbye, and happy travels! Come back any time to plan your next trip."),
            Self::None => None,
        }
    }
}

// Whole-utterance matches only, so "hi, plan Goa for 5 days" is not filler.
const FILLER_TAIL: &str = r"(?:\s+(?:there|all|everyone|again|so much|a lot|friend|buddy|team))?[\s!.,?~:)]*$";

static GREETING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:hi+|hello+|hey+|hiya|howdy|yo|greetings|good\s+(?:morning|afternoon|evening|day)|hola|bonjour|salut|hallo|guten\s+tag|ciao|namaste|namaskar|salaam|salam|shalom|konnichiwa|ola|olá|привет|שלום|नमस्ते|مرحبا){FILLER_TAIL}"
    ))
    .expect("greeting vocabulary compiles")
});

static THANKS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:thanks|thank\s+you|thx|ty|tysm|much\s+appreciated|cheers|gracias|merci(?:\s+beaucoup)?|danke(?:\s+schön)?|grazie|obrigad[oa]|dhanyavaad|dhanyavad|shukriya|arigato|спасибо|תודה|धन्यवाद|شكرا){FILLER_TAIL}"
    ))
    .expect("thanks vocabulary compiles")
});

static GOODBYE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"^(?:bye+|goodbye|good\s+bye|bye\s+bye|see\s+(?:you|ya)(?:\s+later|\s+soon)?|later|good\s+night|adios|adiós|au\s+revoir|tschüss|tschuss|arrivederci|alvida|sayonara|до\s+свидания|להתראות|अलविदा){FILLER_TAIL}"
    ))
    .expect("goodbye vocabulary compiles")
});

/// Detects conversational filler before any model call is spent on it.
pub fn detect_trivial_intent(text: &str) -> TrivialIntent {
    let normalized = normalize_text(text).to_lowercase();
    if normalized.is_empty() {
        return TrivialIntent::None;
    }

    if GREETING.is_match(&normalized) {
        TrivialIntent::Greeting
    } else if THANKS.is_match(&normalized) {
        TrivialIntent::Thanks
    } else if GOODBYE.is_match(&normalized) {
        TrivialIntent::Goodbye
    } else {
        TrivialIntent::None
    }
}

/// First-turn classification label returned by the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnIntent {
    Travel,
    Greeting,
    Other,
}

impl TurnIntent {
    /// Reads the label out of a model reply. Anything unrecognised is `Other`.
    pub fn parse_label(raw: &str) -> Self {
        let cleaned = raw
            .trim()
            .trim_matches(|ch: char| !ch.is_alphanumeric())
            .to_lowercase();

        let first_word = cleaned
            .split(|ch: char| !ch.is_alphanumeric())
            .find(|word| !word.is_empty())
            .unwrap_or_default();

        match first_word {
            "travel" => Self::Travel,
            "greeting" => Self::Greeting,
            "other" => Self::Other,
            _ if cleaned.contains("travel") && !cleaned.contains("not travel") => Self::Travel,
            _ => Self::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Travel => "travel",
            Self::Greeting => "greeting",
            Self::Other => "other",
        }
    }
}
