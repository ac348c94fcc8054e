//! Category, emotion and action vocabularies.
//!
//! Everything a matched rule fixes besides its keywords (emotion, intensity,
//! reasoning text, audit indicators, dashboard styling) is data keyed by
//! [`Category`], not control flow.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Triage category, in cascade precedence order (highest first).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    SuicideRisk,
    ArmedThreat,
    HomicideThreat,
    EmergencyRequest,
    PhysicalAssault,
    PhysicalContact,
    DomesticViolence,
    Following,
    UnsafeLocation,
    FearResponse,
    Harassment,
    PreventiveSafety,
    UncomfortableSituation,
    HelpRequest,
    Conversational,
    NeedsAssessment,
}

impl Category {
    pub const ALL: [Category; 16] = [
        Category::SuicideRisk,
        Category::ArmedThreat,
        Category::HomicideThreat,
        Category::EmergencyRequest,
        Category::PhysicalAssault,
        Category::PhysicalContact,
        Category::DomesticViolence,
        Category::Following,
        Category::UnsafeLocation,
        Category::FearResponse,
        Category::Harassment,
        Category::PreventiveSafety,
        Category::UncomfortableSituation,
        Category::HelpRequest,
        Category::Conversational,
        Category::NeedsAssessment,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::SuicideRisk => "suicide_risk",
            Category::ArmedThreat => "armed_threat",
            Category::HomicideThreat => "homicide_threat",
            Category::EmergencyRequest => "emergency_request",
            Category::PhysicalAssault => "physical_assault",
            Category::PhysicalContact => "physical_contact",
            Category::DomesticViolence => "domestic_violence",
            Category::Following => "following",
            Category::UnsafeLocation => "unsafe_location",
            Category::FearResponse => "fear_response",
            Category::Harassment => "harassment",
            Category::PreventiveSafety => "preventive_safety",
            Category::UncomfortableSituation => "uncomfortable_situation",
            Category::HelpRequest => "help_request",
            Category::Conversational => "conversational",
            Category::NeedsAssessment => "needs_assessment",
        }
    }

    /// Parse a category label, accepting the aliases model output uses.
    ///
    /// Returns `None` for unknown labels and for the catch-all `other`, so a
    /// vague external answer never displaces a concrete keyword match.
    pub fn parse(label: &str) -> Option<Category> {
        let normalized = label.trim().to_lowercase().replace([' ', '-'], "_");
        let category = match normalized.as_str() {
            "suicide_risk" | "suicide" | "self_harm" => Category::SuicideRisk,
            "armed_threat" | "weapon" | "life_threatening" => Category::ArmedThreat,
            "homicide_threat" | "homicide" => Category::HomicideThreat,
            "emergency_request" | "emergency" => Category::EmergencyRequest,
            "physical_assault" | "assault" | "sexual_assault" => Category::PhysicalAssault,
            "physical_contact" => Category::PhysicalContact,
            "domestic_violence" | "domestic" => Category::DomesticViolence,
            "following" | "stalking" | "followed" => Category::Following,
            "unsafe_location" => Category::UnsafeLocation,
            "fear_response" | "general_fear" => Category::FearResponse,
            "harassment" => Category::Harassment,
            "preventive_safety" => Category::PreventiveSafety,
            "uncomfortable_situation" | "uncomfortable" => Category::UncomfortableSituation,
            "help_request" => Category::HelpRequest,
            "conversational" => Category::Conversational,
            "needs_assessment" => Category::NeedsAssessment,
            _ => return None,
        };
        Some(category)
    }

    /// Fixed classification data for this category.
    pub fn profile(&self) -> &'static CategoryProfile {
        match self {
            Category::SuicideRisk => &SUICIDE_RISK,
            Category::ArmedThreat => &ARMED_THREAT,
            Category::HomicideThreat => &HOMICIDE_THREAT,
            Category::EmergencyRequest => &EMERGENCY_REQUEST,
            Category::PhysicalAssault => &PHYSICAL_ASSAULT,
            Category::PhysicalContact => &PHYSICAL_CONTACT,
            Category::DomesticViolence => &DOMESTIC_VIOLENCE,
            Category::Following => &FOLLOWING,
            Category::UnsafeLocation => &UNSAFE_LOCATION,
            Category::FearResponse => &FEAR_RESPONSE,
            Category::Harassment => &HARASSMENT,
            Category::PreventiveSafety => &PREVENTIVE_SAFETY,
            Category::UncomfortableSituation => &UNCOMFORTABLE_SITUATION,
            Category::HelpRequest => &HELP_REQUEST,
            Category::Conversational => &CONVERSATIONAL,
            Category::NeedsAssessment => &NEEDS_ASSESSMENT,
        }
    }

    /// Dashboard styling for this category.
    pub fn presentation(&self) -> Presentation {
        let (label, color, emoji) = match self {
            Category::SuicideRisk => ("Suicide risk", "from-purple-700 to-red-900", "🆘"),
            Category::ArmedThreat => ("Armed threat", "from-red-700 to-red-900", "🔪"),
            Category::HomicideThreat => ("Homicide threat", "from-red-700 to-rose-900", "☠️"),
            Category::EmergencyRequest => ("Emergency", "from-red-600 to-red-800", "🚨"),
            Category::PhysicalAssault => ("Assault", "from-red-500 to-orange-600", "🚑"),
            Category::PhysicalContact => ("Unwanted contact", "from-red-500 to-pink-600", "✋"),
            Category::DomesticViolence => ("Domestic violence", "from-red-600 to-pink-700", "🏠"),
            Category::Following => ("Following", "from-orange-500 to-yellow-500", "👣"),
            Category::UnsafeLocation => ("Unsafe location", "from-yellow-400 to-amber-500", "📍"),
            Category::FearResponse => ("Fear", "from-amber-400 to-orange-500", "😰"),
            Category::Harassment => ("Harassment", "from-pink-500 to-pink-700", "📢"),
            Category::PreventiveSafety => ("Preventive", "from-teal-400 to-cyan-500", "🛡️"),
            Category::UncomfortableSituation => ("Uncomfortable", "from-yellow-400 to-lime-500", "😟"),
            Category::HelpRequest => ("Help request", "from-violet-500 to-purple-600", "🙋"),
            Category::Conversational => ("Conversation", "from-slate-400 to-slate-500", "💬"),
            Category::NeedsAssessment => ("Needs assessment", "from-blue-500 to-cyan-500", "❔"),
        };
        Presentation { label, color, emoji }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Emotional state attached to a classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Despair,
    Terror,
    Panic,
    Fear,
    Anxiety,
    Discomfort,
    Unease,
    Concern,
    Calm,
}

impl Emotion {
    pub fn as_str(&self) -> &'static str {
        match self {
            Emotion::Despair => "despair",
            Emotion::Terror => "terror",
            Emotion::Panic => "panic",
            Emotion::Fear => "fear",
            Emotion::Anxiety => "anxiety",
            Emotion::Discomfort => "discomfort",
            Emotion::Unease => "unease",
            Emotion::Concern => "concern",
            Emotion::Calm => "calm",
        }
    }

    pub fn parse(label: &str) -> Option<Emotion> {
        let emotion = match label.trim().to_lowercase().as_str() {
            "despair" | "hopeless" => Emotion::Despair,
            "terror" | "terrified" => Emotion::Terror,
            "panic" => Emotion::Panic,
            "fear" | "afraid" | "scared" => Emotion::Fear,
            "anxiety" | "anxious" | "alert" => Emotion::Anxiety,
            "discomfort" | "annoyed" => Emotion::Discomfort,
            "unease" => Emotion::Unease,
            "concern" => Emotion::Concern,
            "calm" | "relief" => Emotion::Calm,
            _ => return None,
        };
        Some(emotion)
    }
}

impl fmt::Display for Emotion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the coordinator should do with a classified message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecommendedAction {
    DispatchImmediate,
    DispatchMonitor,
    ProvideResources,
}

impl RecommendedAction {
    /// ≥8 dispatch immediately, 6–7 dispatch and monitor, else resources.
    pub fn for_urgency(urgency: u8) -> Self {
        match urgency {
            8..=u8::MAX => RecommendedAction::DispatchImmediate,
            6 | 7 => RecommendedAction::DispatchMonitor,
            _ => RecommendedAction::ProvideResources,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RecommendedAction::DispatchImmediate => "dispatch_immediate",
            RecommendedAction::DispatchMonitor => "dispatch_monitor",
            RecommendedAction::ProvideResources => "provide_resources",
        }
    }
}

impl fmt::Display for RecommendedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Static data fixed by a category's rule.
#[derive(Debug)]
pub struct CategoryProfile {
    pub urgency: u8,
    pub police_needed: bool,
    pub emotion: Emotion,
    pub emotion_intensity: u8,
    pub reasoning: &'static str,
    pub key_indicators: &'static [&'static str],
}

static SUICIDE_RISK: CategoryProfile = CategoryProfile {
    urgency: 10,
    police_needed: true,
    emotion: Emotion::Despair,
    emotion_intensity: 10,
    reasoning: "Language indicating self-harm or intent to die; immediate crisis intervention required.",
    key_indicators: &["self-harm language", "risk to life", "crisis intervention"],
};

static ARMED_THREAT: CategoryProfile = CategoryProfile {
    urgency: 10,
    police_needed: true,
    emotion: Emotion::Terror,
    emotion_intensity: 10,
    reasoning: "A weapon is mentioned; treat as an armed threat to life.",
    key_indicators: &["weapon present", "risk to life", "police required"],
};

static HOMICIDE_THREAT: CategoryProfile = CategoryProfile {
    urgency: 10,
    police_needed: true,
    emotion: Emotion::Terror,
    emotion_intensity: 10,
    reasoning: "Threat to kill reported; imminent danger to life.",
    key_indicators: &["threat to kill", "risk to life", "police required"],
};

static EMERGENCY_REQUEST: CategoryProfile = CategoryProfile {
    urgency: 10,
    police_needed: true,
    emotion: Emotion::Panic,
    emotion_intensity: 9,
    reasoning: "Explicit request for emergency services or police.",
    key_indicators: &["explicit emergency request", "police requested"],
};

static PHYSICAL_ASSAULT: CategoryProfile = CategoryProfile {
    urgency: 10,
    police_needed: true,
    emotion: Emotion::Panic,
    emotion_intensity: 10,
    reasoning: "Active physical or sexual assault described.",
    key_indicators: &["active assault", "injury risk", "police required"],
};

static PHYSICAL_CONTACT: CategoryProfile = CategoryProfile {
    urgency: 9,
    police_needed: true,
    emotion: Emotion::Fear,
    emotion_intensity: 8,
    reasoning: "Unwanted physical contact reported; escalation risk is high.",
    key_indicators: &["unwanted contact", "escalation risk"],
};

static DOMESTIC_VIOLENCE: CategoryProfile = CategoryProfile {
    urgency: 9,
    police_needed: true,
    emotion: Emotion::Fear,
    emotion_intensity: 9,
    reasoning: "Partner or domestic context; abuse situations escalate quickly.",
    key_indicators: &["domestic context", "known aggressor", "escalation risk"],
};

static FOLLOWING: CategoryProfile = CategoryProfile {
    urgency: 9,
    police_needed: false,
    emotion: Emotion::Fear,
    emotion_intensity: 8,
    reasoning: "Being followed or stalked; a nearby responder can intervene.",
    key_indicators: &["being followed", "active pursuit"],
};

static UNSAFE_LOCATION: CategoryProfile = CategoryProfile {
    urgency: 8,
    police_needed: false,
    emotion: Emotion::Fear,
    emotion_intensity: 7,
    reasoning: "Reports feeling unsafe at the current location.",
    key_indicators: &["unsafe location", "needs presence"],
};

static FEAR_RESPONSE: CategoryProfile = CategoryProfile {
    urgency: 8,
    police_needed: false,
    emotion: Emotion::Fear,
    emotion_intensity: 7,
    reasoning: "Strong fear expressed without a named threat.",
    key_indicators: &["fear expressed", "unclear threat"],
};

static HARASSMENT: CategoryProfile = CategoryProfile {
    urgency: 7,
    police_needed: false,
    emotion: Emotion::Discomfort,
    emotion_intensity: 6,
    reasoning: "Verbal harassment or persistent unwanted attention.",
    key_indicators: &["verbal harassment", "persistent attention"],
};

static PREVENTIVE_SAFETY: CategoryProfile = CategoryProfile {
    urgency: 6,
    police_needed: false,
    emotion: Emotion::Anxiety,
    emotion_intensity: 5,
    reasoning: "Alone or isolated; preventive check-in or escort is appropriate.",
    key_indicators: &["isolation", "preventive support"],
};

static UNCOMFORTABLE_SITUATION: CategoryProfile = CategoryProfile {
    urgency: 6,
    police_needed: false,
    emotion: Emotion::Unease,
    emotion_intensity: 5,
    reasoning: "Discomfort with a person or situation; monitor and offer options.",
    key_indicators: &["discomfort", "situational unease"],
};

static HELP_REQUEST: CategoryProfile = CategoryProfile {
    urgency: 7,
    police_needed: false,
    emotion: Emotion::Anxiety,
    emotion_intensity: 6,
    reasoning: "Generic request for help; situation not yet described.",
    key_indicators: &["help requested", "details needed"],
};

static CONVERSATIONAL: CategoryProfile = CategoryProfile {
    urgency: 3,
    police_needed: false,
    emotion: Emotion::Calm,
    emotion_intensity: 2,
    reasoning: "Greeting or conversational message; no threat indicated.",
    key_indicators: &["conversational"],
};

static NEEDS_ASSESSMENT: CategoryProfile = CategoryProfile {
    urgency: 5,
    police_needed: false,
    emotion: Emotion::Concern,
    emotion_intensity: 4,
    reasoning: "No known indicators matched; follow up to assess the situation.",
    key_indicators: &["needs assessment"],
};

/// Dashboard styling for a category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Presentation {
    pub label: &'static str,
    pub color: &'static str,
    pub emoji: &'static str,
}

impl Presentation {
    pub const DEFAULT: Presentation = Presentation {
        label: "Other",
        color: "from-blue-500 to-cyan-500",
        emoji: "❔",
    };

    /// Styling for a raw category label (e.g. from a stored record or an
    /// older client). Unknown labels get [`Presentation::DEFAULT`].
    pub fn for_label(label: &str) -> Presentation {
        match Category::parse(label) {
            Some(category) => category.presentation(),
            None => Presentation::DEFAULT,
        }
    }
}
