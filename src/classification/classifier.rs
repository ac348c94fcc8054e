//! Deterministic keyword classifier.
//!
//! Maps message text to a [`Classification`] with an ordered cascade of
//! category rules. Rules are evaluated top to bottom and the first rule with
//! a matching keyword wins.
//!
//! # Decision Tree
//! 1. Self-harm / death language -> suicide_risk
//! 2. Weapon mention -> armed_threat
//! 3. Kill / murder threat -> homicide_threat
//! 4. Explicit emergency or police request -> emergency_request
//! 5. Active assault -> physical_assault
//! 6. Unwanted touching -> physical_contact
//! 7. Partner / domestic context -> domestic_violence
//! 8. Followed / stalked -> following
//! 9. "unsafe" / "not safe" -> unsafe_location
//! 10. Fear words -> fear_response
//! 11. Harassment words -> harassment
//! 12. Alone / isolated -> preventive_safety
//! 13. Discomfort words -> uncomfortable_situation
//! 14. "help" -> help_request
//! 15. Greeting -> conversational
//! 16. Otherwise -> needs_assessment

use serde::{Deserialize, Serialize};

use crate::classification::category::{Category, Emotion, RecommendedAction};
use crate::classification::escalation;

/// Where a classification came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassificationSource {
    Keyword,
    Augmented,
}

/// Result of triaging one message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Classification {
    pub category: Category,
    pub urgency_score: u8,
    pub emotion: Emotion,
    pub emotion_intensity: Option<u8>,
    pub police_needed: bool,
    pub community_resolution: bool,
    pub recommended_action: RecommendedAction,
    pub reasoning: String,
    pub key_indicators: Vec<String>,
    pub source: ClassificationSource,
    /// Reply text suggested by the augmentation service, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_response: Option<String>,
}

impl Classification {
    /// Build the classification fixed by a category's rule.
    pub fn from_category(category: Category, matched: Option<&str>) -> Self {
        let profile = category.profile();

        let mut key_indicators: Vec<String> =
            profile.key_indicators.iter().map(|s| s.to_string()).collect();
        if let Some(keyword) = matched {
            key_indicators.insert(0, format!("keyword: \"{}\"", keyword));
        }

        let mut classification = Self {
            category,
            urgency_score: profile.urgency,
            emotion: profile.emotion,
            emotion_intensity: Some(profile.emotion_intensity),
            police_needed: profile.police_needed,
            community_resolution: false,
            recommended_action: RecommendedAction::for_urgency(profile.urgency),
            reasoning: profile.reasoning.to_string(),
            key_indicators,
            source: ClassificationSource::Keyword,
            suggested_response: None,
        };
        escalation::enforce(&mut classification);
        classification
    }

    pub fn is_dispatch_worthy(&self, threshold: u8) -> bool {
        self.urgency_score >= threshold
    }
}

/// How a keyword is compared against the lowercased message.
#[derive(Debug, Clone, Copy)]
enum Keyword {
    /// Substring anywhere in the message.
    Contains(&'static str),
    /// The whole trimmed message.
    Whole(&'static str),
}

impl Keyword {
    fn matches(&self, lowered: &str) -> bool {
        match self {
            Keyword::Contains(k) => lowered.contains(k),
            Keyword::Whole(k) => lowered.trim() == *k,
        }
    }

    fn text(&self) -> &'static str {
        match self {
            Keyword::Contains(k) | Keyword::Whole(k) => k,
        }
    }
}

use Keyword::{Contains, Whole};

struct Rule {
    category: Category,
    keywords: &'static [Keyword],
}

/// The canonical ordered cascade. Order is precedence.
static RULES: &[Rule] = &[
    Rule {
        category: Category::SuicideRisk,
        keywords: &[
            Contains("suicid"),
            Contains("kill myself"),
            Contains("end my life"),
            Contains("want to die"),
            Contains("wanna die"),
            Contains("self harm"),
            Contains("self-harm"),
            Contains("hurt myself"),
            Contains("better off dead"),
            Contains("no reason to live"),
        ],
    },
    Rule {
        category: Category::ArmedThreat,
        keywords: &[
            Contains("gun"),
            Contains("knife"),
            Contains("weapon"),
            Contains("shoot"),
            Contains("firearm"),
            Contains("pistol"),
            Contains("machete"),
        ],
    },
    Rule {
        category: Category::HomicideThreat,
        keywords: &[Contains("kill"), Contains("murder")],
    },
    Rule {
        category: Category::EmergencyRequest,
        keywords: &[
            Contains("911"),
            Contains("emergency"),
            Contains("call the police"),
            Contains("call police"),
            Contains("need police"),
            Contains("help now"),
        ],
    },
    Rule {
        category: Category::PhysicalAssault,
        keywords: &[
            Contains("assault"),
            Contains("attack"),
            Contains("hitting me"),
            Contains("hit me"),
            Contains("beating"),
            Contains("punched"),
            Contains("choking"),
            Contains("raped"),
            Contains("raping"),
        ],
    },
    Rule {
        category: Category::PhysicalContact,
        keywords: &[
            Contains("grabbed"),
            Contains("grabbing"),
            Contains("groped"),
            Contains("groping"),
            Contains("touching me"),
            Contains("touched me"),
            Contains("pushed"),
            Contains("won't let go"),
        ],
    },
    Rule {
        category: Category::DomesticViolence,
        keywords: &[
            Contains("domestic"),
            Contains("abuse"),
            Contains("boyfriend"),
            Contains("husband"),
            Contains("partner"),
            Contains("my ex"),
        ],
    },
    Rule {
        category: Category::Following,
        keywords: &[
            Contains("follow"),
            Contains("stalk"),
            Contains("chasing"),
            Contains("behind me"),
        ],
    },
    Rule {
        category: Category::UnsafeLocation,
        keywords: &[Contains("unsafe"), Contains("not safe")],
    },
    Rule {
        category: Category::FearResponse,
        keywords: &[
            Contains("scared"),
            Contains("afraid"),
            Contains("terrified"),
            Contains("frightened"),
        ],
    },
    Rule {
        category: Category::Harassment,
        keywords: &[
            Contains("harass"),
            Contains("catcall"),
            Contains("yelling"),
            Contains("won't leave"),
            Contains("wont leave"),
        ],
    },
    Rule {
        category: Category::PreventiveSafety,
        keywords: &[Contains("alone"), Contains("isolated")],
    },
    Rule {
        category: Category::UncomfortableSituation,
        keywords: &[
            Contains("creepy"),
            Contains("weird"),
            Contains("uncomfortable"),
            Contains("staring"),
        ],
    },
    Rule {
        category: Category::HelpRequest,
        keywords: &[Contains("help")],
    },
    Rule {
        category: Category::Conversational,
        keywords: &[
            Whole("hi"),
            Whole("hey"),
            Whole("yo"),
            Whole("ok"),
            Whole("okay"),
            Contains("hello"),
            Contains("thank"),
            Contains("good morning"),
            Contains("good evening"),
            Contains("how are you"),
        ],
    },
];

/// Classify a message. Total, pure and deterministic.
pub fn classify(text: &str) -> Classification {
    let lowered = text.to_lowercase();

    for rule in RULES {
        if let Some(keyword) = rule.keywords.iter().find(|k| k.matches(&lowered)) {
            return Classification::from_category(rule.category, Some(keyword.text()));
        }
    }

    Classification::from_category(Category::NeedsAssessment, None)
}
