//! Volunteer responders and the selection policy.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Skill {
    DeEscalation,
    MentalHealth,
    Medical,
    Multilingual,
    CrisisCounseling,
}

impl Skill {
    pub fn as_str(&self) -> &'static str {
        match self {
            Skill::DeEscalation => "de-escalation",
            Skill::MentalHealth => "mental-health",
            Skill::Medical => "medical",
            Skill::Multilingual => "multilingual",
            Skill::CrisisCounseling => "crisis-counseling",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Responder {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub skills: BTreeSet<Skill>,
    #[serde(default = "default_true")]
    pub available: bool,
    #[serde(default = "default_true")]
    pub on_duty: bool,
    /// 0.0 to 5.0.
    #[serde(default)]
    pub rating: f32,
    #[serde(default)]
    pub location: Option<Location>,
    #[serde(default)]
    pub active_incident_ids: BTreeSet<String>,
    #[serde(default = "default_capacity")]
    pub max_concurrent_incidents: usize,
}

fn default_true() -> bool {
    true
}

fn default_capacity() -> usize {
    1
}

impl Responder {
    pub fn new(id: &str, name: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            phone: None,
            skills: BTreeSet::new(),
            available: true,
            on_duty: true,
            rating: 0.0,
            location: None,
            active_incident_ids: BTreeSet::new(),
            max_concurrent_incidents: default_capacity(),
        }
    }

    pub fn with_rating(mut self, rating: f32) -> Self {
        self.rating = rating.clamp(0.0, 5.0);
        self
    }

    pub fn with_capacity(mut self, max: usize) -> Self {
        self.max_concurrent_incidents = max;
        self
    }

    pub fn with_skill(mut self, skill: Skill) -> Self {
        self.skills.insert(skill);
        self
    }

    pub fn has_capacity(&self) -> bool {
        self.active_incident_ids.len() < self.max_concurrent_incidents
    }

    pub fn is_eligible(&self) -> bool {
        self.available && self.on_duty && self.has_capacity()
    }
}

/// Pick a responder from a pool given in registration order.
///
/// Only available, on-duty responders under capacity qualify. The highest
/// rating wins; equal ratings go to whoever registered first.
pub fn select_responder<'a, I>(pool: I) -> Option<&'a Responder>
where
    I: IntoIterator<Item = &'a Responder>,
{
    pool.into_iter()
        .filter(|r| r.is_eligible())
        .fold(None::<&'a Responder>, |best, candidate| match best {
            Some(current) if candidate.rating.total_cmp(&current.rating).is_le() => Some(current),
            _ => Some(candidate),
        })
}
