//! Conversation sessions and the session registry.
//!
//! One session per reporting party. The registry hands out a per-session
//! mutex; holding it for the whole of a message keeps that party's messages
//! strictly ordered while other sessions proceed in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use crate::conversation::flows::FlowState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sender {
    Survivor,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HistoryEntry {
    pub sender: Sender,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationSession {
    pub session_id: String,
    pub state: FlowState,
    pub history: Vec<HistoryEntry>,
    /// Incident opened by this session and not yet closed on its side.
    pub active_incident: Option<String>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl ConversationSession {
    pub fn new(session_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            session_id: session_id.to_string(),
            state: FlowState::Start,
            history: Vec::new(),
            active_incident: None,
            created_at: now,
            last_activity: now,
        }
    }

    pub fn record(&mut self, sender: Sender, text: &str, timestamp: DateTime<Utc>) {
        self.history.push(HistoryEntry {
            sender,
            text: text.to_string(),
            timestamp,
        });
        if timestamp > self.last_activity {
            self.last_activity = timestamp;
        }
    }

    pub fn is_idle(&self, now: DateTime<Utc>, timeout: Duration) -> bool {
        now - self.last_activity > timeout
    }

    /// Start a fresh cycle after an idle gap. History is kept.
    pub fn restart(&mut self) {
        self.state = FlowState::Start;
        self.active_incident = None;
    }
}

/// Map from session id to its live conversation.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Mutex<ConversationSession>>>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the session, creating it in START on first contact.
    pub fn get_or_create(&self, session_id: &str, now: DateTime<Utc>) -> Arc<Mutex<ConversationSession>> {
        if let Some(existing) = self.sessions.read().get(session_id) {
            return Arc::clone(existing);
        }

        let mut sessions = self.sessions.write();
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(ConversationSession::new(session_id, now)))),
        )
    }

    pub fn get(&self, session_id: &str) -> Option<Arc<Mutex<ConversationSession>>> {
        self.sessions.read().get(session_id).map(Arc::clone)
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    /// Drop sessions idle longer than `timeout`, returning their ids.
    ///
    /// A session whose lock is held is mid-message and therefore not idle.
    pub fn expire_idle(&self, now: DateTime<Utc>, timeout: Duration) -> Vec<String> {
        let mut sessions = self.sessions.write();
        let expired: Vec<String> = sessions
            .iter()
            .filter(|(_, session)| {
                session
                    .try_lock()
                    .map(|s| s.is_idle(now, timeout))
                    .unwrap_or(false)
            })
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            sessions.remove(id);
        }
        expired
    }

    /// Point-in-time copy of every session.
    pub fn snapshot(&self) -> Vec<ConversationSession> {
        let mut all: Vec<ConversationSession> = self
            .sessions
            .read()
            .values()
            .map(|s| s.lock().clone())
            .collect();
        all.sort_by(|a, b| a.session_id.cmp(&b.session_id));
        all
    }
}
