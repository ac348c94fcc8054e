//! Triage service.
//!
//! Coordinates the full message workflow:
//! 1. Body sanitisation (empty messages are ignored)
//! 2. Per-session lock and replay check
//! 3. Classification with optional AI augmentation
//! 4. Conversation transition
//! 5. Incident opening and responder dispatch
//! 6. Fake-call side effect
//! 7. Reply composition, replay cache, persistence
//!
//! Lock order is session, then board. The replay cache and event buffer
//! are leaf locks held only for a single call.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use serde::Serialize;

use crate::classification::{classify_with_augmenter, Augmenter, Classification};
use crate::config::{ReplyMode, TriageConfig};
use crate::conversation::{
    fake_call_script, next_state, ConversationSession, FlowAction, FlowState, Sender,
    SessionRegistry, Transition,
};
use crate::dispatch::{
    Arrival, Clock, DispatchBoard, DispatchOutcome, Incident, IncidentStatus, Responder,
    StatusChange, SystemClock, Ticker,
};
use crate::error::TriageResult;
use crate::logging::structured::LogContext;
use crate::security::{sanitize_body, scrub_for_log};
use crate::storage::{
    compute_stats, DispatchRecord, IncidentFilter, IncidentRecord, IncidentStats, IncidentStore,
};

use super::context::InboundMessage;
use super::dedup::ReplayCache;
use super::events::TriageEvent;
use super::reply::{self, DispatchNotice};
use super::voice::{request_call, VoiceGateway};

/// Reply and decisions for one handled message.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TriageReply {
    pub text: String,
    pub state: FlowState,
    pub transition: Transition,
    pub classification: Classification,
    pub incident_id: Option<String>,
    pub dispatch: DispatchNotice,
}

#[derive(Debug, Clone, PartialEq)]
pub enum MessageOutcome {
    /// Empty or whitespace-only body. Nothing changed, nothing to send.
    Ignored,
    /// Retried delivery; carries the reply sent the first time.
    Duplicate(String),
    Handled(TriageReply),
}

impl MessageOutcome {
    pub fn reply_text(&self) -> Option<&str> {
        match self {
            MessageOutcome::Ignored => None,
            MessageOutcome::Duplicate(text) => Some(text),
            MessageOutcome::Handled(reply) => Some(&reply.text),
        }
    }
}

enum PendingWrite {
    Incident(IncidentRecord),
    Dispatch(DispatchRecord),
    Responder(Responder),
}

pub struct TriageService {
    config: TriageConfig,
    sessions: SessionRegistry,
    board: Mutex<DispatchBoard>,
    replays: Mutex<ReplayCache>,
    events: Mutex<Vec<TriageEvent>>,
    ticker: Mutex<Ticker>,
    clock: Arc<dyn Clock>,
    augmenter: Option<Arc<dyn Augmenter>>,
    voice: Option<Arc<dyn VoiceGateway>>,
    store: Option<Arc<dyn IncidentStore>>,
}

impl TriageService {
    pub fn new(config: TriageConfig) -> TriageResult<Self> {
        config.validate()?;
        let interval = Duration::milliseconds(i64::try_from(config.tick_interval_ms).unwrap_or(i64::MAX));

        Ok(Self {
            sessions: SessionRegistry::new(),
            board: Mutex::new(DispatchBoard::new()),
            replays: Mutex::new(ReplayCache::new(config.dedup_capacity)),
            events: Mutex::new(Vec::new()),
            ticker: Mutex::new(Ticker::new(interval)),
            clock: Arc::new(SystemClock),
            augmenter: None,
            voice: None,
            store: None,
            config,
        })
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_augmenter(mut self, augmenter: Arc<dyn Augmenter>) -> Self {
        self.augmenter = Some(augmenter);
        self
    }

    pub fn with_voice_gateway(mut self, voice: Arc<dyn VoiceGateway>) -> Self {
        self.voice = Some(voice);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn IncidentStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &TriageConfig {
        &self.config
    }

    /// Process one inbound message. Never fails towards the reporting party.
    pub fn process_message(&self, message: &InboundMessage) -> MessageOutcome {
        let ctx = message.log_context();
        let body = sanitize_body(&message.body, self.config.max_message_chars, &ctx);
        if body.is_empty() {
            crate::log_event!(ctx, "MESSAGE_EMPTY");
            return MessageOutcome::Ignored;
        }

        let now = self.clock.now();
        let received_at = message.received_at.unwrap_or(now);
        log::info!(
            "{} MESSAGE_RECEIVED chars={} text={}",
            ctx,
            body.text.chars().count(),
            scrub_for_log(&body.text)
        );

        let handle = self.sessions.get_or_create(&message.session_id, now);
        let mut session = handle.lock();

        let replay_key = message.dedup_key();
        if let Some(key) = &replay_key {
            if let Some(previous) = self.replays.lock().get(key) {
                log::info!("{} MESSAGE_DUPLICATE key={}", ctx, key);
                return MessageOutcome::Duplicate(previous.to_string());
            }
        }

        if !session.history.is_empty() && session.is_idle(now, self.idle_timeout()) {
            log::info!(
                "{} SESSION_EXPIRED idle_secs={} state={} action=restart",
                ctx,
                (now - session.last_activity).num_seconds(),
                session.state
            );
            session.restart();
        } else if session.state.is_terminal() && session.state.spec().option(&body.text).is_none() {
            // A closed conversation starts over on anything but its own menu.
            crate::log_event!(ctx, "SESSION_REOPENED", state = session.state);
            session.restart();
        }
        session.record(Sender::Survivor, &body.text, received_at);

        let classification = classify_with_augmenter(
            &body.text,
            self.augmenter.as_ref(),
            self.config.ai_timeout(),
            &ctx,
        );
        log::info!(
            "{} CLASSIFIED category={} urgency={} police_needed={} action={}",
            ctx,
            classification.category,
            classification.urgency_score,
            classification.police_needed,
            classification.recommended_action
        );

        let transition = next_state(
            session.state,
            &body.text,
            &classification,
            self.config.emergency_override_urgency,
            &ctx,
        );
        session.state = transition.to;
        let action = transition.to.spec().action;

        let (incident_id, notice, writes) =
            self.update_incident(&mut session, &body.text, &classification, &transition, now, &ctx);

        if action == Some(FlowAction::ExecuteFakeCall) {
            self.fake_call(&session.session_id, transition.to, &ctx);
        }

        let text = match self.config.reply_mode {
            ReplyMode::Guided => reply::guided(transition.to, &classification, &notice),
            ReplyMode::Operator => reply::operator(&classification, &transition, &notice),
        };
        session.record(Sender::System, &text, now);

        if let Some(key) = replay_key {
            self.replays.lock().insert(key, text.clone());
        }

        let persist_ctx = match &incident_id {
            Some(id) => ctx.with_incident(id),
            None => ctx.clone(),
        };
        self.persist(writes, &persist_ctx);

        MessageOutcome::Handled(TriageReply {
            text,
            state: transition.to,
            transition,
            classification,
            incident_id,
            dispatch: notice,
        })
    }

    /// Incident bookkeeping for one message, under the board lock.
    fn update_incident(
        &self,
        session: &mut ConversationSession,
        text: &str,
        classification: &Classification,
        transition: &Transition,
        now: DateTime<Utc>,
        ctx: &LogContext,
    ) -> (Option<String>, DispatchNotice, Vec<PendingWrite>) {
        let mut board = self.board.lock();
        let mut writes = Vec::new();

        // An incident closed by an operator no longer belongs to the session.
        if let Some(id) = &session.active_incident {
            if board.incident(id).map_or(true, |i| i.status.is_terminal()) {
                session.active_incident = None;
            }
        }

        let action = transition.to.spec().action;
        let resolving = action == Some(FlowAction::ResolveIncident);
        let police_only = classification.police_needed && !self.config.dispatch_when_police_needed;
        let wants_dispatch = !resolving
            && !police_only
            && (classification.is_dispatch_worthy(self.config.dispatch_threshold)
                || action.map_or(false, |a| a.implies_dispatch()));

        let incident_id = match session.active_incident.clone() {
            Some(id) => {
                if let Some(incident) = board.incident_mut(&id) {
                    if incident.absorb(classification, now) {
                        writes.push(PendingWrite::Incident(IncidentRecord::from(&*incident)));
                    }
                }
                Some(id)
            }
            None if !resolving
                && (transition.from == FlowState::Start
                    || wants_dispatch
                    || classification.police_needed) =>
            {
                let incident = Incident::new(&session.session_id, text, classification.clone(), now);
                let id = incident.id.clone();
                log::info!(
                    "{} INCIDENT_OPENED category={} urgency={} police_needed={}",
                    ctx.with_incident(&id),
                    classification.category,
                    classification.urgency_score,
                    classification.police_needed
                );
                self.emit(TriageEvent::IncidentOpened {
                    incident_id: id.clone(),
                    category: classification.category,
                    urgency: classification.urgency_score,
                    police_needed: classification.police_needed,
                });
                writes.push(PendingWrite::Incident(IncidentRecord::from(&incident)));
                board.insert_incident(incident);
                session.active_incident = Some(id.clone());
                Some(id)
            }
            None => None,
        };

        let Some(id) = incident_id.as_deref() else {
            return (None, DispatchNotice::NotRequired, writes);
        };
        let ictx = ctx.with_incident(id);

        if resolving {
            session.active_incident = None;
            let still_open = board.incident(id).map(|i| i.status) == Some(IncidentStatus::Open);
            if still_open {
                if let Ok(change) = board.cancel(id, now) {
                    self.record_change(&change, &ictx);
                    writes.extend(self.snapshot_writes(&board, id));
                }
            }
            return (incident_id, DispatchNotice::NotRequired, writes);
        }

        let notice = if wants_dispatch {
            self.ensure_dispatch(&mut board, id, now, &ictx, &mut writes)
        } else {
            DispatchNotice::NotRequired
        };

        (incident_id, notice, writes)
    }

    fn ensure_dispatch(
        &self,
        board: &mut DispatchBoard,
        incident_id: &str,
        now: DateTime<Utc>,
        ctx: &LogContext,
        writes: &mut Vec<PendingWrite>,
    ) -> DispatchNotice {
        let per_km = self.config.eta_minutes_per_km;

        match board.dispatch(incident_id, &self.config, now) {
            Ok(DispatchOutcome::Created(dispatch)) => {
                let eta_minutes = dispatch.eta_minutes(per_km);
                log::info!(
                    "{} DISPATCH_CREATED responder={} distance_km={:.2} eta_min={}",
                    ctx,
                    dispatch.responder_id,
                    dispatch.distance_remaining_km,
                    eta_minutes
                );
                self.emit(TriageEvent::DispatchCreated {
                    incident_id: incident_id.to_string(),
                    responder_id: dispatch.responder_id.clone(),
                    eta_minutes,
                });
                writes.extend(self.snapshot_writes(board, incident_id));
                DispatchNotice::Dispatched {
                    responder_name: dispatch.responder_name,
                    eta_minutes,
                }
            }
            Ok(DispatchOutcome::Existing(dispatch)) => DispatchNotice::EnRoute {
                eta_minutes: dispatch.eta_minutes(per_km),
                responder_name: dispatch.responder_name,
                arrived: dispatch.arrived,
            },
            Ok(DispatchOutcome::NoResponder) => {
                log::warn!("{} DISPATCH_NO_RESPONDER status=open", ctx);
                self.emit(TriageEvent::NoResponderAvailable {
                    incident_id: incident_id.to_string(),
                });
                DispatchNotice::NoResponder
            }
            Err(e) => {
                // Accepted or on scene without a live dispatch: nothing to add.
                log::debug!("{} DISPATCH_SKIPPED reason={}", ctx, e);
                DispatchNotice::NotRequired
            }
        }
    }

    fn fake_call(&self, session_id: &str, state: FlowState, ctx: &LogContext) {
        let Some(script) = fake_call_script(state) else {
            return;
        };
        log::info!(
            "{} FAKE_CALL_REQUESTED state={} gateway={}",
            ctx,
            state,
            self.voice.is_some()
        );
        self.emit(TriageEvent::FakeCallRequested {
            session_id: session_id.to_string(),
            state,
        });
        if let Some(voice) = &self.voice {
            request_call(voice, session_id, script, ctx);
        }
    }

    /// Responder (or operator on their behalf) accepts an incident.
    ///
    /// `Ok(None)` means it was already accepted by this responder.
    pub fn accept_incident(&self, incident_id: &str, responder_id: &str) -> TriageResult<Option<StatusChange>> {
        let now = self.clock.now();
        let ctx = LogContext::operator().with_incident(incident_id);

        let (change, writes) = {
            let mut board = self.board.lock();
            let had_dispatch = board.live_dispatch_for(incident_id).is_some();
            let change = board.accept(incident_id, responder_id, &self.config, now)?;

            if !had_dispatch {
                if let Some(dispatch) = board.live_dispatch_for(incident_id) {
                    let eta_minutes = dispatch.eta_minutes(self.config.eta_minutes_per_km);
                    log::info!(
                        "{} DISPATCH_CREATED responder={} distance_km={:.2} eta_min={} via=accept",
                        ctx,
                        responder_id,
                        dispatch.distance_remaining_km,
                        eta_minutes
                    );
                    self.emit(TriageEvent::DispatchCreated {
                        incident_id: incident_id.to_string(),
                        responder_id: responder_id.to_string(),
                        eta_minutes,
                    });
                }
            }
            match &change {
                Some(change) => self.record_change(change, &ctx),
                None => log::info!("{} INCIDENT_STATUS status=accepted unchanged=true", ctx),
            }
            (change, self.snapshot_writes(&board, incident_id))
        };

        self.persist(writes, &ctx);
        Ok(change)
    }

    /// Assigned responder reports arrival; distance is pinned at zero.
    pub fn mark_on_scene(&self, incident_id: &str, responder_id: &str) -> TriageResult<StatusChange> {
        let now = self.clock.now();
        let ctx = LogContext::operator().with_incident(incident_id);

        let (change, writes) = {
            let mut board = self.board.lock();
            let (change, newly_arrived) = board.mark_on_scene(incident_id, responder_id, now)?;
            if newly_arrived {
                self.arrived(
                    &Arrival {
                        incident_id: incident_id.to_string(),
                        responder_id: responder_id.to_string(),
                    },
                    "report",
                );
            }
            self.record_change(&change, &ctx);
            (change, self.snapshot_writes(&board, incident_id))
        };

        self.persist(writes, &ctx);
        Ok(change)
    }

    pub fn resolve_incident(&self, incident_id: &str) -> TriageResult<StatusChange> {
        self.close_incident(incident_id, IncidentStatus::Resolved)
    }

    pub fn cancel_incident(&self, incident_id: &str) -> TriageResult<StatusChange> {
        self.close_incident(incident_id, IncidentStatus::Cancelled)
    }

    fn close_incident(&self, incident_id: &str, to: IncidentStatus) -> TriageResult<StatusChange> {
        let now = self.clock.now();
        let ctx = LogContext::operator().with_incident(incident_id);

        let (change, writes) = {
            let mut board = self.board.lock();
            let change = match to {
                IncidentStatus::Resolved => board.resolve(incident_id, now)?,
                _ => board.cancel(incident_id, now)?,
            };
            self.record_change(&change, &ctx);
            (change, self.snapshot_writes(&board, incident_id))
        };

        self.persist(writes, &ctx);
        Ok(change)
    }

    /// Advance distance decay by however many intervals the clock says
    /// have passed since the previous tick.
    pub fn tick(&self) -> Vec<Arrival> {
        let now = self.clock.now();
        let steps = self.ticker.lock().due(now);
        self.advance(steps)
    }

    /// Apply `steps` decay steps to every live dispatch.
    pub fn advance(&self, steps: u32) -> Vec<Arrival> {
        if steps == 0 {
            return Vec::new();
        }

        let (arrivals, writes) = {
            let mut board = self.board.lock();
            let arrivals = board.tick(self.config.tick_step_km, steps);
            let mut writes = Vec::new();
            for arrival in &arrivals {
                self.arrived(arrival, "tick");
                if let Some(dispatch) = board.dispatch_for(&arrival.incident_id) {
                    writes.push(PendingWrite::Dispatch(DispatchRecord::from_dispatch(
                        dispatch,
                        self.config.eta_minutes_per_km,
                    )));
                }
            }
            (arrivals, writes)
        };

        self.persist(writes, &LogContext::operator());
        arrivals
    }

    pub fn register_responder(&self, responder: Responder) -> TriageResult<()> {
        let ctx = LogContext::operator();
        let snapshot = responder.clone();
        self.board.lock().register_responder(responder)?;
        log::info!(
            "{} RESPONDER_REGISTERED responder={} rating={:.1} capacity={}",
            ctx,
            snapshot.id,
            snapshot.rating,
            snapshot.max_concurrent_incidents
        );
        self.persist(vec![PendingWrite::Responder(snapshot)], &ctx);
        Ok(())
    }

    pub fn set_responder_availability(&self, responder_id: &str, available: bool, on_duty: bool) -> TriageResult<Responder> {
        let ctx = LogContext::operator();
        let responder = self
            .board
            .lock()
            .set_availability(responder_id, available, on_duty)?
            .clone();
        log::info!(
            "{} RESPONDER_AVAILABILITY responder={} available={} on_duty={}",
            ctx,
            responder_id,
            available,
            on_duty
        );
        self.persist(vec![PendingWrite::Responder(responder.clone())], &ctx);
        Ok(responder)
    }

    pub fn incident(&self, incident_id: &str) -> Option<IncidentRecord> {
        self.board.lock().incident(incident_id).map(IncidentRecord::from)
    }

    pub fn dispatch(&self, incident_id: &str) -> Option<DispatchRecord> {
        self.board
            .lock()
            .dispatch_for(incident_id)
            .map(|d| DispatchRecord::from_dispatch(d, self.config.eta_minutes_per_km))
    }

    /// Incidents matching the filter, newest first.
    pub fn list_incidents(&self, filter: &IncidentFilter) -> Vec<IncidentRecord> {
        let records: Vec<IncidentRecord> = self.board.lock().incidents().map(IncidentRecord::from).collect();
        filter.apply(records)
    }

    /// Responders ready to take work first, then the rest, each group in
    /// registration order.
    pub fn responders(&self) -> Vec<Responder> {
        let mut all: Vec<Responder> = self.board.lock().responders().cloned().collect();
        all.sort_by_key(|r| (!(r.available && r.on_duty), !r.is_eligible()));
        all
    }

    pub fn stats(&self) -> IncidentStats {
        let records: Vec<IncidentRecord> = self.board.lock().incidents().map(IncidentRecord::from).collect();
        compute_stats(&records)
    }

    pub fn session(&self, session_id: &str) -> Option<ConversationSession> {
        self.sessions.get(session_id).map(|s| s.lock().clone())
    }

    pub fn session_state(&self, session_id: &str) -> Option<FlowState> {
        self.sessions.get(session_id).map(|s| s.lock().state)
    }

    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Drop sessions idle past the configured timeout.
    pub fn expire_idle_sessions(&self) -> Vec<String> {
        let expired = self
            .sessions
            .expire_idle(self.clock.now(), self.idle_timeout());
        for id in &expired {
            crate::log_event!(LogContext::new(id), "SESSION_EXPIRED", action = "drop");
        }
        expired
    }

    /// Take every event emitted since the previous drain.
    pub fn drain_events(&self) -> Vec<TriageEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    fn idle_timeout(&self) -> Duration {
        let secs = i64::try_from(self.config.session_idle_timeout_secs).unwrap_or(i64::MAX);
        Duration::seconds(secs.min(i64::MAX / 1_000))
    }

    fn emit(&self, event: TriageEvent) {
        self.events.lock().push(event);
    }

    fn record_change(&self, change: &StatusChange, ctx: &LogContext) {
        log::info!("{} INCIDENT_STATUS from={} to={}", ctx, change.from, change.to);
        self.emit(TriageEvent::StatusChanged {
            incident_id: change.incident_id.clone(),
            from: change.from,
            to: change.to,
        });
    }

    fn arrived(&self, arrival: &Arrival, via: &str) {
        log::info!(
            "{} DISPATCH_ARRIVED responder={} via={}",
            LogContext::operator().with_incident(&arrival.incident_id),
            arrival.responder_id,
            via
        );
        self.emit(TriageEvent::ResponderArrived {
            incident_id: arrival.incident_id.clone(),
            responder_id: arrival.responder_id.clone(),
        });
    }

    fn snapshot_writes(&self, board: &DispatchBoard, incident_id: &str) -> Vec<PendingWrite> {
        let mut writes = Vec::new();
        if let Some(incident) = board.incident(incident_id) {
            writes.push(PendingWrite::Incident(IncidentRecord::from(incident)));
        }
        if let Some(dispatch) = board.dispatch_for(incident_id) {
            writes.push(PendingWrite::Dispatch(DispatchRecord::from_dispatch(
                dispatch,
                self.config.eta_minutes_per_km,
            )));
            if let Some(responder) = board.responder(&dispatch.responder_id) {
                writes.push(PendingWrite::Responder(responder.clone()));
            }
        }
        writes
    }

    /// Write committed snapshots. Failures are logged, never propagated.
    fn persist(&self, writes: Vec<PendingWrite>, ctx: &LogContext) {
        let Some(store) = &self.store else {
            return;
        };

        for write in writes {
            let (kind, result) = match &write {
                PendingWrite::Incident(record) => ("incident", store.save_incident(record)),
                PendingWrite::Dispatch(record) => ("dispatch", store.save_dispatch(record)),
                PendingWrite::Responder(responder) => ("responder", store.save_responder(responder)),
            };
            if let Err(e) = result {
                log::warn!("{} STORE_WRITE_FAILED record={} error={}", ctx, kind, e);
            }
        }
    }
}

impl std::fmt::Debug for TriageService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriageService")
            .field("config", &self.config)
            .field("sessions", &self.sessions.len())
            .field("augmenter", &self.augmenter.as_ref().map(|a| a.name().to_string()))
            .field("voice", &self.voice.is_some())
            .field("store", &self.store.is_some())
            .finish()
    }
}
