//! End-to-end triage scenarios driven through the public service API.

use std::sync::Arc;

use chrono::{Duration, TimeZone, Utc};

use safetynet_core::classification::{classify, Category};
use safetynet_core::config::TriageConfig;
use safetynet_core::conversation::{FlowState, TransitionReason};
use safetynet_core::dispatch::{IncidentStatus, ManualClock, Responder};
use safetynet_core::pipeline::{
    DispatchNotice, InboundMessage, MessageOutcome, TriageEvent, TriageReply, TriageService,
    VoiceGateway,
};
use safetynet_core::storage::IncidentFilter;
use safetynet_core::TriageError;

const PHONE: &str = "+16475550199";

fn clock() -> Arc<ManualClock> {
    Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 22, 0, 0).unwrap()))
}

fn service(responders: Vec<Responder>) -> (TriageService, Arc<ManualClock>) {
    let clock = clock();
    let service = TriageService::new(TriageConfig::default())
        .unwrap()
        .with_clock(clock.clone());
    for r in responders {
        service.register_responder(r).unwrap();
    }
    (service, clock)
}

fn send(service: &TriageService, body: &str) -> TriageReply {
    match service.process_message(&InboundMessage::new(PHONE, body)) {
        MessageOutcome::Handled(reply) => reply,
        other => panic!("expected {:?} to be handled, got {:?}", body, other),
    }
}

#[test]
fn scenario_a_weapon_goes_to_emergency() {
    let (service, _) = service(vec![Responder::new("v1", "Maya")]);

    let reply = send(&service, "there's a gun nearby");

    assert_eq!(reply.classification.category, Category::ArmedThreat);
    assert_eq!(reply.classification.urgency_score, 10);
    assert!(reply.classification.police_needed);
    assert!(!reply.classification.community_resolution);
    assert_eq!(reply.state, FlowState::Emergency);
    assert_eq!(reply.transition.reason, TransitionReason::UrgencyOverride);
    assert!(reply.text.contains("MAXIMUM PRIORITY"));
}

#[test]
fn scenario_b_following_creates_dispatch() {
    let (service, _) = service(vec![Responder::new("v1", "Maya").with_rating(4.7)]);

    let reply = send(&service, "someone is following me");

    assert_eq!(reply.classification.category, Category::Following);
    assert_eq!(reply.classification.urgency_score, 9);
    assert!(!reply.classification.police_needed);

    let incident_id = reply.incident_id.clone().unwrap();
    let dispatch = service.dispatch(&incident_id).unwrap();
    assert_eq!(dispatch.responder_id, "v1");
    assert_eq!(dispatch.distance_remaining_km, 2.4);
    assert_eq!(
        reply.dispatch,
        DispatchNotice::Dispatched {
            responder_name: "Maya".to_string(),
            eta_minutes: 6
        }
    );
    assert!(reply.text.contains("✓ Volunteer Maya dispatched - ETA 6 min"));

    let events = service.drain_events();
    assert!(matches!(events[0], TriageEvent::IncidentOpened { .. }));
    assert!(matches!(events[1], TriageEvent::DispatchCreated { .. }));
}

#[test]
fn scenario_c_unsafe_opens_location_menu() {
    let (service, _) = service(vec![]);

    let reply = send(&service, "UNSAFE");

    assert_eq!(reply.transition.from, FlowState::Start);
    assert_eq!(reply.state, FlowState::UnsafeLocation);
    let options = FlowState::UnsafeLocation.spec().option_keys();
    assert_eq!(options, vec!["A", "B", "C", "D"]);
    for key in options {
        assert!(reply.text.contains(&format!("{} = ", key)));
    }
}

#[test]
fn scenario_d_no_responder_keeps_incident_open() {
    let mut busy = Responder::new("v1", "Maya");
    busy.on_duty = false;
    let (service, _) = service(vec![busy]);

    let reply = send(&service, "someone is following me");

    assert_eq!(reply.dispatch, DispatchNotice::NoResponder);
    let incident_id = reply.incident_id.unwrap();
    assert_eq!(service.incident(&incident_id).unwrap().status, IncidentStatus::Open);
    assert!(service.dispatch(&incident_id).is_none());
    assert!(!reply.text.contains("ETA"));
    assert!(!reply.text.contains("dispatched"));
    assert!(reply.text.contains("No volunteer is free right now"));
    assert!(service
        .drain_events()
        .iter()
        .any(|e| matches!(e, TriageEvent::NoResponderAvailable { .. })));
}

#[test]
fn scenario_e_status_cycle_pins_distance() {
    let (service, _) = service(vec![Responder::new("v1", "Maya")]);
    let incident_id = send(&service, "someone is following me").incident_id.unwrap();

    let accepted = service.accept_incident(&incident_id, "v1").unwrap().unwrap();
    assert_eq!((accepted.from, accepted.to), (IncidentStatus::Open, IncidentStatus::Accepted));

    // Partway there when the responder reports arrival.
    service.advance(3);
    assert!(service.dispatch(&incident_id).unwrap().distance_remaining_km > 0.0);

    let on_scene = service.mark_on_scene(&incident_id, "v1").unwrap();
    assert_eq!((on_scene.from, on_scene.to), (IncidentStatus::Accepted, IncidentStatus::OnScene));
    assert_eq!(service.dispatch(&incident_id).unwrap().distance_remaining_km, 0.0);

    let resolved = service.resolve_incident(&incident_id).unwrap();
    assert_eq!((resolved.from, resolved.to), (IncidentStatus::OnScene, IncidentStatus::Resolved));

    let dispatch = service.dispatch(&incident_id).unwrap();
    assert_eq!(dispatch.distance_remaining_km, 0.0);
    assert!(dispatch.arrived);
    assert!(dispatch.closed);
    assert_eq!(dispatch.eta_label, "arrived");
    assert!(service.responders()[0].active_incident_ids.is_empty());
}

#[test]
fn accept_is_idempotent_for_the_same_responder() {
    let (service, _) = service(vec![Responder::new("v1", "Maya")]);
    let incident_id = send(&service, "someone is following me").incident_id.unwrap();

    assert!(service.accept_incident(&incident_id, "v1").unwrap().is_some());
    assert!(service.accept_incident(&incident_id, "v1").unwrap().is_none());
    assert_eq!(service.incident(&incident_id).unwrap().status, IncidentStatus::Accepted);
}

#[test]
fn cancel_is_only_reachable_before_arrival() {
    let (service, _) = service(vec![Responder::new("v1", "Maya")]);
    let incident_id = send(&service, "someone is following me").incident_id.unwrap();
    service.accept_incident(&incident_id, "v1").unwrap();
    service.mark_on_scene(&incident_id, "v1").unwrap();

    assert!(matches!(
        service.cancel_incident(&incident_id),
        Err(TriageError::IllegalTransition {
            from: IncidentStatus::OnScene,
            to: IncidentStatus::Cancelled,
            ..
        })
    ));
}

#[test]
fn option_map_is_followed_exactly() {
    let (service, _) = service(vec![]);
    send(&service, "1");
    let reply = send(&service, "B");
    assert_eq!(reply.state, FlowState::FollowingAcross);
    assert_eq!(reply.transition.reason, TransitionReason::OptionMatch);
}

#[test]
fn urgency_override_beats_option_map() {
    let (service, _) = service(vec![]);
    send(&service, "1");
    assert_eq!(service.session_state(PHONE), Some(FlowState::Following));

    // "B" would map to FOLLOWING_ACROSS, but a weapon forces EMERGENCY.
    let reply = send(&service, "B he has a knife");
    assert_eq!(reply.state, FlowState::Emergency);
    assert_eq!(reply.transition.reason, TransitionReason::UrgencyOverride);

    // Sanity: the exact option key alone is not urgent.
    assert!(classify("B").urgency_score < 10);
}

#[test]
fn tick_decays_until_arrival() {
    let (service, clock) = service(vec![Responder::new("v1", "Maya")]);
    let incident_id = send(&service, "he has a knife").incident_id.unwrap();
    service.drain_events();

    assert!(service.tick().is_empty());
    let mut last = service.dispatch(&incident_id).unwrap().distance_remaining_km;
    assert_eq!(last, 1.5);

    let mut arrivals = Vec::new();
    for _ in 0..15 {
        clock.advance(Duration::seconds(1));
        arrivals.extend(service.tick());
        let now = service.dispatch(&incident_id).unwrap().distance_remaining_km;
        assert!(now <= last);
        assert!(now >= 0.0);
        last = now;
    }

    assert_eq!(arrivals.len(), 1);
    assert_eq!(last, 0.0);
    assert!(service.dispatch(&incident_id).unwrap().arrived);
    assert!(service
        .drain_events()
        .iter()
        .any(|e| matches!(e, TriageEvent::ResponderArrived { .. })));
}

#[test]
fn follow_up_messages_reuse_the_incident() {
    let (service, _) = service(vec![Responder::new("v1", "Maya")]);
    let first = send(&service, "someone is following me");
    let second = send(&service, "A");

    assert_eq!(second.state, FlowState::FollowingClose);
    assert_eq!(first.incident_id, second.incident_id);
    assert!(matches!(second.dispatch, DispatchNotice::EnRoute { .. }));
    assert_eq!(service.list_incidents(&IncidentFilter::default()).len(), 1);
}

#[test]
fn incident_keeps_highest_urgency_classification() {
    let (service, _) = service(vec![]);
    let incident_id = send(&service, "I feel unsafe").incident_id.unwrap();
    send(&service, "he grabbed my arm");
    send(&service, "A");

    let record = service.incident(&incident_id).unwrap();
    assert_eq!(record.category, Category::PhysicalContact);
    assert_eq!(record.urgency_score, 9);
    assert!(record.police_needed);
}

struct RecordingVoice(parking_lot::Mutex<Vec<(String, String)>>);

impl VoiceGateway for RecordingVoice {
    fn place_call(&self, to: &str, script: &str) -> anyhow::Result<()> {
        self.0.lock().push((to.to_string(), script.to_string()));
        Ok(())
    }
}

#[test]
fn fake_call_state_requests_a_call() {
    let (service, _) = service(vec![]);
    let voice = Arc::new(RecordingVoice(parking_lot::Mutex::new(Vec::new())));
    let service = service.with_voice_gateway(voice.clone());

    send(&service, "3");
    let reply = send(&service, "A");
    assert_eq!(reply.state, FlowState::FakeCallFamily);
    assert!(service
        .drain_events()
        .iter()
        .any(|e| matches!(e, TriageEvent::FakeCallRequested { state: FlowState::FakeCallFamily, .. })));

    // The call runs on its own thread.
    for _ in 0..100 {
        if !voice.0.lock().is_empty() {
            break;
        }
        std::thread::sleep(std::time::Duration::from_millis(10));
    }
    let calls = voice.0.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].0, PHONE);
}

#[test]
fn stats_and_listing() {
    let (service, _) = service(vec![Responder::new("v1", "Maya").with_capacity(5)]);
    let first = service
        .process_message(&InboundMessage::new("+15550001", "someone is following me"));
    let second = service.process_message(&InboundMessage::new("+15550002", "there's a gun nearby"));
    let third = service.process_message(&InboundMessage::new("+15550003", "hello"));
    assert!(first.reply_text().is_some() && second.reply_text().is_some() && third.reply_text().is_some());

    let stats = service.stats();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.open, 3);
    assert_eq!(stats.police_involved_percentage, 33.3);

    let limited = service.list_incidents(&IncidentFilter::with_status(IncidentStatus::Open).limit(2));
    assert_eq!(limited.len(), 2);
}

#[test]
fn concurrent_sessions_are_independent() {
    let (service, _) = service(vec![Responder::new("v1", "Maya").with_capacity(64)]);
    let service = Arc::new(service);

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || {
                let phone = format!("+1555000{:04}", i);
                for body in ["1", "B", "C"] {
                    service.process_message(&InboundMessage::new(&phone, body));
                }
                phone
            })
        })
        .collect();

    for handle in handles {
        let phone = handle.join().unwrap();
        assert_eq!(service.session_state(&phone), Some(FlowState::Monitor));
        assert_eq!(service.session(&phone).unwrap().history.len(), 6);
    }
}

#[test]
fn same_session_deliveries_are_serialized() {
    const THREADS: usize = 12;
    let (service, _) = service(vec![]);
    let service = Arc::new(service);
    let barrier = Arc::new(std::sync::Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let service = Arc::clone(&service);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                let own = service.process_message(&InboundMessage::new(PHONE, &format!("update {}", i)));
                let retried = service
                    .process_message(&InboundMessage::new(PHONE, "still here").with_message_id("SM-shared"));
                (own, retried)
            })
        })
        .collect();

    let mut handled_retries = 0;
    let mut duplicate_retries = 0;
    let mut first_reply = None;
    for handle in handles {
        let (own, retried) = handle.join().unwrap();
        assert!(matches!(own, MessageOutcome::Handled(_)));
        match retried {
            MessageOutcome::Handled(reply) => {
                handled_retries += 1;
                first_reply = Some(reply.text);
            }
            MessageOutcome::Duplicate(text) => {
                duplicate_retries += 1;
                if let Some(expected) = &first_reply {
                    assert_eq!(&text, expected);
                }
            }
            MessageOutcome::Ignored => panic!("retry was ignored"),
        }
    }

    assert_eq!(handled_retries, 1);
    assert_eq!(duplicate_retries, THREADS - 1);
    // Every handled message adds one inbound and one reply entry.
    assert_eq!(service.session(PHONE).unwrap().history.len(), 2 * (THREADS + 1));
    assert_eq!(service.list_incidents(&IncidentFilter::default()).len(), 1);
    assert_eq!(service.session_count(), 1);
}
