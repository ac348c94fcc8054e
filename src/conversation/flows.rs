//! Guided conversation flow table.
//!
//! Each state has a survivor-facing script, an optional reply-option map
//! (exact tokens such as "1".."9", "A".."D", "YES") and an optional action.
//! Scripts never name a responder or an ETA: the engine appends the real
//! dispatch outcome so a reply cannot claim help that was not sent.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowState {
    Start,
    Following,
    FollowingClose,
    FollowingAcross,
    FollowingDistance,
    FollowingLost,
    UnsafeLocation,
    BusStop,
    Walking,
    Parking,
    BarExit,
    FakeCall,
    FakeCallFamily,
    FakeCallFriend,
    FakeCallWork,
    Escort,
    Connect,
    Monitor,
    GuardianAngel,
    SafeLocation,
    Escalate,
    Talk,
    Emergency,
    Resolved,
    Report,
    Counselor,
    End,
}

impl FlowState {
    pub const ALL: [FlowState; 27] = [
        FlowState::Start,
        FlowState::Following,
        FlowState::FollowingClose,
        FlowState::FollowingAcross,
        FlowState::FollowingDistance,
        FlowState::FollowingLost,
        FlowState::UnsafeLocation,
        FlowState::BusStop,
        FlowState::Walking,
        FlowState::Parking,
        FlowState::BarExit,
        FlowState::FakeCall,
        FlowState::FakeCallFamily,
        FlowState::FakeCallFriend,
        FlowState::FakeCallWork,
        FlowState::Escort,
        FlowState::Connect,
        FlowState::Monitor,
        FlowState::GuardianAngel,
        FlowState::SafeLocation,
        FlowState::Escalate,
        FlowState::Talk,
        FlowState::Emergency,
        FlowState::Resolved,
        FlowState::Report,
        FlowState::Counselor,
        FlowState::End,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            FlowState::Start => "START",
            FlowState::Following => "FOLLOWING",
            FlowState::FollowingClose => "FOLLOWING_CLOSE",
            FlowState::FollowingAcross => "FOLLOWING_ACROSS",
            FlowState::FollowingDistance => "FOLLOWING_DISTANCE",
            FlowState::FollowingLost => "FOLLOWING_LOST",
            FlowState::UnsafeLocation => "UNSAFE_LOCATION",
            FlowState::BusStop => "BUS_STOP",
            FlowState::Walking => "WALKING",
            FlowState::Parking => "PARKING",
            FlowState::BarExit => "BAR_EXIT",
            FlowState::FakeCall => "FAKE_CALL",
            FlowState::FakeCallFamily => "FAKE_CALL_FAMILY",
            FlowState::FakeCallFriend => "FAKE_CALL_FRIEND",
            FlowState::FakeCallWork => "FAKE_CALL_WORK",
            FlowState::Escort => "ESCORT",
            FlowState::Connect => "CONNECT",
            FlowState::Monitor => "MONITOR",
            FlowState::GuardianAngel => "GUARDIAN_ANGEL",
            FlowState::SafeLocation => "SAFE_LOCATION",
            FlowState::Escalate => "ESCALATE",
            FlowState::Talk => "TALK",
            FlowState::Emergency => "EMERGENCY",
            FlowState::Resolved => "RESOLVED",
            FlowState::Report => "REPORT",
            FlowState::Counselor => "COUNSELOR",
            FlowState::End => "END",
        }
    }

    /// Look up a state by id. Unknown ids land in the listening state.
    pub fn parse(id: &str) -> FlowState {
        let normalized = id.trim().to_uppercase();
        FlowState::ALL
            .iter()
            .copied()
            .find(|s| s.id() == normalized)
            .unwrap_or(FlowState::Talk)
    }

    /// End states close the active incident's conversation cycle.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlowState::Resolved | FlowState::End)
    }

    pub fn spec(&self) -> StateSpec {
        use FlowAction::*;
        use FlowState::*;

        match self {
            Start => StateSpec::new(
                "🛡️ SafetyNet - You're safe here.\n\n\
                 What's happening?\n\n\
                 1 = Someone following me\n\
                 2 = Feel unsafe at location\n\
                 3 = Need fake emergency call\n\
                 4 = Need walking escort\n\
                 5 = Just want to talk\n\
                 9 = EMERGENCY - help NOW\n\n\
                 Reply with number or describe your situation.",
                &[
                    ("1", Following),
                    ("2", UnsafeLocation),
                    ("3", FakeCall),
                    ("4", Escort),
                    ("5", Talk),
                    ("9", Emergency),
                ],
                None,
            ),
            Following => StateSpec::new(
                "📍 Location tracking activated.\n\n\
                 How close is the person?\n\
                 A = Right behind me (< 20 feet)\n\
                 B = Across the street\n\
                 C = Following but keeping distance\n\
                 D = Lost sight but still scared\n\n\
                 Reply A, B, C, or D",
                &[
                    ("A", FollowingClose),
                    ("B", FollowingAcross),
                    ("C", FollowingDistance),
                    ("D", FollowingLost),
                ],
                None,
            ),
            FollowingClose => StateSpec::new(
                "🚨 HIGH PRIORITY\n\n\
                 IMMEDIATE ACTIONS:\n\
                 → Walk toward people/lights\n\
                 → Enter nearest store/restaurant\n\
                 → We're tracking you live\n\n\
                 Are you able to get to a public place?\n\
                 YES / NO",
                &[("YES", SafeLocation), ("NO", Escalate)],
                Some(DispatchImmediate),
            ),
            FollowingAcross => StateSpec::new(
                "✓ Tracking your location\n\n\
                 STAY SAFE:\n\
                 → Stay on well-lit streets\n\
                 → Don't go home if being followed\n\
                 → Head toward public places\n\n\
                 Options:\n\
                 A = Call me (fake conversation)\n\
                 B = Connect me to volunteer now\n\
                 C = I'm okay, just monitor me\n\n\
                 Reply A, B, or C",
                &[("A", FakeCall), ("B", Connect), ("C", Monitor)],
                Some(DispatchMedium),
            ),
            FollowingDistance => StateSpec::new(
                "✓ Monitoring your location\n\n\
                 You're doing great. Keep moving.\n\n\
                 Do you want:\n\
                 A = Volunteer to walk with you\n\
                 B = Just track me until I'm home\n\
                 C = Fake call to look busy\n\n\
                 Reply A, B, or C",
                &[("A", Escort), ("B", GuardianAngel), ("C", FakeCall)],
                Some(Standby),
            ),
            FollowingLost => StateSpec::new(
                "Okay. Stay where there are people and light.\n\n\
                 A = Volunteer to walk with you\n\
                 B = Just track me until I'm home\n\
                 C = I'm okay now\n\n\
                 Reply A, B, or C",
                &[("A", Escort), ("B", GuardianAngel), ("C", Resolved)],
                Some(Standby),
            ),
            UnsafeLocation => StateSpec::new(
                "Where are you?\n\
                 A = Waiting at bus stop\n\
                 B = Walking alone at night\n\
                 C = Parking lot/garage\n\
                 D = Other (describe)\n\n\
                 Reply A, B, C, or D",
                &[("A", BusStop), ("B", Walking), ("C", Parking), ("D", Talk)],
                None,
            ),
            BusStop => StateSpec::new(
                "🚏 Stand near the driver's side of the shelter, close to light and other people.\n\n\
                 A = Volunteer to wait with you\n\
                 B = Track me until I board\n\
                 C = Fake call to look busy\n\n\
                 Reply A, B, or C",
                &[("A", Escort), ("B", GuardianAngel), ("C", FakeCall)],
                None,
            ),
            Walking => StateSpec::new(
                "🚶 Stick to main streets and keep your phone in hand.\n\n\
                 A = Volunteer to walk with you\n\
                 B = Track me until I'm home\n\
                 C = Fake call to look busy\n\n\
                 Reply A, B, or C",
                &[("A", Escort), ("B", GuardianAngel), ("C", FakeCall)],
                None,
            ),
            Parking => StateSpec::new(
                "🅿️ Keep keys ready and check around your car before getting in.\n\n\
                 A = Volunteer to meet you at your car\n\
                 B = Track me until I drive away\n\
                 C = Fake call to look busy\n\n\
                 Reply A, B, or C",
                &[("A", Escort), ("B", GuardianAngel), ("C", FakeCall)],
                None,
            ),
            BarExit => StateSpec::new(
                "🍸 Leaving a bar safely:\n\
                 → Ask staff to help you out a back exit\n\
                 → Don't leave with someone you just met\n\n\
                 A = Volunteer to meet you outside\n\
                 B = Fake call with an excuse to leave\n\n\
                 Reply A or B",
                &[("A", Escort), ("B", FakeCall)],
                None,
            ),
            FakeCall => StateSpec::new(
                "📞 FAKE EMERGENCY CALL READY\n\n\
                 Script:\n\
                 A = Family emergency (go home)\n\
                 B = Friend needs you urgently\n\
                 C = Work emergency\n\n\
                 Reply A, B, or C",
                &[("A", FakeCallFamily), ("B", FakeCallFriend), ("C", FakeCallWork)],
                None,
            ),
            FakeCallFamily | FakeCallFriend | FakeCallWork => StateSpec::new(
                "✓ Calling you NOW...\n\n\
                 After you hang up:\n\
                 → Act concerned\n\
                 → Say you have to go\n\
                 → Leave immediately\n\n\
                 Did you get out safely?\n\
                 YES / NO",
                &[("YES", Resolved), ("NO", Escort)],
                Some(ExecuteFakeCall),
            ),
            Escort => StateSpec::new(
                "✓ ESCORT REQUESTED\n\n\
                 Meeting point:\n\
                 📍 Your current location\n\n\
                 Text ARRIVED when your volunteer gets there.",
                &[("ARRIVED", Resolved)],
                Some(DispatchEscort),
            ),
            Connect => StateSpec::new(
                "✓ Connecting you with a volunteer now.\n\n\
                 Keep this thread open. Text SAFE when you're okay.",
                &[("SAFE", Resolved)],
                Some(DispatchImmediate),
            ),
            Monitor => StateSpec::new(
                "✓ We're monitoring. We'll check in every 5 minutes.\n\n\
                 Reply SAFE when you arrive, or HELP anytime.",
                &[("SAFE", Resolved), ("HELP", Escort)],
                Some(StartGuardian),
            ),
            GuardianAngel => StateSpec::new(
                "👼 GUARDIAN ANGEL MODE\n\n\
                 ✓ Tracking your location\n\
                 ✓ Check-in every 5 minutes\n\n\
                 Expected arrival time?\n\
                 (Example: \"10 minutes\")\n\n\
                 Reply SAFE if okay.\n\n\
                 You're not alone. 💜",
                &[("SAFE", Resolved)],
                Some(StartGuardian),
            ),
            SafeLocation => StateSpec::new(
                "✓ Good. Stay inside and near staff.\n\n\
                 Reply SAFE once the person is gone, or NO if they followed you in.",
                &[("SAFE", Resolved), ("NO", Escalate)],
                None,
            ),
            Escalate => StateSpec::new(
                "🚨 ESCALATING\n\n\
                 → Keep moving toward people\n\
                 → Shout for help if they get closer\n\
                 → Reply 9 to bring in police\n\n\
                 STAY ON THE LINE.",
                &[("9", Emergency)],
                Some(DispatchImmediate),
            ),
            Talk => StateSpec::new(
                "I'm here. You're safe to talk.\n\n\
                 What's on your mind?\n\n\
                 (Type freely - confidential)\n\n\
                 If you need help:\n\
                 → Text DISPATCH for volunteer\n\
                 → Text CALL for fake call\n\
                 → Text 911 for police\n\n\
                 I'm listening. 💜",
                &[],
                Some(TalkMode),
            ),
            Emergency => StateSpec::new(
                "🚨 MAXIMUM PRIORITY\n\n\
                 ARE YOU INJURED?\n\
                 YES / NO\n\n\
                 STAY ON THE LINE.",
                &[("YES", Escalate), ("NO", Escalate)],
                Some(EmergencyDispatch),
            ),
            Resolved => StateSpec::new(
                "✓ You're safe!\n\n\
                 Would you like to:\n\
                 A = File incident report\n\
                 B = Talk to counselor\n\
                 C = Close this\n\n\
                 Reply A, B, or C\n\n\
                 We're here 24/7. 💜",
                &[("A", Report), ("B", Counselor), ("C", End)],
                Some(ResolveIncident),
            ),
            Report => StateSpec::new(
                "📝 Describe what happened, in as much detail as you're comfortable with.\n\
                 Your report stays confidential.",
                &[],
                None,
            ),
            Counselor => StateSpec::new(
                "💜 A counselor will text you from this number shortly.\n\n\
                 Reply C to close this conversation.",
                &[("C", End)],
                None,
            ),
            End => StateSpec::new(
                "Take care. Text this number anytime. 💜",
                &[],
                None,
            ),
        }
    }
}

impl fmt::Display for FlowState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// Side effect attached to entering a state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FlowAction {
    DispatchImmediate,
    DispatchMedium,
    DispatchEscort,
    EmergencyDispatch,
    Standby,
    ExecuteFakeCall,
    StartGuardian,
    TalkMode,
    ResolveIncident,
}

impl FlowAction {
    pub fn implies_dispatch(&self) -> bool {
        matches!(
            self,
            FlowAction::DispatchImmediate
                | FlowAction::DispatchMedium
                | FlowAction::DispatchEscort
                | FlowAction::EmergencyDispatch
        )
    }
}

/// Static definition of one flow state.
#[derive(Debug, Clone, Copy)]
pub struct StateSpec {
    pub response: &'static str,
    pub options: &'static [(&'static str, FlowState)],
    pub action: Option<FlowAction>,
}

impl StateSpec {
    const fn new(
        response: &'static str,
        options: &'static [(&'static str, FlowState)],
        action: Option<FlowAction>,
    ) -> Self {
        Self {
            response,
            options,
            action,
        }
    }

    /// Exact, case-insensitive option lookup.
    pub fn option(&self, reply: &str) -> Option<FlowState> {
        let normalized = reply.trim().to_uppercase();
        self.options
            .iter()
            .find(|(key, _)| *key == normalized)
            .map(|(_, next)| *next)
    }

    pub fn option_keys(&self) -> Vec<&'static str> {
        self.options.iter().map(|(key, _)| *key).collect()
    }
}

/// Script read by the voice collaborator for a fake-call state.
pub fn fake_call_script(state: FlowState) -> Option<&'static str> {
    match state {
        FlowState::FakeCallFamily => Some(
            "Hey! Where are you?! Mom's in the hospital, you need to come right now!",
        ),
        FlowState::FakeCallFriend => Some(
            "Hey, it's me. I really need you, can you come over right now? Please hurry.",
        ),
        FlowState::FakeCallWork => Some(
            "Hi, sorry to call so late. There's a problem at work and we need you in right away.",
        ),
        _ => None,
    }
}
