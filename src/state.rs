use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Number of moisture samples retained; the oldest is evicted on overflow.
pub const HISTORY_LEN: usize = 20;

/// Maximum number of events retained in the ring buffer.
const MAX_EVENTS: usize = 200;

// ---------------------------------------------------------------------------
// Public type alias
// ---------------------------------------------------------------------------

pub type SharedState = Arc<RwLock<ControllerState>>;

// ---------------------------------------------------------------------------
// Core types
// ---------------------------------------------------------------------------

pub struct ControllerState {
    /// Hour-of-day (0-23) → expected light state for that hour.
    pub schedule: HashMap<u8, LightWindow>,
    pub history: VecDeque<MoistureSample>,
    pub events: VecDeque<ControllerEvent>,
}

/// One schedule entry. The `off` flag is stored and round-tripped through
/// the schedule API but the light check only consults `on`; any hour not
/// flagged `on` is treated as an off-expectation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LightWindow {
    pub on: bool,
    pub off: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct MoistureSample {
    pub time: DateTime<Utc>,
    pub value: f32,
}

#[derive(Clone, Debug, Serialize)]
pub struct ControllerEvent {
    pub ts: DateTime<Utc>,
    pub kind: EventKind,
    pub detail: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Moisture,
    Lights,
    Alert,
    Error,
    System,
}

// ---------------------------------------------------------------------------
// Construction & mutation
// ---------------------------------------------------------------------------

impl ControllerState {
    pub fn new() -> Self {
        Self {
            schedule: HashMap::new(),
            history: VecDeque::with_capacity(HISTORY_LEN),
            events: VecDeque::with_capacity(MAX_EVENTS),
        }
    }

    pub fn shared() -> SharedState {
        Arc::new(RwLock::new(Self::new()))
    }

    /// Append a moisture sample, keeping only the most recent `HISTORY_LEN`.
    pub fn record_moisture(&mut self, time: DateTime<Utc>, value: f32) {
        self.history.push_back(MoistureSample { time, value });
        while self.history.len() > HISTORY_LEN {
            self.history.pop_front();
        }
        self.push_event(EventKind::Moisture, format!("moisture({value})"));
    }

    /// Schedule entry for `hour`; absent hours read as all-false.
    pub fn light_window(&self, hour: u8) -> LightWindow {
        self.schedule.get(&hour).copied().unwrap_or_default()
    }

    /// Replace the schedule wholesale (never merged).
    pub fn replace_schedule(&mut self, schedule: HashMap<u8, LightWindow>) {
        self.schedule = schedule;
        self.push_event(
            EventKind::System,
            format!("schedule replaced ({} entries)", self.schedule.len()),
        );
    }

    /// Record the start of a light check: `lights-on` when the schedule
    /// expects the light on, `lights-off` otherwise.
    pub fn record_lights(&mut self, expect_on: bool) {
        let tag = if expect_on { "lights-on" } else { "lights-off" };
        self.push_event(EventKind::Lights, tag.to_string());
    }

    pub fn record_alert(&mut self, detail: String) {
        self.push_event(EventKind::Alert, detail);
    }

    pub fn record_error(&mut self, detail: String) {
        self.push_event(EventKind::Error, detail);
    }

    pub fn record_system(&mut self, detail: String) {
        self.push_event(EventKind::System, detail);
    }

    fn push_event(&mut self, kind: EventKind, detail: String) {
        if self.events.len() >= MAX_EVENTS {
            self.events.pop_front();
        }
        self.events.push_back(ControllerEvent {
            ts: Utc::now(),
            kind,
            detail,
        });
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::new()
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn window(on: bool, off: bool) -> LightWindow {
        LightWindow { on, off }
    }

    // -- Moisture history ---------------------------------------------------

    #[test]
    fn history_appends_in_order() {
        let mut st = ControllerState::new();
        st.record_moisture(Utc::now(), 0.1);
        st.record_moisture(Utc::now(), 0.2);
        assert_eq!(st.history.len(), 2);
        assert_eq!(st.history[0].value, 0.1);
        assert_eq!(st.history[1].value, 0.2);
    }

    #[test]
    fn history_bounded_to_most_recent_20() {
        let mut st = ControllerState::new();
        for i in 0..25 {
            st.record_moisture(Utc::now(), i as f32);
        }
        assert_eq!(st.history.len(), HISTORY_LEN);
        // Oldest five evicted; the remaining samples are 5..=24 in order.
        assert_eq!(st.history.front().unwrap().value, 5.0);
        assert_eq!(st.history.back().unwrap().value, 24.0);
        for pair in st.history.iter().collect::<Vec<_>>().windows(2) {
            assert!(pair[0].time <= pair[1].time, "history out of order");
        }
    }

    #[test]
    fn moisture_event_uses_wire_format() {
        let mut st = ControllerState::new();
        st.record_moisture(Utc::now(), 0.42);
        let last = st.events.back().unwrap();
        assert_eq!(last.kind, EventKind::Moisture);
        assert_eq!(last.detail, "moisture(0.42)");
    }

    // -- Schedule -----------------------------------------------------------

    #[test]
    fn light_window_defaults_to_all_false() {
        let st = ControllerState::new();
        assert_eq!(st.light_window(13), window(false, false));
    }

    #[test]
    fn light_window_returns_entry() {
        let mut st = ControllerState::new();
        st.schedule.insert(7, window(true, false));
        assert_eq!(st.light_window(7), window(true, false));
    }

    #[test]
    fn replace_schedule_is_wholesale() {
        let mut st = ControllerState::new();
        st.schedule.insert(7, window(true, false));

        let mut next = HashMap::new();
        next.insert(9, window(false, true));
        st.replace_schedule(next);

        assert_eq!(st.schedule.len(), 1);
        assert_eq!(st.light_window(7), window(false, false));
        assert_eq!(st.light_window(9), window(false, true));
    }

    // -- Events -------------------------------------------------------------

    #[test]
    fn lights_events_use_bare_tags() {
        let mut st = ControllerState::new();
        st.record_lights(true);
        st.record_lights(false);
        let tags: Vec<&str> = st.events.iter().map(|e| e.detail.as_str()).collect();
        assert_eq!(tags, vec!["lights-on", "lights-off"]);
    }

    #[test]
    fn event_ring_bounded() {
        let mut st = ControllerState::new();
        for i in 0..250 {
            st.record_system(format!("event {i}"));
        }
        assert_eq!(st.events.len(), 200);
        assert_eq!(st.events.front().unwrap().detail, "event 50");
        assert_eq!(st.events.back().unwrap().detail, "event 249");
    }

    // -- LightWindow serde --------------------------------------------------

    #[test]
    fn light_window_round_trips_json() {
        let json = r#"{"on":true,"off":false}"#;
        let w: LightWindow = serde_json::from_str(json).unwrap();
        assert_eq!(w, window(true, false));
        assert_eq!(serde_json::to_string(&w).unwrap(), json);
    }

    #[test]
    fn light_window_missing_field_rejected() {
        assert!(serde_json::from_str::<LightWindow>(r#"{"on":true}"#).is_err());
    }
}
