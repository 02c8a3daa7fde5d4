// file: src/machine.rs
// description: connection lifecycle state machine for one radar channel binding
//
// The machine performs no I/O. The driver in `client.rs` feeds it transport
// and timer events one at a time and acts on the returned transitions.

use crate::{
    codec::{self, Decoded},
    error::RadarError,
    types::{ChannelKey, RadarUpdate},
    view::{ConsumerSnapshot, RadarView},
};
use chrono::{DateTime, Utc};
use std::{collections::VecDeque, fmt, time::Duration};
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Closed,
    ReconnectScheduled,
    Failed,
}

impl ConnectionState {
    /// Whether `self -> next` is an edge of the lifecycle graph.
    pub fn can_transition_to(self, next: ConnectionState) -> bool {
        use ConnectionState::*;
        matches!(
            (self, next),
            (Idle, Connecting)
                | (Connecting, Open)
                | (Connecting, ReconnectScheduled)
                | (Open, Closed)
                | (Closed, ReconnectScheduled)
                | (Closed, Failed)
                | (ReconnectScheduled, Connecting)
                | (ReconnectScheduled, Failed)
                | (_, Idle)
        )
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "IDLE"),
            Self::Connecting => write!(f, "CONNECTING"),
            Self::Open => write!(f, "OPEN"),
            Self::Closed => write!(f, "CLOSED"),
            Self::ReconnectScheduled => write!(f, "RECONNECT_SCHEDULED"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Fixed-delay retry budget. `attempts` counts entries into `Connecting`
/// since the last successful open; `max_attempts == 0` never exhausts.
#[derive(Debug, Clone)]
pub struct ReconnectBudget {
    attempts: u32,
    max_attempts: u32,
    delay: Duration,
}

impl ReconnectBudget {
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            attempts: 0,
            max_attempts,
            delay,
        }
    }

    fn record_attempt(&mut self) -> u32 {
        self.attempts = self.attempts.saturating_add(1);
        self.attempts
    }

    fn reset(&mut self) {
        self.attempts = 0;
    }

    /// True when the next attempt would exceed the cap.
    pub fn is_exhausted(&self) -> bool {
        self.max_attempts != 0 && self.attempts >= self.max_attempts
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }
}

/// What the driver has to do after a lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Open a transport to the machine's target.
    Connect { attempt: u32 },
    Established,
    /// Arm the reconnect timer for `delay`; `attempt` is the number the next
    /// connection attempt will carry.
    Reconnect { attempt: u32, delay: Duration },
    Failed { attempts: u32 },
    TornDown,
    /// The event did not apply in the current state.
    Ignored,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameOutcome {
    Merged { facets: usize },
    ServerError(String),
    Malformed(String),
    Ignored,
}

/// Number of most recent transitions kept for inspection.
pub const HISTORY_LIMIT: usize = 64;

pub struct ConnectionMachine {
    instance_id: String,
    key: ChannelKey,
    target: String,
    state: ConnectionState,
    budget: ReconnectBudget,
    view: RadarView,
    alive: bool,
    history: VecDeque<(ConnectionState, ConnectionState)>,
}

impl ConnectionMachine {
    pub fn new(key: ChannelKey, target: impl Into<String>, budget: ReconnectBudget) -> Self {
        Self::with_view(key, target, budget, RadarView::new())
    }

    pub fn with_view(
        key: ChannelKey,
        target: impl Into<String>,
        budget: ReconnectBudget,
        view: RadarView,
    ) -> Self {
        Self {
            instance_id: uuid::Uuid::new_v4().to_string(),
            key,
            target: target.into(),
            state: ConnectionState::Idle,
            budget,
            view,
            alive: true,
            history: VecDeque::with_capacity(HISTORY_LIMIT),
        }
    }

    pub fn open(&mut self) -> Transition {
        if !self.alive || self.state != ConnectionState::Idle {
            return Transition::Ignored;
        }
        let attempt = self.budget.record_attempt();
        self.transition(ConnectionState::Connecting);
        info!(key = %self.key, target = %self.target, instance = %self.instance_id, "opening radar channel");
        Transition::Connect { attempt }
    }

    pub fn on_established(&mut self) -> Transition {
        if !self.alive || self.state != ConnectionState::Connecting {
            return Transition::Ignored;
        }
        self.transition(ConnectionState::Open);
        self.budget.reset();
        self.view.mark_open();
        info!(key = %self.key, instance = %self.instance_id, "radar channel open");
        Transition::Established
    }

    /// Transport closed or errored, before or after establishment.
    ///
    /// A failed attempt always enters `ReconnectScheduled`; an exhausted
    /// budget then moves on to `Failed` without arming a timer.
    pub fn on_transport_failure(&mut self, reason: &str) -> Transition {
        if !self.alive {
            return Transition::Ignored;
        }
        match self.state {
            ConnectionState::Connecting => {
                warn!(key = %self.key, attempt = self.budget.attempts(), reason, "radar connection attempt failed");
                self.view.end_initial_load();
                self.transition(ConnectionState::ReconnectScheduled);
            }
            ConnectionState::Open => {
                warn!(key = %self.key, reason, "radar channel closed");
                self.transition(ConnectionState::Closed);
            }
            _ => return Transition::Ignored,
        }

        if self.budget.is_exhausted() {
            let attempts = self.budget.attempts();
            self.transition(ConnectionState::Failed);
            self.view.set_error(RadarError::ReconnectExhausted { attempts }.to_string());
            warn!(key = %self.key, attempts, "reconnect budget exhausted");
            return Transition::Failed { attempts };
        }

        if self.state == ConnectionState::Closed {
            self.transition(ConnectionState::ReconnectScheduled);
        }
        let attempt = self.budget.attempts() + 1;
        let delay = self.budget.delay();
        debug!(key = %self.key, attempt, delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        Transition::Reconnect { attempt, delay }
    }

    pub fn on_reconnect_timer(&mut self) -> Transition {
        if !self.alive || self.state != ConnectionState::ReconnectScheduled {
            return Transition::Ignored;
        }
        let attempt = self.budget.record_attempt();
        self.transition(ConnectionState::Connecting);
        info!(key = %self.key, attempt, "reconnecting radar channel");
        Transition::Connect { attempt }
    }

    pub fn on_frame(&mut self, text: &str) -> FrameOutcome {
        self.on_frame_at(text, Utc::now())
    }

    pub fn on_frame_at(&mut self, text: &str, received_at: DateTime<Utc>) -> FrameOutcome {
        if !self.alive || self.state != ConnectionState::Open {
            return FrameOutcome::Ignored;
        }
        match codec::decode(text) {
            Decoded::Update(delta) => {
                if let Some(symbol) = delta.symbol.as_deref()
                    && !symbol.eq_ignore_ascii_case(self.key.as_str())
                {
                    warn!(key = %self.key, frame_symbol = symbol, "radar frame for a different symbol");
                }
                let facets = self.view.apply_delta(delta, received_at);
                debug!(key = %self.key, facets, "radar update merged");
                FrameOutcome::Merged { facets }
            }
            Decoded::ServerError { message } => {
                warn!(key = %self.key, %message, "radar server reported an error");
                self.view.set_error(message.clone());
                FrameOutcome::ServerError(message)
            }
            Decoded::Malformed { reason } => {
                let preview: String = text.chars().take(100).collect();
                warn!(key = %self.key, %reason, frame = %preview, "dropping malformed radar frame");
                FrameOutcome::Malformed(reason)
            }
        }
    }

    /// Terminal and idempotent. Every later event is ignored.
    pub fn teardown(&mut self) -> Transition {
        if !self.alive {
            return Transition::Ignored;
        }
        if self.state != ConnectionState::Idle {
            self.transition(ConnectionState::Idle);
        }
        self.alive = false;
        debug!(key = %self.key, instance = %self.instance_id, "radar channel torn down");
        Transition::TornDown
    }

    pub fn snapshot(&self) -> ConsumerSnapshot {
        self.view.snapshot(self.state)
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_alive(&self) -> bool {
        self.alive
    }

    pub fn key(&self) -> &ChannelKey {
        &self.key
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    pub fn budget(&self) -> &ReconnectBudget {
        &self.budget
    }

    pub fn data(&self) -> &RadarUpdate {
        self.view.data()
    }

    /// The last [`HISTORY_LIMIT`] transitions, oldest first.
    pub fn history(&self) -> &VecDeque<(ConnectionState, ConnectionState)> {
        &self.history
    }

    /// Hands the accumulated view back out, e.g. to seed a retry instance.
    pub fn into_view(self) -> RadarView {
        self.view
    }

    fn transition(&mut self, next: ConnectionState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal transition {} -> {}",
            self.state,
            next
        );
        debug!(key = %self.key, from = %self.state, to = %next, "state transition");
        if self.history.len() == HISTORY_LIMIT {
            self.history.pop_front();
        }
        self.history.push_back((self.state, next));
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ConnectionState::*;

    const UPDATE_SNAPSHOT: &str = r#"{"type":"market_radar_update","symbol":"BTCUSDT","timestamp":"2025-12-25T10:00:00","data":{"snapshot":{"priceChange":1.2,"volumeChange":25.0,"rsiShift":{"from":50.0,"to":55.0},"momentum":"rising"},"anomalies":null,"tempo":null,"timeline":null}}"#;
    const UPDATE_ANOMALIES: &str = r#"{"type":"market_radar_update","symbol":"BTCUSDT","timestamp":"2025-12-25T10:00:30","data":{"snapshot":null,"anomalies":{"alerts":[{"id":"volume_spike","type":"high","title":"Volume Spike"}],"timestamp":"x"},"tempo":null,"timeline":null}}"#;

    fn machine(max_attempts: u32) -> ConnectionMachine {
        ConnectionMachine::new(
            ChannelKey::new("BTCUSDT").unwrap(),
            "ws://localhost:8000/api/v1/market/radar/ws/BTCUSDT",
            ReconnectBudget::new(Duration::from_secs(3), max_attempts),
        )
    }

    fn open_machine(max_attempts: u32) -> ConnectionMachine {
        let mut m = machine(max_attempts);
        m.open();
        m.on_established();
        m
    }

    #[test]
    fn open_is_idempotent() {
        let mut m = machine(5);
        assert_eq!(m.open(), Transition::Connect { attempt: 1 });
        assert_eq!(m.open(), Transition::Ignored);
        assert_eq!(m.history().len(), 1);

        m.on_established();
        assert_eq!(m.open(), Transition::Ignored);
        assert_eq!(m.state(), Open);
        assert_eq!(m.history().len(), 2);
    }

    #[test]
    fn established_snapshot() {
        let mut m = machine(5);
        m.open();
        let snap = m.snapshot();
        assert!(snap.is_loading);
        assert!(!snap.is_connected);

        m.on_established();
        let snap = m.snapshot();
        assert!(snap.is_connected);
        assert!(!snap.is_loading);
        assert!(snap.error.is_none());
    }

    #[test]
    fn unexpected_close_passes_through_closed_then_schedules() {
        let mut m = open_machine(5);
        let t = m.on_transport_failure("stream ended");
        assert_eq!(
            t,
            Transition::Reconnect {
                attempt: 1,
                delay: Duration::from_secs(3)
            }
        );
        assert_eq!(m.state(), ReconnectScheduled);
        let tail: Vec<_> = m.history().iter().skip(2).copied().collect();
        assert_eq!(tail, vec![(Open, Closed), (Closed, ReconnectScheduled)]);
        assert!(!m.snapshot().is_connected);
        assert!(!m.snapshot().is_loading);

        assert_eq!(m.on_reconnect_timer(), Transition::Connect { attempt: 1 });
        assert_eq!(m.state(), Connecting);
        assert!(!m.snapshot().is_loading);
    }

    #[test]
    fn five_failures_with_cap_five_fails_without_sixth_attempt() {
        let mut m = machine(5);
        let mut connects = 0;
        let mut t = m.open();
        loop {
            match t {
                Transition::Connect { .. } => {
                    connects += 1;
                    t = m.on_transport_failure("refused");
                }
                Transition::Reconnect { .. } => t = m.on_reconnect_timer(),
                Transition::Failed { attempts } => {
                    assert_eq!(attempts, 5);
                    break;
                }
                other => panic!("unexpected transition {other:?}"),
            }
        }
        assert_eq!(connects, 5);
        assert_eq!(m.state(), Failed);
        assert_eq!(m.on_reconnect_timer(), Transition::Ignored);
        assert_eq!(m.open(), Transition::Ignored);
        let snap = m.snapshot();
        assert!(!snap.is_connected);
        assert!(snap.error.unwrap().contains("reconnect stopped"));
    }

    #[test]
    fn open_resets_budget() {
        let mut m = machine(3);
        m.open();
        m.on_transport_failure("refused");
        m.on_reconnect_timer();
        assert_eq!(m.budget().attempts(), 2);
        m.on_established();
        assert_eq!(m.budget().attempts(), 0);

        // a dropped connection gets the full budget again
        let mut failures = 0;
        let mut t = m.on_transport_failure("dropped");
        while let Transition::Reconnect { .. } = t {
            m.on_reconnect_timer();
            failures += 1;
            t = m.on_transport_failure("refused");
        }
        assert_eq!(failures, 3);
        assert_eq!(t, Transition::Failed { attempts: 3 });
    }

    #[test]
    fn zero_cap_retries_forever() {
        let mut m = machine(0);
        m.open();
        for _ in 0..50 {
            assert!(matches!(
                m.on_transport_failure("refused"),
                Transition::Reconnect { .. }
            ));
            m.on_reconnect_timer();
        }
    }

    #[test]
    fn frames_merge_facets() {
        let mut m = open_machine(5);
        assert_eq!(m.on_frame(UPDATE_SNAPSHOT), FrameOutcome::Merged { facets: 1 });
        assert_eq!(m.on_frame(UPDATE_ANOMALIES), FrameOutcome::Merged { facets: 1 });
        let snap = m.snapshot();
        assert!(snap.data.snapshot.is_some());
        assert_eq!(snap.data.anomalies.unwrap().alerts.len(), 1);
        assert!(snap.last_update.is_some());
    }

    #[test]
    fn malformed_frame_changes_nothing() {
        let mut m = open_machine(5);
        m.on_frame(UPDATE_SNAPSHOT);
        let before = m.snapshot();
        assert!(matches!(m.on_frame("{not json"), FrameOutcome::Malformed(_)));
        assert_eq!(m.snapshot(), before);
        assert_eq!(m.state(), Open);
    }

    #[test]
    fn server_error_is_non_fatal_and_cleared_on_next_open() {
        let mut m = open_machine(5);
        m.on_frame(r#"{"type":"error","message":"rate limited"}"#);
        let snap = m.snapshot();
        assert_eq!(snap.error.as_deref(), Some("rate limited"));
        assert!(snap.is_connected);

        m.on_transport_failure("dropped");
        m.on_reconnect_timer();
        assert_eq!(m.snapshot().error.as_deref(), Some("rate limited"));
        m.on_established();
        assert!(m.snapshot().error.is_none());
    }

    #[test]
    fn stale_data_survives_disconnect() {
        let mut m = open_machine(5);
        m.on_frame(UPDATE_SNAPSHOT);
        m.on_transport_failure("dropped");
        let snap = m.snapshot();
        assert!(!snap.is_connected);
        assert!(snap.data.snapshot.is_some());
        assert!(snap.last_update.is_some());
    }

    #[test]
    fn teardown_is_terminal_and_idempotent() {
        let mut m = open_machine(5);
        m.on_frame(UPDATE_SNAPSHOT);
        assert_eq!(m.teardown(), Transition::TornDown);
        assert_eq!(m.teardown(), Transition::Ignored);
        assert_eq!(m.state(), Idle);
        let before = m.snapshot();

        assert_eq!(m.on_transport_failure("late close"), Transition::Ignored);
        assert_eq!(m.on_reconnect_timer(), Transition::Ignored);
        assert_eq!(m.on_established(), Transition::Ignored);
        assert_eq!(m.on_frame(UPDATE_ANOMALIES), FrameOutcome::Ignored);
        assert_eq!(m.open(), Transition::Ignored);
        assert_eq!(m.snapshot(), before);
    }

    #[test]
    fn frames_outside_open_are_ignored() {
        let mut m = machine(5);
        m.open();
        assert_eq!(m.on_frame(UPDATE_SNAPSHOT), FrameOutcome::Ignored);
        assert!(m.data().is_empty());
    }

    #[test]
    fn every_recorded_transition_is_legal() {
        let mut m = machine(2);
        m.open();
        m.on_transport_failure("refused");
        m.on_reconnect_timer();
        m.on_established();
        m.on_transport_failure("dropped");
        m.on_reconnect_timer();
        m.on_transport_failure("refused");
        m.on_reconnect_timer();
        m.on_transport_failure("refused");
        m.teardown();
        assert!(m.history().iter().all(|(from, to)| from.can_transition_to(*to)));
        assert!(m.history().contains(&(ReconnectScheduled, Failed)));
        assert!(!m.history().contains(&(Connecting, Failed)));
        assert_eq!(m.history().back(), Some(&(Failed, Idle)));
    }

    #[test]
    fn exhausted_attempt_fails_through_reconnect_scheduled() {
        let mut m = machine(1);
        m.open();
        assert_eq!(
            m.on_transport_failure("refused"),
            Transition::Failed { attempts: 1 }
        );
        let path: Vec<_> = m.history().iter().copied().collect();
        assert_eq!(
            path,
            vec![
                (Idle, Connecting),
                (Connecting, ReconnectScheduled),
                (ReconnectScheduled, Failed),
            ]
        );
        assert_eq!(m.on_reconnect_timer(), Transition::Ignored);
        assert_eq!(
            m.snapshot().error,
            Some(RadarError::ReconnectExhausted { attempts: 1 }.to_string())
        );
    }

    #[test]
    fn history_is_bounded_under_unlimited_retries() {
        let mut m = machine(0);
        m.open();
        for _ in 0..10_000 {
            m.on_transport_failure("refused");
            m.on_reconnect_timer();
        }
        assert_eq!(m.history().len(), HISTORY_LIMIT);
        assert_eq!(m.history().back(), Some(&(ReconnectScheduled, Connecting)));
        assert_eq!(m.budget().attempts(), 10_001);
    }

    #[test]
    fn illegal_edges() {
        assert!(!Idle.can_transition_to(Open));
        assert!(!Open.can_transition_to(ReconnectScheduled));
        assert!(!Failed.can_transition_to(Connecting));
        assert!(!Connecting.can_transition_to(Failed));
        assert!(ReconnectScheduled.can_transition_to(Failed));
        assert!(Closed.can_transition_to(Failed));
        assert!(Failed.can_transition_to(Idle));
    }
}
