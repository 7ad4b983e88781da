//! Client-side delivery session
//!
//! Ties the server's messages to the local zone, timer, drift and combo
//! state. Every method returns the packets that should go to the server;
//! anything the player should be told is queued as a `Notice`.

use crate::combo::ScoreTracker;
use crate::drift::DriftTracker;
use crate::timer::{TimerEvent, TimerState};
use crate::zones::{ZoneDetector, ZoneEvent};
use log::{debug, info, warn};
use shared::{DeliveryResult, DeliveryTask, GameConfig, Packet, PlayerScore, Vec3};
use std::fmt;
use std::time::{Duration, Instant};

/// Pause between establishing the session and asking for the first task.
pub const FIRST_REQUEST_DELAY: Duration = Duration::from_secs(2);
/// Pause between a resolved attempt and asking for the next task.
pub const NEXT_REQUEST_DELAY: Duration = Duration::from_secs(3);
/// Pause after the local countdown runs out before asking again.
pub const EXPIRED_REQUEST_DELAY: Duration = Duration::from_secs(2);
/// How long a request or arrival report waits for an answer before it is sent again.
pub const RESEND_INTERVAL: Duration = Duration::from_secs(1);

/// A server-bound message still waiting for its answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pending {
    /// Asked for a task, no `DeliveryStarted` yet.
    Task,
    /// Reported arrival, no `DeliveryCompleted` yet.
    Result,
}

/// Things the player would see on the HUD
#[derive(Debug, Clone, PartialEq)]
pub enum Notice {
    NewDelivery { destination: String, time_limit: f32 },
    PizzaPickedUp { destination: String },
    HurryUp,
    TimesUp,
    Delivered { total_tip: u32, session_gain: u32 },
    DeliveryFailed,
    DriftBonus { amount: u32 },
    DriftScore { seconds: f32, run_total: u32 },
    JumpBonus,
    ScoreChanged { total_score: u32 },
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::NewDelivery {
                destination,
                time_limit,
            } => write!(
                f,
                "New delivery to {}! Pick up the pizza first. {:.0}s on the clock",
                destination, time_limit
            ),
            Notice::PizzaPickedUp { destination } => {
                write!(f, "Pizza picked up! Deliver to {}", destination)
            }
            Notice::HurryUp => write!(f, "HURRY UP!"),
            Notice::TimesUp => write!(f, "TIME'S UP!"),
            Notice::Delivered {
                total_tip,
                session_gain,
            } => write!(
                f,
                "Delivered! Tip: ${} (+{} session points)",
                total_tip, session_gain
            ),
            Notice::DeliveryFailed => write!(f, "Delivery failed"),
            Notice::DriftBonus { amount } => write!(f, "DRIFT BONUS +${}", amount),
            Notice::DriftScore { seconds, run_total } => {
                write!(f, "DRIFT {:.1}s! {} drift points this run", seconds, run_total)
            }
            Notice::JumpBonus => write!(f, "JUMP BONUS +${}", GameConfig::JUMP_BONUS),
            Notice::ScoreChanged { total_score } => write!(f, "Total score: {}", total_score),
        }
    }
}

pub struct DeliverySession {
    current_task: Option<DeliveryTask>,
    zones: Option<ZoneDetector>,
    timer: TimerState,
    drift: DriftTracker,
    tracker: ScoreTracker,
    server_score: PlayerScore,
    next_request_at: Option<Instant>,
    pending: Option<(Pending, Instant)>,
    last_resolved: Option<String>,
    resolved_deliveries: u32,
    notices: Vec<Notice>,
}

impl DeliverySession {
    pub fn new() -> Self {
        Self {
            current_task: None,
            zones: None,
            timer: TimerState::new(),
            drift: DriftTracker::new(),
            tracker: ScoreTracker::new(),
            server_score: PlayerScore::new(),
            next_request_at: None,
            pending: None,
            last_resolved: None,
            resolved_deliveries: 0,
            notices: Vec::new(),
        }
    }

    /// Called once the server has accepted the connection.
    pub fn on_connected(&mut self, now: Instant) {
        self.schedule_request(now + FIRST_REQUEST_DELAY);
    }

    fn schedule_request(&mut self, at: Instant) {
        self.next_request_at = Some(at);
    }

    fn notify(&mut self, notice: Notice) {
        self.notices.push(notice);
    }

    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    /// Applies one server message to the local state.
    pub fn handle_packet(&mut self, packet: Packet, now: Instant) {
        match packet {
            Packet::DeliveryStarted { task } => self.on_delivery_started(task, now),
            Packet::DeliveryCompleted { result } => self.on_delivery_completed(result, now),
            Packet::ScoreUpdated { score } => {
                let total_score = score.total_score;
                self.server_score = score;
                self.notify(Notice::ScoreChanged { total_score });
            }
            Packet::DriftBonus { amount } => self.notify(Notice::DriftBonus { amount }),
            Packet::JumpBonus => self.notify(Notice::JumpBonus),
            Packet::GameStateChanged { state } => debug!("Game state changed to {:?}", state),
            Packet::Connected { .. } | Packet::Disconnected { .. } => {
                debug!("Session packet reached the delivery session, ignoring");
            }
            Packet::Connect { .. }
            | Packet::Heartbeat
            | Packet::Disconnect
            | Packet::RequestNewDelivery
            | Packet::ResumeDelivery
            | Packet::CompleteDelivery
            | Packet::ReportDrift { .. }
            | Packet::ReportJump => warn!("Unexpected server-bound packet from server"),
        }
    }

    fn on_delivery_started(&mut self, task: DeliveryTask, now: Instant) {
        self.pending = None;
        let in_progress = self
            .current_task
            .as_ref()
            .is_some_and(|current| current.id == task.id);
        if in_progress || self.last_resolved.as_deref() == Some(task.id.as_str()) {
            debug!("Ignoring repeated task {}", task.id);
            return;
        }

        self.zones = Some(ZoneDetector::new(&task));
        self.timer.start(now, task.time_limit);
        self.drift.reset_total_bonus();
        self.next_request_at = None;

        self.notify(Notice::NewDelivery {
            destination: task.delivery_location.name.clone(),
            time_limit: task.time_limit,
        });
        self.current_task = Some(task);
    }

    fn on_delivery_completed(&mut self, result: DeliveryResult, now: Instant) {
        self.pending = None;
        self.timer.stop();
        self.last_resolved = self.current_task.take().map(|task| task.id);
        self.zones = None;
        self.resolved_deliveries += 1;

        if result.success {
            self.tracker.record_delivery(true, now);
            let session_gain = self.tracker.add_score(result.total_tip);
            self.notify(Notice::Delivered {
                total_tip: result.total_tip,
                session_gain,
            });
        } else {
            self.tracker.record_delivery(false, now);
            self.notify(Notice::DeliveryFailed);
        }

        self.schedule_request(now + NEXT_REQUEST_DELAY);
    }

    /// Per-frame update with the latest vehicle position.
    pub fn update(&mut self, now: Instant, position: Vec3) -> Vec<Packet> {
        let mut outbound = Vec::new();

        if let Some(at) = self.next_request_at {
            if now >= at {
                self.next_request_at = None;
                self.pending = Some((Pending::Task, now));
                debug!("Requesting a new delivery");
                outbound.push(Packet::RequestNewDelivery);
            }
        }

        for event in self.timer.update(now) {
            match event {
                TimerEvent::Warning => self.notify(Notice::HurryUp),
                TimerEvent::Expired => {
                    self.notify(Notice::TimesUp);
                    if matches!(self.pending, Some((Pending::Result, _))) {
                        warn!("No verdict for the reported arrival, dropping the task");
                        self.abandon_task();
                    }
                    self.schedule_request(now + EXPIRED_REQUEST_DELAY);
                }
            }
        }

        let event = self.zones.as_mut().and_then(|zones| zones.update(position));
        match event {
            Some(ZoneEvent::PickedUp) => {
                let destination = self
                    .current_task
                    .as_ref()
                    .map(|task| task.delivery_location.name.clone())
                    .unwrap_or_default();
                self.notify(Notice::PizzaPickedUp { destination });
            }
            Some(ZoneEvent::Delivered) => {
                info!("Arrived at the destination, reporting delivery");
                self.pending = Some((Pending::Result, now));
                outbound.push(Packet::CompleteDelivery);
            }
            None => {}
        }

        outbound
    }

    fn abandon_task(&mut self) {
        self.current_task = None;
        self.zones = None;
        self.pending = None;
    }

    /// Repeats whatever is still unanswered. Called once per heartbeat.
    ///
    /// A lost task is recovered by asking for a new one and for a repeat of
    /// the live one; the server honours whichever applies. A lost verdict is
    /// recovered by reporting arrival again, which the server ignores once
    /// the attempt is resolved.
    pub fn resend_pending(&mut self, now: Instant) -> Vec<Packet> {
        let Some((pending, since)) = self.pending else {
            return Vec::new();
        };
        if now.saturating_duration_since(since) < RESEND_INTERVAL {
            return Vec::new();
        }

        let packets = match pending {
            Pending::Result => vec![Packet::CompleteDelivery],
            // Still holding a locally expired task; the server is waiting on arrival
            Pending::Task if self.current_task.is_some() => return Vec::new(),
            Pending::Task => vec![Packet::RequestNewDelivery, Packet::ResumeDelivery],
        };
        debug!("No answer yet, resending {:?}", packets);
        self.pending = Some((pending, now));
        packets
    }

    pub fn on_drift_started(&mut self, now: Instant) {
        self.drift.start_drift(now);
    }

    /// Shows a finished drift and reports it while a task is in progress.
    pub fn on_drift_ended(&mut self, now: Instant) -> Vec<Packet> {
        let Some(drift_seconds) = self.drift.end_drift(now) else {
            return Vec::new();
        };

        self.notify(Notice::DriftScore {
            seconds: drift_seconds,
            run_total: self.drift.total_drift_bonus(),
        });
        if self.current_task.is_some() {
            vec![Packet::ReportDrift { drift_seconds }]
        } else {
            Vec::new()
        }
    }

    /// Points the drift in progress is worth so far.
    pub fn drift_score(&self, now: Instant) -> Option<u32> {
        self.drift
            .is_drifting()
            .then(|| self.drift.current_drift_score(now))
    }

    /// Reports a jump while a task is in progress.
    pub fn on_jump(&mut self) -> Vec<Packet> {
        if self.current_task.is_some() {
            vec![Packet::ReportJump]
        } else {
            Vec::new()
        }
    }

    /// Where the vehicle should be heading, if anywhere.
    pub fn target(&self) -> Option<Vec3> {
        self.zones.as_ref().and_then(|zones| zones.target())
    }

    pub fn distance_to_target(&self, position: Vec3) -> Option<f32> {
        self.zones
            .as_ref()
            .and_then(|zones| zones.distance_to_target(position))
    }

    pub fn current_task(&self) -> Option<&DeliveryTask> {
        self.current_task.as_ref()
    }

    pub fn has_pizza(&self) -> bool {
        self.zones.as_ref().is_some_and(|zones| zones.has_pizza())
    }

    pub fn time_remaining(&self, now: Instant) -> f32 {
        self.timer.remaining(now)
    }

    /// The authoritative ledger as last reported by the server.
    pub fn server_score(&self) -> &PlayerScore {
        &self.server_score
    }

    /// The local, combo-scaled score. Not the same number as the server's total.
    pub fn session_score(&self) -> u32 {
        self.tracker.session_score()
    }

    pub fn combo_multiplier(&self) -> f32 {
        self.tracker.combo_multiplier()
    }

    pub fn resolved_deliveries(&self) -> u32 {
        self.resolved_deliveries
    }

    pub fn successful_deliveries(&self) -> u32 {
        self.tracker.delivery_count()
    }
}

impl Default for DeliverySession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_approx_eq::assert_approx_eq;
    use shared::{delivery_locations, pickup_location};

    fn task() -> DeliveryTask {
        DeliveryTask {
            id: "task-1".to_string(),
            pickup_location: pickup_location(),
            delivery_location: delivery_locations()[0].clone(),
            time_limit: 50.0,
            base_reward: 150,
            distance_meters: 500,
        }
    }

    fn success(total_tip: u32) -> DeliveryResult {
        DeliveryResult {
            success: true,
            time_taken: 20.0,
            time_remaining: 30.0,
            base_reward: 150,
            speed_bonus: 60,
            drift_bonus: 0,
            total_tip,
        }
    }

    const SHOP: Vec3 = Vec3::new(0.0, 1.0, 0.0);
    const DESTINATION: Vec3 = Vec3::new(400.0, 1.0, 300.0);

    #[test]
    fn test_first_request_is_delayed() {
        let mut session = DeliverySession::new();
        let start = Instant::now();
        session.on_connected(start);

        assert!(session.update(start + Duration::from_secs(1), SHOP).is_empty());
        assert_eq!(
            session.update(start + Duration::from_secs(2), SHOP),
            vec![Packet::RequestNewDelivery]
        );
        assert!(session.update(start + Duration::from_secs(3), SHOP).is_empty());
    }

    #[test]
    fn test_pickup_then_delivery_reports_completion() {
        let mut session = DeliverySession::new();
        let start = Instant::now();
        session.handle_packet(Packet::DeliveryStarted { task: task() }, start);
        assert_eq!(session.target(), Some(SHOP));

        assert!(session.update(start, SHOP).is_empty());
        assert!(session.has_pizza());
        assert_eq!(session.target(), Some(DESTINATION));

        let outbound = session.update(start + Duration::from_secs(20), DESTINATION);
        assert_eq!(outbound, vec![Packet::CompleteDelivery]);
        assert_eq!(session.target(), None);

        // Lingering in the zone does not report twice
        assert!(session
            .update(start + Duration::from_secs(21), DESTINATION)
            .is_empty());
    }

    #[test]
    fn test_completion_schedules_next_request() {
        let mut session = DeliverySession::new();
        let start = Instant::now();
        session.handle_packet(Packet::DeliveryStarted { task: task() }, start);

        let done = start + Duration::from_secs(20);
        session.handle_packet(Packet::DeliveryCompleted { result: success(410) }, done);
        assert!(session.current_task().is_none());
        assert_eq!(session.session_score(), 410);
        assert_eq!(session.resolved_deliveries(), 1);

        assert!(session
            .update(done + Duration::from_secs(2), DESTINATION)
            .is_empty());
        assert_eq!(
            session.update(done + Duration::from_secs(3), DESTINATION),
            vec![Packet::RequestNewDelivery]
        );
    }

    #[test]
    fn test_session_and_server_scores_diverge() {
        let mut session = DeliverySession::new();
        let start = Instant::now();

        session.handle_packet(Packet::DeliveryStarted { task: task() }, start);
        session.handle_packet(
            Packet::DeliveryCompleted { result: success(400) },
            start + Duration::from_secs(10),
        );
        session.handle_packet(Packet::DeliveryStarted { task: task() }, start + Duration::from_secs(13));
        session.handle_packet(
            Packet::DeliveryCompleted { result: success(400) },
            start + Duration::from_secs(20),
        );

        let mut ledger = PlayerScore::new();
        ledger.total_score = 800;
        session.handle_packet(Packet::ScoreUpdated { score: ledger }, start + Duration::from_secs(20));

        assert_eq!(session.server_score().total_score, 800);
        assert_eq!(session.session_score(), 400 + 500);
        assert_approx_eq!(session.combo_multiplier(), 1.25);
    }

    #[test]
    fn test_failure_resets_combo_and_notifies() {
        let mut session = DeliverySession::new();
        let start = Instant::now();
        session.handle_packet(Packet::DeliveryStarted { task: task() }, start);
        session.take_notices();

        session.handle_packet(
            Packet::DeliveryCompleted {
                result: DeliveryResult::failed(55.0),
            },
            start + Duration::from_secs(55),
        );
        assert_eq!(session.take_notices(), vec![Notice::DeliveryFailed]);
        assert_eq!(session.session_score(), 0);
    }

    #[test]
    fn test_local_expiry_does_not_resolve() {
        let mut session = DeliverySession::new();
        let start = Instant::now();
        session.handle_packet(Packet::DeliveryStarted { task: task() }, start);
        session.update(start, SHOP);
        session.take_notices();

        session.update(start + Duration::from_secs(45), Vec3::new(100.0, 1.0, 100.0));
        assert_eq!(session.take_notices(), vec![Notice::HurryUp]);

        let expired = start + Duration::from_secs(50);
        session.update(expired, Vec3::new(150.0, 1.0, 150.0));
        assert_eq!(session.take_notices(), vec![Notice::TimesUp]);
        assert!(session.current_task().is_some());
        assert!(session.has_pizza());

        assert_eq!(
            session.update(expired + Duration::from_secs(2), Vec3::new(200.0, 1.0, 150.0)),
            vec![Packet::RequestNewDelivery]
        );

        // Arriving late still reports completion and lets the server judge it
        assert_eq!(
            session.update(expired + Duration::from_secs(3), DESTINATION),
            vec![Packet::CompleteDelivery]
        );
    }

    #[test]
    fn test_bonus_reports_only_during_task() {
        let mut session = DeliverySession::new();
        let start = Instant::now();

        session.on_drift_started(start);
        assert!(session.on_drift_ended(start + Duration::from_secs(1)).is_empty());
        assert!(session.on_jump().is_empty());

        session.handle_packet(Packet::DeliveryStarted { task: task() }, start);
        session.on_drift_started(start + Duration::from_secs(2));
        assert_eq!(
            session.on_drift_ended(start + Duration::from_secs(4)),
            vec![Packet::ReportDrift { drift_seconds: 2.0 }]
        );
        assert_eq!(session.on_jump(), vec![Packet::ReportJump]);
    }

    #[test]
    fn test_bonus_packets_become_notices() {
        let mut session = DeliverySession::new();
        let now = Instant::now();
        session.handle_packet(Packet::DriftBonus { amount: 75 }, now);
        session.handle_packet(Packet::JumpBonus, now);
        assert_eq!(
            session.take_notices(),
            vec![Notice::DriftBonus { amount: 75 }, Notice::JumpBonus]
        );
    }

    #[test]
    fn test_unanswered_completion_is_resent() {
        let mut session = DeliverySession::new();
        let start = Instant::now();
        session.handle_packet(Packet::DeliveryStarted { task: task() }, start);
        session.update(start, SHOP);

        let arrived = start + Duration::from_secs(20);
        assert_eq!(session.update(arrived, DESTINATION), vec![Packet::CompleteDelivery]);

        assert!(session.resend_pending(arrived + Duration::from_millis(500)).is_empty());
        let retry = arrived + RESEND_INTERVAL;
        assert_eq!(session.resend_pending(retry), vec![Packet::CompleteDelivery]);
        assert!(session.resend_pending(retry).is_empty());

        session.handle_packet(Packet::DeliveryCompleted { result: success(410) }, retry);
        assert!(session
            .resend_pending(retry + Duration::from_secs(5))
            .is_empty());
        assert_eq!(session.resolved_deliveries(), 1);
    }

    #[test]
    fn test_unanswered_request_asks_for_resume() {
        let mut session = DeliverySession::new();
        let start = Instant::now();
        session.on_connected(start);

        let asked = start + FIRST_REQUEST_DELAY;
        assert_eq!(session.update(asked, SHOP), vec![Packet::RequestNewDelivery]);
        assert_eq!(
            session.resend_pending(asked + RESEND_INTERVAL),
            vec![Packet::RequestNewDelivery, Packet::ResumeDelivery]
        );

        let arrived = asked + Duration::from_secs(2);
        session.handle_packet(Packet::DeliveryStarted { task: task() }, arrived);
        assert!(session.current_task().is_some());
        assert!(session
            .resend_pending(arrived + Duration::from_secs(5))
            .is_empty());
    }

    #[test]
    fn test_repeated_task_is_ignored() {
        let mut session = DeliverySession::new();
        let start = Instant::now();
        session.handle_packet(Packet::DeliveryStarted { task: task() }, start);
        session.update(start, SHOP);
        session.take_notices();

        let later = start + Duration::from_secs(10);
        session.handle_packet(Packet::DeliveryStarted { task: task() }, later);
        assert!(session.has_pizza());
        assert_approx_eq!(session.time_remaining(later), 40.0, 0.01);
        assert!(session.take_notices().is_empty());

        let done = start + Duration::from_secs(20);
        session.handle_packet(Packet::DeliveryCompleted { result: success(410) }, done);
        session.handle_packet(Packet::DeliveryStarted { task: task() }, done);
        assert!(session.current_task().is_none());
    }

    #[test]
    fn test_completion_without_verdict_is_dropped_at_expiry() {
        let mut session = DeliverySession::new();
        let start = Instant::now();
        session.handle_packet(Packet::DeliveryStarted { task: task() }, start);
        session.update(start, SHOP);
        session.update(start + Duration::from_secs(30), DESTINATION);

        let expired = start + Duration::from_secs(50);
        session.update(expired, DESTINATION);
        assert!(session.current_task().is_none());
        assert!(session
            .resend_pending(expired + Duration::from_secs(1))
            .is_empty());
        assert_eq!(
            session.update(expired + EXPIRED_REQUEST_DELAY, DESTINATION),
            vec![Packet::RequestNewDelivery]
        );
    }

    #[test]
    fn test_finished_drift_is_shown_with_run_total() {
        let mut session = DeliverySession::new();
        let start = Instant::now();

        session.on_drift_started(start);
        assert_eq!(session.drift_score(start + Duration::from_secs(1)), Some(50));
        session.on_drift_ended(start + Duration::from_secs(2));
        assert_eq!(session.drift_score(start + Duration::from_secs(3)), None);

        session.on_drift_started(start + Duration::from_secs(3));
        session.on_drift_ended(start + Duration::from_millis(4500));
        assert_eq!(
            session.take_notices(),
            vec![
                Notice::DriftScore {
                    seconds: 2.0,
                    run_total: 100
                },
                Notice::DriftScore {
                    seconds: 1.5,
                    run_total: 175
                },
            ]
        );

        // Too short to count
        session.on_drift_started(start + Duration::from_secs(5));
        session.on_drift_ended(start + Duration::from_millis(5200));
        assert!(session.take_notices().is_empty());
    }

    #[test]
    fn test_successful_deliveries_counts_only_successes() {
        let mut session = DeliverySession::new();
        let start = Instant::now();
        session.handle_packet(Packet::DeliveryStarted { task: task() }, start);
        session.handle_packet(
            Packet::DeliveryCompleted {
                result: DeliveryResult::failed(60.0),
            },
            start + Duration::from_secs(60),
        );
        assert_eq!(session.successful_deliveries(), 0);
        assert_eq!(session.resolved_deliveries(), 1);
    }
}
