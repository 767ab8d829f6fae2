//! Timer handles of a connection.
//!
//! The engine never runs timers itself. It asks a [`TimerService`] to schedule an expiry and keeps
//! the returned id, the service calls back into the connection when the time has come. A handle
//! is not `Clone`, and the only way to get one is by scheduling, so a connection can not hold two
//! handles for one timer.
//!
//! The retransmit and the persist timer are never armed at the same time. Both live in one
//! [`SendTimer`] and arming either while the other runs is an [`Invariant`] violation.
//!
//! [`TimerService`]: trait.TimerService.html
//! [`SendTimer`]: enum.SendTimer.html
//! [`Invariant`]: ../enum.Invariant.html
use crate::layer::Invariant;
use crate::time::Duration;

/// Backoff multipliers, indexed by the shift count.
pub const BACKOFF: [u32; MAX_SHIFT as usize + 1] = [1, 2, 4, 8, 16, 32, 64, 64, 64, 64, 64, 64, 64];

/// The largest shift count.
pub const MAX_SHIFT: u8 = 12;

/// An identifier of a scheduled expiry, chosen by the timer service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(pub u64);

/// The timers a connection schedules.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerKind {
    /// Retransmission of unacknowledged data.
    Retransmit,
    /// Probing a closed window.
    Persist,
    /// Sending an acknowledgment that was held back.
    DelayedAck,
}

/// Schedules timer expiries on behalf of connections.
pub trait TimerService {
    /// Schedule an expiry of `kind` after the given duration.
    fn schedule(&mut self, kind: TimerKind, after: Duration) -> TimerId;

    /// Cancel a scheduled expiry. The id is not used afterwards.
    fn cancel(&mut self, id: TimerId);
}

/// An armed timer.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct Armed {
    id: TimerId,
    after: Duration,
}

/// The mutually exclusive send timers.
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum SendTimer {
    /// Neither timer runs.
    Idle,
    /// Unacknowledged data is timed.
    Retransmit(Armed),
    /// The peer window is closed and will be probed.
    Persist(Armed),
}

impl Armed {
    fn schedule(timers: &mut dyn TimerService, kind: TimerKind, after: Duration) -> Self {
        Armed {
            id: timers.schedule(kind, after),
            after,
        }
    }

    /// The id given by the timer service.
    pub fn id(&self) -> TimerId {
        self.id
    }

    /// The duration the timer was scheduled with.
    pub fn after(&self) -> Duration {
        self.after
    }

    fn cancel(self, timers: &mut dyn TimerService) {
        timers.cancel(self.id)
    }
}

impl SendTimer {
    /// Arm the retransmit timer.
    pub fn arm_retransmit(&mut self, timers: &mut dyn TimerService, after: Duration)
        -> Result<(), Invariant>
    {
        match self {
            SendTimer::Idle => {
                *self = SendTimer::Retransmit(Armed::schedule(timers, TimerKind::Retransmit, after));
                Ok(())
            },
            SendTimer::Retransmit(_) => Err(Invariant::RetransmitArmed),
            SendTimer::Persist(_) => Err(Invariant::PersistArmed),
        }
    }

    /// Arm the persist timer.
    pub fn arm_persist(&mut self, timers: &mut dyn TimerService, after: Duration)
        -> Result<(), Invariant>
    {
        match self {
            SendTimer::Idle => {
                *self = SendTimer::Persist(Armed::schedule(timers, TimerKind::Persist, after));
                Ok(())
            },
            SendTimer::Retransmit(_) => Err(Invariant::RetransmitArmed),
            SendTimer::Persist(_) => Err(Invariant::PersistArmed),
        }
    }

    /// Cancel the retransmit timer if it runs.
    pub fn disarm_retransmit(&mut self, timers: &mut dyn TimerService) {
        if self.is_retransmit() {
            self.disarm(timers);
        }
    }

    /// Cancel the persist timer if it runs.
    pub fn disarm_persist(&mut self, timers: &mut dyn TimerService) {
        if self.is_persist() {
            self.disarm(timers);
        }
    }

    /// Cancel whichever timer runs.
    pub fn disarm(&mut self, timers: &mut dyn TimerService) {
        match core::mem::replace(self, SendTimer::Idle) {
            SendTimer::Idle => (),
            SendTimer::Retransmit(armed) | SendTimer::Persist(armed) => armed.cancel(timers),
        }
    }

    /// Forget a timer that has fired.
    ///
    /// The service already dropped the expiry so it is not cancelled.
    pub fn expire(&mut self, kind: TimerKind) {
        let fired = match (&*self, kind) {
            (SendTimer::Retransmit(_), TimerKind::Retransmit) => true,
            (SendTimer::Persist(_), TimerKind::Persist) => true,
            _ => false,
        };
        if fired {
            *self = SendTimer::Idle;
        }
    }

    /// Query if neither timer runs.
    pub fn is_idle(&self) -> bool {
        match self {
            SendTimer::Idle => true,
            _ => false,
        }
    }

    /// Query if the retransmit timer runs.
    pub fn is_retransmit(&self) -> bool {
        match self {
            SendTimer::Retransmit(_) => true,
            _ => false,
        }
    }

    /// Query if the persist timer runs.
    pub fn is_persist(&self) -> bool {
        match self {
            SendTimer::Persist(_) => true,
            _ => false,
        }
    }

    /// The armed handle, if any.
    pub fn armed(&self) -> Option<&Armed> {
        match self {
            SendTimer::Idle => None,
            SendTimer::Retransmit(armed) | SendTimer::Persist(armed) => Some(armed),
        }
    }
}

impl Default for SendTimer {
    fn default() -> Self {
        SendTimer::Idle
    }
}

/// Pending acknowledgment of received data.
#[derive(Debug, PartialEq, Eq, Hash)]
pub enum AckState {
    /// Nothing to acknowledge.
    None,
    /// An acknowledgment is owed and the delayed-ACK timer runs.
    Delayed(Armed),
    /// An acknowledgment is owed immediately.
    Now,
}

impl AckState {
    /// Request an immediate acknowledgment.
    ///
    /// A delayed acknowledgment is promoted, its timer is cancelled.
    pub fn now(&mut self, timers: &mut dyn TimerService) {
        if let AckState::Delayed(armed) = core::mem::replace(self, AckState::Now) {
            armed.cancel(timers);
        }
    }

    /// Hold back an acknowledgment for at most `after`.
    ///
    /// Returns `false` if an acknowledgment is already owed, in which case nothing changes.
    pub fn delay(&mut self, timers: &mut dyn TimerService, after: Duration) -> bool {
        match self {
            AckState::None => {
                *self = AckState::Delayed(Armed::schedule(timers, TimerKind::DelayedAck, after));
                true
            },
            _ => false,
        }
    }

    /// Restart a running delayed-ACK timer.
    pub fn restart(&mut self, timers: &mut dyn TimerService) {
        if let AckState::Delayed(armed) = self {
            let after = armed.after;
            let old = core::mem::replace(armed, Armed::schedule(timers, TimerKind::DelayedAck, after));
            old.cancel(timers);
        }
    }

    /// The acknowledgment was sent.
    pub fn clear(&mut self, timers: &mut dyn TimerService) {
        if let AckState::Delayed(armed) = core::mem::replace(self, AckState::None) {
            armed.cancel(timers);
        }
    }

    /// The delayed-ACK timer fired, the acknowledgment is now due.
    pub fn expire(&mut self) {
        if let AckState::Delayed(_) = self {
            *self = AckState::Now;
        }
    }

    /// Query if an immediate acknowledgment is due.
    pub fn is_now(&self) -> bool {
        match self {
            AckState::Now => true,
            _ => false,
        }
    }

    /// Query if the delayed-ACK timer runs.
    pub fn is_delayed(&self) -> bool {
        match self {
            AckState::Delayed(_) => true,
            _ => false,
        }
    }
}

impl Default for AckState {
    fn default() -> Self {
        AckState::None
    }
}

/// The persist duration for a shift count.
///
/// The round-trip based `base` is multiplied by the backoff of `shift` and clamped to the range.
pub fn persist_duration(base: Duration, shift: u8, min: Duration, max: Duration) -> Duration {
    let factor = BACKOFF[usize::from(shift.min(MAX_SHIFT))];
    let scaled = base.checked_mul(factor).unwrap_or(max);
    scaled.max(min).min(max)
}

#[cfg(test)]
mod test {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        next: u64,
        scheduled: Vec<(TimerId, TimerKind, Duration)>,
        cancelled: Vec<TimerId>,
    }

    impl TimerService for Recorder {
        fn schedule(&mut self, kind: TimerKind, after: Duration) -> TimerId {
            self.next += 1;
            let id = TimerId(self.next);
            self.scheduled.push((id, kind, after));
            id
        }

        fn cancel(&mut self, id: TimerId) {
            self.cancelled.push(id);
        }
    }

    #[test]
    fn exclusive_arming() {
        let mut timers = Recorder::default();
        let mut timer = SendTimer::default();

        timer.arm_retransmit(&mut timers, Duration::from_secs(1)).unwrap();
        assert_eq!(timer.arm_persist(&mut timers, Duration::from_secs(5)),
                   Err(Invariant::RetransmitArmed));
        assert_eq!(timer.arm_retransmit(&mut timers, Duration::from_secs(1)),
                   Err(Invariant::RetransmitArmed));
        assert_eq!(timers.scheduled.len(), 1);

        timer.disarm_persist(&mut timers);
        assert!(timer.is_retransmit());
        timer.disarm_retransmit(&mut timers);
        assert!(timer.is_idle());
        assert_eq!(timers.cancelled, vec![TimerId(1)]);

        timer.arm_persist(&mut timers, Duration::from_secs(5)).unwrap();
        assert_eq!(timer.arm_retransmit(&mut timers, Duration::from_secs(1)),
                   Err(Invariant::PersistArmed));
    }

    #[test]
    fn expire_does_not_cancel() {
        let mut timers = Recorder::default();
        let mut timer = SendTimer::default();
        timer.arm_persist(&mut timers, Duration::from_secs(5)).unwrap();
        timer.expire(TimerKind::Retransmit);
        assert!(timer.is_persist());
        timer.expire(TimerKind::Persist);
        assert!(timer.is_idle());
        assert!(timers.cancelled.is_empty());
    }

    #[test]
    fn delayed_ack() {
        let mut timers = Recorder::default();
        let mut ack = AckState::default();
        assert!(ack.delay(&mut timers, Duration::from_millis(200)));
        assert!(!ack.delay(&mut timers, Duration::from_millis(200)));
        ack.restart(&mut timers);
        assert_eq!(timers.scheduled.len(), 2);
        assert_eq!(timers.cancelled, vec![TimerId(1)]);
        assert!(ack.is_delayed());

        ack.now(&mut timers);
        assert!(ack.is_now());
        assert_eq!(timers.cancelled, vec![TimerId(1), TimerId(2)]);
        ack.clear(&mut timers);
        assert_eq!(ack, AckState::None);
    }

    #[test]
    fn persist_backoff() {
        let min = Duration::from_secs(5);
        let max = Duration::from_secs(60);
        let base = Duration::from_millis(1500);
        let mut last = Duration::from_secs(0);
        for shift in 0..=MAX_SHIFT {
            let next = persist_duration(base, shift, min, max);
            assert!(next >= last);
            assert!(next <= max);
            last = next;
        }
        assert_eq!(persist_duration(base, 0, min, max), min);
        assert_eq!(persist_duration(base, 3, min, max), Duration::from_secs(12));
        assert_eq!(persist_duration(base, MAX_SHIFT, min, max), max);
    }
}
