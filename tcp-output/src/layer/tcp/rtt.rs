//! Smoothed round-trip time estimation.
//!
//! Estimates are kept in fixed point milliseconds. The smoothed round trip time is scaled by 8 and
//! its mean deviation by 4, so that the gains of 1/8 and 1/4 are shifts (Jacobson, RFC 6298).
use crate::time::{Duration, Instant};
use crate::wire::TcpSeqNumber;

const SRTT_SHIFT: u32 = 3;
const RTTVAR_SHIFT: u32 = 2;

/// Round trip estimator and the retransmit timeout derived from it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RttEstimator {
    /// Smoothed round trip time, milliseconds scaled by 8. Zero before the first sample.
    srtt: u32,

    /// Mean deviation, milliseconds scaled by 4.
    rttvar: u32,

    /// The current retransmit timeout.
    rexmt: Duration,

    /// A segment being timed: when it was sent and its first sequence number.
    timing: Option<(Instant, TcpSeqNumber)>,
}

impl RttEstimator {
    /// An estimator without any samples.
    ///
    /// The deviation is initialized so that the retransmit timeout and the persist base both start
    /// out at `initial`.
    pub fn new(initial: Duration) -> Self {
        let initial_ms = duration_millis(initial);
        RttEstimator {
            srtt: 0,
            rttvar: (initial_ms << RTTVAR_SHIFT) / 2,
            rexmt: initial,
            timing: None,
        }
    }

    /// The current retransmit timeout.
    pub fn rexmt(&self) -> Duration {
        self.rexmt
    }

    /// The smoothed round trip time, if a sample was taken.
    pub fn smoothed(&self) -> Option<Duration> {
        if self.srtt == 0 {
            None
        } else {
            Some(Duration::from_millis(u64::from(self.srtt >> SRTT_SHIFT)))
        }
    }

    /// The round trip based estimate from which the persist timeout is backed off.
    ///
    /// This is `srtt + 2*rttvar` which is not less than `min`.
    pub fn persist_base(&self, min: Duration) -> Duration {
        let base = ((self.srtt >> (SRTT_SHIFT - 1)) + self.rttvar) >> 1;
        Duration::from_millis(u64::from(base)).max(min)
    }

    /// Query if a segment is being timed.
    pub fn is_timing(&self) -> bool {
        self.timing.is_some()
    }

    /// The segment being timed.
    pub fn timing(&self) -> Option<(Instant, TcpSeqNumber)> {
        self.timing
    }

    /// Start timing a segment unless one is timed already.
    ///
    /// Returns if timing was started.
    pub fn start(&mut self, now: Instant, seq: TcpSeqNumber) -> bool {
        if self.timing.is_some() {
            return false;
        }
        self.timing = Some((now, seq));
        true
    }

    /// Stop timing without a sample, e.g. when the timed segment is retransmitted.
    pub fn cancel(&mut self) {
        self.timing = None;
    }

    /// Take a sample if `ack` covers the timed segment.
    ///
    /// Returns the measured round trip time.
    pub fn acknowledged(&mut self, now: Instant, ack: TcpSeqNumber, min: Duration, max: Duration)
        -> Option<Duration>
    {
        match self.timing {
            Some((sent, seq)) if ack > seq => {
                let rtt = now.since(sent);
                self.sample(rtt, min, max);
                Some(rtt)
            },
            _ => None,
        }
    }

    /// Update the estimate with a measured round trip time.
    ///
    /// Ends timing. The retransmit timeout becomes `srtt + 4*rttvar`, at least two milliseconds
    /// above the sample and clamped into `[min, max]`.
    pub fn sample(&mut self, rtt: Duration, min: Duration, max: Duration) {
        let rtt_ms = duration_millis(rtt).max(1);
        if self.srtt != 0 {
            // Update both in place, the gains are encoded in the shifts.
            let delta = rtt_ms as i64 - i64::from(self.srtt >> SRTT_SHIFT);
            let srtt = i64::from(self.srtt) + delta;
            self.srtt = srtt.max(1) as u32;

            let delta = delta.abs() - i64::from(self.rttvar >> RTTVAR_SHIFT);
            let rttvar = i64::from(self.rttvar) + delta;
            self.rttvar = rttvar.max(1) as u32;
        } else {
            // First sample: the mean deviation is half the measurement.
            self.srtt = rtt_ms << SRTT_SHIFT;
            self.rttvar = rtt_ms << (RTTVAR_SHIFT - 1);
        }
        self.timing = None;

        let value = (self.srtt >> SRTT_SHIFT) + self.rttvar;
        let floor = min.max(Duration::from_millis(u64::from(rtt_ms) + 2));
        self.rexmt = Duration::from_millis(u64::from(value)).max(floor).min(max);
    }
}

fn duration_millis(duration: Duration) -> u32 {
    let millis = duration.as_millis();
    if millis > u128::from(u32::max_value() >> 4) {
        u32::max_value() >> 4
    } else {
        millis as u32
    }
}

#[cfg(test)]
mod test {
    use super::*;

    const MIN: Duration = Duration::from_secs(1);
    const MAX: Duration = Duration::from_secs(64);

    #[test]
    fn initial_estimates() {
        let rtt = RttEstimator::new(Duration::from_secs(3));
        assert_eq!(rtt.rexmt(), Duration::from_secs(3));
        assert_eq!(rtt.smoothed(), None);
        assert_eq!(rtt.persist_base(Duration::from_secs(1)), Duration::from_secs(3));
    }

    #[test]
    fn first_sample() {
        let mut rtt = RttEstimator::new(Duration::from_secs(3));
        rtt.sample(Duration::from_millis(400), MIN, MAX);
        assert_eq!(rtt.smoothed(), Some(Duration::from_millis(400)));
        // 400 + 4*200
        assert_eq!(rtt.rexmt(), Duration::from_millis(1200));
        // 400 + 2*200
        assert_eq!(rtt.persist_base(MIN), Duration::from_millis(800).max(MIN));
    }

    #[test]
    fn smoothing() {
        let mut rtt = RttEstimator::new(Duration::from_secs(3));
        rtt.sample(Duration::from_millis(800), MIN, MAX);
        rtt.sample(Duration::from_millis(1600), MIN, MAX);
        // srtt = 800 + 800/8 = 900, rttvar = 400 + (800 - 400)/4 = 500
        assert_eq!(rtt.smoothed(), Some(Duration::from_millis(900)));
        assert_eq!(rtt.rexmt(), Duration::from_millis(900 + 2000));
    }

    #[test]
    fn clamped_timeout() {
        let mut rtt = RttEstimator::new(Duration::from_secs(3));
        rtt.sample(Duration::from_millis(10), MIN, MAX);
        assert_eq!(rtt.rexmt(), MIN);
        rtt.sample(Duration::from_secs(100), MIN, MAX);
        assert_eq!(rtt.rexmt(), MAX);
    }

    #[test]
    fn timing() {
        let mut rtt = RttEstimator::new(Duration::from_secs(3));
        let sent = Instant::from_millis(1000);
        assert!(rtt.start(sent, TcpSeqNumber(100)));
        assert!(!rtt.start(sent, TcpSeqNumber(200)));

        let later = Instant::from_millis(1250);
        assert_eq!(rtt.acknowledged(later, TcpSeqNumber(100), MIN, MAX), None);
        assert_eq!(rtt.acknowledged(later, TcpSeqNumber(101), MIN, MAX),
                   Some(Duration::from_millis(250)));
        assert!(!rtt.is_timing());
    }
}
