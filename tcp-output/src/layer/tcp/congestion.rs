//! Congestion window adjustments of the output path.
//!
//! Growth of the window is a matter of acknowledgment processing. Sending only ever shrinks it:
//! after idle periods, to limit bursts, and when the network layer runs out of buffers.
use crate::time::Instant;

use super::config::Config;
use super::connection::{Connection, FlowControl};
use super::segsize::SegmentSizes;

/// The RFC 3390 initial window in bytes, `min(4*mss, max(2*mss, 4380))`.
const RFC3390_CAP: u32 = 4380;

/// The initial window for a number of segments.
///
/// Zero segments selects the window of RFC 3390.
pub fn initial_window(segments: u32, segment_size: u32) -> u32 {
    if segments == 0 {
        segment_size.saturating_mul(4)
            .min(segment_size.saturating_mul(2).max(RFC3390_CAP))
    } else {
        segments.saturating_mul(segment_size)
    }
}

impl FlowControl {
    /// Fall back to the restart window.
    pub fn restart(&mut self, window: u32) {
        self.congestion_window = self.congestion_window.min(window);
    }

    /// Allow at most `burst` bytes beyond the data in flight.
    pub fn monitor(&mut self, burst: u32, in_flight: usize) {
        let in_flight = if in_flight > u32::max_value() as usize {
            u32::max_value()
        } else {
            in_flight as u32
        };
        self.congestion_window = self.congestion_window.min(burst.saturating_add(in_flight));
    }

    /// Shrink to a single segment.
    pub fn quench(&mut self, segment_size: u32) {
        self.congestion_window = segment_size;
    }
}

impl Connection {
    /// Apply the congestion window limits that depend on the connection being idle.
    ///
    /// With congestion window monitoring the window is limited to a burst beyond the data in flight
    /// on every invocation. Otherwise a connection that was idle for at least a retransmit timeout
    /// restarts from the initial window.
    pub(crate) fn limit_burst(&mut self, idle: bool, now: Instant, sizes: &SegmentSizes, config: &Config) {
        let segment = self.send.segment_size;
        if config.congestion_window_monitoring {
            let burst = config.cwm_burst.saturating_mul(segment);
            let in_flight = self.in_flight();
            self.flow_control.monitor(burst, in_flight);
        } else if idle && now.since(self.last_received) >= self.rtt.rexmt() {
            let segments = if sizes.on_link {
                config.local_initial_window
            } else {
                config.initial_window
            };
            let window = initial_window(segments, segment);
            if window < self.flow_control.congestion_window {
                net_trace!("tcp: idle restart, cwnd {} -> {}", self.flow_control.congestion_window, window);
            }
            self.flow_control.restart(window);
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::layer::tcp::connection::FourTuple;
    use crate::time::Duration;
    use crate::wire::{IpEndpoints, Ipv4Address, TcpSeqNumber};

    #[test]
    fn rfc3390() {
        assert_eq!(initial_window(0, 536), 2144);
        assert_eq!(initial_window(0, 1460), 4380);
        assert_eq!(initial_window(0, 4000), 8000);
        assert_eq!(initial_window(4, 1460), 5840);
    }

    fn connection(config: &Config) -> Connection {
        let tuple = FourTuple {
            endpoints: IpEndpoints::Ipv4 {
                local: Ipv4Address::new(10, 0, 0, 1),
                remote: Ipv4Address::new(192, 0, 2, 1),
            },
            local_port: 1,
            remote_port: 2,
        };
        let mut conn = Connection::new(tuple, config);
        conn.send.segment_size = 1460;
        conn.flow_control.congestion_window = 64000;
        conn
    }

    const REMOTE: SegmentSizes = SegmentSizes { tx: 1460, rx: 1460, on_link: false };
    const LOCAL: SegmentSizes = SegmentSizes { tx: 1460, rx: 1460, on_link: true };

    #[test]
    fn idle_restart() {
        let config = Config::default();
        let mut conn = connection(&config);
        let now = Instant::from_secs(100);

        // Received recently, no restart.
        conn.last_received = now - Duration::from_millis(10);
        conn.limit_burst(true, now, &REMOTE, &config);
        assert_eq!(conn.flow_control.congestion_window, 64000);

        conn.last_received = now - Duration::from_secs(10);
        conn.limit_burst(false, now, &REMOTE, &config);
        assert_eq!(conn.flow_control.congestion_window, 64000);

        conn.limit_burst(true, now, &LOCAL, &config);
        assert_eq!(conn.flow_control.congestion_window, 5840);
        conn.limit_burst(true, now, &REMOTE, &config);
        assert_eq!(conn.flow_control.congestion_window, 4380);
    }

    #[test]
    fn monitoring() {
        let config = Config { congestion_window_monitoring: true, ..Config::default() };
        let mut conn = connection(&config);
        conn.open(TcpSeqNumber(0));
        conn.send.next = TcpSeqNumber(1000);
        conn.send.max = TcpSeqNumber(1000);
        conn.limit_burst(false, Instant::from_secs(1), &REMOTE, &config);
        assert_eq!(conn.flow_control.congestion_window, 4 * 1460 + 1000);
    }

    #[test]
    fn quench() {
        let mut flow = FlowControl::unlimited();
        flow.quench(536);
        assert_eq!(flow.congestion_window, 536);
        flow.restart(4380);
        assert_eq!(flow.congestion_window, 536);
    }
}
