use crate::time::Duration;

/// Policy knobs of the output engine.
///
/// The values are shared by all connections of a stack. Per-connection switches, such as
/// disabling Nagle batching or options, are on the connection instead.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Config {
    /// Segment size used when nothing is known about the path.
    ///
    /// Also the MSS assumed for a peer that did not send the option, 536 per RFC 1122.
    pub default_mss: u32,

    /// Use the interface MTU for destinations that are not on-link.
    ///
    /// Without path MTU discovery such destinations get the conservative `default_mss`.
    pub path_mtu_discovery: bool,

    /// Initial window in segments, for restarting after idle.
    ///
    /// Zero selects the RFC 3390 window, `min(4*mss, max(2*mss, 4380))` bytes.
    pub initial_window: u32,

    /// Initial window in segments for on-link destinations.
    pub local_initial_window: u32,

    /// Limit bursts by congestion window monitoring.
    ///
    /// The congestion window is capped at `cwm_burst` segments beyond the data in flight, instead
    /// of restarting from the initial window after idle.
    pub congestion_window_monitoring: bool,

    /// Segments a congestion window monitoring burst may have.
    pub cwm_burst: u32,

    /// Segments a single invocation may send. Zero is treated as one.
    pub max_burst: u32,

    /// Lower bound of the persist timeout.
    pub persist_min: Duration,

    /// Upper bound of the persist timeout.
    pub persist_max: Duration,

    /// Lower bound of the retransmit timeout.
    pub rexmt_min: Duration,

    /// Upper bound of the retransmit timeout.
    pub rexmt_max: Duration,

    /// Retransmit timeout before the first round trip sample.
    pub rexmt_initial: Duration,

    /// Longest time an acknowledgment is held back.
    pub delayed_ack: Duration,

    /// Reduce the congestion window to one segment when the network layer runs out of buffers.
    pub self_quench: bool,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            default_mss: 536,
            path_mtu_discovery: true,
            initial_window: 0,
            local_initial_window: 4,
            congestion_window_monitoring: false,
            cwm_burst: 4,
            max_burst: 4,
            persist_min: Duration::from_secs(5),
            persist_max: Duration::from_secs(60),
            rexmt_min: Duration::from_secs(1),
            rexmt_max: Duration::from_secs(64),
            rexmt_initial: Duration::from_secs(3),
            delayed_ack: Duration::from_millis(200),
            self_quench: true,
        }
    }
}
