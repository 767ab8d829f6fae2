use crate::layer::{Invariant, TransmitError};
use crate::time::{Duration, Instant};
use crate::wire::{IpEndpoints, TcpFlags, TcpSeqNumber, TCP_MAX_WINDOW};

use super::config::Config;
use super::rtt::RttEstimator;
use super::stats::{Counter, Stats};
use super::timer::{self, AckState, SendTimer, TimerService, MAX_SHIFT};

/// The largest shift of the window scale option.
pub const MAX_WINDOW_SHIFT: u8 = 14;

/// The send state of a connection.
///
/// Includes current state machine state, the parameters negotiated with the peer, the send and
/// receive sequence spaces and the timers. The output engine is the only writer of most of it, the
/// receive path of the embedding stack updates the acknowledged edge, the peer window and the
/// receive sequence space.
#[derive(Debug, Hash)]
pub struct Connection {
    /// The current state of the state machine.
    pub current: State,

    /// Addresses and ports of the association.
    pub tuple: FourTuple,

    /// Bytes of IP options present on every packet of the association.
    pub ip_options_len: usize,

    /// The congestion state.
    pub flow_control: FlowControl,

    /// The sending state.
    ///
    /// In RFC793 this is referred to as `SND`.
    pub send: Send,

    /// The receiving state.
    ///
    /// In RFC793 this is referred to as `RCV`.
    pub recv: Receive,

    /// Options requested by us and received from the peer.
    pub options: Negotiated,

    /// The retransmit or persist timer.
    pub timer: SendTimer,

    /// Backoff shift of the running timer.
    ///
    /// Shared by the retransmit and persist timer since only one of them runs at a time.
    pub backoff_shift: u8,

    /// Round trip estimation.
    pub rtt: RttEstimator,

    /// Pending acknowledgment of received data.
    pub ack: AckState,

    /// Disable Nagle batching of small segments.
    pub nodelay: bool,

    /// When the last segment was received from the peer.
    pub last_received: Instant,

    /// The previous invocation deferred sending while idle because more data was announced.
    pub last_idle: bool,

    /// A network error that did not fail the send, reported to the application later.
    pub soft_error: Option<TransmitError>,
}

/// Addresses and ports identifying the association.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FourTuple {
    /// The address family and both addresses.
    pub endpoints: IpEndpoints,

    /// Our port.
    pub local_port: u16,

    /// The port of the peer.
    pub remote_port: u16,
}

/// Congestion control state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct FlowControl {
    /// The window dictated by congestion.
    pub congestion_window: u32,

    /// Decider between slow-start and congestion avoidance.
    ///
    /// Only read and rescaled here, growth is a matter of acknowledgment processing.
    pub ssthresh: u32,
}

/// The send sequence space and what is known about the window of the peer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Send {
    /// The next not yet acknowledged sequence number.
    ///
    /// In RFC793 this is referred to as `SND.UNA`.
    pub unacked: TcpSeqNumber,

    /// The next sequence number to use for transmission.
    ///
    /// In RFC793 this is referred to as `SND.NXT`.
    pub next: TcpSeqNumber,

    /// The highest sequence number sent so far.
    ///
    /// Differs from `next` while retransmitting.
    pub max: TcpSeqNumber,

    /// The send window size indicated by the receiver.
    ///
    /// Must not send packet containing a sequence number beyond `unacked + window`. In RFC793 this
    /// is referred to as `SND.WND`.
    pub window: u32,

    /// The largest window the peer ever offered.
    pub max_window: u32,

    /// The urgent pointer, one past the last urgent byte.
    ///
    /// May trail `unacked` when there is no urgent data.
    pub urgent: TcpSeqNumber,

    /// The initial sequence number.
    ///
    /// In RFC793 this is referred to as `ISS`.
    pub initial_seq: TcpSeqNumber,

    /// The payload size of a full segment, options excluded.
    pub segment_size: u32,

    /// A FIN has been sent.
    pub sent_fin: bool,
}

/// The receive sequence space, as far as acknowledgments and window advertisements need it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Receive {
    /// The next expected sequence number.
    ///
    /// In RFC793 this is referred to as `RCV.NXT`.
    pub next: TcpSeqNumber,

    /// The right edge of the window we advertised.
    ///
    /// Moves forward only, the window must not shrink below a previous commitment.
    pub advertised: TcpSeqNumber,

    /// The acknowledgment number of the last segment sent.
    pub last_ack_sent: TcpSeqNumber,

    /// The initial receive sequence number.
    ///
    /// In RFC793 this is referred to as `IRS`.
    pub initial_seq: TcpSeqNumber,
}

/// Option negotiation state.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Negotiated {
    /// Send no options at all.
    pub no_options: bool,

    /// We offer window scaling.
    pub request_scale: bool,

    /// The peer offered window scaling.
    pub received_scale: bool,

    /// We offer timestamps.
    pub request_timestamps: bool,

    /// The peer sent timestamps.
    pub received_timestamps: bool,

    /// Shift applied to windows the peer advertises.
    pub send_scale: u8,

    /// Shift applied to windows we advertise, once scaling was agreed.
    pub recv_scale: u8,

    /// The shift we offer in our SYN.
    pub requested_recv_scale: u8,

    /// The MSS the peer advertised, or the default.
    pub peer_mss: u32,

    /// The MSS we advertise.
    pub our_mss: u32,

    /// The most recent timestamp value of the peer, echoed back.
    pub ts_recent: u32,
}

/// State enum of the statemachine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum State {
    /// Marker state fo an unintended/uninitialized connection state.
    Closed,

    /// A listening connection.
    ///
    /// Akin to an open server socket. Can either be turned into SynSent or SynReceived depending
    /// on whether we receive a SYN or decide to open a connection.
    Listen,

    /// An open connection request.
    SynSent,

    /// Connection request we intend to answer, waiting on ack.
    SynReceived,

    /// An open connection.
    Established,

    /// Closed our side of the connection.
    FinWait1,

    /// Closing connection nicely, initiated by us and acknowledged.
    FinWait2,

    /// Closed both sides but we don't know the other knows.
    Closing,

    /// Both sides recognized connection as closed.
    TimeWait,

    /// Other side closed its connection.
    CloseWait,

    /// Connection closed after other side closed its already.
    LastAck,
}

impl State {
    /// The flags every segment sent in this state carries.
    pub fn out_flags(self) -> TcpFlags {
        let mut flags = TcpFlags::default();
        match self {
            State::Closed => {
                flags.set_rst(true);
                flags.set_ack(true);
            },
            State::Listen => (),
            State::SynSent => flags.set_syn(true),
            State::SynReceived => {
                flags.set_syn(true);
                flags.set_ack(true);
            },
            State::Established | State::CloseWait | State::FinWait2 | State::TimeWait => {
                flags.set_ack(true);
            },
            State::FinWait1 | State::Closing | State::LastAck => {
                flags.set_fin(true);
                flags.set_ack(true);
            },
        }
        flags
    }

    /// Query if the SYN of the peer has been received.
    pub fn have_received_syn(self) -> bool {
        match self {
            State::Closed | State::Listen | State::SynSent => false,
            _ => true,
        }
    }

    /// Query if both SYNs have been acknowledged.
    pub fn is_synchronized(self) -> bool {
        match self {
            State::Closed | State::Listen | State::SynSent | State::SynReceived => false,
            _ => true,
        }
    }
}

impl Default for State {
    fn default() -> Self {
        State::Closed
    }
}

impl FlowControl {
    /// The windows before anything is known, effectively unlimited.
    pub fn unlimited() -> Self {
        let max = TCP_MAX_WINDOW << MAX_WINDOW_SHIFT;
        FlowControl {
            congestion_window: max,
            ssthresh: max,
        }
    }
}

impl Negotiated {
    /// The state before any SYN was exchanged.
    pub fn new(config: &Config) -> Self {
        Negotiated {
            no_options: false,
            request_scale: false,
            received_scale: false,
            request_timestamps: false,
            received_timestamps: false,
            send_scale: 0,
            recv_scale: 0,
            requested_recv_scale: 0,
            peer_mss: config.default_mss,
            our_mss: config.default_mss,
            ts_recent: 0,
        }
    }

    /// Query if timestamps are sent on every segment.
    pub fn timestamps(&self) -> bool {
        !self.no_options && self.request_timestamps && self.received_timestamps
    }

    /// The shift applied to windows we advertise, never beyond the largest legal one.
    pub fn recv_shift(&self) -> u8 {
        self.recv_scale.min(MAX_WINDOW_SHIFT)
    }
}

impl Connection {
    /// A closed connection on the given association.
    pub fn new(tuple: FourTuple, config: &Config) -> Self {
        Connection {
            current: State::Closed,
            tuple,
            ip_options_len: 0,
            flow_control: FlowControl::unlimited(),
            send: Send {
                unacked: TcpSeqNumber::default(),
                next: TcpSeqNumber::default(),
                max: TcpSeqNumber::default(),
                window: 0,
                max_window: 0,
                urgent: TcpSeqNumber::default(),
                initial_seq: TcpSeqNumber::default(),
                segment_size: config.default_mss,
                sent_fin: false,
            },
            recv: Receive {
                next: TcpSeqNumber::default(),
                advertised: TcpSeqNumber::default(),
                last_ack_sent: TcpSeqNumber::default(),
                initial_seq: TcpSeqNumber::default(),
            },
            options: Negotiated::new(config),
            timer: SendTimer::Idle,
            backoff_shift: 0,
            rtt: RttEstimator::new(config.rexmt_initial),
            ack: AckState::None,
            nodelay: false,
            last_received: Instant::from_millis(0),
            last_idle: false,
            soft_error: None,
        }
    }

    /// Start an active open, the next output sends the SYN.
    pub fn open(&mut self, iss: TcpSeqNumber) {
        self.start_send(iss);
        self.current = State::SynSent;
    }

    /// Answer a received SYN, the next output sends the SYN-ACK.
    pub fn accept(&mut self, iss: TcpSeqNumber, irs: TcpSeqNumber) {
        self.start_send(iss);
        self.recv = Receive {
            next: irs + 1,
            advertised: irs + 1,
            last_ack_sent: irs + 1,
            initial_seq: irs,
        };
        self.current = State::SynReceived;
    }

    fn start_send(&mut self, iss: TcpSeqNumber) {
        self.send.initial_seq = iss;
        self.send.unacked = iss;
        self.send.next = iss;
        self.send.max = iss;
        self.send.urgent = iss;
        self.send.sent_fin = false;
    }

    /// Check the ordering `unacked <= next <= max` of the send sequence space.
    pub fn check_sequence(&self) -> Result<(), Invariant> {
        let send = &self.send;
        if send.unacked <= send.next && send.next <= send.max {
            Ok(())
        } else {
            Err(Invariant::SequenceOrder)
        }
    }

    /// Cancel every armed timer.
    ///
    /// Must be called on teardown so that no expiry refers to a gone connection.
    pub fn close_timers(&mut self, timers: &mut dyn TimerService) {
        self.timer.disarm(timers);
        self.ack.clear(timers);
    }

    /// Tear down the connection after an inconsistency was found.
    pub fn abort(&mut self, timers: &mut dyn TimerService, reason: Invariant) {
        net_debug!("tcp: aborting connection in {:?}: {}", self.current, reason);
        self.close_timers(timers);
        self.current = State::Closed;
    }

    /// Acknowledge on the next output.
    pub fn ack_now(&mut self, timers: &mut dyn TimerService) {
        self.ack.now(timers)
    }

    /// Acknowledge received data within the delayed-ACK timeout.
    pub fn delay_ack(&mut self, timers: &mut dyn TimerService, config: &Config, stats: &Stats) {
        if self.ack.delay(timers, config.delayed_ack) {
            stats.inc(Counter::DelayedAcks);
        }
    }

    /// Feed an acknowledgment to the round trip estimator.
    ///
    /// A sample resets the backoff and clears a soft error since the peer evidently is reachable.
    pub fn measure_rtt(&mut self, now: Instant, ack: TcpSeqNumber, config: &Config)
        -> Option<Duration>
    {
        let sample = self.rtt.acknowledged(now, ack, config.rexmt_min, config.rexmt_max)?;
        self.backoff_shift = 0;
        self.soft_error = None;
        Some(sample)
    }

    /// Arm the persist timer with the backoff of the current shift, then increase the shift.
    ///
    /// The retransmit timer must not run.
    pub fn set_persist(&mut self, timers: &mut dyn TimerService, config: &Config, stats: &Stats)
        -> Result<(), Invariant>
    {
        if self.timer.is_retransmit() {
            return Err(Invariant::RetransmitArmed);
        }
        let base = self.rtt.persist_base(config.rexmt_min);
        let after = timer::persist_duration(base, self.backoff_shift, config.persist_min, config.persist_max);
        self.timer.arm_persist(timers, after)?;
        net_trace!("tcp: persist in {}ms, shift {}", after.as_millis(), self.backoff_shift);
        stats.inc(Counter::PersistArms);
        if self.backoff_shift < MAX_SHIFT {
            self.backoff_shift += 1;
        }
        Ok(())
    }

    /// Number of sequence numbers sent but not acknowledged.
    pub fn in_flight(&self) -> usize {
        self.send.next.offset_from(self.send.unacked).max(0) as usize
    }
}
