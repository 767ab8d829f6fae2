//! The TCP output engine.
//!
//! Decides, for one connection, whether to emit segments right now and builds them. The engine is
//! invoked by the embedding stack after anything that may have created an obligation to send: an
//! application write, an incoming acknowledgment or window update, a timer expiry. It may emit
//! several segments in one invocation, up to a configured burst, and then returns a [`Report`] of
//! what happened.
//!
//! All collaborators are reached through traits. The egress byte stream is a [`SendBuf`], the
//! receive buffer tells the engine its free space through [`RecvSpace`], the network layer accepts
//! finished segments through [`Transmit`] and timers are scheduled with a [`TimerService`]. They
//! are bundled per invocation in an [`Environment`].
//!
//! ## Segment sizing
//!
//! The payload of a full segment is recomputed on every invocation from the route towards the peer,
//! the MSS the peer advertised and the options that go on every segment. When the path gets
//! smaller the congestion window and slow start threshold are scaled down so that they still
//! count the same number of segments. They are never scaled up when the path grows.
//!
//! ## Deciding to send
//!
//! A segment carrying data is sent when it is full, when it drains the buffer of an idle
//! connection (or one with Nagle batching disabled), when it is a window probe, when it fills half
//! the largest window the peer ever offered or when it retransmits. Small segments are otherwise
//! held back until more data arrives or an acknowledgment opens the window.
//!
//! Without data, a segment is still owed for a due acknowledgment, SYN, FIN or RST, an urgent
//! pointer ahead of the acknowledged edge and a sufficiently large window update. The update is
//! sent when the window could be moved by two receive segments or by half the receive buffer.
//!
//! The receiver side silly window avoidance never advertises a window that is smaller than both a
//! quarter of the buffer and one receive segment. Zero is advertised instead. An advertised window
//! is also never retracted, the right edge we promised stays at least where it was.
//!
//! ## Timers
//!
//! Each connection owns at most one of the retransmit and persist timer, see [`SendTimer`].
//! Sending new data arms the retransmit timer with the current smoothed timeout unless one runs
//! already. A closed peer window with data waiting arms the persist timer instead, whose timeout is
//! backed off exponentially on each expiry. The expiry of the persist timer is handled by
//! [`Connection::probe`], which forces a one byte window probe.
//!
//! [`Report`]: struct.Report.html
//! [`SendBuf`]: trait.SendBuf.html
//! [`RecvSpace`]: trait.RecvSpace.html
//! [`Transmit`]: trait.Transmit.html
//! [`TimerService`]: trait.TimerService.html
//! [`Environment`]: struct.Environment.html
//! [`SendTimer`]: enum.SendTimer.html
//! [`Connection::probe`]: struct.Connection.html#method.probe
use crate::layer::TransmitError;
use crate::wire::TcpRepr;

mod assemble;
mod config;
mod congestion;
mod connection;
pub mod io;
mod options;
mod output;
mod rtt;
mod segsize;
mod stats;
mod timer;


pub use config::Config;

pub use connection::{
    Connection,
    FlowControl,
    FourTuple,
    Negotiated,
    Receive,
    Send,
    State,
    MAX_WINDOW_SHIFT};

pub use congestion::initial_window;

pub use options::{
    build_options,
    OptionBlock,
    MAX_OPTIONS_LEN};

pub use output::{
    Environment,
    Report};

pub use rtt::RttEstimator;

pub use segsize::{
    advertised_mss,
    compute_segment_sizes,
    SegmentSizes};

pub use stats::{
    Counter,
    Stats};

pub use timer::{
    persist_duration,
    AckState,
    Armed,
    SendTimer,
    TimerId,
    TimerKind,
    TimerService,
    BACKOFF,
    MAX_SHIFT};

/// The egress byte stream of a connection.
///
/// Offset zero is the first unacknowledged byte. The engine only reads from the buffer, the
/// application appends to it and acknowledgment processing drops from its front.
pub trait SendBuf {
    /// The number of buffered bytes, sent or not.
    fn len(&self) -> usize;

    /// Copy bytes starting at `offset` into the whole of `buf`.
    ///
    /// The engine never asks for a range beyond `len`.
    fn copy_range(&self, offset: usize, buf: &mut [u8]);

    /// Query if the application announced that more data follows immediately.
    ///
    /// Small segments are then held back even if Nagle batching is disabled.
    fn more_to_come(&self) -> bool {
        false
    }
}

/// The receive buffer, as far as window advertisements need it.
pub trait RecvSpace {
    /// The free space of the receive buffer in bytes.
    fn space(&self) -> usize;

    /// The size of the receive buffer in bytes.
    fn high_water(&self) -> usize;
}

/// The network layer below TCP.
pub trait Transmit {
    /// Hand a finished segment to the network layer.
    ///
    /// The `segment` contains the encoded header, options and payload. The header representation
    /// is passed along for inspection. Acceptance means the segment was queued for transmission,
    /// not that it was delivered.
    fn send_datagram(&mut self, header: &TcpRepr, segment: &[u8]) -> Result<(), TransmitError>;
}
