//! The process logic of protocol layers.
//!
//! ## Layering
//!
//! The encoding of segments is contained in `wire` and the processing part in this module. The
//! only processing done here is the sending side of TCP, in [`tcp`]. The network layer below is
//! not part of this crate, it appears as the [`Transmit`] trait that accepts finished segments and
//! the [`Routes`] trait that answers questions about the path towards a destination.
//!
//! ## Errors
//!
//! Two kinds of failures can occur. A collaborator can refuse a segment, which is an ordinary
//! operational condition and described by [`TransmitError`]. Or the connection state is
//! inconsistent, which is an [`Invariant`] violation and aborts the connection.
//!
//! [`tcp`]: tcp/index.html
//! [`Transmit`]: tcp/trait.Transmit.html
//! [`Routes`]: ip/trait.Routes.html
//! [`TransmitError`]: enum.TransmitError.html
//! [`Invariant`]: enum.Invariant.html
use core::fmt;

pub mod ip;
pub mod tcp;

/// The result type of the output engine.
pub type Result<T> = core::result::Result<T, Error>;

/// Errors reported by the network layer when handing it a segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransmitError {
    /// No buffer space for the segment.
    ///
    /// Nothing was sent. The condition is expected to clear by itself, the segment is sent again
    /// on the next invocation.
    OutOfResources,

    /// The destination is unreachable or the interface is down.
    NoRouteOrDown,

    /// Any other failure, with an opaque code from the network layer.
    Other(i32),
}

/// A violated rule of the connection state.
///
/// Each of these is a logic error in the caller or the engine. They are never the result of
/// anything the peer or the network does.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Invariant {
    /// A send timer was to be armed while the retransmit timer runs.
    RetransmitArmed,

    /// A send timer was to be armed while the persist timer runs.
    PersistArmed,

    /// The segment size came out as zero.
    SegmentSize,

    /// The send sequence numbers are not ordered `unacked <= next <= max`.
    SequenceOrder,

    /// The options of a segment do not fit the option block.
    OptionOverflow,

    /// The header could not be encoded.
    Encoding(crate::wire::Error),
}

/// Errors of the output engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Error {
    /// The network layer failed in a way that is not handled internally.
    Transmit(TransmitError),

    /// The connection state was inconsistent. The connection has been aborted.
    Invariant(Invariant),
}

impl From<TransmitError> for Error {
    fn from(err: TransmitError) -> Self {
        Error::Transmit(err)
    }
}

impl From<Invariant> for Error {
    fn from(err: Invariant) -> Self {
        Error::Invariant(err)
    }
}

/// Can convert from a wire error.
///
/// The engine only ever encodes segments it built itself, so failure is an internal
/// inconsistency.
impl From<crate::wire::Error> for Error {
    fn from(err: crate::wire::Error) -> Self {
        Error::Invariant(Invariant::Encoding(err))
    }
}

impl fmt::Display for TransmitError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransmitError::OutOfResources => write!(f, "out of buffer space"),
            TransmitError::NoRouteOrDown => write!(f, "no route to host or interface down"),
            TransmitError::Other(code) => write!(f, "network layer error {}", code),
        }
    }
}

impl fmt::Display for Invariant {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Invariant::RetransmitArmed => write!(f, "retransmit timer already armed"),
            Invariant::PersistArmed => write!(f, "persist timer already armed"),
            Invariant::SegmentSize => write!(f, "zero segment size"),
            Invariant::SequenceOrder => write!(f, "send sequence numbers out of order"),
            Invariant::OptionOverflow => write!(f, "options exceed the option block"),
            Invariant::Encoding(err) => write!(f, "header encoding failed: {}", err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Transmit(err) => write!(f, "transmit failed: {}", err),
            Error::Invariant(err) => write!(f, "connection aborted: {}", err),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for TransmitError {}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
