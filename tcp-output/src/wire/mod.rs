/*! Low-level segment construction.

The `wire` module deals with the segment *representation*. The output engine only ever emits
segments, it never receives them, but parsing is provided as well so that a collaborator (or a
test) can inspect what was handed to the network layer.

 * The [`Repr`] of a TCP header is a compact, high-level representation of all fixed header
   fields. It is emitted into a sequence of octets together with an already encoded option block.
 * A [`TcpOption`] is a single option as it appears in the option block. The output engine builds
   an option block from them before the header is emitted.
 * A [`Segment`] is the parsed view of a complete segment: header representation, option bytes and
   the payload.

The checksum field is always emitted as zero. Computing it requires the pseudo header of the
network layer and is left to the layer that owns the addresses.

In the `Repr` family of data structures, the `parse()` method never panics and the `emit()` method
never panics either. Both report an insufficiently sized buffer as [`Error::Truncated`].

[`Repr`]: struct.TcpRepr.html
[`TcpOption`]: enum.TcpOption.html
[`Segment`]: struct.TcpSegment.html
[`Error::Truncated`]: enum.Error.html#variant.Truncated
*/
use core::fmt;

mod field {
    pub type Field = ::core::ops::Range<usize>;
}

mod ip;
mod tcp;

pub use self::ip::{
    Address as IpAddress,
    Cidr as IpCidr,
    Endpoints as IpEndpoints,
    Ipv4Address,
    Ipv6Address,
};

pub use self::tcp::{
    Flags as TcpFlags,
    Repr as TcpRepr,
    Segment as TcpSegment,
    SeqNumber as TcpSeqNumber,
    TcpOption,
    HEADER_LEN as TCP_HEADER_LEN,
    MAX_OPTIONS_LEN as TCP_MAX_OPTIONS_LEN,
    MAX_WINDOW as TCP_MAX_WINDOW,
};

/// The error type for encoding and decoding segments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Error {
    /// A buffer was shorter than the structure it should contain.
    ///
    /// When parsing, the segment may be shorter than the minimum header or shorter than its own
    /// data offset field claims. When emitting, the target buffer can not hold the header.
    Truncated,

    /// A segment or option was recognized but was self-contradictory.
    ///
    /// Examples: a data offset pointing into the fixed header, an MSS option whose length is not
    /// four.
    Malformed,

    /// A value does not fit into its field.
    ///
    /// Examples: an option block longer than 40 bytes or not a multiple of four.
    Exceeded,
}

/// The result type for segment encoding.
pub type Result<T> = core::result::Result<T, Error>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Truncated => write!(f, "truncated segment"),
            Error::Malformed => write!(f, "malformed segment"),
            Error::Exceeded  => write!(f, "field value exceeded"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}
