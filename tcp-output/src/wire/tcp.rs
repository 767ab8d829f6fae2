use core::{i32, ops, cmp, fmt};
use byteorder::{ByteOrder, NetworkEndian};

use super::{Error, Result};

/// The length of a TCP header without options.
pub const HEADER_LEN: usize = field::URGENT.end;

/// The maximum length of the option block.
///
/// The data offset field counts 32-bit words in four bits, leaving 40 bytes beyond the fixed
/// header.
pub const MAX_OPTIONS_LEN: usize = 40;

/// The largest window representable in the unscaled window field.
pub const MAX_WINDOW: u32 = 65535;

/// A TCP sequence number.
///
/// A sequence number is a monotonically advancing integer modulo 2<sup>32</sup>.
/// Sequence numbers do not have a discontiguity when compared pairwise across a signed overflow.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub struct SeqNumber(pub i32);

impl SeqNumber {
    /// The signed distance from `other` to `self`.
    ///
    /// Unlike the subtraction operator this never panics, a negative result means that `self` is
    /// before `other` in sequence space.
    pub fn offset_from(self, other: SeqNumber) -> i32 {
        self.0.wrapping_sub(other.0)
    }

    /// The later of two sequence numbers.
    pub fn max(self, other: SeqNumber) -> SeqNumber {
        if self < other { other } else { self }
    }

    /// The earlier of two sequence numbers.
    pub fn min(self, other: SeqNumber) -> SeqNumber {
        if self > other { other } else { self }
    }
}

impl fmt::Display for SeqNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0 as u32)
    }
}

impl ops::Add<usize> for SeqNumber {
    type Output = SeqNumber;

    fn add(self, rhs: usize) -> SeqNumber {
        if rhs > i32::MAX as usize {
            panic!("attempt to add to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_add(rhs as i32))
    }
}

impl ops::Sub<usize> for SeqNumber {
    type Output = SeqNumber;

    fn sub(self, rhs: usize) -> SeqNumber {
        if rhs > i32::MAX as usize {
            panic!("attempt to subtract to sequence number with unsigned overflow")
        }
        SeqNumber(self.0.wrapping_sub(rhs as i32))
    }
}

impl ops::AddAssign<usize> for SeqNumber {
    fn add_assign(&mut self, rhs: usize) {
        *self = *self + rhs;
    }
}

impl ops::SubAssign<usize> for SeqNumber {
    fn sub_assign(&mut self, rhs: usize) {
        *self = *self - rhs;
    }
}

impl ops::Sub for SeqNumber {
    type Output = usize;

    fn sub(self, rhs: SeqNumber) -> usize {
        let result = self.0.wrapping_sub(rhs.0);
        if result < 0 {
            panic!("attempt to subtract sequence numbers with underflow")
        }
        result as usize
    }
}

impl cmp::PartialOrd for SeqNumber {
    fn partial_cmp(&self, other: &SeqNumber) -> Option<cmp::Ordering> {
        self.0.wrapping_sub(other.0).partial_cmp(&0)
    }
}

/// A set of tcp flags.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Flags(pub u16);

mod field {
    #![allow(non_snake_case)]

    use crate::wire::field::Field;

    pub const SRC_PORT: Field = 0..2;
    pub const DST_PORT: Field = 2..4;
    pub const SEQ_NUM:  Field = 4..8;
    pub const ACK_NUM:  Field = 8..12;
    pub const FLAGS:    Field = 12..14;
    pub const WIN_SIZE: Field = 14..16;
    pub const CHECKSUM: Field = 16..18;
    pub const URGENT:   Field = 18..20;

    pub fn OPTIONS(header_len: usize) -> Field {
        URGENT.end..header_len
    }

    pub const FLG_FIN: u16 = 0x001;
    pub const FLG_SYN: u16 = 0x002;
    pub const FLG_RST: u16 = 0x004;
    pub const FLG_PSH: u16 = 0x008;
    pub const FLG_ACK: u16 = 0x010;
    pub const FLG_URG: u16 = 0x020;
    pub const FLG_MASK: u16 = 0x1ff;

    pub const OPT_END: u8 = 0x00;
    pub const OPT_NOP: u8 = 0x01;
    pub const OPT_MSS: u8 = 0x02;
    pub const OPT_WS:  u8 = 0x03;
    pub const OPT_TS:  u8 = 0x08;
}

impl Flags {
    /// Return the FIN flag.
    #[inline]
    pub fn fin(&self) -> bool {
        self.0 & field::FLG_FIN != 0
    }

    /// Return the SYN flag.
    #[inline]
    pub fn syn(&self) -> bool {
        self.0 & field::FLG_SYN != 0
    }

    /// Return the RST flag.
    #[inline]
    pub fn rst(&self) -> bool {
        self.0 & field::FLG_RST != 0
    }

    /// Return the PSH flag.
    #[inline]
    pub fn psh(&self) -> bool {
        self.0 & field::FLG_PSH != 0
    }

    /// Return the ACK flag.
    #[inline]
    pub fn ack(&self) -> bool {
        self.0 & field::FLG_ACK != 0
    }

    /// Return the URG flag.
    #[inline]
    pub fn urg(&self) -> bool {
        self.0 & field::FLG_URG != 0
    }

    /// Set the FIN flag.
    #[inline]
    pub fn set_fin(&mut self, value: bool) {
        self.set(field::FLG_FIN, value)
    }

    /// Set the SYN flag.
    #[inline]
    pub fn set_syn(&mut self, value: bool) {
        self.set(field::FLG_SYN, value)
    }

    /// Set the RST flag.
    #[inline]
    pub fn set_rst(&mut self, value: bool) {
        self.set(field::FLG_RST, value)
    }

    /// Set the PSH flag.
    #[inline]
    pub fn set_psh(&mut self, value: bool) {
        self.set(field::FLG_PSH, value)
    }

    /// Set the ACK flag.
    #[inline]
    pub fn set_ack(&mut self, value: bool) {
        self.set(field::FLG_ACK, value)
    }

    /// Set the URG flag.
    #[inline]
    pub fn set_urg(&mut self, value: bool) {
        self.set(field::FLG_URG, value)
    }

    fn set(&mut self, flag: u16, value: bool) {
        let without = self.0 & !flag;
        self.0 = without | if value { flag } else { 0 };
    }

    /// Return the length of a control flag, in terms of sequence space.
    pub fn sequence_len(self) -> usize {
        (if self.syn() { 1 } else { 0 })
        + (if self.fin() { 1 }  else { 0 })
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let names = [
            (self.syn(), "syn"),
            (self.fin(), "fin"),
            (self.rst(), "rst"),
            (self.psh(), "psh"),
            (self.ack(), "ack"),
            (self.urg(), "urg"),
        ];
        let mut first = true;
        for &(_, name) in names.iter().filter(|(set, _)| *set) {
            if !first {
                write!(f, "|")?;
            }
            write!(f, "{}", name)?;
            first = false;
        }
        if first {
            write!(f, "-")?;
        }
        Ok(())
    }
}

/// A representation of a single TCP option.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum TcpOption<'a> {
    /// Marks the end of the option list, the rest is padding.
    EndOfList,
    /// Padding between options.
    NoOperation,
    /// The largest segment the sender of the option is willing to receive.
    MaxSegmentSize(u16),
    /// The shift applied to the window field by the sender of the option.
    WindowScale(u8),
    /// Timestamp value and echo reply, RFC 7323.
    Timestamp {
        /// The clock of the sender.
        value: u32,
        /// The most recent timestamp value received from the peer.
        echo: u32,
    },
    /// Any other option, not interpreted.
    Unknown {
        /// The option kind.
        kind: u8,
        /// The option data after kind and length.
        data: &'a [u8],
    },
}

impl<'a> TcpOption<'a> {
    /// Parse one option from the start of an option block.
    ///
    /// Returns the remaining block and the option.
    pub fn parse(buffer: &'a [u8]) -> Result<(&'a [u8], TcpOption<'a>)> {
        let (length, option);
        match *buffer.get(0).ok_or(Error::Truncated)? {
            field::OPT_END => {
                length = 1;
                option = TcpOption::EndOfList;
            }
            field::OPT_NOP => {
                length = 1;
                option = TcpOption::NoOperation;
            }
            kind => {
                length = *buffer.get(1).ok_or(Error::Truncated)? as usize;
                if length < 2 {
                    return Err(Error::Malformed)
                }
                let data = buffer.get(2..length).ok_or(Error::Truncated)?;
                option = match (kind, length) {
                    (field::OPT_MSS, 4) =>
                        TcpOption::MaxSegmentSize(NetworkEndian::read_u16(data)),
                    (field::OPT_MSS, _) =>
                        return Err(Error::Malformed),
                    (field::OPT_WS, 3) =>
                        TcpOption::WindowScale(data[0]),
                    (field::OPT_WS, _) =>
                        return Err(Error::Malformed),
                    (field::OPT_TS, 10) => TcpOption::Timestamp {
                        value: NetworkEndian::read_u32(&data[0..4]),
                        echo: NetworkEndian::read_u32(&data[4..8]),
                    },
                    (field::OPT_TS, _) =>
                        return Err(Error::Malformed),
                    (_, _) =>
                        TcpOption::Unknown { kind, data },
                };
            }
        }
        Ok((&buffer[length..], option))
    }

    /// The number of bytes this option occupies in the option block.
    pub fn buffer_len(&self) -> usize {
        match self {
            TcpOption::EndOfList => 1,
            TcpOption::NoOperation => 1,
            TcpOption::MaxSegmentSize(_) => 4,
            TcpOption::WindowScale(_) => 3,
            TcpOption::Timestamp { .. } => 10,
            TcpOption::Unknown { data, .. } => 2 + data.len(),
        }
    }

    /// Emit the option at the start of `buffer`.
    ///
    /// Returns the rest of the buffer following the option. `EndOfList` also fills all remaining
    /// bytes as padding.
    pub fn emit<'b>(&self, buffer: &'b mut [u8]) -> Result<&'b mut [u8]> {
        let length = self.buffer_len();
        if buffer.len() < length {
            return Err(Error::Exceeded);
        }

        match *self {
            TcpOption::EndOfList => {
                let end = buffer.len();
                for p in buffer.iter_mut() {
                    *p = field::OPT_END;
                }
                return Ok(&mut buffer[end..]);
            }
            TcpOption::NoOperation => {
                buffer[0] = field::OPT_NOP;
            }
            TcpOption::MaxSegmentSize(value) => {
                buffer[0] = field::OPT_MSS;
                buffer[1] = length as u8;
                NetworkEndian::write_u16(&mut buffer[2..4], value);
            }
            TcpOption::WindowScale(value) => {
                buffer[0] = field::OPT_WS;
                buffer[1] = length as u8;
                buffer[2] = value;
            }
            TcpOption::Timestamp { value, echo } => {
                buffer[0] = field::OPT_TS;
                buffer[1] = length as u8;
                NetworkEndian::write_u32(&mut buffer[2..6], value);
                NetworkEndian::write_u32(&mut buffer[6..10], echo);
            }
            TcpOption::Unknown { kind, data: provided } => {
                buffer[0] = kind;
                buffer[1] = length as u8;
                buffer[2..length].copy_from_slice(provided);
            }
        }
        Ok(&mut buffer[length..])
    }
}

/// A high-level representation of a Transmission Control Protocol header.
///
/// Options are not part of the representation. They are encoded separately into a block whose
/// length is recorded in `options_len`, and the header is emitted around that block.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Repr {
    /// The local port.
    pub src_port:     u16,
    /// The remote port.
    pub dst_port:     u16,
    /// The control flags, the ACK flag is derived from `ack_number`.
    pub flags:        Flags,
    /// Sequence number of the first octet of the segment.
    pub seq_number:   SeqNumber,
    /// The acknowledged sequence number, if any.
    pub ack_number:   Option<SeqNumber>,
    /// The unscaled window field.
    pub window_len:   u16,
    /// The urgent offset, only meaningful with URG.
    pub urgent_at:    u16,
    /// Length of the option block in bytes, a multiple of four.
    pub options_len:  u8,
    /// Length of the segment payload.
    pub payload_len:  u16,
}

impl Repr {
    /// Return the length of the header that will be emitted, options included.
    pub fn header_len(&self) -> usize {
        HEADER_LEN + usize::from(self.options_len)
    }

    /// Return the length of the whole segment.
    pub fn buffer_len(&self) -> usize {
        self.header_len() + usize::from(self.payload_len)
    }

    /// Return the length of the segment, in terms of sequence space.
    pub fn sequence_len(&self) -> usize {
        usize::from(self.payload_len) + self.flags.sequence_len()
    }

    /// Emit the header and the option block into the start of `buffer`.
    ///
    /// The payload area following the header is not touched. The checksum field is zeroed.
    pub fn emit(&self, buffer: &mut [u8], options: &[u8]) -> Result<()> {
        if options.len() != usize::from(self.options_len) {
            return Err(Error::Malformed);
        }
        if options.len() > MAX_OPTIONS_LEN || options.len() % 4 != 0 {
            return Err(Error::Exceeded);
        }
        let header_len = self.header_len();
        if buffer.len() < header_len {
            return Err(Error::Truncated);
        }

        NetworkEndian::write_u16(&mut buffer[field::SRC_PORT], self.src_port);
        NetworkEndian::write_u16(&mut buffer[field::DST_PORT], self.dst_port);
        NetworkEndian::write_i32(&mut buffer[field::SEQ_NUM], self.seq_number.0);
        let ack = self.ack_number.unwrap_or(SeqNumber(0));
        NetworkEndian::write_i32(&mut buffer[field::ACK_NUM], ack.0);

        let mut flags = self.flags;
        flags.set_ack(self.ack_number.is_some());
        let offset = ((header_len / 4) as u16) << 12;
        NetworkEndian::write_u16(&mut buffer[field::FLAGS], offset | (flags.0 & field::FLG_MASK));

        NetworkEndian::write_u16(&mut buffer[field::WIN_SIZE], self.window_len);
        NetworkEndian::write_u16(&mut buffer[field::CHECKSUM], 0);
        NetworkEndian::write_u16(&mut buffer[field::URGENT], self.urgent_at);
        buffer[field::OPTIONS(header_len)].copy_from_slice(options);
        Ok(())
    }
}

impl fmt::Display for Repr {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TCP src={} dst={} {}", self.src_port, self.dst_port, self.flags)?;
        write!(f, " seq={}", self.seq_number)?;
        if let Some(ack_number) = self.ack_number {
            write!(f, " ack={}", ack_number)?;
        }
        write!(f, " win={}", self.window_len)?;
        if self.flags.urg() {
            write!(f, " urg={}", self.urgent_at)?;
        }
        write!(f, " opt={} len={}", self.options_len, self.payload_len)
    }
}

/// A parsed view of a complete segment.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Segment<'a> {
    /// The fixed header fields.
    pub repr: Repr,
    /// The raw option block.
    pub options: &'a [u8],
    /// The data following the header.
    pub payload: &'a [u8],
}

impl<'a> Segment<'a> {
    /// Parse a segment from the bytes handed to the network layer.
    pub fn parse(buffer: &'a [u8]) -> Result<Self> {
        if buffer.len() < HEADER_LEN {
            return Err(Error::Truncated);
        }
        let raw_flags = NetworkEndian::read_u16(&buffer[field::FLAGS]);
        let header_len = usize::from(raw_flags >> 12) * 4;
        if header_len < HEADER_LEN {
            return Err(Error::Malformed);
        }
        if buffer.len() < header_len {
            return Err(Error::Truncated);
        }
        let payload = &buffer[header_len..];
        if payload.len() > usize::from(u16::max_value()) {
            return Err(Error::Exceeded);
        }

        let flags = Flags(raw_flags & field::FLG_MASK);
        let ack_number = if flags.ack() {
            Some(SeqNumber(NetworkEndian::read_i32(&buffer[field::ACK_NUM])))
        } else {
            None
        };

        let repr = Repr {
            src_port: NetworkEndian::read_u16(&buffer[field::SRC_PORT]),
            dst_port: NetworkEndian::read_u16(&buffer[field::DST_PORT]),
            flags,
            seq_number: SeqNumber(NetworkEndian::read_i32(&buffer[field::SEQ_NUM])),
            ack_number,
            window_len: NetworkEndian::read_u16(&buffer[field::WIN_SIZE]),
            urgent_at: NetworkEndian::read_u16(&buffer[field::URGENT]),
            options_len: (header_len - HEADER_LEN) as u8,
            payload_len: payload.len() as u16,
        };

        Ok(Segment {
            repr,
            options: &buffer[field::OPTIONS(header_len)],
            payload,
        })
    }

    /// Find the first option matching a predicate.
    ///
    /// Parsing stops at the end-of-list marker. A malformed option block is reported as an error.
    pub fn find_option<F>(&self, mut pred: F) -> Result<Option<TcpOption<'a>>>
        where F: FnMut(&TcpOption<'a>) -> bool
    {
        let mut options = self.options;
        while !options.is_empty() {
            let (next_options, option) = TcpOption::parse(options)?;
            match option {
                TcpOption::EndOfList => break,
                other if pred(&other) => return Ok(Some(other)),
                _ => (),
            }
            options = next_options;
        }
        Ok(None)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    static SEGMENT_BYTES: [u8; 28] =
        [0xbf, 0x00, 0x00, 0x50,
         0x01, 0x23, 0x45, 0x67,
         0x89, 0xab, 0xcd, 0xef,
         0x60, 0x39, 0x01, 0x23,
         0x00, 0x00, 0x02, 0x01,
         0x01, 0x03, 0x03, 0x0c,
         0xaa, 0x00, 0x00, 0xff];

    static OPTION_BYTES: [u8; 4] =
        [0x01, 0x03, 0x03, 0x0c];

    static PAYLOAD_BYTES: [u8; 4] =
        [0xaa, 0x00, 0x00, 0xff];

    fn segment_repr() -> Repr {
        let mut flags = Flags::default();
        flags.set_fin(true);
        flags.set_psh(true);
        flags.set_ack(true);
        flags.set_urg(true);
        Repr {
            src_port: 48896,
            dst_port: 80,
            flags,
            seq_number: SeqNumber(0x01234567),
            ack_number: Some(SeqNumber(0x89abcdefu32 as i32)),
            window_len: 0x0123,
            urgent_at: 0x0201,
            options_len: 4,
            payload_len: 4,
        }
    }

    #[test]
    fn test_seq_number_ordering() {
        let near_wrap = SeqNumber(i32::MAX);
        let after = near_wrap + 10;
        assert!(after > near_wrap);
        assert_eq!(after - near_wrap, 10);
        assert_eq!(near_wrap.offset_from(after), -10);
        assert_eq!(near_wrap.max(after), after);
        assert_eq!(near_wrap.min(after), near_wrap);
    }

    #[test]
    #[should_panic]
    fn test_seq_number_underflow() {
        let _ = SeqNumber(5) - SeqNumber(6);
    }

    #[test]
    fn test_flags() {
        let mut flags = Flags::default();
        flags.set_syn(true);
        flags.set_ack(true);
        assert_eq!(flags.sequence_len(), 1);
        assert_eq!(format!("{}", flags), "syn|ack");
        flags.set_syn(false);
        assert!(!flags.syn());
        assert!(flags.ack());
        flags.set_fin(true);
        flags.set_fin(false);
        assert!(!flags.fin());
        assert_eq!(flags, Flags(field::FLG_ACK));
        assert_eq!(format!("{}", Flags::default()), "-");
    }

    #[test]
    fn test_emit() {
        let repr = segment_repr();
        let mut bytes = vec![0xa5; repr.buffer_len()];
        repr.emit(&mut bytes, &OPTION_BYTES).unwrap();
        bytes[repr.header_len()..].copy_from_slice(&PAYLOAD_BYTES);
        assert_eq!(&bytes[..], &SEGMENT_BYTES[..]);
    }

    #[test]
    fn test_parse() {
        let segment = Segment::parse(&SEGMENT_BYTES).unwrap();
        assert_eq!(segment.repr, segment_repr());
        assert_eq!(segment.options, &OPTION_BYTES[..]);
        assert_eq!(segment.payload, &PAYLOAD_BYTES[..]);
        let scale = segment.find_option(|opt| match opt {
            TcpOption::WindowScale(_) => true,
            _ => false,
        });
        assert_eq!(scale, Ok(Some(TcpOption::WindowScale(12))));
    }

    #[test]
    fn test_emit_checks_buffers() {
        let repr = segment_repr();
        let mut short = [0u8; 23];
        assert_eq!(repr.emit(&mut short, &OPTION_BYTES), Err(Error::Truncated));
        let mut bytes = [0u8; 28];
        assert_eq!(repr.emit(&mut bytes, &OPTION_BYTES[..3]), Err(Error::Malformed));

        let mut unaligned = repr;
        unaligned.options_len = 3;
        assert_eq!(unaligned.emit(&mut bytes, &OPTION_BYTES[..3]), Err(Error::Exceeded));
    }

    #[test]
    fn test_truncated() {
        assert_eq!(Segment::parse(&SEGMENT_BYTES[..19]), Err(Error::Truncated));
        assert_eq!(Segment::parse(&SEGMENT_BYTES[..23]), Err(Error::Truncated));
    }

    #[test]
    fn test_impossible_len() {
        let mut bytes = [0u8; 20];
        bytes[12] = 0x40;
        assert_eq!(Segment::parse(&bytes), Err(Error::Malformed));
    }

    macro_rules! assert_option_parses {
        ($opt:expr, $data:expr) => ({
            assert_eq!(TcpOption::parse($data), Ok((&[][..], $opt)));
            let buffer = &mut [0; 40][..$opt.buffer_len()];
            assert_eq!($opt.emit(buffer).map(|rest| rest.len()), Ok(0));
            assert_eq!(&*buffer, $data);
        })
    }

    #[test]
    fn test_tcp_options() {
        assert_option_parses!(TcpOption::EndOfList,
                              &[0x00]);
        assert_option_parses!(TcpOption::NoOperation,
                              &[0x01]);
        assert_option_parses!(TcpOption::MaxSegmentSize(1460),
                              &[0x02, 0x04, 0x05, 0xb4]);
        assert_option_parses!(TcpOption::WindowScale(7),
                              &[0x03, 0x03, 0x07]);
        assert_option_parses!(TcpOption::Timestamp { value: 0x01020304, echo: 7 },
                              &[0x08, 0x0a,
                                0x01, 0x02, 0x03, 0x04,
                                0x00, 0x00, 0x00, 0x07]);
        assert_option_parses!(TcpOption::Unknown { kind: 12, data: &[1, 2, 3][..] },
                              &[0x0c, 0x05, 0x01, 0x02, 0x03]);
    }

    #[test]
    fn test_malformed_tcp_options() {
        assert_eq!(TcpOption::parse(&[]),
                   Err(Error::Truncated));
        assert_eq!(TcpOption::parse(&[0xc]),
                   Err(Error::Truncated));
        assert_eq!(TcpOption::parse(&[0xc, 0x05, 0x01, 0x02]),
                   Err(Error::Truncated));
        assert_eq!(TcpOption::parse(&[0xc, 0x01]),
                   Err(Error::Malformed));
        assert_eq!(TcpOption::parse(&[0x2, 0x02]),
                   Err(Error::Malformed));
        assert_eq!(TcpOption::parse(&[0x8, 0x04, 0x00, 0x00]),
                   Err(Error::Malformed));
    }

    #[test]
    fn test_option_emit_overflow() {
        let mut buffer = [0u8; 3];
        assert_eq!(TcpOption::MaxSegmentSize(536).emit(&mut buffer).map(|_| ()),
                   Err(Error::Exceeded));
    }
}
