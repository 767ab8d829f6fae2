//! Construction of the option block.
use core::fmt;

use crate::layer::Invariant;
use crate::wire::{TcpFlags, TcpOption};

use super::connection::Negotiated;

/// The largest option block the engine builds.
pub const MAX_OPTIONS_LEN: usize = 32;

/// Bytes the aligned timestamp option takes on every segment.
pub(crate) const TIMESTAMP_LEN: usize = 12;

/// An encoded, aligned option block.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct OptionBlock {
    bytes: [u8; MAX_OPTIONS_LEN],
    len: usize,
}

impl OptionBlock {
    /// An empty block.
    pub fn new() -> Self {
        OptionBlock {
            bytes: [0; MAX_OPTIONS_LEN],
            len: 0,
        }
    }

    /// The encoded options.
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }

    /// The length of the block, a multiple of four.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Query if no options are present.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn push(&mut self, option: TcpOption) -> Result<(), Invariant> {
        option.emit(&mut self.bytes[self.len..])
            .map_err(|_| Invariant::OptionOverflow)?;
        self.len += option.buffer_len();
        Ok(())
    }

    fn align(&mut self) -> Result<(), Invariant> {
        let aligned = (self.len + 3) & !3;
        if aligned == self.len {
            return Ok(());
        }
        let padding = self.bytes.get_mut(self.len..aligned)
            .ok_or(Invariant::OptionOverflow)?;
        TcpOption::EndOfList.emit(padding)
            .map_err(|_| Invariant::OptionOverflow)?;
        self.len = aligned;
        Ok(())
    }
}

impl Default for OptionBlock {
    fn default() -> Self {
        OptionBlock::new()
    }
}

impl fmt::Debug for OptionBlock {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("OptionBlock").field(&self.as_slice()).finish()
    }
}

/// Build the options of a segment with the given flags.
///
/// A SYN carries our MSS and, when we offer scaling, the window scale option. The scale is not
/// offered on a SYN-ACK unless the peer offered it first. Timestamps go on the initial SYN when we
/// offer them and on every later segment once the peer sent them too, except on resets. `now` is
/// the timestamp clock value to send.
pub fn build_options(options: &Negotiated, flags: TcpFlags, now: u32)
    -> Result<OptionBlock, Invariant>
{
    let mut block = OptionBlock::new();
    if options.no_options {
        return Ok(block);
    }

    if flags.syn() {
        let mss = if options.our_mss > u32::from(u16::max_value()) {
            u16::max_value()
        } else {
            options.our_mss as u16
        };
        block.push(TcpOption::MaxSegmentSize(mss))?;

        if options.request_scale && (!flags.ack() || options.received_scale) {
            block.push(TcpOption::NoOperation)?;
            block.push(TcpOption::WindowScale(options.requested_recv_scale))?;
        }
    }

    let initial = flags.syn() && !flags.ack();
    if options.request_timestamps
        && !flags.rst()
        && (initial || options.received_timestamps)
    {
        block.push(TcpOption::NoOperation)?;
        block.push(TcpOption::NoOperation)?;
        block.push(TcpOption::Timestamp { value: now, echo: options.ts_recent })?;
    }

    block.align()?;
    Ok(block)
}
