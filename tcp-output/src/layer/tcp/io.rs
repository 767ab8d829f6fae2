//! Provided implementations for `SendBuf` and `RecvSpace`.
//!
//! The embedding stack usually has buffers of its own. These are meant for simple uses, tests and
//! as a blueprint.
use core::borrow::Borrow;

use super::{RecvSpace, SendBuf};

/// A sender with no data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Empty {
    _private: (),
}

/// Sender with buffered data in one contiguous buffer.
#[derive(Clone, Debug)]
pub struct SendFrom<B> {
    /// The buffer of bytes.
    data: B,
    /// Index of the first unacknowledged byte.
    consumed: usize,
    /// The application announced more data.
    more: bool,
}

/// Sender with data in a queue of fragments.
///
/// Writes append a fragment, acknowledgments drop from the front. A range asked for by the engine
/// may span several fragments.
#[cfg(feature = "std")]
#[derive(Clone, Debug, Default)]
pub struct Chain {
    fragments: std::collections::VecDeque<std::vec::Vec<u8>>,
    /// Acknowledged bytes of the first fragment.
    head: usize,
    len: usize,
    more: bool,
}

/// A receive buffer of fixed size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Window {
    /// The free space.
    pub space: usize,
    /// The buffer size.
    pub high_water: usize,
}

impl Empty {
    /// Create an empty sender.
    pub fn new() -> Self {
        Empty::default()
    }
}

impl<B: Borrow<[u8]>> SendFrom<B> {
    /// Create a buffered sender.
    pub fn new(data: B) -> Self {
        SendFrom {
            data,
            consumed: 0,
            more: false,
        }
    }

    /// Get a reference to the underlying buffer.
    pub fn get_ref(&self) -> &B {
        &self.data
    }

    /// Get a reference to the data not yet acknowledged.
    pub fn unacknowledged(&self) -> &[u8] {
        &self.data.borrow()[self.consumed..]
    }

    /// Drop acknowledged bytes from the front.
    ///
    /// Acknowledging more than is buffered empties the sender.
    pub fn acknowledge(&mut self, bytes: usize) {
        self.consumed = (self.consumed + bytes).min(self.data.borrow().len());
    }

    /// Announce that the application writes more data right away.
    pub fn set_more_to_come(&mut self, more: bool) {
        self.more = more;
    }
}

#[cfg(feature = "std")]
impl Chain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Chain::default()
    }

    /// Append a fragment.
    pub fn push(&mut self, fragment: std::vec::Vec<u8>) {
        if fragment.is_empty() {
            return;
        }
        self.len += fragment.len();
        self.fragments.push_back(fragment);
    }

    /// Drop acknowledged bytes from the front.
    pub fn acknowledge(&mut self, bytes: usize) {
        let mut bytes = bytes.min(self.len);
        self.len -= bytes;
        while bytes > 0 {
            let front = match self.fragments.front() {
                Some(front) => front.len() - self.head,
                None => break,
            };
            if bytes < front {
                self.head += bytes;
                break;
            }
            bytes -= front;
            self.head = 0;
            self.fragments.pop_front();
        }
    }

    /// Announce that the application writes more data right away.
    pub fn set_more_to_come(&mut self, more: bool) {
        self.more = more;
    }

    /// The number of fragments.
    pub fn fragments(&self) -> usize {
        self.fragments.len()
    }
}

impl Window {
    /// A buffer with the given size and free space.
    pub fn new(space: usize, high_water: usize) -> Self {
        Window { space, high_water }
    }
}

impl SendBuf for Empty {
    fn len(&self) -> usize {
        0
    }

    fn copy_range(&self, _: usize, buf: &mut [u8]) {
        assert_eq!(buf.len(), 0, "Called empty send buffer to fill data");
    }
}

impl<B: Borrow<[u8]>> SendBuf for SendFrom<B> {
    fn len(&self) -> usize {
        self.data.borrow().len() - self.consumed
    }

    fn copy_range(&self, offset: usize, buf: &mut [u8]) {
        let start = self.consumed + offset;
        let end = start + buf.len();
        buf.copy_from_slice(&self.data.borrow()[start..end])
    }

    fn more_to_come(&self) -> bool {
        self.more
    }
}

#[cfg(feature = "std")]
impl SendBuf for Chain {
    fn len(&self) -> usize {
        self.len
    }

    fn copy_range(&self, offset: usize, buf: &mut [u8]) {
        let mut skip = offset + self.head;
        let mut filled = 0;
        for fragment in self.fragments.iter() {
            if filled == buf.len() {
                break;
            }
            if skip >= fragment.len() {
                skip -= fragment.len();
                continue;
            }
            let available = &fragment[skip..];
            let count = available.len().min(buf.len() - filled);
            buf[filled..filled + count].copy_from_slice(&available[..count]);
            filled += count;
            skip = 0;
        }
        assert_eq!(filled, buf.len(), "Range beyond the buffered data");
    }

    fn more_to_come(&self) -> bool {
        self.more
    }
}

impl RecvSpace for Window {
    fn space(&self) -> usize {
        self.space
    }

    fn high_water(&self) -> usize {
        self.high_water
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn send_from() {
        let mut send = SendFrom::new(&b"hello world"[..]);
        assert_eq!(send.len(), 11);
        send.acknowledge(6);
        assert_eq!(send.len(), 5);
        let mut buf = [0; 3];
        send.copy_range(1, &mut buf);
        assert_eq!(&buf, b"orl");
        assert_eq!(send.unacknowledged(), b"world");
        send.acknowledge(100);
        assert_eq!(send.len(), 0);
        assert!(!send.more_to_come());
    }

    #[test]
    #[cfg(feature = "std")]
    fn chain_spans_fragments() {
        let mut chain = Chain::new();
        chain.push(b"abc".to_vec());
        chain.push(std::vec::Vec::new());
        chain.push(b"defg".to_vec());
        chain.push(b"hi".to_vec());
        assert_eq!(chain.len(), 9);
        assert_eq!(chain.fragments(), 3);

        let mut buf = [0; 5];
        chain.copy_range(2, &mut buf);
        assert_eq!(&buf, b"cdefg");

        chain.acknowledge(4);
        assert_eq!(chain.len(), 5);
        assert_eq!(chain.fragments(), 2);
        let mut buf = [0; 5];
        chain.copy_range(0, &mut buf);
        assert_eq!(&buf, b"efghi");

        chain.acknowledge(5);
        assert_eq!(chain.len(), 0);
        assert_eq!(chain.fragments(), 0);
    }

    #[test]
    fn empty() {
        let empty = Empty::new();
        assert_eq!(empty.len(), 0);
        empty.copy_range(0, &mut []);
    }
}
