//! The sender half of a TCP connection.
//!
//! ## Table of contents
//!
//! 1. [Design](#design-and-relevant-core-concepts)
//! 2. [The wire module](wire/index.html)
//! 3. [The output engine](layer/tcp/index.html)
//!    1. [Segment sizing](layer/tcp/index.html#segment-sizing)
//!    1. [Deciding to send](layer/tcp/index.html#deciding-to-send)
//!    1. [Timers](layer/tcp/index.html#timers)
//! 4. [Routes](layer/ip/index.html)
//!
//! ## Design and relevant core concepts
//!
//! This library contains the part of a TCP implementation that decides whether a segment goes out
//! on the wire, how much data it carries, which flags and options it sets and how the retransmit
//! and persist timers are armed as a consequence. Everything else is a collaborator that is
//! reached through a trait: the egress byte stream, the network layer that accepts a finished
//! segment, the route lookup that knows about MTUs and the timer service.
//!
//! The engine is invoked after every acknowledgment, every timer expiry and every write to the
//! connection. A single invocation may emit several segments but it never blocks and never
//! allocates. Buffers for segment construction are passed in by the caller instead. The
//! philosophy of upfront, explicit resource management is the same as for a whole network stack:
//! when a resource is missing the engine reports it and leaves the retry to the caller.
//!
//! Per-connection state is mutated through an exclusive reference only. Different connections
//! can be driven in parallel, the only shared state are the statistics counters which are atomic.
#![warn(missing_docs)]
#![warn(unreachable_pub)]

// tests should be able to use `std`
#![cfg_attr(all(
    not(feature = "std"),
    not(test)),
no_std)]

#[macro_use] mod macros;
pub mod layer;
pub mod time;
pub mod wire;
