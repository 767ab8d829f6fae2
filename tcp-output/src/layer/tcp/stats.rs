//! Statistics shared by all connections.
//!
//! Counters are plain relaxed atomics. They are only ever incremented and are meant for
//! monitoring, no decision of the engine depends on them.
use core::sync::atomic::{AtomicU64, Ordering};

/// A named counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Counter {
    /// Segments handed to the network layer.
    SendTotal,
    /// Segments carrying new data.
    SendPackets,
    /// Bytes of new data.
    SendBytes,
    /// Segments carrying retransmitted data.
    RetransmitPackets,
    /// Bytes of retransmitted data.
    RetransmitBytes,
    /// Window probes.
    Probes,
    /// Pure acknowledgments that were due.
    Acks,
    /// Segments carrying only SYN, FIN or RST.
    Control,
    /// Segments sent only to move the urgent pointer.
    Urgent,
    /// Pure window updates.
    WindowUpdates,
    /// Segments that started round trip timing.
    Timed,
    /// Times the network layer was out of buffers.
    SelfQuench,
    /// Delayed acknowledgments scheduled.
    DelayedAcks,
    /// Persist timer arms.
    PersistArms,
}

/// The counters.
#[derive(Debug, Default)]
pub struct Stats {
    send_total: AtomicU64,
    send_packets: AtomicU64,
    send_bytes: AtomicU64,
    retransmit_packets: AtomicU64,
    retransmit_bytes: AtomicU64,
    probes: AtomicU64,
    acks: AtomicU64,
    control: AtomicU64,
    urgent: AtomicU64,
    window_updates: AtomicU64,
    timed: AtomicU64,
    self_quench: AtomicU64,
    delayed_acks: AtomicU64,
    persist_arms: AtomicU64,
}

impl Stats {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Stats::default()
    }

    /// Add to a counter.
    pub fn add(&self, counter: Counter, value: u64) {
        self.counter(counter).fetch_add(value, Ordering::Relaxed);
    }

    /// Increment a counter.
    pub fn inc(&self, counter: Counter) {
        self.add(counter, 1)
    }

    /// Read a counter.
    pub fn get(&self, counter: Counter) -> u64 {
        self.counter(counter).load(Ordering::Relaxed)
    }

    fn counter(&self, counter: Counter) -> &AtomicU64 {
        match counter {
            Counter::SendTotal => &self.send_total,
            Counter::SendPackets => &self.send_packets,
            Counter::SendBytes => &self.send_bytes,
            Counter::RetransmitPackets => &self.retransmit_packets,
            Counter::RetransmitBytes => &self.retransmit_bytes,
            Counter::Probes => &self.probes,
            Counter::Acks => &self.acks,
            Counter::Control => &self.control,
            Counter::Urgent => &self.urgent,
            Counter::WindowUpdates => &self.window_updates,
            Counter::Timed => &self.timed,
            Counter::SelfQuench => &self.self_quench,
            Counter::DelayedAcks => &self.delayed_acks,
            Counter::PersistArms => &self.persist_arms,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn shared_between_threads() {
        let stats = Arc::new(Stats::new());
        let workers: Vec<_> = (0..4).map(|_| {
            let stats = Arc::clone(&stats);
            thread::spawn(move || {
                for _ in 0..100 {
                    stats.inc(Counter::SendTotal);
                    stats.add(Counter::SendBytes, 10);
                }
            })
        }).collect();
        for worker in workers {
            worker.join().unwrap();
        }
        assert_eq!(stats.get(Counter::SendTotal), 400);
        assert_eq!(stats.get(Counter::SendBytes), 4000);
        assert_eq!(stats.get(Counter::Probes), 0);
    }
}
