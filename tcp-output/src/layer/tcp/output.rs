use crate::layer::{Error, Result};
use crate::layer::ip::Routes;
use crate::time::Instant;
use crate::wire::{TcpFlags, TCP_MAX_WINDOW};

use super::{RecvSpace, SendBuf, Transmit};
use super::assemble::Planned;
use super::config::Config;
use super::connection::{Connection, State};
use super::segsize::SegmentSizes;
use super::stats::Stats;
use super::timer::{TimerKind, TimerService};

/// Everything an invocation of the engine needs besides the connection itself.
///
/// The collaborators are borrowed for the duration of one invocation only.
pub struct Environment<'a> {
    /// The current time.
    pub now: Instant,

    /// Policy knobs of the stack.
    pub config: &'a Config,

    /// The egress byte stream.
    pub send: &'a dyn SendBuf,

    /// The receive buffer.
    pub recv: &'a dyn RecvSpace,

    /// The network layer.
    pub network: &'a mut dyn Transmit,

    /// Route lookup towards the peer.
    pub routes: &'a dyn Routes,

    /// Schedules the timers of the connection.
    pub timers: &'a mut dyn TimerService,

    /// Shared statistics.
    pub stats: &'a Stats,

    /// Space in which segments are constructed.
    ///
    /// Must hold a header with options and a full segment. A buffer that is too small is treated
    /// like the network layer being out of buffers.
    pub scratch: &'a mut [u8],
}

/// The outcome of an invocation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Report {
    /// Segments accepted by the network layer.
    pub segments: usize,

    /// Payload bytes in these segments.
    pub bytes: usize,

    /// The persist timer was armed.
    pub persist_armed: bool,

    /// Sending stopped since the network layer or the scratch space ran out of buffers.
    pub throttled: bool,
}

/// What an iteration of the send loop decided.
enum Decision {
    /// Build and transmit a segment.
    Send(Planned),
    /// Nothing is owed right now.
    Wait,
}

/// Result of handing one segment to the network layer.
pub(crate) enum Sent {
    /// The segment went out, the loop may continue.
    Continue,
    /// Stop sending for this invocation without an error.
    Stop,
}

impl Connection {
    /// Send whatever the connection owes to its peer right now.
    ///
    /// Emits up to `max_burst` segments. An invariant violation aborts the connection: its timers
    /// are cancelled and it is moved to `Closed`.
    pub fn output(&mut self, env: &mut Environment) -> Result<Report> {
        self.run(env, false)
    }

    /// Handle the expiry of the persist timer.
    ///
    /// Re-arms the timer with the next backoff and forces a window probe. A closed window is probed
    /// with a single byte, an open one gets its data regardless of the batching rules.
    pub fn probe(&mut self, env: &mut Environment) -> Result<Report> {
        self.timer.expire(TimerKind::Persist);
        if let Err(err) = self.set_persist(env.timers, env.config, env.stats) {
            self.abort(env.timers, err);
            return Err(Error::Invariant(err));
        }
        let mut report = self.run(env, true)?;
        report.persist_armed = self.timer.is_persist();
        Ok(report)
    }

    fn run(&mut self, env: &mut Environment, force: bool) -> Result<Report> {
        match self.send_loop(env, force) {
            Err(Error::Invariant(err)) => {
                self.abort(env.timers, err);
                Err(Error::Invariant(err))
            },
            other => other,
        }
    }

    fn send_loop(&mut self, env: &mut Environment, force: bool) -> Result<Report> {
        self.check_sequence()?;
        let sizes = self.size_segments(env.routes, env.config)?;

        let mut idle = self.last_idle || self.send.max == self.send.unacked;
        self.limit_burst(idle, env.now, &sizes, env.config);
        self.last_idle = false;
        if idle && env.send.more_to_come() {
            // Treat the next invocation as idle as well, the data announced now completes it.
            self.last_idle = true;
            idle = false;
        }

        let mut report = Report::default();
        let mut burst = env.config.max_burst.max(1);
        loop {
            let planned = match self.decide(env, &sizes, idle, force, &mut report)? {
                Decision::Send(planned) => planned,
                Decision::Wait => return Ok(report),
            };

            match self.transmit(env, &sizes, &planned, force, &mut report)? {
                Sent::Continue => (),
                Sent::Stop => return Ok(report),
            }

            if !planned.more || burst <= 1 {
                return Ok(report);
            }
            burst -= 1;
        }
    }

    fn decide(
        &mut self,
        env: &mut Environment,
        sizes: &SegmentSizes,
        idle: bool,
        force: bool,
        report: &mut Report,
    ) -> Result<Decision> {
        let segment_size = i64::from(self.send.segment_size);
        let buffered = env.send.len() as i64;
        let mut off = i64::from(self.send.next.offset_from(self.send.unacked));
        let mut win = i64::from(self.send.window.min(self.flow_control.congestion_window));
        let mut flags = self.current.out_flags();
        let mut more = false;

        if force {
            if win == 0 {
                // A probe must not carry the FIN while data is left behind it.
                if off < buffered {
                    flags.set_fin(false);
                }
                win = 1;
            } else {
                self.timer.disarm_persist(env.timers);
                self.backoff_shift = 0;
            }
        }

        let mut len = buffered.min(win) - off;

        if flags.syn() && self.send.next > self.send.unacked {
            flags.set_syn(false);
            off -= 1;
            len += 1;
        }

        // No data on SYN segments.
        if flags.syn() || self.current == State::SynSent {
            len = 0;
            flags.set_fin(false);
        }

        if len < 0 {
            len = 0;
            if win == 0 {
                // The window closed on data in flight. Take it back and probe instead.
                self.timer.disarm_retransmit(env.timers);
                self.backoff_shift = 0;
                self.send.next = self.send.unacked;
                // The rolled back data is sent again, its acknowledgment is no sample.
                self.rtt.cancel();
                if !self.timer.is_persist() {
                    self.set_persist(env.timers, env.config, env.stats)?;
                    report.persist_armed = true;
                }
                net_trace!("tcp: window closed, rolled back to {}", self.send.next);
            }
        }

        if len > segment_size {
            len = segment_size;
            flags.set_fin(false);
            more = true;
        }

        if off + len < buffered {
            flags.set_fin(false);
        }

        let planned = Planned {
            flags,
            off: off.max(0) as usize,
            len: len as usize,
            more,
        };

        if len > 0 {
            if len >= segment_size {
                return Ok(Decision::Send(planned));
            }
            if !env.send.more_to_come() && (idle || self.nodelay) && off + len >= buffered {
                return Ok(Decision::Send(planned));
            }
            if force {
                return Ok(Decision::Send(planned));
            }
            if self.send.max_window > 0 && len >= i64::from(self.send.max_window / 2) {
                return Ok(Decision::Send(planned));
            }
            if self.send.next < self.send.max {
                return Ok(Decision::Send(planned));
            }
        }

        if self.window_update_due(env.recv, sizes) {
            return Ok(Decision::Send(planned));
        }

        if self.control_due(flags) {
            return Ok(Decision::Send(planned));
        }

        if buffered > 0 && self.timer.is_idle() {
            self.backoff_shift = 0;
            self.set_persist(env.timers, env.config, env.stats)?;
            report.persist_armed = true;
        }

        Ok(Decision::Wait)
    }

    /// Query if the window moved far enough to be worth a segment of its own.
    fn window_update_due(&self, recv: &dyn RecvSpace, sizes: &SegmentSizes) -> bool {
        let space = recv.space() as i64;
        if space <= 0 {
            return false;
        }
        let max = i64::from(TCP_MAX_WINDOW) << self.options.recv_shift();
        let promised = i64::from(self.recv.advertised.offset_from(self.recv.next));
        let adv = space.min(max) - promised;
        adv >= 2 * i64::from(sizes.rx) || 2 * adv >= recv.high_water() as i64
    }

    /// Query if a segment without data is owed.
    fn control_due(&self, flags: TcpFlags) -> bool {
        if self.ack.is_now() {
            return true;
        }
        if flags.syn() || flags.rst() {
            return true;
        }
        if self.send.urgent > self.send.unacked {
            return true;
        }
        // A FIN that was never sent, or one to retransmit.
        flags.fin() && (!self.send.sent_fin || self.send.next == self.send.unacked)
    }
}
