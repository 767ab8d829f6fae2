//! Building one segment and handing it to the network layer.
use crate::layer::{Error, Invariant, Result, TransmitError};
use crate::wire::{self, TcpFlags, TcpRepr, TcpSeqNumber, TCP_MAX_WINDOW};

use super::RecvSpace;
use super::connection::Connection;
use super::options::build_options;
use super::output::{Environment, Report, Sent};
use super::segsize::SegmentSizes;
use super::stats::Counter;

/// A segment the send loop decided on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Planned {
    /// Flags implied by the state, with SYN and FIN already filtered.
    pub flags: TcpFlags,
    /// Offset of the payload in the egress buffer.
    pub off: usize,
    /// Payload length.
    pub len: usize,
    /// The segment was cut to the segment size, more data waits behind it.
    pub more: bool,
}

impl Connection {
    /// Build the segment, transmit it and update the send state accordingly.
    pub(crate) fn transmit(
        &mut self,
        env: &mut Environment,
        sizes: &SegmentSizes,
        planned: &Planned,
        force: bool,
        report: &mut Report,
    ) -> Result<Sent> {
        let len = planned.len;
        let mut flags = planned.flags;
        let options = build_options(&self.options, flags, env.now.timestamp())?;

        if len > 0 && planned.off + len == env.send.len() {
            flags.set_psh(true);
        }

        self.count(env, flags, len, force);

        // A retransmitted FIN reuses its sequence number.
        if flags.fin() && self.send.sent_fin && self.send.next == self.send.max {
            self.send.next -= 1;
        }

        let seq_number = if len > 0 || flags.syn() || flags.fin() || self.timer.is_persist() {
            self.send.next
        } else {
            self.send.max
        };

        let window = self.receive_window(env.recv, sizes);

        let mut urgent_at = 0;
        if self.send.urgent > self.send.next {
            let ahead = self.send.urgent.offset_from(self.send.next);
            urgent_at = ahead.min(i32::from(u16::max_value())) as u16;
            flags.set_urg(true);
        } else {
            self.send.urgent = self.send.unacked;
        }

        if len > usize::from(u16::max_value()) {
            return Err(Invariant::Encoding(wire::Error::Exceeded).into());
        }

        let repr = TcpRepr {
            src_port: self.tuple.local_port,
            dst_port: self.tuple.remote_port,
            flags,
            seq_number,
            ack_number: if flags.ack() { Some(self.recv.next) } else { None },
            window_len: (window >> self.options.recv_shift()).min(TCP_MAX_WINDOW) as u16,
            urgent_at,
            options_len: options.len() as u8,
            payload_len: len as u16,
        };

        let segment = match env.scratch.get_mut(..repr.buffer_len()) {
            Some(segment) => segment,
            None => {
                net_debug!("tcp: scratch of {} bytes too small for {}", env.scratch.len(), repr);
                self.quench(env, report);
                return Ok(Sent::Stop);
            },
        };
        repr.emit(segment, options.as_slice())?;
        if len > 0 {
            let header_len = repr.header_len();
            env.send.copy_range(planned.off, &mut segment[header_len..]);
        }

        net_trace!("tcp: {}", repr);
        let soft_error = match env.network.send_datagram(&repr, segment) {
            Ok(()) => false,
            Err(TransmitError::OutOfResources) => {
                self.quench(env, report);
                return Ok(Sent::Stop);
            },
            Err(TransmitError::NoRouteOrDown) if self.current.have_received_syn() => {
                net_debug!("tcp: soft error on transmit, {}", TransmitError::NoRouteOrDown);
                self.soft_error = Some(TransmitError::NoRouteOrDown);
                true
            },
            Err(err) => {
                net_debug!("tcp: transmit failed, {}", err);
                self.ack.restart(env.timers);
                return Err(Error::Transmit(err));
            },
        };

        self.advance(env, flags, len, force)?;
        report.segments += 1;
        report.bytes += len;

        if soft_error {
            self.ack.restart(env.timers);
            return Ok(Sent::Stop);
        }

        if window > 0 && self.recv.next + window as usize > self.recv.advertised {
            self.recv.advertised = self.recv.next + window as usize;
        }
        self.recv.last_ack_sent = self.recv.next;
        self.ack.clear(env.timers);
        Ok(Sent::Continue)
    }

    /// The window to advertise, in bytes.
    ///
    /// Windows smaller than both a quarter of the buffer and a receive segment are advertised as
    /// zero. Otherwise the window never retracts the edge advertised before.
    pub(crate) fn receive_window(&self, recv: &dyn RecvSpace, sizes: &SegmentSizes) -> u32 {
        let space = recv.space();
        if space < recv.high_water() / 4 && space < sizes.rx as usize {
            return 0;
        }

        let max = TCP_MAX_WINDOW << self.options.recv_shift();
        let window = if space > max as usize { max } else { space as u32 };
        let promised = self.recv.advertised.offset_from(self.recv.next).max(0) as u32;
        window.max(promised)
    }

    /// Advance the send sequence space over a transmitted segment and arm the retransmit timer.
    fn advance(&mut self, env: &mut Environment, flags: TcpFlags, len: usize, force: bool)
        -> core::result::Result<(), Invariant>
    {
        if force && self.timer.is_persist() {
            // A window probe, the byte is not counted as sent.
            let end: TcpSeqNumber = self.send.next + len;
            if end > self.send.max {
                self.send.max = end;
            }
            return Ok(());
        }

        let start = self.send.next;
        if flags.syn() {
            self.send.next += 1;
        }
        if flags.fin() {
            self.send.next += 1;
            self.send.sent_fin = true;
        }
        self.send.next += len;

        if self.send.next > self.send.max {
            self.send.max = self.send.next;
            if self.rtt.start(env.now, start) {
                env.stats.inc(Counter::Timed);
            }
        }

        if !self.timer.is_retransmit() && self.send.next != self.send.unacked {
            if self.timer.is_persist() {
                self.timer.disarm_persist(env.timers);
                self.backoff_shift = 0;
            }
            self.timer.arm_retransmit(env.timers, self.rtt.rexmt())?;
        }
        Ok(())
    }

    /// The network layer is out of buffers. Nothing was sent.
    fn quench(&mut self, env: &mut Environment, report: &mut Report) {
        env.stats.inc(Counter::SelfQuench);
        if env.config.self_quench {
            self.flow_control.quench(self.send.segment_size);
        }
        self.ack.restart(env.timers);
        report.throttled = true;
        net_debug!("tcp: out of buffers, cwnd {}", self.flow_control.congestion_window);
    }

    fn count(&self, env: &Environment, flags: TcpFlags, len: usize, force: bool) {
        let stats = env.stats;
        stats.inc(Counter::SendTotal);
        if len > 0 {
            if force && len == 1 {
                stats.inc(Counter::Probes);
            } else if self.send.next < self.send.max {
                stats.inc(Counter::RetransmitPackets);
                stats.add(Counter::RetransmitBytes, len as u64);
            } else {
                stats.inc(Counter::SendPackets);
                stats.add(Counter::SendBytes, len as u64);
            }
        } else if self.ack.is_now() {
            stats.inc(Counter::Acks);
        } else if flags.syn() || flags.fin() || flags.rst() {
            stats.inc(Counter::Control);
        } else if self.send.urgent > self.send.unacked {
            stats.inc(Counter::Urgent);
        } else {
            stats.inc(Counter::WindowUpdates);
        }
    }
}
