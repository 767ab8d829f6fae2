//! Drive a connection through a bulk transfer over a simulated link.
//!
//! The peer acknowledges everything one round trip after it was sent and always offers the same
//! window. The congestion window grows by the acknowledged bytes, as in slow start, which is
//! enough to watch the engine batch, pace and time its segments.
use std::collections::VecDeque;

use structopt::StructOpt;

use tcp_output::layer::TransmitError;
use tcp_output::layer::ip::{Route, RouteInfo, Table};
use tcp_output::layer::tcp::{
    io::{SendFrom, Window},
    Config, Connection, Counter, Environment, FourTuple, SendBuf, State, Stats, TimerId, TimerKind,
    TimerService, Transmit};
use tcp_output::time::{Duration, Instant};
use tcp_output::wire::{IpAddress, IpCidr, IpEndpoints, Ipv4Address, TcpRepr, TcpSeqNumber};

#[derive(Clone, StructOpt)]
struct Options {
    /// Bytes to transfer.
    #[structopt(short = "n", default_value = "1000000")]
    total_bytes: usize,

    /// MTU of the link.
    #[structopt(long = "mtu", default_value = "1500")]
    mtu: usize,

    /// Window offered by the peer.
    #[structopt(long = "window", default_value = "65535")]
    window: u32,

    /// Round trip time of the link in milliseconds.
    #[structopt(long = "rtt", default_value = "20")]
    rtt: u64,

    /// Segments one invocation may send.
    #[structopt(long = "burst", default_value = "4")]
    max_burst: u32,

    /// Disable Nagle batching.
    #[structopt(long = "nodelay")]
    nodelay: bool,
}

/// The link, segments become acknowledgments after one round trip.
struct Link {
    in_flight: VecDeque<(Instant, TcpSeqNumber)>,
    now: Instant,
    delay: Duration,
}

#[derive(Default)]
struct Timers {
    next: u64,
}

impl Transmit for Link {
    fn send_datagram(&mut self, header: &TcpRepr, _: &[u8]) -> Result<(), TransmitError> {
        let end = header.seq_number + header.sequence_len();
        self.in_flight.push_back((self.now + self.delay, end));
        Ok(())
    }
}

impl TimerService for Timers {
    fn schedule(&mut self, _: TimerKind, _: Duration) -> TimerId {
        self.next += 1;
        TimerId(self.next)
    }

    fn cancel(&mut self, _: TimerId) { }
}

fn main() {
    let options = Options::from_args();
    let config = Config {
        max_burst: options.max_burst,
        ..Config::default()
    };

    let routes = [Route {
        net: IpCidr::new(IpAddress::v4(10, 0, 0, 0), 8).unwrap(),
        info: RouteInfo {
            mtu: options.mtu,
            path_mtu: None,
            is_loopback: false,
            on_link: true,
            overhead: 0,
        },
    }];
    let routes = Table::new(&routes[..]);

    let tuple = FourTuple {
        endpoints: IpEndpoints::Ipv4 {
            local: Ipv4Address::new(10, 0, 0, 1),
            remote: Ipv4Address::new(10, 0, 0, 2),
        },
        local_port: 49152,
        remote_port: 5001,
    };

    let mut conn = Connection::new(tuple, &config);
    conn.accept(TcpSeqNumber(0), TcpSeqNumber(0));
    conn.current = State::Established;
    conn.send.unacked = TcpSeqNumber(1);
    conn.send.next = TcpSeqNumber(1);
    conn.send.max = TcpSeqNumber(1);
    conn.send.urgent = TcpSeqNumber(1);
    conn.send.window = options.window;
    conn.send.max_window = options.window;
    conn.options.peer_mss = 65535;
    conn.nodelay = options.nodelay;
    conn.flow_control.congestion_window = 2 * 1460;

    let payload = vec![0u8; options.total_bytes];
    let mut send = SendFrom::new(&payload[..]);
    let recv = Window::new(65535, 65535);
    let stats = Stats::new();
    let mut link = Link {
        in_flight: VecDeque::new(),
        now: Instant::from_millis(0),
        delay: Duration::from_millis(options.rtt),
    };
    let mut timers = Timers::default();
    let mut scratch = vec![0; options.mtu];
    let mut now = link.now;

    while send.len() > 0 {
        link.now = now;
        conn.last_received = now;
        let mut env = Environment {
            now,
            config: &config,
            send: &send,
            recv: &recv,
            network: &mut link,
            routes: &routes,
            timers: &mut timers,
            stats: &stats,
            scratch: &mut scratch[..],
        };

        if let Err(err) = conn.output(&mut env) {
            eprintln!("{}: {}", now, err);
            return;
        }

        // Deliver the acknowledgments that are due, or wait for the next one.
        let due = match link.in_flight.front() {
            Some(&(at, _)) => at,
            None => break,
        };
        now = now.max(due);
        while let Some(&(at, ack)) = link.in_flight.front() {
            if at > now {
                break;
            }
            link.in_flight.pop_front();
            if ack <= conn.send.unacked {
                continue;
            }
            let acked = ack - conn.send.unacked;
            send.acknowledge(acked);
            conn.send.unacked = ack;
            conn.measure_rtt(now, ack, &config);
            let flow = &mut conn.flow_control;
            flow.congestion_window = flow.congestion_window.saturating_add(acked as u32);
            if conn.send.unacked == conn.send.max {
                conn.timer.disarm_retransmit(&mut timers);
            }
        }
    }

    println!("transferred {} bytes in {}", options.total_bytes, now);
    println!("segments {}, timed {}, persist {}",
        stats.get(Counter::SendPackets),
        stats.get(Counter::Timed),
        stats.get(Counter::PersistArms));
    if let Some(srtt) = conn.rtt.smoothed() {
        println!("smoothed rtt {}ms, cwnd {}", srtt.as_millis(), conn.flow_control.congestion_window);
    }
}
