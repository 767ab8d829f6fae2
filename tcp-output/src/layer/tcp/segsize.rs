//! Segment sizing from the path towards the peer.
use crate::layer::Invariant;
use crate::layer::ip::{RouteInfo, Routes};
use crate::wire::{IpEndpoints, TCP_HEADER_LEN};

use super::config::Config;
use super::connection::{Connection, Negotiated};
use super::options::TIMESTAMP_LEN;

/// The result of sizing segments for one connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SegmentSizes {
    /// Payload bytes of a full outgoing segment.
    pub tx: u32,

    /// Payload bytes of a full incoming segment.
    ///
    /// Only bounds the window heuristics of the receive side.
    pub rx: u32,

    /// The peer is directly attached, it gets the local initial window.
    pub on_link: bool,
}

/// Compute the sizes of full segments in both directions.
///
/// The path size is derived from the route towards the peer, falling back to the default segment
/// size when there is none. The bytes of options present on every segment, the per-route overhead
/// and the IP options of the association are subtracted from the path size and from both MSS
/// values. A size that comes out as zero is replaced by the default segment size.
pub fn compute_segment_sizes(
    options: &Negotiated,
    endpoints: &IpEndpoints,
    route: Option<&RouteInfo>,
    ip_options_len: usize,
    config: &Config,
) -> SegmentSizes {
    let default = config.default_mss as usize;
    let path = path_size(endpoints, route, config);

    let option_len = if options.timestamps() { TIMESTAMP_LEN } else { 0 };
    let overhead = option_len
        + route.map_or(0, |route| route.overhead)
        + ip_options_len;
    let path = path.saturating_sub(overhead);

    let nonzero = |size: usize| if size == 0 { default } else { size };
    let tx = (options.peer_mss as usize).saturating_sub(overhead).min(path);
    let rx = (options.our_mss as usize).saturating_sub(overhead).min(path);

    SegmentSizes {
        tx: clamp_u32(nonzero(tx)),
        rx: clamp_u32(nonzero(rx)),
        on_link: route.map_or(false, |route| route.on_link || route.is_loopback),
    }
}

/// The MSS to put into our SYN.
///
/// This is the largest segment the outgoing interface carries, or the default segment size if
/// there is no route.
pub fn advertised_mss(endpoints: &IpEndpoints, route: Option<&RouteInfo>, config: &Config) -> u32 {
    let headers = endpoints.header_len() + TCP_HEADER_LEN;
    match route {
        Some(route) if route.mtu > headers => clamp_u32(route.mtu - headers),
        _ => config.default_mss,
    }
}

fn path_size(endpoints: &IpEndpoints, route: Option<&RouteInfo>, config: &Config) -> usize {
    let default = config.default_mss as usize;
    let headers = endpoints.header_len() + TCP_HEADER_LEN;
    let route = match route {
        Some(route) => route,
        None => return default,
    };

    if let Some(mtu) = route.path_mtu {
        return mtu.saturating_sub(headers);
    }

    if route.is_loopback || route.on_link || config.path_mtu_discovery {
        route.mtu.saturating_sub(headers)
    } else {
        default
    }
}

fn clamp_u32(size: usize) -> u32 {
    if size > u32::max_value() as usize {
        u32::max_value()
    } else {
        size as u32
    }
}

/// Scale a window counted in `old` sized segments to the same number of `new` sized segments.
///
/// Never less than one segment.
pub(crate) fn rescale(window: u32, old: u32, new: u32) -> u32 {
    ((window / old) * new).max(new)
}

impl Connection {
    /// Recompute the segment sizes and cache the outgoing one.
    ///
    /// When the outgoing size shrinks the congestion window and slow start threshold are scaled to
    /// the same number of the smaller segments.
    pub fn size_segments(&mut self, routes: &dyn Routes, config: &Config)
        -> Result<SegmentSizes, Invariant>
    {
        let route = routes.lookup_route(self.tuple.endpoints.remote());
        if !self.current.is_synchronized() {
            // Our SYN carries the MSS of the current route.
            self.options.our_mss = advertised_mss(&self.tuple.endpoints, route.as_ref(), config);
        }
        let sizes = compute_segment_sizes(
            &self.options,
            &self.tuple.endpoints,
            route.as_ref(),
            self.ip_options_len,
            config);

        if sizes.tx == 0 {
            return Err(Invariant::SegmentSize);
        }

        let old = self.send.segment_size;
        if old > 0 && sizes.tx < old {
            let flow = &mut self.flow_control;
            flow.congestion_window = rescale(flow.congestion_window, old, sizes.tx);
            flow.ssthresh = rescale(flow.ssthresh, old, sizes.tx);
            net_debug!("tcp: segment size {} -> {}, cwnd {} ssthresh {}",
                old, sizes.tx, flow.congestion_window, flow.ssthresh);
        }

        self.send.segment_size = sizes.tx;
        Ok(sizes)
    }
}
