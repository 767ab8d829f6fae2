//! Route lookup, longest prefix match per rfc1519, rfc4632.
use crate::wire::{IpAddress, IpCidr};

/// What is known about the path towards a destination.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RouteInfo {
    /// The MTU of the outgoing interface, including the IP header.
    pub mtu: usize,

    /// A path MTU learned for this destination, including the IP header.
    ///
    /// Takes precedence over everything else when present.
    pub path_mtu: Option<usize>,

    /// The route leads over a loopback interface.
    ///
    /// Loopback traffic always uses the full interface MTU.
    pub is_loopback: bool,

    /// The destination is directly attached to the outgoing interface.
    ///
    /// Without path MTU discovery only on-link destinations use the interface MTU, everything
    /// else falls back to the default segment size.
    pub on_link: bool,

    /// Bytes of per-packet overhead added below TCP, e.g. by a security association.
    pub overhead: usize,
}

/// A lookup of the path properties towards an address.
pub trait Routes {
    /// Find the route for a destination, if there is one.
    fn lookup_route(&self, destination: IpAddress) -> Option<RouteInfo>;
}

/// A prefix of addresses that share path properties.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    /// The network targetted by the route.
    pub net: IpCidr,

    /// Properties of the path.
    pub info: RouteInfo,
}

/// A fixed routing table.
///
/// The table does not own its storage, so it works the same on systems without a heap:
///
/// ```rust
/// use tcp_output::layer::ip::{Route, RouteInfo, Routes, Table};
/// use tcp_output::wire::{IpAddress, IpCidr};
///
/// let routes = [Route {
///     net: IpCidr::new(IpAddress::v4(10, 0, 0, 0), 8).unwrap(),
///     info: RouteInfo { mtu: 1500, path_mtu: None, is_loopback: false, on_link: true, overhead: 0 },
/// }];
/// let table = Table::new(&routes[..]);
/// assert_eq!(table.lookup_route(IpAddress::v4(10, 1, 2, 3)).map(|r| r.mtu), Some(1500));
/// ```
#[derive(Debug, Clone, Copy)]
pub struct Table<'a> {
    storage: &'a [Route],
}

impl<'a> Table<'a> {
    /// Creates a table over the given routes.
    pub fn new(storage: &'a [Route]) -> Self {
        Table { storage }
    }

    /// An empty table, every lookup fails.
    pub fn empty() -> Table<'static> {
        Table { storage: &[] }
    }
}

impl Routes for Table<'_> {
    fn lookup_route(&self, destination: IpAddress) -> Option<RouteInfo> {
        // The rules say to find the subnet with longest prefix.
        let mut best_match: Option<&Route> = None;
        for route in self.storage.iter() {
            if !route.net.contains(destination) {
                continue;
            }

            let best = best_match.get_or_insert(route);
            if best.net.prefix_len() < route.net.prefix_len() {
                *best = route;
            }
        }
        best_match.map(|route| route.info)
    }
}
