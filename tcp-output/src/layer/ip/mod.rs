//! The ip layer, as far as TCP output needs it.
//!
//! The output engine asks the network layer a single question: what is known about the path to
//! the peer. The answer decides the segment size and the MSS we advertise.
mod route;

pub use self::route::{
    Route,
    RouteInfo,
    Routes,
    Table,
};
