//! Ports layer for the event bus.
//!
//! - Inbound (driving) ports: handler capability and the client API
//!   gameplay systems program against
//! - Outbound (driven) ports: the clock

pub mod inbound;
pub mod outbound;

pub use inbound::*;
pub use outbound::*;
