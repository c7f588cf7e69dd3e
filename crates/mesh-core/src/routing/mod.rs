//! Routing table and its change-notification events.

pub mod events;
pub mod internet;
pub mod table;

pub use events::RoutingEvent;
pub use table::{Link, RoutingTable};
