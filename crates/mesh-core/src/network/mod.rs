//! Network controller and its supporting types.

pub mod callbacks;
pub mod controller;
pub mod state;
pub mod ticket;

pub use callbacks::MeshCallbacks;
pub use controller::NetworkController;
pub use state::{DeviceEvent, DeviceState, NeighborState};
pub use ticket::{SequenceGenerator, Ticket};
