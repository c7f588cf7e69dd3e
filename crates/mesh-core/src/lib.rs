//! Device-to-device mesh overlay core: binary packet codec, routing
//! table with Internet-reachability metric, the network controller that
//! drives negotiation/forwarding/acknowledgement/Internet-proxying, and
//! the I/O controller that multiplexes packets over neighbor byte
//! streams. Radio discovery, permissions, the hosting process and the
//! application-facing message facade are all collaborators this crate
//! expects from its embedder, not things it implements itself.

pub mod buffer;
pub mod config;
pub mod device;
pub mod error;
pub mod framer;
pub mod identity;
pub mod internet;
pub mod io_controller;
pub mod network;
pub mod packet;
pub mod routing;

pub use config::MeshConfig;
pub use device::{ConnectorState, Device, Stream};
pub use error::CoreError;
pub use identity::Instance;
pub use network::{MeshCallbacks, NetworkController, Ticket};
pub use packet::{Packet, PacketType};
pub use routing::{Link, RoutingEvent, RoutingTable};
