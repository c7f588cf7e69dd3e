use crate::identity::Instance;

use super::table::Link;

/// Events the routing table emits upward so the network controller can
/// react. The table itself never sends packets — it only
/// reports what changed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoutingEvent {
    /// A destination instance became reachable for the first time.
    InstanceFound(Instance),
    /// The last link to a destination instance was removed.
    InstanceLost(Instance),
    /// The best link to a destination changed (new next hop, or a better
    /// hop count on the same next hop).
    LinkUpdate(Link),
    /// The link that used to be the best route to `destination` went
    /// through `best_device`; that device should be told about our best
    /// remaining alternative so it can route around us if needed.
    SplitHorizonLinkUpdate { best_device: String, destination: Instance, hop_count: u8 },
}
