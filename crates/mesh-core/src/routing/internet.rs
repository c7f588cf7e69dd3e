//! Internet-reachability bookkeeping lives on [`super::table::RoutingTable`]
//! directly (`update_internet_hops` / `best_internet_link`) — it is a
//! second, simpler metric over the same neighbor set, not a separate
//! table, so there is no standalone type here. This module exists so the
//! concept has a name to document against.

pub use super::table::RoutingTable;
