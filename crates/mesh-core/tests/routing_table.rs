//! Routing-table behavior exercised through the public API rather than
//! `table.rs`'s own unit tests.

use meshcore::routing::RoutingEvent;
use meshcore::{Instance, Link, RoutingTable};

fn inst(tag: u8) -> Instance {
    Instance::new([tag; 16])
}

#[test]
fn losing_the_sole_neighbor_to_two_destinations_loses_both() {
    // A has links {C via B (hops=2), D via B (hops=3)}; B disconnects.
    let host_a = inst(0xA);
    let c = inst(0xC);
    let d = inst(0xD);

    let mut table = RoutingTable::new(host_a);
    table.register_or_update("dev-b", c, 2);
    table.register_or_update("dev-b", d, 3);

    let events = table.unregister("dev-b");

    assert_eq!(events, vec![RoutingEvent::InstanceLost(c), RoutingEvent::InstanceLost(d)]);
    assert!(table.best_link(&c, None).is_none());
    assert!(table.best_link(&d, None).is_none());
}

#[test]
fn best_link_never_returns_the_split_horizon_device() {
    // P1: best_link(instance, d) never returns a link with next_hop == d.
    let mut table = RoutingTable::new(inst(0));
    table.register_or_update("dev-only", inst(1), 1);

    assert!(table.best_link(&inst(1), Some("dev-only")).is_none());
}

#[test]
fn unregister_leaves_no_link_referencing_the_removed_device() {
    // P2: after register_or_update then unregister(device), no link
    // references that device.
    let mut table = RoutingTable::new(inst(0));
    table.register_or_update("dev-b", inst(1), 1);
    table.register_or_update("dev-c", inst(1), 5);

    table.unregister("dev-b");

    assert!(table.best_link(&inst(1), None).map(|l| l.next_hop.as_str()) != Some("dev-b"));
}

#[test]
fn host_instance_never_appears_as_a_link_destination() {
    // P6, I1.
    let host = inst(0);
    let mut table = RoutingTable::new(host);
    table.register_or_update("dev-b", host, 1);

    assert!(table.known_instances().all(|instance| *instance != host));
}

#[test]
fn split_horizon_update_notifies_the_previously_primary_neighbor_of_the_fallback() {
    let mut table = RoutingTable::new(inst(0));
    // dev-b is the sole, best route at first.
    let events = table.register_or_update("dev-b", inst(1), 1);
    assert!(events.iter().any(|e| matches!(e, RoutingEvent::LinkUpdate(Link { next_hop, .. }) if next_hop == "dev-b")));

    // dev-c now offers an alternate (worse) route; dev-b should be told
    // about it as our fallback in case dev-b's own route to us changes.
    let events = table.register_or_update("dev-c", inst(1), 4);
    assert!(events.iter().any(|e| matches!(
        e,
        RoutingEvent::SplitHorizonLinkUpdate { best_device, destination, hop_count }
            if best_device == "dev-b" && *destination == inst(1) && *hop_count == 4
    )));
}
