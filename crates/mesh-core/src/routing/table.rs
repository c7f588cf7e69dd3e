//! Distance-vector routing table: hop-count metric with split-horizon
//! update fan-out.

use std::collections::HashMap;
use std::sync::Weak;

use crate::device::Device;
use crate::identity::Instance;
use crate::packet::HOP_COUNT_INFINITY;

use super::events::RoutingEvent;

/// One known path to a destination instance, via one neighbor device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Link {
    pub destination: Instance,
    pub next_hop: String,
    pub hop_count: u8,
}

/// Tracks every reachable destination instance and, for each, every
/// neighbor device that offers a path to it. The table never sends
/// packets itself; callers drain the [`RoutingEvent`]s each mutating
/// operation returns and act on them.
#[derive(Debug)]
pub struct RoutingTable {
    host: Instance,
    devices: HashMap<String, Weak<Device>>,
    links: HashMap<Instance, Vec<Link>>,
    internet_hops: HashMap<String, u8>,
}

impl RoutingTable {
    pub fn new(host: Instance) -> Self {
        Self { host, devices: HashMap::new(), links: HashMap::new(), internet_hops: HashMap::new() }
    }

    pub fn host(&self) -> Instance {
        self.host
    }

    /// Idempotent device registration.
    pub fn register(&mut self, device: Weak<Device>, device_id: impl Into<String>) {
        self.devices.insert(device_id.into(), device);
    }

    /// Best known link to `destination`, optionally excluding one next-hop
    /// device (split horizon). Ties break on lowest hop count, then
    /// lexicographically smallest device id.
    pub fn best_link(&self, destination: &Instance, split_horizon: Option<&str>) -> Option<&Link> {
        Self::best_of(self.links.get(destination), split_horizon)
    }

    fn best_of<'a>(links: Option<&'a Vec<Link>>, split_horizon: Option<&str>) -> Option<&'a Link> {
        links?
            .iter()
            .filter(|l| Some(l.next_hop.as_str()) != split_horizon)
            .min_by(|a, b| a.hop_count.cmp(&b.hop_count).then_with(|| a.next_hop.cmp(&b.next_hop)))
    }

    /// Learns of (or refreshes) a path to `instance` via `device_id` at
    /// `hop_count` hops. The host instance is never recorded as a
    /// destination.
    pub fn register_or_update(
        &mut self,
        device_id: &str,
        instance: Instance,
        hop_count: u8,
    ) -> Vec<RoutingEvent> {
        if instance == self.host {
            return Vec::new();
        }

        let mut events = Vec::new();
        let known_before = self.links.get(&instance).is_some_and(|v| !v.is_empty());
        let prev_best_overall = self.best_link(&instance, None).cloned();
        let prev_alt = prev_best_overall
            .as_ref()
            .and_then(|best| Self::best_of(self.links.get(&instance), Some(&best.next_hop)))
            .cloned();

        let entry = self.links.entry(instance).or_default();
        match entry.iter_mut().find(|l| l.next_hop == device_id) {
            Some(existing) => existing.hop_count = hop_count,
            None => entry.push(Link { destination: instance, next_hop: device_id.to_string(), hop_count }),
        }

        if !known_before {
            events.push(RoutingEvent::InstanceFound(instance));
        }

        let new_best_overall = self.best_link(&instance, None).cloned();
        if new_best_overall != prev_best_overall {
            if let Some(best) = new_best_overall.clone() {
                events.push(RoutingEvent::LinkUpdate(best));
            }
        }

        // Only the best device's split-horizon view needs refreshing, and
        // only if this registration actually changed what it looks like.
        if let Some(prev_best) = prev_best_overall {
            let new_alt = Self::best_of(self.links.get(&instance), Some(&prev_best.next_hop)).cloned();
            if new_alt != prev_alt {
                if let Some(alt) = new_alt {
                    events.push(RoutingEvent::SplitHorizonLinkUpdate {
                        best_device: prev_best.next_hop,
                        destination: instance,
                        hop_count: alt.hop_count,
                    });
                }
            }
        }

        events
    }

    /// Removes a device and every link routed through it.
    pub fn unregister(&mut self, device_id: &str) -> Vec<RoutingEvent> {
        self.devices.remove(device_id);
        self.internet_hops.remove(device_id);

        let mut events = Vec::new();
        let affected: Vec<Instance> = self
            .links
            .iter()
            .filter(|(_, links)| links.iter().any(|l| l.next_hop == device_id))
            .map(|(instance, _)| *instance)
            .collect();

        for instance in affected {
            let links = self.links.get_mut(&instance).expect("just collected as present");
            let was_best = Self::best_of(Some(links), None)
                .map(|l| l.next_hop == device_id)
                .unwrap_or(false);
            links.retain(|l| l.next_hop != device_id);

            if links.is_empty() {
                self.links.remove(&instance);
                events.push(RoutingEvent::InstanceLost(instance));
            } else if was_best {
                events.push(RoutingEvent::LinkUpdate(Link {
                    destination: instance,
                    next_hop: device_id.to_string(),
                    hop_count: HOP_COUNT_INFINITY,
                }));
            }
        }

        events
    }

    /// Records the Internet-reachability hop count most recently learned
    /// from `device_id`.
    pub fn update_internet_hops(&mut self, device_id: &str, hop_count: u8) {
        if hop_count >= HOP_COUNT_INFINITY {
            self.internet_hops.remove(device_id);
        } else {
            self.internet_hops.insert(device_id.to_string(), hop_count);
        }
    }

    /// Best neighbor for proxying an Internet request, optionally
    /// excluding one device (split horizon). Ties break lexicographically
    /// on device id, matching [`Self::best_link`].
    pub fn best_internet_link(&self, split_horizon: Option<&str>) -> Option<(String, u8)> {
        self.internet_hops
            .iter()
            .filter(|(id, _)| Some(id.as_str()) != split_horizon)
            .min_by(|(id_a, hops_a), (id_b, hops_b)| hops_a.cmp(hops_b).then_with(|| id_a.cmp(id_b)))
            .map(|(id, hops)| (id.clone(), *hops))
    }

    pub fn known_instances(&self) -> impl Iterator<Item = &Instance> {
        self.links.keys()
    }
}
