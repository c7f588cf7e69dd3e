//! Network controller: the state machine over neighbors, the sequence
//! generator, split-horizon update fan-out and Internet-hop propagation,
//! and the Internet-request entry points.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::{mpsc, Mutex};

use crate::config::MeshConfig;
use crate::device::Device;
use crate::error::CoreError;
use crate::identity::Instance;
use crate::internet::{InternetExecutor, InternetOutcome, InternetRequest};
use crate::io_controller::{InboundEvent, IoController};
use crate::packet::{Packet, CODE_IO_GENERIC_FAILURE, HOP_COUNT_INFINITY};
use crate::routing::{RoutingEvent, RoutingTable};

use super::callbacks::MeshCallbacks;
use super::state::{DeviceEvent, DeviceState, NeighborState};
use super::ticket::{SequenceGenerator, Ticket};

/// Drives every neighbor through its state diagram, owns the routing
/// table and the I/O controller, and is the single place packets enter
/// or leave the mesh. All the async
/// methods here are meant to be called from that one logical queue —
/// nothing re-enters itself while holding a lock.
pub struct NetworkController {
    host: Instance,
    config: MeshConfig,
    callbacks: Arc<dyn MeshCallbacks>,
    internet: Arc<dyn InternetExecutor>,
    routing: Mutex<RoutingTable>,
    io: Mutex<IoController>,
    neighbors: Mutex<HashMap<String, NeighborState>>,
    sequence: Mutex<SequenceGenerator>,
    direct_uplink: AtomicBool,
    probe_done: AtomicBool,
    published_initial_ihops: AtomicBool,
}

impl NetworkController {
    pub fn new(
        host: Instance,
        config: MeshConfig,
        callbacks: Arc<dyn MeshCallbacks>,
        internet: Arc<dyn InternetExecutor>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<InboundEvent>) {
        let (io, events_rx) = IoController::new();
        let controller = Arc::new(Self {
            host,
            routing: Mutex::new(RoutingTable::new(host)),
            io: Mutex::new(io),
            neighbors: Mutex::new(HashMap::new()),
            sequence: Mutex::new(SequenceGenerator::new()),
            direct_uplink: AtomicBool::new(false),
            probe_done: AtomicBool::new(false),
            published_initial_ihops: AtomicBool::new(false),
            config,
            callbacks,
            internet,
        });
        (controller, events_rx)
    }

    /// Drains inbound I/O events. Intended to run as its own task for the
    /// lifetime of the controller.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<InboundEvent>) {
        while let Some(event) = events.recv().await {
            match event {
                InboundEvent::Packet { device_id, packet } => self.handle_packet(&device_id, packet).await,
                InboundEvent::StreamClosed { device_id, error } => {
                    self.handle_stream_closed(&device_id, error).await
                }
            }
        }
    }

    /// Registers a newly discovered neighbor and immediately drives it
    /// through `add_device` and `streams_open` — the host never sees a
    /// device whose streams are not yet open.
    pub async fn add_device(&self, device: Arc<Device>) {
        let device_id = device.id.clone();
        let mtu = self.config.clipped_mtu(device.mtu.unwrap_or(self.config.default_mtu));

        {
            let mut routing = self.routing.lock().await;
            routing.register(Arc::downgrade(&device), device_id.clone());
        }
        {
            let mut neighbors = self.neighbors.lock().await;
            let mut state = NeighborState::new(device_id.clone(), mtu);
            state.state = state.state.advance(DeviceEvent::AddDevice).unwrap_or(DeviceState::Registered);
            neighbors.insert(device_id.clone(), state);
        }
        {
            let mut io = self.io.lock().await;
            io.attach(device, mtu);
        }
        self.streams_open(&device_id).await;
    }

    async fn streams_open(&self, device_id: &str) {
        {
            let mut neighbors = self.neighbors.lock().await;
            if let Some(n) = neighbors.get_mut(device_id) {
                if let Some(next) = n.state.advance(DeviceEvent::StreamsOpen) {
                    n.state = next;
                }
            }
        }

        let i_hops = self.compute_internet_hops().await;
        self.record_sent_ihops(device_id, i_hops).await;

        let sequence = self.next_sequence().await;
        let packet = Packet::Handshake { sequence, originator: self.host, internet_hops: i_hops };
        if let Err(err) = self.send_packet(device_id, packet).await {
            warn!("failed to send handshake to {device_id}: {err}");
        }
    }

    async fn handle_packet(&self, device_id: &str, packet: Packet) {
        match packet {
            Packet::Handshake { originator, internet_hops, .. } => {
                self.on_handshake(device_id, originator, internet_hops).await
            }
            Packet::Update { destination, hop_count, .. } => {
                self.on_update(device_id, destination, hop_count).await
            }
            Packet::Data { sequence, origin, destination, payload } => {
                self.on_data(device_id, sequence, origin, destination, payload).await
            }
            Packet::Acknowledgement { sequence, destination, origin } => {
                self.on_acknowledgement(device_id, sequence, destination, origin).await
            }
            Packet::Internet { sequence, originator, hop_count, test_id, url, payload } => {
                self.on_internet(device_id, sequence, originator, hop_count, test_id, url, payload).await
            }
            Packet::InternetResponse { sequence, originator, status_code, payload } => {
                self.on_internet_response_packet(device_id, sequence, originator, status_code, payload).await
            }
            Packet::InternetUpdate { hop_count, .. } => self.on_internet_update(device_id, hop_count).await,
        }
    }

    async fn on_handshake(&self, device_id: &str, peer_instance: Instance, peer_ihops: u8) {
        {
            let mut neighbors = self.neighbors.lock().await;
            if let Some(n) = neighbors.get_mut(device_id) {
                n.instance = Some(peer_instance);
                if let Some(next) = n.state.advance(DeviceEvent::PeerHandshakeReceived) {
                    n.state = next;
                }
            }
        }

        let events = {
            let mut routing = self.routing.lock().await;
            routing.register_or_update(device_id, peer_instance, 1)
        };
        self.apply_routing_events(events, None).await;

        {
            let mut routing = self.routing.lock().await;
            routing.update_internet_hops(device_id, peer_ihops);
        }
        self.maybe_republish_internet_hops().await;

        self.dump_routing_table(device_id).await;
    }

    /// Tells a freshly negotiated neighbor about every destination we
    /// already know how to reach, split-horizoned against it.
    async fn dump_routing_table(&self, device_id: &str) {
        let instances: Vec<Instance> = {
            let routing = self.routing.lock().await;
            routing.known_instances().copied().collect()
        };

        for instance in instances {
            if instance == self.host {
                continue;
            }
            let best = {
                let routing = self.routing.lock().await;
                routing.best_link(&instance, Some(device_id)).cloned()
            };
            if let Some(link) = best {
                let hop_count = link.hop_count.saturating_add(1);
                if hop_count < self.config.maximum_hop_count {
                    let sequence = self.next_sequence().await;
                    let _ = self
                        .send_packet(device_id, Packet::Update { sequence, destination: instance, hop_count })
                        .await;
                }
            }
        }
    }

    async fn on_update(&self, device_id: &str, destination: Instance, hop_count: u8) {
        let events = {
            let mut routing = self.routing.lock().await;
            routing.register_or_update(device_id, destination, hop_count)
        };
        self.apply_routing_events(events, None).await;
    }

    async fn apply_routing_events(&self, events: Vec<RoutingEvent>, lost_error: Option<CoreError>) {
        for event in events {
            match event {
                RoutingEvent::InstanceFound(instance) => self.callbacks.on_instance_found(instance),
                RoutingEvent::InstanceLost(instance) => {
                    self.callbacks.on_instance_lost(instance, lost_error.clone());
                    self.broadcast_update(instance, HOP_COUNT_INFINITY, None).await;
                }
                RoutingEvent::LinkUpdate(link) => {
                    let propagate = if link.hop_count >= HOP_COUNT_INFINITY {
                        HOP_COUNT_INFINITY
                    } else {
                        link.hop_count.saturating_add(1).min(HOP_COUNT_INFINITY)
                    };
                    self.broadcast_update(link.destination, propagate, Some(&link.next_hop)).await;
                }
                RoutingEvent::SplitHorizonLinkUpdate { best_device, destination, hop_count } => {
                    let propagate = hop_count.saturating_add(1).min(HOP_COUNT_INFINITY);
                    if propagate < self.config.maximum_hop_count {
                        let sequence = self.next_sequence().await;
                        let _ = self
                            .send_packet(&best_device, Packet::Update { sequence, destination, hop_count: propagate })
                            .await;
                    }
                }
            }
        }
    }

    /// UPDATE fan-out. Poison (`hop_count == HOP_COUNT_INFINITY`) always
    /// goes out; a growing hop count is suppressed once it would reach
    /// `MAXIMUM_HOP_COUNT`.
    async fn broadcast_update(&self, destination: Instance, hop_count: u8, split_horizon: Option<&str>) {
        if hop_count < HOP_COUNT_INFINITY && hop_count >= self.config.maximum_hop_count {
            debug!("suppressing update for {destination} at hop_count={hop_count}");
            return;
        }

        let device_ids: Vec<String> = {
            let neighbors = self.neighbors.lock().await;
            neighbors
                .values()
                .filter(|n| n.state == DeviceState::Negotiated)
                .filter(|n| Some(n.device_id.as_str()) != split_horizon)
                .map(|n| n.device_id.clone())
                .collect()
        };

        for device_id in device_ids {
            let sequence = self.next_sequence().await;
            let _ = self.send_packet(&device_id, Packet::Update { sequence, destination, hop_count }).await;
        }
    }

    async fn on_data(&self, device_id: &str, sequence: u32, origin: Instance, destination: Instance, payload: Vec<u8>) {
        if destination == self.host {
            self.callbacks.on_message_received(payload, origin);
            let ack = Packet::Acknowledgement { sequence, destination: origin, origin: self.host };
            let _ = self.route_towards(origin, ack, Some(device_id)).await;
        } else {
            let packet = Packet::Data { sequence, origin, destination, payload };
            let _ = self.route_towards(destination, packet, Some(device_id)).await;
        }
    }

    async fn on_acknowledgement(&self, device_id: &str, sequence: u32, destination: Instance, origin: Instance) {
        if destination == self.host {
            self.callbacks.on_acknowledgement(Ticket { sequence, destination: origin });
        } else {
            let packet = Packet::Acknowledgement { sequence, destination, origin };
            let _ = self.route_towards(destination, packet, Some(device_id)).await;
        }
    }

    /// Sends application data toward `destination`, returning a [`Ticket`]
    /// that later correlates an `on_sent`/`on_send_failure`/
    /// `on_acknowledgement` callback.
    pub async fn send(&self, data: Vec<u8>, destination: Instance) -> Ticket {
        let sequence = self.next_sequence().await;
        let ticket = Ticket { sequence, destination };
        let packet = Packet::Data { sequence, origin: self.host, destination, payload: data };
        match self.route_towards(destination, packet, None).await {
            Ok(()) => self.callbacks.on_sent(ticket),
            Err(err) => self.callbacks.on_send_failure(ticket, err),
        }
        ticket
    }

    /// Forwards `packet` toward `destination`, preferring a next hop other
    /// than `split_horizon` (the device a relayed packet arrived on) but
    /// falling back to it when it is the only known route — otherwise two
    /// directly-connected peers could never acknowledge one another.
    async fn route_towards(&self, destination: Instance, packet: Packet, split_horizon: Option<&str>) -> Result<(), CoreError> {
        let next_hop = {
            let routing = self.routing.lock().await;
            routing
                .best_link(&destination, split_horizon)
                .or_else(|| routing.best_link(&destination, None))
                .map(|l| l.next_hop.clone())
        };
        match next_hop {
            Some(device_id) => self.send_packet(&device_id, packet).await,
            None => Err(CoreError::UnreachableDestination(destination)),
        }
    }

    /// Issues (or proxies) an Internet request on behalf of the local host.
    pub async fn send_internet(&self, url: String, data: Vec<u8>, test_id: u8) {
        let sequence = self.next_sequence().await;
        let request = InternetRequest {
            originator: self.host,
            sequence,
            url: url.clone(),
            data: data.clone(),
            test_id,
            hop_count: 0,
        };

        match self.internet.execute(request).await {
            InternetOutcome::Response { status_code, body } => {
                self.callbacks.on_internet_response(status_code, body)
            }
            InternetOutcome::Failure(message) => {
                let fallback = {
                    let routing = self.routing.lock().await;
                    routing.best_internet_link(None)
                };
                let forwarded = match fallback {
                    Some((device_id, hops)) if hops < self.config.maximum_hop_count => {
                        let packet = Packet::Internet { sequence, originator: self.host, hop_count: 0, test_id, url, payload: data };
                        self.send_packet(&device_id, packet).await.is_ok()
                    }
                    _ => false,
                };
                if !forwarded {
                    self.callbacks.on_internet_request_failure(message);
                }
            }
        }
    }

    async fn on_internet(
        &self,
        device_id: &str,
        sequence: u32,
        originator: Instance,
        hop_count: u8,
        test_id: u8,
        url: String,
        payload: Vec<u8>,
    ) {
        let request = InternetRequest {
            originator,
            sequence,
            url: url.clone(),
            data: payload.clone(),
            test_id,
            hop_count: hop_count.saturating_add(1),
        };

        match self.internet.execute(request).await {
            InternetOutcome::Response { status_code, body } => {
                let packet = Packet::InternetResponse { sequence, originator, status_code, payload: body };
                let _ = self.route_towards(originator, packet, Some(device_id)).await;
            }
            InternetOutcome::Failure(_message) => {
                let next_hop_count = hop_count.saturating_add(1);
                let fallback = {
                    let routing = self.routing.lock().await;
                    routing.best_internet_link(Some(device_id))
                };
                let forwarded = match fallback {
                    Some((next_device, hops))
                        if next_hop_count < self.config.maximum_hop_count && hops < self.config.maximum_hop_count =>
                    {
                        let packet = Packet::Internet { sequence, originator, hop_count: next_hop_count, test_id, url, payload };
                        self.send_packet(&next_device, packet).await.is_ok()
                    }
                    _ => false,
                };
                if !forwarded {
                    let packet = Packet::InternetResponse {
                        sequence,
                        originator,
                        status_code: CODE_IO_GENERIC_FAILURE,
                        payload: Vec::new(),
                    };
                    let _ = self.route_towards(originator, packet, Some(device_id)).await;
                }
            }
        }
    }

    async fn on_internet_response_packet(
        &self,
        device_id: &str,
        sequence: u32,
        originator: Instance,
        status_code: u8,
        payload: Vec<u8>,
    ) {
        if originator == self.host {
            self.callbacks.on_internet_response(status_code, payload);
        } else {
            let packet = Packet::InternetResponse { sequence, originator, status_code, payload };
            let _ = self.route_towards(originator, packet, Some(device_id)).await;
        }
    }

    async fn on_internet_update(&self, device_id: &str, hop_count: u8) {
        {
            let mut routing = self.routing.lock().await;
            routing.update_internet_hops(device_id, hop_count);
        }
        if !self.direct_uplink.load(Ordering::SeqCst) {
            self.maybe_republish_internet_hops().await;
        }
    }

    /// Reports a direct-uplink probe result. The first call unconditionally
    /// republishes i-hops and marks the probe complete; later calls only
    /// republish when reachability actually flips. No i-hops propagate
    /// before the first probe completes.
    pub async fn set_internet_available(&self, available: bool) {
        let previous = self.direct_uplink.swap(available, Ordering::SeqCst);
        let first_probe = !self.probe_done.swap(true, Ordering::SeqCst);
        if first_probe || previous != available {
            self.republish_internet_hops().await;
        }
    }

    async fn compute_internet_hops(&self) -> u8 {
        if self.direct_uplink.load(Ordering::SeqCst) {
            return 1;
        }
        let best = {
            let routing = self.routing.lock().await;
            routing.best_internet_link(None)
        };
        match best {
            Some((_, hops)) => hops.saturating_add(1).min(HOP_COUNT_INFINITY),
            None => HOP_COUNT_INFINITY,
        }
    }

    async fn maybe_republish_internet_hops(&self) {
        if self.probe_done.load(Ordering::SeqCst) {
            self.republish_internet_hops().await;
        }
    }

    /// Internet-hop-count fan-out. Our chosen uplink neighbor hears our
    /// second-best i-hops (our fallback); everyone else hears our real
    /// i-hops.
    /// Suppressed per-device when unchanged from the last value sent.
    async fn republish_internet_hops(&self) {
        let i_hops = self.compute_internet_hops().await;
        let uplink_device = if self.direct_uplink.load(Ordering::SeqCst) {
            None
        } else {
            let routing = self.routing.lock().await;
            routing.best_internet_link(None).map(|(device_id, _)| device_id)
        };
        let second_best = match &uplink_device {
            Some(primary) => {
                let routing = self.routing.lock().await;
                routing.best_internet_link(Some(primary))
            }
            None => None,
        };

        let device_ids: Vec<String> = {
            let neighbors = self.neighbors.lock().await;
            neighbors
                .values()
                .filter(|n| n.state == DeviceState::Negotiated)
                .map(|n| n.device_id.clone())
                .collect()
        };

        for device_id in device_ids {
            let value = if Some(&device_id) == uplink_device.as_ref() {
                second_best.map(|(_, hops)| hops.saturating_add(1).min(HOP_COUNT_INFINITY)).unwrap_or(HOP_COUNT_INFINITY)
            } else {
                i_hops
            };
            self.send_internet_update_if_changed(&device_id, value).await;
        }

        self.published_initial_ihops.store(true, Ordering::SeqCst);
    }

    async fn send_internet_update_if_changed(&self, device_id: &str, value: u8) {
        let changed = {
            let mut neighbors = self.neighbors.lock().await;
            match neighbors.get_mut(device_id) {
                Some(n) if n.sent_ihops == Some(value) => false,
                Some(n) => {
                    n.sent_ihops = Some(value);
                    true
                }
                None => false,
            }
        };
        if !changed {
            return;
        }
        let sequence = self.next_sequence().await;
        let packet = Packet::InternetUpdate { sequence, hop_count: value, originator: self.host };
        let _ = self.send_packet(device_id, packet).await;
    }

    async fn record_sent_ihops(&self, device_id: &str, value: u8) {
        let mut neighbors = self.neighbors.lock().await;
        if let Some(n) = neighbors.get_mut(device_id) {
            n.sent_ihops = Some(value);
        }
    }

    async fn handle_stream_closed(&self, device_id: &str, error: Option<CoreError>) {
        {
            let mut neighbors = self.neighbors.lock().await;
            neighbors.remove(device_id);
        }
        {
            let mut io = self.io.lock().await;
            io.detach(device_id);
        }
        let events = {
            let mut routing = self.routing.lock().await;
            routing.unregister(device_id)
        };
        self.apply_routing_events(events, error).await;
    }

    async fn next_sequence(&self) -> u32 {
        self.sequence.lock().await.next_sequence()
    }

    async fn send_packet(&self, device_id: &str, packet: Packet) -> Result<(), CoreError> {
        let io = self.io.lock().await;
        io.send(device_id, packet)
    }
}
