//! End-to-end exercises of [`meshcore::NetworkController`] over in-memory
//! streams.

mod support;

use std::sync::Arc;
use std::time::Duration;

use meshcore::network::MeshCallbacks;
use meshcore::{CoreError, Instance, MeshConfig, NetworkController, Ticket};
use rand_core::OsRng;
use tokio::sync::mpsc;
use tokio::time::timeout;

#[derive(Debug)]
enum Event {
    InstanceFound(Instance),
    MessageReceived(Vec<u8>, Instance),
    Acknowledgement(Ticket),
    SendFailure(Ticket, String),
}

struct RecordingCallbacks(mpsc::UnboundedSender<Event>);

impl MeshCallbacks for RecordingCallbacks {
    fn on_instance_found(&self, instance: Instance) {
        let _ = self.0.send(Event::InstanceFound(instance));
    }
    fn on_message_received(&self, data: Vec<u8>, origin: Instance) {
        let _ = self.0.send(Event::MessageReceived(data, origin));
    }
    fn on_acknowledgement(&self, ticket: Ticket) {
        let _ = self.0.send(Event::Acknowledgement(ticket));
    }
    fn on_send_failure(&self, ticket: Ticket, error: CoreError) {
        let _ = self.0.send(Event::SendFailure(ticket, error.to_string()));
    }
}

struct NoopInternet;

#[async_trait::async_trait]
impl meshcore::internet::InternetExecutor for NoopInternet {
    async fn execute(&self, _request: meshcore::internet::InternetRequest) -> meshcore::internet::InternetOutcome {
        meshcore::internet::InternetOutcome::Failure("no internet in this test".to_string())
    }
}

async fn next_event(rx: &mut mpsc::UnboundedReceiver<Event>) -> Event {
    timeout(Duration::from_secs(2), rx.recv()).await.expect("timed out waiting for callback").expect("channel closed")
}

#[tokio::test]
async fn handshake_then_data_send_is_delivered_and_acknowledged() {
    let (device_a, device_b) = support::connected_pair("dev-a", "dev-b");

    let (events_a_tx, mut events_a_rx) = mpsc::unbounded_channel();
    let (events_b_tx, mut events_b_rx) = mpsc::unbounded_channel();

    let host_a = Instance::new_with_tag(*b"aaaa", OsRng);
    let host_b = Instance::new_with_tag(*b"bbbb", OsRng);

    let (controller_a, io_events_a) =
        NetworkController::new(host_a, MeshConfig::default(), Arc::new(RecordingCallbacks(events_a_tx)), Arc::new(NoopInternet));
    let (controller_b, io_events_b) =
        NetworkController::new(host_b, MeshConfig::default(), Arc::new(RecordingCallbacks(events_b_tx)), Arc::new(NoopInternet));

    tokio::spawn(controller_a.clone().run(io_events_a));
    tokio::spawn(controller_b.clone().run(io_events_b));

    controller_a.add_device(Arc::new(device_a)).await;
    controller_b.add_device(Arc::new(device_b)).await;

    // Handshake round trip: each side learns the other's instance; the
    // host itself is never among these events.
    let mut found_by_a = false;
    let mut found_by_b = false;
    while !(found_by_a && found_by_b) {
        tokio::select! {
            event = next_event(&mut events_a_rx) => if let Event::InstanceFound(instance) = event {
                assert_eq!(instance, host_b);
                found_by_a = true;
            },
            event = next_event(&mut events_b_rx) => if let Event::InstanceFound(instance) = event {
                assert_eq!(instance, host_a);
                found_by_b = true;
            },
        }
    }

    let ticket = controller_a.send(b"hello mesh".to_vec(), host_b).await;
    assert_eq!(ticket.destination, host_b);

    match next_event(&mut events_b_rx).await {
        Event::MessageReceived(data, origin) => {
            assert_eq!(data, b"hello mesh");
            assert_eq!(origin, host_a);
        }
        other => panic!("expected MessageReceived, got {other:?}"),
    }

    // Exactly one terminal event per ticket, and it's the ack, not a send
    // failure, since the direct link never drops a packet.
    match next_event(&mut events_a_rx).await {
        Event::Acknowledgement(acked) => assert_eq!(acked, ticket),
        other => panic!("expected Acknowledgement, got {other:?}"),
    }
}

#[tokio::test]
async fn data_and_acknowledgement_relay_through_an_intermediate_device() {
    // A -- B -- C: A and C have no direct link, so everything between
    // them must route through B with next_hop switching direction on the
    // way there and back.
    let (device_a, device_b_toward_a) = support::connected_pair("a-link", "b-link-to-a");
    let (device_b_toward_c, device_c) = support::connected_pair("b-link-to-c", "c-link");

    let (events_a_tx, mut events_a_rx) = mpsc::unbounded_channel();
    let (events_b_tx, mut events_b_rx) = mpsc::unbounded_channel();
    let (events_c_tx, mut events_c_rx) = mpsc::unbounded_channel();

    let host_a = Instance::new_with_tag(*b"aaaa", OsRng);
    let host_b = Instance::new_with_tag(*b"bbbb", OsRng);
    let host_c = Instance::new_with_tag(*b"cccc", OsRng);

    let (controller_a, io_events_a) =
        NetworkController::new(host_a, MeshConfig::default(), Arc::new(RecordingCallbacks(events_a_tx)), Arc::new(NoopInternet));
    let (controller_b, io_events_b) =
        NetworkController::new(host_b, MeshConfig::default(), Arc::new(RecordingCallbacks(events_b_tx)), Arc::new(NoopInternet));
    let (controller_c, io_events_c) =
        NetworkController::new(host_c, MeshConfig::default(), Arc::new(RecordingCallbacks(events_c_tx)), Arc::new(NoopInternet));

    tokio::spawn(controller_a.clone().run(io_events_a));
    tokio::spawn(controller_b.clone().run(io_events_b));
    tokio::spawn(controller_c.clone().run(io_events_c));

    controller_a.add_device(Arc::new(device_a)).await;
    controller_b.add_device(Arc::new(device_b_toward_a)).await;
    controller_b.add_device(Arc::new(device_b_toward_c)).await;
    controller_c.add_device(Arc::new(device_c)).await;

    // Wait until A has learned of C (and vice versa) through B's relayed
    // UPDATE, not just the direct handshakes.
    let mut a_knows_c = false;
    let mut c_knows_a = false;
    while !(a_knows_c && c_knows_a) {
        tokio::select! {
            event = next_event(&mut events_a_rx) => if let Event::InstanceFound(instance) = event {
                if instance == host_c {
                    a_knows_c = true;
                }
            },
            event = next_event(&mut events_b_rx) => { let _ = event; },
            event = next_event(&mut events_c_rx) => if let Event::InstanceFound(instance) = event {
                if instance == host_a {
                    c_knows_a = true;
                }
            },
        }
    }

    let ticket = controller_a.send(b"relay me".to_vec(), host_c).await;
    assert_eq!(ticket.destination, host_c);

    match next_event(&mut events_c_rx).await {
        Event::MessageReceived(data, origin) => {
            assert_eq!(data, b"relay me");
            assert_eq!(origin, host_a);
        }
        other => panic!("expected MessageReceived, got {other:?}"),
    }

    match next_event(&mut events_a_rx).await {
        Event::Acknowledgement(acked) => assert_eq!(acked, ticket),
        other => panic!("expected Acknowledgement, got {other:?}"),
    }
}

#[tokio::test]
async fn send_to_an_unknown_instance_fails_immediately() {
    let (events_tx, mut events_rx) = mpsc::unbounded_channel();
    let host = Instance::new_with_tag(*b"aaaa", OsRng);
    let (controller, io_events) =
        NetworkController::new(host, MeshConfig::default(), Arc::new(RecordingCallbacks(events_tx)), Arc::new(NoopInternet));
    tokio::spawn(controller.clone().run(io_events));

    let stranger = Instance::new_with_tag(*b"zzzz", OsRng);
    let ticket = controller.send(b"nobody home".to_vec(), stranger).await;

    match next_event(&mut events_rx).await {
        Event::SendFailure(failed, _message) => assert_eq!(failed, ticket),
        other => panic!("expected SendFailure, got {other:?}"),
    }
}
