//! Callbacks delivered upward to the host application: a single trait
//! with default no-op methods so a caller only overrides what it cares
//! about.

use crate::error::CoreError;
use crate::identity::Instance;
use crate::network::ticket::Ticket;

pub trait MeshCallbacks: Send + Sync {
    fn on_instance_found(&self, _instance: Instance) {}
    fn on_instance_lost(&self, _instance: Instance, _error: Option<CoreError>) {}

    fn on_message_received(&self, _data: Vec<u8>, _origin: Instance) {}
    fn on_sent(&self, _ticket: Ticket) {}
    fn on_send_failure(&self, _ticket: Ticket, _error: CoreError) {}
    fn on_acknowledgement(&self, _ticket: Ticket) {}

    fn on_internet_response(&self, _status_code: u8, _body: Vec<u8>) {}
    fn on_internet_request_failure(&self, _message: String) {}
}
