//! Neighbor device model.
//!
//! The host application discovers neighbors and owns the underlying
//! transport; the core only ever holds a
//! [`std::sync::Weak`] handle so a device can be revoked out from under it
//! without the core needing to be told synchronously.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CoreError;

/// One neighbor's bidirectional byte stream, as seen by the mesh layer.
/// The mesh layer never knows or cares what transport backs this — BLE,
/// TCP, anything opaque and bidirectional qualifies.
#[async_trait]
pub trait Stream: Send + Sync {
    /// Locally-unique identifier of the stream's owning device.
    fn identifier(&self) -> &str;

    /// Hands `data` to the transport. Returns the number of bytes actually
    /// accepted; a caller that gets back less than `data.len()` is expected
    /// to retry the remainder once `write` completes again (in practice the
    /// framer never asks for more than one MTU-clipped slice at a time, so
    /// this is expected to be `data.len()` on success).
    async fn write(&self, data: &[u8]) -> Result<usize, CoreError>;

    /// Awaits and returns the next chunk of inbound bytes. An empty result
    /// signals the stream has been closed by the peer.
    async fn read(&self) -> Result<Vec<u8>, CoreError>;

    /// Tears the stream down, optionally carrying the error that caused it.
    async fn close(&self, err: Option<CoreError>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectorState {
    Connecting,
    Connected,
    Disconnected,
}

/// A neighbor reachable over one transport. Devices are identified by
/// `id` alone; routing-table and controller bookkeeping key everything off
/// that string.
pub struct Device {
    pub id: String,
    pub input: Arc<dyn Stream>,
    pub output: Arc<dyn Stream>,
    pub connector_state: ConnectorState,
    /// Negotiated MTU for this link, if the transport reported one. Falls
    /// back to `MeshConfig::default_mtu` when absent.
    pub mtu: Option<usize>,
}

impl Device {
    pub fn new(id: impl Into<String>, input: Arc<dyn Stream>, output: Arc<dyn Stream>) -> Self {
        Self { id: id.into(), input, output, connector_state: ConnectorState::Connecting, mtu: None }
    }
}

impl core::fmt::Debug for Device {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("connector_state", &self.connector_state)
            .field("mtu", &self.mtu)
            .finish()
    }
}
