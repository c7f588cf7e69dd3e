//! Shared test fixtures: an in-memory duplex [`meshcore::device::Stream`]
//! so integration tests can wire two controllers together without real
//! sockets.

use std::sync::Arc;

use async_trait::async_trait;
use meshcore::device::Stream as MeshStream;
use meshcore::{CoreError, Device};
use tokio::sync::{mpsc, Mutex};

pub struct ChannelStream {
    id: String,
    rx: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    tx: mpsc::UnboundedSender<Vec<u8>>,
}

#[async_trait]
impl MeshStream for ChannelStream {
    fn identifier(&self) -> &str {
        &self.id
    }

    async fn write(&self, data: &[u8]) -> Result<usize, CoreError> {
        self.tx.send(data.to_vec()).map_err(|_| CoreError::StreamClosed)?;
        Ok(data.len())
    }

    async fn read(&self) -> Result<Vec<u8>, CoreError> {
        match self.rx.lock().await.recv().await {
            Some(bytes) => Ok(bytes),
            None => Ok(Vec::new()),
        }
    }

    async fn close(&self, _err: Option<CoreError>) {}
}

/// Two devices whose bytes flow directly to one another, as if joined by
/// a wire: writes on `a`'s stream arrive as reads on `b`'s, and vice
/// versa.
pub fn connected_pair(id_a: &str, id_b: &str) -> (Device, Device) {
    let (a_to_b_tx, a_to_b_rx) = mpsc::unbounded_channel();
    let (b_to_a_tx, b_to_a_rx) = mpsc::unbounded_channel();

    let a_stream = Arc::new(ChannelStream { id: id_a.to_string(), rx: Mutex::new(b_to_a_rx), tx: a_to_b_tx });
    let b_stream = Arc::new(ChannelStream { id: id_b.to_string(), rx: Mutex::new(a_to_b_rx), tx: b_to_a_tx });

    (Device::new(id_a, a_stream.clone(), a_stream), Device::new(id_b, b_stream.clone(), b_stream))
}
