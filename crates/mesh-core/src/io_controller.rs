//! I/O controller: pairs each neighbor device's input/output streams with
//! a [`framer`], drives the single-flight write rule, and posts decoded
//! packets back to whoever runs the main dispatch loop. Read and write
//! tasks run per device over the async [`crate::device::Stream`] trait,
//! exchanging packets over channels rather than callbacks.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::device::{Device, Stream};
use crate::error::CoreError;
use crate::framer::{InboundFramer, OutboundFramer};
use crate::packet::Packet;

/// Events the I/O controller posts to the main dispatch queue.
#[derive(Debug)]
pub enum InboundEvent {
    Packet { device_id: String, packet: Packet },
    StreamClosed { device_id: String, error: Option<CoreError> },
}

struct AttachedDevice {
    writer: mpsc::UnboundedSender<Packet>,
    read_task: JoinHandle<()>,
    write_task: JoinHandle<()>,
}

impl Drop for AttachedDevice {
    fn drop(&mut self) {
        self.read_task.abort();
        self.write_task.abort();
    }
}

/// Owns every attached device's read and write tasks. There is one
/// [`InboundFramer`] and one [`OutboundFramer`] per device, each driven by
/// its own task, so writes to distinct devices proceed independently
/// while a single device never has two writes in flight.
pub struct IoController {
    events: mpsc::UnboundedSender<InboundEvent>,
    devices: HashMap<String, AttachedDevice>,
}

impl IoController {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<InboundEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        (Self { events, devices: HashMap::new() }, rx)
    }

    /// Spawns the read and write tasks for a newly negotiated device.
    /// `mtu` must already be clipped via [`crate::config::MeshConfig::clipped_mtu`].
    pub fn attach(&mut self, device: Arc<Device>, mtu: usize) {
        let device_id = device.id.clone();

        let (writer, mut write_rx) = mpsc::unbounded_channel::<Packet>();

        let read_events = self.events.clone();
        let read_device = Arc::clone(&device);
        let read_device_id = device_id.clone();
        let read_task = tokio::spawn(async move {
            let mut inbound = InboundFramer::new();
            loop {
                match read_device.input.read().await {
                    Ok(chunk) if chunk.is_empty() => {
                        debug!("stream {read_device_id} closed by peer");
                        let _ = read_events.send(InboundEvent::StreamClosed {
                            device_id: read_device_id.clone(),
                            error: None,
                        });
                        break;
                    }
                    Ok(chunk) => match inbound.push(&chunk) {
                        Ok(packets) => {
                            for packet in packets {
                                let _ = read_events.send(InboundEvent::Packet {
                                    device_id: read_device_id.clone(),
                                    packet,
                                });
                            }
                        }
                        Err(err) => {
                            warn!("stream {read_device_id} protocol violation: {err}");
                            read_device.input.close(Some(err.clone())).await;
                            let _ = read_events.send(InboundEvent::StreamClosed {
                                device_id: read_device_id.clone(),
                                error: Some(err),
                            });
                            break;
                        }
                    },
                    Err(err) => {
                        let _ = read_events.send(InboundEvent::StreamClosed {
                            device_id: read_device_id.clone(),
                            error: Some(err),
                        });
                        break;
                    }
                }
            }
        });

        let write_events = self.events.clone();
        let write_device = Arc::clone(&device);
        let write_device_id = device_id.clone();
        let write_task = tokio::spawn(async move {
            let mut outbound = OutboundFramer::new(mtu);
            while let Some(packet) = write_rx.recv().await {
                if let Err(err) = outbound.enqueue(&packet) {
                    warn!("failed to encode outbound packet for {write_device_id}: {err}");
                    continue;
                }
                while let Some(slice) = outbound.next_slice() {
                    match write_device.output.write(&slice).await {
                        Ok(_) => {
                            outbound.on_written();
                        }
                        Err(err) => {
                            outbound.on_write_failure();
                            write_device.output.close(Some(err.clone())).await;
                            let _ = write_events.send(InboundEvent::StreamClosed {
                                device_id: write_device_id.clone(),
                                error: Some(err),
                            });
                            return;
                        }
                    }
                }
            }
        });

        self.devices.insert(device_id, AttachedDevice { writer, read_task, write_task });
    }

    /// Enqueues a packet for delivery on `device_id`'s output stream.
    /// Returns `StreamClosed` if the device is not (or no longer)
    /// attached.
    pub fn send(&self, device_id: &str, packet: Packet) -> Result<(), CoreError> {
        let attached = self.devices.get(device_id).ok_or(CoreError::StreamClosed)?;
        attached.writer.send(packet).map_err(|_| CoreError::StreamClosed)
    }

    /// Tears down a device's read/write tasks.
    pub fn detach(&mut self, device_id: &str) {
        self.devices.remove(device_id);
    }

    pub fn is_attached(&self, device_id: &str) -> bool {
        self.devices.contains_key(device_id)
    }
}
