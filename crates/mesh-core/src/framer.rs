//! Per-stream framing, built around this crate's three-way
//! [`DecodeOutcome`] instead of a single fallible parse.

use crate::error::CoreError;
use crate::packet::codec::{decode_any, encode, DecodeOutcome};
use crate::packet::Packet;

/// Accumulates inbound bytes for one neighbor stream and peels off
/// complete packets as they become decodable.
#[derive(Debug, Default)]
pub struct InboundFramer {
    buffer: Vec<u8>,
}

impl InboundFramer {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// Appends a freshly-read chunk and decodes every packet it completes.
    /// A prefix that matches no decoder is a protocol violation — the
    /// caller must tear the stream down.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<Packet>, CoreError> {
        self.buffer.extend_from_slice(chunk);

        let mut packets = Vec::new();
        loop {
            match decode_any(&self.buffer) {
                DecodeOutcome::Packet(packet, consumed) => {
                    self.buffer.drain(..consumed);
                    packets.push(packet);
                }
                DecodeOutcome::Incomplete => break,
                DecodeOutcome::Reject => return Err(CoreError::ProtocolViolation),
            }
        }
        Ok(packets)
    }
}

/// Per-stream outbound byte buffer with MTU clipping and the single-flight
/// write rule. Owns no transport handle; the I/O controller drives
/// it by calling [`Self::next_slice`] whenever the transport reports
/// space available, and [`Self::on_written`] / [`Self::on_write_failure`]
/// when that write settles.
#[derive(Debug)]
pub struct OutboundFramer {
    buffer: Vec<u8>,
    mtu: usize,
    in_flight: bool,
}

impl OutboundFramer {
    /// `mtu` must already be clipped via [`crate::config::MeshConfig::clipped_mtu`].
    pub fn new(mtu: usize) -> Self {
        Self { buffer: Vec::new(), mtu, in_flight: false }
    }

    pub fn enqueue(&mut self, packet: &Packet) -> Result<(), CoreError> {
        let bytes = encode(packet)?;
        self.buffer.extend(bytes);
        Ok(())
    }

    /// Returns the next MTU-clipped slice to hand to the transport, or
    /// `None` if a write is already in flight or there is nothing queued.
    pub fn next_slice(&mut self) -> Option<Vec<u8>> {
        if self.in_flight || self.buffer.is_empty() {
            return None;
        }
        let take = self.mtu.min(self.buffer.len());
        let slice = self.buffer.drain(..take).collect();
        self.in_flight = true;
        Some(slice)
    }

    /// The in-flight write completed. Returns `true` if the buffer is now
    /// empty, so the caller can notify upper callbacks.
    pub fn on_written(&mut self) -> bool {
        self.in_flight = false;
        self.buffer.is_empty()
    }

    /// The in-flight write failed: drop whatever remained buffered and
    /// release the in-flight slot. The
    /// caller is still responsible for tearing the stream down.
    pub fn on_write_failure(&mut self) {
        self.buffer.clear();
        self.in_flight = false;
    }

    pub fn is_idle(&self) -> bool {
        self.buffer.is_empty() && !self.in_flight
    }

    pub fn has_in_flight_write(&self) -> bool {
        self.in_flight
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Instance;

    fn handshake() -> Packet {
        Packet::Handshake { sequence: 1, originator: Instance::new([1; 16]), internet_hops: 3 }
    }

    #[test]
    fn inbound_framer_yields_multiple_packets_from_one_chunk() {
        let mut framer = InboundFramer::new();
        let mut bytes = encode(&handshake()).unwrap();
        bytes.extend(encode(&handshake()).unwrap());
        let packets = framer.push(&bytes).unwrap();
        assert_eq!(packets.len(), 2);
    }

    #[test]
    fn inbound_framer_waits_on_a_partial_packet() {
        let mut framer = InboundFramer::new();
        let bytes = encode(&handshake()).unwrap();
        let packets = framer.push(&bytes[..bytes.len() - 1]).unwrap();
        assert!(packets.is_empty());
        let packets = framer.push(&bytes[bytes.len() - 1..]).unwrap();
        assert_eq!(packets.len(), 1);
    }

    #[test]
    fn inbound_framer_rejects_an_unrecognized_prefix() {
        let mut framer = InboundFramer::new();
        let err = framer.push(&[0xFF; 8]).unwrap_err();
        assert!(matches!(err, CoreError::ProtocolViolation));
    }

    #[test]
    fn outbound_framer_clips_slices_to_the_negotiated_mtu() {
        let clipped_mtu = 99; // floor(0.99 * 100), per MeshConfig::clipped_mtu
        let mut framer = OutboundFramer::new(clipped_mtu);
        framer
            .enqueue(&Packet::Data {
                sequence: 1,
                origin: Instance::new([1; 16]),
                destination: Instance::new([2; 16]),
                payload: vec![0u8; 200],
            })
            .unwrap();
        let first = framer.next_slice().unwrap();
        assert_eq!(first.len(), 99);
    }

    #[test]
    fn outbound_framer_enforces_single_flight_write() {
        let mut framer = OutboundFramer::new(1024);
        framer.enqueue(&handshake()).unwrap();
        assert!(framer.next_slice().is_some());
        assert!(framer.next_slice().is_none(), "a second write must not start before the first settles");
        assert!(framer.on_written());
    }

    #[test]
    fn write_failure_drops_remaining_buffer() {
        let mut framer = OutboundFramer::new(4);
        framer.enqueue(&handshake()).unwrap();
        framer.next_slice().unwrap();
        framer.on_write_failure();
        assert!(framer.is_idle());
    }
}
