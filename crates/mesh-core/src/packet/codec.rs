//! Pure encode/decode of [`Packet`]s to and from byte strings.
//!
//! Every multi-byte integer is big-endian. A decoder is a per-variant
//! routine that first confirms the version+type prefix and then either
//! decodes the rest of the buffer or reports why it couldn't.

use std::io::{Read, Write};

use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;

use crate::buffer::{InputBuffer, OutputBuffer};
use crate::error::CoreError;
use crate::identity::{Instance, INSTANCE_SIZE};

use super::{Packet, PacketType, PROTOCOL_VERSION};

/// Three-way decode result: a complete packet with its
/// consumed byte count, "need more bytes" (framer waits), or "prefix
/// doesn't match any known decoder" (framer tries the next decoder / tears
/// the stream down once all have rejected).
#[derive(Debug, PartialEq)]
pub enum DecodeOutcome {
    Packet(Packet, usize),
    Incomplete,
    Reject,
}

const VERSION_TYPE_LEN: usize = 1 + 1; // version, type
const MAX_URL_LEN: usize = 255;

pub fn encode(packet: &Packet) -> Result<Vec<u8>, CoreError> {
    let mut out = OutputBuffer::with_capacity(64);
    out.write_byte(PROTOCOL_VERSION);
    out.write_byte(packet.packet_type() as u8);
    out.write_u32(packet.sequence());

    match packet {
        Packet::Handshake { originator, internet_hops, .. } => {
            out.write(originator.as_slice());
            out.write_byte(*internet_hops);
        }
        Packet::Update { destination, hop_count, .. } => {
            out.write(destination.as_slice());
            out.write_byte(*hop_count);
        }
        Packet::Data { origin, destination, payload, .. } => {
            out.write(origin.as_slice());
            out.write(destination.as_slice());
            out.write_u32(payload.len() as u32);
            out.write(payload);
        }
        Packet::Acknowledgement { destination, origin, .. } => {
            out.write(destination.as_slice());
            out.write(origin.as_slice());
        }
        Packet::Internet { originator, hop_count, test_id, url, payload, .. } => {
            if url.len() > MAX_URL_LEN {
                return Err(CoreError::InvalidConfig(format!(
                    "internet url too long: {} bytes (max {MAX_URL_LEN})",
                    url.len()
                )));
            }
            let compressed = deflate(payload)?;
            out.write(originator.as_slice());
            out.write_byte(*hop_count);
            out.write_byte(*test_id);
            out.write_byte(url.len() as u8);
            out.write(url.as_bytes());
            out.write_u32(compressed.len() as u32);
            out.write(&compressed);
        }
        Packet::InternetResponse { originator, status_code, payload, .. } => {
            out.write(originator.as_slice());
            out.write_byte(*status_code);
            out.write_u32(payload.len() as u32);
            out.write(payload);
        }
        Packet::InternetUpdate { hop_count, originator, .. } => {
            out.write_byte(*hop_count);
            out.write(originator.as_slice());
        }
    }

    Ok(out.into_vec())
}

/// Attempts to decode a single packet of any type from the front of
/// `bytes`. This is what the framer calls after every chunk arrives.
pub fn decode_any(bytes: &[u8]) -> DecodeOutcome {
    if bytes.len() < VERSION_TYPE_LEN {
        return DecodeOutcome::Reject;
    }

    if bytes[0] != PROTOCOL_VERSION {
        return DecodeOutcome::Reject;
    }

    let Some(packet_type) = PacketType::from_byte(bytes[1]) else {
        return DecodeOutcome::Reject;
    };

    let mut input = InputBuffer::new(bytes);
    let _version = input.read_byte().expect("length checked above");
    let _type = input.read_byte().expect("length checked above");
    let sequence = match input.read_u32() {
        Ok(sequence) => sequence,
        Err(CoreError::Truncated) => return DecodeOutcome::Incomplete,
        Err(_) => return DecodeOutcome::Reject,
    };

    let result = match packet_type {
        PacketType::Handshake => decode_handshake(sequence, &mut input),
        PacketType::Update => decode_update(sequence, &mut input),
        PacketType::Data => decode_data(sequence, &mut input),
        PacketType::Acknowledgement => decode_acknowledgement(sequence, &mut input),
        PacketType::Internet => decode_internet(sequence, &mut input),
        PacketType::InternetResponse => decode_internet_response(sequence, &mut input),
        PacketType::InternetUpdate => decode_internet_update(sequence, &mut input),
    };

    match result {
        Ok(packet) => DecodeOutcome::Packet(packet, input.offset()),
        Err(CoreError::Truncated) => DecodeOutcome::Incomplete,
        Err(_) => DecodeOutcome::Reject,
    }
}

/// Convenience wrapper for callers who decode a single known-complete
/// buffer directly (not through the framer's accumulation loop). Maps
/// "incomplete" and "reject" onto ordinary errors, distinguishing
/// framer-internal incompleteness from a surfaced protocol violation.
pub fn decode_packet(bytes: &[u8]) -> Result<(Packet, usize), CoreError> {
    match decode_any(bytes) {
        DecodeOutcome::Packet(packet, consumed) => Ok((packet, consumed)),
        DecodeOutcome::Incomplete => Err(CoreError::Truncated),
        DecodeOutcome::Reject => Err(CoreError::ProtocolViolation),
    }
}

fn read_instance(input: &mut InputBuffer) -> Result<Instance, CoreError> {
    let bytes: [u8; INSTANCE_SIZE] = input.read_array()?;
    Ok(Instance::new(bytes))
}

fn decode_handshake(sequence: u32, input: &mut InputBuffer) -> Result<Packet, CoreError> {
    let originator = read_instance(input)?;
    let internet_hops = input.read_byte()?;
    Ok(Packet::Handshake { sequence, originator, internet_hops })
}

fn decode_update(sequence: u32, input: &mut InputBuffer) -> Result<Packet, CoreError> {
    let destination = read_instance(input)?;
    let hop_count = input.read_byte()?;
    Ok(Packet::Update { sequence, destination, hop_count })
}

fn decode_data(sequence: u32, input: &mut InputBuffer) -> Result<Packet, CoreError> {
    let origin = read_instance(input)?;
    let destination = read_instance(input)?;
    let payload_len = input.read_u32()? as usize;
    let payload = input.read_slice(payload_len)?.to_vec();
    Ok(Packet::Data { sequence, origin, destination, payload })
}

fn decode_acknowledgement(sequence: u32, input: &mut InputBuffer) -> Result<Packet, CoreError> {
    let destination = read_instance(input)?;
    let origin = read_instance(input)?;
    Ok(Packet::Acknowledgement { sequence, destination, origin })
}

fn decode_internet(sequence: u32, input: &mut InputBuffer) -> Result<Packet, CoreError> {
    let originator = read_instance(input)?;
    let hop_count = input.read_byte()?;
    let test_id = input.read_byte()?;
    let url_len = input.read_byte()? as usize;
    let url_bytes = input.read_slice(url_len)?;
    let url = String::from_utf8(url_bytes.to_vec()).map_err(|_| CoreError::ProtocolViolation)?;
    let payload_len = input.read_u32()? as usize;
    let compressed = input.read_slice(payload_len)?;
    let payload = inflate(compressed)?;
    Ok(Packet::Internet { sequence, originator, hop_count, test_id, url, payload })
}

fn decode_internet_response(sequence: u32, input: &mut InputBuffer) -> Result<Packet, CoreError> {
    let originator = read_instance(input)?;
    let status_code = input.read_byte()?;
    let payload_len = input.read_u32()? as usize;
    let payload = input.read_slice(payload_len)?.to_vec();
    Ok(Packet::InternetResponse { sequence, originator, status_code, payload })
}

fn decode_internet_update(sequence: u32, input: &mut InputBuffer) -> Result<Packet, CoreError> {
    let hop_count = input.read_byte()?;
    let originator = read_instance(input)?;
    Ok(Packet::InternetUpdate { sequence, hop_count, originator })
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(|_| CoreError::OutOfMemory)?;
    encoder.finish().map_err(|_| CoreError::OutOfMemory)
}

fn inflate(data: &[u8]) -> Result<Vec<u8>, CoreError> {
    let mut decoder = ZlibDecoder::new(data);
    let mut out = Vec::new();
    decoder.read_to_end(&mut out).map_err(|_| CoreError::ProtocolViolation)?;
    Ok(out)
}
