//! Packet data model. Pure data, no I/O — [`codec`] carries the
//! encode/decode logic that turns these into and out of bytes.

pub mod codec;

use crate::identity::Instance;

/// Wire protocol version. Every packet starts with this byte; a decoder
/// rejects anything else.
pub const PROTOCOL_VERSION: u8 = 0;

/// Routing poison value — "unreachable".
pub const HOP_COUNT_INFINITY: u8 = 255;

/// Reserved status code for a proxied Internet request that failed with no
/// usable HTTP response.
pub const CODE_IO_GENERIC_FAILURE: u8 = 0;

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
#[repr(u8)]
pub enum PacketType {
    Handshake = 0,
    Update = 1,
    Data = 2,
    Acknowledgement = 3,
    Internet = 4,
    InternetResponse = 5,
    InternetUpdate = 6,
}

impl PacketType {
    pub fn from_byte(byte: u8) -> Option<Self> {
        Some(match byte {
            0 => Self::Handshake,
            1 => Self::Update,
            2 => Self::Data,
            3 => Self::Acknowledgement,
            4 => Self::Internet,
            5 => Self::InternetResponse,
            6 => Self::InternetUpdate,
            _ => return None,
        })
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Packet {
    Handshake { sequence: u32, originator: Instance, internet_hops: u8 },
    Update { sequence: u32, destination: Instance, hop_count: u8 },
    Data { sequence: u32, origin: Instance, destination: Instance, payload: Vec<u8> },
    Acknowledgement { sequence: u32, destination: Instance, origin: Instance },
    Internet {
        sequence: u32,
        originator: Instance,
        hop_count: u8,
        test_id: u8,
        url: String,
        payload: Vec<u8>,
    },
    InternetResponse { sequence: u32, originator: Instance, status_code: u8, payload: Vec<u8> },
    InternetUpdate { sequence: u32, hop_count: u8, originator: Instance },
}

impl Packet {
    pub fn sequence(&self) -> u32 {
        match self {
            Packet::Handshake { sequence, .. }
            | Packet::Update { sequence, .. }
            | Packet::Data { sequence, .. }
            | Packet::Acknowledgement { sequence, .. }
            | Packet::Internet { sequence, .. }
            | Packet::InternetResponse { sequence, .. }
            | Packet::InternetUpdate { sequence, .. } => *sequence,
        }
    }

    pub fn packet_type(&self) -> PacketType {
        match self {
            Packet::Handshake { .. } => PacketType::Handshake,
            Packet::Update { .. } => PacketType::Update,
            Packet::Data { .. } => PacketType::Data,
            Packet::Acknowledgement { .. } => PacketType::Acknowledgement,
            Packet::Internet { .. } => PacketType::Internet,
            Packet::InternetResponse { .. } => PacketType::InternetResponse,
            Packet::InternetUpdate { .. } => PacketType::InternetUpdate,
        }
    }
}

impl core::fmt::Display for Packet {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "[{:?} seq={}]", self.packet_type(), self.sequence())
    }
}
