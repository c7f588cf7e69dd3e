use core::fmt;

use rand_core::{CryptoRngCore, RngCore};

use crate::error::CoreError;

/// Size in bytes of an [`Instance`] identifier.
pub const INSTANCE_SIZE: usize = 16;

/// A 16-byte opaque mesh identity. The first four bytes act as an
/// "application tag"; the remaining twelve are random. Equality and hash
/// are over the full 16 bytes.
#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Copy, Clone, Hash)]
pub struct Instance([u8; INSTANCE_SIZE]);

impl Instance {
    pub const fn new(bytes: [u8; INSTANCE_SIZE]) -> Self {
        Self(bytes)
    }

    pub const fn new_empty() -> Self {
        Self([0u8; INSTANCE_SIZE])
    }

    /// Builds a new random instance whose leading four bytes are the given
    /// application tag.
    pub fn new_with_tag<R: CryptoRngCore>(app_tag: [u8; 4], mut rng: R) -> Self {
        let mut bytes = [0u8; INSTANCE_SIZE];
        bytes[..4].copy_from_slice(&app_tag);
        rng.fill_bytes(&mut bytes[4..]);
        Self(bytes)
    }

    pub fn app_tag(&self) -> [u8; 4] {
        let mut tag = [0u8; 4];
        tag.copy_from_slice(&self.0[..4]);
        tag
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    pub fn as_bytes(&self) -> &[u8; INSTANCE_SIZE] {
        &self.0
    }

    pub fn from_slice(data: &[u8]) -> Result<Self, CoreError> {
        if data.len() != INSTANCE_SIZE {
            return Err(CoreError::Truncated);
        }
        let mut bytes = [0u8; INSTANCE_SIZE];
        bytes.copy_from_slice(data);
        Ok(Self(bytes))
    }
}

impl fmt::Display for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

/// Parses an `app_identifier` configuration value: an 8-character hex
/// string naming the 4-byte tag new instances are stamped with.
pub fn parse_app_identifier(value: &str) -> Result<[u8; 4], CoreError> {
    if value.len() != 8 {
        return Err(CoreError::InvalidConfig(format!(
            "app_identifier must be 8 hex characters, got {} characters",
            value.len()
        )));
    }

    let mut tag = [0u8; 4];
    for i in 0..4 {
        tag[i] = u8::from_str_radix(&value[i * 2..i * 2 + 2], 16)
            .map_err(|_| CoreError::InvalidConfig(format!("app_identifier is not hex: {value}")))?;
    }
    Ok(tag)
}
