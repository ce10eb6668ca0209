//! Record descriptors and their 8-byte slot encoding

use std::fmt;
use std::str::FromStr;
use std::sync::Weak;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use crate::error::{Result, StoreError};

/// Bytes in a record name
pub const NAME_SIZE: usize = 3;

/// Bytes in one directory slot
pub const DESCRIPTOR_SIZE: usize = 8;

/// Largest version number (7 bits)
pub const MAX_VERSION: u8 = 0x7F;

/// High bit of the stored version byte
const PROTECT_BIT: u8 = 0x80;

// =============================================================================
// Record Name
// =============================================================================

/// Fixed-width record identifier, compared byte for byte
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordName([u8; NAME_SIZE]);

impl RecordName {
    pub const fn new(bytes: [u8; NAME_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; NAME_SIZE] {
        &self.0
    }
}

impl TryFrom<&str> for RecordName {
    type Error = StoreError;

    fn try_from(name: &str) -> Result<Self> {
        let bytes: [u8; NAME_SIZE] = name
            .as_bytes()
            .try_into()
            .map_err(|_| StoreError::InvalidName(name.to_string()))?;
        Ok(Self(bytes))
    }
}

impl FromStr for RecordName {
    type Err = StoreError;

    fn from_str(name: &str) -> Result<Self> {
        Self::try_from(name)
    }
}

impl fmt::Display for RecordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &byte in &self.0 {
            if byte.is_ascii_graphic() || byte == b' ' {
                write!(f, "{}", byte as char)?;
            } else {
                write!(f, "\\x{:02x}", byte)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for RecordName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RecordName(\"{}\")", self)
    }
}

// =============================================================================
// Descriptor
// =============================================================================

/// Handle to a caller-owned buffer; never keeps the buffer alive
pub(crate) type Binding = Weak<Mutex<Box<[u8]>>>;

/// Metadata for one stored record
#[derive(Debug, Clone)]
pub struct RecordDescriptor {
    pub name: RecordName,
    /// 0..=127, bumped by the application when the record's shape changes
    pub version: u8,
    /// Survives cleanup even while unbound
    pub overwrite_protected: bool,
    /// Payload length on the device
    pub size: u16,
    /// Payload offset on the device
    pub address: u16,
    binding: Option<Binding>,
}

/// Slot image; bincode's fixed-int little-endian encoding of this struct
/// is exactly the 8-byte on-device layout
#[derive(Serialize, Deserialize)]
struct RawDescriptor {
    name: [u8; NAME_SIZE],
    version: u8,
    size: u16,
    address: u16,
}

impl RecordDescriptor {
    pub fn new(
        name: RecordName,
        version: u8,
        overwrite_protected: bool,
        size: u16,
        address: u16,
    ) -> Self {
        Self {
            name,
            version: version.min(MAX_VERSION),
            overwrite_protected,
            size,
            address,
            binding: None,
        }
    }

    /// One past the last payload byte
    pub fn end(&self) -> u32 {
        self.address as u32 + self.size as u32
    }

    /// Whether a caller buffer is currently attached and still alive
    pub fn is_bound(&self) -> bool {
        self.binding
            .as_ref()
            .is_some_and(|binding| binding.strong_count() > 0)
    }

    pub(crate) fn binding(&self) -> Option<&Binding> {
        self.binding.as_ref()
    }

    pub(crate) fn set_binding(&mut self, binding: Binding) {
        self.binding = Some(binding);
    }

    /// Version byte as stored: protect flag in bit 7
    pub fn packed_version(&self) -> u8 {
        (self.version & MAX_VERSION) | if self.overwrite_protected { PROTECT_BIT } else { 0 }
    }

    /// Encode into a directory slot
    pub fn encode(&self) -> Result<[u8; DESCRIPTOR_SIZE]> {
        let raw = RawDescriptor {
            name: *self.name.as_bytes(),
            version: self.packed_version(),
            size: self.size,
            address: self.address,
        };

        let mut slot = [0u8; DESCRIPTOR_SIZE];
        bincode::serialize_into(&mut slot[..], &raw)?;
        Ok(slot)
    }

    /// Decode a directory slot (unbound)
    pub fn decode(slot: &[u8]) -> Result<Self> {
        if slot.len() < DESCRIPTOR_SIZE {
            return Err(StoreError::CorruptDirectory(format!(
                "descriptor slot of {} bytes, expected {}",
                slot.len(),
                DESCRIPTOR_SIZE
            )));
        }

        let raw: RawDescriptor = bincode::deserialize(&slot[..DESCRIPTOR_SIZE])?;
        Ok(Self {
            name: RecordName(raw.name),
            version: raw.version & MAX_VERSION,
            overwrite_protected: raw.version & PROTECT_BIT != 0,
            size: raw.size,
            address: raw.address,
            binding: None,
        })
    }
}
