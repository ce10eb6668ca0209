//! Configuration for EepStore
//!
//! Device geometry and timing with defaults matching a 4 KB part
//! (24LC32-class): 32-byte pages, 5 ms write cycle.

use std::time::Duration;

use crate::error::{Result, StoreError};
use crate::table::DESCRIPTOR_SIZE;

/// Largest device the 16-bit on-device addresses can describe
pub const MAX_CAPACITY: u32 = 1 << 16;

/// Main configuration for a record store
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Device Geometry
    // -------------------------------------------------------------------------
    /// Byte capacity of the device
    /// Layout:
    ///   [0]                       record count
    ///   [1, directory_end)        descriptor slots
    ///   [directory_end, capacity) record payloads
    pub capacity: u32,

    /// Largest write the device accepts in one transaction; writes must not
    /// straddle a multiple of this value
    pub page_size: u32,

    // -------------------------------------------------------------------------
    // Directory
    // -------------------------------------------------------------------------
    /// Number of descriptor slots reserved at the front of the device
    pub max_records: usize,

    // -------------------------------------------------------------------------
    // Timing
    // -------------------------------------------------------------------------
    /// Pause required after a write transaction before the next one
    pub settle_delay: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            capacity: 4000,
            page_size: 32,
            max_records: 20,
            settle_delay: Duration::from_millis(5),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }

    /// First byte past the descriptor slots (count byte included)
    pub fn directory_end(&self) -> u32 {
        (self.max_records * DESCRIPTOR_SIZE) as u32 + 1
    }

    /// Check that the geometry describes a usable device
    pub fn validate(&self) -> Result<()> {
        if self.page_size == 0 {
            return Err(StoreError::Config("page size must be non-zero".to_string()));
        }

        if self.capacity > MAX_CAPACITY {
            return Err(StoreError::Config(format!(
                "capacity {} exceeds the 16-bit address space",
                self.capacity
            )));
        }

        // Count lives in a single byte
        if self.max_records > u8::MAX as usize {
            return Err(StoreError::Config(format!(
                "max_records {} does not fit the count byte",
                self.max_records
            )));
        }

        if self.directory_end() >= self.capacity {
            return Err(StoreError::Config(format!(
                "directory of {} records leaves no room on a {} byte device",
                self.max_records, self.capacity
            )));
        }

        Ok(())
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the device capacity (in bytes)
    pub fn capacity(mut self, bytes: u32) -> Self {
        self.config.capacity = bytes;
        self
    }

    /// Set the page size (in bytes)
    pub fn page_size(mut self, bytes: u32) -> Self {
        self.config.page_size = bytes;
        self
    }

    /// Set the number of directory slots
    pub fn max_records(mut self, count: usize) -> Self {
        self.config.max_records = count;
        self
    }

    /// Set the settle delay between write transactions
    pub fn settle_delay(mut self, delay: Duration) -> Self {
        self.config.settle_delay = delay;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
