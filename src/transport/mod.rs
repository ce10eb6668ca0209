//! Transport Module
//!
//! The byte-level contract the store drives, plus two reference devices.
//!
//! ## Responsibilities
//! - Read N bytes starting at a device offset
//! - Write at most one page in a single transaction
//! - Write a single byte (the directory count)
//!
//! Bus framing, device addressing and transaction timing belong to the
//! implementor. The store only guarantees that it never hands
//! [`ByteTransport::write_burst`] more than one page, or a range that
//! straddles a page boundary.

mod file;
mod memory;

use std::time::Duration;

use thiserror::Error;

pub use file::FileTransport;
pub use memory::{MemoryTransport, TransportStats};

/// Failure reported by a transport
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The bus transaction failed
    #[error("bus error at {address:#06x}: {reason}")]
    Bus { address: u16, reason: String },

    /// The transaction did not complete within the allowed window
    #[error("timeout at {address:#06x}")]
    Timeout { address: u16 },
}

/// Raw device access
pub trait ByteTransport {
    /// Fill `buf` with the bytes starting at `address`
    ///
    /// One logical read; the implementor splits it into as many bus
    /// transactions as it needs.
    fn read_bytes(&mut self, address: u16, buf: &mut [u8]) -> Result<(), TransportError>;

    /// Write `bytes` at `address` in one transaction (never more than a page)
    fn write_burst(&mut self, address: u16, bytes: &[u8]) -> Result<(), TransportError>;

    /// Write a single byte
    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), TransportError> {
        self.write_burst(address, &[value])
    }
}

impl<T: ByteTransport + ?Sized> ByteTransport for &mut T {
    fn read_bytes(&mut self, address: u16, buf: &mut [u8]) -> Result<(), TransportError> {
        (**self).read_bytes(address, buf)
    }

    fn write_burst(&mut self, address: u16, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write_burst(address, bytes)
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), TransportError> {
        (**self).write_byte(address, value)
    }
}

impl<T: ByteTransport + ?Sized> ByteTransport for Box<T> {
    fn read_bytes(&mut self, address: u16, buf: &mut [u8]) -> Result<(), TransportError> {
        (**self).read_bytes(address, buf)
    }

    fn write_burst(&mut self, address: u16, bytes: &[u8]) -> Result<(), TransportError> {
        (**self).write_burst(address, bytes)
    }

    fn write_byte(&mut self, address: u16, value: u8) -> Result<(), TransportError> {
        (**self).write_byte(address, value)
    }
}

/// Settle time source used between write transactions
pub trait Delay {
    fn settle(&mut self, duration: Duration);
}

/// Blocks the calling thread
#[derive(Debug, Default, Clone, Copy)]
pub struct StdDelay;

impl Delay for StdDelay {
    fn settle(&mut self, duration: Duration) {
        if !duration.is_zero() {
            std::thread::sleep(duration);
        }
    }
}

/// Skips settle time entirely (host images, tests)
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl Delay for NoDelay {
    fn settle(&mut self, _duration: Duration) {}
}

/// Reject bursts a real page-constrained device would wrap around on
pub(crate) fn check_burst(
    address: u16,
    len: usize,
    page_size: usize,
    capacity: usize,
) -> Result<(), TransportError> {
    let start = address as usize;

    if start + len > capacity {
        return Err(TransportError::Bus {
            address,
            reason: format!("{} byte write runs past end of device", len),
        });
    }

    if len > page_size {
        return Err(TransportError::Bus {
            address,
            reason: format!("{} byte write exceeds page of {}", len, page_size),
        });
    }

    if len > 0 && start / page_size != (start + len - 1) / page_size {
        return Err(TransportError::Bus {
            address,
            reason: "write crosses a page boundary".to_string(),
        });
    }

    Ok(())
}
