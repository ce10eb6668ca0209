//! Page Writer
//!
//! Owns the transport and the settle-time source; the only path through
//! which the store touches the device.

use tracing::trace;

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::transport::{ByteTransport, Delay};

use super::chunk::{Bursts, WriteCursor};

/// Outcome of one resumable write step
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteProgress {
    /// More bursts remain; call again after the settle delay
    InProgress,
    /// Last burst written, cursor released
    Complete,
}

/// Page-aware writer over a byte transport
pub struct PageWriter<T, D> {
    transport: T,
    delay: D,
    config: Config,
    /// At most one resumable write in flight
    cursor: Option<WriteCursor>,
}

impl<T: ByteTransport, D: Delay> PageWriter<T, D> {
    pub fn new(transport: T, delay: D, config: &Config) -> Self {
        Self {
            transport,
            delay,
            config: config.clone(),
            cursor: None,
        }
    }

    /// Read `buf.len()` bytes starting at `address`
    pub fn read_into(&mut self, address: u32, buf: &mut [u8]) -> Result<()> {
        let device_address = self.check_range(address, buf.len())?;
        if buf.is_empty() {
            return Ok(());
        }
        self.transport.read_bytes(device_address, buf)?;
        Ok(())
    }

    /// Write `bytes` at `address`, blocking through every burst
    ///
    /// The settle delay precedes each burst, so back-to-back calls never
    /// hit the device while it is still busy with the previous write.
    pub fn write_blocking(&mut self, address: u32, bytes: &[u8]) -> Result<()> {
        self.check_range(address, bytes.len())?;

        for burst in Bursts::new(address, bytes.len(), self.config.page_size) {
            trace!(address = burst.address, len = burst.len, "burst");
            self.delay.settle(self.config.settle_delay);
            self.transport.write_burst(
                burst.address as u16,
                &bytes[burst.offset..burst.offset + burst.len],
            )?;
        }

        Ok(())
    }

    /// Advance a resumable write by one burst
    ///
    /// With no write in flight, starts one from `address`/`bytes`; otherwise
    /// the arguments are ignored and the active cursor continues. No settle
    /// delay is taken here: the caller must leave at least one settle
    /// interval between calls.
    pub fn write_resumable(&mut self, address: u32, bytes: &[u8]) -> Result<WriteProgress> {
        if self.cursor.is_none() {
            self.check_range(address, bytes.len())?;
            trace!(address, len = bytes.len(), "resumable write started");
            self.cursor = Some(WriteCursor::new(address, bytes, self.config.page_size));
        }

        self.resume()
    }

    /// Advance the active resumable write by one burst
    ///
    /// Needs no source buffer: the cursor carries the bytes captured when
    /// the write started. With nothing in flight this is `Complete`.
    pub fn resume(&mut self) -> Result<WriteProgress> {
        let Some(cursor) = self.cursor.as_mut() else {
            return Ok(WriteProgress::Complete);
        };

        if let Some((burst, chunk)) = cursor.peek() {
            trace!(address = burst.address, len = burst.len, "resumable burst");
            if let Err(e) = self.transport.write_burst(burst.address as u16, chunk) {
                self.cursor = None;
                return Err(e.into());
            }
            cursor.advance();
        }

        if cursor.is_complete() {
            self.cursor = None;
            Ok(WriteProgress::Complete)
        } else {
            Ok(WriteProgress::InProgress)
        }
    }

    /// Write one byte after the settle delay
    pub fn write_byte(&mut self, address: u32, value: u8) -> Result<()> {
        let device_address = self.check_range(address, 1)?;
        self.delay.settle(self.config.settle_delay);
        self.transport.write_byte(device_address, value)?;
        Ok(())
    }

    /// Active resumable write, if any
    pub fn cursor(&self) -> Option<&WriteCursor> {
        self.cursor.as_ref()
    }

    pub fn is_write_in_progress(&self) -> bool {
        self.cursor.is_some()
    }

    /// Drop the active resumable write without finishing it
    pub fn abort(&mut self) -> Option<WriteCursor> {
        self.cursor.take()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_transport(self) -> T {
        self.transport
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Bounds-check an access and narrow its start to a device address
    fn check_range(&self, address: u32, len: usize) -> Result<u16> {
        let end = address as u64 + len as u64;
        if end > self.config.capacity as u64 {
            return Err(StoreError::OutOfBounds { address, len });
        }
        u16::try_from(address).map_err(|_| StoreError::OutOfBounds { address, len })
    }
}
