//! EEPROM image file
//!
//! Host-side stand-in for a device: a flat file whose length is the device
//! capacity. Page rules are enforced the same way as on the part so an
//! image produced here is laid out exactly as the firmware would lay it out.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use crate::config::MAX_CAPACITY;
use crate::error::{Result, StoreError};

use super::{check_burst, ByteTransport, TransportError};

/// File-backed device image
#[derive(Debug)]
pub struct FileTransport {
    file: File,
    capacity: u32,
    page_size: usize,
}

impl FileTransport {
    /// Open an existing image; capacity is the file length
    pub fn open(path: &Path, page_size: u32) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();

        if len == 0 || len > MAX_CAPACITY as u64 {
            return Err(StoreError::Config(format!(
                "image of {} bytes is not a valid device size",
                len
            )));
        }

        Ok(Self {
            file,
            capacity: len as u32,
            page_size: page_size as usize,
        })
    }

    /// Create (or truncate) a zero-filled image of `capacity` bytes
    pub fn create(path: &Path, capacity: u32, page_size: u32) -> Result<Self> {
        if capacity == 0 || capacity > MAX_CAPACITY {
            return Err(StoreError::Config(format!(
                "{} bytes is not a valid device size",
                capacity
            )));
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        file.set_len(capacity as u64)?;
        file.sync_all()?;

        Ok(Self {
            file,
            capacity,
            page_size: page_size as usize,
        })
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    fn bus_error(address: u16, err: std::io::Error) -> TransportError {
        TransportError::Bus {
            address,
            reason: err.to_string(),
        }
    }
}

impl ByteTransport for FileTransport {
    fn read_bytes(&mut self, address: u16, buf: &mut [u8]) -> std::result::Result<(), TransportError> {
        if address as usize + buf.len() > self.capacity as usize {
            return Err(TransportError::Bus {
                address,
                reason: format!("{} byte read runs past end of image", buf.len()),
            });
        }

        self.file
            .seek(SeekFrom::Start(address as u64))
            .map_err(|e| Self::bus_error(address, e))?;
        self.file
            .read_exact(buf)
            .map_err(|e| Self::bus_error(address, e))
    }

    fn write_burst(&mut self, address: u16, bytes: &[u8]) -> std::result::Result<(), TransportError> {
        check_burst(address, bytes.len(), self.page_size, self.capacity as usize)?;

        self.file
            .seek(SeekFrom::Start(address as u64))
            .map_err(|e| Self::bus_error(address, e))?;
        self.file
            .write_all(bytes)
            .map_err(|e| Self::bus_error(address, e))
    }
}
