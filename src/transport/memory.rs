//! RAM-backed EEPROM
//!
//! Behaves like a page-constrained serial part: reads are split into bursts
//! of at most `max_read_burst` bytes, writes are rejected when they exceed
//! or straddle a page. Counts every transaction and can inject faults.

use super::{check_burst, ByteTransport, TransportError};

/// Largest read a single bus transaction returns on the reference part
pub const DEFAULT_MAX_READ_BURST: usize = 0xFF;

/// Transaction counters
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransportStats {
    pub read_transactions: usize,
    pub write_transactions: usize,
    pub bytes_read: usize,
    pub bytes_written: usize,
}

/// Injected failure, armed after a number of successful writes
#[derive(Debug, Clone, Copy)]
enum Fault {
    Bus { after: usize },
    Timeout { after: usize },
}

/// Simulated EEPROM
#[derive(Debug, Clone)]
pub struct MemoryTransport {
    memory: Vec<u8>,
    page_size: usize,
    max_read_burst: usize,
    stats: TransportStats,
    fault: Option<Fault>,
}

impl MemoryTransport {
    /// Zero-filled device (reads as an empty directory)
    pub fn new(capacity: usize, page_size: usize) -> Self {
        Self::from_bytes(vec![0u8; capacity], page_size)
    }

    /// Factory-fresh device, every cell reads 0xFF
    pub fn erased(capacity: usize, page_size: usize) -> Self {
        Self::from_bytes(vec![0xFF; capacity], page_size)
    }

    /// Device holding an existing image
    pub fn from_bytes(memory: Vec<u8>, page_size: usize) -> Self {
        Self {
            memory,
            page_size,
            max_read_burst: DEFAULT_MAX_READ_BURST,
            stats: TransportStats::default(),
            fault: None,
        }
    }

    /// Change the per-transaction read ceiling
    pub fn with_max_read_burst(mut self, bytes: usize) -> Self {
        self.max_read_burst = bytes.max(1);
        self
    }

    pub fn memory(&self) -> &[u8] {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut [u8] {
        &mut self.memory
    }

    pub fn into_memory(self) -> Vec<u8> {
        self.memory
    }

    pub fn capacity(&self) -> usize {
        self.memory.len()
    }

    pub fn stats(&self) -> TransportStats {
        self.stats
    }

    pub fn reset_stats(&mut self) {
        self.stats = TransportStats::default();
    }

    /// Fail every write after `writes` more have succeeded
    pub fn fail_writes_after(&mut self, writes: usize) {
        self.fault = Some(Fault::Bus { after: writes });
    }

    /// Time out every write after `writes` more have succeeded
    pub fn time_out_writes_after(&mut self, writes: usize) {
        self.fault = Some(Fault::Timeout { after: writes });
    }

    pub fn clear_faults(&mut self) {
        self.fault = None;
    }

    fn check_fault(&mut self, address: u16) -> Result<(), TransportError> {
        match &mut self.fault {
            Some(Fault::Bus { after }) | Some(Fault::Timeout { after }) if *after > 0 => {
                *after -= 1;
                Ok(())
            }
            Some(Fault::Bus { .. }) => Err(TransportError::Bus {
                address,
                reason: "injected fault".to_string(),
            }),
            Some(Fault::Timeout { .. }) => Err(TransportError::Timeout { address }),
            None => Ok(()),
        }
    }
}

impl ByteTransport for MemoryTransport {
    fn read_bytes(&mut self, address: u16, buf: &mut [u8]) -> Result<(), TransportError> {
        let start = address as usize;
        let end = start + buf.len();
        if end > self.memory.len() {
            return Err(TransportError::Bus {
                address,
                reason: format!("{} byte read runs past end of device", buf.len()),
            });
        }

        // One transaction per burst, like the bus it stands in for
        for (index, chunk) in buf.chunks_mut(self.max_read_burst).enumerate() {
            let offset = start + index * self.max_read_burst;
            chunk.copy_from_slice(&self.memory[offset..offset + chunk.len()]);
            self.stats.read_transactions += 1;
            self.stats.bytes_read += chunk.len();
        }

        Ok(())
    }

    fn write_burst(&mut self, address: u16, bytes: &[u8]) -> Result<(), TransportError> {
        check_burst(address, bytes.len(), self.page_size, self.memory.len())?;
        self.check_fault(address)?;

        let start = address as usize;
        self.memory[start..start + bytes.len()].copy_from_slice(bytes);
        self.stats.write_transactions += 1;
        self.stats.bytes_written += bytes.len();

        Ok(())
    }
}
