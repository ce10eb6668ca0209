//! Record Table
//!
//! Fixed-capacity vector of descriptors sorted by payload address, plus the
//! directory I/O that keeps the device copy in step with it.

use std::ops::Index;

use tracing::{debug, warn};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::page::PageWriter;
use crate::transport::{ByteTransport, Delay};

use super::descriptor::{RecordDescriptor, RecordName, DESCRIPTOR_SIZE, NAME_SIZE};

/// In-memory directory
///
/// ## Invariants
/// - `entries` is sorted by ascending `address`
/// - payload ranges are pairwise disjoint and inside
///   `[directory_end, capacity)`
/// - `entries.len()` equals the count byte on the device and never exceeds
///   `max_records`
#[derive(Debug)]
pub struct RecordTable {
    entries: Vec<RecordDescriptor>,
    max_records: usize,
    directory_end: u32,
    capacity: u32,
}

impl RecordTable {
    /// Offset of the count byte
    pub const COUNT_ADDRESS: u32 = 0;

    /// Empty table for the given geometry
    pub fn new(config: &Config) -> Self {
        Self {
            entries: Vec::with_capacity(config.max_records),
            max_records: config.max_records,
            directory_end: config.directory_end(),
            capacity: config.capacity,
        }
    }

    /// Read the directory off the device
    ///
    /// 1. Read the count byte
    /// 2. Read each slot
    /// 3. Sort by address
    /// 4. Validate the result
    pub fn load<T: ByteTransport, D: Delay>(
        writer: &mut PageWriter<T, D>,
        config: &Config,
    ) -> Result<Self> {
        let mut table = Self::new(config);

        let mut count = [0u8; 1];
        writer.read_into(Self::COUNT_ADDRESS, &mut count)?;
        let count = count[0] as usize;

        if count > table.max_records {
            warn!(count, max = table.max_records, "count byte exceeds directory");
            return Err(StoreError::CorruptDirectory(format!(
                "count byte {} exceeds directory of {} slots",
                count, table.max_records
            )));
        }

        let mut slot = [0u8; DESCRIPTOR_SIZE];
        for index in 0..count {
            writer.read_into(Self::slot_address(index), &mut slot)?;
            table.entries.push(RecordDescriptor::decode(&slot)?);
        }

        table.sort();
        table.check_invariants()?;

        debug!(records = table.len(), "directory loaded");
        Ok(table)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() >= self.max_records
    }

    pub fn max_records(&self) -> usize {
        self.max_records
    }

    /// First byte available for payloads
    pub fn directory_end(&self) -> u32 {
        self.directory_end
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Descriptors in address order
    pub fn entries(&self) -> &[RecordDescriptor] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RecordDescriptor> {
        self.entries.iter()
    }

    pub fn find(&self, name: &RecordName) -> Option<&RecordDescriptor> {
        self.entries.iter().find(|d| d.name == *name)
    }

    pub fn find_mut(&mut self, name: &RecordName) -> Option<&mut RecordDescriptor> {
        self.entries.iter_mut().find(|d| d.name == *name)
    }

    pub fn position(&self, name: &RecordName) -> Option<usize> {
        self.entries.iter().position(|d| d.name == *name)
    }

    // =========================================================================
    // Mutation
    // =========================================================================

    /// Append and re-sort
    pub fn insert_sorted(&mut self, descriptor: RecordDescriptor) -> Result<()> {
        if self.is_full() {
            return Err(StoreError::TooManyRecords {
                max: self.max_records,
            });
        }
        self.entries.push(descriptor);
        self.sort();
        Ok(())
    }

    /// Restore address order after an address change
    ///
    /// Empty records sort ahead of a record starting at the same address,
    /// so consecutive ranges never appear to overlap.
    pub fn sort(&mut self) {
        self.entries.sort_by_key(|d| (d.address, d.size));
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut RecordDescriptor> {
        self.entries.get_mut(index)
    }

    pub fn remove(&mut self, index: usize) -> RecordDescriptor {
        self.entries.remove(index)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Verify the table invariants
    pub fn check_invariants(&self) -> Result<()> {
        let mut previous: Option<&RecordDescriptor> = None;

        for descriptor in &self.entries {
            if (descriptor.address as u32) < self.directory_end || descriptor.end() > self.capacity {
                return Err(StoreError::CorruptDirectory(format!(
                    "record {} at {}..{} lies outside the data region",
                    descriptor.name,
                    descriptor.address,
                    descriptor.end()
                )));
            }

            if let Some(prev) = previous {
                if prev.address > descriptor.address || prev.end() > descriptor.address as u32 {
                    return Err(StoreError::CorruptDirectory(format!(
                        "records {} and {} overlap",
                        prev.name, descriptor.name
                    )));
                }
            }
            previous = Some(descriptor);
        }

        for (index, descriptor) in self.entries.iter().enumerate() {
            if self.entries[index + 1..].iter().any(|d| d.name == descriptor.name) {
                return Err(StoreError::CorruptDirectory(format!(
                    "record {} listed twice",
                    descriptor.name
                )));
            }
        }

        Ok(())
    }

    // =========================================================================
    // Directory I/O
    // =========================================================================

    /// Device offset of directory slot `index`
    pub fn slot_address(index: usize) -> u32 {
        (index * DESCRIPTOR_SIZE) as u32 + 1
    }

    /// Write the current length to the count byte
    pub fn persist_count<T: ByteTransport, D: Delay>(
        &self,
        writer: &mut PageWriter<T, D>,
    ) -> Result<()> {
        writer.write_byte(Self::COUNT_ADDRESS, self.entries.len() as u8)
    }

    /// Write a whole descriptor into slot `index`
    pub fn write_slot<T: ByteTransport, D: Delay>(
        writer: &mut PageWriter<T, D>,
        index: usize,
        descriptor: &RecordDescriptor,
    ) -> Result<()> {
        writer.write_blocking(Self::slot_address(index), &descriptor.encode()?)
    }

    /// Find the slot holding `name` by scanning the names stored on the device
    ///
    /// Slot order on the device does not follow the address order kept in
    /// memory, so the device copy is the only authority here.
    pub fn slot_of<T: ByteTransport, D: Delay>(
        &self,
        writer: &mut PageWriter<T, D>,
        name: &RecordName,
    ) -> Result<usize> {
        let mut stored = [0u8; NAME_SIZE];
        for index in 0..self.entries.len() {
            writer.read_into(Self::slot_address(index), &mut stored)?;
            if stored == *name.as_bytes() {
                return Ok(index);
            }
        }
        Err(StoreError::HeaderNotFound(*name))
    }

    /// Rewrite everything after the name in the slot holding `descriptor`
    pub fn rewrite_descriptor<T: ByteTransport, D: Delay>(
        &self,
        writer: &mut PageWriter<T, D>,
        descriptor: &RecordDescriptor,
    ) -> Result<()> {
        let slot = self.slot_of(writer, &descriptor.name)?;
        let encoded = descriptor.encode()?;
        writer.write_blocking(
            Self::slot_address(slot) + NAME_SIZE as u32,
            &encoded[NAME_SIZE..],
        )
    }
}

impl Index<usize> for RecordTable {
    type Output = RecordDescriptor;

    fn index(&self, index: usize) -> &RecordDescriptor {
        &self.entries[index]
    }
}

impl<'a> IntoIterator for &'a RecordTable {
    type Item = &'a RecordDescriptor;
    type IntoIter = std::slice::Iter<'a, RecordDescriptor>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
