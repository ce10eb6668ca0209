//! Record Binder
//!
//! Links a name to a caller buffer, creating or reshaping the record on the
//! device as needed. The four cases are kept apart so that each does the
//! least device I/O it can:
//!
//! | Case      | Condition                   | Device writes              |
//! |-----------|-----------------------------|----------------------------|
//! | Create    | name not in directory       | count, slot, payload       |
//! | Reshape   | size or version changed     | slot tail, payload         |
//! | Reflag    | only protect flag changed   | slot tail                  |
//! | Unchanged | nothing changed             | none                       |

use tracing::debug;

use crate::error::{Result, StoreError};
use crate::table::{allocator, RecordDescriptor, RecordName, RecordTable, MAX_VERSION};
use crate::transport::{ByteTransport, Delay};

use super::{RecordBuffer, RecordStore};

impl<T: ByteTransport, D: Delay> RecordStore<T, D> {
    /// Bind `buffer` to the record `name`
    ///
    /// The record's size is the buffer length. `version` is clamped to 127.
    /// Returns `true` when the record did not exist and was created, in
    /// which case the buffer's current contents were written as its initial
    /// payload. An existing record whose size or version changed is
    /// rewritten from the buffer as well (and moved if it no longer fits
    /// where it is); otherwise the device payload is left alone and the
    /// caller is expected to [`load`](RecordStore::load) it.
    pub fn bind(
        &mut self,
        buffer: &RecordBuffer,
        name: &str,
        version: u8,
        overwrite_protected: bool,
    ) -> Result<bool> {
        self.guarded(|store| {
            let name = RecordName::try_from(name)?;
            let size = store.record_size(buffer.len())?;
            let version = version.min(MAX_VERSION);

            let Some(existing) = store.table.find(&name) else {
                store.create_record(buffer, name, size, version, overwrite_protected)?;
                return Ok(true);
            };

            if existing.size != size || existing.version != version {
                store.reshape_record(buffer, name, size, version, overwrite_protected)?;
            } else if existing.overwrite_protected != overwrite_protected {
                store.reflag_record(name, overwrite_protected)?;
            } else {
                debug!(record = %name, "record unchanged");
            }

            if let Some(descriptor) = store.table.find_mut(&name) {
                descriptor.set_binding(buffer.downgrade());
            }
            Ok(false)
        })
    }

    /// Validate a buffer length as a record size
    fn record_size(&self, len: usize) -> Result<u16> {
        let data_region = self.config.capacity - self.config.directory_end();
        if len > data_region as usize {
            return Err(StoreError::RecordTooLarge { size: len });
        }
        u16::try_from(len).map_err(|_| StoreError::RecordTooLarge { size: len })
    }

    /// New record: allocate, grow the directory, write slot and payload
    fn create_record(
        &mut self,
        buffer: &RecordBuffer,
        name: RecordName,
        size: u16,
        version: u8,
        overwrite_protected: bool,
    ) -> Result<()> {
        if self.table.is_full() {
            return Err(StoreError::TooManyRecords {
                max: self.table.max_records(),
            });
        }

        let address = allocator::allocate(&self.table, size as u32)?;
        let mut descriptor =
            RecordDescriptor::new(name, version, overwrite_protected, size, address as u16);
        descriptor.set_binding(buffer.downgrade());

        // New record always takes the slot just past the current tail
        let slot = self.table.len();
        self.table.insert_sorted(descriptor.clone())?;
        self.table.persist_count(&mut self.writer)?;
        RecordTable::write_slot(&mut self.writer, slot, &descriptor)?;

        let payload = buffer.lock();
        self.writer.write_blocking(address, &payload[..])?;

        debug!(record = %name, address, size, version, "record created");
        Ok(())
    }

    /// Size or version changed: move if needed, rewrite slot and payload
    ///
    /// A move leaves the old payload bytes behind; they only become free
    /// space again once no record claims them, which a move alone never
    /// achieves.
    fn reshape_record(
        &mut self,
        buffer: &RecordBuffer,
        name: RecordName,
        size: u16,
        version: u8,
        overwrite_protected: bool,
    ) -> Result<()> {
        let (current, current_size) = self
            .table
            .find(&name)
            .map(|d| (d.address as u32, d.size))
            .ok_or(StoreError::UnknownRecord(name))?;

        // An empty record may share its address with the record after it
        let in_place = if current_size == 0 {
            0
        } else {
            allocator::space_available_from(&self.table, current)
        };

        let mut address = current;
        if in_place < size as u32 {
            address = allocator::allocate(&self.table, size as u32)?;
        }

        // A parked resumable save of the old payload must not land later
        self.abort_resumable_of(&name);

        let descriptor = {
            let descriptor = self
                .table
                .find_mut(&name)
                .ok_or(StoreError::UnknownRecord(name))?;
            descriptor.address = address as u16;
            descriptor.size = size;
            descriptor.version = version;
            descriptor.overwrite_protected = overwrite_protected;
            descriptor.clone()
        };
        if address != current {
            self.table.sort();
        }

        self.table.rewrite_descriptor(&mut self.writer, &descriptor)?;

        let payload = buffer.lock();
        self.writer.write_blocking(address, &payload[..])?;

        debug!(record = %name, from = current, to = address, size, version, "record reshaped");
        Ok(())
    }

    /// Only the protect flag changed: rewrite the slot, keep the payload
    fn reflag_record(&mut self, name: RecordName, overwrite_protected: bool) -> Result<()> {
        let descriptor = {
            let descriptor = self
                .table
                .find_mut(&name)
                .ok_or(StoreError::UnknownRecord(name))?;
            descriptor.overwrite_protected = overwrite_protected;
            descriptor.clone()
        };

        self.table.rewrite_descriptor(&mut self.writer, &descriptor)?;

        debug!(record = %name, overwrite_protected, "record protection changed");
        Ok(())
    }
}
