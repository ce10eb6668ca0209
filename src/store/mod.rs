//! Store Module
//!
//! The record store that coordinates all components.
//!
//! ## Responsibilities
//! - Load the directory on open (or lay down an empty one on format)
//! - Bind names to caller buffers (`binder`)
//! - Copy payloads between device and bound buffers
//! - Reclaim unbound records (`compactor`)
//! - Latch into a halted state after any unrecoverable error
//!
//! ## Single Writer
//! Every operation takes `&mut self`; the store owns the page writer and
//! through it the transport, so exactly one device transaction is ever in
//! flight. Resumable saves are the one exception to "an operation finishes
//! before the next begins": between calls the cursor stays parked in the
//! page writer.

mod binder;
mod buffer;
mod compactor;

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{Result, StoreError};
use crate::page::{PageWriter, WriteProgress};
use crate::table::{allocator, RecordDescriptor, RecordName, RecordTable, DESCRIPTOR_SIZE};
use crate::transport::{ByteTransport, Delay, StdDelay};

pub use buffer::RecordBuffer;

/// Named, versioned records on a page-constrained device
pub struct RecordStore<T, D = StdDelay> {
    config: Config,

    /// Sole path to the device
    writer: PageWriter<T, D>,

    /// Directory mirror, sorted by payload address
    table: RecordTable,

    /// Record whose resumable save owns the page writer's cursor
    resumable: Option<RecordName>,

    /// Set after an unrecoverable error; the table may no longer match
    /// the device
    halted: bool,
}

impl<T: ByteTransport> RecordStore<T, StdDelay> {
    /// Open a store, loading the directory from the device
    pub fn open(config: Config, transport: T) -> Result<Self> {
        Self::open_with_delay(config, transport, StdDelay)
    }

    /// Lay down an empty directory, then open
    pub fn format(config: Config, transport: T) -> Result<Self> {
        Self::format_with_delay(config, transport, StdDelay)
    }
}

impl<T: ByteTransport, D: Delay> RecordStore<T, D> {
    /// Open with a custom settle-time source
    ///
    /// On open:
    /// 1. Validate the geometry
    /// 2. Read the count byte and every slot
    /// 3. Sort by address and validate the table
    pub fn open_with_delay(config: Config, transport: T, delay: D) -> Result<Self> {
        config.validate()?;

        let mut writer = PageWriter::new(transport, delay, &config);
        let table = RecordTable::load(&mut writer, &config)?;

        info!(
            records = table.len(),
            capacity = config.capacity,
            directory_end = config.directory_end(),
            "record store opened"
        );

        Ok(Self {
            config,
            writer,
            table,
            resumable: None,
            halted: false,
        })
    }

    /// Format with a custom settle-time source
    ///
    /// Only the count byte is written; stale slots and payloads stay on the
    /// device but are unreachable.
    pub fn format_with_delay(config: Config, transport: T, delay: D) -> Result<Self> {
        config.validate()?;

        let mut writer = PageWriter::new(transport, delay, &config);
        let table = RecordTable::new(&config);
        table.persist_count(&mut writer)?;

        info!(capacity = config.capacity, "record store formatted");

        Ok(Self {
            config,
            writer,
            table,
            resumable: None,
            halted: false,
        })
    }

    // =========================================================================
    // Payload Transfer
    // =========================================================================

    /// Copy a record's payload from the device into its bound buffer
    pub fn load(&mut self, name: &str) -> Result<()> {
        self.guarded(|store| {
            let name = RecordName::try_from(name)?;
            let (descriptor, buffer) = store.bound_record(&name)?;
            let mut guard = buffer.lock();
            store.writer.read_into(descriptor.address as u32, &mut guard[..])?;

            debug!(record = %descriptor.name, size = descriptor.size, "record loaded");
            Ok(())
        })
    }

    /// Copy a record's bound buffer to the device, blocking until done
    pub fn save_blocking(&mut self, name: &str) -> Result<()> {
        self.guarded(|store| {
            let name = RecordName::try_from(name)?;
            let (descriptor, buffer) = store.bound_record(&name)?;
            let guard = buffer.lock();
            store.writer.write_blocking(descriptor.address as u32, &guard[..])?;

            debug!(record = %descriptor.name, size = descriptor.size, "record saved");
            Ok(())
        })
    }

    /// Copy a record's bound buffer to the device one page per call
    ///
    /// Call repeatedly, at least one settle delay apart, until it returns
    /// [`WriteProgress::Complete`]. The bytes written are those in the
    /// buffer at the first call, so a save already under way finishes even
    /// if the buffer is dropped. Saving a different record while one is in
    /// progress is rejected with [`StoreError::WriteInProgress`].
    pub fn save_resumable(&mut self, name: &str) -> Result<WriteProgress> {
        self.guarded(|store| {
            let name = RecordName::try_from(name)?;

            let progress = if let Some(owner) = store.active_resumable() {
                if owner != name {
                    let active = store.writer.cursor().map_or(0, |c| c.destination());
                    return Err(StoreError::WriteInProgress { active });
                }
                store.writer.resume()?
            } else {
                let (descriptor, buffer) = store.bound_record(&name)?;
                let guard = buffer.lock();
                store.resumable = Some(name);
                let started = store
                    .writer
                    .write_resumable(descriptor.address as u32, &guard[..])?;
                started
            };

            if progress == WriteProgress::Complete {
                store.resumable = None;
                debug!(record = %name, "resumable save complete");
            }
            Ok(progress)
        })
    }

    /// Abandon the resumable save in progress, if any
    ///
    /// Returns the record it belonged to. Bytes already written stay on the
    /// device.
    pub fn abort_resumable(&mut self) -> Option<RecordName> {
        let owner = self.active_resumable();
        if let Some(cursor) = self.writer.abort() {
            warn!(destination = cursor.destination(), "resumable save abandoned");
        }
        self.resumable = None;
        owner
    }

    /// Read a record's payload straight off the device, bound or not
    pub fn read_raw(&mut self, name: &RecordName) -> Result<Vec<u8>> {
        self.guarded(|store| {
            let descriptor = store
                .table
                .find(name)
                .ok_or(StoreError::UnknownRecord(*name))?;

            let mut payload = vec![0u8; descriptor.size as usize];
            let address = descriptor.address as u32;
            store.writer.read_into(address, &mut payload)?;
            Ok(payload)
        })
    }

    /// Descriptors as stored on the device, in slot order
    pub fn directory_slots(&mut self) -> Result<Vec<RecordDescriptor>> {
        self.guarded(|store| {
            let mut slot = [0u8; DESCRIPTOR_SIZE];
            let mut slots = Vec::with_capacity(store.table.len());
            for index in 0..store.table.len() {
                store
                    .writer
                    .read_into(RecordTable::slot_address(index), &mut slot)?;
                slots.push(RecordDescriptor::decode(&slot)?);
            }
            Ok(slots)
        })
    }

    /// Zero the whole device and forget every record
    ///
    /// Destructive; any resumable write in progress is abandoned.
    pub fn wipe(&mut self) -> Result<()> {
        self.guarded(|store| {
            store.abort_resumable();

            let page_size = store.config.page_size;
            let capacity = store.config.capacity;
            let zeros = vec![0u8; page_size as usize];

            let mut page = 0;
            while page < capacity {
                let len = page_size.min(capacity - page);
                store.writer.write_blocking(page, &zeros[..len as usize])?;
                page += page_size;
            }

            store.table.clear();
            info!(capacity, "device wiped");
            Ok(())
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Descriptors in address order
    pub fn records(&self) -> &[RecordDescriptor] {
        self.table.entries()
    }

    pub fn record(&self, name: &str) -> Option<&RecordDescriptor> {
        let name = RecordName::try_from(name).ok()?;
        self.table.find(&name)
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Bytes in all gaps between payloads
    pub fn free_space(&self) -> u32 {
        allocator::free_space(&self.table)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    pub fn is_write_in_progress(&self) -> bool {
        self.writer.is_write_in_progress()
    }

    pub fn transport(&self) -> &T {
        self.writer.transport()
    }

    pub fn transport_mut(&mut self) -> &mut T {
        self.writer.transport_mut()
    }

    pub fn into_transport(self) -> T {
        self.writer.into_transport()
    }

    // =========================================================================
    // Private Helpers
    // =========================================================================

    /// Owner of the cursor, while one is actually parked in the writer
    ///
    /// The writer drops its cursor on a transport error, so the owner alone
    /// is not enough.
    fn active_resumable(&self) -> Option<RecordName> {
        self.resumable.filter(|_| self.writer.is_write_in_progress())
    }

    /// Abandon the resumable save of `name`, if it owns the cursor
    ///
    /// Called when the record's payload is about to move or disappear.
    fn abort_resumable_of(&mut self, name: &RecordName) {
        if self.active_resumable() == Some(*name) {
            self.abort_resumable();
        }
    }

    /// Run `op` unless halted; halt if it fails unrecoverably
    fn guarded<R>(&mut self, op: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        if self.halted {
            return Err(StoreError::Halted);
        }

        let result = op(self);
        if let Err(e) = &result {
            if !e.is_recoverable() {
                warn!(error = %e, "unrecoverable error, store halted");
                self.halted = true;
            }
        }
        result
    }

    /// Descriptor and live buffer for a bound record
    fn bound_record(
        &self,
        name: &RecordName,
    ) -> Result<(RecordDescriptor, Arc<Mutex<Box<[u8]>>>)> {
        let descriptor = self
            .table
            .find(name)
            .ok_or(StoreError::UnknownRecord(*name))?;

        let buffer = descriptor
            .binding()
            .and_then(|binding| binding.upgrade())
            .ok_or(StoreError::NotBound(*name))?;

        Ok((descriptor.clone(), buffer))
    }
}
