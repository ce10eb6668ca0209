//! Compactor
//!
//! Drops records that nobody bound this session and that are not
//! overwrite-protected. Deleting a record fills its directory slot with the
//! tail slot so the on-device slot numbering never has holes:
//!
//! ```text
//! before:  [3] | AAA | BBB | CCC |        delete BBB
//! after:   [2] | AAA | CCC |(CCC)|        tail copied down, count shrunk
//! ```

use tracing::{debug, info};

use crate::error::Result;
use crate::table::{RecordName, RecordTable, DESCRIPTOR_SIZE};
use crate::transport::{ByteTransport, Delay};

use super::RecordStore;

impl<T: ByteTransport, D: Delay> RecordStore<T, D> {
    /// Delete every unbound, unprotected record; returns how many went
    ///
    /// Call after the boot-time round of [`bind`](RecordStore::bind) calls,
    /// so that every record still in use has its buffer attached.
    pub fn cleanup(&mut self) -> Result<usize> {
        self.guarded(|store| {
            let mut removed = 0;
            let mut index = 0;

            // Removal shifts the rest down, so only advance past keepers
            while index < store.table.len() {
                let descriptor = &store.table[index];
                if descriptor.is_bound() || descriptor.overwrite_protected {
                    index += 1;
                    continue;
                }

                let name = descriptor.name;
                store.delete_record(index, name)?;
                removed += 1;
            }

            info!(removed, remaining = store.table.len(), "cleanup finished");
            Ok(removed)
        })
    }

    /// Move the tail slot over `name`'s slot, then shrink the directory
    fn delete_record(&mut self, index: usize, name: RecordName) -> Result<()> {
        let tail = self.table.len() - 1;
        let slot = self.table.slot_of(&mut self.writer, &name)?;

        if slot != tail {
            let mut moved = [0u8; DESCRIPTOR_SIZE];
            self.writer
                .read_into(RecordTable::slot_address(tail), &mut moved)?;
            self.writer
                .write_blocking(RecordTable::slot_address(slot), &moved)?;
        }

        self.abort_resumable_of(&name);
        self.table.remove(index);
        self.table.persist_count(&mut self.writer)?;

        debug!(record = %name, slot, "record deleted");
        Ok(())
    }
}
