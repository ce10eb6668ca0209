//! First-fit payload allocator
//!
//! Free space is never tracked on its own: the gaps are whatever lies
//! between the payload ranges of the (address-sorted) table. Allocation
//! takes the lowest gap that is large enough, with no splitting, best-fit
//! or merging.

use std::ops::Range;

use crate::error::{Result, StoreError};

use super::RecordTable;

/// Free ranges in ascending address order
///
/// Yields the gap before the first record, the gaps between records and the
/// tail gap; an empty table yields the whole data region. Gaps may be empty.
pub fn gaps(table: &RecordTable) -> impl Iterator<Item = Range<u32>> + '_ {
    let mut cursor = table.directory_end();
    let mut tail_done = false;
    let mut records = table.iter();

    std::iter::from_fn(move || {
        if let Some(descriptor) = records.next() {
            let start = cursor;
            let end = (descriptor.address as u32).max(start);
            cursor = cursor.max(descriptor.end());
            return Some(start..end);
        }

        if tail_done {
            return None;
        }
        tail_done = true;
        Some(cursor..table.capacity().max(cursor))
    })
}

/// Start of the lowest gap holding `size` bytes
pub fn allocate(table: &RecordTable, size: u32) -> Result<u32> {
    gaps(table)
        .find(|gap| gap.end - gap.start >= size)
        .map(|gap| gap.start)
        .ok_or(StoreError::OutOfSpace { requested: size })
}

/// Bytes usable in place from `address`: up to the next record that starts
/// after it, or to the end of the device
pub fn space_available_from(table: &RecordTable, address: u32) -> u32 {
    if address > table.capacity() {
        return 0;
    }

    table
        .iter()
        .find(|d| d.address as u32 > address)
        .map(|d| d.address as u32 - address)
        .unwrap_or(table.capacity() - address)
}

/// Total bytes in all gaps
pub fn free_space(table: &RecordTable) -> u32 {
    gaps(table).map(|gap| gap.end - gap.start).sum()
}
