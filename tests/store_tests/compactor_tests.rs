//! Tests for the Compactor
//!
//! These tests verify:
//! - Only unbound, unprotected records are deleted
//! - Count byte tracks the remaining records
//! - Tail slot fills the hole left by a deleted slot
//! - Space freed by cleanup is reused
//! - A directory that disagrees with the table halts the store

use eepstore::config::Config;
use eepstore::table::{RecordDescriptor, RecordName, RecordTable};
use eepstore::transport::{MemoryTransport, NoDelay};
use eepstore::{RecordBuffer, RecordStore, StoreError};

// =============================================================================
// Helper Functions
// =============================================================================

type Store = RecordStore<MemoryTransport, NoDelay>;

fn store_from_image(memory: Vec<u8>) -> Store {
    RecordStore::open_with_delay(
        Config::default(),
        MemoryTransport::from_bytes(memory, 32),
        NoDelay,
    )
    .unwrap()
}

/// Device image with the given records in slot order
fn image(records: &[(&str, bool, u16, u16)]) -> Vec<u8> {
    let mut memory = vec![0u8; 4000];
    memory[0] = records.len() as u8;
    for (index, &(name, protected, size, address)) in records.iter().enumerate() {
        let name = RecordName::try_from(name).unwrap();
        let slot = RecordDescriptor::new(name, 1, protected, size, address)
            .encode()
            .unwrap();
        let at = RecordTable::slot_address(index) as usize;
        memory[at..at + 8].copy_from_slice(&slot);
    }
    memory
}

fn names(store: &Store) -> Vec<String> {
    store.records().iter().map(|d| d.name.to_string()).collect()
}

// =============================================================================
// Eligibility
// =============================================================================

#[test]
fn test_cleanup_removes_unbound_unprotected() {
    let memory = image(&[
        ("P1_", true, 10, 161),
        ("B1_", false, 10, 171),
        ("U1_", false, 10, 181),
        ("P2_", true, 10, 191),
        ("U2_", false, 10, 201),
    ]);
    let mut store = store_from_image(memory);
    let bound = RecordBuffer::new(10);
    store.bind(&bound, "B1_", 1, false).unwrap();

    let removed = store.cleanup().unwrap();

    assert_eq!(removed, 2);
    assert_eq!(store.len(), 3);
    assert_eq!(store.transport().memory()[0], 3);
    assert_eq!(names(&store), vec!["P1_", "B1_", "P2_"]);
}

#[test]
fn test_cleanup_never_removes_protected() {
    let memory = image(&[("P1_", true, 10, 161), ("P2_", true, 10, 300)]);
    let mut store = store_from_image(memory);

    assert_eq!(store.cleanup().unwrap(), 0);
    assert_eq!(store.len(), 2);
    assert_eq!(store.transport().memory()[0], 2);
}

#[test]
fn test_dropped_buffer_makes_record_eligible() {
    let mut store = store_from_image(vec![0u8; 4000]);
    let keep = RecordBuffer::new(8);
    let temp = RecordBuffer::new(8);
    store.bind(&keep, "KEP", 1, false).unwrap();
    store.bind(&temp, "TMP", 1, false).unwrap();

    drop(temp);
    let removed = store.cleanup().unwrap();

    assert_eq!(removed, 1);
    assert_eq!(names(&store), vec!["KEP"]);
}

#[test]
fn test_cleanup_removes_consecutive_records() {
    let memory = image(&[
        ("AAA", false, 10, 161),
        ("BBB", false, 10, 171),
        ("CCC", false, 10, 181),
    ]);
    let mut store = store_from_image(memory);

    assert_eq!(store.cleanup().unwrap(), 3);
    assert!(store.is_empty());
    assert_eq!(store.transport().memory()[0], 0);
}

// =============================================================================
// Directory Repacking
// =============================================================================

#[test]
fn test_tail_slot_fills_hole() {
    let memory = image(&[
        ("AAA", false, 10, 161),
        ("BBB", false, 10, 171),
        ("CCC", false, 10, 181),
    ]);
    let mut store = store_from_image(memory);
    let a = RecordBuffer::new(10);
    let c = RecordBuffer::new(10);
    store.bind(&a, "AAA", 1, false).unwrap();
    store.bind(&c, "CCC", 1, false).unwrap();

    store.cleanup().unwrap();

    let slots = store.directory_slots().unwrap();
    assert_eq!(slots.len(), 2);
    assert_eq!(slots[0].name.as_bytes(), b"AAA");
    assert_eq!(slots[1].name.as_bytes(), b"CCC");
    assert_eq!(slots[1].address, 181);

    let reopened = store_from_image(store.into_transport().into_memory());
    assert_eq!(names(&reopened), vec!["AAA", "CCC"]);
}

#[test]
fn test_deleting_tail_slot_only_shrinks_count() {
    let memory = image(&[("AAA", false, 10, 161), ("BBB", false, 10, 171)]);
    let mut store = store_from_image(memory);
    let a = RecordBuffer::new(10);
    store.bind(&a, "AAA", 1, false).unwrap();
    store.transport_mut().reset_stats();

    store.cleanup().unwrap();

    // Only the count byte is written
    assert_eq!(store.transport().stats().write_transactions, 1);
    assert_eq!(store.transport().memory()[0], 1);
}

#[test]
fn test_freed_space_is_reused() {
    let memory = image(&[("OLD", false, 50, 161), ("KEP", true, 10, 211)]);
    let mut store = store_from_image(memory);
    store.cleanup().unwrap();

    let buffer = RecordBuffer::new(40);
    store.bind(&buffer, "NEW", 1, false).unwrap();

    assert_eq!(store.record("NEW").unwrap().address, 161);
}

// =============================================================================
// Consistency Failures
// =============================================================================

#[test]
fn test_missing_slot_halts_store() {
    let memory = image(&[("AAA", false, 10, 161), ("BBB", true, 10, 171)]);
    let mut store = store_from_image(memory);

    // Scribble over AAA's name behind the store's back
    store.transport_mut().memory_mut()[1..4].copy_from_slice(b"ZZZ");
    let result = store.cleanup();

    assert!(matches!(result, Err(StoreError::HeaderNotFound(_))));
    assert!(store.is_halted());
    assert!(matches!(store.cleanup(), Err(StoreError::Halted)));
}
