//! Tests for the Record Binder
//!
//! These tests verify:
//! - Create / reshape / reflag / unchanged cases and their device traffic
//! - Relocation when a record outgrows its slot
//! - Version clamping
//! - Directory and space exhaustion
//! - Persistence across reopen

use eepstore::config::Config;
use eepstore::table::{RecordDescriptor, RecordName, RecordTable};
use eepstore::transport::{MemoryTransport, NoDelay};
use eepstore::{RecordBuffer, RecordStore, StoreError};

// =============================================================================
// Helper Functions
// =============================================================================

type Store = RecordStore<MemoryTransport, NoDelay>;

fn config() -> Config {
    Config::builder()
        .capacity(4000)
        .page_size(32)
        .max_records(20)
        .build()
}

fn setup_store() -> Store {
    RecordStore::open_with_delay(config(), MemoryTransport::new(4000, 32), NoDelay).unwrap()
}

fn store_from_image(memory: Vec<u8>) -> Store {
    RecordStore::open_with_delay(config(), MemoryTransport::from_bytes(memory, 32), NoDelay)
        .unwrap()
}

/// Device image with the given records in slot order
fn image(records: &[(&str, u8, bool, u16, u16)]) -> Vec<u8> {
    let mut memory = vec![0u8; 4000];
    memory[0] = records.len() as u8;
    for (index, &(name, version, protected, size, address)) in records.iter().enumerate() {
        let name = RecordName::try_from(name).unwrap();
        let slot = RecordDescriptor::new(name, version, protected, size, address)
            .encode()
            .unwrap();
        let at = RecordTable::slot_address(index) as usize;
        memory[at..at + 8].copy_from_slice(&slot);
    }
    memory
}

fn pattern(len: usize, seed: u8) -> Vec<u8> {
    (0..len).map(|i| seed.wrapping_add(i as u8)).collect()
}

// =============================================================================
// Create
// =============================================================================

#[test]
fn test_first_bind_creates_record() {
    let mut store = setup_store();
    let buffer = RecordBuffer::from_bytes(pattern(16, 1));

    let created = store.bind(&buffer, "AA_", 1, false).unwrap();

    assert!(created);
    let record = store.record("AA_").unwrap();
    assert_eq!(record.address, 161);
    assert_eq!(record.size, 16);
    assert!(record.is_bound());

    let memory = store.transport().memory();
    assert_eq!(memory[0], 1);
    assert_eq!(&memory[1..9], &record.encode().unwrap()[..]);
    assert_eq!(&memory[161..177], &pattern(16, 1)[..]);
}

#[test]
fn test_records_placed_back_to_back() {
    let mut store = setup_store();
    let a = RecordBuffer::new(10);
    let b = RecordBuffer::new(20);
    let c = RecordBuffer::new(5);

    store.bind(&a, "AAA", 1, false).unwrap();
    store.bind(&b, "BBB", 1, false).unwrap();
    store.bind(&c, "CCC", 1, false).unwrap();

    let addresses: Vec<_> = store.records().iter().map(|d| d.address).collect();
    assert_eq!(addresses, vec![161, 171, 191]);
    assert_eq!(store.transport().memory()[0], 3);
}

#[test]
fn test_new_records_fill_slots_in_order() {
    let mut store = setup_store();
    let a = RecordBuffer::new(4);
    let b = RecordBuffer::new(4);

    store.bind(&a, "AAA", 1, false).unwrap();
    store.bind(&b, "BBB", 1, false).unwrap();

    let slots = store.directory_slots().unwrap();
    assert_eq!(slots[0].name.as_bytes(), b"AAA");
    assert_eq!(slots[1].name.as_bytes(), b"BBB");
}

// =============================================================================
// Unchanged
// =============================================================================

#[test]
fn test_rebind_unchanged_does_no_io() {
    let mut store = setup_store();
    let buffer = RecordBuffer::new(16);
    store.bind(&buffer, "AA_", 1, false).unwrap();
    store.transport_mut().reset_stats();

    let created = store.bind(&buffer, "AA_", 1, false).unwrap();

    assert!(!created);
    let stats = store.transport().stats();
    assert_eq!(stats.write_transactions, 0);
    assert_eq!(stats.read_transactions, 0);
}

#[test]
fn test_rebind_with_new_buffer_switches_binding() {
    let mut store = setup_store();
    let first = RecordBuffer::from_bytes(pattern(8, 10));
    store.bind(&first, "AA_", 1, false).unwrap();

    let second = RecordBuffer::new(8);
    store.bind(&second, "AA_", 1, false).unwrap();
    drop(first);
    store.load("AA_").unwrap();

    assert_eq!(second.to_vec(), pattern(8, 10));
}

#[test]
fn test_bind_then_load_round_trip() {
    let mut store = setup_store();
    let buffer = RecordBuffer::from_bytes(pattern(100, 7));
    store.bind(&buffer, "RT_", 3, false).unwrap();

    buffer.write(&[0u8; 100]);
    store.load("RT_").unwrap();

    assert_eq!(buffer.to_vec(), pattern(100, 7));
}

// =============================================================================
// Reshape
// =============================================================================

#[test]
fn test_outgrown_record_is_relocated() {
    let mut memory = image(&[("BB_", 1, false, 5, 300), ("CC_", 1, false, 10, 305)]);
    memory[300..305].copy_from_slice(&[0xBB; 5]);
    memory[305..315].copy_from_slice(&[0xCC; 10]);
    let mut store = store_from_image(memory);

    let buffer = RecordBuffer::from_bytes(pattern(40, 3));
    let created = store.bind(&buffer, "BB_", 1, false).unwrap();

    assert!(!created);
    let record = store.record("BB_").unwrap();
    assert_eq!(record.address, 161);
    assert_eq!(record.size, 40);

    // Table re-sorted: BB_ now precedes CC_
    assert_eq!(store.records()[0].name.as_bytes(), b"BB_");

    let memory = store.transport().memory();
    assert_eq!(&memory[161..201], &pattern(40, 3)[..]);
    // Vacated bytes are left as they were
    assert_eq!(&memory[300..305], &[0xBB; 5]);
    assert_eq!(&memory[305..315], &[0xCC; 10]);

    // Slot 0 still belongs to BB_ and carries the new geometry
    assert_eq!(&memory[1..9], &record.encode().unwrap()[..]);
}

#[test]
fn test_growth_into_free_space_keeps_address() {
    let mut store = setup_store();
    let small = RecordBuffer::new(16);
    store.bind(&small, "AAA", 1, false).unwrap();

    let large = RecordBuffer::from_bytes(pattern(64, 9));
    store.bind(&large, "AAA", 1, false).unwrap();

    let record = store.record("AAA").unwrap();
    assert_eq!(record.address, 161);
    assert_eq!(record.size, 64);
    assert_eq!(&store.transport().memory()[161..225], &pattern(64, 9)[..]);
}

#[test]
fn test_version_change_rewrites_payload() {
    let mut store = setup_store();
    let buffer = RecordBuffer::from_bytes(pattern(10, 1));
    store.bind(&buffer, "VER", 1, false).unwrap();

    buffer.write(&pattern(10, 50));
    store.bind(&buffer, "VER", 2, false).unwrap();

    let record = store.record("VER").unwrap();
    assert_eq!(record.version, 2);
    assert_eq!(record.address, 161);
    assert_eq!(&store.transport().memory()[161..171], &pattern(10, 50)[..]);
}

#[test]
fn test_shrink_keeps_address() {
    let mut store = setup_store();
    let a = RecordBuffer::new(30);
    let b = RecordBuffer::new(10);
    store.bind(&a, "AAA", 1, false).unwrap();
    store.bind(&b, "BBB", 1, false).unwrap();

    let smaller = RecordBuffer::new(20);
    store.bind(&smaller, "AAA", 1, false).unwrap();

    assert_eq!(store.record("AAA").unwrap().address, 161);
    assert_eq!(store.record("BBB").unwrap().address, 191);
}

// =============================================================================
// Reflag
// =============================================================================

#[test]
fn test_flag_change_rewrites_slot_only() {
    let mut store = setup_store();
    let buffer = RecordBuffer::from_bytes(pattern(16, 1));
    store.bind(&buffer, "FLG", 4, false).unwrap();

    buffer.write(&[0xFF; 16]);
    store.transport_mut().reset_stats();
    let created = store.bind(&buffer, "FLG", 4, true).unwrap();

    assert!(!created);
    assert!(store.record("FLG").unwrap().overwrite_protected);

    let memory = store.transport().memory();
    assert_eq!(memory[4], 4 | 0x80);
    // Payload untouched
    assert_eq!(&memory[161..177], &pattern(16, 1)[..]);
    assert_eq!(store.transport().stats().bytes_written, 5);
}

// =============================================================================
// Version Clamping
// =============================================================================

#[test]
fn test_version_clamped_to_max() {
    let mut store = setup_store();
    let buffer = RecordBuffer::new(4);

    store.bind(&buffer, "CLP", 200, false).unwrap();
    assert_eq!(store.record("CLP").unwrap().version, 127);

    store.transport_mut().reset_stats();
    store.bind(&buffer, "CLP", 255, false).unwrap();
    assert_eq!(store.transport().stats().write_transactions, 0);
}

// =============================================================================
// Exhaustion and Invalid Input
// =============================================================================

#[test]
fn test_directory_full_halts_store() {
    let config = Config::builder().max_records(2).build();
    let mut store =
        RecordStore::open_with_delay(config, MemoryTransport::new(4000, 32), NoDelay).unwrap();
    let buffers: Vec<_> = (0..3).map(|_| RecordBuffer::new(4)).collect();

    store.bind(&buffers[0], "AAA", 1, false).unwrap();
    store.bind(&buffers[1], "BBB", 1, false).unwrap();
    let result = store.bind(&buffers[2], "CCC", 1, false);

    assert!(matches!(result, Err(StoreError::TooManyRecords { max: 2 })));
    assert!(store.is_halted());
    assert_eq!(store.transport().memory()[0], 2);
}

#[test]
fn test_no_space_halts_store() {
    let mut store = setup_store();
    let big = RecordBuffer::new(3000);
    let other = RecordBuffer::new(1000);

    store.bind(&big, "BIG", 1, false).unwrap();
    let result = store.bind(&other, "OTH", 1, false);

    assert!(matches!(result, Err(StoreError::OutOfSpace { requested: 1000 })));
    assert!(store.is_halted());
    assert!(matches!(store.load("BIG"), Err(StoreError::Halted)));
}

#[test]
fn test_record_larger_than_device_is_recoverable() {
    let mut store = setup_store();
    let huge = RecordBuffer::new(4000);

    let result = store.bind(&huge, "HUG", 1, false);

    assert!(matches!(result, Err(StoreError::RecordTooLarge { size: 4000 })));
    assert!(!store.is_halted());
}

#[test]
fn test_invalid_name_is_recoverable() {
    let mut store = setup_store();
    let buffer = RecordBuffer::new(4);

    assert!(matches!(
        store.bind(&buffer, "LONG", 1, false),
        Err(StoreError::InvalidName(_))
    ));
    assert!(!store.is_halted());
    assert!(store.is_empty());
}

// =============================================================================
// Empty Records
// =============================================================================

#[test]
fn test_empty_record_next_to_live_record_survives_reopen() {
    let mut store = setup_store();
    let live = RecordBuffer::from_bytes(pattern(16, 1));
    let empty = RecordBuffer::new(0);

    store.bind(&live, "AAA", 1, false).unwrap();
    assert!(store.bind(&empty, "ZZZ", 1, false).unwrap());

    // Same start address; the empty range sorts first
    assert_eq!(store.record("ZZZ").unwrap().address, 161);
    assert_eq!(store.records()[0].name.as_bytes(), b"ZZZ");
    assert_eq!(store.records()[1].name.as_bytes(), b"AAA");

    let mut reopened = store_from_image(store.into_transport().into_memory());
    assert_eq!(reopened.len(), 2);
    assert_eq!(reopened.read_raw(&"AAA".parse().unwrap()).unwrap(), pattern(16, 1));
}

#[test]
fn test_empty_record_in_image_loads_ahead_of_neighbour() {
    // Slot order puts the empty record second
    let memory = image(&[("AAA", 1, false, 16, 161), ("ZZZ", 1, false, 0, 161)]);

    let store = store_from_image(memory);

    assert_eq!(store.records()[0].name.as_bytes(), b"ZZZ");
}

#[test]
fn test_growing_empty_record_does_not_overlap_neighbour() {
    let mut store = setup_store();
    let live = RecordBuffer::from_bytes(pattern(16, 1));
    let empty = RecordBuffer::new(0);
    store.bind(&live, "AAA", 1, false).unwrap();
    store.bind(&empty, "ZZZ", 1, false).unwrap();

    let grown = RecordBuffer::from_bytes(pattern(8, 50));
    store.bind(&grown, "ZZZ", 1, false).unwrap();

    assert_eq!(store.record("ZZZ").unwrap().address, 177);
    assert_eq!(&store.transport().memory()[161..177], &pattern(16, 1)[..]);
    let reopened = store_from_image(store.into_transport().into_memory());
    assert_eq!(reopened.len(), 2);
}

// =============================================================================
// Persistence
// =============================================================================

#[test]
fn test_records_survive_reopen() {
    let mut store = setup_store();
    let a = RecordBuffer::from_bytes(pattern(12, 1));
    let b = RecordBuffer::from_bytes(pattern(40, 2));
    store.bind(&a, "AAA", 5, true).unwrap();
    store.bind(&b, "BBB", 6, false).unwrap();

    let memory = store.into_transport().into_memory();
    let mut reopened = store_from_image(memory);

    assert_eq!(reopened.len(), 2);
    let aaa = reopened.record("AAA").unwrap();
    assert_eq!((aaa.version, aaa.overwrite_protected, aaa.size), (5, true, 12));
    assert!(!aaa.is_bound());

    let fresh = RecordBuffer::new(40);
    assert!(!reopened.bind(&fresh, "BBB", 6, false).unwrap());
    reopened.load("BBB").unwrap();
    assert_eq!(fresh.to_vec(), pattern(40, 2));
}
