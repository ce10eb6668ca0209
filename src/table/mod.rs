//! Record Table Module
//!
//! In-memory mirror of the on-device directory, and the allocator that
//! places payloads in the gaps between its records.
//!
//! ## Device Layout
//! ```text
//! ┌───────────┬───────────────────────────────┬──────────────────────────┐
//! │ Count (1) │ Slot 0 │ Slot 1 │ ... │ Slot N-1 │ Payloads ...           │
//! └───────────┴───────────────────────────────┴──────────────────────────┘
//! 0           1                     directory_end                capacity
//!
//! Slot (8 bytes, little-endian):
//! ┌──────────┬──────────────┬──────────┬─────────────┐
//! │ Name (3) │ P|Version(1) │ Size (2) │ Address (2) │
//! └──────────┴──────────────┴──────────┴─────────────┘
//! P = overwrite-protect bit (bit 7), Version = bits 0..6
//! ```
//!
//! Slots are kept in slot order on the device (creation order, with holes
//! filled from the tail on delete); the in-memory table is kept sorted by
//! payload address, which is the order the allocator needs.

pub mod allocator;
mod descriptor;
mod directory;

pub use descriptor::{RecordDescriptor, RecordName, DESCRIPTOR_SIZE, MAX_VERSION, NAME_SIZE};
pub use directory::RecordTable;
