//! # EepStore
//!
//! Named, versioned records on small serial EEPROMs:
//! - A fixed-size directory at the front of the device
//! - First-fit placement of payloads in the remaining space
//! - Records bound to live caller buffers, loaded and saved on demand
//! - Page-aware writes, blocking or resumable one page at a time
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       RecordStore                           │
//! │        bind · load · save · cleanup · wipe (halt latch)     │
//! └──────────┬──────────────────────┬───────────────────────────┘
//!            │                      │
//!            ▼                      ▼
//!   ┌─────────────────┐    ┌─────────────────┐
//!   │   RecordTable   │◄───│    Allocator    │
//!   │ (sorted by addr)│    │   (first-fit)   │
//!   └────────┬────────┘    └─────────────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │   PageWriter    │   blocking / resumable bursts,
//!   │                 │   never across a page boundary
//!   └────────┬────────┘
//!            │
//!            ▼
//!   ┌─────────────────┐
//!   │  ByteTransport  │   bus, RAM or image file
//!   └─────────────────┘
//! ```
//!
//! ## Example
//!
//! ```
//! use eepstore::{Config, MemoryTransport, NoDelay, RecordBuffer, RecordStore};
//!
//! let config = Config::default();
//! let device = MemoryTransport::new(config.capacity as usize, config.page_size as usize);
//! let mut store = RecordStore::open_with_delay(config, device, NoDelay)?;
//!
//! let settings = RecordBuffer::from_bytes(vec![1, 2, 3, 4]);
//! if !store.bind(&settings, "SET", 1, false)? {
//!     store.load("SET")?;
//! }
//!
//! settings.write(&[9, 9]);
//! store.save_blocking("SET")?;
//! # Ok::<(), eepstore::StoreError>(())
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod config;

pub mod transport;
pub mod page;
pub mod table;
pub mod store;

// =============================================================================
// Public API Re-exports
// =============================================================================

pub use error::{StoreError, Result};
pub use config::Config;
pub use page::WriteProgress;
pub use store::{RecordBuffer, RecordStore};
pub use table::{RecordDescriptor, RecordName};
pub use transport::{ByteTransport, Delay, FileTransport, MemoryTransport, NoDelay, StdDelay};

// =============================================================================
// Version Info
// =============================================================================

/// Current version of EepStore
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
