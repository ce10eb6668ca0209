//! Page Writer Module
//!
//! Splits writes into bursts that never straddle a page boundary.
//!
//! ## Responsibilities
//! - Blocking writes: every burst, settle delay before each
//! - Resumable writes: one burst per call over a single shared cursor
//! - Single-byte writes for the directory count
//! - Unchunked reads (the transport owns its own read ceiling)
//!
//! ## Chunk Policy
//! ```text
//!   page 5                page 6                page 7
//! ┌─────────────────────┬─────────────────────┬─────────────────────┐
//! │            ████████ │ ███████████████████ │ █████               │
//! └─────────────────────┴─────────────────────┴─────────────────────┘
//!              ^start   ^boundary              ^boundary  ^end
//!              burst 1    burst 2                burst 3
//! ```
//! Each burst is `min(next_boundary - position, end - position)` bytes,
//! so a range spanning `k` pages takes exactly `k` bursts.

mod chunk;
mod writer;

pub use chunk::{pages_spanned, Burst, Bursts, WriteCursor};
pub use writer::{PageWriter, WriteProgress};
