//! Caller-owned record buffers

use std::sync::{Arc, Weak};

use parking_lot::{Mutex, MutexGuard};

/// Fixed-length buffer a record is bound to
///
/// Cloning shares the same bytes. The store only keeps a weak handle, so
/// dropping every clone unbinds the record (it becomes eligible for
/// cleanup unless overwrite-protected).
#[derive(Debug, Clone)]
pub struct RecordBuffer {
    inner: Arc<Mutex<Box<[u8]>>>,
}

impl RecordBuffer {
    /// Zero-filled buffer of `len` bytes
    pub fn new(len: usize) -> Self {
        Self::from_bytes(vec![0u8; len])
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            inner: Arc::new(Mutex::new(bytes.into().into_boxed_slice())),
        }
    }

    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Exclusive access to the bytes
    pub fn lock(&self) -> MutexGuard<'_, Box<[u8]>> {
        self.inner.lock()
    }

    /// Overwrite the start of the buffer with `bytes`
    pub fn write(&self, bytes: &[u8]) {
        let mut guard = self.inner.lock();
        let len = bytes.len().min(guard.len());
        guard[..len].copy_from_slice(&bytes[..len]);
    }

    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.lock().to_vec()
    }

    pub(crate) fn downgrade(&self) -> Weak<Mutex<Box<[u8]>>> {
        Arc::downgrade(&self.inner)
    }
}
