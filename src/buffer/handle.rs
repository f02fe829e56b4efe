//! Shared buffer payloads, handles and zero-copy views.
//!
//! A buffer's payload lives behind `Arc<RwLock<Storage>>`. Every
//! [`BufferHandle`] returned by a pool aliases the same storage, so a write
//! through one handle is observable through every other handle and view of
//! the same key. A [`BufferView`] is a `(storage, offset, length)` tuple
//! resolved at access time, never an independently freed allocation.

use std::ops::Range;
use std::sync::Arc;

use memmap2::MmapMut;
use parking_lot::{
    MappedRwLockReadGuard, MappedRwLockWriteGuard, RwLock, RwLockReadGuard, RwLockWriteGuard,
};

use crate::common::DType;

/// Backing memory of a buffer.
///
/// Heap storage covers ordinary allocations; mapped storage covers
/// temporary file-backed buffers, which stay zero-copy all the way to the
/// scratch file.
pub enum Storage {
    /// Owned contiguous heap block.
    Heap(Vec<u8>),
    /// Writable file mapping (temporary buffers).
    Mapped(MmapMut),
}

impl Storage {
    /// Borrow the payload bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        match self {
            Storage::Heap(v) => v.as_slice(),
            Storage::Mapped(m) => &m[..],
        }
    }

    /// Mutably borrow the payload bytes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        match self {
            Storage::Heap(v) => v.as_mut_slice(),
            Storage::Mapped(m) => &mut m[..],
        }
    }

}

/// Reference-counted, lock-protected payload shared by handles and views.
pub type SharedStorage = Arc<RwLock<Storage>>;

/// A caller-facing handle to a pooled buffer.
///
/// The handle shares the payload with the pool entry; it does not own a
/// copy. Content access goes through [`read`](Self::read) /
/// [`write`](Self::write), which briefly take the payload lock. Buffers are
/// shared-read, exclusive-write by convention: the lock protects the
/// engine's bookkeeping, not callers racing on content.
#[derive(Clone)]
pub struct BufferHandle {
    key: String,
    dtype: DType,
    shape: Vec<usize>,
    size_bytes: u64,
    storage: SharedStorage,
}

impl BufferHandle {
    pub(crate) fn new(
        key: String,
        dtype: DType,
        shape: Vec<usize>,
        size_bytes: u64,
        storage: SharedStorage,
    ) -> Self {
        Self {
            key,
            dtype,
            shape,
            size_bytes,
            storage,
        }
    }

    /// Qualified key of the buffer.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Element type.
    #[inline]
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Shape at allocation time. Immutable after creation.
    #[inline]
    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Payload size in bytes. Immutable after creation.
    #[inline]
    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    /// Shared read access to the payload bytes.
    pub fn read(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        RwLockReadGuard::map(self.storage.read(), Storage::as_slice)
    }

    /// Exclusive write access to the payload bytes.
    pub fn write(&self) -> MappedRwLockWriteGuard<'_, [u8]> {
        RwLockWriteGuard::map(self.storage.write(), Storage::as_mut_slice)
    }

    /// Copy the payload out into an owned vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.read().to_vec()
    }

    /// Zero-copy view of an element range of this buffer.
    ///
    /// Returns `None` if the range is out of bounds. The view aliases the
    /// buffer's storage; it must not be retained past the buffer's release.
    pub fn view(&self, elements: Range<usize>) -> Option<BufferView> {
        let elem_size = self.dtype.size_of();
        let offset = elements.start.checked_mul(elem_size)?;
        let end = elements.end.checked_mul(elem_size)?;
        if elements.start > elements.end || end > self.size_bytes as usize {
            return None;
        }
        Some(BufferView {
            storage: Arc::clone(&self.storage),
            offset,
            len: end - offset,
        })
    }
}

/// A borrowed sub-region of a buffer.
///
/// Resolved against the owning storage at access time. Mutating through the
/// view is observable through every handle of the same buffer — there is no
/// hidden copy.
#[derive(Clone)]
pub struct BufferView {
    storage: SharedStorage,
    offset: usize,
    len: usize,
}

impl BufferView {
    pub(crate) fn new(storage: SharedStorage, offset: usize, len: usize) -> Self {
        Self {
            storage,
            offset,
            len,
        }
    }

    /// Byte offset of the view within its buffer.
    #[inline]
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Length of the view in bytes.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the view is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Shared read access to the viewed bytes.
    pub fn read(&self) -> MappedRwLockReadGuard<'_, [u8]> {
        let (offset, len) = (self.offset, self.len);
        RwLockReadGuard::map(self.storage.read(), |s| &s.as_slice()[offset..offset + len])
    }

    /// Exclusive write access to the viewed bytes.
    pub fn write(&self) -> MappedRwLockWriteGuard<'_, [u8]> {
        let (offset, len) = (self.offset, self.len);
        RwLockWriteGuard::map(self.storage.write(), |s| {
            &mut s.as_mut_slice()[offset..offset + len]
        })
    }

    /// Copy the viewed bytes out into an owned vector.
    pub fn to_vec(&self) -> Vec<u8> {
        self.read().to_vec()
    }
}
