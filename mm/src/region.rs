//! The simulated heap region.
//!
//! A real allocator sits on an `sbrk`-style page grower; here the grower is
//! simulated over a statically reserved word buffer. [`HeapRegion`] is the
//! only path to that storage: every metadata and payload access goes through
//! its bounds-asserted, index-based accessors, and the mapped prefix only
//! ever grows (until [`HeapRegion::reset`] starts a new episode).
//!
//! Addresses inside the allocator are [`WordIdx`] values; raw pointers
//! appear solely at the client boundary, where [`HeapRegion::word_ptr`] and
//! [`HeapRegion::index_of_ptr`] translate in each direction.

use core::ptr;

use tagheap_abi::{WORD_SIZE, WordIdx};

use crate::error::{HeapError, HeapResult};
use crate::mm_constants::HEAP_CAPACITY_WORDS;

/// Backing storage for the managed region. 16-byte aligned so that payloads
/// at even word indices satisfy the 8-byte client alignment guarantee.
#[repr(C, align(16))]
struct BackingStore([u32; HEAP_CAPACITY_WORDS]);

static mut BACKING: BackingStore = BackingStore([0; HEAP_CAPACITY_WORDS]);

fn backing_base() -> *mut u32 {
    // SAFETY: only the address is taken; every access to the pointee goes
    // through the bounds-checked accessors of the attached region.
    (&raw mut BACKING).cast::<u32>()
}

/// A monotonically growing window over the backing store.
///
/// `mapped_words` is what the simulated grower has handed out so far;
/// indices at or past it are unmapped and rejected by the accessors.
pub struct HeapRegion {
    base: *mut u32,
    capacity_words: usize,
    mapped_words: usize,
}

// SAFETY: the region is only reachable through the process-wide allocator
// instance, which serializes access behind its mutex.
unsafe impl Send for HeapRegion {}

impl HeapRegion {
    /// A region not yet attached to storage; `reset` attaches it.
    pub(crate) const fn unattached() -> Self {
        Self {
            base: ptr::null_mut(),
            capacity_words: 0,
            mapped_words: 0,
        }
    }

    /// Attach to the backing store with nothing mapped. Called by `init` to
    /// begin a fresh episode; prior contents become unreachable.
    pub(crate) fn reset(&mut self) {
        self.base = backing_base();
        self.capacity_words = HEAP_CAPACITY_WORDS;
        self.mapped_words = 0;
    }

    /// Grow the mapped window by `bytes`, rounded up to whole words.
    ///
    /// Fails without mutating state when the fixed capacity is exhausted,
    /// which is the simulated grower refusing the request.
    pub(crate) fn extend(&mut self, bytes: usize) -> HeapResult {
        let words = bytes.div_ceil(WORD_SIZE);
        let new_mapped = self
            .mapped_words
            .checked_add(words)
            .ok_or(HeapError::NoMemory)?;
        if self.base.is_null() || new_mapped > self.capacity_words {
            return Err(HeapError::NoMemory);
        }
        self.mapped_words = new_mapped;
        Ok(())
    }

    /// Total bytes currently managed.
    pub(crate) fn size_bytes(&self) -> usize {
        self.mapped_words * WORD_SIZE
    }

    /// Index of the last mapped word, `None` before the first extension.
    pub(crate) fn last_word(&self) -> Option<WordIdx> {
        if self.mapped_words == 0 {
            None
        } else {
            Some(WordIdx::new(self.mapped_words - 1))
        }
    }

    pub(crate) fn contains(&self, idx: WordIdx) -> bool {
        idx.as_usize() < self.mapped_words
    }

    pub(crate) fn read_word(&self, idx: WordIdx) -> u32 {
        assert!(self.contains(idx), "word read outside mapped region");
        // SAFETY: `contains` guarantees the index lies in the mapped prefix
        // of the attached backing store.
        unsafe { *self.base.add(idx.as_usize()) }
    }

    pub(crate) fn write_word(&mut self, idx: WordIdx, value: u32) {
        assert!(self.contains(idx), "word write outside mapped region");
        // SAFETY: as in `read_word`, and `&mut self` gives exclusive access.
        unsafe { *self.base.add(idx.as_usize()) = value };
    }

    /// Raw pointer to a mapped word, for the client boundary only.
    pub(crate) fn word_ptr(&self, idx: WordIdx) -> *mut u32 {
        assert!(self.contains(idx), "pointer request outside mapped region");
        // SAFETY: `contains` guarantees the index lies in the mapped prefix.
        unsafe { self.base.add(idx.as_usize()) }
    }

    /// Map a client pointer back to its word index. `None` for pointers that
    /// are null, misaligned, or outside the mapped window.
    pub(crate) fn index_of_ptr(&self, ptr_in: *const u8) -> Option<WordIdx> {
        if self.base.is_null() || ptr_in.is_null() {
            return None;
        }
        let offset = (ptr_in as usize).checked_sub(self.base as usize)?;
        if offset % WORD_SIZE != 0 {
            return None;
        }
        let idx = WordIdx::new(offset / WORD_SIZE);
        if !self.contains(idx) {
            return None;
        }
        Some(idx)
    }

    /// Copy `bytes` of payload from `src` to `dst`. The ranges must be
    /// mapped and disjoint (the engine only copies between distinct blocks).
    pub(crate) fn copy_payload_bytes(&mut self, src: WordIdx, dst: WordIdx, bytes: usize) {
        let words = bytes.div_ceil(WORD_SIZE);
        assert!(
            src.as_usize() + words <= self.mapped_words
                && dst.as_usize() + words <= self.mapped_words,
            "payload copy outside mapped region"
        );
        // SAFETY: both ranges are mapped, and the engine never reallocates a
        // block onto itself, so the ranges cannot overlap.
        unsafe {
            ptr::copy_nonoverlapping(
                self.base.add(src.as_usize()) as *const u8,
                self.base.add(dst.as_usize()) as *mut u8,
                bytes,
            );
        }
    }
}
