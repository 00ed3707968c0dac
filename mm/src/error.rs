//! Unified error type for the allocator.
//!
//! Every fallible step of the engine reports through [`HeapError`]; the
//! public pointer-returning entry points translate the variants into null
//! returns and diagnostics. Errors are local to a single call; the
//! allocator never latches into a broken state on a recoverable failure.

use core::fmt;

/// Allocator error.
///
/// `NoMemory` and `RequestTooLarge` are the recoverable out-of-memory
/// family. `InvalidPointer` covers client mistakes rejected without
/// mutation. The remaining variants indicate metadata damage detected
/// mid-operation; the current operation aborts and leaves state as-is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeapError {
    NoMemory,
    NotInitialized,
    RequestTooLarge { bytes: usize },
    InvalidPointer { addr: usize },
    InvalidBlockSize { words: usize },
    OutOfRegion { idx: usize },
    CorruptMetadata { at: usize },
    ListInconsistent { at: usize },
}

impl fmt::Display for HeapError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoMemory => write!(f, "out of memory, region refused to grow"),
            Self::NotInitialized => write!(f, "heap not initialized"),
            Self::RequestTooLarge { bytes } => {
                write!(f, "request of {} bytes is not representable", bytes)
            }
            Self::InvalidPointer { addr } => {
                write!(f, "pointer at region offset {:#x} is not a live payload", addr)
            }
            Self::InvalidBlockSize { words } => {
                write!(f, "block size of {} words is not legal", words)
            }
            Self::OutOfRegion { idx } => {
                write!(f, "word index {} falls outside the managed region", idx)
            }
            Self::CorruptMetadata { at } => {
                write!(f, "corrupt boundary tag near word {}", at)
            }
            Self::ListInconsistent { at } => {
                write!(f, "free list inconsistent near word {}", at)
            }
        }
    }
}

/// Convenience result type for allocator operations.
pub type HeapResult<T = ()> = Result<T, HeapError>;
