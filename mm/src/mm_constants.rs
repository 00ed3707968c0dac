//! Tunables for the block allocator and its simulated region.

use tagheap_abi::WORD_SIZE;

/// Bytes claimed from the region by `heap_init`.
pub const INITIAL_HEAP_BYTES: usize = 1 << 8;

/// Extension granularity when the bump frontier runs out of mapped space.
pub const GROW_CHUNK_BYTES: usize = 1 << 12;

/// Hard ceiling of the simulated region; `extend` refuses growth past it.
pub const HEAP_CAPACITY_BYTES: usize = 4 << 20;

pub const HEAP_CAPACITY_WORDS: usize = HEAP_CAPACITY_BYTES / WORD_SIZE;
