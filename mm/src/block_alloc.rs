//! The block allocation engine.
//!
//! One engine serves both list layouts: the discovery strategy and the
//! post-free bookkeeping are selected by [`SearchPolicy`]. All internal
//! addressing is word-index based; raw pointers exist only in the thin
//! public wrappers at the bottom of this module, which guard a process-wide
//! [`Allocator`] instance behind a mutex and translate between client
//! pointers and payload indices.

use core::ffi::{c_int, c_void};
use core::ptr;

use spin::Mutex;

use tagheap_abi::{MIN_BLOCK_WORDS, PAYLOAD_ALIGN, WORD_SIZE, WordIdx};
use tagheap_lib::{align_up_usize, klog_debug, klog_error, klog_info, klog_warn};

use crate::checker::{HeapCheckReport, check_heap};
use crate::error::{HeapError, HeapResult};
use crate::free_list;
use crate::mm_constants::{GROW_CHUNK_BYTES, INITIAL_HEAP_BYTES};
use crate::nav;
use crate::region::HeapRegion;
use crate::search::{SearchPolicy, find_fit};
use crate::tags::{BlockStatus, read_tag, write_block_tags, write_tag};

/// Aggregate view over the heap, combining walked tallies with the
/// operation counters kept by the engine.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapStats {
    pub total_size: usize,
    pub allocated_size: usize,
    pub free_size: usize,
    pub total_blocks: u32,
    pub allocated_blocks: u32,
    pub free_blocks: u32,
    pub allocation_count: u32,
    pub free_count: u32,
    pub realloc_count: u32,
    pub failed_allocations: u32,
}

/// Instantaneous engine state, for diagnostics and tests.
#[derive(Clone, Copy, Debug)]
pub struct HeapSnapshot {
    pub frontier_words: usize,
    pub mapped_bytes: usize,
    pub free_list_head: Option<usize>,
    pub policy: SearchPolicy,
}

/// Size and status of the block owning a payload pointer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
    pub size_words: usize,
    pub allocated: bool,
}

struct Allocator {
    region: HeapRegion,
    /// One past the last tiled word; fresh blocks are carved here.
    frontier: WordIdx,
    policy: SearchPolicy,
    allocation_count: u32,
    free_count: u32,
    realloc_count: u32,
    failed_allocations: u32,
    initialized: bool,
    diagnostics_enabled: bool,
}

impl Allocator {
    const fn new() -> Self {
        Self {
            region: HeapRegion::unattached(),
            frontier: WordIdx::PROLOGUE,
            policy: SearchPolicy::ImplicitFirstFit,
            allocation_count: 0,
            free_count: 0,
            realloc_count: 0,
            failed_allocations: 0,
            initialized: false,
            diagnostics_enabled: true,
        }
    }

    fn init(&mut self, policy: SearchPolicy) -> HeapResult {
        self.region.reset();
        self.region.extend(INITIAL_HEAP_BYTES)?;
        self.region.write_word(WordIdx::PROLOGUE, 0);
        self.frontier = WordIdx::new(1);
        self.policy = policy;
        self.allocation_count = 0;
        self.free_count = 0;
        self.realloc_count = 0;
        self.failed_allocations = 0;
        self.initialized = true;
        Ok(())
    }

    fn allocate(&mut self, bytes: usize) -> HeapResult<WordIdx> {
        if !self.initialized {
            return Err(HeapError::NotInitialized);
        }
        let block_words = block_words_for(bytes);
        let block_bytes = block_words
            .checked_mul(WORD_SIZE)
            .ok_or(HeapError::RequestTooLarge { bytes })?;

        if let Some(found) = find_fit(&self.region, self.frontier, self.policy, block_words)? {
            return self.place(found, block_words);
        }

        while self.region.size_bytes() - self.frontier.byte_offset() < block_bytes {
            if self.region.extend(GROW_CHUNK_BYTES).is_err() {
                if let Some((idx, words)) = self.largest_free_block() {
                    klog_debug!(
                        "heap: region exhausted; largest free block at word {} spans {} words",
                        idx.as_usize(),
                        words
                    );
                }
                return Err(HeapError::NoMemory);
            }
        }

        let block = self.frontier;
        self.frontier = block.add_words(block_words);
        write_block_tags(
            &mut self.region,
            block,
            block_words,
            BlockStatus::Allocated,
            self.frontier,
        )?;
        Ok(block.add_words(1))
    }

    /// Hand out a discovered free block, splitting off the remainder when
    /// a minimum-sized block is left over.
    fn place(&mut self, found: WordIdx, block_words: usize) -> HeapResult<WordIdx> {
        if self.policy.uses_explicit_list() {
            free_list::remove(&mut self.region, found)?;
        }
        let found_words = read_tag(&self.region, found).size_words();
        let leftover = found_words - block_words;
        if leftover < MIN_BLOCK_WORDS {
            write_block_tags(
                &mut self.region,
                found,
                found_words,
                BlockStatus::Allocated,
                self.frontier,
            )?;
        } else {
            // Both sub-blocks get tags before the remainder re-enters the
            // free path, so the engine never recurses over half-written
            // metadata.
            write_block_tags(
                &mut self.region,
                found,
                block_words,
                BlockStatus::Allocated,
                self.frontier,
            )?;
            let remainder = found.add_words(block_words);
            write_block_tags(
                &mut self.region,
                remainder,
                leftover,
                BlockStatus::Free,
                self.frontier,
            )?;
            self.release_block(remainder)?;
        }
        Ok(found.add_words(1))
    }

    fn free_payload(&mut self, payload: WordIdx) -> HeapResult {
        if !self.initialized {
            return Err(HeapError::NotInitialized);
        }
        let header = nav::header_of(payload).ok_or(HeapError::InvalidPointer {
            addr: payload.byte_offset(),
        })?;
        if !nav::is_valid_header(&self.region, header) || header >= self.frontier {
            return Err(HeapError::InvalidPointer {
                addr: payload.byte_offset(),
            });
        }
        if read_tag(&self.region, header).is_free() {
            // Freeing a free block would coalesce it with itself.
            return Err(HeapError::InvalidPointer {
                addr: payload.byte_offset(),
            });
        }
        self.release_block(header)
    }

    /// The free engine proper: eager bidirectional coalescing, then either
    /// bump-frontier retraction (terminal block) or list insertion.
    fn release_block(&mut self, header: WordIdx) -> HeapResult {
        let mut header = header;
        let mut size = read_tag(&self.region, header).size_words();

        // Forward: absorb a free right-hand neighbor.
        let next = header.add_words(size);
        if next < self.frontier && read_tag(&self.region, next).is_free() {
            let next_size = read_tag(&self.region, next).size_words();
            let total = size
                .checked_add(next_size)
                .ok_or(HeapError::CorruptMetadata {
                    at: next.as_usize(),
                })?;
            if next_size == 0
                || total
                    .checked_mul(WORD_SIZE)
                    .is_none_or(|bytes| bytes > self.region.size_bytes())
            {
                return Err(HeapError::CorruptMetadata {
                    at: next.as_usize(),
                });
            }
            if self.policy.uses_explicit_list() {
                free_list::remove(&mut self.region, next)?;
            }
            write_block_tags(
                &mut self.region,
                header,
                total,
                BlockStatus::Free,
                self.frontier,
            )?;
            size = total;
        }

        // Backward: merge into a free left-hand neighbor.
        if let Some(prev_footer) = nav::prev_footer(header) {
            let prev_tag = read_tag(&self.region, prev_footer);
            if prev_tag.is_free() {
                let prev_size = prev_tag.size_words();
                let total = prev_size
                    .checked_add(size)
                    .ok_or(HeapError::CorruptMetadata {
                        at: prev_footer.as_usize(),
                    })?;
                if prev_size == 0
                    || total
                        .checked_mul(WORD_SIZE)
                        .is_none_or(|bytes| bytes > self.region.size_bytes())
                {
                    return Err(HeapError::CorruptMetadata {
                        at: prev_footer.as_usize(),
                    });
                }
                let prev_header = header
                    .checked_sub_words(prev_size)
                    .filter(|h| !h.is_prologue())
                    .ok_or(HeapError::CorruptMetadata {
                        at: prev_footer.as_usize(),
                    })?;
                if self.policy.uses_explicit_list() {
                    free_list::remove(&mut self.region, prev_header)?;
                }
                write_block_tags(
                    &mut self.region,
                    prev_header,
                    total,
                    BlockStatus::Free,
                    self.frontier,
                )?;
                header = prev_header;
                size = total;
            }
        }

        // Flip the tags free even when no neighbor was merged.
        let tag = read_tag(&self.region, header).with_status(BlockStatus::Free);
        write_tag(&mut self.region, header, tag);
        write_tag(&mut self.region, header.add_words(size - 1), tag);

        if header.add_words(size) == self.frontier {
            // Terminal block: hand the region back to the bump frontier.
            self.frontier = header;
        } else if self.policy.uses_explicit_list() {
            free_list::insert(&mut self.region, self.frontier, header)?;
        }
        Ok(())
    }

    fn reallocate(&mut self, payload: WordIdx, bytes: usize) -> HeapResult<WordIdx> {
        if !self.initialized {
            return Err(HeapError::NotInitialized);
        }
        let header = nav::header_of(payload).ok_or(HeapError::InvalidPointer {
            addr: payload.byte_offset(),
        })?;
        if !nav::is_valid_header(&self.region, header) || header >= self.frontier {
            return Err(HeapError::InvalidPointer {
                addr: payload.byte_offset(),
            });
        }
        if read_tag(&self.region, header).is_free() {
            return Err(HeapError::InvalidPointer {
                addr: payload.byte_offset(),
            });
        }
        let old_words = read_tag(&self.region, header).size_words();
        let new_words = block_words_for(bytes);

        if new_words <= old_words {
            // Shrinks keep the block as-is at this granularity.
            return Ok(payload);
        }

        // Grow in place by absorbing a free right-hand neighbor.
        let next = nav::next_header(&self.region, header);
        if next < self.frontier && read_tag(&self.region, next).is_free() {
            let next_size = read_tag(&self.region, next).size_words();
            let merged = old_words
                .checked_add(next_size)
                .ok_or(HeapError::CorruptMetadata {
                    at: next.as_usize(),
                })?;
            if merged >= new_words {
                if self.policy.uses_explicit_list() {
                    free_list::remove(&mut self.region, next)?;
                }
                let tail = merged - new_words;
                if tail >= MIN_BLOCK_WORDS {
                    write_block_tags(
                        &mut self.region,
                        header,
                        new_words,
                        BlockStatus::Allocated,
                        self.frontier,
                    )?;
                    let tail_header = header.add_words(new_words);
                    write_block_tags(
                        &mut self.region,
                        tail_header,
                        tail,
                        BlockStatus::Allocated,
                        self.frontier,
                    )?;
                    self.release_block(tail_header)?;
                } else {
                    write_block_tags(
                        &mut self.region,
                        header,
                        merged,
                        BlockStatus::Allocated,
                        self.frontier,
                    )?;
                }
                return Ok(payload);
            }
        }

        // No room in place: allocate elsewhere, carry the payload over,
        // release the old block.
        let new_payload = self.allocate(bytes)?;
        let copy_bytes = bytes.min((old_words - 2) * WORD_SIZE);
        self.region.copy_payload_bytes(payload, new_payload, copy_bytes);
        self.release_block(header)?;
        Ok(new_payload)
    }

    /// Largest free block currently tiled, for out-of-memory diagnostics.
    fn largest_free_block(&self) -> Option<(WordIdx, usize)> {
        let mut cur = WordIdx::new(1);
        let mut best: Option<(WordIdx, usize)> = None;
        while cur < self.frontier {
            let tag = read_tag(&self.region, cur);
            let size = tag.size_words();
            if size == 0 {
                break;
            }
            if tag.is_free() && best.is_none_or(|(_, best_size)| size > best_size) {
                best = Some((cur, size));
            }
            cur = cur.add_words(size);
        }
        best
    }
}

/// Words needed for a block serving `bytes` of payload: the 8-aligned
/// payload plus header and footer, never below the block minimum.
fn block_words_for(bytes: usize) -> usize {
    let rounded = align_up_usize(bytes, PAYLOAD_ALIGN);
    let words = rounded / WORD_SIZE + 2;
    words.max(MIN_BLOCK_WORDS)
}

static HEAP: Mutex<Allocator> = Mutex::new(Allocator::new());

/// Reset the allocator and claim the initial region. Returns 0 on success.
pub fn heap_init() -> c_int {
    heap_init_with_policy(SearchPolicy::ImplicitFirstFit)
}

pub fn heap_init_with_policy(policy: SearchPolicy) -> c_int {
    let mut heap = HEAP.lock();
    match heap.init(policy) {
        Ok(()) => {
            klog_debug!(
                "heap: initialized with {} bytes, policy {:?}",
                heap.region.size_bytes(),
                policy
            );
            0
        }
        Err(err) => {
            klog_error!("heap_init: {}", err);
            -1
        }
    }
}

/// Allocate `size` bytes; the returned payload pointer is 8-byte aligned.
/// Null signals out-of-memory (or an unserviceable request).
pub fn heap_allocate(size: usize) -> *mut c_void {
    let mut heap = HEAP.lock();
    match heap.allocate(size) {
        Ok(payload) => {
            heap.allocation_count += 1;
            heap.region.word_ptr(payload) as *mut c_void
        }
        Err(HeapError::NoMemory | HeapError::RequestTooLarge { .. }) => {
            heap.failed_allocations += 1;
            klog_debug!("heap_allocate: cannot serve {} bytes", size);
            ptr::null_mut()
        }
        Err(err) => {
            heap.failed_allocations += 1;
            klog_error!("heap_allocate: {}", err);
            ptr::null_mut()
        }
    }
}

/// Return a payload to the heap. Null is a no-op; anything that does not
/// name a live allocated payload is diagnosed and ignored.
pub fn heap_free(ptr_in: *mut c_void) {
    if ptr_in.is_null() {
        return;
    }
    let mut heap = HEAP.lock();
    let Some(payload) = heap.region.index_of_ptr(ptr_in as *const u8) else {
        klog_warn!("heap_free: pointer {:p} outside managed region", ptr_in);
        return;
    };
    match heap.free_payload(payload) {
        Ok(()) => heap.free_count += 1,
        Err(err) => klog_warn!("heap_free: {}", err),
    }
}

/// Resize a payload: in place when possible, by allocate-copy-free
/// otherwise. Null `ptr_in` behaves as allocate; zero `size` frees.
pub fn heap_reallocate(ptr_in: *mut c_void, size: usize) -> *mut c_void {
    if ptr_in.is_null() {
        return heap_allocate(size);
    }
    if size == 0 {
        heap_free(ptr_in);
        return ptr::null_mut();
    }
    let mut heap = HEAP.lock();
    let Some(payload) = heap.region.index_of_ptr(ptr_in as *const u8) else {
        klog_warn!("heap_reallocate: pointer {:p} outside managed region", ptr_in);
        return ptr::null_mut();
    };
    match heap.reallocate(payload, size) {
        Ok(new_payload) => {
            heap.realloc_count += 1;
            heap.region.word_ptr(new_payload) as *mut c_void
        }
        Err(HeapError::NoMemory | HeapError::RequestTooLarge { .. }) => {
            heap.failed_allocations += 1;
            klog_debug!("heap_reallocate: cannot serve {} bytes", size);
            ptr::null_mut()
        }
        Err(err) => {
            klog_warn!("heap_reallocate: {}", err);
            ptr::null_mut()
        }
    }
}

/// Run the integrity checker, logging any violations. True means clean.
pub fn heap_check() -> bool {
    let report = heap_check_report();
    if !report.is_ok() {
        klog_warn!("heap_check: violations detected: {:?}", report.violations);
    }
    report.is_ok()
}

pub fn heap_check_report() -> HeapCheckReport {
    let heap = HEAP.lock();
    if !heap.initialized {
        return HeapCheckReport::default();
    }
    check_heap(&heap.region, heap.frontier, heap.policy)
}

pub fn heap_snapshot() -> HeapSnapshot {
    let heap = HEAP.lock();
    HeapSnapshot {
        frontier_words: heap.frontier.as_usize(),
        mapped_bytes: heap.region.size_bytes(),
        free_list_head: if heap.initialized {
            free_list::head(&heap.region).map(|idx| idx.as_usize())
        } else {
            None
        },
        policy: heap.policy,
    }
}

/// Size and status of the block owning `ptr_in`, when it names one.
pub fn heap_block_info(ptr_in: *const c_void) -> Option<BlockInfo> {
    let heap = HEAP.lock();
    if !heap.initialized {
        return None;
    }
    let payload = heap.region.index_of_ptr(ptr_in as *const u8)?;
    let header = nav::header_of(payload)?;
    if !nav::is_valid_header(&heap.region, header) {
        return None;
    }
    let tag = read_tag(&heap.region, header);
    Some(BlockInfo {
        size_words: tag.size_words(),
        allocated: tag.is_allocated(),
    })
}

/// Word index of a payload pointer inside the region, for diagnostics.
pub fn heap_payload_index(ptr_in: *const c_void) -> Option<usize> {
    let heap = HEAP.lock();
    if !heap.initialized {
        return None;
    }
    heap.region
        .index_of_ptr(ptr_in as *const u8)
        .map(|idx| idx.as_usize())
}

pub fn get_heap_stats() -> HeapStats {
    let heap = HEAP.lock();
    let mut stats = HeapStats::default();
    if !heap.initialized {
        return stats;
    }
    let report = check_heap(&heap.region, heap.frontier, heap.policy);
    stats.total_size = heap.region.size_bytes();
    stats.allocated_size = report.allocated_words * WORD_SIZE;
    stats.free_size = stats.total_size - stats.allocated_size;
    stats.total_blocks = report.allocated_blocks + report.free_blocks;
    stats.allocated_blocks = report.allocated_blocks;
    stats.free_blocks = report.free_blocks;
    stats.allocation_count = heap.allocation_count;
    stats.free_count = heap.free_count;
    stats.realloc_count = heap.realloc_count;
    stats.failed_allocations = heap.failed_allocations;
    stats
}

pub fn print_heap_stats() {
    let heap = HEAP.lock();
    if !heap.initialized {
        klog_info!("heap: not initialized");
        return;
    }
    let report = check_heap(&heap.region, heap.frontier, heap.policy);

    klog_info!("=== Heap Statistics ===");
    klog_info!("Total size: {} bytes", heap.region.size_bytes());
    klog_info!(
        "Allocated: {} bytes in {} blocks",
        report.allocated_words * WORD_SIZE,
        report.allocated_blocks
    );
    klog_info!(
        "Free: {} bytes in {} blocks",
        report.free_words * WORD_SIZE,
        report.free_blocks
    );
    klog_info!("Bump frontier: word {}", heap.frontier.as_usize());
    klog_info!("Allocations: {}", heap.allocation_count);
    klog_info!("Frees: {}", heap.free_count);
    klog_info!("Reallocations: {}", heap.realloc_count);
    klog_info!("Failed allocations: {}", heap.failed_allocations);

    if !heap.diagnostics_enabled {
        return;
    }

    let mut cur = WordIdx::new(1);
    while cur < heap.frontier {
        let tag = read_tag(&heap.region, cur);
        let size = tag.size_words();
        if size == 0 {
            break;
        }
        if tag.is_free() {
            klog_info!("Free block at word {}: {} words", cur.as_usize(), size);
        }
        cur = cur.add_words(size);
    }
}

pub fn heap_enable_diagnostics(enable: bool) {
    let mut heap = HEAP.lock();
    heap.diagnostics_enabled = enable;
}

/// # Safety
///
/// Only for harness panic recovery, when the lock may still be held by an
/// unwound frame. The caller must re-run `heap_init` before trusting the
/// heap again.
pub unsafe fn heap_force_unlock() {
    unsafe { HEAP.force_unlock() };
}
