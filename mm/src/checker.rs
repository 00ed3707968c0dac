//! Whole-heap integrity verification.
//!
//! The checker walks the tiled region front to back and, in explicit mode,
//! chases the embedded list as well. It never mutates; violations are
//! collected into a flag set so one pass reports everything it saw.

use bitflags::bitflags;

use tagheap_abi::WordIdx;

use crate::free_list;
use crate::nav;
use crate::region::HeapRegion;
use crate::search::SearchPolicy;
use crate::tags::read_tag;

bitflags! {
    /// Invariant violations observed during a heap walk.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
    pub struct CheckViolations: u32 {
        /// A block reported a zero size; the walk cannot continue.
        const NONPOSITIVE_SIZE = 1 << 0;
        /// Header and footer words disagree.
        const TAG_MISMATCH = 1 << 1;
        /// Two neighboring blocks are both free.
        const ADJACENT_FREE = 1 << 2;
        /// A block's extent crosses the bump frontier.
        const FRONTIER_OVERRUN = 1 << 3;
        /// The explicit list reached an allocated block.
        const LIST_NOT_FREE = 1 << 4;
        /// The explicit list is not in increasing address order.
        const LIST_OUT_OF_ORDER = 1 << 5;
        /// A list link points outside the tiled region.
        const LIST_BAD_LINK = 1 << 6;
        /// The list does not visit every free block exactly once.
        const LIST_COUNT_MISMATCH = 1 << 7;
    }
}

/// Outcome of one integrity walk, with the block tallies gathered along
/// the way.
#[derive(Clone, Copy, Debug, Default)]
pub struct HeapCheckReport {
    pub violations: CheckViolations,
    pub free_blocks: u32,
    pub allocated_blocks: u32,
    pub free_words: usize,
    pub allocated_words: usize,
}

impl HeapCheckReport {
    pub fn is_ok(&self) -> bool {
        self.violations.is_empty()
    }
}

/// Verify every inter-operation invariant the engine promises: gap-free
/// tiling up to the frontier, mirrored tags, eager coalescing, and (in
/// explicit mode) an exact, address-ordered free list.
pub fn check_heap(region: &HeapRegion, frontier: WordIdx, policy: SearchPolicy) -> HeapCheckReport {
    let mut report = HeapCheckReport::default();

    let mut cur = WordIdx::new(1);
    let mut prev_free = false;
    while cur < frontier {
        let header = read_tag(region, cur);
        let size = header.size_words();
        if size == 0 {
            report.violations |= CheckViolations::NONPOSITIVE_SIZE;
            break;
        }
        let Some(end) = cur.checked_add_words(size) else {
            report.violations |= CheckViolations::FRONTIER_OVERRUN;
            break;
        };
        if end > frontier {
            report.violations |= CheckViolations::FRONTIER_OVERRUN;
            break;
        }
        let footer = read_tag(region, nav::footer_of(region, cur));
        if footer.raw() != header.raw() {
            report.violations |= CheckViolations::TAG_MISMATCH;
        }
        if header.is_free() {
            if prev_free {
                report.violations |= CheckViolations::ADJACENT_FREE;
            }
            report.free_blocks += 1;
            report.free_words += size;
            prev_free = true;
        } else {
            report.allocated_blocks += 1;
            report.allocated_words += size;
            prev_free = false;
        }
        cur = end;
    }

    if policy.uses_explicit_list() {
        check_free_list(region, frontier, &mut report);
    }
    report
}

fn check_free_list(region: &HeapRegion, frontier: WordIdx, report: &mut HeapCheckReport) {
    let mut seen = 0u32;
    let mut prev = WordIdx::PROLOGUE;
    let mut broken = false;
    let mut cur = free_list::head(region);

    while let Some(block) = cur {
        if block >= frontier {
            report.violations |= CheckViolations::LIST_BAD_LINK;
            broken = true;
            break;
        }
        if block <= prev {
            report.violations |= CheckViolations::LIST_OUT_OF_ORDER;
            broken = true;
            break;
        }
        if !read_tag(region, block).is_free() {
            report.violations |= CheckViolations::LIST_NOT_FREE;
            broken = true;
            break;
        }
        seen += 1;
        prev = block;
        cur = free_list::next_of(region, block);
    }

    if !broken && seen != report.free_blocks {
        report.violations |= CheckViolations::LIST_COUNT_MISMATCH;
    }
}
