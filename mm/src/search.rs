//! Free-block discovery strategies.

use tagheap_abi::WordIdx;

use crate::error::{HeapError, HeapResult};
use crate::free_list;
use crate::region::HeapRegion;
use crate::tags::read_tag;

/// How the allocation engine hunts for a free block.
///
/// The original design selected the list layout at compile time; here it is
/// a runtime strategy so that both layouts drive the same engine and the
/// same test traces.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchPolicy {
    /// Address-ordered scan over every block, first fit wins.
    ImplicitFirstFit,
    /// Address-ordered scan keeping the tightest fit, early exit on an
    /// exact match.
    ImplicitBestFit,
    /// Follow the links embedded in free payloads, visiting free blocks
    /// only.
    ExplicitFirstFit,
}

impl SearchPolicy {
    /// Whether free blocks must be threaded into the explicit list.
    pub fn uses_explicit_list(self) -> bool {
        matches!(self, Self::ExplicitFirstFit)
    }
}

/// Find a free block of at least `want_words`, or `None` when only the
/// bump frontier can satisfy the request.
pub fn find_fit(
    region: &HeapRegion,
    frontier: WordIdx,
    policy: SearchPolicy,
    want_words: usize,
) -> HeapResult<Option<WordIdx>> {
    match policy {
        SearchPolicy::ImplicitFirstFit => first_fit_implicit(region, frontier, want_words),
        SearchPolicy::ImplicitBestFit => best_fit_implicit(region, frontier, want_words),
        SearchPolicy::ExplicitFirstFit => first_fit_explicit(region, frontier, want_words),
    }
}

fn first_fit_implicit(
    region: &HeapRegion,
    frontier: WordIdx,
    want_words: usize,
) -> HeapResult<Option<WordIdx>> {
    let mut cur = WordIdx::new(1);
    while cur < frontier {
        let tag = read_tag(region, cur);
        let size = tag.size_words();
        if size == 0 {
            // A zero-sized block would loop forever; the walk aborts.
            return Err(HeapError::CorruptMetadata { at: cur.as_usize() });
        }
        if tag.is_free() && size >= want_words {
            return Ok(Some(cur));
        }
        cur = cur.add_words(size);
    }
    Ok(None)
}

fn best_fit_implicit(
    region: &HeapRegion,
    frontier: WordIdx,
    want_words: usize,
) -> HeapResult<Option<WordIdx>> {
    let mut cur = WordIdx::new(1);
    let mut best: Option<(WordIdx, usize)> = None;
    while cur < frontier {
        let tag = read_tag(region, cur);
        let size = tag.size_words();
        if size == 0 {
            return Err(HeapError::CorruptMetadata { at: cur.as_usize() });
        }
        if tag.is_free() && size >= want_words {
            if size == want_words {
                return Ok(Some(cur));
            }
            if best.is_none_or(|(_, best_size)| size < best_size) {
                best = Some((cur, size));
            }
        }
        cur = cur.add_words(size);
    }
    Ok(best.map(|(idx, _)| idx))
}

fn first_fit_explicit(
    region: &HeapRegion,
    frontier: WordIdx,
    want_words: usize,
) -> HeapResult<Option<WordIdx>> {
    let mut cur = free_list::head(region);
    while let Some(block) = cur {
        if block >= frontier {
            return Err(HeapError::ListInconsistent {
                at: block.as_usize(),
            });
        }
        let tag = read_tag(region, block);
        if !tag.is_free() {
            return Err(HeapError::ListInconsistent {
                at: block.as_usize(),
            });
        }
        if tag.size_words() >= want_words {
            return Ok(Some(block));
        }
        cur = free_list::next_of(region, block);
    }
    Ok(None)
}
