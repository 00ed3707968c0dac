//! Explicit free-list maintenance.
//!
//! Free blocks are threaded into a doubly-linked list whose links live
//! inside the free payload: the word after the header holds the offset to
//! the next free header (zero terminates the chain), and the word before
//! the footer holds the offset from the previous free header to this one
//! (from the prologue, for the head of the list). The prologue word stores
//! the offset of the head.
//!
//! The list is not an independent data structure: it is a view over the
//! tiled heap, kept in strictly increasing address order so that insertion
//! can locate a block's successor with a forward scan.

use tagheap_abi::{MIN_BLOCK_WORDS, WordIdx, WordOffset};

use crate::error::{HeapError, HeapResult};
use crate::region::HeapRegion;
use crate::tags::read_tag;

/// List head stored in the prologue word, `None` when the list is empty.
pub fn head(region: &HeapRegion) -> Option<WordIdx> {
    let off = WordOffset::from_link(region.read_word(WordIdx::PROLOGUE));
    if off.is_none() {
        None
    } else {
        Some(WordIdx::PROLOGUE.forward(off))
    }
}

fn set_head(region: &mut HeapRegion, new_head: Option<WordIdx>) {
    let link = match new_head {
        Some(idx) => idx.as_usize() as u32,
        None => 0,
    };
    region.write_word(WordIdx::PROLOGUE, link);
}

fn next_slot(header: WordIdx) -> WordIdx {
    header.add_words(1)
}

fn prev_slot(region: &HeapRegion, header: WordIdx) -> WordIdx {
    let size = read_tag(region, header).size_words();
    header.add_words(size - 2)
}

/// Successor of a listed block, following its embedded link.
pub fn next_of(region: &HeapRegion, header: WordIdx) -> Option<WordIdx> {
    let off = WordOffset::from_link(region.read_word(next_slot(header)));
    if off.is_none() {
        None
    } else {
        Some(header.forward(off))
    }
}

fn set_next(region: &mut HeapRegion, header: WordIdx, off: WordOffset) {
    region.write_word(next_slot(header), off.link_value());
}

fn prev_offset(region: &HeapRegion, header: WordIdx) -> WordOffset {
    WordOffset::from_link(region.read_word(prev_slot(region, header)))
}

fn set_prev(region: &mut HeapRegion, header: WordIdx, off: WordOffset) {
    let slot = prev_slot(region, header);
    region.write_word(slot, off.link_value());
}

/// Link a freshly freed, fully coalesced block into the list.
pub fn insert(region: &mut HeapRegion, frontier: WordIdx, block: WordIdx) -> HeapResult {
    let size = read_tag(region, block).size_words();
    if size < MIN_BLOCK_WORDS {
        return Err(HeapError::InvalidBlockSize { words: size });
    }

    if head(region).is_none() {
        // First free block: the prologue points at it, and its prev link
        // records the full distance back to the prologue.
        let off = block
            .offset_from(WordIdx::PROLOGUE)
            .ok_or(HeapError::ListInconsistent {
                at: block.as_usize(),
            })?;
        set_head(region, Some(block));
        set_prev(region, block, off);
        set_next(region, block, WordOffset::NONE);
        return Ok(());
    }

    // Locate the successor: the first free header after the block in
    // address order, found by stepping block-by-block toward the frontier.
    let mut cur = block.add_words(size);
    let mut successor = None;
    while cur < frontier {
        let tag = read_tag(region, cur);
        if tag.is_free() {
            successor = Some(cur);
            break;
        }
        if tag.size_words() == 0 {
            return Err(HeapError::CorruptMetadata { at: cur.as_usize() });
        }
        cur = cur.add_words(tag.size_words());
    }

    match successor {
        Some(succ) => {
            // The successor's prev link identifies the predecessor, which
            // may be the prologue itself.
            let pred =
                succ.rewind(prev_offset(region, succ))
                    .ok_or(HeapError::ListInconsistent {
                        at: succ.as_usize(),
                    })?;
            let block_from_pred =
                block.offset_from(pred).ok_or(HeapError::ListInconsistent {
                    at: block.as_usize(),
                })?;
            let succ_from_block =
                succ.offset_from(block).ok_or(HeapError::ListInconsistent {
                    at: succ.as_usize(),
                })?;
            set_prev(region, block, block_from_pred);
            set_next(region, block, succ_from_block);
            set_prev(region, succ, succ_from_block);
            if pred.is_prologue() {
                set_head(region, Some(block));
            } else {
                set_next(region, pred, block_from_pred);
            }
        }
        None => {
            // No free block after this one: walk back footer-by-footer to
            // the closest free block, which becomes the predecessor.
            set_next(region, block, WordOffset::NONE);
            let mut cur = block;
            let mut pred = None;
            while cur.as_usize() > 1 {
                let Some(pf) = cur.checked_sub_words(1) else {
                    break;
                };
                let tag = read_tag(region, pf);
                let prev_size = tag.size_words();
                if prev_size == 0 {
                    return Err(HeapError::CorruptMetadata { at: pf.as_usize() });
                }
                let Some(prev_header) = cur.checked_sub_words(prev_size) else {
                    return Err(HeapError::CorruptMetadata { at: pf.as_usize() });
                };
                if prev_header.is_prologue() {
                    return Err(HeapError::CorruptMetadata { at: pf.as_usize() });
                }
                if tag.is_free() {
                    pred = Some(prev_header);
                    break;
                }
                cur = prev_header;
            }
            let Some(pred) = pred else {
                // The prologue claimed a non-empty list, but nothing free
                // exists below the block either.
                return Err(HeapError::ListInconsistent {
                    at: block.as_usize(),
                });
            };
            let off = block.offset_from(pred).ok_or(HeapError::ListInconsistent {
                at: block.as_usize(),
            })?;
            set_prev(region, block, off);
            set_next(region, pred, off);
        }
    }
    Ok(())
}

/// Splice a block out of the list, because it is being handed out or
/// absorbed by a coalescing neighbor.
pub fn remove(region: &mut HeapRegion, block: WordIdx) -> HeapResult {
    let size = read_tag(region, block).size_words();
    if size < MIN_BLOCK_WORDS {
        return Err(HeapError::InvalidBlockSize { words: size });
    }

    let next_off = WordOffset::from_link(region.read_word(next_slot(block)));
    let prev_off = prev_offset(region, block);

    // Even the head of the list carries a non-zero prev link: its distance
    // from the prologue.
    let pred = if prev_off.is_none() {
        return Err(HeapError::ListInconsistent {
            at: block.as_usize(),
        });
    } else {
        block.rewind(prev_off).ok_or(HeapError::ListInconsistent {
            at: block.as_usize(),
        })?
    };

    if next_off.is_none() {
        if pred.is_prologue() {
            set_head(region, None);
        } else {
            set_next(region, pred, WordOffset::NONE);
        }
        return Ok(());
    }

    let succ = block.forward(next_off);
    if !region.contains(succ) {
        return Err(HeapError::ListInconsistent {
            at: block.as_usize(),
        });
    }
    let spliced = prev_off + next_off;
    set_prev(region, succ, spliced);
    if pred.is_prologue() {
        set_head(region, Some(succ));
    } else {
        set_next(region, pred, spliced);
    }
    Ok(())
}
