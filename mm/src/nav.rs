//! Block navigation and pointer validation.

use tagheap_abi::WordIdx;

use crate::region::HeapRegion;
use crate::tags::read_tag;

/// Header of the block whose payload starts at `payload`. `None` when the
/// payload index cannot belong to a block (it would put the header at or
/// before the prologue).
pub fn header_of(payload: WordIdx) -> Option<WordIdx> {
    payload.checked_sub_words(1).filter(|h| !h.is_prologue())
}

/// Footer of the block at `header`, per its recorded size.
pub fn footer_of(region: &HeapRegion, header: WordIdx) -> WordIdx {
    let size = read_tag(region, header).size_words();
    header.add_words(size.saturating_sub(1))
}

/// Header of the next block in address order.
pub fn next_header(region: &HeapRegion, header: WordIdx) -> WordIdx {
    header.add_words(read_tag(region, header).size_words())
}

/// Footer of the previous block, `None` for the first block in the heap.
pub fn prev_footer(header: WordIdx) -> Option<WordIdx> {
    if header.as_usize() > 1 {
        header.checked_sub_words(1)
    } else {
        None
    }
}

/// A header is valid iff it lies strictly inside the mapped region, its
/// recorded size puts the footer inside the region too, and the footer
/// falls after the header. Anything else is rejected before the engine
/// mutates a single word.
pub fn is_valid_header(region: &HeapRegion, header: WordIdx) -> bool {
    let Some(end) = region.last_word() else {
        return false;
    };
    if header.is_prologue() || header > end {
        return false;
    }
    let size = read_tag(region, header).size_words();
    if size < 2 {
        return false;
    }
    let Some(footer) = header.checked_add_words(size - 1) else {
        return false;
    };
    footer <= end && footer > header
}
