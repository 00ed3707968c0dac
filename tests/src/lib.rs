#![no_std]

//! Suite registry for the allocator workspace.
//!
//! Each suite is a plain static built by `define_test_suite!`; the harness
//! binary walks `all_suites` and runs them in order. Every test initializes
//! its own heap episode, so suite order carries no state.

use tagheap_lib::define_test_suite;
use tagheap_lib::testing::TestSuiteDesc;
use tagheap_mm::tests as mm_tests;

define_test_suite!(
    heap_core,
    [
        mm_tests::test_init_state,
        mm_tests::test_tag_codec,
        mm_tests::test_allocate_alignment,
        mm_tests::test_allocate_exact_layout,
        mm_tests::test_allocate_zero_bytes,
        mm_tests::test_reuse_after_terminal_free,
        mm_tests::test_reuse_from_free_block,
        mm_tests::test_split_on_partial_reuse,
        mm_tests::test_forward_coalesce,
        mm_tests::test_backward_coalesce,
        mm_tests::test_coalesce_both_sides,
        mm_tests::test_terminal_free_retracts,
        mm_tests::test_free_null_noop,
        mm_tests::test_free_invalid_pointer,
        mm_tests::test_heap_grows_on_demand,
        mm_tests::test_oom_returns_null_and_recovers,
    ]
);

define_test_suite!(
    heap_realloc,
    [
        mm_tests::test_realloc_grow_in_place,
        mm_tests::test_realloc_grow_with_tail_split,
        mm_tests::test_realloc_copies_payload,
        mm_tests::test_realloc_shrink_is_noop,
        mm_tests::test_realloc_null_allocates,
        mm_tests::test_realloc_zero_frees,
        mm_tests::test_realloc_same_size_idempotent,
    ]
);

define_test_suite!(
    heap_policy,
    [
        mm_tests::test_first_fit_prefers_lowest,
        mm_tests::test_best_fit_prefers_tightest,
        mm_tests::test_modes_agree_on_trace,
        mm_tests::test_mixed_trace_implicit,
        mm_tests::test_mixed_trace_best_fit,
    ]
);

define_test_suite!(
    heap_explicit,
    [
        mm_tests::test_explicit_list_basics,
        mm_tests::test_explicit_list_order,
        mm_tests::test_explicit_allocate_from_middle,
        mm_tests::test_explicit_coalesce_updates_list,
        mm_tests::test_explicit_retract_after_merge,
        mm_tests::test_mixed_trace_explicit,
    ]
);

pub fn all_suites() -> [&'static TestSuiteDesc; 4] {
    [
        &HEAP_CORE_SUITE,
        &HEAP_REALLOC_SUITE,
        &HEAP_POLICY_SUITE,
        &HEAP_EXPLICIT_SUITE,
    ]
}
