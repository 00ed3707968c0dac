//! Hosted harness: registers a logging backend, runs every registered
//! suite, and exits nonzero on failure.

use std::panic;
use std::process::ExitCode;

use tagheap_lib::klog::{self, KlogLevel};
use tagheap_lib::testing::TestRunSummary;
use tagheap_tests::all_suites;

fn stdout_backend(args: core::fmt::Arguments<'_>) {
    println!("{args}");
}

fn main() -> ExitCode {
    klog::klog_register_backend(stdout_backend);
    klog::klog_set_level(KlogLevel::Info);

    let mut summary = TestRunSummary::default();
    for desc in all_suites() {
        match panic::catch_unwind(|| (desc.run)()) {
            Ok(result) => {
                println!(
                    "SUITE {}: {}/{} passed",
                    result.name, result.passed, result.total
                );
                summary.absorb(&result);
            }
            Err(_) => {
                println!("SUITE {}: panicked", desc.name);
                summary.panicked += 1;
                // The unwind may have skipped the allocator's unlock.
                unsafe { tagheap_mm::block_alloc::heap_force_unlock() };
            }
        }
    }

    tagheap_mm::heap_enable_diagnostics(true);
    tagheap_mm::print_heap_stats();

    println!(
        "TOTAL: {} suites, {}/{} tests passed, {} failed, {} panicked",
        summary.suites, summary.passed, summary.total, summary.failed, summary.panicked
    );
    if summary.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}
