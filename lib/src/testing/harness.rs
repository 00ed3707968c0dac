//! Suite descriptors and result accounting for the in-tree test framework.

use crate::testing::TestResult;
use crate::{klog_debug, klog_info};

/// A named suite: a plain function that runs its tests and reports counts.
#[derive(Clone, Copy)]
pub struct TestSuiteDesc {
    pub name: &'static str,
    pub run: fn() -> TestSuiteResult,
}

/// Per-suite counters filled in by the suite runner.
#[derive(Clone, Copy, Debug)]
pub struct TestSuiteResult {
    pub name: &'static str,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub skipped: u32,
}

impl TestSuiteResult {
    pub const fn new(name: &'static str) -> Self {
        Self {
            name,
            total: 0,
            passed: 0,
            failed: 0,
            skipped: 0,
        }
    }

    pub fn record(&mut self, result: TestResult) {
        self.total += 1;
        match result {
            TestResult::Pass => self.passed += 1,
            TestResult::Fail => self.failed += 1,
            TestResult::Skipped => self.skipped += 1,
        }
    }
}

/// Whole-run counters aggregated across suites by the harness.
#[derive(Clone, Copy, Debug, Default)]
pub struct TestRunSummary {
    pub suites: u32,
    pub total: u32,
    pub passed: u32,
    pub failed: u32,
    pub panicked: u32,
}

impl TestRunSummary {
    pub fn absorb(&mut self, suite: &TestSuiteResult) {
        self.suites += 1;
        self.total += suite.total;
        self.passed += suite.passed;
        self.failed += suite.failed;
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0 && self.panicked == 0
    }
}

/// Run one test function, logging its verdict.
pub fn run_single_test(name: &str, test: impl FnOnce() -> TestResult) -> TestResult {
    let result = test();
    match result {
        TestResult::Pass => klog_debug!("TEST {}: PASS", name),
        TestResult::Fail => klog_info!("TEST {}: FAIL", name),
        TestResult::Skipped => klog_info!("TEST {}: SKIPPED", name),
    }
    result
}
