#![no_std]

pub mod alignment;
pub mod klog;
pub mod testing;

#[doc(hidden)]
pub use paste;

pub use alignment::{align_down_usize, align_up_usize};
pub use klog::{
    KlogLevel, klog_get_level, klog_register_backend, klog_set_level,
};
pub use testing::{TestResult, TestRunSummary, TestSuiteDesc, TestSuiteResult};
