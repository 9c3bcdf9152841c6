//! Integration test modules.
//!
//! Each module focuses on one area: the issue checks themselves, harness
//! behavior, and the reference site.

pub mod harness_tests;
pub mod issue_tests;
pub mod site_tests;
