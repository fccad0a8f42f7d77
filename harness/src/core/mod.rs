//! Deterministic, pure logic shared by the harness hooks.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod decision;
pub mod document;
pub mod eligibility;
pub mod lease;
pub mod lenient;
pub mod ownership;
pub mod reflect;
pub mod task;
pub mod types;
pub mod valve;
