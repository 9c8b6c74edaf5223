//! Deterministic, pure logic shared by the reply pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod categories;
pub mod extract;
pub mod input;
pub mod length;
pub mod normalize;
pub mod router;
pub mod types;
