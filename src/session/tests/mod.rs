//! Session scenarios driven against the in-memory backend.

mod editing_tests;
mod fixtures;
