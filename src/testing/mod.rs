//! Testing utilities and mock implementations
//!
//! Lets crews, agents and capability adapters be exercised without an LLM
//! endpoint, a search API or a writable output directory.

pub mod mocks;

pub use mocks::*;
