//! Completion capability: provider trait and the OpenAI-compatible backend.

pub mod provider;
pub mod providers;

pub use provider::*;
pub use providers::*;
