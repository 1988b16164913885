//! Observability: structured logging and span helpers.

pub mod logging;

pub use logging::{init_logging, LogFormat, LogSettings};

// Span macros for structured logging
pub use logging::{crew_span, task_span, tool_span};
