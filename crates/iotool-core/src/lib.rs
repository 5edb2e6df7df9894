#![forbid(unsafe_code)]

//! Core: line editing, command history, input decoding, and terminal lifecycle.

pub mod editor;
pub mod history;
pub mod input;
pub mod line_buffer;
pub mod logging;
pub mod terminal;

// Re-export tracing macros at crate root for ergonomic use.
#[cfg(feature = "tracing")]
pub use logging::{debug, info, trace, warn};
