//! Process-wide initialization.
//!
//! Only the logger lives here; stores are opened per `HostDb`.

mod logger;

// Re-export public API
pub use logger::{init_logger, init_logger_with};
