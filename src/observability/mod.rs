//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! config, template, directives, release
//!     → tracing events with structured fields
//!     → logging.rs (EnvFilter + fmt layer on stderr)
//! ```

pub mod logging;
