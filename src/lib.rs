//! nginx configuration builder library.
//!
//! Compiles a per-application YAML document into nginx configuration
//! fragments and publishes them as versioned releases.

pub mod config;
pub mod directives;
pub mod observability;
pub mod pipeline;
pub mod release;
pub mod template;

pub use config::{BuildSettings, Config};
pub use pipeline::{Compiled, Pipeline, PipelineError};
pub use release::ReleaseManager;
