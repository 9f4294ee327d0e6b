//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! per-app document (YAML)
//!     → loader.rs (decode into raw tree + typed Config)
//!     → validation.rs (structural checks, all violations collected)
//!     → template resolution rewrites the raw tree
//!     → loader.rs re-types and re-validates the resolved tree
//!
//! build settings (TOML + CLI/env)
//!     → settings.rs (app name, listeners, cache roots, release dir)
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; only the raw tree is rewritten
//! - All fields have defaults to allow minimal documents
//! - Validation separates syntactic (serde) from structural checks

pub mod flags;
pub mod loader;
pub mod schema;
pub mod settings;
pub mod validation;

pub use flags::Flags;
pub use loader::{load_config, parse_and_validate, typed_config, ConfigError, LoadedConfig};
pub use schema::{
    CacheConfig, Config, LocationConfig, MapConfig, UpstreamConfig, UpstreamServer,
    UpstreamServerFlags, VariableConfig, VhostConfig,
};
pub use settings::{BuildSettings, CacheSettings, ReleaseSettings, SettingsError};
pub use validation::{validate_config, Rule, ValidationError};
