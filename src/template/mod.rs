//! Template resolution subsystem.
//!
//! # Data Flow
//! ```text
//! YAML bytes
//!     → node.rs (tagged tree: Scalar / Sequence / Mapping)
//!     → scope.rs (global scope + per-vhost overlays)
//!     → resolver.rs (depth-first walk, string leaves rewritten in place)
//!     → evaluator.rs (expression language behind a trait)
//! ```
//!
//! query.rs runs JMESPath expressions over raw or resolved trees.
//!
//! # Design Decisions
//! - The raw tree, not the typed config, is walked so `user_vars` and any
//!   unknown keys are resolved too
//! - Scopes are values, rebuilt at each vhost boundary
//! - Numbers and booleans are visited but never templated

pub mod evaluator;
pub mod node;
pub mod query;
pub mod resolver;
pub mod scope;

pub use evaluator::{EvalError, Evaluator, HandlebarsEvaluator};
pub use node::{walk, Node, Scalar, Visit, Visitor};
pub use query::{query, QueryError};
pub use resolver::{resolve_document, TemplateError};
pub use scope::{NameMapping, NameTables, Scope, ScopeBuilder, VhostNames};
