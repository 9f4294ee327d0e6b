//! Expression evaluation.
//!
//! The resolver and the directive generators only see the [`Evaluator`]
//! trait; the expression language behind it is an implementation detail.

use handlebars::Handlebars;
use thiserror::Error;

use crate::template::scope::Scope;

/// An expression failed to parse or evaluate.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct EvalError(pub String);

/// Evaluates a template string against a scope.
pub trait Evaluator {
    fn evaluate(&self, template: &str, scope: &Scope) -> Result<String, EvalError>;
}

/// Handlebars-backed evaluator.
///
/// Escaping is disabled (the output is nginx configuration, not HTML) and
/// lookups are lenient: an unknown name renders as the empty string.
pub struct HandlebarsEvaluator {
    registry: Handlebars<'static>,
}

impl HandlebarsEvaluator {
    pub fn new() -> Self {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry.set_strict_mode(false);
        Self { registry }
    }
}

impl Default for HandlebarsEvaluator {
    fn default() -> Self {
        Self::new()
    }
}

impl Evaluator for HandlebarsEvaluator {
    fn evaluate(&self, template: &str, scope: &Scope) -> Result<String, EvalError> {
        // Text without an opening mustache is returned untouched, which is
        // what makes a second resolution pass a no-op.
        if !template.contains("{{") {
            return Ok(template.to_string());
        }
        self.registry
            .render_template(template, scope.data())
            .map_err(|e| EvalError(e.to_string()))
    }
}
