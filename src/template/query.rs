//! JMESPath queries over a document tree.

use serde_json::Value;
use thiserror::Error;

use crate::template::node::Node;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("query failed: {0}")]
    Jmespath(#[from] jmespath::JmespathError),

    #[error("cannot convert query result: {0}")]
    Convert(#[from] serde_json::Error),
}

/// Evaluate a JMESPath expression (`vhosts[*].server_name`,
/// `upstreams[?select_default]`, ...) against `document`.
///
/// A path that selects nothing yields `null`, not an error.
pub fn query(document: &Node, expression: &str) -> Result<Value, QueryError> {
    let compiled = jmespath::compile(expression)?;
    let result = compiled.search(document.to_json())?;
    Ok(serde_json::to_value(&*result)?)
}
