//! Raw document tree.
//!
//! The resolver works on the decoded YAML rather than on the typed
//! [`Config`](crate::config::Config), so every string anywhere in the
//! document is a template candidate, including the free-form `user_vars`.

use std::fmt::Write as _;

/// A scalar leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    Null,
    Bool(bool),
    Number(serde_yaml::Number),
    String(String),
}

/// A document node.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Scalar(Scalar),
    Sequence(Vec<Node>),
    /// Ordered key/value pairs, in document order.
    Mapping(Vec<(String, Node)>),
}

/// What a [`Visitor`] wants done with the node it was just handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visit {
    Continue,
    /// Do not descend into this node. Not an error; siblings are still visited.
    SkipSubtree,
}

/// Callback for [`walk`].
pub trait Visitor {
    type Error;

    fn visit(&mut self, path: &str, node: &mut Node) -> Result<Visit, Self::Error>;
}

/// Depth-first walk in document order.
///
/// Every node is visited exactly once, containers before their children.
/// The first error stops the walk; changes made by earlier visits stay.
pub fn walk<V: Visitor>(root: &mut Node, visitor: &mut V) -> Result<(), V::Error> {
    walk_at(root, "", visitor)
}

fn walk_at<V: Visitor>(node: &mut Node, path: &str, visitor: &mut V) -> Result<(), V::Error> {
    if visitor.visit(path, node)? == Visit::SkipSubtree {
        return Ok(());
    }

    match node {
        Node::Mapping(entries) => {
            for (key, child) in entries.iter_mut() {
                let child_path = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{}.{}", path, key)
                };
                walk_at(child, &child_path, visitor)?;
            }
        }
        Node::Sequence(items) => {
            for (i, child) in items.iter_mut().enumerate() {
                let mut child_path = String::with_capacity(path.len() + 4);
                child_path.push_str(path);
                let _ = write!(child_path, "[{}]", i);
                walk_at(child, &child_path, visitor)?;
            }
        }
        Node::Scalar(_) => {}
    }
    Ok(())
}

impl Node {
    /// Decode YAML bytes. An empty document is an empty mapping.
    pub fn parse(bytes: &[u8]) -> Result<Node, serde_yaml::Error> {
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Node::Mapping(Vec::new()));
        }
        let value: serde_yaml::Value = serde_yaml::from_slice(bytes)?;
        Ok(match value {
            serde_yaml::Value::Null => Node::Mapping(Vec::new()),
            other => Node::from_yaml(other),
        })
    }

    pub fn from_yaml(value: serde_yaml::Value) -> Node {
        use serde_yaml::Value;

        match value {
            Value::Null => Node::Scalar(Scalar::Null),
            Value::Bool(b) => Node::Scalar(Scalar::Bool(b)),
            Value::Number(n) => Node::Scalar(Scalar::Number(n)),
            Value::String(s) => Node::Scalar(Scalar::String(s)),
            Value::Sequence(items) => Node::Sequence(items.into_iter().map(Node::from_yaml).collect()),
            Value::Mapping(map) => Node::Mapping(
                map.into_iter()
                    .map(|(k, v)| (key_string(k), Node::from_yaml(v)))
                    .collect(),
            ),
            Value::Tagged(tagged) => Node::from_yaml(tagged.value),
        }
    }

    pub fn to_yaml(&self) -> serde_yaml::Value {
        use serde_yaml::Value;

        match self {
            Node::Scalar(Scalar::Null) => Value::Null,
            Node::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            Node::Scalar(Scalar::Number(n)) => Value::Number(n.clone()),
            Node::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            Node::Sequence(items) => Value::Sequence(items.iter().map(Node::to_yaml).collect()),
            Node::Mapping(entries) => Value::Mapping(
                entries
                    .iter()
                    .map(|(k, v)| (Value::String(k.clone()), v.to_yaml()))
                    .collect(),
            ),
        }
    }

    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value;

        match self {
            Node::Scalar(Scalar::Null) => Value::Null,
            Node::Scalar(Scalar::Bool(b)) => Value::Bool(*b),
            Node::Scalar(Scalar::Number(n)) => {
                if let Some(i) = n.as_i64() {
                    Value::from(i)
                } else if let Some(u) = n.as_u64() {
                    Value::from(u)
                } else {
                    n.as_f64()
                        .and_then(serde_json::Number::from_f64)
                        .map(Value::Number)
                        .unwrap_or(Value::Null)
                }
            }
            Node::Scalar(Scalar::String(s)) => Value::String(s.clone()),
            Node::Sequence(items) => Value::Array(items.iter().map(Node::to_json).collect()),
            Node::Mapping(entries) => Value::Object(
                entries
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::Scalar(Scalar::String(s)) => Some(s),
            _ => None,
        }
    }

    /// Child of a mapping by key.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Mapping(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    /// Look up a node by path, e.g. `vhosts[0].locations[1].body`.
    ///
    /// The empty path is the node itself.
    pub fn get_path(&self, path: &str) -> Option<&Node> {
        let mut current = self;
        if path.is_empty() {
            return Some(current);
        }

        for part in path.split('.') {
            let (key, mut rest) = match part.find('[') {
                Some(pos) => part.split_at(pos),
                None => (part, ""),
            };
            if !key.is_empty() {
                current = current.get(key)?;
            } else if rest.is_empty() {
                return None;
            }
            while !rest.is_empty() {
                let close = rest.find(']')?;
                let index: usize = rest.get(1..close)?.parse().ok()?;
                current = match current {
                    Node::Sequence(items) => items.get(index)?,
                    _ => return None,
                };
                rest = &rest[close + 1..];
                if !rest.is_empty() && !rest.starts_with('[') {
                    return None;
                }
            }
        }
        Some(current)
    }
}

fn key_string(key: serde_yaml::Value) -> String {
    use serde_yaml::Value;

    match key {
        Value::String(s) => s,
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Null => "null".to_string(),
        Value::Tagged(tagged) => key_string(tagged.value),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}
