//! Document-wide template resolution.
//!
//! Walks the raw tree and replaces every string leaf with its evaluated
//! form. The active scope follows the walk: paths under `vhosts[i]` see
//! the global layer plus vhost `i`'s overlay, every other path sees the
//! global layer only.

use thiserror::Error;

use crate::template::evaluator::{EvalError, Evaluator};
use crate::template::node::{walk, Node, Scalar, Visit, Visitor};
use crate::template::scope::{Scope, ScopeBuilder};

/// A template failed somewhere in the document.
#[derive(Debug, Error)]
#[error("failed to resolve template at `{path}`: {source}")]
pub struct TemplateError {
    /// Node path of the failing leaf, e.g. `vhosts[0].locations[2].body`.
    pub path: String,
    #[source]
    pub source: EvalError,
}

/// Resolve every string leaf of `root` in place.
///
/// Not transactional: when a leaf fails, leaves visited before it keep
/// their resolved value. Callers that need all-or-nothing behaviour
/// resolve a clone and swap it in on success.
pub fn resolve_document<E: Evaluator>(
    root: &mut Node,
    scopes: &ScopeBuilder<'_>,
    evaluator: &E,
) -> Result<(), TemplateError> {
    let global = scopes.global();
    let mut resolver = Resolver {
        scopes,
        evaluator,
        active: global.clone(),
        global,
    };
    walk(root, &mut resolver)
}

struct Resolver<'s, 'c, E> {
    scopes: &'s ScopeBuilder<'c>,
    evaluator: &'s E,
    global: Scope,
    active: Scope,
}

impl<E: Evaluator> Resolver<'_, '_, E> {
    fn enter(&mut self, path: &str) {
        match vhost_index(path) {
            Some(index) if self.active.vhost() == Some(index) => {}
            Some(index) => {
                self.active = self
                    .scopes
                    .vhost(index)
                    .unwrap_or_else(|| self.global.clone());
            }
            None if self.active.vhost().is_some() => self.active = self.global.clone(),
            None => {}
        }
    }
}

impl<E: Evaluator> Visitor for Resolver<'_, '_, E> {
    type Error = TemplateError;

    fn visit(&mut self, path: &str, node: &mut Node) -> Result<Visit, TemplateError> {
        self.enter(path);

        if let Node::Scalar(Scalar::String(text)) = node {
            let resolved = self
                .evaluator
                .evaluate(text, &self.active)
                .map_err(|source| TemplateError {
                    path: path.to_string(),
                    source,
                })?;
            *text = resolved;
        }
        Ok(Visit::Continue)
    }
}

/// `Some(i)` when `path` lies inside `vhosts[i]`.
fn vhost_index(path: &str) -> Option<usize> {
    let rest = path.strip_prefix("vhosts[")?;
    let close = rest.find(']')?;
    rest[..close].parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::template::evaluator::HandlebarsEvaluator;
    use crate::template::scope::{NameTables, VhostNames};

    const DOC: &str = r#"
vhosts:
  - server_name: a.com
    variables:
      - name: foo
        value: bar
    locations:
      - uri: /
        body: "set $x {{variables.foo}}; proxy_pass http://{{upstreams.api}};"
  - server_name: b.com
    locations:
      - uri: /
        body: "set $x '{{variables.foo}}';"
upstreams:
  - name: api
    servers:
      - addr: "{{user_vars.backend}}"
user_vars:
  backend: 10.0.0.1:8080
  port: 8080
"#;

    fn load() -> (Config, Node) {
        let node = Node::parse(DOC.as_bytes()).unwrap();
        let config: Config = serde_yaml::from_value(node.to_yaml()).unwrap();
        (config, node)
    }

    fn names() -> NameTables {
        let mut names = NameTables::default();
        names.upstreams.insert("api".into(), "app-api".into());
        names.vhosts.push(VhostNames {
            variables: [("foo".to_string(), "app_foo".to_string())].into_iter().collect(),
            ..Default::default()
        });
        names.vhosts.push(VhostNames::default());
        names
    }

    #[test]
    fn test_vhost_scope_isolation() {
        let (config, mut node) = load();
        let names = names();
        let scopes = ScopeBuilder::with_names(&config, &names);
        resolve_document(&mut node, &scopes, &HandlebarsEvaluator::new()).unwrap();

        assert_eq!(
            node.get_path("vhosts[0].locations[0].body").and_then(Node::as_str),
            Some("set $x app_foo; proxy_pass http://app-api;")
        );
        assert_eq!(
            node.get_path("vhosts[1].locations[0].body").and_then(Node::as_str),
            Some("set $x '';")
        );
        assert_eq!(
            node.get_path("upstreams[0].servers[0].addr").and_then(Node::as_str),
            Some("10.0.0.1:8080")
        );
    }

    #[test]
    fn test_overlay_dropped_after_vhosts() {
        let doc = "vhosts:\n  - server_name: a.com\n    variables: [{name: foo, value: bar}]\n    locations:\n      - uri: /\n        body: 'return 200 {{variables.foo}};'\nuser_vars:\n  late: '{{variables.foo}}'\n  region: '{{user_vars.zone}}'\n  zone: eu\n";
        let mut node = Node::parse(doc.as_bytes()).unwrap();
        let config: Config = serde_yaml::from_value(node.to_yaml()).unwrap();
        let mut names = NameTables::default();
        names.vhosts.push(VhostNames {
            variables: [("foo".to_string(), "app_foo".to_string())].into_iter().collect(),
            ..Default::default()
        });
        let scopes = ScopeBuilder::with_names(&config, &names);
        resolve_document(&mut node, &scopes, &HandlebarsEvaluator::new()).unwrap();

        assert_eq!(
            node.get_path("vhosts[0].locations[0].body").and_then(Node::as_str),
            Some("return 200 app_foo;")
        );
        assert_eq!(node.get_path("user_vars.late").and_then(Node::as_str), Some(""));
        assert_eq!(node.get_path("user_vars.region").and_then(Node::as_str), Some("eu"));
    }

    #[test]
    fn test_second_pass_is_a_no_op() {
        let (config, mut node) = load();
        let names = names();
        let scopes = ScopeBuilder::with_names(&config, &names);
        let eval = HandlebarsEvaluator::new();
        resolve_document(&mut node, &scopes, &eval).unwrap();
        let once = node.clone();
        resolve_document(&mut node, &scopes, &eval).unwrap();
        assert_eq!(node, once);
    }

    #[test]
    fn test_failure_reports_path_and_keeps_earlier_rewrites() {
        let doc = "user_vars:\n  a: '{{user_vars.b}}'\n  b: ok\n  c: '{{#if x}}'\n  d: '{{user_vars.b}}'\n";
        let mut node = Node::parse(doc.as_bytes()).unwrap();
        let config: Config = serde_yaml::from_value(node.to_yaml()).unwrap();
        let scopes = ScopeBuilder::new(&config);

        let err = resolve_document(&mut node, &scopes, &HandlebarsEvaluator::new()).unwrap_err();
        assert_eq!(err.path, "user_vars.c");
        assert_eq!(node.get_path("user_vars.a").and_then(Node::as_str), Some("ok"));
        assert_eq!(
            node.get_path("user_vars.d").and_then(Node::as_str),
            Some("{{user_vars.b}}")
        );
    }

    #[test]
    fn test_vhost_index() {
        assert_eq!(vhost_index("vhosts[3].locations[0]"), Some(3));
        assert_eq!(vhost_index("vhosts[12]"), Some(12));
        assert_eq!(vhost_index("vhosts"), None);
        assert_eq!(vhost_index("upstreams[0]"), None);
    }
}
