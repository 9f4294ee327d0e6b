//! Template scopes.
//!
//! # Layers
//! ```text
//! global (built once per document)
//!     upstreams, map_variables, proxy_caches, fastcgi_caches, user_vars
//! vhost overlay (rebuilt for every vhost)
//!     variables, named_locations
//! ```
//!
//! A [`Scope`] is an immutable value. Crossing into another vhost builds a
//! fresh one from the global layer instead of editing a shared map, so
//! nothing from vhost A can leak into vhost B.

use std::collections::BTreeMap;
use std::rc::Rc;

use serde_json::{Map, Value};

use crate::config::Config;

/// Logical name to generated identifier.
pub type NameMapping = BTreeMap<String, String>;

/// Generated names for one vhost.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VhostNames {
    pub variables: NameMapping,
    pub named_locations: NameMapping,
}

/// Every generated name a document can reference.
///
/// `vhosts` is index-aligned with [`Config::vhosts`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NameTables {
    pub upstreams: NameMapping,
    pub map_variables: NameMapping,
    pub proxy_caches: NameMapping,
    pub fastcgi_caches: NameMapping,
    pub vhosts: Vec<VhostNames>,
}

/// The data an expression is evaluated against.
#[derive(Debug, Clone)]
pub struct Scope {
    data: Rc<Value>,
    vhost: Option<usize>,
}

impl Scope {
    pub fn from_value(data: Value) -> Self {
        Self {
            data: Rc::new(data),
            vhost: None,
        }
    }

    pub fn data(&self) -> &Value {
        &self.data
    }

    /// Index of the vhost whose overlay is active, if any.
    pub fn vhost(&self) -> Option<usize> {
        self.vhost
    }

    /// A scope holding nothing but `user_vars`.
    pub fn user_vars_only(&self) -> Scope {
        let user_vars = self
            .data
            .get("user_vars")
            .cloned()
            .unwrap_or_else(|| Value::Object(Map::new()));
        let mut map = Map::new();
        map.insert("user_vars".to_string(), user_vars);
        Scope::from_value(Value::Object(map))
    }
}

/// Builds the global scope and per-vhost overlays for one document.
#[derive(Debug)]
pub struct ScopeBuilder<'a> {
    config: &'a Config,
    names: Option<&'a NameTables>,
    global: Map<String, Value>,
}

impl<'a> ScopeBuilder<'a> {
    /// Scope tables where every name maps to itself.
    pub fn new(config: &'a Config) -> Self {
        Self::build(config, None)
    }

    /// Scope tables where declared names map to their generated identifiers.
    ///
    /// Generated entries replace the identity entry for the same name;
    /// entries only present in `names` (e.g. the `default` upstream alias)
    /// are added.
    pub fn with_names(config: &'a Config, names: &'a NameTables) -> Self {
        Self::build(config, Some(names))
    }

    fn build(config: &'a Config, names: Option<&'a NameTables>) -> Self {
        let mut upstreams = identity(config.upstreams.iter().filter_map(|u| u.name()));
        let mut map_variables = identity(config.maps.iter().map(|m| m.variable.as_str()));
        let mut proxy_caches = identity(config.proxy_caches.iter().map(|c| c.name.as_str()));
        let mut fastcgi_caches = identity(config.fastcgi_caches.iter().map(|c| c.name.as_str()));

        if let Some(names) = names {
            overlay(&mut upstreams, &names.upstreams);
            overlay(&mut map_variables, &names.map_variables);
            overlay(&mut proxy_caches, &names.proxy_caches);
            overlay(&mut fastcgi_caches, &names.fastcgi_caches);
        }

        let mut global = Map::new();
        global.insert("upstreams".into(), Value::Object(upstreams));
        global.insert("map_variables".into(), Value::Object(map_variables));
        global.insert("proxy_caches".into(), Value::Object(proxy_caches));
        global.insert("fastcgi_caches".into(), Value::Object(fastcgi_caches));
        global.insert("user_vars".into(), Value::Object(config.user_vars.clone()));

        Self {
            config,
            names,
            global,
        }
    }

    /// The global layer alone; no vhost keys are present.
    pub fn global(&self) -> Scope {
        Scope::from_value(Value::Object(self.global.clone()))
    }

    /// Global layer plus the overlay of vhost `index`.
    ///
    /// Returns `None` when the document has no such vhost.
    pub fn vhost(&self, index: usize) -> Option<Scope> {
        let vhost = self.config.vhosts.get(index)?;

        let mut variables = identity(vhost.variables.iter().map(|v| v.name.as_str()));
        let mut named_locations = identity(
            vhost
                .locations
                .iter()
                .filter_map(|l| l.named())
                .map(|n| n.trim_start_matches('@')),
        );
        if let Some(generated) = self.names.and_then(|n| n.vhosts.get(index)) {
            overlay(&mut variables, &generated.variables);
            overlay(&mut named_locations, &generated.named_locations);
        }

        let mut data = self.global.clone();
        data.insert("variables".into(), Value::Object(variables));
        data.insert("named_locations".into(), Value::Object(named_locations));

        Some(Scope {
            data: Rc::new(Value::Object(data)),
            vhost: Some(index),
        })
    }
}

fn identity<'n>(names: impl Iterator<Item = &'n str>) -> Map<String, Value> {
    names
        .filter(|n| !n.is_empty())
        .map(|n| (n.to_string(), Value::String(n.to_string())))
        .collect()
}

fn overlay(table: &mut Map<String, Value>, generated: &NameMapping) {
    for (name, value) in generated {
        table.insert(name.clone(), Value::String(value.clone()));
    }
}
