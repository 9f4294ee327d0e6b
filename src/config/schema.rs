//! Configuration schema definitions.
//!
//! This module defines the typed view of a per-application document.
//! All types derive Serde traits for deserialization from YAML; the raw
//! tree the resolver rewrites lives in [`crate::template::Node`].

use serde::{Deserialize, Serialize};

use crate::config::flags::Flags;

/// Root of a per-application document.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct Config {
    /// Virtual hosts, in document order.
    pub vhosts: Vec<VhostConfig>,

    /// Free-form data exposed to templates as `user_vars`.
    pub user_vars: serde_json::Map<String, serde_json::Value>,

    /// Explicit upstreams and default-bucket flag selections.
    pub upstreams: Vec<UpstreamConfig>,

    /// `map` blocks.
    pub maps: Vec<MapConfig>,

    /// `proxy_cache_path` zones.
    pub proxy_caches: Vec<CacheConfig>,

    /// `fastcgi_cache_path` zones.
    pub fastcgi_caches: Vec<CacheConfig>,

    /// Raw text placed verbatim in the http block.
    pub in_http_block: Option<String>,
}

/// One virtual host.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct VhostConfig {
    pub server_name: String,

    pub locations: Vec<LocationConfig>,

    /// Variables visible only while resolving this vhost.
    pub variables: Vec<VariableConfig>,

    /// Raw text placed at the top of the vhost fragment.
    pub in_server_block: Option<String>,
}

/// A location block, or an include reference.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct LocationConfig {
    pub modifier: Option<String>,
    pub uri: Option<String>,
    /// Internal name, rendered as `location @name`.
    pub named: Option<String>,
    pub body: Option<String>,
    /// Include reference; excludes every other field.
    pub include: Option<String>,
}

impl LocationConfig {
    pub fn modifier(&self) -> Option<&str> {
        non_empty(&self.modifier)
    }

    pub fn uri(&self) -> Option<&str> {
        non_empty(&self.uri)
    }

    pub fn named(&self) -> Option<&str> {
        non_empty(&self.named)
    }

    pub fn body(&self) -> Option<&str> {
        non_empty(&self.body)
    }

    pub fn include(&self) -> Option<&str> {
        non_empty(&self.include)
    }

    pub fn is_include(&self) -> bool {
        self.include().is_some()
    }
}

/// A vhost-scoped variable.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct VariableConfig {
    pub name: String,
    pub value: String,
}

/// Upstream declaration.
///
/// Either an explicit pool (`name` + `servers`) or a selection over the
/// default buckets synthesized from the app listeners (`select_default`).
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    pub select_default: bool,

    /// Restrict the selection to the `default-<port>` bucket.
    pub select_default_port: Option<u16>,

    pub default_servers_flags: Vec<UpstreamServerFlags>,

    pub name: Option<String>,

    pub servers: Vec<UpstreamServer>,
}

impl UpstreamConfig {
    pub fn name(&self) -> Option<&str> {
        non_empty(&self.name)
    }
}

/// A backend server of an explicit upstream.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamServer {
    pub addr: String,
    pub flags: Flags,
}

/// Flags overlaid onto default servers whose address matches `selector`.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamServerFlags {
    /// Regular expression over the server address; empty matches all.
    pub selector: String,
    pub flags: Flags,
}

/// A `map` block.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct MapConfig {
    pub variable: String,
    /// Source expression, e.g. `$http_user_agent`.
    pub string: String,
    /// Body lines, one mapping per line.
    pub lines: String,
}

/// Shared shape of proxy and fastcgi cache zones.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct CacheConfig {
    pub name: String,

    /// Explicit cache directory; wins over `in_mem` / `on_disk`.
    #[serde(rename = "proxy_cache_path", alias = "cache_path")]
    pub cache_path: Option<String>,

    pub key_zone_size: Option<String>,

    pub flags: Flags,

    pub in_mem: bool,

    pub on_disk: bool,
}

impl CacheConfig {
    pub fn cache_path(&self) -> Option<&str> {
        non_empty(&self.cache_path)
    }

    pub fn key_zone_size(&self) -> Option<&str> {
        non_empty(&self.key_zone_size)
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
