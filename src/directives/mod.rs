//! Directive generation subsystem.
//!
//! # Data Flow
//! ```text
//! validated + resolved Config, BuildSettings
//!     → name_tables() (generated identifiers, needed before resolution)
//!     → upstream.rs   → upstreams.conf
//!     → map.rs        → maps.conf
//!     → cache.rs      → proxy_caches.conf, fastcgi_caches.conf
//!     → location.rs   → vhosts/<server_name>/vhost.conf
//!     → http_block.conf (in_http_block verbatim, when set)
//! ```
//!
//! # Design Decisions
//! - Every generator is a pure function of (app, config, runtime inputs)
//! - Generated identifiers are prefixed with the app name so two apps
//!   sharing one nginx never collide
//! - Values are evaluated again at render time; on resolved input this
//!   is a no-op

pub mod cache;
pub mod location;
pub mod map;
pub mod upstream;

use std::path::PathBuf;

use thiserror::Error;

use crate::config::{BuildSettings, Config};
use crate::template::{EvalError, Evaluator, NameMapping, NameTables, Scope, ScopeBuilder};

use self::cache::CacheKind;

/// Semantic failures found while generating directives.
#[derive(Debug, Error)]
pub enum GenerationError {
    /// `select_default_port` names a port without a default bucket.
    #[error("upstreams[{index}]: no default upstream for port {port}")]
    UnknownDefaultPort { index: usize, port: u16 },

    /// A `default_servers_flags` selector is not a valid regex.
    #[error("upstreams[{index}]: invalid selector `{selector}`: {source}")]
    InvalidSelector {
        index: usize,
        selector: String,
        #[source]
        source: regex::Error,
    },

    /// An explicit upstream reuses a generated default bucket name.
    #[error("upstream `{0}` collides with a generated default upstream")]
    ReservedUpstream(String),

    /// A value failed to evaluate at render time.
    #[error("failed to evaluate {context}: {source}")]
    Template {
        context: String,
        #[source]
        source: EvalError,
    },
}

/// Output of one generator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Rendered {
    pub text: String,
    pub names: NameMapping,
}

/// One generated file, relative to a release directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub path: PathBuf,
    pub contents: String,
}

impl Fragment {
    pub fn new(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            contents: contents.into(),
        }
    }
}

/// Generated identifiers for every name a document declares.
pub fn name_tables(config: &Config, settings: &BuildSettings) -> NameTables {
    let app = settings.app_name.as_str();
    NameTables {
        upstreams: upstream::names(app, config, &settings.upstream_ports),
        map_variables: map::names(app, config),
        proxy_caches: cache::names(app, CacheKind::Proxy.caches(config)),
        fastcgi_caches: cache::names(app, CacheKind::Fastcgi.caches(config)),
        vhosts: config
            .vhosts
            .iter()
            .map(|vhost| location::names(app, vhost))
            .collect(),
    }
}

/// Run every generator and collect the files of one release.
pub fn generate_fragments<E: Evaluator>(
    config: &Config,
    settings: &BuildSettings,
    names: &NameTables,
    evaluator: &E,
) -> Result<Vec<Fragment>, GenerationError> {
    let app = settings.app_name.as_str();
    let scopes = ScopeBuilder::with_names(config, names);
    let global = scopes.global();

    let inputs = upstream::DefaultBuckets {
        listeners: &settings.listeners,
        ports: &settings.upstream_ports,
    };
    let upstreams = upstream::generate(app, config, &inputs, &global, evaluator)?;
    let maps = map::generate(app, config, &global, evaluator)?;

    let mut fragments = vec![
        Fragment::new("upstreams.conf", upstreams.text),
        Fragment::new("maps.conf", maps.text),
    ];
    for kind in [CacheKind::Proxy, CacheKind::Fastcgi] {
        let rendered = cache::generate(kind, app, config, kind.settings(settings), &global, evaluator)?;
        fragments.push(Fragment::new(kind.fragment(), rendered.text));
    }

    if let Some(raw) = config.in_http_block.as_deref().filter(|s| !s.is_empty()) {
        fragments.push(Fragment::new("http_block.conf", with_newline(raw)));
    }

    for (index, vhost) in config.vhosts.iter().enumerate() {
        let scope = scopes.vhost(index).unwrap_or_else(|| global.clone());
        let contents = location::vhost_fragment(app, vhost, &scope, evaluator)?;
        fragments.push(Fragment::new(
            PathBuf::from("vhosts").join(&vhost.server_name).join("vhost.conf"),
            contents,
        ));
    }

    tracing::debug!(app = %app, fragments = fragments.len(), "Directives generated");
    Ok(fragments)
}

pub(crate) fn evaluate<E: Evaluator>(
    evaluator: &E,
    template: &str,
    scope: &Scope,
    context: impl FnOnce() -> String,
) -> Result<String, GenerationError> {
    evaluator
        .evaluate(template, scope)
        .map_err(|source| GenerationError::Template {
            context: context(),
            source,
        })
}

/// Non-blank lines of a multi-line value, trailing whitespace removed.
pub(crate) fn body_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines().map(str::trim_end).filter(|line| !line.trim().is_empty())
}

pub(crate) fn with_newline(text: &str) -> String {
    if text.ends_with('\n') {
        text.to_string()
    } else {
        format!("{}\n", text)
    }
}
