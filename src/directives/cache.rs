//! `proxy_cache_path` / `fastcgi_cache_path` generation.

use std::path::Path;

use crate::config::{BuildSettings, CacheConfig, CacheSettings, Config};
use crate::directives::{evaluate, GenerationError, Rendered};
use crate::template::{Evaluator, NameMapping, Scope};

/// Which family of cache zones is being rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
    Proxy,
    Fastcgi,
}

impl CacheKind {
    pub fn directive(self) -> &'static str {
        match self {
            CacheKind::Proxy => "proxy_cache_path",
            CacheKind::Fastcgi => "fastcgi_cache_path",
        }
    }

    /// File name of the rendered fragment.
    pub fn fragment(self) -> &'static str {
        match self {
            CacheKind::Proxy => "proxy_caches.conf",
            CacheKind::Fastcgi => "fastcgi_caches.conf",
        }
    }

    pub fn caches(self, config: &Config) -> &[CacheConfig] {
        match self {
            CacheKind::Proxy => &config.proxy_caches,
            CacheKind::Fastcgi => &config.fastcgi_caches,
        }
    }

    pub fn settings(self, settings: &BuildSettings) -> &CacheSettings {
        match self {
            CacheKind::Proxy => &settings.proxy_cache,
            CacheKind::Fastcgi => &settings.fastcgi_cache,
        }
    }
}

/// Generated `keys_zone` name.
pub fn zone_name(app: &str, cache: &str) -> String {
    format!("{}_{}", app, cache)
}

pub fn names(app: &str, caches: &[CacheConfig]) -> NameMapping {
    caches
        .iter()
        .map(|c| (c.name.clone(), zone_name(app, &c.name)))
        .collect()
}

/// Directory of a cache zone.
///
/// An explicit path always wins; otherwise the zone lives under the
/// in-memory or on-disk root.
pub fn cache_path(app: &str, cache: &CacheConfig, settings: &CacheSettings) -> String {
    if let Some(path) = cache.cache_path() {
        return path.to_string();
    }
    let root: &Path = if cache.in_mem {
        &settings.mem_root
    } else {
        &settings.disk_root
    };
    root.join(zone_name(app, &cache.name)).display().to_string()
}

/// Render one cache path directive per declared cache of `kind`.
pub fn generate<E: Evaluator>(
    kind: CacheKind,
    app: &str,
    config: &Config,
    settings: &CacheSettings,
    scope: &Scope,
    evaluator: &E,
) -> Result<Rendered, GenerationError> {
    let scope = scope.user_vars_only();
    let caches = kind.caches(config);
    let mut text = String::new();

    for cache in caches {
        let flags = settings
            .default_flags
            .merged(&cache.flags)
            .try_map_values(|key, value| {
                evaluate(evaluator, value, &scope, || {
                    format!("flag `{}` of {} `{}`", key, kind.directive(), cache.name)
                })
            })?;
        let size = cache
            .key_zone_size()
            .unwrap_or(settings.default_key_zone_size.as_str());

        text.push_str(&format!(
            "{} {} keys_zone={}:{}",
            kind.directive(),
            cache_path(app, cache, settings),
            zone_name(app, &cache.name),
            size
        ));
        if !flags.is_empty() {
            text.push(' ');
            text.push_str(&flags.render());
        }
        text.push_str(";\n");
    }

    Ok(Rendered {
        text,
        names: names(app, caches),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Flags;
    use crate::template::{HandlebarsEvaluator, ScopeBuilder};
    use std::path::PathBuf;

    fn settings(defaults: Flags) -> CacheSettings {
        CacheSettings {
            mem_root: PathBuf::from("/dev/shm/cache"),
            disk_root: PathBuf::from("/var/cache/nginx"),
            default_flags: defaults,
            default_key_zone_size: "10m".into(),
        }
    }

    #[test]
    fn test_cache_flags_override_defaults() {
        let config: Config = serde_yaml::from_str(
            "proxy_caches:\n  - name: pages\n    flags: {b: 3, c: 4}\n",
        )
        .unwrap();
        let defaults: Flags = [("a", "1"), ("b", "2")].into_iter().collect();
        let scope = ScopeBuilder::new(&config).global();
        let out = generate(
            CacheKind::Proxy,
            "shop",
            &config,
            &settings(defaults),
            &scope,
            &HandlebarsEvaluator::new(),
        )
        .unwrap();
        assert_eq!(
            out.text,
            "proxy_cache_path /var/cache/nginx/shop_pages keys_zone=shop_pages:10m a=1 b=3 c=4;\n"
        );
        assert_eq!(out.names["pages"], "shop_pages");
    }

    #[test]
    fn test_placement() {
        let config: Config = serde_yaml::from_str(
            "fastcgi_caches:\n  - name: mem\n    in_mem: true\n    key_zone_size: 1m\n  - name: pinned\n    in_mem: true\n    proxy_cache_path: /srv/pinned\n    flags: {max_size: '{{user_vars.size}}'}\nuser_vars:\n  size: 2g\n",
        )
        .unwrap();
        let scope = ScopeBuilder::new(&config).global();
        let out = generate(
            CacheKind::Fastcgi,
            "shop",
            &config,
            &settings(Flags::new()),
            &scope,
            &HandlebarsEvaluator::new(),
        )
        .unwrap();
        assert_eq!(
            out.text,
            "fastcgi_cache_path /dev/shm/cache/shop_mem keys_zone=shop_mem:1m;\nfastcgi_cache_path /srv/pinned keys_zone=shop_pinned:10m max_size=2g;\n"
        );
    }
}
