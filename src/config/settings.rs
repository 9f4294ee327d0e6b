//! Build settings.
//!
//! Inputs that do not come from the per-application document: the app
//! name, its listeners and ports, cache roots and defaults, and where
//! releases are written. Loaded from an optional TOML file, then
//! overridden from the command line / environment by the binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::flags::Flags;

/// Errors raised while loading or checking build settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid settings file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("invalid port `{0}`")]
    Port(String),

    #[error("setting `{0}` is required")]
    Missing(&'static str),
}

/// Runtime inputs for one build.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BuildSettings {
    /// Application name; prefixes every generated identifier.
    pub app_name: String,

    /// App container listeners, `host:port`.
    pub listeners: Vec<String>,

    /// Ports that get a `default-<port>` upstream bucket.
    pub upstream_ports: Vec<u16>,

    pub proxy_cache: CacheSettings,

    pub fastcgi_cache: CacheSettings,

    pub release: ReleaseSettings,
}

impl Default for BuildSettings {
    fn default() -> Self {
        Self {
            app_name: String::new(),
            listeners: Vec::new(),
            upstream_ports: Vec::new(),
            proxy_cache: CacheSettings::rooted("proxy_cache"),
            fastcgi_cache: CacheSettings::rooted("fastcgi_cache"),
            release: ReleaseSettings::default(),
        }
    }
}

/// Placement and defaults for one cache kind.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheSettings {
    /// Root for caches declared `in_mem`.
    pub mem_root: PathBuf,

    /// Root for every other cache without an explicit path.
    pub disk_root: PathBuf,

    /// Flags every cache starts from; a cache's own flags win.
    pub default_flags: Flags,

    /// `keys_zone` size when a cache does not set one.
    pub default_key_zone_size: String,
}

impl CacheSettings {
    fn rooted(dir: &str) -> Self {
        Self {
            mem_root: Path::new("/dev/shm/nginx").join(dir),
            disk_root: Path::new("/var/cache/nginx").join(dir),
            default_flags: [("levels", "1:2"), ("inactive", "60m")].into_iter().collect(),
            default_key_zone_size: "10m".to_string(),
        }
    }
}

impl Default for CacheSettings {
    fn default() -> Self {
        Self::rooted("cache")
    }
}

/// Where releases live and how nginx is asked to check them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReleaseSettings {
    /// App working directory; releases go under `<working_dir>/conf.d`.
    pub working_dir: PathBuf,

    /// External check command, program first.
    pub check_command: Vec<String>,
}

impl Default for ReleaseSettings {
    fn default() -> Self {
        Self {
            working_dir: PathBuf::from("."),
            check_command: vec!["nginx".to_string(), "-t".to_string()],
        }
    }
}

impl ReleaseSettings {
    /// Directory holding the `release-*` directories and `current`.
    pub fn conf_root(&self) -> PathBuf {
        self.working_dir.join("conf.d")
    }
}

impl BuildSettings {
    /// Load settings from a TOML file. Missing keys take their defaults.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let content = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Check the settings a build cannot do without.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.app_name.is_empty() {
            return Err(SettingsError::Missing("app_name"));
        }
        if self.release.check_command.is_empty() {
            return Err(SettingsError::Missing("release.check_command"));
        }
        Ok(())
    }
}

/// Split a space separated listener list (`DOKKU_APP_LISTENERS` format).
pub fn parse_listeners(raw: &str) -> Vec<String> {
    raw.split_whitespace().map(str::to_string).collect()
}

/// Split a space separated port list (`PROXY_UPSTREAM_PORTS` format).
pub fn parse_ports(raw: &str) -> Result<Vec<u16>, SettingsError> {
    raw.split_whitespace()
        .map(|p| p.parse().map_err(|_| SettingsError::Port(p.to_string())))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let settings = BuildSettings::default();
        assert_eq!(settings.proxy_cache.mem_root, PathBuf::from("/dev/shm/nginx/proxy_cache"));
        assert_eq!(settings.fastcgi_cache.disk_root, PathBuf::from("/var/cache/nginx/fastcgi_cache"));
        assert_eq!(settings.proxy_cache.default_flags.render(), "inactive=60m levels=1:2");
        assert_eq!(settings.release.conf_root(), PathBuf::from("./conf.d"));
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_partial_toml() {
        let settings: BuildSettings = toml::from_str(
            "app_name = \"shop\"\nupstream_ports = [5000]\n\n[proxy_cache]\nmem_root = \"/tmp/mem\"\n\n[proxy_cache.default_flags]\nmax_size = \"1g\"\n",
        )
        .unwrap();
        assert_eq!(settings.app_name, "shop");
        assert_eq!(settings.upstream_ports, vec![5000]);
        assert_eq!(settings.proxy_cache.mem_root, PathBuf::from("/tmp/mem"));
        assert_eq!(settings.proxy_cache.default_flags.render(), "max_size=1g");
        assert_eq!(settings.proxy_cache.default_key_zone_size, "10m");
        assert!(settings.validate().is_ok());
    }

    #[test]
    fn test_parse_lists() {
        assert_eq!(
            parse_listeners("172.17.0.2:5000  172.17.0.3:5000"),
            vec!["172.17.0.2:5000", "172.17.0.3:5000"]
        );
        assert_eq!(parse_ports("5000 8080").unwrap(), vec![5000, 8080]);
        assert!(matches!(parse_ports("5000 http"), Err(SettingsError::Port(p)) if p == "http"));
    }
}
