//! Configuration validation.
//!
//! # Responsibilities
//! - Structural checks serde cannot express (mutual exclusion, required-if)
//! - Name uniqueness for upstreams, maps, caches and named locations
//! - Server names usable as a directory name in a release
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: Config → Result<(), Vec<ValidationError>>
//! - Field paths use the same syntax as template error paths
//! - `user_vars` is never inspected

use std::collections::HashSet;
use std::fmt;

use crate::config::schema::{CacheConfig, Config, LocationConfig, UpstreamConfig, VhostConfig};

/// Which rule a field violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rule {
    Required,
    RequiredIf,
    RequiredWithout,
    ExcludedWith,
    ExcludedWithout,
    Unique,
    InvalidName,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Rule::Required => "required",
            Rule::RequiredIf => "required_if",
            Rule::RequiredWithout => "required_without",
            Rule::ExcludedWith => "excluded_with",
            Rule::ExcludedWithout => "excluded_without",
            Rule::Unique => "unique",
            Rule::InvalidName => "invalid_name",
        };
        write!(f, "{}", name)
    }
}

/// A single rule violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field_path: String,
    pub rule: Rule,
    pub message: String,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "In {}: {}", self.field_path, self.message)
    }
}

impl std::error::Error for ValidationError {}

#[derive(Default)]
struct Report {
    errors: Vec<ValidationError>,
}

impl Report {
    fn push(&mut self, field_path: String, rule: Rule, message: impl Into<String>) {
        self.errors.push(ValidationError {
            field_path,
            rule,
            message: message.into(),
        });
    }

    fn required(&mut self, base: &str, field: &str) {
        self.push(
            format!("{}.{}", base, field),
            Rule::Required,
            format!("field '{}' is required", field),
        );
    }

    fn excluded(&mut self, base: &str, field: &str, other: &str) {
        self.push(
            format!("{}.{}", base, field),
            Rule::ExcludedWith,
            format!("field '{}' cannot be used together with '{}'", field, other),
        );
    }
}

/// Validate a decoded document, collecting every violation.
pub fn validate_config(config: &Config) -> Result<(), Vec<ValidationError>> {
    let mut report = Report::default();

    if config.vhosts.is_empty() {
        report.push("vhosts".into(), Rule::Required, "field 'vhosts' is required");
    }

    let mut server_names = HashSet::new();
    for (i, vhost) in config.vhosts.iter().enumerate() {
        let base = format!("vhosts[{}]", i);
        validate_vhost(&mut report, &base, vhost);
        if !vhost.server_name.is_empty() && !server_names.insert(vhost.server_name.as_str()) {
            report.push(
                format!("{}.server_name", base),
                Rule::Unique,
                format!("server name '{}' is declared more than once", vhost.server_name),
            );
        }
    }

    let mut upstream_names = HashSet::new();
    for (i, upstream) in config.upstreams.iter().enumerate() {
        let base = format!("upstreams[{}]", i);
        validate_upstream(&mut report, &base, upstream);
        if let Some(name) = upstream.name() {
            if !upstream_names.insert(name) {
                report.push(
                    format!("{}.name", base),
                    Rule::Unique,
                    format!("upstream '{}' is declared more than once", name),
                );
            }
        }
    }

    let mut map_variables = HashSet::new();
    for (i, map) in config.maps.iter().enumerate() {
        let base = format!("maps[{}]", i);
        if map.variable.is_empty() {
            report.required(&base, "variable");
        } else if !map_variables.insert(map.variable.as_str()) {
            report.push(
                format!("{}.variable", base),
                Rule::Unique,
                format!("map variable '{}' is declared more than once", map.variable),
            );
        }
        if map.string.is_empty() {
            report.required(&base, "string");
        }
        if map.lines.is_empty() {
            report.required(&base, "lines");
        }
    }

    validate_caches(&mut report, "proxy_caches", &config.proxy_caches);
    validate_caches(&mut report, "fastcgi_caches", &config.fastcgi_caches);

    if report.errors.is_empty() {
        Ok(())
    } else {
        Err(report.errors)
    }
}

fn validate_vhost(report: &mut Report, base: &str, vhost: &VhostConfig) {
    if vhost.server_name.is_empty() {
        report.required(base, "server_name");
    } else if !is_path_component(&vhost.server_name) {
        report.push(
            format!("{}.server_name", base),
            Rule::InvalidName,
            format!(
                "server name '{}' cannot be used as a directory name",
                vhost.server_name
            ),
        );
    }

    if vhost.locations.is_empty() {
        report.required(base, "locations");
    }

    let mut named = HashSet::new();
    for (j, location) in vhost.locations.iter().enumerate() {
        let loc_base = format!("{}.locations[{}]", base, j);
        validate_location(report, &loc_base, location);
        if let Some(name) = location.named() {
            if !named.insert(name.trim_start_matches('@')) {
                report.push(
                    format!("{}.named", loc_base),
                    Rule::Unique,
                    format!("named location '{}' is declared more than once", name),
                );
            }
        }
    }

    for (j, variable) in vhost.variables.iter().enumerate() {
        let var_base = format!("{}.variables[{}]", base, j);
        if variable.name.is_empty() {
            report.required(&var_base, "name");
        }
        if variable.value.is_empty() {
            report.required(&var_base, "value");
        }
    }
}

fn validate_location(report: &mut Report, base: &str, location: &LocationConfig) {
    if location.is_include() {
        let others = [
            ("modifier", location.modifier()),
            ("uri", location.uri()),
            ("named", location.named()),
            ("body", location.body()),
        ];
        for (field, value) in others {
            if value.is_some() {
                report.excluded(base, field, "include");
            }
        }
        return;
    }

    match (location.uri(), location.named()) {
        (None, None) => report.push(
            format!("{}.uri", base),
            Rule::RequiredWithout,
            "field 'uri' is required when 'named' is not provided",
        ),
        (Some(_), Some(_)) => report.excluded(base, "named", "uri"),
        _ => {}
    }

    if location.named().is_some() && location.modifier().is_some() {
        report.excluded(base, "modifier", "named");
    }

    if location.body().is_none() {
        report.push(
            format!("{}.body", base),
            Rule::RequiredWithout,
            "field 'body' is required when 'include' is not provided",
        );
    }
}

fn validate_upstream(report: &mut Report, base: &str, upstream: &UpstreamConfig) {
    if upstream.select_default {
        if upstream.name().is_some() {
            report.excluded(base, "name", "select_default");
        }
        if !upstream.servers.is_empty() {
            report.excluded(base, "servers", "select_default");
        }
        if upstream.default_servers_flags.is_empty() {
            report.push(
                format!("{}.default_servers_flags", base),
                Rule::RequiredIf,
                "field 'default_servers_flags' is required when select_default is true",
            );
        }
        return;
    }

    if upstream.select_default_port.is_some() {
        report.push(
            format!("{}.select_default_port", base),
            Rule::ExcludedWithout,
            "field 'select_default_port' requires select_default",
        );
    }
    if !upstream.default_servers_flags.is_empty() {
        report.push(
            format!("{}.default_servers_flags", base),
            Rule::ExcludedWithout,
            "field 'default_servers_flags' requires select_default",
        );
    }

    if upstream.name().is_none() {
        report.push(
            format!("{}.name", base),
            Rule::RequiredIf,
            "field 'name' is required when select_default is false",
        );
    } else if upstream.servers.is_empty() {
        report.required(base, "servers");
    }

    for (k, server) in upstream.servers.iter().enumerate() {
        if server.addr.is_empty() {
            report.required(&format!("{}.servers[{}]", base, k), "addr");
        }
    }
}

fn validate_caches(report: &mut Report, section: &str, caches: &[CacheConfig]) {
    let mut names = HashSet::new();
    for (i, cache) in caches.iter().enumerate() {
        let base = format!("{}[{}]", section, i);
        if cache.name.is_empty() {
            report.required(&base, "name");
        } else if !names.insert(cache.name.as_str()) {
            report.push(
                format!("{}.name", base),
                Rule::Unique,
                format!("cache '{}' is declared more than once", cache.name),
            );
        }
        if cache.in_mem && cache.on_disk {
            report.excluded(&base, "in_mem", "on_disk");
        }
    }
}

fn is_path_component(name: &str) -> bool {
    name != "." && name != ".." && !name.contains('/') && !name.contains('\0')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> Config {
        serde_yaml::from_str(yaml).unwrap()
    }

    fn rules(errors: &[ValidationError]) -> Vec<(String, Rule)> {
        errors.iter().map(|e| (e.field_path.clone(), e.rule)).collect()
    }

    const VHOST: &str = "vhosts:\n  - server_name: example.com\n    locations:\n      - uri: /\n        body: return 204;\n";

    #[test]
    fn test_minimal_document_is_valid() {
        assert!(validate_config(&parse(VHOST)).is_ok());
    }

    #[test]
    fn test_select_default_with_name_rejected() {
        let yaml = format!(
            "{}upstreams:\n  - select_default: true\n    name: api\n    default_servers_flags:\n      - selector: ''\n        flags: {{ max_fails: 3 }}\n",
            VHOST
        );
        let errors = validate_config(&parse(&yaml)).unwrap_err();
        assert_eq!(rules(&errors), vec![("upstreams[0].name".to_string(), Rule::ExcludedWith)]);
    }

    #[test]
    fn test_missing_name_without_select_default_rejected() {
        let yaml = format!("{}upstreams:\n  - servers:\n      - addr: 10.0.0.1:80\n", VHOST);
        let errors = validate_config(&parse(&yaml)).unwrap_err();
        assert_eq!(rules(&errors), vec![("upstreams[0].name".to_string(), Rule::RequiredIf)]);
    }

    #[test]
    fn test_select_default_requires_flags_and_port_requires_select() {
        let yaml = format!(
            "{}upstreams:\n  - select_default: true\n  - name: api\n    select_default_port: 5000\n    servers:\n      - addr: 10.0.0.1:80\n",
            VHOST
        );
        let errors = validate_config(&parse(&yaml)).unwrap_err();
        assert_eq!(
            rules(&errors),
            vec![
                ("upstreams[0].default_servers_flags".to_string(), Rule::RequiredIf),
                ("upstreams[1].select_default_port".to_string(), Rule::ExcludedWithout),
            ]
        );
    }

    #[test]
    fn test_location_rules_collect_every_violation() {
        let yaml = "vhosts:\n  - server_name: a.com\n    locations:\n      - include: extra.conf\n        uri: /\n        body: x\n      - modifier: '='\n      - uri: /x\n        named: y\n        body: z\n";
        let errors = validate_config(&parse(yaml)).unwrap_err();
        assert_eq!(
            rules(&errors),
            vec![
                ("vhosts[0].locations[0].uri".to_string(), Rule::ExcludedWith),
                ("vhosts[0].locations[0].body".to_string(), Rule::ExcludedWith),
                ("vhosts[0].locations[1].uri".to_string(), Rule::RequiredWithout),
                ("vhosts[0].locations[1].body".to_string(), Rule::RequiredWithout),
                ("vhosts[0].locations[2].named".to_string(), Rule::ExcludedWith),
            ]
        );
    }

    #[test]
    fn test_uniqueness() {
        let yaml = "vhosts:\n  - server_name: a.com\n    locations:\n      - named: up\n        body: x\n      - named: '@up'\n        body: y\n  - server_name: a.com\n    locations:\n      - uri: /\n        body: x\nmaps:\n  - variable: v\n    string: $host\n    lines: default 0;\n  - variable: v\n    string: $host\n    lines: default 1;\nproxy_caches:\n  - name: c\n  - name: c\nfastcgi_caches:\n  - name: c\n";
        let errors = validate_config(&parse(yaml)).unwrap_err();
        assert_eq!(
            rules(&errors),
            vec![
                ("vhosts[0].locations[1].named".to_string(), Rule::Unique),
                ("vhosts[1].server_name".to_string(), Rule::Unique),
                ("maps[1].variable".to_string(), Rule::Unique),
                ("proxy_caches[1].name".to_string(), Rule::Unique),
            ]
        );
    }

    #[test]
    fn test_cache_placement_conflict() {
        let yaml = format!("{}proxy_caches:\n  - name: c\n    in_mem: true\n    on_disk: true\n", VHOST);
        let errors = validate_config(&parse(&yaml)).unwrap_err();
        assert_eq!(rules(&errors), vec![("proxy_caches[0].in_mem".to_string(), Rule::ExcludedWith)]);
        assert_eq!(
            errors[0].to_string(),
            "In proxy_caches[0].in_mem: field 'in_mem' cannot be used together with 'on_disk'"
        );
    }

    #[test]
    fn test_server_name_must_be_path_component() {
        let yaml = "vhosts:\n  - server_name: ../etc\n    locations:\n      - uri: /\n        body: x\n";
        let errors = validate_config(&parse(yaml)).unwrap_err();
        assert_eq!(rules(&errors), vec![("vhosts[0].server_name".to_string(), Rule::InvalidName)]);
    }

    #[test]
    fn test_empty_document_requires_vhosts() {
        let errors = validate_config(&Config::default()).unwrap_err();
        assert_eq!(rules(&errors), vec![("vhosts".to_string(), Rule::Required)]);
    }
}
