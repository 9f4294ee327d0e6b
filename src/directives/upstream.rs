//! Upstream block generation.
//!
//! # Responsibilities
//! - Synthesize one `default-<port>` bucket per app port, backed by the
//!   app listeners, plus a `default` alias for the first one
//! - Register a bucket per explicit upstream
//! - Overlay `default_servers_flags` rules onto matching default servers
//! - Render one `upstream` block per bucket

use regex::Regex;

use crate::config::{Config, Flags, UpstreamConfig};
use crate::directives::{evaluate, GenerationError, Rendered};
use crate::template::{Evaluator, NameMapping, Scope};

/// Runtime inputs for the default buckets.
#[derive(Debug, Clone, Copy)]
pub struct DefaultBuckets<'a> {
    /// `host:port` listeners; the port is replaced by each bucket's port.
    pub listeners: &'a [String],
    pub ports: &'a [u16],
}

#[derive(Debug, Clone)]
struct Server {
    addr: String,
    flags: Flags,
}

#[derive(Debug, Clone)]
struct Bucket {
    logical: String,
    servers: Vec<Server>,
    default_port: Option<u16>,
}

/// Generated identifier for a logical upstream name.
pub fn upstream_name(app: &str, logical: &str) -> String {
    format!("{}-{}", app, logical)
}

/// Logical name of the default bucket for `port`.
pub fn default_bucket(port: u16) -> String {
    format!("default-{}", port)
}

/// Name table for every upstream reference a document can make.
pub fn names(app: &str, config: &Config, ports: &[u16]) -> NameMapping {
    let mut names = NameMapping::new();
    let ports = unique_ports(ports);
    for port in &ports {
        let logical = default_bucket(*port);
        names.insert(logical.clone(), upstream_name(app, &logical));
    }
    if let Some(first) = ports.first() {
        names.insert("default".to_string(), upstream_name(app, &default_bucket(*first)));
    }
    for name in config.upstreams.iter().filter_map(UpstreamConfig::name) {
        names.insert(name.to_string(), upstream_name(app, name));
    }
    names
}

/// Render every upstream block of an app.
///
/// `scope` is the global scope; flag values are evaluated against it.
pub fn generate<E: Evaluator>(
    app: &str,
    config: &Config,
    inputs: &DefaultBuckets<'_>,
    scope: &Scope,
    evaluator: &E,
) -> Result<Rendered, GenerationError> {
    let mut buckets: Vec<Bucket> = unique_ports(inputs.ports)
        .into_iter()
        .map(|port| Bucket {
            logical: default_bucket(port),
            servers: inputs
                .listeners
                .iter()
                .map(|listener| Server {
                    addr: listener_addr(listener, port),
                    flags: Flags::new(),
                })
                .collect(),
            default_port: Some(port),
        })
        .collect();

    for upstream in &config.upstreams {
        let Some(name) = upstream.name() else { continue };
        if name == "default" || buckets.iter().any(|b| b.logical == name) {
            return Err(GenerationError::ReservedUpstream(name.to_string()));
        }
        buckets.push(Bucket {
            logical: name.to_string(),
            servers: upstream
                .servers
                .iter()
                .map(|s| Server {
                    addr: s.addr.clone(),
                    flags: s.flags.clone(),
                })
                .collect(),
            default_port: None,
        });
    }

    for (index, upstream) in config.upstreams.iter().enumerate() {
        if upstream.select_default {
            apply_default_flags(&mut buckets, index, upstream)?;
        }
    }

    let mut blocks = Vec::with_capacity(buckets.len());
    for bucket in &buckets {
        let generated = upstream_name(app, &bucket.logical);
        let mut block = format!("upstream {} {{\n", generated);
        for server in &bucket.servers {
            let flags = server.flags.try_map_values(|key, value| {
                evaluate(evaluator, value, scope, || {
                    format!("flag `{}` of server {} in upstream {}", key, server.addr, bucket.logical)
                })
            })?;
            if flags.is_empty() {
                block.push_str(&format!("    server {};\n", server.addr));
            } else {
                block.push_str(&format!("    server {} {};\n", server.addr, flags));
            }
        }
        block.push_str("}\n");
        blocks.push(block);
    }

    tracing::debug!(app = %app, upstreams = buckets.len(), "Upstreams rendered");
    Ok(Rendered {
        text: blocks.join("\n"),
        names: names(app, config, inputs.ports),
    })
}

fn apply_default_flags(
    buckets: &mut [Bucket],
    index: usize,
    upstream: &UpstreamConfig,
) -> Result<(), GenerationError> {
    if let Some(port) = upstream.select_default_port {
        if !buckets.iter().any(|b| b.default_port == Some(port)) {
            return Err(GenerationError::UnknownDefaultPort { index, port });
        }
    }

    for rule in &upstream.default_servers_flags {
        let selector = if rule.selector.is_empty() {
            None
        } else {
            Some(Regex::new(&rule.selector).map_err(|source| GenerationError::InvalidSelector {
                index,
                selector: rule.selector.clone(),
                source,
            })?)
        };

        let targets = buckets.iter_mut().filter(|b| match (b.default_port, upstream.select_default_port) {
            (Some(port), Some(wanted)) => port == wanted,
            (Some(_), None) => true,
            (None, _) => false,
        });
        for bucket in targets {
            for server in &mut bucket.servers {
                let selected = selector.as_ref().map_or(true, |re| re.is_match(&server.addr));
                if selected {
                    server.flags = server.flags.merged(&rule.flags);
                }
            }
        }
    }
    Ok(())
}

/// `host:port` with the listener's own port replaced by `port`.
fn listener_addr(listener: &str, port: u16) -> String {
    if let Some(rest) = listener.strip_prefix('[') {
        let host = rest.split_once(']').map_or(rest, |(host, _)| host);
        return format!("[{}]:{}", host, port);
    }
    match listener.matches(':').count() {
        0 => format!("{}:{}", listener, port),
        1 => {
            let host = listener.split_once(':').map_or(listener, |(host, _)| host);
            format!("{}:{}", host, port)
        }
        // bare IPv6 address
        _ => format!("[{}]:{}", listener, port),
    }
}

fn unique_ports(ports: &[u16]) -> Vec<u16> {
    let mut seen = Vec::with_capacity(ports.len());
    for port in ports {
        if !seen.contains(port) {
            seen.push(*port);
        }
    }
    seen
}
