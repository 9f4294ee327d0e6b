//! Location and vhost fragment generation.

use crate::config::{LocationConfig, VhostConfig};
use crate::directives::{body_lines, evaluate, with_newline, GenerationError, Rendered};
use crate::template::{Evaluator, Scope, VhostNames};

/// Generated variable name (without the leading `$`).
pub fn variable_name(app: &str, variable: &str) -> String {
    format!("{}_{}", app, variable)
}

/// Reference to a named location, `@name`.
pub fn named_target(named: &str) -> String {
    format!("@{}", named.trim_start_matches('@'))
}

/// Generated names of one vhost.
///
/// Named locations are keyed without their `@`, so `named: '@fallback'`
/// is reachable as `{{named_locations.fallback}}`.
pub fn names(app: &str, vhost: &VhostConfig) -> VhostNames {
    VhostNames {
        variables: vhost
            .variables
            .iter()
            .filter(|v| !v.name.is_empty())
            .map(|v| (v.name.clone(), variable_name(app, &v.name)))
            .collect(),
        named_locations: vhost
            .locations
            .iter()
            .filter_map(LocationConfig::named)
            .map(|n| (n.trim_start_matches('@').to_string(), named_target(n)))
            .collect(),
    }
}

/// Render the location blocks of one vhost, in declaration order.
///
/// Include locations are left to the include mechanism and produce no
/// output here.
pub fn generate<E: Evaluator>(
    app: &str,
    vhost: &VhostConfig,
    scope: &Scope,
    evaluator: &E,
) -> Result<Rendered, GenerationError> {
    let mut blocks = Vec::new();

    for (index, location) in vhost.locations.iter().enumerate() {
        if location.is_include() {
            continue;
        }
        let context = |field: &str| {
            format!("{} of {}.locations[{}]", field, vhost.server_name, index)
        };

        let target = match (location.uri(), location.named()) {
            (Some(uri), _) => evaluate(evaluator, uri, scope, || context("uri"))?,
            (None, Some(named)) => named_target(named),
            (None, None) => continue,
        };
        let modifier = match location.modifier() {
            Some(modifier) => Some(evaluate(evaluator, modifier, scope, || context("modifier"))?),
            None => None,
        };
        let body = evaluate(evaluator, location.body().unwrap_or_default(), scope, || {
            context("body")
        })?;

        let mut block = match modifier.as_deref().filter(|m| !m.is_empty()) {
            Some(modifier) => format!("location {} {} {{\n", modifier, target),
            None => format!("location {} {{\n", target),
        };
        for line in body_lines(&body) {
            block.push_str("    ");
            block.push_str(line);
            block.push('\n');
        }
        block.push_str("}\n");
        blocks.push(block);
    }

    Ok(Rendered {
        text: blocks.join("\n"),
        names: names(app, vhost).named_locations,
    })
}

/// Full contents of `vhosts/<server_name>/vhost.conf`.
///
/// Sections, blank-line separated: `set` lines for the vhost variables,
/// the raw `in_server_block` text, then the location blocks.
pub fn vhost_fragment<E: Evaluator>(
    app: &str,
    vhost: &VhostConfig,
    scope: &Scope,
    evaluator: &E,
) -> Result<String, GenerationError> {
    let mut sections = Vec::new();

    let mut sets = String::new();
    for variable in vhost.variables.iter().filter(|v| !v.name.is_empty()) {
        let value = evaluate(evaluator, &variable.value, scope, || {
            format!("variable `{}` of {}", variable.name, vhost.server_name)
        })?;
        sets.push_str(&format!("set ${} {};\n", variable_name(app, &variable.name), value));
    }
    if !sets.is_empty() {
        sections.push(sets);
    }

    if let Some(raw) = vhost.in_server_block.as_deref().filter(|s| !s.trim().is_empty()) {
        sections.push(with_newline(raw));
    }

    let locations = generate(app, vhost, scope, evaluator)?;
    if !locations.text.is_empty() {
        sections.push(locations.text);
    }

    tracing::debug!(vhost = %vhost.server_name, locations = vhost.locations.len(), "Vhost rendered");
    Ok(sections.join("\n"))
}
