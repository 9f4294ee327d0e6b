//! `map` block generation.

use crate::config::Config;
use crate::directives::{body_lines, evaluate, GenerationError, Rendered};
use crate::template::{Evaluator, NameMapping, Scope};

/// Generated variable name (without the leading `$`).
pub fn variable_name(app: &str, variable: &str) -> String {
    format!("{}_{}", app, variable)
}

pub fn names(app: &str, config: &Config) -> NameMapping {
    config
        .maps
        .iter()
        .map(|m| (m.variable.clone(), variable_name(app, &m.variable)))
        .collect()
}

/// Render one `map` block per declared map.
///
/// Only `user_vars` is visible to the source string and the lines.
pub fn generate<E: Evaluator>(
    app: &str,
    config: &Config,
    scope: &Scope,
    evaluator: &E,
) -> Result<Rendered, GenerationError> {
    let scope = scope.user_vars_only();
    let mut blocks = Vec::with_capacity(config.maps.len());

    for map in &config.maps {
        let source = evaluate(evaluator, &map.string, &scope, || {
            format!("string of map `{}`", map.variable)
        })?;
        let lines = evaluate(evaluator, &map.lines, &scope, || {
            format!("lines of map `{}`", map.variable)
        })?;

        let mut block = format!("map {} ${} {{\n", source, variable_name(app, &map.variable));
        for line in body_lines(&lines) {
            block.push_str("    ");
            block.push_str(line.trim_start());
            block.push('\n');
        }
        block.push_str("}\n");
        blocks.push(block);
    }

    Ok(Rendered {
        text: blocks.join("\n"),
        names: names(app, config),
    })
}
