//! Query string <-> native JSON conversion

use serde_json::Value;

use super::CliError;
use crate::{Parser, ParserOptions, Registry, SearchQuery};

#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub options: ParserOptions,
    /// Treat the input as a bare condition list.
    pub conditions: bool,
}

/// Compile a query string into its native JSON form. Non-fatal problems are
/// logged and do not fail the conversion.
pub fn compile_to_json(query: &str, registry: &Registry, options: &CompileOptions) -> Result<Value, CliError> {
    let mut parser = Parser::with_options(query, registry, options.options)?;
    let compiled = if options.conditions {
        parser.parse_conditions()?
    } else {
        parser.parse_query()?
    };
    for warning in compiled.warnings() {
        tracing::warn!(%warning, "query compiled with a recoverable error");
    }
    Ok(compiled.to_json())
}

/// Render native JSON back into a query string.
pub fn render_from_json(json: &str, registry: &Registry) -> Result<String, CliError> {
    let value: Value = serde_json::from_str(json)?;
    let query = SearchQuery::from_json(&value, registry)?;
    Ok(query.to_query_string(registry))
}
