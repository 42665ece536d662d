//! Editor tooling: cursor details and highlight spans

use serde_json::Value;

use super::CliError;
use crate::{CursorDetails, Parser, ParserOptions, Registry};

pub fn cursor_to_json(
    query: &str,
    registry: &Registry,
    options: ParserOptions,
    offset: usize,
    skip_commas: bool,
) -> Result<Value, CliError> {
    let mut parser = Parser::with_options(query, registry, options)?;
    if !parser.evaluate() {
        tracing::debug!(errors = parser.errors().len(), "resolving cursor in a partial parse");
    }
    let details = CursorDetails::resolve(&parser, offset, skip_commas);
    Ok(serde_json::to_value(details)?)
}

pub fn highlight_to_json(query: &str, registry: &Registry, options: ParserOptions) -> Result<Value, CliError> {
    let mut parser = Parser::with_options(query, registry, options)?;
    parser.evaluate();
    Ok(serde_json::to_value(parser.highlight())?)
}
