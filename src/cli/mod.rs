//! CLI support for saql
//!
//! Provides programmatic access to the saql command line functionality for
//! embedding in other tools.

mod check;
mod convert;
mod docs;
mod inspect;

pub use check::{TestOptions, execute_test};
pub use convert::{CompileOptions, compile_to_json, render_from_json};
pub use docs::operators_overview;
pub use inspect::{cursor_to_json, highlight_to_json};

use std::{fs, io, path::Path};

use thiserror::Error;

use crate::{EvalError, ParseError, Registry};

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),
    #[error("Evaluation error: {0}")]
    Eval(#[from] EvalError),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("No input provided. Pass it as an argument or pipe it to stdin.")]
    NoInput,
}

/// Load the named-entity registry from a JSON file, or an empty one.
pub fn load_registry(path: Option<&Path>) -> Result<Registry, CliError> {
    match path {
        Some(path) => {
            let text = fs::read_to_string(path)?;
            Ok(Registry::from_json_str(&text)?)
        }
        None => Ok(Registry::new()),
    }
}
