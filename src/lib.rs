//! Bidirectional compiler for a SQL-like security analytics query language.
//!
//! A query exists in three forms: the query string a person types, the native
//! JSON the search service consumes, and an operator tree in between.
//!
//! ```
//! use saql::{Registry, SearchQuery};
//! use serde_json::json;
//!
//! let registry = Registry::new();
//! let query = SearchQuery::from_query_string("WHERE status = 'open' LIMIT 10", &registry).unwrap();
//! assert_eq!(
//!     query.to_json(),
//!     json!({"where": {"=": [{"source": "status"}, "open"]}, "limit": 10})
//! );
//! assert!(query.test(&json!({"status": "open"})).unwrap());
//! ```

pub mod ast;
pub mod builder;
pub mod catalog;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod cursor;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod parser;
pub mod preprocess;
pub mod query;
pub mod registry;
pub mod state;
pub mod value;

pub use ast::{Connective, Operand, Operator, OperatorKind, PropertyRef, Span};
pub use builder::QueryBuilder;
pub use config::ParserOptions;
pub use cursor::{CursorDetails, Facet};
pub use error::{ErrorKind, EvalError, ParseError};
pub use evaluator::{Evaluator, Subject};
pub use lexer::Lexer;
pub use parser::{Highlight, HighlightClass, Parser};
pub use query::{ColumnDescription, ColumnType, SearchQuery};
pub use registry::Registry;
pub use value::{ScalarType, ScalarValue};
