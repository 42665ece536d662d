use serde::Serialize;
use thiserror::Error;

use crate::ast::Span;

/// Broad family a [`ParseError`] belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Unterminated literal, stray closing parenthesis, nesting too deep.
    Lexical,
    /// Phrase that cannot be reduced to a single node, dangling connective,
    /// clause body that is not a logical expression.
    Structural,
    /// Wrong number of operands for an operator or clause.
    Arity,
    /// Operand of the wrong type (non-numeric bound, negative limit, bad direction).
    Type,
    /// Native JSON form that does not match the grammar.
    Json,
    /// Safety ceilings exceeded or engine invariants broken.
    Internal,
}

/// The token an error points at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenInfo {
    pub text: String,
    pub span: Span,
}

/// A compile error carrying the offending token and the full source expression.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[error("{message}{}", location(.token))]
pub struct ParseError {
    pub kind: ErrorKind,
    pub message: String,
    pub token: Option<TokenInfo>,
    pub expression: String,
}

fn location(token: &Option<TokenInfo>) -> String {
    match token {
        Some(t) => format!(" at {}..{} near '{}'", t.span.start, t.span.end, t.text),
        None => String::new(),
    }
}

impl ParseError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        ParseError {
            kind,
            message: message.into(),
            token: None,
            expression: String::new(),
        }
    }

    pub fn structural(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Structural, message)
    }

    pub fn arity(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Arity, message)
    }

    pub fn type_error(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Type, message)
    }

    pub fn json(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Json, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn at(mut self, text: impl Into<String>, span: Span) -> Self {
        self.token = Some(TokenInfo {
            text: text.into(),
            span,
        });
        self
    }

    /// Attach the source expression unless one is already present.
    pub fn in_expression(mut self, expression: &str) -> Self {
        if self.expression.is_empty() {
            self.expression = expression.to_string();
        }
        self
    }
}

/// Errors raised by the local condition evaluator.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    /// Operator key the evaluator has no rule for.
    #[error("unsupported operator '{0}' in condition")]
    UnsupportedOperator(String),

    /// Condition JSON that does not have the `{key: [operands]}` shape.
    #[error("malformed condition: {0}")]
    MalformedCondition(String),
}

pub type Result<T> = std::result::Result<T, ParseError>;
