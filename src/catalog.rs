//! # Grammar productions
//!
//! Every [`OperatorKind`] belongs to a [`Family`]; each family implements
//! [`Production`], the four conversions an operator supports:
//!
//! | direction | method |
//! |---|---|
//! | tokens -> tree | [`Production::digest`] |
//! | JSON -> tree | [`Production::from_json`] |
//! | tree -> JSON | [`Production::to_json`] |
//! | tree -> query string | [`Production::to_query_string`] |
//!
//! Adding an operator means adding a catalog entry in
//! [`crate::ast::operators`] and teaching its family the four directions.
pub mod clauses;
pub mod comparison;
pub mod existence;
pub mod logical;
pub mod membership;
pub mod projection;

use serde_json::{Value, json};

use crate::{
    ast::{Family, Operand, Operator, OperatorKind, TokenId},
    error::{ErrorKind, ParseError, Result},
    parser::{Item, Parser, Run, Stream},
    registry::Registry,
};

/// What a production digests from.
pub enum Input<'a> {
    /// An operator token inside a phrase. The operator's own slot at `at` is
    /// already empty; neighbours are claimed from `run`.
    Run {
        run: &'a mut Run,
        at: usize,
        token: TokenId,
        params: Option<Vec<Item>>,
    },
    /// A top-level clause keyword; the body is read from `stream`.
    Clause { token: TokenId, stream: &'a mut Stream },
}

pub trait Production: Sync {
    fn digest(&self, kind: OperatorKind, parser: &mut Parser<'_>, input: Input<'_>) -> Result<Operator>;

    /// Build from the payload under the operator's JSON key.
    fn from_json(&self, kind: OperatorKind, payload: &Value, registry: &Registry) -> Result<Operator>;

    /// `{json_key: payload}`
    fn to_json(&self, op: &Operator) -> Value;

    fn to_query_string(&self, op: &Operator, registry: &Registry) -> String;
}

pub fn production(kind: OperatorKind) -> &'static dyn Production {
    match kind.family() {
        Family::Comparison => &comparison::Comparison,
        Family::Membership => &membership::Membership,
        Family::Existence => &existence::Existence,
        Family::Logical => &logical::Logical,
        Family::Projection => &projection::Projection,
        Family::Clause => &clauses::Clauses,
    }
}

/// Operator token plus the phrase it sits in.
pub(crate) struct InPhrase<'a> {
    pub run: &'a mut Run,
    pub at: usize,
    pub token: TokenId,
    pub params: Option<Vec<Item>>,
}

impl<'a> Input<'a> {
    pub(crate) fn in_phrase(self, kind: OperatorKind) -> Result<InPhrase<'a>> {
        match self {
            Input::Run { run, at, token, params } => Ok(InPhrase { run, at, token, params }),
            Input::Clause { .. } => Err(ParseError::internal(format!(
                "{} cannot start a clause",
                kind.keyword()
            ))),
        }
    }

    pub(crate) fn clause(self, kind: OperatorKind) -> Result<(TokenId, &'a mut Stream)> {
        match self {
            Input::Clause { token, stream } => Ok((token, stream)),
            Input::Run { .. } => Err(ParseError::internal(format!(
                "{} is only valid as a clause",
                kind.keyword()
            ))),
        }
    }
}

/// Parameter list of a function-style operator; missing parentheses are an error.
pub(crate) fn call_params(
    kind: OperatorKind,
    parser: &Parser<'_>,
    token: TokenId,
    params: Option<Vec<Item>>,
) -> Result<Vec<Item>> {
    params.ok_or_else(|| {
        parser.error(
            ErrorKind::Structural,
            format!("expected '(' after {}", kind.keyword()),
            token,
        )
    })
}

/// Parameter list of exactly `n` items.
pub(crate) fn exact_params(
    kind: OperatorKind,
    parser: &Parser<'_>,
    token: TokenId,
    params: Option<Vec<Item>>,
    n: usize,
) -> Result<Vec<Item>> {
    let params = call_params(kind, parser, token, params)?;
    if params.len() != n {
        let noun = if n == 1 { "parameter" } else { "parameters" };
        return Err(parser.error(
            ErrorKind::Arity,
            format!("{} takes exactly {n} {noun}, found {}", kind.keyword(), params.len()),
            token,
        ));
    }
    Ok(params)
}

/// The payload array, or a JSON error naming the operator.
pub(crate) fn json_array(kind: OperatorKind, payload: &Value) -> Result<&Vec<Value>> {
    payload
        .as_array()
        .ok_or_else(|| ParseError::json(format!("'{}' expects an array, found {payload}", kind.json_key())))
}

pub(crate) fn json_arity(kind: OperatorKind, args: &[Value], n: usize) -> Result<()> {
    if args.len() != n {
        return Err(ParseError::new(
            ErrorKind::Arity,
            format!("'{}' expects {n} operands, found {}", kind.json_key(), args.len()),
        ));
    }
    Ok(())
}

/// Decode a subject operand: a property descriptor, or a nested operator.
pub(crate) fn subject_from_json(value: &Value, registry: &Registry) -> Result<Operand> {
    match Operand::from_json(value, registry)? {
        Operand::Value(v) => Err(ParseError::json(format!(
            "expected a property or operator, found value {}",
            v.text
        ))),
        operand => Ok(operand),
    }
}

/// Attach a decoded subject the way the parser does: properties go into
/// `Operator::property`, anything else becomes the first operand.
pub(crate) fn with_subject(op: Operator, subject: Operand) -> Operator {
    match subject {
        Operand::Property(p) => op.with_property(p),
        other => op.with_operand(other),
    }
}

/// Subject and the remaining operands.
pub(crate) fn split_subject(op: &Operator) -> (Option<Operand>, &[Operand]) {
    match &op.property {
        Some(p) => (Some(Operand::Property(p.clone())), &op.operands[..]),
        None => match op.operands.split_first() {
            Some((first, rest)) => (Some(first.clone()), rest),
            None => (None, &[]),
        },
    }
}

pub(crate) fn subject_json(op: &Operator) -> (Value, Vec<Value>) {
    let (subject, rest) = split_subject(op);
    (
        subject.map(|s| s.to_json()).unwrap_or(Value::Null),
        rest.iter().map(Operand::to_json).collect(),
    )
}

pub(crate) fn keyed(op: &Operator, payload: Value) -> Value {
    json!({ op.kind.json_key(): payload })
}

/// Render an operand, parenthesizing `AND` / `OR` groups.
pub(crate) fn nested(operand: &Operand, registry: &Registry) -> String {
    match operand {
        Operand::Operator(op) if op.is_connective() && op.operands.len() > 1 => {
            format!("({})", op.to_query_string(registry))
        }
        other => other.to_query_string(registry),
    }
}
