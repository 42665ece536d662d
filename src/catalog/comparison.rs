//! Infix comparators: `=`, `!=`, `>`, `<`, `>=`, `<=`, `CONTAINS`, `LIKE`, `CIDR_MATCH`.
//!
//! ```text
//! bytes >= 1000            {">=": [{"source": "bytes"}, 1000]}
//! COUNT(host) > 3          {">": [{"count": [{"source": "host"}]}, 3]}
//! ```

use serde_json::{Value, json};

use super::{Input, Production, json_array, json_arity, keyed, split_subject, subject_from_json, subject_json, with_subject};
use crate::{
    ast::{Operator, OperatorKind},
    error::{ErrorKind, ParseError, Result},
    parser::Parser,
    registry::Registry,
    value::{ScalarType, ScalarValue},
};

pub struct Comparison;

/// Value types each comparator accepts; empty means any.
fn accepted(kind: OperatorKind) -> &'static [ScalarType] {
    match kind {
        OperatorKind::Like | OperatorKind::CidrMatch => &[ScalarType::String],
        _ => &[],
    }
}

impl Production for Comparison {
    fn digest(&self, kind: OperatorKind, parser: &mut Parser<'_>, input: Input<'_>) -> Result<Operator> {
        let phrase = input.in_phrase(kind)?;
        let Some(left) = phrase.run.take_left(phrase.at) else {
            return Err(parser.error(
                ErrorKind::Structural,
                format!("expected a property before '{}'", kind.keyword()),
                phrase.token,
            ));
        };
        let Some(right) = phrase.run.take_right(phrase.at) else {
            return Err(parser.error(
                ErrorKind::Structural,
                format!("expected a value after '{}'", kind.keyword()),
                phrase.token,
            ));
        };

        let subject = parser.subject(left)?;
        let value = parser.value(right, accepted(kind))?;
        Ok(with_subject(Operator::new(kind), subject).with_operand(value))
    }

    fn from_json(&self, kind: OperatorKind, payload: &Value, registry: &Registry) -> Result<Operator> {
        let args = json_array(kind, payload)?;
        json_arity(kind, args, 2)?;
        let subject = subject_from_json(&args[0], registry)?;
        let value = ScalarValue::from_json(&args[1])?;
        if !accepted(kind).is_empty() && !accepted(kind).contains(&value.scalar_type()) {
            return Err(ParseError::type_error(format!(
                "'{}' compares against a string, found {}",
                kind.json_key(),
                value.scalar_type()
            )));
        }
        Ok(with_subject(Operator::new(kind), subject).with_operand(value))
    }

    fn to_json(&self, op: &Operator) -> Value {
        let (subject, rest) = subject_json(op);
        let value = rest.into_iter().next().unwrap_or(Value::Null);
        keyed(op, json!([subject, value]))
    }

    fn to_query_string(&self, op: &Operator, registry: &Registry) -> String {
        let (subject, rest) = split_subject(op);
        let subject = subject.map(|s| s.to_query_string(registry)).unwrap_or_default();
        let value = rest
            .first()
            .map(|v| v.to_query_string(registry))
            .unwrap_or_default();
        format!("{subject} {} {value}", op.kind.keyword())
    }
}
