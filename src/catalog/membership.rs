//! Set operators written in function-call form after their property:
//! `IN (..)`, `BETWEEN (lo, hi)`, `CONTAINS_ANY (..)`, `CONTAINS_ALL (..)`.

use serde_json::{Value, json};

use super::{Input, Production, call_params, json_array, json_arity, keyed, split_subject, subject_from_json, with_subject};
use crate::{
    ast::{Operand, Operator, OperatorKind},
    error::{ErrorKind, ParseError, Result},
    parser::Parser,
    registry::Registry,
    value::{ScalarType, ScalarValue},
};

pub struct Membership;

fn is_range(kind: OperatorKind) -> bool {
    kind == OperatorKind::Between
}

impl Production for Membership {
    fn digest(&self, kind: OperatorKind, parser: &mut Parser<'_>, input: Input<'_>) -> Result<Operator> {
        let phrase = input.in_phrase(kind)?;
        let params = call_params(kind, parser, phrase.token, phrase.params)?;
        let Some(left) = phrase.run.take_left(phrase.at) else {
            return Err(parser.error(
                ErrorKind::Structural,
                format!("expected a property before {}", kind.keyword()),
                phrase.token,
            ));
        };
        let subject = parser.subject(left)?;

        if is_range(kind) {
            if params.len() != 2 {
                return Err(parser.error(
                    ErrorKind::Arity,
                    format!("BETWEEN takes exactly two bounds, found {}", params.len()),
                    phrase.token,
                ));
            }
        } else if params.is_empty() {
            return Err(parser.error(
                ErrorKind::Arity,
                format!("{} requires at least one value", kind.keyword()),
                phrase.token,
            ));
        }

        let allowed: &[ScalarType] = if is_range(kind) { &[ScalarType::Number] } else { &[] };
        let mut op = with_subject(Operator::new(kind), subject);
        for param in params {
            op.operands.push(Operand::Value(parser.value(param, allowed)?));
        }
        Ok(op)
    }

    fn from_json(&self, kind: OperatorKind, payload: &Value, registry: &Registry) -> Result<Operator> {
        let args = json_array(kind, payload)?;
        if is_range(kind) {
            json_arity(kind, args, 3)?;
            let subject = subject_from_json(&args[0], registry)?;
            let mut op = with_subject(Operator::new(kind), subject);
            for bound in &args[1..] {
                let value = ScalarValue::from_json(bound)?;
                if value.scalar_type() != ScalarType::Number {
                    return Err(ParseError::type_error(format!(
                        "'between' bounds must be numbers, found {}",
                        value.scalar_type()
                    )));
                }
                op.operands.push(Operand::Value(value));
            }
            return Ok(op);
        }

        json_arity(kind, args, 2)?;
        let subject = subject_from_json(&args[0], registry)?;
        let values = args[1]
            .as_array()
            .ok_or_else(|| ParseError::json(format!("'{}' expects a list of values", kind.json_key())))?;
        if values.is_empty() {
            return Err(ParseError::arity(format!(
                "'{}' requires at least one value",
                kind.json_key()
            )));
        }
        let values = values
            .iter()
            .map(|v| ScalarValue::from_json(v).map(Operand::Value))
            .collect::<Result<Vec<_>>>()?;
        Ok(with_subject(Operator::new(kind), subject).with_operands(values))
    }

    fn to_json(&self, op: &Operator) -> Value {
        let (subject, rest) = split_subject(op);
        let subject = subject.map(|s| s.to_json()).unwrap_or(Value::Null);
        let values: Vec<Value> = rest.iter().map(Operand::to_json).collect();
        if is_range(op.kind) {
            let mut args = vec![subject];
            args.extend(values);
            keyed(op, Value::Array(args))
        } else {
            keyed(op, json!([subject, values]))
        }
    }

    fn to_query_string(&self, op: &Operator, registry: &Registry) -> String {
        let (subject, rest) = split_subject(op);
        let subject = subject.map(|s| s.to_query_string(registry)).unwrap_or_default();
        let values = rest
            .iter()
            .map(|v| v.to_query_string(registry))
            .collect::<Vec<_>>()
            .join(", ");
        format!("{subject} {} ({values})", op.kind.keyword())
    }
}

#[test]
fn test_in_json_shape() {
    use crate::ast::PropertyRef;

    let op = Operator::new(OperatorKind::In)
        .with_property(PropertyRef::new("region"))
        .with_operand(ScalarValue::string("us-east-1"))
        .with_operand(ScalarValue::string("us-west-2"));
    assert_eq!(
        Membership.to_json(&op),
        json!({"in": [{"source": "region"}, ["us-east-1", "us-west-2"]]})
    );
    assert_eq!(
        Membership.to_query_string(&op, &Registry::new()),
        "region IN ('us-east-1', 'us-west-2')"
    );
}
