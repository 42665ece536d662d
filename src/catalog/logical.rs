//! Boolean connectives. `AND` / `OR` groups are folded by the engine
//! ([`Parser::draw_group`]); only `NOT` digests from a phrase.

use serde_json::{Value, json};

use super::{Input, Production, json_array, json_arity, keyed, nested};
use crate::{
    ast::{Operand, Operator, OperatorKind},
    error::{ErrorKind, ParseError, Result},
    parser::Parser,
    registry::Registry,
};

pub struct Logical;

fn condition_from_json(value: &Value, registry: &Registry) -> Result<Operand> {
    let op = Operator::from_json(value, registry)?;
    if !op.is_condition() {
        return Err(ParseError::json(format!(
            "'{}' is not a condition",
            op.kind.json_key()
        )));
    }
    Ok(Operand::Operator(op))
}

impl Production for Logical {
    fn digest(&self, kind: OperatorKind, parser: &mut Parser<'_>, input: Input<'_>) -> Result<Operator> {
        let phrase = input.in_phrase(kind)?;
        if kind != OperatorKind::Not {
            return Err(parser.error(
                ErrorKind::Structural,
                format!("{} needs a condition on both sides", kind.keyword()),
                phrase.token,
            ));
        }
        let Some(right) = phrase.run.take_right(phrase.at) else {
            return Err(parser.error(ErrorKind::Structural, "expected a condition after NOT", phrase.token));
        };
        let condition = parser.condition(right)?;
        Ok(Operator::new(kind).with_operand(condition))
    }

    fn from_json(&self, kind: OperatorKind, payload: &Value, registry: &Registry) -> Result<Operator> {
        let args = json_array(kind, payload)?;
        if kind == OperatorKind::Not {
            json_arity(kind, args, 1)?;
        }
        let operands = args
            .iter()
            .map(|arg| condition_from_json(arg, registry))
            .collect::<Result<Vec<_>>>()?;
        Ok(Operator::new(kind).with_operands(operands))
    }

    fn to_json(&self, op: &Operator) -> Value {
        let operands: Vec<Value> = op.operands.iter().map(Operand::to_json).collect();
        keyed(op, json!(operands))
    }

    fn to_query_string(&self, op: &Operator, registry: &Registry) -> String {
        if op.kind == OperatorKind::Not {
            return match op.operands.first() {
                Some(Operand::Operator(inner)) if inner.kind == OperatorKind::Not => {
                    format!("NOT ({})", inner.to_query_string(registry))
                }
                Some(inner) => match nested(inner, registry) {
                    text if text.is_empty() => text,
                    text => format!("NOT {text}"),
                },
                None => String::new(),
            };
        }
        let separator = format!(" {} ", op.kind.keyword());
        op.operands
            .iter()
            .map(|o| nested(o, registry))
            .filter(|text| !text.is_empty())
            .collect::<Vec<_>>()
            .join(&separator)
    }
}

#[test]
fn test_nested_groups_keep_parentheses() {
    use crate::{ast::PropertyRef, value::ScalarValue};

    let eq = |name: &str, v: i64| {
        Operand::Operator(
            Operator::new(OperatorKind::Equals)
                .with_property(PropertyRef::new(name))
                .with_operand(ScalarValue::number(v)),
        )
    };
    let inner = Operator::new(OperatorKind::Or).with_operands([eq("a", 1), eq("b", 2)]);
    let outer = Operator::new(OperatorKind::And).with_operands([Operand::Operator(inner), eq("c", 3)]);
    assert_eq!(
        Logical.to_query_string(&outer, &Registry::new()),
        "(a = 1 OR b = 2) AND c = 3"
    );
}

#[test]
fn test_empty_groups_render_as_nothing() {
    use crate::{ast::{Connective, PropertyRef}, value::ScalarValue};

    let eq = Operator::new(OperatorKind::Equals)
        .with_property(PropertyRef::new("a"))
        .with_operand(ScalarValue::number(1));
    let negated_empty = Operator::new(OperatorKind::Not).with_operand(Operator::group(Connective::And));
    let outer = Operator::new(OperatorKind::And).with_operands([Operand::Operator(negated_empty), Operand::Operator(eq)]);
    assert_eq!(Logical.to_query_string(&outer, &Registry::new()), "a = 1");
}
