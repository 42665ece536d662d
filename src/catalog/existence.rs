//! Prefix existence tests: `EXISTS prop`, `ISNULL prop`.

use serde_json::{Value, json};

use super::{Input, Production, json_array, json_arity, keyed};
use crate::{
    ast::{Operator, OperatorKind, PropertyRef},
    error::{ErrorKind, Result},
    parser::Parser,
    registry::Registry,
};

pub struct Existence;

impl Production for Existence {
    fn digest(&self, kind: OperatorKind, parser: &mut Parser<'_>, input: Input<'_>) -> Result<Operator> {
        let phrase = input.in_phrase(kind)?;
        let Some(right) = phrase.run.take_right(phrase.at) else {
            return Err(parser.error(
                ErrorKind::Structural,
                format!("expected a property after {}", kind.keyword()),
                phrase.token,
            ));
        };
        let property = parser.property(right)?;
        Ok(Operator::new(kind).with_property(property))
    }

    fn from_json(&self, kind: OperatorKind, payload: &Value, _registry: &Registry) -> Result<Operator> {
        let args = json_array(kind, payload)?;
        json_arity(kind, args, 1)?;
        Ok(Operator::new(kind).with_property(PropertyRef::from_json(&args[0])?))
    }

    fn to_json(&self, op: &Operator) -> Value {
        let property = op.property.as_ref().map(PropertyRef::to_json).unwrap_or(Value::Null);
        keyed(op, json!([property]))
    }

    fn to_query_string(&self, op: &Operator, registry: &Registry) -> String {
        let property = op
            .property
            .as_ref()
            .map(|p| p.to_query_string(registry))
            .unwrap_or_default();
        format!("{} {property}", op.kind.keyword())
    }
}
