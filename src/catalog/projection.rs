//! Projections: aggregates, scalar functions and `AS`.
//!
//! Aggregates bind a default alias (`COUNT(host)` is also reachable as
//! `hostCount`); `AS` binds an explicit one. Both can be referenced later in
//! `HAVING` and `ORDER BY`.

use serde_json::{Value, json};

use super::{Input, Production, exact_params, json_array, json_arity, keyed, split_subject, subject_from_json};
use crate::{
    ast::{Operand, Operator, OperatorKind, PropertyRef},
    error::{ErrorKind, ParseError, Result},
    parser::{Parser, Role},
    registry::Registry,
    value::{ScalarType, ScalarValue, quote_verbatim},
};

pub struct Projection;

/// Alias an aggregate gets without `AS`: property label plus the catalog suffix.
pub fn default_alias(op: &Operator) -> Option<String> {
    let suffix = op.kind.meta().alias_suffix?;
    let property = op.property.as_ref()?;
    Some(format!("{}{suffix}", property.label()))
}

/// Second parameter type of two-parameter functions.
fn argument_type(kind: OperatorKind) -> Option<ScalarType> {
    match kind {
        OperatorKind::Interval | OperatorKind::Window => Some(ScalarType::Number),
        OperatorKind::RegexpMatch => Some(ScalarType::String),
        _ => None,
    }
}

impl Projection {
    fn digest_alias(&self, parser: &mut Parser<'_>, input: Input<'_>) -> Result<Operator> {
        let phrase = input.in_phrase(OperatorKind::As)?;
        let Some(left) = phrase.run.take_left(phrase.at) else {
            return Err(parser.error(ErrorKind::Structural, "expected an expression before AS", phrase.token));
        };
        let Some(right) = phrase.run.take_right(phrase.at) else {
            return Err(parser.error(ErrorKind::Structural, "expected a name after AS", phrase.token));
        };
        let target = parser.subject(left)?;
        let name = parser.word(&right, Role::Alias)?;
        parser.bind_alias(name.as_str(), target.clone());
        Ok(Operator::new(OperatorKind::As)
            .with_operand(target)
            .with_operand(ScalarValue::string(name)))
    }
}

impl Production for Projection {
    fn digest(&self, kind: OperatorKind, parser: &mut Parser<'_>, input: Input<'_>) -> Result<Operator> {
        if kind == OperatorKind::As {
            return self.digest_alias(parser, input);
        }

        let phrase = input.in_phrase(kind)?;
        let arity = if argument_type(kind).is_some() { 2 } else { 1 };
        let mut params = exact_params(kind, parser, phrase.token, phrase.params, arity)?.into_iter();

        let property = match params.next() {
            Some(item) => parser.property(item)?,
            None => return Err(ParseError::internal("parameter count checked above")),
        };
        let mut op = Operator::new(kind).with_property(property);
        if let (Some(item), Some(expected)) = (params.next(), argument_type(kind)) {
            op.operands.push(Operand::Value(parser.value(item, &[expected])?));
        }

        if let Some(alias) = default_alias(&op) {
            parser.bind_alias(alias, Operand::Operator(op.clone()));
        }
        Ok(op)
    }

    fn from_json(&self, kind: OperatorKind, payload: &Value, registry: &Registry) -> Result<Operator> {
        let args = json_array(kind, payload)?;

        if kind == OperatorKind::As {
            json_arity(kind, args, 2)?;
            let target = subject_from_json(&args[0], registry)?;
            let name = args[1]
                .as_str()
                .ok_or_else(|| ParseError::json("'as' expects an alias name"))?;
            return Ok(Operator::new(kind)
                .with_operand(target)
                .with_operand(ScalarValue::string(name)));
        }

        let expected = argument_type(kind);
        json_arity(kind, args, if expected.is_some() { 2 } else { 1 })?;
        let op = Operator::new(kind).with_property(PropertyRef::from_json(&args[0])?);
        match expected {
            Some(expected) => {
                let value = ScalarValue::from_json(&args[1])?;
                if value.scalar_type() != expected {
                    return Err(ParseError::type_error(format!(
                        "'{}' expects a {expected} argument, found {}",
                        kind.json_key(),
                        value.scalar_type()
                    )));
                }
                Ok(op.with_operand(value))
            }
            None => Ok(op),
        }
    }

    fn to_json(&self, op: &Operator) -> Value {
        let (subject, rest) = split_subject(op);
        let mut args = vec![subject.map(|s| s.to_json()).unwrap_or(Value::Null)];
        args.extend(rest.iter().map(Operand::to_json));
        keyed(op, json!(args))
    }

    fn to_query_string(&self, op: &Operator, registry: &Registry) -> String {
        let (subject, rest) = split_subject(op);
        let subject = subject.map(|s| s.to_query_string(registry)).unwrap_or_default();

        if op.kind == OperatorKind::As {
            let name = rest.first().and_then(Operand::as_value).and_then(|v| v.as_str()).unwrap_or_default();
            return format!("{subject} AS {}", PropertyRef::alias(name).to_query_string(registry));
        }

        let mut args = vec![subject];
        args.extend(rest.iter().map(|operand| match (op.kind, operand) {
            (OperatorKind::RegexpMatch, Operand::Value(v)) => quote_verbatim(&v.text),
            _ => operand.to_query_string(registry),
        }));
        format!("{}({})", op.kind.keyword(), args.join(", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_alias_uses_suffix() {
        let op = Operator::new(OperatorKind::UniqueCount).with_property(PropertyRef::new("host"));
        assert_eq!(default_alias(&op).as_deref(), Some("hostUniqueCount"));
        assert_eq!(default_alias(&Operator::new(OperatorKind::FromEpochTime)), None);
    }

    #[test]
    fn regexp_pattern_renders_verbatim() {
        let op = Operator::new(OperatorKind::RegexpMatch)
            .with_property(PropertyRef::new("path"))
            .with_operand(ScalarValue::string(r"^/api/\d+"));
        assert_eq!(
            Projection.to_query_string(&op, &Registry::new()),
            r"REGEXP_MATCH(path, '^/api/\d+')"
        );
        assert_eq!(
            Projection.to_json(&op),
            json!({"regexp_match": [{"source": "path"}, r"^/api/\d+"]})
        );
    }
}
