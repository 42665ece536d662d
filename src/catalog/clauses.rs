//! Top-level clauses: `SELECT`, `WHERE`, `GROUP BY`, `GROUP BY PERMUTED`,
//! `HAVING`, `ORDER BY`, `LIMIT`, `TIME_RANGE`.
//!
//! A clause reads its body from the top-level token stream up to the next
//! clause keyword. The clause operator keeps its body as operands:
//!
//! | clause | operands |
//! |---|---|
//! | SELECT, GROUP BY | one per listed expression |
//! | WHERE, HAVING | the condition |
//! | ORDER BY | expression, direction, expression, direction, ... |
//! | LIMIT | the row count |
//! | TIME_RANGE | start, end |

use rust_decimal::Decimal;
use serde_json::{Value, json};

use super::{Input, Production, exact_params, json_array, json_arity, keyed, subject_from_json};
use crate::{
    ast::{Operand, Operator, OperatorKind, TokenId},
    error::{ErrorKind, ParseError, Result},
    parser::{Item, Parser, Role, Stream, Term},
    registry::Registry,
    value::{ScalarType, ScalarValue},
};

pub struct Clauses;

const ASC: &str = "asc";
const DESC: &str = "desc";

/// Read `item, item, ...` until the clause ends.
fn comma_list(kind: OperatorKind, parser: &mut Parser<'_>, token: TokenId, stream: &mut Stream) -> Result<Vec<Item>> {
    let mut items = Vec::new();
    loop {
        match parser.draw_one(stream)? {
            Some(item) => items.push(item),
            None => {
                let at = stream.peek().unwrap_or(token);
                return Err(parser.error(
                    ErrorKind::Structural,
                    format!("expected an expression in {}", kind.keyword()),
                    at,
                ));
            }
        }
        match stream.peek() {
            Some(id) if parser.token(id).is_comma() => stream.advance(),
            _ => return Ok(items),
        }
    }
}

/// A projected expression: property, aggregate, function or `AS`.
fn expression(parser: &mut Parser<'_>, item: Item) -> Result<Operand> {
    match item.term {
        Term::Node(Operand::Operator(op)) => Ok(Operand::Operator(op)),
        _ => parser.property(item).map(Operand::Property),
    }
}

fn direction(text: &str) -> Option<&'static str> {
    if text.eq_ignore_ascii_case(ASC) {
        Some(ASC)
    } else if text.eq_ignore_ascii_case(DESC) {
        Some(DESC)
    } else {
        None
    }
}

impl Clauses {
    fn digest_projection(
        &self,
        kind: OperatorKind,
        parser: &mut Parser<'_>,
        token: TokenId,
        stream: &mut Stream,
    ) -> Result<Operator> {
        let mut clause = Operator::new(kind);
        for item in comma_list(kind, parser, token, stream)? {
            let operand = expression(parser, item)?;
            clause.operands.push(operand);
        }
        Ok(clause)
    }

    fn digest_condition(
        &self,
        kind: OperatorKind,
        parser: &mut Parser<'_>,
        token: TokenId,
        stream: &mut Stream,
    ) -> Result<Operator> {
        let Some(item) = parser.draw_group(stream)? else {
            return Err(parser.error(
                ErrorKind::Structural,
                format!("{} must be followed by a condition", kind.keyword()),
                token,
            ));
        };
        let span = item.span;
        let condition = parser.condition(item).map_err(|_| {
            parser.error(
                ErrorKind::Structural,
                format!("{} must be followed by a condition, found '{}'", kind.keyword(), parser.slice(span)),
                token,
            )
        })?;
        Ok(Operator::new(kind).with_operand(condition))
    }

    /// `expr ASC|DESC, expr ASC|DESC, ...`; the direction is mandatory.
    fn digest_order(&self, parser: &mut Parser<'_>, token: TokenId, stream: &mut Stream) -> Result<Operator> {
        let mut clause = Operator::new(OperatorKind::OrderBy);
        loop {
            let mut items = Vec::new();
            while let Some(id) = stream.peek() {
                let t = parser.token(id);
                if t.is_delimiter() || (!items.is_empty() && t.rule.is_some_and(OperatorKind::is_clause)) {
                    break;
                }
                items.push(parser.expand(id)?);
                stream.advance();
            }

            let Some(last) = items.pop() else {
                let at = stream.peek().unwrap_or(token);
                return Err(parser.error(ErrorKind::Structural, "expected an expression in ORDER BY", at));
            };
            let dir = match last.term {
                Term::Raw if !items.is_empty() => direction(&parser.token(last.token).text),
                _ => None,
            };
            let Some(dir) = dir else {
                return Err(parser.error(
                    ErrorKind::Type,
                    format!("ORDER BY needs ASC or DESC after '{}'", parser.slice(last.span)),
                    last.token,
                ));
            };
            parser.word(&last, Role::Direction)?;

            let subject = parser.reduce(items)?;
            clause.operands.push(expression(parser, subject)?);
            clause.operands.push(Operand::Value(ScalarValue::string(dir)));

            match stream.peek() {
                Some(id) if parser.token(id).is_comma() => stream.advance(),
                _ => return Ok(clause),
            }
        }
    }

    fn digest_limit(&self, parser: &mut Parser<'_>, token: TokenId, stream: &mut Stream) -> Result<Operator> {
        let Some(item) = parser.draw_one(stream)? else {
            return Err(parser.error(ErrorKind::Structural, "expected a row count after LIMIT", token));
        };
        let at = item.token;
        let value = parser.value(item, &[ScalarType::Number])?;
        match value.as_decimal() {
            Some(n) if n >= Decimal::ZERO && n.fract().is_zero() => {
                Ok(Operator::new(OperatorKind::Limit).with_operand(value))
            }
            _ => Err(parser.error(
                ErrorKind::Type,
                format!("LIMIT must be a non-negative integer, found {}", value.text),
                at,
            )),
        }
    }

    fn digest_time_range(&self, parser: &mut Parser<'_>, token: TokenId) -> Result<Operator> {
        let params = if parser.token(token).has_children() {
            Some(parser.parameters(token)?)
        } else {
            None
        };
        let params = exact_params(OperatorKind::TimeRange, parser, token, params, 2)?;
        let mut clause = Operator::new(OperatorKind::TimeRange);
        for item in params {
            let bound = parser.value(item, &[ScalarType::String, ScalarType::Number])?;
            clause.operands.push(Operand::Value(bound));
        }
        Ok(clause)
    }
}

fn limit_from_json(payload: &Value) -> Result<Operator> {
    let value = ScalarValue::from_json(payload)?;
    match value.as_decimal() {
        Some(n) if n >= Decimal::ZERO && n.fract().is_zero() => Ok(Operator::new(OperatorKind::Limit).with_operand(value)),
        _ => Err(ParseError::type_error(format!(
            "'limit' must be a non-negative integer, found {payload}"
        ))),
    }
}

fn order_from_json(payload: &Value, registry: &Registry) -> Result<Operator> {
    let mut clause = Operator::new(OperatorKind::OrderBy);
    for entry in json_array(OperatorKind::OrderBy, payload)? {
        let pair = entry
            .as_array()
            .filter(|pair| pair.len() == 2)
            .ok_or_else(|| ParseError::json(format!("'order_by' entries are [expression, direction], found {entry}")))?;
        let dir = pair[1]
            .as_str()
            .and_then(direction)
            .ok_or_else(|| ParseError::type_error(format!("invalid sort direction {}", pair[1])))?;
        clause.operands.push(subject_from_json(&pair[0], registry)?);
        clause.operands.push(Operand::Value(ScalarValue::string(dir)));
    }
    Ok(clause)
}

impl Production for Clauses {
    fn digest(&self, kind: OperatorKind, parser: &mut Parser<'_>, input: Input<'_>) -> Result<Operator> {
        let (token, stream) = input.clause(kind)?;
        match kind {
            OperatorKind::Select | OperatorKind::GroupBy | OperatorKind::GroupByPermuted => {
                self.digest_projection(kind, parser, token, stream)
            }
            OperatorKind::Where | OperatorKind::Having => self.digest_condition(kind, parser, token, stream),
            OperatorKind::OrderBy => self.digest_order(parser, token, stream),
            OperatorKind::Limit => self.digest_limit(parser, token, stream),
            OperatorKind::TimeRange => self.digest_time_range(parser, token),
            other => Err(ParseError::internal(format!("{} is not a clause", other.keyword()))),
        }
    }

    fn from_json(&self, kind: OperatorKind, payload: &Value, registry: &Registry) -> Result<Operator> {
        match kind {
            OperatorKind::Select | OperatorKind::GroupBy | OperatorKind::GroupByPermuted => {
                let operands = json_array(kind, payload)?
                    .iter()
                    .map(|item| subject_from_json(item, registry))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Operator::new(kind).with_operands(operands))
            }
            OperatorKind::Where | OperatorKind::Having => {
                let condition = Operator::from_json(payload, registry)?;
                if !condition.is_condition() {
                    return Err(ParseError::json(format!(
                        "'{}' expects a condition, found '{}'",
                        kind.json_key(),
                        condition.kind.json_key()
                    )));
                }
                Ok(Operator::new(kind).with_operand(condition))
            }
            OperatorKind::OrderBy => order_from_json(payload, registry),
            OperatorKind::Limit => limit_from_json(payload),
            OperatorKind::TimeRange => {
                let args = json_array(kind, payload)?;
                json_arity(kind, args, 2)?;
                let bounds = args
                    .iter()
                    .map(|v| ScalarValue::from_json(v).map(Operand::Value))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Operator::new(kind).with_operands(bounds))
            }
            other => Err(ParseError::internal(format!("{} is not a clause", other.keyword()))),
        }
    }

    fn to_json(&self, op: &Operator) -> Value {
        let payload = match op.kind {
            OperatorKind::Where | OperatorKind::Having | OperatorKind::Limit => {
                op.operands.first().map(Operand::to_json).unwrap_or(Value::Null)
            }
            OperatorKind::OrderBy => Value::Array(
                op.operands
                    .chunks(2)
                    .map(|pair| json!(pair.iter().map(Operand::to_json).collect::<Vec<_>>()))
                    .collect(),
            ),
            _ => Value::Array(op.operands.iter().map(Operand::to_json).collect()),
        };
        keyed(op, payload)
    }

    fn to_query_string(&self, op: &Operator, registry: &Registry) -> String {
        let body = match op.kind {
            OperatorKind::OrderBy => op
                .operands
                .chunks(2)
                .map(|pair| {
                    let expr = pair.first().map(|e| e.to_query_string(registry)).unwrap_or_default();
                    let dir = pair
                        .get(1)
                        .and_then(Operand::as_value)
                        .and_then(ScalarValue::as_str)
                        .unwrap_or(ASC)
                        .to_ascii_uppercase();
                    format!("{expr} {dir}")
                })
                .collect::<Vec<_>>()
                .join(", "),
            OperatorKind::TimeRange => {
                let bounds = op
                    .operands
                    .iter()
                    .map(|b| b.to_query_string(registry))
                    .collect::<Vec<_>>()
                    .join(", ");
                return format!("TIME_RANGE({bounds})");
            }
            _ => op
                .operands
                .iter()
                .map(|o| o.to_query_string(registry))
                .collect::<Vec<_>>()
                .join(", "),
        };
        format!("{} {body}", op.kind.keyword())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_by_json_pairs() {
        let registry = Registry::new();
        let clause = order_from_json(&json!([[{"source": "ts"}, "DESC"]]), &registry).unwrap();
        assert_eq!(Clauses.to_json(&clause), json!({"order_by": [[{"source": "ts"}, "desc"]]}));
        assert_eq!(Clauses.to_query_string(&clause, &registry), "ORDER BY ts DESC");
    }

    #[test]
    fn negative_limit_from_json() {
        assert_eq!(limit_from_json(&json!(-1)).unwrap_err().kind, ErrorKind::Type);
        assert!(limit_from_json(&json!(25)).is_ok());
    }
}
