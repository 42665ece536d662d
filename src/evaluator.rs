//! Local evaluation of a compiled condition against one in-memory record.
//!
//! This is a narrow matcher, not a query engine: it walks the native JSON form
//! of a `WHERE` condition and understands `and`, `or`, `not`, `=`, `!=`, `in`,
//! `contains_any` and `contains_all`. Anything else is reported as
//! [`EvalError::UnsupportedOperator`].
//!
//! `and` and `or` evaluate every child before combining the results; an
//! unsupported operator anywhere in the tree is an error even when an earlier
//! sibling already decided the outcome.

use std::{collections::HashMap, str::FromStr};

use rust_decimal::Decimal;
use serde_json::Value;

use crate::{ast::DEFAULT_NAMESPACE, error::EvalError};

/// A record conditions can be tested against.
pub trait Subject {
    /// Value of property `name` in `namespace`, or `None` when absent.
    fn property_value(&self, name: &str, namespace: &str) -> Option<Value>;
}

/// Default-namespace properties are top-level keys; other namespaces are
/// nested objects (`{"flow": {"bytes": 10}}`).
impl Subject for Value {
    fn property_value(&self, name: &str, namespace: &str) -> Option<Value> {
        let scope = if namespace == DEFAULT_NAMESPACE {
            self
        } else {
            self.get(namespace)?
        };
        scope.get(name).cloned()
    }
}

impl Subject for HashMap<String, Value> {
    fn property_value(&self, name: &str, namespace: &str) -> Option<Value> {
        if namespace == DEFAULT_NAMESPACE {
            self.get(name).cloned()
        } else {
            self.get(namespace)?.get(name).cloned()
        }
    }
}

pub struct Evaluator<'s, S: Subject + ?Sized> {
    subject: &'s S,
}

fn malformed(key: &str, args: &Value) -> EvalError {
    EvalError::MalformedCondition(format!("'{key}' with operands {args}"))
}

/// Numbers compare by value (`1` equals `1.0`); everything else structurally.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            match (Decimal::from_str(&x.to_string()), Decimal::from_str(&y.to_string())) {
                (Ok(x), Ok(y)) => x == y,
                _ => x == y,
            }
        }
        _ => a == b,
    }
}

impl<'s, S: Subject + ?Sized> Evaluator<'s, S> {
    pub fn new(subject: &'s S) -> Self {
        Evaluator { subject }
    }

    /// Test a condition in native JSON form.
    pub fn test(&self, condition: &Value) -> Result<bool, EvalError> {
        let object = condition
            .as_object()
            .filter(|o| o.len() == 1)
            .ok_or_else(|| EvalError::MalformedCondition(condition.to_string()))?;
        let Some((key, args)) = object.iter().next() else {
            return Err(EvalError::MalformedCondition(condition.to_string()));
        };
        let operands = args.as_array().ok_or_else(|| malformed(key, args))?;

        match key.as_str() {
            "and" => Ok(self.test_all(operands)?.into_iter().all(|r| r)),
            "or" => Ok(self.test_all(operands)?.into_iter().any(|r| r)),
            "not" => match operands.as_slice() {
                [inner] => Ok(!self.test(inner)?),
                _ => Err(malformed(key, args)),
            },
            "=" | "!=" => {
                let [property, expected] = operands.as_slice() else {
                    return Err(malformed(key, args));
                };
                let actual = self.resolve(property).ok_or_else(|| malformed(key, args))?;
                let equal = values_equal(&actual, expected);
                Ok(if key == "=" { equal } else { !equal })
            }
            "in" => {
                let (actual, candidates) = self.list_operands(key, args, operands)?;
                Ok(candidates.iter().any(|c| values_equal(&actual, c)))
            }
            "contains_any" | "contains_all" => {
                let (actual, wanted) = self.list_operands(key, args, operands)?;
                let held: Vec<Value> = match actual {
                    Value::Array(items) => items,
                    Value::Null => Vec::new(),
                    other => vec![other],
                };
                let present = |w: &Value| held.iter().any(|h| values_equal(h, w));
                Ok(if key == "contains_any" {
                    wanted.iter().any(present)
                } else {
                    wanted.iter().all(present)
                })
            }
            other => Err(EvalError::UnsupportedOperator(other.to_string())),
        }
    }

    fn test_all(&self, operands: &[Value]) -> Result<Vec<bool>, EvalError> {
        operands.iter().map(|c| self.test(c)).collect()
    }

    fn list_operands<'v>(
        &self,
        key: &str,
        args: &Value,
        operands: &'v [Value],
    ) -> Result<(Value, &'v [Value]), EvalError> {
        let [property, Value::Array(list)] = operands else {
            return Err(malformed(key, args));
        };
        let actual = self.resolve(property).ok_or_else(|| malformed(key, args))?;
        Ok((actual, list.as_slice()))
    }

    /// Look up a property descriptor; `None` when the descriptor itself is
    /// malformed, `Some(Null)` when the record lacks the property.
    fn resolve(&self, descriptor: &Value) -> Option<Value> {
        let (name, namespace) = match (descriptor.get("source"), descriptor.get("alias")) {
            (Some(Value::String(id)), _) => (id.as_str(), DEFAULT_NAMESPACE),
            (Some(Value::Object(source)), _) => (
                source.get("id")?.as_str()?,
                source.get("ns").and_then(Value::as_str).unwrap_or(DEFAULT_NAMESPACE),
            ),
            (None, Some(Value::String(alias))) => (alias.as_str(), DEFAULT_NAMESPACE),
            _ => return None,
        };
        Some(self.subject.property_value(name, namespace).unwrap_or(Value::Null))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn numbers_compare_by_value() {
        let record = json!({"bytes": 1.0});
        let evaluator = Evaluator::new(&record);
        assert!(evaluator.test(&json!({"=": [{"source": "bytes"}, 1]})).unwrap());
    }

    #[test]
    fn namespaced_lookup() {
        let record = json!({"flow": {"proto": "tcp"}});
        let evaluator = Evaluator::new(&record);
        let condition = json!({"=": [{"source": {"ns": "flow", "id": "proto"}}, "tcp"]});
        assert!(evaluator.test(&condition).unwrap());
    }

    #[test]
    fn unsupported_operator_fails_even_after_decided_sibling() {
        let record = json!({"a": 1});
        let evaluator = Evaluator::new(&record);
        let condition = json!({"or": [{"=": [{"source": "a"}, 1]}, {">": [{"source": "a"}, 0]}]});
        assert_eq!(
            evaluator.test(&condition),
            Err(EvalError::UnsupportedOperator(">".to_string()))
        );
    }
}
