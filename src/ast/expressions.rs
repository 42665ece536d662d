use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    ast::{OperatorKind, PropertyRef, Span},
    catalog,
    error::ParseError,
    registry::Registry,
    value::ScalarValue,
};

/// One operand of an [`Operator`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Operand {
    Property(PropertyRef),
    Value(ScalarValue),
    Operator(Operator),
}

impl Operand {
    pub fn to_json(&self) -> Value {
        match self {
            Operand::Property(p) => p.to_json(),
            Operand::Value(v) => v.to_json(),
            Operand::Operator(op) => op.to_json(),
        }
    }

    pub fn to_query_string(&self, registry: &Registry) -> String {
        match self {
            Operand::Property(p) => p.to_query_string(registry),
            Operand::Value(v) => v.to_query_string(registry),
            Operand::Operator(op) => op.to_query_string(registry),
        }
    }

    /// Read an operand of unknown shape: property descriptor, operator object or scalar.
    pub fn from_json(value: &Value, registry: &Registry) -> Result<Self, ParseError> {
        match value {
            Value::Object(map) if map.contains_key("source") || map.contains_key("alias") => {
                PropertyRef::from_json(value).map(Operand::Property)
            }
            Value::Object(_) => Operator::from_json(value, registry).map(Operand::Operator),
            _ => ScalarValue::from_json(value).map(Operand::Value),
        }
    }

    pub fn as_property(&self) -> Option<&PropertyRef> {
        match self {
            Operand::Property(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_value(&self) -> Option<&ScalarValue> {
        match self {
            Operand::Value(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_operator(&self) -> Option<&Operator> {
        match self {
            Operand::Operator(op) => Some(op),
            _ => None,
        }
    }

    pub fn as_operator_mut(&mut self) -> Option<&mut Operator> {
        match self {
            Operand::Operator(op) => Some(op),
            _ => None,
        }
    }
}

impl From<PropertyRef> for Operand {
    fn from(p: PropertyRef) -> Self {
        Operand::Property(p)
    }
}

impl From<ScalarValue> for Operand {
    fn from(v: ScalarValue) -> Self {
        Operand::Value(v)
    }
}

impl From<Operator> for Operand {
    fn from(op: Operator) -> Self {
        Operand::Operator(op)
    }
}

/// `AND` / `OR`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Connective {
    And,
    Or,
}

impl Connective {
    pub fn kind(self) -> OperatorKind {
        match self {
            Connective::And => OperatorKind::And,
            Connective::Or => OperatorKind::Or,
        }
    }

    pub fn from_kind(kind: OperatorKind) -> Option<Self> {
        match kind {
            OperatorKind::And => Some(Connective::And),
            OperatorKind::Or => Some(Connective::Or),
            _ => None,
        }
    }

    pub fn keyword(self) -> &'static str {
        self.kind().keyword()
    }
}

/// A node of the operator tree: one grammar production with its operands.
///
/// `property` holds the subject when it is a plain property; any other
/// subject (an aggregate in `HAVING COUNT(x) > 3`) is the first operand.
#[derive(Debug, Clone, Serialize)]
pub struct Operator {
    pub kind: OperatorKind,
    pub property: Option<PropertyRef>,
    pub operands: Vec<Operand>,
    /// Source range, for operators produced by the parser.
    #[serde(skip)]
    pub span: Option<Span>,
}

impl PartialEq for Operator {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind && self.property == other.property && self.operands == other.operands
    }
}

impl Operator {
    pub fn new(kind: OperatorKind) -> Self {
        Operator {
            kind,
            property: None,
            operands: Vec::new(),
            span: None,
        }
    }

    pub fn with_property(mut self, property: PropertyRef) -> Self {
        self.property = Some(property);
        self
    }

    pub fn with_operand(mut self, operand: impl Into<Operand>) -> Self {
        self.operands.push(operand.into());
        self
    }

    pub fn with_operands(mut self, operands: impl IntoIterator<Item = Operand>) -> Self {
        self.operands.extend(operands);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    /// Empty `AND` / `OR` group.
    pub fn group(connective: Connective) -> Self {
        Operator::new(connective.kind())
    }

    pub fn is_connective(&self) -> bool {
        self.kind.is_connective()
    }

    pub fn is_condition(&self) -> bool {
        self.kind.is_condition()
    }

    /// Property or operator the operator is about, if any.
    pub fn subject(&self) -> Option<Operand> {
        match &self.property {
            Some(p) => Some(Operand::Property(p.clone())),
            None => self.operands.first().cloned(),
        }
    }

    /// Scalar operands, in order.
    pub fn values(&self) -> impl Iterator<Item = &ScalarValue> {
        self.operands.iter().filter_map(Operand::as_value)
    }

    /// Sub-operators, in order.
    pub fn children(&self) -> impl Iterator<Item = &Operator> {
        self.operands.iter().filter_map(Operand::as_operator)
    }

    /// True if this node or anything beneath it aggregates.
    pub fn contains_aggregate(&self) -> bool {
        self.kind.is_aggregate() || self.children().any(Operator::contains_aggregate)
    }

    /// True for `AND` / `OR` / `NOT` nodes with nothing left to combine.
    pub fn is_empty_group(&self) -> bool {
        (self.is_connective() || self.kind == OperatorKind::Not) && self.operands.is_empty()
    }

    /// Drop empty groups and negations of empty groups beneath this node.
    pub fn prune_empty_groups(&mut self) {
        self.operands.retain_mut(|operand| match operand {
            Operand::Operator(op) => {
                op.prune_empty_groups();
                !op.is_empty_group()
            }
            _ => true,
        });
    }

    pub fn to_json(&self) -> Value {
        catalog::production(self.kind).to_json(self)
    }

    pub fn to_query_string(&self, registry: &Registry) -> String {
        catalog::production(self.kind).to_query_string(self, registry)
    }

    /// Read a single-key `{json_key: payload}` object.
    pub fn from_json(value: &Value, registry: &Registry) -> Result<Self, ParseError> {
        let (key, payload) = single_entry(value)?;
        let kind = OperatorKind::from_json_key(key)
            .ok_or_else(|| ParseError::json(format!("unknown operator '{key}'")))?;
        catalog::production(kind).from_json(kind, payload, registry)
    }
}

fn single_entry(value: &Value) -> Result<(&str, &Value), ParseError> {
    let map: &Map<String, Value> = value
        .as_object()
        .ok_or_else(|| ParseError::json(format!("expected an operator object, found {value}")))?;
    let mut entries = map.iter();
    match (entries.next(), entries.next()) {
        (Some((key, payload)), None) => Ok((key.as_str(), payload)),
        _ => Err(ParseError::json(format!(
            "operator objects must have exactly one key, found {}",
            map.len()
        ))),
    }
}
