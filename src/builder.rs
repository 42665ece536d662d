//! Fluent construction of `WHERE` conditions.
//!
//! ```
//! use saql::{QueryBuilder, Connective};
//!
//! let query = QueryBuilder::new()
//!     .equals("status", "open")
//!     .where_(Connective::Or)
//!     .equals("region", "us-east-1")
//!     .equals("region", "us-west-2")
//!     .build();
//! assert_eq!(
//!     query.conditions_to_query_string(&Default::default()),
//!     "status = 'open' AND (region = 'us-east-1' OR region = 'us-west-2')"
//! );
//! ```

use crate::{
    ast::{Connective, Operand, Operator, OperatorKind, PropertyRef},
    query::SearchQuery,
    value::ScalarValue,
};

/// A query plus a cursor into its condition tree. Every method returns a new
/// builder; the receiver is left untouched.
#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: SearchQuery,
    /// Operand indexes from the root condition to the group being filled.
    path: Vec<usize>,
}

fn descend<'a>(node: &'a mut Operator, path: &[usize]) -> Option<&'a mut Operator> {
    match path.split_first() {
        None => Some(node),
        Some((&i, rest)) => node
            .operands
            .get_mut(i)?
            .as_operator_mut()
            .and_then(|child| descend(child, rest)),
    }
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Continue building on an existing query, at the root of its condition.
    pub fn from_query(query: SearchQuery) -> Self {
        QueryBuilder {
            query,
            path: Vec::new(),
        }
    }

    pub fn equals(&self, property: impl Into<PropertyRef>, value: impl Into<ScalarValue>) -> Self {
        self.with(
            Operator::new(OperatorKind::Equals)
                .with_property(property.into())
                .with_operand(value.into()),
        )
    }

    pub fn not_equals(&self, property: impl Into<PropertyRef>, value: impl Into<ScalarValue>) -> Self {
        self.with(
            Operator::new(OperatorKind::NotEquals)
                .with_property(property.into())
                .with_operand(value.into()),
        )
    }

    pub fn is_in<V: Into<ScalarValue>>(
        &self,
        property: impl Into<PropertyRef>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.with(
            Operator::new(OperatorKind::In)
                .with_property(property.into())
                .with_operands(values.into_iter().map(|v| Operand::Value(v.into()))),
        )
    }

    /// Open a negated group; following conditions go inside it.
    pub fn not(&self) -> Self {
        let mut next = self.clone();
        let negated = Operator::new(OperatorKind::Not).with_operand(Operator::group(Connective::And));
        if let Some(index) = next.attach(negated) {
            next.path.extend([index, 0]);
        }
        next
    }

    /// Open a nested group joined by `connective`; following conditions go inside it.
    pub fn where_(&self, connective: Connective) -> Self {
        let mut next = self.clone();
        if let Some(index) = next.attach(Operator::group(connective)) {
            next.path.push(index);
        }
        next
    }

    /// Leave the innermost open group.
    pub fn end(&self) -> Self {
        let mut next = self.clone();
        next.path.pop();
        if next.focus_is_negation() {
            next.path.pop();
        }
        next
    }

    /// The finished query. Groups that never received a condition are dropped.
    pub fn build(&self) -> SearchQuery {
        let mut query = self.query.clone();
        query.prune_empty_groups();
        query
    }

    fn with(&self, condition: Operator) -> Self {
        let mut next = self.clone();
        next.attach(condition);
        next
    }

    fn focus_is_negation(&mut self) -> bool {
        let root = self.query.conditions_mut();
        descend(root, &self.path).is_some_and(|op| op.kind == OperatorKind::Not)
    }

    /// Append to the focused group, wrapping a bare condition in `AND` first.
    /// Returns the index of the new operand.
    fn attach(&mut self, condition: Operator) -> Option<usize> {
        let root = self.query.conditions_mut();
        let group = descend(root, &self.path)?;
        if !group.is_connective() {
            let existing = std::mem::replace(group, Operator::group(Connective::And));
            group.operands.push(Operand::Operator(existing));
        }
        group.operands.push(Operand::Operator(condition));
        Some(group.operands.len() - 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_is_immutable_per_call() {
        let base = QueryBuilder::new().equals("a", 1);
        let extended = base.equals("b", 2);
        assert_eq!(base.build().conditions().unwrap().operands.len(), 1);
        assert_eq!(extended.build().conditions().unwrap().operands.len(), 2);
    }
}
