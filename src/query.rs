//! The compiled query and its three faces: query string, native JSON and
//! operator tree.

use std::{cell::OnceCell, collections::BTreeMap};

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{
    ast::{Connective, Operand, Operator, OperatorKind},
    catalog::{self, projection::default_alias},
    error::{EvalError, ParseError, Result},
    evaluator::{Evaluator, Subject},
    parser::Parser,
    registry::Registry,
    state::QueryState,
    value::ScalarValue,
};

/// Clause order used when rendering.
const CLAUSE_ORDER: [OperatorKind; 8] = [
    OperatorKind::Select,
    OperatorKind::Where,
    OperatorKind::GroupBy,
    OperatorKind::GroupByPermuted,
    OperatorKind::Having,
    OperatorKind::OrderBy,
    OperatorKind::Limit,
    OperatorKind::TimeRange,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    Property,
    Aggregate,
    Function,
    Condition,
}

/// One output column of a `SELECT`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnDescription {
    pub name: String,
    pub column_type: ColumnType,
    pub aggregate: bool,
}

#[derive(Debug, Clone, Default)]
pub struct SearchQuery {
    name: Option<String>,
    clauses: Vec<Operator>,
    aliases: BTreeMap<String, Operand>,
    warnings: Vec<ParseError>,
    aggregate: OnceCell<bool>,
    condition_json: OnceCell<Option<Value>>,
}

impl SearchQuery {
    /// Query with no clauses.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Empty query carrying a template name.
    pub fn named(name: impl Into<String>) -> Self {
        SearchQuery {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Compile `SELECT ... WHERE ... ORDER BY ... LIMIT n`.
    pub fn from_query_string(query: &str, registry: &Registry) -> Result<Self> {
        Parser::new(query, registry)?.parse_query()
    }

    /// Compile a bare condition list as the `WHERE` clause.
    pub fn from_conditions_string(conditions: &str, registry: &Registry) -> Result<Self> {
        Parser::new(conditions, registry)?.parse_conditions()
    }

    /// Decode the native JSON form, one clause per key.
    pub fn from_json(json: &Value, registry: &Registry) -> Result<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| ParseError::json(format!("expected a query object, found {json}")))?;
        let mut query = SearchQuery::empty();
        for (key, payload) in object {
            let kind = OperatorKind::from_json_key(key)
                .filter(|k| k.is_clause())
                .ok_or_else(|| ParseError::json(format!("unknown clause '{key}'")))?;
            query.set_clause(catalog::production(kind).from_json(kind, payload, registry)?);
        }
        query.aliases = query.collect_aliases();
        Ok(query)
    }

    pub(crate) fn from_state(state: QueryState) -> Self {
        let (clauses, warnings, aliases) = state.into_parts();
        let mut query = SearchQuery {
            aliases,
            warnings,
            ..Self::default()
        };
        for (_, clause) in clauses {
            query.set_clause(clause);
        }
        query
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Non-fatal problems found while compiling.
    pub fn warnings(&self) -> &[ParseError] {
        &self.warnings
    }

    /// Aliases declared with `AS` plus default aggregate aliases.
    pub fn aliases(&self) -> &BTreeMap<String, Operand> {
        &self.aliases
    }

    pub fn clause(&self, kind: OperatorKind) -> Option<&Operator> {
        self.clauses.iter().find(|c| c.kind == kind)
    }

    /// Add or replace a clause. `GROUP BY` and `GROUP BY PERMUTED` replace each other.
    pub fn set_clause(&mut self, clause: Operator) {
        let grouping = |k: OperatorKind| matches!(k, OperatorKind::GroupBy | OperatorKind::GroupByPermuted);
        let same = |k: OperatorKind| k == clause.kind || grouping(k) && grouping(clause.kind);
        self.clauses.retain(|c| !same(c.kind));
        let index = self.insertion_index(clause.kind);
        self.clauses.insert(index, clause);
        self.invalidate();
    }

    /// Where a clause of `kind` goes to keep rendering order.
    fn insertion_index(&self, kind: OperatorKind) -> usize {
        let rank = |kind: OperatorKind| CLAUSE_ORDER.iter().position(|k| *k == kind).unwrap_or(CLAUSE_ORDER.len());
        self.clauses
            .iter()
            .position(|c| rank(c.kind) > rank(kind))
            .unwrap_or(self.clauses.len())
    }

    pub fn select(&self) -> Option<&Operator> {
        self.clause(OperatorKind::Select)
    }

    pub fn group_by(&self) -> Option<&Operator> {
        self.clause(OperatorKind::GroupBy)
            .or_else(|| self.clause(OperatorKind::GroupByPermuted))
    }

    pub fn having(&self) -> Option<&Operator> {
        self.clause(OperatorKind::Having)
            .and_then(|c| c.operands.first())
            .and_then(Operand::as_operator)
    }

    pub fn order_by(&self) -> Option<&Operator> {
        self.clause(OperatorKind::OrderBy)
    }

    pub fn limit(&self) -> Option<u64> {
        self.clause(OperatorKind::Limit)
            .and_then(|c| c.values().next())
            .and_then(ScalarValue::as_decimal)
            .and_then(|n| n.to_u64())
    }

    pub fn time_range(&self) -> Option<&Operator> {
        self.clause(OperatorKind::TimeRange)
    }

    /// The `WHERE` condition.
    pub fn conditions(&self) -> Option<&Operator> {
        self.clause(OperatorKind::Where)
            .and_then(|c| c.operands.first())
            .and_then(Operand::as_operator)
    }

    /// The `WHERE` condition, created as an empty `AND` group when missing.
    pub fn conditions_mut(&mut self) -> &mut Operator {
        self.invalidate();
        let index = match self.clauses.iter().position(|c| c.kind == OperatorKind::Where) {
            Some(index) => index,
            None => {
                let index = self.insertion_index(OperatorKind::Where);
                self.clauses.insert(index, Operator::new(OperatorKind::Where));
                index
            }
        };
        let operands = &mut self.clauses[index].operands;
        if operands.is_empty() {
            operands.push(Operand::Operator(Operator::group(Connective::And)));
        }
        condition_slot(&mut operands[0])
    }

    /// Drop empty `AND` / `OR` groups from the condition, and the `WHERE`
    /// clause itself when nothing is left.
    pub(crate) fn prune_empty_groups(&mut self) {
        if let Some(clause) = self.clauses.iter_mut().find(|c| c.kind == OperatorKind::Where) {
            clause.prune_empty_groups();
        }
        self.clauses
            .retain(|c| c.kind != OperatorKind::Where || !c.operands.is_empty());
        self.invalidate();
    }

    /// Join `condition` to the existing condition with `AND`.
    pub fn and(&mut self, condition: Operator) -> &mut Self {
        self.combine(Connective::And, condition)
    }

    /// Join `condition` to the existing condition with `OR`.
    pub fn or(&mut self, condition: Operator) -> &mut Self {
        self.combine(Connective::Or, condition)
    }

    fn combine(&mut self, connective: Connective, condition: Operator) -> &mut Self {
        let root = self.conditions_mut();
        if root.kind == connective.kind() || root.is_connective() && root.operands.is_empty() {
            root.kind = connective.kind();
            root.operands.push(Operand::Operator(condition));
        } else {
            let existing = std::mem::replace(root, Operator::group(connective));
            root.operands.push(Operand::Operator(existing));
            root.operands.push(Operand::Operator(condition));
        }
        self
    }

    /// True when the query aggregates (aggregate in SELECT or HAVING, or grouping).
    pub fn is_aggregate(&self) -> bool {
        *self.aggregate.get_or_init(|| {
            self.group_by().is_some()
                || self.clause(OperatorKind::Having).is_some()
                || self.select().is_some_and(Operator::contains_aggregate)
        })
    }

    /// Output columns of the `SELECT` clause.
    pub fn column_descriptions(&self) -> Vec<ColumnDescription> {
        let columns: Vec<ColumnDescription> = self
            .select()
            .map(|select| select.operands.iter().map(describe_column).collect())
            .unwrap_or_default();
        if columns.iter().any(|c| c.aggregate) {
            let _ = self.aggregate.set(true);
        }
        columns
    }

    pub fn to_json(&self) -> Value {
        let mut object = Map::new();
        for clause in &self.clauses {
            if let Value::Object(entry) = clause.to_json() {
                object.extend(entry);
            }
        }
        Value::Object(object)
    }

    pub fn to_query_string(&self, registry: &Registry) -> String {
        self.clauses
            .iter()
            .map(|c| c.to_query_string(registry))
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// JSON form of the `WHERE` condition, computed once.
    pub fn conditions_to_json(&self) -> Option<&Value> {
        self.condition_json
            .get_or_init(|| self.conditions().map(Operator::to_json))
            .as_ref()
    }

    /// Query-string form of the `WHERE` condition without the keyword.
    pub fn conditions_to_query_string(&self, registry: &Registry) -> String {
        self.conditions()
            .map(|c| c.to_query_string(registry))
            .unwrap_or_default()
    }

    /// Evaluate the `WHERE` condition against one record. A query without
    /// conditions matches everything.
    pub fn test<S: Subject + ?Sized>(&self, subject: &S) -> std::result::Result<bool, EvalError> {
        match self.conditions_to_json() {
            Some(condition) => Evaluator::new(subject).test(condition),
            None => Ok(true),
        }
    }

    fn invalidate(&mut self) {
        self.aggregate = OnceCell::new();
        self.condition_json = OnceCell::new();
    }

    fn collect_aliases(&self) -> BTreeMap<String, Operand> {
        let mut aliases = BTreeMap::new();
        let Some(select) = self.select() else {
            return aliases;
        };
        for op in select.children() {
            let target = match op.kind {
                OperatorKind::As => op.operands.first().and_then(Operand::as_operator),
                _ => Some(op),
            };
            if let Some(target) = target
                && let Some(alias) = default_alias(target)
            {
                aliases.insert(alias, Operand::Operator(target.clone()));
            }
            if op.kind == OperatorKind::As
                && let (Some(target), Some(name)) = (op.operands.first(), op.values().next().and_then(ScalarValue::as_str))
            {
                aliases.insert(name.to_string(), target.clone());
            }
        }
        aliases
    }
}

/// The operator held by a `WHERE` operand, replacing anything else with an empty `AND`.
fn condition_slot(operand: &mut Operand) -> &mut Operator {
    match operand {
        Operand::Operator(condition) => condition,
        _ => {
            *operand = Operand::Operator(Operator::group(Connective::And));
            condition_slot(operand)
        }
    }
}

fn describe_column(operand: &Operand) -> ColumnDescription {
    match operand {
        Operand::Property(p) => ColumnDescription {
            name: p.label().to_string(),
            column_type: ColumnType::Property,
            aggregate: false,
        },
        Operand::Value(v) => ColumnDescription {
            name: v.text.clone(),
            column_type: ColumnType::Property,
            aggregate: false,
        },
        Operand::Operator(op) if op.kind == OperatorKind::As => {
            let target = op.operands.first().map(describe_column);
            let name = op.values().next().and_then(ScalarValue::as_str).unwrap_or_default();
            ColumnDescription {
                name: name.to_string(),
                column_type: target.as_ref().map_or(ColumnType::Property, |t| t.column_type),
                aggregate: target.is_some_and(|t| t.aggregate),
            }
        }
        Operand::Operator(op) if op.kind.is_aggregate() => ColumnDescription {
            name: default_alias(op).unwrap_or_else(|| op.kind.keyword().to_lowercase()),
            column_type: ColumnType::Aggregate,
            aggregate: true,
        },
        Operand::Operator(op) => {
            let label = op.property.as_ref().map(|p| p.label()).unwrap_or_default();
            ColumnDescription {
                name: format!("{}({label})", op.kind.keyword()),
                column_type: if op.is_condition() {
                    ColumnType::Condition
                } else {
                    ColumnType::Function
                },
                aggregate: false,
            }
        }
    }
}
