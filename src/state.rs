use std::collections::BTreeMap;

use tracing::debug;

use crate::{
    ast::{Operand, Operator, OperatorKind},
    error::ParseError,
};

/// Bookkeeping for a single compilation.
#[derive(Debug, Clone, Default)]
pub struct QueryState {
    clauses: Vec<(OperatorKind, Operator)>,
    errors: Vec<ParseError>,
    aliases: BTreeMap<String, Operand>,
}

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a compiled clause, replacing an earlier one of the same kind.
    pub fn record(&mut self, kind: OperatorKind, clause: Operator) {
        match self.clauses.iter_mut().find(|(k, _)| *k == kind) {
            Some(slot) => slot.1 = clause,
            None => self.clauses.push((kind, clause)),
        }
    }

    pub fn clause(&self, kind: OperatorKind) -> Option<&Operator> {
        self.clauses.iter().find(|(k, _)| *k == kind).map(|(_, c)| c)
    }

    pub fn take_clause(&mut self, kind: OperatorKind) -> Option<Operator> {
        let index = self.clauses.iter().position(|(k, _)| *k == kind)?;
        Some(self.clauses.remove(index).1)
    }

    pub fn clauses(&self) -> impl Iterator<Item = &(OperatorKind, Operator)> {
        self.clauses.iter()
    }

    pub fn push_error(&mut self, error: ParseError) {
        debug!(kind = ?error.kind, message = %error.message, "recorded parse error");
        self.errors.push(error);
    }

    pub fn errors(&self) -> &[ParseError] {
        &self.errors
    }

    pub fn bind_alias(&mut self, name: impl Into<String>, target: Operand) {
        self.aliases.insert(name.into(), target);
    }

    pub fn is_alias(&self, name: &str) -> bool {
        self.aliases.contains_key(name)
    }

    pub fn aliases(&self) -> &BTreeMap<String, Operand> {
        &self.aliases
    }

    pub fn into_parts(self) -> (Vec<(OperatorKind, Operator)>, Vec<ParseError>, BTreeMap<String, Operand>) {
        (self.clauses, self.errors, self.aliases)
    }
}
