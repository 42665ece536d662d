//! Caret introspection for editors.
//!
//! [`CursorDetails::resolve`] maps a character offset to the token under it,
//! the clause it belongs to, and the smallest complete phrase around it (its
//! expression root), then unpacks what that phrase is about. The two edit
//! helpers only splice text; re-parsing is left to the caller.

use serde::Serialize;

use crate::{
    ast::{Connective, ExpressionMap, Operand, Operator, OperatorKind, PropertyRef, Span, TokenId, TokenKind},
    error::Result,
    parser::{Parser, PhraseId, Role},
    registry::Registry,
    value::ScalarValue,
};

/// What kind of thing sits under the caret.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Facet {
    Clause,
    Property,
    Operator,
    Value,
    Conjunction,
    Delimiter,
    None,
}

#[derive(Debug, Clone, Serialize)]
pub struct CursorDetails {
    pub offset: usize,
    #[serde(skip)]
    pub token: Option<TokenId>,
    pub token_text: Option<String>,
    pub token_span: Option<Span>,
    pub facet: Facet,
    /// Clause the caret is in.
    pub clause: Option<OperatorKind>,
    /// Range of the expression root.
    pub phrase: Option<Span>,
    pub negated: bool,
    pub alias: Option<String>,
    pub aggregate: bool,
    pub property: Option<PropertyRef>,
    pub operator: Option<OperatorKind>,
    pub values: Vec<ScalarValue>,
    #[serde(skip)]
    source: String,
}

/// Phrases that delimit expression roots.
fn is_boundary(kind: OperatorKind) -> bool {
    kind.is_clause() || kind.is_connective()
}

/// First property an operator revolves around, looking through wrappers.
fn first_property(op: &Operator) -> Option<PropertyRef> {
    if let Some(p) = &op.property {
        return Some(p.clone());
    }
    op.operands.iter().find_map(|operand| match operand {
        Operand::Property(p) => Some(p.clone()),
        Operand::Operator(inner) => first_property(inner),
        Operand::Value(_) => None,
    })
}

impl CursorDetails {
    /// Parse `query` and resolve `offset` in it. Parse errors do not prevent
    /// resolution; phrases completed before the error are still reported.
    pub fn at(query: &str, registry: &Registry, offset: usize, skip_commas: bool) -> Result<Self> {
        let mut parser = Parser::new(query, registry)?;
        parser.evaluate();
        Ok(Self::resolve(&parser, offset, skip_commas))
    }

    pub fn resolve(parser: &Parser<'_>, offset: usize, skip_commas: bool) -> Self {
        let mut details = CursorDetails {
            offset,
            token: None,
            token_text: None,
            token_span: None,
            facet: Facet::None,
            clause: None,
            phrase: None,
            negated: false,
            alias: None,
            aggregate: false,
            property: None,
            operator: None,
            values: Vec::new(),
            source: parser.source().to_string(),
        };

        let Some(token) = locate(parser, offset, skip_commas) else {
            return details;
        };
        let t = parser.token(token);
        details.token = Some(token);
        details.token_text = Some(t.text.clone());
        details.token_span = Some(t.span);
        details.facet = facet(parser, token);
        details.clause = enclosing_clause(parser, token);

        if let Some(root) = parser.owner(token).map(|id| expression_root(parser, id)) {
            details.unpack(parser, root);
        }
        if parser.role(token) == Some(Role::Alias) {
            details.alias = Some(t.text.clone());
        }
        details
    }

    fn unpack(&mut self, parser: &Parser<'_>, root: PhraseId) {
        let phrase = parser.phrase(root);
        self.phrase = Some(phrase.span);

        let mut op = &phrase.operator;
        if op.kind == OperatorKind::Not {
            self.negated = true;
            if let Some(inner) = op.children().next() {
                op = inner;
            }
        }
        if op.kind == OperatorKind::As {
            self.alias = op.values().next().and_then(ScalarValue::as_str).map(str::to_string);
            if let Some(inner) = op.children().next() {
                op = inner;
            }
        }

        self.aggregate = op.contains_aggregate();
        self.property = first_property(op);
        self.operator = Some(op.kind);
        self.values = op.values().cloned().collect();
    }

    /// Source with the expression root replaced by `text`; without a phrase,
    /// `text` is inserted at the caret.
    pub fn replace_phrase(&self, text: &str) -> String {
        let span = self
            .phrase
            .or(self.token_span)
            .unwrap_or(Span::new(self.offset, self.offset));
        splice(&self.source, span, text)
    }

    /// Source with `text` joined after the expression root by `connective`.
    pub fn append_clause(&self, connective: Connective, text: &str) -> String {
        let end = self
            .phrase
            .or(self.token_span)
            .map_or(self.offset, |span| span.end);
        let addition = format!(" {} {text}", connective.keyword());
        splice(&self.source, Span::new(end, end), &addition)
    }
}

/// Replace the chars in `span` with `text`.
fn splice(source: &str, span: Span, text: &str) -> String {
    let chars: Vec<char> = source.chars().collect();
    let start = span.start.min(chars.len());
    let end = span.end.clamp(start, chars.len());
    let mut out: String = chars[..start].iter().collect();
    out.push_str(text);
    out.extend(&chars[end..]);
    out
}

/// Token under or just before the caret.
fn locate(parser: &Parser<'_>, offset: usize, skip_commas: bool) -> Option<TokenId> {
    let map = parser.map();
    let mut probe = offset.min(map.len().checked_sub(1)?);
    loop {
        if let Some(id) = map.get(probe).and_then(ExpressionMap::slot_token)
            && !(skip_commas && parser.token(id).is_comma())
        {
            return Some(id);
        }
        probe = probe.checked_sub(1)?;
    }
}

fn facet(parser: &Parser<'_>, token: TokenId) -> Facet {
    let t = parser.token(token);
    if t.is_delimiter() {
        return Facet::Delimiter;
    }
    match (t.rule, parser.role(token)) {
        (Some(kind), _) if t.kind == TokenKind::Word && kind.is_clause() => Facet::Clause,
        (Some(kind), _) if t.kind == TokenKind::Word && kind.is_connective() => Facet::Conjunction,
        (Some(_), _) if !t.is_literal() => Facet::Operator,
        (_, Some(Role::Property | Role::Alias)) => Facet::Property,
        (_, Some(Role::Value)) => Facet::Value,
        (_, Some(Role::Direction)) => Facet::Operator,
        _ => Facet::None,
    }
}

fn enclosing_clause(parser: &Parser<'_>, token: TokenId) -> Option<OperatorKind> {
    let tokens = parser.tokens();
    let start = tokens.get(tokens.root_of(token)).span.start;
    tokens
        .top()
        .iter()
        .map(|id| tokens.get(*id))
        .filter(|t| t.kind == TokenKind::Word && t.span.start <= start)
        .filter_map(|t| t.rule.filter(|k| k.is_clause()))
        .last()
}

/// Climb from the innermost phrase to the last one below a clause or connective.
fn expression_root(parser: &Parser<'_>, start: PhraseId) -> PhraseId {
    let mut current = start;
    while let Some(parent) = parser.phrase(current).parent {
        if is_boundary(parser.phrase(parent).kind) {
            break;
        }
        current = parent;
    }
    current
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splice_counts_chars() {
        assert_eq!(splice("é = 1", Span::new(4, 5), "2"), "é = 2");
    }
}
