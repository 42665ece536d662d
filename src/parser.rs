//! Recursive-descent digestion engine.
//!
//! Tokens are consumed in phrases. [`Parser::draw_one`] collects a run of
//! tokens up to the next delimiter, connective or clause keyword, expands
//! parenthesized children first, then lets every operator token claim its
//! neighbours, tier by tier, until one node is left. [`Parser::draw_group`]
//! chains phrases joined by `AND` / `OR` and folds them into group nodes.
//!
//! Consumed tokens are tracked in a side bitset and each reduction is
//! recorded as a [`Phrase`] so editor tooling can map offsets back to the
//! smallest complete expression around them.

use serde::Serialize;
use tracing::{debug, trace};

use crate::{
    ast::{
        Connective, ExpressionMap, Operand, Operator, OperatorKind, PropertyRef, Span, Token, TokenArena, TokenId,
        TokenKind,
    },
    catalog::{self, Input},
    config::ParserOptions,
    error::{ErrorKind, ParseError, Result},
    lexer::Lexer,
    preprocess::preprocess,
    query::SearchQuery,
    registry::Registry,
    state::QueryState,
    value::{ScalarType, ScalarValue},
};

/// Reduction tiers of prefix operators (existence checks, `NOT`).
const PREFIX_TIERS: [u8; 2] = [3, 4];

/// Forward-only reader over one token sequence.
#[derive(Debug, Clone)]
pub struct Stream {
    seq: Vec<TokenId>,
    pos: usize,
}

impl Stream {
    pub fn new(seq: Vec<TokenId>) -> Self {
        Stream { seq, pos: 0 }
    }

    pub fn peek(&self) -> Option<TokenId> {
        self.seq.get(self.pos).copied()
    }

    pub fn advance(&mut self) {
        self.pos += 1;
    }

    pub fn is_done(&self) -> bool {
        self.pos >= self.seq.len()
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    /// Tokens consumed between two positions.
    pub fn consumed(&self, from: usize) -> &[TokenId] {
        &self.seq[from.min(self.pos)..self.pos.min(self.seq.len())]
    }
}

/// State of one element of a phrase under reduction.
#[derive(Debug, Clone)]
pub enum Term {
    /// Token not interpreted yet (word, literal, bracketed property, symbol)
    Raw,
    /// Operator keyword waiting to claim its neighbours; `params` holds its
    /// parenthesized argument list when it has one
    Pending {
        kind: OperatorKind,
        params: Option<Vec<Item>>,
    },
    /// Finished node
    Node(Operand),
}

#[derive(Debug, Clone)]
pub struct Item {
    pub token: TokenId,
    pub span: Span,
    pub term: Term,
}

/// A phrase under reduction. Claimed slots are emptied, then compacted away.
#[derive(Debug, Default)]
pub struct Run {
    slots: Vec<Option<Item>>,
    claims: Vec<Span>,
}

impl Run {
    fn new(items: Vec<Item>) -> Self {
        Run {
            slots: items.into_iter().map(Some).collect(),
            claims: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Item> {
        self.slots.get(index).and_then(Option::as_ref)
    }

    /// Claim the item at `index` for the operator being digested.
    pub fn take(&mut self, index: usize) -> Option<Item> {
        let item = self.slots.get_mut(index)?.take()?;
        self.claims.push(item.span);
        Some(item)
    }

    /// Claim the neighbour left of `at`.
    pub fn take_left(&mut self, at: usize) -> Option<Item> {
        at.checked_sub(1).and_then(|i| self.take(i))
    }

    /// Claim the neighbour right of `at`.
    pub fn take_right(&mut self, at: usize) -> Option<Item> {
        self.take(at + 1)
    }

    fn position(&self, pred: impl Fn(&Item) -> bool) -> Option<usize> {
        self.slots.iter().position(|s| s.as_ref().is_some_and(&pred))
    }

    fn rposition(&self, pred: impl Fn(&Item) -> bool) -> Option<usize> {
        self.slots.iter().rposition(|s| s.as_ref().is_some_and(&pred))
    }

    fn compact(&mut self) {
        self.slots.retain(Option::is_some);
    }

    fn items(&self) -> impl Iterator<Item = &Item> {
        self.slots.iter().flatten()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PhraseId(pub usize);

/// One completed reduction: the operator and the source range it covers.
#[derive(Debug, Clone, Serialize)]
pub struct Phrase {
    pub kind: OperatorKind,
    pub anchor: TokenId,
    pub span: Span,
    pub parent: Option<PhraseId>,
    pub operator: Operator,
}

/// How the parser ended up reading a raw token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Property,
    Value,
    /// Name introduced by `AS`
    Alias,
    /// `ASC` / `DESC`
    Direction,
}

/// Highlighting class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HighlightClass {
    Clause,
    Operator,
    Conjunction,
    Property,
    Value,
    Literal,
    Alias,
    Delimiter,
    Error,
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Highlight {
    pub span: Span,
    pub class: HighlightClass,
}

pub struct Parser<'r> {
    source: String,
    registry: &'r Registry,
    options: ParserOptions,
    tokens: TokenArena,
    map: ExpressionMap,
    state: QueryState,
    digested: Vec<bool>,
    roles: Vec<Option<Role>>,
    owners: Vec<Option<PhraseId>>,
    phrases: Vec<Phrase>,
}

impl<'r> Parser<'r> {
    /// Tokenize and preprocess `source`.
    pub fn new(source: &str, registry: &'r Registry) -> Result<Self> {
        Self::with_options(source, registry, ParserOptions::default())
    }

    pub fn with_options(source: &str, registry: &'r Registry, options: ParserOptions) -> Result<Self> {
        let mut lexed = Lexer::new(source).with_options(options).tokenize()?;
        preprocess(&mut lexed);

        let mut state = QueryState::new();
        for error in lexed.errors {
            state.push_error(error);
        }
        let count = lexed.tokens.len();
        Ok(Parser {
            source: lexed.source,
            registry,
            options,
            tokens: lexed.tokens,
            map: lexed.map,
            state,
            digested: vec![false; count],
            roles: vec![None; count],
            owners: vec![None; count],
            phrases: Vec::new(),
        })
    }

    /// Compile a full query (`SELECT ... WHERE ... LIMIT n`).
    pub fn parse_query(&mut self) -> Result<SearchQuery> {
        let source = self.source.clone();
        self.parse_clauses().map_err(|e| e.in_expression(&source))?;
        Ok(SearchQuery::from_state(self.state.clone()))
    }

    /// Compile a bare condition list, as if it followed `WHERE`.
    pub fn parse_conditions(&mut self) -> Result<SearchQuery> {
        let source = self.source.clone();
        self.parse_condition_body().map_err(|e| e.in_expression(&source))?;
        Ok(SearchQuery::from_state(self.state.clone()))
    }

    /// Parse without returning the error: a fatal error is appended to the
    /// error list and `false` comes back.
    pub fn evaluate(&mut self) -> bool {
        match self.parse_clauses() {
            Ok(()) => true,
            Err(error) => {
                let error = error.in_expression(&self.source);
                self.state.push_error(error);
                false
            }
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    pub fn tokens(&self) -> &TokenArena {
        &self.tokens
    }

    pub fn token(&self, id: TokenId) -> &Token {
        self.tokens.get(id)
    }

    pub fn map(&self) -> &ExpressionMap {
        &self.map
    }

    pub fn state(&self) -> &QueryState {
        &self.state
    }

    pub fn errors(&self) -> &[ParseError] {
        self.state.errors()
    }

    pub fn phrases(&self) -> &[Phrase] {
        &self.phrases
    }

    pub fn phrase(&self, id: PhraseId) -> &Phrase {
        &self.phrases[id.0]
    }

    /// Innermost phrase that consumed `token`.
    pub fn owner(&self, token: TokenId) -> Option<PhraseId> {
        self.owners.get(token.0).copied().flatten()
    }

    pub fn role(&self, token: TokenId) -> Option<Role> {
        self.roles.get(token.0).copied().flatten()
    }

    pub fn is_digested(&self, token: TokenId) -> bool {
        self.digested.get(token.0).copied().unwrap_or(false)
    }

    /// Build an error pointing at `token`.
    pub fn error(&self, kind: ErrorKind, message: impl Into<String>, token: TokenId) -> ParseError {
        let t = self.tokens.get(token);
        ParseError::new(kind, message)
            .at(self.describe(token), t.full_span())
            .in_expression(&self.source)
    }

    /// Source text of the token, parentheses included.
    pub fn describe(&self, token: TokenId) -> String {
        let span = self.tokens.get(token).full_span();
        self.slice(span)
    }

    pub fn slice(&self, span: Span) -> String {
        self.source.chars().skip(span.start).take(span.len()).collect()
    }

    /// Count one step of a digestion loop; each loop keeps its own counter.
    fn tick(&self, steps: &mut usize) -> Result<()> {
        *steps += 1;
        if *steps > self.options.max_iterations {
            return Err(ParseError::internal(format!(
                "gave up after {} reduction steps",
                self.options.max_iterations
            ))
            .in_expression(&self.source));
        }
        Ok(())
    }

    fn is_clause_token(&self, id: TokenId) -> bool {
        let t = self.tokens.get(id);
        t.kind == TokenKind::Word && t.rule.is_some_and(OperatorKind::is_clause)
    }

    fn is_connective_token(&self, id: TokenId) -> bool {
        let t = self.tokens.get(id);
        t.kind == TokenKind::Word && t.rule.is_some_and(OperatorKind::is_connective)
    }

    fn parse_clauses(&mut self) -> Result<()> {
        let mut stream = Stream::new(self.tokens.top().to_vec());
        while let Some(id) = stream.peek() {
            let token = self.tokens.get(id);
            if token.is_delimiter() && token.text == ";" {
                stream.advance();
                continue;
            }
            match token.rule {
                Some(kind) if self.is_clause_token(id) => {
                    stream.advance();
                    self.parse_clause(kind, id, &mut stream)?;
                }
                _ => {
                    return Err(self.error(
                        ErrorKind::Structural,
                        format!("expected a clause keyword (SELECT, WHERE, ...) but found '{}'", token.text),
                        id,
                    ));
                }
            }
        }
        Ok(())
    }

    fn at_clause_boundary(&self, stream: &Stream) -> bool {
        match stream.peek() {
            None => true,
            Some(id) => self.is_clause_token(id) || self.tokens.get(id).text == ";" && self.tokens.get(id).is_delimiter(),
        }
    }

    fn parse_clause(&mut self, kind: OperatorKind, id: TokenId, stream: &mut Stream) -> Result<()> {
        let grouping = |k: OperatorKind| matches!(k, OperatorKind::GroupBy | OperatorKind::GroupByPermuted);
        if self
            .state
            .clauses()
            .any(|(k, _)| *k == kind || grouping(*k) && grouping(kind))
        {
            return Err(self.error(
                ErrorKind::Structural,
                format!("{} appears more than once", kind.keyword()),
                id,
            ));
        }
        if !self.tokens.get(id).has_children() && self.at_clause_boundary(stream) {
            let error = self.error(
                ErrorKind::Structural,
                format!("expected a complete expression after {}", kind.keyword()),
                id,
            );
            self.state.push_error(error);
            return Ok(());
        }

        let start = stream.position();
        let clause = catalog::production(kind).digest(
            kind,
            self,
            Input::Clause {
                token: id,
                stream: &mut *stream,
            },
        )?;

        if let Some(next) = stream.peek()
            && !self.at_clause_boundary(stream)
        {
            return Err(self.error(
                ErrorKind::Structural,
                format!("unexpected '{}' in {} clause", self.describe(next), kind.keyword()),
                next,
            ));
        }

        let span = stream
            .consumed(start)
            .iter()
            .fold(self.tokens.get(id).full_span(), |span, t| span.cover(self.tokens.get(*t).full_span()));
        self.digested[id.0] = true;
        let clause = clause.with_span(span);
        self.record_phrase(id, span, &clause);
        debug!(clause = kind.keyword(), span = ?span, "parsed clause");
        self.state.record(kind, clause);
        Ok(())
    }

    fn parse_condition_body(&mut self) -> Result<()> {
        let mut stream = Stream::new(self.tokens.top().to_vec());
        let Some(item) = self.draw_group(&mut stream)? else {
            return Ok(());
        };
        if let Some(next) = stream.peek() {
            return Err(self.error(
                ErrorKind::Structural,
                format!("unexpected '{}' after the condition", self.describe(next)),
                next,
            ));
        }
        let span = item.span;
        let condition = self.condition(item)?;
        let clause = Operator::new(OperatorKind::Where)
            .with_operand(condition)
            .with_span(span);
        self.state.record(OperatorKind::Where, clause);
        Ok(())
    }

    /// Collect one phrase and reduce it to a single item.
    pub fn draw_one(&mut self, stream: &mut Stream) -> Result<Option<Item>> {
        let mut items = Vec::new();
        while let Some(id) = stream.peek() {
            let token = self.tokens.get(id);
            if token.is_delimiter() || self.is_connective_token(id) {
                break;
            }
            if !items.is_empty() && self.is_clause_token(id) {
                break;
            }
            items.push(self.expand(id)?);
            stream.advance();
        }
        if items.is_empty() {
            return Ok(None);
        }
        self.reduce(items).map(Some)
    }

    /// Collect phrases joined by connectives and fold them into one node.
    pub fn draw_group(&mut self, stream: &mut Stream) -> Result<Option<Item>> {
        let mut terms = Vec::new();
        let mut connectives: Vec<TokenId> = Vec::new();
        let mut steps = 0;

        loop {
            self.tick(&mut steps)?;
            if let Some(id) = stream.peek()
                && self.is_connective_token(id)
            {
                return Err(self.error(
                    ErrorKind::Structural,
                    format!("{} needs a condition on both sides", self.tokens.get(id).text),
                    id,
                ));
            }

            match self.draw_one(stream)? {
                Some(item) => terms.push(item),
                None => {
                    if let Some(&last) = connectives.last() {
                        return Err(self.error(
                            ErrorKind::Structural,
                            format!("expected a condition after {}", self.tokens.get(last).text),
                            last,
                        ));
                    }
                    break;
                }
            }

            match stream.peek() {
                Some(id) if self.is_connective_token(id) => {
                    connectives.push(id);
                    stream.advance();
                }
                _ => break,
            }
        }

        if terms.is_empty() {
            return Ok(None);
        }
        self.consolidate(terms, connectives).map(Some)
    }

    /// Fold `a AND b OR c AND d` into `OR(AND(a, b), AND(c, d))`.
    ///
    /// `connectives[i]` sits between `terms[i]` and `terms[i + 1]`.
    fn consolidate(&mut self, terms: Vec<Item>, connectives: Vec<TokenId>) -> Result<Item> {
        let mut terms = terms.into_iter();
        let Some(first) = terms.next() else {
            return Err(ParseError::internal("consolidate called without terms"));
        };

        let mut segments: Vec<(Vec<Item>, Vec<TokenId>)> = Vec::new();
        let mut or_tokens = Vec::new();
        let mut current = (vec![first], Vec::new());

        for (conn, next) in connectives.into_iter().zip(terms) {
            if self.tokens.get(conn).rule == Some(OperatorKind::And) {
                current.0.push(next);
                current.1.push(conn);
            } else {
                segments.push(std::mem::replace(&mut current, (vec![next], Vec::new())));
                or_tokens.push(conn);
            }
        }
        segments.push(current);

        let mut nodes = Vec::with_capacity(segments.len());
        for (mut items, ands) in segments {
            if items.len() == 1 {
                nodes.extend(items.pop());
            } else {
                nodes.push(self.build_group(Connective::And, items, &ands)?);
            }
        }

        match nodes.len() {
            1 => nodes.pop().ok_or_else(|| ParseError::internal("lost group node")),
            _ => self.build_group(Connective::Or, nodes, &or_tokens),
        }
    }

    fn build_group(&mut self, connective: Connective, items: Vec<Item>, tokens: &[TokenId]) -> Result<Item> {
        let anchor = tokens[0];
        let mut span = self.tokens.get(anchor).span;
        let mut group = Operator::group(connective);
        for item in items {
            span = span.cover(item.span);
            if !self.is_condition_item(&item) {
                return Err(self.error(
                    ErrorKind::Structural,
                    format!("{} joins conditions, found '{}'", connective.keyword(), self.slice(item.span)),
                    item.token,
                ));
            }
            group.operands.push(Operand::Operator(self.condition(item)?));
        }
        for token in tokens {
            self.digested[token.0] = true;
        }
        let group = group.with_span(span);
        self.record_phrase(anchor, span, &group);
        trace!(connective = connective.keyword(), terms = group.operands.len(), "built group");
        Ok(Item {
            token: anchor,
            span,
            term: Term::Node(Operand::Operator(group)),
        })
    }

    /// Turn a token into a phrase element, recursing into its children.
    pub fn expand(&mut self, id: TokenId) -> Result<Item> {
        let token = self.tokens.get(id);
        let span = token.full_span();

        if token.kind == TokenKind::Group {
            let mut inner = Stream::new(token.children.clone());
            let Some(item) = self.draw_group(&mut inner)? else {
                return Err(self.error(ErrorKind::Structural, "empty parentheses", id));
            };
            if let Some(next) = inner.peek() {
                return Err(self.error(
                    ErrorKind::Structural,
                    format!("unexpected '{}' inside parentheses", self.describe(next)),
                    next,
                ));
            }
            self.digested[id.0] = true;
            return Ok(Item { span, ..item });
        }

        match token.rule {
            Some(kind) if kind.meta().function_call => {
                let params = if token.has_children() {
                    Some(self.parameters(id)?)
                } else {
                    None
                };
                Ok(Item {
                    token: id,
                    span,
                    term: Term::Pending { kind, params },
                })
            }
            Some(kind) if token.kind != TokenKind::Literal && token.kind != TokenKind::Blob => Ok(Item {
                token: id,
                span,
                term: Term::Pending { kind, params: None },
            }),
            _ if token.has_children() => Err(self.error(
                ErrorKind::Structural,
                format!("unknown function '{}'", token.text),
                id,
            )),
            _ => Ok(Item {
                token: id,
                span,
                term: Term::Raw,
            }),
        }
    }

    /// Parse the parenthesized children of `owner` as a flat parameter list.
    pub fn parameters(&mut self, owner: TokenId) -> Result<Vec<Item>> {
        let mut stream = Stream::new(self.tokens.get(owner).children.clone());
        let mut params = Vec::new();
        if stream.is_done() {
            return Ok(params);
        }
        let mut steps = 0;
        loop {
            self.tick(&mut steps)?;
            match self.draw_one(&mut stream)? {
                Some(item) => params.push(item),
                None => {
                    let at = stream.peek().unwrap_or(owner);
                    return Err(self.error(
                        ErrorKind::Structural,
                        format!("expected a parameter for {}", self.tokens.get(owner).text),
                        at,
                    ));
                }
            }
            match stream.peek() {
                None => break,
                Some(id) if self.tokens.get(id).is_comma() => stream.advance(),
                Some(id) => {
                    return Err(self.error(
                        ErrorKind::Structural,
                        format!(
                            "unexpected '{}' in the parameters of {}",
                            self.describe(id),
                            self.tokens.get(owner).text
                        ),
                        id,
                    ));
                }
            }
        }
        Ok(params)
    }

    /// Reduce a phrase to one item, letting operators claim neighbours tier by tier.
    pub fn reduce(&mut self, items: Vec<Item>) -> Result<Item> {
        let mut run = Run::new(items);
        let mut steps = 0;
        for tier in 1..=5u8 {
            let pending = |item: &Item| matches!(item.term, Term::Pending { kind, .. } if kind.meta().tier == tier);
            loop {
                // Prefix operators (`EXISTS`, `NOT`) bind innermost first.
                let found = if PREFIX_TIERS.contains(&tier) {
                    run.rposition(pending)
                } else {
                    run.position(pending)
                };
                let Some(at) = found else {
                    break;
                };
                self.tick(&mut steps)?;
                self.digest_at(&mut run, at)?;
            }
        }

        if let Some(item) = run.items().find(|item| {
            matches!(item.term, Term::Pending { kind, .. } if kind.meta().tier == 0)
        }) {
            return Err(self.error(
                ErrorKind::Structural,
                format!("unexpected '{}'", self.tokens.get(item.token).text),
                item.token,
            ));
        }

        if run.len() == 1 {
            run.compact();
            return run
                .slots
                .pop()
                .flatten()
                .ok_or_else(|| ParseError::internal("phrase reduced to nothing"));
        }

        let span = run
            .items()
            .map(|i| i.span)
            .reduce(Span::cover)
            .unwrap_or_default();
        let offender = run.items().nth(1).map(|i| i.token).unwrap_or(TokenId(0));
        Err(self.error(
            ErrorKind::Structural,
            format!("cannot interpret phrase '{}'", self.slice(span)),
            offender,
        ))
    }

    fn digest_at(&mut self, run: &mut Run, at: usize) -> Result<()> {
        let Some(Item {
            token,
            span,
            term: Term::Pending { kind, params },
        }) = run.slots.get_mut(at).and_then(Option::take)
        else {
            return Err(ParseError::internal("digest_at called on a settled item"));
        };

        run.claims.clear();
        let operator = catalog::production(kind).digest(
            kind,
            self,
            Input::Run {
                run: &mut *run,
                at,
                token,
                params,
            },
        )?;
        let span = run.claims.drain(..).fold(span, Span::cover);
        let operator = operator.with_span(span);

        self.digested[token.0] = true;
        self.record_phrase(token, span, &operator);
        trace!(operator = kind.keyword(), span = ?span, "digested");

        run.slots[at] = Some(Item {
            token,
            span,
            term: Term::Node(Operand::Operator(operator)),
        });
        run.compact();
        Ok(())
    }

    /// Record a phrase and adopt every token and phrase inside its span that
    /// has no owner yet.
    fn record_phrase(&mut self, anchor: TokenId, span: Span, operator: &Operator) -> PhraseId {
        let id = PhraseId(self.phrases.len());
        for (token, t) in self.tokens.iter() {
            if span.encloses(t.full_span()) {
                self.digested[token.0] = true;
                if self.owners[token.0].is_none() {
                    self.owners[token.0] = Some(id);
                }
            }
        }
        for phrase in &mut self.phrases {
            if phrase.parent.is_none() && span.encloses(phrase.span) {
                phrase.parent = Some(id);
            }
        }
        self.phrases.push(Phrase {
            kind: operator.kind,
            anchor,
            span,
            parent: None,
            operator: operator.clone(),
        });
        id
    }

    fn set_role(&mut self, token: TokenId, role: Role) {
        self.roles[token.0] = Some(role);
    }

    fn is_condition_item(&self, item: &Item) -> bool {
        matches!(&item.term, Term::Node(Operand::Operator(op)) if op.is_condition())
    }

    /// Read an item as a property reference.
    pub fn property(&mut self, item: Item) -> Result<PropertyRef> {
        let token = self.tokens.get(item.token);
        match (&item.term, token.kind) {
            (Term::Raw, TokenKind::Word | TokenKind::Bracketed) => {
                let property = if self.state.is_alias(&token.text) {
                    PropertyRef::alias(token.text.as_str())
                } else {
                    PropertyRef::from_text(&token.text, self.registry)
                };
                self.set_role(item.token, Role::Property);
                Ok(property)
            }
            (Term::Node(Operand::Property(p)), _) => Ok(p.clone()),
            _ => Err(self.error(
                ErrorKind::Structural,
                format!("expected a property but found '{}'", self.slice(item.span)),
                item.token,
            )),
        }
    }

    /// Read an item as the subject of an operator: a property, or a
    /// non-boolean operator such as an aggregate.
    pub fn subject(&mut self, item: Item) -> Result<Operand> {
        match item.term {
            Term::Node(Operand::Operator(op)) if !op.is_condition() => Ok(Operand::Operator(op)),
            _ => self.property(item).map(Operand::Property),
        }
    }

    /// Read an item as a scalar, optionally restricted to some types.
    pub fn value(&mut self, item: Item, allowed: &[ScalarType]) -> Result<ScalarValue> {
        let token = self.tokens.get(item.token);
        match (&item.term, token.kind) {
            (Term::Raw, TokenKind::Word | TokenKind::Literal | TokenKind::Blob) => {
                let value = ScalarValue::infer_as(&token.text, token.is_literal(), allowed)
                    .map_err(|e| self.error(e.kind, e.message, item.token))?
                    .resolve_names(self.registry);
                self.set_role(item.token, Role::Value);
                Ok(value)
            }
            (Term::Node(Operand::Value(v)), _) => Ok(v.clone()),
            _ => Err(self.error(
                ErrorKind::Structural,
                format!("expected a value but found '{}'", self.slice(item.span)),
                item.token,
            )),
        }
    }

    /// Read an item as a bare word (alias names, sort directions).
    pub fn word(&mut self, item: &Item, role: Role) -> Result<String> {
        let token = self.tokens.get(item.token);
        match (&item.term, token.kind) {
            (Term::Raw, TokenKind::Word | TokenKind::Bracketed | TokenKind::Literal) => {
                let text = token.text.clone();
                self.set_role(item.token, role);
                Ok(text)
            }
            _ => Err(self.error(
                ErrorKind::Structural,
                format!("expected a name but found '{}'", self.slice(item.span)),
                item.token,
            )),
        }
    }

    /// Read an item as a boolean condition.
    pub fn condition(&mut self, item: Item) -> Result<Operator> {
        match item.term {
            Term::Node(Operand::Operator(op)) if op.is_condition() => Ok(op),
            _ => Err(self.error(
                ErrorKind::Structural,
                format!("expected a condition but found '{}'", self.slice(item.span)),
                item.token,
            )),
        }
    }

    pub fn bind_alias(&mut self, name: impl Into<String>, target: Operand) {
        self.state.bind_alias(name, target);
    }

    /// Token classes for syntax highlighting, in source order.
    pub fn highlight(&self) -> Vec<Highlight> {
        let mut spans: Vec<Highlight> = self
            .tokens
            .iter()
            .filter(|(_, t)| t.kind != TokenKind::Group)
            .map(|(id, t)| Highlight {
                span: t.span,
                class: self.classify(id, t),
            })
            .collect();
        spans.sort_by_key(|h| h.span.start);
        spans
    }

    fn classify(&self, id: TokenId, token: &Token) -> HighlightClass {
        if token.error.is_some() {
            return HighlightClass::Error;
        }
        match (token.rule, self.role(id)) {
            (Some(kind), _) if token.kind == TokenKind::Word && kind.is_clause() => HighlightClass::Clause,
            (Some(kind), _) if token.kind == TokenKind::Word && kind.is_connective() => HighlightClass::Conjunction,
            (Some(_), _) if !token.is_literal() => HighlightClass::Operator,
            (_, Some(Role::Property)) => HighlightClass::Property,
            (_, Some(Role::Alias)) => HighlightClass::Alias,
            (_, Some(Role::Direction)) => HighlightClass::Operator,
            (_, Some(Role::Value)) if token.is_literal() => HighlightClass::Literal,
            (_, Some(Role::Value)) => HighlightClass::Value,
            _ if token.is_delimiter() => HighlightClass::Delimiter,
            _ if token.kind == TokenKind::Other => HighlightClass::Error,
            _ => HighlightClass::Plain,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn connectives_fold_by_precedence() {
        let registry = Registry::new();
        let mut parser = Parser::new("WHERE a = 1 OR b = 2 AND c = 3", &registry).unwrap();
        let query = parser.parse_query().unwrap();
        let condition = query.conditions().unwrap();
        assert_eq!(condition.kind, OperatorKind::Or);
        assert_eq!(condition.operands.len(), 2);
        let right = condition.operands[1].as_operator().unwrap();
        assert_eq!(right.kind, OperatorKind::And);
        assert_eq!(right.operands.len(), 2);
    }

    #[test]
    fn phrases_nest_under_clauses() {
        let registry = Registry::new();
        let mut parser = Parser::new("WHERE a = 1 AND b = 2", &registry).unwrap();
        parser.parse_query().unwrap();
        let a = parser.tokens().top()[1];
        let owner = parser.owner(a).unwrap();
        assert_eq!(parser.phrase(owner).kind, OperatorKind::Equals);
        let group = parser.phrase(owner).parent.unwrap();
        assert_eq!(parser.phrase(group).kind, OperatorKind::And);
        let clause = parser.phrase(group).parent.unwrap();
        assert_eq!(parser.phrase(clause).kind, OperatorKind::Where);
        assert_eq!(parser.role(a), Some(Role::Property));
    }

    #[test]
    fn iteration_ceiling_is_internal_error() {
        let registry = Registry::new();
        let options = ParserOptions::default().with_max_iterations(2);
        let mut parser = Parser::with_options("WHERE a = 1 AND b = 2 AND c = 3", &registry, options).unwrap();
        let error = parser.parse_query().unwrap_err();
        assert_eq!(error.kind, ErrorKind::Internal);
    }

    #[test]
    fn evaluate_records_fatal_error() {
        let registry = Registry::new();
        let mut parser = Parser::new("WHERE a =", &registry).unwrap();
        assert!(!parser.evaluate());
        assert_eq!(parser.errors().len(), 1);
        assert_eq!(parser.errors()[0].kind, ErrorKind::Structural);
    }
}
