use serde::Serialize;

use crate::ast::OperatorKind;

/// Index of a [`Token`] inside its [`TokenArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct TokenId(pub usize);

/// Half-open range of character offsets into the source expression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end);
        Span { start, end }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    pub fn contains(&self, offset: usize) -> bool {
        self.start <= offset && offset < self.end
    }

    pub fn encloses(&self, other: Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Smallest span covering both.
    pub fn cover(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }
}

/// Lexical class of a token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    /// Run of alphanumerics and allowed punctuation (`a`, `src.ip`, `-5`, `ns:id`)
    Word,
    /// Run of comparison symbols (`=`, `!=`, `>=`)
    Symbol,
    /// Quoted string, text already unescaped
    Literal,
    /// Verbatim text, either `<<<...>>>` or a quoted regular expression
    Blob,
    /// `[property with spaces]`
    Bracketed,
    /// `,` or `;`
    Delimiter,
    /// Anonymous parenthesized sequence with no owning token
    Group,
    /// Characters no other class accepts
    Other,
}

/// One lexical span of the source plus its position in the token tree.
///
/// Links to parent and children are [`TokenId`]s into the owning arena, so
/// the tree carries no reference cycles.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Token {
    pub text: String,
    pub kind: TokenKind,
    pub span: Span,
    /// Offset just past the closing parenthesis of attached children.
    pub children_end: Option<usize>,
    /// Top-level segment (clause keyword up to the next clause) this token lives in.
    pub block: Span,
    pub parent: Option<TokenId>,
    pub children: Vec<TokenId>,
    /// Position among siblings.
    pub index: usize,
    /// Grammar rule this token triggers, if it is a keyword.
    pub rule: Option<OperatorKind>,
    pub error: Option<String>,
}

impl Token {
    pub fn new(text: impl Into<String>, kind: TokenKind, span: Span) -> Self {
        Token {
            text: text.into(),
            kind,
            span,
            children_end: None,
            block: Span::default(),
            parent: None,
            children: Vec::new(),
            index: 0,
            rule: None,
            error: None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self.kind, TokenKind::Literal | TokenKind::Blob)
    }

    pub fn is_blob(&self) -> bool {
        self.kind == TokenKind::Blob
    }

    pub fn is_delimiter(&self) -> bool {
        self.kind == TokenKind::Delimiter
    }

    pub fn is_comma(&self) -> bool {
        self.kind == TokenKind::Delimiter && self.text == ","
    }

    pub fn has_children(&self) -> bool {
        self.children_end.is_some()
    }

    /// Span including any attached parenthetical block.
    pub fn full_span(&self) -> Span {
        match self.children_end {
            Some(end) => Span::new(self.span.start, end.max(self.span.end)),
            None => self.span,
        }
    }

    /// True for bare (unquoted, unbracketed) words whose uppercase form is `word`.
    pub fn is_word(&self, word: &str) -> bool {
        self.kind == TokenKind::Word && self.text.eq_ignore_ascii_case(word)
    }
}

/// Flat storage for every token of one expression.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TokenArena {
    tokens: Vec<Token>,
    top: Vec<TokenId>,
}

impl TokenArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, token: Token) -> TokenId {
        self.tokens.push(token);
        TokenId(self.tokens.len() - 1)
    }

    pub fn get(&self, id: TokenId) -> &Token {
        &self.tokens[id.0]
    }

    pub fn get_mut(&mut self, id: TokenId) -> &mut Token {
        &mut self.tokens[id.0]
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }

    /// Top-level token sequence.
    pub fn top(&self) -> &[TokenId] {
        &self.top
    }

    pub fn set_top(&mut self, top: Vec<TokenId>) {
        self.top = top;
    }

    /// The sequence `id` belongs to, itself included.
    pub fn siblings(&self, id: TokenId) -> &[TokenId] {
        match self.get(id).parent {
            Some(parent) => &self.get(parent).children,
            None => &self.top,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (TokenId, &Token)> {
        self.tokens.iter().enumerate().map(|(i, t)| (TokenId(i), t))
    }

    /// Walk parents up to the top-level ancestor.
    pub fn root_of(&self, mut id: TokenId) -> TokenId {
        while let Some(parent) = self.get(id).parent {
            id = parent;
        }
        id
    }
}

/// What occupies one character position of the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "slot", content = "token")]
pub enum Slot {
    /// Whitespace between tokens
    Space,
    /// Part of the token's own text (quotes and brackets included)
    Token(TokenId),
    /// Opening parenthesis of the token's children
    Open(TokenId),
    /// Closing parenthesis of the token's children
    Close(TokenId),
}

/// Maps every source offset back to the token that owns it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ExpressionMap {
    slots: Vec<Slot>,
}

impl ExpressionMap {
    pub fn new(len: usize) -> Self {
        ExpressionMap {
            slots: vec![Slot::Space; len],
        }
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn get(&self, offset: usize) -> Option<Slot> {
        self.slots.get(offset).copied()
    }

    pub fn fill(&mut self, span: Span, slot: Slot) {
        let end = span.end.min(self.slots.len());
        for s in &mut self.slots[span.start.min(end)..end] {
            *s = slot;
        }
    }

    /// Repoint every slot owned by `from` (text and parentheses) to `to`.
    pub fn retarget(&mut self, from: TokenId, to: TokenId) {
        for s in &mut self.slots {
            *s = match *s {
                Slot::Token(id) if id == from => Slot::Token(to),
                Slot::Open(id) if id == from => Slot::Open(to),
                Slot::Close(id) if id == from => Slot::Close(to),
                other => other,
            };
        }
    }

    pub fn slot_token(slot: Slot) -> Option<TokenId> {
        match slot {
            Slot::Space => None,
            Slot::Token(id) | Slot::Open(id) | Slot::Close(id) => Some(id),
        }
    }
}
