//! Tokenizer: raw query text to a nested token sequence.
//!
//! Characters fall into four classes (symbol, word, whitespace, other);
//! adjacent characters of one class coalesce into a token. Quotes, brackets
//! and `<<<...>>>` read whole literals. Parentheses recurse: the interior
//! becomes the children of the preceding function-style token, or of an
//! anonymous group token when nothing claims it.
//!
//! Quoted text inside an expression that mentions `REGEXP_MATCH` outside the
//! quotes is kept verbatim as a blob, so regular expression escapes survive.
//! The check looks at the whole expression, not at the enclosing call, and
//! is deliberately left that narrow.

use tracing::debug;

use crate::{
    ast::{ExpressionMap, OperatorKind, Slot, Span, Token, TokenArena, TokenId, TokenKind},
    config::ParserOptions,
    error::{ErrorKind, ParseError},
};

/// Output of [`Lexer::tokenize`].
#[derive(Debug, Clone)]
pub struct Lexed {
    pub source: String,
    pub tokens: TokenArena,
    pub map: ExpressionMap,
    /// Non-fatal lexical problems (unterminated literals, missing `)`).
    pub errors: Vec<ParseError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Class {
    Symbol,
    Word,
    Other,
}

pub struct Lexer {
    input: Vec<char>,
    source: String,
    position: usize,
    options: ParserOptions,
    tokens: TokenArena,
    map: ExpressionMap,
    errors: Vec<ParseError>,
    /// Run of same-class characters not yet flushed into a token.
    pending: Option<(Class, usize)>,
}

/// Replace typographic quotes with straight ones, one char for one char.
pub fn normalize_quotes(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => '\'',
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' => '"',
            other => other,
        })
        .collect()
}

fn is_symbol(ch: char) -> bool {
    matches!(ch, '=' | '!' | '<' | '>')
}

fn is_word(ch: char) -> bool {
    ch.is_alphanumeric() || matches!(ch, '_' | '.' | '-' | ':' | '*' | '/' | '@' | '$' | '#' | '%')
}

impl Lexer {
    pub fn new(input: &str) -> Self {
        let source = normalize_quotes(input);
        let input: Vec<char> = source.chars().collect();
        let map = ExpressionMap::new(input.len());
        Lexer {
            input,
            source,
            position: 0,
            options: ParserOptions::default(),
            tokens: TokenArena::new(),
            map,
            errors: Vec::new(),
            pending: None,
        }
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn tokenize(mut self) -> Result<Lexed, ParseError> {
        let top = self.read_sequence(0)?;
        self.tokens.set_top(top);
        debug!(tokens = self.tokens.len(), errors = self.errors.len(), "tokenized expression");
        Ok(Lexed {
            source: self.source,
            tokens: self.tokens,
            map: self.map,
            errors: self.errors,
        })
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) {
        self.position += 1;
    }

    fn starts_with(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(i, c)| self.peek_char(i) == Some(c))
    }

    fn text(&self, span: Span) -> String {
        self.input[span.start..span.end].iter().collect()
    }

    fn fatal(&self, kind: ErrorKind, message: &str, span: Span) -> ParseError {
        ParseError::new(kind, message)
            .at(self.text(span), span)
            .in_expression(&self.source)
    }

    fn lexical(&mut self, message: &str, span: Span) -> ParseError {
        let error = self.fatal(ErrorKind::Lexical, message, span);
        self.errors.push(error.clone());
        error
    }

    fn push(&mut self, token: Token, seq: &mut Vec<TokenId>) -> TokenId {
        let span = token.span;
        let id = self.tokens.push(token);
        self.map.fill(span, Slot::Token(id));
        seq.push(id);
        id
    }

    fn flush(&mut self, seq: &mut Vec<TokenId>) {
        let Some((class, start)) = self.pending.take() else {
            return;
        };
        let span = Span::new(start, self.position);
        let text = self.text(span);
        let mut token = match class {
            Class::Symbol => Token::new(text, TokenKind::Symbol, span),
            Class::Word => Token::new(text, TokenKind::Word, span),
            Class::Other => Token::new(text, TokenKind::Other, span),
        };
        if class != Class::Other {
            let upper = token.text.to_ascii_uppercase();
            if let Some(kind) = OperatorKind::from_keyword(&upper) {
                token.rule = Some(kind);
                token.text = upper;
            }
        }
        self.push(token, seq);
    }

    fn extend(&mut self, class: Class, seq: &mut Vec<TokenId>) {
        match self.pending {
            Some((current, _)) if current == class => {}
            _ => {
                self.flush(seq);
                self.pending = Some((class, self.position));
            }
        }
        self.advance();
    }

    fn read_sequence(&mut self, depth: usize) -> Result<Vec<TokenId>, ParseError> {
        let mut seq = Vec::new();

        while let Some(ch) = self.current_char() {
            match ch {
                c if c.is_whitespace() => {
                    self.flush(&mut seq);
                    self.advance();
                }
                '(' => {
                    self.flush(&mut seq);
                    self.read_children(depth, &mut seq)?;
                }
                ')' => {
                    self.flush(&mut seq);
                    if depth == 0 {
                        let span = Span::new(self.position, self.position + 1);
                        return Err(self.fatal(ErrorKind::Structural, "unexpected ')'", span));
                    }
                    return Ok(seq);
                }
                ',' | ';' => {
                    self.flush(&mut seq);
                    let span = Span::new(self.position, self.position + 1);
                    self.push(Token::new(ch.to_string(), TokenKind::Delimiter, span), &mut seq);
                    self.advance();
                }
                '"' | '\'' => {
                    self.flush(&mut seq);
                    let token = self.read_literal(ch);
                    self.push(token, &mut seq);
                }
                '[' => {
                    self.flush(&mut seq);
                    let token = self.read_bracketed();
                    self.push(token, &mut seq);
                }
                '<' if self.starts_with("<<<") => {
                    self.flush(&mut seq);
                    let token = self.read_blob();
                    self.push(token, &mut seq);
                }
                c if is_symbol(c) => self.extend(Class::Symbol, &mut seq),
                c if is_word(c) => self.extend(Class::Word, &mut seq),
                _ => self.extend(Class::Other, &mut seq),
            }
        }

        self.flush(&mut seq);
        if depth > 0 {
            let span = Span::new(self.position, self.position);
            self.lexical("missing ')'", span);
        }
        Ok(seq)
    }

    /// Consume `( ... )`, attaching the interior to the owning token.
    fn read_children(&mut self, depth: usize, seq: &mut Vec<TokenId>) -> Result<(), ParseError> {
        let open = self.position;
        if depth + 1 > self.options.max_depth {
            let span = Span::new(open, open + 1);
            return Err(self.fatal(
                ErrorKind::Internal,
                &format!("parentheses nested deeper than {}", self.options.max_depth),
                span,
            ));
        }

        let owner = match seq.last().copied() {
            Some(prev) if self.claims_children(prev, open) => prev,
            _ => {
                let group = Token::new("(", TokenKind::Group, Span::new(open, open + 1));
                let id = self.tokens.push(group);
                seq.push(id);
                id
            }
        };

        self.map.fill(Span::new(open, open + 1), Slot::Open(owner));
        self.advance();
        let children = self.read_sequence(depth + 1)?;

        if self.current_char() == Some(')') {
            self.map.fill(Span::new(self.position, self.position + 1), Slot::Close(owner));
            self.advance();
        }

        let token = self.tokens.get_mut(owner);
        token.children = children;
        token.children_end = Some(self.position);
        Ok(())
    }

    /// Function-style keywords own a following parenthesis; so does a plain
    /// word written flush against it (`foo(`), which the parser then rejects
    /// as an unknown function.
    fn claims_children(&self, prev: TokenId, open: usize) -> bool {
        let token = self.tokens.get(prev);
        if token.has_children() {
            return false;
        }
        match token.rule {
            Some(kind) => kind.meta().function_call,
            None => token.kind == TokenKind::Word && token.span.end == open,
        }
    }

    /// Quoted literal with backslash escapes for the quote and backslash.
    fn read_literal(&mut self, quote: char) -> Token {
        let start = self.position;
        self.advance();

        let mut text = String::new();
        let mut raw = String::new();
        let mut terminated = false;

        while let Some(ch) = self.current_char() {
            match ch {
                '\\' => {
                    raw.push(ch);
                    self.advance();
                    match self.current_char() {
                        Some(next) if next == quote || next == '\\' => {
                            raw.push(next);
                            text.push(next);
                            self.advance();
                        }
                        Some(next) => {
                            raw.push(next);
                            text.push('\\');
                            text.push(next);
                            self.advance();
                        }
                        None => text.push('\\'),
                    }
                }
                c if c == quote => {
                    self.advance();
                    terminated = true;
                    break;
                }
                c => {
                    raw.push(c);
                    text.push(c);
                    self.advance();
                }
            }
        }

        let span = Span::new(start, self.position);
        let mut token = if self.mentions_regexp_outside(span) {
            Token::new(raw, TokenKind::Blob, span)
        } else {
            Token::new(text, TokenKind::Literal, span)
        };
        if !terminated {
            let error = self.lexical("unterminated string literal", span);
            token.error = Some(error.message);
        }
        token
    }

    fn mentions_regexp_outside(&self, span: Span) -> bool {
        let outside: String = self.input[..span.start]
            .iter()
            .chain(self.input[span.end..].iter())
            .collect();
        outside.to_ascii_uppercase().contains("REGEXP_MATCH")
    }

    /// `<<<verbatim text>>>`
    fn read_blob(&mut self) -> Token {
        let start = self.position;
        self.position += 3;
        let mut text = String::new();
        let mut terminated = false;

        while let Some(ch) = self.current_char() {
            if self.starts_with(">>>") {
                self.position += 3;
                terminated = true;
                break;
            }
            text.push(ch);
            self.advance();
        }

        let span = Span::new(start, self.position);
        let mut token = Token::new(text, TokenKind::Blob, span);
        if !terminated {
            let error = self.lexical("unterminated '<<<' block", span);
            token.error = Some(error.message);
        }
        token
    }

    /// `[property name with spaces]`
    fn read_bracketed(&mut self) -> Token {
        let start = self.position;
        self.advance();
        let mut text = String::new();
        let mut terminated = false;

        while let Some(ch) = self.current_char() {
            self.advance();
            if ch == ']' {
                terminated = true;
                break;
            }
            text.push(ch);
        }

        let span = Span::new(start, self.position);
        let mut token = Token::new(text, TokenKind::Bracketed, span);
        if !terminated {
            let error = self.lexical("unterminated '[' property reference", span);
            token.error = Some(error.message);
        }
        token
    }
}

#[test]
fn test_keywords_canonicalize() {
    let lexed = Lexer::new("select a where b = 1").tokenize().unwrap();
    let top: Vec<&str> = lexed.tokens.top().iter().map(|id| lexed.tokens.get(*id).text.as_str()).collect();
    assert_eq!(top, vec!["SELECT", "a", "WHERE", "b", "=", "1"]);
    assert_eq!(lexed.tokens.get(lexed.tokens.top()[4]).rule, Some(OperatorKind::Equals));
}

#[test]
fn test_symbols_split_from_words() {
    let lexed = Lexer::new("a>=-5").tokenize().unwrap();
    let top: Vec<&str> = lexed.tokens.top().iter().map(|id| lexed.tokens.get(*id).text.as_str()).collect();
    assert_eq!(top, vec!["a", ">=", "-5"]);
}
