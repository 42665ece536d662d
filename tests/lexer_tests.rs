// tests/lexer_tests.rs

use saql::ast::{Slot, Span, TokenKind};
use saql::error::ErrorKind;
use saql::lexer::{Lexed, normalize_quotes};
use saql::{Lexer, ParserOptions};

fn lex(input: &str) -> Lexed {
    Lexer::new(input).tokenize().unwrap()
}

fn top_texts(lexed: &Lexed) -> Vec<String> {
    lexed
        .tokens
        .top()
        .iter()
        .map(|id| lexed.tokens.get(*id).text.clone())
        .collect()
}

// ============================================================================
// Token classes
// ============================================================================

#[test]
fn test_character_classes_coalesce() {
    let lexed = lex("src.ip!='10.0.0.1'");
    assert_eq!(top_texts(&lexed), vec!["src.ip", "!=", "10.0.0.1"]);
    let kinds: Vec<TokenKind> = lexed.tokens.top().iter().map(|id| lexed.tokens.get(*id).kind).collect();
    assert_eq!(kinds, vec![TokenKind::Word, TokenKind::Symbol, TokenKind::Literal]);
}

#[test]
fn test_keywords_are_case_insensitive() {
    let lexed = lex("where a in (1) and not exists b");
    assert_eq!(top_texts(&lexed), vec!["WHERE", "a", "IN", "AND", "NOT", "EXISTS", "b"]);
}

#[test]
fn test_delimiters() {
    let lexed = lex("SELECT a, b; WHERE c = 1");
    let delimiters: Vec<&str> = lexed
        .tokens
        .top()
        .iter()
        .map(|id| lexed.tokens.get(*id))
        .filter(|t| t.kind == TokenKind::Delimiter)
        .map(|t| t.text.as_str())
        .collect();
    assert_eq!(delimiters, vec![",", ";"]);
}

// ============================================================================
// Literals
// ============================================================================

#[test]
fn test_escaped_quotes() {
    let lexed = lex(r#"a = 'it\'s' AND b = "say \"hi\"""#);
    let literals: Vec<String> = lexed
        .tokens
        .iter()
        .filter(|(_, t)| t.kind == TokenKind::Literal)
        .map(|(_, t)| t.text.clone())
        .collect();
    assert_eq!(literals, vec!["it's".to_string(), r#"say "hi""#.to_string()]);
}

#[test]
fn test_smart_quotes_are_normalized() {
    assert_eq!(normalize_quotes("\u{2018}x\u{2019} \u{201C}y\u{201D}"), "'x' \"y\"");
    let lexed = lex("a = \u{2018}open\u{2019}");
    let value = lexed.tokens.get(lexed.tokens.top()[2]);
    assert_eq!(value.kind, TokenKind::Literal);
    assert_eq!(value.text, "open");
}

#[test]
fn test_bracketed_property() {
    let lexed = lex("[source ip] = 1");
    let property = lexed.tokens.get(lexed.tokens.top()[0]);
    assert_eq!(property.kind, TokenKind::Bracketed);
    assert_eq!(property.text, "source ip");
    assert_eq!(property.span, Span::new(0, 11));
}

#[test]
fn test_blob_keeps_mixed_quotes() {
    let lexed = lex(r#"a = <<<it's "quoted">>>"#);
    let blob = lexed.tokens.get(lexed.tokens.top()[2]);
    assert_eq!(blob.kind, TokenKind::Blob);
    assert_eq!(blob.text, r#"it's "quoted""#);
}

#[test]
fn test_regexp_pattern_is_kept_verbatim() {
    let lexed = lex(r"WHERE REGEXP_MATCH(path, 'it\'s\d+')");
    let call = lexed.tokens.get(lexed.tokens.top()[1]);
    let pattern = lexed.tokens.get(call.children[2]);
    assert_eq!(pattern.kind, TokenKind::Blob);
    assert_eq!(pattern.text, r"it\'s\d+");

    let lexed = lex(r"WHERE a = 'it\'s'");
    let literal = lexed.tokens.get(lexed.tokens.top()[3]);
    assert_eq!(literal.kind, TokenKind::Literal);
    assert_eq!(literal.text, "it's");
}

// ============================================================================
// Parentheses
// ============================================================================

#[test]
fn test_function_keyword_owns_parentheses() {
    let lexed = lex("a IN (1, 2)");
    assert_eq!(top_texts(&lexed), vec!["a", "IN"]);
    let call = lexed.tokens.get(lexed.tokens.top()[1]);
    assert_eq!(call.children.len(), 3);
    assert_eq!(call.full_span(), Span::new(2, 11));
}

#[test]
fn test_anonymous_group() {
    let lexed = lex("(a = 1) OR b = 2");
    let group = lexed.tokens.get(lexed.tokens.top()[0]);
    assert_eq!(group.kind, TokenKind::Group);
    assert_eq!(group.children.len(), 3);
}

#[test]
fn test_unexpected_closing_parenthesis_is_fatal() {
    let error = Lexer::new("a = 1)").tokenize().unwrap_err();
    assert_eq!(error.kind, ErrorKind::Structural);
    assert_eq!(error.token.unwrap().span, Span::new(5, 6));
}

#[test]
fn test_depth_ceiling() {
    let options = ParserOptions::default().with_max_depth(2);
    let error = Lexer::new("(((a = 1)))").with_options(options).tokenize().unwrap_err();
    assert_eq!(error.kind, ErrorKind::Internal);
}

// ============================================================================
// Recoverable problems
// ============================================================================

#[test]
fn test_unterminated_literal_is_recorded() {
    let lexed = lex("WHERE a = 'abc");
    assert_eq!(lexed.errors.len(), 1);
    assert_eq!(lexed.errors[0].kind, ErrorKind::Lexical);
    let fragment = lexed.tokens.get(lexed.tokens.top()[3]);
    assert_eq!(fragment.text, "abc");
    assert!(fragment.error.is_some());
}

#[test]
fn test_missing_closing_parenthesis_is_recorded() {
    let lexed = lex("a IN (1, 2");
    assert_eq!(lexed.errors.len(), 1);
    assert_eq!(lexed.errors[0].message, "missing ')'");
}

// ============================================================================
// Expression map
// ============================================================================

#[test]
fn test_expression_map_covers_every_offset() {
    let lexed = lex("a IN (1)");
    assert_eq!(lexed.map.len(), 8);
    let a = lexed.tokens.top()[0];
    let call = lexed.tokens.top()[1];
    assert_eq!(lexed.map.get(0), Some(Slot::Token(a)));
    assert_eq!(lexed.map.get(1), Some(Slot::Space));
    assert_eq!(lexed.map.get(5), Some(Slot::Open(call)));
    assert_eq!(lexed.map.get(7), Some(Slot::Close(call)));
}

#[test]
fn test_offsets_count_characters() {
    let lexed = lex("é = 'ü'");
    let value = lexed.tokens.get(lexed.tokens.top()[2]);
    assert_eq!(value.span, Span::new(4, 7));
    assert_eq!(lexed.map.len(), 7);
}
