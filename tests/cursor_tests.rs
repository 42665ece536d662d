// tests/cursor_tests.rs

use saql::{Connective, CursorDetails, Facet, OperatorKind, PropertyRef, Registry, ScalarValue, Span};

fn at(query: &str, offset: usize) -> CursorDetails {
    CursorDetails::at(query, &Registry::new(), offset, false).unwrap()
}

const QUERY: &str = "SELECT a WHERE b = 1 AND NOT c IN (2, 3)";

// ============================================================================
// Resolution
// ============================================================================

#[test]
fn test_property_under_caret() {
    let details = at(QUERY, 15);
    assert_eq!(details.token_text.as_deref(), Some("b"));
    assert_eq!(details.facet, Facet::Property);
    assert_eq!(details.clause, Some(OperatorKind::Where));
    assert_eq!(details.phrase, Some(Span::new(15, 20)));
    assert_eq!(details.property, Some(PropertyRef::new("b")));
    assert_eq!(details.operator, Some(OperatorKind::Equals));
    assert_eq!(details.values, vec![ScalarValue::number(1)]);
    assert!(!details.negated);
}

#[test]
fn test_whitespace_resolves_to_previous_token() {
    let details = at(QUERY, 16);
    assert_eq!(details.token_text.as_deref(), Some("b"));
    assert_eq!(details.phrase, Some(Span::new(15, 20)));
}

#[test]
fn test_value_inside_negated_membership() {
    let details = at(QUERY, 35);
    assert_eq!(details.token_text.as_deref(), Some("2"));
    assert_eq!(details.facet, Facet::Value);
    assert_eq!(details.clause, Some(OperatorKind::Where));
    assert_eq!(details.phrase, Some(Span::new(25, 40)));
    assert!(details.negated);
    assert_eq!(details.operator, Some(OperatorKind::In));
    assert_eq!(details.property, Some(PropertyRef::new("c")));
    assert_eq!(details.values, vec![ScalarValue::number(2), ScalarValue::number(3)]);
}

#[test]
fn test_skip_commas() {
    let on_comma = at(QUERY, 36);
    assert_eq!(on_comma.facet, Facet::Delimiter);

    let skipped = CursorDetails::at(QUERY, &Registry::new(), 36, true).unwrap();
    assert_eq!(skipped.token_text.as_deref(), Some("2"));
    assert_eq!(skipped.facet, Facet::Value);
}

#[test]
fn test_connective_and_clause_facets() {
    let conjunction = at(QUERY, 22);
    assert_eq!(conjunction.facet, Facet::Conjunction);
    assert_eq!(conjunction.operator, Some(OperatorKind::And));

    let clause = at(QUERY, 2);
    assert_eq!(clause.facet, Facet::Clause);
    assert_eq!(clause.clause, Some(OperatorKind::Select));
}

#[test]
fn test_alias_and_aggregate() {
    let query = "SELECT COUNT(host) AS hits";
    let on_alias = at(query, 23);
    assert_eq!(on_alias.facet, Facet::Property);
    assert_eq!(on_alias.alias.as_deref(), Some("hits"));
    assert!(on_alias.aggregate);
    assert_eq!(on_alias.operator, Some(OperatorKind::Count));

    let on_property = at(query, 14);
    assert_eq!(on_property.property, Some(PropertyRef::new("host")));
    assert_eq!(on_property.alias.as_deref(), Some("hits"));
    assert_eq!(on_property.phrase, Some(Span::new(7, 26)));
}

#[test]
fn test_partial_parse_still_resolves() {
    let details = at("WHERE a = 1 AND b =", 8);
    assert_eq!(details.facet, Facet::Operator);
    assert_eq!(details.operator, Some(OperatorKind::Equals));
    assert_eq!(details.property, Some(PropertyRef::new("a")));
}

#[test]
fn test_empty_query() {
    let details = at("", 0);
    assert_eq!(details.facet, Facet::None);
    assert!(details.token.is_none());
    assert_eq!(details.replace_phrase("a = 1"), "a = 1");
}

// ============================================================================
// Edits
// ============================================================================

#[test]
fn test_replace_phrase() {
    let details = at("WHERE b = 1 AND c = 2", 6);
    assert_eq!(details.replace_phrase("b = 5"), "WHERE b = 5 AND c = 2");
}

#[test]
fn test_append_clause() {
    let details = at("WHERE b = 1 AND c = 2", 6);
    assert_eq!(
        details.append_clause(Connective::Or, "d = 3"),
        "WHERE b = 1 OR d = 3 AND c = 2"
    );
}
