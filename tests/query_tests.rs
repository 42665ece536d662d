// tests/query_tests.rs

use std::collections::HashMap;

use saql::{
    ColumnDescription, ColumnType, EvalError, Operator, OperatorKind, PropertyRef, Registry, ScalarValue,
    SearchQuery, Subject,
};
use serde_json::{Value, json};

fn status_and_region() -> SearchQuery {
    let payload = json!({"where": {"and": [
        {"=": [{"source": "status"}, "open"]},
        {"in": [{"source": "region"}, ["us-east-1", "us-west-2"]]}
    ]}});
    SearchQuery::from_json(&payload, &Registry::new()).unwrap()
}

fn equals(name: &str, value: impl Into<ScalarValue>) -> Operator {
    Operator::new(OperatorKind::Equals)
        .with_property(PropertyRef::new(name))
        .with_operand(value.into())
}

// ============================================================================
// Local evaluation
// ============================================================================

#[test]
fn test_status_and_region() {
    let query = status_and_region();
    assert!(query.test(&json!({"status": "open", "region": "us-east-1"})).unwrap());
    assert!(query.test(&json!({"status": "open", "region": "us-west-2"})).unwrap());
    assert!(!query.test(&json!({"status": "closed", "region": "us-east-1"})).unwrap());
    assert!(!query.test(&json!({"status": "open", "region": "eu-west-1"})).unwrap());
    assert!(!query.test(&json!({"region": "us-east-1"})).unwrap());
}

#[test]
fn test_hash_map_subject() {
    let mut record = HashMap::new();
    record.insert("status".to_string(), json!("open"));
    record.insert("region".to_string(), json!("us-west-2"));
    assert!(status_and_region().test(&record).unwrap());
}

struct Alert {
    severity: u8,
}

impl Subject for Alert {
    fn property_value(&self, name: &str, namespace: &str) -> Option<Value> {
        (namespace == "default" && name == "severity").then(|| json!(self.severity))
    }
}

#[test]
fn test_custom_subject() {
    let query = SearchQuery::from_conditions_string("severity IN (4, 5)", &Registry::new()).unwrap();
    assert!(query.test(&Alert { severity: 5 }).unwrap());
    assert!(!query.test(&Alert { severity: 2 }).unwrap());
}

#[test]
fn test_not_and_inequality() {
    let registry = Registry::new();
    let query = SearchQuery::from_conditions_string("NOT status = 'open' OR owner != 'bob'", &registry).unwrap();
    assert!(query.test(&json!({"status": "closed", "owner": "bob"})).unwrap());
    assert!(query.test(&json!({"status": "open", "owner": "amy"})).unwrap());
    assert!(!query.test(&json!({"status": "open", "owner": "bob"})).unwrap());
}

#[test]
fn test_contains_any_and_all() {
    let registry = Registry::new();
    let any = SearchQuery::from_conditions_string("tags CONTAINS_ANY ('vpn', 'ssh')", &registry).unwrap();
    let all = SearchQuery::from_conditions_string("tags CONTAINS_ALL ('vpn', 'ssh')", &registry).unwrap();
    let record = json!({"tags": ["ssh", "web"]});
    assert!(any.test(&record).unwrap());
    assert!(!all.test(&record).unwrap());
    assert!(all.test(&json!({"tags": ["vpn", "ssh"]})).unwrap());
}

#[test]
fn test_numbers_and_namespaces() {
    let registry = Registry::new();
    let query = SearchQuery::from_conditions_string("flow:port = 443 AND flow:proto = 'tcp'", &registry).unwrap();
    assert!(query.test(&json!({"flow": {"port": 443.0, "proto": "tcp"}})).unwrap());
    assert!(!query.test(&json!({"port": 443, "proto": "tcp"})).unwrap());
}

#[test]
fn test_missing_property_is_null() {
    let registry = Registry::new();
    let query = SearchQuery::from_conditions_string("a != 1", &registry).unwrap();
    assert!(query.test(&json!({})).unwrap());
}

#[test]
fn test_unsupported_operator_is_an_error() {
    let registry = Registry::new();
    let query = SearchQuery::from_conditions_string("a = 1 OR b > 2", &registry).unwrap();
    assert_eq!(
        query.test(&json!({"a": 1, "b": 3})),
        Err(EvalError::UnsupportedOperator(">".to_string()))
    );
}

#[test]
fn test_query_without_conditions_matches() {
    let query = SearchQuery::from_query_string("SELECT a LIMIT 5", &Registry::new()).unwrap();
    assert!(query.test(&json!({"a": 1})).unwrap());
}

// ============================================================================
// Editing the condition tree
// ============================================================================

#[test]
fn test_and_wraps_a_bare_condition() {
    let registry = Registry::new();
    let mut query = SearchQuery::from_conditions_string("a = 1", &registry).unwrap();
    assert_eq!(query.conditions_to_json(), Some(&json!({"=": [{"source": "a"}, 1]})));

    query.and(equals("b", 2));
    assert_eq!(query.conditions_to_query_string(&registry), "a = 1 AND b = 2");

    query.and(equals("c", 3));
    assert_eq!(query.conditions().unwrap().operands.len(), 3);

    query.or(equals("d", 4));
    assert_eq!(
        query.conditions_to_query_string(&registry),
        "(a = 1 AND b = 2 AND c = 3) OR d = 4"
    );
}

#[test]
fn test_conditions_mut_creates_an_empty_group() {
    let mut query = SearchQuery::empty();
    assert!(query.conditions().is_none());
    assert_eq!(query.conditions_mut().kind, OperatorKind::And);
    query.or(equals("a", "x"));
    assert_eq!(
        query.to_json(),
        json!({"where": {"or": [{"=": [{"source": "a"}, "x"]}]}})
    );
}

#[test]
fn test_conditions_mut_keeps_clause_order() {
    let registry = Registry::new();
    let mut query = SearchQuery::from_query_string("SELECT a LIMIT 5", &registry).unwrap();
    query.and(equals("a", "x"));
    assert_eq!(query.to_query_string(&registry), "SELECT a WHERE a = 'x' LIMIT 5");
}

#[test]
fn test_grouping_clauses_replace_each_other() {
    let registry = Registry::new();
    let mut query = SearchQuery::from_query_string("SELECT a GROUP BY a", &registry).unwrap();
    query.set_clause(Operator::new(OperatorKind::GroupByPermuted).with_operand(PropertyRef::new("b")));
    assert!(query.clause(OperatorKind::GroupBy).is_none());
    assert_eq!(query.to_query_string(&registry), "SELECT a GROUP BY PERMUTED b");
}

#[test]
fn test_set_clause_keeps_clause_order() {
    let registry = Registry::new();
    let mut query = SearchQuery::from_query_string("LIMIT 5", &registry).unwrap();
    query.set_clause(Operator::new(OperatorKind::Select).with_operand(PropertyRef::new("a")));
    assert_eq!(query.to_query_string(&registry), "SELECT a LIMIT 5");
}

// ============================================================================
// Introspection
// ============================================================================

#[test]
fn test_column_descriptions() {
    let registry = Registry::new();
    let query = SearchQuery::from_query_string(
        "SELECT src, COUNT(dst), SUM(bytes) AS total, FROM_EPOCHTIME(ts)",
        &registry,
    )
    .unwrap();
    let column = |name: &str, column_type, aggregate| ColumnDescription {
        name: name.to_string(),
        column_type,
        aggregate,
    };
    assert_eq!(
        query.column_descriptions(),
        vec![
            column("src", ColumnType::Property, false),
            column("dstCount", ColumnType::Aggregate, true),
            column("total", ColumnType::Aggregate, true),
            column("FROM_EPOCHTIME(ts)", ColumnType::Function, false),
        ]
    );
    assert!(query.is_aggregate());
}

#[test]
fn test_plain_query_is_not_aggregate() {
    let query = SearchQuery::from_query_string("SELECT a, b WHERE c = 1", &Registry::new()).unwrap();
    assert!(!query.is_aggregate());
    assert!(query.column_descriptions().iter().all(|c| !c.aggregate));
}

#[test]
fn test_named_template() {
    let query = SearchQuery::named("failed logins");
    assert_eq!(query.name(), Some("failed logins"));
    assert_eq!(query.to_json(), json!({}));
    assert_eq!(query.to_query_string(&Registry::new()), "");
}
