// tests/builder_tests.rs

use saql::{Connective, QueryBuilder, Registry, SearchQuery};
use serde_json::json;

#[test]
fn test_conditions_join_with_and() {
    let query = QueryBuilder::new()
        .equals("status", "open")
        .not_equals("owner", "bob")
        .is_in("region", ["us-east-1", "us-west-2"])
        .build();
    assert_eq!(
        query.conditions_to_json(),
        Some(&json!({"and": [
            {"=": [{"source": "status"}, "open"]},
            {"!=": [{"source": "owner"}, "bob"]},
            {"in": [{"source": "region"}, ["us-east-1", "us-west-2"]]}
        ]}))
    );
}

#[test]
fn test_nested_groups() {
    let query = QueryBuilder::new()
        .equals("a", 1)
        .where_(Connective::Or)
        .equals("b", 2)
        .equals("c", 3)
        .end()
        .equals("d", 4)
        .build();
    assert_eq!(
        query.conditions_to_query_string(&Registry::new()),
        "a = 1 AND (b = 2 OR c = 3) AND d = 4"
    );
}

#[test]
fn test_negated_group() {
    let registry = Registry::new();
    let query = QueryBuilder::new()
        .equals("a", 1)
        .not()
        .equals("b", 2)
        .equals("c", 3)
        .end()
        .equals("d", 4)
        .build();
    let text = query.to_query_string(&registry);
    assert_eq!(text, "WHERE a = 1 AND NOT (b = 2 AND c = 3) AND d = 4");

    let reparsed = SearchQuery::from_query_string(&text, &registry).unwrap();
    assert_eq!(reparsed.to_json(), query.to_json());
}

#[test]
fn test_each_call_returns_a_new_builder() {
    let base = QueryBuilder::new().equals("a", 1);
    let left = base.equals("b", 2);
    let right = base.where_(Connective::Or).equals("c", 3);

    let registry = Registry::new();
    assert_eq!(base.build().conditions_to_query_string(&registry), "a = 1");
    assert_eq!(left.build().conditions_to_query_string(&registry), "a = 1 AND b = 2");
    assert_eq!(right.build().conditions_to_query_string(&registry), "a = 1 AND c = 3");
}

#[test]
fn test_extends_an_existing_query() {
    let registry = Registry::new();
    let existing = SearchQuery::from_query_string("SELECT a WHERE a = 1 LIMIT 5", &registry).unwrap();
    let query = QueryBuilder::from_query(existing).equals("b", true).build();
    assert_eq!(
        query.to_query_string(&registry),
        "SELECT a WHERE a = 1 AND b = true LIMIT 5"
    );
}

#[test]
fn test_end_at_root_is_harmless() {
    let query = QueryBuilder::new().end().equals("a", "x").end().build();
    assert_eq!(query.conditions_to_json(), Some(&json!({"and": [{"=": [{"source": "a"}, "x"]}]})));
}

#[test]
fn test_built_query_evaluates() {
    let query = QueryBuilder::new()
        .equals("status", "open")
        .is_in("region", ["us-east-1", "us-west-2"])
        .build();
    assert!(query.test(&json!({"status": "open", "region": "us-west-2"})).unwrap());
    assert!(!query.test(&json!({"status": "open", "region": "ap-south-1"})).unwrap());
}

#[test]
fn test_groups_left_empty_are_dropped() {
    let registry = Registry::new();
    let query = QueryBuilder::new()
        .not()
        .end()
        .where_(Connective::Or)
        .end()
        .equals("a", 1)
        .build();
    let text = query.to_query_string(&registry);
    assert_eq!(text, "WHERE a = 1");
    assert_eq!(query.conditions_to_json(), Some(&json!({"and": [{"=": [{"source": "a"}, 1]}]})));
    assert!(SearchQuery::from_query_string(&text, &registry).is_ok());

    let nothing = QueryBuilder::new().not().end().build();
    assert!(nothing.conditions().is_none());
    assert_eq!(nothing.to_query_string(&registry), "");
}
