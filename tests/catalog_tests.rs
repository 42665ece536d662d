// tests/catalog_tests.rs

use saql::{ErrorKind, Operator, OperatorKind, Registry, SearchQuery};
use serde_json::{Value, json};

fn condition_payloads() -> Vec<Value> {
    vec![
        json!({"=": [{"source": "a"}, 1]}),
        json!({"!=": [{"source": "a"}, "x"]}),
        json!({">": [{"source": "a"}, 1]}),
        json!({"<": [{"source": "a"}, -2.5]}),
        json!({">=": [{"source": {"ns": "flow", "id": "bytes"}}, 100]}),
        json!({"<=": [{"source": "a"}, 0]}),
        json!({"contains": [{"source": "tags"}, "x"]}),
        json!({"like": [{"source": "name"}, "adm%"]}),
        json!({"cidr_match": [{"source": "ip"}, "10.0.0.0/8"]}),
        json!({"in": [{"source": "region"}, ["us-east-1", "us-west-2"]]}),
        json!({"between": [{"source": "bytes"}, 1, 5]}),
        json!({"contains_any": [{"source": "tags"}, ["a", "b"]]}),
        json!({"contains_all": [{"source": "tags"}, ["a"]]}),
        json!({"exists": [{"source": "a"}]}),
        json!({"isnull": [{"source": "a"}]}),
        json!({"not": [{"=": [{"source": "a"}, 1]}]}),
        json!({"not": [{"not": [{"=": [{"source": "a"}, 1]}]}]}),
        json!({"=": [{"source": "host:port"}, 1]}),
        json!({"and": [{"=": [{"source": "a"}, 1]}, {"or": [{"exists": [{"source": "b"}]}, {"isnull": [{"source": "c"}]}]}]}),
        json!({"regexp_match": [{"source": "path"}, "^/api/v1"]}),
    ]
}

fn projection_payloads() -> Vec<Value> {
    vec![
        json!({"count": [{"source": "a"}]}),
        json!({"ucount": [{"source": "a"}]}),
        json!({"min": [{"source": "a"}]}),
        json!({"max": [{"source": "a"}]}),
        json!({"avg": [{"source": "a"}]}),
        json!({"sum": [{"source": "a"}]}),
        json!({"from_epochtime": [{"source": "ts"}]}),
        json!({"interval": [{"source": "ts"}, 60]}),
        json!({"window": [{"source": "ts"}, 300]}),
        json!({"as": [{"sum": [{"source": "b"}]}, "total"]}),
    ]
}

// ============================================================================
// JSON -> tree -> JSON
// ============================================================================

#[test]
fn test_operator_json_round_trip() {
    let registry = Registry::new();
    for payload in condition_payloads().into_iter().chain(projection_payloads()) {
        let op = Operator::from_json(&payload, &registry).unwrap();
        assert_eq!(op.to_json(), payload);
    }
}

#[test]
fn test_clause_json_round_trip() {
    let registry = Registry::new();
    let payload = json!({
        "select": [{"source": "src"}, {"as": [{"count": [{"source": "dst"}]}, "hits"]}],
        "where": {"=": [{"source": "proto"}, "tcp"]},
        "group_by_permuted": [{"source": "src"}],
        "having": {">": [{"alias": "hits"}, 3]},
        "order_by": [[{"alias": "hits"}, "desc"], [{"source": "src"}, "asc"]],
        "limit": 25,
        "time_range": ["2024-01-01", "2024-02-01"]
    });
    let query = SearchQuery::from_json(&payload, &registry).unwrap();
    assert_eq!(query.to_json(), payload);
    assert!(query.aliases().contains_key("hits"));
    assert!(query.aliases().contains_key("dstCount"));
}

// ============================================================================
// JSON -> query string -> JSON
// ============================================================================

#[test]
fn test_conditions_survive_the_query_string() {
    let registry = Registry::new();
    for payload in condition_payloads() {
        let query = SearchQuery::from_json(&json!({"where": payload}), &registry).unwrap();
        let text = query.to_query_string(&registry);
        let reparsed = SearchQuery::from_query_string(&text, &registry).unwrap();
        assert_eq!(reparsed.conditions_to_json(), Some(&payload), "{text}");
    }
}

#[test]
fn test_projections_survive_the_query_string() {
    let registry = Registry::new();
    let payload = json!({"select": projection_payloads()});
    let query = SearchQuery::from_json(&payload, &registry).unwrap();
    let text = query.to_query_string(&registry);
    assert_eq!(
        text,
        "SELECT COUNT(a), UCOUNT(a), MIN(a), MAX(a), AVG(a), SUM(a), FROM_EPOCHTIME(ts), \
         INTERVAL(ts, 60), WINDOW(ts, 300), SUM(b) AS total"
    );
    let reparsed = SearchQuery::from_query_string(&text, &registry).unwrap();
    assert_eq!(reparsed.to_json(), payload);
}

// ============================================================================
// query string -> tree -> query string
// ============================================================================

#[test]
fn test_query_strings_render_canonically() {
    let registry = Registry::new();
    for text in [
        "SELECT a, b WHERE c = 1 AND d IN (1, 2, 3) ORDER BY e ASC LIMIT 10",
        "SELECT COUNT(host) AS hits, src GROUP BY src HAVING hits > 10 ORDER BY hits DESC",
        "WHERE (a = 1 OR b != 'x') AND NOT EXISTS c",
        "WHERE bytes BETWEEN (10, 20) AND tags CONTAINS_ANY ('a', 'b')",
        "SELECT src GROUP BY PERMUTED src, dst",
        r"WHERE REGEXP_MATCH(path, '^/api/\d+') TIME_RANGE('2024-01-01', '2024-02-01')",
        r#"WHERE [user agent] = "it's""#,
        "WHERE ip CIDR_MATCH '10.0.0.0/8'",
    ] {
        let first = SearchQuery::from_query_string(text, &registry).unwrap();
        assert_eq!(first.to_query_string(&registry), text);
        let second = SearchQuery::from_query_string(&first.to_query_string(&registry), &registry).unwrap();
        assert_eq!(second.to_json(), first.to_json(), "{text}");
    }
}

#[test]
fn test_strings_with_both_quotes_use_blobs() {
    let registry = Registry::new();
    let payload = json!({"where": {"=": [{"source": "a"}, r#"it's "x""#]}});
    let query = SearchQuery::from_json(&payload, &registry).unwrap();
    let text = query.to_query_string(&registry);
    assert_eq!(text, r#"WHERE a = <<<it's "x">>>"#);
    let reparsed = SearchQuery::from_query_string(&text, &registry).unwrap();
    assert_eq!(reparsed.to_json(), payload);

    let payload = json!({"where": {"=": [{"source": "a"}, r#"it's "x">"#]}});
    let query = SearchQuery::from_json(&payload, &registry).unwrap();
    let text = query.to_query_string(&registry);
    assert_eq!(text, r#"WHERE a = 'it\'s "x">'"#);
    let reparsed = SearchQuery::from_query_string(&text, &registry).unwrap();
    assert_eq!(reparsed.to_json(), payload);
}

#[test]
fn test_colon_in_a_default_namespace_id() {
    let registry = Registry::new();
    let payload = json!({"where": {"=": [{"source": "host:port"}, 1]}});
    let query = SearchQuery::from_json(&payload, &registry).unwrap();
    let text = query.to_query_string(&registry);
    assert_eq!(text, "WHERE [default:host:port] = 1");
    let reparsed = SearchQuery::from_query_string(&text, &registry).unwrap();
    assert_eq!(reparsed.to_json(), payload);
}

#[test]
fn test_double_negation_renders_with_parentheses() {
    let registry = Registry::new();
    let payload = json!({"where": {"not": [{"not": [{"=": [{"source": "a"}, 1]}]}]}});
    let query = SearchQuery::from_json(&payload, &registry).unwrap();
    assert_eq!(query.to_query_string(&registry), "WHERE NOT (NOT a = 1)");
}

// ============================================================================
// Malformed JSON
// ============================================================================

#[test]
fn test_json_shape_errors() {
    let registry = Registry::new();
    let cases = [
        (json!({"nope": [1]}), ErrorKind::Json),
        (json!({"=": [{"source": "a"}]}), ErrorKind::Arity),
        (json!({"in": [{"source": "a"}, []]}), ErrorKind::Arity),
        (json!({"between": [{"source": "a"}, "x", 2]}), ErrorKind::Type),
        (json!({"like": [{"source": "a"}, 1]}), ErrorKind::Type),
        (json!({"=": [1, 1]}), ErrorKind::Json),
        (json!({"not": [{"count": [{"source": "a"}]}]}), ErrorKind::Json),
    ];
    for (payload, kind) in cases {
        let error = Operator::from_json(&payload, &registry).unwrap_err();
        assert_eq!(error.kind, kind, "{payload}");
    }
}

#[test]
fn test_clause_json_errors() {
    let registry = Registry::new();
    let cases = [
        (json!({"where": {"count": [{"source": "a"}]}}), ErrorKind::Json),
        (json!({"limit": -1}), ErrorKind::Type),
        (json!({"order_by": [[{"source": "a"}, "up"]]}), ErrorKind::Type),
        (json!({"=": [{"source": "a"}, 1]}), ErrorKind::Json),
        (json!([1, 2]), ErrorKind::Json),
    ];
    for (payload, kind) in cases {
        let error = SearchQuery::from_json(&payload, &registry).unwrap_err();
        assert_eq!(error.kind, kind, "{payload}");
    }
}

#[test]
fn test_catalog_is_complete() {
    assert_eq!(OperatorKind::catalog().count(), 37);
    for meta in OperatorKind::catalog() {
        assert_eq!(OperatorKind::from_json_key(meta.json_key), Some(meta.kind));
    }
}
