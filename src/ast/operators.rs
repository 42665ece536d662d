use serde::Serialize;

/// Every grammar production the compiler knows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OperatorKind {
    // Comparison
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterOrEqual,
    LessOrEqual,
    Contains,
    Like,
    CidrMatch,

    // Set membership
    In,
    Between,
    ContainsAny,
    ContainsAll,

    // Existence
    Exists,
    IsNull,

    // Logical
    And,
    Or,
    Not,

    // Projection
    As,
    Count,
    UniqueCount,
    Min,
    Max,
    Avg,
    Sum,
    FromEpochTime,
    Interval,
    Window,
    RegexpMatch,

    // Clauses
    Select,
    Where,
    GroupBy,
    GroupByPermuted,
    Having,
    OrderBy,
    Limit,
    TimeRange,
}

/// Grammar family; each family has one [`crate::catalog::Production`] implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Family {
    Comparison,
    Membership,
    Existence,
    Logical,
    Projection,
    Clause,
}

/// Immutable description of an operator.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct OperatorMeta {
    pub kind: OperatorKind,
    /// Canonical keyword as written in a query string.
    pub keyword: &'static str,
    pub json_key: &'static str,
    pub family: Family,
    /// Top-level clause (SELECT, WHERE, ...).
    pub clause: bool,
    /// Structural connective (AND, OR).
    pub connective: bool,
    /// Operands written as a parenthesized list after the keyword.
    pub function_call: bool,
    /// Keyword written before its property (EXISTS, ISNULL).
    pub prefix: bool,
    /// Result is a boolean condition usable under WHERE / HAVING.
    pub condition: bool,
    pub aggregate: bool,
    /// Suffix of the default alias (`COUNT(bytes)` -> `bytesCount`).
    pub alias_suffix: Option<&'static str>,
    /// Reduction order inside a phrase; lower reduces first, 0 never reduces in a phrase.
    pub tier: u8,
}

const fn meta(kind: OperatorKind, keyword: &'static str, json_key: &'static str, family: Family) -> OperatorMeta {
    let tier = match family {
        Family::Projection => 1,
        Family::Comparison | Family::Membership => 2,
        Family::Existence => 3,
        Family::Logical | Family::Clause => 0,
    };
    OperatorMeta {
        kind,
        keyword,
        json_key,
        family,
        clause: matches!(family, Family::Clause),
        connective: false,
        function_call: matches!(family, Family::Membership),
        prefix: matches!(family, Family::Existence),
        condition: matches!(
            family,
            Family::Comparison | Family::Membership | Family::Existence | Family::Logical
        ),
        aggregate: false,
        alias_suffix: None,
        tier,
    }
}

const fn function(mut m: OperatorMeta) -> OperatorMeta {
    m.function_call = true;
    m
}

const fn aggregate(m: OperatorMeta, suffix: &'static str) -> OperatorMeta {
    let mut m = function(m);
    m.aggregate = true;
    m.alias_suffix = Some(suffix);
    m
}

const fn connective(mut m: OperatorMeta) -> OperatorMeta {
    m.connective = true;
    m
}

const fn tier(mut m: OperatorMeta, tier: u8) -> OperatorMeta {
    m.tier = tier;
    m
}

const fn condition(mut m: OperatorMeta) -> OperatorMeta {
    m.condition = true;
    m
}

use Family::*;
use OperatorKind as K;

// Indexed by `OperatorKind as usize`; keep in declaration order.
static CATALOG: [OperatorMeta; 37] = [
    meta(K::Equals, "=", "=", Comparison),
    meta(K::NotEquals, "!=", "!=", Comparison),
    meta(K::GreaterThan, ">", ">", Comparison),
    meta(K::LessThan, "<", "<", Comparison),
    meta(K::GreaterOrEqual, ">=", ">=", Comparison),
    meta(K::LessOrEqual, "<=", "<=", Comparison),
    meta(K::Contains, "CONTAINS", "contains", Comparison),
    meta(K::Like, "LIKE", "like", Comparison),
    meta(K::CidrMatch, "CIDR_MATCH", "cidr_match", Comparison),
    meta(K::In, "IN", "in", Membership),
    meta(K::Between, "BETWEEN", "between", Membership),
    meta(K::ContainsAny, "CONTAINS_ANY", "contains_any", Membership),
    meta(K::ContainsAll, "CONTAINS_ALL", "contains_all", Membership),
    meta(K::Exists, "EXISTS", "exists", Existence),
    meta(K::IsNull, "ISNULL", "isnull", Existence),
    connective(meta(K::And, "AND", "and", Logical)),
    connective(meta(K::Or, "OR", "or", Logical)),
    tier(meta(K::Not, "NOT", "not", Logical), 4),
    tier(meta(K::As, "AS", "as", Projection), 5),
    aggregate(meta(K::Count, "COUNT", "count", Projection), "Count"),
    aggregate(meta(K::UniqueCount, "UCOUNT", "ucount", Projection), "UniqueCount"),
    aggregate(meta(K::Min, "MIN", "min", Projection), "Min"),
    aggregate(meta(K::Max, "MAX", "max", Projection), "Max"),
    aggregate(meta(K::Avg, "AVG", "avg", Projection), "Avg"),
    aggregate(meta(K::Sum, "SUM", "sum", Projection), "Sum"),
    function(meta(K::FromEpochTime, "FROM_EPOCHTIME", "from_epochtime", Projection)),
    function(meta(K::Interval, "INTERVAL", "interval", Projection)),
    function(meta(K::Window, "WINDOW", "window", Projection)),
    condition(function(meta(K::RegexpMatch, "REGEXP_MATCH", "regexp_match", Projection))),
    meta(K::Select, "SELECT", "select", Clause),
    meta(K::Where, "WHERE", "where", Clause),
    meta(K::GroupBy, "GROUP BY", "group_by", Clause),
    meta(K::GroupByPermuted, "GROUP BY PERMUTED", "group_by_permuted", Clause),
    meta(K::Having, "HAVING", "having", Clause),
    meta(K::OrderBy, "ORDER BY", "order_by", Clause),
    meta(K::Limit, "LIMIT", "limit", Clause),
    function(meta(K::TimeRange, "TIME_RANGE", "time_range", Clause)),
];

/// Words the tokenizer never treats as a plain property name.
const RESERVED_WORDS: &[&str] = &["GROUP", "BY", "ORDER", "PERMUTED", "ASC", "DESC", "TRUE", "FALSE", "NULL"];

impl OperatorKind {
    pub fn meta(self) -> &'static OperatorMeta {
        &CATALOG[self as usize]
    }

    pub fn keyword(self) -> &'static str {
        self.meta().keyword
    }

    pub fn json_key(self) -> &'static str {
        self.meta().json_key
    }

    pub fn family(self) -> Family {
        self.meta().family
    }

    pub fn is_clause(self) -> bool {
        self.meta().clause
    }

    pub fn is_connective(self) -> bool {
        self.meta().connective
    }

    pub fn is_condition(self) -> bool {
        self.meta().condition
    }

    pub fn is_aggregate(self) -> bool {
        self.meta().aggregate
    }

    /// Operator triggered by a single uppercase token. Multi-word clauses are
    /// assembled by the preprocessor and never match here.
    pub fn from_keyword(word: &str) -> Option<Self> {
        CATALOG
            .iter()
            .find(|m| !m.keyword.contains(' ') && m.keyword == word)
            .map(|m| m.kind)
    }

    pub fn from_json_key(key: &str) -> Option<Self> {
        CATALOG.iter().find(|m| m.json_key == key).map(|m| m.kind)
    }

    /// Every catalog entry, in declaration order.
    pub fn catalog() -> impl Iterator<Item = &'static OperatorMeta> {
        CATALOG.iter()
    }
}

/// True when `word` would not survive tokenizing as a bare property name.
pub fn is_reserved(word: &str) -> bool {
    let upper = word.to_ascii_uppercase();
    OperatorKind::from_keyword(&upper).is_some() || RESERVED_WORDS.contains(&upper.as_str())
}

#[test]
fn test_keyword_lookup() {
    assert_eq!(OperatorKind::from_keyword("CONTAINS_ANY"), Some(OperatorKind::ContainsAny));
    assert_eq!(OperatorKind::from_keyword(">="), Some(OperatorKind::GreaterOrEqual));
    assert_eq!(OperatorKind::from_keyword("GROUP BY"), None);
    assert_eq!(OperatorKind::from_json_key("group_by"), Some(OperatorKind::GroupBy));
    assert!(OperatorKind::Count.meta().function_call);
    assert_eq!(OperatorKind::Not.meta().tier, 4);
}

#[test]
fn test_catalog_is_indexed_by_kind() {
    for (i, m) in CATALOG.iter().enumerate() {
        assert_eq!(m.kind as usize, i, "{} out of order", m.keyword);
    }
}

#[test]
fn test_reserved_words() {
    assert!(is_reserved("count"));
    assert!(is_reserved("Desc"));
    assert!(!is_reserved("bytes"));
}
