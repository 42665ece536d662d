//! Operator catalog listing for the saql CLI

use std::fmt::Write;

use crate::ast::{Family, OperatorKind, OperatorMeta};

const FAMILIES: [(Family, &str); 6] = [
    (Family::Clause, "CLAUSES"),
    (Family::Logical, "LOGICAL"),
    (Family::Comparison, "COMPARISON"),
    (Family::Membership, "MEMBERSHIP"),
    (Family::Existence, "EXISTENCE"),
    (Family::Projection, "PROJECTION"),
];

fn usage(meta: &OperatorMeta) -> String {
    let kw = meta.keyword;
    match meta.family {
        Family::Clause if meta.kind == OperatorKind::TimeRange => format!("{kw}(start, end)"),
        Family::Clause => format!("{kw} ..."),
        Family::Logical if meta.connective => format!("cond {kw} cond"),
        Family::Logical => format!("{kw} cond"),
        Family::Comparison => format!("prop {kw} value"),
        Family::Membership => format!("prop {kw} (value, ...)"),
        Family::Existence => format!("{kw} prop"),
        Family::Projection if meta.kind == OperatorKind::As => format!("expr {kw} name"),
        Family::Projection => format!("{kw}(prop, ...)"),
    }
}

/// Every operator grouped by family with its query-string shape and JSON key.
pub fn operators_overview() -> String {
    let mut out = String::from("SAQL OPERATORS\n");
    for (family, title) in FAMILIES {
        let _ = write!(out, "\n{title}\n\n");
        for meta in OperatorKind::catalog().filter(|m| m.family == family) {
            let mut line = format!("  {:<34} {}", usage(meta), meta.json_key);
            if let Some(suffix) = meta.alias_suffix {
                let _ = write!(line, "  (alias <prop>{suffix})");
            }
            out.push_str(line.trim_end());
            out.push('\n');
        }
    }
    out
}
