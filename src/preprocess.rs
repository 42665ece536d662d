use tracing::debug;

use crate::{
    ast::{ExpressionMap, OperatorKind, Span, TokenArena, TokenId, TokenKind},
    lexer::Lexed,
};

/// Multi-word keywords, longest first so a right-to-left walk sees the
/// triple before either of its pairs.
const MERGES: &[(&[&str], OperatorKind)] = &[
    (&["GROUP", "BY", "PERMUTED"], OperatorKind::GroupByPermuted),
    (&["GROUP", "BY"], OperatorKind::GroupBy),
    (&["ORDER", "BY"], OperatorKind::OrderBy),
];

/// Merge multi-word keywords, then wire parent, index and block of every token.
///
/// Runs once over the whole tree; no fixed point is needed.
pub fn preprocess(lexed: &mut Lexed) {
    let top = lexed.tokens.top().to_vec();
    let top = merge_tree(&mut lexed.tokens, &mut lexed.map, top);
    link(&mut lexed.tokens, None, &top);
    lexed.tokens.set_top(top);
    assign_blocks(&mut lexed.tokens, lexed.map.len());
    debug!(top_level = lexed.tokens.top().len(), "preprocessed token tree");
}

fn merge_tree(tokens: &mut TokenArena, map: &mut ExpressionMap, seq: Vec<TokenId>) -> Vec<TokenId> {
    let seq = merge_sequence(tokens, map, seq);
    for &id in &seq {
        let children = std::mem::take(&mut tokens.get_mut(id).children);
        let children = merge_tree(tokens, map, children);
        tokens.get_mut(id).children = children;
    }
    seq
}

fn merge_sequence(tokens: &mut TokenArena, map: &mut ExpressionMap, mut seq: Vec<TokenId>) -> Vec<TokenId> {
    let mut i = seq.len();
    while i > 0 {
        i -= 1;
        let found = MERGES.iter().find(|(words, _)| {
            words.len() <= i + 1
                && words
                    .iter()
                    .zip(&seq[i + 1 - words.len()..=i])
                    .all(|(word, id)| tokens.get(*id).is_word(word))
        });
        let Some((words, kind)) = found else {
            continue;
        };

        let first = i + 1 - words.len();
        let end = tokens.get(seq[i]).span.end;
        for &absorbed in &seq[first + 1..=i] {
            map.retarget(absorbed, seq[first]);
        }
        let head = tokens.get_mut(seq[first]);
        head.text = kind.keyword().to_string();
        head.rule = Some(*kind);
        head.span = Span::new(head.span.start, end);
        seq.drain(first + 1..=i);
        i = first;
    }
    seq
}

fn link(tokens: &mut TokenArena, parent: Option<TokenId>, seq: &[TokenId]) {
    for (index, &id) in seq.iter().enumerate() {
        let token = tokens.get_mut(id);
        token.parent = parent;
        token.index = index;
        let children = token.children.clone();
        link(tokens, Some(id), &children);
    }
}

/// A block runs from one top-level clause keyword to the next.
fn assign_blocks(tokens: &mut TokenArena, source_len: usize) {
    let top = tokens.top().to_vec();
    let starts: Vec<usize> = top
        .iter()
        .enumerate()
        .filter(|(i, id)| {
            *i == 0 || {
                let t = tokens.get(**id);
                t.kind == TokenKind::Word && t.rule.is_some_and(OperatorKind::is_clause)
            }
        })
        .map(|(i, _)| i)
        .collect();

    for (n, &first) in starts.iter().enumerate() {
        let start = if n == 0 { 0 } else { tokens.get(top[first]).span.start };
        let end = match starts.get(n + 1) {
            Some(&next) => tokens.get(top[next]).span.start,
            None => source_len,
        };
        let last = starts.get(n + 1).copied().unwrap_or(top.len());
        for &id in &top[first..last] {
            tokens.get_mut(id).block = Span::new(start, end);
        }
    }

    let blocks: Vec<(TokenId, Span)> = tokens
        .iter()
        .filter(|(_, t)| t.parent.is_some())
        .map(|(id, _)| (id, tokens.get(tokens.root_of(id)).block))
        .collect();
    for (id, block) in blocks {
        tokens.get_mut(id).block = block;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn lex(input: &str) -> Lexed {
        let mut lexed = Lexer::new(input).tokenize().unwrap();
        preprocess(&mut lexed);
        lexed
    }

    #[test]
    fn merges_keyword_runs() {
        let lexed = lex("SELECT a GROUP BY PERMUTED a, b order by a ASC");
        let texts: Vec<&str> = lexed.tokens.top().iter().map(|id| lexed.tokens.get(*id).text.as_str()).collect();
        assert_eq!(texts, vec!["SELECT", "a", "GROUP BY PERMUTED", "a", ",", "b", "ORDER BY", "a", "ASC"]);
        let group = lexed.tokens.get(lexed.tokens.top()[2]);
        assert_eq!(group.rule, Some(OperatorKind::GroupByPermuted));
        assert_eq!(group.span, Span::new(9, 26));
    }

    #[test]
    fn links_children_to_parent() {
        let lexed = lex("WHERE a IN (1, 2)");
        let in_id = lexed.tokens.top()[2];
        let children = lexed.tokens.get(in_id).children.clone();
        assert_eq!(children.len(), 3);
        for (i, child) in children.iter().enumerate() {
            assert_eq!(lexed.tokens.get(*child).parent, Some(in_id));
            assert_eq!(lexed.tokens.get(*child).index, i);
        }
        assert_eq!(lexed.tokens.siblings(children[1]).len(), 3);
    }

    #[test]
    fn blocks_follow_clauses() {
        let lexed = lex("SELECT a WHERE b = 1");
        let where_id = lexed.tokens.top()[2];
        assert_eq!(lexed.tokens.get(lexed.tokens.top()[1]).block, Span::new(0, 9));
        assert_eq!(lexed.tokens.get(where_id).block, Span::new(9, 20));
    }
}
