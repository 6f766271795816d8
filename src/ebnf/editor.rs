//! Editor integration helpers.
//!
//! Pure string functions backing completion and the "simplify selected
//! expression" command. [`suggest`] filters the fixed completion set by
//! prefix. [`simplify`] rewrites CFG-notation rule lines: within each
//! bracket-free span it deduplicates alternatives and factors a shared
//! first symbol into `sym (rest | rest)` or a shared last symbol into
//! `(pre | pre) sym`, then blanks parenthesis pairs left without a
//! top-level alternation, iterating per line until nothing changes.
//!
//! The functions work on plain strings, not the grammar model: they are
//! meant for text a person is still editing, which may not parse at all.

use std::collections::{HashMap, HashSet};

use once_cell::sync::Lazy;
use regex::Regex;

/// The completion set, in suggestion order.
const COMPLETIONS: [&str; 4] = ["start:", "names:", "rules:", "EPS"];

/// A rule head: optional indentation, a non-terminal, `:=`.
static RULE_HEAD: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*<\S*>\s*:=\s*").unwrap());

static LEADING_PIPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*\|").unwrap());

/// How many merge/unbracket rounds one line may take before the loop is
/// cut; real inputs settle within a handful.
const MAX_ROUNDS: usize = 32;

/// Case-insensitive prefix matches against the completion set.
pub fn suggest(prefix: &str) -> Vec<&'static str> {
    let prefix = prefix.to_lowercase();
    COMPLETIONS
        .iter()
        .copied()
        .filter(|completion| completion.to_lowercase().starts_with(&prefix))
        .collect()
}

/// Simplifies a CFG-notation snippet line by line. Lines without a rule
/// head pass through unchanged.
pub fn simplify(text: &str) -> String {
    text.split('\n')
        .map(simplify_line)
        .collect::<Vec<String>>()
        .join("\n")
}

fn simplify_line(line: &str) -> String {
    let head_end = match RULE_HEAD.find(line) {
        Some(head) => head.end(),
        None => return line.to_owned(),
    };
    let (head, body) = line.split_at(head_end);

    let mut old = body.to_owned();
    let mut current = transform_segments(&old);
    let mut rounds = 0;
    while current != old && rounds < MAX_ROUNDS {
        old = current;
        current = remove_brackets(&transform_segments(&old));
        rounds += 1;
    }
    format!("{}{}", head, current)
}

/// Runs the alternative merge over each maximal bracket-free span,
/// passing bracket characters through untouched.
fn transform_segments(expr: &str) -> String {
    let mut result = String::new();
    let mut in_quotes = false;
    let mut previous: Option<char> = None;
    let mut segment_start = 0;
    for (i, c) in expr.char_indices() {
        if c == '"' && previous != Some('\\') {
            in_quotes = !in_quotes;
        }
        if !in_quotes && matches!(c, '(' | '[' | '{' | '}' | ']' | ')') {
            result.push_str(&merge_alternatives(&expr[segment_start..i]));
            result.push(c);
            segment_start = i + c.len_utf8();
        }
        previous = Some(c);
    }
    result.push_str(&merge_alternatives(&expr[segment_start..]));
    result
}

/// Merges one bracket-free span: deduplicates alternatives keeping first
/// occurrence, factors alternatives sharing a first symbol into
/// `sym (rest | rest)`, and alternatives alone on their first symbol but
/// sharing a last symbol into `(pre | pre) sym`. Whitespace inside the
/// span is normalized to single spaces.
fn merge_alternatives(expr: &str) -> String {
    let mut result = String::new();
    if LEADING_PIPE.is_match(expr) {
        result.push_str(" | ");
    }
    let parts = match split_top_level(expr, '|') {
        Some(parts) => parts,
        None => return expr.to_owned(),
    };

    let mut alternatives: Vec<Vec<String>> = Vec::new();
    for part in parts {
        let symbols: Vec<String> = part.split_whitespace().map(str::to_owned).collect();
        if !alternatives.contains(&symbols) {
            alternatives.push(symbols);
        }
    }

    let mut first_order: Vec<String> = Vec::new();
    let mut first_groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, symbols) in alternatives.iter().enumerate() {
        let first = match symbols.first() {
            Some(first) => first.clone(),
            None => continue,
        };
        if !first_groups.contains_key(&first) {
            first_order.push(first.clone());
        }
        first_groups.entry(first).or_default().push(index);
    }

    // Last-symbol groups admit only alternatives that are alone on their
    // first symbol; the others are already claimed by a prefix merge.
    let mut last_groups: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, symbols) in alternatives.iter().enumerate() {
        let (first, last) = match (symbols.first(), symbols.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => continue,
        };
        if first_groups.get(first).map(Vec::len) == Some(1) {
            last_groups.entry(last.clone()).or_default().push(index);
        }
    }

    let mut compressed: HashSet<String> = HashSet::new();
    for first in &first_order {
        let group = match first_groups.get(first) {
            Some(group) => group,
            None => continue,
        };
        if group.len() == 1 {
            if compressed.contains(first) {
                continue;
            }
            let symbols = &alternatives[group[0]];
            let last = match symbols.last() {
                Some(last) => last,
                None => continue,
            };
            let suffix_group: &[usize] = match last_groups.get(last) {
                Some(group) => group,
                None => &[],
            };
            if suffix_group.len() == 1 {
                result.push_str(&symbols.join(" "));
                result.push_str(" | ");
            } else {
                result.push('(');
                for &index in suffix_group {
                    let member = &alternatives[index];
                    result.push_str(&member[..member.len() - 1].join(" "));
                    result.push_str(" | ");
                    if let Some(member_first) = member.first() {
                        compressed.insert(member_first.clone());
                    }
                }
                truncate_separator(&mut result);
                result.push_str(") ");
                result.push_str(last);
                result.push_str(" | ");
            }
        } else {
            result.push_str(first);
            result.push_str(" (");
            for &index in group {
                let member = &alternatives[index];
                result.push_str(&member[1..].join(" "));
                result.push_str(" | ");
            }
            truncate_separator(&mut result);
            result.push_str(") | ");
        }
    }

    if result != " | " {
        truncate_separator(&mut result);
    }
    result
}

/// Blanks parenthesis pairs whose content has no top-level alternation.
/// Square and curly brackets keep their grouping meaning and are left
/// alone. An unmatched closing parenthesis opts the whole string out.
fn remove_brackets(string: &str) -> String {
    let mut result = string.as_bytes().to_vec();
    let mut stack: Vec<usize> = Vec::new();
    let mut in_quotes = false;
    let mut previous: Option<char> = None;
    for (i, c) in string.char_indices() {
        if !in_quotes && c == '(' {
            stack.push(i);
        }
        if !in_quotes && c == ')' {
            match stack.pop() {
                Some(open) => {
                    if can_remove_brackets(&string[open + 1..i]) {
                        result[open] = b' ';
                        result[i] = b' ';
                    }
                }
                None => return string.to_owned(),
            }
        }
        if c == '"' && previous != Some('\\') {
            in_quotes = !in_quotes;
        }
        previous = Some(c);
    }
    String::from_utf8(result).unwrap_or_else(|_| string.to_owned())
}

fn can_remove_brackets(content: &str) -> bool {
    match split_top_level(content, '|') {
        Some(parts) => parts.len() == 1,
        None => false,
    }
}

/// Splits on `separator` occurrences at bracket depth zero outside
/// quotes. `None` means the brackets do not balance and the caller
/// should leave the string alone.
fn split_top_level(string: &str, separator: char) -> Option<Vec<String>> {
    let mut stack: Vec<char> = Vec::new();
    let mut in_quotes = false;
    let mut previous: Option<char> = None;
    let mut parts = Vec::new();
    let mut last = 0;
    for (i, c) in string.char_indices() {
        if !in_quotes && matches!(c, '(' | '[' | '{') {
            stack.push(c);
        }
        if !in_quotes && matches!(c, ')' | ']' | '}') {
            match stack.last() {
                Some(&open) if open == opener_of(c) => {
                    stack.pop();
                }
                _ => return None,
            }
        }
        if c == '"' && previous != Some('\\') {
            in_quotes = !in_quotes;
        }
        if c == separator && !in_quotes && stack.is_empty() {
            parts.push(string[last..i].to_owned());
            last = i + c.len_utf8();
        }
        previous = Some(c);
    }
    parts.push(string[last..].to_owned());
    Some(parts)
}

fn opener_of(closer: char) -> char {
    match closer {
        ')' => '(',
        ']' => '[',
        _ => '{',
    }
}

fn truncate_separator(out: &mut String) {
    if out.ends_with(" | ") {
        out.truncate(out.len() - 3);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suggest_filters_by_prefix() {
        assert_eq!(suggest(""), vec!["start:", "names:", "rules:", "EPS"]);
        assert_eq!(suggest("s"), vec!["start:"]);
        assert_eq!(suggest("S"), vec!["start:"]);
        assert_eq!(suggest("eP"), vec!["EPS"]);
        assert_eq!(suggest("rules:"), vec!["rules:"]);
        assert!(suggest("x").is_empty());
        assert!(suggest("start:x").is_empty());
    }

    #[test]
    fn test_split_top_level() {
        assert_eq!(
            split_top_level("a | (b | c)", '|'),
            Some(vec!["a ".to_owned(), " (b | c)".to_owned()])
        );
        assert_eq!(
            split_top_level("\"a|b\"", '|'),
            Some(vec!["\"a|b\"".to_owned()])
        );
        assert_eq!(split_top_level("a)", '|'), None);
        assert_eq!(split_top_level("(a]", '|'), None);
    }

    #[test]
    fn test_merges_common_first_symbol() {
        assert_eq!(simplify("<A> := a b | a c"), "<A> := a(b | c)");
    }

    #[test]
    fn test_merges_common_last_symbol() {
        assert_eq!(simplify("<A> := x z | y z"), "<A> := (x | y)z");
    }

    #[test]
    fn test_removes_duplicate_alternatives() {
        assert_eq!(simplify("<A> := a | b | a"), "<A> := a | b");
    }

    #[test]
    fn test_removes_redundant_parentheses() {
        assert_eq!(simplify("<A> := (a) b"), "<A> := a b");
        // A pair still guarding an alternation stays.
        assert_eq!(simplify("<A> := (a | b) c"), "<A> := (a | b)c");
    }

    #[test]
    fn test_quoted_pipes_are_opaque() {
        assert_eq!(
            simplify("<A> := \"|\" a | \"|\" b"),
            "<A> := \"|\"(a | b)"
        );
    }

    #[test]
    fn test_lines_without_a_head_pass_through() {
        assert_eq!(simplify("just text"), "just text");
        assert_eq!(simplify("start:"), "start:");
        assert_eq!(simplify("<A> := "), "<A> := ");
    }

    #[test]
    fn test_unbalanced_bodies_are_left_alone() {
        assert_eq!(simplify("<A> := a) | b"), "<A> := a) | b");
    }

    #[test]
    fn test_works_line_by_line() {
        let text = "<A> := a b | a c\n<B> := x z | y z";
        assert_eq!(simplify(text), "<A> := a(b | c)\n<B> := (x | y)z");
    }

    #[test]
    fn test_simplify_is_idempotent_at_the_fixed_point() {
        let cases = [
            "<A> := a b | a c",
            "<A> := x z | y z",
            "<A> := (a) b",
            "<A> := a | b | a",
            "<S> := \"(\" <S> \")\" <S> | EPS",
        ];
        for case in cases {
            let once = simplify(case);
            assert_eq!(simplify(&once), once, "{}", case);
        }
    }
}
