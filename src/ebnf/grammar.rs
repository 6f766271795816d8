//! Grammar data model.
//!
//! The model is shared by both ends of the pipeline: the parser builds a raw
//! [`Grammar`] that may still contain EBNF sugar and `$name` macro
//! references, and the converter builds a normalized one containing only
//! `EPS`, terminals, non-terminals and flat sequences/alternations.
//!
//! `terminals` and `non_terminals` are derived caches, never authored:
//! construct grammars through [`make_grammar`] so the sets are recomputed
//! from the rules and bindings they summarize.

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// A literal terminal symbol. Rendered back to source as `"text"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Terminal(pub String);

impl Terminal {
    pub fn new(value: impl Into<String>) -> Self {
        Terminal(value.into())
    }
}

/// A reference to a rule by name. Rendered back to source as `<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NonTerminal(pub String);

impl NonTerminal {
    pub fn new(value: impl Into<String>) -> Self {
        NonTerminal(value.into())
    }
}

/// A macro reference, bound to a terminal in the `names:` section and
/// resolved only during conversion. Rendered back to source as `$name`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Name(pub String);

impl Name {
    pub fn new(value: impl Into<String>) -> Self {
        Name(value.into())
    }
}

/// The closed sum of everything that can appear on a rule's right-hand side.
///
/// `Seq` and `Alt` are n-ary; the [`Expression::seq_of`] and
/// [`Expression::alt_of`] constructors keep them flat and degenerate
/// one-element forms, so a `Seq` directly containing a `Seq` only ever
/// appears when a pass rebuilds one by hand (the converter's repetition
/// unfolding does, and its final pass splices such nests away again).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Expression {
    /// The empty string.
    Eps,
    Terminal(Terminal),
    NonTerminal(NonTerminal),
    Name(Name),
    Optional(Box<Expression>),
    KleeneStar(Box<Expression>),
    Seq(Vec<Expression>),
    Alt(Vec<Expression>),
}

impl Expression {
    pub fn terminal(value: impl Into<String>) -> Self {
        Expression::Terminal(Terminal::new(value))
    }

    pub fn non_terminal(value: impl Into<String>) -> Self {
        Expression::NonTerminal(NonTerminal::new(value))
    }

    pub fn name(value: impl Into<String>) -> Self {
        Expression::Name(Name::new(value))
    }

    pub fn optional(inner: Expression) -> Self {
        Expression::Optional(Box::new(inner))
    }

    pub fn kleene_star(inner: Expression) -> Self {
        Expression::KleeneStar(Box::new(inner))
    }

    /// Builds a concatenation, splicing in the items of any element that is
    /// itself a `Seq`. One item degenerates to that item; zero items is the
    /// empty string.
    pub fn seq_of(items: Vec<Expression>) -> Self {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Expression::Seq(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expression::Eps,
            1 => match flat.pop() {
                Some(sole) => sole,
                None => Expression::Eps,
            },
            _ => Expression::Seq(flat),
        }
    }

    /// Builds an alternation with the same flattening rules as
    /// [`Expression::seq_of`].
    pub fn alt_of(items: Vec<Expression>) -> Self {
        let mut flat = Vec::with_capacity(items.len());
        for item in items {
            match item {
                Expression::Alt(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => Expression::Eps,
            1 => match flat.pop() {
                Some(sole) => sole,
                None => Expression::Eps,
            },
            _ => Expression::Alt(flat),
        }
    }

    /// Every terminal value occurring in this expression.
    pub fn terminals(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        self.collect_terminals(&mut out);
        out
    }

    /// Every non-terminal name referenced by this expression.
    pub fn non_terminals(&self) -> HashSet<String> {
        let mut out = HashSet::new();
        self.collect_non_terminals(&mut out);
        out
    }

    fn collect_terminals(&self, out: &mut HashSet<String>) {
        match self {
            Expression::Eps | Expression::NonTerminal(_) | Expression::Name(_) => {}
            Expression::Terminal(terminal) => {
                out.insert(terminal.0.clone());
            }
            Expression::Optional(inner) | Expression::KleeneStar(inner) => {
                inner.collect_terminals(out);
            }
            Expression::Seq(items) | Expression::Alt(items) => {
                for item in items {
                    item.collect_terminals(out);
                }
            }
        }
    }

    fn collect_non_terminals(&self, out: &mut HashSet<String>) {
        match self {
            Expression::Eps | Expression::Terminal(_) | Expression::Name(_) => {}
            Expression::NonTerminal(non_terminal) => {
                out.insert(non_terminal.0.clone());
            }
            Expression::Optional(inner) | Expression::KleeneStar(inner) => {
                inner.collect_non_terminals(out);
            }
            Expression::Seq(items) | Expression::Alt(items) => {
                for item in items {
                    item.collect_non_terminals(out);
                }
            }
        }
    }
}

/// One production. A non-terminal may be defined by several rules; they are
/// alternative productions for the same symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    pub defined: NonTerminal,
    pub definition: Expression,
}

impl Rule {
    pub fn new(defined: NonTerminal, definition: Expression) -> Self {
        Rule {
            defined,
            definition,
        }
    }
}

/// A `names:` entry binding a macro to a terminal. The meta-grammar only
/// admits terminals on the right-hand side, so the binding is well-formed by
/// construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameBinding {
    pub defined: Name,
    pub definition: Terminal,
}

impl NameBinding {
    pub fn new(defined: Name, definition: Terminal) -> Self {
        NameBinding {
            defined,
            definition,
        }
    }
}

/// A complete grammar: the start symbol, the ordered rule list, the macro
/// table, and the derived terminal/non-terminal sets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grammar {
    pub start: NonTerminal,
    pub terminals: HashSet<String>,
    pub non_terminals: HashSet<String>,
    pub rules: Vec<Rule>,
    pub name_bindings: BTreeMap<String, Terminal>,
}

/// Assembles a [`Grammar`], deriving `terminals` and `non_terminals` from
/// the rules and bindings.
///
/// The terminal set unions every terminal occurring in a rule body with
/// every bound terminal value (bound terminals count even when no rule
/// references their macro). The non-terminal set unions every referenced
/// non-terminal with every defined one and with the start symbol. Duplicate
/// bindings for one name resolve last-wins.
pub fn make_grammar(start: NonTerminal, rules: Vec<Rule>, bindings: Vec<NameBinding>) -> Grammar {
    let name_bindings: BTreeMap<String, Terminal> = bindings
        .into_iter()
        .map(|binding| (binding.defined.0, binding.definition))
        .collect();

    let mut terminals = HashSet::new();
    let mut non_terminals = HashSet::new();
    for rule in &rules {
        rule.definition.collect_terminals(&mut terminals);
        rule.definition.collect_non_terminals(&mut non_terminals);
        non_terminals.insert(rule.defined.0.clone());
    }
    terminals.extend(name_bindings.values().map(|terminal| terminal.0.clone()));
    non_terminals.insert(start.0.clone());

    Grammar {
        start,
        terminals,
        non_terminals,
        rules,
        name_bindings,
    }
}

impl fmt::Display for Terminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

impl fmt::Display for NonTerminal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<{}>", self.0)
    }
}

impl fmt::Display for Name {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Eps => write!(f, "EPS"),
            Expression::Terminal(terminal) => write!(f, "{}", terminal),
            Expression::NonTerminal(non_terminal) => write!(f, "{}", non_terminal),
            Expression::Name(name) => write!(f, "{}", name),
            Expression::Optional(inner) => write!(f, "[{}]", inner),
            Expression::KleeneStar(inner) => write!(f, "{{{}}}", inner),
            Expression::Seq(items) => {
                write!(f, "(")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
            Expression::Alt(items) => {
                write!(f, "(")?;
                for (index, item) in items.iter().enumerate() {
                    if index > 0 {
                        write!(f, " | ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, ")")
            }
        }
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} := {};", self.defined, self.definition)
    }
}

impl fmt::Display for NameBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} := {};", self.defined, self.definition)
    }
}

/// Renders the grammar in the surface syntax it was parsed from. The
/// `names:` header is always present, even with no bindings; bindings print
/// in name order; every statement is indented by two spaces, which is
/// exactly the bind-begin marker the strict parser configuration expects.
impl fmt::Display for Grammar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "start:")?;
        writeln!(f, "  {};", self.start)?;
        writeln!(f, "names:")?;
        for (name, terminal) in &self.name_bindings {
            writeln!(f, "  ${} := {};", name, terminal)?;
        }
        writeln!(f, "rules:")?;
        for rule in &self.rules {
            writeln!(f, "  {}", rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_of_flattens_nested_sequences() {
        let inner = Expression::Seq(vec![Expression::terminal("b"), Expression::terminal("c")]);
        let seq = Expression::seq_of(vec![Expression::terminal("a"), inner]);
        assert_eq!(
            seq,
            Expression::Seq(vec![
                Expression::terminal("a"),
                Expression::terminal("b"),
                Expression::terminal("c"),
            ])
        );
    }

    #[test]
    fn test_seq_of_one_element_degenerates() {
        let seq = Expression::seq_of(vec![Expression::terminal("a")]);
        assert_eq!(seq, Expression::terminal("a"));
    }

    #[test]
    fn test_seq_of_empty_is_eps() {
        assert_eq!(Expression::seq_of(Vec::new()), Expression::Eps);
    }

    #[test]
    fn test_alt_of_flattens_nested_alternations() {
        let inner = Expression::Alt(vec![Expression::terminal("a"), Expression::terminal("b")]);
        let alt = Expression::alt_of(vec![inner, Expression::terminal("c")]);
        assert_eq!(
            alt,
            Expression::Alt(vec![
                Expression::terminal("a"),
                Expression::terminal("b"),
                Expression::terminal("c"),
            ])
        );
    }

    #[test]
    fn test_alt_keeps_sequence_elements_intact() {
        let seq = Expression::seq_of(vec![Expression::terminal("a"), Expression::terminal("b")]);
        let alt = Expression::alt_of(vec![seq.clone(), Expression::Eps]);
        assert_eq!(alt, Expression::Alt(vec![seq, Expression::Eps]));
    }

    #[test]
    fn test_collectors_walk_every_variant() {
        let expr = Expression::alt_of(vec![
            Expression::seq_of(vec![
                Expression::terminal("("),
                Expression::non_terminal("S"),
                Expression::terminal(")"),
            ]),
            Expression::optional(Expression::non_terminal("N")),
            Expression::kleene_star(Expression::terminal("x")),
            Expression::name("digit"),
            Expression::Eps,
        ]);
        let terminals = expr.terminals();
        let non_terminals = expr.non_terminals();
        assert_eq!(
            terminals,
            ["(", ")", "x"].iter().map(|s| s.to_string()).collect()
        );
        assert_eq!(
            non_terminals,
            ["S", "N"].iter().map(|s| s.to_string()).collect()
        );
    }

    #[test]
    fn test_make_grammar_derives_sets() {
        let rules = vec![
            Rule::new(
                NonTerminal::new("S"),
                Expression::seq_of(vec![
                    Expression::terminal("a"),
                    Expression::non_terminal("N"),
                ]),
            ),
            Rule::new(NonTerminal::new("N"), Expression::name("digit")),
        ];
        let bindings = vec![NameBinding::new(Name::new("digit"), Terminal::new("0"))];
        let grammar = make_grammar(NonTerminal::new("S"), rules, bindings);

        // Bound terminals count even though no rule mentions "0" literally.
        assert_eq!(
            grammar.terminals,
            ["a", "0"].iter().map(|s| s.to_string()).collect()
        );
        assert_eq!(
            grammar.non_terminals,
            ["S", "N"].iter().map(|s| s.to_string()).collect()
        );
        assert_eq!(
            grammar.name_bindings.get("digit"),
            Some(&Terminal::new("0"))
        );
    }

    #[test]
    fn test_make_grammar_includes_start_without_rules() {
        let grammar = make_grammar(NonTerminal::new("S"), Vec::new(), Vec::new());
        assert!(grammar.non_terminals.contains("S"));
        assert!(grammar.terminals.is_empty());
    }

    #[test]
    fn test_duplicate_bindings_resolve_last_wins() {
        let bindings = vec![
            NameBinding::new(Name::new("d"), Terminal::new("0")),
            NameBinding::new(Name::new("d"), Terminal::new("1")),
        ];
        let grammar = make_grammar(NonTerminal::new("S"), Vec::new(), bindings);
        assert_eq!(grammar.name_bindings.get("d"), Some(&Terminal::new("1")));
    }

    #[test]
    fn test_show_atoms() {
        assert_eq!(Expression::Eps.to_string(), "EPS");
        assert_eq!(Expression::terminal("a").to_string(), "\"a\"");
        assert_eq!(Expression::non_terminal("S").to_string(), "<S>");
        assert_eq!(Expression::name("digit").to_string(), "$digit");
    }

    #[test]
    fn test_show_composites() {
        let expr = Expression::alt_of(vec![
            Expression::seq_of(vec![
                Expression::terminal("a"),
                Expression::optional(Expression::non_terminal("S")),
            ]),
            Expression::kleene_star(Expression::terminal("x")),
        ]);
        assert_eq!(expr.to_string(), "((\"a\" [<S>]) | {\"x\"})");
    }

    #[test]
    fn test_show_grammar_sections() {
        let rules = vec![Rule::new(
            NonTerminal::new("S"),
            Expression::alt_of(vec![Expression::terminal("a"), Expression::Eps]),
        )];
        let bindings = vec![NameBinding::new(Name::new("digit"), Terminal::new("0"))];
        let grammar = make_grammar(NonTerminal::new("S"), rules, bindings);
        assert_eq!(
            grammar.to_string(),
            "start:\n  <S>;\nnames:\n  $digit := \"0\";\nrules:\n  <S> := (\"a\" | EPS);\n"
        );
    }

    #[test]
    fn test_show_grammar_empty_names_section() {
        let grammar = make_grammar(
            NonTerminal::new("S"),
            vec![Rule::new(NonTerminal::new("S"), Expression::Eps)],
            Vec::new(),
        );
        assert_eq!(
            grammar.to_string(),
            "start:\n  <S>;\nnames:\nrules:\n  <S> := EPS;\n"
        );
    }
}
