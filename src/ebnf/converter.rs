//! EBNF to CFG normalization.
//!
//! Three passes over a parsed grammar:
//!
//! 1. *Sugar elimination*: a work-list over the rule list. Optionals,
//!    repetitions and alternations are replaced by references to fresh
//!    non-terminals whose auxiliary rules are appended to the list and
//!    processed in turn; `$name` macros are inlined to their bound
//!    terminals. After this pass every right-hand side is an atom or a
//!    flat sequence of atoms.
//! 2. *Chain-rule elimination*: rules are grouped into alternative sets
//!    per symbol; a symbol whose whole set is one bare reference to
//!    another defined symbol takes over that symbol's closed set. The
//!    closure marks a symbol before recursing, so cycles of pure chain
//!    rules terminate with a truncated set and a [`ConvertWarning`].
//! 3. *Flatten and prune*: nested sequences are spliced flat, each
//!    symbol's alternatives collapse into one rule, and defined symbols
//!    that are neither the start symbol nor referenced by any surviving
//!    right-hand side are dropped.
//!
//! The converter never mutates its input; it assembles a new [`Grammar`]
//! through `make_grammar`.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;

use rand::Rng;

use crate::ebnf::grammar::{make_grammar, Expression, Grammar, NonTerminal, Rule, Terminal};

/// Fresh-name strategy for non-terminals introduced during conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NamingMode {
    /// Deterministic names composed from the eliminated construct's shape:
    /// atoms contribute their bare text, `opt` and `rep` tag optionals and
    /// repetitions, sequence and alternation members concatenate. Collisions
    /// are resolved by appending `'` until the name is unused.
    #[default]
    Symbolic,
    /// Short random uppercase names, lengthened until unused and memoized
    /// per expression shape, so structurally identical sub-expressions share
    /// one fresh symbol within a run.
    Readable,
}

/// Fatal conversion failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertError {
    /// A `$name` reference with no binding in the macro table.
    UnboundName { name: String },
}

impl fmt::Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertError::UnboundName { name } => {
                write!(f, "Conversion error: Unbound name ${}", name)
            }
        }
    }
}

impl std::error::Error for ConvertError {}

/// Non-fatal conversion diagnostic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConvertWarning {
    /// `symbol`'s only production chained into `target`, which leads back
    /// to `symbol`; the cycle was cut and `symbol` kept whatever had been
    /// accumulated at that point (nothing, for a pure cycle).
    ChainCycle { symbol: String, target: String },
}

impl fmt::Display for ConvertWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConvertWarning::ChainCycle { symbol, target } => {
                write!(
                    f,
                    "Chain rule cycle: <{}> resolves through <{}>, productions truncated",
                    symbol, target
                )
            }
        }
    }
}

/// A converted grammar together with the warnings the run produced.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertOutput {
    pub grammar: Grammar,
    pub warnings: Vec<ConvertWarning>,
}

/// Converts `grammar` to pure CFG form, discarding warnings. Use
/// [`Converter::run`] when the warnings matter.
pub fn convert(grammar: &Grammar, naming: NamingMode) -> Result<Grammar, ConvertError> {
    Converter::new(grammar, naming)
        .run()
        .map(|output| output.grammar)
}

/// One conversion run. Owns the growing rule list and the live
/// non-terminal name set; nothing is shared between runs.
pub struct Converter {
    start: NonTerminal,
    rules: Vec<Rule>,
    macros: BTreeMap<String, Terminal>,
    non_terminals: HashSet<String>,
    naming: NamingMode,
    readable_names: HashMap<Expression, String>,
    warnings: Vec<ConvertWarning>,
}

impl Converter {
    pub fn new(grammar: &Grammar, naming: NamingMode) -> Self {
        Converter {
            start: grammar.start.clone(),
            rules: grammar.rules.clone(),
            macros: grammar.name_bindings.clone(),
            non_terminals: grammar.non_terminals.clone(),
            naming,
            readable_names: HashMap::new(),
            warnings: Vec::new(),
        }
    }

    pub fn run(mut self) -> Result<ConvertOutput, ConvertError> {
        let rules = std::mem::take(&mut self.rules);
        let rules = self.eliminate_sugar(rules)?;
        let groups = group_rules(rules);

        let mut resolved = HashMap::new();
        for symbol in &groups.order {
            self.underlying(symbol, &groups, &mut resolved);
        }

        let rules = self.collect_rules(&groups.order, &mut resolved);
        Ok(ConvertOutput {
            grammar: make_grammar(self.start, rules, Vec::new()),
            warnings: self.warnings,
        })
    }

    /// Pass 1. Processes rules by index; the list grows as rewrites emit
    /// auxiliary rules, and the appended rules are processed in turn.
    fn eliminate_sugar(&mut self, mut rules: Vec<Rule>) -> Result<Vec<Rule>, ConvertError> {
        let mut index = 0;
        while index < rules.len() {
            let definition = rules[index].definition.clone();
            // Uniform top level: anything that is not a sequence or an
            // alternation is treated as a one-element sequence.
            let definition = match definition {
                Expression::Seq(_) | Expression::Alt(_) => definition,
                other => Expression::Seq(vec![other]),
            };
            let (converted, mut emitted) = self.convert_expression(definition)?;
            rules[index].definition = converted;
            rules.append(&mut emitted);
            index += 1;
        }
        Ok(rules)
    }

    /// Rewrites one expression into sugar-free form, returning the result
    /// together with the auxiliary rules the rewrite emitted, in order.
    fn convert_expression(
        &mut self,
        expression: Expression,
    ) -> Result<(Expression, Vec<Rule>), ConvertError> {
        match expression {
            Expression::Eps => Ok((Expression::Eps, Vec::new())),
            Expression::Terminal(terminal) => Ok((Expression::Terminal(terminal), Vec::new())),
            Expression::NonTerminal(non_terminal) => {
                Ok((Expression::NonTerminal(non_terminal), Vec::new()))
            }
            Expression::Name(name) => match self.macros.get(&name.0) {
                Some(terminal) => Ok((Expression::Terminal(terminal.clone()), Vec::new())),
                None => Err(ConvertError::UnboundName { name: name.0 }),
            },
            Expression::Optional(inner) => {
                let fresh = self.fresh_non_terminal(&Expression::Optional(inner.clone()));
                let emitted = vec![
                    Rule::new(fresh.clone(), *inner),
                    Rule::new(fresh.clone(), Expression::Eps),
                ];
                Ok((Expression::NonTerminal(fresh), emitted))
            }
            Expression::KleeneStar(inner) => {
                let fresh = self.fresh_non_terminal(&Expression::KleeneStar(inner.clone()));
                // Left-recursive unfolding: N matches zero or more inners.
                let unfolding = Expression::seq_of(vec![
                    Expression::NonTerminal(fresh.clone()),
                    *inner,
                ]);
                let emitted = vec![
                    Rule::new(fresh.clone(), unfolding),
                    Rule::new(fresh.clone(), Expression::Eps),
                ];
                Ok((Expression::NonTerminal(fresh), emitted))
            }
            Expression::Alt(items) => {
                let fresh = self.fresh_non_terminal(&Expression::Alt(items.clone()));
                let mut emitted = Vec::new();
                for item in items {
                    let (converted, mut nested) = self.convert_expression(item)?;
                    emitted.push(Rule::new(fresh.clone(), converted));
                    emitted.append(&mut nested);
                }
                Ok((Expression::NonTerminal(fresh), emitted))
            }
            Expression::Seq(mut items) => {
                if items.len() == 1 {
                    // A one-element sequence degenerates to its element.
                    return match items.pop() {
                        Some(sole) => self.convert_expression(sole),
                        None => Ok((Expression::Eps, Vec::new())),
                    };
                }
                let mut converted_items = Vec::with_capacity(items.len());
                let mut emitted = Vec::new();
                for item in items {
                    let (converted, mut nested) = self.convert_expression(item)?;
                    converted_items.push(converted);
                    emitted.append(&mut nested);
                }
                Ok((Expression::seq_of(converted_items), emitted))
            }
        }
    }

    /// Produces a name outside the live non-terminal set and inserts it
    /// immediately, so later lookups see it.
    fn fresh_non_terminal(&mut self, shape: &Expression) -> NonTerminal {
        let name = match self.naming {
            NamingMode::Symbolic => {
                let mut candidate = compose_name(shape);
                while self.non_terminals.contains(&candidate) {
                    candidate.push('\'');
                }
                candidate
            }
            NamingMode::Readable => self.readable_name(shape),
        };
        self.non_terminals.insert(name.clone());
        NonTerminal::new(name)
    }

    fn readable_name(&mut self, shape: &Expression) -> String {
        if let Some(existing) = self.readable_names.get(shape) {
            return existing.clone();
        }
        let mut rng = rand::thread_rng();
        let mut candidate = String::from(random_letter(&mut rng));
        while self.non_terminals.contains(&candidate) {
            candidate.push(random_letter(&mut rng));
        }
        self.readable_names.insert(shape.clone(), candidate.clone());
        candidate
    }

    /// Pass 2 closure. A symbol whose whole alternative set is one bare
    /// reference to another defined symbol takes over that symbol's closed
    /// set; anything else keeps its set as-is. The symbol is marked in
    /// `resolved` before recursing, so chain cycles terminate.
    fn underlying(
        &mut self,
        symbol: &str,
        groups: &RuleGroups,
        resolved: &mut HashMap<String, Vec<Expression>>,
    ) -> Vec<Expression> {
        if let Some(existing) = resolved.get(symbol) {
            return existing.clone();
        }
        resolved.insert(symbol.to_owned(), Vec::new());

        let alternatives = match groups.alternatives.get(symbol) {
            Some(alternatives) => alternatives.clone(),
            None => Vec::new(),
        };
        let target = chain_target(&alternatives)
            .filter(|target| groups.alternatives.contains_key(*target))
            .map(str::to_owned);

        let result = match target {
            Some(target) => {
                let closed = self.underlying(&target, groups, resolved);
                if closed.is_empty() {
                    // Only a cycle leaves a defined symbol with an empty
                    // set; every grouped symbol starts with at least one
                    // alternative.
                    self.warnings.push(ConvertWarning::ChainCycle {
                        symbol: symbol.to_owned(),
                        target,
                    });
                }
                closed
            }
            None => alternatives,
        };

        resolved.insert(symbol.to_owned(), result.clone());
        result
    }

    /// Pass 3. Flattens each alternative, collapses a symbol's set into a
    /// single rule, then drops defined symbols that are neither the start
    /// symbol nor referenced by a surviving right-hand side.
    fn collect_rules(
        &self,
        order: &[String],
        resolved: &mut HashMap<String, Vec<Expression>>,
    ) -> Vec<Rule> {
        let mut rules = Vec::new();
        for symbol in order {
            let alternatives = match resolved.remove(symbol) {
                Some(alternatives) => alternatives,
                None => continue,
            };
            let mut flattened: Vec<Expression> =
                alternatives.into_iter().map(flatten_sequences).collect();
            let definition = match flattened.len() {
                // A cycle-truncated symbol has no production left.
                0 => continue,
                1 => match flattened.pop() {
                    Some(sole) => sole,
                    None => continue,
                },
                _ => Expression::Alt(flattened),
            };
            rules.push(Rule::new(NonTerminal::new(symbol.clone()), definition));
        }

        let referenced: HashSet<String> = rules
            .iter()
            .flat_map(|rule| rule.definition.non_terminals())
            .collect();
        rules.retain(|rule| rule.defined.0 == self.start.0 || referenced.contains(&rule.defined.0));
        rules
    }
}

/// Rules grouped into ordered, deduplicated alternative sets per defined
/// symbol, preserving first-definition order.
struct RuleGroups {
    order: Vec<String>,
    alternatives: HashMap<String, Vec<Expression>>,
}

fn group_rules(rules: Vec<Rule>) -> RuleGroups {
    let mut order = Vec::new();
    let mut alternatives: HashMap<String, Vec<Expression>> = HashMap::new();
    for rule in rules {
        let entry = alternatives.entry(rule.defined.0.clone()).or_default();
        if entry.is_empty() {
            order.push(rule.defined.0.clone());
        }
        if !entry.contains(&rule.definition) {
            entry.push(rule.definition);
        }
    }
    RuleGroups {
        order,
        alternatives,
    }
}

/// The sole bare non-terminal a symbol's whole alternative set consists of,
/// if it is shaped that way.
fn chain_target(alternatives: &[Expression]) -> Option<&str> {
    match alternatives {
        [Expression::NonTerminal(target)] => Some(&target.0),
        _ => None,
    }
}

/// Recursively splices nested sequences into their parent.
fn flatten_sequences(expression: Expression) -> Expression {
    match expression {
        Expression::Seq(items) => {
            let mut flat = Vec::with_capacity(items.len());
            for item in items {
                match flatten_sequences(item) {
                    Expression::Seq(inner) => flat.extend(inner),
                    other => flat.push(other),
                }
            }
            Expression::Seq(flat)
        }
        Expression::Alt(items) => {
            Expression::Alt(items.into_iter().map(flatten_sequences).collect())
        }
        other => other,
    }
}

/// Composes a deterministic name from an expression's shape. Members
/// contribute their bare text, so the result re-lexes as a plain
/// non-terminal body.
fn compose_name(expression: &Expression) -> String {
    match expression {
        Expression::Eps => "EPS".to_owned(),
        Expression::Terminal(terminal) => terminal.0.clone(),
        Expression::NonTerminal(non_terminal) => non_terminal.0.clone(),
        Expression::Name(name) => name.0.clone(),
        Expression::Optional(inner) => format!("opt{}", compose_name(inner)),
        Expression::KleeneStar(inner) => format!("rep{}", compose_name(inner)),
        Expression::Seq(items) | Expression::Alt(items) => {
            items.iter().map(compose_name).collect()
        }
    }
}

fn random_letter<R: Rng>(rng: &mut R) -> char {
    (b'A' + rng.gen_range(0..26)) as char
}
