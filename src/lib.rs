//! # ebnf2cfg
//!
//! Reads grammars written in EBNF notation and converts them into plain
//! context-free grammars: optionals, repetitions and nested alternations
//! are replaced by fresh helper symbols, chain rules are collapsed, and
//! the result prints back in the same notation without the sugar.
//!
//! The pipeline is `lexer` (token stream plus warnings), `parser`
//! (token stream to [`ebnf::grammar::Grammar`]), `converter` (EBNF
//! grammar to CFG), with `editor` holding the completion and
//! line-simplification helpers used by editor integrations.

pub mod ebnf;
