//! Grammar parser.
//!
//! A `chumsky` combinator parser over the lexer's token stream,
//! implementing the meta-grammar:
//!
//! ```text
//! document  := "start:" start ("names:" binding*)? "rules:" rule+
//! start     := NON_TERMINAL ";"
//! binding   := NAME ":=" TERMINAL ";"
//! rule      := NON_TERMINAL ":=" expr ";"
//! expr      := seq ("|" seq)*
//! seq       := term+
//! term      := NON_TERMINAL | TERMINAL | NAME | "EPS"
//!            | "(" expr ")" | "[" expr "]" | "{" expr "}"
//! ```
//!
//! The parse result is threaded through an explicit [`ParseOutput`]; no
//! state survives between calls. On failure the parser recovers at the
//! next `;` to collect further diagnostics, but a failed parse never
//! yields a grammar.

use std::fmt;
use std::ops::Range;

use chumsky::prelude::*;
use chumsky::stream::Stream;

use crate::ebnf::grammar::{
    make_grammar, Expression, Grammar, Name, NameBinding, NonTerminal, Rule, Terminal,
};
use crate::ebnf::lexer::{self, Keyword, LexWarning, Token};

/// Type alias for parser error
type ParserError = Simple<Token>;

/// Parser configuration. The default is the relaxed form.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParserConfig {
    /// Require the two-space bind-begin marker before every statement.
    /// When unset, markers are dropped from the stream before parsing.
    pub strict_bind_markers: bool,
}

/// A parsed grammar together with the lexical warnings gathered while
/// tokenizing it.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseOutput {
    pub grammar: Grammar,
    pub warnings: Vec<LexWarning>,
}

/// One offending token, or the end of input where a token was expected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    UnexpectedToken {
        kind: &'static str,
        text: String,
        line: usize,
    },
    UnexpectedEof,
}

impl fmt::Display for SyntaxError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyntaxError::UnexpectedToken { kind, text, line } => {
                write!(f, "Syntax error: Unexpected {}({}) on line {}", kind, text, line)
            }
            SyntaxError::UnexpectedEof => write!(f, "Syntax error: Unexpected end of file"),
        }
    }
}

/// Fatal parse failure. Carries every syntax error the statement-level
/// recovery reached, in source order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub errors: Vec<SyntaxError>,
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, error) in self.errors.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{}", error)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// The unvalidated triple assembled by the document parser.
struct RawDocument {
    start: NonTerminal,
    bindings: Vec<NameBinding>,
    rules: Vec<Rule>,
}

fn non_terminal() -> impl Parser<Token, NonTerminal, Error = ParserError> + Clone {
    filter_map(|span, token| match token {
        Token::NonTerminal(value) => Ok(NonTerminal::new(value)),
        other => Err(Simple::expected_input_found(span, Vec::new(), Some(other))),
    })
}

fn terminal() -> impl Parser<Token, Terminal, Error = ParserError> + Clone {
    filter_map(|span, token| match token {
        Token::Terminal(value) => Ok(Terminal::new(value)),
        other => Err(Simple::expected_input_found(span, Vec::new(), Some(other))),
    })
}

fn name() -> impl Parser<Token, Name, Error = ParserError> + Clone {
    filter_map(|span, token| match token {
        Token::Name(value) => Ok(Name::new(value)),
        other => Err(Simple::expected_input_found(span, Vec::new(), Some(other))),
    })
}

/// `expr := seq ("|" seq)*`, with `seq` and `term` folded in. Grouping
/// parens are transparent; a one-term sequence degenerates to the term.
fn expression() -> impl Parser<Token, Expression, Error = ParserError> + Clone {
    recursive(|expr| {
        let term = choice((
            non_terminal().map(Expression::NonTerminal),
            terminal().map(Expression::Terminal),
            name().map(Expression::Name),
            just(Token::Keyword(Keyword::Epsilon)).to(Expression::Eps),
            expr.clone()
                .delimited_by(just(Token::LGroup), just(Token::RGroup)),
            expr.clone()
                .delimited_by(just(Token::LOpt), just(Token::ROpt))
                .map(|inner| Expression::Optional(Box::new(inner))),
            expr.delimited_by(just(Token::LKleene), just(Token::RKleene))
                .map(|inner| Expression::KleeneStar(Box::new(inner))),
        ));

        let seq = term.repeated().at_least(1).map(Expression::seq_of);

        seq.separated_by(just(Token::AltSep))
            .at_least(1)
            .map(|mut alternatives| {
                if alternatives.len() == 1 {
                    match alternatives.pop() {
                        Some(sole) => sole,
                        None => Expression::Eps,
                    }
                } else {
                    Expression::alt_of(alternatives)
                }
            })
    })
}

fn document(config: ParserConfig) -> impl Parser<Token, RawDocument, Error = ParserError> {
    // Statement prefix: a required marker in strict mode, nothing in
    // relaxed mode (markers are already filtered out of the stream).
    let marker: BoxedParser<'static, Token, (), ParserError> = if config.strict_bind_markers {
        just(Token::BindBegin).ignored().boxed()
    } else {
        empty().boxed()
    };

    let start_decl = just(Token::Keyword(Keyword::Start))
        .ignore_then(marker.clone())
        .ignore_then(non_terminal())
        .then_ignore(just(Token::BindEnd));

    let binding = marker
        .clone()
        .ignore_then(name())
        .then_ignore(just(Token::Bind))
        .then(terminal())
        .then_ignore(just(Token::BindEnd))
        .map(|(defined, definition)| NameBinding::new(defined, definition));

    let bindings = just(Token::Keyword(Keyword::Names))
        .ignore_then(
            binding
                .map(Some)
                .recover_with(skip_until([Token::BindEnd], |_| None))
                .repeated(),
        )
        .map(|bindings: Vec<Option<NameBinding>>| bindings.into_iter().flatten().collect());

    let rule = marker
        .ignore_then(non_terminal())
        .then_ignore(just(Token::Bind))
        .then(expression())
        .then_ignore(just(Token::BindEnd))
        .map(|(defined, definition)| Rule::new(defined, definition));

    let rules = rule
        .map(Some)
        .recover_with(skip_until([Token::BindEnd], |_| None))
        .repeated()
        .at_least(1)
        .map(|rules: Vec<Option<Rule>>| rules.into_iter().flatten().collect());

    start_decl
        .then(bindings.or_not())
        .then(just(Token::Keyword(Keyword::Rules)).ignore_then(rules))
        .then_ignore(end())
        .map(|((start, bindings), rules)| RawDocument {
            start,
            bindings: bindings.unwrap_or_default(),
            rules,
        })
}

/// Parses `source` under the default (relaxed) configuration.
pub fn parse(source: &str) -> Result<ParseOutput, ParseError> {
    parse_with_config(source, ParserConfig::default())
}

/// Parses `source` into a [`Grammar`], reporting every syntax error the
/// recovery reached. The grammar's derived sets come from `make_grammar`.
pub fn parse_with_config(source: &str, config: ParserConfig) -> Result<ParseOutput, ParseError> {
    let (mut spanned, warnings) = lexer::tokenize_with_spans(source);
    if !config.strict_bind_markers {
        spanned.retain(|(token, _)| !matches!(token, Token::BindBegin));
    }

    let byte_spans: Vec<Range<usize>> = spanned.iter().map(|(_, span)| span.clone()).collect();
    let tokens: Vec<Token> = spanned.into_iter().map(|(token, _)| token).collect();
    let token_count = tokens.len();

    // Token-index spans; byte spans are recovered through `byte_spans`
    // when an error has to name a source line.
    let stream = Stream::from_iter(
        token_count..token_count + 1,
        tokens
            .into_iter()
            .enumerate()
            .map(|(index, token)| (token, index..index + 1)),
    );

    match document(config).parse(stream) {
        Ok(raw) => Ok(ParseOutput {
            grammar: make_grammar(raw.start, raw.rules, raw.bindings),
            warnings,
        }),
        Err(errors) => Err(ParseError {
            errors: errors
                .into_iter()
                .map(|error| syntax_error(source, &byte_spans, error))
                .collect(),
        }),
    }
}

fn syntax_error(source: &str, byte_spans: &[Range<usize>], error: Simple<Token>) -> SyntaxError {
    match error.found() {
        Some(token) => {
            let line = byte_spans
                .get(error.span().start)
                .map(|span| lexer::line_number(source, span.start))
                .unwrap_or_else(|| lexer::line_number(source, source.len()));
            SyntaxError::UnexpectedToken {
                kind: token.kind(),
                text: token.text(),
                line,
            }
        }
        None => SyntaxError::UnexpectedEof,
    }
}
