//! Lexical analyzer for the grammar surface syntax.
//!
//! Tokens are classified by a derived [`logos`] lexer. Bare words are
//! matched by one generic pattern and resolved against the fixed keyword
//! table (`start:`, `names:`, `rules:`, `EPS`); a word outside the table is
//! a lexical error covering the whole lexeme. Anything the rules cannot
//! match, including a lone space that is not part of a two-space bind
//! marker, becomes a [`LexWarning`] and is skipped: the lexer degrades,
//! it never aborts.

use std::fmt;
use std::ops::Range;

use logos::Logos;
use serde::{Deserialize, Serialize};

/// The fixed keyword table. Anything matching the bare-word pattern but not
/// listed here is noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Keyword {
    Start,
    Names,
    Rules,
    Epsilon,
}

impl Keyword {
    pub fn lexeme(&self) -> &'static str {
        match self {
            Keyword::Start => "start:",
            Keyword::Names => "names:",
            Keyword::Rules => "rules:",
            Keyword::Epsilon => "EPS",
        }
    }
}

#[derive(Logos, Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[logos(skip r"\n+")]
pub enum Token {
    /// `<...>` with the delimiters stripped; `\` escapes the closer, the
    /// body is at least one character and escapes are kept verbatim.
    #[regex(r"<([^>\\]|\\.)+>", strip_delimiters)]
    NonTerminal(String),

    /// `"..."` with the delimiters stripped, same body rules as `<...>`.
    #[regex(r#""([^"\\]|\\.)+""#, strip_delimiters)]
    Terminal(String),

    /// `$name` with the sigil stripped.
    #[regex(r"\$[A-Za-z_`]+", strip_sigil)]
    Name(String),

    /// A bare word resolved through the keyword table.
    #[regex(r"[a-zA-Z]+:?", lookup_keyword)]
    Keyword(Keyword),

    #[token(":=")]
    Bind,

    #[token(";")]
    BindEnd,

    #[token("|")]
    AltSep,

    /// Exactly two consecutive spaces. The strict parser configuration
    /// requires one before every statement; the relaxed configuration drops
    /// them from the stream before parsing.
    #[token("  ")]
    BindBegin,

    #[token("{")]
    LKleene,

    #[token("}")]
    RKleene,

    #[token("[")]
    LOpt,

    #[token("]")]
    ROpt,

    #[token("(")]
    LGroup,

    #[token(")")]
    RGroup,
}

fn strip_delimiters(lex: &mut logos::Lexer<Token>) -> String {
    let slice = lex.slice();
    slice[1..slice.len() - 1].to_owned()
}

fn strip_sigil(lex: &mut logos::Lexer<Token>) -> String {
    lex.slice()[1..].to_owned()
}

fn lookup_keyword(lex: &mut logos::Lexer<Token>) -> Result<Keyword, ()> {
    match lex.slice() {
        "start:" => Ok(Keyword::Start),
        "names:" => Ok(Keyword::Names),
        "rules:" => Ok(Keyword::Rules),
        "EPS" => Ok(Keyword::Epsilon),
        _ => Err(()),
    }
}

impl Token {
    /// Kind name used in syntax diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Token::NonTerminal(_) => "NON_TERMINAL",
            Token::Terminal(_) => "TERMINAL",
            Token::Name(_) => "NAME",
            Token::Keyword(Keyword::Start) => "START",
            Token::Keyword(Keyword::Names) => "NAMES",
            Token::Keyword(Keyword::Rules) => "RULES",
            Token::Keyword(Keyword::Epsilon) => "EPSILON",
            Token::Bind => "BIND",
            Token::BindEnd => "BIND_END",
            Token::AltSep => "ALT_SEP",
            Token::BindBegin => "BIND_BEGIN",
            Token::LKleene => "LKLEENE",
            Token::RKleene => "RKLEENE",
            Token::LOpt => "LOPT",
            Token::ROpt => "ROPT",
            Token::LGroup => "LGROUP",
            Token::RGroup => "RGROUP",
        }
    }

    /// The token's text as quoted in diagnostics.
    pub fn text(&self) -> String {
        match self {
            Token::NonTerminal(value) | Token::Terminal(value) | Token::Name(value) => {
                value.clone()
            }
            Token::Keyword(keyword) => keyword.lexeme().to_owned(),
            Token::Bind => ":=".to_owned(),
            Token::BindEnd => ";".to_owned(),
            Token::AltSep => "|".to_owned(),
            Token::BindBegin => "  ".to_owned(),
            Token::LKleene => "{".to_owned(),
            Token::RKleene => "}".to_owned(),
            Token::LOpt => "[".to_owned(),
            Token::ROpt => "]".to_owned(),
            Token::LGroup => "(".to_owned(),
            Token::RGroup => ")".to_owned(),
        }
    }
}

/// A recovered lexical error. Warnings are values handed back to the
/// caller, never log side effects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LexWarning {
    IllegalCharacter {
        character: char,
        offset: usize,
        line: usize,
    },
    UnknownKeyword {
        word: String,
        offset: usize,
        line: usize,
    },
}

impl LexWarning {
    fn classify(lexeme: &str, offset: usize, line: usize) -> Self {
        let word = lexeme.strip_suffix(':').unwrap_or(lexeme);
        if !word.is_empty() && word.chars().all(|c| c.is_ascii_alphabetic()) {
            LexWarning::UnknownKeyword {
                word: lexeme.to_owned(),
                offset,
                line,
            }
        } else {
            LexWarning::IllegalCharacter {
                character: lexeme.chars().next().unwrap_or('\u{fffd}'),
                offset,
                line,
            }
        }
    }
}

impl fmt::Display for LexWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexWarning::IllegalCharacter {
                character,
                offset,
                line,
            } => write!(
                f,
                "Illegal character {} at position {} at line {}",
                character, offset, line
            ),
            LexWarning::UnknownKeyword { word, offset, line } => write!(
                f,
                "Unknown keyword {} at position {} at line {}",
                word, offset, line
            ),
        }
    }
}

/// Lazily tokenizes `source`, dropping anything unrecognized. Restartable
/// by calling again; always finite.
pub fn tokenize(source: &str) -> impl Iterator<Item = Token> + '_ {
    Token::lexer(source).filter_map(|result| result.ok())
}

/// Eagerly tokenizes `source`, keeping byte spans for diagnostics and
/// collecting a warning for every skipped lexeme.
pub fn tokenize_with_spans(source: &str) -> (Vec<(Token, Range<usize>)>, Vec<LexWarning>) {
    let mut lexer = Token::lexer(source);
    let mut tokens = Vec::new();
    let mut warnings = Vec::new();
    while let Some(result) = lexer.next() {
        let span = lexer.span();
        match result {
            Ok(token) => tokens.push((token, span)),
            Err(()) => warnings.push(LexWarning::classify(
                lexer.slice(),
                span.start,
                line_number(source, span.start),
            )),
        }
    }
    (tokens, warnings)
}

/// 1-based line number of a byte offset, for diagnostics.
pub(crate) fn line_number(source: &str, offset: usize) -> usize {
    let end = offset.min(source.len());
    source.as_bytes()[..end]
        .iter()
        .filter(|&&byte| byte == b'\n')
        .count()
        + 1
}
