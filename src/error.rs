use std::path::PathBuf;

use thiserror::Error;

use crate::token::TokenKind;

#[derive(Debug, Error)]
pub enum CompilerError {
    #[error("IOError: {0}")]
    IO(#[from] std::io::Error),
    #[error("FileNotFoundError: {0}")]
    FileNotFound(String),
    #[error("LexingError: {}\n  --> {}:{}:{}", .source.kind, .path.display(), .source.line, .source.column)]
    Lexing { path: PathBuf, source: LexError },
    #[error("ConfigError: {0}")]
    Config(String),
    #[error("JsonError: {0}")]
    Json(#[from] serde_json::Error),
}

/// A fatal lexing error. The lexer that produced it must not be asked for
/// further tokens.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{kind} at {line}:{column}")]
pub struct LexError {
    pub kind: LexErrorKind,
    /// 1-based.
    pub line: usize,
    /// 1-based, counted in characters.
    pub column: usize,
}

impl LexError {
    pub fn new(kind: LexErrorKind, line: usize, column: usize) -> Self {
        Self { kind, line, column }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LexErrorKind {
    #[error("illegal character {ch:?} in string")]
    IllegalCharacterInString { ch: char },
    #[error("illegal character {} in number", describe(.found))]
    MalformedNumberLiteral { found: Option<char> },
    #[error("expected !=, got !{}", negated(.found))]
    UnterminatedNegation { found: Option<char> },
    #[error("unknown token {ch:?}")]
    UnknownCharacter { ch: char },
}

fn describe(found: &Option<char>) -> String {
    match found {
        Some(ch) => format!("{ch:?}"),
        None => "end of input".to_string(),
    }
}

fn negated(found: &Option<char>) -> String {
    found.map(String::from).unwrap_or_default()
}

/// Raised by a token consumer when the current token is not the one it needs.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SyntaxError {
    #[error(transparent)]
    Lex(#[from] LexError),
    #[error("Expected {expected}, got {found}")]
    Unexpected {
        expected: TokenKind,
        found: TokenKind,
        text: String,
    },
}
