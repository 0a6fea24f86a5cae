use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Eq, Clone, Serialize, Deserialize)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
}

impl Token {
    pub fn new(kind: TokenKind, text: impl Into<String>) -> Self {
        Self {
            kind,
            text: text.into(),
        }
    }

    pub fn is_eof(&self) -> bool {
        self.kind == TokenKind::Eof
    }
}

/// Every kind of token the lexer can produce.
///
/// Serialized and displayed by its canonical name (`EQEQ`, `ENDWHILE`, ...),
/// which downstream diagnostics embed verbatim.
#[derive(Debug, PartialEq, Eq, Hash, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TokenKind {
    Eof,
    Newline,
    Number,
    Ident,
    String,

    // Keywords
    Label,
    Goto,
    Print,
    Input,
    Let,
    If,
    Then,
    EndIf,
    While,
    Repeat,
    EndWhile,

    // Operators
    Eq,       // =
    Plus,     // +
    Minus,    // -
    Asterisk, // *
    Slash,    // /
    EqEq,     // ==
    NotEq,    // !=
    Lt,       // <
    LtEq,     // <=
    Gt,       // >
    GtEq,     // >=
}

impl TokenKind {
    pub const ALL: [TokenKind; 27] = [
        TokenKind::Eof,
        TokenKind::Newline,
        TokenKind::Number,
        TokenKind::Ident,
        TokenKind::String,
        TokenKind::Label,
        TokenKind::Goto,
        TokenKind::Print,
        TokenKind::Input,
        TokenKind::Let,
        TokenKind::If,
        TokenKind::Then,
        TokenKind::EndIf,
        TokenKind::While,
        TokenKind::Repeat,
        TokenKind::EndWhile,
        TokenKind::Eq,
        TokenKind::Plus,
        TokenKind::Minus,
        TokenKind::Asterisk,
        TokenKind::Slash,
        TokenKind::EqEq,
        TokenKind::NotEq,
        TokenKind::Lt,
        TokenKind::LtEq,
        TokenKind::Gt,
        TokenKind::GtEq,
    ];

    /// The kinds an identifier-shaped lexeme can turn into.
    pub const KEYWORDS: [TokenKind; 11] = [
        TokenKind::Label,
        TokenKind::Goto,
        TokenKind::Print,
        TokenKind::Input,
        TokenKind::Let,
        TokenKind::If,
        TokenKind::Then,
        TokenKind::EndIf,
        TokenKind::While,
        TokenKind::Repeat,
        TokenKind::EndWhile,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TokenKind::Eof => "EOF",
            TokenKind::Newline => "NEWLINE",
            TokenKind::Number => "NUMBER",
            TokenKind::Ident => "IDENT",
            TokenKind::String => "STRING",
            TokenKind::Label => "LABEL",
            TokenKind::Goto => "GOTO",
            TokenKind::Print => "PRINT",
            TokenKind::Input => "INPUT",
            TokenKind::Let => "LET",
            TokenKind::If => "IF",
            TokenKind::Then => "THEN",
            TokenKind::EndIf => "ENDIF",
            TokenKind::While => "WHILE",
            TokenKind::Repeat => "REPEAT",
            TokenKind::EndWhile => "ENDWHILE",
            TokenKind::Eq => "EQ",
            TokenKind::Plus => "PLUS",
            TokenKind::Minus => "MINUS",
            TokenKind::Asterisk => "ASTERISK",
            TokenKind::Slash => "SLASH",
            TokenKind::EqEq => "EQEQ",
            TokenKind::NotEq => "NOTEQ",
            TokenKind::Lt => "LT",
            TokenKind::LtEq => "LTEQ",
            TokenKind::Gt => "GT",
            TokenKind::GtEq => "GTEQ",
        }
    }

    /// Looks up a canonical name over every kind, operators included.
    pub fn from_name(name: &str) -> Option<TokenKind> {
        Self::ALL.into_iter().find(|kind| kind.name() == name)
    }

    /// Keyword lookup for an identifier lexeme. Exact, case-sensitive match.
    pub fn from_keyword(text: &str) -> Option<TokenKind> {
        match text {
            "LABEL" => Some(TokenKind::Label),
            "GOTO" => Some(TokenKind::Goto),
            "PRINT" => Some(TokenKind::Print),
            "INPUT" => Some(TokenKind::Input),
            "LET" => Some(TokenKind::Let),
            "IF" => Some(TokenKind::If),
            "THEN" => Some(TokenKind::Then),
            "ENDIF" => Some(TokenKind::EndIf),
            "WHILE" => Some(TokenKind::While),
            "REPEAT" => Some(TokenKind::Repeat),
            "ENDWHILE" => Some(TokenKind::EndWhile),
            _ => None,
        }
    }

    pub fn is_keyword(self) -> bool {
        Self::KEYWORDS.contains(&self)
    }

    pub fn is_operator(self) -> bool {
        matches!(
            self,
            TokenKind::Eq
                | TokenKind::Plus
                | TokenKind::Minus
                | TokenKind::Asterisk
                | TokenKind::Slash
                | TokenKind::EqEq
                | TokenKind::NotEq
                | TokenKind::Lt
                | TokenKind::LtEq
                | TokenKind::Gt
                | TokenKind::GtEq
        )
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.name())
    }
}
