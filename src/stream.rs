use crate::error::{LexError, SyntaxError};
use crate::lexer::Lexer;
use crate::token::{Token, TokenKind};

/// A current token plus one token of lookahead, for parsers to consume.
///
/// Once `EOF` has been pulled the lexer is never polled again; the stream
/// keeps reporting `EOF` instead.
#[derive(Debug)]
pub struct TokenStream {
    lexer: Lexer,
    current: Token,
    peek: Token,
}

impl TokenStream {
    /// Primes the stream by pulling the first two tokens.
    pub fn new(mut lexer: Lexer) -> Result<Self, LexError> {
        let current = lexer.next_token()?;
        let peek = if current.is_eof() {
            current.clone()
        } else {
            lexer.next_token()?
        };

        Ok(Self {
            lexer,
            current,
            peek,
        })
    }

    pub fn from_source(source: &str) -> Result<Self, LexError> {
        Self::new(Lexer::new(source))
    }

    pub fn current(&self) -> &Token {
        &self.current
    }

    pub fn peek(&self) -> &Token {
        &self.peek
    }

    pub fn check_token(&self, kind: TokenKind) -> bool {
        self.current.kind == kind
    }

    pub fn check_peek(&self, kind: TokenKind) -> bool {
        self.peek.kind == kind
    }

    pub fn is_eof(&self) -> bool {
        self.current.is_eof()
    }

    pub fn advance(&mut self) -> Result<(), LexError> {
        let next = if self.peek.is_eof() {
            self.peek.clone()
        } else {
            self.lexer.next_token()?
        };
        self.current = std::mem::replace(&mut self.peek, next);
        Ok(())
    }

    /// Consumes the current token if it is of `kind`.
    pub fn expect(&mut self, kind: TokenKind) -> Result<Token, SyntaxError> {
        if !self.check_token(kind) {
            return Err(SyntaxError::Unexpected {
                expected: kind,
                found: self.current.kind,
                text: self.current.text.clone(),
            });
        }

        let token = self.current.clone();
        self.advance()?;
        Ok(token)
    }
}
