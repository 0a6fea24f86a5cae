//! Lexical front end for Teeny Tiny, a small BASIC-like language.
//!
//! [`Lexer`] turns source text into [`Token`]s one call at a time;
//! [`TokenStream`] wraps it with the current/peek pair a parser consumes.
//!
//! ```
//! use teenytiny::{Lexer, TokenKind};
//!
//! let mut lexer = Lexer::new("PRINT \"hi\"");
//! assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Print);
//! assert_eq!(lexer.next_token().unwrap().text, "hi");
//! ```

pub mod config;
pub mod error;
pub mod lexer;
pub mod stream;
pub mod token;

pub use config::{Config, OutputFormat};
pub use error::{CompilerError, LexError, LexErrorKind, SyntaxError};
pub use lexer::{tokenize, Lexer};
pub use stream::TokenStream;
pub use token::{Token, TokenKind};
