use std::iter::FusedIterator;

use tracing::{debug, trace};

use crate::error::{LexError, LexErrorKind};
use crate::token::{Token, TokenKind};

/// Text carried by the EOF token.
pub const EOF_TEXT: &str = "\0";

/// Pull-based scanner over one source string.
///
/// The source is copied with a trailing newline appended, so the last line of
/// a program always ends in a `NEWLINE` token before `EOF`. The cursor only
/// moves forward; once a fatal error has been returned, every later call
/// returns that same error.
#[derive(Debug, Clone)]
pub struct Lexer {
    chars: Vec<char>,
    current: usize,
    line: usize,
    column: usize,
    failed: Option<LexError>,
    finished: bool,
}

impl Lexer {
    pub fn new(source: &str) -> Self {
        let mut chars: Vec<char> = source.chars().collect();
        chars.push('\n');

        Self {
            chars,
            current: 0,
            line: 1,
            column: 1,
            failed: None,
            finished: false,
        }
    }

    /// Starts a new session over `source`, discarding all prior state.
    pub fn reset(&mut self, source: &str) {
        *self = Self::new(source);
    }

    fn at(&self) -> Option<char> {
        self.chars.get(self.current).copied()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.current + 1).copied()
    }

    fn advance(&mut self) {
        if self.at() == Some('\n') {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        self.current += 1;
    }

    fn is_eof(&self) -> bool {
        self.current >= self.chars.len()
    }

    fn error(&self, kind: LexErrorKind) -> LexError {
        LexError::new(kind, self.line, self.column)
    }

    fn text(&self, start: usize, end: usize) -> String {
        self.chars[start..end].iter().collect()
    }

    /// Classifies exactly one token and leaves the cursor on the first
    /// character after it.
    pub fn next_token(&mut self) -> Result<Token, LexError> {
        if let Some(err) = &self.failed {
            return Err(err.clone());
        }

        match self.scan() {
            Ok(token) => {
                trace!(kind = %token.kind, text = ?token.text, "token");
                Ok(token)
            }
            Err(err) => {
                debug!(%err, "fatal lexing error");
                self.failed = Some(err.clone());
                Err(err)
            }
        }
    }

    /// Drains the lexer, `EOF` included.
    pub fn tokenize(self) -> Result<Vec<Token>, LexError> {
        self.collect()
    }

    fn scan(&mut self) -> Result<Token, LexError> {
        self.skip_whitespace();

        let token = match self.at() {
            None => Token::new(TokenKind::Eof, EOF_TEXT),
            Some('\n') => Token::new(TokenKind::Newline, "\n"),
            Some('+') => Token::new(TokenKind::Plus, "+"),
            Some('-') => Token::new(TokenKind::Minus, "-"),
            Some('*') => Token::new(TokenKind::Asterisk, "*"),
            Some('/') => {
                if self.peek() == Some('/') {
                    self.skip_comment();
                    Token::new(TokenKind::Newline, "\n")
                } else {
                    Token::new(TokenKind::Slash, "/")
                }
            }
            Some('=') => self.operator('=', Some(TokenKind::Eq), TokenKind::EqEq)?,
            Some('>') => self.operator('>', Some(TokenKind::Gt), TokenKind::GtEq)?,
            Some('<') => self.operator('<', Some(TokenKind::Lt), TokenKind::LtEq)?,
            Some('!') => self.operator('!', None, TokenKind::NotEq)?,
            Some('"') => self.string()?,
            Some(c) if c.is_ascii_digit() => self.number()?,
            Some(c) if c.is_alphabetic() => self.identifier(),
            Some(c) => return Err(self.error(LexErrorKind::UnknownCharacter { ch: c })),
        };

        if !self.is_eof() {
            self.advance();
        }

        Ok(token)
    }

    // Newlines are statement terminators, so they are not skipped here.
    fn skip_whitespace(&mut self) {
        while matches!(self.at(), Some(' ' | '\t' | '\r')) {
            self.advance();
        }
    }

    // Stops on the newline that ends the comment; it becomes the token.
    fn skip_comment(&mut self) {
        while !matches!(self.at(), Some('\n') | None) {
            self.advance();
        }
    }

    /// `first` alone, or `first` followed by `=`.
    fn operator(
        &mut self,
        first: char,
        single: Option<TokenKind>,
        double: TokenKind,
    ) -> Result<Token, LexError> {
        if self.peek() == Some('=') {
            self.advance();
            return Ok(Token::new(double, format!("{first}=")));
        }

        match single {
            Some(kind) => Ok(Token::new(kind, first.to_string())),
            None => Err(self.error(LexErrorKind::UnterminatedNegation { found: self.peek() })),
        }
    }

    // Bodies must be safe to embed in a printf format string.
    fn string(&mut self) -> Result<Token, LexError> {
        self.advance(); // Consume opening quote.
        let start = self.current;

        loop {
            // The buffer ends in a newline, so an unterminated string fails there.
            match self.at().unwrap_or('\n') {
                '"' => break,
                ch @ ('\r' | '\n' | '\t' | '\\' | '%') => {
                    return Err(self.error(LexErrorKind::IllegalCharacterInString { ch }));
                }
                _ => self.advance(),
            }
        }

        Ok(Token::new(TokenKind::String, self.text(start, self.current)))
    }

    fn number(&mut self) -> Result<Token, LexError> {
        let start = self.current;
        self.eat_digits();

        if self.peek() == Some('.') {
            self.advance();

            if !self.peek().is_some_and(|c| c.is_ascii_digit()) {
                return Err(self.error(LexErrorKind::MalformedNumberLiteral { found: self.peek() }));
            }
            self.eat_digits();
        }

        Ok(Token::new(TokenKind::Number, self.text(start, self.current + 1)))
    }

    fn eat_digits(&mut self) {
        while self.peek().is_some_and(|c| c.is_ascii_digit()) {
            self.advance();
        }
    }

    fn identifier(&mut self) -> Token {
        let start = self.current;
        while self.peek().is_some_and(is_ident_continue) {
            self.advance();
        }

        let text = self.text(start, self.current + 1);
        let kind = TokenKind::from_keyword(&text).unwrap_or(TokenKind::Ident);
        Token::new(kind, text)
    }
}

fn is_ident_continue(c: char) -> bool {
    c.is_alphabetic() || c.is_ascii_digit()
}

/// Yields every token through `EOF`, or up to and including the first error.
impl Iterator for Lexer {
    type Item = Result<Token, LexError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        let result = self.next_token();
        self.finished = !matches!(&result, Ok(token) if !token.is_eof());
        Some(result)
    }
}

impl FusedIterator for Lexer {}

pub fn tokenize(source: &str) -> Result<Vec<Token>, LexError> {
    Lexer::new(source).tokenize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;
    use crate::token::TokenKind::{
        Asterisk, EndWhile, Eof, EqEq, Goto, Gt, GtEq, Ident, If, Let, Lt, LtEq, Minus, Newline,
        NotEq, Number, Plus, Print, Repeat, Slash, Then, While,
    };

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.kind)
            .collect()
    }

    fn texts(source: &str) -> Vec<String> {
        tokenize(source)
            .unwrap()
            .into_iter()
            .map(|token| token.text)
            .collect()
    }

    fn error(source: &str) -> LexError {
        tokenize(source).unwrap_err()
    }

    #[test]
    fn empty_source_is_newline_then_eof() {
        assert_eq!(kinds(""), vec![Newline, Eof]);
        assert_eq!(texts(""), vec!["\n", EOF_TEXT]);
    }

    #[test]
    fn whitespace_is_skipped_but_newlines_are_tokens() {
        assert_eq!(kinds(" \t\r "), vec![Newline, Eof]);
        assert_eq!(kinds("\n\n"), vec![Newline, Newline, Newline, Eof]);
    }

    #[test]
    fn single_character_operators() {
        assert_eq!(kinds("+"), vec![Plus, Newline, Eof]);
        assert_eq!(kinds(" - "), vec![Minus, Newline, Eof]);
        assert_eq!(kinds("\t*"), vec![Asterisk, Newline, Eof]);
        assert_eq!(kinds("/"), vec![Slash, Newline, Eof]);
    }

    #[test]
    fn doubled_operators() {
        let tokens = tokenize("== = >= > <= < !=").unwrap();
        let pairs: Vec<(TokenKind, &str)> = tokens
            .iter()
            .map(|token| (token.kind, token.text.as_str()))
            .collect();

        assert_eq!(
            pairs,
            vec![
                (EqEq, "=="),
                (TokenKind::Eq, "="),
                (GtEq, ">="),
                (Gt, ">"),
                (LtEq, "<="),
                (Lt, "<"),
                (NotEq, "!="),
                (Newline, "\n"),
                (Eof, EOF_TEXT),
            ]
        );
    }

    #[test]
    fn doubling_only_looks_one_character_ahead() {
        assert_eq!(kinds("==="), vec![EqEq, TokenKind::Eq, Newline, Eof]);
        assert_eq!(kinds("= ="), vec![TokenKind::Eq, TokenKind::Eq, Newline, Eof]);
        assert_eq!(kinds("<>"), vec![Lt, Gt, Newline, Eof]);
    }

    #[test]
    fn bare_bang_is_fatal() {
        let err = error("!x");
        assert_eq!(err.kind, LexErrorKind::UnterminatedNegation { found: Some('x') });
        assert_eq!((err.line, err.column), (1, 1));

        let err = error("a !");
        assert_eq!(err.kind, LexErrorKind::UnterminatedNegation { found: Some('\n') });
        assert_eq!(err.column, 3);
    }

    #[test]
    fn line_comment_becomes_newline() {
        assert_eq!(kinds("x // comment\n"), kinds("x\n"));
        assert_eq!(kinds("// only a comment"), vec![Newline, Eof]);
        assert_eq!(kinds("a // b\nc"), vec![Ident, Newline, Ident, Newline, Eof]);
        assert_eq!(texts("// x\n"), vec!["\n", "\n", EOF_TEXT]);
    }

    #[test]
    fn comment_may_contain_anything() {
        assert_eq!(kinds("// ! % \\ \" @#$"), vec![Newline, Eof]);
    }

    #[test]
    fn numbers() {
        assert_eq!(texts("123.45"), vec!["123.45", "\n", EOF_TEXT]);
        assert_eq!(kinds("123.45"), vec![Number, Newline, Eof]);
        assert_eq!(texts("0 7 3.0"), vec!["0", "7", "3.0", "\n", EOF_TEXT]);
    }

    #[test]
    fn minus_is_not_part_of_a_number() {
        assert_eq!(texts("-5"), vec!["-", "5", "\n", EOF_TEXT]);
    }

    #[test]
    fn number_followed_by_letters_splits() {
        let tokens = tokenize("12ab").unwrap();
        assert_eq!(tokens[0], Token::new(Number, "12"));
        assert_eq!(tokens[1], Token::new(Ident, "ab"));
    }

    #[test]
    fn decimal_point_needs_a_digit() {
        let err = error("123.");
        assert_eq!(err.kind, LexErrorKind::MalformedNumberLiteral { found: Some('\n') });

        let err = error("1.x");
        assert_eq!(err.kind, LexErrorKind::MalformedNumberLiteral { found: Some('x') });
        assert_eq!(err.column, 2);
    }

    #[test]
    fn second_decimal_point_is_unknown() {
        let err = error("1.2.3");
        assert_eq!(err.kind, LexErrorKind::UnknownCharacter { ch: '.' });
        assert_eq!(err.column, 4);
    }

    #[test]
    fn keywords_are_case_sensitive() {
        assert_eq!(kinds("IF"), vec![If, Newline, Eof]);
        assert_eq!(kinds("iff"), vec![Ident, Newline, Eof]);
        assert_eq!(kinds("If"), vec![Ident, Newline, Eof]);
        assert_eq!(kinds("IFF"), vec![Ident, Newline, Eof]);
    }

    #[test]
    fn every_keyword_is_recognized() {
        let source = "LABEL GOTO PRINT INPUT LET IF THEN ENDIF WHILE REPEAT ENDWHILE";
        let mut expected = TokenKind::KEYWORDS.to_vec();
        expected.extend([Newline, Eof]);
        assert_eq!(kinds(source), expected);
    }

    #[test]
    fn operator_names_are_identifiers() {
        assert_eq!(kinds("EQEQ PLUS EOF IDENT"), vec![Ident, Ident, Ident, Ident, Newline, Eof]);
    }

    #[test]
    fn identifiers_keep_their_spelling() {
        let tokens = tokenize("foo1 Bar2baz").unwrap();
        assert_eq!(tokens[0], Token::new(Ident, "foo1"));
        assert_eq!(tokens[1], Token::new(Ident, "Bar2baz"));
    }

    #[test]
    fn underscore_is_not_an_identifier_character() {
        let err = error("foo_bar");
        assert_eq!(err.kind, LexErrorKind::UnknownCharacter { ch: '_' });
        assert_eq!(err.column, 4);
    }

    #[test]
    fn strings() {
        let tokens = tokenize("\"hello\"").unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::String, "hello"));

        let tokens = tokenize("PRINT \"a b, c!\"").unwrap();
        assert_eq!(tokens[1], Token::new(TokenKind::String, "a b, c!"));

        let tokens = tokenize("\"\"").unwrap();
        assert_eq!(tokens[0], Token::new(TokenKind::String, ""));
    }

    #[test]
    fn illegal_characters_in_strings() {
        for ch in ['%', '\\', '\t', '\r'] {
            let err = error(&format!("\"bad{ch}str\""));
            assert_eq!(err.kind, LexErrorKind::IllegalCharacterInString { ch });
            assert_eq!(err.column, 5);
        }
    }

    #[test]
    fn unterminated_string_fails_at_newline() {
        let err = error("\"open");
        assert_eq!(err.kind, LexErrorKind::IllegalCharacterInString { ch: '\n' });

        let err = error("\"open\nPRINT");
        assert_eq!(err.kind, LexErrorKind::IllegalCharacterInString { ch: '\n' });
        assert_eq!((err.line, err.column), (1, 6));
    }

    #[test]
    fn unknown_characters() {
        for ch in ['#', '(', '.', '_', '\0'] {
            let err = error(&format!("x {ch}"));
            assert_eq!(err.kind, LexErrorKind::UnknownCharacter { ch });
            assert_eq!((err.line, err.column), (1, 3));
        }
    }

    #[test]
    fn error_positions_track_lines() {
        let err = error("LET a = 1\nLET b = @");
        assert_eq!(err.kind, LexErrorKind::UnknownCharacter { ch: '@' });
        assert_eq!((err.line, err.column), (2, 9));
    }

    #[test]
    fn mixed_operators_and_words() {
        assert_eq!(
            kinds("IF+-123foo*THEN/"),
            vec![If, Plus, Minus, Number, Ident, Asterisk, Then, Slash, Newline, Eof]
        );
        assert_eq!(
            texts("IF+-123foo*THEN/"),
            vec!["IF", "+", "-", "123", "foo", "*", "THEN", "/", "\n", EOF_TEXT]
        );
    }

    #[test]
    fn small_program() {
        let source = "\
LET nums = 10
WHILE nums > 0 REPEAT
    PRINT \"counting\"
    LET nums = nums - 1.5
ENDWHILE
";
        assert_eq!(
            kinds(source),
            vec![
                Let, Ident, TokenKind::Eq, Number, Newline,
                While, Ident, Gt, Number, Repeat, Newline,
                Print, TokenKind::String, Newline,
                Let, Ident, TokenKind::Eq, Ident, Minus, Number, Newline,
                EndWhile, Newline,
                Newline,
                Eof,
            ]
        );
    }

    #[test]
    fn eof_repeats_when_polled_again() {
        let mut lexer = Lexer::new("+");
        assert_eq!(lexer.next_token().unwrap().kind, Plus);
        assert_eq!(lexer.next_token().unwrap().kind, Newline);
        assert_eq!(lexer.next_token().unwrap().kind, Eof);
        assert_eq!(lexer.next_token().unwrap().kind, Eof);
    }

    #[test]
    fn errors_are_sticky() {
        let mut lexer = Lexer::new("+ # -");
        assert_eq!(lexer.next_token().unwrap().kind, Plus);
        let first = lexer.next_token().unwrap_err();
        assert_eq!(lexer.next_token().unwrap_err(), first);
    }

    #[test]
    fn iterator_stops_after_eof() {
        let tokens: Vec<_> = Lexer::new("a").collect();
        assert_eq!(tokens.len(), 3);
        assert!(tokens.iter().all(Result::is_ok));
    }

    #[test]
    fn iterator_stops_after_error() {
        let mut lexer = Lexer::new("a ! b");
        assert!(lexer.next().unwrap().is_ok());
        assert!(lexer.next().unwrap().is_err());
        assert!(lexer.next().is_none());
        assert!(lexer.next().is_none());
    }

    #[test]
    fn reset_replaces_state() {
        let mut lexer = Lexer::new("# broken");
        assert!(lexer.next_token().is_err());

        lexer.reset("GOTO");
        assert_eq!(lexer.next_token().unwrap(), Token::new(Goto, "GOTO"));
        assert_eq!(lexer.next_token().unwrap().kind, Newline);
        assert_eq!(lexer.next_token().unwrap().kind, Eof);
    }

    #[test]
    fn non_ascii_letters_start_identifiers() {
        let tokens = tokenize("été2").unwrap();
        assert_eq!(tokens[0], Token::new(Ident, "été2"));
    }

    proptest! {
        #[test]
        fn lone_operator_with_whitespace(
            before in "[ \t\r]{0,4}",
            op in prop::sample::select(vec!['+', '-', '*']),
            after in "[ \t\r]{0,4}",
        ) {
            let expected = match op {
                '+' => Plus,
                '-' => Minus,
                _ => Asterisk,
            };
            let source = format!("{before}{op}{after}");
            prop_assert_eq!(kinds(&source), vec![expected, Newline, Eof]);
        }

        #[test]
        fn two_scans_agree(source in "\\PC{0,64}") {
            let first: Vec<_> = Lexer::new(&source).collect();
            let second: Vec<_> = Lexer::new(&source).collect();
            prop_assert_eq!(first, second);
        }

        #[test]
        fn scanning_always_terminates(source in "[ -~\t\n]{0,64}") {
            let count = Lexer::new(&source).count();
            // One token per character at most, plus the appended newline and EOF.
            prop_assert!(count <= source.chars().count() + 2);
        }

        #[test]
        fn identifiers_round_trip(word in "[a-z][a-zA-Z0-9]{0,12}") {
            let tokens = tokenize(&word).unwrap();
            prop_assert_eq!(&tokens[0], &Token::new(Ident, word.clone()));
        }
    }
}
