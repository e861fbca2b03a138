//! Tokenizer for the path expression language.
//!
//! Converts a source string into a flat token list with line/column
//! positions for diagnostics. The same token stream feeds both the path
//! expression grammar and the search `_filter` grammar, so the tokenizer is
//! deliberately permissive: keyword-like words (`and`, `is`, `div`, ...)
//! come out as plain symbols and the rule tables decide their role.

use crate::error::LexError;

/// The coarse classification of a token. The token text disambiguates
/// within a kind (e.g. which operator, which keyword).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// Identifiers, keywords, `$this`-style specials, and `%var` references.
    Symbol,
    /// Integer or decimal literal.
    Number,
    /// Single-quoted string literal; `text` holds the unescaped content.
    String,
    /// Date, datetime, or time literal (`@...` or a bare ISO date).
    DateTime,
    /// Operators and punctuation.
    Operator,
    /// `//` or `/* */` comment, stripped before structural parsing.
    Comment,
}

/// One token of source text. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    /// 1-based source line.
    pub line: u32,
    /// 0-based source column.
    pub column: u32,
}

/// Tokenizes the full input, returning every token including comments.
pub fn tokenize(input: &str) -> Result<Vec<Token>, LexError> {
    Tokenizer::new(input).run()
}

struct Tokenizer {
    input: Vec<char>,
    position: usize,
    line: u32,
    column: u32,
}

impl Tokenizer {
    fn new(input: &str) -> Self {
        Tokenizer {
            input: input.chars().collect(),
            position: 0,
            line: 1,
            column: 0,
        }
    }

    fn current_char(&self) -> Option<char> {
        self.input.get(self.position).copied()
    }

    fn peek_char(&self, offset: usize) -> Option<char> {
        self.input.get(self.position + offset).copied()
    }

    fn advance(&mut self) -> Option<char> {
        let ch = self.current_char()?;
        self.position += 1;
        if ch == '\n' {
            self.line += 1;
            self.column = 0;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn run(mut self) -> Result<Vec<Token>, LexError> {
        let mut tokens = Vec::new();
        loop {
            self.skip_whitespace();
            let (line, column) = (self.line, self.column);
            let Some(ch) = self.current_char() else {
                break;
            };
            let token = match ch {
                // Double-quoted strings appear in the search `_filter`
                // grammar, which shares this tokenizer.
                '\'' | '"' => self.read_string(ch, line, column)?,
                '`' => self.read_delimited_symbol(line, column)?,
                '@' => self.read_date_literal(line, column),
                '%' => self.read_external_symbol(line, column)?,
                '$' => self.read_special_symbol(line, column),
                c if c.is_ascii_digit() => self.read_number(line, column),
                c if c.is_ascii_alphabetic() || c == '_' => self.read_symbol(line, column),
                '/' if self.peek_char(1) == Some('/') => self.read_line_comment(line, column),
                '/' if self.peek_char(1) == Some('*') => self.read_block_comment(line, column)?,
                _ => self.read_operator(line, column)?,
            };
            tokens.push(token);
        }
        Ok(tokens)
    }

    fn skip_whitespace(&mut self) {
        while self.current_char().is_some_and(|c| c.is_whitespace()) {
            self.advance();
        }
    }

    fn make_token(kind: TokenKind, text: String, line: u32, column: u32) -> Token {
        Token {
            kind,
            text,
            line,
            column,
        }
    }

    fn read_string(&mut self, quote: char, line: u32, column: u32) -> Result<Token, LexError> {
        self.advance(); // opening quote
        let mut result = String::new();
        loop {
            match self.advance() {
                None => return Err(LexError::UnterminatedString { line, column }),
                Some(c) if c == quote => break,
                Some('\\') => {
                    let (esc_line, esc_column) = (self.line, self.column);
                    match self.advance() {
                        Some('n') => result.push('\n'),
                        Some('t') => result.push('\t'),
                        Some('r') => result.push('\r'),
                        Some('f') => result.push('\u{000C}'),
                        Some('\'') => result.push('\''),
                        Some('"') => result.push('"'),
                        Some('`') => result.push('`'),
                        Some('\\') => result.push('\\'),
                        Some('/') => result.push('/'),
                        Some('u') => result.push(self.read_unicode_escape(esc_line, esc_column)?),
                        Some(other) => {
                            return Err(LexError::InvalidEscape {
                                escape: other,
                                line: esc_line,
                                column: esc_column,
                            });
                        }
                        None => return Err(LexError::UnterminatedString { line, column }),
                    }
                }
                Some(ch) => result.push(ch),
            }
        }
        Ok(Self::make_token(TokenKind::String, result, line, column))
    }

    fn read_unicode_escape(&mut self, line: u32, column: u32) -> Result<char, LexError> {
        let mut digits = String::new();
        for _ in 0..4 {
            match self.advance() {
                Some(c) if c.is_ascii_hexdigit() => digits.push(c),
                Some(c) => {
                    return Err(LexError::InvalidEscape {
                        escape: c,
                        line,
                        column,
                    });
                }
                None => return Err(LexError::UnterminatedString { line, column }),
            }
        }
        let code = u32::from_str_radix(&digits, 16).expect("hex digits");
        char::from_u32(code).ok_or(LexError::InvalidEscape {
            escape: 'u',
            line,
            column,
        })
    }

    fn read_delimited_symbol(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        self.advance(); // opening backtick
        let mut result = String::new();
        loop {
            match self.advance() {
                None => return Err(LexError::UnterminatedString { line, column }),
                Some('`') => break,
                Some(ch) => result.push(ch),
            }
        }
        Ok(Self::make_token(TokenKind::Symbol, result, line, column))
    }

    /// `@2021-01-01`, `@2021-01-01T12:00:00Z`, `@T14:30`. The leading `@` is
    /// not kept in the token text.
    fn read_date_literal(&mut self, line: u32, column: u32) -> Token {
        self.advance(); // '@'
        let mut text = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() || matches!(ch, '-' | ':' | '.' | 'T' | 'Z' | '+') {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Self::make_token(TokenKind::DateTime, text, line, column)
    }

    /// `%var` or `%'delimited name'`. The token text keeps the `%` so the
    /// evaluator can tell external constants from plain member names.
    fn read_external_symbol(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        self.advance(); // '%'
        let mut text = String::from("%");
        if self.current_char() == Some('\'') {
            let inner = self.read_string('\'', line, column)?;
            text.push_str(&inner.text);
        } else {
            while let Some(ch) = self.current_char() {
                if ch.is_ascii_alphanumeric() || ch == '_' || ch == '-' {
                    text.push(ch);
                    self.advance();
                } else {
                    break;
                }
            }
        }
        Ok(Self::make_token(TokenKind::Symbol, text, line, column))
    }

    fn read_special_symbol(&mut self, line: u32, column: u32) -> Token {
        let mut text = String::new();
        text.push(self.advance().expect("current char")); // '$'
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Self::make_token(TokenKind::Symbol, text, line, column)
    }

    /// Numbers, plus bare ISO dates: a 4-digit year immediately followed by
    /// `-` and a digit continues as a date/datetime token. `2014 - 10` (with
    /// spaces) stays arithmetic.
    fn read_number(&mut self, line: u32, column: u32) -> Token {
        let mut text = String::new();
        while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
            text.push(self.advance().expect("digit"));
        }

        if text.len() == 4
            && self.current_char() == Some('-')
            && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
        {
            return self.read_bare_date(text, line, column);
        }

        if self.current_char() == Some('.') && self.peek_char(1).is_some_and(|c| c.is_ascii_digit())
        {
            text.push(self.advance().expect("dot"));
            while self.current_char().is_some_and(|c| c.is_ascii_digit()) {
                text.push(self.advance().expect("digit"));
            }
        }
        Self::make_token(TokenKind::Number, text, line, column)
    }

    fn read_bare_date(&mut self, year: String, line: u32, column: u32) -> Token {
        let mut text = year;
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_digit() || matches!(ch, '-' | ':' | '.' | 'T' | 'Z' | '+') {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Self::make_token(TokenKind::DateTime, text, line, column)
    }

    fn read_symbol(&mut self, line: u32, column: u32) -> Token {
        let mut text = String::new();
        while let Some(ch) = self.current_char() {
            if ch.is_ascii_alphanumeric() || ch == '_' {
                text.push(ch);
                self.advance();
            } else {
                break;
            }
        }
        Self::make_token(TokenKind::Symbol, text, line, column)
    }

    fn read_line_comment(&mut self, line: u32, column: u32) -> Token {
        self.advance();
        self.advance(); // '//'
        let mut text = String::new();
        while let Some(ch) = self.current_char() {
            if ch == '\n' {
                break;
            }
            text.push(ch);
            self.advance();
        }
        Self::make_token(TokenKind::Comment, text, line, column)
    }

    fn read_block_comment(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        self.advance();
        self.advance(); // '/*'
        let mut text = String::new();
        loop {
            match self.current_char() {
                None => return Err(LexError::UnterminatedComment { line, column }),
                Some('*') if self.peek_char(1) == Some('/') => {
                    self.advance();
                    self.advance();
                    break;
                }
                Some(ch) => {
                    text.push(ch);
                    self.advance();
                }
            }
        }
        Ok(Self::make_token(TokenKind::Comment, text, line, column))
    }

    fn read_operator(&mut self, line: u32, column: u32) -> Result<Token, LexError> {
        let ch = self.current_char().expect("current char");
        let two: Option<&str> = match (ch, self.peek_char(1)) {
            ('!', Some('=')) => Some("!="),
            ('!', Some('~')) => Some("!~"),
            ('<', Some('=')) => Some("<="),
            ('>', Some('=')) => Some(">="),
            _ => None,
        };
        if let Some(op) = two {
            self.advance();
            self.advance();
            return Ok(Self::make_token(
                TokenKind::Operator,
                op.to_string(),
                line,
                column,
            ));
        }
        match ch {
            '+' | '-' | '*' | '/' | '^' | '=' | '~' | '<' | '>' | '|' | '&' | '.' | '(' | ')'
            | '[' | ']' | '{' | '}' | ',' => {
                self.advance();
                Ok(Self::make_token(
                    TokenKind::Operator,
                    ch.to_string(),
                    line,
                    column,
                ))
            }
            _ => Err(LexError::UnrecognizedCharacter {
                character: ch,
                line,
                column,
            }),
        }
    }
}
