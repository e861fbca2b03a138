//! Generic precedence-climbing parser core.
//!
//! The engine is grammar-agnostic: a grammar is a pair of rule tables
//! (prefix and infix) given as plain data, and the output node type is a
//! type parameter. The path expression grammar and the search `_filter`
//! grammar both instantiate this one engine with their own tables.
//!
//! The main loop consumes a token, dispatches its prefix rule, then folds
//! infix rules into the left-hand side for as long as the next token binds
//! more tightly than the caller's floor. Right-associative operators re-enter
//! the loop with their own precedence minus one.

use crate::error::ParseError;
use crate::token::{Token, TokenKind};

/// Parses a prefix position: the rule owns its consumed token.
pub type PrefixFn<T> = fn(&mut Parser<'_, T>, &Token) -> Result<T, ParseError>;

/// Parses an infix position: receives the folded left-hand side and the
/// operator token.
pub type InfixFn<T> = fn(&mut Parser<'_, T>, T, &Token) -> Result<T, ParseError>;

/// How a rule is matched against a token. Text entries are consulted before
/// bare kind entries, so keyword rules can shadow the generic symbol rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleKey {
    Kind(TokenKind),
    Text(TokenKind, &'static str),
}

impl RuleKey {
    fn matches(&self, token: &Token) -> bool {
        match self {
            RuleKey::Kind(kind) => token.kind == *kind,
            RuleKey::Text(kind, text) => token.kind == *kind && token.text == *text,
        }
    }

    fn is_text(&self) -> bool {
        matches!(self, RuleKey::Text(..))
    }
}

pub struct PrefixEntry<T: 'static> {
    pub key: RuleKey,
    pub parse: PrefixFn<T>,
}

pub struct InfixEntry<T: 'static> {
    pub key: RuleKey,
    pub precedence: u8,
    pub parse: InfixFn<T>,
}

/// A grammar: two static rule tables over one output node type.
pub struct RuleSet<T: 'static> {
    pub prefix: &'static [PrefixEntry<T>],
    pub infix: &'static [InfixEntry<T>],
}

impl<T> RuleSet<T> {
    fn prefix_rule(&self, token: &Token) -> Option<PrefixFn<T>> {
        self.prefix
            .iter()
            .filter(|e| e.key.matches(token))
            .max_by_key(|e| e.key.is_text())
            .map(|e| e.parse)
    }

    fn infix_rule(&self, token: &Token) -> Option<(u8, InfixFn<T>)> {
        self.infix
            .iter()
            .filter(|e| e.key.matches(token))
            .max_by_key(|e| e.key.is_text())
            .map(|e| (e.precedence, e.parse))
    }
}

/// Parser state: the remaining tokens plus the active rule tables.
pub struct Parser<'a, T: 'static> {
    tokens: Vec<Token>,
    position: usize,
    rules: &'a RuleSet<T>,
}

impl<'a, T> Parser<'a, T> {
    /// Builds a parser over a token stream. Comment tokens are stripped
    /// here, before any structural parsing.
    pub fn new(tokens: Vec<Token>, rules: &'a RuleSet<T>) -> Self {
        let tokens = tokens
            .into_iter()
            .filter(|t| t.kind != TokenKind::Comment)
            .collect();
        Parser {
            tokens,
            position: 0,
            rules,
        }
    }

    pub fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.position)
    }

    /// Consumes and returns the next token, or fails at end of input.
    pub fn next_token(&mut self) -> Result<Token, ParseError> {
        let token = self
            .tokens
            .get(self.position)
            .cloned()
            .ok_or(ParseError::UnexpectedEndOfInput)?;
        self.position += 1;
        Ok(token)
    }

    /// Consumes the next token if it is the given operator.
    pub fn eat_operator(&mut self, text: &str) -> bool {
        if self.peek_is_operator(text) {
            self.position += 1;
            true
        } else {
            false
        }
    }

    pub fn peek_is_operator(&self, text: &str) -> bool {
        self.peek()
            .is_some_and(|t| t.kind == TokenKind::Operator && t.text == text)
    }

    /// Consumes the next token, requiring an exact operator. Used for the
    /// inner delimiters of rules (`,`, `]`).
    pub fn expect_operator(&mut self, expected: &'static str) -> Result<Token, ParseError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Operator && t.text == expected => self.next_token(),
            Some(t) => Err(ParseError::ExpectedToken {
                expected,
                found: t.text.clone(),
                line: t.line,
                column: t.column,
            }),
            None => Err(ParseError::UnexpectedEndOfInput),
        }
    }

    /// Like [`expect_operator`](Self::expect_operator) but reports the
    /// distinct unbalanced-parentheses error. Used for closing `)` and `]`.
    pub fn expect_closing(&mut self, expected: &'static str) -> Result<(), ParseError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Operator && t.text == expected => {
                self.position += 1;
                Ok(())
            }
            Some(t) => Err(ParseError::UnbalancedParentheses {
                expected,
                line: t.line,
                column: t.column,
            }),
            None => {
                let (line, column) = self.last_position();
                Err(ParseError::UnbalancedParentheses {
                    expected,
                    line,
                    column,
                })
            }
        }
    }

    /// Consumes a symbol token and returns its text.
    pub fn expect_symbol(&mut self) -> Result<Token, ParseError> {
        match self.peek() {
            Some(t) if t.kind == TokenKind::Symbol => self.next_token(),
            Some(t) => Err(ParseError::ExpectedToken {
                expected: "symbol",
                found: t.text.clone(),
                line: t.line,
                column: t.column,
            }),
            None => Err(ParseError::UnexpectedEndOfInput),
        }
    }

    /// Fails unless the whole stream has been consumed.
    pub fn expect_end(&self) -> Result<(), ParseError> {
        match self.peek() {
            None => Ok(()),
            Some(t) => Err(ParseError::UnexpectedToken {
                text: t.text.clone(),
                line: t.line,
                column: t.column,
            }),
        }
    }

    fn last_position(&self) -> (u32, u32) {
        self.tokens
            .last()
            .map(|t| (t.line, t.column))
            .unwrap_or((1, 0))
    }

    /// The precedence-climbing loop.
    pub fn parse_expression(&mut self, min_precedence: u8) -> Result<T, ParseError> {
        let token = self.next_token()?;
        let prefix = self.rules.prefix_rule(&token).ok_or_else(|| {
            ParseError::NoMatchingPrefixRule {
                text: token.text.clone(),
                line: token.line,
                column: token.column,
            }
        })?;
        let mut left = prefix(self, &token)?;

        loop {
            let Some(next) = self.peek() else { break };
            let Some((precedence, parse)) = self.rules.infix_rule(next) else {
                break;
            };
            if precedence <= min_precedence {
                break;
            }
            let token = self.next_token()?;
            left = parse(self, left, &token)?;
        }
        Ok(left)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::token::tokenize;

    /// A miniature integer-expression grammar, enough to exercise the
    /// engine without the full path grammar.
    #[derive(Debug, PartialEq)]
    enum Expr {
        Num(i64),
        Add(Box<Expr>, Box<Expr>),
        Sub(Box<Expr>, Box<Expr>),
        Pow(Box<Expr>, Box<Expr>),
    }

    fn num(parser: &mut Parser<'_, Expr>, token: &Token) -> Result<Expr, ParseError> {
        let _ = parser;
        Ok(Expr::Num(token.text.parse().unwrap()))
    }

    fn add(parser: &mut Parser<'_, Expr>, left: Expr, _token: &Token) -> Result<Expr, ParseError> {
        let right = parser.parse_expression(2)?;
        Ok(Expr::Add(Box::new(left), Box::new(right)))
    }

    fn sub(parser: &mut Parser<'_, Expr>, left: Expr, _token: &Token) -> Result<Expr, ParseError> {
        let right = parser.parse_expression(2)?;
        Ok(Expr::Sub(Box::new(left), Box::new(right)))
    }

    fn pow(parser: &mut Parser<'_, Expr>, left: Expr, _token: &Token) -> Result<Expr, ParseError> {
        // Right-associative: re-enter one below our own precedence.
        let right = parser.parse_expression(3)?;
        Ok(Expr::Pow(Box::new(left), Box::new(right)))
    }

    static RULES: RuleSet<Expr> = RuleSet {
        prefix: &[PrefixEntry {
            key: RuleKey::Kind(TokenKind::Number),
            parse: num,
        }],
        infix: &[
            InfixEntry {
                key: RuleKey::Text(TokenKind::Operator, "+"),
                precedence: 2,
                parse: add,
            },
            InfixEntry {
                key: RuleKey::Text(TokenKind::Operator, "-"),
                precedence: 2,
                parse: sub,
            },
            InfixEntry {
                key: RuleKey::Text(TokenKind::Operator, "^"),
                precedence: 4,
                parse: pow,
            },
        ],
    };

    fn parse(input: &str) -> Result<Expr, ParseError> {
        let mut parser = Parser::new(tokenize(input).unwrap(), &RULES);
        let expr = parser.parse_expression(0)?;
        parser.expect_end()?;
        Ok(expr)
    }

    #[test]
    fn left_associative_chain() {
        // (1 - 2) - 3
        assert_eq!(
            parse("1 - 2 - 3").unwrap(),
            Expr::Sub(
                Box::new(Expr::Sub(Box::new(Expr::Num(1)), Box::new(Expr::Num(2)))),
                Box::new(Expr::Num(3)),
            )
        );
    }

    #[test]
    fn right_associative_exponent() {
        // 2 ^ (3 ^ 4)
        assert_eq!(
            parse("2 ^ 3 ^ 4").unwrap(),
            Expr::Pow(
                Box::new(Expr::Num(2)),
                Box::new(Expr::Pow(Box::new(Expr::Num(3)), Box::new(Expr::Num(4)))),
            )
        );
    }

    #[test]
    fn missing_prefix_rule() {
        let err = parse("+ 1").unwrap_err();
        assert!(matches!(err, ParseError::NoMatchingPrefixRule { .. }));
        assert!(err.to_string().contains("No matching prefix parselet"));
    }

    #[test]
    fn premature_end_of_input() {
        assert_eq!(parse("1 + "), Err(ParseError::UnexpectedEndOfInput));
    }
}
