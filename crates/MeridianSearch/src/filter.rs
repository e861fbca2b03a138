//! The `_filter` comparator grammar.
//!
//! A small boolean expression language over search parameters:
//! `path op "value"`, `not(expr)`, `and`/`or` connectives, parentheses.
//! It runs on the same precedence-climbing parser core as the path
//! expression language, with its own rule tables.

use std::fmt;

use serde::{Deserialize, Serialize};

use meridian_fhirpath::error::ParseError;
use meridian_fhirpath::parser::{InfixEntry, Parser, PrefixEntry, RuleKey, RuleSet};
use meridian_fhirpath::token::{Token, TokenKind, tokenize};

use crate::error::{SearchError, SearchResult};
use crate::request::Operator;

/// Operator codes accepted by the grammar. `re` maps to plain equality,
/// matching observed behavior of the system this reimplements.
const FILTER_OPERATORS: &[(&str, Operator)] = &[
    ("eq", Operator::Equals),
    ("ne", Operator::NotEquals),
    ("co", Operator::Contains),
    ("sw", Operator::StartsWith),
    ("ew", Operator::EndsWith),
    ("gt", Operator::GreaterThan),
    ("lt", Operator::LessThan),
    ("ge", Operator::GreaterThanOrEquals),
    ("le", Operator::LessThanOrEquals),
    ("ap", Operator::Approximately),
    ("sa", Operator::StartsAfter),
    ("eb", Operator::EndsBefore),
    ("pr", Operator::Present),
    ("po", Operator::Overlaps),
    ("ss", Operator::Subsumes),
    ("sb", Operator::SubsumedBy),
    ("in", Operator::In),
    ("ni", Operator::NotIn),
    ("re", Operator::Equals),
    ("identifier", Operator::Identifier),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectiveKeyword {
    And,
    Or,
}

impl ConnectiveKeyword {
    fn as_str(&self) -> &'static str {
        match self {
            ConnectiveKeyword::And => "and",
            ConnectiveKeyword::Or => "or",
        }
    }
}

/// A parsed `_filter` expression tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FilterExpression {
    Comparison {
        code: String,
        operator: Operator,
        value: String,
    },
    Negation(Box<FilterExpression>),
    Connective {
        keyword: ConnectiveKeyword,
        left: Box<FilterExpression>,
        right: Box<FilterExpression>,
    },
}

impl fmt::Display for FilterExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterExpression::Comparison {
                code,
                operator,
                value,
            } => {
                let op = FILTER_OPERATORS
                    .iter()
                    .find(|(_, candidate)| candidate == operator)
                    .map(|(name, _)| *name)
                    .unwrap_or("eq");
                write!(f, "{} {} \"{}\"", code, op, value)
            }
            FilterExpression::Negation(inner) => write!(f, "not({})", inner),
            FilterExpression::Connective {
                keyword,
                left,
                right,
            } => write!(f, "{} {} {}", left, keyword.as_str(), right),
        }
    }
}

/// Parses a `_filter` parameter value into an expression tree.
pub fn parse_filter_parameter(input: &str) -> SearchResult<FilterExpression> {
    let tokens = tokenize(input).map_err(meridian_fhirpath::FhirPathError::from)?;
    let mut parser = Parser::new(tokens, &FILTER_RULES);
    let expression = parser
        .parse_expression(0)
        .map_err(translate_parse_error)?;
    parser.expect_end().map_err(translate_parse_error)?;
    Ok(expression)
}

/// The engine reports an unknown operator as an expectation failure on the
/// marker below; everything else passes through as a syntax error.
const OPERATOR_MARKER: &str = "filter operator";

fn translate_parse_error(error: ParseError) -> SearchError {
    match error {
        ParseError::ExpectedToken {
            expected, found, ..
        } if expected == OPERATOR_MARKER => SearchError::UnknownFilterOperator { operator: found },
        other => SearchError::FilterSyntax(other),
    }
}

mod precedence {
    pub const OR: u8 = 1;
    pub const AND: u8 = 2;
}

/// Prefix rule for symbols: either `not(...)` or a comparison
/// `path op value` (the path may be dotted).
fn parse_symbol(
    parser: &mut Parser<'_, FilterExpression>,
    token: &Token,
) -> Result<FilterExpression, ParseError> {
    if token.text == "not" && parser.peek_is_operator("(") {
        parser.expect_operator("(")?;
        let inner = parser.parse_expression(0)?;
        parser.expect_closing(")")?;
        return Ok(FilterExpression::Negation(Box::new(inner)));
    }

    let mut code = token.text.clone();
    while parser.eat_operator(".") {
        code.push('.');
        code.push_str(&parser.expect_symbol()?.text);
    }

    let op_token = parser.expect_symbol()?;
    let operator = FILTER_OPERATORS
        .iter()
        .find(|(name, _)| *name == op_token.text)
        .map(|(_, op)| *op)
        .ok_or(ParseError::ExpectedToken {
            expected: OPERATOR_MARKER,
            found: op_token.text.clone(),
            line: op_token.line,
            column: op_token.column,
        })?;

    // `pr` takes a bare true/false; everything else takes a quoted string,
    // number, or date value.
    let value_token = parser.next_token()?;
    let value = match value_token.kind {
        TokenKind::String
        | TokenKind::Number
        | TokenKind::DateTime
        | TokenKind::Symbol => value_token.text,
        _ => {
            return Err(ParseError::ExpectedToken {
                expected: "filter value",
                found: value_token.text.clone(),
                line: value_token.line,
                column: value_token.column,
            });
        }
    };

    Ok(FilterExpression::Comparison {
        code,
        operator,
        value,
    })
}

fn parse_group(
    parser: &mut Parser<'_, FilterExpression>,
    _token: &Token,
) -> Result<FilterExpression, ParseError> {
    let inner = parser.parse_expression(0)?;
    parser.expect_closing(")")?;
    Ok(inner)
}

fn parse_and(
    parser: &mut Parser<'_, FilterExpression>,
    left: FilterExpression,
    _token: &Token,
) -> Result<FilterExpression, ParseError> {
    let right = parser.parse_expression(precedence::AND)?;
    Ok(FilterExpression::Connective {
        keyword: ConnectiveKeyword::And,
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn parse_or(
    parser: &mut Parser<'_, FilterExpression>,
    left: FilterExpression,
    _token: &Token,
) -> Result<FilterExpression, ParseError> {
    let right = parser.parse_expression(precedence::OR)?;
    Ok(FilterExpression::Connective {
        keyword: ConnectiveKeyword::Or,
        left: Box::new(left),
        right: Box::new(right),
    })
}

static FILTER_RULES: RuleSet<FilterExpression> = RuleSet {
    prefix: &[
        PrefixEntry {
            key: RuleKey::Kind(TokenKind::Symbol),
            parse: parse_symbol,
        },
        PrefixEntry {
            key: RuleKey::Text(TokenKind::Operator, "("),
            parse: parse_group,
        },
    ],
    infix: &[
        InfixEntry {
            key: RuleKey::Text(TokenKind::Symbol, "and"),
            precedence: precedence::AND,
            parse: parse_and,
        },
        InfixEntry {
            key: RuleKey::Text(TokenKind::Symbol, "or"),
            precedence: precedence::OR,
            parse: parse_or,
        },
    ],
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_comparison() {
        let expr = parse_filter_parameter("name co \"pet\"").unwrap();
        assert_eq!(
            expr,
            FilterExpression::Comparison {
                code: "name".to_string(),
                operator: Operator::Contains,
                value: "pet".to_string(),
            }
        );
    }

    #[test]
    fn parses_and_connective() {
        let expr =
            parse_filter_parameter("given eq \"peter\" and birthdate ge 2014-10-10").unwrap();
        let FilterExpression::Connective {
            keyword,
            left,
            right,
        } = expr
        else {
            panic!("expected connective");
        };
        assert_eq!(keyword, ConnectiveKeyword::And);
        assert_eq!(
            *left,
            FilterExpression::Comparison {
                code: "given".to_string(),
                operator: Operator::Equals,
                value: "peter".to_string(),
            }
        );
        assert_eq!(
            *right,
            FilterExpression::Comparison {
                code: "birthdate".to_string(),
                operator: Operator::GreaterThanOrEquals,
                value: "2014-10-10".to_string(),
            }
        );
    }

    #[test]
    fn parses_negation_and_grouping() {
        let expr =
            parse_filter_parameter("not(status eq \"final\") or (code eq \"a\" and code eq \"b\")")
                .unwrap();
        let FilterExpression::Connective { keyword, left, .. } = expr else {
            panic!("expected connective");
        };
        assert_eq!(keyword, ConnectiveKeyword::Or);
        assert!(matches!(*left, FilterExpression::Negation(_)));
    }

    #[test]
    fn and_binds_tighter_than_or() {
        let expr =
            parse_filter_parameter("a eq \"1\" or b eq \"2\" and c eq \"3\"").unwrap();
        let FilterExpression::Connective { keyword, right, .. } = expr else {
            panic!("expected connective");
        };
        assert_eq!(keyword, ConnectiveKeyword::Or);
        assert!(matches!(
            *right,
            FilterExpression::Connective {
                keyword: ConnectiveKeyword::And,
                ..
            }
        ));
    }

    #[test]
    fn unknown_operator_is_a_distinct_error() {
        assert_eq!(
            parse_filter_parameter("name zz \"x\""),
            Err(SearchError::UnknownFilterOperator {
                operator: "zz".to_string()
            })
        );
    }

    #[test]
    fn re_maps_to_plain_equality() {
        let expr = parse_filter_parameter("subject re \"Patient/123\"").unwrap();
        assert!(matches!(
            expr,
            FilterExpression::Comparison {
                operator: Operator::Equals,
                ..
            }
        ));
    }

    #[test]
    fn presence_operator_takes_a_bare_boolean() {
        let expr = parse_filter_parameter("specialty pr true").unwrap();
        assert_eq!(
            expr,
            FilterExpression::Comparison {
                code: "specialty".to_string(),
                operator: Operator::Present,
                value: "true".to_string(),
            }
        );
    }

    #[test]
    fn round_trips_through_display() {
        let text = "given eq \"peter\" and birthdate ge 2014-10-10";
        let expr = parse_filter_parameter(text).unwrap();
        let reparsed = parse_filter_parameter(&expr.to_string()).unwrap();
        assert_eq!(expr, reparsed);
    }
}
