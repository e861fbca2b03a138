//! The path expression grammar: prefix/infix rule tables for the parser
//! core, producing [`Atom`] trees.

use rust_decimal::Decimal;

use crate::atom::{Atom, BinaryOp, UnaryOp};
use crate::error::ParseError;
use crate::functions;
use crate::parser::{InfixEntry, Parser, PrefixEntry, RuleKey, RuleSet};
use crate::token::{Token, TokenKind};
use crate::value::{TypeTag, TypedValue};

/// Binding powers, low to high.
pub mod precedence {
    pub const IMPLIES: u8 = 1;
    pub const OR: u8 = 2;
    pub const AND: u8 = 3;
    pub const MEMBERSHIP: u8 = 4;
    pub const UNION: u8 = 5;
    pub const EQUALITY: u8 = 6;
    pub const COMPARISON: u8 = 7;
    pub const TYPE_TEST: u8 = 8;
    pub const ADDITIVE: u8 = 9;
    pub const MULTIPLICATIVE: u8 = 10;
    pub const EXPONENT: u8 = 11;
    pub const UNARY: u8 = 12;
    pub const DOT: u8 = 13;
    pub const INDEXER: u8 = 14;
    pub const FUNCTION_CALL: u8 = 15;
}

/// Parses a token stream into an Atom tree, requiring full consumption.
pub fn parse_tokens(tokens: Vec<Token>) -> Result<Atom, ParseError> {
    let mut parser = Parser::new(tokens, &PATH_RULES);
    let atom = parser.parse_expression(0)?;
    parser.expect_end()?;
    Ok(atom)
}

// Prefix rules

fn parse_number(_parser: &mut Parser<'_, Atom>, token: &Token) -> Result<Atom, ParseError> {
    let value = if token.text.contains('.') {
        token
            .text
            .parse::<Decimal>()
            .map(TypedValue::decimal)
            .map_err(|_| invalid_number(token))?
    } else {
        match token.text.parse::<i64>() {
            Ok(i) => TypedValue::integer(i),
            Err(_) => token
                .text
                .parse::<Decimal>()
                .map(TypedValue::decimal)
                .map_err(|_| invalid_number(token))?,
        }
    };
    Ok(Atom::Literal(value))
}

fn invalid_number(token: &Token) -> ParseError {
    ParseError::UnexpectedToken {
        text: token.text.clone(),
        line: token.line,
        column: token.column,
    }
}

fn parse_string(_parser: &mut Parser<'_, Atom>, token: &Token) -> Result<Atom, ParseError> {
    Ok(Atom::Literal(TypedValue::string(token.text.clone())))
}

fn parse_date_time(_parser: &mut Parser<'_, Atom>, token: &Token) -> Result<Atom, ParseError> {
    let text = token.text.clone();
    let tag = if text.starts_with('T') {
        TypeTag::Time
    } else if text.contains('T') {
        TypeTag::DateTime
    } else {
        TypeTag::Date
    };
    Ok(Atom::Literal(TypedValue::tagged_string(tag, text)))
}

fn parse_true(_parser: &mut Parser<'_, Atom>, _token: &Token) -> Result<Atom, ParseError> {
    Ok(Atom::Literal(TypedValue::boolean(true)))
}

fn parse_false(_parser: &mut Parser<'_, Atom>, _token: &Token) -> Result<Atom, ParseError> {
    Ok(Atom::Literal(TypedValue::boolean(false)))
}

fn parse_symbol(_parser: &mut Parser<'_, Atom>, token: &Token) -> Result<Atom, ParseError> {
    Ok(Atom::Symbol(token.text.clone()))
}

fn parse_group(parser: &mut Parser<'_, Atom>, _token: &Token) -> Result<Atom, ParseError> {
    let inner = parser.parse_expression(0)?;
    parser.expect_closing(")")?;
    Ok(inner)
}

fn parse_empty_set(parser: &mut Parser<'_, Atom>, _token: &Token) -> Result<Atom, ParseError> {
    parser.expect_operator("}")?;
    Ok(Atom::EmptySet)
}

fn parse_unary_minus(parser: &mut Parser<'_, Atom>, _token: &Token) -> Result<Atom, ParseError> {
    let child = parser.parse_expression(precedence::UNARY)?;
    Ok(Atom::Unary {
        op: UnaryOp::Negate,
        child: Box::new(child),
    })
}

fn parse_unary_plus(parser: &mut Parser<'_, Atom>, _token: &Token) -> Result<Atom, ParseError> {
    let child = parser.parse_expression(precedence::UNARY)?;
    Ok(Atom::Unary {
        op: UnaryOp::Plus,
        child: Box::new(child),
    })
}

// Infix rules

fn parse_dot(parser: &mut Parser<'_, Atom>, left: Atom, _token: &Token) -> Result<Atom, ParseError> {
    let right = parser.parse_expression(precedence::DOT)?;
    Ok(Atom::Dot {
        left: Box::new(left),
        right: Box::new(right),
    })
}

fn parse_indexer(
    parser: &mut Parser<'_, Atom>,
    left: Atom,
    _token: &Token,
) -> Result<Atom, ParseError> {
    let index = parser.parse_expression(0)?;
    parser.expect_closing("]")?;
    Ok(Atom::Indexer {
        left: Box::new(left),
        index: Box::new(index),
    })
}

/// `(` after a symbol is a function call; after anything else it is an
/// error. The function name is validated against the registry here, at
/// parse time.
fn parse_function_call(
    parser: &mut Parser<'_, Atom>,
    left: Atom,
    _token: &Token,
) -> Result<Atom, ParseError> {
    let Atom::Symbol(name) = left else {
        return Err(ParseError::UnexpectedParentheses);
    };
    if !functions::is_registered(&name) {
        return Err(ParseError::UnrecognizedFunction { name });
    }
    let mut args = Vec::new();
    if !parser.peek_is_operator(")") {
        loop {
            args.push(parser.parse_expression(0)?);
            if !parser.eat_operator(",") {
                break;
            }
        }
    }
    parser.expect_closing(")")?;
    Ok(Atom::Function { name, args })
}

macro_rules! arithmetic_rule {
    ($name:ident, $op:expr, $precedence:expr) => {
        fn $name(
            parser: &mut Parser<'_, Atom>,
            left: Atom,
            _token: &Token,
        ) -> Result<Atom, ParseError> {
            let right = parser.parse_expression($precedence)?;
            Ok(Atom::Arithmetic {
                op: $op,
                left: Box::new(left),
                right: Box::new(right),
            })
        }
    };
}

arithmetic_rule!(parse_add, BinaryOp::Add, precedence::ADDITIVE);
arithmetic_rule!(parse_subtract, BinaryOp::Subtract, precedence::ADDITIVE);
arithmetic_rule!(parse_multiply, BinaryOp::Multiply, precedence::MULTIPLICATIVE);
arithmetic_rule!(parse_divide, BinaryOp::Divide, precedence::MULTIPLICATIVE);
arithmetic_rule!(parse_int_divide, BinaryOp::IntDivide, precedence::MULTIPLICATIVE);
arithmetic_rule!(parse_modulo, BinaryOp::Modulo, precedence::MULTIPLICATIVE);
arithmetic_rule!(parse_less_than, BinaryOp::LessThan, precedence::COMPARISON);
arithmetic_rule!(parse_less_or_equal, BinaryOp::LessThanOrEquals, precedence::COMPARISON);
arithmetic_rule!(parse_greater_than, BinaryOp::GreaterThan, precedence::COMPARISON);
arithmetic_rule!(parse_greater_or_equal, BinaryOp::GreaterThanOrEquals, precedence::COMPARISON);

/// Exponentiation is right-associative: re-enter one below its own level.
fn parse_exponent(
    parser: &mut Parser<'_, Atom>,
    left: Atom,
    _token: &Token,
) -> Result<Atom, ParseError> {
    let right = parser.parse_expression(precedence::EXPONENT - 1)?;
    Ok(Atom::Arithmetic {
        op: BinaryOp::Exponent,
        left: Box::new(left),
        right: Box::new(right),
    })
}

macro_rules! binary_rule {
    ($name:ident, $variant:ident, $precedence:expr) => {
        fn $name(
            parser: &mut Parser<'_, Atom>,
            left: Atom,
            _token: &Token,
        ) -> Result<Atom, ParseError> {
            let right = parser.parse_expression($precedence)?;
            Ok(Atom::$variant {
                left: Box::new(left),
                right: Box::new(right),
            })
        }
    };
}

binary_rule!(parse_concat, Concat, precedence::ADDITIVE);
binary_rule!(parse_union, Union, precedence::UNION);
binary_rule!(parse_equals, Equals, precedence::EQUALITY);
binary_rule!(parse_not_equals, NotEquals, precedence::EQUALITY);
binary_rule!(parse_equivalent, Equivalent, precedence::EQUALITY);
binary_rule!(parse_not_equivalent, NotEquivalent, precedence::EQUALITY);
binary_rule!(parse_and, And, precedence::AND);
binary_rule!(parse_or, Or, precedence::OR);
binary_rule!(parse_xor, Xor, precedence::OR);
binary_rule!(parse_implies, Implies, precedence::IMPLIES);
binary_rule!(parse_in, In, precedence::MEMBERSHIP);
binary_rule!(parse_contains, Contains, precedence::MEMBERSHIP);

fn parse_is(parser: &mut Parser<'_, Atom>, left: Atom, _token: &Token) -> Result<Atom, ParseError> {
    let type_name = parse_type_specifier(parser)?;
    Ok(Atom::Is {
        child: Box::new(left),
        type_name,
    })
}

fn parse_as(parser: &mut Parser<'_, Atom>, left: Atom, _token: &Token) -> Result<Atom, ParseError> {
    let type_name = parse_type_specifier(parser)?;
    Ok(Atom::As {
        child: Box::new(left),
        type_name,
    })
}

/// A type specifier is a symbol, optionally namespace-qualified
/// (`FHIR.Patient`, `System.Boolean`).
fn parse_type_specifier(parser: &mut Parser<'_, Atom>) -> Result<String, ParseError> {
    let mut name = parser.expect_symbol()?.text;
    while parser.eat_operator(".") {
        name.push('.');
        name.push_str(&parser.expect_symbol()?.text);
    }
    Ok(name)
}

macro_rules! prefix {
    ($key:expr, $parse:expr) => {
        PrefixEntry {
            key: $key,
            parse: $parse,
        }
    };
}

macro_rules! infix {
    ($key:expr, $precedence:expr, $parse:expr) => {
        InfixEntry {
            key: $key,
            precedence: $precedence,
            parse: $parse,
        }
    };
}

use RuleKey::{Kind, Text};
use TokenKind::{DateTime, Number, Operator, String as StringKind, Symbol};

/// The full path expression grammar as data.
pub static PATH_RULES: RuleSet<Atom> = RuleSet {
    prefix: &[
        prefix!(Kind(Number), parse_number),
        prefix!(Kind(StringKind), parse_string),
        prefix!(Kind(DateTime), parse_date_time),
        prefix!(Text(Symbol, "true"), parse_true),
        prefix!(Text(Symbol, "false"), parse_false),
        prefix!(Kind(Symbol), parse_symbol),
        prefix!(Text(Operator, "("), parse_group),
        prefix!(Text(Operator, "{"), parse_empty_set),
        prefix!(Text(Operator, "-"), parse_unary_minus),
        prefix!(Text(Operator, "+"), parse_unary_plus),
    ],
    infix: &[
        infix!(Text(Operator, "."), precedence::DOT, parse_dot),
        infix!(Text(Operator, "["), precedence::INDEXER, parse_indexer),
        infix!(Text(Operator, "("), precedence::FUNCTION_CALL, parse_function_call),
        infix!(Text(Operator, "^"), precedence::EXPONENT, parse_exponent),
        infix!(Text(Operator, "*"), precedence::MULTIPLICATIVE, parse_multiply),
        infix!(Text(Operator, "/"), precedence::MULTIPLICATIVE, parse_divide),
        infix!(Text(Symbol, "div"), precedence::MULTIPLICATIVE, parse_int_divide),
        infix!(Text(Symbol, "mod"), precedence::MULTIPLICATIVE, parse_modulo),
        infix!(Text(Operator, "+"), precedence::ADDITIVE, parse_add),
        infix!(Text(Operator, "-"), precedence::ADDITIVE, parse_subtract),
        infix!(Text(Operator, "&"), precedence::ADDITIVE, parse_concat),
        infix!(Text(Operator, "|"), precedence::UNION, parse_union),
        infix!(Text(Operator, "="), precedence::EQUALITY, parse_equals),
        infix!(Text(Operator, "!="), precedence::EQUALITY, parse_not_equals),
        infix!(Text(Operator, "~"), precedence::EQUALITY, parse_equivalent),
        infix!(Text(Operator, "!~"), precedence::EQUALITY, parse_not_equivalent),
        infix!(Text(Operator, "<"), precedence::COMPARISON, parse_less_than),
        infix!(Text(Operator, "<="), precedence::COMPARISON, parse_less_or_equal),
        infix!(Text(Operator, ">"), precedence::COMPARISON, parse_greater_than),
        infix!(Text(Operator, ">="), precedence::COMPARISON, parse_greater_or_equal),
        infix!(Text(Symbol, "is"), precedence::TYPE_TEST, parse_is),
        infix!(Text(Symbol, "as"), precedence::TYPE_TEST, parse_as),
        infix!(Text(Symbol, "in"), precedence::MEMBERSHIP, parse_in),
        infix!(Text(Symbol, "contains"), precedence::MEMBERSHIP, parse_contains),
        infix!(Text(Symbol, "and"), precedence::AND, parse_and),
        infix!(Text(Symbol, "or"), precedence::OR, parse_or),
        infix!(Text(Symbol, "xor"), precedence::OR, parse_xor),
        infix!(Text(Symbol, "implies"), precedence::IMPLIES, parse_implies),
    ],
};
