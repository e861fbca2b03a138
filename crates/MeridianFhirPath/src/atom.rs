//! The Atom model: the abstract syntax tree of a parsed path expression.
//!
//! An Atom tree is built once by the parser and is immutable afterwards;
//! evaluation never mutates it, so trees can be cached and shared across
//! threads. Every traversal in the crate pattern-matches exhaustively on
//! this enum — adding a variant is a compile error until each consumer
//! handles it.

use std::fmt;

use crate::value::TypedValue;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Plus,
    Negate,
}

/// Arithmetic and ordering operators that share operand handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
    IntDivide,
    Modulo,
    Exponent,
    LessThan,
    LessThanOrEquals,
    GreaterThan,
    GreaterThanOrEquals,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Subtract => "-",
            BinaryOp::Multiply => "*",
            BinaryOp::Divide => "/",
            BinaryOp::IntDivide => "div",
            BinaryOp::Modulo => "mod",
            BinaryOp::Exponent => "^",
            BinaryOp::LessThan => "<",
            BinaryOp::LessThanOrEquals => "<=",
            BinaryOp::GreaterThan => ">",
            BinaryOp::GreaterThanOrEquals => ">=",
        }
    }
}

/// One node of a parsed path expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Atom {
    /// A literal value (`'text'`, `42`, `true`, `@2021-01-01`).
    Literal(TypedValue),
    /// A member name, resource type, `$this`, or `%variable`.
    Symbol(String),
    /// The empty collection `{}`.
    EmptySet,
    /// Unary `-` / `+`.
    Unary { op: UnaryOp, child: Box<Atom> },
    /// Element-wise arithmetic or ordering comparison.
    Arithmetic {
        op: BinaryOp,
        left: Box<Atom>,
        right: Box<Atom>,
    },
    /// `&` string concatenation.
    Concat { left: Box<Atom>, right: Box<Atom> },
    /// `|` sequence union (no deduplication).
    Union { left: Box<Atom>, right: Box<Atom> },
    Equals { left: Box<Atom>, right: Box<Atom> },
    NotEquals { left: Box<Atom>, right: Box<Atom> },
    /// `~` order-insensitive equivalence.
    Equivalent { left: Box<Atom>, right: Box<Atom> },
    NotEquivalent { left: Box<Atom>, right: Box<Atom> },
    /// Three-valued boolean connectives.
    And { left: Box<Atom>, right: Box<Atom> },
    Or { left: Box<Atom>, right: Box<Atom> },
    Xor { left: Box<Atom>, right: Box<Atom> },
    Implies { left: Box<Atom>, right: Box<Atom> },
    /// `left in right` membership.
    In { left: Box<Atom>, right: Box<Atom> },
    /// `left contains right` membership.
    Contains { left: Box<Atom>, right: Box<Atom> },
    /// `is TypeName` type test.
    Is { child: Box<Atom>, type_name: String },
    /// `as TypeName` type filter; yields the value on a match, else empty.
    As { child: Box<Atom>, type_name: String },
    /// `.` member access: right side evaluated once per left element.
    Dot { left: Box<Atom>, right: Box<Atom> },
    /// `left[index]`.
    Indexer { left: Box<Atom>, index: Box<Atom> },
    /// Function call; arguments stay unevaluated until the function body
    /// decides to evaluate them.
    Function { name: String, args: Vec<Atom> },
}

impl Atom {
    pub fn symbol(name: impl Into<String>) -> Atom {
        Atom::Symbol(name.into())
    }

    /// Collects the leaf-to-root chain of member names for a plain dotted
    /// path (`Patient.name.given`), or `None` if the tree contains anything
    /// but symbols and dots. Used by search parameter classification.
    pub fn as_simple_path(&self) -> Option<Vec<&str>> {
        match self {
            Atom::Symbol(name) => Some(vec![name.as_str()]),
            Atom::Dot { left, right } => {
                let mut path = left.as_simple_path()?;
                path.extend(right.as_simple_path()?);
                Some(path)
            }
            _ => None,
        }
    }

    /// Flattens `|` unions into the list of alternative subtrees.
    pub fn union_branches(&self) -> Vec<&Atom> {
        match self {
            Atom::Union { left, right } => {
                let mut branches = left.union_branches();
                branches.extend(right.union_branches());
                branches
            }
            other => vec![other],
        }
    }
}

impl fmt::Display for Atom {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Atom::Literal(value) => match &value.value {
                crate::value::Value::Str(s) => write!(f, "'{}'", s),
                other => write!(f, "{}", crate::value::stringify(&TypedValue {
                    ty: value.ty,
                    value: other.clone(),
                })),
            },
            Atom::Symbol(name) => write!(f, "{}", name),
            Atom::EmptySet => write!(f, "{{}}"),
            Atom::Unary { op, child } => {
                let symbol = match op {
                    UnaryOp::Plus => "+",
                    UnaryOp::Negate => "-",
                };
                write!(f, "{}{}", symbol, child)
            }
            Atom::Arithmetic { op, left, right } => {
                write!(f, "{} {} {}", left, op.symbol(), right)
            }
            Atom::Concat { left, right } => write!(f, "{} & {}", left, right),
            Atom::Union { left, right } => write!(f, "{} | {}", left, right),
            Atom::Equals { left, right } => write!(f, "{} = {}", left, right),
            Atom::NotEquals { left, right } => write!(f, "{} != {}", left, right),
            Atom::Equivalent { left, right } => write!(f, "{} ~ {}", left, right),
            Atom::NotEquivalent { left, right } => write!(f, "{} !~ {}", left, right),
            Atom::And { left, right } => write!(f, "{} and {}", left, right),
            Atom::Or { left, right } => write!(f, "{} or {}", left, right),
            Atom::Xor { left, right } => write!(f, "{} xor {}", left, right),
            Atom::Implies { left, right } => write!(f, "{} implies {}", left, right),
            Atom::In { left, right } => write!(f, "{} in {}", left, right),
            Atom::Contains { left, right } => write!(f, "{} contains {}", left, right),
            Atom::Is { child, type_name } => write!(f, "{} is {}", child, type_name),
            Atom::As { child, type_name } => write!(f, "{} as {}", child, type_name),
            Atom::Dot { left, right } => write!(f, "{}.{}", left, right),
            Atom::Indexer { left, index } => write!(f, "{}[{}]", left, index),
            Atom::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                write!(f, ")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_path_extraction() {
        let atom = Atom::Dot {
            left: Box::new(Atom::Dot {
                left: Box::new(Atom::symbol("Patient")),
                right: Box::new(Atom::symbol("name")),
            }),
            right: Box::new(Atom::symbol("given")),
        };
        assert_eq!(atom.as_simple_path(), Some(vec!["Patient", "name", "given"]));

        let func = Atom::Function {
            name: "first".to_string(),
            args: vec![],
        };
        assert_eq!(func.as_simple_path(), None);
    }

    #[test]
    fn union_branches_flatten() {
        let atom = Atom::Union {
            left: Box::new(Atom::Union {
                left: Box::new(Atom::symbol("a")),
                right: Box::new(Atom::symbol("b")),
            }),
            right: Box::new(Atom::symbol("c")),
        };
        assert_eq!(atom.union_branches().len(), 3);
    }
}
