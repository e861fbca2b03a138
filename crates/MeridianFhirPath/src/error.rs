//! Error types for tokenizing, parsing, and evaluating path expressions.
//!
//! Each stage of the pipeline has its own error enum so that callers can
//! react to the failure class they care about. All of them are plain,
//! deterministic values: there is nothing transient to retry, and a failed
//! call leaves no state behind.

use thiserror::Error;

/// Result type alias for the crate's public entry points.
pub type FhirPathResult<T> = Result<T, FhirPathError>;

/// Raised by the tokenizer when the source text cannot be split into tokens.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LexError {
    #[error("Unrecognized character '{character}' (line {line}, column {column})")]
    UnrecognizedCharacter { character: char, line: u32, column: u32 },

    #[error("Unterminated string literal (line {line}, column {column})")]
    UnterminatedString { line: u32, column: u32 },

    #[error("Unterminated comment (line {line}, column {column})")]
    UnterminatedComment { line: u32, column: u32 },

    #[error("Invalid escape sequence '\\{escape}' (line {line}, column {column})")]
    InvalidEscape { escape: char, line: u32, column: u32 },
}

/// Raised by the parser core when a token stream does not form a valid
/// expression.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("Parse error at \"{text}\" (line {line}, column {column}). No matching prefix parselet.")]
    NoMatchingPrefixRule { text: String, line: u32, column: u32 },

    /// The input ended while the grammar still expected more tokens.
    #[error("Unexpected end of input")]
    UnexpectedEndOfInput,

    /// A group or indexer was opened but never closed.
    #[error("Unbalanced parentheses: expected '{expected}' (line {line}, column {column})")]
    UnbalancedParentheses { expected: &'static str, line: u32, column: u32 },

    #[error("Expected '{expected}' but found \"{found}\" (line {line}, column {column})")]
    ExpectedToken { expected: &'static str, found: String, line: u32, column: u32 },

    #[error("Unexpected token \"{text}\" (line {line}, column {column})")]
    UnexpectedToken { text: String, line: u32, column: u32 },

    #[error("Unrecognized function: {name}")]
    UnrecognizedFunction { name: String },

    /// A `(` was applied to something that is not a plain symbol.
    #[error("Unexpected parentheses")]
    UnexpectedParentheses,
}

/// Raised while evaluating a parsed expression against a document.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError {
    /// Input-cardinality contract violation on a single-valued function.
    #[error("Expected {count} arguments")]
    ExpectedArguments { count: usize },

    #[error("Expected input length one for {function}()")]
    SingletonRequired { function: String },

    #[error("Expected a number for {function}(num)")]
    NumberRequired { function: String },

    #[error("Undefined variable %{name}")]
    UndefinedVariable { name: String },

    #[error("String function cannot be called with non-string")]
    NonStringInput,

    #[error("Math function cannot be called with non-number")]
    NonNumericInput,

    #[error("Unrecognized function: {name}")]
    UnrecognizedFunction { name: String },

    #[error("{message}")]
    Invalid { message: String },
}

impl EvalError {
    /// Shorthand for the free-form variant.
    pub fn invalid(message: impl Into<String>) -> Self {
        EvalError::Invalid {
            message: message.into(),
        }
    }
}

/// Umbrella error for the crate's public entry points.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FhirPathError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Eval(#[from] EvalError),
}
