//! # meridian-fhirpath
//!
//! A path expression language for tree-shaped clinical documents: a
//! tokenizer, a table-driven precedence-climbing parser, and a typed
//! evaluator with the standard function library.
//!
//! Expressions compile once into immutable [`Atom`] trees and can then be
//! evaluated any number of times, concurrently, against JSON documents.
//! Evaluation is synchronous and side-effect-free; every result is a
//! sequence of [`TypedValue`]s.
//!
//! ```rust
//! use serde_json::json;
//! use meridian_fhirpath::eval_fhirpath;
//!
//! let patient = json!({
//!     "resourceType": "Patient",
//!     "name": [{"given": ["Alice"], "family": "Smith"}]
//! });
//! let result = eval_fhirpath("Patient.name.given", &patient).unwrap();
//! assert_eq!(result.len(), 1);
//! ```
//!
//! The parser core in [`parser`] is grammar-agnostic and is reused by the
//! search layer for its `_filter` grammar.

pub mod atom;
pub mod context;
pub mod datetime;
pub mod error;
pub mod eval;
pub mod functions;
pub mod grammar;
pub mod parser;
pub mod schema;
pub mod token;
pub mod value;

use std::collections::HashMap;

pub use atom::Atom;
pub use context::EvalContext;
pub use error::{EvalError, FhirPathError, FhirPathResult, LexError, ParseError};
pub use schema::{FieldInfo, SchemaRegistry, SearchParamDef, SearchParamKind, TypeSchema};
pub use value::{TypeTag, TypedValue};

use serde_json::Value as Json;

/// Compiles a path expression into a reusable Atom tree.
pub fn parse_expression(input: &str) -> FhirPathResult<Atom> {
    let tokens = token::tokenize(input)?;
    Ok(grammar::parse_tokens(tokens)?)
}

/// Evaluates a compiled expression against an input sequence.
///
/// The expression is applied once per input element and the results are
/// concatenated, so member access broadcasts across collections. Variables
/// are visible as `%name` references.
pub fn evaluate(
    atom: &Atom,
    input: &[TypedValue],
    variables: &HashMap<String, TypedValue>,
) -> FhirPathResult<Vec<TypedValue>> {
    let ctx = EvalContext::root(variables.clone());
    let mut result = Vec::new();
    if input.is_empty() {
        result.extend(atom.eval(&ctx, &[])?);
    } else {
        for element in input {
            result.extend(atom.eval(&ctx, std::slice::from_ref(element))?);
        }
    }
    Ok(result)
}

/// Parses and evaluates an expression against one JSON document.
///
/// Binds `%context` and `%resource` to the document, matching the
/// conventions of the surrounding system.
pub fn eval_fhirpath(expression: &str, document: &Json) -> FhirPathResult<Vec<TypedValue>> {
    eval_fhirpath_with_variables(expression, document, &HashMap::new())
}

/// [`eval_fhirpath`] with additional caller-supplied variables.
pub fn eval_fhirpath_with_variables(
    expression: &str,
    document: &Json,
    variables: &HashMap<String, TypedValue>,
) -> FhirPathResult<Vec<TypedValue>> {
    let atom = parse_expression(expression)?;
    let input: Vec<TypedValue> = TypedValue::from_json(document).into_iter().collect();
    let mut all_variables = variables.clone();
    if let Some(root) = input.first() {
        all_variables
            .entry("context".to_string())
            .or_insert_with(|| root.clone());
        all_variables
            .entry("resource".to_string())
            .or_insert_with(|| root.clone());
    }
    evaluate(&atom, &input, &all_variables)
}
