//! Error types for the search grammar and matcher.

use meridian_fhirpath::error::{FhirPathError, ParseError};
use thiserror::Error;

pub type SearchResult<T> = Result<T, SearchError>;

/// Raised while parsing query strings, `_filter` expressions, chained
/// parameters, or classifying search parameters.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SearchError {
    #[error("Invalid format for {param_type} search parameter: {value}")]
    InvalidSearchValue { param_type: String, value: String },

    #[error("Invalid search value for {key}: {value}")]
    InvalidNumber { key: String, value: String },

    #[error("Unknown filter operator: {operator}")]
    UnknownFilterOperator { operator: String },

    #[error("Invalid filter expression: {0}")]
    FilterSyntax(ParseError),

    #[error("Invalid chained search parameter: {key}")]
    InvalidChain { key: String },

    #[error("Unable to identify next resource type for search parameter: {code}")]
    AmbiguousChainTarget { code: String },

    #[error("Unknown search parameter {code} for resource type {resource_type}")]
    UnknownSearchParameter { resource_type: String, code: String },

    #[error("Search parameter {code} does not reference {resource_type}")]
    InvalidReverseChain { resource_type: String, code: String },

    #[error("Property {property} not found on {type_name}")]
    PropertyNotFound { type_name: String, property: String },

    #[error("Invalid include value '{value}'")]
    InvalidIncludeTarget { value: String },

    #[error(transparent)]
    Expression(#[from] FhirPathError),
}
