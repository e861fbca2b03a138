//! # meridian-fhir-search
//!
//! The structured search layer on top of [`meridian_fhirpath`]:
//!
//! - [`request`]: REST-style query strings parsed into [`SearchRequest`]
//!   structures, and formatted back into canonical form.
//! - [`filter`]: the `_filter` comparator grammar, running on the shared
//!   precedence-climbing parser core.
//! - [`details`]: schema-driven classification of search parameters.
//! - [`chain`]: chained and reverse-chained (`_has`) parameter resolution.
//! - [`matcher`]: in-memory evaluation of a request against one document.
//!
//! All entry points are synchronous and side-effect-free; a failing parse
//! or match cannot corrupt state needed by the next call.

pub mod chain;
pub mod details;
pub mod error;
pub mod filter;
pub mod matcher;
pub mod request;

pub use chain::{ChainLink, ChainedParameter, parse_chained_parameter};
pub use details::{SearchParamDetails, SearchParamType, get_search_param_details};
pub use error::{SearchError, SearchResult};
pub use filter::{ConnectiveKeyword, FilterExpression, parse_filter_parameter};
pub use matcher::matches_search_request;
pub use request::{
    Filter, IncludeTarget, Operator, SearchRequest, SortRule, TotalMode, format_search_query,
    parse_search_request, parse_search_url, split_search_on_comma,
};
