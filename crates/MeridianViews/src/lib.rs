//! # meridian-fhir-views
//!
//! A declarative tabular view evaluator: projects tree-shaped documents
//! into flat output rows according to a recursively-nested selection
//! structure, with Cartesian-product semantics for fan-out.
//!
//! ```rust
//! use serde_json::json;
//! use meridian_fhir_views::{ViewDefinition, evaluate_view};
//!
//! let view = ViewDefinition::from_json(&json!({
//!     "resource": "Patient",
//!     "select": [{
//!         "column": [{"name": "id", "path": "id"}]
//!     }]
//! })).unwrap();
//!
//! let documents = vec![json!({"resourceType": "Patient", "id": "p1"})];
//! let output = evaluate_view(&view, &documents).unwrap();
//! assert_eq!(output.rows.len(), 1);
//! ```

pub mod error;
pub mod eval;
pub mod model;
pub mod output;

pub use error::ViewError;
pub use eval::{OutputRow, ViewOutput, evaluate_view};
pub use model::{Column, Selection, ViewConstant, ViewDefinition, WhereClause};
pub use output::{ContentType, write_output};

use serde_json::Value as Json;

/// Parses, evaluates, and serializes a view in one call.
pub fn run_view_definition(
    view_json: &Json,
    documents: &[Json],
    content_type: ContentType,
) -> Result<Vec<u8>, ViewError> {
    let view = ViewDefinition::from_json(view_json)?;
    let output = evaluate_view(&view, documents)?;
    write_output(&output, content_type)
}
