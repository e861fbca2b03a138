//! Schema/type registry: an externally-populated index of type field
//! definitions and pre-declared search parameters.
//!
//! The registry is built once at startup by a bulk loader and is read-only
//! afterwards; the evaluator and the search layer receive it by reference.
//! Nothing in this crate mutates it during evaluation, so concurrent
//! readers need no locking.

use std::collections::HashMap;

use serde::Deserialize;

/// Declared shape of one field of a type.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldInfo {
    /// Declared element type names (more than one for choice types).
    #[serde(default)]
    pub types: Vec<String>,
    /// Whether the field holds a list of values.
    #[serde(default)]
    pub array: bool,
    /// For reference-typed fields: the resource types the reference may
    /// point to.
    #[serde(default)]
    pub targets: Vec<String>,
}

/// Broad, externally-declared category of a search parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchParamKind {
    Number,
    Date,
    String,
    Token,
    Reference,
    Quantity,
    Uri,
    Composite,
    Special,
}

/// One pre-declared search parameter.
#[derive(Debug, Clone, Deserialize)]
pub struct SearchParamDef {
    pub code: String,
    #[serde(rename = "type")]
    pub kind: SearchParamKind,
    /// The path expression this parameter evaluates.
    pub expression: String,
    /// For reference parameters: allowed target resource types.
    #[serde(default)]
    pub target: Vec<String>,
}

/// Field and search parameter index for one type.
#[derive(Debug, Clone, Default)]
pub struct TypeSchema {
    pub fields: HashMap<String, FieldInfo>,
    pub search_params: HashMap<String, SearchParamDef>,
}

/// The registry: `type name → schema`. Constructed explicitly and passed by
/// reference wherever schema answers are needed.
#[derive(Debug, Default)]
pub struct SchemaRegistry {
    types: HashMap<String, TypeSchema>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        SchemaRegistry::default()
    }

    /// Bulk-indexes the fields of one type. Later calls for the same type
    /// merge field maps.
    pub fn index_type(
        &mut self,
        type_name: impl Into<String>,
        fields: impl IntoIterator<Item = (String, FieldInfo)>,
    ) {
        let schema = self.types.entry(type_name.into()).or_default();
        schema.fields.extend(fields);
    }

    /// Registers a search parameter for one base type.
    pub fn index_search_param(&mut self, base_type: impl Into<String>, def: SearchParamDef) {
        let schema = self.types.entry(base_type.into()).or_default();
        schema.search_params.insert(def.code.clone(), def);
    }

    pub fn type_schema(&self, type_name: &str) -> Option<&TypeSchema> {
        self.types.get(type_name)
    }

    pub fn get_field(&self, type_name: &str, field: &str) -> Option<&FieldInfo> {
        self.types.get(type_name)?.fields.get(field)
    }

    pub fn get_search_param(&self, type_name: &str, code: &str) -> Option<&SearchParamDef> {
        self.types.get(type_name)?.search_params.get(code)
    }

    /// All search parameters declared for a type.
    pub fn search_params(&self, type_name: &str) -> impl Iterator<Item = &SearchParamDef> {
        self.types
            .get(type_name)
            .into_iter()
            .flat_map(|s| s.search_params.values())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(types: &[&str], array: bool) -> FieldInfo {
        FieldInfo {
            types: types.iter().map(|s| s.to_string()).collect(),
            array,
            targets: Vec::new(),
        }
    }

    #[test]
    fn indexing_and_lookup() {
        let mut registry = SchemaRegistry::new();
        registry.index_type(
            "Patient",
            vec![
                ("birthDate".to_string(), field(&["date"], false)),
                ("name".to_string(), field(&["HumanName"], true)),
            ],
        );
        registry.index_search_param(
            "Patient",
            SearchParamDef {
                code: "birthdate".to_string(),
                kind: SearchParamKind::Date,
                expression: "Patient.birthDate".to_string(),
                target: Vec::new(),
            },
        );

        assert!(registry.get_field("Patient", "birthDate").is_some());
        assert!(registry.get_field("Patient", "unknown").is_none());
        assert!(registry.get_search_param("Patient", "birthdate").is_some());
        assert!(registry.get_search_param("Observation", "birthdate").is_none());
    }

    #[test]
    fn later_index_calls_merge() {
        let mut registry = SchemaRegistry::new();
        registry.index_type("Patient", vec![("a".to_string(), field(&["string"], false))]);
        registry.index_type("Patient", vec![("b".to_string(), field(&["string"], false))]);
        assert!(registry.get_field("Patient", "a").is_some());
        assert!(registry.get_field("Patient", "b").is_some());
    }

    #[test]
    fn search_param_defs_deserialize() {
        let def: SearchParamDef = serde_json::from_value(serde_json::json!({
            "code": "subject",
            "type": "reference",
            "expression": "Observation.subject",
            "target": ["Patient"]
        }))
        .unwrap();
        assert_eq!(def.kind, SearchParamKind::Reference);
        assert_eq!(def.target, vec!["Patient".to_string()]);
    }
}
