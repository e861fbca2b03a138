//! The declarative view model: a recursively-nested selection structure
//! consumed as read-only input, deserialized from its JSON shape.

use serde::{Deserialize, Serialize};
use serde_json::Value as Json;

use crate::error::ViewError;

/// A tabular view over documents of one resource type.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewDefinition {
    /// The resource type this view projects. Required.
    #[serde(default)]
    pub resource: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    /// Named constants bound into the variable scope of every expression.
    #[serde(default)]
    pub constant: Vec<ViewConstant>,
    /// Document-level filters; each must evaluate to exactly one boolean.
    #[serde(default, rename = "where")]
    pub where_clauses: Vec<WhereClause>,
    #[serde(default)]
    pub select: Vec<Selection>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WhereClause {
    pub path: String,
}

/// A constant is declared as `{name, value<Type>}` with a typed value key
/// (`valueString`, `valueInteger`, ...).
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ViewConstant {
    pub name: String,
    #[serde(flatten)]
    pub value: serde_json::Map<String, Json>,
}

impl ViewConstant {
    /// The constant's value, whichever `value[x]` key carries it.
    pub fn value(&self) -> Option<&Json> {
        self.value
            .iter()
            .find(|(key, _)| key.starts_with("value"))
            .map(|(_, value)| value)
    }
}

/// One node of the selection structure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    #[serde(default)]
    pub column: Vec<Column>,
    #[serde(default)]
    pub select: Vec<Selection>,
    #[serde(default)]
    pub union_all: Vec<Selection>,
    /// Fan out over the path's elements; zero elements emit no rows.
    #[serde(default)]
    pub for_each: Option<String>,
    /// Like `forEach`, but zero elements emit one all-null row.
    #[serde(default)]
    pub for_each_or_null: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub name: String,
    pub path: String,
    /// When set, the column always binds a JSON array of values.
    #[serde(default)]
    pub collection: bool,
    #[serde(default)]
    pub description: Option<String>,
}

impl ViewDefinition {
    /// Parses a ViewDefinition from its JSON form.
    pub fn from_json(json: &Json) -> Result<ViewDefinition, ViewError> {
        Ok(serde_json::from_value(json.clone())?)
    }

    /// Structural validation, run once before any evaluation.
    pub fn validate(&self) -> Result<&str, ViewError> {
        let resource = self
            .resource
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                ViewError::InvalidDefinition("missing required 'resource'".to_string())
            })?;
        for selection in &self.select {
            selection.validate()?;
        }
        Ok(resource)
    }

    /// Declared column names across the whole tree, in declaration order.
    pub fn column_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        for selection in &self.select {
            selection.collect_column_names(&mut names);
        }
        names
    }
}

impl Selection {
    fn validate(&self) -> Result<(), ViewError> {
        if self.for_each.is_some() && self.for_each_or_null.is_some() {
            return Err(ViewError::InvalidDefinition(
                "cannot specify both forEach and forEachOrNull".to_string(),
            ));
        }
        for column in &self.column {
            if column.name.is_empty() {
                return Err(ViewError::InvalidDefinition(
                    "column name is required".to_string(),
                ));
            }
            if column.path.is_empty() {
                return Err(ViewError::InvalidDefinition(format!(
                    "column path is required for column '{}'",
                    column.name
                )));
            }
        }
        for child in self.select.iter().chain(&self.union_all) {
            child.validate()?;
        }
        Ok(())
    }

    pub(crate) fn collect_column_names(&self, names: &mut Vec<String>) {
        for column in &self.column {
            if !names.contains(&column.name) {
                names.push(column.name.clone());
            }
        }
        for child in &self.select {
            child.collect_column_names(names);
        }
        for child in &self.union_all {
            child.collect_column_names(names);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn deserializes_the_json_shape() {
        let view = ViewDefinition::from_json(&json!({
            "resource": "Patient",
            "constant": [{"name": "system", "valueString": "http://loinc.org"}],
            "where": [{"path": "active = true"}],
            "select": [{
                "column": [{"name": "id", "path": "id"}],
                "select": [{
                    "forEach": "name",
                    "column": [{"name": "family", "path": "family"}]
                }]
            }]
        }))
        .unwrap();
        assert_eq!(view.validate().unwrap(), "Patient");
        assert_eq!(view.constant[0].value(), Some(&json!("http://loinc.org")));
        assert_eq!(view.column_names(), vec!["id", "family"]);
    }

    #[test]
    fn missing_resource_is_invalid() {
        let view = ViewDefinition::from_json(&json!({"select": []})).unwrap();
        assert!(matches!(
            view.validate(),
            Err(ViewError::InvalidDefinition(_))
        ));
    }

    #[test]
    fn for_each_variants_are_mutually_exclusive() {
        let view = ViewDefinition::from_json(&json!({
            "resource": "Patient",
            "select": [{"forEach": "name", "forEachOrNull": "name"}]
        }))
        .unwrap();
        assert!(view.validate().is_err());
    }
}
