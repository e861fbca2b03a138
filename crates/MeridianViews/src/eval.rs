//! Recursive row generation with Cartesian-product semantics.
//!
//! Each selection node produces independent part-row sets from exactly its
//! direct children — its columns, each nested `select`, and its `unionAll`
//! children merged as one part — and emits the Cartesian product of those
//! parts. Deeper rows bubble up one level at a time through recursion.

use std::collections::HashMap;

use serde_json::Value as Json;

use meridian_fhirpath::{Atom, TypedValue, evaluate, parse_expression};

use crate::error::ViewError;
use crate::model::{Selection, ViewDefinition};

/// One output row: column name to scalar, array, or null. Produced, never
/// mutated after emission.
pub type OutputRow = serde_json::Map<String, Json>;

/// Flat output of one view evaluation: column order plus rows.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewOutput {
    pub columns: Vec<String>,
    pub rows: Vec<OutputRow>,
}

/// Evaluates a view against a set of documents, producing flat rows.
pub fn evaluate_view(view: &ViewDefinition, documents: &[Json]) -> Result<ViewOutput, ViewError> {
    let resource_type = view.validate()?;
    let columns = view.column_names();

    let mut variables: HashMap<String, TypedValue> = HashMap::new();
    for constant in &view.constant {
        if let Some(value) = constant.value() {
            if let Some(typed) = TypedValue::from_json(value) {
                variables.insert(constant.name.clone(), typed);
            }
        }
    }

    let mut rows = Vec::new();
    for document in documents {
        let matches_type = document
            .get("resourceType")
            .and_then(Json::as_str)
            .is_some_and(|t| t == resource_type);
        if !matches_type {
            continue;
        }
        let Some(root) = TypedValue::from_json(document) else {
            continue;
        };
        if !passes_where_clauses(view, &root, &variables)? {
            continue;
        }
        // The view root behaves like a selection node with only nested
        // selects.
        let parts = select_parts(&view.select, &root, &variables)?;
        rows.extend(cartesian_product(parts));
    }

    Ok(ViewOutput { columns, rows })
}

fn passes_where_clauses(
    view: &ViewDefinition,
    root: &TypedValue,
    variables: &HashMap<String, TypedValue>,
) -> Result<bool, ViewError> {
    for clause in &view.where_clauses {
        let result = eval_path(&clause.path, root, variables)?;
        // Anything but exactly one boolean is a per-view error, not a
        // silent skip.
        let decision = match result.as_slice() {
            [single] => single.value.as_bool(),
            _ => None,
        };
        match decision {
            Some(true) => {}
            Some(false) => return Ok(false),
            None => {
                return Err(ViewError::NonBooleanWhere {
                    path: clause.path.clone(),
                });
            }
        }
    }
    Ok(true)
}

/// Rows produced by one selection node for one focus resource/element.
fn process_selection(
    selection: &Selection,
    focus: &TypedValue,
    variables: &HashMap<String, TypedValue>,
) -> Result<Vec<OutputRow>, ViewError> {
    // Compute the focus elements for this node.
    let foci: Vec<TypedValue> = if let Some(path) = &selection.for_each {
        eval_path(path, focus, variables)?
    } else if let Some(path) = &selection.for_each_or_null {
        let elements = eval_path(path, focus, variables)?;
        if elements.is_empty() {
            // One row with every declared column of this subtree null.
            return Ok(vec![null_row(selection)]);
        }
        elements
    } else {
        vec![focus.clone()]
    };

    let mut rows = Vec::new();
    for element in &foci {
        let mut parts: Vec<Vec<OutputRow>> = Vec::new();

        // One single-row part per declared column.
        for column in &selection.column {
            let mut row = OutputRow::new();
            row.insert(
                column.name.clone(),
                column_value(column, element, variables)?,
            );
            parts.push(vec![row]);
        }

        // One part per nested select, by recursion.
        for child in &selection.select {
            parts.push(process_selection(child, element, variables)?);
        }

        // All unionAll children concatenated form a single part.
        if !selection.union_all.is_empty() {
            let mut union_rows = Vec::new();
            for child in &selection.union_all {
                union_rows.extend(process_selection(child, element, variables)?);
            }
            parts.push(union_rows);
        }

        rows.extend(cartesian_product(parts));
    }
    Ok(rows)
}

/// Binding rules for one column against one focus element.
fn column_value(
    column: &crate::model::Column,
    element: &TypedValue,
    variables: &HashMap<String, TypedValue>,
) -> Result<Json, ViewError> {
    let values = eval_path(&column.path, element, variables)?;
    if column.collection {
        return Ok(Json::Array(values.iter().map(|v| v.value.to_json()).collect()));
    }
    match values.as_slice() {
        [] => Ok(Json::Null),
        [single] => Ok(single.value.to_json()),
        _ => Err(ViewError::MultipleValuesForColumn {
            column: column.name.clone(),
        }),
    }
}

/// All declared columns of a subtree bound to null.
fn null_row(selection: &Selection) -> OutputRow {
    let mut names = Vec::new();
    selection.collect_column_names(&mut names);
    names.into_iter().map(|name| (name, Json::Null)).collect()
}

/// Parts from a list of sibling selects (used at the view root).
fn select_parts(
    selects: &[Selection],
    focus: &TypedValue,
    variables: &HashMap<String, TypedValue>,
) -> Result<Vec<Vec<OutputRow>>, ViewError> {
    selects
        .iter()
        .map(|selection| process_selection(selection, focus, variables))
        .collect()
}

/// Cartesian product across parts, shallow-merging each combination. Later
/// parts overwrite earlier ones on key collision. An empty part collapses
/// the product to zero rows, which is what lets a zero-element `forEach`
/// suppress its siblings' output.
fn cartesian_product(parts: Vec<Vec<OutputRow>>) -> Vec<OutputRow> {
    let mut combinations: Vec<OutputRow> = vec![OutputRow::new()];
    for part in parts {
        let mut next = Vec::with_capacity(combinations.len() * part.len().max(1));
        for combination in &combinations {
            for row in &part {
                let mut merged = combination.clone();
                for (key, value) in row {
                    merged.insert(key.clone(), value.clone());
                }
                next.push(merged);
            }
        }
        combinations = next;
    }
    combinations
}

fn eval_path(
    path: &str,
    focus: &TypedValue,
    variables: &HashMap<String, TypedValue>,
) -> Result<Vec<TypedValue>, ViewError> {
    let atom: Atom = parse_expression(path).map_err(|e| ViewError::expression(path, e))?;
    evaluate(&atom, std::slice::from_ref(focus), variables)
        .map_err(|e| ViewError::expression(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cartesian_product_of_empty_part_is_empty() {
        let part_a = vec![OutputRow::new()];
        assert!(cartesian_product(vec![part_a, Vec::new()]).is_empty());
    }

    #[test]
    fn cartesian_product_multiplies_counts() {
        let mut a1 = OutputRow::new();
        a1.insert("a".to_string(), Json::from(1));
        let mut a2 = OutputRow::new();
        a2.insert("a".to_string(), Json::from(2));
        let mut b1 = OutputRow::new();
        b1.insert("b".to_string(), Json::from("x"));

        let product = cartesian_product(vec![vec![a1, a2], vec![b1]]);
        assert_eq!(product.len(), 2);
        assert_eq!(product[0]["a"], Json::from(1));
        assert_eq!(product[0]["b"], Json::from("x"));
        assert_eq!(product[1]["a"], Json::from(2));
    }
}
