//! End-to-end view evaluation tests: row generation, fan-out, unions, and
//! error isolation.

use serde_json::{Value as Json, json};

use meridian_fhir_views::{ContentType, ViewDefinition, ViewError, evaluate_view, run_view_definition};

fn view(json: Json) -> ViewDefinition {
    ViewDefinition::from_json(&json).unwrap()
}

fn patient() -> Json {
    json!({
        "resourceType": "Patient",
        "id": "p1",
        "active": true,
        "gender": "female",
        "name": [
            {"family": "Smith", "given": ["Alice", "Ann"]},
            {"family": "Jones", "given": ["Al"]}
        ]
    })
}

#[test]
fn scalar_columns_produce_one_row() {
    let output = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "select": [{
                "column": [
                    {"name": "id", "path": "id"},
                    {"name": "gender", "path": "gender"}
                ]
            }]
        })),
        &[patient()],
    )
    .unwrap();

    assert_eq!(output.columns, vec!["id", "gender"]);
    assert_eq!(output.rows.len(), 1);
    assert_eq!(output.rows[0]["id"], json!("p1"));
    assert_eq!(output.rows[0]["gender"], json!("female"));
}

#[test]
fn for_each_fans_out_one_row_per_element() {
    let output = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "select": [
                {"column": [{"name": "id", "path": "id"}]},
                {
                    "forEach": "name",
                    "column": [{"name": "family", "path": "family"}]
                }
            ]
        })),
        &[patient()],
    )
    .unwrap();

    assert_eq!(output.rows.len(), 2);
    assert_eq!(output.rows[0]["id"], json!("p1"));
    assert_eq!(output.rows[0]["family"], json!("Smith"));
    assert_eq!(output.rows[1]["family"], json!("Jones"));
}

#[test]
fn for_each_over_empty_collection_emits_nothing() {
    let output = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "select": [
                {"column": [{"name": "id", "path": "id"}]},
                {
                    "forEach": "contact",
                    "column": [{"name": "contact_name", "path": "name.family"}]
                }
            ]
        })),
        &[patient()],
    )
    .unwrap();
    // The empty forEach part collapses the whole product.
    assert!(output.rows.is_empty());
}

#[test]
fn for_each_or_null_emits_one_all_null_row() {
    let output = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "select": [
                {"column": [{"name": "id", "path": "id"}]},
                {
                    "forEachOrNull": "contact",
                    "column": [{"name": "contact_name", "path": "name.family"}]
                }
            ]
        })),
        &[patient()],
    )
    .unwrap();

    assert_eq!(output.rows.len(), 1);
    assert_eq!(output.rows[0]["id"], json!("p1"));
    assert_eq!(output.rows[0]["contact_name"], Json::Null);
}

#[test]
fn collection_column_binds_an_array() {
    let output = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "select": [{
                "forEach": "name",
                "column": [{"name": "given", "path": "given", "collection": true}]
            }]
        })),
        &[patient()],
    )
    .unwrap();

    assert_eq!(output.rows.len(), 2);
    assert_eq!(output.rows[0]["given"], json!(["Alice", "Ann"]));
    assert_eq!(output.rows[1]["given"], json!(["Al"]));
}

#[test]
fn multiple_values_on_scalar_column_is_an_error() {
    let err = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "select": [{
                // name.given yields three values for this document.
                "column": [{"name": "given", "path": "name.given"}]
            }]
        })),
        &[patient()],
    )
    .unwrap_err();

    assert!(
        err.to_string()
            .contains("Multiple values found but not expected for column given")
    );
    match err {
        ViewError::MultipleValuesForColumn { column } => assert_eq!(column, "given"),
        other => panic!("expected cardinality error, got {other}"),
    }
}

#[test]
fn missing_value_binds_null() {
    let output = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "select": [{
                "column": [{"name": "birth_date", "path": "birthDate"}]
            }]
        })),
        &[patient()],
    )
    .unwrap();
    assert_eq!(output.rows[0]["birth_date"], Json::Null);
}

#[test]
fn where_clause_filters_documents() {
    let inactive = json!({"resourceType": "Patient", "id": "p2", "active": false});
    let output = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "where": [{"path": "active = true"}],
            "select": [{"column": [{"name": "id", "path": "id"}]}]
        })),
        &[patient(), inactive],
    )
    .unwrap();
    assert_eq!(output.rows.len(), 1);
    assert_eq!(output.rows[0]["id"], json!("p1"));
}

#[test]
fn non_boolean_where_clause_is_an_error() {
    let err = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "where": [{"path": "name"}],
            "select": [{"column": [{"name": "id", "path": "id"}]}]
        })),
        &[patient()],
    )
    .unwrap_err();
    match err {
        ViewError::NonBooleanWhere { path } => assert_eq!(path, "name"),
        other => panic!("expected where-clause error, got {other}"),
    }
}

#[test]
fn resource_type_mismatch_skips_documents() {
    let observation = json!({"resourceType": "Observation", "id": "o1"});
    let output = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "select": [{"column": [{"name": "id", "path": "id"}]}]
        })),
        &[observation],
    )
    .unwrap();
    assert!(output.rows.is_empty());
}

#[test]
fn constants_bind_as_variables() {
    let output = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "constant": [{"name": "wanted", "valueString": "female"}],
            "where": [{"path": "gender = %wanted"}],
            "select": [{"column": [{"name": "id", "path": "id"}]}]
        })),
        &[patient()],
    )
    .unwrap();
    assert_eq!(output.rows.len(), 1);
}

#[test]
fn union_all_concatenates_child_rows() {
    let output = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "select": [{
                "column": [{"name": "id", "path": "id"}],
                "unionAll": [
                    {
                        "forEach": "name.given",
                        "column": [{"name": "value", "path": "$this"}]
                    },
                    {
                        "forEach": "name.family",
                        "column": [{"name": "value", "path": "$this"}]
                    }
                ]
            }]
        })),
        &[patient()],
    )
    .unwrap();

    // Three given names plus two family names, each paired with the id.
    assert_eq!(output.rows.len(), 5);
    assert!(output.rows.iter().all(|r| r["id"] == json!("p1")));
    let values: Vec<&Json> = output.rows.iter().map(|r| &r["value"]).collect();
    assert!(values.contains(&&json!("Alice")));
    assert!(values.contains(&&json!("Jones")));
}

#[test]
fn nested_select_rows_multiply_with_sibling_columns() {
    let output = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "select": [{
                "forEach": "name",
                "column": [{"name": "family", "path": "family"}],
                "select": [{
                    "forEach": "given",
                    "column": [{"name": "given", "path": "$this"}]
                }]
            }]
        })),
        &[patient()],
    )
    .unwrap();

    // Smith × [Alice, Ann] plus Jones × [Al].
    assert_eq!(output.rows.len(), 3);
    assert_eq!(output.rows[0]["family"], json!("Smith"));
    assert_eq!(output.rows[0]["given"], json!("Alice"));
    assert_eq!(output.rows[2]["family"], json!("Jones"));
    assert_eq!(output.rows[2]["given"], json!("Al"));
}

#[test]
fn batch_errors_do_not_poison_subsequent_calls() {
    let bad = view(json!({
        "resource": "Patient",
        "select": [{"column": [{"name": "given", "path": "name.given"}]}]
    }));
    let good = view(json!({
        "resource": "Patient",
        "select": [{"column": [{"name": "id", "path": "id"}]}]
    }));
    let documents = [patient()];

    assert!(evaluate_view(&bad, &documents).is_err());
    // The failing view leaves no state behind.
    assert_eq!(evaluate_view(&good, &documents).unwrap().rows.len(), 1);
}

#[test]
fn run_view_definition_produces_csv() {
    let bytes = run_view_definition(
        &json!({
            "resource": "Patient",
            "select": [{
                "column": [
                    {"name": "id", "path": "id"},
                    {"name": "gender", "path": "gender"}
                ]
            }]
        }),
        &[patient()],
        ContentType::CsvWithHeader,
    )
    .unwrap();
    let text = String::from_utf8(bytes).unwrap();
    assert_eq!(text, "id,gender\np1,female\n");
}

#[test]
fn multiple_documents_append_in_order() {
    let p2 = json!({"resourceType": "Patient", "id": "p2", "gender": "male"});
    let output = evaluate_view(
        &view(json!({
            "resource": "Patient",
            "select": [{"column": [{"name": "id", "path": "id"}]}]
        })),
        &[patient(), p2],
    )
    .unwrap();
    assert_eq!(output.rows.len(), 2);
    assert_eq!(output.rows[0]["id"], json!("p1"));
    assert_eq!(output.rows[1]["id"], json!("p2"));
}
