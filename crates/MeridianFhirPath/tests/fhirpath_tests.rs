//! End-to-end expression tests: parse + evaluate against JSON documents.

use std::collections::HashMap;

use serde_json::{Value as Json, json};

use meridian_fhirpath::error::{EvalError, FhirPathError};
use meridian_fhirpath::{TypedValue, eval_fhirpath, eval_fhirpath_with_variables};

fn eval(expression: &str) -> Vec<TypedValue> {
    eval_fhirpath(expression, &Json::Null)
        .unwrap_or_else(|e| panic!("{} failed: {}", expression, e))
}

fn eval_on(expression: &str, document: &Json) -> Vec<TypedValue> {
    eval_fhirpath(expression, document)
        .unwrap_or_else(|e| panic!("{} failed: {}", expression, e))
}

#[test]
fn arithmetic_precedence() {
    assert_eq!(eval("3 / 3 + 4 * 9 - 1"), vec![TypedValue::integer(36)]);
    assert_eq!(eval("(3 / 3 + 4 * 3)"), vec![TypedValue::integer(13)]);
}

#[test]
fn arithmetic_left_associativity() {
    assert_eq!(
        eval("5 - 4 - 3 - 2 - 1 + 512"),
        vec![TypedValue::integer(507)]
    );
}

#[test]
fn unary_prefix_operators() {
    assert_eq!(eval("-4 + -(4 + 5 - -4)"), vec![TypedValue::integer(-17)]);
}

#[test]
fn exponent_is_right_associative() {
    // 2 ^ (1 ^ 3) = 2, not (2 ^ 1) ^ 3 = 8.
    assert_eq!(eval("2 ^ 1 ^ 3"), vec![TypedValue::integer(2)]);
    assert_eq!(eval("2 ^ 3"), vec![TypedValue::integer(8)]);
}

#[test]
fn function_chaining_on_literals() {
    assert_eq!(eval("'Peter'.length() - 3"), vec![TypedValue::integer(2)]);
}

#[test]
fn member_access_on_missing_fields_is_empty() {
    assert!(eval_on("Patient.name.given", &json!({})).is_empty());
}

#[test]
fn member_access_broadcasts_over_arrays() {
    let patient = json!({
        "resourceType": "Patient",
        "name": [
            {"given": ["Alice", "Ann"], "family": "Smith"},
            {"given": ["Al"], "family": "Jones"}
        ]
    });
    let result = eval_on("Patient.name.given", &patient);
    assert_eq!(
        result,
        vec![
            TypedValue::string("Alice"),
            TypedValue::string("Ann"),
            TypedValue::string("Al"),
        ]
    );
}

#[test]
fn evaluate_concatenates_across_multiple_documents() {
    use meridian_fhirpath::{evaluate, parse_expression};

    let atom = parse_expression("Patient.name.given").unwrap();
    let documents = [
        json!({"resourceType": "Patient", "name": [{"given": ["Alice"]}]}),
        json!({"resourceType": "Patient", "name": [{"given": ["Bob", "Billy"]}]}),
    ];
    let input: Vec<TypedValue> = documents
        .iter()
        .filter_map(TypedValue::from_json)
        .collect();
    let result = evaluate(&atom, &input, &HashMap::new()).unwrap();
    assert_eq!(
        result,
        vec![
            TypedValue::string("Alice"),
            TypedValue::string("Bob"),
            TypedValue::string("Billy"),
        ]
    );
}

#[test]
fn string_concatenation() {
    let patient = json!({
        "resourceType": "Patient",
        "name": [{"given": ["Alice"], "family": "Smith"}]
    });
    let result = eval_on("Patient.name.given + ' ' + Patient.name.family", &patient);
    assert_eq!(result, vec![TypedValue::string("Alice Smith")]);
}

#[test]
fn union_operator_keeps_duplicates_distinct_removes_them() {
    assert_eq!(eval("(1 | 1 | 2).count()"), vec![TypedValue::integer(3)]);
    assert_eq!(
        eval("(1 | 1 | 2).distinct()"),
        vec![TypedValue::integer(1), TypedValue::integer(2)]
    );
    assert_eq!(
        eval("(1 | 1 | 2).isDistinct()"),
        vec![TypedValue::boolean(false)]
    );
}

#[test]
fn single_enforces_cardinality() {
    assert_eq!(eval("(5).single()"), vec![TypedValue::integer(5)]);
    assert!(eval("{}.single()").is_empty());
    let err = eval_fhirpath("(1 | 2).single()", &Json::Null).unwrap_err();
    assert_eq!(
        err,
        FhirPathError::Eval(EvalError::SingletonRequired {
            function: "single".to_string()
        })
    );
    assert!(err.to_string().contains("Expected input length one"));
}

#[test]
fn skip_and_take_validate_their_argument() {
    assert_eq!(
        eval("(1 | 2 | 3).skip(1)"),
        vec![TypedValue::integer(2), TypedValue::integer(3)]
    );
    assert_eq!(eval("(1 | 2 | 3).take(2).count()"), vec![TypedValue::integer(2)]);
    let err = eval_fhirpath("(1 | 2).skip('x')", &Json::Null).unwrap_err();
    assert!(err.to_string().contains("Expected a number for skip(num)"));
    let err = eval_fhirpath("(1 | 2).take('x')", &Json::Null).unwrap_err();
    assert!(err.to_string().contains("Expected a number for take(num)"));
}

#[test]
fn where_filters_and_select_projects() {
    let patient = json!({
        "resourceType": "Patient",
        "name": [
            {"use": "official", "given": ["Alice"]},
            {"use": "nickname", "given": ["Ali"]}
        ]
    });
    let result = eval_on("Patient.name.where(use = 'official').given", &patient);
    assert_eq!(result, vec![TypedValue::string("Alice")]);

    let result = eval_on("Patient.name.select(given.first())", &patient);
    assert_eq!(
        result,
        vec![TypedValue::string("Alice"), TypedValue::string("Ali")]
    );
}

#[test]
fn iif_only_evaluates_the_taken_branch() {
    // The else branch references an undefined variable; laziness means no
    // error is raised.
    assert_eq!(
        eval("iif(true, 'yes', %undefined)"),
        vec![TypedValue::string("yes")]
    );
    let err = eval_fhirpath("iif('nope', 1, 2)", &Json::Null).unwrap_err();
    assert!(err.to_string().contains("Boolean"));
}

#[test]
fn exists_with_criteria() {
    let patient = json!({
        "resourceType": "Patient",
        "name": [{"use": "official"}]
    });
    assert_eq!(
        eval_on("Patient.name.exists(use = 'official')", &patient),
        vec![TypedValue::boolean(true)]
    );
    assert_eq!(
        eval_on("Patient.name.exists(use = 'maiden')", &patient),
        vec![TypedValue::boolean(false)]
    );
}

#[test]
fn three_valued_logic_over_expressions() {
    assert_eq!(eval("true and true"), vec![TypedValue::boolean(true)]);
    assert!(eval("true and {}").is_empty());
    assert_eq!(eval("false and {}"), vec![TypedValue::boolean(false)]);
    assert_eq!(eval("{} or true"), vec![TypedValue::boolean(true)]);
    assert!(eval("{} or false").is_empty());
    assert_eq!(eval("true xor false"), vec![TypedValue::boolean(true)]);
    assert_eq!(eval("false implies false"), vec![TypedValue::boolean(true)]);
    assert!(eval("true implies {}").is_empty());
}

#[test]
fn is_and_as_type_tests() {
    let patient = json!({"resourceType": "Patient"});
    assert_eq!(
        eval_on("Patient is Patient", &patient),
        vec![TypedValue::boolean(true)]
    );
    assert_eq!(
        eval_on("Patient is Observation", &patient),
        vec![TypedValue::boolean(false)]
    );
    // `as` yields the value on a match, empty otherwise; never an error.
    assert_eq!(eval_on("(Patient as Patient).count()", &patient), vec![
        TypedValue::integer(1)
    ]);
    assert!(eval_on("Patient as Observation", &patient).is_empty());
}

#[test]
fn indexer_semantics() {
    assert_eq!(eval("(10 | 20 | 30)[1]"), vec![TypedValue::integer(20)]);
    assert!(eval("(10 | 20)[5]").is_empty());
}

#[test]
fn conversion_gates_return_empty_not_errors() {
    assert_eq!(eval("'42'.toInteger()"), vec![TypedValue::integer(42)]);
    assert!(eval("'4x2'.toInteger()").is_empty());
    assert_eq!(eval("'yes'.toBoolean()"), vec![TypedValue::boolean(true)]);
    assert!(eval("'maybe'.toBoolean()").is_empty());
    assert_eq!(
        eval("true.toInteger()"),
        vec![TypedValue::integer(1)]
    );
}

#[test]
fn to_string_and_converts() {
    assert_eq!(eval("42.toString()"), vec![TypedValue::string("42")]);
    assert_eq!(
        eval("42.convertsToString()"),
        vec![TypedValue::boolean(true)]
    );
}

#[test]
fn resolve_returns_stub_documents() {
    let observation = json!({
        "resourceType": "Observation",
        "subject": {"reference": "Patient/123"}
    });
    let result = eval_on("Observation.subject.resolve()", &observation);
    assert_eq!(result.len(), 1);
    assert_eq!(result[0].resource_type(), Some("Patient"));
    assert_eq!(
        result[0].value.to_json(),
        json!({"resourceType": "Patient", "id": "123"})
    );
}

#[test]
fn variables_resolve_through_the_context() {
    let mut variables = HashMap::new();
    variables.insert("score".to_string(), TypedValue::integer(7));
    let result =
        eval_fhirpath_with_variables("%score + 1", &Json::Null, &variables).unwrap();
    assert_eq!(result, vec![TypedValue::integer(8)]);

    let err = eval_fhirpath("%missing", &Json::Null).unwrap_err();
    assert!(err.to_string().contains("Undefined variable %missing"));
}

#[test]
fn membership_operators() {
    assert_eq!(eval("2 in (1 | 2 | 3)"), vec![TypedValue::boolean(true)]);
    assert_eq!(
        eval("(1 | 2 | 3) contains 4"),
        vec![TypedValue::boolean(false)]
    );
}

#[test]
fn combine_preserves_order_and_duplicates() {
    assert_eq!(
        eval("(1 | 2).combine(2 | 3).count()"),
        vec![TypedValue::integer(4)]
    );
    assert_eq!(
        eval("(1 | 2).union(2 | 3).count()"),
        vec![TypedValue::integer(3)]
    );
    assert_eq!(
        eval("(1 | 2 | 3).intersect(2 | 3 | 4).count()"),
        vec![TypedValue::integer(2)]
    );
    assert_eq!(
        eval("(1 | 2 | 3).exclude(2)"),
        vec![TypedValue::integer(1), TypedValue::integer(3)]
    );
}

#[test]
fn string_functions() {
    assert_eq!(eval("'hello'.upper()"), vec![TypedValue::string("HELLO")]);
    assert_eq!(
        eval("'hello world'.substring(6)"),
        vec![TypedValue::string("world")]
    );
    assert_eq!(
        eval("'hello'.substring(1, 3)"),
        vec![TypedValue::string("ell")]
    );
    assert!(eval("'hello'.substring(10)").is_empty());
    assert_eq!(
        eval("'hello'.indexOf('ll')"),
        vec![TypedValue::integer(2)]
    );
    assert_eq!(
        eval("'a,b,c'.split(',').count()"),
        vec![TypedValue::integer(3)]
    );
    assert_eq!(
        eval("'ab12'.matches('[a-z]+[0-9]+')"),
        vec![TypedValue::boolean(true)]
    );
    assert_eq!(
        eval("'banana'.replace('na', 'NA')"),
        vec![TypedValue::string("baNANA")]
    );
}

#[test]
fn string_function_on_non_string_is_an_error() {
    let err = eval_fhirpath("(1).upper()", &Json::Null).unwrap_err();
    assert!(
        err.to_string()
            .contains("String function cannot be called with non-string")
    );
}

#[test]
fn math_functions() {
    assert_eq!(eval("(-3).abs()"), vec![TypedValue::integer(3)]);
    assert_eq!(eval("(1.5).round()"), vec![TypedValue::integer(2)]);
    assert_eq!(eval("(3.7).floor()"), vec![TypedValue::integer(3)]);
    assert_eq!(eval("(3.2).ceiling()"), vec![TypedValue::integer(4)]);
    assert_eq!(eval("(3.7).truncate()"), vec![TypedValue::integer(3)]);
    assert_eq!(eval("(2).power(10)"), vec![TypedValue::integer(1024)]);
    // Unrepresentable results are empty, not errors.
    assert!(eval("(-1).sqrt()").is_empty());
}

#[test]
fn equivalence_operators() {
    assert_eq!(eval("'Hello' ~ 'hello'"), vec![TypedValue::boolean(true)]);
    assert_eq!(eval("'a' !~ 'b'"), vec![TypedValue::boolean(true)]);
    assert_eq!(eval("1 = 1.0"), vec![TypedValue::boolean(true)]);
    assert!(eval("1 = {}").is_empty());
    assert_eq!(eval("1 != 2"), vec![TypedValue::boolean(true)]);
}

#[test]
fn empty_collection_literal() {
    assert_eq!(eval("{}.empty()"), vec![TypedValue::boolean(true)]);
    assert_eq!(eval("{}.count()"), vec![TypedValue::integer(0)]);
}

#[test]
fn children_and_descendants() {
    let document = json!({
        "resourceType": "Patient",
        "name": [{"given": ["Alice"]}]
    });
    // children: resourceType string + the name object.
    let children = eval_on("Patient.children()", &document);
    assert_eq!(children.len(), 2);
    let descendants = eval_on("Patient.descendants()", &document);
    assert!(descendants.len() > children.len());
}

#[test]
fn date_comparison_is_lexicographic() {
    assert_eq!(
        eval("@2020-01-01 < @2021-01-01"),
        vec![TypedValue::boolean(true)]
    );
    assert_eq!(
        eval("'2020-01-01'.toDate().count()"),
        vec![TypedValue::integer(1)]
    );
}
