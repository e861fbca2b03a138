//! Utility, tree navigation, and model functions.

use chrono::Utc;
use serde_json::Value as Json;
use serde_json::json;
use tracing::debug;

use super::{eval_arg, single_input, type_name_arg};
use crate::atom::Atom;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::value::{TypeTag, TypedValue, Value, boolean_sequence, fhir_path_is, json_to_sequence};

/// Diagnostic pass-through: logs the sequence and returns it unchanged.
pub(super) fn trace(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let name = match args.first() {
        Some(arg) => eval_arg(ctx, input, arg)?
            .and_then(|v| v.value.as_str().map(str::to_string))
            .unwrap_or_default(),
        None => String::new(),
    };
    debug!(target: "fhirpath", name = %name, count = input.len(), "trace");
    Ok(input.to_vec())
}

pub(super) fn now(
    _ctx: &EvalContext<'_>,
    _input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let stamp = Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true);
    Ok(vec![TypedValue::tagged_string(TypeTag::DateTime, stamp)])
}

pub(super) fn today(
    _ctx: &EvalContext<'_>,
    _input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let stamp = Utc::now().format("%Y-%m-%d").to_string();
    Ok(vec![TypedValue::tagged_string(TypeTag::Date, stamp)])
}

pub(super) fn time_of_day(
    _ctx: &EvalContext<'_>,
    _input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let stamp = Utc::now().format("T%H:%M:%S%.3f").to_string();
    Ok(vec![TypedValue::tagged_string(TypeTag::Time, stamp)])
}

/// Direct child values of each element, in document order.
pub(super) fn children(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(input.iter().flat_map(element_children).collect())
}

fn element_children(element: &TypedValue) -> Vec<TypedValue> {
    match element.value.as_object() {
        Some(map) => map.values().flat_map(json_to_sequence).collect(),
        None => Vec::new(),
    }
}

/// All descendants (excluding the input elements themselves).
pub(super) fn descendants(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let mut result = Vec::new();
    let mut work: Vec<TypedValue> = input.iter().flat_map(element_children).collect();
    while let Some(element) = work.pop() {
        work.extend(element_children(&element));
        result.push(element);
    }
    Ok(result)
}

/// Synchronous reference stub: produces `{resourceType, id}` placeholders
/// without fetching anything. Real resolution is the embedding
/// application's job, done before evaluation.
pub(super) fn resolve(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(input.iter().filter_map(resolve_one).collect())
}

fn resolve_one(value: &TypedValue) -> Option<TypedValue> {
    let reference = match &value.value {
        Value::Str(s) => s.clone(),
        Value::Json(json) => json.get("reference")?.as_str()?.to_string(),
        _ => return None,
    };
    let (resource_type, id) = reference.split_once('/')?;
    Some(TypedValue::object(
        TypeTag::Resource,
        json!({"resourceType": resource_type, "id": id}),
    ))
}

/// Function form of the `as` operator.
pub(super) fn as_(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(arg) = args.first() else {
        return Ok(input.to_vec());
    };
    let type_name = type_name_arg(arg)?;
    Ok(input
        .iter()
        .filter(|v| fhir_path_is(v, &type_name))
        .cloned()
        .collect())
}

/// Function form of the `is` operator; maps each element to a boolean.
pub(super) fn is(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(arg) = args.first() else {
        return Ok(Vec::new());
    };
    let type_name = type_name_arg(arg)?;
    Ok(input
        .iter()
        .map(|v| TypedValue::boolean(fhir_path_is(v, &type_name)))
        .collect())
}

/// Reflection: `{namespace, name}` descriptors for each element.
pub(super) fn type_(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(input
        .iter()
        .filter_map(|value| {
            let descriptor = match (&value.value, value.resource_type()) {
                (_, Some(resource_type)) => json!({"namespace": "FHIR", "name": resource_type}),
                (Value::Bool(_), _) => json!({"namespace": "System", "name": "Boolean"}),
                (Value::Int(_), _) => json!({"namespace": "System", "name": "Integer"}),
                (Value::Dec(_), _) => json!({"namespace": "System", "name": "Decimal"}),
                (Value::Str(_), _) => json!({"namespace": "System", "name": value.ty.as_str()}),
                _ => return None,
            };
            Some(TypedValue::object(TypeTag::BackboneElement, descriptor))
        })
        .collect())
}

const STRUCTURE_DEFINITION_PREFIX: &str = "http://hl7.org/fhir/StructureDefinition/";

pub(super) fn conforms_to(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let system = match args.first() {
        Some(arg) => eval_arg(ctx, input, arg)?
            .and_then(|v| v.value.as_str().map(str::to_string))
            .unwrap_or_default(),
        None => String::new(),
    };
    let Some(expected) = system.strip_prefix(STRUCTURE_DEFINITION_PREFIX) else {
        return Err(EvalError::invalid("Expected a StructureDefinition URL"));
    };
    Ok(input
        .iter()
        .map(|v| TypedValue::boolean(v.resource_type() == Some(expected)))
        .collect())
}

/// Boolean negation with the singleton contract; non-convertible input
/// yields empty.
pub(super) fn not(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    match value.value.as_bool() {
        Some(b) => Ok(boolean_sequence(!b)),
        None => Ok(Vec::new()),
    }
}

/// `Type/id` rendering for references and inline resources.
pub(super) fn get_reference_string(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(input
        .iter()
        .filter_map(|value| {
            let map = value.value.as_object()?;
            if let Some(reference) = map.get("reference").and_then(Json::as_str) {
                return Some(TypedValue::string(reference));
            }
            let resource_type = map.get("resourceType")?.as_str()?;
            let id = map.get("id")?.as_str()?;
            Some(TypedValue::string(format!("{}/{}", resource_type, id)))
        })
        .collect())
}
