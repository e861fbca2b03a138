//! Typed values: the universal unit of evaluation results.
//!
//! Every evaluation produces a sequence of [`TypedValue`]s, never bare
//! values. The type tag travels separately from the payload because several
//! functions and the schema layer decide behavior from the declared type
//! rather than the runtime shape (e.g. `uri` vs `canonical` strings).

use std::collections::HashMap;

use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde_json::Value as Json;

/// Closed set of type tags the engine distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeTag {
    Boolean,
    Integer,
    Decimal,
    String,
    Uri,
    Canonical,
    Date,
    DateTime,
    Time,
    Quantity,
    Coding,
    CodeableConcept,
    Reference,
    Identifier,
    Period,
    HumanName,
    /// Any other complex (object-shaped) element.
    BackboneElement,
    /// A whole document; the payload carries `resourceType`.
    Resource,
}

impl TypeTag {
    /// The tag's name as used by `is`/`ofType` type specifiers.
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeTag::Boolean => "Boolean",
            TypeTag::Integer => "Integer",
            TypeTag::Decimal => "Decimal",
            TypeTag::String => "String",
            TypeTag::Uri => "uri",
            TypeTag::Canonical => "canonical",
            TypeTag::Date => "Date",
            TypeTag::DateTime => "DateTime",
            TypeTag::Time => "Time",
            TypeTag::Quantity => "Quantity",
            TypeTag::Coding => "Coding",
            TypeTag::CodeableConcept => "CodeableConcept",
            TypeTag::Reference => "Reference",
            TypeTag::Identifier => "Identifier",
            TypeTag::Period => "Period",
            TypeTag::HumanName => "HumanName",
            TypeTag::BackboneElement => "BackboneElement",
            TypeTag::Resource => "Resource",
        }
    }

    /// Resolves a declared element type name (FHIR primitive names are
    /// lowercase) to a tag. Unknown complex names map to
    /// [`TypeTag::BackboneElement`].
    pub fn from_declared(name: &str) -> TypeTag {
        match name {
            "boolean" | "Boolean" => TypeTag::Boolean,
            "integer" | "positiveInt" | "unsignedInt" | "Integer" => TypeTag::Integer,
            "decimal" | "Decimal" => TypeTag::Decimal,
            "string" | "code" | "id" | "markdown" | "base64Binary" | "String" => TypeTag::String,
            "uri" | "url" | "oid" | "uuid" => TypeTag::Uri,
            "canonical" => TypeTag::Canonical,
            "date" | "Date" => TypeTag::Date,
            "dateTime" | "instant" | "DateTime" => TypeTag::DateTime,
            "time" | "Time" => TypeTag::Time,
            "Quantity" | "Age" | "Duration" | "Distance" | "Count" | "Money" => TypeTag::Quantity,
            "Coding" => TypeTag::Coding,
            "CodeableConcept" => TypeTag::CodeableConcept,
            "Reference" => TypeTag::Reference,
            "Identifier" => TypeTag::Identifier,
            "Period" => TypeTag::Period,
            "HumanName" => TypeTag::HumanName,
            _ => TypeTag::BackboneElement,
        }
    }
}

/// Payload of a [`TypedValue`]. Numbers keep their integer/decimal split;
/// complex values stay as JSON trees.
#[derive(Debug, Clone)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Dec(Decimal),
    Str(String),
    Json(Json),
}

impl Value {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Numeric view: integers widen to decimals.
    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Int(i) => Some(Decimal::from(*i)),
            Value::Dec(d) => Some(*d),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&serde_json::Map<String, Json>> {
        match self {
            Value::Json(Json::Object(map)) => Some(map),
            _ => None,
        }
    }

    /// Renders the payload back into plain JSON.
    pub fn to_json(&self) -> Json {
        match self {
            Value::Bool(b) => Json::Bool(*b),
            Value::Int(i) => Json::from(*i),
            Value::Dec(d) => d
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Json::Number)
                .unwrap_or(Json::Null),
            Value::Str(s) => Json::String(s.clone()),
            Value::Json(j) => j.clone(),
        }
    }
}

/// Value equality follows path-expression semantics: integers and decimals
/// compare numerically, strings exactly, complex values structurally. Tags
/// do not participate (a `uri` and a `string` with the same text are equal).
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Int(a), Value::Int(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Json(a), Value::Json(b)) => a == b,
            (Value::Dec(_) | Value::Int(_), Value::Dec(_) | Value::Int(_)) => {
                let a = self.as_decimal().expect("numeric");
                let b = other.as_decimal().expect("numeric");
                a.normalize() == b.normalize()
            }
            _ => false,
        }
    }
}

/// A `(type tag, payload)` pair.
#[derive(Debug, Clone)]
pub struct TypedValue {
    pub ty: TypeTag,
    pub value: Value,
}

/// Equality on typed values ignores the tag; see [`Value`]'s `PartialEq`.
impl PartialEq for TypedValue {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}

impl TypedValue {
    pub fn boolean(value: bool) -> TypedValue {
        TypedValue {
            ty: TypeTag::Boolean,
            value: Value::Bool(value),
        }
    }

    pub fn integer(value: i64) -> TypedValue {
        TypedValue {
            ty: TypeTag::Integer,
            value: Value::Int(value),
        }
    }

    pub fn decimal(value: Decimal) -> TypedValue {
        TypedValue {
            ty: TypeTag::Decimal,
            value: Value::Dec(value),
        }
    }

    pub fn string(value: impl Into<String>) -> TypedValue {
        TypedValue {
            ty: TypeTag::String,
            value: Value::Str(value.into()),
        }
    }

    pub fn tagged_string(ty: TypeTag, value: impl Into<String>) -> TypedValue {
        TypedValue {
            ty,
            value: Value::Str(value.into()),
        }
    }

    pub fn object(ty: TypeTag, value: Json) -> TypedValue {
        TypedValue {
            ty,
            value: Value::Json(value),
        }
    }

    /// Converts a single JSON value, inferring the tag from shape. `null`
    /// yields `None`; arrays are rejected here (see [`json_to_sequence`]).
    pub fn from_json(json: &Json) -> Option<TypedValue> {
        match json {
            Json::Null => None,
            Json::Bool(b) => Some(TypedValue::boolean(*b)),
            Json::Number(n) => Some(number_to_typed(n)),
            Json::String(s) => Some(TypedValue::string(s.clone())),
            Json::Object(map) => Some(TypedValue::object(infer_object_tag(map), json.clone())),
            Json::Array(_) => None,
        }
    }

    /// True when the payload is an object carrying a `resourceType`.
    pub fn is_resource(&self) -> bool {
        self.resource_type().is_some()
    }

    pub fn resource_type(&self) -> Option<&str> {
        self.value
            .as_object()
            .and_then(|map| map.get("resourceType"))
            .and_then(Json::as_str)
    }
}

fn number_to_typed(n: &serde_json::Number) -> TypedValue {
    if let Some(i) = n.as_i64() {
        return TypedValue::integer(i);
    }
    let dec = n
        .to_string()
        .parse::<Decimal>()
        .unwrap_or_else(|_| Decimal::from_f64_retain(n.as_f64().unwrap_or(0.0)).unwrap_or_default());
    TypedValue::decimal(dec)
}

/// Shape-based tag inference for schemaless documents.
fn infer_object_tag(map: &serde_json::Map<String, Json>) -> TypeTag {
    if map.contains_key("resourceType") {
        TypeTag::Resource
    } else if map.contains_key("coding") {
        TypeTag::CodeableConcept
    } else if map.contains_key("value") && (map.contains_key("unit") || map.contains_key("code")) {
        TypeTag::Quantity
    } else if map.contains_key("code") || map.contains_key("system") {
        TypeTag::Coding
    } else if map.contains_key("reference") {
        TypeTag::Reference
    } else {
        TypeTag::BackboneElement
    }
}

/// Flattens a JSON value into an evaluation sequence: arrays spread, nulls
/// disappear, everything else is a singleton.
pub fn json_to_sequence(json: &Json) -> Vec<TypedValue> {
    match json {
        Json::Array(items) => items.iter().flat_map(json_to_sequence).collect(),
        other => TypedValue::from_json(other).into_iter().collect(),
    }
}

/// `[true]` / `[false]` result helper.
pub fn boolean_sequence(value: bool) -> Vec<TypedValue> {
    vec![TypedValue::boolean(value)]
}

/// Truthiness of a result sequence: the first element decides; empty is
/// false. Strings are truthy when non-empty, numbers when non-zero.
pub fn to_js_boolean(values: &[TypedValue]) -> bool {
    match values.first() {
        None => false,
        Some(v) => match &v.value {
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Dec(d) => !d.is_zero(),
            Value::Str(s) => !s.is_empty(),
            Value::Json(Json::Null) => false,
            Value::Json(_) => true,
        },
    }
}

/// Sequence equality: element count and pairwise value equality, in order.
/// Empty on either side yields empty (unknown), per three-valued logic.
pub fn array_equals(left: &[TypedValue], right: &[TypedValue]) -> Vec<TypedValue> {
    if left.is_empty() || right.is_empty() {
        return Vec::new();
    }
    boolean_sequence(left.len() == right.len() && left.iter().zip(right).all(|(a, b)| a == b))
}

/// Negation of a boolean sequence; empty stays empty.
pub fn sequence_not(values: Vec<TypedValue>) -> Vec<TypedValue> {
    values
        .into_iter()
        .filter_map(|v| v.value.as_bool().map(|b| TypedValue::boolean(!b)))
        .collect()
}

/// Pairwise equivalence: order-insensitive, strings compared
/// case/whitespace-insensitively, decimals to a coarse tolerance.
pub fn array_equivalent(left: &[TypedValue], right: &[TypedValue]) -> Vec<TypedValue> {
    if left.len() != right.len() {
        return boolean_sequence(false);
    }
    let mut remaining: Vec<&TypedValue> = right.iter().collect();
    for item in left {
        match remaining.iter().position(|candidate| equivalent(item, candidate)) {
            Some(index) => {
                remaining.remove(index);
            }
            None => return boolean_sequence(false),
        }
    }
    boolean_sequence(true)
}

fn equivalent(a: &TypedValue, b: &TypedValue) -> bool {
    match (&a.value, &b.value) {
        (Value::Str(x), Value::Str(y)) => normalize_for_equivalence(x) == normalize_for_equivalence(y),
        (Value::Dec(_) | Value::Int(_), Value::Dec(_) | Value::Int(_)) => {
            let x = a.value.as_decimal().expect("numeric");
            let y = b.value.as_decimal().expect("numeric");
            (x - y).abs() < Decimal::new(1, 2)
        }
        _ => a == b,
    }
}

fn normalize_for_equivalence(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// `is` semantics: does a value conform to a named type? Capitalized names
/// check resources by `resourceType`; primitive names check the tag.
pub fn fhir_path_is(value: &TypedValue, type_name: &str) -> bool {
    let name = type_name.rsplit('.').next().unwrap_or(type_name);
    match name {
        "Boolean" | "boolean" => value.ty == TypeTag::Boolean,
        "Integer" | "integer" => value.ty == TypeTag::Integer,
        "Decimal" | "decimal" => matches!(value.ty, TypeTag::Decimal | TypeTag::Integer),
        "String" | "string" | "code" | "id" | "markdown" => {
            matches!(value.ty, TypeTag::String | TypeTag::Uri | TypeTag::Canonical)
        }
        "uri" | "url" => value.ty == TypeTag::Uri,
        "canonical" => value.ty == TypeTag::Canonical,
        "Date" | "date" => value.ty == TypeTag::Date,
        "DateTime" | "dateTime" | "instant" => value.ty == TypeTag::DateTime,
        "Time" | "time" => value.ty == TypeTag::Time,
        "Quantity" => value.ty == TypeTag::Quantity,
        "Coding" => value.ty == TypeTag::Coding,
        "CodeableConcept" => value.ty == TypeTag::CodeableConcept,
        "Reference" => value.ty == TypeTag::Reference,
        "Identifier" => value.ty == TypeTag::Identifier,
        "Period" => value.ty == TypeTag::Period,
        "HumanName" => value.ty == TypeTag::HumanName,
        other => value.resource_type() == Some(other),
    }
}

/// Removes duplicates by value equality, keeping first occurrences.
pub fn remove_duplicates(values: Vec<TypedValue>) -> Vec<TypedValue> {
    let mut result: Vec<TypedValue> = Vec::with_capacity(values.len());
    for value in values {
        if !result.contains(&value) {
            result.push(value);
        }
    }
    result
}

/// Renders a typed value for string contexts (`toString`, query values).
pub fn stringify(value: &TypedValue) -> String {
    match &value.value {
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Dec(d) => d.normalize().to_string(),
        Value::Str(s) => s.clone(),
        Value::Json(j) => match (j.get("value"), j.get("unit")) {
            // Quantity prints as `value 'unit'`.
            (Some(v), Some(Json::String(unit))) if value.ty == TypeTag::Quantity => {
                format!("{} '{}'", v, unit)
            }
            _ => j.to_string(),
        },
    }
}

/// Converts a map of plain JSON variables into typed bindings.
pub fn typed_variables(variables: &HashMap<String, Json>) -> HashMap<String, TypedValue> {
    variables
        .iter()
        .filter_map(|(name, json)| TypedValue::from_json(json).map(|v| (name.clone(), v)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use serde_json::json;

    #[test]
    fn infers_tags_from_shape() {
        let coding = TypedValue::from_json(&json!({"code": "x"})).unwrap();
        assert_eq!(coding.ty, TypeTag::Coding);

        let concept = TypedValue::from_json(&json!({"coding": [{"code": "y"}]})).unwrap();
        assert_eq!(concept.ty, TypeTag::CodeableConcept);

        let quantity = TypedValue::from_json(&json!({"value": 123, "unit": "mg"})).unwrap();
        assert_eq!(quantity.ty, TypeTag::Quantity);

        let resource = TypedValue::from_json(&json!({"resourceType": "Patient"})).unwrap();
        assert_eq!(resource.ty, TypeTag::Resource);
    }

    #[test]
    fn numeric_equality_crosses_int_and_decimal() {
        assert_eq!(TypedValue::integer(1), TypedValue::decimal(dec!(1.0)));
        assert_ne!(TypedValue::integer(1), TypedValue::decimal(dec!(1.5)));
    }

    #[test]
    fn array_equals_is_ordered() {
        let one = TypedValue::integer(1);
        let two = TypedValue::integer(2);
        assert_eq!(
            array_equals(&[one.clone(), two.clone()], &[two.clone(), one.clone()]),
            boolean_sequence(false)
        );
        assert_eq!(
            array_equals(&[one.clone()], &[one.clone()]),
            boolean_sequence(true)
        );
        assert!(array_equals(&[], &[one]).is_empty());
    }

    #[test]
    fn array_equivalent_ignores_order() {
        let one = TypedValue::integer(1);
        let two = TypedValue::integer(2);
        assert_eq!(
            array_equivalent(&[one.clone(), two.clone()], &[two, one]),
            boolean_sequence(true)
        );
    }

    #[test]
    fn equivalence_tolerates_small_decimal_noise() {
        assert_eq!(
            array_equivalent(
                &[TypedValue::decimal(dec!(1.0))],
                &[TypedValue::decimal(dec!(1.0001))]
            ),
            boolean_sequence(true)
        );
        assert_eq!(
            array_equivalent(
                &[TypedValue::decimal(dec!(1.0))],
                &[TypedValue::decimal(dec!(1.5))]
            ),
            boolean_sequence(false)
        );
    }

    #[test]
    fn is_checks_resources_by_resource_type() {
        let patient = TypedValue::from_json(&json!({"resourceType": "Patient"})).unwrap();
        assert!(fhir_path_is(&patient, "Patient"));
        assert!(!fhir_path_is(&patient, "Observation"));
        assert!(fhir_path_is(&TypedValue::boolean(true), "Boolean"));
        assert!(!fhir_path_is(&TypedValue::integer(1), "Boolean"));
    }

    #[test]
    fn json_sequence_flattens_arrays_and_drops_nulls() {
        let seq = json_to_sequence(&json!([1, null, [2, 3]]));
        assert_eq!(seq.len(), 3);
    }
}
