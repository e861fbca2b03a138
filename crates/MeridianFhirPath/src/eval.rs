//! Evaluation semantics for every Atom variant.
//!
//! Evaluation is pure: it reads the Atom tree, the context, and the input
//! sequence, and produces a new sequence. Missing members yield empty
//! results, not errors; errors are reserved for contract violations
//! (cardinality, types, undefined variables).

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use serde_json::Value as Json;

use crate::atom::{Atom, BinaryOp, UnaryOp};
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::functions;
use crate::value::{
    TypeTag, TypedValue, Value, array_equals, array_equivalent, boolean_sequence, fhir_path_is,
    json_to_sequence, sequence_not, to_js_boolean,
};

impl Atom {
    /// Evaluates this node against an input sequence.
    pub fn eval(
        &self,
        ctx: &EvalContext<'_>,
        input: &[TypedValue],
    ) -> Result<Vec<TypedValue>, EvalError> {
        match self {
            Atom::Literal(value) => Ok(vec![value.clone()]),
            Atom::Symbol(name) => eval_symbol(name, ctx, input),
            Atom::EmptySet => Ok(Vec::new()),
            Atom::Unary { op, child } => eval_unary(*op, child, ctx, input),
            Atom::Arithmetic { op, left, right } => eval_arithmetic(*op, left, right, ctx, input),
            Atom::Concat { left, right } => eval_concat(left, right, ctx, input),
            Atom::Union { left, right } => {
                // The `|` operator concatenates; only the union() function
                // deduplicates.
                let mut result = left.eval(ctx, input)?;
                result.extend(right.eval(ctx, input)?);
                Ok(result)
            }
            Atom::Equals { left, right } => {
                Ok(array_equals(&left.eval(ctx, input)?, &right.eval(ctx, input)?))
            }
            Atom::NotEquals { left, right } => Ok(sequence_not(array_equals(
                &left.eval(ctx, input)?,
                &right.eval(ctx, input)?,
            ))),
            Atom::Equivalent { left, right } => Ok(array_equivalent(
                &left.eval(ctx, input)?,
                &right.eval(ctx, input)?,
            )),
            Atom::NotEquivalent { left, right } => Ok(sequence_not(array_equivalent(
                &left.eval(ctx, input)?,
                &right.eval(ctx, input)?,
            ))),
            Atom::And { left, right } => eval_and(left, right, ctx, input),
            Atom::Or { left, right } => eval_or(left, right, ctx, input),
            Atom::Xor { left, right } => eval_xor(left, right, ctx, input),
            Atom::Implies { left, right } => eval_implies(left, right, ctx, input),
            Atom::In { left, right } => {
                let needle = left.eval(ctx, input)?;
                if needle.is_empty() {
                    return Ok(Vec::new());
                }
                let haystack = right.eval(ctx, input)?;
                Ok(boolean_sequence(haystack.contains(&needle[0])))
            }
            Atom::Contains { left, right } => {
                let needle = right.eval(ctx, input)?;
                if needle.is_empty() {
                    return Ok(Vec::new());
                }
                let haystack = left.eval(ctx, input)?;
                Ok(boolean_sequence(haystack.contains(&needle[0])))
            }
            Atom::Is { child, type_name } => {
                let result = child.eval(ctx, input)?;
                if result.len() != 1 {
                    return Ok(Vec::new());
                }
                Ok(boolean_sequence(fhir_path_is(&result[0], type_name)))
            }
            Atom::As { child, type_name } => {
                // Yields matching values only; never an error.
                Ok(child
                    .eval(ctx, input)?
                    .into_iter()
                    .filter(|v| fhir_path_is(v, type_name))
                    .collect())
            }
            Atom::Dot { left, right } => {
                let left_result = left.eval(ctx, input)?;
                right.eval(ctx, &left_result)
            }
            Atom::Indexer { left, index } => eval_indexer(left, index, ctx, input),
            Atom::Function { name, args } => match functions::lookup(name) {
                Some(function) => function(ctx, input, args),
                None => Err(EvalError::UnrecognizedFunction { name: name.clone() }),
            },
        }
    }
}

fn eval_symbol(
    name: &str,
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
) -> Result<Vec<TypedValue>, EvalError> {
    if name == "$this" {
        return Ok(input.to_vec());
    }
    if let Some(variable) = name.strip_prefix('%') {
        return match ctx.variable(variable) {
            Some(value) => Ok(vec![value.clone()]),
            None => Err(EvalError::UndefinedVariable {
                name: variable.to_string(),
            }),
        };
    }
    if name.starts_with('$') {
        // $index / $total are bound by the functions that introduce them.
        return match ctx.variable(name) {
            Some(value) => Ok(vec![value.clone()]),
            None => Err(EvalError::UndefinedVariable {
                name: name.to_string(),
            }),
        };
    }
    let mut result = Vec::new();
    for element in input {
        if element.resource_type() == Some(name) {
            result.push(element.clone());
        } else {
            result.extend(get_typed_property(element, name));
        }
    }
    Ok(result)
}

/// Member access on one element. Undefined members yield empty. When the
/// exact key is absent, choice-typed members are resolved by prefix
/// (`value` matches `valueQuantity`), and the suffix refines the tag.
pub fn get_typed_property(element: &TypedValue, name: &str) -> Vec<TypedValue> {
    let Some(map) = element.value.as_object() else {
        return Vec::new();
    };
    if let Some(value) = map.get(name) {
        return json_to_sequence(value);
    }
    for (key, value) in map {
        if let Some(suffix) = key.strip_prefix(name) {
            if suffix.chars().next().is_some_and(|c| c.is_ascii_uppercase()) {
                let tag = TypeTag::from_declared(suffix);
                return json_to_sequence(value)
                    .into_iter()
                    .map(|v| retag(v, tag))
                    .collect();
            }
        }
    }
    Vec::new()
}

fn retag(value: TypedValue, tag: TypeTag) -> TypedValue {
    match (&value.value, tag) {
        // Primitive payloads adopt the declared tag; complex payloads keep
        // their inferred tag when the declaration is just "some element".
        (Value::Json(_), TypeTag::BackboneElement) => value,
        _ => TypedValue {
            ty: tag,
            value: value.value,
        },
    }
}

fn eval_unary(
    op: UnaryOp,
    child: &Atom,
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
) -> Result<Vec<TypedValue>, EvalError> {
    let result = child.eval(ctx, input)?;
    match op {
        UnaryOp::Plus => Ok(result),
        UnaryOp::Negate => result
            .into_iter()
            .map(|v| match v.value {
                Value::Int(i) => Ok(TypedValue::integer(-i)),
                Value::Dec(d) => Ok(TypedValue::decimal(-d)),
                _ => Err(EvalError::NonNumericInput),
            })
            .collect(),
    }
}

/// A numeric operand: its decimal value, whether it was an integer, and the
/// quantity payload it came from (if any).
struct Operand {
    number: Decimal,
    is_integer: bool,
    quantity: Option<Json>,
}

fn numeric_operand(value: &TypedValue) -> Option<Operand> {
    match &value.value {
        Value::Int(i) => Some(Operand {
            number: Decimal::from(*i),
            is_integer: true,
            quantity: None,
        }),
        Value::Dec(d) => Some(Operand {
            number: *d,
            is_integer: false,
            quantity: None,
        }),
        Value::Json(json) if value.ty == TypeTag::Quantity => {
            let number = json.get("value")?.as_f64()?;
            Some(Operand {
                number: Decimal::from_f64(number)?,
                is_integer: false,
                quantity: Some(json.clone()),
            })
        }
        _ => None,
    }
}

fn eval_arithmetic(
    op: BinaryOp,
    left: &Atom,
    right: &Atom,
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
) -> Result<Vec<TypedValue>, EvalError> {
    let left_result = left.eval(ctx, input)?;
    if left_result.len() != 1 {
        return Ok(Vec::new());
    }
    let right_result = right.eval(ctx, input)?;
    if right_result.len() != 1 {
        return Ok(Vec::new());
    }
    let (lhs, rhs) = (&left_result[0], &right_result[0]);

    if let (Some(l), Some(r)) = (numeric_operand(lhs), numeric_operand(rhs)) {
        return Ok(numeric_result(op, l, r));
    }

    // Strings (including date/time tags, whose payloads are strings)
    // support `+` and ordering.
    if let (Some(l), Some(r)) = (lhs.value.as_str(), rhs.value.as_str()) {
        return Ok(match op {
            BinaryOp::Add => vec![TypedValue::string(format!("{}{}", l, r))],
            BinaryOp::LessThan => boolean_sequence(l < r),
            BinaryOp::LessThanOrEquals => boolean_sequence(l <= r),
            BinaryOp::GreaterThan => boolean_sequence(l > r),
            BinaryOp::GreaterThanOrEquals => boolean_sequence(l >= r),
            _ => Vec::new(),
        });
    }

    Ok(Vec::new())
}

fn numeric_result(op: BinaryOp, l: Operand, r: Operand) -> Vec<TypedValue> {
    let ints = l.is_integer && r.is_integer;
    let result = match op {
        BinaryOp::Add => Some(l.number + r.number),
        BinaryOp::Subtract => Some(l.number - r.number),
        BinaryOp::Multiply => Some(l.number * r.number),
        BinaryOp::Divide => {
            if r.number.is_zero() {
                None
            } else {
                return wrap_number(l.number / r.number, false, &l.quantity);
            }
        }
        BinaryOp::IntDivide => {
            if r.number.is_zero() {
                None
            } else {
                return (l.number / r.number)
                    .trunc()
                    .to_i64()
                    .map(|i| vec![TypedValue::integer(i)])
                    .unwrap_or_default();
            }
        }
        BinaryOp::Modulo => {
            if r.number.is_zero() {
                None
            } else {
                Some(l.number % r.number)
            }
        }
        BinaryOp::Exponent => power(l.number, r.number),
        BinaryOp::LessThan => return boolean_sequence(l.number < r.number),
        BinaryOp::LessThanOrEquals => return boolean_sequence(l.number <= r.number),
        BinaryOp::GreaterThan => return boolean_sequence(l.number > r.number),
        BinaryOp::GreaterThanOrEquals => return boolean_sequence(l.number >= r.number),
    };
    match result {
        Some(number) => wrap_number(number, ints, &l.quantity),
        None => Vec::new(),
    }
}

/// Exponentiation; unrepresentable results (e.g. `(-1) ^ 0.5`) are empty.
fn power(base: Decimal, exponent: Decimal) -> Option<Decimal> {
    if exponent.fract().is_zero() {
        if let Some(exp) = exponent.to_i64() {
            return base.checked_powi(exp);
        }
    }
    let result = base.to_f64()?.powf(exponent.to_f64()?);
    if result.is_finite() {
        Decimal::from_f64(result)
    } else {
        None
    }
}

fn wrap_number(number: Decimal, as_integer: bool, quantity: &Option<Json>) -> Vec<TypedValue> {
    if let Some(json) = quantity {
        let mut quantity = json.clone();
        if let Some(map) = quantity.as_object_mut() {
            let value = number
                .to_f64()
                .and_then(serde_json::Number::from_f64)
                .map(Json::Number)
                .unwrap_or(Json::Null);
            map.insert("value".to_string(), value);
        }
        return vec![TypedValue::object(TypeTag::Quantity, quantity)];
    }
    if as_integer {
        match number.to_i64() {
            Some(i) => vec![TypedValue::integer(i)],
            None => vec![TypedValue::decimal(number)],
        }
    } else {
        vec![TypedValue::decimal(number)]
    }
}

fn eval_concat(
    left: &Atom,
    right: &Atom,
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
) -> Result<Vec<TypedValue>, EvalError> {
    let mut result = left.eval(ctx, input)?;
    result.extend(right.eval(ctx, input)?);
    if !result.is_empty() && result.iter().all(|v| v.value.as_str().is_some()) {
        let joined: String = result
            .iter()
            .filter_map(|v| v.value.as_str())
            .collect::<Vec<_>>()
            .join("");
        return Ok(vec![TypedValue::string(joined)]);
    }
    Ok(result)
}

fn first_bool(values: &[TypedValue]) -> Option<bool> {
    values.first().and_then(|v| v.value.as_bool())
}

/// Three-valued AND; short-circuits on a definite false.
fn eval_and(
    left: &Atom,
    right: &Atom,
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
) -> Result<Vec<TypedValue>, EvalError> {
    let left_result = left.eval(ctx, input)?;
    if first_bool(&left_result) == Some(false) {
        return Ok(boolean_sequence(false));
    }
    let right_result = right.eval(ctx, input)?;
    if first_bool(&right_result) == Some(false) {
        return Ok(boolean_sequence(false));
    }
    if first_bool(&left_result) == Some(true) && first_bool(&right_result) == Some(true) {
        return Ok(boolean_sequence(true));
    }
    Ok(Vec::new())
}

/// Three-valued OR; short-circuits on a definite true.
fn eval_or(
    left: &Atom,
    right: &Atom,
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
) -> Result<Vec<TypedValue>, EvalError> {
    let left_result = left.eval(ctx, input)?;
    if to_js_boolean(&left_result) {
        return Ok(left_result);
    }
    let right_result = right.eval(ctx, input)?;
    if to_js_boolean(&right_result) {
        return Ok(right_result);
    }
    if first_bool(&left_result) == Some(false) && first_bool(&right_result) == Some(false) {
        return Ok(boolean_sequence(false));
    }
    Ok(Vec::new())
}

/// XOR never short-circuits.
fn eval_xor(
    left: &Atom,
    right: &Atom,
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
) -> Result<Vec<TypedValue>, EvalError> {
    let left_result = left.eval(ctx, input)?;
    let right_result = right.eval(ctx, input)?;
    if left_result.is_empty() && right_result.is_empty() {
        return Ok(Vec::new());
    }
    let l = first_bool(&left_result);
    let r = first_bool(&right_result);
    match (l, r) {
        (Some(true), Some(false)) | (Some(false), Some(true)) => Ok(boolean_sequence(true)),
        (Some(true), Some(true)) | (Some(false), Some(false)) => Ok(boolean_sequence(false)),
        _ => Ok(Vec::new()),
    }
}

/// IMPLIES never short-circuits and rejects multi-valued operands.
fn eval_implies(
    left: &Atom,
    right: &Atom,
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
) -> Result<Vec<TypedValue>, EvalError> {
    let left_result = left.eval(ctx, input)?;
    let right_result = right.eval(ctx, input)?;
    if left_result.len() > 1 || right_result.len() > 1 {
        return Err(EvalError::invalid("Expected single boolean value"));
    }
    let l = first_bool(&left_result);
    let r = first_bool(&right_result);
    if r == Some(true) || l == Some(false) {
        return Ok(boolean_sequence(true));
    }
    if left_result.is_empty() || right_result.is_empty() {
        return Ok(Vec::new());
    }
    Ok(boolean_sequence(false))
}

fn eval_indexer(
    left: &Atom,
    index: &Atom,
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
) -> Result<Vec<TypedValue>, EvalError> {
    let index_result = index.eval(ctx, input)?;
    if index_result.len() != 1 {
        return Ok(Vec::new());
    }
    let Some(i) = index_result[0].value.as_int() else {
        return Err(EvalError::invalid(
            "Invalid indexer expression: should return integer",
        ));
    };
    let left_result = left.eval(ctx, input)?;
    if i < 0 || (i as usize) >= left_result.len() {
        return Ok(Vec::new());
    }
    Ok(vec![left_result[i as usize].clone()])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn ctx() -> EvalContext<'static> {
        EvalContext::root(HashMap::new())
    }

    fn lit(v: TypedValue) -> Atom {
        Atom::Literal(v)
    }

    #[test]
    fn property_access_flattens_arrays() {
        let patient = TypedValue::from_json(&json!({
            "resourceType": "Patient",
            "name": [{"given": ["Alice", "Ann"]}, {"given": ["Al"]}]
        }))
        .unwrap();
        let names = get_typed_property(&patient, "name");
        assert_eq!(names.len(), 2);
        let given: Vec<TypedValue> = names
            .iter()
            .flat_map(|n| get_typed_property(n, "given"))
            .collect();
        assert_eq!(given.len(), 3);
    }

    #[test]
    fn choice_member_resolves_by_prefix() {
        let observation = TypedValue::from_json(&json!({
            "resourceType": "Observation",
            "valueQuantity": {"value": 5.0, "unit": "mg"}
        }))
        .unwrap();
        let values = get_typed_property(&observation, "value");
        assert_eq!(values.len(), 1);
        assert_eq!(values[0].ty, TypeTag::Quantity);
    }

    #[test]
    fn and_is_three_valued() {
        let t = lit(TypedValue::boolean(true));
        let f = lit(TypedValue::boolean(false));
        let empty = Atom::EmptySet;

        let eval = |l: &Atom, r: &Atom| {
            Atom::And {
                left: Box::new(l.clone()),
                right: Box::new(r.clone()),
            }
            .eval(&ctx(), &[])
            .unwrap()
        };
        assert_eq!(eval(&t, &t), boolean_sequence(true));
        assert_eq!(eval(&t, &f), boolean_sequence(false));
        assert_eq!(eval(&f, &empty), boolean_sequence(false));
        assert!(eval(&t, &empty).is_empty());
    }

    #[test]
    fn implies_truth_table() {
        let t = lit(TypedValue::boolean(true));
        let f = lit(TypedValue::boolean(false));
        let empty = Atom::EmptySet;

        let eval = |l: &Atom, r: &Atom| {
            Atom::Implies {
                left: Box::new(l.clone()),
                right: Box::new(r.clone()),
            }
            .eval(&ctx(), &[])
            .unwrap()
        };
        assert_eq!(eval(&t, &t), boolean_sequence(true));
        assert_eq!(eval(&t, &f), boolean_sequence(false));
        assert_eq!(eval(&f, &f), boolean_sequence(true));
        assert_eq!(eval(&f, &empty), boolean_sequence(true));
        assert!(eval(&t, &empty).is_empty());
        assert!(eval(&empty, &f).is_empty());
    }

    #[test]
    fn union_does_not_dedupe() {
        let one = lit(TypedValue::integer(1));
        let result = Atom::Union {
            left: Box::new(one.clone()),
            right: Box::new(one),
        }
        .eval(&ctx(), &[])
        .unwrap();
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn division_by_zero_is_empty() {
        let atom = Atom::Arithmetic {
            op: BinaryOp::Divide,
            left: Box::new(lit(TypedValue::integer(1))),
            right: Box::new(lit(TypedValue::integer(0))),
        };
        assert!(atom.eval(&ctx(), &[]).unwrap().is_empty());
    }

    #[test]
    fn undefined_variable_is_an_error() {
        let atom = Atom::symbol("%nope");
        assert_eq!(
            atom.eval(&ctx(), &[]),
            Err(EvalError::UndefinedVariable {
                name: "nope".to_string()
            })
        );
    }
}
