//! Conversion functions. Every `toX` defines a shape gate per source type;
//! values that fail the gate convert to empty, never to an error. The
//! matching `convertsToX` reports whether the gate would pass.

use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;

use super::single_input;
use crate::atom::Atom;
use crate::context::EvalContext;
use crate::datetime::{is_date_string, is_date_time_string, is_time_string};
use crate::error::EvalError;
use crate::value::{TypeTag, TypedValue, Value, boolean_sequence, stringify, to_js_boolean};

static INTEGER_GATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+$").expect("valid regex"));

static DECIMAL_GATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[+-]?\d+(\.\d+)?$").expect("valid regex"));

static QUANTITY_GATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([+-]?\d+(\.\d+)?)\s*('([^']+)')?$").expect("valid regex"));

const TRUE_STRINGS: &[&str] = &["true", "t", "yes", "y", "1", "1.0"];
const FALSE_STRINGS: &[&str] = &["false", "f", "no", "n", "0", "0.0"];

/// `iif(criterion, then [, else])`: only the taken branch is evaluated.
pub(super) fn iif(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    if args.len() < 2 || args.len() > 3 {
        return Err(EvalError::invalid("Expected 2 or 3 arguments for iif()"));
    }
    let criterion = args[0].eval(ctx, input)?;
    if criterion.len() > 1
        || criterion
            .first()
            .is_some_and(|v| v.value.as_bool().is_none())
    {
        return Err(EvalError::invalid(
            "Expected criterion to evaluate to a Boolean",
        ));
    }
    if to_js_boolean(&criterion) {
        args[1].eval(ctx, input)
    } else if let Some(otherwise) = args.get(2) {
        otherwise.eval(ctx, input)
    } else {
        Ok(Vec::new())
    }
}

fn convert_boolean(value: &TypedValue) -> Option<bool> {
    match &value.value {
        Value::Bool(b) => Some(*b),
        Value::Int(0) => Some(false),
        Value::Int(1) => Some(true),
        Value::Dec(d) if d.is_zero() => Some(false),
        Value::Dec(d) if *d == Decimal::ONE => Some(true),
        Value::Str(s) => {
            let lower = s.to_lowercase();
            if TRUE_STRINGS.contains(&lower.as_str()) {
                Some(true)
            } else if FALSE_STRINGS.contains(&lower.as_str()) {
                Some(false)
            } else {
                None
            }
        }
        _ => None,
    }
}

pub(super) fn to_boolean(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(convert_boolean(value)
        .map(TypedValue::boolean)
        .into_iter()
        .collect())
}

pub(super) fn converts_to_boolean(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(boolean_sequence(convert_boolean(value).is_some()))
}

fn convert_integer(value: &TypedValue) -> Option<i64> {
    match &value.value {
        Value::Int(i) => Some(*i),
        Value::Bool(b) => Some(if *b { 1 } else { 0 }),
        Value::Str(s) if INTEGER_GATE.is_match(s) => s.parse().ok(),
        _ => None,
    }
}

pub(super) fn to_integer(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(convert_integer(value)
        .map(TypedValue::integer)
        .into_iter()
        .collect())
}

pub(super) fn converts_to_integer(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(boolean_sequence(convert_integer(value).is_some()))
}

fn convert_decimal(value: &TypedValue) -> Option<Decimal> {
    match &value.value {
        Value::Int(i) => Some(Decimal::from(*i)),
        Value::Dec(d) => Some(*d),
        Value::Bool(b) => Some(if *b { Decimal::ONE } else { Decimal::ZERO }),
        Value::Str(s) if DECIMAL_GATE.is_match(s) => s.parse().ok(),
        _ => None,
    }
}

pub(super) fn to_decimal(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(convert_decimal(value)
        .map(TypedValue::decimal)
        .into_iter()
        .collect())
}

pub(super) fn converts_to_decimal(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(boolean_sequence(convert_decimal(value).is_some()))
}

fn convert_date(value: &TypedValue) -> Option<String> {
    let s = value.value.as_str()?;
    if is_date_string(s) {
        return Some(s.to_string());
    }
    if is_date_time_string(s) {
        // Truncate a datetime to its date part.
        return s.split('T').next().map(str::to_string);
    }
    None
}

pub(super) fn to_date(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(convert_date(value)
        .map(|s| TypedValue::tagged_string(TypeTag::Date, s))
        .into_iter()
        .collect())
}

pub(super) fn converts_to_date(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(boolean_sequence(convert_date(value).is_some()))
}

fn convert_date_time(value: &TypedValue) -> Option<String> {
    let s = value.value.as_str()?;
    if is_date_time_string(s) {
        Some(s.to_string())
    } else {
        None
    }
}

pub(super) fn to_date_time(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(convert_date_time(value)
        .map(|s| TypedValue::tagged_string(TypeTag::DateTime, s))
        .into_iter()
        .collect())
}

pub(super) fn converts_to_date_time(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(boolean_sequence(convert_date_time(value).is_some()))
}

fn convert_time(value: &TypedValue) -> Option<String> {
    let s = value.value.as_str()?;
    if is_time_string(s) {
        let bare = s.strip_prefix('T').unwrap_or(s);
        Some(format!("T{}", bare))
    } else {
        None
    }
}

pub(super) fn to_time(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(convert_time(value)
        .map(|s| TypedValue::tagged_string(TypeTag::Time, s))
        .into_iter()
        .collect())
}

pub(super) fn converts_to_time(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(boolean_sequence(convert_time(value).is_some()))
}

fn convert_quantity(value: &TypedValue) -> Option<serde_json::Value> {
    match &value.value {
        Value::Json(json) if value.ty == TypeTag::Quantity => Some(json.clone()),
        Value::Int(i) => Some(serde_json::json!({"value": i, "unit": "1"})),
        Value::Dec(d) => {
            let number = rust_decimal::prelude::ToPrimitive::to_f64(d)?;
            Some(serde_json::json!({"value": number, "unit": "1"}))
        }
        Value::Bool(b) => Some(serde_json::json!({"value": if *b { 1 } else { 0 }, "unit": "1"})),
        Value::Str(s) => {
            let captures = QUANTITY_GATE.captures(s)?;
            let number: f64 = captures.get(1)?.as_str().parse().ok()?;
            let unit = captures.get(4).map_or("1", |m| m.as_str());
            Some(serde_json::json!({"value": number, "unit": unit}))
        }
        _ => None,
    }
}

pub(super) fn to_quantity(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(convert_quantity(value)
        .map(|json| TypedValue::object(TypeTag::Quantity, json))
        .into_iter()
        .collect())
}

pub(super) fn converts_to_quantity(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(boolean_sequence(convert_quantity(value).is_some()))
}

pub(super) fn to_string(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(value) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(vec![TypedValue::string(stringify(value))])
}

pub(super) fn converts_to_string(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(_) = single_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(boolean_sequence(true))
}
