//! Math functions over singleton numeric input.
//!
//! Transcendental functions go through `f64`; results that are not finite
//! (negative square roots, log of zero) convert to empty rather than error.

use rust_decimal::Decimal;
use rust_decimal::MathematicalOps;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use super::{eval_arg, single_input};
use crate::atom::Atom;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::value::{TypedValue, Value};

/// Singleton numeric input, or `None` on empty.
fn numeric_input(input: &[TypedValue]) -> Result<Option<Decimal>, EvalError> {
    match single_input(input)? {
        None => Ok(None),
        Some(value) => value
            .value
            .as_decimal()
            .map(Some)
            .ok_or(EvalError::NonNumericInput),
    }
}

fn is_integer_input(input: &[TypedValue]) -> bool {
    matches!(input.first().map(|v| &v.value), Some(Value::Int(_)))
}

fn decimal_result(value: Decimal) -> Vec<TypedValue> {
    vec![TypedValue::decimal(value)]
}

fn integer_result(value: Decimal) -> Vec<TypedValue> {
    match value.to_i64() {
        Some(i) => vec![TypedValue::integer(i)],
        None => decimal_result(value),
    }
}

fn float_result(value: f64) -> Vec<TypedValue> {
    if !value.is_finite() {
        return Vec::new();
    }
    Decimal::from_f64(value)
        .map(TypedValue::decimal)
        .into_iter()
        .collect()
}

pub(super) fn abs(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(n) = numeric_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(if is_integer_input(input) {
        integer_result(n.abs())
    } else {
        decimal_result(n.abs())
    })
}

pub(super) fn ceiling(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(n) = numeric_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(integer_result(n.ceil()))
}

pub(super) fn floor(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(n) = numeric_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(integer_result(n.floor()))
}

pub(super) fn exp(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(n) = numeric_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(n.to_f64().map(f64::exp).map(float_result).unwrap_or_default())
}

pub(super) fn ln(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(n) = numeric_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(n.to_f64().map(f64::ln).map(float_result).unwrap_or_default())
}

pub(super) fn log(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(n) = numeric_input(input)? else {
        return Ok(Vec::new());
    };
    let base = match args.first() {
        Some(arg) => eval_arg(ctx, input, arg)?.and_then(|v| v.value.as_decimal()),
        None => None,
    };
    let Some(base) = base else {
        return Ok(Vec::new());
    };
    let (Some(x), Some(b)) = (n.to_f64(), base.to_f64()) else {
        return Ok(Vec::new());
    };
    Ok(float_result(x.ln() / b.ln()))
}

pub(super) fn power(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(n) = numeric_input(input)? else {
        return Ok(Vec::new());
    };
    let exponent = match args.first() {
        Some(arg) => eval_arg(ctx, input, arg)?.and_then(|v| v.value.as_decimal()),
        None => None,
    };
    let Some(exponent) = exponent else {
        return Ok(Vec::new());
    };
    if is_integer_input(input) && exponent.fract().is_zero() && !exponent.is_sign_negative() {
        if let Some(exp) = exponent.to_i64() {
            if let Some(result) = n.checked_powi(exp) {
                return Ok(integer_result(result));
            }
        }
    }
    let (Some(x), Some(e)) = (n.to_f64(), exponent.to_f64()) else {
        return Ok(Vec::new());
    };
    Ok(float_result(x.powf(e)))
}

pub(super) fn round(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(n) = numeric_input(input)? else {
        return Ok(Vec::new());
    };
    let precision = match args.first() {
        Some(arg) => eval_arg(ctx, input, arg)?
            .and_then(|v| v.value.as_int())
            .unwrap_or(0),
        None => 0,
    };
    if precision < 0 {
        return Err(EvalError::invalid("Expected precision >= 0 for round()"));
    }
    let rounded = n.round_dp_with_strategy(
        precision as u32,
        rust_decimal::RoundingStrategy::MidpointAwayFromZero,
    );
    Ok(if precision == 0 {
        integer_result(rounded)
    } else {
        decimal_result(rounded)
    })
}

pub(super) fn sqrt(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(n) = numeric_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(n.to_f64().map(f64::sqrt).map(float_result).unwrap_or_default())
}

pub(super) fn truncate(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(n) = numeric_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(integer_result(n.trunc()))
}
