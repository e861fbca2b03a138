//! Subsetting functions: cardinality-checked selection and slicing.

use super::eval_numeric_arg;
use crate::atom::Atom;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::value::{TypedValue, remove_duplicates};

/// Enforces the at-most-one contract at runtime.
pub(super) fn single(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    if input.len() > 1 {
        return Err(EvalError::SingletonRequired {
            function: "single".to_string(),
        });
    }
    Ok(input.to_vec())
}

pub(super) fn first(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(input.first().cloned().into_iter().collect())
}

pub(super) fn last(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(input.last().cloned().into_iter().collect())
}

pub(super) fn tail(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    if input.is_empty() {
        return Ok(Vec::new());
    }
    Ok(input[1..].to_vec())
}

pub(super) fn skip(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(arg) = args.first() else {
        return Err(EvalError::NumberRequired {
            function: "skip".to_string(),
        });
    };
    let num = eval_numeric_arg(ctx, input, arg, "skip")?;
    if num >= input.len() as i64 {
        return Ok(Vec::new());
    }
    if num <= 0 {
        return Ok(input.to_vec());
    }
    Ok(input[num as usize..].to_vec())
}

pub(super) fn take(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(arg) = args.first() else {
        return Err(EvalError::NumberRequired {
            function: "take".to_string(),
        });
    };
    let num = eval_numeric_arg(ctx, input, arg, "take")?;
    if num >= input.len() as i64 {
        return Ok(input.to_vec());
    }
    if num <= 0 {
        return Ok(Vec::new());
    }
    Ok(input[..num as usize].to_vec())
}

/// Elements present in both collections, deduplicated.
pub(super) fn intersect(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let other = match args.first() {
        Some(arg) => arg.eval(ctx, input)?,
        None => return Ok(Vec::new()),
    };
    Ok(remove_duplicates(
        input
            .iter()
            .filter(|v| other.contains(v))
            .cloned()
            .collect(),
    ))
}

/// Elements not present in the other collection; order preserved, no
/// deduplication.
pub(super) fn exclude(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let other = match args.first() {
        Some(arg) => arg.eval(ctx, input)?,
        None => return Ok(input.to_vec()),
    };
    Ok(input
        .iter()
        .filter(|v| !other.contains(v))
        .cloned()
        .collect())
}
