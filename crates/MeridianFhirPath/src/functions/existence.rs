//! Existence functions: emptiness, quantifiers, counting, distinctness.

use super::eval_per_element;
use crate::atom::Atom;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::value::{TypedValue, boolean_sequence, remove_duplicates, to_js_boolean};

pub(super) fn empty(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(boolean_sequence(input.is_empty()))
}

/// `exists()` or `exists(criteria)`, shorthand for `where(criteria).exists()`.
pub(super) fn exists(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    match args.first() {
        None => Ok(boolean_sequence(!input.is_empty())),
        Some(criteria) => {
            let results = eval_per_element(ctx, input, criteria)?;
            Ok(boolean_sequence(
                results.iter().any(|(_, r)| to_js_boolean(r)),
            ))
        }
    }
}

/// True when the criteria holds for every element; vacuously true on empty.
pub(super) fn all(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(criteria) = args.first() else {
        return Ok(boolean_sequence(true));
    };
    let results = eval_per_element(ctx, input, criteria)?;
    Ok(boolean_sequence(
        results.iter().all(|(_, r)| to_js_boolean(r)),
    ))
}

pub(super) fn all_true(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(boolean_sequence(
        input.iter().all(|v| v.value.as_bool() == Some(true)),
    ))
}

pub(super) fn any_true(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(boolean_sequence(
        input.iter().any(|v| v.value.as_bool() == Some(true)),
    ))
}

pub(super) fn all_false(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(boolean_sequence(
        input.iter().all(|v| v.value.as_bool() == Some(false)),
    ))
}

pub(super) fn any_false(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(boolean_sequence(
        input.iter().any(|v| v.value.as_bool() == Some(false)),
    ))
}

pub(super) fn subset_of(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let other = eval_collection_arg(ctx, input, args)?;
    Ok(boolean_sequence(
        input.iter().all(|v| other.contains(v)),
    ))
}

pub(super) fn superset_of(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let other = eval_collection_arg(ctx, input, args)?;
    Ok(boolean_sequence(
        other.iter().all(|v| input.contains(v)),
    ))
}

fn eval_collection_arg(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    match args.first() {
        Some(arg) => arg.eval(ctx, input),
        None => Ok(Vec::new()),
    }
}

pub(super) fn count(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(vec![TypedValue::integer(input.len() as i64)])
}

pub(super) fn distinct(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    Ok(remove_duplicates(input.to_vec()))
}

pub(super) fn is_distinct(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let deduped = remove_duplicates(input.to_vec());
    Ok(boolean_sequence(deduped.len() == input.len()))
}
