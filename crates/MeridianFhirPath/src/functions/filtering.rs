//! Filtering and projection: `where`, `select`, `repeat`, `ofType`.

use super::{eval_per_element, type_name_arg};
use crate::atom::Atom;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::value::{TypedValue, fhir_path_is, to_js_boolean};

pub(super) fn where_(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(criteria) = args.first() else {
        return Ok(input.to_vec());
    };
    let results = eval_per_element(ctx, input, criteria)?;
    Ok(results
        .into_iter()
        .filter(|(_, r)| to_js_boolean(r))
        .map(|(element, _)| element.clone())
        .collect())
}

pub(super) fn select(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(projection) = args.first() else {
        return Ok(input.to_vec());
    };
    let results = eval_per_element(ctx, input, projection)?;
    Ok(results.into_iter().flat_map(|(_, r)| r).collect())
}

/// Transitive closure of a projection: keeps applying it to newly produced
/// elements until nothing new appears.
pub(super) fn repeat(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(projection) = args.first() else {
        return Ok(Vec::new());
    };
    let mut result: Vec<TypedValue> = Vec::new();
    let mut work: Vec<TypedValue> = input.to_vec();
    while !work.is_empty() {
        let produced = eval_per_element(ctx, &work, projection)?;
        let mut next_work = Vec::new();
        for (_, values) in produced {
            for value in values {
                if !result.contains(&value) {
                    result.push(value.clone());
                    next_work.push(value);
                }
            }
        }
        work = next_work;
    }
    Ok(result)
}

pub(super) fn of_type(
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
        .filter(|v| fhir_path_is(v, &type_name))
        .cloned()
        .collect())
}
