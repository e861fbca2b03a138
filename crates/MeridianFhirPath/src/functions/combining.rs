//! Combining functions: `union` deduplicates, `combine` does not.

use crate::atom::Atom;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::value::{TypedValue, remove_duplicates};

pub(super) fn union(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let mut result = input.to_vec();
    if let Some(arg) = args.first() {
        result.extend(arg.eval(ctx, input)?);
    }
    Ok(remove_duplicates(result))
}

pub(super) fn combine(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let mut result = input.to_vec();
    if let Some(arg) = args.first() {
        result.extend(arg.eval(ctx, input)?);
    }
    Ok(result)
}
