//! String manipulation functions.
//!
//! All of these enforce the singleton-input contract and reject non-string
//! input. Date/time values pass, since their payloads are strings.

use regex::Regex;

use super::{eval_arg, single_input};
use crate::atom::Atom;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::value::{TypedValue, boolean_sequence};

/// Singleton string input, or `None` on empty.
fn string_input(input: &[TypedValue]) -> Result<Option<&str>, EvalError> {
    match single_input(input)? {
        None => Ok(None),
        Some(value) => value
            .value
            .as_str()
            .map(Some)
            .ok_or(EvalError::NonStringInput),
    }
}

fn string_arg(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    arg: Option<&Atom>,
) -> Result<Option<String>, EvalError> {
    let Some(arg) = arg else { return Ok(None) };
    match eval_arg(ctx, input, arg)? {
        Some(value) => value
            .value
            .as_str()
            .map(|s| Some(s.to_string()))
            .ok_or(EvalError::NonStringInput),
        None => Ok(None),
    }
}

fn int_arg(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    arg: Option<&Atom>,
) -> Result<Option<i64>, EvalError> {
    let Some(arg) = arg else { return Ok(None) };
    Ok(eval_arg(ctx, input, arg)?.and_then(|v| v.value.as_int()))
}

pub(super) fn index_of(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    let Some(substring) = string_arg(ctx, input, args.first())? else {
        return Ok(Vec::new());
    };
    let index = match s.find(&substring) {
        Some(byte_index) => s[..byte_index].chars().count() as i64,
        None => -1,
    };
    Ok(vec![TypedValue::integer(index)])
}

pub(super) fn substring(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    let Some(start) = int_arg(ctx, input, args.first())? else {
        return Ok(Vec::new());
    };
    let char_count = s.chars().count() as i64;
    if start < 0 || start >= char_count {
        return Ok(Vec::new());
    }
    let length = int_arg(ctx, input, args.get(1))?.unwrap_or(char_count);
    if length <= 0 {
        return Ok(vec![TypedValue::string("")]);
    }
    let result: String = s
        .chars()
        .skip(start as usize)
        .take(length as usize)
        .collect();
    Ok(vec![TypedValue::string(result)])
}

pub(super) fn starts_with(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    let Some(prefix) = string_arg(ctx, input, args.first())? else {
        return Ok(Vec::new());
    };
    Ok(boolean_sequence(s.starts_with(&prefix)))
}

pub(super) fn ends_with(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    let Some(suffix) = string_arg(ctx, input, args.first())? else {
        return Ok(Vec::new());
    };
    Ok(boolean_sequence(s.ends_with(&suffix)))
}

pub(super) fn contains(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    let Some(substring) = string_arg(ctx, input, args.first())? else {
        return Ok(Vec::new());
    };
    Ok(boolean_sequence(s.contains(&substring)))
}

pub(super) fn upper(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(vec![TypedValue::string(s.to_uppercase())])
}

pub(super) fn lower(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(vec![TypedValue::string(s.to_lowercase())])
}

pub(super) fn replace(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    let (Some(pattern), Some(substitution)) = (
        string_arg(ctx, input, args.first())?,
        string_arg(ctx, input, args.get(1))?,
    ) else {
        return Ok(Vec::new());
    };
    Ok(vec![TypedValue::string(s.replace(&pattern, &substitution))])
}

fn compile_regex(pattern: &str) -> Result<Regex, EvalError> {
    Regex::new(pattern).map_err(|e| EvalError::invalid(format!("Invalid regex: {}", e)))
}

pub(super) fn matches(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    let Some(pattern) = string_arg(ctx, input, args.first())? else {
        return Ok(Vec::new());
    };
    Ok(boolean_sequence(compile_regex(&pattern)?.is_match(s)))
}

pub(super) fn replace_matches(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    let (Some(pattern), Some(substitution)) = (
        string_arg(ctx, input, args.first())?,
        string_arg(ctx, input, args.get(1))?,
    ) else {
        return Ok(Vec::new());
    };
    let regex = compile_regex(&pattern)?;
    Ok(vec![TypedValue::string(
        regex.replace_all(s, substitution.as_str()).into_owned(),
    )])
}

pub(super) fn length(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(vec![TypedValue::integer(s.chars().count() as i64)])
}

pub(super) fn to_chars(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(s.chars().map(|c| TypedValue::string(c.to_string())).collect())
}

pub(super) fn split(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    let Some(separator) = string_arg(ctx, input, args.first())? else {
        return Ok(Vec::new());
    };
    Ok(s.split(separator.as_str())
        .map(TypedValue::string)
        .collect())
}

/// Joins the whole input collection; unlike the other string functions it
/// accepts any number of elements.
pub(super) fn join(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let separator = string_arg(ctx, input, args.first())?.unwrap_or_default();
    let mut parts = Vec::with_capacity(input.len());
    for value in input {
        parts.push(value.value.as_str().ok_or(EvalError::NonStringInput)?);
    }
    Ok(vec![TypedValue::string(parts.join(&separator))])
}

pub(super) fn trim(
    _ctx: &EvalContext<'_>,
    input: &[TypedValue],
    _args: &[Atom],
) -> Result<Vec<TypedValue>, EvalError> {
    let Some(s) = string_input(input)? else {
        return Ok(Vec::new());
    };
    Ok(vec![TypedValue::string(s.trim())])
}
