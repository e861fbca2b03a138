//! The builtin function library.
//!
//! Functions receive their arguments as unevaluated [`Atom`]s so that
//! conditional forms (`iif`, `where`) only evaluate the branches they need.
//! Each category lives in its own module; the registry below is the single
//! dispatch table, also used by the parser to validate call sites.

mod combining;
mod conversion;
mod existence;
mod filtering;
mod math;
mod strings;
mod subsetting;
mod utility;

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::atom::Atom;
use crate::context::EvalContext;
use crate::error::EvalError;
use crate::value::TypedValue;

/// Signature of every builtin: context, input sequence, unevaluated args.
pub type BuiltinFn =
    fn(&EvalContext<'_>, &[TypedValue], &[Atom]) -> Result<Vec<TypedValue>, EvalError>;

static REGISTRY: Lazy<HashMap<&'static str, BuiltinFn>> = Lazy::new(|| {
    let entries: &[(&'static str, BuiltinFn)] = &[
        // 5.1 Existence
        ("empty", existence::empty),
        ("exists", existence::exists),
        ("all", existence::all),
        ("allTrue", existence::all_true),
        ("anyTrue", existence::any_true),
        ("allFalse", existence::all_false),
        ("anyFalse", existence::any_false),
        ("subsetOf", existence::subset_of),
        ("supersetOf", existence::superset_of),
        ("count", existence::count),
        ("distinct", existence::distinct),
        ("isDistinct", existence::is_distinct),
        // 5.2 Filtering and projection
        ("where", filtering::where_),
        ("select", filtering::select),
        ("repeat", filtering::repeat),
        ("ofType", filtering::of_type),
        // 5.3 Subsetting
        ("single", subsetting::single),
        ("first", subsetting::first),
        ("last", subsetting::last),
        ("tail", subsetting::tail),
        ("skip", subsetting::skip),
        ("take", subsetting::take),
        ("intersect", subsetting::intersect),
        ("exclude", subsetting::exclude),
        // 5.4 Combining
        ("union", combining::union),
        ("combine", combining::combine),
        // 5.5 Conversion
        ("iif", conversion::iif),
        ("toBoolean", conversion::to_boolean),
        ("convertsToBoolean", conversion::converts_to_boolean),
        ("toInteger", conversion::to_integer),
        ("convertsToInteger", conversion::converts_to_integer),
        ("toDecimal", conversion::to_decimal),
        ("convertsToDecimal", conversion::converts_to_decimal),
        ("toDate", conversion::to_date),
        ("convertsToDate", conversion::converts_to_date),
        ("toDateTime", conversion::to_date_time),
        ("convertsToDateTime", conversion::converts_to_date_time),
        ("toTime", conversion::to_time),
        ("convertsToTime", conversion::converts_to_time),
        ("toQuantity", conversion::to_quantity),
        ("convertsToQuantity", conversion::converts_to_quantity),
        ("toString", conversion::to_string),
        ("convertsToString", conversion::converts_to_string),
        // 5.6 String manipulation
        ("indexOf", strings::index_of),
        ("substring", strings::substring),
        ("startsWith", strings::starts_with),
        ("endsWith", strings::ends_with),
        ("contains", strings::contains),
        ("upper", strings::upper),
        ("lower", strings::lower),
        ("replace", strings::replace),
        ("matches", strings::matches),
        ("replaceMatches", strings::replace_matches),
        ("length", strings::length),
        ("toChars", strings::to_chars),
        ("split", strings::split),
        ("join", strings::join),
        ("trim", strings::trim),
        // 5.7 Math
        ("abs", math::abs),
        ("ceiling", math::ceiling),
        ("exp", math::exp),
        ("floor", math::floor),
        ("ln", math::ln),
        ("log", math::log),
        ("power", math::power),
        ("round", math::round),
        ("sqrt", math::sqrt),
        ("truncate", math::truncate),
        // 5.8 Tree navigation
        ("children", utility::children),
        ("descendants", utility::descendants),
        // 5.9 Utility and model functions
        ("trace", utility::trace),
        ("now", utility::now),
        ("timeOfDay", utility::time_of_day),
        ("today", utility::today),
        ("resolve", utility::resolve),
        ("as", utility::as_),
        ("is", utility::is),
        ("type", utility::type_),
        ("conformsTo", utility::conforms_to),
        ("not", utility::not),
        ("getReferenceString", utility::get_reference_string),
    ];
    entries.iter().copied().collect()
});

/// Looks a builtin up by its public name.
pub fn lookup(name: &str) -> Option<BuiltinFn> {
    REGISTRY.get(name).copied()
}

/// Used by the parser to reject unknown call sites at parse time.
pub fn is_registered(name: &str) -> bool {
    REGISTRY.contains_key(name)
}

// Shared argument plumbing.

/// Singleton-input contract shared by most scalar functions: empty input
/// short-circuits to `None`, more than one element is an error.
fn single_input(input: &[TypedValue]) -> Result<Option<&TypedValue>, EvalError> {
    match input.len() {
        0 => Ok(None),
        1 => Ok(Some(&input[0])),
        _ => Err(EvalError::ExpectedArguments { count: 1 }),
    }
}

/// Evaluates an argument atom and returns its single value, or `None` when
/// it evaluates to empty.
fn eval_arg(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    arg: &Atom,
) -> Result<Option<TypedValue>, EvalError> {
    let mut result = arg.eval(ctx, input)?;
    match result.len() {
        0 => Ok(None),
        _ => Ok(Some(result.swap_remove(0))),
    }
}

/// Evaluates an argument that must produce an integer, reporting the
/// function name on violation (`Expected a number for skip(num)`).
fn eval_numeric_arg(
    ctx: &EvalContext<'_>,
    input: &[TypedValue],
    arg: &Atom,
    function: &str,
) -> Result<i64, EvalError> {
    match eval_arg(ctx, input, arg)? {
        Some(value) => value.value.as_int().ok_or_else(|| EvalError::NumberRequired {
            function: function.to_string(),
        }),
        None => Err(EvalError::NumberRequired {
            function: function.to_string(),
        }),
    }
}

/// Extracts the type name from an `ofType`/`is`-style argument, which the
/// parser produces as a bare or dotted symbol.
fn type_name_arg(arg: &Atom) -> Result<String, EvalError> {
    arg.as_simple_path()
        .map(|path| path.join("."))
        .ok_or_else(|| EvalError::invalid("Expected a type name"))
}

/// Runs `criteria` once per input element with `$this`/`$index` bound,
/// returning each element's raw result.
fn eval_per_element<'i>(
    ctx: &EvalContext<'_>,
    input: &'i [TypedValue],
    criteria: &Atom,
) -> Result<Vec<(&'i TypedValue, Vec<TypedValue>)>, EvalError> {
    let mut results = Vec::with_capacity(input.len());
    for (index, element) in input.iter().enumerate() {
        let mut variables = HashMap::new();
        variables.insert("$this".to_string(), element.clone());
        variables.insert("$index".to_string(), TypedValue::integer(index as i64));
        let child = ctx.child(variables);
        let result = criteria.eval(&child, std::slice::from_ref(element))?;
        results.push((element, result));
    }
    Ok(results)
}
