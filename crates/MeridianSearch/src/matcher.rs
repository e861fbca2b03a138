//! In-memory search matching: does one document satisfy a search request?
//!
//! Filters are dispatched by the registry-classified parameter type. The
//! matcher never throws: malformed values, unknown parameters, and
//! unsupported operators log a debug line and count as "no match", keeping
//! batch callers isolated from individual bad filters.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value as Json;
use tracing::debug;

use meridian_fhirpath::datetime::normalize_date_time;
use meridian_fhirpath::eval_fhirpath;
use meridian_fhirpath::schema::SchemaRegistry;
use meridian_fhirpath::value::{TypedValue, Value};

use crate::details::{SearchParamType, get_search_param_details};
use crate::filter::{ConnectiveKeyword, FilterExpression};
use crate::request::{Filter, Operator, SearchRequest, split_search_on_comma};

/// True when the document satisfies every filter of the request.
pub fn matches_search_request(
    resource: &Json,
    request: &SearchRequest,
    registry: &SchemaRegistry,
) -> bool {
    let resource_type = resource
        .get("resourceType")
        .and_then(Json::as_str)
        .unwrap_or_default();
    if resource_type != request.resource_type {
        return false;
    }
    for filter in &request.filters {
        if !matches_filter(resource, &request.resource_type, filter, registry) {
            return false;
        }
    }
    if let Some(expression) = &request.filter {
        if !matches_filter_expression(resource, &request.resource_type, expression, registry) {
            return false;
        }
    }
    true
}

fn matches_filter_expression(
    resource: &Json,
    resource_type: &str,
    expression: &FilterExpression,
    registry: &SchemaRegistry,
) -> bool {
    match expression {
        FilterExpression::Comparison {
            code,
            operator,
            value,
        } => {
            let filter = Filter::new(code.clone(), *operator, value.clone());
            matches_filter(resource, resource_type, &filter, registry)
        }
        FilterExpression::Negation(inner) => {
            !matches_filter_expression(resource, resource_type, inner, registry)
        }
        FilterExpression::Connective {
            keyword,
            left,
            right,
        } => {
            let l = matches_filter_expression(resource, resource_type, left, registry);
            match keyword {
                ConnectiveKeyword::And => {
                    l && matches_filter_expression(resource, resource_type, right, registry)
                }
                ConnectiveKeyword::Or => {
                    l || matches_filter_expression(resource, resource_type, right, registry)
                }
            }
        }
    }
}

fn matches_filter(
    resource: &Json,
    resource_type: &str,
    filter: &Filter,
    registry: &SchemaRegistry,
) -> bool {
    if filter.code.starts_with("_has") || filter.code.contains('.') {
        debug!(target: "search", code = %filter.code, "chained filters are not matchable in memory");
        return false;
    }

    let Some(param) = registry.get_search_param(resource_type, &filter.code) else {
        debug!(target: "search", code = %filter.code, "unknown search parameter");
        return false;
    };

    let values = match eval_fhirpath(&param.expression, resource) {
        Ok(values) => values,
        Err(error) => {
            debug!(target: "search", code = %filter.code, %error, "expression failed");
            return false;
        }
    };

    // Presence operators apply before type dispatch.
    match filter.operator {
        Operator::Missing => return values.is_empty() == (filter.value == "true"),
        Operator::Present => return values.is_empty() != (filter.value == "true"),
        _ => {}
    }

    let param_type = match get_search_param_details(registry, resource_type, param) {
        Ok(details) => details.param_type,
        Err(_) => SearchParamType::Text,
    };

    match param_type {
        SearchParamType::Reference | SearchParamType::Canonical => {
            matches_reference_filter(&values, filter)
        }
        SearchParamType::Boolean => matches_boolean_filter(&values, filter),
        SearchParamType::Date | SearchParamType::DateTime => matches_date_filter(&values, filter),
        SearchParamType::Number | SearchParamType::Quantity => {
            matches_number_filter(&values, filter)
        }
        SearchParamType::Text => matches_string_filter(&values, filter),
    }
}

/// Reference strings from evaluated values: inline `reference` fields or
/// bare canonical strings.
fn reference_strings(values: &[TypedValue]) -> Vec<String> {
    values
        .iter()
        .filter_map(|v| match &v.value {
            Value::Str(s) => Some(s.clone()),
            Value::Json(json) => json
                .get("reference")
                .and_then(Json::as_str)
                .map(str::to_string),
            _ => None,
        })
        .collect()
}

pub(crate) fn matches_reference_filter(values: &[TypedValue], filter: &Filter) -> bool {
    let references = reference_strings(values);
    let mut found = false;
    for filter_value in split_search_on_comma(&filter.value) {
        if filter_value.is_empty() {
            // An empty filter value matches an empty evaluation result.
            found |= references.is_empty();
            continue;
        }
        for reference in &references {
            if *reference == filter_value {
                found = true;
            } else if !filter_value.contains('/') {
                // Deprecated prefix-less compartment match: "123" matches
                // ".../123". Preserved for backward compatibility.
                if reference.ends_with(&format!("/{}", filter_value)) {
                    found = true;
                }
            }
        }
    }
    if filter.operator.is_negated() { !found } else { found }
}

fn matches_boolean_filter(values: &[TypedValue], filter: &Filter) -> bool {
    let expected = filter.value == "true";
    let found = values.iter().any(|v| v.value.as_bool() == Some(expected));
    if filter.operator.is_negated() { !found } else { found }
}

/// Dates compare lexicographically on their normalized strings; ISO-8601
/// sorts correctly as text, so this is sufficient and intentional.
fn matches_date_filter(values: &[TypedValue], filter: &Filter) -> bool {
    let resource_values: Vec<String> = values
        .iter()
        .filter_map(|v| v.value.as_str().map(normalize_date_time))
        .collect();
    let mut found = false;
    for filter_value in split_search_on_comma(&filter.value) {
        let filter_value = normalize_date_time(&filter_value);
        for value in &resource_values {
            let matched = match filter.operator {
                Operator::Equals | Operator::NotEquals | Operator::Approximately => {
                    *value == filter_value || value.starts_with(&filter_value)
                }
                Operator::GreaterThan | Operator::StartsAfter => *value > filter_value,
                Operator::LessThan | Operator::EndsBefore => *value < filter_value,
                Operator::GreaterThanOrEquals => *value >= filter_value,
                Operator::LessThanOrEquals => *value <= filter_value,
                _ => {
                    debug!(target: "search", operator = ?filter.operator, "unsupported date operator");
                    false
                }
            };
            found |= matched;
        }
    }
    if filter.operator.is_negated() { !found } else { found }
}

fn matches_number_filter(values: &[TypedValue], filter: &Filter) -> bool {
    let resource_numbers: Vec<Decimal> = values
        .iter()
        .filter_map(|v| match &v.value {
            Value::Json(json) => json
                .get("value")
                .and_then(Json::as_f64)
                .and_then(Decimal::from_f64),
            other => other.as_decimal(),
        })
        .collect();
    let mut found = false;
    for filter_value in split_search_on_comma(&filter.value) {
        let Ok(target) = filter_value.parse::<Decimal>() else {
            continue;
        };
        for number in &resource_numbers {
            let matched = match filter.operator {
                Operator::Equals | Operator::NotEquals => *number == target,
                Operator::GreaterThan => *number > target,
                Operator::LessThan => *number < target,
                Operator::GreaterThanOrEquals => *number >= target,
                Operator::LessThanOrEquals => *number <= target,
                Operator::StartsAfter => *number > target,
                Operator::EndsBefore => *number < target,
                Operator::Approximately => {
                    let tolerance = target.abs() * Decimal::new(1, 1);
                    (*number - target).abs() <= tolerance
                }
                _ => {
                    debug!(target: "search", operator = ?filter.operator, "unsupported number operator");
                    false
                }
            };
            found |= matched;
        }
    }
    if filter.operator.is_negated() { !found } else { found }
}

/// Token/string matching: case-insensitive substring containment, with
/// `system|code` values split and both halves matched independently.
fn matches_string_filter(values: &[TypedValue], filter: &Filter) -> bool {
    let mut found = false;
    for filter_value in split_search_on_comma(&filter.value) {
        let (system, code) = match filter_value.split_once('|') {
            Some((system, code)) => (Some(system.to_string()), code.to_string()),
            None => (None, filter_value),
        };
        for value in values {
            if token_matches(value, system.as_deref(), &code, filter.operator) {
                found = true;
            }
        }
    }
    if filter.operator.is_negated() { !found } else { found }
}

fn token_matches(value: &TypedValue, system: Option<&str>, code: &str, operator: Operator) -> bool {
    if let Some(system) = system {
        if !system.is_empty() && value_system(value).as_deref() != Some(system) {
            return false;
        }
    }
    if code.is_empty() {
        // System-only query (`system|`).
        return system.is_some();
    }
    let candidates = candidate_strings(value);
    match operator {
        Operator::Exact => candidates.iter().any(|c| c == code),
        _ => {
            let needle = code.to_lowercase();
            candidates
                .iter()
                .any(|c| c.to_lowercase().contains(&needle))
        }
    }
}

fn value_system(value: &TypedValue) -> Option<String> {
    match &value.value {
        Value::Json(json) => json
            .get("system")
            .and_then(Json::as_str)
            .map(str::to_string),
        _ => None,
    }
}

/// Searchable text of one evaluated element: plain scalars stringify;
/// complex values contribute every string leaf (family names, coding
/// codes, display text, ...).
fn candidate_strings(value: &TypedValue) -> Vec<String> {
    match &value.value {
        Value::Str(s) => vec![s.clone()],
        Value::Bool(b) => vec![b.to_string()],
        Value::Int(i) => vec![i.to_string()],
        Value::Dec(d) => vec![d.normalize().to_string()],
        Value::Json(json) => {
            let mut candidates = Vec::new();
            collect_candidates(json, &mut candidates);
            candidates
        }
    }
}

fn collect_candidates(json: &Json, candidates: &mut Vec<String>) {
    match json {
        Json::String(s) => candidates.push(s.clone()),
        Json::Bool(b) => candidates.push(b.to_string()),
        Json::Number(n) => candidates.push(n.to_string()),
        Json::Array(items) => {
            for item in items {
                collect_candidates(item, candidates);
            }
        }
        Json::Object(map) => {
            for value in map.values() {
                collect_candidates(value, candidates);
            }
        }
        Json::Null => {}
    }
}
