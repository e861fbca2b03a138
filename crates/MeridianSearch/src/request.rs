//! The search request model: parsing REST-style query strings into
//! structured filters, and formatting them back into canonical form.

use serde::{Deserialize, Serialize};

use meridian_fhirpath::datetime::is_date_time_string;
use meridian_fhirpath::schema::{SchemaRegistry, SearchParamDef, SearchParamKind};

use crate::chain::validate_chained_parameter;
use crate::error::{SearchError, SearchResult};
use crate::filter::{FilterExpression, parse_filter_parameter};

/// Search operators: the union of FHIR search "modifiers" and value
/// "prefixes", plus the `_filter` grammar's extras.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Operator {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEquals,
    LessThanOrEquals,
    StartsAfter,
    EndsBefore,
    Approximately,
    Contains,
    StartsWith,
    EndsWith,
    Exact,
    Text,
    Not,
    Above,
    Below,
    In,
    NotIn,
    OfType,
    Missing,
    Present,
    Identifier,
    Iterate,
    /// `_filter` period/subsumption operators; parsed but not matchable.
    Overlaps,
    Subsumes,
    SubsumedBy,
}

impl Operator {
    /// True for operators whose match decision is reported in the negated
    /// sense.
    pub fn is_negated(&self) -> bool {
        matches!(self, Operator::NotEquals | Operator::Not | Operator::NotIn)
    }
}

/// Parameter-name modifiers (`name:exact=`).
const MODIFIER_OPERATORS: &[(&str, Operator)] = &[
    ("contains", Operator::Contains),
    ("exact", Operator::Exact),
    ("above", Operator::Above),
    ("below", Operator::Below),
    ("text", Operator::Text),
    ("not", Operator::Not),
    ("in", Operator::In),
    ("not-in", Operator::NotIn),
    ("of-type", Operator::OfType),
    ("missing", Operator::Missing),
    ("identifier", Operator::Identifier),
    ("iterate", Operator::Iterate),
];

/// Two-character value prefixes for ordered types (`birthdate=ge2020`).
const PREFIX_OPERATORS: &[(&str, Operator)] = &[
    ("eq", Operator::Equals),
    ("ne", Operator::NotEquals),
    ("lt", Operator::LessThan),
    ("le", Operator::LessThanOrEquals),
    ("gt", Operator::GreaterThan),
    ("ge", Operator::GreaterThanOrEquals),
    ("sa", Operator::StartsAfter),
    ("eb", Operator::EndsBefore),
    ("ap", Operator::Approximately),
];

fn modifier_operator(modifier: &str) -> Option<Operator> {
    MODIFIER_OPERATORS
        .iter()
        .find(|(name, _)| *name == modifier)
        .map(|(_, op)| *op)
}

fn modifier_name(operator: Operator) -> Option<&'static str> {
    MODIFIER_OPERATORS
        .iter()
        .find(|(_, op)| *op == operator)
        .map(|(name, _)| *name)
}

fn prefix_operator(prefix: &str) -> Option<Operator> {
    PREFIX_OPERATORS
        .iter()
        .find(|(name, _)| *name == prefix)
        .map(|(_, op)| *op)
}

fn prefix_name(operator: Operator) -> Option<&'static str> {
    PREFIX_OPERATORS
        .iter()
        .find(|(_, op)| *op == operator)
        .map(|(name, _)| *name)
}

/// One structured filter. Quantity values carry their unit parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Filter {
    pub code: String,
    pub operator: Operator,
    pub value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_code: Option<String>,
}

impl Filter {
    pub fn new(code: impl Into<String>, operator: Operator, value: impl Into<String>) -> Filter {
        Filter {
            code: code.into(),
            operator,
            value: value.into(),
            unit_system: None,
            unit_code: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortRule {
    pub code: String,
    #[serde(default)]
    pub descending: bool,
}

/// `_include` / `_revinclude` target (`Type:param[:target]`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeTarget {
    pub resource_type: String,
    pub search_param: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_type: Option<String>,
    #[serde(default)]
    pub iterate: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TotalMode {
    None,
    Estimate,
    Accurate,
}

impl TotalMode {
    fn parse(value: &str) -> Option<TotalMode> {
        match value {
            "none" => Some(TotalMode::None),
            "estimate" => Some(TotalMode::Estimate),
            "accurate" => Some(TotalMode::Accurate),
            _ => None,
        }
    }

    fn as_str(&self) -> &'static str {
        match self {
            TotalMode::None => "none",
            TotalMode::Estimate => "estimate",
            TotalMode::Accurate => "accurate",
        }
    }
}

/// A parsed search request. Built once per query string; immutable
/// afterwards from the engine's point of view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub resource_type: String,
    #[serde(default)]
    pub filters: Vec<Filter>,
    #[serde(default)]
    pub sort_rules: Vec<SortRule>,
    #[serde(default)]
    pub fields: Vec<String>,
    #[serde(default)]
    pub include: Vec<IncludeTarget>,
    #[serde(default)]
    pub rev_include: Vec<IncludeTarget>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total: Option<TotalMode>,
    /// Parsed `_filter` expression tree, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<FilterExpression>,
}

impl SearchRequest {
    pub fn new(resource_type: impl Into<String>) -> SearchRequest {
        SearchRequest {
            resource_type: resource_type.into(),
            ..SearchRequest::default()
        }
    }
}

/// Parses a search URL or `Type?query` string.
pub fn parse_search_url(url: &str, registry: &SchemaRegistry) -> SearchResult<SearchRequest> {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, query),
        None => (url, ""),
    };
    // The resource type is the last non-empty path segment.
    let resource_type = path
        .rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(path);
    let pairs: Vec<(String, String)> = url::form_urlencoded::parse(query.as_bytes())
        .into_owned()
        .collect();
    parse_search_request(
        resource_type,
        registry,
        pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())),
    )
}

/// Parses key/value query pairs into a structured request.
pub fn parse_search_request<'a>(
    resource_type: &str,
    registry: &SchemaRegistry,
    query: impl IntoIterator<Item = (&'a str, &'a str)>,
) -> SearchResult<SearchRequest> {
    let mut request = SearchRequest::new(resource_type);
    for (key, value) in query {
        parse_key_value(&mut request, registry, key, value)?;
    }
    Ok(request)
}

fn parse_key_value(
    request: &mut SearchRequest,
    registry: &SchemaRegistry,
    key: &str,
    value: &str,
) -> SearchResult<()> {
    let (code, modifier) = match key.split_once(':') {
        Some((code, modifier)) => (code, modifier),
        None => (key, ""),
    };

    // Chained and reverse-chained parameters are validated through the
    // registry, then carried as a single filter keyed by the full chain.
    if code == "_has" || key.contains('.') {
        validate_chained_parameter(registry, &request.resource_type, key)?;
        request
            .filters
            .push(Filter::new(key, Operator::Equals, value));
        return Ok(());
    }

    match code {
        "_sort" => {
            for field in value.split(',') {
                let (code, descending) = match field.strip_prefix('-') {
                    Some(rest) => (rest, true),
                    None => (field, false),
                };
                request.sort_rules.push(SortRule {
                    code: code.to_string(),
                    descending,
                });
            }
        }
        "_count" => request.count = Some(parse_number(key, value)?),
        "_offset" => request.offset = Some(parse_number(key, value)?),
        "_total" => request.total = TotalMode::parse(value),
        "_summary" => {
            // `_summary=true` is shorthand for an estimated total with no
            // returned results.
            if value == "true" {
                request.total = Some(TotalMode::Estimate);
                request.count = Some(0);
            }
        }
        "_fields" | "_elements" => {
            request.fields = value.split(',').map(str::to_string).collect();
        }
        "_include" => {
            let mut target = parse_include_target(value)?;
            target.iterate = modifier == "iterate";
            request.include.push(target);
        }
        "_revinclude" => {
            let mut target = parse_include_target(value)?;
            target.iterate = modifier == "iterate";
            request.rev_include.push(target);
        }
        "_filter" => request.filter = Some(parse_filter_parameter(value)?),
        _ => {
            let filter = match registry.get_search_param(&request.resource_type, code) {
                Some(param) => parse_parameter(param, modifier, value)?,
                None => parse_unknown_parameter(code, modifier, value),
            };
            request.filters.push(filter);
        }
    }
    Ok(())
}

fn parse_number(key: &str, value: &str) -> SearchResult<u32> {
    value.parse().map_err(|_| SearchError::InvalidNumber {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// Parses one filter for a known search parameter.
pub fn parse_parameter(
    param: &SearchParamDef,
    modifier: &str,
    value: &str,
) -> SearchResult<Filter> {
    // Presence modifiers apply to every parameter type.
    if modifier == "missing" {
        return Ok(Filter::new(&param.code, Operator::Missing, value));
    }
    if modifier == "present" {
        return Ok(Filter::new(&param.code, Operator::Present, value));
    }

    match param.kind {
        // Ordered types take a value prefix.
        SearchParamKind::Number | SearchParamKind::Date => {
            let (operator, value) = split_prefix(value);
            if param.kind == SearchParamKind::Date && !is_date_time_string(value) {
                return Err(SearchError::InvalidSearchValue {
                    param_type: "date".to_string(),
                    value: value.to_string(),
                });
            }
            Ok(Filter::new(&param.code, operator, value))
        }
        SearchParamKind::Quantity => {
            let (operator, value) = split_prefix(value);
            // Quantity values split into value|system|code.
            let mut parts = value.splitn(3, '|');
            let number = parts.next().unwrap_or_default();
            let mut filter = Filter::new(&param.code, operator, number);
            filter.unit_system = parts.next().map(str::to_string).filter(|s| !s.is_empty());
            filter.unit_code = parts.next().map(str::to_string).filter(|s| !s.is_empty());
            Ok(filter)
        }
        _ => {
            let operator = if modifier.is_empty() {
                Operator::Equals
            } else {
                modifier_operator(modifier).unwrap_or(Operator::Equals)
            };
            Ok(Filter::new(&param.code, operator, value))
        }
    }
}

/// Best-effort parsing for an unindexed code: the filter is still produced
/// so unknown/custom fields remain usable.
fn parse_unknown_parameter(code: &str, modifier: &str, value: &str) -> Filter {
    if !modifier.is_empty() {
        let operator = modifier_operator(modifier).unwrap_or(Operator::Equals);
        return Filter::new(code, operator, value);
    }
    let (operator, value) = split_prefix(value);
    Filter::new(code, operator, value)
}

/// Splits a leading ordered-type prefix from a value. A prefix counts only
/// when it is immediately followed by a digit, so plain text values like
/// `new` or `lebron` are not mis-parsed.
fn split_prefix(value: &str) -> (Operator, &str) {
    if value.len() >= 2 {
        let (prefix, rest) = value.split_at(2);
        if let Some(operator) = prefix_operator(prefix) {
            if rest.chars().next().is_none_or(|c| c.is_ascii_digit()) {
                return (operator, rest);
            }
        }
    }
    (Operator::Equals, value)
}

fn parse_include_target(value: &str) -> SearchResult<IncludeTarget> {
    let parts: Vec<&str> = value.split(':').collect();
    if parts.contains(&"*") || parts.len() < 2 || parts.len() > 3 {
        return Err(SearchError::InvalidIncludeTarget {
            value: value.to_string(),
        });
    }
    Ok(IncludeTarget {
        resource_type: parts[0].to_string(),
        search_param: parts[1].to_string(),
        target_type: parts.get(2).map(|s| s.to_string()),
        iterate: false,
    })
}

/// Formats a request back into a canonical (alphabetically sorted) query
/// string. The resource type is not included. The exact inverse of parsing
/// for the structural fields: `format(parse(q))` re-parses to an equal
/// filter set.
pub fn format_search_query(request: &SearchRequest) -> String {
    let mut params: Vec<String> = Vec::new();

    if !request.fields.is_empty() {
        params.push(format!("_fields={}", request.fields.join(",")));
    }
    for filter in &request.filters {
        params.push(format_filter(filter));
    }
    if !request.sort_rules.is_empty() {
        let keys: Vec<String> = request
            .sort_rules
            .iter()
            .map(|rule| {
                if rule.descending {
                    format!("-{}", rule.code)
                } else {
                    rule.code.clone()
                }
            })
            .collect();
        params.push(format!("_sort={}", keys.join(",")));
    }
    if let Some(offset) = request.offset {
        if offset != 0 {
            params.push(format!("_offset={}", offset));
        }
    }
    if let Some(count) = request.count {
        params.push(format!("_count={}", count));
    }
    if let Some(total) = request.total {
        params.push(format!("_total={}", total.as_str()));
    }
    if let Some(filter) = &request.filter {
        params.push(format!("_filter={}", encode(&filter.to_string())));
    }
    for target in &request.include {
        params.push(format_include_target("_include", target));
    }
    for target in &request.rev_include {
        params.push(format_include_target("_revinclude", target));
    }

    if params.is_empty() {
        return String::new();
    }
    params.sort();
    format!("?{}", params.join("&"))
}

fn format_filter(filter: &Filter) -> String {
    let modifier = match modifier_name(filter.operator) {
        Some(name) => format!(":{}", name),
        None => String::new(),
    };
    let prefix = if filter.operator != Operator::Equals {
        prefix_name(filter.operator).unwrap_or("")
    } else {
        ""
    };
    let mut value = filter.value.clone();
    if filter.unit_system.is_some() || filter.unit_code.is_some() {
        value = format!(
            "{}|{}|{}",
            value,
            filter.unit_system.as_deref().unwrap_or(""),
            filter.unit_code.as_deref().unwrap_or("")
        );
    }
    format!("{}{}={}{}", filter.code, modifier, prefix, encode(&value))
}

fn format_include_target(kind: &str, target: &IncludeTarget) -> String {
    let mut result = kind.to_string();
    if target.iterate {
        result.push_str(":iterate");
    }
    result.push('=');
    result.push_str(&target.resource_type);
    result.push(':');
    result.push_str(&target.search_param);
    if let Some(target_type) = &target.target_type {
        result.push(':');
        result.push_str(target_type);
    }
    result
}

fn encode(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Splits a search value on commas, honoring backslash escapes.
pub fn split_search_on_comma(input: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in input.chars() {
        if escaped {
            current.push(c);
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == ',' {
            result.push(std::mem::take(&mut current));
        } else {
            current.push(c);
        }
    }
    result.push(current);
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_prefix_requires_a_digit() {
        assert_eq!(split_prefix("ge2020"), (Operator::GreaterThanOrEquals, "2020"));
        assert_eq!(split_prefix("ne123"), (Operator::NotEquals, "123"));
        // "new" starts with a prefix code but is plain text.
        assert_eq!(split_prefix("new"), (Operator::Equals, "new"));
        assert_eq!(split_prefix("lebron"), (Operator::Equals, "lebron"));
        assert_eq!(split_prefix("ne"), (Operator::NotEquals, ""));
    }

    #[test]
    fn split_on_comma_honors_escapes() {
        assert_eq!(split_search_on_comma("a,b"), vec!["a", "b"]);
        assert_eq!(split_search_on_comma(r"a\,b"), vec!["a,b"]);
        assert_eq!(split_search_on_comma(""), vec![""]);
        assert_eq!(split_search_on_comma("a,"), vec!["a", ""]);
    }

    #[test]
    fn include_targets_parse_and_reject_wildcards() {
        let target = parse_include_target("Patient:organization").unwrap();
        assert_eq!(target.resource_type, "Patient");
        assert_eq!(target.search_param, "organization");
        assert!(parse_include_target("*").is_err());
        assert!(parse_include_target("Patient").is_err());
    }
}
