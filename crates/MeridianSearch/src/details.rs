//! Search parameter classification.
//!
//! The runtime category of a search parameter is computed by crawling its
//! declared path expression through the schema registry, accumulating the
//! set of terminal element types, and applying a fixed decision table. The
//! result is a pure function of `(type name, parameter)` — deterministic,
//! so callers may cache it keyed by `(typeName, code)`.

use std::collections::BTreeSet;

use meridian_fhirpath::atom::Atom;
use meridian_fhirpath::parse_expression;
use meridian_fhirpath::schema::{SchemaRegistry, SearchParamDef, SearchParamKind};

use crate::error::{SearchError, SearchResult};

/// Refined runtime category of one search parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchParamType {
    Boolean,
    Number,
    Date,
    DateTime,
    Quantity,
    Reference,
    Canonical,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchParamDetails {
    /// Parameter code with dashes folded into camelCase, usable as a
    /// column/field name.
    pub column_name: String,
    pub param_type: SearchParamType,
    /// True when any field along the crawled path is array-valued.
    pub array: bool,
}

/// Classifies one search parameter for a resource type.
///
/// Fails when the declared expression references an unknown field. When the
/// expression has no branch for this resource type at all (compound or
/// polymorphic parameters), falls back to a generic classification from the
/// declared kind.
pub fn get_search_param_details(
    registry: &SchemaRegistry,
    resource_type: &str,
    param: &SearchParamDef,
) -> SearchResult<SearchParamDetails> {
    let column_name = code_to_column_name(&param.code);
    let atom = parse_expression(&param.expression)?;

    let mut terminals: BTreeSet<String> = BTreeSet::new();
    let mut array = false;
    let mut found_branch = false;

    for branch in atom.union_branches() {
        let Some(steps) = crawl_steps(branch) else {
            continue;
        };
        let Some((head, fields)) = split_head(&steps) else {
            continue;
        };
        if head != resource_type {
            continue;
        }
        found_branch = true;
        crawl_branch(registry, resource_type, fields, &mut terminals, &mut array)?;
    }

    if !found_branch {
        // No declared shape for this type; generic classification.
        return Ok(SearchParamDetails {
            column_name,
            param_type: default_type(param.kind),
            array: true,
        });
    }

    Ok(SearchParamDetails {
        column_name,
        param_type: classify(&terminals, param.kind),
        array,
    })
}

/// One crawl step: a field hop or a terminal type restriction (`as`).
enum Step<'a> {
    Field(&'a str),
    TypeRestriction(&'a str),
}

/// Flattens a branch into crawlable steps, tolerating the navigation
/// functions that commonly appear in declared expressions (`where`,
/// `first`, `resolve`). Returns `None` for shapes the crawler cannot
/// follow.
fn crawl_steps(atom: &Atom) -> Option<Vec<Step<'_>>> {
    match atom {
        Atom::Symbol(name) => Some(vec![Step::Field(name)]),
        Atom::Dot { left, right } => {
            let mut steps = crawl_steps(left)?;
            steps.extend(crawl_steps(right)?);
            Some(steps)
        }
        Atom::As { child, type_name } => {
            let mut steps = crawl_steps(child)?;
            steps.push(Step::TypeRestriction(type_name));
            Some(steps)
        }
        Atom::Function { name, args } => match name.as_str() {
            "as" | "ofType" => {
                // The argument is a bare (possibly qualified) type symbol;
                // the last segment is the type name.
                let path = args.first()?.as_simple_path()?;
                let type_name = *path.last()?;
                Some(vec![Step::TypeRestriction(type_name)])
            }
            "where" | "first" | "last" | "resolve" | "exists" => Some(Vec::new()),
            _ => None,
        },
        _ => None,
    }
}

fn split_head<'a>(steps: &'a [Step<'a>]) -> Option<(&'a str, &'a [Step<'a>])> {
    match steps.first() {
        Some(Step::Field(head)) => Some((head, &steps[1..])),
        _ => None,
    }
}

fn crawl_branch(
    registry: &SchemaRegistry,
    resource_type: &str,
    steps: &[Step<'_>],
    terminals: &mut BTreeSet<String>,
    array: &mut bool,
) -> SearchResult<()> {
    let mut current: BTreeSet<String> = BTreeSet::new();
    current.insert(resource_type.to_string());

    for step in steps {
        match step {
            Step::TypeRestriction(type_name) => {
                current = current
                    .iter()
                    .filter(|t| t.as_str() == *type_name)
                    .cloned()
                    .collect();
                if current.is_empty() {
                    current.insert(type_name.to_string());
                }
            }
            Step::Field(field) => {
                let mut next: BTreeSet<String> = BTreeSet::new();
                let mut found = false;
                for type_name in &current {
                    if let Some(info) = registry.get_field(type_name, field) {
                        found = true;
                        *array |= info.array;
                        next.extend(info.types.iter().cloned());
                    }
                }
                if !found {
                    return Err(SearchError::PropertyNotFound {
                        type_name: current.iter().next().cloned().unwrap_or_default(),
                        property: field.to_string(),
                    });
                }
                current = next;
            }
        }
    }

    terminals.extend(current);
    Ok(())
}

/// The fixed decision table over accumulated terminal element types.
fn classify(terminals: &BTreeSet<String>, declared: SearchParamKind) -> SearchParamType {
    if terminals.is_empty() {
        return default_type(declared);
    }
    if terminals.iter().all(|t| t == "boolean") {
        return SearchParamType::Boolean;
    }
    let date_like = ["date", "dateTime", "instant", "Period"];
    if terminals.iter().all(|t| date_like.contains(&t.as_str())) {
        // DATE only when solely the bare-date type appears.
        if terminals.iter().all(|t| t == "date") {
            return SearchParamType::Date;
        }
        return SearchParamType::DateTime;
    }
    let number_like = ["integer", "positiveInt", "unsignedInt", "decimal"];
    if terminals.iter().all(|t| number_like.contains(&t.as_str())) {
        return SearchParamType::Number;
    }
    let quantity_like = ["Quantity", "Age", "Duration", "Distance", "Count", "Money"];
    if terminals.iter().any(|t| quantity_like.contains(&t.as_str())) {
        return SearchParamType::Quantity;
    }
    // Canonical wins over plain reference when any canonical terminal
    // appears.
    if terminals.iter().any(|t| t == "canonical") {
        return SearchParamType::Canonical;
    }
    if terminals.iter().any(|t| t == "Reference") {
        return SearchParamType::Reference;
    }
    SearchParamType::Text
}

fn default_type(declared: SearchParamKind) -> SearchParamType {
    match declared {
        SearchParamKind::Number => SearchParamType::Number,
        SearchParamKind::Date => SearchParamType::DateTime,
        SearchParamKind::Quantity => SearchParamType::Quantity,
        SearchParamKind::Reference => SearchParamType::Reference,
        _ => SearchParamType::Text,
    }
}

fn code_to_column_name(code: &str) -> String {
    let mut result = String::with_capacity(code.len());
    let mut upper_next = false;
    for c in code.chars() {
        if c == '-' {
            upper_next = true;
        } else if upper_next {
            result.extend(c.to_uppercase());
            upper_next = false;
        } else {
            result.push(c);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_fhirpath::schema::FieldInfo;

    fn field(types: &[&str], array: bool) -> FieldInfo {
        FieldInfo {
            types: types.iter().map(|s| s.to_string()).collect(),
            array,
            targets: Vec::new(),
        }
    }

    fn param(code: &str, kind: SearchParamKind, expression: &str) -> SearchParamDef {
        SearchParamDef {
            code: code.to_string(),
            kind,
            expression: expression.to_string(),
            target: Vec::new(),
        }
    }

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.index_type(
            "Patient",
            vec![
                ("active".to_string(), field(&["boolean"], false)),
                ("birthDate".to_string(), field(&["date"], false)),
                ("name".to_string(), field(&["HumanName"], true)),
                ("link".to_string(), field(&["BackboneElement"], true)),
                ("deceasedDateTime".to_string(), field(&["dateTime"], false)),
            ],
        );
        registry.index_type(
            "BackboneElement",
            vec![("other".to_string(), field(&["Reference"], false))],
        );
        registry.index_type(
            "HumanName",
            vec![("family".to_string(), field(&["string"], false))],
        );
        registry.index_type(
            "ServiceRequest",
            vec![("authoredOn".to_string(), field(&["dateTime"], false))],
        );
        registry.index_type(
            "QuestionnaireResponse",
            vec![("questionnaire".to_string(), field(&["canonical"], false))],
        );
        registry
    }

    #[test]
    fn boolean_parameter() {
        let details = get_search_param_details(
            &registry(),
            "Patient",
            &param("active", SearchParamKind::Token, "Patient.active"),
        )
        .unwrap();
        assert_eq!(details.param_type, SearchParamType::Boolean);
        assert!(!details.array);
    }

    #[test]
    fn bare_date_parameter() {
        let details = get_search_param_details(
            &registry(),
            "Patient",
            &param("birthdate", SearchParamKind::Date, "Patient.birthDate"),
        )
        .unwrap();
        assert_eq!(details.param_type, SearchParamType::Date);
    }

    #[test]
    fn datetime_parameter() {
        let details = get_search_param_details(
            &registry(),
            "ServiceRequest",
            &param("authored", SearchParamKind::Date, "ServiceRequest.authoredOn"),
        )
        .unwrap();
        assert_eq!(details.param_type, SearchParamType::DateTime);
        assert_eq!(details.column_name, "authored");
    }

    #[test]
    fn nested_reference_parameter() {
        let details = get_search_param_details(
            &registry(),
            "Patient",
            &param("link", SearchParamKind::Reference, "Patient.link.other"),
        )
        .unwrap();
        assert_eq!(details.param_type, SearchParamType::Reference);
        assert!(details.array);
    }

    #[test]
    fn canonical_parameter() {
        let details = get_search_param_details(
            &registry(),
            "QuestionnaireResponse",
            &param(
                "questionnaire",
                SearchParamKind::Reference,
                "QuestionnaireResponse.questionnaire",
            ),
        )
        .unwrap();
        assert_eq!(details.param_type, SearchParamType::Canonical);
    }

    #[test]
    fn union_expression_uses_matching_branch_only() {
        let details = get_search_param_details(
            &registry(),
            "Patient",
            &param(
                "phonetic",
                SearchParamKind::String,
                "Patient.name | Person.name",
            ),
        )
        .unwrap();
        assert_eq!(details.param_type, SearchParamType::Text);
        assert!(details.array);
    }

    #[test]
    fn missing_branch_falls_back_to_declared_kind() {
        let details = get_search_param_details(
            &registry(),
            "Patient",
            &param("test", SearchParamKind::String, "OtherType.test"),
        )
        .unwrap();
        assert_eq!(details.column_name, "test");
        assert_eq!(details.param_type, SearchParamType::Text);
    }

    #[test]
    fn unknown_property_is_an_error() {
        let result = get_search_param_details(
            &registry(),
            "Patient",
            &param("unknown", SearchParamKind::String, "Patient.unknown"),
        );
        assert!(matches!(
            result,
            Err(SearchError::PropertyNotFound { .. })
        ));
    }

    #[test]
    fn column_names_fold_dashes() {
        assert_eq!(code_to_column_name("birth-date"), "birthDate");
        assert_eq!(code_to_column_name("phonetic"), "phonetic");
    }
}
