//! Chained and reverse-chained search parameter resolution.
//!
//! A chained key like `subject:Patient.name` or `general-practitioner.name`
//! hops through reference-typed search parameters one link at a time; a
//! reverse chain `_has:Observation:subject:code` walks the reference
//! backwards. Each hop is resolved against the registry so that ambiguous
//! or invalid chains fail with a descriptive error at parse time.

use meridian_fhirpath::schema::{SchemaRegistry, SearchParamKind};

use crate::error::{SearchError, SearchResult};

/// One resolved hop of a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainLink {
    /// The resource type this link's parameter is declared on.
    pub resource_type: String,
    /// The reference search parameter crossed by this link.
    pub code: String,
    /// True for `_has` links, which traverse the reference backwards.
    pub reverse: bool,
}

/// A fully resolved chained parameter: the hops plus the terminal
/// parameter evaluated on the final target type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChainedParameter {
    pub links: Vec<ChainLink>,
    pub target_type: String,
    pub target_code: String,
}

/// Resolves and validates a chained key (`a.b`, `a:Type.b`, or
/// `_has:Type:ref:param`), without a value.
pub fn parse_chained_parameter(
    registry: &SchemaRegistry,
    resource_type: &str,
    key: &str,
) -> SearchResult<ChainedParameter> {
    let mut links = Vec::new();
    let mut current_type = resource_type.to_string();
    let mut rest = key;

    loop {
        if let Some(has_rest) = rest.strip_prefix("_has:") {
            let (link, next_type, remainder) =
                resolve_reverse_link(registry, &current_type, key, has_rest)?;
            links.push(link);
            current_type = next_type;
            rest = remainder;
            continue;
        }

        match rest.split_once('.') {
            Some((segment, remainder)) => {
                let (link, next_type) =
                    resolve_forward_link(registry, &current_type, segment)?;
                links.push(link);
                current_type = next_type;
                rest = remainder;
            }
            None => {
                // Terminal segment: a plain search parameter on the final
                // target type.
                let code = rest;
                if registry.get_search_param(&current_type, code).is_none() {
                    return Err(SearchError::UnknownSearchParameter {
                        resource_type: current_type,
                        code: code.to_string(),
                    });
                }
                return Ok(ChainedParameter {
                    links,
                    target_type: current_type,
                    target_code: code.to_string(),
                });
            }
        }
    }
}

/// Validation-only entry point used by the query-string parser.
pub fn validate_chained_parameter(
    registry: &SchemaRegistry,
    resource_type: &str,
    key: &str,
) -> SearchResult<()> {
    parse_chained_parameter(registry, resource_type, key).map(|_| ())
}

/// Forward hop: `code` or `code:TargetType`. The next type comes from the
/// explicit disambiguator, or from the parameter's single declared target.
fn resolve_forward_link(
    registry: &SchemaRegistry,
    current_type: &str,
    segment: &str,
) -> SearchResult<(ChainLink, String)> {
    let (code, explicit_target) = match segment.split_once(':') {
        Some((code, target)) => (code, Some(target)),
        None => (segment, None),
    };

    let param = registry
        .get_search_param(current_type, code)
        .ok_or_else(|| SearchError::UnknownSearchParameter {
            resource_type: current_type.to_string(),
            code: code.to_string(),
        })?;
    if param.kind != SearchParamKind::Reference {
        return Err(SearchError::InvalidChain {
            key: segment.to_string(),
        });
    }

    let next_type = match explicit_target {
        Some(target) => {
            if !param.target.is_empty() && !param.target.iter().any(|t| t == target) {
                return Err(SearchError::InvalidChain {
                    key: segment.to_string(),
                });
            }
            target.to_string()
        }
        None => {
            if param.target.len() != 1 {
                return Err(SearchError::AmbiguousChainTarget {
                    code: code.to_string(),
                });
            }
            param.target[0].clone()
        }
    };

    Ok((
        ChainLink {
            resource_type: current_type.to_string(),
            code: code.to_string(),
            reverse: false,
        },
        next_type,
    ))
}

/// Reverse hop: `_has:Type:refCode:<rest>`. The referenced parameter must
/// exist on `Type` and actually point back at the current type.
fn resolve_reverse_link<'a>(
    registry: &SchemaRegistry,
    current_type: &str,
    full_key: &str,
    has_rest: &'a str,
) -> SearchResult<(ChainLink, String, &'a str)> {
    let mut parts = has_rest.splitn(3, ':');
    let (Some(source_type), Some(ref_code), Some(remainder)) =
        (parts.next(), parts.next(), parts.next())
    else {
        return Err(SearchError::InvalidChain {
            key: full_key.to_string(),
        });
    };

    let param = registry
        .get_search_param(source_type, ref_code)
        .ok_or_else(|| SearchError::UnknownSearchParameter {
            resource_type: source_type.to_string(),
            code: ref_code.to_string(),
        })?;
    if param.kind != SearchParamKind::Reference
        || (!param.target.is_empty() && !param.target.iter().any(|t| t == current_type))
    {
        return Err(SearchError::InvalidReverseChain {
            resource_type: current_type.to_string(),
            code: ref_code.to_string(),
        });
    }

    Ok((
        ChainLink {
            resource_type: source_type.to_string(),
            code: ref_code.to_string(),
            reverse: true,
        },
        source_type.to_string(),
        remainder,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use meridian_fhirpath::schema::SearchParamDef;

    fn reference_param(code: &str, expression: &str, targets: &[&str]) -> SearchParamDef {
        SearchParamDef {
            code: code.to_string(),
            kind: SearchParamKind::Reference,
            expression: expression.to_string(),
            target: targets.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn string_param(code: &str, expression: &str) -> SearchParamDef {
        SearchParamDef {
            code: code.to_string(),
            kind: SearchParamKind::String,
            expression: expression.to_string(),
            target: Vec::new(),
        }
    }

    fn registry() -> SchemaRegistry {
        let mut registry = SchemaRegistry::new();
        registry.index_search_param(
            "Observation",
            reference_param("subject", "Observation.subject", &["Patient", "Group"]),
        );
        registry.index_search_param(
            "Observation",
            reference_param("patient", "Observation.subject", &["Patient"]),
        );
        registry.index_search_param("Observation", string_param("code", "Observation.code"));
        registry.index_search_param("Patient", string_param("name", "Patient.name"));
        registry.index_search_param(
            "Patient",
            reference_param(
                "organization",
                "Patient.managingOrganization",
                &["Organization"],
            ),
        );
        registry.index_search_param("Organization", string_param("name", "Organization.name"));
        registry
    }

    #[test]
    fn single_target_forward_chain() {
        let chain = parse_chained_parameter(&registry(), "Observation", "patient.name").unwrap();
        assert_eq!(chain.links.len(), 1);
        assert_eq!(chain.links[0].code, "patient");
        assert_eq!(chain.target_type, "Patient");
        assert_eq!(chain.target_code, "name");
    }

    #[test]
    fn multi_hop_chain() {
        let chain =
            parse_chained_parameter(&registry(), "Observation", "patient.organization.name")
                .unwrap();
        assert_eq!(chain.links.len(), 2);
        assert_eq!(chain.target_type, "Organization");
    }

    #[test]
    fn ambiguous_target_requires_disambiguator() {
        let err =
            parse_chained_parameter(&registry(), "Observation", "subject.name").unwrap_err();
        assert_eq!(
            err,
            SearchError::AmbiguousChainTarget {
                code: "subject".to_string()
            }
        );

        let chain =
            parse_chained_parameter(&registry(), "Observation", "subject:Patient.name").unwrap();
        assert_eq!(chain.target_type, "Patient");
    }

    #[test]
    fn unknown_parameter_in_chain() {
        assert!(matches!(
            parse_chained_parameter(&registry(), "Observation", "patient.nope"),
            Err(SearchError::UnknownSearchParameter { .. })
        ));
    }

    #[test]
    fn reverse_chain_resolves_through_has() {
        let chain =
            parse_chained_parameter(&registry(), "Patient", "_has:Observation:patient:code")
                .unwrap();
        assert_eq!(chain.links.len(), 1);
        assert!(chain.links[0].reverse);
        assert_eq!(chain.target_type, "Observation");
        assert_eq!(chain.target_code, "code");
    }

    #[test]
    fn reverse_chain_must_reference_the_base_type() {
        // Observation.patient targets Patient, not Organization.
        let err = parse_chained_parameter(
            &registry(),
            "Organization",
            "_has:Observation:patient:code",
        )
        .unwrap_err();
        assert_eq!(
            err,
            SearchError::InvalidReverseChain {
                resource_type: "Organization".to_string(),
                code: "patient".to_string()
            }
        );
    }
}
