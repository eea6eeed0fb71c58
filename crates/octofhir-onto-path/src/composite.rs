//! Composite attributes
//!
//! A composite attribute id pairs a value element with the coded element that
//! identifies it, e.g.
//! `Observation.component.where(Observation.component:systolic.code.coding:loinc):systolic.value[x]`.
//! It resolves to exactly two elements: the value first, the where-clause
//! element second.

use crate::emitter::{element_expressions, element_type};
use crate::resolver::{ResolvedChain, ResolvedElement};
use crate::rewrite;
use octofhir_onto_diagnostics::{ErrorBuilder, Result, ONTO0204, ONTO0208};
use octofhir_onto_model::{ElementType, TermCode};

fn pair(chain: &ResolvedChain) -> Result<(&ResolvedElement, &ResolvedElement)> {
    match chain.elements() {
        [value, code] => Ok((value, code)),
        elements => Err(ErrorBuilder::new(
            ONTO0204,
            format!("Composite attribute resolves to {} elements, expected 2", elements.len()),
        )
        .element(chain.first().id())
        .profile(chain.first().snapshot().url())
        .module(chain.first().module())
        .mapping()),
    }
}

/// The fixed code selecting the composite component.
///
/// Taken from the where-clause element's pattern or fixed codings, or from
/// the `patternCode`/`patternUri` of its `.code` and `.system` children.
pub fn composite_code(chain: &ResolvedChain) -> Result<TermCode> {
    let (_, code_element) = pair(chain)?;
    if let Some(coding) = code_element.element().pattern_codings.first() {
        return Ok(coding.clone());
    }

    let id = code_element.id();
    let code = code_element
        .sibling(&format!("{id}.code"))
        .and_then(|e| e.element().pattern_code.clone());
    let system = code_element
        .sibling(&format!("{id}.system"))
        .and_then(|e| e.element().pattern_uri.clone());
    match (system, code) {
        (Some(system), Some(code)) => Ok(TermCode::new(system, code, "")),
        _ => Err(ErrorBuilder::new(ONTO0208, "Composite where clause defines no fixed code")
            .element(id)
            .profile(code_element.snapshot().url())
            .module(code_element.module())
            .mapping()),
    }
}

/// Type of the composite's value element
pub fn composite_value_type(chain: &ResolvedChain) -> Result<ElementType> {
    let (value, _) = pair(chain)?;
    element_type(value.element())
}

/// Splice the value expression onto the attribute id with its where clause
/// replaced by a code filter:
/// `component.where(code.coding.exists(system = 'S' and code = 'C')).value.ofType(Quantity)`
pub fn composite_path(attribute_id: &str, chain: &ResolvedChain, code: &TermCode) -> Result<String> {
    let (value, code_element) = pair(chain)?;
    let (compatible_value, _) = value.compatible()?;
    let expressions = element_expressions(&[compatible_value, code_element.clone()], true)?;
    let value_clause = expressions.first().map(String::as_str).unwrap_or_default();

    let filter = format!(
        ".where(code.coding.exists(system = '{}' and code = '{}'))",
        code.system, code.code
    );
    let updated = rewrite::replace_where_clauses(attribute_id, &filter);
    let prefix = match rewrite::extract_where_clause(&updated) {
        Some((_, prefix)) => prefix,
        None => String::new(),
    };

    let common = rewrite::common_prefix_len(&updated, value_clause);
    let uncommon = value_clause.get(common..).unwrap_or_default();
    Ok(if uncommon.is_empty() || uncommon.starts_with('.') {
        format!("{prefix}{uncommon}")
    } else {
        format!("{prefix}.{uncommon}")
    })
}
