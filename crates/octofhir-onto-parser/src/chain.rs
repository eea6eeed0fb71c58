//! Recursive-descent parser over chain tokens

use crate::tokenizer::{tokenize, Token};
use crate::SyntaxNode;
use octofhir_onto_diagnostics::{OntoError, Result, ONTO0001, ONTO0002, ONTO0003};
use std::collections::VecDeque;

const WHERE_OPEN: &str = ".where(";

/// Parse a chained element id.
///
/// A `.where(<expr>)` suffix is split off before tokenizing: `A.where(P):rest`
/// becomes the pair `[parse("A:rest"), parse(P)]`.
pub fn parse(source: &str) -> Result<SyntaxNode> {
    if let Some(start) = source.find(WHERE_OPEN) {
        return parse_where(source, start);
    }

    let mut tokens: VecDeque<Token<'_>> = tokenize(source)?.into();
    let node = parse_tokens(&mut tokens, source)?;
    match tokens.front() {
        None if node.leaf_count() == 0 => Err(OntoError::chain(ONTO0001, "Element chain has no element ids", source)),
        None => Ok(node),
        Some(Token::Close) => Err(OntoError::chain(ONTO0003, "Unexpected ')'", source)),
        Some(_) => Err(OntoError::chain(ONTO0001, "Trailing tokens after element chain", source)),
    }
}

fn parse_where(source: &str, start: usize) -> Result<SyntaxNode> {
    let main = source[..start].trim();
    let open = start + WHERE_OPEN.len() - 1;
    let close = matching_paren(source, open).ok_or_else(|| {
        OntoError::chain(ONTO0002, "Missing ')' closing the where clause", source)
    })?;
    let condition = source[open + 1..close].trim();
    let rest = source[close + 1..].trim().trim_start_matches(':').trim();

    let selected = if rest.is_empty() {
        main.to_string()
    } else {
        format!("{main}:{rest}")
    };
    Ok(SyntaxNode::Group(vec![parse(&selected)?, parse(condition)?]))
}

fn matching_paren(source: &str, open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, c) in source[open..].char_indices() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn parse_tokens(tokens: &mut VecDeque<Token<'_>>, source: &str) -> Result<SyntaxNode> {
    let token = tokens
        .pop_front()
        .ok_or_else(|| OntoError::chain(ONTO0001, "Empty element chain", source))?;

    match token {
        Token::Where => parse_tokens(tokens, source),
        Token::Open => {
            let mut children = Vec::new();
            loop {
                match tokens.front() {
                    None => return Err(OntoError::chain(ONTO0002, "Missing closing parenthesis", source)),
                    Some(Token::Close) => break,
                    Some(_) => children.push(parse_tokens(tokens, source)?),
                }
            }
            tokens.pop_front();
            if tokens.front().is_some_and(|t| *t != Token::Close) {
                children.push(parse_tokens(tokens, source)?);
            }
            Ok(SyntaxNode::Group(children))
        }
        Token::Close => Err(OntoError::chain(ONTO0003, "Unexpected ')'", source)),
        Token::Segment(segment) => {
            if tokens.front().is_some_and(|t| *t != Token::Close) {
                let next = parse_tokens(tokens, source)?;
                Ok(SyntaxNode::Group(vec![SyntaxNode::leaf(segment), next]))
            } else {
                Ok(SyntaxNode::leaf(segment))
            }
        }
    }
}

/// Pre-order leaves of a syntax tree
pub fn flatten(node: &SyntaxNode) -> Vec<String> {
    let mut out = Vec::with_capacity(node.leaf_count());
    collect_leaves(node, &mut out);
    out
}

fn collect_leaves(node: &SyntaxNode, out: &mut Vec<String>) {
    match node {
        SyntaxNode::Leaf(id) => out.push(id.clone()),
        SyntaxNode::Group(children) => children.iter().for_each(|child| collect_leaves(child, out)),
    }
}

/// Parse and flatten in one step
pub fn parse_flat(source: &str) -> Result<Vec<String>> {
    parse(source).map(|node| flatten(&node))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn test_plain_id_is_leaf() {
        assert_eq!(
            parse("Specimen.collection.bodySite.coding:icd-o-3").unwrap(),
            SyntaxNode::leaf("Specimen.collection.bodySite.coding:icd-o-3")
        );
    }

    #[test]
    fn test_nested_groups() {
        let node = parse("((Specimen.extension:festgestellteDiagnose).value[x]).code.coding:icd10-gm").unwrap();
        assert_eq!(
            node,
            SyntaxNode::Group(vec![
                SyntaxNode::Group(vec![
                    SyntaxNode::leaf("Specimen.extension:festgestellteDiagnose"),
                    SyntaxNode::leaf(".value[x]"),
                ]),
                SyntaxNode::leaf(".code.coding:icd10-gm"),
            ])
        );
        assert_eq!(
            flatten(&node),
            vec![
                "Specimen.extension:festgestellteDiagnose",
                ".value[x]",
                ".code.coding:icd10-gm"
            ]
        );
    }

    #[test]
    fn test_where_clause_becomes_pair() {
        let flat = parse_flat(
            "Observation.component.where(Observation.component:systolic.code.coding:loinc):systolic.value[x]",
        )
        .unwrap();
        assert_eq!(
            flat,
            vec![
                "Observation.component:systolic.value[x]",
                "Observation.component:systolic.code.coding:loinc"
            ]
        );
    }

    #[test]
    fn test_where_clause_without_rest() {
        let flat = parse_flat("Observation.component.where(Observation.component.code)").unwrap();
        assert_eq!(flat, vec!["Observation.component", "Observation.component.code"]);
    }

    #[rstest]
    #[case("", ONTO0001)]
    #[case("   ", ONTO0001)]
    #[case("()", ONTO0001)]
    #[case("(())", ONTO0001)]
    #[case("(Specimen.extension:x", ONTO0002)]
    #[case("Specimen.type)", ONTO0003)]
    #[case(")", ONTO0003)]
    #[case("Observation.component.where(code", ONTO0002)]
    fn test_malformed_chains(#[case] source: &str, #[case] code: octofhir_onto_diagnostics::ErrorCode) {
        let err = parse(source).unwrap_err();
        assert_eq!(err.code(), code, "unexpected error for {source:?}: {err}");
    }
}
