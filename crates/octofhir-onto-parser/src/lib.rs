//! Chained element id parser using Winnow
//!
//! Profile authors address elements that sit behind extensions or references
//! with chained ids such as `((Specimen.extension:diagnosis).value[x]).code`.
//! Parenthesised groups mark where the next profile begins; a `.where(...)`
//! suffix pairs an element with the element selecting it.
//!
//! The parser produces a small syntax tree; [`flatten`] turns it into the
//! ordered id list the element resolver consumes.

mod chain;
mod tokenizer;

pub use chain::{flatten, parse, parse_flat};
pub use tokenizer::{tokenize, Token};

/// Node of a parsed element chain
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyntaxNode {
    /// Plain element id (or id continuation such as `.value[x]`)
    Leaf(String),
    /// Parenthesised compound or where-clause pair
    Group(Vec<SyntaxNode>),
}

impl SyntaxNode {
    pub fn leaf(id: impl Into<String>) -> Self {
        Self::Leaf(id.into())
    }

    /// Number of leaves below this node
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Group(children) => children.iter().map(Self::leaf_count).sum(),
        }
    }
}
