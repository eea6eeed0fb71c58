//! Chain tokenizer
//!
//! `(`, `)` and the literal `.where` are tokens of their own; every other run
//! of non-whitespace characters is a segment.

use octofhir_onto_diagnostics::{OntoError, Result, ONTO0001};
use winnow::ascii::multispace0;
use winnow::combinator::{alt, eof, not, preceded, repeat, terminated};
use winnow::prelude::*;
use winnow::token::none_of;

type Input<'a> = &'a str;

/// Chain token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Token<'a> {
    Open,
    Close,
    Where,
    Segment(&'a str),
}

fn is_delimiter(c: char) -> bool {
    c == '(' || c == ')' || c.is_whitespace()
}

fn segment<'a>(input: &mut Input<'a>) -> ModalResult<&'a str> {
    repeat(1.., (not(".where"), none_of(is_delimiter)))
        .map(|()| ())
        .take()
        .parse_next(input)
}

fn token<'a>(input: &mut Input<'a>) -> ModalResult<Token<'a>> {
    alt((
        "(".value(Token::Open),
        ")".value(Token::Close),
        ".where".value(Token::Where),
        segment.map(Token::Segment),
    ))
    .parse_next(input)
}

fn tokens<'a>(input: &mut Input<'a>) -> ModalResult<Vec<Token<'a>>> {
    let tokens = preceded(multispace0, repeat(0.., terminated(token, multispace0))).parse_next(input)?;
    eof.parse_next(input)?;
    Ok(tokens)
}

/// Split a chained element id into tokens
pub fn tokenize(source: &str) -> Result<Vec<Token<'_>>> {
    let mut input: Input<'_> = source;
    tokens(&mut input)
        .map_err(|e| OntoError::chain(ONTO0001, format!("Tokenize error: {:?}", e), source))
}
