//! Line grammar: `[@tags] [:prefix] <command> [params...] [:trailing]`.

use nom::{
    bytes::complete::{take_till1, take_while1},
    character::complete::{char, space0},
    combinator::opt,
    error::ErrorKind,
    sequence::preceded,
    IResult,
};
use smallvec::SmallVec;

use crate::MAX_PARAMS;

fn parse_tags(input: &str) -> IResult<&str, &str> {
    preceded(char('@'), take_till1(|c| c == ' '))(input)
}

fn parse_prefix(input: &str) -> IResult<&str, &str> {
    preceded(char(':'), take_till1(|c| c == ' '))(input)
}

/// Command: one or more letters, or exactly three digits.
fn parse_command(input: &str) -> IResult<&str, &str> {
    let (rest, cmd) = take_while1(|c: char| c.is_ascii_alphanumeric())(input)?;

    let letters = cmd.bytes().all(|b| b.is_ascii_alphabetic());
    let numeric = cmd.len() == 3 && cmd.bytes().all(|b| b.is_ascii_digit());
    let terminated = rest.is_empty() || rest.starts_with([' ', '\r', '\n']);

    if (letters || numeric) && terminated {
        Ok((rest, cmd))
    } else {
        Err(nom::Err::Error(nom::error::Error::new(
            input,
            ErrorKind::AlphaNumeric,
        )))
    }
}

/// Space-separated middle parameters followed by an optional trailing one.
///
/// Runs of spaces count as one separator. Anything beyond the fifteenth
/// parameter is left unconsumed.
fn parse_params(input: &str) -> (&str, SmallVec<[&str; MAX_PARAMS]>) {
    let mut params: SmallVec<[&str; MAX_PARAMS]> = SmallVec::new();
    let mut rest = input;

    while rest.starts_with(' ') {
        if params.len() >= MAX_PARAMS {
            break;
        }

        rest = rest.trim_start_matches(' ');
        if rest.is_empty() || rest.starts_with(['\r', '\n']) {
            break;
        }

        if let Some(after_colon) = rest.strip_prefix(':') {
            let end = after_colon.find(['\r', '\n']).unwrap_or(after_colon.len());
            params.push(&after_colon[..end]);
            rest = &after_colon[end..];
            break;
        }

        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        params.push(&rest[..end]);
        rest = &rest[end..];
    }

    (rest, params)
}

fn parse_message(input: &str) -> IResult<&str, ParsedMessage<'_>> {
    let (input, tags) = opt(parse_tags)(input)?;
    let (input, _) = space0(input)?;
    let (input, prefix) = opt(parse_prefix)(input)?;
    let (input, _) = space0(input)?;
    let (input, command) = parse_command(input)?;
    let (rest, params) = parse_params(input);

    Ok((
        rest,
        ParsedMessage {
            tags,
            prefix,
            command,
            params,
        },
    ))
}

/// A parsed line borrowing from its input.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParsedMessage<'a> {
    pub tags: Option<&'a str>,
    pub prefix: Option<&'a str>,
    pub command: &'a str,
    pub params: SmallVec<[&'a str; MAX_PARAMS]>,
}

/// Where and why the grammar rejected a line.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ParseFailure {
    pub position: usize,
    pub kind: ErrorKind,
}

impl<'a> ParsedMessage<'a> {
    pub fn parse(input: &'a str) -> Result<Self, ParseFailure> {
        match parse_message(input) {
            Ok((_rest, msg)) => Ok(msg),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(ParseFailure {
                position: input.len() - e.input.len(),
                kind: e.code,
            }),
            Err(nom::Err::Incomplete(_)) => Err(ParseFailure {
                position: input.len(),
                kind: ErrorKind::Eof,
            }),
        }
    }
}
