//! Line grammar for registry exports

use nom::bytes::complete::take_until;
use nom::character::complete::char;
use nom::combinator::{rest, verify};
use nom::sequence::separated_pair;
use nom::IResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) enum RegLine<'a> {
    Blank,
    Comment,
    /// `[key\path]`, brackets removed
    Section(&'a str),
    /// `name=value`, name unquoted, both sides trimmed
    Entry { name: &'a str, value: &'a str },
    Other,
}

/// Classify an already-trimmed line
pub(super) fn classify(line: &str) -> RegLine<'_> {
    if line.is_empty() {
        return RegLine::Blank;
    }
    if line.starts_with(';') {
        return RegLine::Comment;
    }

    section(line)
        .or_else(|_| entry(line))
        .map(|(_, parsed)| parsed)
        .unwrap_or(RegLine::Other)
}

fn section(input: &str) -> IResult<&str, RegLine<'_>> {
    let (input, _) = char('[')(input)?;
    let (remaining, body) = verify(rest, |s: &str| s.ends_with(']'))(input)?;
    let key = body.trim_matches(|c| c == '[' || c == ']');
    Ok((remaining, RegLine::Section(key)))
}

fn entry(input: &str) -> IResult<&str, RegLine<'_>> {
    let (remaining, (name, value)) = separated_pair(take_until("="), char('='), rest)(input)?;
    Ok((
        remaining,
        RegLine::Entry {
            name: name.trim().trim_matches('"'),
            value: value.trim(),
        },
    ))
}
