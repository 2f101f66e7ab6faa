//! Backtracking grammar rules over `&str`.
//!
//! A rule is a plain function from the remaining input to either a value and
//! the input left after it, or a [`Failure`]. Because the input is an
//! immutable slice, a failed rule never consumes anything: the caller still
//! holds the slice it passed in and simply tries the next alternative with it.
//!
//! General convention is that the parse state is a string slice named `rest`;
//! [`take_item!`] updates that slice as tokens are consumed.

use crate::Error;

pub type ParseResult<'a, T> = Result<(T, &'a str), Failure>;

/// Runs a rule on `$rest`, advancing `$rest` past what it consumed and
/// yielding the value. Propagates the failure otherwise.
macro_rules! take_item {
    ($e:expr, $rest:ident) => {{
        let (item, r) = $e?;
        $rest = r;
        item
    }};
}

pub(crate) use take_item;

/// A rule failure together with where it happened.
///
/// The position is kept as the length of the input that was still unparsed,
/// which lets alternatives that started from the same input be compared
/// without knowing the original text.
#[derive(Debug)]
pub struct Failure {
    pub error: Error,
    remaining: usize,
}

impl Failure {
    pub fn new(error: Error, at: &str) -> Self {
        Failure {
            error,
            remaining: at.len(),
        }
    }

    /// Byte offset of the failure within `input`, which must be the text the
    /// failing rule (or one of its callers) started from.
    pub fn offset_in(&self, input: &str) -> usize {
        input.len().saturating_sub(self.remaining)
    }

    /// Keep whichever failure got further into the input. Ties keep `self`.
    pub fn furthest(self, other: Failure) -> Failure {
        if other.remaining < self.remaining {
            other
        } else {
            self
        }
    }

    /// Replace a character-level error with `error`, leaving errors that
    /// already say something about the field (bad date, unknown zone, ...)
    /// untouched.
    pub fn context(mut self, error: Error) -> Failure {
        if matches!(
            self.error,
            Error::ExpectedChar(_)
                | Error::ExpectedLiteral(_)
                | Error::UnexpectedEndOfInput
                | Error::TooManyDigits
        ) {
            self.error = error;
        }
        self
    }
}

/// Match exactly one `expected` character.
pub fn char_of(input: &str, expected: char) -> ParseResult<'_, char> {
    match input.chars().next() {
        Some(c) if c == expected => Ok((c, &input[c.len_utf8()..])),
        Some(_) => Err(Failure::new(Error::ExpectedChar(expected), input)),
        None => Err(Failure::new(Error::UnexpectedEndOfInput, input)),
    }
}

/// Match the literal `expected`.
pub fn literal<'a>(input: &'a str, expected: &'static str) -> ParseResult<'a, &'a str> {
    match input.strip_prefix(expected) {
        Some(rest) => Ok((&input[..expected.len()], rest)),
        None if input.len() < expected.len() && expected.starts_with(input) => {
            Err(Failure::new(Error::UnexpectedEndOfInput, input))
        }
        None => Err(Failure::new(Error::ExpectedLiteral(expected), input)),
    }
}

/// Longest prefix whose characters all satisfy `f`. Never fails.
pub fn take_while<F>(input: &str, f: F) -> (&str, &str)
where
    F: Fn(char) -> bool,
{
    let end = input
        .char_indices()
        .find(|(_, c)| !f(*c))
        .map(|(idx, _)| idx)
        .unwrap_or(input.len());
    (&input[..end], &input[end..])
}

/// One or more ASCII digits, as text.
pub fn digits(input: &str) -> ParseResult<'_, &str> {
    match take_while(input, |c| c.is_ascii_digit()) {
        ("", _) if input.is_empty() => Err(Failure::new(Error::UnexpectedEndOfInput, input)),
        ("", _) => Err(Failure::new(Error::ExpectedChar('0'), input)),
        (digits, rest) => Ok((digits, rest)),
    }
}

/// One or more ASCII digits read as an unsigned base-10 integer.
pub fn number(input: &str) -> ParseResult<'_, u32> {
    let (text, rest) = digits(input)?;
    let value = text
        .parse::<u32>()
        .map_err(|_| Failure::new(Error::TooManyDigits, input))?;
    Ok((value, rest))
}

/// Zero or more whitespace characters. Never fails.
pub fn whitespace0(input: &str) -> ParseResult<'_, &str> {
    Ok(take_while(input, char::is_whitespace))
}

/// One or more whitespace characters.
pub fn whitespace1(input: &str) -> ParseResult<'_, &str> {
    match take_while(input, char::is_whitespace) {
        ("", _) if input.is_empty() => Err(Failure::new(Error::UnexpectedEndOfInput, input)),
        ("", _) => Err(Failure::new(Error::ExpectedChar(' '), input)),
        (ws, rest) => Ok((ws, rest)),
    }
}

/// An identifier of the form `[A-Z][A-Z0-9_]*`.
pub fn upper_ident(input: &str) -> ParseResult<'_, &str> {
    match input.chars().next() {
        Some(c) if c.is_ascii_uppercase() => Ok(take_while(input, |c| {
            c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
        })),
        Some(_) => Err(Failure::new(Error::ExpectedChar('A'), input)),
        None => Err(Failure::new(Error::UnexpectedEndOfInput, input)),
    }
}

/// Apply `rule`, or succeed with `None` and the untouched input when it fails.
pub fn optional<'a, T, F>(input: &'a str, rule: F) -> (Option<T>, &'a str)
where
    F: FnOnce(&'a str) -> ParseResult<'a, T>,
{
    match rule(input) {
        Ok((value, rest)) => (Some(value), rest),
        Err(_) => (None, input),
    }
}

/// Ordered choice: the first alternative that succeeds wins, later ones are
/// not tried. Each alternative starts from the same `input`. When all of them
/// fail the failure that got furthest is reported.
pub fn choice<'a, T>(
    input: &'a str,
    alternatives: &[&dyn Fn(&'a str) -> ParseResult<'a, T>],
) -> ParseResult<'a, T> {
    let mut deepest: Option<Failure> = None;
    for alternative in alternatives {
        match alternative(input) {
            Ok(parsed) => return Ok(parsed),
            Err(failure) => {
                deepest = Some(match deepest {
                    Some(previous) => previous.furthest(failure),
                    None => failure,
                })
            }
        }
    }

    Err(deepest.unwrap_or_else(|| Failure::new(Error::UnexpectedEndOfInput, input)))
}
