//! Cisco timestamp decoding.
//!
//! IOS emits one of four shapes depending on `service timestamps` settings:
//!
//! ```text
//! -                               nil
//! *Jun  4 06:28:17.141 UTC        no year, `*` when the clock is not synced
//! Jan  5 2018 06:26:36.184 CEST   explicit year
//! 3d21h                           uptime since boot
//! ```
//!
//! The shapes overlap (a year-less timestamp reads the year as an hour until
//! the missing `:` gives it away), so they are tried strictly in the order
//! above and the first one that matches wins.

use chrono::{DateTime, FixedOffset, NaiveDate, Offset, TimeZone, Utc};
use serde::{Serialize, Serializer};

use crate::clock::Clock;
use crate::grammar::{
    char_of, choice, digits, literal, number, optional, take_item, take_while, whitespace0,
    whitespace1, Failure, ParseResult,
};
use crate::{timezone, Error};

const MONTHS: [&str; 12] = [
    "Jan", "Feb", "Mar", "Apr", "May", "Jun", "Jul", "Aug", "Sep", "Oct", "Nov", "Dec",
];

/// When the device says something happened.
///
/// `Unknown` covers both the nil value and uptime-only timestamps. It is not
/// an instant and must not be compared as one.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Timestamp {
    #[default]
    Unknown,
    At(DateTime<FixedOffset>),
}

impl Timestamp {
    pub fn is_unknown(&self) -> bool {
        matches!(self, Timestamp::Unknown)
    }

    pub fn as_datetime(&self) -> Option<&DateTime<FixedOffset>> {
        match self {
            Timestamp::Unknown => None,
            Timestamp::At(datetime) => Some(datetime),
        }
    }
}

impl From<DateTime<FixedOffset>> for Timestamp {
    fn from(datetime: DateTime<FixedOffset>) -> Self {
        Timestamp::At(datetime)
    }
}

impl Serialize for Timestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Timestamp::Unknown => serializer.serialize_none(),
            Timestamp::At(datetime) => serializer.serialize_some(datetime),
        }
    }
}

/// Decode a complete timestamp. Surrounding whitespace is allowed, anything
/// else left over is an error.
pub fn decode_timestamp(text: &str, clock: &dyn Clock) -> Result<Timestamp, Error> {
    fn complete<'a>(input: &'a str, clock: &dyn Clock) -> ParseResult<'a, Timestamp> {
        let mut rest = input;
        take_item!(whitespace0(rest), rest);
        let timestamp = take_item!(parse_timestamp(rest, clock), rest);
        take_item!(whitespace0(rest), rest);
        if !rest.is_empty() {
            return Err(Failure::new(Error::UnrecognizedTimestamp, rest));
        }
        Ok((timestamp, rest))
    }

    complete(text, clock)
        .map(|(timestamp, _)| timestamp)
        .map_err(|f| f.error)
}

/// The timestamp rule as used inside the header: decodes a prefix of `input`
/// and hands back the rest.
pub fn parse_timestamp<'a>(input: &'a str, clock: &dyn Clock) -> ParseResult<'a, Timestamp> {
    let relative = |i: &'a str| parse_relative(i, clock).map(|(dt, r)| (Timestamp::At(dt), r));
    let absolute = |i: &'a str| parse_absolute(i).map(|(dt, r)| (Timestamp::At(dt), r));

    choice(input, &[&parse_nil, &relative, &absolute, &parse_uptime])
        .map_err(|f| f.context(Error::UnrecognizedTimestamp))
}

fn parse_nil(input: &str) -> ParseResult<'_, Timestamp> {
    let (_, rest) = char_of(input, '-')?;
    Ok((Timestamp::Unknown, rest))
}

/// `3d21h`: days and hours since boot, which says nothing about the date.
fn parse_uptime(input: &str) -> ParseResult<'_, Timestamp> {
    let mut rest = input;
    take_item!(number(rest), rest);
    take_item!(char_of(rest, 'd'), rest);
    take_item!(number(rest), rest);
    take_item!(char_of(rest, 'h'), rest);
    Ok((Timestamp::Unknown, rest))
}

/// `[*][WS] MON [WS] DAY [WS] HH:MM:SS[.fff][ WS TZ ]`, year taken from the
/// clock.
fn parse_relative<'a>(input: &'a str, clock: &dyn Clock) -> ParseResult<'a, DateTime<FixedOffset>> {
    let mut rest = input;
    take_item!(unsynchronized_marker(rest), rest);
    let month = take_item!(parse_month(rest), rest);
    take_item!(whitespace0(rest), rest);
    let day = take_item!(number(rest), rest);
    take_item!(whitespace0(rest), rest);
    let time = take_item!(parse_time(rest), rest);
    let offset = take_item!(parse_zone(rest), rest);

    let datetime = to_datetime(clock.current_year(), month, day, time, offset)
        .map_err(|err| Failure::new(err, rest))?;
    Ok((datetime, rest))
}

/// `[*][WS] MON WS DAY WS YYYY WS HH:MM:SS[.fff][ WS TZ ]`
fn parse_absolute(input: &str) -> ParseResult<'_, DateTime<FixedOffset>> {
    let mut rest = input;
    take_item!(unsynchronized_marker(rest), rest);
    let month = take_item!(parse_month(rest), rest);
    take_item!(whitespace1(rest), rest);
    let day = take_item!(number(rest), rest);
    take_item!(whitespace1(rest), rest);
    let year = take_item!(parse_year(rest), rest);
    take_item!(whitespace1(rest), rest);
    let time = take_item!(parse_time(rest), rest);
    let offset = take_item!(parse_zone(rest), rest);

    let datetime =
        to_datetime(year, month, day, time, offset).map_err(|err| Failure::new(err, rest))?;
    Ok((datetime, rest))
}

/// Optional leading `*`. It only tells us the device clock was not
/// synchronized; the value is decoded the same either way.
fn unsynchronized_marker(input: &str) -> ParseResult<'_, bool> {
    let (marker, rest) = optional(input, |i| {
        let mut rest = i;
        take_item!(char_of(rest, '*'), rest);
        take_item!(whitespace0(rest), rest);
        Ok(((), rest))
    });
    Ok((marker.is_some(), rest))
}

fn parse_month(input: &str) -> ParseResult<'_, u32> {
    for (idx, name) in MONTHS.iter().enumerate() {
        if let Ok((_, rest)) = literal(input, *name) {
            return Ok((idx as u32 + 1, rest));
        }
    }

    Err(Failure::new(Error::UnrecognizedTimestamp, input))
}

fn parse_year(input: &str) -> ParseResult<'_, i32> {
    let (text, rest) = digits(input)?;
    if text.len() != 4 {
        return Err(Failure::new(Error::UnrecognizedTimestamp, input));
    }
    let year = text
        .parse::<i32>()
        .map_err(|_| Failure::new(Error::UnrecognizedTimestamp, input))?;
    Ok((year, rest))
}

/// Hour, minute, second and nanoseconds.
type TimeOfDay = (u32, u32, u32, u32);

fn parse_time(input: &str) -> ParseResult<'_, TimeOfDay> {
    let mut rest = input;
    let hour = take_item!(number(rest), rest);
    take_item!(char_of(rest, ':'), rest);
    let minute = take_item!(number(rest), rest);
    take_item!(char_of(rest, ':'), rest);
    let second = take_item!(number(rest), rest);
    let (nanos, rest) = optional(rest, parse_fraction);

    Ok(((hour, minute, second, nanos.unwrap_or(0)), rest))
}

/// `.fff`, read as a decimal fraction of a second with up to nine digits.
fn parse_fraction(input: &str) -> ParseResult<'_, u32> {
    let mut rest = input;
    take_item!(char_of(rest, '.'), rest);
    let text = take_item!(digits(rest), rest);
    if text.len() > 9 {
        return Err(Failure::new(Error::TooManyDigits, input));
    }

    let mut nanos = text
        .parse::<u32>()
        .map_err(|_| Failure::new(Error::TooManyDigits, input))?;
    nanos *= 10u32.pow(9 - text.len() as u32);
    Ok((nanos, rest))
}

/// Optional ` TZ` suffix. No suffix means UTC. A suffix that looks like a
/// zone abbreviation but is not in the table fails the whole timestamp.
fn parse_zone(input: &str) -> ParseResult<'_, FixedOffset> {
    let utc = Utc.fix();

    let Ok((_, after_ws)) = whitespace1(input) else {
        return Ok((utc, input));
    };
    let (token, rest) = take_while(after_ws, |c| c.is_ascii_uppercase());
    if token.is_empty() {
        return Ok((utc, input));
    }

    match timezone::offset_of(token) {
        Some(offset) => Ok((offset, rest)),
        None => Err(Failure::new(
            Error::UnknownTimezone(token.to_string()),
            after_ws,
        )),
    }
}

fn to_datetime(
    year: i32,
    month: u32,
    day: u32,
    (hour, minute, second, nanos): TimeOfDay,
    offset: FixedOffset,
) -> Result<DateTime<FixedOffset>, Error> {
    let datetime = NaiveDate::from_ymd_opt(year, month, day)
        .ok_or(Error::InvalidDate)?
        .and_hms_nano_opt(hour, minute, second, nanos)
        .ok_or(Error::InvalidDate)?;

    offset
        .from_local_datetime(&datetime)
        .single()
        .ok_or(Error::InvalidDate)
}
