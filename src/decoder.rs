//! Header and body decoding for Cisco-flavored syslog datagrams.
//!
//! ```text
//! [WS] '<' PRI '>' [WS] VERSION [':' [WS] TIMESTAMP] [':' [WS] '%' FAC '-' SEV '-' MNEMONIC] [WS] ':' [WS] BODY
//! ```
//!
//! The timestamp and message type segments are optional and each one backs
//! out completely when it does not match, so `<189>12: plain text` decodes
//! with the text as its body. Once a segment has matched it is kept; there is
//! no going back into it if something later fails.
//!
//! The one exception is a timestamp that parses in full but cannot be a real
//! instant (an unknown zone abbreviation, February 30th): that fails the whole
//! header with [`Error::UnknownTimezone`] or [`Error::InvalidDate`].

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::grammar::{
    char_of, number, optional, take_item, upper_ident, whitespace0, Failure, ParseResult,
};
use crate::message::{DecodedMessage, Header, MessageType, Priority};
use crate::timestamp::{parse_timestamp, Timestamp};
use crate::{Error, Severity};

/// Decodes datagrams against a clock, which supplies the year for
/// timestamps that leave it out.
///
/// Holds no other state; one decoder can be shared by any number of tasks.
#[derive(Clone)]
pub struct Decoder {
    clock: Arc<dyn Clock>,
}

impl Default for Decoder {
    fn default() -> Self {
        Decoder::with_clock(SystemClock)
    }
}

impl std::fmt::Debug for Decoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Decoder").finish_non_exhaustive()
    }
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock<C: Clock + 'static>(clock: C) -> Self {
        Decoder {
            clock: Arc::new(clock),
        }
    }

    /// Decode a raw datagram. Bytes that are not valid UTF-8 are replaced
    /// with U+FFFD rather than rejected.
    pub fn decode(&self, datagram: &[u8]) -> Result<DecodedMessage, Error> {
        self.decode_str(&String::from_utf8_lossy(datagram))
    }

    pub fn decode_str(&self, text: &str) -> Result<DecodedMessage, Error> {
        let (header, body) = self.decode_header(text)?;
        Ok(DecodedMessage {
            header,
            body: body.to_string(),
        })
    }

    /// Decode just the header, returning it with the unparsed body.
    pub fn decode_header<'a>(&self, text: &'a str) -> Result<(Header, &'a str), Error> {
        parse_header(text, self.clock.as_ref()).map_err(|f| f.error)
    }
}

/// Decode a datagram using the system clock.
pub fn decode(datagram: &[u8]) -> Result<DecodedMessage, Error> {
    Decoder::default().decode(datagram)
}

/// Decode message text using the system clock.
pub fn decode_str(text: &str) -> Result<DecodedMessage, Error> {
    Decoder::default().decode_str(text)
}

/// Decode the `<PRI>` at the start of `text`.
pub fn decode_priority(text: &str) -> Result<Priority, Error> {
    parse_priority(text).map(|(priority, _)| priority).map_err(|f| f.error)
}

/// Decode the version number at the start of `text`.
pub fn decode_version(text: &str) -> Result<u32, Error> {
    parse_version(text).map(|(version, _)| version).map_err(|f| f.error)
}

/// Decode a `%FACILITY-SEVERITY-MNEMONIC` segment at the start of `text`.
pub fn decode_message_type(text: &str) -> Result<MessageType, Error> {
    parse_message_type(text)
        .map(|(message_type, _)| message_type)
        .map_err(|f| f.error)
}

fn parse_header<'a>(input: &'a str, clock: &dyn Clock) -> ParseResult<'a, Header> {
    let mut rest = input;
    let priority = take_item!(parse_priority(rest), rest);
    let version = take_item!(parse_version(rest), rest);

    let timestamp = match timestamp_segment(rest, clock) {
        Ok((timestamp, after)) => {
            rest = after;
            Some(timestamp)
        }
        // A timestamp that was read in full but names a date or zone that
        // does not exist is a broken header, not body text.
        Err(failure) if matches!(failure.error, Error::InvalidDate | Error::UnknownTimezone(_)) => {
            return Err(failure);
        }
        Err(_) => None,
    };

    let (message_type, after) = optional(rest, |i| {
        let mut rest = i;
        take_item!(char_of(rest, ':'), rest);
        parse_message_type(rest)
    });
    rest = after;

    take_item!(parse_terminator(rest), rest);

    let header = Header {
        priority,
        version,
        timestamp: timestamp.unwrap_or(Timestamp::Unknown),
        message_type,
    };
    Ok((header, rest))
}

/// `':' [WS] TIMESTAMP`
fn timestamp_segment<'a>(input: &'a str, clock: &dyn Clock) -> ParseResult<'a, Timestamp> {
    let mut rest = input;
    take_item!(char_of(rest, ':'), rest);
    take_item!(whitespace0(rest), rest);
    parse_timestamp(rest, clock)
}

/// `[WS] '<' digits '>'`, 0..=191.
fn parse_priority(input: &str) -> ParseResult<'_, Priority> {
    let mut rest = input;
    take_item!(whitespace0(rest), rest);
    take_item!(
        char_of(rest, '<').map_err(|f| f.context(Error::BadPriority)),
        rest
    );
    let digits_at = rest;
    let value = take_item!(
        number(rest).map_err(|f| f.context(Error::BadPriority)),
        rest
    );
    take_item!(
        char_of(rest, '>').map_err(|f| f.context(Error::BadPriority)),
        rest
    );

    let priority = Priority::try_from(value).map_err(|err| Failure::new(err, digits_at))?;
    Ok((priority, rest))
}

/// `[WS] digits`
fn parse_version(input: &str) -> ParseResult<'_, u32> {
    let mut rest = input;
    take_item!(whitespace0(rest), rest);
    let version = take_item!(
        number(rest).map_err(|f| f.context(Error::MissingVersion)),
        rest
    );
    Ok((version, rest))
}

/// `[WS] '%' FACILITY '-' DIGIT '-' MNEMONIC`
fn parse_message_type(input: &str) -> ParseResult<'_, MessageType> {
    fn segment(input: &str) -> ParseResult<'_, MessageType> {
        let mut rest = input;
        take_item!(whitespace0(rest), rest);
        take_item!(char_of(rest, '%'), rest);
        let facility = take_item!(upper_ident(rest), rest);
        take_item!(char_of(rest, '-'), rest);
        let severity_at = rest;
        let severity = take_item!(number(rest), rest);
        let severity = u8::try_from(severity)
            .map_err(|_| Error::MalformedMessageType)
            .and_then(Severity::try_from)
            .map_err(|err| Failure::new(err, severity_at))?;
        take_item!(char_of(rest, '-'), rest);
        let mnemonic = take_item!(upper_ident(rest), rest);

        let message_type = MessageType {
            facility: facility.to_string(),
            severity,
            mnemonic: mnemonic.to_string(),
        };
        Ok((message_type, rest))
    }

    segment(input).map_err(|f| f.context(Error::MalformedMessageType))
}

/// `[WS] ':' [WS]`
fn parse_terminator(input: &str) -> ParseResult<'_, ()> {
    let mut rest = input;
    take_item!(whitespace0(rest), rest);
    take_item!(
        char_of(rest, ':').map_err(|f| f.context(Error::MissingTerminator)),
        rest
    );
    take_item!(whitespace0(rest), rest);
    Ok(((), rest))
}
