use thiserror::Error;

/// Everything that can go wrong while decoding a datagram or resolving the
/// local side of it.
#[derive(Debug, Error)]
pub enum Error {
    #[error("missing or malformed priority")]
    BadPriority,
    #[error("priority {0} is outside 0..=191")]
    PriorityOutOfRange(u32),
    #[error("missing version number")]
    MissingVersion,
    #[error("unrecognized timestamp")]
    UnrecognizedTimestamp,
    #[error("timestamp names a date or time that does not exist")]
    InvalidDate,
    #[error("unknown timezone abbreviation {0:?}")]
    UnknownTimezone(String),
    #[error("malformed message type segment")]
    MalformedMessageType,
    #[error("missing ':' terminating the header")]
    MissingTerminator,
    #[error("unexpected eof")]
    UnexpectedEndOfInput,
    #[error("unexpected input, expected {0:?}")]
    ExpectedChar(char),
    #[error("expected {0:?}")]
    ExpectedLiteral(&'static str),
    #[error("too many digits in numeric field")]
    TooManyDigits,
    #[error("address family not supported")]
    UnsupportedAddressFamily,
    #[error("route query failed: {0}")]
    RouteQuery(#[source] std::io::Error),
}

impl Error {
    /// Whether this error came out of the message grammar, as opposed to the
    /// local address resolver.
    pub fn is_decode_error(&self) -> bool {
        !matches!(
            self,
            Error::UnsupportedAddressFamily | Error::RouteQuery(_)
        )
    }
}
