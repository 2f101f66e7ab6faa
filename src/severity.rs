use std::fmt;

use serde::{Serialize, Serializer};

use crate::Error;

/// Syslog severities, Emergency (0) through Debug (7).
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[allow(non_camel_case_types)]
pub enum Severity {
    EMERG = 0,
    ALERT = 1,
    CRIT = 2,
    ERR = 3,
    WARNING = 4,
    NOTICE = 5,
    INFO = 6,
    DEBUG = 7,
}

/// Anything above 7 is rejected; the priority decoder masks with `0x7` and so
/// never hits that path, but the message type segment carries a free digit.
impl TryFrom<u8> for Severity {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        let severity = match value {
            0 => Severity::EMERG,
            1 => Severity::ALERT,
            2 => Severity::CRIT,
            3 => Severity::ERR,
            4 => Severity::WARNING,
            5 => Severity::NOTICE,
            6 => Severity::INFO,
            7 => Severity::DEBUG,
            _ => return Err(Error::MalformedMessageType),
        };

        Ok(severity)
    }
}

impl Severity {
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Convert a syslog severity into a unique string representation
    pub fn as_str(self) -> &'static str {
        match self {
            Severity::EMERG => "emerg",
            Severity::ALERT => "alert",
            Severity::CRIT => "crit",
            Severity::ERR => "err",
            Severity::WARNING => "warning",
            Severity::NOTICE => "notice",
            Severity::INFO => "info",
            Severity::DEBUG => "debug",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Severity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::Severity;

    #[test]
    fn names() {
        assert_eq!(Severity::EMERG.as_str(), "emerg");
        assert_eq!(Severity::NOTICE.as_str(), "notice");
        assert_eq!(Severity::DEBUG.to_string(), "debug");
    }

    #[test]
    fn out_of_range_digit() {
        assert_eq!(Severity::try_from(5).unwrap(), Severity::NOTICE);
        assert!(Severity::try_from(8).is_err());
    }
}
