//! In-memory representation of a single decoded syslog message.

use serde::Serialize;

use crate::timestamp::Timestamp;
use crate::{Error, Facility, Severity};

/// The `<PRI>` value, 0 through 191, with facility and severity split out.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct Priority {
    value: u8,
    facility: Facility,
    severity: Severity,
}

impl Priority {
    pub const MAX: u32 = 191;

    pub fn value(self) -> u8 {
        self.value
    }

    /// `value >> 3`
    pub fn facility(self) -> Facility {
        self.facility
    }

    /// `value & 0x7`
    pub fn severity(self) -> Severity {
        self.severity
    }
}

impl TryFrom<u32> for Priority {
    type Error = Error;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if value > Self::MAX {
            return Err(Error::PriorityOutOfRange(value));
        }

        let value = value as u8;
        Ok(Priority {
            value,
            facility: Facility::try_from(value >> 3)?,
            severity: Severity::try_from(value & 0x7)?,
        })
    }
}

/// The `%FACILITY-SEVERITY-MNEMONIC` segment Cisco puts in front of the text,
/// e.g. `%OSPF-5-ADJCHG`.
///
/// Its severity is read from the segment itself and is not reconciled with
/// the one carried in the priority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct MessageType {
    pub facility: String,
    pub severity: Severity,
    pub mnemonic: String,
}

impl MessageType {
    pub fn is(&self, facility: &str, mnemonic: &str) -> bool {
        self.facility == facility && self.mnemonic == mnemonic
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Header {
    pub priority: Priority,
    /// What sits between `>` and the first `:`. On IOS this is the message
    /// sequence number when `service sequence-numbers` is on.
    pub version: u32,
    pub timestamp: Timestamp,
    pub message_type: Option<MessageType>,
}

impl Header {
    pub fn facility(&self) -> Facility {
        self.priority.facility()
    }

    pub fn severity(&self) -> Severity {
        self.priority.severity()
    }
}

/// A decoded datagram: header plus whatever text followed it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecodedMessage {
    pub header: Header,
    pub body: String,
}
