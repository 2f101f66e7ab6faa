//! Events the collector hands to its consumers.

use std::net::SocketAddr;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use uuid::Uuid;

use crate::message::DecodedMessage;

/// Tag carried by every [`IngestedRecord`].
pub const RECORD_KIND: &str = "syslog::message";

/// A successfully decoded datagram plus where and when it arrived.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct IngestedRecord {
    pub record_kind: &'static str,
    /// Wall-clock time of receipt, unrelated to the timestamp in the payload.
    pub received_at: DateTime<Utc>,
    pub sender: SocketAddr,
    pub receiver: SocketAddr,
    pub receiver_host_name: String,
    pub payload: DecodedMessage,
    /// Left unset by the collector. Consumers that map peers to tenants or
    /// sites fill these in.
    pub tenant: Option<Uuid>,
    pub site: Option<Uuid>,
}

impl IngestedRecord {
    pub fn new(
        received_at: DateTime<Utc>,
        sender: SocketAddr,
        receiver: SocketAddr,
        receiver_host_name: String,
        payload: DecodedMessage,
    ) -> Self {
        IngestedRecord {
            record_kind: RECORD_KIND,
            received_at,
            sender,
            receiver,
            receiver_host_name,
            payload,
            tenant: None,
            site: None,
        }
    }
}

/// A datagram that could not be turned into an [`IngestedRecord`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DecodeErrorRecord {
    pub sender: SocketAddr,
    #[serde(serialize_with = "lossy")]
    pub raw_bytes: Vec<u8>,
    pub reason: String,
}

impl DecodeErrorRecord {
    /// The raw datagram as text, with invalid UTF-8 replaced.
    pub fn lossy_text(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.raw_bytes)
    }
}

fn lossy<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&String::from_utf8_lossy(bytes))
}
