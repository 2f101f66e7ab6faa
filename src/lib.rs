//! Collector for the syslog dialect Cisco IOS devices send over UDP.
//!
//! IOS does not follow RFC 3164 or RFC 5424. A typical datagram looks like
//!
//! ```text
//! <189>11645: *Jun  4 06:28:17.141 UTC: %OSPF-5-ADJCHG: Process 1, Nbr 10.100.5.7 ...
//! ```
//!
//! where the number after the priority is a sequence number, the timestamp
//! comes in one of four shapes depending on `service timestamps`, and the
//! `%FACILITY-SEVERITY-MNEMONIC` segment names the event.
//!
//! For decoding alone, call [`decode`] (or build a [`Decoder`] with a fixed
//! [`clock::Clock`] when the year of year-less timestamps matters). To receive
//! datagrams, start a [`Collector`] and read its two event channels.
//!
//! # Example
//!
//! ```
//! use cisco_syslog::{decode_str, Facility, Severity};
//!
//! let msg = decode_str("<189>12: %SYS-5-CONFIG_I: Configured from console by vty0").unwrap();
//! assert_eq!(msg.header.facility(), Facility::LOCAL7);
//! assert_eq!(msg.header.severity(), Severity::NOTICE);
//! assert!(msg.header.message_type.unwrap().is("SYS", "CONFIG_I"));
//! assert_eq!(msg.body, "Configured from console by vty0");
//! ```

pub mod clock;
mod collector;
mod config;
mod decoder;
mod error;
mod facility;
pub mod grammar;
mod message;
mod record;
pub mod resolver;
mod severity;
pub mod timestamp;
pub mod timezone;

pub use collector::{
    trim_trailing_newline, Collector, CollectorError, CollectorHandle, CollectorStats, EventSinks,
};
pub use config::{AppConfig, CollectorConfig, WatchRule};
pub use decoder::{decode, decode_message_type, decode_priority, decode_str, decode_version, Decoder};
pub use error::Error;
pub use facility::Facility;
pub use message::{DecodedMessage, Header, MessageType, Priority};
pub use record::{DecodeErrorRecord, IngestedRecord, RECORD_KIND};
pub use resolver::LocalAddressResolver;
pub use severity::Severity;
pub use timestamp::{decode_timestamp, Timestamp};
