use chrono::{DateTime, FixedOffset, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rstest::rstest;

use cisco_syslog::clock::FixedClock;
use cisco_syslog::{
    decode_priority, decode_timestamp, decode_version, DecodedMessage, Decoder, Error, Facility,
    Header, MessageType, Priority, Severity, Timestamp,
};

fn decoder(year: i32) -> Decoder {
    Decoder::with_clock(FixedClock(Utc.with_ymd_and_hms(year, 6, 10, 12, 0, 0).unwrap()))
}

fn at(offset_secs: i32, ymd: (i32, u32, u32), hms: (u32, u32, u32), millis: u32) -> Timestamp {
    let datetime = FixedOffset::east_opt(offset_secs)
        .unwrap()
        .with_ymd_and_hms(ymd.0, ymd.1, ymd.2, hms.0, hms.1, hms.2)
        .unwrap()
        + chrono::Duration::milliseconds(millis.into());
    Timestamp::At(datetime)
}

#[test]
fn ospf_adjacency_change() {
    let input = "<189>11645: Jun  4 06:28:17.141: %OSPF-5-ADJCHG: Process 1, Nbr 10.100.5.7 on Vlan105 from DOWN to DOWN, Neighbor Down: Ignore timer expired";

    assert_eq!(
        decoder(2018).decode(input.as_bytes()).unwrap(),
        DecodedMessage {
            header: Header {
                priority: Priority::try_from(189).unwrap(),
                version: 11645,
                timestamp: at(0, (2018, 6, 4), (6, 28, 17), 141),
                message_type: Some(MessageType {
                    facility: "OSPF".into(),
                    severity: Severity::NOTICE,
                    mnemonic: "ADJCHG".into(),
                }),
            },
            body: "Process 1, Nbr 10.100.5.7 on Vlan105 from DOWN to DOWN, Neighbor Down: Ignore timer expired".into(),
        }
    );
}

#[test]
fn configuration_change_with_zone_and_year() {
    let input = "<189>1041: *Jun  5 2018 08:39:48.450 CEST: %SYS-5-CONFIG_I: Configured from console by admin on vty0 (10.0.0.9)";

    assert_eq!(
        decoder(2030).decode(input.as_bytes()).unwrap(),
        DecodedMessage {
            header: Header {
                priority: Priority::try_from(189).unwrap(),
                version: 1041,
                timestamp: at(2 * 3600, (2018, 6, 5), (8, 39, 48), 450),
                message_type: Some(MessageType {
                    facility: "SYS".into(),
                    severity: Severity::NOTICE,
                    mnemonic: "CONFIG_I".into(),
                }),
            },
            body: "Configured from console by admin on vty0 (10.0.0.9)".into(),
        }
    );
}

#[test]
fn uptime_header() {
    let (header, body) = decoder(2018)
        .decode_header("  <123> 992: 3d21h: %FOO-1-BAR:")
        .unwrap();

    assert_eq!(
        header,
        Header {
            priority: Priority::try_from(123).unwrap(),
            version: 992,
            timestamp: Timestamp::Unknown,
            message_type: Some(MessageType {
                facility: "FOO".into(),
                severity: Severity::ALERT,
                mnemonic: "BAR".into(),
            }),
        }
    );
    assert_eq!(body, "");
}

#[rstest]
#[case("<191>61317:  ")]
#[case("<191>61506:  ")]
fn empty_message(#[case] input: &str) {
    let msg = decoder(2018).decode_str(input).unwrap();
    assert_eq!(msg.body, "");
    assert_eq!(msg.header.facility(), Facility::LOCAL7);
    assert_eq!(msg.header.severity(), Severity::DEBUG);
}

#[test]
fn standalone_fields() {
    let priority = decode_priority(" <123>").unwrap();
    assert_eq!(priority.value(), 123);
    assert_eq!(priority.facility(), Facility::CLOCKD);
    assert_eq!(priority.severity(), Severity::ERR);
    assert_eq!(decode_version(" 992").unwrap(), 992);

    let clock = FixedClock(Utc.with_ymd_and_hms(2018, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(decode_timestamp("-", &clock).unwrap(), Timestamp::Unknown);
    assert_eq!(
        decode_timestamp("Jun  4 06:21:04.783", &clock).unwrap(),
        Timestamp::At(DateTime::parse_from_rfc3339("2018-06-04T06:21:04.783Z").unwrap())
    );
}

#[test]
fn priority_splits_into_facility_and_severity() {
    for value in 0..=191u32 {
        let msg = decoder(2018)
            .decode_str(&format!("<{value}>1: body"))
            .unwrap();
        assert_eq!(u32::from(msg.header.facility().code()), value >> 3);
        assert_eq!(u32::from(msg.header.severity().code()), value & 7);
    }

    for value in [192u32, 255, 1000, 65536] {
        let err = decoder(2018)
            .decode_str(&format!("<{value}>1: body"))
            .unwrap_err();
        assert!(matches!(err, Error::PriorityOutOfRange(v) if v == value));
    }
}

#[test]
fn unknown_zone_fails_the_datagram() {
    let err = decoder(2018)
        .decode_str("<13>5: Jun  4 06:28:17 XYZ: %LINK-3-UPDOWN: link flapped")
        .unwrap_err();

    assert!(matches!(err, Error::UnknownTimezone(ref tz) if tz == "XYZ"), "{err}");
}

#[rstest]
#[case("<13>5: Feb 30 2018 06:28:17 UTC: %LINK-3-UPDOWN: link flapped")]
#[case("<13>5: *Jun 31 06:28:17.500: %LINK-3-UPDOWN: link flapped")]
#[case("<13>5: Jun  4 2018 25:61:00: %LINK-3-UPDOWN: link flapped")]
fn impossible_date_fails_the_datagram(#[case] input: &str) {
    let err = decoder(2018).decode_str(input).unwrap_err();
    assert!(matches!(err, Error::InvalidDate), "{input}: {err}");
}

#[test]
fn leap_day_follows_the_clock_year() {
    let input = "<13>5: Feb 29 12:00:00: leap";
    assert_eq!(
        decoder(2020).decode_str(input).unwrap().header.timestamp,
        at(0, (2020, 2, 29), (12, 0, 0), 0)
    );
    assert!(matches!(
        decoder(2018).decode_str(input).unwrap_err(),
        Error::InvalidDate
    ));
}

#[test]
fn text_that_is_not_a_timestamp_stays_in_the_body() {
    let msg = decoder(2018)
        .decode_str("<13>5: link flapped on Gi1/0/1")
        .unwrap();

    assert_eq!(msg.header.timestamp, Timestamp::Unknown);
    assert_eq!(msg.header.message_type, None);
    assert_eq!(msg.body, "link flapped on Gi1/0/1");
}

#[test]
fn same_bytes_same_result() {
    let decoder = decoder(2018);
    let input = b"<187>44: Jan  5 2017 06:26:36.184 UTC: %LINK-3-UPDOWN: Interface Gi1/0/1, changed state to down";

    let first = decoder.decode(input).unwrap();
    for _ in 0..3 {
        assert_eq!(decoder.decode(input).unwrap(), first);
    }
}

#[test]
fn failures_do_not_poison_the_decoder() {
    let decoder = decoder(2018);

    assert!(decoder.decode(b"garbage").is_err());
    assert!(decoder.decode(b"<13>").is_err());
    assert_eq!(decoder.decode(b"<13>7: fine").unwrap().body, "fine");
}
