use chrono::{TimeZone, Utc};
use criterion::{criterion_group, criterion_main, Criterion};

use cisco_syslog::clock::FixedClock;
use cisco_syslog::{decode_timestamp, Decoder};

fn decode_message(c: &mut Criterion) {
    let decoder = Decoder::with_clock(FixedClock(Utc.with_ymd_and_hms(2018, 6, 10, 0, 0, 0).unwrap()));
    let mut group = c.benchmark_group("message");

    group.bench_function("relative", |b| {
        let input = b"<189>11645: Jun  4 06:28:17.141: %OSPF-5-ADJCHG: Process 1, Nbr 10.100.5.7 on Vlan105 from DOWN to DOWN, Neighbor Down: Ignore timer expired";
        b.iter(|| {
            let _ = decoder.decode(input);
        })
    });

    group.bench_function("absolute_zone", |b| {
        let input = b"<189>1041: *Jun  5 2018 08:39:48.450 CEST: %SYS-5-CONFIG_I: Configured from console by vty0";
        b.iter(|| {
            let _ = decoder.decode(input);
        })
    });

    group.bench_function("no_segments", |b| {
        let input = b"<13>7: just some text that happens to be long enough to matter";
        b.iter(|| {
            let _ = decoder.decode(input);
        })
    });

    group.finish();
}

fn decode_timestamps(c: &mut Criterion) {
    let clock = FixedClock(Utc.with_ymd_and_hms(2018, 6, 10, 0, 0, 0).unwrap());
    let mut group = c.benchmark_group("timestamp");

    for (name, input) in [
        ("nil", "-"),
        ("relative", "*Jun  4 06:28:17.141 UTC"),
        ("absolute", "Jan  5 2018 06:26:36.184 CEST"),
        ("uptime", "3d21h"),
    ] {
        group.bench_function(name, |b| {
            b.iter(|| {
                let _ = decode_timestamp(input, &clock);
            })
        });
    }

    group.bench_function("chrono_rfc3339", |b| {
        b.iter(|| {
            let _ = chrono::DateTime::parse_from_rfc3339("2018-01-05T06:26:36.184+02:00");
        })
    });

    group.finish();
}

criterion_group!(benches, decode_message, decode_timestamps);
criterion_main!(benches);
