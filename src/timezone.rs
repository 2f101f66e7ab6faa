//! Timezone abbreviations accepted after a Cisco timestamp.
//!
//! Offsets are fixed: `CEST` is always UTC+2, whatever the date says. When a
//! token appears more than once the first entry wins, which is how an
//! ordered-choice grammar over this list would behave.

use chrono::FixedOffset;

const HOUR: i32 = 60 * 60;

/// Token and UTC offset in seconds, in lookup order.
const TIMEZONES: &[(&str, i32)] = &[
    ("UTC", 0),
    ("GMT", 0),
    // British / Irish Summer Time
    ("BST", HOUR),
    ("IST", HOUR),
    ("WET", 0),
    ("WEST", HOUR),
    ("CET", HOUR),
    ("CEST", 2 * HOUR),
    ("EET", 2 * HOUR),
    ("EEST", 3 * HOUR),
    ("MSK", 3 * HOUR),
    ("MSD", 4 * HOUR),
    ("AST", -4 * HOUR),
    ("ADT", -3 * HOUR),
    // Generic North American zones resolve to standard time
    ("ET", -5 * HOUR),
    ("EST", -5 * HOUR),
    ("EDT", -4 * HOUR),
    ("CT", -6 * HOUR),
    ("CST", -6 * HOUR),
    ("CDT", -5 * HOUR),
    ("MT", -7 * HOUR),
    ("MST", -7 * HOUR),
    ("MDT", -6 * HOUR),
    ("PT", -8 * HOUR),
    ("PST", -8 * HOUR),
    ("PDT", -7 * HOUR),
    ("AKST", -9 * HOUR),
    ("AKDT", -8 * HOUR),
    ("HST", -10 * HOUR),
    // Australian Western Standard Time
    ("WST", 8 * HOUR),
];

/// Look up the UTC offset for an abbreviation. Matching is exact and
/// case-sensitive.
pub fn offset_of(token: &str) -> Option<FixedOffset> {
    TIMEZONES
        .iter()
        .find(|(name, _)| *name == token)
        .and_then(|(_, seconds)| FixedOffset::east_opt(*seconds))
}

/// All known abbreviations with their offsets, in lookup order.
pub fn entries() -> impl Iterator<Item = (&'static str, FixedOffset)> {
    TIMEZONES.iter().filter_map(|(name, seconds)| {
        FixedOffset::east_opt(*seconds).map(|offset| (*name, offset))
    })
}
