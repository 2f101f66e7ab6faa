use chrono::{DateTime, Datelike, Local, Utc};

/// Source of "now" for the decoder. Timestamps without a year take theirs
/// from here, so tests can pin it.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Calendar year used for relative timestamps.
    fn current_year(&self) -> i32 {
        self.now().year()
    }
}

/// Wall clock. The year comes from local time, which is what the device
/// sending a year-less timestamp is most likely to share with us.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn current_year(&self) -> i32 {
        Local::now().year()
    }
}

/// A clock stuck at one instant.
#[derive(Clone, Copy, Debug)]
pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}
