//! Minute-granularity wall-clock time.

use core::fmt;

pub const MINUTES_PER_DAY: u16 = 24 * 60;

/// A time of day with minute resolution, as shown on the clock face.
/// `Default` is midnight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WallTime {
    hour: u8,
    minute: u8,
}

impl WallTime {
    /// `None` when `hour` or `minute` is out of range.
    pub fn new(hour: u8, minute: u8) -> Option<Self> {
        (hour < 24 && minute < 60).then_some(Self { hour, minute })
    }

    pub fn hour(self) -> u8 {
        self.hour
    }

    pub fn minute(self) -> u8 {
        self.minute
    }

    pub fn minutes_since_midnight(self) -> u16 {
        self.hour as u16 * 60 + self.minute as u16
    }

    /// Parse `H:MM` / `HH:MM`.  Each field is one or two ASCII digits;
    /// anything else (including surrounding whitespace) is rejected.
    pub fn parse(s: &str) -> Option<Self> {
        let (h, m) = s.split_once(':')?;
        Self::new(parse_field(h)?, parse_field(m)?)
    }

    /// Zero-padded `HH:MM`, the form schedule keys are compared against.
    pub fn key(self) -> heapless::String<5> {
        let mut s = heapless::String::new();
        for b in [
            b'0' + self.hour / 10,
            b'0' + self.hour % 10,
            b':',
            b'0' + self.minute / 10,
            b'0' + self.minute % 10,
        ] {
            // Five ASCII bytes always fit.
            let _ = s.push(b as char);
        }
        s
    }

    /// Forward distance in minutes from `self` to `later`, wrapping at midnight.
    pub fn minutes_until(self, later: WallTime) -> u16 {
        (later.minutes_since_midnight() + MINUTES_PER_DAY - self.minutes_since_midnight())
            % MINUTES_PER_DAY
    }
}

impl fmt::Display for WallTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

fn parse_field(s: &str) -> Option<u8> {
    if s.is_empty() || s.len() > 2 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    s.parse().ok()
}
