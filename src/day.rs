//! Day bucketing
//!
//! All timestamp-to-day conversions in a store go through one [`DayBucketer`]
//! so that per-day samples from different stages line up.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Offset, Utc};
use std::fmt;
use std::str::FromStr;

/// Maps UTC timestamps to calendar days in a fixed reference offset
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DayBucketer {
    offset: FixedOffset,
}

impl Default for DayBucketer {
    fn default() -> Self {
        Self::utc()
    }
}

impl DayBucketer {
    pub fn utc() -> Self {
        Self {
            offset: Utc.fix(),
        }
    }

    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }

    pub fn offset(&self) -> FixedOffset {
        self.offset
    }

    /// Calendar day of `timestamp` in the reference offset
    pub fn day_of(&self, timestamp: &DateTime<Utc>) -> NaiveDate {
        timestamp.with_timezone(&self.offset).date_naive()
    }
}

impl fmt::Display for DayBucketer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let seconds = self.offset.local_minus_utc();
        let sign = if seconds < 0 { '-' } else { '+' };
        let seconds = seconds.abs();
        write!(f, "{}{:02}:{:02}", sign, seconds / 3600, (seconds % 3600) / 60)
    }
}

impl FromStr for DayBucketer {
    type Err = String;

    /// Parses `+HH:MM`, `-HH:MM`, `Z` or `UTC`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("z") || trimmed.eq_ignore_ascii_case("utc") {
            return Ok(Self::utc());
        }

        let invalid = || format!("Invalid UTC offset: {}. Expected +HH:MM or -HH:MM", s);

        let (sign, rest) = match trimmed.chars().next() {
            Some('+') => (1, &trimmed[1..]),
            Some('-') => (-1, &trimmed[1..]),
            _ => return Err(invalid()),
        };
        let (hours, minutes) = rest.split_once(':').ok_or_else(invalid)?;
        let hours: i32 = hours.parse().map_err(|_| invalid())?;
        let minutes: i32 = minutes.parse().map_err(|_| invalid())?;
        if hours > 23 || minutes > 59 {
            return Err(invalid());
        }

        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60))
            .map(Self::new)
            .ok_or_else(invalid)
    }
}

/// Every day from `first` to `last`, inclusive
pub fn day_range(first: NaiveDate, last: NaiveDate) -> impl Iterator<Item = NaiveDate> {
    let span = (last - first).num_days().max(-1);
    (0..=span).map(move |offset| first + Duration::days(offset))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_day_of_uses_reference_offset() {
        let late_evening = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();

        let utc = DayBucketer::utc();
        assert_eq!(utc.day_of(&late_evening), NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());

        let plus_two: DayBucketer = "+02:00".parse().unwrap();
        assert_eq!(plus_two.day_of(&late_evening), NaiveDate::from_ymd_opt(2024, 3, 2).unwrap());

        let minus_five: DayBucketer = "-05:00".parse().unwrap();
        let early = Utc.with_ymd_and_hms(2024, 3, 1, 3, 0, 0).unwrap();
        assert_eq!(minus_five.day_of(&early), NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
    }

    #[test]
    fn test_offset_parsing() {
        assert_eq!("UTC".parse::<DayBucketer>().unwrap(), DayBucketer::utc());
        assert_eq!("+00:00".parse::<DayBucketer>().unwrap(), DayBucketer::utc());
        assert_eq!("+05:30".parse::<DayBucketer>().unwrap().to_string(), "+05:30");
        assert_eq!("-03:00".parse::<DayBucketer>().unwrap().to_string(), "-03:00");
        assert!("05:30".parse::<DayBucketer>().is_err());
        assert!("+25:00".parse::<DayBucketer>().is_err());
        assert!("+aa:00".parse::<DayBucketer>().is_err());
    }

    #[test]
    fn test_day_range_inclusive() {
        let first = NaiveDate::from_ymd_opt(2024, 2, 27).unwrap();
        let last = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let days: Vec<_> = day_range(first, last).collect();
        assert_eq!(days.len(), 4);
        assert_eq!(days[2], NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());

        assert_eq!(day_range(first, first).count(), 1);
        assert_eq!(day_range(last, first).count(), 0);
    }
}
