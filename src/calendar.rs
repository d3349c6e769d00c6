//! Calendar engine: era-aware date/time wrappers over `chrono`.
//!
//! PostgreSQL's `date`/`timestamp` family has no year zero: 1 BC is
//! stored as year 0, 2 BC as year -1, and so on (an "astronomical year
//! numbering" offset by one from the proleptic Gregorian calendar most
//! libraries, including `chrono`, actually implement). [`era_align_decode`]
//! and [`era_align_encode`] translate between the two, grounded on the
//! year handling in `pg_type_date_def.h`.

#[cfg(feature = "with-chrono")]
use chrono::NaiveDate;

use crate::error::{Error, Result};

/// Converts a year read off the wire (PostgreSQL's BC/AD numbering, where
/// year 1 BC is encoded as year 0) into `chrono`'s proleptic year, where
/// year 1 BC is `-1` (there is no year 0 in `chrono`'s convention either,
/// but its negative years are offset by one from PostgreSQL's).
#[must_use]
pub fn era_align_decode(pg_year: i32) -> i32 {
    if pg_year <= 0 { pg_year - 1 } else { pg_year }
}

/// Inverse of [`era_align_decode`]: converts a `chrono` proleptic year back
/// into PostgreSQL's BC/AD numbering for encoding onto the wire.
#[must_use]
pub fn era_align_encode(chrono_year: i32) -> i32 {
    if chrono_year < 0 { chrono_year + 1 } else { chrono_year }
}

/// Resolves a named IANA time zone, rejecting unknown zone names instead
/// of silently falling back to UTC.
#[cfg(feature = "with-chrono")]
pub fn make_zoned(name: &str) -> Result<chrono_tz::Tz> {
    name.parse()
        .map_err(|_| Error::InvalidArgument(format!("unknown time zone: {name}")))
}

/// Reinterprets a naive (zone-less) date/time as belonging to `tz`,
/// returning the UTC instant it denotes. Ambiguous or nonexistent local
/// times (around a DST transition) resolve to the earlier of the two
/// candidate instants, matching PostgreSQL's `timestamptz` input
/// conversion behavior.
#[cfg(feature = "with-chrono")]
pub fn as_zone(
    naive: chrono::NaiveDateTime,
    tz: chrono_tz::Tz,
) -> Result<chrono::DateTime<chrono::Utc>> {
    use chrono::TimeZone;
    match tz.from_local_datetime(&naive) {
        chrono::LocalResult::Single(dt) => Ok(dt.with_timezone(&chrono::Utc)),
        chrono::LocalResult::Ambiguous(earliest, _latest) => Ok(earliest.with_timezone(&chrono::Utc)),
        chrono::LocalResult::None => Err(Error::domain(format!(
            "local time {naive} does not exist in zone {tz}"
        ))),
    }
}

/// Returns whether `pg_year` (BC/AD numbering, year 0 = 1 BC) denotes a
/// leap year, without going through `chrono`'s differently-offset years.
#[cfg(feature = "with-chrono")]
#[must_use]
pub fn is_leap_year(pg_year: i32) -> bool {
    NaiveDate::from_ymd_opt(era_align_decode(pg_year), 1, 1).is_some_and(|d| d.leap_year())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn era_align_roundtrips_ad() {
        assert_eq!(era_align_decode(era_align_encode(2024)), 2024);
    }

    #[test]
    fn era_align_handles_1bc() {
        // 1 BC is pg year 0, chrono year -1
        assert_eq!(era_align_decode(0), -1);
        assert_eq!(era_align_encode(-1), 0);
    }

    #[test]
    fn era_align_handles_2bc() {
        assert_eq!(era_align_decode(-1), -2);
        assert_eq!(era_align_encode(-2), -1);
    }

    #[test]
    fn make_zoned_rejects_unknown() {
        assert!(make_zoned("Not/AZone").is_err());
    }

    #[test]
    fn make_zoned_accepts_known() {
        assert!(make_zoned("America/New_York").is_ok());
    }

    #[test]
    fn as_zone_converts_to_utc() {
        let naive = NaiveDate::from_ymd_opt(2024, 6, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        let tz = make_zoned("America/New_York").unwrap();
        let utc = as_zone(naive, tz).unwrap();
        // EDT is UTC-4 in June
        assert_eq!(utc.format("%H").to_string(), "16");
    }

    #[test]
    fn leap_year_detection() {
        assert!(is_leap_year(2024));
        assert!(!is_leap_year(2023));
    }
}
