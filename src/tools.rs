// SPDX-FileCopyrightText: 2025 Robin Vobruba <hoijui.quaero@gmail.com>
//
// SPDX-License-Identifier: AGPL-3.0-or-later

use base64::Engine as _;
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use const_format::concatcp;

/// Default user-agent of every request;
/// operators can override it in the configuration.
pub const USER_AGENT: &str = concatcp!("figsnap/", crate::VERSION);

/// Encodes a plain `user:password` credential
/// into the value of an HTTP Basic-Authorization header.
#[must_use]
pub fn basic_auth_value(credential: &str) -> String {
    format!(
        "Basic {}",
        base64::engine::general_purpose::STANDARD.encode(credential)
    )
}

/// The fan-out width used for page sweeps and enrichment pools
/// when the operator did not configure one.
#[must_use]
pub fn default_parallelism() -> usize {
    std::thread::available_parallelism().map_or(1, std::num::NonZeroUsize::get)
}

/// Normalises an upstream timestamp to a UTC instant.
///
/// The upstream usually sends `YYYY-MM-DDTHH:MM:SSZ`,
/// but bare local date-times and plain dates appear
/// in timelines and embargo fields.
#[must_use]
pub fn parse_instant(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|instant| instant.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S")
                .map(|naive| naive.and_utc())
                .ok()
        })
        .or_else(|| {
            NaiveDate::parse_from_str(raw, "%Y-%m-%d")
                .map(|date| date.and_time(chrono::NaiveTime::MIN).and_utc())
                .ok()
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_auth_encodes_user_pass() {
        assert_eq!(basic_auth_value("user:pass"), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn parallelism_is_at_least_one() {
        assert!(default_parallelism() >= 1);
    }

    #[test]
    fn instants_normalise_to_utc() {
        let full = parse_instant("2021-03-01T09:30:00Z").expect("rfc3339 failed");
        assert_eq!(full.to_rfc3339(), "2021-03-01T09:30:00+00:00");
        let offset = parse_instant("2021-03-01T10:30:00+01:00").expect("offset failed");
        assert_eq!(offset, full);
        let bare = parse_instant("2021-03-01T09:30:00").expect("bare failed");
        assert_eq!(bare, full);
        let date_only = parse_instant("2021-03-01").expect("date failed");
        assert_eq!(date_only.to_rfc3339(), "2021-03-01T00:00:00+00:00");
        assert_eq!(parse_instant("not a date"), None);
    }
}
