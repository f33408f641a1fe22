//! Human-readable timestamps.
//!
//! Accepted forms, each optionally negated with a leading `-` (the rest may
//! then be wrapped in parentheses):
//!
//! - colon separated `[[H:]M:]S`, e.g. `1:02.5`
//! - unit suffixed, e.g. `2h46m40.5s`, `3m4s`, `90s`
//! - plain seconds, e.g. `12.75`

use crate::error::{Result, StemSubError};

fn invalid(s: &str, reason: &str) -> StemSubError {
    StemSubError::InvalidTimestamp(format!("'{}': {}", s, reason))
}

fn parse_field(field: &str, whole: &str) -> Result<f64> {
    let field = field.trim();
    if field.is_empty() || field.starts_with(['-', '+']) {
        return Err(invalid(whole, "empty or signed field"));
    }
    let value: f64 = field
        .parse()
        .map_err(|_| invalid(whole, "not a number"))?;
    if !value.is_finite() {
        return Err(invalid(whole, "not finite"));
    }
    Ok(value)
}

fn parse_colons(body: &str, whole: &str) -> Result<f64> {
    let fields: Vec<&str> = body.split(':').collect();
    if fields.len() > 3 {
        return Err(invalid(whole, "at most hours, minutes and seconds"));
    }
    let mut seconds = 0.0;
    for field in fields {
        seconds = seconds * 60.0 + parse_field(field, whole)?;
    }
    Ok(seconds)
}

fn parse_units(body: &str, whole: &str) -> Result<f64> {
    let mut seconds = 0.0;
    let mut rest = body;
    let mut last_unit = 0u8;
    while !rest.is_empty() {
        let Some(end) = rest.find(['h', 'm', 's']) else {
            // Bare trailing number counts as seconds.
            if last_unit >= 3 {
                return Err(invalid(whole, "trailing number after seconds"));
            }
            seconds += parse_field(rest, whole)?;
            break;
        };
        let (unit, scale) = match rest.as_bytes()[end] {
            b'h' => (1, 3600.0),
            b'm' => (2, 60.0),
            _ => (3, 1.0),
        };
        if unit <= last_unit {
            return Err(invalid(whole, "units out of order"));
        }
        last_unit = unit;
        seconds += parse_field(&rest[..end], whole)? * scale;
        rest = &rest[end + 1..];
    }
    Ok(seconds)
}

/// Parses a timestamp into (possibly negative) seconds.
///
/// ```
/// use stemsub::timestamp::parse_timestamp;
///
/// assert_eq!(parse_timestamp("1:02.5").unwrap(), 62.5);
/// assert_eq!(parse_timestamp("-(3m4s)").unwrap(), -184.0);
/// ```
pub fn parse_timestamp(s: &str) -> Result<f64> {
    let trimmed = s.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => {
            let rest = rest.trim();
            let rest = match rest.strip_prefix('(') {
                Some(inner) => inner
                    .strip_suffix(')')
                    .ok_or_else(|| invalid(s, "unbalanced parentheses"))?,
                None => rest,
            };
            (true, rest.trim())
        }
        None => (false, trimmed),
    };
    if body.is_empty() {
        return Err(invalid(s, "empty"));
    }

    let seconds = if body.contains(':') {
        parse_colons(body, s)?
    } else if body.contains(['h', 'm', 's']) {
        parse_units(body, s)?
    } else {
        parse_field(body, s)?
    };
    Ok(if negative { -seconds } else { seconds })
}

/// Converts seconds to a sample index within a signal of `len` samples.
///
/// Negative values count back from the end. The result may equal `len`.
pub fn resolve_timestamp(seconds: f64, sample_rate: u32, len: usize) -> Result<usize> {
    if !seconds.is_finite() {
        return Err(StemSubError::InvalidTimestamp(format!("{} is not finite", seconds)));
    }
    let offset = (seconds.abs() * sample_rate as f64).round();
    let index = if seconds < 0.0 {
        len as f64 - offset
    } else {
        offset
    };
    if index < 0.0 || index > len as f64 {
        return Err(StemSubError::InvalidTimestamp(format!(
            "{}s lies outside a signal of {} samples at {} Hz",
            seconds, len, sample_rate
        )));
    }
    Ok(index as usize)
}

/// Formats seconds as `[-][Hh][Mm]S.SSSs`.
pub fn format_timestamp(seconds: f64) -> String {
    let sign = if seconds < 0.0 { "-" } else { "" };
    let total = seconds.abs();
    let hours = (total / 3600.0).floor();
    let minutes = ((total - hours * 3600.0) / 60.0).floor();
    let secs = total - hours * 3600.0 - minutes * 60.0;
    let mut out = String::from(sign);
    if hours > 0.0 {
        out.push_str(&format!("{}h", hours));
    }
    if hours > 0.0 || minutes > 0.0 {
        out.push_str(&format!("{}m", minutes));
    }
    out.push_str(&format!("{:.3}s", secs));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_colon_forms() {
        assert_eq!(parse_timestamp("5").unwrap(), 5.0);
        assert_eq!(parse_timestamp("1:02.5").unwrap(), 62.5);
        assert!((parse_timestamp("7:6:5.4").unwrap() - 25565.4).abs() < 1e-9);
        assert_eq!(parse_timestamp("-(3:4)").unwrap(), -184.0);
        assert_eq!(parse_timestamp(" -0:30 ").unwrap(), -30.0);
    }

    #[test]
    fn test_unit_forms() {
        assert_eq!(parse_timestamp("2h46m40.5s").unwrap(), 10000.5);
        assert_eq!(parse_timestamp("3m4s").unwrap(), 184.0);
        assert_eq!(parse_timestamp("1m30").unwrap(), 90.0);
        assert_eq!(parse_timestamp("-7.25s").unwrap(), -7.25);
    }

    #[test]
    fn test_rejects_malformed() {
        for s in ["", "-", "1:2:3:4", "a:b", "1::2", "4s3m", "-(3:4", "1:-2", "inf", "3s4"] {
            assert!(
                matches!(parse_timestamp(s), Err(StemSubError::InvalidTimestamp(_))),
                "accepted {:?}",
                s
            );
        }
    }

    #[test]
    fn test_resolve_counts_negative_from_end() {
        assert_eq!(resolve_timestamp(1.0, 100, 1000).unwrap(), 100);
        assert_eq!(resolve_timestamp(-1.0, 100, 1000).unwrap(), 900);
        assert_eq!(resolve_timestamp(10.0, 100, 1000).unwrap(), 1000);
        assert!(resolve_timestamp(10.01, 100, 1000).is_err());
        assert!(resolve_timestamp(-10.5, 100, 1000).is_err());
    }

    #[test]
    fn test_format() {
        assert_eq!(format_timestamp(62.5), "1m2.500s");
        assert_eq!(format_timestamp(-0.25), "-0.250s");
        assert_eq!(format_timestamp(3661.0), "1h1m1.000s");
    }
}
