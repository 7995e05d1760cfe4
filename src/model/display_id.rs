//! Display id formatting and parsing (`PREFIX-N`)

use crate::errors::{CoreError, Result};

/// Render a display id, e.g. `("WRK", 12)` → `"WRK-12"`
pub fn format_display_id(prefix: &str, seq: u64) -> String {
    format!("{prefix}-{seq}")
}

/// Parse a display id into `(prefix, seq)`
///
/// The prefix is uppercased before validation, so `wrk-3` parses as
/// `("WRK", 3)`. Rejects a missing dash, a prefix outside `[A-Z0-9]{1,10}`,
/// a non-digit sequence, and `seq == 0`.
pub fn parse_display_id(input: &str) -> Result<(String, u64)> {
    let (raw_prefix, raw_seq) = input
        .split_once('-')
        .ok_or_else(|| CoreError::validation(format!("malformed display id {input:?}: no dash")))?;

    let prefix = raw_prefix.to_ascii_uppercase();
    if prefix.is_empty()
        || prefix.len() > 10
        || !prefix
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    {
        return Err(CoreError::validation(format!(
            "malformed display id {input:?}: bad prefix {raw_prefix:?}"
        )));
    }

    if raw_seq.is_empty() || !raw_seq.chars().all(|c| c.is_ascii_digit()) {
        return Err(CoreError::validation(format!(
            "malformed display id {input:?}: sequence is not a number"
        )));
    }
    let seq: u64 = raw_seq
        .parse()
        .map_err(|_| CoreError::validation(format!("malformed display id {input:?}: overflow")))?;
    if seq == 0 {
        return Err(CoreError::validation(format!(
            "malformed display id {input:?}: sequence must be positive"
        )));
    }

    Ok((prefix, seq))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        for (prefix, seq) in [("WRK", 1), ("A", 42), ("AB12CD34EF", 999_999), ("0X9", 7)] {
            let formatted = format_display_id(prefix, seq);
            let (p, n) = parse_display_id(&formatted).unwrap();
            assert_eq!((p.as_str(), n), (prefix, seq));
        }
    }

    #[test]
    fn test_lowercase_prefix_uppercased() {
        assert_eq!(
            parse_display_id("wrk-3").unwrap(),
            ("WRK".to_string(), 3)
        );
    }

    #[test]
    fn test_malformed_inputs_rejected() {
        for bad in [
            "",            // empty
            "WRK",         // no dash
            "WRK-",        // empty seq
            "-1",          // empty prefix
            "WRK-0",       // seq must be positive
            "WRK-abc",     // non-digit seq
            "WRK-1.5",     // non-digit seq
            "W_K-1",       // bad prefix char
            "TOOLONGPREFIX-1", // prefix > 10 chars
            "WRK--1",      // negative / double dash
        ] {
            assert!(parse_display_id(bad).is_err(), "expected error for {bad:?}");
        }
    }

    #[test]
    fn test_extra_dash_splits_on_first() {
        // "AB-12-3" splits at the first dash; "12-3" is not a number
        assert!(parse_display_id("AB-12-3").is_err());
    }
}
