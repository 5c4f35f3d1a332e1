//! Canonical join keys.
//!
//! Spreadsheets and dataframe exports disagree on how a key is spelled:
//! `101`, `101.0` and ` 101 ` all name the same SKU. Keys are brought to one
//! string form before any lookup so the join never misses on representation.

use crate::error::ReconError;

/// Largest integer an f64 holds exactly.
const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// Cell spellings that mean "no value".
pub(crate) fn is_null_token(s: &str) -> bool {
    s.is_empty()
        || ["nan", "na", "n/a", "null", "none"]
            .iter()
            .any(|t| s.eq_ignore_ascii_case(t))
}

/// Canonicalize one key cell.
///
/// Returns `Ok(None)` for an empty or null-ish cell. Numeric keys are
/// normalized (`"101.0"` → `"101"`, `"1.50"` → `"1.5"`); everything else is
/// trimmed text. Non-finite numbers and control characters cannot be keys.
pub fn canonical_key(
    table: &str,
    row: usize,
    column: &str,
    raw: &str,
) -> Result<Option<String>, ReconError> {
    let trimmed = raw.trim();
    if is_null_token(trimmed) {
        return Ok(None);
    }

    let invalid = || ReconError::JoinKeyType {
        table: table.into(),
        row,
        column: column.into(),
        value: raw.into(),
    };

    if trimmed.chars().any(char::is_control) {
        return Err(invalid());
    }

    if let Some(digits) = integer_literal(trimmed) {
        return Ok(Some(digits));
    }

    match trimmed.parse::<f64>() {
        Ok(n) if !n.is_finite() => Err(invalid()),
        Ok(n) if n.fract() == 0.0 && n.abs() < MAX_EXACT_INT => Ok(Some((n as i64).to_string())),
        Ok(n) => Ok(Some(n.to_string())),
        Err(_) => Ok(Some(trimmed.to_string())),
    }
}

/// Canonical digits of an integer literal (`-007`, `+12`, `101.00`), or
/// `None` for anything else. Works on the text so keys of any length stay
/// distinct.
fn integer_literal(s: &str) -> Option<String> {
    let (negative, unsigned) = match s.as_bytes().first()? {
        b'-' => (true, &s[1..]),
        b'+' => (false, &s[1..]),
        _ => (false, s),
    };
    let (int_part, frac_part) = match unsigned.split_once('.') {
        Some((int, frac)) => (int, Some(frac)),
        None => (unsigned, None),
    };
    if int_part.is_empty() || !int_part.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if frac_part.is_some_and(|f| !f.bytes().all(|b| b == b'0')) {
        return None;
    }

    let digits = int_part.trim_start_matches('0');
    Some(match (digits.is_empty(), negative) {
        (true, _) => "0".to_string(),
        (false, true) => format!("-{digits}"),
        (false, false) => digits.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(raw: &str) -> Option<String> {
        canonical_key("t", 1, "sku", raw).unwrap()
    }

    #[test]
    fn numeric_forms_collapse() {
        assert_eq!(key("101"), Some("101".into()));
        assert_eq!(key("101.0"), Some("101".into()));
        assert_eq!(key(" 101 "), Some("101".into()));
        assert_eq!(key("007"), Some("7".into()));
        assert_eq!(key("1.50"), Some("1.5".into()));
        assert_eq!(key("-0"), Some("0".into()));
    }

    #[test]
    fn long_integer_keys_stay_distinct() {
        assert_eq!(key("12345678901234567891"), Some("12345678901234567891".into()));
        assert_eq!(key("12345678901234567892"), Some("12345678901234567892".into()));
        assert_eq!(key("0012345678901234567892.00"), Some("12345678901234567892".into()));
        assert_eq!(key("-98765432109876543210"), Some("-98765432109876543210".into()));
        assert_eq!(key("+42"), Some("42".into()));
    }

    #[test]
    fn text_keys_are_trimmed() {
        assert_eq!(key(" PROD-1 "), Some("PROD-1".into()));
        assert_eq!(key("T-0001"), Some("T-0001".into()));
    }

    #[test]
    fn null_tokens_are_absent() {
        assert_eq!(key(""), None);
        assert_eq!(key("   "), None);
        assert_eq!(key("NaN"), None);
        assert_eq!(key("null"), None);
        assert_eq!(key("N/A"), None);
    }

    #[test]
    fn uncoercible_keys_fail() {
        let err = canonical_key("inventory", 3, "sku", "inf").unwrap_err();
        assert_eq!(
            err,
            ReconError::JoinKeyType {
                table: "inventory".into(),
                row: 3,
                column: "sku".into(),
                value: "inf".into(),
            }
        );
        assert!(canonical_key("inventory", 4, "sku", "PROD\u{0}1").is_err());
    }
}
