//! Field coercion layer.
//!
//! Legacy fields arrive as fixed-width text that may be blank, NUL-padded,
//! or plain garbage. Every function here is total: coercion failure is data,
//! not a program error, and resolves to the caller's declared default.
//!
//! Numeric coercion is two-stage. The raw bytes are decoded lossily and
//! parsed after trimming; if that fails, non-printing characters and NUL
//! bytes are stripped and the parse retried. The legacy format right-aligns
//! numbers and sometimes pads with NULs instead of spaces, so the second
//! stage recovers values like `"\0\0 42"`.

use chrono::NaiveDate;
use rust_decimal::Decimal;

/// True when the buffer holds no usable content at all (empty, or nothing
/// but NUL and pad bytes).
fn is_blank(raw: &[u8]) -> bool {
    raw.iter().all(|&b| b == 0 || b == b' ')
}

/// Strip NULs and other non-printing characters, then trim. Interior spaces
/// survive, so space-separated garbage still fails the retry parse.
fn printable(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_control())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Coerce a raw field into an integer, falling back to `default`.
pub fn coerce_integer(raw: &[u8], default: Option<i64>) -> Option<i64> {
    if is_blank(raw) {
        return default;
    }
    let text = String::from_utf8_lossy(raw);
    if let Ok(v) = text.trim().parse::<i64>() {
        return Some(v);
    }
    printable(&text).parse::<i64>().ok().or(default)
}

/// Coerce a raw field into a decimal, falling back to `default`.
pub fn coerce_number(raw: &[u8], default: Option<Decimal>) -> Option<Decimal> {
    if is_blank(raw) {
        return default;
    }
    let text = String::from_utf8_lossy(raw);
    if let Ok(v) = text.trim().parse::<Decimal>() {
        return Some(v);
    }
    printable(&text).parse::<Decimal>().ok().or(default)
}

/// Coerce a raw field into trimmed text. NUL bytes are dropped; interior
/// whitespace is preserved.
pub fn coerce_text(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw)
        .chars()
        .filter(|&c| c != '\0')
        .collect::<String>()
        .trim()
        .to_string()
}

/// Coerce a raw `YYYYMMDD` field into a date. Blank or unparsable input is
/// `None` (stored as SQL NULL).
pub fn coerce_date(raw: &[u8]) -> Option<NaiveDate> {
    if is_blank(raw) {
        return None;
    }
    let text = printable(&String::from_utf8_lossy(raw));
    NaiveDate::parse_from_str(&text, "%Y%m%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_inputs_use_default() {
        assert_eq!(coerce_integer(b"", Some(0)), Some(0));
        assert_eq!(coerce_integer(b"        ", Some(7)), Some(7));
        assert_eq!(coerce_integer(b"\0\0\0\0", None), None);
        assert_eq!(coerce_number(b"\0  \0", Some(Decimal::ZERO)), Some(Decimal::ZERO));
    }

    #[test]
    fn test_plain_parse() {
        assert_eq!(coerce_integer(b"  42", None), Some(42));
        assert_eq!(coerce_integer(b"-7  ", None), Some(-7));
        assert_eq!(
            coerce_number(b"  3.50", None),
            Some("3.50".parse().unwrap())
        );
    }

    #[test]
    fn test_second_stage_strips_pad_artifacts() {
        assert_eq!(coerce_integer(b"\0\0 42", None), Some(42));
        assert_eq!(coerce_integer(b"1\x002\x003", None), Some(123));
        assert_eq!(
            coerce_number(b"\x001.5\0", None),
            Some("1.5".parse().unwrap())
        );
    }

    #[test]
    fn test_garbage_uses_default() {
        assert_eq!(coerce_integer(b"N/A     ", Some(0)), Some(0));
        assert_eq!(coerce_integer(b"12abc", None), None);
        assert_eq!(coerce_number(b"~~", Some(Decimal::ONE)), Some(Decimal::ONE));
    }

    #[test]
    fn test_interior_space_is_not_collapsed_into_a_number() {
        assert_eq!(coerce_integer(b"1 2     ", Some(0)), Some(0));
        assert_eq!(coerce_number(b"3 .5", Some(Decimal::ZERO)), Some(Decimal::ZERO));
    }

    #[test]
    fn test_text_trims_and_drops_nuls() {
        assert_eq!(coerce_text(b"  ACME CO  "), "ACME CO");
        assert_eq!(coerce_text(b"AB\0CD\0\0"), "ABCD");
        assert_eq!(coerce_text(b"\0\0"), "");
    }

    #[test]
    fn test_date_parsing() {
        assert_eq!(
            coerce_date(b"20240215"),
            NaiveDate::from_ymd_opt(2024, 2, 15)
        );
        assert_eq!(coerce_date(b"        "), None);
        assert_eq!(coerce_date(b"20241350"), None);
        assert_eq!(coerce_date(b"\020240215"), NaiveDate::from_ymd_opt(2024, 2, 15));
    }
}
