//! String-level checks shared by every request location.
//!
//! These follow the usual web validator semantics so that clients written
//! against them keep working: integers without leading zeros, decimal numbers
//! without exponents, and `true`/`false`/`1`/`0` booleans.

/// Parse a strict integer: optional sign, then `0` or digits without a leading zero.
pub fn parse_int(raw: &str) -> Option<i64> {
    let digits = raw.strip_prefix(['+', '-']).unwrap_or(raw);

    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if digits.len() > 1 && digits.starts_with('0') {
        return None;
    }

    raw.parse().ok()
}

/// Parse a decimal number of the form `[+-][digits][.digits]`.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let (negative, unsigned) = match raw.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, raw.strip_prefix('+').unwrap_or(raw)),
    };

    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, fraction),
        None => ("", unsigned),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if fraction.is_empty() || !all_digits(whole) || !all_digits(fraction) {
        return None;
    }

    let whole = if whole.is_empty() { "0" } else { whole };
    let value: f64 = if unsigned.contains('.') {
        format!("{}.{}", whole, fraction).parse().ok()?
    } else {
        fraction.parse().ok()?
    };

    Some(if negative { -value } else { value })
}

/// Parse a boolean flag.
pub fn parse_bool(raw: &str) -> Option<bool> {
    match raw {
        "true" | "1" => Some(true),
        "false" | "0" => Some(false),
        _ => None,
    }
}

/// Convert a snake_case identifier into camelCase.
pub fn camel_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut upper_next = false;

    for c in name.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }

    out
}
