//! String framing for rectangles on the cross-frame channel.
//!
//! The channel only carries strings, so a rect travels as four
//! space-separated numbers in the fixed order `top left bottom right`.
//! Decoding is deliberately permissive: every field goes through
//! [`parse_js_float`], and anything unparseable (or missing) becomes NaN.
//! Consumers treat a non-finite rect as "not visible".

use crate::types::Rect;

/// Encode a rect as `"top left bottom right"`.
pub fn encode_rect(rect: &Rect) -> String {
    format!(
        "{} {} {} {}",
        format_js_number(rect.top),
        format_js_number(rect.left),
        format_js_number(rect.bottom),
        format_js_number(rect.right)
    )
}

/// Decode a `"top left bottom right"` payload.
///
/// Splits on single spaces, so doubled separators produce an empty (NaN)
/// field. Extra fields are ignored.
pub fn decode_rect(payload: &str) -> Rect {
    let mut fields = payload.split(' ').map(parse_js_float);
    let mut next = || fields.next().unwrap_or(f64::NAN);
    let top = next();
    let left = next();
    let bottom = next();
    let right = next();
    Rect::new(top, left, bottom, right)
}

/// Render a number the way a browser stringifies it (`800`, `50.5`, `NaN`,
/// `Infinity`).
pub fn format_js_number(value: f64) -> String {
    if value.is_nan() {
        "NaN".to_owned()
    } else if value.is_infinite() {
        let text = if value > 0.0 { "Infinity" } else { "-Infinity" };
        text.to_owned()
    } else if value == 0.0 {
        // Drops the sign of -0.
        "0".to_owned()
    } else {
        value.to_string()
    }
}

/// Prefix float parsing with `parseFloat` semantics.
///
/// Leading whitespace is skipped, then the longest decimal prefix
/// (`[+-]digits[.digits][e[+-]digits]`) or `Infinity` is taken. Returns NaN
/// when no prefix parses.
pub fn parse_js_float(field: &str) -> f64 {
    let s = field.trim_start();
    let (sign, rest) = match s.as_bytes().first() {
        Some(b'-') => (-1.0, &s[1..]),
        Some(b'+') => (1.0, &s[1..]),
        _ => (1.0, s),
    };

    if rest.starts_with("Infinity") {
        return sign * f64::INFINITY;
    }

    let end = decimal_prefix_len(rest.as_bytes());
    if end == 0 {
        return f64::NAN;
    }

    rest[..end]
        .parse::<f64>()
        .map(|value| sign * value)
        .unwrap_or(f64::NAN)
}

fn decimal_prefix_len(bytes: &[u8]) -> usize {
    let int_digits = count_digits(bytes, 0);
    let mut end = int_digits;
    let mut frac_digits = 0;

    if bytes.get(end) == Some(&b'.') {
        frac_digits = count_digits(bytes, end + 1);
        if int_digits > 0 || frac_digits > 0 {
            end += 1 + frac_digits;
        }
    }

    if int_digits == 0 && frac_digits == 0 {
        return 0;
    }

    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        let exp_digits = count_digits(bytes, exp);
        if exp_digits > 0 {
            end = exp + exp_digits;
        }
    }

    end
}

fn count_digits(bytes: &[u8], from: usize) -> usize {
    bytes
        .get(from..)
        .map(|tail| tail.iter().take_while(|b| b.is_ascii_digit()).count())
        .unwrap_or(0)
}
