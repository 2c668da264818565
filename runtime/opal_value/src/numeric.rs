//! Number recognition and formatting.
//!
//! Recognition follows the scripting-language rules: optional leading
//! whitespace, optional sign, digits with an optional fraction, an optional
//! exponent, optional trailing whitespace. `Inf`, `Infinity` and `NaN` are
//! accepted in any case, and the literal `"0 but true"` is numeric zero.
//! Anything else after the number makes the string "not numeric", though
//! the leading number is still used.

use bitflags::bitflags;

bitflags! {
    /// What [`scan_number`] found.
    #[derive(Copy, Clone, Eq, PartialEq, Hash, Debug, Default)]
    pub struct NumFlags: u8 {
        /// Integer part fits in `u64`; `Scan::value` holds it.
        const IN_INT = 1 << 0;
        /// Integer part overflowed `u64`.
        const TOO_BIG = 1 << 1;
        /// Fraction or exponent present.
        const NOT_INT = 1 << 2;
        const NEG = 1 << 3;
        const INFINITY = 1 << 4;
        const NAN = 1 << 5;
        /// Something other than whitespace followed the number.
        const TRAILING = 1 << 6;
    }
}

/// Result of scanning a byte string for a leading number.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Scan {
    /// Empty when there is no number at all.
    pub flags: NumFlags,
    /// Integer part, valid with `IN_INT`.
    pub value: u64,
    /// Bytes of the number itself (sign through exponent).
    pub number: (usize, usize),
}

/// A parsed numeric value.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Number {
    Int(i64),
    Float(f64),
}

impl Number {
    pub fn as_int(self) -> i64 {
        match self {
            Number::Int(n) => n,
            Number::Float(f) => float_to_int(f),
        }
    }

    #[expect(
        clippy::cast_precision_loss,
        reason = "integers wider than the mantissa round like any float"
    )]
    pub fn as_float(self) -> f64 {
        match self {
            Number::Int(n) => n as f64,
            Number::Float(f) => f,
        }
    }
}

/// A number read off the front of a string.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Parsed {
    pub number: Number,
    /// The whole string was numeric.
    pub numeric: bool,
}

const ZERO_BUT_TRUE: &[u8] = b"0 but true";

fn is_space(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0x0b | 0x0c)
}

fn skip_digits(bytes: &[u8], mut pos: usize) -> usize {
    while pos < bytes.len() && bytes[pos].is_ascii_digit() {
        pos += 1;
    }
    pos
}

/// `inf`, `infinity` or `nan` at `pos`, case-insensitively. Returns the
/// flag and the end position.
fn scan_infnan(bytes: &[u8], pos: usize) -> Option<(NumFlags, usize)> {
    let rest = &bytes[pos..];
    let starts = |word: &[u8]| rest.len() >= word.len() && rest[..word.len()].eq_ignore_ascii_case(word);
    if starts(b"infinity") {
        Some((NumFlags::INFINITY, pos + 8))
    } else if starts(b"inf") {
        Some((NumFlags::INFINITY, pos + 3))
    } else if starts(b"nan") {
        Some((NumFlags::NAN, pos + 3))
    } else {
        None
    }
}

/// Scan `bytes` for a leading number.
pub fn scan_number(bytes: &[u8]) -> Scan {
    let none = Scan {
        flags: NumFlags::empty(),
        value: 0,
        number: (0, 0),
    };
    let len = bytes.len();
    let mut pos = 0;
    while pos < len && is_space(bytes[pos]) {
        pos += 1;
    }
    let start = pos;
    let mut flags = NumFlags::empty();
    if pos < len && (bytes[pos] == b'-' || bytes[pos] == b'+') {
        if bytes[pos] == b'-' {
            flags |= NumFlags::NEG;
        }
        pos += 1;
    }
    if pos >= len {
        return none;
    }

    let mut value: u64 = 0;
    let digits_start = pos;
    if bytes[pos].is_ascii_digit() {
        while pos < len && bytes[pos].is_ascii_digit() {
            let digit = u64::from(bytes[pos] - b'0');
            match value.checked_mul(10).and_then(|v| v.checked_add(digit)) {
                Some(next) => value = next,
                None => {
                    flags |= NumFlags::TOO_BIG;
                    pos = skip_digits(bytes, pos);
                    break;
                }
            }
            pos += 1;
        }
        if !flags.contains(NumFlags::TOO_BIG) {
            flags |= NumFlags::IN_INT;
        }
        if pos < len && bytes[pos] == b'.' {
            flags |= NumFlags::NOT_INT;
            pos = skip_digits(bytes, pos + 1);
        }
    } else if bytes[pos] == b'.' && pos + 1 < len && bytes[pos + 1].is_ascii_digit() {
        // no digits before the point: needs digits after it
        flags |= NumFlags::IN_INT | NumFlags::NOT_INT;
        pos = skip_digits(bytes, pos + 1);
    } else if let Some((infnan, end)) = scan_infnan(bytes, pos) {
        flags |= infnan;
        if infnan == NumFlags::NAN {
            flags.remove(NumFlags::NEG);
        }
        return finish(bytes, flags, 0, (start, end));
    } else {
        return none;
    }

    // optional exponent, only with digits
    if pos > digits_start && pos < len && (bytes[pos] == b'e' || bytes[pos] == b'E') {
        let mut exp = pos + 1;
        if exp < len && (bytes[exp] == b'-' || bytes[exp] == b'+') {
            exp += 1;
        }
        if exp < len && bytes[exp].is_ascii_digit() {
            pos = skip_digits(bytes, exp);
            flags &= NumFlags::NEG | NumFlags::TOO_BIG;
            flags |= NumFlags::NOT_INT;
        }
    }
    finish(bytes, flags, value, (start, pos))
}

fn finish(bytes: &[u8], mut flags: NumFlags, value: u64, number: (usize, usize)) -> Scan {
    let mut pos = number.1;
    while pos < bytes.len() && is_space(bytes[pos]) {
        pos += 1;
    }
    if pos < bytes.len() {
        flags |= NumFlags::TRAILING;
    }
    Scan { flags, value, number }
}

/// Whether the whole of `bytes` is a number.
pub fn looks_like_number(bytes: &[u8]) -> bool {
    if bytes == ZERO_BUT_TRUE {
        return true;
    }
    let scan = scan_number(bytes);
    !scan.flags.is_empty() && !scan.flags.contains(NumFlags::TRAILING)
}

/// Parse the leading number of `bytes`; zero when there is none.
pub fn parse_number(bytes: &[u8]) -> Parsed {
    if bytes == ZERO_BUT_TRUE {
        return Parsed {
            number: Number::Int(0),
            numeric: true,
        };
    }
    let scan = scan_number(bytes);
    let flags = scan.flags;
    let numeric = !flags.is_empty() && !flags.contains(NumFlags::TRAILING);
    let negative = flags.contains(NumFlags::NEG);

    let number = if flags.is_empty() {
        Number::Int(0)
    } else if flags.contains(NumFlags::INFINITY) {
        Number::Float(if negative { f64::NEG_INFINITY } else { f64::INFINITY })
    } else if flags.contains(NumFlags::NAN) {
        Number::Float(f64::NAN)
    } else if flags.contains(NumFlags::IN_INT) && !flags.contains(NumFlags::NOT_INT) {
        integer_value(scan.value, negative)
    } else {
        let (start, end) = scan.number;
        let text = std::str::from_utf8(&bytes[start..end]).unwrap_or("0");
        Number::Float(text.parse::<f64>().unwrap_or(0.0))
    };
    Parsed { number, numeric }
}

/// Signed integer for a magnitude, carried as a float when it does not fit.
#[expect(
    clippy::cast_precision_loss,
    reason = "magnitudes beyond i64 are carried as floats"
)]
fn integer_value(magnitude: u64, negative: bool) -> Number {
    if negative {
        match i64::try_from(magnitude) {
            Ok(n) => Number::Int(-n),
            Err(_) if magnitude == i64::MIN.unsigned_abs() => Number::Int(i64::MIN),
            Err(_) => Number::Float(-(magnitude as f64)),
        }
    } else {
        match i64::try_from(magnitude) {
            Ok(n) => Number::Int(n),
            Err(_) => Number::Float(magnitude as f64),
        }
    }
}

/// Float to integer, truncating toward zero and saturating; NaN is zero.
#[expect(
    clippy::cast_possible_truncation,
    reason = "saturating float-to-int conversion is the intent"
)]
pub fn float_to_int(value: f64) -> i64 {
    value as i64
}

/// Whether `value` is integral and representable as `i64`.
#[expect(
    clippy::cast_precision_loss,
    reason = "bounds comparison only"
)]
pub fn float_is_int(value: f64) -> bool {
    value.is_finite() && value.fract() == 0.0 && value >= i64::MIN as f64 && value < i64::MAX as f64
}

/// Format a float the way `%.15g` does, with `Inf`, `-Inf` and `NaN`.
pub fn format_float(value: f64) -> String {
    if value.is_nan() {
        return "NaN".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "Inf" } else { "-Inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // 15 significant digits: one before the point, 14 after.
    let scientific = format!("{value:.14e}");
    let (mantissa, exponent) = scientific.split_once('e').unwrap_or((scientific.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);

    if !(-4..15).contains(&exponent) {
        let sign = if exponent < 0 { '-' } else { '+' };
        format!(
            "{}e{sign}{:02}",
            strip_fraction_zeros(mantissa),
            exponent.unsigned_abs()
        )
    } else {
        let decimals = usize::try_from(14 - exponent).unwrap_or(0);
        strip_fraction_zeros(&format!("{value:.decimals$}")).to_string()
    }
}

fn strip_fraction_zeros(text: &str) -> &str {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.')
    } else {
        text
    }
}

#[cfg(test)]
mod tests;
