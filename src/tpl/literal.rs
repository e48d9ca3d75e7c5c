//! 字面量解码：数字、字符串、字符常量

use crate::tpl::chars::{is_hex_digit, is_octal_digit};
use std::borrow::Cow;

/// Numeric views of a number literal; every view the text admits is filled.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumberValue {
    pub int: Option<i64>,
    pub uint: Option<u64>,
    pub float: Option<f64>,
    pub complex: Option<(f64, f64)>,
}

pub(crate) fn parse_char_constant(text: &str) -> Result<NumberValue, String> {
    let c = unquote_char(text)?;
    let n = c as u32;
    Ok(NumberValue {
        int: Some(n as i64),
        uint: Some(n as u64),
        float: Some(n as f64),
        complex: None,
    })
}

pub(crate) fn parse_complex(text: &str) -> Result<NumberValue, String> {
    let (re, im) = split_complex(text).ok_or_else(|| format!("illegal number syntax: {:?}", text))?;
    Ok(simplify_complex(re, im))
}

/// Decodes an integer, float or imaginary literal.
pub(crate) fn parse_number(text: &str) -> Result<NumberValue, String> {
    if let Some(imag) = text.strip_suffix('i') {
        let im = parse_float(imag).ok_or_else(|| format!("illegal number syntax: {:?}", text))?;
        return Ok(simplify_complex(0.0, im));
    }

    let mut n = NumberValue {
        int: parse_int(text),
        uint: parse_uint(text),
        ..Default::default()
    };
    if let Some(i) = n.int {
        n.float = Some(i as f64);
        if i >= 0 {
            n.uint = Some(i as u64);
        }
    } else if let Some(u) = n.uint {
        n.float = Some(u as f64);
    } else {
        let f = parse_float(text).ok_or_else(|| format!("illegal number syntax: {:?}", text))?;
        if !text.contains(['.', 'e', 'E', 'p', 'P']) || is_hex_int(text) {
            // `08` reads as a float but is a bad octal literal
            if !is_int_literal(text) {
                return Err(format!("illegal number syntax: {:?}", text));
            }
            return Err(format!("integer overflow: {:?}", text));
        }
        n.float = Some(f);
        if f.fract() == 0.0 && f.abs() < 9.2e18 {
            n.int = Some(f as i64);
            if f >= 0.0 {
                n.uint = Some(f as u64);
            }
        }
    }
    Ok(n)
}

/// Hex literal without a binary exponent, e.g. `0x1E`.
pub(crate) fn is_hex_int(text: &str) -> bool {
    let digits = text.trim_start_matches(['+', '-']);
    (digits.starts_with("0x") || digits.starts_with("0X")) && !digits.contains(['p', 'P'])
}

fn simplify_complex(re: f64, im: f64) -> NumberValue {
    let mut n = NumberValue {
        complex: Some((re, im)),
        ..Default::default()
    };
    if im == 0.0 {
        n.float = Some(re);
        if re.fract() == 0.0 && re.abs() < 9.2e18 {
            n.int = Some(re as i64);
            if re >= 0.0 {
                n.uint = Some(re as u64);
            }
        }
    }
    n
}

/// `1+2i` -> (1, 2); the split is the last sign that is not part of an
/// exponent.
fn split_complex(text: &str) -> Option<(f64, f64)> {
    let imag = text.strip_suffix('i')?;
    let bytes = imag.as_bytes();
    let split = (1..bytes.len())
        .rev()
        .find(|&i| matches!(bytes[i], b'+' | b'-') && !matches!(bytes[i - 1], b'e' | b'E' | b'p' | b'P'))?;
    Some((parse_float(&imag[..split])?, parse_float(&imag[split..])?))
}

/// Splits a leading sign and base prefix off an integer literal.
fn radix_parts(text: &str) -> (bool, u32, String) {
    let (negative, rest) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let lower = rest.get(..2).map(str::to_ascii_lowercase);
    let (radix, digits) = match lower.as_deref() {
        Some("0x") => (16, &rest[2..]),
        Some("0o") => (8, &rest[2..]),
        Some("0b") => (2, &rest[2..]),
        _ if rest.len() > 1 && rest.starts_with('0') => (8, &rest[1..]),
        _ => (10, rest),
    };
    (negative, radix, digits.replace('_', ""))
}

/// Every digit is valid in the literal's base.
fn is_int_literal(text: &str) -> bool {
    let (_, radix, digits) = radix_parts(text);
    !digits.is_empty() && digits.chars().all(|c| c.is_digit(radix))
}

fn parse_magnitude(text: &str) -> Option<(bool, u64)> {
    let (negative, radix, digits) = radix_parts(text);
    if digits.is_empty() || digits.starts_with(['+', '-']) {
        return None;
    }
    u64::from_str_radix(&digits, radix).ok().map(|m| (negative, m))
}

fn parse_int(text: &str) -> Option<i64> {
    let (negative, magnitude) = parse_magnitude(text)?;
    if negative {
        if magnitude == i64::MIN.unsigned_abs() {
            Some(i64::MIN)
        } else {
            i64::try_from(magnitude).ok().map(|m| -m)
        }
    } else {
        i64::try_from(magnitude).ok()
    }
}

fn parse_uint(text: &str) -> Option<u64> {
    match parse_magnitude(text)? {
        (false, m) => Some(m),
        (true, _) => None,
    }
}

fn parse_float(text: &str) -> Option<f64> {
    let clean = text.replace('_', "");
    let (negative, unsigned) = match clean.as_bytes().first() {
        Some(b'-') => (true, &clean[1..]),
        Some(b'+') => (false, &clean[1..]),
        _ => (false, clean.as_str()),
    };
    let value = if unsigned.starts_with("0x") || unsigned.starts_with("0X") {
        parse_hex_float(&unsigned[2..])?
    } else {
        // reject words the standard parser accepts, such as "inf"
        if !unsigned.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
            return None;
        }
        unsigned.parse::<f64>().ok()?
    };
    Some(if negative { -value } else { value })
}

/// `1.8p1` (after `0x`) -> 3.0
fn parse_hex_float(text: &str) -> Option<f64> {
    let (mantissa, exponent) = match text.find(['p', 'P']) {
        Some(i) => (&text[..i], text[i + 1..].parse::<i32>().ok()?),
        None => (text, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return None;
    }
    let mut value = 0f64;
    for c in int_part.chars() {
        value = value * 16.0 + c.to_digit(16)? as f64;
    }
    let mut scale = 1.0 / 16.0;
    for c in frac_part.chars() {
        value += c.to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }
    Some(value * 2f64.powi(exponent))
}

/// Decodes the body of a `"..."` literal; the lexer has already checked the
/// quotes are balanced.
pub(crate) fn unquote(text: &str) -> Result<String, String> {
    let body = text
        .strip_prefix('"')
        .and_then(|t| t.strip_suffix('"'))
        .ok_or_else(|| format!("invalid quoted string: {}", text))?;
    decode_escapes(body, true).map(Cow::into_owned)
}

/// Body of a raw string; embedded CRLF becomes LF.
pub(crate) fn unquote_raw(text: &str) -> Result<String, String> {
    let body = text
        .strip_prefix('`')
        .and_then(|t| t.strip_suffix('`'))
        .ok_or_else(|| format!("invalid raw string: {}", text))?;
    Ok(body.replace("\r\n", "\n"))
}

fn unquote_char(text: &str) -> Result<char, String> {
    let body = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .ok_or_else(|| format!("malformed character constant: {}", text))?;
    let decoded = decode_escapes(body, true)?;
    let mut chars = decoded.chars();
    match (chars.next(), chars.next()) {
        (Some(c), None) => Ok(c),
        _ => Err(format!("malformed character constant: {}", text)),
    }
}

/// Applies backslash escapes to text printed by an action. Unknown escapes
/// are kept as written.
pub(crate) fn unescape(s: &str) -> Cow<'_, str> {
    // lenient mode never fails
    decode_escapes(s, false).unwrap_or(Cow::Borrowed(s))
}

fn decode_escapes(s: &str, strict: bool) -> Result<Cow<'_, str>, String> {
    if !s.contains('\\') {
        return Ok(Cow::Borrowed(s));
    }
    let mut out = String::with_capacity(s.len());
    let mut chars = s.char_indices().peekable();
    while let Some((start, c)) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some((_, e)) = chars.next() else {
            if strict {
                return Err("invalid syntax: trailing backslash".to_string());
            }
            out.push('\\');
            break;
        };
        let simple = match e {
            'a' => Some('\u{07}'),
            'b' => Some('\u{08}'),
            'f' => Some('\u{0c}'),
            'n' => Some('\n'),
            'r' => Some('\r'),
            't' => Some('\t'),
            'v' => Some('\u{0b}'),
            '\\' => Some('\\'),
            '"' => Some('"'),
            '\'' => Some('\''),
            _ => None,
        };
        if let Some(ch) = simple {
            out.push(ch);
            continue;
        }
        let width = match e {
            'x' => 2,
            'u' => 4,
            'U' => 8,
            '0'..='7' => 3,
            _ => 0,
        };
        let decoded = if width == 0 {
            None
        } else {
            let begin = if e.is_ascii_digit() { start + 1 } else { start + 2 };
            let digits = s.get(begin..begin + width).filter(|d| {
                d.chars()
                    .all(|c| if e.is_ascii_digit() { is_octal_digit(c) } else { is_hex_digit(c) })
            });
            let radix = if e.is_ascii_digit() { 8 } else { 16 };
            digits
                .and_then(|d| u32::from_str_radix(d, radix).ok())
                .and_then(char::from_u32)
                .map(|ch| (ch, width - usize::from(e.is_ascii_digit())))
        };
        match decoded {
            Some((ch, skip)) => {
                out.push(ch);
                for _ in 0..skip {
                    chars.next();
                }
            }
            None if strict => return Err(format!("invalid syntax: unknown escape \\{}", e)),
            None => {
                out.push('\\');
                out.push(e);
            }
        }
    }
    Ok(Cow::Owned(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_integers() {
        let n = parse_number("0x1A").unwrap();
        assert_eq!(n.int, Some(26));
        assert_eq!(n.float, Some(26.0));
        assert_eq!(parse_number("0o17").unwrap().int, Some(15));
        assert_eq!(parse_number("017").unwrap().int, Some(15));
        assert_eq!(parse_number("0b101").unwrap().int, Some(5));
        assert_eq!(parse_number("1_000").unwrap().int, Some(1000));
        assert_eq!(parse_number("-42").unwrap().int, Some(-42));
        assert_eq!(parse_number("-42").unwrap().uint, None);
        assert_eq!(parse_number("0").unwrap().int, Some(0));
    }

    #[test]
    fn test_unsigned_overflow() {
        let n = parse_number("18446744073709551615").unwrap();
        assert_eq!(n.int, None);
        assert_eq!(n.uint, Some(u64::MAX));
        assert_eq!(
            parse_number("99999999999999999999999").unwrap_err(),
            "integer overflow: \"99999999999999999999999\""
        );
    }

    #[test]
    fn test_bad_octal_digit() {
        assert_eq!(parse_number("08").unwrap_err(), "illegal number syntax: \"08\"");
        assert_eq!(parse_number("-019").unwrap_err(), "illegal number syntax: \"-019\"");
        assert_eq!(parse_number("0o8").unwrap_err(), "illegal number syntax: \"0o8\"");
        // a fraction or exponent makes it decimal
        assert_eq!(parse_number("08.5").unwrap().float, Some(8.5));
        assert_eq!(parse_number("09e1").unwrap().float, Some(90.0));
    }

    #[test]
    fn test_floats() {
        let n = parse_number("3.14").unwrap();
        assert_eq!(n.float, Some(3.14));
        assert_eq!(n.int, None);
        let n = parse_number("1e3").unwrap();
        assert_eq!(n.float, Some(1000.0));
        assert_eq!(n.int, Some(1000));
        assert_eq!(parse_number(".5").unwrap().float, Some(0.5));
        assert_eq!(parse_number("0x1.8p1").unwrap().float, Some(3.0));
        assert!(parse_number("1.2.3").is_err());
    }

    #[test]
    fn test_complex() {
        let n = parse_complex("1+2i").unwrap();
        assert_eq!(n.complex, Some((1.0, 2.0)));
        assert_eq!(n.float, None);
        let n = parse_complex("1.5e2-3i").unwrap();
        assert_eq!(n.complex, Some((150.0, -3.0)));
        let n = parse_complex("2+0i").unwrap();
        assert_eq!(n.int, Some(2));
        assert_eq!(parse_number("2i").unwrap().complex, Some((0.0, 2.0)));
    }

    #[test]
    fn test_char_constant() {
        assert_eq!(parse_char_constant("'a'").unwrap().int, Some(97));
        assert_eq!(parse_char_constant("'\\n'").unwrap().int, Some(10));
        assert_eq!(parse_char_constant("'\\u00e9'").unwrap().int, Some(0xe9));
        assert!(parse_char_constant("'ab'").is_err());
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote("\"a\\tb\\\"c\\x41\\101\"").unwrap(), "a\tb\"cAA");
        assert_eq!(unquote("\"\\u263a\"").unwrap(), "\u{263a}");
        assert!(unquote("\"\\q\"").is_err());
        assert_eq!(unquote_raw("`a\r\nb\\n`").unwrap(), "a\nb\\n");
    }

    #[test]
    fn test_unescape_is_lenient() {
        assert_eq!(unescape("plain"), "plain");
        assert_eq!(unescape("a\\nb"), "a\nb");
        assert_eq!(unescape("c:\\q"), "c:\\q");
        assert_eq!(unescape("end\\"), "end\\");
        assert_eq!(unescape("\\u00e9"), "é");
    }
}
