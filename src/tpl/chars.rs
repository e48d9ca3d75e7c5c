//! Character classes shared by the lexer and the number decoder.

pub(crate) const SPACE_CHARS: &[char] = &[' ', '\t', '\r', '\n'];

pub(crate) fn is_space(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\r' | '\n')
}

pub(crate) fn is_newline(c: char) -> bool {
    c == '\n'
}

pub(crate) fn is_alphanumeric(c: char) -> bool {
    c == '_' || c.is_alphabetic() || c.is_numeric()
}

/// Printable ASCII, i.e. what may appear as a lone `CHAR` token.
pub(crate) fn is_visible_ascii(c: char) -> bool {
    c.is_ascii() && !c.is_ascii_control()
}

pub(crate) fn is_decimal_digit(c: char) -> bool {
    c.is_ascii_digit()
}

pub(crate) fn is_hex_digit(c: char) -> bool {
    c.is_ascii_hexdigit()
}

pub(crate) fn is_octal_digit(c: char) -> bool {
    matches!(c, '0'..='7')
}

pub(crate) fn is_binary_digit(c: char) -> bool {
    matches!(c, '0' | '1')
}

/// Length of the whitespace run at the end of `s`.
pub(crate) fn right_trim_len(s: &str) -> usize {
    s.len() - s.trim_end_matches(SPACE_CHARS).len()
}

/// Length of the whitespace run at the start of `s`.
pub(crate) fn left_trim_len(s: &str) -> usize {
    s.len() - s.trim_start_matches(SPACE_CHARS).len()
}
