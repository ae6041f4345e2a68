//! Excel's `_xHHHH_` escapes for string content (shared strings, formulas)
//!
//! Characters XML 1.0 cannot carry, and carriage returns, are written as
//! `_xHHHH_`. A literal `_xHHHH_` in the text gets its underscore escaped as
//! `_x005F_` so it reads back unchanged.

use std::borrow::Cow;
use std::fmt::Write;

/// Whether XML 1.0 accepts `c` as character data
pub(crate) fn is_xml_char(c: char) -> bool {
    matches!(
        c,
        '\t' | '\n' | '\r' | '\u{20}'..='\u{D7FF}' | '\u{E000}'..='\u{FFFD}' | '\u{10000}'..='\u{10FFFF}'
    )
}

fn needs_escape(c: char) -> bool {
    c == '\r' || !is_xml_char(c)
}

/// Whether `s` starts with a complete `_xHHHH_` sequence
fn starts_with_escape(s: &str) -> bool {
    let bytes = s.as_bytes();
    bytes.len() >= 7
        && bytes[0] == b'_'
        && bytes[1] == b'x'
        && bytes[2..6].iter().all(u8::is_ascii_hexdigit)
        && bytes[6] == b'_'
}

/// Encode `s` for a `<t>` or `<f>` element
pub(crate) fn encode_excel_escapes(s: &str) -> Cow<'_, str> {
    let untouched = !s.chars().any(needs_escape)
        && !s.match_indices("_x").any(|(i, _)| starts_with_escape(&s[i..]));
    if untouched {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len() + 14);
    for (i, c) in s.char_indices() {
        if c == '_' && starts_with_escape(&s[i..]) {
            out.push_str("_x005F_");
        } else if needs_escape(c) {
            // Only BMP code points fail the XML check
            let _ = write!(out, "_x{:04X}_", c as u32);
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

/// Decode Excel's `_xHHHH_` escape sequences in strings.
///
/// - `_x000d_` = CR
/// - `_x000a_` = LF
/// - `_x0009_` = Tab
/// - `_x005f_` = Underscore
pub(crate) fn decode_excel_escapes(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let mut rest = s;

    while let Some(pos) = rest.find("_x") {
        result.push_str(&rest[..pos]);
        let candidate = &rest[pos..];
        let decoded = Some(candidate)
            .filter(|c| starts_with_escape(c))
            .and_then(|c| u32::from_str_radix(&c[2..6], 16).ok())
            .and_then(char::from_u32);

        match decoded {
            Some(c) => {
                result.push(c);
                rest = &candidate[7..];
            }
            None => {
                result.push_str("_x");
                rest = &candidate[2..];
            }
        }
    }
    result.push_str(rest);
    result
}
