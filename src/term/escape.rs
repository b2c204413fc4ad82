//! Quoting and escaping of atom and string text.
//!
//! Printable characters pass through unchanged, except the backslash and the
//! active quote character. Control characters use the named escapes where
//! Prolog has one and a fixed-width hexadecimal escape otherwise.

use std::fmt::Write;

/// Quote character for atoms.
pub const ATOM_QUOTE: char = '\'';

/// Quote character for strings.
pub const STRING_QUOTE: char = '"';

/// Wrap `text` in `quote`, escaping its contents.
///
/// # Example
///
/// ```
/// use swipl_engine::term::quote;
///
/// assert_eq!(quote("it's", '\''), r"'it\'s'");
/// assert_eq!(quote("a\nb", '"'), r#""a\nb""#);
/// ```
pub fn quote(text: &str, quote: char) -> String {
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        if c >= ' ' {
            if c == '\\' {
                out.push_str("\\\\");
            } else if c == quote {
                out.push('\\');
                out.push(c);
            } else {
                out.push(c);
            }
        } else {
            match c {
                '\n' => out.push_str("\\n"),
                '\r' => out.push_str("\\r"),
                '\t' => out.push_str("\\t"),
                '\u{8}' => out.push_str("\\b"),
                '\u{c}' => out.push_str("\\f"),
                other => push_code_escape(&mut out, other),
            }
        }
    }
    out.push(quote);
    out
}

/// Append a four digit hexadecimal escape for `c`, zero padded.
fn push_code_escape(out: &mut String, c: char) {
    // Writing into a String cannot fail.
    let _ = write!(out, "\\u{:04x}", c as u32);
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_plain_text_is_wrapped() {
        assert_eq!(quote("member", ATOM_QUOTE), "'member'");
        assert_eq!(quote("", ATOM_QUOTE), "''");
    }

    #[test]
    fn test_quote_and_backslash_are_escaped() {
        assert_eq!(quote("it's", ATOM_QUOTE), r"'it\'s'");
        assert_eq!(quote(r"a\b", ATOM_QUOTE), r"'a\\b'");
        // The other quote character is left alone.
        assert_eq!(quote("say \"hi\"", ATOM_QUOTE), "'say \"hi\"'");
        assert_eq!(quote("say \"hi\"", STRING_QUOTE), r#""say \"hi\"""#);
    }

    #[test]
    fn test_named_control_escapes() {
        assert_eq!(quote("a\nb\rc\td", ATOM_QUOTE), r"'a\nb\rc\td'");
        assert_eq!(quote("\u{8}\u{c}", ATOM_QUOTE), r"'\b\f'");
    }

    #[test]
    fn test_numeric_control_escapes() {
        assert_eq!(quote("\u{0}", ATOM_QUOTE), r"'\u0000'");
        assert_eq!(quote("\u{7}", ATOM_QUOTE), r"'\u0007'");
        assert_eq!(quote("\u{1b}", ATOM_QUOTE), r"'\u001b'");
        assert_eq!(quote("\u{1f}", ATOM_QUOTE), r"'\u001f'");
    }

    #[test]
    fn test_code_escape_width_tiers() {
        let cases = [
            (0x5, r"\u0005"),
            (0xAB, r"\u00ab"),
            (0x1AB, r"\u01ab"),
            (0x1ABC, r"\u1abc"),
        ];
        for (code, expected) in cases {
            let mut out = String::new();
            push_code_escape(&mut out, char::from_u32(code).unwrap());
            assert_eq!(out, expected);
        }
    }

    #[test]
    fn test_unicode_passes_through() {
        assert_eq!(quote("â™¥", ATOM_QUOTE), "'â™¥'");
        assert_eq!(quote("λ→∀", STRING_QUOTE), "\"λ→∀\"");
    }
}
