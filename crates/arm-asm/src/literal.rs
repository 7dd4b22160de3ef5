//! Numeric and string literal parsing shared by operand and directive
//! handling (§6): decimal, `0x` hex, and `'c'` character literals, with the
//! escape set `\n \t \r \\ \0 \" \' \a \b \f \v` (unknown escapes preserved
//! literally).

fn unescape_char(c: char) -> u8 {
    match c {
        'n' => b'\n',
        't' => b'\t',
        'r' => b'\r',
        '\\' => b'\\',
        '0' => 0,
        '"' => b'"',
        '\'' => b'\'',
        'a' => 0x07,
        'b' => 0x08,
        'f' => 0x0c,
        'v' => 0x0b,
        other => other as u8,
    }
}

/// Parse a numeric literal: `123`, `-5`, `0x1A`, or `'c'`/`'\n'`.
pub fn parse_number(text: &str) -> Option<i64> {
    let text = text.trim();
    if let Some(inner) = text.strip_prefix('\'').and_then(|s| s.strip_suffix('\'')) {
        let mut chars = inner.chars();
        let value = match chars.next()? {
            '\\' => unescape_char(chars.next()?),
            c => c as u8,
        };
        return Some(value as i64);
    }
    let (negative, unsigned) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = if let Some(hex) = unsigned.strip_prefix("0x").or_else(|| unsigned.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else {
        unsigned.parse::<i64>().ok()?
    };
    Some(if negative { -magnitude } else { magnitude })
}

/// Decode the bytes of a `.ascii`/`.asciz`/`.string` argument: a quoted
/// string literal with the shared escape set. `add_nul` appends a
/// terminating zero byte for `.asciz`/`.string`.
pub fn parse_string_bytes(text: &str, add_nul: bool) -> Option<Vec<u8>> {
    let text = text.trim();
    let inner = text.strip_prefix('"').and_then(|s| s.strip_suffix('"'))?;
    let mut bytes = Vec::new();
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            bytes.push(unescape_char(chars.next()?));
        } else {
            let mut buf = [0u8; 4];
            bytes.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
        }
    }
    if add_nul {
        bytes.push(0);
    }
    Some(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decimal_and_hex_and_negative() {
        assert_eq!(parse_number("42"), Some(42));
        assert_eq!(parse_number("0x2A"), Some(42));
        assert_eq!(parse_number("-1"), Some(-1));
    }

    #[test]
    fn char_literal_with_escape() {
        assert_eq!(parse_number("'a'"), Some(b'a' as i64));
        assert_eq!(parse_number("'\\n'"), Some(b'\n' as i64));
    }

    #[test]
    fn string_literal_escapes_and_nul_termination() {
        let bytes = parse_string_bytes("\"hi\\n\"", true).unwrap();
        assert_eq!(bytes, vec![b'h', b'i', b'\n', 0]);
    }

    #[test]
    fn unknown_escape_is_preserved_literally() {
        let bytes = parse_string_bytes("\"\\q\"", false).unwrap();
        assert_eq!(bytes, vec![b'q']);
    }
}
