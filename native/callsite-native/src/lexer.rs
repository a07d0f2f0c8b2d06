//! Lexical Skipper
//!
//! Advances past string literals, template literals and comments so that the
//! scanner and delimiter matcher never see call syntax hidden inside them.
//! Every function here is a pure function of `(source, pos)` over byte offsets.
//!
//! Unterminated literals and comments consume the rest of the buffer. Malformed
//! trailing input is tolerated, never reported.

/// Returns true for bytes that may appear inside a JS identifier.
/// Non-ASCII bytes count as identifier bytes so multi-byte names are not split.
pub fn is_ident_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
}

/// If `pos` starts a string, template literal or comment, returns the offset
/// just past it. Returns `pos` unchanged when nothing is skipped.
pub fn skip(source: &str, pos: usize) -> usize {
    let bytes = source.as_bytes();
    let Some(&c) = bytes.get(pos) else {
        return pos;
    };

    match c {
        b'/' => match bytes.get(pos + 1) {
            Some(b'/') => skip_line_comment(bytes, pos + 2),
            Some(b'*') => skip_block_comment(bytes, pos + 2),
            _ => pos,
        },
        b'"' | b'\'' => skip_quoted(bytes, pos + 1, c),
        b'`' => skip_template(bytes, pos + 1),
        _ => pos,
    }
}

fn skip_line_comment(bytes: &[u8], mut i: usize) -> usize {
    while i < bytes.len() && bytes[i] != b'\n' {
        i += 1;
    }
    i
}

fn skip_block_comment(bytes: &[u8], mut i: usize) -> usize {
    while i + 1 < bytes.len() {
        if bytes[i] == b'*' && bytes[i + 1] == b'/' {
            return i + 2;
        }
        i += 1;
    }
    bytes.len()
}

fn skip_quoted(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            c if c == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

fn skip_template(bytes: &[u8], mut i: usize) -> usize {
    let mut depth = 0usize;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => {
                i += 2;
                continue;
            }
            b'$' if bytes.get(i + 1) == Some(&b'{') => {
                depth += 1;
                i += 2;
                continue;
            }
            b'}' if depth > 0 => depth -= 1,
            b'`' if depth == 0 => return i + 1,
            _ => {}
        }
        i += 1;
    }
    bytes.len()
}

// ═══════════════════════════════════════════════════════════════════════════════
// LINE / COLUMN
// ═══════════════════════════════════════════════════════════════════════════════

/// 1-based line and column of `offset`. The column counts characters, not
/// bytes, since the preceding newline.
pub fn line_col(source: &str, offset: usize) -> (u32, u32) {
    let offset = offset.min(source.len());
    let before = &source.as_bytes()[..offset];
    let line = before.iter().filter(|&&b| b == b'\n').count() as u32 + 1;
    let line_start = before
        .iter()
        .rposition(|&b| b == b'\n')
        .map(|p| p + 1)
        .unwrap_or(0);
    let col = source
        .get(line_start..offset)
        .map(|s| s.chars().count())
        .unwrap_or(offset - line_start) as u32
        + 1;
    (line, col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("// note\nx", 0, 7)]
    #[case("// trailing", 0, 11)]
    #[case("/* a */x", 0, 7)]
    #[case("/* never closed", 0, 15)]
    #[case(r#""a\"b"x"#, 0, 6)]
    #[case(r"'it\\'x", 0, 6)]
    #[case("'open", 0, 5)]
    #[case("`a ${ {b: 1} } c`x", 0, 17)]
    #[case("`${`inner`}`x", 0, 12)]
    #[case("`unterminated ${", 0, 16)]
    #[case("`a \\` b`x", 0, 8)]
    #[case("`\\${gg(1)}`x", 0, 11)]
    fn skips_literals_and_comments(#[case] src: &str, #[case] pos: usize, #[case] end: usize) {
        assert_eq!(skip(src, pos), end);
    }

    #[test]
    fn leaves_code_untouched() {
        assert_eq!(skip("a / b", 2), 2);
        assert_eq!(skip("gg(x)", 0), 0);
        assert_eq!(skip("", 0), 0);
        assert_eq!(skip("x", 5), 5);
    }

    #[test]
    fn brace_in_template_body_does_not_close() {
        // A bare `}` at depth 0 is plain template text.
        assert_eq!(skip("`a } b`;", 0), 7);
    }

    #[test]
    fn test_line_col() {
        let src = "ab\ncd\n  gg()";
        assert_eq!(line_col(src, 0), (1, 1));
        assert_eq!(line_col(src, 4), (2, 2));
        assert_eq!(line_col(src, 8), (3, 3));
    }

    #[test]
    fn test_line_col_counts_chars() {
        let src = "é gg()";
        assert_eq!(line_col(src, 3), (1, 3));
    }

    #[test]
    fn test_ident_bytes() {
        assert!(is_ident_byte(b'a'));
        assert!(is_ident_byte(b'$'));
        assert!(is_ident_byte(b'_'));
        assert!(!is_ident_byte(b'.'));
        assert!(!is_ident_byte(b' '));
    }
}
