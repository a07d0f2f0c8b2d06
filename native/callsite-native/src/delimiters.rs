//! Delimiter Matcher
//!
//! Finds the end of a balanced `( … )` span. `()[]{}` share one depth counter,
//! and literals/comments are skipped so delimiters inside them never count.

use crate::lexer;

/// Given the offset of an opening delimiter, returns the offset immediately
/// after the delimiter that closes it, or `None` if the input ends first.
pub fn match_paren(source: &str, open_pos: usize) -> Option<usize> {
    let bytes = source.as_bytes();
    let mut depth = 1usize;
    let mut i = open_pos + 1;

    while i < bytes.len() {
        let next = lexer::skip(source, i);
        if next != i {
            i = next;
            continue;
        }

        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i + 1);
                }
            }
            _ => {}
        }
        i += 1;
    }

    None
}

/// Splits an argument list at its first top-level comma. Commas nested in
/// delimiters, literals or comments do not count.
pub fn split_first_argument(args: &str) -> (&str, Option<&str>) {
    let bytes = args.as_bytes();
    let mut depth = 0usize;
    let mut i = 0;

    while i < bytes.len() {
        let next = lexer::skip(args, i);
        if next != i {
            i = next;
            continue;
        }

        match bytes[i] {
            b'(' | b'[' | b'{' => depth += 1,
            b')' | b']' | b'}' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => return (&args[..i], Some(&args[i + 1..])),
            _ => {}
        }
        i += 1;
    }

    (args, None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_parens() {
        assert_eq!(match_paren("gg()", 2), Some(4));
        assert_eq!(match_paren("gg(a, b);", 2), Some(8));
    }

    #[test]
    fn test_nested_shapes() {
        let src = "gg(fn(a, b), {x: [1,2,3]}) + 1";
        assert_eq!(match_paren(src, 2), Some(26));
        assert_eq!(&src[3..25], "fn(a, b), {x: [1,2,3]}");
    }

    #[test]
    fn test_delimiters_inside_literals_ignored() {
        let src = r#"gg(")", ')', `${")"}`, /* ) */ x) // )"#;
        let end = match_paren(src, 2).unwrap();
        assert_eq!(&src[end - 2..end], "x)");
    }

    #[test]
    fn test_line_comment_hides_close() {
        let src = "gg(a // )\n, b)";
        assert_eq!(match_paren(src, 2), Some(src.len()));
    }

    #[test]
    fn test_unterminated() {
        assert_eq!(match_paren("gg(a, (b)", 2), None);
        assert_eq!(match_paren("gg(\"a)", 2), None);
    }

    #[test]
    fn test_braces_as_opener() {
        assert_eq!(match_paren("{a ? {b} : c} rest", 0), Some(13));
    }

    #[test]
    fn test_split_first_argument() {
        assert_eq!(split_first_argument("'a', x"), ("'a'", Some(" x")));
        assert_eq!(split_first_argument("'a,b', f(1, 2)"), ("'a,b'", Some(" f(1, 2)")));
        assert_eq!(split_first_argument("{a: 1, b: 2}"), ("{a: 1, b: 2}", None));
        assert_eq!(split_first_argument("'only'"), ("'only'", None));
        assert_eq!(split_first_argument("'trailing',"), ("'trailing'", Some("")));
    }
}
