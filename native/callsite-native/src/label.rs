//! Label templates
//!
//! Labels passed to `gg.ns('…')` may reference call-site values with `$NS`,
//! `$FN`, `$FILE`, `$LINE` and `$COL`. Substitution is a single left-to-right
//! pass; substituted text is never re-scanned and unknown `$` sequences stay
//! literal.

/// Values available to a label template.
#[derive(Debug, Clone, Copy)]
pub struct LabelVars<'a> {
    pub namespace: &'a str,
    pub function: &'a str,
    pub file: &'a str,
    pub line: u32,
    pub col: u32,
}

// Longest names first so a shorter variable never shadows a longer one.
const VARIABLES: [&str; 5] = ["FILE", "LINE", "COL", "NS", "FN"];

pub fn substitute(label: &str, vars: &LabelVars<'_>) -> String {
    let mut out = String::with_capacity(label.len());
    let mut rest = label;

    while let Some(dollar) = rest.find('$') {
        out.push_str(&rest[..dollar]);
        let after = &rest[dollar + 1..];

        match VARIABLES.iter().find(|name| after.starts_with(*name)) {
            Some(&name) => {
                match name {
                    "NS" => out.push_str(vars.namespace),
                    "FN" => out.push_str(vars.function),
                    "FILE" => out.push_str(vars.file),
                    "LINE" => out.push_str(&vars.line.to_string()),
                    _ => out.push_str(&vars.col.to_string()),
                }
                rest = &after[name.len()..];
            }
            None => {
                out.push('$');
                rest = after;
            }
        }
    }

    out.push_str(rest);
    out
}

/// If `text` is exactly one quoted string literal (single, double, or a
/// backtick literal without interpolation), returns its decoded content.
pub fn parse_string_literal(text: &str) -> Option<String> {
    let trimmed = text.trim();
    let quote = trimmed.chars().next()?;
    if !matches!(quote, '"' | '\'' | '`') || trimmed.len() < 2 || !trimmed.ends_with(quote) {
        return None;
    }
    let inner = &trimmed[1..trimmed.len() - 1];
    if quote == '`' && inner.contains("${") {
        return None;
    }

    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c == quote {
            // An unescaped quote means this was more than one literal.
            return None;
        }
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            't' => out.push('\t'),
            'b' => out.push('\u{8}'),
            'f' => out.push('\u{c}'),
            'v' => out.push('\u{b}'),
            '0' => out.push('\0'),
            'x' => out.push(hex_escape(&mut chars, 2)?),
            'u' => out.push(unicode_escape(&mut chars)?),
            // Line continuations contribute nothing.
            '\r' => {
                if chars.clone().next() == Some('\n') {
                    chars.next();
                }
            }
            '\n' | '\u{2028}' | '\u{2029}' => {}
            other => out.push(other),
        }
    }
    Some(out)
}

fn hex_escape(chars: &mut std::str::Chars<'_>, digits: usize) -> Option<char> {
    let mut value = 0u32;
    for _ in 0..digits {
        value = value * 16 + chars.next()?.to_digit(16)?;
    }
    char::from_u32(value)
}

/// `\uHHHH` or `\u{H…}`. Lone surrogates have no `char` and are rejected.
fn unicode_escape(chars: &mut std::str::Chars<'_>) -> Option<char> {
    if chars.clone().next() != Some('{') {
        return hex_escape(chars, 4);
    }
    chars.next();
    let mut value = 0u32;
    let mut digits = 0;
    loop {
        match chars.next()? {
            '}' if digits > 0 => break,
            c => {
                value = value.checked_mul(16)? + c.to_digit(16)?;
                digits += 1;
            }
        }
    }
    char::from_u32(value)
}
