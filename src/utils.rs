use crate::error::{Result, TycoError};
use crate::source::SourceLocation;
use regex::{Captures, Regex};
use std::sync::LazyLock;

static BASIC_ESCAPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"\\\\|\\"|\\b|\\t|\\n|\\f|\\r"#).expect("static regex"));

static UNICODE_ESCAPE_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\u([0-9a-fA-F]{4})|\\U([0-9a-fA-F]{8})").expect("static regex"));

static CONTINUATION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\\[ \t]*\r?\n[ \t\r\n]*").expect("static regex"));

static TIME_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{2}:\d{2}:\d{2})(\.(\d+))?$").expect("static regex"));

static TZ_OFFSET_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([+-]\d{2}:\d{2})$").expect("static regex"));

/// Control characters forbidden inside single-line strings (TAB allowed).
pub fn is_illegal_str_char(ch: char) -> bool {
    (ch.is_ascii_control() && ch != '\t') || ch == '\u{7f}'
}

/// Control characters forbidden inside multiline strings (CR/LF/TAB allowed).
pub fn is_illegal_multiline_char(ch: char) -> bool {
    (ch.is_ascii_control() && ch != '\t' && ch != '\r' && ch != '\n') || ch == '\u{7f}'
}

/// Drops a trailing `#` comment and right-trims the remainder. Comment text
/// itself is checked for disallowed control characters.
pub fn strip_comments(line: &str, location: Option<&SourceLocation>) -> Result<String> {
    match line.find('#') {
        None => Ok(rstrip(line).to_string()),
        Some(idx) => {
            let comment = line[idx + 1..].trim_end_matches(['\n', '\r']);
            if let Some(bad) = comment.chars().find(|c| is_illegal_str_char(*c)) {
                return Err(TycoError::syntax(
                    format!("invalid characters in comment: {:?}", bad),
                    location.cloned(),
                ));
            }
            Ok(rstrip(&line[..idx]).to_string())
        }
    }
}

fn rstrip(content: &str) -> &str {
    content.trim_end_matches([' ', '\t', '\r', '\n'])
}

/// Decodes basic (`\n`, `\t`, ...) and unicode (`\uXXXX`, `\UXXXXXXXX`)
/// escapes, then removes backslash-newline continuation sequences together
/// with the surrounding whitespace. Applied to basic strings only, after
/// template substitution.
pub fn substitute_escape_sequences(input: &str) -> String {
    let basic = BASIC_ESCAPE_REGEX.replace_all(input, |caps: &Captures| {
        match caps.get(0).map(|m| m.as_str()).unwrap_or_default() {
            "\\\\" => "\\".to_string(),
            "\\\"" => "\"".to_string(),
            "\\b" => "\u{8}".to_string(),
            "\\t" => "\t".to_string(),
            "\\n" => "\n".to_string(),
            "\\f" => "\u{c}".to_string(),
            "\\r" => "\r".to_string(),
            other => other.to_string(),
        }
    });

    let unicode = UNICODE_ESCAPE_REGEX.replace_all(&basic, |caps: &Captures| {
        let hex = caps
            .get(1)
            .or_else(|| caps.get(2))
            .map(|m| m.as_str())
            .unwrap_or_default();
        match u32::from_str_radix(hex, 16).ok().and_then(char::from_u32) {
            Some(ch) => ch.to_string(),
            None => caps
                .get(0)
                .map(|m| m.as_str().to_string())
                .unwrap_or_default(),
        }
    });

    CONTINUATION_REGEX.replace_all(&unicode, "").into_owned()
}

/// Canonicalizes a `time` literal: fractional seconds padded/truncated to
/// exactly six digits, absent fraction dropped entirely.
pub fn normalize_time_literal(value: &str) -> String {
    let trimmed = value.trim();
    let Some(caps) = TIME_REGEX.captures(trimmed) else {
        return trimmed.to_string();
    };
    let base = &caps[1];
    match caps.get(3) {
        None => base.to_string(),
        Some(fraction) => format!("{}.{}", base, pad_fraction(fraction.as_str())),
    }
}

/// Canonicalizes a `datetime` literal: space separator becomes `T`, a `Z`
/// suffix becomes `+00:00`, and any fractional seconds are padded/truncated
/// to six digits.
pub fn normalize_datetime_literal(value: &str) -> String {
    let mut normalized = value.trim().to_string();
    if let Some(idx) = normalized.find(' ') {
        normalized.replace_range(idx..idx + 1, "T");
    }

    let mut tz = String::new();
    if let Some(stripped) = normalized.strip_suffix('Z') {
        tz = "+00:00".to_string();
        normalized = stripped.to_string();
    } else if let Some(caps) = TZ_OFFSET_REGEX.captures(&normalized) {
        tz = caps[1].to_string();
        normalized.truncate(normalized.len() - tz.len());
    }

    if let Some(dot) = normalized.rfind('.') {
        let fraction = &normalized[dot + 1..];
        if !fraction.is_empty() && fraction.chars().all(|c| c.is_ascii_digit()) {
            let padded = pad_fraction(fraction);
            normalized = format!("{}.{}", &normalized[..dot], padded);
        }
    }

    normalized + &tz
}

fn pad_fraction(fraction: &str) -> String {
    if fraction.len() >= 6 {
        fraction[..6].to_string()
    } else {
        format!("{:0<6}", fraction)
    }
}
