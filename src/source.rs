use std::fmt;
use std::sync::Arc;

/// Position of a piece of source text, used only for diagnostics.
///
/// Line and column are 1-based. `raw_line` is the original physical line
/// (without its trailing newline) so error reports can echo it back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLocation {
    pub file: Option<Arc<str>>,
    pub line: usize,
    pub column: usize,
    pub raw_line: Arc<str>,
}

impl SourceLocation {
    pub fn new(file: Option<Arc<str>>, line: usize, column: usize, raw_line: &str) -> Self {
        SourceLocation {
            file,
            line: line.max(1),
            column: column.max(1),
            raw_line: Arc::from(raw_line),
        }
    }

    /// Same line, shifted right by `columns`.
    pub fn advance(&self, columns: usize) -> Self {
        SourceLocation {
            file: self.file.clone(),
            line: self.line,
            column: self.column + columns,
            raw_line: self.raw_line.clone(),
        }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(file) = &self.file {
            write!(f, "{}:", file)?;
        }
        write!(f, "{}:{}", self.line, self.column)
    }
}

/// One (possibly partially consumed) physical line awaiting tokenization.
///
/// The text always ends in `\n` when freshly split; slicing keeps the
/// location's column in sync so diagnostics stay accurate after the lexer
/// has chewed off a prefix.
#[derive(Debug, Clone)]
pub struct SourceLine {
    pub text: String,
    pub location: SourceLocation,
}

impl SourceLine {
    pub fn new(text: String, location: SourceLocation) -> Self {
        SourceLine { text, location }
    }

    /// Remainder of the line starting at byte offset `start`.
    pub fn slice_from(&self, start: usize) -> SourceLine {
        let start = start.min(self.text.len());
        SourceLine {
            text: self.text[start..].to_string(),
            location: self.location.advance(start),
        }
    }

    /// Strips leading spaces and tabs, advancing the column to match.
    pub fn trim_leading(&self) -> SourceLine {
        let idx = self
            .text
            .find(|c| c != ' ' && c != '\t')
            .unwrap_or(self.text.len());
        if idx == 0 {
            self.clone()
        } else {
            self.slice_from(idx)
        }
    }
}

/// Splits raw source text into newline-terminated [`SourceLine`]s.
///
/// CRLF is normalized to LF. The final line always carries a trailing
/// newline even if the input did not, so the lexer's EOL delimiter logic
/// never has to special-case the end of input.
pub fn split_into_lines(content: &str, file: Option<Arc<str>>) -> Vec<SourceLine> {
    let normalized = content.replace("\r\n", "\n");
    let mut lines = Vec::new();
    let mut line_number = 1;
    for raw in normalized.split_inclusive('\n') {
        let stripped = raw.strip_suffix('\n').unwrap_or(raw);
        let text = if raw.ends_with('\n') {
            raw.to_string()
        } else {
            format!("{raw}\n")
        };
        let location = SourceLocation::new(file.clone(), line_number, 1, stripped);
        lines.push(SourceLine::new(text, location));
        line_number += 1;
    }
    if lines.is_empty() {
        lines.push(SourceLine::new(
            "\n".to_string(),
            SourceLocation::new(file, 1, 1, ""),
        ));
    }
    lines
}
