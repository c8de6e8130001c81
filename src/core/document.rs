//! Source documents
//!
//! An immutable, line-addressable view of one source file. Lines are split on
//! `\n` only, so text ending in a newline has a final empty line: `"a\nb\n"`
//! has three lines. Range arithmetic elsewhere relies on that convention.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use super::cells::LineRange;

/// Zero-based line/character position. `character` counts chars, not bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Position {
    pub line: usize,
    pub character: usize,
}

impl Position {
    pub const fn new(line: usize, character: usize) -> Self {
        Self { line, character }
    }
}

/// A selection between two positions (order-insensitive)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Selection {
    pub start: Position,
    pub end: Position,
}

impl Selection {
    pub fn new(a: Position, b: Position) -> Self {
        if b < a {
            Self { start: b, end: a }
        } else {
            Self { start: a, end: b }
        }
    }
}

/// A source excerpt ready for framing: resolved half-open line bounds plus
/// the exact text to transmit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Excerpt {
    pub since: usize,
    pub before: usize,
    pub text: String,
}

/// A loaded source document
#[derive(Debug, Clone)]
pub struct Document {
    name: String,
    text: String,
    /// Byte offset of the start of every line
    line_starts: Vec<usize>,
}

impl Document {
    /// Build a document from in-memory text
    pub fn from_text(name: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        let mut line_starts = vec![0];
        line_starts.extend(text.match_indices('\n').map(|(idx, _)| idx + 1));
        Self {
            name: name.into(),
            text,
            line_starts,
        }
    }

    /// Read a document from disk
    pub fn open(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read source file {}", path.display()))?;
        Ok(Self::from_text(path.display().to_string(), text))
    }

    /// Name used for display and framing
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }

    /// Text of one line, without its terminator
    pub fn line(&self, idx: usize) -> Option<&str> {
        let start = *self.line_starts.get(idx)?;
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|next| next - 1)
            .unwrap_or(self.text.len());
        let line = &self.text[start..end];
        Some(line.strip_suffix('\r').unwrap_or(line))
    }

    /// All lines, in order
    pub fn lines(&self) -> Vec<&str> {
        (0..self.line_count()).filter_map(|idx| self.line(idx)).collect()
    }

    /// Text from the start of line `since` up to the start of line `before`.
    /// A `before` at or past the last line runs to the end of the text.
    pub fn text_between(&self, since: usize, before: usize) -> &str {
        let start = self.offset_of_line(since);
        let end = self.offset_of_line(before);
        if start >= end {
            return "";
        }
        &self.text[start..end]
    }

    /// Exact text covered by a selection
    pub fn selected_text(&self, selection: &Selection) -> &str {
        let start = self.offset_of(selection.start);
        let end = self.offset_of(selection.end);
        &self.text[start..end]
    }

    /// Resolve what a send request covers.
    ///
    /// An explicit range wins. Without one, a non-empty selection is sent as
    /// is, extended to whole lines for numbering; otherwise the whole
    /// document is sent.
    pub fn excerpt(&self, range: Option<LineRange>, selection: Option<&Selection>) -> Excerpt {
        if let Some(range) = range {
            let (since, before) = range.resolve(self.line_count());
            return Excerpt {
                since,
                before,
                text: self.text_between(since, before).to_string(),
            };
        }

        match selection {
            Some(sel) if !self.selected_text(sel).is_empty() => {
                let before = if sel.end.character > 0 {
                    sel.end.line + 1
                } else {
                    sel.end.line
                };
                Excerpt {
                    since: sel.start.line,
                    before,
                    text: self.selected_text(sel).to_string(),
                }
            }
            _ => Excerpt {
                since: 0,
                before: self.line_count(),
                text: self.text.clone(),
            },
        }
    }

    fn offset_of_line(&self, line: usize) -> usize {
        self.line_starts
            .get(line)
            .copied()
            .unwrap_or(self.text.len())
    }

    fn offset_of(&self, pos: Position) -> usize {
        if pos.line >= self.line_count() {
            return self.text.len();
        }
        let start = self.line_starts[pos.line];
        let line = self.line(pos.line).unwrap_or("");
        let within = line
            .char_indices()
            .nth(pos.character)
            .map(|(idx, _)| idx)
            .unwrap_or(line.len());
        start + within
    }
}
