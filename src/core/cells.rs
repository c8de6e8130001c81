//! Cell boundary detection
//!
//! Classifies marker lines and computes the runnable ranges anchored at each
//! of them. The scan walks lines from the end backwards so that every
//! marker's exclusive upper bound is the previously seen marker.
//!
//! Marker grammar, matched on the left-trimmed line:
//!
//! | Prefix            | Marker       |
//! |-------------------|--------------|
//! | `# %%`, `# In[`   | cell         |
//! | `# %{`            | block start  |
//! | `# %}`            | block end    |

use serde::Serialize;

/// Classification of a single line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Marker {
    Cell,
    BlockStart,
    BlockEnd,
    None,
}

impl Marker {
    /// Classify a line. Earlier prefixes take priority.
    pub fn classify(line: &str) -> Self {
        let eff = line.trim_start();
        if eff.starts_with("# %%") || eff.starts_with("# In[") {
            Marker::Cell
        } else if eff.starts_with("# %{") {
            Marker::BlockStart
        } else if eff.starts_with("# %}") {
            Marker::BlockEnd
        } else {
            Marker::None
        }
    }
}

/// Exclusive upper bound of a line range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeEnd {
    Line(usize),
    EndOfDocument,
}

/// Half-open line interval `[since, before)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub since: usize,
    pub before: RangeEnd,
}

impl LineRange {
    pub const fn new(since: usize, before: RangeEnd) -> Self {
        Self { since, before }
    }

    pub const fn lines(since: usize, before: usize) -> Self {
        Self::new(since, RangeEnd::Line(before))
    }

    pub const fn to_end(since: usize) -> Self {
        Self::new(since, RangeEnd::EndOfDocument)
    }

    /// Concrete `(since, before)` against a document of `line_count` lines
    pub fn resolve(&self, line_count: usize) -> (usize, usize) {
        match self.before {
            RangeEnd::Line(before) => (self.since, before),
            RangeEnd::EndOfDocument => (self.since, line_count),
        }
    }
}

/// Run action offered at a marker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunAction {
    Above,
    Below,
    Cell,
    Block,
    Rest,
    All,
}

impl RunAction {
    pub fn label(&self) -> &'static str {
        match self {
            RunAction::Above => "Run Above",
            RunAction::Below => "Run Below",
            RunAction::Cell => "Run Cell",
            RunAction::Block => "Run Block",
            RunAction::Rest => "Run Rest",
            RunAction::All => "Run All",
        }
    }
}

/// A run action bound to a range and anchored at a line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Affordance {
    pub action: RunAction,
    pub range: LineRange,
    /// Line the action is attached to
    pub anchor: usize,
}

impl Affordance {
    fn new(action: RunAction, range: LineRange, anchor: usize) -> Self {
        Self {
            action,
            range,
            anchor,
        }
    }
}

/// Serialized form handed to editor front-ends.
///
/// `before` uses `-1` for "to end of document", the argument shape the send
/// command accepts.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LensRecord {
    pub title: &'static str,
    pub line: usize,
    pub since: usize,
    pub before: i64,
}

impl From<&Affordance> for LensRecord {
    fn from(aff: &Affordance) -> Self {
        Self {
            title: aff.action.label(),
            line: aff.anchor,
            since: aff.range.since,
            before: match aff.range.before {
                RangeEnd::Line(before) => before as i64,
                RangeEnd::EndOfDocument => -1,
            },
        }
    }
}

/// Scan lines for markers and produce affordances in scan order.
///
/// A document without markers yields nothing.
pub fn scan<S: AsRef<str>>(lines: &[S]) -> Vec<Affordance> {
    let mut out = Vec::new();
    let mut before_line = lines.len();
    // Boundary captured at the last block end seen; read by block starts
    let mut before_block = before_line;
    let mut cell_count = 0usize;

    for (idx, line) in lines.iter().enumerate().rev() {
        match Marker::classify(line.as_ref()) {
            Marker::Cell => {
                out.push(Affordance::new(
                    RunAction::Cell,
                    LineRange::lines(idx, before_line),
                    idx,
                ));
                push_surrounding(&mut out, idx);
                before_line = idx;
                cell_count += 1;
            }
            Marker::BlockStart => {
                out.push(Affordance::new(
                    RunAction::Block,
                    LineRange::lines(idx, before_block),
                    idx,
                ));
                push_surrounding(&mut out, idx);
                before_line = idx;
                cell_count += 1;
            }
            Marker::BlockEnd => {
                before_block = before_line;
                out.push(Affordance::new(
                    RunAction::Rest,
                    LineRange::to_end(before_block),
                    idx,
                ));
                before_line = idx;
                cell_count += 1;
            }
            Marker::None => {}
        }
    }

    if cell_count > 0 && before_line > 0 {
        out.push(Affordance::new(
            RunAction::Cell,
            LineRange::lines(0, before_line),
            0,
        ));
        out.push(Affordance::new(RunAction::All, LineRange::to_end(0), 0));
    }

    out
}

/// Above/Below for a marker, or All when the marker sits on the first line
fn push_surrounding(out: &mut Vec<Affordance>, idx: usize) {
    if idx > 0 {
        out.push(Affordance::new(RunAction::Above, LineRange::lines(0, idx), idx));
        out.push(Affordance::new(RunAction::Below, LineRange::to_end(idx), idx));
    } else {
        out.push(Affordance::new(RunAction::All, LineRange::to_end(0), 0));
    }
}
