//! Summary extraction that never splits markup.
//!
//! The summary is the body as accumulated up to one of two points,
//! whichever comes first in document order:
//!
//! - just before the first element whose class list marks a notebook cell
//!   (`cell` or `code_cell`), so the summary stops ahead of the first code cell;
//! - the first end tag that closes every open element once the text seen so
//!   far holds more than `max_words` words.
//!
//! Once captured the summary never changes; scanning carries on to the end
//! so the full body is still produced. A short document without cells gets
//! no summary at all.

use tracing::debug;

use crate::markup::{extract_text, MarkupBuffer, MarkupObserver, StartTag, StructuralReader};

/// Class tokens that wrap one notebook input/output cell
pub const CELL_MARKERS: &[&str] = &["cell", "code_cell"];

/// Appended to every captured summary
pub const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Scan {
    pub body: String,
    pub summary: Option<String>,
}

/// Decides when to capture the summary while a [`StructuralReader`] rebuilds the body.
#[derive(Debug)]
pub struct SummaryTracker {
    max_words: usize,
    summary: Option<String>,
}

impl SummaryTracker {
    pub fn new(max_words: usize) -> Self {
        SummaryTracker {
            max_words,
            summary: None,
        }
    }

    pub fn summary(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    pub fn into_summary(self) -> Option<String> {
        self.summary
    }
}

impl MarkupObserver for SummaryTracker {
    fn start_tag(&mut self, tag: &StartTag, buffer: &MarkupBuffer) {
        if self.summary.is_some() {
            return;
        }
        if tag.classes().any(|class| CELL_MARKERS.contains(&class)) {
            debug!(tag = %tag.name, "summary cut before notebook cell");
            self.summary = Some(format!("{}{}{}", buffer.as_str(), buffer.closing_tags(), ELLIPSIS));
        }
    }

    fn end_tag(&mut self, _name: &str, buffer: &MarkupBuffer) {
        if self.summary.is_some() || !buffer.is_balanced() {
            return;
        }
        let words = extract_text(buffer.as_str()).split_whitespace().count();
        if words > self.max_words {
            debug!(words, max = self.max_words, "summary cut at word limit");
            self.summary = Some(format!("{}{}", buffer.as_str(), ELLIPSIS));
        }
    }
}

/// Rebuild the body of `html` (markup inside `<body>`) and capture its summary.
pub fn scan(html: &str, max_words: usize) -> Scan {
    let mut tracker = SummaryTracker::new(max_words);
    let body = StructuralReader::new().read(html, &mut tracker).into_string();
    Scan {
        body,
        summary: tracker.into_summary(),
    }
}
