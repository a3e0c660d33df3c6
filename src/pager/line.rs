//! Per-row metadata for the pager: the growable line table.
//!
//! Each record describes one display row. A logical source line that needs
//! more than one row is followed by continuation records that point back at
//! it; continuation rows never carry classification of their own.

use ratatui::style::Style;
use serde::Serialize;

use crate::error::{PagerError, Result};
use crate::pager::classify::{self, ClassificationResult};
use crate::pager::quote::QuoteId;

/// Minimum number of records added each time the table grows.
pub const MIN_GROWTH: usize = 64;

/// What a logical line is, for coloring and navigation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Normal,
    /// Header field colored by a matching header rule.
    Header,
    /// Header field with no matching rule.
    HeaderDefault,
    Quoted,
    Signature,
    Attachment,
    MessageLog,
    #[default]
    Unclassified,
}

impl ContentType {
    /// Header and default-header lines both belong to the header block.
    pub fn is_header(self) -> bool {
        matches!(self, Self::Header | Self::HeaderDefault)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Header => "header",
            Self::HeaderDefault => "header_default",
            Self::Quoted => "quoted",
            Self::Signature => "signature",
            Self::Attachment => "attachment",
            Self::MessageLog => "message_log",
            Self::Unclassified => "unclassified",
        }
    }
}

/// A highlight-rule match: display-text positions `start..end` drawn in `style`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StyleRange {
    pub start: usize,
    pub end: usize,
    pub style: Style,
}

impl StyleRange {
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }
}

/// A search hit in display-text positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SearchRange {
    pub start: usize,
    pub end: usize,
}

impl SearchRange {
    pub fn contains(&self, pos: usize) -> bool {
        pos >= self.start && pos < self.end
    }
}

/// Link from a wrapped row back to the logical line it continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Continuation {
    /// Index of the logical (first) row of the line.
    pub parent: usize,
    /// Display-text position of the first character on this row.
    pub display_base: usize,
}

/// Metadata for one display row.
#[derive(Debug, Clone)]
pub struct LineRecord {
    /// Start of this row in the backing stream.
    pub offset: u64,
    pub content_type: ContentType,
    /// Style chosen by a header rule, or the level style in log mode.
    pub line_style: Option<Style>,
    /// Header line folded onto the previous field (leading whitespace).
    pub cont_header: bool,
    /// The line holds nothing but whitespace.
    pub blank: bool,
    pub continuation: Option<Continuation>,
    pub styled: Vec<StyleRange>,
    /// `None` until computed for the active search pattern.
    pub search: Option<Vec<SearchRange>>,
    pub quote: Option<QuoteId>,
}

impl LineRecord {
    pub fn new(offset: u64) -> Self {
        Self {
            offset,
            content_type: ContentType::Unclassified,
            line_style: None,
            cont_header: false,
            blank: false,
            continuation: None,
            styled: Vec::new(),
            search: None,
            quote: None,
        }
    }

    pub fn is_continuation(&self) -> bool {
        self.continuation.is_some()
    }

    /// Display-text position this row starts at within its logical line.
    pub fn display_base(&self) -> usize {
        self.continuation.map_or(0, |c| c.display_base)
    }

    /// Whether the active search pattern matched this line.
    pub fn has_search_hit(&self) -> bool {
        self.search.as_ref().is_some_and(|s| !s.is_empty())
    }
}

/// Content-based state of a logical line, kept across a reflow.
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub content_type: ContentType,
    pub line_style: Option<Style>,
    pub cont_header: bool,
    pub blank: bool,
    pub styled: Vec<StyleRange>,
    pub search: Option<Vec<SearchRange>>,
    pub quote: Option<QuoteId>,
}

/// The growable array of row records.
///
/// Row 0 always exists at offset 0. Laying out row `n` appends row `n + 1`
/// (either a continuation or the next logical line), so every row whose
/// offset is known is present in the table.
#[derive(Debug)]
pub struct LineTable {
    rows: Vec<LineRecord>,
    increment: usize,
}

impl LineTable {
    /// Create a table that grows by at least `increment` rows at a time.
    pub fn new(increment: usize) -> Self {
        let mut rows = Vec::with_capacity(increment.max(MIN_GROWTH));
        rows.push(LineRecord::new(0));
        Self {
            rows,
            increment: increment.max(MIN_GROWTH),
        }
    }

    /// Number of rows whose offset is known.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, n: usize) -> Option<&LineRecord> {
        self.rows.get(n)
    }

    pub fn get_mut(&mut self, n: usize) -> Option<&mut LineRecord> {
        self.rows.get_mut(n)
    }

    pub fn rows(&self) -> &[LineRecord] {
        &self.rows
    }

    /// Make room for row `n` and its successor, growing in whole increments.
    pub fn ensure_capacity(&mut self, n: usize) -> Result<()> {
        let needed = n + 2;
        if needed <= self.rows.capacity() {
            return Ok(());
        }
        let additional = (needed - self.rows.len()).max(self.increment);
        self.rows
            .try_reserve(additional)
            .map_err(|_| PagerError::AllocationExhausted {
                requested: self.rows.len() + additional,
            })?;
        tracing::trace!(capacity = self.rows.capacity(), "Line table grown");
        Ok(())
    }

    /// Index of the logical row that `n` belongs to.
    pub fn logical(&self, n: usize) -> usize {
        match self.rows.get(n).and_then(|r| r.continuation) {
            Some(c) => c.parent,
            None => n,
        }
    }

    /// The record whose classification applies to row `n`.
    pub fn logical_record(&self, n: usize) -> Option<&LineRecord> {
        self.rows.get(self.logical(n))
    }

    /// Content type of row `n`, taken from its logical line.
    pub fn content_type(&self, n: usize) -> ContentType {
        self.logical_record(n)
            .map_or(ContentType::Unclassified, |r| r.content_type)
    }

    /// The logical row immediately before logical row `n`.
    pub fn previous_logical(&self, n: usize) -> Option<usize> {
        n.checked_sub(1).map(|p| self.logical(p))
    }

    /// Record the row following `n` once its start is known.
    ///
    /// An existing successor is left untouched: offsets never change once set.
    pub fn push_successor(&mut self, n: usize, offset: u64, continuation: Option<Continuation>) {
        if n + 1 != self.rows.len() {
            return;
        }
        let mut record = LineRecord::new(offset);
        record.continuation = continuation;
        self.rows.push(record);
    }

    /// Drop every row except a fresh row 0. Used when the layout width changes.
    pub fn reset(&mut self) {
        self.rows.clear();
        self.rows.push(LineRecord::new(0));
    }

    /// Forget search ranges everywhere; they are recomputed lazily.
    pub fn clear_search(&mut self) {
        for row in &mut self.rows {
            row.search = None;
        }
    }

    /// Capture the content-based state of a classified logical row.
    pub fn snapshot(&self, n: usize) -> Option<Snapshot> {
        let row = self.rows.get(n)?;
        if row.is_continuation() || row.content_type == ContentType::Unclassified {
            return None;
        }
        Some(Snapshot {
            content_type: row.content_type,
            line_style: row.line_style,
            cont_header: row.cont_header,
            blank: row.blank,
            styled: row.styled.clone(),
            search: row.search.clone(),
            quote: row.quote,
        })
    }

    /// Restore state captured by [`LineTable::snapshot`] onto row `n`.
    pub fn restore(&mut self, n: usize, snapshot: Snapshot) {
        if let Some(row) = self.rows.get_mut(n) {
            row.content_type = snapshot.content_type;
            row.line_style = snapshot.line_style;
            row.cont_header = snapshot.cont_header;
            row.blank = snapshot.blank;
            row.styled = snapshot.styled;
            row.search = snapshot.search;
            row.quote = snapshot.quote;
        }
    }

    /// Store the classification of logical row `n`, including its effects
    /// on neighbouring rows. Returns `true` when rows that may already be on
    /// screen changed and the page must be drawn again.
    pub fn apply(&mut self, n: usize, result: ClassificationResult) -> bool {
        let Some(row) = self.rows.get_mut(n) else {
            return false;
        };
        row.content_type = result.content_type;
        row.line_style = result.line_style;
        row.cont_header = result.cont_header;
        row.blank = result.blank;
        row.styled = result.styled;
        if result.quote.is_some() {
            row.quote = result.quote;
        }

        let mut changed = false;
        if result.recolor_field {
            changed |= self.recolor_header_field(n);
        }
        if result.absorb_signature {
            changed |= self.absorb_signature(n);
        }
        changed
    }

    /// Give the earlier lines of a folded header field the type and style of row `n`.
    fn recolor_header_field(&mut self, n: usize) -> bool {
        let (content_type, style) = match self.rows.get(n) {
            Some(r) => (r.content_type, r.line_style),
            None => return false,
        };
        let mut changed = false;
        let mut cursor = self.previous_logical(n);
        while let Some(j) = cursor {
            let row = &mut self.rows[j];
            let folded = row.cont_header;
            if row.content_type != content_type || row.line_style != style {
                row.content_type = content_type;
                row.line_style = style;
                changed = true;
            }
            if !folded {
                // first line of the field
                break;
            }
            cursor = self.previous_logical(j);
        }
        changed
    }

    /// Pull already-classified lines after the delimiter at `n` into the signature.
    fn absorb_signature(&mut self, n: usize) -> bool {
        let mut changed = false;
        let mut i = n + 1;
        while i < self.rows.len() {
            if self.rows[i].is_continuation() {
                i += 1;
                continue;
            }
            let row = &self.rows[i];
            if !matches!(
                row.content_type,
                ContentType::Normal | ContentType::Quoted | ContentType::Header
            ) {
                break;
            }
            let run = classify::signature_run(self, i);
            if !classify::continues_signature(run, self.rows[i].blank) {
                break;
            }
            let row = &mut self.rows[i];
            row.content_type = ContentType::Signature;
            row.styled.clear();
            changed = true;
            i += 1;
        }
        changed
    }
}
