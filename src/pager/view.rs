//! The pager view controller.
//!
//! Owns the line table, the quote tree, the scroll position and the search
//! state. Rows are laid out lazily: row `n + 1` becomes known only once row
//! `n` has been measured, so scrolling forward extends the table and
//! scrolling back reuses it.

use std::collections::HashMap;
use std::io::{Read, Seek};

use serde::Serialize;
use tracing::{debug, info, trace, warn};

use crate::error::Result;
use crate::pager::classify::LineContext;
use crate::pager::command::{Command, CommandSource, ExitReason, PagerOutcome, Progress};
use crate::pager::escape::Markers;
use crate::pager::layout::{compute_break, wrap_columns, LayoutParams};
use crate::pager::line::{Continuation, ContentType, LineTable, SearchRange, Snapshot, MIN_GROWTH};
use crate::pager::quote::QuoteTree;
use crate::pager::render::{render_row, RowStyle};
use crate::pager::scanner::LineScanner;
use crate::pager::search::{Direction, SearchState};
use crate::pager::surface::{MemorySurface, Surface};
use crate::pager::{PagerFlags, PagerSettings};

/// Byte of a message-log line holding the level letter.
const LOG_LEVEL_BYTE: usize = 11;

/// Where the controller is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerState {
    /// Nothing drawn yet.
    Initial,
    /// Building the line table ahead of the screen.
    Scanning,
    /// Waiting for the next command.
    Steady,
    /// Computing search hits over the whole stream.
    Searching,
    /// The width changed; the table is rebuilt on the next redraw.
    Resizing,
    /// The session has ended.
    Terminal,
}

/// A transient message shown in the status line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub error: bool,
}

/// Parts of the screen that need drawing.
#[derive(Debug, Clone, Copy, Default)]
struct Redraw {
    full: bool,
    flow: bool,
    body: bool,
    status: bool,
}

/// What [`PagerView::display_line`] should do with a row.
#[derive(Debug, Clone, Copy)]
struct LineMode {
    show: bool,
    types: bool,
    color: bool,
    hide: bool,
    search: bool,
}

impl LineMode {
    fn scan(types: bool, search: bool) -> Self {
        Self {
            show: false,
            types,
            color: false,
            hide: false,
            search,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LineOutcome {
    /// The row starts at or past the end of the stream.
    Eof,
    /// The row was measured but takes no screen row.
    Scanned,
    /// The row took a screen row.
    Displayed,
}

/// One laid-out row, as reported by [`PagerView::dump`].
#[derive(Debug, Clone, Serialize)]
pub struct RowDump {
    pub index: usize,
    pub offset: u64,
    pub content_type: ContentType,
    pub continuation: bool,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quote_depth: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub styled: Vec<(usize, usize)>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search: Vec<SearchRange>,
}

/// A pager session over one stream.
pub struct PagerView<R> {
    scanner: LineScanner<R>,
    table: LineTable,
    quotes: QuoteTree,
    settings: PagerSettings,
    flags: PagerFlags,
    search: SearchState,
    /// `(rows, cols)` of the whole surface, status line included.
    viewport: (usize, usize),
    top: usize,
    /// First row below the screen after the last redraw.
    cur: usize,
    old_top: usize,
    redraw: Redraw,
    hide_quoted: bool,
    force_redraw: bool,
    state: PagerState,
    status: Option<StatusMessage>,
    banner: String,
    /// Classification of logical lines from before the last resize, by offset.
    snapshots: HashMap<u64, Snapshot>,
}

impl<R: Read + Seek> PagerView<R> {
    /// Open a session over `stream`.
    pub fn new(
        stream: R,
        settings: PagerSettings,
        markers: Markers,
        flags: PagerFlags,
        banner: impl Into<String>,
    ) -> Result<Self> {
        let scanner = LineScanner::new(stream, markers, settings.options.line_cache_size)?;
        let quotes = QuoteTree::new(settings.theme.palette_size());
        let banner = banner.into();
        info!(banner = %banner, size = scanner.stream_len(), "Pager session opened");
        Ok(Self {
            scanner,
            table: LineTable::new(MIN_GROWTH),
            quotes,
            settings,
            flags,
            search: SearchState::new(),
            viewport: (0, 0),
            top: 0,
            cur: 0,
            old_top: 0,
            redraw: Redraw {
                full: true,
                body: true,
                status: true,
                ..Redraw::default()
            },
            hide_quoted: false,
            force_redraw: false,
            state: PagerState::Initial,
            status: None,
            banner,
            snapshots: HashMap::new(),
        })
    }

    // ── Accessors ───────────────────────────────────────────────

    pub fn state(&self) -> PagerState {
        self.state
    }

    /// Index of the first row on screen.
    pub fn top(&self) -> usize {
        self.top
    }

    pub fn table(&self) -> &LineTable {
        &self.table
    }

    pub fn quotes(&self) -> &QuoteTree {
        &self.quotes
    }

    pub fn search(&self) -> &SearchState {
        &self.search
    }

    pub fn status_message(&self) -> Option<&StatusMessage> {
        self.status.as_ref()
    }

    pub fn is_hiding_quoted(&self) -> bool {
        self.hide_quoted
    }

    pub fn banner(&self) -> &str {
        &self.banner
    }

    /// Byte offset of the top row.
    pub fn top_offset(&self) -> u64 {
        self.table.get(self.top).map_or(0, |r| r.offset)
    }

    /// Rows available to the message body.
    fn body_rows(&self) -> usize {
        self.viewport.0.saturating_sub(1)
    }

    fn stream_len(&self) -> u64 {
        self.scanner.stream_len()
    }

    /// Row `n` is known and starts before the end of the stream.
    fn is_real(&self, n: usize) -> bool {
        self.table
            .get(n)
            .is_some_and(|r| r.offset < self.stream_len())
    }

    /// Part of the message lies below the screen.
    fn more_below(&self) -> bool {
        self.is_real(self.cur)
    }

    fn is_quoted(&self, n: usize) -> bool {
        self.table.content_type(n) == ContentType::Quoted
    }

    fn is_continuation(&self, n: usize) -> bool {
        self.table.get(n).is_some_and(|r| r.is_continuation())
    }

    /// Rows whose successor is known.
    fn last_line(&self) -> usize {
        self.table.len().saturating_sub(1)
    }

    /// How far through the message the screen is.
    pub fn progress(&self) -> Progress {
        let len = self.stream_len();
        match self.table.get(self.cur) {
            Some(r) if r.offset < len => {
                Progress::Percent((r.offset.saturating_mul(100) / len.max(1)).min(100) as u8)
            }
            _ if self.top == 0 => Progress::All,
            _ => Progress::End,
        }
    }

    /// Request a full redraw of body and status line.
    pub fn invalidate(&mut self) {
        self.redraw.body = true;
        self.redraw.status = true;
    }

    fn message(&mut self, text: &str) {
        debug!(text, "Status message");
        self.status = Some(StatusMessage {
            text: text.to_string(),
            error: false,
        });
        self.redraw.status = true;
    }

    fn error(&mut self, text: &str) {
        debug!(text, "Status error");
        self.status = Some(StatusMessage {
            text: text.to_string(),
            error: true,
        });
        self.redraw.status = true;
    }

    // ── Line display ────────────────────────────────────────────

    /// Classify, lay out and optionally draw row `n`.
    ///
    /// `n` must already be in the table. Laying it out appends row `n + 1`.
    fn display_line(
        &mut self,
        n: usize,
        mut mode: LineMode,
        target: Option<(&mut dyn Surface, usize)>,
    ) -> Result<LineOutcome> {
        let Some(offset) = self.table.get(n).map(|r| r.offset) else {
            return Ok(LineOutcome::Eof);
        };
        if offset >= self.stream_len() {
            return Ok(LineOutcome::Eof);
        }
        self.table.ensure_capacity(n)?;
        let continuation = self.is_continuation(n);

        if self.flags.logs && !continuation && self.table.content_type(n) == ContentType::Unclassified
        {
            let Some(line) = self.scanner.read_line(offset)? else {
                return Ok(LineOutcome::Eof);
            };
            let theme = &self.settings.theme;
            let style = match line.raw.get(LOG_LEVEL_BYTE) {
                Some(b'M') => theme.message,
                Some(b'E') => theme.error,
                _ => theme.normal,
            };
            if let Some(row) = self.table.get_mut(n) {
                row.content_type = ContentType::MessageLog;
                row.line_style = Some(style);
            }
        }

        if mode.types {
            if !continuation && self.table.content_type(n) == ContentType::Unclassified {
                self.classify_row(n, offset, mode.color)?;
            }
            if mode.hide && self.is_quoted(n) {
                mode = LineMode::scan(false, false);
            }
        }

        if mode.color && !continuation {
            self.ensure_quote(n, offset)?;
        }

        if mode.search && !continuation && self.table.get(n).is_some_and(|r| r.search.is_none()) {
            let Some(line) = self.scanner.read_line(offset)? else {
                return Ok(LineOutcome::Eof);
            };
            let hits = self.search.matches(&line.display);
            if let Some(row) = self.table.get_mut(n) {
                row.search = Some(hits);
            }
        }

        let successor_known = n + 1 < self.table.len();
        if !mode.show && successor_known {
            return Ok(LineOutcome::Scanned);
        }
        if mode.color && self.force_redraw && successor_known {
            // the page is drawn again anyway
            return Ok(LineOutcome::Displayed);
        }

        let Some(line) = self.scanner.read_line(offset)? else {
            return Ok(LineOutcome::Eof);
        };
        let options = &self.settings.options;
        let markers = self.scanner.markers();
        let cols = self.viewport.1;
        let wrap_cols = if markers.is_attachment(&line.raw) {
            cols
        } else {
            wrap_columns(cols, options.wrap)
        };
        let start_col = usize::from(options.markers && continuation);
        let params = LayoutParams {
            wrap_cols,
            start_col,
            allow_ansi: options.allow_ansi,
            smart_wrap: options.smart_wrap,
            is_header: self.table.content_type(n).is_header(),
            skip_leading: options.skip_leading_whitespace,
        };
        let brk = compute_break(&line.raw, markers, &params);
        let display_base = self.table.get(n).map_or(0, |r| r.display_base());
        let next = (brk.next < line.len()).then(|| Continuation {
            parent: self.table.logical(n),
            display_base: display_base + brk.display_next,
        });
        self.table.push_successor(n, offset + brk.next as u64, next);
        trace!(row = n, offset, consumed = brk.next, mid_word = brk.mid_word, "Row laid out");

        if !mode.show {
            return Ok(LineOutcome::Scanned);
        }
        let Some((surface, screen_row)) = target else {
            return Ok(LineOutcome::Displayed);
        };

        let Some(record) = self.table.logical_record(n) else {
            return Ok(LineOutcome::Displayed);
        };
        let theme = &self.settings.theme;
        let row_style = RowStyle {
            theme,
            record,
            quotes: &self.quotes,
            show_color: mode.color,
            search_active: mode.search,
            display_base,
        };
        surface.clear_row(screen_row);
        if start_col == 1 {
            surface.draw_text(screen_row, 0, "+", theme.markers);
        }
        let (runs, end_col) = render_row(
            &line.raw,
            brk.draw_len,
            start_col,
            markers,
            options.allow_ansi,
            &row_style,
        );
        for run in &runs {
            surface.draw_text(screen_row, run.col, &run.text, run.style);
        }
        if end_col < cols {
            let fill = " ".repeat(cols - end_col);
            surface.draw_text(screen_row, end_col, &fill, row_style.default_style());
        }
        Ok(LineOutcome::Displayed)
    }

    /// Classify logical row `n`, or restore what it was before a resize.
    fn classify_row(&mut self, n: usize, offset: u64, classify_quotes: bool) -> Result<()> {
        if let Some(snapshot) = self.snapshots.remove(&offset) {
            self.table.restore(n, snapshot);
            return Ok(());
        }
        let Some(line) = self.scanner.read_line(offset)? else {
            return Ok(());
        };
        let ctx = LineContext {
            table: &self.table,
            index: n,
            raw: &line.raw,
            display: &line.display,
            markers: self.scanner.markers(),
            detect_headers: self.flags.headers,
        };
        let result =
            self.settings
                .classifier
                .classify_line(&ctx, &mut self.quotes, classify_quotes);
        trace!(row = n, content_type = result.content_type.as_str(), "Line classified");
        if self.table.apply(n, result) {
            debug!(row = n, "Earlier rows recolored");
            self.force_redraw = true;
        }
        if self.quotes.take_restructured() {
            debug!(row = n, "Quote levels restructured");
            self.force_redraw = true;
        }
        Ok(())
    }

    /// Give a quoted row its quote level when it was classified without one.
    /// Give a quoted row its quote class if classification skipped it.
    fn ensure_quote(&mut self, n: usize, offset: u64) -> Result<()> {
        let unresolved = self.is_quoted(n) && self.table.get(n).is_some_and(|r| r.quote.is_none());
        if unresolved {
            self.resolve_quote(n, offset)?;
        }
        Ok(())
    }

    fn resolve_quote(&mut self, n: usize, offset: u64) -> Result<()> {
        let Some(line) = self.scanner.read_line(offset)? else {
            return Ok(());
        };
        let Some(prefix) = self.settings.classifier.quote_prefix(&line.display) else {
            return Ok(());
        };
        let id = self.quotes.classify(prefix);
        if let Some(row) = self.table.get_mut(n) {
            row.quote = Some(id);
        }
        if self.quotes.take_restructured() {
            self.force_redraw = true;
        }
        Ok(())
    }

    fn display_mode(&self) -> LineMode {
        LineMode {
            show: true,
            types: self.flags.has_types(),
            color: self.flags.show_color,
            hide: self.hide_quoted,
            search: self.search.is_active(),
        }
    }

    /// Make sure row `n` exists and carries a content type. `None` past the end.
    fn typed_row(&mut self, n: usize) -> Result<Option<ContentType>> {
        let types = LineMode::scan(true, false);
        while self.table.len() <= n {
            let last = self.last_line();
            if self.display_line(last, types, None)? == LineOutcome::Eof {
                return Ok(None);
            }
        }
        if self.display_line(n, types, None)? == LineOutcome::Eof {
            return Ok(None);
        }
        Ok(Some(self.table.content_type(n)))
    }

    /// Lay out every row from `start` to the end of the stream.
    fn scan_to_end(&mut self, start: usize, mode: LineMode) -> Result<()> {
        let previous = self.state;
        self.state = PagerState::Scanning;
        let mut n = start;
        while self.display_line(n, mode, None)? == LineOutcome::Scanned {
            n += 1;
        }
        debug!(rows = self.table.len(), "Scanned to end of stream");
        self.state = previous;
        Ok(())
    }

    // ── Redraw ──────────────────────────────────────────────────

    /// Draw whatever is out of date onto `surface`.
    pub fn redraw(&mut self, surface: &mut dyn Surface) -> Result<()> {
        let size = surface.size();
        if self.state == PagerState::Initial {
            self.viewport = size;
            self.state = PagerState::Steady;
        } else if size != self.viewport {
            self.notify_resize(size.0, size.1);
        }

        if self.redraw.full {
            self.redraw.body = true;
            self.redraw.status = true;
        }
        if self.redraw.flow {
            self.reflow()?;
        }
        if self.redraw.body || self.top != self.old_top {
            self.draw_body(surface)?;
            self.redraw.status = true;
        }
        if self.redraw.status {
            self.draw_status(surface);
        }
        self.redraw = Redraw::default();
        Ok(())
    }

    fn draw_body(&mut self, surface: &mut dyn Surface) -> Result<()> {
        let body_rows = self.body_rows();
        let drawn = loop {
            let mut row = 0;
            self.cur = self.top;
            self.old_top = self.top;
            self.force_redraw = false;
            let mode = self.display_mode();
            while row < body_rows && self.is_real(self.cur) {
                match self.display_line(self.cur, mode, Some((&mut *surface, row)))? {
                    LineOutcome::Displayed => row += 1,
                    LineOutcome::Scanned => {}
                    LineOutcome::Eof => break,
                }
                self.cur += 1;
            }
            if !self.force_redraw {
                break row;
            }
            trace!("Redrawing page after recoloring");
        };

        let tilde = self.settings.theme.tilde;
        for row in drawn..body_rows {
            surface.clear_row(row);
            if self.settings.options.tilde {
                surface.draw_text(row, 0, "~", tilde);
            }
        }
        Ok(())
    }

    fn draw_status(&mut self, surface: &mut dyn Surface) {
        let (rows, cols) = self.viewport;
        let Some(row) = rows.checked_sub(1) else {
            return;
        };
        let theme = &self.settings.theme;
        let text = format!("{} ({})", self.banner, self.progress());
        surface.clear_row(row);
        surface.draw_text(row, 0, &" ".repeat(cols), theme.status);
        surface.draw_text(row, 0, &text, theme.status);
        if let Some(status) = &self.status {
            let style = if status.error {
                theme.error
            } else {
                theme.message
            };
            let col = unicode_width::UnicodeWidthStr::width(text.as_str()) + 2;
            surface.draw_text(row, col, &status.text, style);
        }
    }

    /// Rebuild the row table for a new width, keeping the top logical line.
    fn reflow(&mut self) -> Result<()> {
        let target = (0..=self.top.min(self.last_line()))
            .filter(|&i| !self.is_continuation(i))
            .count()
            .saturating_sub(1);
        for i in 0..self.table.len() {
            if let Some(snapshot) = self.table.snapshot(i) {
                let offset = self.table.rows()[i].offset;
                self.snapshots.insert(offset, snapshot);
            }
        }
        debug!(
            logical_top = target,
            saved = self.snapshots.len(),
            cols = self.viewport.1,
            "Reflowing for new width"
        );
        self.table.reset();
        self.scanner.clear_cache();
        self.top = 0;
        self.old_top = 0;

        let searching = self.search.is_active();
        let mode = LineMode::scan(self.flags.has_types(), searching);
        let mut logical = 0;
        let mut i = 0;
        while self.display_line(i, mode, None)? == LineOutcome::Scanned {
            if !self.is_continuation(i) {
                if logical == target {
                    self.top = i;
                    if !searching {
                        break;
                    }
                }
                logical += 1;
            }
            i += 1;
        }
        self.state = PagerState::Steady;
        Ok(())
    }

    /// The surface is now `rows` by `cols`.
    pub fn notify_resize(&mut self, rows: usize, cols: usize) {
        if (rows, cols) == self.viewport {
            return;
        }
        let width_changed = cols != self.viewport.1;
        info!(rows, cols, "Viewport resized");
        self.viewport = (rows, cols);
        self.redraw.full = true;
        if width_changed && self.state != PagerState::Initial {
            self.state = PagerState::Resizing;
            self.redraw.flow = true;
        }
    }

    // ── Navigation ──────────────────────────────────────────────

    /// Move up `lines` rows from `cur`, not counting hidden quoted rows.
    fn up_n_lines(&self, mut lines: usize, mut cur: usize) -> usize {
        while cur > 0 && lines > 0 {
            cur -= 1;
            if !self.hide_quoted || !self.is_quoted(cur) {
                lines -= 1;
            }
        }
        cur
    }

    /// Scroll so the row at or after byte `offset` is on top.
    pub fn restore_position(&mut self, offset: u64) -> Result<()> {
        let mode = LineMode::scan(self.flags.has_types(), false);
        let mut n = 0;
        while self.table.get(n).is_some_and(|r| r.offset < offset) {
            if self.display_line(n, mode, None)? == LineOutcome::Eof {
                break;
            }
            n += 1;
        }
        self.top = if self.is_real(n) {
            n
        } else {
            self.up_n_lines(self.body_rows(), n.min(self.last_line()))
        };
        debug!(offset, top = self.top, "Position restored");
        self.redraw.body = true;
        Ok(())
    }

    /// React to one command. `Some` ends the session.
    pub fn handle_command(&mut self, command: Command) -> Result<Option<ExitReason>> {
        self.status = None;
        trace!(?command, "Command");
        let body_rows = self.body_rows();
        let options = self.settings.options.clone();

        match command {
            Command::Exit => return Ok(Some(self.finish(ExitReason::Exit))),
            Command::Quit => return Ok(Some(self.finish(ExitReason::Quit))),
            Command::NextPage => {
                if self.more_below() {
                    self.top = self.up_n_lines(options.pager_context, self.cur);
                } else if options.pager_stop {
                    self.error("Bottom of message is shown");
                } else {
                    return Ok(Some(self.finish(ExitReason::NextEntry)));
                }
            }
            Command::PrevPage => {
                if self.top != 0 {
                    let lines = body_rows.saturating_sub(options.pager_context);
                    self.top = self.up_n_lines(lines, self.top);
                } else {
                    self.message("Top of message is shown");
                }
            }
            Command::NextLine => {
                if self.more_below() {
                    self.top += 1;
                    if self.hide_quoted {
                        while self.is_quoted(self.top) && self.top < self.last_line() {
                            self.top += 1;
                        }
                    }
                } else {
                    self.message("Bottom of message is shown");
                }
            }
            Command::PrevLine => {
                if self.top != 0 {
                    self.top = self.up_n_lines(1, self.top);
                } else {
                    self.error("Top of message is shown");
                }
            }
            Command::Top => {
                if self.top != 0 {
                    self.top = 0;
                } else {
                    self.error("Top of message is shown");
                }
            }
            Command::Bottom => {
                if self.more_below() {
                    self.scan_to_end(self.cur, LineMode::scan(self.flags.has_types(), false))?;
                    self.top = self.up_n_lines(body_rows, self.last_line());
                } else {
                    self.error("Bottom of message is shown");
                }
            }
            Command::HalfUp => {
                if self.top != 0 {
                    self.top = self.up_n_lines(body_rows / 2, self.top);
                } else {
                    self.error("Top of message is shown");
                }
            }
            Command::HalfDown => {
                if self.more_below() {
                    self.top = self.up_n_lines(body_rows / 2, self.cur);
                } else if options.pager_stop {
                    self.error("Bottom of message is shown");
                } else {
                    return Ok(Some(self.finish(ExitReason::NextEntry)));
                }
            }
            Command::Search { pattern, direction } => {
                if let Err(e) = self.submit_search(&pattern, direction) {
                    warn!(error = %e, "Search failed");
                    self.error(&e.to_string());
                }
            }
            Command::SearchNext => self.search_again(false),
            Command::SearchOpposite => self.search_again(true),
            Command::SearchToggle => {
                if self.search.is_compiled() {
                    self.search.toggle();
                    if self.search.is_active() {
                        self.fill_search_ranges()?;
                    }
                    self.redraw.body = true;
                }
            }
            Command::HideQuoted => {
                if self.flags.has_types() {
                    self.hide_quoted = !self.hide_quoted;
                    if self.hide_quoted && self.is_quoted(self.top) {
                        self.top = self.up_n_lines(1, self.top);
                    }
                    self.redraw.body = true;
                }
            }
            Command::SkipQuoted => {
                if self.flags.has_types() {
                    self.skip_quoted()?;
                }
            }
            Command::Redraw => self.redraw.full = true,
            Command::Resize { rows, cols } => self.notify_resize(rows, cols),
        }
        Ok(None)
    }

    fn finish(&mut self, reason: ExitReason) -> ExitReason {
        info!(?reason, offset = self.top_offset(), "Pager session closed");
        self.state = PagerState::Terminal;
        reason
    }

    /// Jump past the headers, or past the next block of quoted text.
    fn skip_quoted(&mut self) -> Result<()> {
        let offset = self.settings.options.skip_quoted_offset;
        let mut t = self.top;

        if self.table.content_type(t).is_header() {
            while let Some(ty) = self.typed_row(t)? {
                if !ty.is_header() {
                    break;
                }
                t += 1;
            }
            self.top = t;
            return Ok(());
        }

        loop {
            match self.typed_row(t + offset)? {
                None => {
                    self.error("No more quoted text");
                    return Ok(());
                }
                Some(ContentType::Quoted) => break,
                Some(_) => t += 1,
            }
        }
        loop {
            match self.typed_row(t + offset)? {
                None => {
                    self.error("No more unquoted text after quoted text");
                    return Ok(());
                }
                Some(ContentType::Quoted) => t += 1,
                Some(_) => break,
            }
        }
        self.top = t;
        Ok(())
    }

    // ── Search ──────────────────────────────────────────────────

    /// Row `i` is a logical line with a search hit that may be shown.
    fn is_hit(&self, i: usize) -> bool {
        self.table.get(i).is_some_and(|r| {
            !r.is_continuation()
                && r.has_search_hit()
                && (!self.hide_quoted || r.content_type != ContentType::Quoted)
        })
    }

    fn search_context(&self) -> usize {
        let ctx = self.settings.options.search_context;
        if ctx < self.body_rows() {
            ctx
        } else {
            0
        }
    }

    /// Compute search ranges for every row that has none.
    fn fill_search_ranges(&mut self) -> Result<()> {
        let previous = self.state;
        self.state = PagerState::Searching;
        self.scan_to_end(0, LineMode::scan(self.flags.has_types(), true))?;
        self.state = previous;
        Ok(())
    }

    /// Compile `pattern` and move to its first hit in `direction`.
    ///
    /// Returns the number of lines that match. On a compile failure the
    /// previous search stays in effect. Submitting the current pattern again
    /// acts like search-next (or search-opposite for the other direction).
    pub fn submit_search(&mut self, pattern: &str, direction: Direction) -> Result<usize> {
        if pattern.is_empty() {
            return Ok(0);
        }
        if self.search.is_compiled() && self.search.pattern() == Some(pattern) {
            self.search_again(direction != self.search.direction());
            return Ok(self.hit_count());
        }

        self.search.compile(pattern, direction)?;
        self.table.clear_search();
        for snapshot in self.snapshots.values_mut() {
            snapshot.search = None;
        }
        self.fill_search_ranges()?;

        let found = match direction {
            Direction::Forward => (self.top..self.last_line()).find(|&i| self.is_hit(i)),
            Direction::Backward => (0..=self.top).rev().find(|&i| self.is_hit(i)),
        };
        if let Some(i) = found {
            self.top = i;
        }
        let count = self.hit_count();
        if self.is_hit(self.top) {
            let ctx = self.search_context();
            if self.top > ctx {
                self.top -= ctx;
            }
        } else {
            self.search.set_active(false);
            self.error("Not found");
        }
        info!(pattern, matches = count, "Search submitted");
        self.redraw.body = true;
        Ok(count)
    }

    /// Logical lines with at least one hit.
    fn hit_count(&self) -> usize {
        self.table
            .rows()
            .iter()
            .filter(|r| !r.is_continuation() && r.has_search_hit())
            .count()
    }

    /// Move to the next hit in the search direction, or the opposite one.
    fn search_again(&mut self, opposite: bool) {
        if !self.search.is_compiled() {
            self.error("No search pattern");
            return;
        }
        let ctx = self.search_context();
        let direction = if opposite {
            self.search.direction().reversed()
        } else {
            self.search.direction()
        };
        let forward = direction == Direction::Forward;
        let last = self.last_line();
        let mut wrapped = false;
        loop {
            let found = if forward {
                let start = if wrapped { 0 } else { self.top + ctx + 1 };
                (start..last).find(|&i| self.is_hit(i))
            } else {
                let start = if wrapped {
                    Some(last)
                } else {
                    (self.top + ctx).checked_sub(1)
                };
                start.and_then(|s| (0..=s.min(last)).rev().find(|&i| self.is_hit(i)))
            };
            match found {
                Some(i) => {
                    self.top = i;
                    break;
                }
                None if wrapped || !self.settings.options.wrap_search => {
                    self.error("Not found");
                    break;
                }
                None => {
                    self.message(if forward {
                        "Search wrapped to top"
                    } else {
                        "Search wrapped to bottom"
                    });
                    wrapped = true;
                }
            }
        }
        if self.is_hit(self.top) {
            self.search.set_active(true);
            if self.top > ctx {
                self.top -= ctx;
            }
        }
        self.redraw.body = true;
    }

    // ── Sessions ────────────────────────────────────────────────

    /// Draw and react to commands until one ends the session or the
    /// source runs dry.
    pub fn run(
        &mut self,
        surface: &mut dyn Surface,
        commands: &mut dyn CommandSource,
    ) -> Result<PagerOutcome> {
        loop {
            self.redraw(surface)?;
            let reason = match commands.next_command() {
                Some(command) => self.handle_command(command)?,
                None => Some(self.finish(ExitReason::Exit)),
            };
            if let Some(reason) = reason {
                return Ok(PagerOutcome {
                    reason,
                    last_offset: self.top_offset(),
                });
            }
        }
    }

    /// Lay out every row at `width` columns without a screen.
    ///
    /// Classification is reported as it stands after the last row, so
    /// header fields recolored by a later line show their final type.
    pub fn dump(&mut self, width: usize) -> Result<Vec<RowDump>> {
        self.viewport = (2, width);
        self.state = PagerState::Scanning;
        let mut surface = MemorySurface::new(1, width);
        let mode = LineMode {
            hide: false,
            ..self.display_mode()
        };
        let mut texts = Vec::new();
        loop {
            let n = texts.len();
            surface.clear_row(0);
            let target: &mut dyn Surface = &mut surface;
            if self.display_line(n, mode, Some((target, 0)))? == LineOutcome::Eof {
                break;
            }
            // quote depth is reported even when drawing without color
            if mode.types && !self.is_continuation(n) {
                if let Some(offset) = self.table.get(n).map(|r| r.offset) {
                    self.ensure_quote(n, offset)?;
                }
            }
            texts.push(surface.row_text(0));
        }

        let rows = texts
            .into_iter()
            .enumerate()
            .filter_map(|(index, text)| {
                let row = self.table.get(index)?;
                let logical = self.table.logical_record(index)?;
                let first = !row.is_continuation();
                Some(RowDump {
                    index,
                    offset: row.offset,
                    content_type: logical.content_type,
                    continuation: !first,
                    text,
                    quote_depth: logical.quote.map(|q| self.quotes.depth_index(q)),
                    styled: if first {
                        logical.styled.iter().map(|r| (r.start, r.end)).collect()
                    } else {
                        Vec::new()
                    },
                    search: if first {
                        logical.search.clone().unwrap_or_default()
                    } else {
                        Vec::new()
                    },
                })
            })
            .collect();
        self.state = PagerState::Steady;
        Ok(rows)
    }
}

/// Page `stream` on `surface` until `commands` ends the session.
pub fn run_pager<R: Read + Seek>(
    stream: R,
    settings: PagerSettings,
    flags: PagerFlags,
    surface: &mut dyn Surface,
    commands: &mut dyn CommandSource,
) -> Result<PagerOutcome> {
    let mut view = PagerView::new(stream, settings, Markers::generate(), flags, "")?;
    view.run(surface, commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn view(text: &str) -> PagerView<Cursor<Vec<u8>>> {
        PagerView::new(
            Cursor::new(text.as_bytes().to_vec()),
            PagerSettings::default(),
            Markers::with_nonce(5),
            PagerFlags::message(),
            "test",
        )
        .expect("view")
    }

    fn numbered(n: usize) -> String {
        (1..=n).map(|i| format!("line {i}\n")).collect()
    }

    #[test]
    fn test_first_redraw_fills_body() {
        let mut v = view("From: a@b\n\nhello\nworld\n");
        let mut s = MemorySurface::new(6, 20);
        v.redraw(&mut s).expect("redraw");
        assert_eq!(s.row_text(0), "From: a@b");
        assert_eq!(s.row_text(2), "hello");
        assert_eq!(s.row_text(3), "world");
        assert_eq!(s.row_text(4), "");
        assert!(s.row_text(5).starts_with("test (all)"));
        assert_eq!(v.state(), PagerState::Steady);
    }

    #[test]
    fn test_tilde_rows() {
        let mut settings = PagerSettings::default();
        settings.options.tilde = true;
        let mut v = PagerView::new(
            Cursor::new(b"\nshort\n".to_vec()),
            settings,
            Markers::with_nonce(5),
            PagerFlags::message(),
            "t",
        )
        .expect("view");
        let mut s = MemorySurface::new(5, 10);
        v.redraw(&mut s).expect("redraw");
        assert_eq!(s.row_text(2), "~");
        assert_eq!(s.row_text(3), "~");
    }

    #[test]
    fn test_long_line_wraps_with_marker() {
        let mut v = view("\nalpha beta gamma delta\n");
        let mut s = MemorySurface::new(5, 12);
        v.redraw(&mut s).expect("redraw");
        assert_eq!(s.row_text(1), "alpha beta");
        assert_eq!(s.row_text(2), "+gamma delta");
        assert!(v.table().get(2).is_some_and(|r| r.is_continuation()));
    }

    #[test]
    fn test_paging_and_bounds() {
        let mut v = view(&format!("\n{}", numbered(20)));
        let mut s = MemorySurface::new(6, 20);
        v.redraw(&mut s).expect("redraw");
        assert_eq!(v.handle_command(Command::PrevLine).expect("cmd"), None);
        assert_eq!(
            v.status_message().map(|m| m.text.as_str()),
            Some("Top of message is shown")
        );
        v.handle_command(Command::NextPage).expect("cmd");
        v.redraw(&mut s).expect("redraw");
        assert_eq!(v.top(), 5);
        assert_eq!(s.row_text(0), "line 5");
        v.handle_command(Command::PrevPage).expect("cmd");
        assert_eq!(v.top(), 0);
    }

    #[test]
    fn test_next_page_at_end_moves_on() {
        let mut v = view("\nonly\n");
        let mut s = MemorySurface::new(6, 20);
        v.redraw(&mut s).expect("redraw");
        let reason = v.handle_command(Command::NextPage).expect("cmd");
        assert_eq!(reason, Some(ExitReason::NextEntry));
        assert_eq!(v.state(), PagerState::Terminal);
    }

    #[test]
    fn test_pager_stop_keeps_last_page() {
        let mut settings = PagerSettings::default();
        settings.options.pager_stop = true;
        let mut v = PagerView::new(
            Cursor::new(b"\nonly\n".to_vec()),
            settings,
            Markers::with_nonce(5),
            PagerFlags::message(),
            "t",
        )
        .expect("view");
        let mut s = MemorySurface::new(6, 20);
        v.redraw(&mut s).expect("redraw");
        assert_eq!(v.handle_command(Command::NextPage).expect("cmd"), None);
        assert_eq!(
            v.status_message().map(|m| m.text.as_str()),
            Some("Bottom of message is shown")
        );
    }

    #[test]
    fn test_bottom_shows_last_page() {
        let mut v = view(&format!("\n{}", numbered(30)));
        let mut s = MemorySurface::new(6, 20);
        v.redraw(&mut s).expect("redraw");
        v.handle_command(Command::Bottom).expect("cmd");
        v.redraw(&mut s).expect("redraw");
        assert_eq!(s.row_text(4), "line 30");
        assert_eq!(v.progress(), Progress::End);
    }

    #[test]
    fn test_progress_percent() {
        let mut v = view(&numbered(100));
        let mut s = MemorySurface::new(11, 20);
        v.redraw(&mut s).expect("redraw");
        assert!(matches!(v.progress(), Progress::Percent(p) if p > 0 && p < 100));
    }

    #[test]
    fn test_search_moves_to_hit() {
        let mut v = view(&format!("\n{}needle here\n", numbered(30)));
        let mut s = MemorySurface::new(6, 20);
        v.redraw(&mut s).expect("redraw");
        let count = v.submit_search("needle", Direction::Forward).expect("search");
        assert_eq!(count, 1);
        v.redraw(&mut s).expect("redraw");
        assert_eq!(s.row_text(0), "needle here");
        assert_eq!(s.style_at(0, 0), Some(PagerSettings::default().theme.search));
    }

    #[test]
    fn test_search_not_found_and_bad_pattern() {
        let mut v = view("\nabc\n");
        let mut s = MemorySurface::new(6, 20);
        v.redraw(&mut s).expect("redraw");
        assert_eq!(v.submit_search("zzz", Direction::Forward).expect("search"), 0);
        assert_eq!(v.status_message().map(|m| m.text.as_str()), Some("Not found"));
        assert!(v.submit_search("(", Direction::Forward).is_err());
        assert_eq!(v.search().pattern(), Some("zzz"));
    }

    #[test]
    fn test_search_next_wraps() {
        let mut v = view(&format!("\nhit\n{}", numbered(20)));
        let mut s = MemorySurface::new(6, 20);
        v.redraw(&mut s).expect("redraw");
        v.submit_search("hit", Direction::Forward).expect("search");
        assert_eq!(v.top(), 1);
        v.handle_command(Command::SearchNext).expect("cmd");
        assert_eq!(v.top(), 1);
        assert_eq!(
            v.status_message().map(|m| m.text.as_str()),
            Some("Search wrapped to top")
        );
    }

    #[test]
    fn test_search_toggle_keeps_ranges() {
        let mut v = view("\nfind me\n");
        let mut s = MemorySurface::new(4, 20);
        v.redraw(&mut s).expect("redraw");
        v.submit_search("me", Direction::Forward).expect("search");
        let before = v.table().get(1).and_then(|r| r.search.clone());
        v.handle_command(Command::SearchToggle).expect("cmd");
        assert!(!v.search().is_active());
        v.handle_command(Command::SearchToggle).expect("cmd");
        assert!(v.search().is_active());
        assert_eq!(v.table().get(1).and_then(|r| r.search.clone()), before);
        assert!(before.is_some_and(|r| !r.is_empty()));
    }

    #[test]
    fn test_hide_quoted() {
        let mut v = view("\nsaid:\n> one\n> two\nreply\n");
        let mut s = MemorySurface::new(6, 20);
        v.redraw(&mut s).expect("redraw");
        v.handle_command(Command::HideQuoted).expect("cmd");
        v.redraw(&mut s).expect("redraw");
        assert_eq!(s.row_text(1), "said:");
        assert_eq!(s.row_text(2), "reply");
    }

    #[test]
    fn test_skip_quoted() {
        let mut v = view(&format!("From: x\n\n{}> quoted\n> more\nanswer\n", numbered(3)));
        let mut s = MemorySurface::new(4, 20);
        v.redraw(&mut s).expect("redraw");
        v.handle_command(Command::SkipQuoted).expect("cmd");
        assert_eq!(v.top(), 1);
        v.handle_command(Command::SkipQuoted).expect("cmd");
        assert_eq!(v.top(), 7);
        v.handle_command(Command::SkipQuoted).expect("cmd");
        assert_eq!(
            v.status_message().map(|m| m.text.as_str()),
            Some("No more quoted text")
        );
    }

    #[test]
    fn test_resize_keeps_logical_line() {
        let mut v = view(&format!("\n{}", numbered(30)));
        let mut s = MemorySurface::new(6, 20);
        v.redraw(&mut s).expect("redraw");
        v.handle_command(Command::NextPage).expect("cmd");
        v.redraw(&mut s).expect("redraw");
        let before = s.row_text(0);
        v.handle_command(Command::Resize { rows: 6, cols: 30 }).expect("cmd");
        assert_eq!(v.state(), PagerState::Resizing);
        let mut wide = MemorySurface::new(6, 30);
        v.redraw(&mut wide).expect("redraw");
        assert_eq!(v.state(), PagerState::Steady);
        assert_eq!(wide.row_text(0), before);
    }

    #[test]
    fn test_restore_position() {
        let text = format!("\n{}", numbered(30));
        let mut v = view(&text);
        let mut s = MemorySurface::new(6, 20);
        v.redraw(&mut s).expect("redraw");
        let offset = text.find("line 12").expect("present") as u64;
        v.restore_position(offset).expect("restore");
        v.redraw(&mut s).expect("redraw");
        assert_eq!(s.row_text(0), "line 12");
        assert_eq!(v.top_offset(), offset);
    }

    #[test]
    fn test_run_reports_offset() {
        let text = format!("\n{}", numbered(30));
        let mut v = view(&text);
        let mut s = MemorySurface::new(6, 20);
        let mut commands = vec![Command::NextLine, Command::NextLine, Command::Exit].into_iter();
        let outcome = v.run(&mut s, &mut commands).expect("run");
        assert_eq!(outcome.reason, ExitReason::Exit);
        assert_eq!(outcome.last_offset, 8);
    }

    #[test]
    fn test_log_mode_styles() {
        let text = "[10:00:00]<E> broke\n[10:00:01]<M> fine\n";
        let settings = PagerSettings::default();
        let theme = settings.theme.clone();
        let mut v = PagerView::new(
            Cursor::new(text.as_bytes().to_vec()),
            settings,
            Markers::with_nonce(5),
            PagerFlags::logs(),
            "log",
        )
        .expect("view");
        let mut s = MemorySurface::new(4, 30);
        v.redraw(&mut s).expect("redraw");
        assert_eq!(s.style_at(0, 0), Some(theme.error));
        assert_eq!(s.style_at(1, 0), Some(theme.message));
        assert_eq!(v.table().content_type(0), ContentType::MessageLog);
    }

    #[test]
    fn test_empty_stream() {
        let mut v = view("");
        let mut s = MemorySurface::new(3, 10);
        v.redraw(&mut s).expect("redraw");
        assert_eq!(s.row_text(0), "");
        assert_eq!(v.progress(), Progress::All);
        assert!(v.dump(10).expect("dump").is_empty());
    }

    #[test]
    fn test_dump_rows() {
        let mut v = view("Subject: hi\n\n> quoted text\n");
        let rows = v.dump(40).expect("dump");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].content_type, ContentType::HeaderDefault);
        assert_eq!(rows[2].content_type, ContentType::Quoted);
        assert_eq!(rows[2].quote_depth, Some(0));
        assert_eq!(rows[2].text, "> quoted text");
    }

    #[test]
    fn test_dump_without_color_reports_quote_depth() {
        let mut v = PagerView::new(
            Cursor::new(b"Subject: x\n\n> quoted\n> > deeper\n".to_vec()),
            PagerSettings::default(),
            Markers::with_nonce(5),
            PagerFlags::plain(),
            "test",
        )
        .expect("view");
        let rows = v.dump(40).expect("dump");
        assert_eq!(rows[2].content_type, ContentType::Quoted);
        assert_eq!(rows[2].quote_depth, Some(0));
        assert_eq!(rows[3].content_type, ContentType::Quoted);
        assert!(rows[3].quote_depth.is_some_and(|d| d > 0));
    }

    #[test]
    fn test_plain_text_has_no_header_block() {
        let mut v = PagerView::new(
            Cursor::new(b"Note: not a header\nsecond line\n".to_vec()),
            PagerSettings::default(),
            Markers::with_nonce(5),
            PagerFlags::plain().with_headers(false),
            "test",
        )
        .expect("view");
        let rows = v.dump(40).expect("dump");
        assert_eq!(rows[0].content_type, ContentType::Normal);
        assert_eq!(rows[1].content_type, ContentType::Normal);
    }
}
