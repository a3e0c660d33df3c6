//! Line classifier: decides what each logical line is.
//!
//! Rules are tried in order and the first that applies wins:
//!
//! 1. header block (first line of a message, a line after a header line,
//!    or a line carrying the protected-header marker); a blank line ends
//!    the block
//! 2. raw line starting with an ANSI reset: normal
//! 3. attachment marker: attachment
//! 4. signature delimiter `-- `: signature, absorbing lines already
//!    classified below it
//! 5. within reach of a signature block: signature
//! 6. quote pattern without an overlapping smiley: quoted
//! 7. anything else: normal
//!
//! Classification reads the line table but never writes it; the effects on
//! earlier or later rows are returned in the [`ClassificationResult`] and
//! applied by [`crate::pager::line::LineTable::apply`].

use ratatui::style::Style;
use regex::bytes::Regex;

use crate::error::Result;
use crate::pager::escape::{Markers, ANSI_RESET};
use crate::pager::highlight::{compile_pattern, scan_chunks, ColorRule};
use crate::pager::line::{ContentType, LineRecord, LineTable, StyleRange};
use crate::pager::quote::{QuoteId, QuoteTree};

/// Lines a signature block extends over before only blank lines continue it.
pub const SIGNATURE_LINES: usize = 4;

/// Default pattern recognising quoted text.
pub const DEFAULT_QUOTE_REGEX: &str = r"^([ \t]*[|>:}#])+";

/// Default pattern for smileys that look like quote markers.
pub const DEFAULT_SMILEYS: &str = r"(>From )|(:[-^]?[\]\[)(><}{|/DP])";

/// Everything classification decided about one logical line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationResult {
    pub content_type: ContentType,
    pub line_style: Option<Style>,
    pub cont_header: bool,
    pub blank: bool,
    pub styled: Vec<StyleRange>,
    pub quote: Option<QuoteId>,
    /// Recolor the earlier lines of this folded header field.
    pub recolor_field: bool,
    /// Pull the already-classified lines below into the signature.
    pub absorb_signature: bool,
}

/// The line being classified and where it sits.
pub struct LineContext<'a> {
    pub table: &'a LineTable,
    /// Logical row index.
    pub index: usize,
    pub raw: &'a [u8],
    pub display: &'a [u8],
    pub markers: &'a Markers,
    /// The content opens with a header block.
    pub detect_headers: bool,
}

/// Compiled classification rules.
#[derive(Debug, Clone)]
pub struct Classifier {
    quote: Regex,
    smileys: Option<Regex>,
    header_rules: Vec<ColorRule>,
    body_rules: Vec<ColorRule>,
    attachment_rules: Vec<ColorRule>,
    header_color_partial: bool,
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(DEFAULT_QUOTE_REGEX, Some(DEFAULT_SMILEYS)).expect("default patterns compile")
    }
}

impl Classifier {
    /// Build a classifier from a quote pattern and optional smiley pattern.
    pub fn new(quote_regex: &str, smileys: Option<&str>) -> Result<Self> {
        Ok(Self {
            quote: compile_pattern(quote_regex)?,
            smileys: smileys.map(compile_pattern).transpose()?,
            header_rules: Vec::new(),
            body_rules: Vec::new(),
            attachment_rules: Vec::new(),
            header_color_partial: false,
        })
    }

    pub fn with_header_rules(mut self, rules: Vec<ColorRule>) -> Self {
        self.header_rules = rules;
        self
    }

    pub fn with_body_rules(mut self, rules: Vec<ColorRule>) -> Self {
        self.body_rules = rules;
        self
    }

    pub fn with_attachment_rules(mut self, rules: Vec<ColorRule>) -> Self {
        self.attachment_rules = rules;
        self
    }

    /// Match header rules against parts of header lines instead of
    /// coloring whole fields.
    pub fn with_header_color_partial(mut self, partial: bool) -> Self {
        self.header_color_partial = partial;
        self
    }

    /// Classify one logical line.
    ///
    /// With `classify_quotes`, quoted lines get a node in `quotes`.
    pub fn classify_line(
        &self,
        ctx: &LineContext<'_>,
        quotes: &mut QuoteTree,
        classify_quotes: bool,
    ) -> ClassificationResult {
        let display = ctx.display;
        let mut result = ClassificationResult {
            blank: is_blank_line(display),
            ..ClassificationResult::default()
        };
        let previous = ctx
            .table
            .previous_logical(ctx.index)
            .and_then(|p| ctx.table.get(p));

        let in_header = (ctx.detect_headers && ctx.index == 0)
            || previous.is_some_and(|p| p.content_type.is_header())
            || ctx.markers.is_protected_header(ctx.raw);

        if in_header {
            self.classify_header(ctx, previous, &mut result);
        } else if ctx.raw.starts_with(ANSI_RESET) {
            result.content_type = ContentType::Normal;
        } else if ctx.markers.is_attachment(ctx.raw) {
            result.content_type = ContentType::Attachment;
        } else if display == b"-- \n" || display == b"-- \r\n" {
            result.content_type = ContentType::Signature;
            result.absorb_signature = true;
        } else if continues_signature(signature_run(ctx.table, ctx.index), result.blank) {
            result.content_type = ContentType::Signature;
        } else if let Some(prefix) = self.quote_prefix(display) {
            result.content_type = ContentType::Quoted;
            if classify_quotes {
                result.quote = Some(quotes.classify(prefix));
            }
        } else {
            result.content_type = ContentType::Normal;
        }

        match result.content_type {
            ContentType::Normal | ContentType::Quoted => {
                result.styled = scan_chunks(&self.body_rules, display, true);
            }
            ContentType::HeaderDefault if self.header_color_partial => {
                result.styled = scan_chunks(&self.header_rules, display, true);
            }
            ContentType::Attachment => {
                result.styled = scan_chunks(&self.attachment_rules, display, false);
            }
            _ => {}
        }
        result
    }

    fn classify_header(
        &self,
        ctx: &LineContext<'_>,
        previous: Option<&LineRecord>,
        result: &mut ClassificationResult,
    ) {
        let display = ctx.display;
        if is_line_end(display) {
            result.content_type = ContentType::Normal;
            return;
        }

        let folded = ctx.index > 0 && matches!(display.first(), Some(b' ' | b'\t'));
        match previous {
            Some(prev) if folded => {
                result.content_type = prev.content_type;
                if !self.header_color_partial {
                    result.line_style = prev.line_style;
                    result.cont_header = true;
                }
            }
            _ => result.content_type = ContentType::HeaderDefault,
        }

        if self.header_color_partial {
            return;
        }
        if let Some(rule) = self
            .header_rules
            .iter()
            .find(|r| r.regex.is_match(display))
        {
            result.content_type = ContentType::Header;
            result.line_style = Some(rule.style);
            result.recolor_field = result.cont_header;
        }
    }

    /// The quoting prefix of `display`, if the line is quoted.
    ///
    /// When a smiley follows the quote match, the quote pattern is tried again
    /// on the text before the smiley, and a marker touching the smiley counts
    /// as part of it (`>:)` is not quoted).
    pub fn quote_prefix<'t>(&self, display: &'t [u8]) -> Option<&'t [u8]> {
        let quote = self.quote.find(display)?;
        let Some(smiley) = self.smileys.as_ref().and_then(|s| s.find(display)) else {
            return Some(&display[quote.range()]);
        };
        if smiley.start() == 0 {
            return None;
        }
        let before = &display[..smiley.start()];
        self.quote
            .find(before)
            .filter(|m| m.end() < smiley.start())
            .map(|m| &display[m.range()])
    }
}

/// Number of consecutive signature lines directly above logical row `n`.
///
/// Counting stops once the run is longer than [`SIGNATURE_LINES`].
pub fn signature_run(table: &LineTable, n: usize) -> usize {
    let mut count = 0;
    let mut cursor = table.previous_logical(n);
    while let Some(j) = cursor {
        if count > SIGNATURE_LINES || table.content_type(j) != ContentType::Signature {
            break;
        }
        count += 1;
        cursor = table.previous_logical(j);
    }
    count
}

/// Whether a line with `run` signature lines above it belongs to the block.
///
/// Within the first [`SIGNATURE_LINES`] lines a blank line ends the block;
/// past them only blank lines continue it.
pub fn continues_signature(run: usize, blank: bool) -> bool {
    match run {
        0 => false,
        r if r <= SIGNATURE_LINES => !blank,
        _ => blank,
    }
}

fn is_line_end(display: &[u8]) -> bool {
    display.is_empty() || display == b"\n" || display == b"\r\n"
}

/// The line holds only whitespace.
pub fn is_blank_line(display: &[u8]) -> bool {
    display.iter().all(|b| b.is_ascii_whitespace() || *b == 0x0b)
}
