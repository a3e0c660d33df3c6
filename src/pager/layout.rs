//! Line breaking: how much of a line fits on one display row.
//!
//! A row is measured by walking its raw bytes as display units (one
//! character, tab, control or escape notation each). The same walker drives
//! [`crate::pager::render`], so the measured break and the drawn row always
//! agree.

use unicode_width::UnicodeWidthChar;

use crate::pager::escape::{sgr_len, sgr_params, AnsiAttr, Markers};

// ── Characters ──────────────────────────────────────────────────

/// Decode the UTF-8 character at `pos`. `None` for an invalid sequence.
pub fn decode_at(buf: &[u8], pos: usize) -> Option<(char, usize)> {
    let end = (pos + 4).min(buf.len());
    let chunk = buf.get(pos..end)?;
    let valid = match std::str::from_utf8(chunk) {
        Ok(s) => s,
        Err(e) => std::str::from_utf8(&chunk[..e.valid_up_to()]).ok()?,
    };
    valid.chars().next().map(|c| (c, c.len_utf8()))
}

/// Zero-width and display-corrupting code points (bidi controls, soft
/// hyphen, invisible operators) that are dropped from rendering.
pub fn is_filtered(c: char) -> bool {
    matches!(
        c,
        '\u{00AD}'
            | '\u{200B}'..='\u{200F}'
            | '\u{2028}'..='\u{202E}'
            | '\u{2060}'..='\u{2064}'
            | '\u{2066}'..='\u{2069}'
            | '\u{FEFF}'
    )
}

/// Characters a terminal can draw as themselves.
pub fn is_printable(c: char) -> bool {
    if c.is_control() {
        return false;
    }
    let cp = c as u32;
    let noncharacter = (0xFDD0..=0xFDEF).contains(&cp) || (cp & 0xFFFE) == 0xFFFE;
    !noncharacter
}

fn is_space(b: u8) -> bool {
    b.is_ascii_whitespace() || b == 0x0b
}

fn is_blank(b: u8) -> bool {
    b == b' ' || b == b'\t'
}

/// Effective wrap width for a window `cols` wide.
///
/// `wrap` of 0 uses the window width, a positive value a fixed width (capped
/// at the window), a negative value the window width minus that many columns.
pub fn wrap_columns(cols: usize, wrap: i32) -> usize {
    let magnitude = wrap.unsigned_abs() as usize;
    match wrap {
        0 => cols,
        w if w < 0 => {
            if cols > magnitude {
                cols - magnitude
            } else {
                cols
            }
        }
        _ => magnitude.min(cols),
    }
}

// ── Display units ───────────────────────────────────────────────

/// How one unit of input is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Glyph {
    /// Printable character and its column width.
    Text(char, usize),
    Tab,
    /// C0 control or DEL, shown as `^X`.
    Control(char),
    /// Invalid byte or non-printable Latin-1 code, shown as `\ooo`.
    Octal(u32),
    /// Anything else unprintable, shown as a single replacement glyph.
    Replacement,
    /// `\n` or the `\r` of `\r\n`.
    LineEnd,
}

/// Bold/underline produced by backspace overstrike.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Overstrike {
    pub bold: bool,
    pub underline: bool,
}

impl Overstrike {
    pub fn any(&self) -> bool {
        self.bold || self.underline
    }
}

/// One display unit and where it came from.
#[derive(Debug, Clone, Copy)]
pub struct Unit {
    pub raw_start: usize,
    pub raw_end: usize,
    /// Position of the unit in the display copy of the row.
    pub display_pos: usize,
    pub glyph: Glyph,
    pub overstrike: Overstrike,
    pub ansi: AnsiAttr,
}

impl Glyph {
    /// Column after drawing this glyph at `col`.
    pub fn advance(self, col: usize) -> usize {
        match self {
            Glyph::Text(_, w) => col + w,
            Glyph::Tab => (col & !7) + 8,
            Glyph::Control(_) => col + 2,
            Glyph::Octal(_) => col + 4,
            Glyph::Replacement => col + 1,
            Glyph::LineEnd => col,
        }
    }
}

fn glyph_for(c: char, next_byte: Option<u8>) -> Glyph {
    match c {
        '\n' => Glyph::LineEnd,
        '\r' if next_byte == Some(b'\n') => Glyph::LineEnd,
        '\t' => Glyph::Tab,
        '\u{00A0}' | '\u{202F}' => Glyph::Text(c, 1),
        c if is_printable(c) => Glyph::Text(c, c.width().unwrap_or(0)),
        c if (c as u32) < 0x20 || c == '\u{7f}' => Glyph::Control(c),
        c if (c as u32) < 0x100 => Glyph::Octal(c as u32),
        _ => Glyph::Replacement,
    }
}

/// Walks a row's raw bytes as display units.
///
/// ANSI sequences and markers are consumed silently; SGR sequences update
/// the carried attributes only when `allow_ansi` is set.
pub struct Units<'a> {
    buf: &'a [u8],
    markers: &'a Markers,
    allow_ansi: bool,
    pos: usize,
    display_pos: usize,
    ansi: AnsiAttr,
}

impl<'a> Units<'a> {
    pub fn new(buf: &'a [u8], markers: &'a Markers, allow_ansi: bool) -> Self {
        Self {
            buf,
            markers,
            allow_ansi,
            pos: 0,
            display_pos: 0,
            ansi: AnsiAttr::default(),
        }
    }

    /// Display position reached so far.
    pub fn display_pos(&self) -> usize {
        self.display_pos
    }

    fn skip_escapes(&mut self) {
        loop {
            if let Some(len) = sgr_len(self.buf, self.pos) {
                if self.allow_ansi {
                    self.ansi.apply(sgr_params(self.buf, self.pos, len));
                }
                self.pos += len;
            } else if let Some(len) = self.markers.marker_len_at(self.buf, self.pos) {
                self.pos += len;
            } else {
                return;
            }
        }
    }
}

impl Iterator for Units<'_> {
    type Item = Unit;

    fn next(&mut self) -> Option<Unit> {
        loop {
            self.skip_escapes();
            if self.pos >= self.buf.len() {
                return None;
            }
            let raw_start = self.pos;
            let display_pos = self.display_pos;

            let Some((first, first_len)) = decode_at(self.buf, self.pos) else {
                self.pos += 1;
                self.display_pos += 1;
                return Some(Unit {
                    raw_start,
                    raw_end: self.pos,
                    display_pos,
                    glyph: Glyph::Octal(u32::from(self.buf[raw_start])),
                    overstrike: Overstrike::default(),
                    ansi: self.ansi,
                });
            };
            if is_filtered(first) {
                tracing::trace!(codepoint = first as u32, "Filtered character");
                self.pos += first_len;
                self.display_pos += first_len;
                continue;
            }

            let mut c = first;
            let mut len = first_len;
            let mut at = self.pos;
            let mut overstrike = Overstrike::default();
            if is_printable(c) {
                while self.buf.get(at + len) == Some(&0x08) {
                    let Some((c1, len1)) = decode_at(self.buf, at + len + 1) else {
                        break;
                    };
                    if !is_printable(c1) {
                        break;
                    }
                    if c == c1 {
                        if c == '_' && overstrike.underline {
                            overstrike.underline = true;
                        } else {
                            overstrike.bold = true;
                        }
                    } else if c == '_' || c1 == '_' {
                        overstrike.underline = true;
                        if c == '_' {
                            c = c1;
                        }
                    } else {
                        c = c1;
                    }
                    at += len + 1;
                    len = len1;
                }
            }

            self.pos = at + len;
            self.display_pos += len;
            return Some(Unit {
                raw_start,
                raw_end: self.pos,
                display_pos,
                glyph: glyph_for(c, self.buf.get(self.pos).copied()),
                overstrike,
                ansi: self.ansi,
            });
        }
    }
}

// ── Breaking ────────────────────────────────────────────────────

/// Inputs to [`compute_break`] besides the row text.
#[derive(Debug, Clone, Copy)]
pub struct LayoutParams {
    /// Columns available to text.
    pub wrap_cols: usize,
    /// Column the text starts at (1 when a continuation marker is drawn).
    pub start_col: usize,
    pub allow_ansi: bool,
    pub smart_wrap: bool,
    /// Header lines are never word-wrapped.
    pub is_header: bool,
    /// Drop blanks at the start of the next row.
    pub skip_leading: bool,
}

/// Where a row ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Break {
    /// Raw bytes drawn on this row.
    pub draw_len: usize,
    /// Raw bytes consumed, including trimmed blanks and the line ending.
    pub next: usize,
    /// Display-copy bytes consumed, the counterpart of `next`.
    pub display_next: usize,
    /// The row was cut inside a word.
    pub mid_word: bool,
    /// Columns used when the natural break was found.
    pub columns: usize,
}

/// Decide how much of `buf` (the rest of a logical line) fits on one row.
pub fn compute_break(buf: &[u8], markers: &Markers, params: &LayoutParams) -> Break {
    let mut units = Units::new(buf, markers, params.allow_ansi);
    let mut col = params.start_col;
    let mut space: Option<(usize, usize)> = None;
    let mut stop: Option<(usize, usize)> = None;
    let mut overflowed = false;
    let mut placed = false;

    for unit in units.by_ref() {
        if unit.glyph == Glyph::LineEnd {
            stop = Some((unit.raw_start, unit.display_pos));
            break;
        }
        if matches!(unit.glyph, Glyph::Text(' ', _) | Glyph::Tab) {
            space = Some((unit.raw_start, unit.display_pos));
        }
        let next_col = unit.glyph.advance(col);
        // a unit wider than the whole row is still placed so the row advances
        if next_col > params.wrap_cols && placed {
            stop = Some((unit.raw_start, unit.display_pos));
            overflowed = true;
            break;
        }
        col = next_col;
        placed = true;
    }
    let (cnt, display_cnt) = stop.unwrap_or((buf.len(), units.display_pos()));

    let mut draw_len = cnt;
    let mut next = cnt;
    let mut display_next = display_cnt;
    let cut_in_word = overflowed && buf.get(cnt).is_some_and(|&b| !is_space(b));
    let mut mid_word = cut_in_word;

    if params.smart_wrap {
        if cut_in_word && !params.is_header {
            if let Some((sp, display_sp)) = space {
                let mut end = sp;
                while end > 0 && matches!(buf[end - 1], b' ' | b'\t' | b'\r') {
                    end -= 1;
                }
                if end > 0 {
                    draw_len = end;
                    next = sp;
                    display_next = display_sp;
                    mid_word = false;
                }
            }
        }
        if params.skip_leading {
            while buf.get(next).copied().is_some_and(is_blank) {
                next += 1;
                display_next += 1;
            }
        }
    }
    if buf.get(next) == Some(&b'\r') {
        next += 1;
        display_next += 1;
    }
    if buf.get(next) == Some(&b'\n') {
        next += 1;
        display_next += 1;
    }

    Break {
        draw_len,
        next,
        display_next,
        mid_word,
        columns: col,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(wrap_cols: usize) -> LayoutParams {
        LayoutParams {
            wrap_cols,
            start_col: 0,
            allow_ansi: false,
            smart_wrap: true,
            is_header: false,
            skip_leading: true,
        }
    }

    fn markers() -> Markers {
        Markers::with_nonce(1)
    }

    /// Lay out a whole line, returning (drawn, consumed) slices per row.
    fn rows<'a>(buf: &'a [u8], p: &LayoutParams) -> Vec<(&'a [u8], &'a [u8])> {
        let m = markers();
        let mut out = Vec::new();
        let mut pos = 0;
        while pos < buf.len() {
            let brk = compute_break(&buf[pos..], &m, p);
            assert!(brk.next > 0, "layout must make progress");
            out.push((&buf[pos..pos + brk.draw_len], &buf[pos..pos + brk.next]));
            pos += brk.next;
        }
        out
    }

    #[test]
    fn test_short_line_fits() {
        let brk = compute_break(b"hello world\n", &markers(), &params(80));
        assert_eq!(brk.draw_len, 11);
        assert_eq!(brk.next, 12);
        assert_eq!(brk.display_next, 12);
        assert!(!brk.mid_word);
    }

    #[test]
    fn test_crlf_ends_line() {
        let brk = compute_break(b"hi\r\n", &markers(), &params(80));
        assert_eq!(brk.draw_len, 2);
        assert_eq!(brk.next, 4);
    }

    #[test]
    fn test_smart_wrap_breaks_at_last_space() {
        let brk = compute_break(b"aaaa bbbb cccc\n", &markers(), &params(12));
        assert_eq!(brk.draw_len, 9);
        assert_eq!(brk.next, 10);
        assert!(!brk.mid_word);
    }

    #[test]
    fn test_long_word_falls_back_to_hard_break() {
        let line = [b'x'; 200];
        let brk = compute_break(&line, &markers(), &params(80));
        assert_eq!(brk.draw_len, 80);
        assert_eq!(brk.next, 80);
        assert!(brk.mid_word);
    }

    #[test]
    fn test_hard_wrap_when_smart_wrap_off() {
        let mut p = params(12);
        p.smart_wrap = false;
        let brk = compute_break(b"aaaa bbbb cccc\n", &markers(), &p);
        assert_eq!(brk.draw_len, 12);
        assert!(brk.mid_word);
    }

    #[test]
    fn test_header_lines_are_not_word_wrapped() {
        let mut p = params(12);
        p.is_header = true;
        let brk = compute_break(b"Subject: aaaa bbbb\n", &markers(), &p);
        assert_eq!(brk.draw_len, 12);
    }

    #[test]
    fn test_round_trip_reconstructs_text() {
        let text = b"The quick brown fox   jumps over the lazy dog, again and again.\n";
        for width in [5, 7, 10, 16, 33, 80] {
            let laid = rows(text, &params(width));
            let consumed: Vec<u8> = laid.iter().flat_map(|(_, c)| c.iter().copied()).collect();
            assert_eq!(consumed, text.to_vec(), "width {width}");
            for (drawn, consumed) in &laid {
                assert!(consumed.starts_with(drawn));
                let dropped = &consumed[drawn.len()..];
                assert!(dropped.iter().all(|b| b.is_ascii_whitespace()));
            }
        }
    }

    #[test]
    fn test_tab_expands_to_next_stop() {
        assert_eq!(Glyph::Tab.advance(0), 8);
        assert_eq!(Glyph::Tab.advance(3), 8);
        assert_eq!(Glyph::Tab.advance(8), 16);
        let brk = compute_break(b"ab\tcd\n", &markers(), &params(80));
        assert_eq!(brk.columns, 10);
    }

    #[test]
    fn test_control_and_invalid_bytes() {
        let brk = compute_break(b"a\x01b\n", &markers(), &params(80));
        assert_eq!(brk.columns, 4);
        let brk = compute_break(b"a\xffb\n", &markers(), &params(80));
        assert_eq!(brk.columns, 6);
        assert_eq!(brk.display_next, 4);
    }

    #[test]
    fn test_zero_width_characters_are_filtered() {
        let text = "a\u{200B}b\u{FEFF}c\n";
        let brk = compute_break(text.as_bytes(), &markers(), &params(80));
        assert_eq!(brk.columns, 3);
        assert_eq!(brk.display_next, text.len());
    }

    #[test]
    fn test_wide_characters_use_two_columns() {
        let text = "日本語\n";
        let brk = compute_break(text.as_bytes(), &markers(), &params(4));
        assert_eq!(brk.columns, 4);
        assert_eq!(brk.draw_len, 6);
    }

    #[test]
    fn test_ansi_sequences_take_no_columns() {
        let brk = compute_break(b"\x1b[1;31mred\x1b[0m\n", &markers(), &params(80));
        assert_eq!(brk.columns, 3);
        assert_eq!(brk.display_next, 4);
    }

    #[test]
    fn test_markers_take_no_columns() {
        let m = markers();
        let mut line = m.attachment().to_vec();
        line.extend_from_slice(b"[-- att --]\n");
        let brk = compute_break(&line, &m, &params(80));
        assert_eq!(brk.columns, 11);
    }

    #[test]
    fn test_overstrike_collapses_to_one_unit() {
        let m = markers();
        let units: Vec<Unit> = Units::new(b"a\x08a_\x08b", &m, false).collect();
        assert_eq!(units.len(), 2);
        assert_eq!(units[0].glyph, Glyph::Text('a', 1));
        assert!(units[0].overstrike.bold);
        assert_eq!(units[1].glyph, Glyph::Text('b', 1));
        assert!(units[1].overstrike.underline);
        assert_eq!(units[1].display_pos, 1);
    }

    #[test]
    fn test_continuation_marker_column_counts() {
        let mut p = params(10);
        p.start_col = 1;
        p.smart_wrap = false;
        let brk = compute_break(b"0123456789abc", &markers(), &p);
        assert_eq!(brk.draw_len, 9);
    }

    #[test]
    fn test_oversized_unit_still_advances() {
        let brk = compute_break("日x".as_bytes(), &markers(), &params(1));
        assert_eq!(brk.next, 3);
    }

    #[test]
    fn test_wrap_columns() {
        assert_eq!(wrap_columns(80, 0), 80);
        assert_eq!(wrap_columns(80, 72), 72);
        assert_eq!(wrap_columns(80, 100), 80);
        assert_eq!(wrap_columns(80, -10), 70);
        assert_eq!(wrap_columns(5, -10), 5);
    }

    #[test]
    fn test_decode_at() {
        assert_eq!(decode_at("é".as_bytes(), 0), Some(('é', 2)));
        assert_eq!(decode_at(b"\xc3", 0), None);
        assert_eq!(decode_at(b"a\xff", 1), None);
        assert_eq!(decode_at(b"", 0), None);
    }
}
