//! Drawing a laid-out row as styled runs.

use ratatui::style::{Modifier, Style};

use crate::pager::escape::{ansi_color, AnsiAttr, Markers};
use crate::pager::layout::{Glyph, Overstrike, Units};
use crate::pager::line::{ContentType, LineRecord};
use crate::pager::quote::QuoteTree;
use crate::theme::Theme;

/// Consecutive characters drawn in one style.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledRun {
    /// Column the run starts at.
    pub col: usize,
    pub text: String,
    pub style: Style,
}

/// Per-character style resolution for one row.
pub struct RowStyle<'a> {
    pub theme: &'a Theme,
    /// Record of the logical line the row belongs to.
    pub record: &'a LineRecord,
    pub quotes: &'a QuoteTree,
    pub show_color: bool,
    /// Search hits are highlighted.
    pub search_active: bool,
    /// Display position of the row's first character within its line.
    pub display_base: usize,
}

impl RowStyle<'_> {
    /// Style of the line before highlights, also used to fill the row.
    pub fn default_style(&self) -> Style {
        let record = self.record;
        match record.content_type {
            ContentType::MessageLog => record.line_style.unwrap_or(self.theme.normal),
            _ if !self.show_color => self.theme.normal,
            ContentType::Header => record.line_style.unwrap_or(self.theme.header),
            other => self.theme.style_for(other),
        }
    }

    /// Style of the character at display position `pos` of the row.
    pub fn resolve(&self, pos: usize, overstrike: Overstrike, ansi: &AnsiAttr) -> Style {
        let pos = self.display_base + pos;
        let record = self.record;
        let mut style = self.default_style();

        if self.show_color && record.content_type == ContentType::Quoted {
            if let Some(q) = record.quote {
                style = self.theme.quote_style(self.quotes.color_index_at(q, pos));
            }
        }
        if self.show_color {
            if let Some(range) = record.styled.iter().find(|r| r.contains(pos)) {
                style = range.style;
            }
        }
        let mut search = false;
        if self.search_active
            && record
                .search
                .as_ref()
                .is_some_and(|hits| hits.iter().any(|h| h.contains(pos)))
        {
            style = self.theme.search;
            search = true;
        }

        if !overstrike.any() && ansi.is_plain() {
            return style;
        }
        if ansi.has_color() {
            style = Style::default();
            if let Some(fg) = ansi.fg {
                style = style.fg(ansi_color(fg));
            }
            if let Some(bg) = ansi.bg {
                style = style.bg(ansi_color(bg));
            }
            if ansi.bold {
                style = style.add_modifier(Modifier::BOLD);
            }
        } else if overstrike.bold || ansi.bold {
            style = match self.theme.bold {
                Some(bold) if !search => bold,
                _ => toggle(style, Modifier::BOLD),
            };
        }
        if overstrike.underline || ansi.underline {
            style = match self.theme.underline {
                Some(underline) if !search => underline,
                _ => toggle(style, Modifier::UNDERLINED),
            };
        } else if ansi.reverse {
            style = toggle(style, Modifier::REVERSED);
        } else if ansi.blink {
            style = toggle(style, Modifier::SLOW_BLINK);
        }
        style
    }
}

fn toggle(style: Style, modifier: Modifier) -> Style {
    if style.add_modifier.contains(modifier) {
        style.remove_modifier(modifier)
    } else {
        style.add_modifier(modifier)
    }
}

fn push_run(runs: &mut Vec<StyledRun>, col: usize, text: &str, style: Style) {
    match runs.last_mut() {
        Some(last) if last.style == style => last.text.push_str(text),
        _ => runs.push(StyledRun {
            col,
            text: text.to_string(),
            style,
        }),
    }
}

/// Draw the first `draw_len` raw bytes of `buf` starting at column `start_col`.
///
/// Returns the runs and the column reached.
pub fn render_row(
    buf: &[u8],
    draw_len: usize,
    start_col: usize,
    markers: &Markers,
    allow_ansi: bool,
    row_style: &RowStyle<'_>,
) -> (Vec<StyledRun>, usize) {
    let mut runs = Vec::new();
    let mut col = start_col;
    let mut scratch = [0u8; 4];

    for unit in Units::new(buf, markers, allow_ansi) {
        if unit.raw_start >= draw_len || unit.glyph == Glyph::LineEnd {
            break;
        }
        let style = row_style.resolve(unit.display_pos, unit.overstrike, &unit.ansi);
        let next_col = unit.glyph.advance(col);
        match unit.glyph {
            Glyph::Text(c, _) => push_run(&mut runs, col, c.encode_utf8(&mut scratch), style),
            Glyph::Tab => push_run(&mut runs, col, &" ".repeat(next_col - col), style),
            Glyph::Control(c) => {
                let shown = char::from((b'@'.wrapping_add(c as u8)) & 0x7f);
                push_run(&mut runs, col, &format!("^{shown}"), style);
            }
            Glyph::Octal(v) => push_run(&mut runs, col, &format!("\\{v:03o}"), style),
            Glyph::Replacement => push_run(&mut runs, col, "?", style),
            Glyph::LineEnd => {}
        }
        col = next_col;
    }
    (runs, col)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pager::line::{SearchRange, StyleRange};
    use ratatui::style::Color;

    fn record(content_type: ContentType) -> LineRecord {
        let mut r = LineRecord::new(0);
        r.content_type = content_type;
        r
    }

    fn style<'a>(theme: &'a Theme, record: &'a LineRecord, quotes: &'a QuoteTree) -> RowStyle<'a> {
        RowStyle {
            theme,
            record,
            quotes,
            show_color: true,
            search_active: true,
            display_base: 0,
        }
    }

    fn text(runs: &[StyledRun]) -> String {
        runs.iter().map(|r| r.text.as_str()).collect()
    }

    #[test]
    fn test_plain_row_is_one_run() {
        let theme = Theme::dark();
        let quotes = QuoteTree::new(4);
        let rec = record(ContentType::Normal);
        let m = Markers::with_nonce(1);
        let (runs, col) = render_row(b"hello\n", 5, 0, &m, false, &style(&theme, &rec, &quotes));
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "hello");
        assert_eq!(runs[0].style, theme.normal);
        assert_eq!(col, 5);
    }

    #[test]
    fn test_escapes_render_visibly() {
        let theme = Theme::dark();
        let quotes = QuoteTree::new(4);
        let rec = record(ContentType::Normal);
        let m = Markers::with_nonce(1);
        let (runs, col) = render_row(b"a\x01\tb\xff\x7f", 6, 0, &m, false, &style(&theme, &rec, &quotes));
        assert_eq!(text(&runs), "a^A     b\\377^?");
        assert_eq!(col, 15);
    }

    #[test]
    fn test_search_overrides_styled_range() {
        let theme = Theme::dark();
        let quotes = QuoteTree::new(4);
        let red = Style::default().fg(Color::Red);
        let mut rec = record(ContentType::Normal);
        rec.styled = vec![StyleRange { start: 0, end: 4, style: red }];
        rec.search = Some(vec![SearchRange { start: 2, end: 3 }]);
        let rs = style(&theme, &rec, &quotes);
        assert_eq!(rs.resolve(0, Overstrike::default(), &AnsiAttr::default()), red);
        assert_eq!(rs.resolve(2, Overstrike::default(), &AnsiAttr::default()), theme.search);
        assert_eq!(rs.resolve(5, Overstrike::default(), &AnsiAttr::default()), theme.normal);
    }

    #[test]
    fn test_search_inactive_keeps_colors() {
        let theme = Theme::dark();
        let quotes = QuoteTree::new(4);
        let mut rec = record(ContentType::Normal);
        rec.search = Some(vec![SearchRange { start: 0, end: 3 }]);
        let mut rs = style(&theme, &rec, &quotes);
        rs.search_active = false;
        assert_eq!(rs.resolve(1, Overstrike::default(), &AnsiAttr::default()), theme.normal);
    }

    #[test]
    fn test_continuation_rows_offset_ranges() {
        let theme = Theme::dark();
        let quotes = QuoteTree::new(4);
        let mut rec = record(ContentType::Normal);
        rec.search = Some(vec![SearchRange { start: 10, end: 12 }]);
        let mut rs = style(&theme, &rec, &quotes);
        rs.display_base = 10;
        assert_eq!(rs.resolve(0, Overstrike::default(), &AnsiAttr::default()), theme.search);
    }

    #[test]
    fn test_quoted_prefix_takes_outer_color() {
        let theme = Theme::dark();
        let mut quotes = QuoteTree::new(4);
        let _outer = quotes.classify(b">");
        let inner = quotes.classify(b">>");
        let mut rec = record(ContentType::Quoted);
        rec.quote = Some(inner);
        let rs = style(&theme, &rec, &quotes);
        let none = Overstrike::default();
        let plain = AnsiAttr::default();
        assert_eq!(rs.resolve(0, none, &plain), theme.quote_style(0));
        assert_eq!(rs.resolve(1, none, &plain), theme.quote_style(1));
        assert_eq!(rs.resolve(4, none, &plain), theme.quote_style(1));
    }

    #[test]
    fn test_overstrike_bold_toggles_modifier() {
        let theme = Theme::dark();
        let quotes = QuoteTree::new(4);
        let rec = record(ContentType::Normal);
        let rs = style(&theme, &rec, &quotes);
        let bold = Overstrike {
            bold: true,
            underline: false,
        };
        let s = rs.resolve(0, bold, &AnsiAttr::default());
        assert!(s.add_modifier.contains(Modifier::BOLD));
    }

    #[test]
    fn test_theme_bold_replaces_style() {
        let special = Style::default().fg(Color::Magenta);
        let theme = Theme {
            bold: Some(special),
            ..Theme::dark()
        };
        let quotes = QuoteTree::new(4);
        let rec = record(ContentType::Normal);
        let rs = style(&theme, &rec, &quotes);
        let ansi = AnsiAttr {
            bold: true,
            ..AnsiAttr::default()
        };
        assert_eq!(rs.resolve(0, Overstrike::default(), &ansi), special);
    }

    #[test]
    fn test_ansi_color_overrides() {
        let theme = Theme::dark();
        let quotes = QuoteTree::new(4);
        let rec = record(ContentType::Normal);
        let m = Markers::with_nonce(1);
        let raw = b"\x1b[31mred\x1b[0m plain\n";
        let (runs, _) = render_row(raw, raw.len() - 1, 0, &m, true, &style(&theme, &rec, &quotes));
        assert_eq!(runs[0].text, "red");
        assert_eq!(runs[0].style.fg, Some(Color::Red));
        assert_eq!(runs[1].text, " plain");
        assert_eq!(runs[1].style, theme.normal);
    }

    #[test]
    fn test_ansi_ignored_when_not_allowed() {
        let theme = Theme::dark();
        let quotes = QuoteTree::new(4);
        let rec = record(ContentType::Normal);
        let m = Markers::with_nonce(1);
        let raw = b"\x1b[31mred\x1b[0m\n";
        let (runs, _) = render_row(raw, raw.len() - 1, 0, &m, false, &style(&theme, &rec, &quotes));
        assert_eq!(runs.len(), 1);
        assert_eq!(runs[0].text, "red");
    }

    #[test]
    fn test_log_lines_use_level_style() {
        let theme = Theme::dark();
        let quotes = QuoteTree::new(4);
        let mut rec = record(ContentType::MessageLog);
        rec.line_style = Some(theme.error);
        let mut rs = style(&theme, &rec, &quotes);
        rs.show_color = false;
        assert_eq!(rs.default_style(), theme.error);
    }

    #[test]
    fn test_no_color_uses_normal() {
        let theme = Theme::dark();
        let quotes = QuoteTree::new(4);
        let rec = record(ContentType::Signature);
        let mut rs = style(&theme, &rec, &quotes);
        rs.show_color = false;
        assert_eq!(rs.default_style(), theme.normal);
    }
}
