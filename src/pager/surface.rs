//! The drawing surface the pager renders onto.

use ratatui::style::Style;
use unicode_width::UnicodeWidthChar;

/// A grid of character cells the pager can draw styled text on.
pub trait Surface {
    /// `(rows, cols)` of the drawable area.
    fn size(&self) -> (usize, usize);

    /// Draw `text` starting at `(row, col)`, clipped to the row.
    fn draw_text(&mut self, row: usize, col: usize, text: &str, style: Style);

    /// Blank a whole row.
    fn clear_row(&mut self, row: usize);
}

#[derive(Debug, Clone, PartialEq)]
struct Cell {
    symbol: String,
    style: Style,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            symbol: " ".to_string(),
            style: Style::default(),
        }
    }
}

/// In-memory surface, used by `dump` and by tests.
#[derive(Debug, Clone)]
pub struct MemorySurface {
    rows: usize,
    cols: usize,
    cells: Vec<Vec<Cell>>,
}

impl MemorySurface {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            cells: vec![vec![Cell::default(); cols]; rows],
        }
    }

    /// Text of `row` with trailing blanks removed.
    pub fn row_text(&self, row: usize) -> String {
        let Some(cells) = self.cells.get(row) else {
            return String::new();
        };
        let text: String = cells.iter().map(|c| c.symbol.as_str()).collect();
        text.trim_end().to_string()
    }

    /// Every row, top to bottom.
    pub fn lines(&self) -> Vec<String> {
        (0..self.rows).map(|r| self.row_text(r)).collect()
    }

    pub fn style_at(&self, row: usize, col: usize) -> Option<Style> {
        self.cells.get(row)?.get(col).map(|c| c.style)
    }
}

impl Surface for MemorySurface {
    fn size(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn draw_text(&mut self, row: usize, col: usize, text: &str, style: Style) {
        let Some(cells) = self.cells.get_mut(row) else {
            return;
        };
        let mut col = col;
        for c in text.chars() {
            let width = c.width().unwrap_or(0);
            if width == 0 {
                // combining marks join the previous cell
                if let Some(prev) = col.checked_sub(1).and_then(|p| cells.get_mut(p)) {
                    prev.symbol.push(c);
                }
                continue;
            }
            if col + width > self.cols {
                break;
            }
            cells[col] = Cell {
                symbol: c.to_string(),
                style,
            };
            for filler in cells.iter_mut().skip(col + 1).take(width - 1) {
                *filler = Cell {
                    symbol: String::new(),
                    style,
                };
            }
            col += width;
        }
    }

    fn clear_row(&mut self, row: usize) {
        if let Some(cells) = self.cells.get_mut(row) {
            cells.fill(Cell::default());
        }
    }
}
