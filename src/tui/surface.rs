//! `Surface` over a ratatui frame buffer.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;

use crate::pager::Surface;

/// Draws pager rows into `area` of a ratatui [`Buffer`].
pub struct BufferSurface<'a> {
    buf: &'a mut Buffer,
    area: Rect,
}

impl<'a> BufferSurface<'a> {
    pub fn new(buf: &'a mut Buffer, area: Rect) -> Self {
        Self { buf, area }
    }
}

impl Surface for BufferSurface<'_> {
    fn size(&self) -> (usize, usize) {
        (self.area.height as usize, self.area.width as usize)
    }

    fn draw_text(&mut self, row: usize, col: usize, text: &str, style: Style) {
        let (rows, cols) = self.size();
        if row >= rows || col >= cols {
            return;
        }
        let x = self.area.x + col as u16;
        let y = self.area.y + row as u16;
        self.buf.set_stringn(x, y, text, cols - col, style);
    }

    fn clear_row(&mut self, row: usize) {
        if row >= self.area.height as usize {
            return;
        }
        let y = self.area.y + row as u16;
        for x in self.area.left()..self.area.right() {
            if let Some(cell) = self.buf.cell_mut((x, y)) {
                cell.reset();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::style::Color;

    fn row_text(buf: &Buffer, y: u16) -> String {
        (0..buf.area.width)
            .map(|x| buf[(x, y)].symbol().to_string())
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    #[test]
    fn test_size_and_draw() {
        let area = Rect::new(0, 0, 10, 3);
        let mut buf = Buffer::empty(area);
        let mut surface = BufferSurface::new(&mut buf, area);
        assert_eq!(surface.size(), (3, 10));
        surface.draw_text(1, 2, "hello", Style::default().fg(Color::Red));
        assert_eq!(row_text(&buf, 1), "  hello");
        assert_eq!(buf[(2, 1)].fg, Color::Red);
    }

    #[test]
    fn test_draw_clips_to_row() {
        let area = Rect::new(0, 0, 6, 1);
        let mut buf = Buffer::empty(area);
        let mut surface = BufferSurface::new(&mut buf, area);
        surface.draw_text(0, 3, "abcdef", Style::default());
        surface.draw_text(4, 0, "ignored", Style::default());
        assert_eq!(row_text(&buf, 0), "   abc");
    }

    #[test]
    fn test_clear_row() {
        let area = Rect::new(0, 0, 5, 2);
        let mut buf = Buffer::empty(area);
        let mut surface = BufferSurface::new(&mut buf, area);
        surface.draw_text(0, 0, "xxxxx", Style::default());
        surface.draw_text(1, 0, "yyyyy", Style::default());
        surface.clear_row(0);
        assert_eq!(row_text(&buf, 0), "");
        assert_eq!(row_text(&buf, 1), "yyyyy");
    }

    #[test]
    fn test_offset_area() {
        let mut buf = Buffer::empty(Rect::new(0, 0, 8, 4));
        let area = Rect::new(2, 1, 4, 2);
        let mut surface = BufferSurface::new(&mut buf, area);
        surface.draw_text(0, 0, "abcdefgh", Style::default());
        assert_eq!(row_text(&buf, 1), "  abcd");
    }
}
