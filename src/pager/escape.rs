//! Embedded escape sequences: ANSI SGR attributes and the private
//! `ESC ] ... BEL` markers that tag attachment and protected-header lines.

use std::time::{SystemTime, UNIX_EPOCH};

use ratatui::style::Color;

const ESC: u8 = 0x1b;
const BEL: u8 = 0x07;

/// Raw-line prefix that forces a line back to normal coloring.
pub const ANSI_RESET: &[u8] = b"\x1b[0m";

// ── Markers ─────────────────────────────────────────────────────

/// Session-unique byte markers written by the content layer in front of
/// attachment descriptions and protected (encrypted) header lines.
///
/// The nonce makes them impossible to forge from message content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Markers {
    attachment: Vec<u8>,
    protected_header: Vec<u8>,
}

impl Markers {
    /// Markers keyed by a nonce derived from the clock and process id.
    pub fn generate() -> Self {
        let nanos = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default();
        Self::with_nonce(nanos ^ (u64::from(std::process::id()) << 32))
    }

    /// Markers keyed by an explicit nonce.
    pub fn with_nonce(nonce: u64) -> Self {
        Self {
            attachment: format!("\x1b]9;{nonce}\x07").into_bytes(),
            protected_header: format!("\x1b]8;{nonce}\x07").into_bytes(),
        }
    }

    pub fn attachment(&self) -> &[u8] {
        &self.attachment
    }

    pub fn protected_header(&self) -> &[u8] {
        &self.protected_header
    }

    pub fn is_attachment(&self, raw: &[u8]) -> bool {
        raw.starts_with(&self.attachment)
    }

    pub fn is_protected_header(&self, raw: &[u8]) -> bool {
        raw.starts_with(&self.protected_header)
    }

    /// Length of the marker starting at `pos`, if there is one.
    pub fn marker_len_at(&self, buf: &[u8], pos: usize) -> Option<usize> {
        let rest = buf.get(pos..)?;
        if rest.first() != Some(&ESC) || rest.get(1) != Some(&b']') {
            return None;
        }
        [&self.attachment, &self.protected_header]
            .into_iter()
            .find(|m| rest.starts_with(m))
            .map(|m| m.len())
    }
}

// ── ANSI SGR ────────────────────────────────────────────────────

/// Character attributes accumulated from ANSI SGR sequences on one row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AnsiAttr {
    pub bold: bool,
    pub underline: bool,
    pub blink: bool,
    pub reverse: bool,
    /// Palette index 0-7; `None` is the terminal default.
    pub fg: Option<u8>,
    pub bg: Option<u8>,
}

impl AnsiAttr {
    /// No attribute is active.
    pub fn is_plain(&self) -> bool {
        *self == Self::default()
    }

    /// A foreground or background color was set.
    pub fn has_color(&self) -> bool {
        self.fg.is_some() || self.bg.is_some()
    }

    /// Update the attributes from the parameter bytes of one SGR sequence.
    pub fn apply(&mut self, params: &[u8]) {
        if params.is_empty() {
            *self = Self::default();
            return;
        }
        for param in params.split(|&b| b == b';') {
            match param {
                b"" | b"0" => *self = Self::default(),
                b"1" => self.bold = true,
                b"4" => self.underline = true,
                b"5" => self.blink = true,
                b"7" => self.reverse = true,
                [b'3', d] => self.fg = palette_digit(*d),
                [b'4', d] => self.bg = palette_digit(*d),
                _ => {}
            }
        }
    }
}

fn palette_digit(d: u8) -> Option<u8> {
    match d {
        b'0'..=b'7' => Some(d - b'0'),
        _ => None,
    }
}

/// Map an ANSI palette index to a terminal color.
pub fn ansi_color(index: u8) -> Color {
    match index {
        0 => Color::Black,
        1 => Color::Red,
        2 => Color::Green,
        3 => Color::Yellow,
        4 => Color::Blue,
        5 => Color::Magenta,
        6 => Color::Cyan,
        _ => Color::Gray,
    }
}

/// Length of an `ESC [ <digits;...> m` sequence starting at `pos`.
pub fn sgr_len(buf: &[u8], pos: usize) -> Option<usize> {
    let rest = buf.get(pos..)?;
    if rest.first() != Some(&ESC) || rest.get(1) != Some(&b'[') {
        return None;
    }
    let params = rest[2..]
        .iter()
        .take_while(|b| b.is_ascii_digit() || **b == b';')
        .count();
    (rest.get(2 + params) == Some(&b'm')).then_some(params + 3)
}

/// Parameter bytes of the SGR sequence at `pos` (between `ESC [` and `m`).
pub fn sgr_params(buf: &[u8], pos: usize, len: usize) -> &[u8] {
    &buf[pos + 2..pos + len - 1]
}
