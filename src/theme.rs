//! Color theme for the pager.

use ratatui::style::{Color, Modifier, Style};

use crate::pager::line::ContentType;

/// Styles for every kind of line and highlight the pager draws.
#[derive(Debug, Clone, PartialEq)]
pub struct Theme {
    pub normal: Style,
    /// Header lines no header rule matched.
    pub header_default: Style,
    /// Header lines whose rule carries no style of its own.
    pub header: Style,
    /// Cycled by quote depth.
    pub quoted: Vec<Style>,
    pub signature: Style,
    pub attachment: Style,
    pub search: Style,
    /// The `+` drawn in front of wrapped rows.
    pub markers: Style,
    /// The `~` drawn past the end of the message.
    pub tilde: Style,
    /// Replaces overstrike/ANSI bold when set.
    pub bold: Option<Style>,
    /// Replaces overstrike/ANSI underline when set.
    pub underline: Option<Style>,
    /// Informational lines in log mode.
    pub message: Style,
    /// Error lines in log mode.
    pub error: Style,
    pub status: Style,
}

impl Theme {
    /// Dark theme (default).
    pub fn dark() -> Self {
        Self {
            normal: Style::default().fg(Color::Rgb(220, 220, 230)),
            header_default: Style::default().fg(Color::Rgb(150, 150, 170)),
            header: Style::default()
                .fg(Color::Rgb(130, 170, 255))
                .add_modifier(Modifier::BOLD),
            quoted: vec![
                Style::default().fg(Color::Rgb(130, 170, 255)),
                Style::default().fg(Color::Rgb(120, 200, 140)),
                Style::default().fg(Color::Rgb(220, 180, 100)),
                Style::default().fg(Color::Rgb(200, 130, 200)),
            ],
            signature: Style::default().fg(Color::Rgb(120, 120, 140)),
            attachment: Style::default().fg(Color::Green),
            search: Style::default().fg(Color::Black).bg(Color::Yellow),
            markers: Style::default().fg(Color::Rgb(80, 80, 100)),
            tilde: Style::default().fg(Color::Rgb(80, 80, 100)),
            bold: None,
            underline: None,
            message: Style::default().fg(Color::Cyan),
            error: Style::default().fg(Color::Red).add_modifier(Modifier::BOLD),
            status: Style::default()
                .fg(Color::Rgb(150, 150, 170))
                .bg(Color::Rgb(30, 30, 46)),
        }
    }

    /// Terminal defaults everywhere except search hits and the status line.
    pub fn plain() -> Self {
        Self {
            normal: Style::default(),
            header_default: Style::default(),
            header: Style::default(),
            quoted: vec![Style::default()],
            signature: Style::default(),
            attachment: Style::default(),
            search: Style::default().add_modifier(Modifier::REVERSED),
            markers: Style::default(),
            tilde: Style::default(),
            bold: None,
            underline: None,
            message: Style::default(),
            error: Style::default(),
            status: Style::default().add_modifier(Modifier::REVERSED),
        }
    }

    /// Default style of a line of the given type.
    pub fn style_for(&self, content_type: ContentType) -> Style {
        match content_type {
            ContentType::Header => self.header,
            ContentType::HeaderDefault => self.header_default,
            ContentType::Quoted => self.quote_style(0),
            ContentType::Signature => self.signature,
            ContentType::Attachment => self.attachment,
            ContentType::Normal | ContentType::MessageLog | ContentType::Unclassified => {
                self.normal
            }
        }
    }

    /// Style of palette slot `index`.
    pub fn quote_style(&self, index: usize) -> Style {
        if self.quoted.is_empty() {
            return self.normal;
        }
        self.quoted[index % self.quoted.len()]
    }

    /// Number of distinct quote colors.
    pub fn palette_size(&self) -> usize {
        self.quoted.len()
    }
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}
