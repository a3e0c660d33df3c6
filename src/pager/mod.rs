//! The pager engine: lazy line layout, classification and the view controller.
//!
//! Data flows one way per redraw: the [`view::PagerView`] asks for row `n`,
//! the [`scanner`] reads the line at that row's byte offset, the
//! [`classify`] module types it (growing the [`quote`] tree), [`layout`]
//! decides where the row breaks and [`render`] turns it into styled runs
//! for a [`surface::Surface`].

pub mod classify;
pub mod command;
pub mod escape;
pub mod highlight;
pub mod layout;
pub mod line;
pub mod quote;
pub mod render;
pub mod scanner;
pub mod search;
pub mod surface;
pub mod view;

pub use classify::Classifier;
pub use command::{Command, CommandSource, ExitReason, PagerOutcome, Progress};
pub use escape::Markers;
pub use search::Direction;
pub use surface::{MemorySurface, Surface};
pub use view::{run_pager, PagerState, PagerView, RowDump};

use crate::theme::Theme;

/// Behavior switches of the pager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagerOptions {
    /// 0 wraps at the window width, >0 at that many columns, <0 that many
    /// columns short of the window width.
    pub wrap: i32,
    pub smart_wrap: bool,
    /// Draw `+` in front of wrapped rows.
    pub markers: bool,
    pub allow_ansi: bool,
    /// Draw `~` on rows past the end of the message.
    pub tilde: bool,
    /// Rows kept on screen when paging.
    pub pager_context: usize,
    /// Rows shown above a search hit.
    pub search_context: usize,
    pub wrap_search: bool,
    /// Stay on the last page instead of moving to the next entry.
    pub pager_stop: bool,
    /// Lines of context kept above quoted text when skipping to it.
    pub skip_quoted_offset: usize,
    pub skip_leading_whitespace: bool,
    pub line_cache_size: usize,
}

impl Default for PagerOptions {
    fn default() -> Self {
        Self {
            wrap: 0,
            smart_wrap: true,
            markers: true,
            allow_ansi: false,
            tilde: false,
            pager_context: 0,
            search_context: 0,
            wrap_search: true,
            pager_stop: false,
            skip_quoted_offset: 0,
            skip_leading_whitespace: true,
            line_cache_size: scanner::DEFAULT_CACHE_SIZE,
        }
    }
}

/// What kind of content is being paged.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagerFlags {
    /// Use the theme's colors.
    pub show_color: bool,
    /// Classify lines even without color (enables hide/skip quoted).
    pub classify: bool,
    /// The content is the message log.
    pub logs: bool,
    /// The first line opens a header block.
    pub headers: bool,
}

impl PagerFlags {
    /// A mail message in color.
    pub fn message() -> Self {
        Self {
            show_color: true,
            classify: true,
            logs: false,
            headers: true,
        }
    }

    /// A mail message without color.
    pub fn plain() -> Self {
        Self {
            show_color: false,
            classify: true,
            logs: false,
            headers: true,
        }
    }

    /// The message log.
    pub fn logs() -> Self {
        Self {
            show_color: false,
            classify: false,
            logs: true,
            headers: false,
        }
    }

    /// Set whether the content starts with header fields.
    pub fn with_headers(mut self, headers: bool) -> Self {
        self.headers = headers;
        self
    }

    /// Lines get a content type.
    pub fn has_types(&self) -> bool {
        self.show_color || self.classify
    }
}

impl Default for PagerFlags {
    fn default() -> Self {
        Self::message()
    }
}

/// Everything a pager session needs besides its stream.
#[derive(Debug, Clone, Default)]
pub struct PagerSettings {
    pub options: PagerOptions,
    pub theme: Theme,
    pub classifier: Classifier,
}
