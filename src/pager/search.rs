//! Search pattern state.

use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::pager::highlight::{compile_pattern, find_matches};
use crate::pager::line::SearchRange;

/// Direction of a search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[default]
    Forward,
    Backward,
}

impl Direction {
    pub fn reversed(self) -> Self {
        match self {
            Self::Forward => Self::Backward,
            Self::Backward => Self::Forward,
        }
    }
}

/// The compiled search pattern and whether its hits are highlighted.
#[derive(Debug, Clone, Default)]
pub struct SearchState {
    pattern: Option<String>,
    regex: Option<Regex>,
    direction: Direction,
    active: bool,
}

impl SearchState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile `pattern` and make it the active search.
    ///
    /// On failure the previous pattern, direction and highlight stay as they were.
    pub fn compile(&mut self, pattern: &str, direction: Direction) -> Result<()> {
        let regex = compile_pattern(pattern)?;
        debug!(pattern, ?direction, "Search pattern compiled");
        self.pattern = Some(pattern.to_string());
        self.regex = Some(regex);
        self.direction = direction;
        self.active = true;
        Ok(())
    }

    pub fn is_compiled(&self) -> bool {
        self.regex.is_some()
    }

    /// Hits are highlighted and counted by the view.
    pub fn is_active(&self) -> bool {
        self.active && self.regex.is_some()
    }

    pub fn set_active(&mut self, active: bool) {
        self.active = active && self.regex.is_some();
    }

    /// Flip highlighting. Does nothing without a compiled pattern.
    pub fn toggle(&mut self) {
        if self.regex.is_some() {
            self.active = !self.active;
        }
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_deref()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Match ranges in a line's display text.
    pub fn matches(&self, display: &[u8]) -> Vec<SearchRange> {
        match &self.regex {
            Some(re) => find_matches(re, display),
            None => Vec::new(),
        }
    }
}
