//! Commands the pager reacts to and what it reports back.

use std::fmt;

use serde::Serialize;

use crate::pager::search::Direction;

/// One user command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Leave the pager.
    Exit,
    /// Leave the pager and the application.
    Quit,
    NextPage,
    PrevPage,
    NextLine,
    PrevLine,
    Top,
    Bottom,
    HalfUp,
    HalfDown,
    /// Compile a new pattern (or repeat the current one) and jump to a hit.
    Search {
        pattern: String,
        direction: Direction,
    },
    SearchNext,
    SearchOpposite,
    /// Turn search highlighting on or off.
    SearchToggle,
    HideQuoted,
    SkipQuoted,
    Redraw,
    Resize {
        rows: usize,
        cols: usize,
    },
}

/// Why the pager stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    Exit,
    Quit,
    /// Paged past the end; the caller may show the next entry.
    NextEntry,
}

/// Result of a pager session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PagerOutcome {
    pub reason: ExitReason,
    /// Byte offset of the top row, for reopening at the same place.
    pub last_offset: u64,
}

/// How much of the message has been seen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// Offset of the first row below the screen, as a percentage of the stream.
    Percent(u8),
    /// The whole message fits on screen.
    All,
    /// The end of the message is shown.
    End,
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Percent(p) => write!(f, "{p}%"),
            Self::All => f.write_str("all"),
            Self::End => f.write_str("end"),
        }
    }
}

/// Supplies commands to a running pager. `None` ends the session.
pub trait CommandSource {
    fn next_command(&mut self) -> Option<Command>;
}

impl<I: Iterator<Item = Command>> CommandSource for I {
    fn next_command(&mut self) -> Option<Command> {
        self.next()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_display() {
        assert_eq!(Progress::Percent(42).to_string(), "42%");
        assert_eq!(Progress::All.to_string(), "all");
        assert_eq!(Progress::End.to_string(), "end");
    }

    #[test]
    fn test_iterator_is_command_source() {
        let mut source = vec![Command::NextLine, Command::Exit].into_iter();
        assert_eq!(source.next_command(), Some(Command::NextLine));
        assert_eq!(source.next_command(), Some(Command::Exit));
        assert_eq!(source.next_command(), None);
    }

    #[test]
    fn test_outcome_serializes() {
        let outcome = PagerOutcome {
            reason: ExitReason::NextEntry,
            last_offset: 120,
        };
        let json = serde_json::to_string(&outcome).expect("serialize");
        assert_eq!(json, r#"{"reason":"next_entry","last_offset":120}"#);
    }
}
