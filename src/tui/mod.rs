//! Terminal UI: main entry point and event loop.

pub mod event;
pub mod surface;

use std::io::{self, Cursor, Read, Seek};

use crossterm::event::{read as ct_read, Event, KeyEventKind};
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use crossterm::ExecutableCommand;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::Rect;
use ratatui::Terminal;
use tracing::debug;
use unicode_width::UnicodeWidthStr;

use self::event::{InputState, KeyAction};
use self::surface::BufferSurface;
use crate::logging::LogQueue;
use crate::pager::{ExitReason, Markers, PagerFlags, PagerOutcome, PagerSettings, PagerView};

type Tui = Terminal<CrosstermBackend<io::Stdout>>;

/// Page `view` on the terminal until the user leaves. Blocks.
///
/// `settings` styles the nested log view opened over `logs`. A non-zero
/// `start_offset` opens the view at that byte offset.
pub fn run_tui<R: Read + Seek>(
    mut view: PagerView<R>,
    settings: &PagerSettings,
    logs: &LogQueue,
    start_offset: u64,
) -> anyhow::Result<PagerOutcome> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    stdout.execute(EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = start(&mut terminal, &mut view, start_offset)
        .and_then(|()| run_session(&mut terminal, &mut view, settings, Some(logs)));

    // Restore terminal (always, even on error)
    disable_raw_mode()?;
    terminal.backend_mut().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    let reason = result?;
    Ok(PagerOutcome {
        reason,
        last_offset: view.top_offset(),
    })
}

/// Size the view to the terminal and scroll to `offset`.
fn start<R: Read + Seek>(
    terminal: &mut Tui,
    view: &mut PagerView<R>,
    offset: u64,
) -> anyhow::Result<()> {
    if offset > 0 {
        let size = terminal.size()?;
        view.notify_resize(size.height as usize, size.width as usize);
        view.restore_position(offset)?;
    }
    Ok(())
}

/// Main event loop: render → read → handle → repeat.
fn run_session<R: Read + Seek>(
    terminal: &mut Tui,
    view: &mut PagerView<R>,
    settings: &PagerSettings,
    logs: Option<&LogQueue>,
) -> anyhow::Result<ExitReason> {
    let mut input = InputState::default();

    loop {
        let mut drawn = Ok(());
        terminal.draw(|frame| {
            let area = frame.area();
            // ratatui starts every frame from an empty buffer
            view.invalidate();
            drawn = view.redraw(&mut BufferSurface::new(frame.buffer_mut(), area));

            if let Some(prompt) = input.prompt() {
                let row = Rect::new(
                    area.x,
                    area.bottom().saturating_sub(1),
                    area.width,
                    area.height.min(1),
                );
                let label = prompt.label();
                let buf = frame.buffer_mut();
                for x in row.left()..row.right() {
                    if let Some(cell) = buf.cell_mut((x, row.y)) {
                        cell.reset();
                    }
                }
                let style = settings.theme.status;
                buf.set_stringn(row.x, row.y, &label, row.width as usize, style);
                let width = UnicodeWidthStr::width(label.as_str()) as u16;
                let cursor = row.x + width.min(row.width.saturating_sub(1));
                frame.set_cursor_position((cursor, row.y));
            }
        })?;
        drawn?;

        let action = match ct_read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => input.handle_key(key),
            // the next redraw picks up the new size
            Event::Resize(cols, rows) => {
                debug!(rows, cols, "Terminal resized");
                KeyAction::None
            }
            _ => KeyAction::None,
        };

        match action {
            KeyAction::None => {}
            KeyAction::Command(command) => {
                if let Some(reason) = view.handle_command(command)? {
                    return Ok(reason);
                }
            }
            KeyAction::ShowLog => {
                let Some(logs) = logs else {
                    continue;
                };
                let mut log_view = PagerView::new(
                    Cursor::new(logs.render().into_bytes()),
                    settings.clone(),
                    Markers::generate(),
                    PagerFlags::logs(),
                    "Messages",
                )?;
                if run_session(terminal, &mut log_view, settings, None)? == ExitReason::Quit {
                    return Ok(ExitReason::Quit);
                }
            }
        }
    }
}
