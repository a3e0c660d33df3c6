//! Keyboard handling: keys to pager commands, plus the search prompt.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

use crate::pager::{Command, Direction};

/// What a key press asks the front end to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    None,
    Command(Command),
    /// Page the message log.
    ShowLog,
}

/// A search pattern being typed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub direction: Direction,
    pub text: String,
}

impl Prompt {
    /// The prompt as drawn on the status line.
    pub fn label(&self) -> String {
        let sigil = match self.direction {
            Direction::Forward => '/',
            Direction::Backward => '?',
        };
        format!("{sigil}{}", self.text)
    }
}

/// Keyboard state of one pager session.
#[derive(Debug, Default)]
pub struct InputState {
    prompt: Option<Prompt>,
}

impl InputState {
    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    /// Process a key press. While the prompt is open it captures all keys.
    pub fn handle_key(&mut self, key: KeyEvent) -> KeyAction {
        if self.prompt.is_some() {
            return self.handle_prompt_key(key);
        }
        match (key.modifiers, key.code) {
            (KeyModifiers::CONTROL, KeyCode::Char('c')) => KeyAction::Command(Command::Quit),
            (KeyModifiers::CONTROL, KeyCode::Char('l')) => KeyAction::Command(Command::Redraw),
            (KeyModifiers::CONTROL, KeyCode::Char('d')) => KeyAction::Command(Command::HalfDown),
            (KeyModifiers::CONTROL, KeyCode::Char('u')) => KeyAction::Command(Command::HalfUp),
            (KeyModifiers::CONTROL, KeyCode::Char('f')) => KeyAction::Command(Command::NextPage),
            (KeyModifiers::CONTROL, KeyCode::Char('b')) => KeyAction::Command(Command::PrevPage),
            (_, KeyCode::Char('/')) => self.open_prompt(Direction::Forward),
            (_, KeyCode::Char('?')) => self.open_prompt(Direction::Backward),
            (_, KeyCode::Char('M')) => KeyAction::ShowLog,
            (_, code) => map_key(code).map_or(KeyAction::None, KeyAction::Command),
        }
    }

    fn open_prompt(&mut self, direction: Direction) -> KeyAction {
        self.prompt = Some(Prompt {
            direction,
            text: String::new(),
        });
        KeyAction::None
    }

    fn handle_prompt_key(&mut self, key: KeyEvent) -> KeyAction {
        let Some(prompt) = self.prompt.as_mut() else {
            return KeyAction::None;
        };
        match key.code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                self.prompt = None
            }
            KeyCode::Enter => {
                if let Some(prompt) = self.prompt.take() {
                    return KeyAction::Command(Command::Search {
                        pattern: prompt.text,
                        direction: prompt.direction,
                    });
                }
            }
            KeyCode::Backspace => {
                if prompt.text.pop().is_none() {
                    self.prompt = None;
                }
            }
            KeyCode::Char(c) => prompt.text.push(c),
            _ => {}
        }
        KeyAction::None
    }
}

/// Keys without modifiers.
fn map_key(code: KeyCode) -> Option<Command> {
    let command = match code {
        KeyCode::Char('q') | KeyCode::Char('i') | KeyCode::Esc => Command::Exit,
        KeyCode::Char('Q') => Command::Quit,
        KeyCode::Char(' ') | KeyCode::PageDown | KeyCode::Char('f') => Command::NextPage,
        KeyCode::Char('-') | KeyCode::PageUp | KeyCode::Char('b') => Command::PrevPage,
        KeyCode::Enter | KeyCode::Down | KeyCode::Char('j') => Command::NextLine,
        KeyCode::Backspace | KeyCode::Up | KeyCode::Char('k') => Command::PrevLine,
        KeyCode::Home | KeyCode::Char('g') | KeyCode::Char('^') => Command::Top,
        KeyCode::End | KeyCode::Char('G') | KeyCode::Char('$') => Command::Bottom,
        KeyCode::Char('d') => Command::HalfDown,
        KeyCode::Char('u') => Command::HalfUp,
        KeyCode::Char('n') => Command::SearchNext,
        KeyCode::Char('N') => Command::SearchOpposite,
        KeyCode::Char('\\') => Command::SearchToggle,
        KeyCode::Char('T') => Command::HideQuoted,
        KeyCode::Char('S') => Command::SkipQuoted,
        _ => return None,
    };
    Some(command)
}
