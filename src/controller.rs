use std::time::Duration;
use tracing::trace;

use crate::domain::{Message, TRError};
use crate::model::Model;
use ratatui::crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind};

pub struct Controller {
    event_poll_time: u64,
}

impl Controller {
    pub fn new(event_poll_time: u64) -> Self {
        Self { event_poll_time }
    }

    /// Waits up to the poll time for input. Returns `Tick` when nothing
    /// happened so timers keep firing while the user is idle.
    pub fn handle_event(&self, model: &Model) -> Result<Option<Message>, TRError> {
        if !event::poll(Duration::from_millis(self.event_poll_time))? {
            return Ok(Some(Message::Tick));
        }
        match event::read()? {
            Event::Key(key) if key.kind == KeyEventKind::Press => {
                if model.raw_keyevents() {
                    Ok(Some(Message::RawKey(key)))
                } else {
                    Ok(Self::handle_key(key))
                }
            }
            _ => Ok(Some(Message::Tick)),
        }
    }

    fn handle_key(key: KeyEvent) -> Option<Message> {
        let message = match key.code {
            KeyCode::Char('q') => Some(Message::Quit),
            KeyCode::Char('?') => Some(Message::Help),
            KeyCode::Tab => Some(Message::SwitchScreen),
            KeyCode::Char('j') | KeyCode::Down => Some(Message::MoveDown),
            KeyCode::Char('k') | KeyCode::Up => Some(Message::MoveUp),
            KeyCode::Char('h') | KeyCode::Left => Some(Message::MoveLeft),
            KeyCode::Char('l') | KeyCode::Right => Some(Message::MoveRight),
            KeyCode::Char('n') | KeyCode::PageDown => Some(Message::NextPage),
            KeyCode::Char('p') | KeyCode::PageUp => Some(Message::PreviousPage),
            KeyCode::Char('g') | KeyCode::Home => Some(Message::FirstPage),
            KeyCode::Char('G') | KeyCode::End => Some(Message::LastPage),
            KeyCode::Char('s') => Some(Message::ToggleSort),
            KeyCode::Char('S') => Some(Message::ToggleSortChain),
            KeyCode::Char('c') => Some(Message::ClearSorting),
            KeyCode::Char('f') => Some(Message::EditFilter),
            KeyCode::Char('F') => Some(Message::ClearFilters),
            KeyCode::Char('/') => Some(Message::Search),
            KeyCode::Char('r') => Some(Message::Refresh),
            KeyCode::Enter => Some(Message::Enter),
            KeyCode::Esc => Some(Message::Exit),
            _ => None,
        };
        trace!("Mapped: {key:?} => {message:?}");
        message
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyModifiers;

    fn press(code: KeyCode) -> Option<Message> {
        Controller::handle_key(KeyEvent::new(code, KeyModifiers::NONE))
    }

    #[test]
    fn maps_navigation_keys() {
        assert_eq!(press(KeyCode::Char('j')), Some(Message::MoveDown));
        assert_eq!(press(KeyCode::Up), Some(Message::MoveUp));
        assert_eq!(press(KeyCode::Char('n')), Some(Message::NextPage));
        assert_eq!(press(KeyCode::Char('G')), Some(Message::LastPage));
        assert_eq!(press(KeyCode::Tab), Some(Message::SwitchScreen));
    }

    #[test]
    fn maps_table_actions() {
        assert_eq!(press(KeyCode::Char('s')), Some(Message::ToggleSort));
        assert_eq!(press(KeyCode::Char('S')), Some(Message::ToggleSortChain));
        assert_eq!(press(KeyCode::Char('f')), Some(Message::EditFilter));
        assert_eq!(press(KeyCode::Char('/')), Some(Message::Search));
        assert_eq!(press(KeyCode::Esc), Some(Message::Exit));
    }

    #[test]
    fn ignores_unbound_keys() {
        assert_eq!(press(KeyCode::Char('x')), None);
        assert_eq!(press(KeyCode::F(5)), None);
    }
}
