use std::time::{Duration, Instant};

use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

#[derive(Default)]
pub struct Inputter {
    current_input: String,
    curser_pos: usize,
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug, PartialEq)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub curser_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.enter(),
            (KeyCode::Esc, _) => self.escape(),
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Left, _) => self.left(),
            (KeyCode::Right, _) => self.right(),
            (KeyCode::Home, _) => self.home(),
            (KeyCode::End, _) => self.end(),
            (kc, km) => self.key(kc, km),
        }
    }

    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.curser_pos = s.chars().count();
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            canceled: self.canceled,
            finished: self.finished,
            input: self.current_input.clone(),
            curser_pos: self.curser_pos,
        }
    }

    pub fn value(&self) -> &str {
        &self.current_input
    }

    pub fn clear(&mut self) {
        self.canceled = false;
        self.finished = false;
        self.current_input.clear();
        self.curser_pos = 0;
    }

    fn enter(&mut self) -> InputResult {
        self.finished = true;
        self.get()
    }

    fn escape(&mut self) -> InputResult {
        self.clear();
        self.canceled = true;
        self.finished = true;
        self.get()
    }

    fn backspace(&mut self) -> InputResult {
        if self.curser_pos > 0 {
            self.curser_pos -= 1;
            let at = self.getbytepos();
            self.current_input.remove(at);
        }
        self.get()
    }

    fn left(&mut self) -> InputResult {
        self.curser_pos = self.curser_pos.saturating_sub(1);
        self.get()
    }

    fn right(&mut self) -> InputResult {
        if self.curser_pos < self.current_input.chars().count() {
            self.curser_pos += 1;
        }
        self.get()
    }

    fn home(&mut self) -> InputResult {
        self.curser_pos = 0;
        self.get()
    }

    fn end(&mut self) -> InputResult {
        self.curser_pos = self.current_input.chars().count();
        self.get()
    }

    fn key(&mut self, code: KeyCode, modifier: KeyModifiers) -> InputResult {
        if modifier.contains(KeyModifiers::CONTROL) {
            return self.get();
        }
        if let Some(chr) = code.as_char() {
            self.current_input.insert(self.getbytepos(), chr);
            self.curser_pos += 1;
        }
        self.get()
    }

    fn getbytepos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.curser_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

/// Text input whose value is only committed after `delay` without further
/// edits, or immediately on blur. Identical consecutive values are never
/// committed twice.
pub struct DebouncedInput {
    editor: Inputter,
    delay: Duration,
    deadline: Option<Instant>,
    committed: String,
}

impl DebouncedInput {
    pub fn new(delay: Duration) -> Self {
        DebouncedInput {
            editor: Inputter::default(),
            delay,
            deadline: None,
            committed: String::new(),
        }
    }

    /// Starts an edit session on an already committed value.
    pub fn load(&mut self, value: &str) {
        self.editor.clear();
        self.editor.set(value);
        self.committed = value.to_string();
        self.deadline = None;
    }

    pub fn read(&mut self, key: event::KeyEvent, now: Instant) -> InputResult {
        let before = self.editor.value().to_string();
        let result = self.editor.read(key);
        if result.input != before {
            self.restart(now);
        }
        result
    }

    pub fn input(&mut self, value: &str, now: Instant) {
        self.editor.set(value);
        self.restart(now);
    }

    fn restart(&mut self, now: Instant) {
        trace!("Debounce restarted for {:?}", self.editor.value());
        self.deadline = Some(now + self.delay);
    }

    pub fn poll(&mut self, now: Instant) -> Option<String> {
        match self.deadline {
            Some(deadline) if now >= deadline => self.commit(),
            _ => None,
        }
    }

    pub fn blur(&mut self) -> Option<String> {
        self.commit()
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn get(&self) -> InputResult {
        self.editor.get()
    }

    fn commit(&mut self) -> Option<String> {
        self.deadline = None;
        if self.editor.value() == self.committed {
            return None;
        }
        self.committed = self.editor.value().to_string();
        trace!("Committed input {:?}", self.committed);
        Some(self.committed.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn press(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn edits_at_cursor() {
        let mut input = Inputter::default();
        for c in "Dve".chars() {
            input.read(press(KeyCode::Char(c)));
        }
        input.read(press(KeyCode::Left));
        input.read(press(KeyCode::Left));
        input.read(press(KeyCode::Char('a')));
        assert_eq!(input.value(), "Dave");
        input.read(press(KeyCode::End));
        input.read(press(KeyCode::Backspace));
        assert_eq!(input.value(), "Dav");
        let res = input.read(press(KeyCode::Esc));
        assert!(res.canceled && res.finished);
        assert_eq!(res.input, "");
    }

    #[test]
    fn rapid_keystrokes_commit_once_with_final_value() {
        let start = Instant::now();
        let delay = Duration::from_millis(500);
        let mut input = DebouncedInput::new(delay);
        let mut now = start;
        for c in "Dave".chars() {
            input.read(press(KeyCode::Char(c)), now);
            now += Duration::from_millis(100);
            assert_eq!(input.poll(now), None);
        }
        assert_eq!(input.poll(now + Duration::from_millis(450)), Some("Dave".to_string()));
        assert_eq!(input.poll(now + Duration::from_secs(5)), None);
        assert!(!input.is_pending());
    }

    #[test]
    fn new_keystroke_restarts_the_timer() {
        let start = Instant::now();
        let mut input = DebouncedInput::new(Duration::from_millis(300));
        input.input("Da", start);
        input.input("Dav", start + Duration::from_millis(250));
        assert_eq!(input.poll(start + Duration::from_millis(400)), None);
        assert_eq!(
            input.poll(start + Duration::from_millis(550)),
            Some("Dav".to_string())
        );
    }

    #[test]
    fn blur_commits_in_flight_edit_immediately() {
        let start = Instant::now();
        let mut input = DebouncedInput::new(Duration::from_secs(1));
        input.input("Anna", start);
        assert_eq!(input.blur(), Some("Anna".to_string()));
        assert_eq!(input.poll(start + Duration::from_secs(2)), None);
    }

    #[test]
    fn identical_value_is_not_recommitted() {
        let start = Instant::now();
        let mut input = DebouncedInput::new(Duration::from_millis(10));
        input.load("Dave");
        input.input("Davey", start);
        input.input("Dave", start);
        assert_eq!(input.poll(start + Duration::from_millis(20)), None);
    }

    #[test]
    fn cancel_drops_pending_commit() {
        let start = Instant::now();
        let mut input = DebouncedInput::new(Duration::from_millis(10));
        input.input("x", start);
        input.cancel();
        assert_eq!(input.poll(start + Duration::from_secs(1)), None);
    }
}
