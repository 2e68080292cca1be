use ratatui::crossterm::event::{self, KeyCode, KeyModifiers};
use tracing::trace;

/// Single line editor used for the search box.
#[derive(Default)]
pub struct Inputter {
    current_input: String,
    cursor_pos: usize, // in chars
    finished: bool,
    canceled: bool,
}

#[derive(Default, Clone, Debug)]
pub struct InputResult {
    pub input: String,
    pub finished: bool,
    pub canceled: bool,
    pub changed: bool,
    pub cursor_pos: usize,
}

impl Inputter {
    pub fn read(&mut self, key: event::KeyEvent) -> InputResult {
        let before = self.current_input.clone();
        match (key.code, key.modifiers) {
            (KeyCode::Enter, _) => self.finished = true,
            (KeyCode::Esc, _) => {
                self.reset();
                self.canceled = true;
                self.finished = true;
            }
            (KeyCode::Backspace, _) => self.backspace(),
            (KeyCode::Delete, _) => self.delete(),
            (KeyCode::Left, _) => self.cursor_pos = self.cursor_pos.saturating_sub(1),
            (KeyCode::Right, _) => {
                self.cursor_pos = std::cmp::min(self.cursor_pos + 1, self.current_input.chars().count())
            }
            (KeyCode::Home, _) => self.cursor_pos = 0,
            (KeyCode::End, _) => self.cursor_pos = self.current_input.chars().count(),
            (KeyCode::Char('u'), KeyModifiers::CONTROL) => self.reset(),
            (KeyCode::Char(chr), m) if !m.contains(KeyModifiers::CONTROL) => {
                self.current_input.insert(self.byte_pos(), chr);
                self.cursor_pos += 1;
            }
            _ => {}
        }
        let mut result = self.get();
        result.changed = before != self.current_input;
        trace!("Input {:?}", result);
        result
    }

    /// Starts a new edit session with `s` as initial text.
    pub fn set(&mut self, s: &str) {
        self.current_input = s.to_string();
        self.cursor_pos = s.chars().count();
        self.finished = false;
        self.canceled = false;
    }

    pub fn get(&self) -> InputResult {
        InputResult {
            input: self.current_input.clone(),
            finished: self.finished,
            canceled: self.canceled,
            changed: false,
            cursor_pos: self.cursor_pos,
        }
    }

    fn reset(&mut self) {
        self.current_input.clear();
        self.cursor_pos = 0;
    }

    fn backspace(&mut self) {
        if self.cursor_pos > 0 {
            self.cursor_pos -= 1;
            let at = self.byte_pos();
            self.current_input.remove(at);
        }
    }

    fn delete(&mut self) {
        if self.cursor_pos < self.current_input.chars().count() {
            let at = self.byte_pos();
            self.current_input.remove(at);
        }
    }

    fn byte_pos(&self) -> usize {
        self.current_input
            .char_indices()
            .nth(self.cursor_pos)
            .map(|(byte_idx, _)| byte_idx)
            .unwrap_or(self.current_input.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ratatui::crossterm::event::KeyEvent;

    fn press(input: &mut Inputter, code: KeyCode) -> InputResult {
        input.read(KeyEvent::new(code, KeyModifiers::NONE))
    }

    fn type_str(input: &mut Inputter, s: &str) {
        for c in s.chars() {
            press(input, KeyCode::Char(c));
        }
    }

    #[test]
    fn typing_and_editing_in_the_middle() {
        let mut input = Inputter::default();
        type_str(&mut input, "inspirlai");
        press(&mut input, KeyCode::Left);
        press(&mut input, KeyCode::Left);
        let r = press(&mut input, KeyCode::Backspace);
        assert_eq!(r.input, "inspirai");
        assert!(r.changed);
        let r = press(&mut input, KeyCode::Char('l'));
        assert_eq!(r.input, "inspirlai");
        assert_eq!(r.cursor_pos, 7);

        let r = press(&mut input, KeyCode::Left);
        assert!(!r.changed);
        let r = press(&mut input, KeyCode::Delete);
        assert_eq!(r.input, "inspirai");
    }

    #[test]
    fn multibyte_chars() {
        let mut input = Inputter::default();
        type_str(&mut input, "padrão");
        press(&mut input, KeyCode::Left);
        let r = press(&mut input, KeyCode::Backspace);
        assert_eq!(r.input, "padro");
    }

    #[test]
    fn enter_finishes_and_escape_cancels() {
        let mut input = Inputter::default();
        input.set("a.com");
        let r = press(&mut input, KeyCode::Enter);
        assert!(r.finished && !r.canceled);
        assert_eq!(r.input, "a.com");

        input.set("a.com");
        let r = press(&mut input, KeyCode::Esc);
        assert!(r.finished && r.canceled && r.changed);
        assert_eq!(r.input, "");
    }

    #[test]
    fn home_end_and_ctrl_u() {
        let mut input = Inputter::default();
        type_str(&mut input, "b.com");
        let r = press(&mut input, KeyCode::Home);
        assert_eq!(r.cursor_pos, 0);
        assert!(!r.changed);
        let r = press(&mut input, KeyCode::Char('a'));
        assert_eq!(r.input, "ab.com");
        assert_eq!(r.cursor_pos, 1);

        let r = press(&mut input, KeyCode::End);
        assert_eq!(r.cursor_pos, 6);
        let r = press(&mut input, KeyCode::Char('/'));
        assert_eq!(r.input, "ab.com/");

        let r = input.read(KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL));
        assert_eq!(r.input, "");
        assert_eq!(r.cursor_pos, 0);
        assert!(r.changed && !r.finished && !r.canceled);

        // other control chords are ignored
        let r = input.read(KeyEvent::new(KeyCode::Char('x'), KeyModifiers::CONTROL));
        assert!(!r.changed);
    }
}
