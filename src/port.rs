// ABOUTME: Character-oriented ports with line/column tracking for the reader and writer

use std::cell::RefCell;
use std::io::Write;
use std::rc::Rc;

struct InputPortData {
    chars: Vec<char>,
    pos: RefCell<usize>,
    line: RefCell<usize>,
    col: RefCell<usize>,
    open: RefCell<bool>,
}

/// An input character port over an in-memory string, tracking line and
/// column the way the reader's error messages need to.
#[derive(Clone)]
pub struct InputPort(Rc<InputPortData>);

impl InputPort {
    pub fn from_str(source: &str) -> Self {
        InputPort(Rc::new(InputPortData {
            chars: source.chars().collect(),
            pos: RefCell::new(0),
            line: RefCell::new(1),
            col: RefCell::new(0),
            open: RefCell::new(true),
        }))
    }

    /// Read and consume the next character, or `None` at EOF.
    pub fn get_char(&self) -> Option<char> {
        let mut pos = self.0.pos.borrow_mut();
        if *pos >= self.0.chars.len() {
            return None;
        }
        let c = self.0.chars[*pos];
        *pos += 1;
        if c == '\n' {
            *self.0.line.borrow_mut() += 1;
            *self.0.col.borrow_mut() = 0;
        } else {
            *self.0.col.borrow_mut() += 1;
        }
        Some(c)
    }

    /// Look at the next character without consuming it.
    pub fn peek_char(&self) -> Option<char> {
        let pos = *self.0.pos.borrow();
        self.0.chars.get(pos).copied()
    }

    /// Push the last character read back onto the stream (one character
    /// of pushback, which is all the reader's grammar needs).
    pub fn unread_char(&self) {
        let mut pos = self.0.pos.borrow_mut();
        if *pos > 0 {
            *pos -= 1;
        }
    }

    pub fn line(&self) -> usize {
        *self.0.line.borrow()
    }

    pub fn column(&self) -> usize {
        *self.0.col.borrow()
    }

    pub fn is_open(&self) -> bool {
        *self.0.open.borrow()
    }

    pub fn close(&self) {
        *self.0.open.borrow_mut() = false;
    }
}

impl PartialEq for InputPort {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for InputPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#<input-file>")
    }
}

enum Sink {
    Buffer(RefCell<String>),
    Stdout,
    Stderr,
}

struct OutputPortData {
    sink: Sink,
    line: RefCell<usize>,
    col: RefCell<usize>,
    open: RefCell<bool>,
}

/// An output character port, either an in-memory string buffer (used by
/// `write-to-string` and tests) or one of the two standard streams.
#[derive(Clone)]
pub struct OutputPort(Rc<OutputPortData>);

impl OutputPort {
    pub fn buffer() -> Self {
        OutputPort(Rc::new(OutputPortData {
            sink: Sink::Buffer(RefCell::new(String::new())),
            line: RefCell::new(1),
            col: RefCell::new(0),
            open: RefCell::new(true),
        }))
    }

    pub fn stdout() -> Self {
        OutputPort(Rc::new(OutputPortData {
            sink: Sink::Stdout,
            line: RefCell::new(1),
            col: RefCell::new(0),
            open: RefCell::new(true),
        }))
    }

    pub fn stderr() -> Self {
        OutputPort(Rc::new(OutputPortData {
            sink: Sink::Stderr,
            line: RefCell::new(1),
            col: RefCell::new(0),
            open: RefCell::new(true),
        }))
    }

    pub fn write_str(&self, s: &str) {
        for c in s.chars() {
            if c == '\n' {
                *self.0.line.borrow_mut() += 1;
                *self.0.col.borrow_mut() = 0;
            } else {
                *self.0.col.borrow_mut() += 1;
            }
        }
        match &self.0.sink {
            Sink::Buffer(buf) => buf.borrow_mut().push_str(s),
            Sink::Stdout => {
                print!("{s}");
                let _ = std::io::stdout().flush();
            }
            Sink::Stderr => {
                eprint!("{s}");
                let _ = std::io::stderr().flush();
            }
        }
    }

    /// Contents of an in-memory buffer port; empty for the standard streams.
    pub fn contents(&self) -> String {
        match &self.0.sink {
            Sink::Buffer(buf) => buf.borrow().clone(),
            _ => String::new(),
        }
    }

    pub fn close(&self) {
        *self.0.open.borrow_mut() = false;
    }

    pub fn is_open(&self) -> bool {
        *self.0.open.borrow()
    }
}

impl PartialEq for OutputPort {
    fn eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
}

impl std::fmt::Debug for OutputPort {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#<output-file>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_char_tracks_line_and_column() {
        let port = InputPort::from_str("ab\ncd");
        assert_eq!(port.get_char(), Some('a'));
        assert_eq!(port.line(), 1);
        assert_eq!(port.column(), 1);
        port.get_char();
        port.get_char();
        assert_eq!(port.line(), 2);
        assert_eq!(port.column(), 0);
    }

    #[test]
    fn unread_char_allows_one_character_pushback() {
        let port = InputPort::from_str("xy");
        assert_eq!(port.get_char(), Some('x'));
        port.unread_char();
        assert_eq!(port.get_char(), Some('x'));
        assert_eq!(port.get_char(), Some('y'));
        assert_eq!(port.get_char(), None);
    }

    #[test]
    fn buffer_port_accumulates_writes() {
        let port = OutputPort::buffer();
        port.write_str("hello ");
        port.write_str("world");
        assert_eq!(port.contents(), "hello world");
    }
}
