//! Logical lines and their terminators.
//!
//! A line keeps its terminator in `text` so that replace mode can write the
//! file back byte-for-byte apart from the substituted spans.

/// Line terminator of a logical line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Eol {
    /// Last line of a file without a terminator
    #[default]
    None,
    Lf,
    Cr,
    CrLf,
}

impl Eol {
    pub fn len(self) -> usize {
        match self {
            Eol::None => 0,
            Eol::Lf | Eol::Cr => 1,
            Eol::CrLf => 2,
        }
    }

    /// Detects the terminator at the end of `text`
    pub fn of(text: &str) -> Self {
        let bytes = text.as_bytes();
        match bytes {
            [.., b'\r', b'\n'] => Eol::CrLf,
            [.., b'\n'] => Eol::Lf,
            [.., b'\r'] => Eol::Cr,
            _ => Eol::None,
        }
    }
}

/// Returns true for the characters that end a line
pub fn is_line_delimiter(c: char) -> bool {
    c == '\n' || c == '\r'
}

/// One logical line of a grep target
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    /// Line content including its terminator
    pub text: String,
    pub eol: Eol,
    /// 1-based line number
    pub number: u64,
}

impl Line {
    pub fn new(text: String, number: u64) -> Self {
        let eol = Eol::of(&text);
        Self { text, eol, number }
    }
}

/// Returns the length of the first line of `text`, terminator included.
///
/// CR, LF and CRLF all end a line. A CR at the very end of `text` is treated
/// as a complete terminator.
pub fn next_line_len(text: &str) -> usize {
    let bytes = text.as_bytes();
    match bytes.iter().position(|&b| b == b'\n' || b == b'\r') {
        None => bytes.len(),
        Some(i) if bytes[i] == b'\r' && bytes.get(i + 1) == Some(&b'\n') => i + 2,
        Some(i) => i + 1,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eol_detection() {
        assert_eq!(Eol::of("abc\r\n"), Eol::CrLf);
        assert_eq!(Eol::of("abc\n"), Eol::Lf);
        assert_eq!(Eol::of("abc\r"), Eol::Cr);
        assert_eq!(Eol::of("abc"), Eol::None);
        assert_eq!(Eol::of(""), Eol::None);
        assert_eq!(Eol::CrLf.len(), 2);
    }

    #[test]
    fn test_mixed_terminators() {
        assert_eq!(next_line_len("a\r\nb"), 3);
        assert_eq!(next_line_len("b\nc"), 2);
        assert_eq!(next_line_len("c\rd"), 2);
        assert_eq!(next_line_len("d"), 1);
        assert_eq!(next_line_len("\n\n"), 1);
        assert_eq!(next_line_len(""), 0);
    }

    #[test]
    fn test_line_keeps_terminator() {
        let line = Line::new("hello\r\n".to_string(), 3);
        assert_eq!(line.text, "hello\r\n");
        assert_eq!(line.eol, Eol::CrLf);
        assert_eq!(line.number, 3);

        let last = Line::new("tail".to_string(), 4);
        assert_eq!(last.eol, Eol::None);
        assert_eq!(last.eol.len(), 0);
    }
}
