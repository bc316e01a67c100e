//! Character set detection and conversion for grep targets.
//!
//! Files are decoded to UTF-8 for matching and, in replace mode, re-encoded to
//! the charset they were read in. `encoding_rs` does the heavy lifting; UTF-16
//! output is produced by hand because `encoding_rs` only encodes to
//! ASCII-compatible charsets.

use encoding_rs::{Encoding, EUC_JP, SHIFT_JIS, UTF_16BE, UTF_16LE, UTF_8, WINDOWS_1252};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;

/// Number of leading bytes inspected when guessing a charset
pub const DETECT_WINDOW: usize = 32 * 1024;

/// Character sets understood by the grep engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Charset {
    #[serde(rename = "utf-8")]
    Utf8,
    #[serde(rename = "utf-16le", alias = "utf-16")]
    Utf16Le,
    #[serde(rename = "utf-16be")]
    Utf16Be,
    #[serde(rename = "sjis", alias = "shift-jis")]
    ShiftJis,
    #[serde(rename = "euc-jp")]
    EucJp,
    #[serde(rename = "latin1")]
    Latin1,
}

/// Whether the charset is fixed for the session or guessed per file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum CharsetSetting {
    #[default]
    Auto,
    Fixed(Charset),
}

/// Result of inspecting the head of a file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CharsetGuess {
    pub charset: Charset,
    pub has_bom: bool,
}

impl Charset {
    pub const ALL: [Charset; 6] = [
        Charset::Utf8,
        Charset::Utf16Le,
        Charset::Utf16Be,
        Charset::ShiftJis,
        Charset::EucJp,
        Charset::Latin1,
    ];

    /// Display name used in grep output and headers
    pub fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Utf16Le => "UTF-16",
            Charset::Utf16Be => "UTF-16BE",
            Charset::ShiftJis => "SJIS",
            Charset::EucJp => "EUC-JP",
            Charset::Latin1 => "Latin1",
        }
    }

    /// The name wrapped in brackets, as appended to result lines
    pub fn bracket(self) -> String {
        format!("[{}]", self.name())
    }

    /// Looks a charset up by display name or common alias, ignoring case
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let found = match lower.as_str() {
            "utf-8" | "utf8" => Charset::Utf8,
            "utf-16" | "utf16" | "utf-16le" | "utf16le" => Charset::Utf16Le,
            "utf-16be" | "utf16be" => Charset::Utf16Be,
            "sjis" | "shift_jis" | "shift-jis" | "cp932" => Charset::ShiftJis,
            "euc-jp" | "eucjp" => Charset::EucJp,
            "latin1" | "iso-8859-1" | "windows-1252" | "cp1252" => Charset::Latin1,
            _ => return None,
        };
        Some(found)
    }

    fn encoding(self) -> &'static Encoding {
        match self {
            Charset::Utf8 => UTF_8,
            Charset::Utf16Le => UTF_16LE,
            Charset::Utf16Be => UTF_16BE,
            Charset::ShiftJis => SHIFT_JIS,
            Charset::EucJp => EUC_JP,
            Charset::Latin1 => WINDOWS_1252,
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl CharsetSetting {
    pub fn is_auto(self) -> bool {
        matches!(self, CharsetSetting::Auto)
    }
}

/// Byte order mark written in front of a file in the given charset
pub fn bom_for(charset: Charset) -> &'static [u8] {
    match charset {
        Charset::Utf8 => b"\xEF\xBB\xBF",
        Charset::Utf16Le => b"\xFF\xFE",
        Charset::Utf16Be => b"\xFE\xFF",
        _ => b"",
    }
}

/// Detects a Unicode byte order mark at the start of the buffer
pub fn detect_bom(buffer: &[u8]) -> Option<Charset> {
    [Charset::Utf8, Charset::Utf16Le, Charset::Utf16Be]
        .into_iter()
        .find(|&charset| buffer.starts_with(bom_for(charset)))
}

/// Guesses the charset of a buffer.
///
/// A byte order mark wins. Otherwise BOM-less UTF-16 is recognised by its NUL
/// byte pattern, then valid UTF-8 (plain ASCII included) is preferred, then the
/// legacy Japanese charsets if they decode without errors, and finally `fallback`.
pub fn detect(buffer: &[u8], fallback: Charset) -> CharsetGuess {
    let head = &buffer[..buffer.len().min(DETECT_WINDOW)];

    if let Some(charset) = detect_bom(head) {
        return CharsetGuess {
            charset,
            has_bom: true,
        };
    }

    let charset = if let Some(utf16) = guess_utf16(head) {
        utf16
    } else if is_utf8_prefix(head, buffer.len() > head.len()) {
        Charset::Utf8
    } else if decodes_cleanly(EUC_JP, head) {
        Charset::EucJp
    } else if decodes_cleanly(SHIFT_JIS, head) {
        Charset::ShiftJis
    } else {
        fallback
    };

    CharsetGuess {
        charset,
        has_bom: false,
    }
}

/// Inspects the head of a buffer in a charset chosen by the caller
pub fn check_bom(buffer: &[u8], charset: Charset) -> CharsetGuess {
    let bom = bom_for(charset);
    CharsetGuess {
        charset,
        has_bom: !bom.is_empty() && buffer.starts_with(bom),
    }
}

/// Decodes bytes that follow any byte order mark.
///
/// Returns the text and whether malformed sequences were replaced.
pub fn decode(bytes: &[u8], charset: Charset) -> (Cow<'_, str>, bool) {
    charset.encoding().decode_without_bom_handling(bytes)
}

/// Encodes text in the given charset, without a byte order mark
pub fn encode(text: &str, charset: Charset) -> Cow<'_, [u8]> {
    match charset {
        Charset::Utf8 => Cow::Borrowed(text.as_bytes()),
        Charset::Utf16Le => Cow::Owned(text.encode_utf16().flat_map(u16::to_le_bytes).collect()),
        Charset::Utf16Be => Cow::Owned(text.encode_utf16().flat_map(u16::to_be_bytes).collect()),
        other => {
            let (bytes, _, _) = other.encoding().encode(text);
            bytes
        }
    }
}

/// UTF-8 check that tolerates a multi-byte sequence cut off by the detect window
fn is_utf8_prefix(head: &[u8], truncated: bool) -> bool {
    match std::str::from_utf8(head) {
        Ok(_) => true,
        Err(e) => truncated && e.error_len().is_none(),
    }
}

fn guess_utf16(head: &[u8]) -> Option<Charset> {
    if head.len() < 2 {
        return None;
    }
    let pairs = head.len() / 2;
    let even_nuls = head.iter().step_by(2).filter(|&&b| b == 0).count();
    let odd_nuls = head.iter().skip(1).step_by(2).filter(|&&b| b == 0).count();

    // Mostly-ASCII UTF-16 has a NUL in every other byte.
    if odd_nuls * 10 >= pairs * 4 && even_nuls * 10 < pairs {
        Some(Charset::Utf16Le)
    } else if even_nuls * 10 >= pairs * 4 && odd_nuls * 10 < pairs {
        Some(Charset::Utf16Be)
    } else {
        None
    }
}

fn decodes_cleanly(encoding: &'static Encoding, head: &[u8]) -> bool {
    encoding
        .decode_without_bom_handling_and_without_replacement(head)
        .is_some()
}
