//! Layout of grep result lines and headings.

use crate::config::{GrepOptions, OutputStyle};
use crate::line::is_line_delimiter;

/// Longest record text in normal style, in characters
pub const NORMAL_MAX_CHARS: usize = 2000;
/// Longest record text in group-by-file and result-only styles
pub const WIDE_MAX_CHARS: usize = 2500;

/// One hit as it appears in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitRecord<'a> {
    /// 1-based line number
    pub line: u64,
    /// 1-based character column
    pub column: usize,
    /// Matched text or matched line, depending on the output line type
    pub text: &'a str,
}

/// Formatting parameters for the records of one file
#[derive(Debug, Clone, Copy)]
pub struct RecordFormat<'a> {
    pub style: OutputStyle,
    /// `・` prefix in normal style when folder headings are printed
    pub folder_output: bool,
    pub separate_folder: bool,
    pub display_path: &'a str,
    /// Bracketed charset name, empty unless the charset was detected
    pub code: &'a str,
}

impl<'a> RecordFormat<'a> {
    pub fn new(options: &GrepOptions, display_path: &'a str, code: &'a str) -> Self {
        Self {
            style: options.style,
            folder_output: options.folder_output(),
            separate_folder: options.separate_folder,
            display_path,
            code,
        }
    }

    /// Appends the per-file heading of group-by-file style
    pub fn append_file_heading(&self, out: &mut String) {
        if self.style != OutputStyle::GroupByFile {
            return;
        }
        out.push(if self.separate_folder { '◆' } else { '■' });
        out.push('"');
        out.push_str(self.display_path);
        out.push('"');
        out.push_str(self.code);
        out.push_str("\r\n");
    }

    /// Appends one result line
    pub fn append_record(&self, out: &mut String, record: &HitRecord<'_>) {
        let max_chars = match self.style {
            OutputStyle::Normal => {
                if self.folder_output {
                    out.push('・');
                }
                out.push_str(self.display_path);
                out.push_str(&format!("({},{})", record.line, record.column));
                out.push_str(self.code);
                out.push_str(": ");
                NORMAL_MAX_CHARS
            }
            OutputStyle::GroupByFile => {
                out.push_str(&format!("・({:6},{:<5}): ", record.line, record.column));
                WIDE_MAX_CHARS
            }
            OutputStyle::ResultOnly => WIDE_MAX_CHARS,
        };

        let text = truncate_chars(record.text, max_chars);
        out.push_str(text);
        // Text that already ends a line keeps its own terminator
        if !text.chars().next_back().is_some_and(is_line_delimiter) {
            out.push_str("\r\n");
        }
    }
}

/// Heading printed once before the first hit below a folder list entry
pub fn base_folder_heading(options: &GrepOptions, base: &str) -> String {
    let mark = if !options.separate_folder && options.style == OutputStyle::Normal {
        '■'
    } else {
        '◎'
    };
    format!("{}\"{}\"\r\n", mark, base)
}

/// Heading printed before the first hit in each folder
pub fn folder_heading(label: &str) -> String {
    if label.is_empty() {
        "■\r\n".to_string()
    } else {
        format!("■\"{}\"\r\n", label)
    }
}

/// Longest prefix of `text` with at most `max_chars` characters
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((end, _)) => &text[..end],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options(style: OutputStyle) -> GrepOptions {
        GrepOptions {
            style,
            ..GrepOptions::default()
        }
    }

    #[test]
    fn test_normal_record() {
        let opts = options(OutputStyle::Normal);
        let format = RecordFormat::new(&opts, "src/a.txt", "[UTF-8]");
        let mut out = String::new();
        format.append_record(
            &mut out,
            &HitRecord {
                line: 12,
                column: 5,
                text: "needle",
            },
        );
        assert_eq!(out, "src/a.txt(12,5)[UTF-8]: needle\r\n");
    }

    #[test]
    fn test_record_keeps_line_terminator() {
        let opts = options(OutputStyle::Normal);
        let format = RecordFormat::new(&opts, "a.txt", "");
        let mut out = String::new();
        format.append_record(
            &mut out,
            &HitRecord {
                line: 1,
                column: 1,
                text: "whole line\n",
            },
        );
        assert_eq!(out, "a.txt(1,1): whole line\n");
    }

    #[test]
    fn test_group_by_file_record() {
        let mut opts = options(OutputStyle::GroupByFile);
        let format = RecordFormat::new(&opts, "/x/a.txt", "[SJIS]");
        let mut out = String::new();
        format.append_file_heading(&mut out);
        format.append_record(
            &mut out,
            &HitRecord {
                line: 3,
                column: 14,
                text: "hit",
            },
        );
        assert_eq!(out, "■\"/x/a.txt\"[SJIS]\r\n・(     3,14   ): hit\r\n");

        opts.separate_folder = true;
        let mut out = String::new();
        RecordFormat::new(&opts, "a.txt", "").append_file_heading(&mut out);
        assert_eq!(out, "◆\"a.txt\"\r\n");
    }

    #[test]
    fn test_result_only_and_truncation() {
        let opts = options(OutputStyle::ResultOnly);
        let format = RecordFormat::new(&opts, "a.txt", "");
        let long = "x".repeat(WIDE_MAX_CHARS + 10);
        let mut out = String::new();
        format.append_file_heading(&mut out);
        format.append_record(
            &mut out,
            &HitRecord {
                line: 1,
                column: 1,
                text: &long,
            },
        );
        assert_eq!(out.len(), WIDE_MAX_CHARS + 2);
        assert!(out.ends_with("x\r\n"));
    }

    #[test]
    fn test_folder_output_prefix() {
        let opts = GrepOptions {
            output_base_folder: true,
            ..GrepOptions::default()
        };
        let format = RecordFormat::new(&opts, "sub/a.txt", "");
        let mut out = String::new();
        format.append_record(
            &mut out,
            &HitRecord {
                line: 2,
                column: 1,
                text: "t",
            },
        );
        assert_eq!(out, "・sub/a.txt(2,1): t\r\n");
    }

    #[test]
    fn test_headings() {
        let normal = options(OutputStyle::Normal);
        assert_eq!(base_folder_heading(&normal, "/src"), "■\"/src\"\r\n");
        let grouped = options(OutputStyle::GroupByFile);
        assert_eq!(base_folder_heading(&grouped, "/src"), "◎\"/src\"\r\n");
        assert_eq!(folder_heading("sub"), "■\"sub\"\r\n");
        assert_eq!(folder_heading(""), "■\r\n");
    }
}
