//! Header and footer text of a grep session.

use crate::config::{GrepOptions, OutputLineType};
use crate::encoding::CharsetSetting;
use crate::filters::{chop_separator, format_path_list, FileKeys};
use crate::pattern::SearchPattern;

/// Line printed when the session was cancelled
pub const SUSPENDED_LINE: &str = "Suspended.\r\n";

/// Line printed when an unknown window handle is targeted
pub const HWND_ERROR_LINE: &str = "HWND handle error.\r\n";

/// Description of a session for its header
#[derive(Debug, Clone, Copy)]
pub struct HeaderInfo<'a> {
    pub pattern: &'a SearchPattern,
    /// Replacement text; `None` for a plain search
    pub replace_text: Option<&'a str>,
    /// Target description: the file keys or `Window:[title]`
    pub target: &'a str,
    pub folders: &'a [String],
    pub keys: &'a FileKeys,
    pub options: &'a GrepOptions,
}

/// Builds the search condition block printed before any result
pub fn build_header(info: &HeaderInfo<'_>) -> String {
    let options = info.options;
    let pattern = info.pattern;
    let mut out = String::from("\r\n□Search condition  ");

    if pattern.is_file_search() {
        out.push_str("(File search)\r\n");
    } else {
        out.push_str(&format!("\"{}\"\r\n", pattern.raw_text));
    }

    if let Some(replace_text) = info.replace_text {
        out.push_str("Replace to  ");
        if options.paste {
            out.push_str("(clipboard)\r\n");
        } else {
            out.push_str(&format!("\"{}\"\r\n", replace_text));
        }
    }

    out.push_str(&format!("Target      {}\r\n", info.target));

    let folders: Vec<&str> = info.folders.iter().map(|f| chop_separator(f)).collect();
    out.push_str(&format!("Folder      {}\r\n", format_path_list(&folders)));
    out.push_str(&format!(
        "Exclude file    {}\r\n",
        format_path_list(&info.keys.exclude_file_keys())
    ));
    out.push_str(&format!(
        "Exclude folder  {}\r\n",
        format_path_list(&info.keys.exclude_folder_keys())
    ));

    out.push_str(if options.recurse {
        "    (Search subfolders)\r\n"
    } else {
        "    (Do not search subfolders)\r\n"
    });

    if !pattern.is_file_search() {
        if pattern.word_only {
            out.push_str("    (Whole word)\r\n");
        }
        out.push_str(if pattern.case_sensitive {
            "    (Case sensitive)\r\n"
        } else {
            "    (Ignore case)\r\n"
        });
        if pattern.is_regex {
            out.push_str("    (Regular expression: regex)\r\n");
        }
    }

    match options.charset {
        CharsetSetting::Auto => out.push_str("    (Charset auto detection)\r\n"),
        CharsetSetting::Fixed(charset) => {
            out.push_str(&format!("    (Charset: {})\r\n", charset.name()))
        }
    }

    if !pattern.is_file_search() {
        out.push_str(match options.effective_line_type() {
            OutputLineType::Line => "    (Output matched lines)\r\n",
            OutputLineType::NotMatched => "    (Output unmatched lines)\r\n",
            OutputLineType::Match if info.replace_text.is_some()
                && pattern.is_regex
                && !options.paste =>
            {
                "    (Output the first line of the match)\r\n"
            }
            OutputLineType::Match => "    (Output matched text)\r\n",
        });
        if options.first_hit_only {
            out.push_str("    (First match in each file only)\r\n");
        }
    }

    out.push_str("\r\n\r\n");
    out
}

/// Builds the closing lines: the total, followed by the suspended marker when
/// the session was cancelled
pub fn footer(hit_count: u64, replace: bool, cancelled: bool) -> String {
    let mut out = if replace {
        format!("{} replacement(s) made.\r\n", hit_count)
    } else {
        format!("{} match(es) found.\r\n", hit_count)
    };
    if cancelled {
        out.push_str(SUSPENDED_LINE);
    }
    out
}
