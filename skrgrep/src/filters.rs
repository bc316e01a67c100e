/// This module parses the file name keys of a grep invocation and the folder list,
/// demonstrating how Rust models "one string, many meanings" input with types
/// rather than the flag-and-string bags common in .NET dialog code.
///
/// # Key Syntax
///
/// Keys are separated by `;`. A key in double quotes may contain `;`.
///
/// | Key            | Meaning                                             |
/// |----------------|-----------------------------------------------------|
/// | `*.rs`         | search files whose name matches                     |
/// | `!*.bak`       | skip files whose name matches                       |
/// | `#target`      | do not descend into folders whose name matches      |
/// | `!/abs/x.log`  | skip this file (glob expanded once per session)     |
/// | `#/abs/build`  | skip this folder (glob expanded once per session)   |
///
/// `*.*` also matches names without an extension. When no search key is
/// given, every file is searched.
///
/// # Rust vs .NET Parsing
///
/// .NET code often keeps the raw text and re-parses it wherever it is needed:
/// ```csharp
/// foreach (var key in keys.Split(';')) {
///     if (key.StartsWith("!")) { ... }
/// }
/// ```
///
/// Here the keys are parsed once into a [`FileKeys`] value, and malformed keys
/// are reported before any file is opened:
/// ```rust,ignore
/// let keys = FileKeys::parse("*.rs;!*.bak;#target")?;
/// assert!(keys.matches_file("main.rs"));
/// ```
use glob::{MatchOptions, Pattern};
use std::path::PathBuf;

use crate::errors::{GrepError, GrepResult};

/// Name matching is case-insensitive where the file system is
fn match_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: !cfg!(windows),
        require_literal_separator: false,
        require_literal_leading_dot: false,
    }
}

/// A glob key with its source text
#[derive(Debug, Clone)]
struct NameKey {
    text: String,
    pattern: Pattern,
}

impl NameKey {
    fn new(text: &str) -> GrepResult<Self> {
        // "*.*" is meant as "any file", extension or not
        let glob = if text == "*.*" { "*" } else { text };
        let pattern =
            Pattern::new(glob).map_err(|e| GrepError::invalid_file_key(text, e.msg))?;
        Ok(Self {
            text: text.to_string(),
            pattern,
        })
    }

    fn matches(&self, name: &str) -> bool {
        self.pattern.matches_with(name, match_options())
    }
}

/// Parsed file name keys
#[derive(Debug, Clone, Default)]
pub struct FileKeys {
    search: Vec<NameKey>,
    exclude_files: Vec<NameKey>,
    exclude_folders: Vec<NameKey>,
    abs_exclude_files: Vec<String>,
    abs_exclude_folders: Vec<String>,
}

impl FileKeys {
    /// Parses `;` separated keys
    pub fn parse(text: &str) -> GrepResult<Self> {
        let mut keys = FileKeys::default();

        for raw in split_list(text) {
            let (kind, body) = match raw.chars().next() {
                Some('!') => ('!', &raw[1..]),
                Some('#') => ('#', &raw[1..]),
                _ => (' ', raw.as_str()),
            };
            let body = body.trim();
            if body.is_empty() {
                return Err(GrepError::invalid_file_key(raw.as_str(), "empty key"));
            }

            let has_separator = body.contains(['/', '\\']);
            match (kind, has_separator) {
                ('!', true) => keys.abs_exclude_files.push(body.to_string()),
                ('#', true) => keys.abs_exclude_folders.push(body.to_string()),
                ('!', false) => keys.exclude_files.push(NameKey::new(body)?),
                ('#', false) => keys.exclude_folders.push(NameKey::new(body)?),
                (_, true) => {
                    return Err(GrepError::invalid_file_key(
                        body,
                        "search keys must be file names",
                    ))
                }
                (_, false) => keys.search.push(NameKey::new(body)?),
            }
        }

        Ok(keys)
    }

    /// True when a file with this name is searched
    pub fn matches_file(&self, name: &str) -> bool {
        let included = self.search.is_empty() || self.search.iter().any(|k| k.matches(name));
        included && !self.exclude_files.iter().any(|k| k.matches(name))
    }

    /// True when a folder with this name is skipped entirely
    pub fn is_excluded_folder(&self, name: &str) -> bool {
        self.exclude_folders.iter().any(|k| k.matches(name))
    }

    pub fn abs_exclude_files(&self) -> &[String] {
        &self.abs_exclude_files
    }

    pub fn abs_exclude_folders(&self) -> &[String] {
        &self.abs_exclude_folders
    }

    /// Search keys as shown in the header
    pub fn search_keys(&self) -> Vec<&str> {
        if self.search.is_empty() {
            vec!["*"]
        } else {
            self.search.iter().map(|k| k.text.as_str()).collect()
        }
    }

    /// Excluded file keys, relative and absolute, as shown in the header
    pub fn exclude_file_keys(&self) -> Vec<&str> {
        self.exclude_files
            .iter()
            .map(|k| k.text.as_str())
            .chain(self.abs_exclude_files.iter().map(String::as_str))
            .collect()
    }

    /// Excluded folder keys, relative and absolute, as shown in the header
    pub fn exclude_folder_keys(&self) -> Vec<&str> {
        self.exclude_folders
            .iter()
            .map(|k| k.text.as_str())
            .chain(self.abs_exclude_folders.iter().map(String::as_str))
            .collect()
    }
}

/// Splits a `;` separated list, honouring double quotes and dropping empty items
pub fn split_list(text: &str) -> Vec<String> {
    let mut items = Vec::new();
    let mut current = String::new();
    let mut quoted = false;

    for c in text.chars() {
        match c {
            '"' => quoted = !quoted,
            ';' if !quoted => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    items.push(current);

    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}

/// Parses the folder list of a grep invocation
pub fn parse_folder_list(text: &str) -> Vec<PathBuf> {
    split_list(text).into_iter().map(PathBuf::from).collect()
}

/// Removes one trailing path separator, keeping a bare root intact
pub fn chop_separator(path: &str) -> &str {
    match path.strip_suffix(['/', '\\']) {
        Some(rest) if !rest.is_empty() && !rest.ends_with(':') => rest,
        _ => path,
    }
}

/// Joins items with `;`, quoting those that contain `;`
pub fn format_path_list<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .map(|item| {
            let item = item.as_ref();
            if item.contains(';') {
                format!("\"{}\"", item)
            } else {
                item.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join(";")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_kinds() {
        let keys = FileKeys::parse("*.rs; *.toml ;!*.bak;#target;#/tmp/build;!/var/x.log").unwrap();
        assert_eq!(keys.search_keys(), vec!["*.rs", "*.toml"]);
        assert_eq!(keys.exclude_file_keys(), vec!["*.bak", "/var/x.log"]);
        assert_eq!(keys.exclude_folder_keys(), vec!["target", "/tmp/build"]);
        assert_eq!(keys.abs_exclude_folders(), ["/tmp/build".to_string()]);
        assert_eq!(keys.abs_exclude_files(), ["/var/x.log".to_string()]);
    }

    #[test]
    fn test_matches_file() {
        let keys = FileKeys::parse("*.rs;!test_*.rs").unwrap();
        assert!(keys.matches_file("main.rs"));
        assert!(!keys.matches_file("test_main.rs"));
        assert!(!keys.matches_file("main.py"));

        let everything = FileKeys::parse("").unwrap();
        assert!(everything.matches_file("Makefile"));
        assert_eq!(everything.search_keys(), vec!["*"]);
    }

    #[test]
    fn test_star_dot_star_matches_names_without_extension() {
        let keys = FileKeys::parse("*.*").unwrap();
        assert!(keys.matches_file("Makefile"));
        assert!(keys.matches_file("a.txt"));
        assert_eq!(keys.search_keys(), vec!["*.*"]);
    }

    #[test]
    fn test_excluded_folders() {
        let keys = FileKeys::parse("#.git;#node_*").unwrap();
        assert!(keys.is_excluded_folder(".git"));
        assert!(keys.is_excluded_folder("node_modules"));
        assert!(!keys.is_excluded_folder("src"));
    }

    #[test]
    fn test_invalid_keys() {
        let err = FileKeys::parse("[a").unwrap_err();
        assert!(matches!(err, GrepError::InvalidFileKey { .. }));

        assert!(FileKeys::parse("!").is_err());
        assert!(FileKeys::parse("src/*.rs").is_err());
    }

    #[test]
    fn test_quoted_items() {
        assert_eq!(
            split_list(r#""a;b";c;;  d  "#),
            vec!["a;b".to_string(), "c".to_string(), "d".to_string()]
        );
        assert_eq!(
            parse_folder_list("/src;\"/my;dir\""),
            vec![PathBuf::from("/src"), PathBuf::from("/my;dir")]
        );
    }

    #[test]
    fn test_format_and_chop() {
        assert_eq!(format_path_list(&["a", "b;c"]), r#"a;"b;c""#);
        assert_eq!(chop_separator("/src/"), "/src");
        assert_eq!(chop_separator(r"C:\src\"), r"C:\src");
        assert_eq!(chop_separator("/"), "/");
        assert_eq!(chop_separator(r"C:\"), r"C:\");
        assert_eq!(chop_separator("src"), "src");
    }
}
