/// This module defines the error types for skrgrep and the policy for which of them
/// stop a grep session and which are folded into the output.
///
/// # Error Taxonomy
///
/// | Error                           | Effect on the session                           |
/// |---------------------------------|-------------------------------------------------|
/// | `InvalidPattern`, `InvalidFileKey` | Fatal, reported before any file is opened    |
/// | `FileOpen`, `FileRead`, `Encoding` | Written to the output as a line, session continues |
/// | `FileWrite`, `FileDelete`, `FileRename` | Written to the output, the original file is left untouched |
/// | `Matcher`                       | Fatal, the remaining traversal is abandoned     |
/// | `AlreadyRunning`                | The nested invocation is refused                |
///
/// Cancellation is not an error: it is reported through `GrepSummary::cancelled`.
///
/// # Rust vs .NET Error Handling
///
/// A .NET grep loop typically wraps every file in a try/catch and decides per
/// exception type whether to keep going:
/// ```csharp
/// try {
///     hits += SearchFile(path);
/// } catch (IOException ex) {
///     output.AppendLine($"{path}: {ex.Message}");
/// }
/// ```
///
/// Here the per-file processor returns a `GrepResult`, and the caller turns the
/// recoverable variants into output text with `GrepError::is_per_file`:
/// ```rust,ignore
/// match processor.search_file(&target) {
///     Ok(hits) => total += hits,
///     Err(e) if e.is_per_file() => message.push_str(&e.to_message_line()),
///     Err(e) => return Err(e),
/// }
/// ```
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Result type for grep operations
pub type GrepResult<T> = Result<T, GrepError>;

/// Errors that can occur while preparing or running a grep session
#[derive(Error, Debug)]
pub enum GrepError {
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Invalid file key '{key}': {reason}")]
    InvalidFileKey { key: String, reason: String },
    #[error("A grep session is already running")]
    AlreadyRunning,
    #[error("{}: file open error ({source})", .path.display())]
    FileOpen {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: file read error ({source})", .path.display())]
    FileRead {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: file write error ({source})", .path.display())]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: file delete error ({source})", .path.display())]
    FileDelete {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: file rename error ({source})", .path.display())]
    FileRename {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("{}: cannot decode as {charset}", .path.display())]
    Encoding { path: PathBuf, charset: String },
    #[error("Matcher failure: {0}")]
    Matcher(String),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Canonicalize the path and strip UNC prefixes so that
/// comparisons on Windows are consistent.
pub fn unify_path(original: &Path) -> PathBuf {
    let canonical = original
        .canonicalize()
        .unwrap_or_else(|_| original.to_path_buf());
    strip_unc_prefix(&canonical)
}

/// Strips the Windows UNC prefix (\\?\) from a path if present
fn strip_unc_prefix(p: &Path) -> PathBuf {
    let s = p.display().to_string();
    if let Some(stripped) = s.strip_prefix(r"\\?\") {
        PathBuf::from(stripped)
    } else {
        p.to_path_buf()
    }
}

impl GrepError {
    pub fn invalid_pattern(msg: impl Into<String>) -> Self {
        Self::InvalidPattern(msg.into())
    }

    pub fn invalid_file_key(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidFileKey {
            key: key.into(),
            reason: reason.into(),
        }
    }

    pub fn file_open(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileOpen {
            path: path.into(),
            source,
        }
    }

    pub fn file_read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRead {
            path: path.into(),
            source,
        }
    }

    pub fn file_write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileWrite {
            path: path.into(),
            source,
        }
    }

    pub fn file_delete(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileDelete {
            path: path.into(),
            source,
        }
    }

    pub fn file_rename(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::FileRename {
            path: path.into(),
            source,
        }
    }

    pub fn encoding(path: impl Into<PathBuf>, charset: impl Into<String>) -> Self {
        Self::Encoding {
            path: path.into(),
            charset: charset.into(),
        }
    }

    pub fn matcher(msg: impl Into<String>) -> Self {
        Self::Matcher(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// Returns true for errors that only affect the file being processed.
    pub fn is_per_file(&self) -> bool {
        matches!(
            self,
            Self::FileOpen { .. }
                | Self::FileRead { .. }
                | Self::FileWrite { .. }
                | Self::FileDelete { .. }
                | Self::FileRename { .. }
                | Self::Encoding { .. }
                | Self::IoError(_)
        )
    }

    /// Formats the error as one line of grep output.
    pub fn to_message_line(&self) -> String {
        format!("{}\r\n", self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::path::Path;

    #[test]
    fn test_error_creation() {
        let path = Path::new("test.txt");
        let err = GrepError::file_open(path, io::Error::from(io::ErrorKind::NotFound));
        assert!(matches!(err, GrepError::FileOpen { .. }));

        let err = GrepError::file_read(path, io::Error::from(io::ErrorKind::UnexpectedEof));
        assert!(matches!(err, GrepError::FileRead { .. }));

        let err = GrepError::invalid_pattern("unclosed group");
        assert!(matches!(err, GrepError::InvalidPattern(_)));

        let err = GrepError::invalid_file_key("[a", "unclosed bracket");
        assert!(matches!(err, GrepError::InvalidFileKey { .. }));

        let err = GrepError::matcher("subject too large");
        assert!(matches!(err, GrepError::Matcher(_)));
    }

    #[test]
    fn test_error_messages() {
        let err = GrepError::invalid_pattern("unclosed group");
        assert_eq!(err.to_string(), "Invalid pattern: unclosed group");

        let err = GrepError::config_error("Missing required field");
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required field"
        );

        let err = GrepError::encoding("a.txt", "UTF-8");
        assert_eq!(err.to_string(), "a.txt: cannot decode as UTF-8");
        assert_eq!(err.to_message_line(), "a.txt: cannot decode as UTF-8\r\n");

        assert_eq!(
            GrepError::AlreadyRunning.to_string(),
            "A grep session is already running"
        );
    }

    #[test]
    fn test_per_file_classification() {
        let io_err = || io::Error::from(io::ErrorKind::PermissionDenied);
        assert!(GrepError::file_open("a", io_err()).is_per_file());
        assert!(GrepError::file_write("a.skrnew", io_err()).is_per_file());
        assert!(GrepError::file_rename("a.bak", io_err()).is_per_file());
        assert!(!GrepError::invalid_pattern("x").is_per_file());
        assert!(!GrepError::matcher("x").is_per_file());
        assert!(!GrepError::AlreadyRunning.is_per_file());
    }
}
