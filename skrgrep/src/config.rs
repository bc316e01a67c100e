use config::{Config as ConfigBuilder, ConfigError, File};
use serde::{Deserialize, Serialize};
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use crate::encoding::{Charset, CharsetSetting};

/// Configuration for a grep session, demonstrating Rust's strong typing
/// compared to .NET's optional configuration pattern.
///
/// # Configuration Locations
///
/// The configuration is merged from these locations, later ones overriding earlier ones:
/// 1. Global `$HOME/.config/skrgrep/config.yaml`
/// 2. Local `.skrgrep.yaml` in the current directory
/// 3. Custom config file specified via `--config` flag (must exist)
///
/// # Configuration Format
///
/// The configuration uses YAML format. Every field is optional. Example:
/// ```yaml
/// # File name keys: ';' separated, '!' excludes files, '#' excludes folders
/// file_keys: "*.rs;*.toml;#target;!*.bak"
///
/// # Worker threads (default: CPU cores)
/// thread_count: 4
///
/// # Log level (trace, debug, info, warn, error)
/// log_level: "info"
///
/// # Charset used when grep output is streamed to stdout
/// output_charset: utf-8
///
/// options:
///   recurse: true
///   header: true
///   charset: auto          # or: { fixed: sjis }
///   line_type: match       # match | line | not-matched
///   style: group-by-file   # normal | group-by-file | result-only
///   first_hit_only: false
///   backup: true
///   encoding_mode: lossy   # lossy | fail-fast
/// ```
///
/// # CLI Integration
///
/// When using the CLI, command-line arguments take precedence over config file values.
/// The merging behavior is defined in the `merge_with_cli` method.
///
/// # Rust vs .NET Configuration
///
/// .NET's IConfiguration pattern:
/// ```csharp
/// public class GrepOptions
/// {
///     public bool Recurse { get; set; }
///     public int LineType { get; set; }  // 0, 1 or 2, nothing stops a 7
/// }
/// ```
///
/// Rust's strongly-typed configuration:
/// ```rust,ignore
/// #[derive(Deserialize)]
/// pub struct GrepOptions {
///     pub recurse: bool,
///     pub line_type: OutputLineType, // only the three valid values deserialize
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GrepConfig {
    /// Options applied to every grep invocation
    #[serde(default)]
    pub options: GrepOptions,

    /// Number of worker threads used for file targets
    /// Defaults to number of CPU cores if not specified
    #[serde(default = "default_thread_count")]
    pub thread_count: NonZeroUsize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// File name keys used when none are given on the command line
    #[serde(default = "default_file_keys")]
    pub file_keys: String,

    /// Charset of the bytes written when output goes to stdout
    #[serde(default = "default_output_charset")]
    pub output_charset: Charset,
}

/// How much of a matching line ends up in the output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputLineType {
    /// Only the matched part
    #[default]
    Match,
    /// The whole matched line
    Line,
    /// Lines that do not match
    NotMatched,
}

/// Layout of the result lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum OutputStyle {
    /// `path(line,col): text`
    #[default]
    Normal,
    /// One heading per file followed by `(line,col): text` records
    GroupByFile,
    /// The matched text only
    ResultOnly,
}

/// How undecodable bytes in a file are handled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum EncodingMode {
    /// Replace malformed sequences with U+FFFD and keep going
    #[default]
    Lossy,
    /// Report the file as an error line and skip it
    FailFast,
}

/// Options of one grep invocation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GrepOptions {
    /// Set by the invoked command only, never read from a config file
    #[serde(skip)]
    pub replace: bool,
    pub recurse: bool,
    /// Stream results to stdout as they arrive instead of collecting them
    pub to_stdout: bool,
    /// Emit the search condition header and the totals footer
    pub header: bool,
    pub charset: CharsetSetting,
    pub line_type: OutputLineType,
    pub style: OutputStyle,
    pub first_hit_only: bool,
    /// Replacement text comes from the clipboard
    #[serde(skip)]
    pub paste: bool,
    /// Keep the original as `<file>.bak` when replacing
    pub backup: bool,
    /// Print the searched folder once and show paths relative to it
    pub output_base_folder: bool,
    /// Print a heading for every folder that has hits
    pub separate_folder: bool,
    pub encoding_mode: EncodingMode,
    /// Change the process directory to the first searched folder afterwards
    pub set_current_dir: bool,
}

impl Default for GrepOptions {
    fn default() -> Self {
        Self {
            replace: false,
            recurse: false,
            to_stdout: false,
            header: true,
            charset: CharsetSetting::Auto,
            line_type: OutputLineType::Match,
            style: OutputStyle::Normal,
            first_hit_only: false,
            paste: false,
            backup: false,
            output_base_folder: false,
            separate_folder: false,
            encoding_mode: EncodingMode::Lossy,
            set_current_dir: false,
        }
    }
}

impl OutputLineType {
    /// Maps the numeric codes 0, 1 and 2 used on the command line
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::Match),
            1 => Some(Self::Line),
            2 => Some(Self::NotMatched),
            _ => None,
        }
    }
}

impl OutputStyle {
    /// Maps the numeric codes 1, 2 and 3 used on the command line
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(Self::Normal),
            2 => Some(Self::GroupByFile),
            3 => Some(Self::ResultOnly),
            _ => None,
        }
    }
}

impl GrepOptions {
    /// Line type actually used: unmatched-line output cannot be combined with replace
    pub fn effective_line_type(&self) -> OutputLineType {
        if self.replace && self.line_type == OutputLineType::NotMatched {
            OutputLineType::Line
        } else {
            self.line_type
        }
    }

    /// True when records are prefixed with `・` because folder headings are printed
    pub fn folder_output(&self) -> bool {
        self.output_base_folder || self.separate_folder
    }
}

fn default_thread_count() -> NonZeroUsize {
    NonZeroUsize::new(num_cpus::get()).unwrap_or(NonZeroUsize::MIN)
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_file_keys() -> String {
    "*".to_string()
}

fn default_output_charset() -> Charset {
    Charset::Utf8
}

impl Default for GrepConfig {
    fn default() -> Self {
        Self {
            options: GrepOptions::default(),
            thread_count: default_thread_count(),
            log_level: default_log_level(),
            file_keys: default_file_keys(),
            output_charset: default_output_charset(),
        }
    }
}

impl GrepConfig {
    /// Loads configuration from the default locations
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(None)
    }

    /// Loads configuration from the default locations plus a specific file
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = ConfigBuilder::builder();

        // Optional config locations
        let config_files = [
            // Global config
            dirs::config_dir().map(|p| p.join("skrgrep/config.yaml")),
            // Local config
            Some(PathBuf::from(".skrgrep.yaml")),
        ];

        for path in config_files.iter().flatten() {
            if path.exists() {
                builder = builder.add_source(File::from(path.as_path()));
            }
        }

        // An explicitly named file is required
        if let Some(path) = config_path {
            builder = builder.add_source(File::from(path).required(true));
        }

        builder.build()?.try_deserialize()
    }

    /// Merges CLI arguments with configuration file values
    pub fn merge_with_cli(mut self, cli_config: GrepConfig) -> Self {
        let defaults = GrepOptions::default();
        let cli = cli_config.options;

        // Flags only override when the CLI moved them away from their default
        macro_rules! take_if_set {
            ($($field:ident),*) => {
                $(if cli.$field != defaults.$field {
                    self.options.$field = cli.$field;
                })*
            };
        }
        // The command decides between search and replace
        self.options.replace = cli.replace;
        self.options.paste = cli.paste;
        take_if_set!(
            recurse,
            to_stdout,
            header,
            charset,
            line_type,
            style,
            first_hit_only,
            backup,
            output_base_folder,
            separate_folder,
            encoding_mode,
            set_current_dir
        );

        // Always use CLI thread count if specified
        self.thread_count = cli_config.thread_count;
        if cli_config.log_level != default_log_level() {
            self.log_level = cli_config.log_level;
        }
        if cli_config.file_keys != default_file_keys() {
            self.file_keys = cli_config.file_keys;
        }
        if cli_config.output_charset != default_output_charset() {
            self.output_charset = cli_config.output_charset;
        }
        self
    }
}
