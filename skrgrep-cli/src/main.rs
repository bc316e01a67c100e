use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use skrgrep::{
    config::EncodingMode, CancelToken, Charset, CharsetSetting, GrepConfig, GrepError,
    GrepOptions, GrepRequest, GrepResult, GrepSession, OutputLineType, OutputStyle, OutputSink,
    ProgressReporter, SearchPattern, StdoutSink, StringSink,
};
use std::io::{self, IsTerminal, Read};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct CommonArgs {
    /// Search key; an empty key lists the matching files
    pattern: String,

    /// File name keys separated by ';' ('!' excludes files, '#' excludes folders)
    #[arg(short = 'f', long = "files")]
    file_keys: Option<String>,

    /// Folders to search, separated by ';'
    #[arg(short = 'd', long = "folder", default_value = ".")]
    folders: String,

    /// Search subfolders
    #[arg(short = 'R', long)]
    recurse: bool,

    /// Treat the key as a regular expression
    #[arg(short = 'E', long)]
    regex: bool,

    /// Match whole words only
    #[arg(short = 'w', long = "word")]
    word_only: bool,

    /// Match case exactly
    #[arg(short = 'c', long)]
    case_sensitive: bool,

    /// Charset of the files: auto, utf-8, utf-16le, utf-16be, sjis, euc-jp, latin1
    #[arg(long)]
    charset: Option<String>,

    /// Output line type: 0 matched text, 1 matched lines, 2 unmatched lines
    #[arg(short = 't', long, value_parser = clap::value_parser!(u8).range(0..=2))]
    line_type: Option<u8>,

    /// Output style: 1 normal, 2 grouped by file, 3 results only
    #[arg(short = 's', long, value_parser = clap::value_parser!(u8).range(1..=3))]
    style: Option<u8>,

    /// Stop at the first match in each file
    #[arg(long)]
    first_only: bool,

    /// Print the searched folder once and show paths relative to it
    #[arg(long)]
    base_folder: bool,

    /// Print a heading for every folder with matches
    #[arg(long)]
    separate_folder: bool,

    /// Omit the search condition header and the totals
    #[arg(long)]
    no_header: bool,

    /// Stream results as they arrive
    #[arg(long)]
    stdout: bool,

    /// Charset of streamed output
    #[arg(long)]
    output_charset: Option<String>,

    /// Report undecodable files instead of searching them lossily
    #[arg(long)]
    fail_fast: bool,

    /// Change to the first searched folder afterwards
    #[arg(long)]
    chdir: bool,

    /// Number of threads to use
    #[arg(short = 'j', long)]
    threads: Option<NonZeroUsize>,

    /// Configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Hide the progress spinner
    #[arg(short = 'q', long)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for a key in files
    Search(Box<CommonArgs>),

    /// Replace a key in files
    Replace {
        #[command(flatten)]
        common: Box<CommonArgs>,

        /// Replacement text; `$1` and `${name}` refer to regex groups
        replacement: Option<String>,

        /// Read the replacement from stdin and insert it verbatim
        #[arg(long, conflicts_with = "replacement")]
        paste: bool,

        /// Keep each original as <file>.bak
        #[arg(short = 'b', long)]
        backup: bool,
    },
}

/// Spinner on stderr that shows the folder, file and hit count
struct SpinnerProgress {
    bar: ProgressBar,
    cancel: CancelToken,
    hits: u64,
}

impl SpinnerProgress {
    fn new(quiet: bool, cancel: CancelToken) -> Self {
        let bar = if quiet || !io::stderr().is_terminal() {
            ProgressBar::hidden()
        } else {
            let bar = ProgressBar::with_draw_target(None, ProgressDrawTarget::stderr());
            bar.set_style(
                ProgressStyle::with_template("{spinner:.green} {prefix:.bold} {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_spinner()),
            );
            bar.enable_steady_tick(Duration::from_millis(120));
            bar
        };
        Self {
            bar,
            cancel,
            hits: 0,
        }
    }
}

impl ProgressReporter for SpinnerProgress {
    fn is_cancel_requested(&mut self) -> bool {
        self.cancel.is_cancelled()
    }

    fn set_current_file(&mut self, label: &str) {
        self.bar.set_message(format!("[{} hits] {}", self.hits, label));
    }

    fn set_current_folder(&mut self, label: &str) {
        self.bar.set_prefix(label.to_string());
    }

    fn set_hit_count(&mut self, hits: u64) {
        self.hits = hits;
    }

    fn close(&mut self) {
        self.bar.finish_and_clear();
    }
}

fn main() -> GrepResult<()> {
    run()
}

fn run() -> GrepResult<()> {
    let cli = Cli::parse();

    let (common, replace) = match cli.command {
        Commands::Search(common) => (common, None),
        Commands::Replace {
            common,
            replacement,
            paste,
            backup,
        } => {
            let text = if paste {
                let mut text = String::new();
                io::stdin().read_to_string(&mut text)?;
                text
            } else {
                replacement.unwrap_or_default()
            };
            (common, Some((text, paste, backup)))
        }
    };

    let file_config = GrepConfig::load_from(common.config.as_deref())
        .map_err(|e| GrepError::config_error(e.to_string()))?;
    let cli_config = cli_config(&common, replace.as_ref(), &file_config)?;
    let config = file_config.merge_with_cli(cli_config);
    init_logging(&config.log_level);
    debug!("Effective options: {:?}", config.options);

    let pattern = SearchPattern::new(&common.pattern)
        .regex(common.regex)
        .word_only(common.word_only)
        .case_sensitive(common.case_sensitive);
    let file_keys = common.file_keys.as_deref().unwrap_or(&config.file_keys);
    let mut request = GrepRequest::new(pattern, file_keys, &common.folders);
    request.options = config.options.clone();
    request.thread_count = config.thread_count;
    request.replace_text = replace.map(|(text, _, _)| text);

    let session = GrepSession::new();
    let cancel = CancelToken::new();
    let handler_token = cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || handler_token.cancel()) {
        warn!("Could not install the Ctrl-C handler: {}", e);
    }
    let mut progress = SpinnerProgress::new(common.quiet, cancel);

    if config.options.to_stdout {
        let mut sink = StdoutSink::stdout(config.output_charset);
        session.run(&request, &mut progress, &mut sink)?;
        if sink.has_failed() {
            debug!("Output stream closed early");
        }
    } else {
        let mut sink = StringSink::new();
        session.run(&request, &mut progress, &mut sink)?;
        print_results(sink.text(), config.output_charset);
    }
    Ok(())
}

/// Builds the configuration expressed by the command line
fn cli_config(
    common: &CommonArgs,
    replace: Option<&(String, bool, bool)>,
    file_config: &GrepConfig,
) -> GrepResult<GrepConfig> {
    let defaults = GrepConfig::default();
    let mut options = GrepOptions {
        recurse: common.recurse,
        to_stdout: common.stdout,
        header: !common.no_header,
        first_hit_only: common.first_only,
        output_base_folder: common.base_folder,
        separate_folder: common.separate_folder,
        set_current_dir: common.chdir,
        ..GrepOptions::default()
    };
    if let Some(name) = &common.charset {
        options.charset = parse_charset_setting(name)?;
    }
    if let Some(code) = common.line_type {
        options.line_type = OutputLineType::from_code(code)
            .ok_or_else(|| GrepError::config_error(format!("Invalid line type: {}", code)))?;
    }
    if let Some(code) = common.style {
        options.style = OutputStyle::from_code(code)
            .ok_or_else(|| GrepError::config_error(format!("Invalid style: {}", code)))?;
    }
    if common.fail_fast {
        options.encoding_mode = EncodingMode::FailFast;
    }
    if let Some((_, paste, backup)) = replace {
        options.replace = true;
        options.paste = *paste;
        options.backup = *backup;
    }

    let output_charset = match &common.output_charset {
        Some(name) => parse_charset(name)?,
        None => defaults.output_charset,
    };

    Ok(GrepConfig {
        options,
        thread_count: common.threads.unwrap_or(file_config.thread_count),
        log_level: common.log_level.clone().unwrap_or(defaults.log_level),
        file_keys: defaults.file_keys,
        output_charset,
    })
}

fn parse_charset(name: &str) -> GrepResult<Charset> {
    Charset::from_name(name)
        .ok_or_else(|| GrepError::config_error(format!("Unknown charset: {}", name)))
}

fn parse_charset_setting(name: &str) -> GrepResult<CharsetSetting> {
    if name.eq_ignore_ascii_case("auto") {
        Ok(CharsetSetting::Auto)
    } else {
        parse_charset(name).map(CharsetSetting::Fixed)
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    // A second initialisation only happens in tests and is harmless
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

/// Prints collected output, highlighting headings and totals on a terminal
fn print_results(text: &str, charset: Charset) {
    if charset != Charset::Utf8 {
        StdoutSink::stdout(charset).append_text(text);
        return;
    }
    if !io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    for line in text.split_inclusive('\n') {
        let body = line.trim_end_matches(['\r', '\n']);
        let eol = &line[body.len()..];
        if body.starts_with(['□', '■', '◎', '◆']) {
            print!("{}{}", body.blue().bold(), eol);
        } else if body.ends_with("match(es) found.")
            || body.ends_with("replacement(s) made.")
            || body == "Suspended."
        {
            print!("{}{}", body.yellow(), eol);
        } else if let Some((location, rest)) = body.split_once("): ") {
            print!("{}: {}{}", format!("{})", location).green(), rest, eol);
        } else {
            print!("{}", line);
        }
    }
}
