use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

use crate::encoding::{self, Charset};
use crate::errors::{GrepError, GrepResult};

/// Text buffered before the temporary file is created
const PENDING_LIMIT: usize = 10 * 1024 * 1024;

/// Appends `suffix` to the full file name of `path`
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Path of the temporary file a replace writes into
pub fn temp_path_for(path: &Path) -> PathBuf {
    with_suffix(path, ".skrnew")
}

/// Path the original is moved to when backups are enabled
pub fn backup_path_for(path: &Path) -> PathBuf {
    with_suffix(path, ".bak")
}

/// Streams the rewritten text of one file into `<file>.skrnew` and swaps it
/// in on commit.
///
/// Nothing touches the disk until the first hit (or until the buffered text
/// grows past the pending limit), so files without hits never get a temporary
/// file. A writer dropped without a successful commit removes its temporary
/// file and leaves the original alone.
#[derive(Debug)]
pub struct ReplaceWriter {
    path: PathBuf,
    temp_path: PathBuf,
    charset: Charset,
    has_bom: bool,
    backup: bool,
    pending: String,
    out: Option<BufWriter<File>>,
    temp_created: bool,
    keep_temp: bool,
}

impl ReplaceWriter {
    pub fn new(path: &Path, charset: Charset, has_bom: bool, backup: bool) -> Self {
        Self {
            path: path.to_path_buf(),
            temp_path: temp_path_for(path),
            charset,
            has_bom,
            backup,
            pending: String::new(),
            out: None,
            temp_created: false,
            keep_temp: false,
        }
    }

    pub fn temp_path(&self) -> &Path {
        &self.temp_path
    }

    /// Appends rewritten text
    pub fn append(&mut self, text: &str) -> GrepResult<()> {
        if let Some(out) = self.out.as_mut() {
            let bytes = encoding::encode(text, self.charset);
            return out
                .write_all(&bytes)
                .map_err(|e| GrepError::file_write(&self.temp_path, e));
        }
        self.pending.push_str(text);
        if self.pending.len() >= PENDING_LIMIT {
            self.open_head()?;
        }
        Ok(())
    }

    /// Creates the temporary file, writes the byte order mark and the text
    /// buffered so far. Called when the first hit is found.
    pub fn open_head(&mut self) -> GrepResult<()> {
        if self.out.is_some() {
            return Ok(());
        }
        let file =
            File::create(&self.temp_path).map_err(|e| GrepError::file_write(&self.temp_path, e))?;
        self.temp_created = true;
        let mut out = BufWriter::new(file);
        if self.has_bom {
            out.write_all(encoding::bom_for(self.charset))
                .map_err(|e| GrepError::file_write(&self.temp_path, e))?;
        }
        let pending = std::mem::take(&mut self.pending);
        out.write_all(&encoding::encode(&pending, self.charset))
            .map_err(|e| GrepError::file_write(&self.temp_path, e))?;
        trace!("Opened {}", self.temp_path.display());
        self.out = Some(out);
        Ok(())
    }

    /// Finishes the rewrite.
    ///
    /// With `hits == 0` the temporary file (if any) is discarded and the
    /// original stays untouched. Otherwise the original is moved to `.bak` or
    /// deleted, and the temporary file takes its name. Returns true when the
    /// original was replaced.
    pub fn commit(mut self, hits: u64) -> GrepResult<bool> {
        if hits == 0 {
            return Ok(false);
        }
        self.open_head()?;
        if let Some(out) = self.out.take() {
            let file = out
                .into_inner()
                .map_err(|e| GrepError::file_write(&self.temp_path, e.into_error()))?;
            file.sync_all()
                .map_err(|e| GrepError::file_write(&self.temp_path, e))?;
        }

        if self.backup {
            let backup = backup_path_for(&self.path);
            if backup.exists() {
                fs::remove_file(&backup).map_err(|e| GrepError::file_delete(&backup, e))?;
            }
            fs::rename(&self.path, &backup).map_err(|e| GrepError::file_rename(&self.path, e))?;
        } else {
            fs::remove_file(&self.path).map_err(|e| GrepError::file_delete(&self.path, e))?;
        }

        // The original is gone from its place; the rewrite must survive
        self.keep_temp = true;
        fs::rename(&self.temp_path, &self.path)
            .map_err(|e| GrepError::file_rename(&self.temp_path, e))?;
        debug!("Replaced {}", self.path.display());
        Ok(true)
    }
}

impl Drop for ReplaceWriter {
    fn drop(&mut self) {
        self.out.take();
        if self.temp_created && !self.keep_temp {
            if let Err(e) = fs::remove_file(&self.temp_path) {
                debug!("Could not remove {}: {}", self.temp_path.display(), e);
            }
        }
    }
}
