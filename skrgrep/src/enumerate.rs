//! Depth-first enumeration of grep targets.
//!
//! Within each folder all matching files are produced first, in name order,
//! followed by the subfolders. This is the order results appear in the output.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;
use walkdir::{DirEntry, WalkDir};

use crate::errors::{unify_path, GrepError, GrepResult};
use crate::filters::FileKeys;

/// A file selected for searching
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FoundFile {
    pub path: PathBuf,
    pub file_name: String,
    /// Folder the file lives in
    pub folder: PathBuf,
    /// Depth below the root, 1 for files directly in it
    pub depth: usize,
}

#[derive(Debug, Default)]
struct WalkRules {
    keys: FileKeys,
    abs_files: HashSet<PathBuf>,
    abs_folders: HashSet<PathBuf>,
}

impl WalkRules {
    fn keeps_folder(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if self.keys.is_excluded_folder(&name) {
            return false;
        }
        self.abs_folders.is_empty() || !self.abs_folders.contains(&unify_path(entry.path()))
    }

    fn keeps_file(&self, entry: &DirEntry) -> bool {
        let name = entry.file_name().to_string_lossy();
        if !self.keys.matches_file(&name) {
            return false;
        }
        self.abs_files.is_empty() || !self.abs_files.contains(&unify_path(entry.path()))
    }
}

/// Produces the files of one or more folder trees that match the file keys
#[derive(Debug, Clone)]
pub struct FileEnumerator {
    rules: Arc<WalkRules>,
    recurse: bool,
}

impl FileEnumerator {
    /// Creates an enumerator, expanding absolute exclude keys once
    pub fn new(keys: &FileKeys, recurse: bool) -> GrepResult<Self> {
        let abs_files = expand_abs_keys(keys.abs_exclude_files())?;
        let abs_folders = expand_abs_keys(keys.abs_exclude_folders())?;
        debug!(
            "Absolute excludes resolved: {} files, {} folders",
            abs_files.len(),
            abs_folders.len()
        );

        Ok(Self {
            rules: Arc::new(WalkRules {
                keys: keys.clone(),
                abs_files,
                abs_folders,
            }),
            recurse,
        })
    }

    /// Lazily walks `root`
    pub fn walk(&self, root: &Path) -> Walk {
        let max_depth = if self.recurse { usize::MAX } else { 1 };
        let rules = Arc::clone(&self.rules);
        let inner = WalkDir::new(root)
            .min_depth(1)
            .max_depth(max_depth)
            .sort_by(|a, b| {
                a.file_type()
                    .is_dir()
                    .cmp(&b.file_type().is_dir())
                    .then_with(|| a.file_name().cmp(b.file_name()))
            })
            .into_iter()
            .filter_entry(move |entry| !entry.file_type().is_dir() || rules.keeps_folder(entry));

        Walk {
            inner: Box::new(inner),
            rules: Arc::clone(&self.rules),
        }
    }
}

/// Iterator over the files below one root
pub struct Walk {
    inner: Box<dyn Iterator<Item = walkdir::Result<DirEntry>> + Send>,
    rules: Arc<WalkRules>,
}

impl Iterator for Walk {
    type Item = FoundFile;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(e) => {
                    debug!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if !entry.file_type().is_file() || !self.rules.keeps_file(&entry) {
                continue;
            }

            let path = entry.path().to_path_buf();
            let folder = path.parent().map(Path::to_path_buf).unwrap_or_default();
            return Some(FoundFile {
                file_name: entry.file_name().to_string_lossy().into_owned(),
                depth: entry.depth(),
                folder,
                path,
            });
        }
    }
}

/// Expands absolute glob keys into the set of paths they name
fn expand_abs_keys(keys: &[String]) -> GrepResult<HashSet<PathBuf>> {
    let mut paths = HashSet::new();
    for key in keys {
        let entries =
            glob::glob(key).map_err(|e| GrepError::invalid_file_key(key.as_str(), e.msg))?;
        paths.extend(entries.flatten().map(|path| unify_path(&path)));
    }
    Ok(paths)
}
