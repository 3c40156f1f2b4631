//! Filesystem cleanup helpers
//!
//! Independent of the sync engine. Both helpers return the paths they removed
//! and log, rather than propagate, failures on individual entries.

use anyhow::{bail, Context, Result};
use globset::{GlobBuilder, GlobMatcher};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Options for [`delete_files_by_pattern`]
#[derive(Debug, Clone)]
pub struct DeleteFilesOptions {
    pub target_dir: PathBuf,
    /// Glob relative to `target_dir`: `*`, `?`, `[...]`, `{a,b}`, `**` and `/`
    pub pattern: String,
    /// Match the pattern at any depth (symlinked directories are not followed)
    pub recursive: bool,
}

/// Compiled file pattern with hidden-entry rules
///
/// Dotfiles only match when the pattern's last segment starts with `.`, and
/// dot-directories are only entered when a pattern segment names one.
#[derive(Debug, Clone)]
pub struct FilePattern {
    matcher: GlobMatcher,
    dotfiles: bool,
    dot_dirs: bool,
    descend: bool,
}

impl FilePattern {
    /// Compile `pattern`; with `recursive` it is matched as `**/pattern`
    pub fn new(pattern: &str, recursive: bool) -> Result<Self> {
        let pattern = pattern.trim_start_matches("./");
        let glob = if recursive {
            format!("**/{}", pattern)
        } else {
            pattern.to_string()
        };

        let matcher = GlobBuilder::new(&glob)
            .literal_separator(true)
            .build()
            .with_context(|| format!("Invalid file pattern: {}", pattern))?
            .compile_matcher();

        let (parents, last) = match pattern.rsplit_once('/') {
            Some((parents, last)) => (Some(parents), last),
            None => (None, pattern),
        };

        Ok(Self {
            matcher,
            dotfiles: last.starts_with('.'),
            dot_dirs: parents.map_or(false, |p| p.split('/').any(|segment| segment.starts_with('.'))),
            descend: recursive || parents.is_some(),
        })
    }

    /// Whether `relative` (a path under the target directory) matches
    pub fn is_match(&self, relative: &Path) -> bool {
        let hidden_file = relative
            .file_name()
            .map_or(false, |name| name.to_string_lossy().starts_with('.'));
        if hidden_file && !self.dotfiles {
            return false;
        }
        self.matcher.is_match(relative)
    }

    fn enters(&self, dir_name: &str) -> bool {
        self.descend && (!dir_name.starts_with('.') || self.dot_dirs)
    }
}

/// Delete files whose path relative to `target_dir` matches the pattern
pub fn delete_files_by_pattern(options: &DeleteFilesOptions) -> Result<Vec<PathBuf>> {
    if !options.target_dir.is_dir() {
        bail!("Not a directory: {}", options.target_dir.display());
    }

    let pattern = FilePattern::new(&options.pattern, options.recursive)?;
    let mut deleted = Vec::new();

    delete_matching_in(&options.target_dir, Path::new(""), &pattern, &mut deleted)
        .with_context(|| format!("Failed to read directory: {}", options.target_dir.display()))?;

    deleted.sort();
    Ok(deleted)
}

fn delete_matching_in(
    dir: &Path,
    relative_dir: &Path,
    pattern: &FilePattern,
    deleted: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for entry in fs::read_dir(dir)? {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Skipping unreadable entry in {}: {}", dir.display(), e);
                continue;
            }
        };

        let path = entry.path();
        // file_type() does not follow symlinks
        let file_type = match entry.file_type() {
            Ok(file_type) => file_type,
            Err(e) => {
                warn!("Could not stat {}: {}", path.display(), e);
                continue;
            }
        };

        let name = entry.file_name();
        let relative = relative_dir.join(&name);

        if file_type.is_dir() {
            if pattern.enters(&name.to_string_lossy()) {
                if let Err(e) = delete_matching_in(&path, &relative, pattern, deleted) {
                    warn!("Could not read directory {}: {}", path.display(), e);
                }
            }
            continue;
        }

        if !pattern.is_match(&relative) {
            continue;
        }

        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Deleted {}", path.display());
                deleted.push(path);
            }
            Err(e) => warn!("Failed to delete {}: {}", path.display(), e),
        }
    }

    Ok(())
}

/// Remove `target_dir` if empty; with `recursive`, prune empty subtrees first
pub fn delete_empty_dirs(target_dir: &Path, recursive: bool) -> Result<Vec<PathBuf>> {
    if !target_dir.is_dir() {
        bail!("Not a directory: {}", target_dir.display());
    }

    let mut removed = Vec::new();

    if is_empty_dir(target_dir)? {
        fs::remove_dir(target_dir)
            .with_context(|| format!("Failed to remove {}", target_dir.display()))?;
        removed.push(target_dir.to_path_buf());
        return Ok(removed);
    }

    if recursive {
        for child in subdirectories(target_dir)? {
            prune(&child, &mut removed);
        }

        if is_empty_dir(target_dir)? {
            match fs::remove_dir(target_dir) {
                Ok(()) => removed.push(target_dir.to_path_buf()),
                Err(e) => warn!("Failed to remove {}: {}", target_dir.display(), e),
            }
        }
    }

    Ok(removed)
}

/// Bottom-up removal of empty directories under and including `dir`
fn prune(dir: &Path, removed: &mut Vec<PathBuf>) {
    match subdirectories(dir) {
        Ok(children) => {
            for child in children {
                prune(&child, removed);
            }
        }
        Err(e) => {
            warn!("Could not read directory {}: {:#}", dir.display(), e);
            return;
        }
    }

    match is_empty_dir(dir) {
        Ok(true) => match fs::remove_dir(dir) {
            Ok(()) => {
                debug!("Removed empty directory {}", dir.display());
                removed.push(dir.to_path_buf());
            }
            Err(e) => warn!("Failed to remove {}: {}", dir.display(), e),
        },
        Ok(false) => {}
        Err(e) => warn!("Could not read directory {}: {:#}", dir.display(), e),
    }
}

fn subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut dirs = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

fn is_empty_dir(dir: &Path) -> Result<bool> {
    let mut entries = fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))?;
    Ok(entries.next().is_none())
}
