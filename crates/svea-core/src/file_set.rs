use std::collections::HashMap;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};

use glob::Pattern;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SveaError};
use crate::layout::LayoutDir;
use crate::overwrite::OverwritePolicy;

const RAW_SUFFIXES: &[&str] = &["hex", "hdr", "bl", "btl", "ros", "xmlcon", "con"];
const CNV_SUFFIXES: &[&str] = &["cnv"];
const STANDARD_FORMAT_SUFFIXES: &[&str] = &["txt"];

/// File-name prefix written by the standard-format writer.
pub const STANDARD_FORMAT_PREFIX: &str = "ctd_profile_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileCategory {
    Raw,
    Cnv,
    StandardFormat,
}

impl FileCategory {
    pub fn name(self) -> &'static str {
        match self {
            FileCategory::Raw => "raw",
            FileCategory::Cnv => "cnv",
            FileCategory::StandardFormat => "standard format",
        }
    }

    /// Allowed extensions, lowercase and without the leading dot.
    pub fn suffixes(self) -> &'static [&'static str] {
        match self {
            FileCategory::Raw => RAW_SUFFIXES,
            FileCategory::Cnv => CNV_SUFFIXES,
            FileCategory::StandardFormat => STANDARD_FORMAT_SUFFIXES,
        }
    }

    pub fn file_name_prefix(self) -> Option<&'static str> {
        match self {
            FileCategory::StandardFormat => Some(STANDARD_FORMAT_PREFIX),
            FileCategory::Raw | FileCategory::Cnv => None,
        }
    }

    /// Raw instrument exports are often nested per cast; the rest are flat.
    pub fn recursive(self) -> bool {
        matches!(self, FileCategory::Raw)
    }

    pub fn default_layout_dir(self) -> LayoutDir {
        match self {
            FileCategory::Raw => LayoutDir::Raw,
            FileCategory::Cnv => LayoutDir::Cnv,
            FileCategory::StandardFormat => LayoutDir::StandardFormat,
        }
    }

    pub fn matches(self, path: &Path) -> bool {
        let Some(extension) = path.extension().and_then(|ext| ext.to_str()) else {
            return false;
        };
        let extension = extension.to_ascii_lowercase();
        if !self.suffixes().contains(&extension.as_str()) {
            return false;
        }
        match self.file_name_prefix() {
            Some(prefix) => path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(prefix)),
            None => true,
        }
    }
}

/// What to assign to a [`FileSet`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileSource {
    Directory(PathBuf),
    Paths(Vec<PathBuf>),
    Clear,
}

impl FileSource {
    /// A directory is scanned; anything else is taken as a single file path.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        if path.is_dir() {
            FileSource::Directory(path)
        } else {
            FileSource::Paths(vec![path])
        }
    }
}

impl From<Vec<PathBuf>> for FileSource {
    fn from(paths: Vec<PathBuf>) -> Self {
        FileSource::Paths(paths)
    }
}

impl From<&[PathBuf]> for FileSource {
    fn from(paths: &[PathBuf]) -> Self {
        FileSource::Paths(paths.to_vec())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RelocationReport {
    pub target: PathBuf,
    pub copied: Vec<PathBuf>,
    /// Remapped to the target without copying: a same-named file was
    /// already there and overwriting was not allowed.
    pub skipped_existing: Vec<PathBuf>,
    pub in_place: Vec<PathBuf>,
}

impl RelocationReport {
    fn new(target: &Path) -> Self {
        Self {
            target: target.to_path_buf(),
            ..Self::default()
        }
    }

    pub fn total(&self) -> usize {
        self.copied.len() + self.skipped_existing.len() + self.in_place.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CopyOutcome {
    Copied,
    SkippedExisting,
    InPlace,
}

#[derive(Debug, Clone)]
pub struct FileSet {
    category: FileCategory,
    paths: Vec<PathBuf>,
    overwrite: OverwritePolicy,
}

impl FileSet {
    pub fn new(category: FileCategory) -> Self {
        Self {
            category,
            paths: Vec::new(),
            overwrite: OverwritePolicy::DENY,
        }
    }

    pub fn category(&self) -> FileCategory {
        self.category
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn overwrite(&self) -> OverwritePolicy {
        self.overwrite
    }

    pub fn set_overwrite(&mut self, overwrite: OverwritePolicy) {
        self.overwrite = overwrite;
    }

    pub fn clear(&mut self) {
        self.paths.clear();
    }

    /// Replaces the whole collection with the matching files from `source`.
    pub fn assign(&mut self, source: impl Into<FileSource>) -> Result<&[PathBuf]> {
        let paths = match source.into() {
            FileSource::Directory(directory) => self.scan_directory(&directory)?,
            FileSource::Paths(paths) => {
                let total = paths.len();
                let kept: Vec<PathBuf> = paths
                    .into_iter()
                    .filter(|path| self.category.matches(path))
                    .collect();
                if kept.len() < total {
                    debug!(
                        category = self.category.name(),
                        "dropped {} paths outside the allowed suffixes",
                        total - kept.len()
                    );
                }
                kept
            }
            FileSource::Clear => Vec::new(),
        };
        info!(
            category = self.category.name(),
            count = paths.len(),
            "file set assigned"
        );
        self.paths = paths;
        Ok(&self.paths)
    }

    fn scan_directory(&self, directory: &Path) -> Result<Vec<PathBuf>> {
        if !directory.is_dir() {
            return Err(SveaError::path(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }
        let escaped = Pattern::escape(&directory.to_string_lossy());
        let pattern = if self.category.recursive() {
            format!("{escaped}/**/*")
        } else {
            format!("{escaped}/*")
        };

        let mut files = Vec::new();
        for entry in glob::glob(&pattern)? {
            let path = match entry {
                Ok(path) => path,
                Err(err) => {
                    warn!(
                        "could not read path while scanning {}: {err}",
                        directory.display()
                    );
                    continue;
                }
            };
            if path.is_file() && self.category.matches(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    /// Copies every file into `target` and points the set at the copies.
    ///
    /// A file that already exists at the target is left untouched when
    /// overwriting is denied, but the set still points at the target copy.
    /// Files copied before a failure are not rolled back. Two sources with
    /// the same file name (possible after a recursive scan) are refused
    /// before anything is copied.
    pub fn relocate(&mut self, target: &Path) -> Result<RelocationReport> {
        if self.paths.is_empty() {
            return Err(SveaError::missing_files(format!(
                "No {} files to relocate",
                self.category.name()
            )));
        }
        self.check_unique_file_names()?;
        prepare_target_directory(target)?;

        info!(
            category = self.category.name(),
            target = %target.display(),
            "Copying files. Permission to overwrite is set to {}",
            self.overwrite
        );

        let mut report = RelocationReport::new(target);
        let mut relocated = Vec::with_capacity(self.paths.len());
        for source in &self.paths {
            let file_name = source.file_name().ok_or_else(|| {
                SveaError::path(format!("Path has no file name: {}", source.display()))
            })?;
            let destination = target.join(file_name);
            match copy_gated(source, &destination, self.overwrite)? {
                CopyOutcome::Copied => report.copied.push(destination.clone()),
                CopyOutcome::SkippedExisting => report.skipped_existing.push(destination.clone()),
                CopyOutcome::InPlace => report.in_place.push(destination.clone()),
            }
            relocated.push(destination);
        }

        if !report.skipped_existing.is_empty() {
            warn!(
                category = self.category.name(),
                "{} files already existed at {} and were not copied",
                report.skipped_existing.len(),
                target.display()
            );
        }
        self.paths = relocated;
        Ok(report)
    }

    fn check_unique_file_names(&self) -> Result<()> {
        let mut seen: HashMap<&OsStr, &Path> = HashMap::with_capacity(self.paths.len());
        for source in &self.paths {
            let file_name = source.file_name().ok_or_else(|| {
                SveaError::path(format!("Path has no file name: {}", source.display()))
            })?;
            if let Some(first) = seen.insert(file_name, source) {
                return Err(SveaError::path(format!(
                    "{} and {} would both be copied to {}",
                    first.display(),
                    source.display(),
                    file_name.to_string_lossy()
                )));
            }
        }
        Ok(())
    }
}

/// Final path segment without a `.`; used for paths that do not exist yet.
pub fn looks_like_directory(path: &Path) -> bool {
    path.file_name()
        .map(|name| !name.to_string_lossy().contains('.'))
        .unwrap_or(true)
}

pub(crate) fn prepare_target_directory(target: &Path) -> Result<()> {
    if target.exists() {
        if !target.is_dir() {
            return Err(SveaError::path(format!(
                "Path is not a directory: {}",
                target.display()
            )));
        }
        return Ok(());
    }
    if !looks_like_directory(target) {
        return Err(SveaError::path(format!(
            "Path is not a directory: {}",
            target.display()
        )));
    }
    fs::create_dir_all(target).map_err(|err| SveaError::io(target, err))?;
    info!("Directory created: {}", target.display());
    Ok(())
}

pub(crate) fn copy_gated(
    source: &Path,
    destination: &Path,
    overwrite: OverwritePolicy,
) -> Result<CopyOutcome> {
    if is_same_file(source, destination) {
        return Ok(CopyOutcome::InPlace);
    }
    if destination.exists() && !overwrite.allows() {
        debug!("not overwriting {}", destination.display());
        return Ok(CopyOutcome::SkippedExisting);
    }
    if !source.is_file() {
        return Err(SveaError::missing_files(format!(
            "File does not exist: {}",
            source.display()
        )));
    }
    fs::copy(source, destination).map_err(|err| SveaError::io(destination, err))?;
    if let Err(err) = preserve_modified_time(source, destination) {
        debug!(
            "could not carry modification time over to {}: {err}",
            destination.display()
        );
    }
    Ok(CopyOutcome::Copied)
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn preserve_modified_time(source: &Path, destination: &Path) -> std::io::Result<()> {
    let modified = fs::metadata(source)?.modified()?;
    let file = fs::OpenOptions::new().write(true).open(destination)?;
    file.set_modified(modified)
}
