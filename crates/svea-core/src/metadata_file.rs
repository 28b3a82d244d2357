use std::fs;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::error::{Result, SveaError};
use crate::file_set::{copy_gated, prepare_target_directory, CopyOutcome};
use crate::layout::{Reconfigure, WorkingDirectoryLayout};
use crate::overwrite::OverwritePolicy;
use crate::sensorinfo::{SensorInfo, SENSORINFO_SHEET};
use crate::spreadsheet::SpreadsheetStore;

pub const METADATA_FILE_EXTENSION: &str = "xlsx";

/// Location of the cruise metadata workbook.
///
/// The path may point at a directory until the workbook has been created;
/// a directory containing a workbook resolves to that workbook.
#[derive(Debug, Clone, Default)]
pub struct MetadataFile {
    file_path: Option<PathBuf>,
    overwrite: OverwritePolicy,
}

impl MetadataFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn file_path(&self) -> Option<&Path> {
        self.file_path.as_deref()
    }

    pub fn set_file_path(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        let resolved = if path.is_dir() {
            first_metadata_file(&path).unwrap_or(path)
        } else {
            path
        };
        info!("Metadata file path set to {}", resolved.display());
        self.file_path = Some(resolved);
    }

    pub fn clear_file_path(&mut self) {
        self.file_path = None;
    }

    /// True once the path names a file rather than a directory.
    pub fn is_resolved(&self) -> bool {
        self.file_path.as_deref().is_some_and(|path| !path.is_dir())
    }

    pub fn overwrite(&self) -> OverwritePolicy {
        self.overwrite
    }

    pub fn set_overwrite(&mut self, overwrite: OverwritePolicy) {
        self.overwrite = overwrite;
    }

    pub fn require_path(&self) -> Result<&Path> {
        self.file_path
            .as_deref()
            .ok_or_else(|| SveaError::missing_files("File path for metadata is not set"))
    }

    pub fn require_existing(&self) -> Result<&Path> {
        let path = self.require_path()?;
        if !path.is_file() {
            return Err(SveaError::missing_files(format!(
                "Metadata file does not exist: {}",
                path.display()
            )));
        }
        Ok(path)
    }

    /// Copies the workbook into `directory` under the same overwrite rules as
    /// file sets and points at the copy.
    pub fn change_location(&mut self, directory: &Path) -> Result<PathBuf> {
        let source = self.require_existing()?.to_path_buf();
        prepare_target_directory(directory)?;
        let file_name = source.file_name().ok_or_else(|| {
            SveaError::path(format!("Path has no file name: {}", source.display()))
        })?;
        let destination = directory.join(file_name);
        if copy_gated(&source, &destination, self.overwrite)? == CopyOutcome::SkippedExisting {
            warn!(
                "Permission to overwrite metadata file is set to {}. File is not copied.",
                self.overwrite
            );
        }
        self.file_path = Some(destination.clone());
        Ok(destination)
    }

    /// Copies sensor rows from a `.txt` export or an `.xlsx` sheet into the
    /// Sensorinfo sheet of this workbook and saves it in place.
    pub fn add_sensorinfo_from_file(
        &self,
        store: &dyn SpreadsheetStore,
        source: &Path,
        sheet_name: Option<&str>,
    ) -> Result<()> {
        let target = self.require_existing()?;
        let extension = source
            .extension()
            .and_then(|ext| ext.to_str())
            .map(str::to_ascii_lowercase);
        let sensor_info = match extension.as_deref() {
            Some("txt") => SensorInfo::load_txt(source)?,
            Some(METADATA_FILE_EXTENSION) => SensorInfo::load_sheet(
                store,
                source,
                sheet_name.unwrap_or(SENSORINFO_SHEET),
            )?,
            _ => {
                return Err(SveaError::path(format!(
                    "Unsupported sensor info file: {}",
                    source.display()
                )))
            }
        };

        let mut workbook = store
            .load(target)
            .map_err(|err| SveaError::collaborator("spreadsheet store", err))?;
        let Some(sheet) = workbook.sheet_mut(SENSORINFO_SHEET) else {
            return Err(SveaError::path(format!(
                "No worksheet named {SENSORINFO_SHEET} in file {}",
                target.display()
            )));
        };
        sensor_info.write_into(sheet);
        store
            .save(target, &workbook)
            .map_err(|err| SveaError::collaborator("spreadsheet store", err))?;
        info!(
            cells = sensor_info.len(),
            "Sensor info from {} written to {}",
            source.display(),
            target.display()
        );
        Ok(())
    }
}

impl Reconfigure for MetadataFile {
    fn reconfigure(&mut self, layout: &WorkingDirectoryLayout) -> Result<()> {
        match layout.root() {
            Some(root) => self.set_file_path(root),
            None => self.clear_file_path(),
        }
        Ok(())
    }
}

fn first_metadata_file(directory: &Path) -> Option<PathBuf> {
    let entries = match fs::read_dir(directory) {
        Ok(entries) => entries,
        Err(err) => {
            warn!("could not list {}: {err}", directory.display());
            return None;
        }
    };
    let mut candidates: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|entry| entry.path()))
        .filter(|path| path.is_file() && is_metadata_workbook(path))
        .collect();
    candidates.sort();
    candidates.into_iter().next()
}

fn is_metadata_workbook(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|name| name.to_str()) else {
        return false;
    };
    // `~$` files are editor lock files sitting next to open workbooks.
    !name.starts_with("~$")
        && path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(METADATA_FILE_EXTENSION))
}
