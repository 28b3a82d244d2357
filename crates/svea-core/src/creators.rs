use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info};

use crate::collaborators::{DatasetSession, QcEngine, Writer};
use crate::error::{Result, SveaError};
use crate::file_set::{looks_like_directory, FileSet, FileSource, RelocationReport};
use crate::layout::{LayoutDir, Reconfigure, WorkingDirectoryLayout};
use crate::metadata::Metadata;
use crate::metadata_file::MetadataFile;
use crate::overwrite::OverwritePolicy;

fn session_error(err: anyhow::Error) -> SveaError {
    SveaError::collaborator("dataset session", err)
}

fn require_files<'a>(files: &'a FileSet, what: &str) -> Result<&'a [PathBuf]> {
    if files.is_empty() {
        return Err(SveaError::missing_files(format!("No {what} files are set")));
    }
    Ok(files.paths())
}

/// Produces the metadata workbook from the CNV files and the cruise metadata.
#[derive(Debug, Clone, Default)]
pub struct MetadataFileCreator {
    overwrite: OverwritePolicy,
}

impl MetadataFileCreator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn overwrite(&self) -> OverwritePolicy {
        self.overwrite
    }

    pub fn set_overwrite(&mut self, overwrite: OverwritePolicy) {
        self.overwrite = overwrite;
    }

    pub fn create_file(
        &self,
        session: &mut dyn DatasetSession,
        cnv_files: &FileSet,
        metadata: &Metadata,
        metadata_file: &mut MetadataFile,
    ) -> Result<PathBuf> {
        let target = metadata_file.require_path()?.to_path_buf();
        let cnv_paths = require_files(cnv_files, "CNV")?;

        let start = Instant::now();
        let datasets = session.read(cnv_paths).map_err(session_error)?;
        debug!(
            "{} CNV files loaded in {:?}",
            cnv_paths.len(),
            start.elapsed()
        );
        let Some(mut dataset) = datasets.into_iter().next() else {
            return Err(SveaError::missing_files(
                "No datasets could be read from the CNV files",
            ));
        };

        session
            .update_metadata(&mut dataset, metadata.get(), metadata.overwrite().allows())
            .map_err(session_error)?;
        debug!("Metadata updated in dataset {}", dataset.name);

        let start = Instant::now();
        let saved = session
            .save_data(std::slice::from_ref(&dataset), Writer::MetadataTemplate)
            .map_err(session_error)?;
        debug!(
            "Metadata file saved in {:?} at location {}",
            start.elapsed(),
            saved.display()
        );

        let target_path = if target.is_dir() {
            let file_name = saved.file_name().ok_or_else(|| {
                SveaError::path(format!("Path has no file name: {}", saved.display()))
            })?;
            target.join(file_name)
        } else {
            target
        };
        if target_path.exists() && !self.overwrite.allows() {
            return Err(SveaError::permission(format!(
                "Metadata file already exists and overwrite is set to {}: {}",
                self.overwrite,
                target_path.display()
            )));
        }
        if saved != target_path {
            if let Some(parent) = target_path.parent() {
                fs::create_dir_all(parent).map_err(|err| SveaError::io(parent, err))?;
            }
            fs::copy(&saved, &target_path).map_err(|err| SveaError::io(&target_path, err))?;
        }
        metadata_file.set_file_path(&target_path);
        info!("Metadata file created at {}", target_path.display());
        Ok(target_path)
    }
}

/// Writes standard-format files from the CNV files plus the metadata workbook.
#[derive(Debug, Clone, Default)]
pub struct StandardFormatCreator {
    directory: Option<PathBuf>,
}

impl StandardFormatCreator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn set_directory(&mut self, directory: impl Into<PathBuf>) -> Result<()> {
        let directory = directory.into();
        if !looks_like_directory(&directory) {
            return Err(SveaError::path(format!(
                "Path is not a directory: {}",
                directory.display()
            )));
        }
        self.directory = Some(directory);
        Ok(())
    }

    /// Output lands in `output`, relocated into the standard-format directory
    /// under that set's overwrite policy.
    pub fn create_files(
        &self,
        session: &mut dyn DatasetSession,
        cnv_files: &FileSet,
        metadata_file: &MetadataFile,
        output: &mut FileSet,
    ) -> Result<RelocationReport> {
        let directory = self
            .directory
            .as_deref()
            .ok_or_else(|| SveaError::missing_files("No directory for standard format files set"))?;
        let cnv_paths = require_files(cnv_files, "CNV")?;
        let metadata_path = metadata_file.require_existing()?;

        let mut all_paths = cnv_paths.to_vec();
        all_paths.push(metadata_path.to_path_buf());

        let start = Instant::now();
        let datasets = session.read(&all_paths).map_err(session_error)?;
        debug!(
            "{} CNV files and one metadata file loaded in {:?}",
            cnv_paths.len(),
            start.elapsed()
        );

        let start = Instant::now();
        let data_path = session
            .save_data(&datasets, Writer::StandardFormat)
            .map_err(session_error)?;
        output.assign(FileSource::from_path(&data_path))?;
        if output.is_empty() {
            return Err(SveaError::missing_files(format!(
                "Standard format writer produced no files at {}",
                data_path.display()
            )));
        }
        let report = output.relocate(directory)?;
        debug!(
            "Datasets saved in {:?} at location {}. Files copied to {}",
            start.elapsed(),
            data_path.display(),
            directory.display()
        );
        Ok(report)
    }
}

impl Reconfigure for StandardFormatCreator {
    fn reconfigure(&mut self, layout: &WorkingDirectoryLayout) -> Result<()> {
        match layout.dir(LayoutDir::StandardFormat) {
            Some(directory) => self.set_directory(directory),
            None => {
                self.directory = None;
                Ok(())
            }
        }
    }
}

/// Runs the automatic QC routine over standard-format files.
#[derive(Debug, Clone, Default)]
pub struct AutomaticQcRunner {
    directory: Option<PathBuf>,
    parameter_mapping: BTreeMap<String, String>,
}

impl AutomaticQcRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn directory(&self) -> Option<&Path> {
        self.directory.as_deref()
    }

    pub fn parameter_mapping(&self) -> &BTreeMap<String, String> {
        &self.parameter_mapping
    }

    pub fn set_parameter_mapping(&mut self, mapping: BTreeMap<String, String>) {
        self.parameter_mapping = mapping;
    }

    pub fn run(
        &self,
        session: &mut dyn DatasetSession,
        engine: &dyn QcEngine,
        standard_files: &FileSet,
        output: &mut FileSet,
    ) -> Result<RelocationReport> {
        let directory = self
            .directory
            .as_deref()
            .ok_or_else(|| SveaError::missing_files("No directory for QC'd files set"))?;
        let paths = require_files(standard_files, "standard format")?;

        let mut datasets = session.read(paths).map_err(session_error)?;
        let start = Instant::now();
        for dataset in &mut datasets {
            engine
                .run(dataset, &self.parameter_mapping)
                .map_err(|err| SveaError::collaborator("qc engine", err))?;
        }
        info!(
            "Automatic QC run on {} datasets in {:?}",
            datasets.len(),
            start.elapsed()
        );

        let data_path = session
            .save_data(&datasets, Writer::StandardFormat)
            .map_err(session_error)?;
        output.assign(FileSource::from_path(&data_path))?;
        if output.is_empty() {
            return Err(SveaError::missing_files(format!(
                "QC run produced no standard format files at {}",
                data_path.display()
            )));
        }
        output.relocate(directory)
    }
}

impl Reconfigure for AutomaticQcRunner {
    fn reconfigure(&mut self, layout: &WorkingDirectoryLayout) -> Result<()> {
        self.directory = layout
            .dir(LayoutDir::StandardFormatQc)
            .map(Path::to_path_buf);
        Ok(())
    }
}
