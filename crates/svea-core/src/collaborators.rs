//! Seams to the services that do the scientific work.
//!
//! Reading CNV files, writing templates, QC rules, transfer protocols and
//! plotting all happen behind these traits. Failures come back as
//! `anyhow::Error` and are wrapped into [`SveaError::Collaborator`] by the
//! caller.
//!
//! [`SveaError::Collaborator`]: crate::error::SveaError::Collaborator

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::metadata::MetadataMap;

/// One cast as held by the dataset session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub name: String,
    pub source_files: Vec<PathBuf>,
    pub metadata: MetadataMap,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Writer {
    MetadataTemplate,
    StandardFormat,
}

impl Writer {
    pub fn name(self) -> &'static str {
        match self {
            Writer::MetadataTemplate => "metadata_template",
            Writer::StandardFormat => "ctd_standard_template",
        }
    }
}

pub trait DatasetSession {
    fn read(&mut self, file_paths: &[PathBuf]) -> Result<Vec<Dataset>>;

    fn update_metadata(
        &mut self,
        dataset: &mut Dataset,
        metadata: &MetadataMap,
        overwrite: bool,
    ) -> Result<()>;

    /// Returns the written file (metadata template) or the directory holding
    /// the written files (standard format).
    fn save_data(&mut self, datasets: &[Dataset], writer: Writer) -> Result<PathBuf>;
}

pub trait QcEngine {
    /// Annotates the dataset in place. `parameter_mapping` maps the QC
    /// routine's parameter names onto the dataset's column names.
    fn run(&self, dataset: &mut Dataset, parameter_mapping: &BTreeMap<String, String>)
        -> Result<()>;
}

pub trait SbeProcessor {
    /// Turns raw instrument files into CNV files written under `output_dir`.
    fn process(&mut self, raw_files: &[PathBuf], output_dir: &Path) -> Result<Vec<PathBuf>>;
}

pub trait FileDelivery {
    fn deliver(&mut self, files: &[PathBuf]) -> Result<()>;
}

pub trait LimsImporter {
    fn import(&mut self, files: &[PathBuf]) -> Result<()>;
}

pub trait StationPlotter {
    fn plot(&mut self, datasets: &[Dataset], output_dir: &Path) -> Result<Vec<PathBuf>>;
}
