// crates/svea-core/src/controller.rs

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{info, warn};

use crate::collaborators::{
    DatasetSession, FileDelivery, LimsImporter, QcEngine, SbeProcessor, StationPlotter,
};
use crate::config::SveaConfig;
use crate::creators::{AutomaticQcRunner, MetadataFileCreator, StandardFormatCreator};
use crate::error::{Result, SveaError};
use crate::file_set::{FileCategory, FileSet, FileSource};
use crate::layout::{LayoutDir, Reconfigure, WorkingDirectoryLayout};
use crate::metadata::{Metadata, MetadataMap};
use crate::metadata_file::MetadataFile;
use crate::overwrite::OverwritePolicy;
use crate::spreadsheet::SpreadsheetStore;
use crate::steps::{PipelineStep, PipelineSteps};
use crate::visual_qc::{VisualQc, VisualQcSettings};

fn require<'a, T: ?Sized>(slot: &'a mut Option<Box<T>>, what: &str) -> Result<&'a mut T> {
    slot.as_deref_mut()
        .ok_or_else(|| SveaError::unconfigured(format!("No {what} configured")))
}

/// Drives a CTD cruise through the processing steps and keeps track of
/// where each file set currently lives.
pub struct SveaController {
    layout: WorkingDirectoryLayout,
    steps: PipelineSteps,
    overwrite: OverwritePolicy,

    metadata: Metadata,
    metadata_file: MetadataFile,

    raw_files: FileSet,
    cnv_files: FileSet,
    standard_files: FileSet,
    qc_files: FileSet,

    metadata_creator: MetadataFileCreator,
    standard_creator: StandardFormatCreator,
    automatic_qc: AutomaticQcRunner,
    visual_qc: VisualQc,

    session: Option<Box<dyn DatasetSession>>,
    qc_engine: Option<Box<dyn QcEngine>>,
    sbe_processor: Option<Box<dyn SbeProcessor>>,
    delivery: Option<Box<dyn FileDelivery>>,
    lims: Option<Box<dyn LimsImporter>>,
    plotter: Option<Box<dyn StationPlotter>>,
    spreadsheets: Option<Box<dyn SpreadsheetStore>>,
}

impl Default for SveaController {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for SveaController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SveaController")
            .field("working_directory", &self.layout.root())
            .field("overwrite", &self.overwrite)
            .field("raw_files", &self.raw_files.len())
            .field("cnv_files", &self.cnv_files.len())
            .field("standard_files", &self.standard_files.len())
            .field("qc_files", &self.qc_files.len())
            .field("steps", &self.steps)
            .finish()
    }
}

impl SveaController {
    pub fn new() -> Self {
        info!("SveaController instance created");
        Self {
            layout: WorkingDirectoryLayout::default(),
            steps: PipelineSteps::new(),
            overwrite: OverwritePolicy::DENY,
            metadata: Metadata::new(),
            metadata_file: MetadataFile::new(),
            raw_files: FileSet::new(FileCategory::Raw),
            cnv_files: FileSet::new(FileCategory::Cnv),
            standard_files: FileSet::new(FileCategory::StandardFormat),
            qc_files: FileSet::new(FileCategory::StandardFormat),
            metadata_creator: MetadataFileCreator::new(),
            standard_creator: StandardFormatCreator::new(),
            automatic_qc: AutomaticQcRunner::new(),
            visual_qc: VisualQc::new(VisualQcSettings::default()),
            session: None,
            qc_engine: None,
            sbe_processor: None,
            delivery: None,
            lims: None,
            plotter: None,
            spreadsheets: None,
        }
    }

    pub fn from_config(config: &SveaConfig) -> Result<Self> {
        let mut controller = Self::new();
        controller.visual_qc.set_settings(config.visual_qc.clone());
        controller
            .automatic_qc
            .set_parameter_mapping(config.qc.parameter_mapping.clone());
        controller.metadata.set_map(config.metadata.clone())?;
        if let Some(directory) = &config.working_directory {
            controller.set_working_directory(directory)?;
        }
        controller.set_overwrite_permission(config.overwrite);
        Ok(controller)
    }

    pub fn with_session(mut self, session: impl DatasetSession + 'static) -> Self {
        self.session = Some(Box::new(session));
        self
    }

    pub fn with_qc_engine(mut self, engine: impl QcEngine + 'static) -> Self {
        self.qc_engine = Some(Box::new(engine));
        self
    }

    pub fn with_sbe_processor(mut self, processor: impl SbeProcessor + 'static) -> Self {
        self.sbe_processor = Some(Box::new(processor));
        self
    }

    pub fn with_file_delivery(mut self, delivery: impl FileDelivery + 'static) -> Self {
        self.delivery = Some(Box::new(delivery));
        self
    }

    pub fn with_lims_importer(mut self, lims: impl LimsImporter + 'static) -> Self {
        self.lims = Some(Box::new(lims));
        self
    }

    pub fn with_station_plotter(mut self, plotter: impl StationPlotter + 'static) -> Self {
        self.plotter = Some(Box::new(plotter));
        self
    }

    pub fn with_spreadsheet_store(mut self, store: impl SpreadsheetStore + 'static) -> Self {
        self.spreadsheets = Some(Box::new(store));
        self
    }

    // --- working directory -------------------------------------------------

    pub fn working_directory(&self) -> Option<&Path> {
        self.layout.root()
    }

    pub fn layout(&self) -> &WorkingDirectoryLayout {
        &self.layout
    }

    pub fn set_working_directory(&mut self, directory: impl Into<PathBuf>) -> Result<()> {
        self.layout.set_root(directory);
        self.reconfigure_components()?;
        if let Some(root) = self.layout.root() {
            info!("Working directory set to: {}", root.display());
        }
        Ok(())
    }

    pub fn clear_working_directory(&mut self) -> Result<()> {
        self.layout.clear();
        self.reconfigure_components()?;
        info!("Working directory cleared");
        Ok(())
    }

    fn reconfigure_components(&mut self) -> Result<()> {
        let components: [&mut dyn Reconfigure; 4] = [
            &mut self.metadata_file,
            &mut self.standard_creator,
            &mut self.automatic_qc,
            &mut self.visual_qc,
        ];
        for component in components {
            component.reconfigure(&self.layout)?;
        }
        Ok(())
    }

    fn prepare_working_directory(&self) -> Result<PathBuf> {
        let root = self.layout.require(LayoutDir::Root)?.to_path_buf();
        if root.exists() {
            if !root.is_dir() {
                return Err(SveaError::path(format!(
                    "Working directory is not a directory: {}",
                    root.display()
                )));
            }
        } else {
            fs::create_dir_all(&root).map_err(|err| SveaError::io(&root, err))?;
            info!("Working directory created: {}", root.display());
        }
        Ok(root)
    }

    fn begin_step(&self, step: PipelineStep) -> Result<PathBuf> {
        let root = self.prepare_working_directory()?;
        let missing = self.steps.missing_predecessors(step);
        if !missing.is_empty() {
            let names: Vec<&str> = missing.iter().map(|step| step.name()).collect();
            warn!(
                step = step.name(),
                "running before recommended steps: {}",
                names.join(", ")
            );
        }
        info!(step = step.name(), "step started");
        Ok(root)
    }

    fn finish_step(&mut self, step: PipelineStep) {
        self.steps.mark(step);
        info!(step = step.name(), "step completed");
    }

    fn layout_dir(&self, dir: LayoutDir) -> Result<PathBuf> {
        Ok(self.layout.require(dir)?.to_path_buf())
    }

    // --- steps -------------------------------------------------------------

    /// Stages raw instrument files into `raw/` and runs SBE processing into
    /// `cnv/`. Returns the CNV directory.
    pub fn sbe_processing(&mut self, source: impl Into<FileSource>) -> Result<PathBuf> {
        let step = PipelineStep::SbeProcessing;
        self.begin_step(step)?;
        let raw_dir = self.layout_dir(LayoutDir::Raw)?;
        let cnv_dir = self.layout_dir(LayoutDir::Cnv)?;

        self.raw_files.assign(source)?;
        if self.raw_files.is_empty() {
            return Err(SveaError::missing_files("No raw files found to process"));
        }
        let processor = require(&mut self.sbe_processor, "SBE processor")?;
        self.raw_files.relocate(&raw_dir)?;

        fs::create_dir_all(&cnv_dir).map_err(|err| SveaError::io(&cnv_dir, err))?;
        let cnv_paths = processor
            .process(self.raw_files.paths(), &cnv_dir)
            .map_err(|err| SveaError::collaborator("SBE processor", err))?;
        self.cnv_files.assign(cnv_paths)?;
        if self.cnv_files.is_empty() {
            return Err(SveaError::missing_files(
                "SBE processing produced no CNV files",
            ));
        }
        self.cnv_files.relocate(&cnv_dir)?;

        self.finish_step(step);
        Ok(cnv_dir)
    }

    /// Returns the path of the created metadata workbook.
    pub fn create_metadata_file(&mut self) -> Result<PathBuf> {
        let step = PipelineStep::CreateMetadataFile;
        self.begin_step(step)?;
        let cnv_dir = self.layout_dir(LayoutDir::Cnv)?;
        if self.cnv_files.is_empty() {
            return Err(SveaError::missing_files("No CNV files are set"));
        }
        let session = require(&mut self.session, "dataset session")?;

        let path = self.metadata_creator.create_file(
            session,
            &self.cnv_files,
            &self.metadata,
            &mut self.metadata_file,
        )?;
        self.cnv_files.relocate(&cnv_dir)?;

        self.finish_step(step);
        Ok(path)
    }

    /// Returns the standard-format directory.
    pub fn create_standard_format(&mut self) -> Result<PathBuf> {
        let step = PipelineStep::CreateStandardFormat;
        self.begin_step(step)?;
        if self.cnv_files.is_empty() {
            return Err(SveaError::missing_files("No CNV files are set"));
        }
        self.metadata_file.require_existing()?;
        let session = require(&mut self.session, "dataset session")?;

        let report = self.standard_creator.create_files(
            session,
            &self.cnv_files,
            &self.metadata_file,
            &mut self.standard_files,
        )?;
        info!(
            copied = report.copied.len(),
            skipped = report.skipped_existing.len(),
            "Standard format files written to {}",
            report.target.display()
        );

        self.finish_step(step);
        Ok(report.target)
    }

    /// Returns the directory holding the QC'd standard-format files.
    pub fn perform_automatic_qc(&mut self) -> Result<PathBuf> {
        let step = PipelineStep::PerformAutomaticQc;
        self.begin_step(step)?;
        let standard_dir = self.layout_dir(LayoutDir::StandardFormat)?;
        if self.standard_files.is_empty() && standard_dir.is_dir() {
            self.standard_files.assign(FileSource::Directory(standard_dir))?;
        }
        if self.standard_files.is_empty() {
            return Err(SveaError::missing_files(
                "No standard format files are set",
            ));
        }
        let session = require(&mut self.session, "dataset session")?;
        let engine = require(&mut self.qc_engine, "QC engine")?;

        let report =
            self.automatic_qc
                .run(session, engine, &self.standard_files, &mut self.qc_files)?;

        self.finish_step(step);
        Ok(report.target)
    }

    /// Launches the visualization service. Returns the rendered server
    /// configuration.
    pub fn open_visual_qc(&mut self) -> Result<PathBuf> {
        let step = PipelineStep::OpenVisualQc;
        self.begin_step(step)?;
        self.ensure_qc_files()?;
        let config_path = self.visual_qc.open()?;
        info!("Visual QC available at {}", self.visual_qc.url());
        self.finish_step(step);
        Ok(config_path)
    }

    /// Returns false when no server was running.
    pub fn close_visual_qc(&mut self) -> bool {
        let stopped = self.visual_qc.close();
        if !stopped {
            warn!("No visual QC server is running");
        }
        stopped
    }

    pub fn visual_qc_url(&self) -> String {
        self.visual_qc.url()
    }

    pub fn visual_qc_running(&mut self) -> bool {
        self.visual_qc.is_running()
    }

    pub fn send_files_to_ftp(&mut self) -> Result<PathBuf> {
        let step = PipelineStep::SendFilesToFtp;
        self.begin_step(step)?;
        let qc_dir = self.ensure_qc_files()?;
        let delivery = require(&mut self.delivery, "FTP delivery")?;
        delivery
            .deliver(self.qc_files.paths())
            .map_err(|err| SveaError::collaborator("FTP delivery", err))?;
        info!("{} files sent to FTP", self.qc_files.len());
        self.finish_step(step);
        Ok(qc_dir)
    }

    pub fn import_to_lims(&mut self) -> Result<PathBuf> {
        let step = PipelineStep::ImportToLims;
        self.begin_step(step)?;
        let qc_dir = self.ensure_qc_files()?;
        let lims = require(&mut self.lims, "LIMS importer")?;
        lims.import(self.qc_files.paths())
            .map_err(|err| SveaError::collaborator("LIMS import", err))?;
        info!("{} files imported to LIMS", self.qc_files.len());
        self.finish_step(step);
        Ok(qc_dir)
    }

    /// Returns the plots directory.
    pub fn create_station_plots(&mut self) -> Result<PathBuf> {
        let step = PipelineStep::CreateStationPlots;
        self.begin_step(step)?;
        self.ensure_qc_files()?;
        let plots_dir = self.layout_dir(LayoutDir::Plots)?;
        let session = require(&mut self.session, "dataset session")?;
        let plotter = require(&mut self.plotter, "station plotter")?;

        let datasets = session
            .read(self.qc_files.paths())
            .map_err(|err| SveaError::collaborator("dataset session", err))?;
        fs::create_dir_all(&plots_dir).map_err(|err| SveaError::io(&plots_dir, err))?;
        let plots = plotter
            .plot(&datasets, &plots_dir)
            .map_err(|err| SveaError::collaborator("station plotter", err))?;
        info!("{} station plots written to {}", plots.len(), plots_dir.display());

        self.finish_step(step);
        Ok(plots_dir)
    }

    /// Falls back to whatever already sits in `standard_format_qc/`.
    fn ensure_qc_files(&mut self) -> Result<PathBuf> {
        let qc_dir = self.layout_dir(LayoutDir::StandardFormatQc)?;
        if self.qc_files.is_empty() && qc_dir.is_dir() {
            self.qc_files.assign(FileSource::Directory(qc_dir.clone()))?;
        }
        if self.qc_files.is_empty() {
            return Err(SveaError::missing_files("No QC'd standard format files are set"));
        }
        Ok(qc_dir)
    }

    // --- file sets, metadata, overwrite -------------------------------------

    pub fn set_cnv_files(&mut self, source: impl Into<FileSource>) -> Result<&[PathBuf]> {
        self.cnv_files.assign(source)
    }

    pub fn cnv_files(&self) -> &[PathBuf] {
        self.cnv_files.paths()
    }

    pub fn raw_files(&self) -> &[PathBuf] {
        self.raw_files.paths()
    }

    pub fn standard_format_files(&self) -> &[PathBuf] {
        self.standard_files.paths()
    }

    pub fn qc_files(&self) -> &[PathBuf] {
        self.qc_files.paths()
    }

    pub fn metadata(&self) -> &MetadataMap {
        self.metadata.get()
    }

    pub fn set_metadata(&mut self, metadata: Value) -> Result<()> {
        self.metadata.set(metadata)
    }

    pub fn add_metadata(&mut self, metadata: Value) -> Result<()> {
        self.metadata.add(metadata)
    }

    /// Whether metadata values already present in a dataset may be replaced.
    pub fn set_metadata_overwrite(&mut self, overwrite: bool) {
        self.metadata.set_overwrite(overwrite.into());
    }

    pub fn metadata_file_path(&self) -> Option<&Path> {
        self.metadata_file.file_path()
    }

    pub fn set_metadata_file_path(&mut self, path: impl Into<PathBuf>) {
        self.metadata_file.set_file_path(path);
    }

    pub fn add_sensorinfo_from_file(&self, source: &Path, sheet_name: Option<&str>) -> Result<()> {
        let store = self
            .spreadsheets
            .as_deref()
            .ok_or_else(|| SveaError::unconfigured("No spreadsheet store configured"))?;
        self.metadata_file
            .add_sensorinfo_from_file(store, source, sheet_name)
    }

    pub fn overwrite_permission(&self) -> bool {
        self.overwrite.allows()
    }

    /// Applies the flag to every file set and component in one call.
    pub fn set_overwrite_permission(&mut self, overwrite: bool) {
        let policy = OverwritePolicy::from(overwrite);
        for file_set in [
            &mut self.raw_files,
            &mut self.cnv_files,
            &mut self.standard_files,
            &mut self.qc_files,
        ] {
            file_set.set_overwrite(policy);
        }
        self.metadata_file.set_overwrite(policy);
        self.metadata_creator.set_overwrite(policy);
        self.overwrite = policy;
        info!("Permission to overwrite set to {policy}");
    }

    /// Same as [`set_overwrite_permission`](Self::set_overwrite_permission)
    /// for loosely typed input; anything but a boolean is a `Dtype` error.
    pub fn set_overwrite_permission_value(&mut self, value: &Value) -> Result<()> {
        let policy = OverwritePolicy::from_value(value)?;
        self.set_overwrite_permission(policy.allows());
        Ok(())
    }

    pub fn steps(&self) -> &PipelineSteps {
        &self.steps
    }

    pub fn reset_steps(&mut self) {
        self.steps.reset();
        info!("Pipeline steps reset");
    }
}
