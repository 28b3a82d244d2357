use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Result, SveaError};

pub const RAW_DIR: &str = "raw";
pub const CNV_DIR: &str = "cnv";
pub const STANDARD_FORMAT_DIR: &str = "standard_format";
pub const STANDARD_FORMAT_QC_DIR: &str = "standard_format_qc";
pub const PLOTS_DIR: &str = "plots";
pub const VISUAL_QC_DIR: &str = "visual_qc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LayoutDir {
    Root,
    Raw,
    Cnv,
    StandardFormat,
    StandardFormatQc,
    Plots,
    VisualQc,
}

impl LayoutDir {
    pub fn label(self) -> &'static str {
        match self {
            LayoutDir::Root => "working directory",
            LayoutDir::Raw => "raw directory",
            LayoutDir::Cnv => "cnv directory",
            LayoutDir::StandardFormat => "standard format directory",
            LayoutDir::StandardFormatQc => "standard format qc directory",
            LayoutDir::Plots => "plots directory",
            LayoutDir::VisualQc => "visual qc directory",
        }
    }
}

/// Working directory root and the directories derived from it.
///
/// Every derived path is recomputed from the root in one go; there is no way
/// to hold a derived path that disagrees with the current root.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct WorkingDirectoryLayout {
    root: Option<PathBuf>,
    raw: Option<PathBuf>,
    cnv: Option<PathBuf>,
    standard_format: Option<PathBuf>,
    standard_format_qc: Option<PathBuf>,
    plots: Option<PathBuf>,
    visual_qc: Option<PathBuf>,
}

impl WorkingDirectoryLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let mut layout = Self::default();
        layout.set_root(root);
        layout
    }

    pub fn set_root(&mut self, root: impl Into<PathBuf>) {
        let root = root.into();
        *self = Self {
            raw: Some(root.join(RAW_DIR)),
            cnv: Some(root.join(CNV_DIR)),
            standard_format: Some(root.join(STANDARD_FORMAT_DIR)),
            standard_format_qc: Some(root.join(STANDARD_FORMAT_QC_DIR)),
            plots: Some(root.join(PLOTS_DIR)),
            visual_qc: Some(root.join(VISUAL_QC_DIR)),
            root: Some(root),
        };
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_set(&self) -> bool {
        self.root.is_some()
    }

    pub fn root(&self) -> Option<&Path> {
        self.root.as_deref()
    }

    pub fn dir(&self, dir: LayoutDir) -> Option<&Path> {
        match dir {
            LayoutDir::Root => self.root.as_deref(),
            LayoutDir::Raw => self.raw.as_deref(),
            LayoutDir::Cnv => self.cnv.as_deref(),
            LayoutDir::StandardFormat => self.standard_format.as_deref(),
            LayoutDir::StandardFormatQc => self.standard_format_qc.as_deref(),
            LayoutDir::Plots => self.plots.as_deref(),
            LayoutDir::VisualQc => self.visual_qc.as_deref(),
        }
    }

    pub fn require(&self, dir: LayoutDir) -> Result<&Path> {
        self.dir(dir).ok_or_else(|| {
            if self.is_set() {
                SveaError::missing_files(format!("{} is not set", dir.label()))
            } else {
                SveaError::missing_files("Working directory is not set")
            }
        })
    }
}

/// Components whose paths are derived from the working directory.
pub trait Reconfigure {
    fn reconfigure(&mut self, layout: &WorkingDirectoryLayout) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setting_root_recomputes_every_directory() {
        let mut layout = WorkingDirectoryLayout::new("/data/cruise_01");
        assert_eq!(
            layout.dir(LayoutDir::Cnv),
            Some(Path::new("/data/cruise_01/cnv"))
        );

        layout.set_root("/data/cruise_02");
        assert_eq!(
            layout.dir(LayoutDir::Raw),
            Some(Path::new("/data/cruise_02/raw"))
        );
        assert_eq!(
            layout.dir(LayoutDir::StandardFormatQc),
            Some(Path::new("/data/cruise_02/standard_format_qc"))
        );
        assert_eq!(layout.root(), Some(Path::new("/data/cruise_02")));
    }

    #[test]
    fn clearing_root_clears_derived_directories() {
        let mut layout = WorkingDirectoryLayout::new("/data/cruise_01");
        layout.clear();
        assert!(!layout.is_set());
        assert!(layout.dir(LayoutDir::StandardFormat).is_none());

        let err = layout.require(LayoutDir::Cnv).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("working directory"));
    }
}
