use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{Result, SveaError};
use crate::overwrite::OverwritePolicy;
use crate::visual_qc::VisualQcSettings;

pub const CONFIG_ENV: &str = "SVEA_CONFIG";
pub const WORKING_DIRECTORY_ENV: &str = "SVEA_WORKING_DIRECTORY";
pub const OVERWRITE_ENV: &str = "SVEA_OVERWRITE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QcSettings {
    /// QC parameter name -> dataset column name.
    pub parameter_mapping: BTreeMap<String, String>,
}

/// Operator configuration, usually read from `svea.toml`.
///
/// ```toml
/// working_directory = "/data/svea/2020_77SE_01"
/// overwrite = false
///
/// [metadata]
/// MYEAR = 2020
/// SHIPC = "77SE"
///
/// [qc.parameter_mapping]
/// TEMP_CTD = "TEMP_CTD"
///
/// [visual_qc]
/// runtime = "/opt/svea/venv/bin/bokeh"
/// runtime_args = ["serve"]
/// profile = "deep"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SveaConfig {
    pub working_directory: Option<PathBuf>,
    pub overwrite: bool,
    pub metadata: BTreeMap<String, Value>,
    pub qc: QcSettings,
    pub visual_qc: VisualQcSettings,
}

impl SveaConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path).map_err(|err| SveaError::io(path, err))?;
        let config = Self::from_toml_str(&text)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    pub fn overwrite_policy(&self) -> OverwritePolicy {
        OverwritePolicy::from(self.overwrite)
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_overrides(
            env::var(WORKING_DIRECTORY_ENV).ok(),
            env::var(OVERWRITE_ENV).ok(),
        )
    }

    /// Applies string overrides as they arrive from the environment. An
    /// overwrite value that is not a boolean is a `Dtype` error.
    pub fn apply_overrides(
        &mut self,
        working_directory: Option<String>,
        overwrite: Option<String>,
    ) -> Result<()> {
        if let Some(directory) = working_directory.filter(|value| !value.trim().is_empty()) {
            self.working_directory = Some(PathBuf::from(directory));
        }
        if let Some(flag) = overwrite {
            self.overwrite = OverwritePolicy::parse(&flag)?.allows();
        }
        Ok(())
    }
}
