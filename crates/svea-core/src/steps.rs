use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStep {
    SbeProcessing,
    CreateMetadataFile,
    CreateStandardFormat,
    PerformAutomaticQc,
    OpenVisualQc,
    SendFilesToFtp,
    ImportToLims,
    CreateStationPlots,
}

impl PipelineStep {
    /// Recommended execution order.
    pub const ALL: [PipelineStep; 8] = [
        PipelineStep::SbeProcessing,
        PipelineStep::CreateMetadataFile,
        PipelineStep::CreateStandardFormat,
        PipelineStep::PerformAutomaticQc,
        PipelineStep::OpenVisualQc,
        PipelineStep::SendFilesToFtp,
        PipelineStep::ImportToLims,
        PipelineStep::CreateStationPlots,
    ];

    pub fn name(self) -> &'static str {
        match self {
            PipelineStep::SbeProcessing => "sbe_processing",
            PipelineStep::CreateMetadataFile => "create_metadata_file",
            PipelineStep::CreateStandardFormat => "create_standard_format",
            PipelineStep::PerformAutomaticQc => "perform_automatic_qc",
            PipelineStep::OpenVisualQc => "open_visual_qc",
            PipelineStep::SendFilesToFtp => "send_files_to_ftp",
            PipelineStep::ImportToLims => "import_to_lims",
            PipelineStep::CreateStationPlots => "create_station_plots",
        }
    }

    pub fn predecessors(self) -> &'static [PipelineStep] {
        let all: &'static [PipelineStep] = &Self::ALL;
        let index = all.iter().position(|step| *step == self).unwrap_or(0);
        &all[..index]
    }
}

impl fmt::Display for PipelineStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Which steps have completed, with the time each first completed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PipelineSteps {
    completed: BTreeMap<PipelineStep, DateTime<Utc>>,
}

impl PipelineSteps {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false if the step was already marked; the first timestamp is kept.
    pub fn mark(&mut self, step: PipelineStep) -> bool {
        if self.completed.contains_key(&step) {
            return false;
        }
        self.completed.insert(step, Utc::now());
        true
    }

    pub fn is_done(&self, step: PipelineStep) -> bool {
        self.completed.contains_key(&step)
    }

    pub fn completed_at(&self, step: PipelineStep) -> Option<DateTime<Utc>> {
        self.completed.get(&step).copied()
    }

    pub fn completed(&self) -> impl Iterator<Item = PipelineStep> + '_ {
        self.completed.keys().copied()
    }

    /// Earlier steps in the recommended order that have not run yet.
    pub fn missing_predecessors(&self, step: PipelineStep) -> Vec<PipelineStep> {
        step.predecessors()
            .iter()
            .copied()
            .filter(|previous| !self.is_done(*previous))
            .collect()
    }

    pub fn next_recommended(&self) -> Option<PipelineStep> {
        PipelineStep::ALL
            .iter()
            .copied()
            .find(|step| !self.is_done(*step))
    }

    pub fn reset(&mut self) {
        self.completed.clear();
    }
}
