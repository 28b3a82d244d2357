#![allow(dead_code)]

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::{anyhow, Result};
use serde_json::Value;
use svea_core::collaborators::{
    Dataset, DatasetSession, FileDelivery, LimsImporter, QcEngine, SbeProcessor, StationPlotter,
    Writer,
};
use svea_core::file_set::STANDARD_FORMAT_PREFIX;
use svea_core::metadata::MetadataMap;

pub fn write_file(dir: &Path, name: &str, contents: &[u8]) -> PathBuf {
    fs::create_dir_all(dir).expect("create fixture dir");
    let path = dir.join(name);
    fs::write(&path, contents).expect("write fixture");
    path
}

pub fn file_names(paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|path| path.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

pub fn files_in(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = fs::read_dir(dir)
        .expect("read dir")
        .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}

/// Three casts as they come off the deck unit.
pub fn cnv_fixture(dir: &Path) -> Vec<PathBuf> {
    vec![
        write_file(dir, "SBE09_1387_20200207_0801_77SE_00_0120.cnv", b"* cast 120\n"),
        write_file(dir, "SBE09_1387_20200207_1045_77SE_00_0121.cnv", b"* cast 121\n"),
        write_file(dir, "SBE09_1387_20200208_0312_77SE_00_0122.cnv", b"* cast 122\n"),
    ]
}

#[derive(Debug, Default)]
pub struct SessionLog {
    pub reads: Vec<Vec<PathBuf>>,
    pub metadata_updates: Vec<(MetadataMap, bool)>,
    pub saves: Vec<(Writer, usize)>,
}

/// Dataset session writing small text stand-ins for the real writers.
pub struct FakeSession {
    scratch: PathBuf,
    pub log: Arc<Mutex<SessionLog>>,
}

impl FakeSession {
    pub fn new(scratch: &Path) -> Self {
        Self {
            scratch: scratch.to_path_buf(),
            log: Arc::new(Mutex::new(SessionLog::default())),
        }
    }
}

impl DatasetSession for FakeSession {
    fn read(&mut self, file_paths: &[PathBuf]) -> Result<Vec<Dataset>> {
        self.log.lock().unwrap().reads.push(file_paths.to_vec());
        let datasets = file_paths
            .iter()
            .filter(|path| {
                matches!(
                    path.extension().and_then(|ext| ext.to_str()),
                    Some("cnv") | Some("txt")
                )
            })
            .map(|path| {
                let stem = path.file_stem().unwrap().to_string_lossy();
                Dataset {
                    name: stem.trim_start_matches(STANDARD_FORMAT_PREFIX).to_string(),
                    source_files: vec![path.clone()],
                    metadata: MetadataMap::new(),
                }
            })
            .collect();
        Ok(datasets)
    }

    fn update_metadata(
        &mut self,
        dataset: &mut Dataset,
        metadata: &MetadataMap,
        overwrite: bool,
    ) -> Result<()> {
        self.log
            .lock()
            .unwrap()
            .metadata_updates
            .push((metadata.clone(), overwrite));
        for (key, value) in metadata {
            if overwrite || !dataset.metadata.contains_key(key) {
                dataset.metadata.insert(key.clone(), value.clone());
            }
        }
        Ok(())
    }

    fn save_data(&mut self, datasets: &[Dataset], writer: Writer) -> Result<PathBuf> {
        let mut log = self.log.lock().unwrap();
        log.saves.push((writer, datasets.len()));
        let save_index = log.saves.len();
        drop(log);

        match writer {
            Writer::MetadataTemplate => {
                let first = datasets.first().ok_or_else(|| anyhow!("nothing to save"))?;
                let body = serde_json::to_vec(&first.metadata)?;
                Ok(write_file(
                    &self.scratch.join("metadata_template"),
                    "metadata_77SE_2020.xlsx",
                    &body,
                ))
            }
            Writer::StandardFormat => {
                let dir = self.scratch.join(format!("standard_{save_index}"));
                for dataset in datasets {
                    let body = format!(
                        "{}\t{}\n",
                        dataset.name,
                        serde_json::to_string(&dataset.metadata)?
                    );
                    write_file(
                        &dir,
                        &format!("{STANDARD_FORMAT_PREFIX}{}.txt", dataset.name),
                        body.as_bytes(),
                    );
                }
                Ok(dir)
            }
        }
    }
}

#[derive(Default)]
pub struct FlaggingQc {
    pub mappings: Arc<Mutex<Vec<BTreeMap<String, String>>>>,
}

impl QcEngine for FlaggingQc {
    fn run(
        &self,
        dataset: &mut Dataset,
        parameter_mapping: &BTreeMap<String, String>,
    ) -> Result<()> {
        self.mappings.lock().unwrap().push(parameter_mapping.clone());
        dataset
            .metadata
            .insert("AUTO_QC".to_string(), Value::String("done".to_string()));
        Ok(())
    }
}

pub struct FakeSbe;

impl SbeProcessor for FakeSbe {
    fn process(&mut self, raw_files: &[PathBuf], output_dir: &Path) -> Result<Vec<PathBuf>> {
        let mut outputs = Vec::new();
        for raw in raw_files {
            if raw.extension().and_then(|ext| ext.to_str()) != Some("hex") {
                continue;
            }
            let stem = raw.file_stem().unwrap().to_string_lossy();
            let contents = fs::read(raw)?;
            outputs.push(write_file(output_dir, &format!("{stem}.cnv"), &contents));
        }
        Ok(outputs)
    }
}

#[derive(Default, Clone)]
pub struct RecordingTransfer {
    pub files: Arc<Mutex<Vec<PathBuf>>>,
}

impl FileDelivery for RecordingTransfer {
    fn deliver(&mut self, files: &[PathBuf]) -> Result<()> {
        self.files.lock().unwrap().extend(files.iter().cloned());
        Ok(())
    }
}

impl LimsImporter for RecordingTransfer {
    fn import(&mut self, files: &[PathBuf]) -> Result<()> {
        self.files.lock().unwrap().extend(files.iter().cloned());
        Ok(())
    }
}

pub struct FailingTransfer;

impl FileDelivery for FailingTransfer {
    fn deliver(&mut self, _files: &[PathBuf]) -> Result<()> {
        Err(anyhow!("connection refused"))
    }
}

pub struct FakePlotter;

impl StationPlotter for FakePlotter {
    fn plot(&mut self, datasets: &[Dataset], output_dir: &Path) -> Result<Vec<PathBuf>> {
        Ok(datasets
            .iter()
            .map(|dataset| write_file(output_dir, &format!("{}.png", dataset.name), b"png"))
            .collect())
    }
}
