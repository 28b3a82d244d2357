mod common;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Result;
use serde_json::json;
use svea_core::config::SveaConfig;
use svea_core::steps::PipelineStep;
use svea_core::{FileSource, SveaController, SveaError};
use tempfile::TempDir;

use common::{
    cnv_fixture, files_in, write_file, FailingTransfer, FakePlotter, FakeSbe, FakeSession,
    FlaggingQc, RecordingTransfer,
};

fn deck_with_raw_files(dir: &Path) -> PathBuf {
    write_file(dir, "SBE09_1387_20200207_0801_77SE_00_0120.hex", b"hex 120");
    write_file(dir, "SBE09_1387_20200207_0801_77SE_00_0120.XMLCON", b"xml 120");
    write_file(&dir.join("0121"), "SBE09_1387_20200207_1045_77SE_00_0121.hex", b"hex 121");
    write_file(dir, "cruise_notes.docx", b"not raw");
    dir.to_path_buf()
}

fn assert_missing_working_directory<T: std::fmt::Debug>(result: svea_core::Result<T>) {
    match result {
        Err(SveaError::MissingFiles(message)) => {
            assert!(
                message.to_lowercase().contains("working directory"),
                "unexpected message: {message}"
            );
        }
        other => panic!("expected a missing working directory, got {other:?}"),
    }
}

#[test]
fn every_step_refuses_to_run_without_a_working_directory() -> Result<()> {
    let tmp = TempDir::new()?;
    let mut controller = SveaController::new()
        .with_session(FakeSession::new(&tmp.path().join("scratch")))
        .with_qc_engine(FlaggingQc::default())
        .with_sbe_processor(FakeSbe)
        .with_file_delivery(RecordingTransfer::default())
        .with_lims_importer(RecordingTransfer::default())
        .with_station_plotter(FakePlotter);
    controller.set_cnv_files(cnv_fixture(&tmp.path().join("deck")))?;

    assert_missing_working_directory(controller.sbe_processing(FileSource::Clear));
    assert_missing_working_directory(controller.create_metadata_file());
    assert_missing_working_directory(controller.create_standard_format());
    assert_missing_working_directory(controller.perform_automatic_qc());
    assert_missing_working_directory(controller.open_visual_qc());
    assert_missing_working_directory(controller.send_files_to_ftp());
    assert_missing_working_directory(controller.import_to_lims());
    assert_missing_working_directory(controller.create_station_plots());
    assert_eq!(controller.steps().completed().count(), 0);
    Ok(())
}

#[test]
fn full_cruise_runs_through_every_processing_step() -> Result<()> {
    let tmp = TempDir::new()?;
    let deck = deck_with_raw_files(&tmp.path().join("deck"));
    let work = tmp.path().join("work");

    let session = FakeSession::new(&tmp.path().join("scratch"));
    let session_log = session.log.clone();
    let qc = FlaggingQc::default();
    let qc_mappings = qc.mappings.clone();
    let ftp = RecordingTransfer::default();
    let lims = RecordingTransfer::default();

    let mut config = SveaConfig::default();
    config.working_directory = Some(work.clone());
    config
        .qc
        .parameter_mapping
        .insert("TEMP_CTD".to_string(), "TEMP_CTD".to_string());
    let mut controller = SveaController::from_config(&config)?
        .with_session(session)
        .with_qc_engine(qc)
        .with_sbe_processor(FakeSbe)
        .with_file_delivery(ftp.clone())
        .with_lims_importer(lims.clone())
        .with_station_plotter(FakePlotter);
    controller.set_metadata(json!({ "MYEAR": 2020, "SHIPC": "77SE" }))?;

    let cnv_dir = controller.sbe_processing(FileSource::Directory(deck))?;
    assert_eq!(cnv_dir, work.join("cnv"));
    assert_eq!(controller.raw_files().len(), 3);
    assert_eq!(files_in(&work.join("raw")).len(), 3);
    assert_eq!(
        files_in(&cnv_dir),
        vec![
            "SBE09_1387_20200207_0801_77SE_00_0120.cnv",
            "SBE09_1387_20200207_1045_77SE_00_0121.cnv"
        ]
    );

    let metadata_path = controller.create_metadata_file()?;
    assert_eq!(metadata_path, work.join("metadata_77SE_2020.xlsx"));
    assert_eq!(controller.metadata_file_path(), Some(metadata_path.as_path()));
    assert!(fs::read_to_string(&metadata_path)?.contains("77SE"));
    {
        let log = session_log.lock().unwrap();
        let (metadata, overwrite) = &log.metadata_updates[0];
        assert_eq!(metadata["MYEAR"], json!(2020));
        assert!(!overwrite);
    }

    let standard_dir = controller.create_standard_format()?;
    assert_eq!(standard_dir, work.join("standard_format"));
    assert_eq!(
        files_in(&standard_dir),
        vec![
            "ctd_profile_SBE09_1387_20200207_0801_77SE_00_0120.txt",
            "ctd_profile_SBE09_1387_20200207_1045_77SE_00_0121.txt"
        ]
    );
    {
        let log = session_log.lock().unwrap();
        let standard_read = log.reads.last().expect("standard format read");
        assert!(standard_read.contains(&metadata_path));
    }

    let qc_dir = controller.perform_automatic_qc()?;
    assert_eq!(qc_dir, work.join("standard_format_qc"));
    assert_eq!(controller.qc_files().len(), 2);
    for file in controller.qc_files() {
        assert!(fs::read_to_string(file)?.contains("AUTO_QC"));
    }
    assert_eq!(qc_mappings.lock().unwrap()[0]["TEMP_CTD"], "TEMP_CTD");

    assert_eq!(controller.send_files_to_ftp()?, qc_dir);
    assert_eq!(ftp.files.lock().unwrap().as_slice(), controller.qc_files());

    controller.import_to_lims()?;
    assert_eq!(lims.files.lock().unwrap().len(), 2);

    let plots_dir = controller.create_station_plots()?;
    assert_eq!(files_in(&plots_dir).len(), 2);

    let steps = controller.steps();
    for step in PipelineStep::ALL {
        assert_eq!(steps.is_done(step), step != PipelineStep::OpenVisualQc, "{step}");
    }
    assert_eq!(steps.next_recommended(), Some(PipelineStep::OpenVisualQc));
    Ok(())
}

#[test]
fn steps_pick_up_files_already_in_the_working_directory() -> Result<()> {
    let tmp = TempDir::new()?;
    let work = tmp.path().join("work");
    write_file(&work.join("standard_format_qc"), "ctd_profile_0120.txt", b"qc");
    write_file(&work.join("standard_format_qc"), "ctd_profile_0121.txt", b"qc");

    let ftp = RecordingTransfer::default();
    let mut controller = SveaController::new().with_file_delivery(ftp.clone());
    controller.set_working_directory(&work)?;

    controller.send_files_to_ftp()?;
    assert_eq!(ftp.files.lock().unwrap().len(), 2);
    assert!(controller.steps().is_done(PipelineStep::SendFilesToFtp));
    Ok(())
}

#[test]
fn existing_metadata_file_is_protected_unless_overwrite_is_allowed() -> Result<()> {
    let tmp = TempDir::new()?;
    let work = tmp.path().join("work");
    let existing = write_file(&work, "metadata_77SE_2020.xlsx", b"operator edits");

    let mut controller =
        SveaController::new().with_session(FakeSession::new(&tmp.path().join("scratch")));
    controller.set_working_directory(&work)?;
    controller.set_cnv_files(cnv_fixture(&tmp.path().join("deck")))?;

    let err = controller.create_metadata_file().unwrap_err();
    assert!(matches!(err, SveaError::Permission(_)));
    assert_eq!(fs::read(&existing)?, b"operator edits");
    assert!(!controller.steps().is_done(PipelineStep::CreateMetadataFile));

    controller.set_overwrite_permission(true);
    assert_eq!(controller.create_metadata_file()?, existing);
    assert_ne!(fs::read(&existing)?, b"operator edits");
    Ok(())
}

#[test]
fn overwrite_permission_must_be_boolean() -> Result<()> {
    let mut controller = SveaController::new();
    controller.set_overwrite_permission_value(&json!(true))?;
    assert!(controller.overwrite_permission());

    let err = controller
        .set_overwrite_permission_value(&json!("yes"))
        .unwrap_err();
    assert!(matches!(err, SveaError::Dtype(_)));
    assert!(controller.overwrite_permission());
    Ok(())
}

#[test]
fn missing_collaborators_are_reported_after_preconditions() -> Result<()> {
    let tmp = TempDir::new()?;
    let work = tmp.path().join("work");
    let mut controller = SveaController::new();
    controller.set_working_directory(&work)?;

    let err = controller.create_metadata_file().unwrap_err();
    assert!(matches!(err, SveaError::MissingFiles(_)));

    controller.set_cnv_files(cnv_fixture(&tmp.path().join("deck")))?;
    let err = controller.create_metadata_file().unwrap_err();
    assert!(matches!(err, SveaError::Unconfigured(_)));
    assert!(work.is_dir());
    Ok(())
}

#[test]
fn collaborator_failures_leave_the_step_unmarked() -> Result<()> {
    let tmp = TempDir::new()?;
    let work = tmp.path().join("work");
    write_file(&work.join("standard_format_qc"), "ctd_profile_0120.txt", b"qc");

    let mut controller = SveaController::new().with_file_delivery(FailingTransfer);
    controller.set_working_directory(&work)?;

    let err = controller.send_files_to_ftp().unwrap_err();
    assert!(matches!(err, SveaError::Collaborator { .. }));
    assert!(err.to_string().contains("connection refused"));
    assert!(!controller.steps().is_done(PipelineStep::SendFilesToFtp));
    Ok(())
}

#[test]
fn changing_the_working_directory_moves_every_derived_path() -> Result<()> {
    let tmp = TempDir::new()?;
    let mut controller = SveaController::new();

    controller.set_working_directory(tmp.path().join("first"))?;
    controller.set_working_directory(tmp.path().join("second"))?;
    let layout = controller.layout();
    for dir in [
        svea_core::LayoutDir::Raw,
        svea_core::LayoutDir::Cnv,
        svea_core::LayoutDir::StandardFormat,
        svea_core::LayoutDir::StandardFormatQc,
    ] {
        let path = layout.dir(dir).expect("derived path set");
        assert!(path.starts_with(tmp.path().join("second")), "{path:?}");
    }
    assert!(controller.visual_qc_url().ends_with("svea_visual_qc_deep"));

    controller.clear_working_directory()?;
    assert!(controller.working_directory().is_none());
    assert!(controller.metadata_file_path().is_none());
    Ok(())
}
