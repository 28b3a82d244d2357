mod common;

use anyhow::Result;
use svea_core::layout::Reconfigure;
use svea_core::visual_qc::{VisualQc, VisualQcServerConfig, VisualQcSettings};
use svea_core::{SveaController, SveaError, WorkingDirectoryLayout};
use tempfile::TempDir;

use common::write_file;

#[test]
fn rendered_configuration_points_at_the_qc_directory() -> Result<()> {
    let tmp = TempDir::new()?;
    let layout = WorkingDirectoryLayout::new(tmp.path().join("work"));
    let mut settings = VisualQcSettings::default();
    settings.profile = "coastal".to_string();
    settings.filters.ship_list = vec!["77SE".to_string()];

    let mut visual_qc = VisualQc::new(settings);
    visual_qc.reconfigure(&layout)?;
    let path = visual_qc.render()?;

    assert_eq!(
        path,
        tmp.path()
            .join("work")
            .join("visual_qc")
            .join("svea_visual_qc_coastal.json")
    );
    let rendered: VisualQcServerConfig = serde_json::from_slice(&std::fs::read(&path)?)?;
    assert_eq!(
        rendered.data_directory,
        tmp.path().join("work").join("standard_format_qc")
    );
    assert_eq!(rendered.filters.ship_list, vec!["77SE"]);
    assert_eq!(
        visual_qc.url(),
        "http://localhost:5006/svea_visual_qc_coastal"
    );
    Ok(())
}

#[test]
fn opening_without_a_runtime_is_unconfigured() -> Result<()> {
    let tmp = TempDir::new()?;
    let work = tmp.path().join("work");
    write_file(&work.join("standard_format_qc"), "ctd_profile_0120.txt", b"qc");

    let mut controller = SveaController::new();
    controller.set_working_directory(&work)?;
    let err = controller.open_visual_qc().unwrap_err();
    assert!(matches!(err, SveaError::Unconfigured(_)));
    assert!(!controller.close_visual_qc());
    Ok(())
}

#[test]
fn opening_without_qc_files_is_missing_files() -> Result<()> {
    let tmp = TempDir::new()?;
    let mut controller = SveaController::new();
    controller.set_working_directory(tmp.path().join("work"))?;
    let err = controller.open_visual_qc().unwrap_err();
    assert!(matches!(err, SveaError::MissingFiles(_)));
    Ok(())
}

#[cfg(unix)]
#[test]
fn server_lifecycle_is_owned_by_the_controller() -> Result<()> {
    use svea_core::config::SveaConfig;
    use svea_core::steps::PipelineStep;

    let tmp = TempDir::new()?;
    let work = tmp.path().join("work");
    write_file(&work.join("standard_format_qc"), "ctd_profile_0120.txt", b"qc");

    let mut config = SveaConfig::default();
    config.working_directory = Some(work.clone());
    config.visual_qc.runtime = Some("sh".into());
    config.visual_qc.runtime_args = vec!["-c".to_string(), "exec sleep 30".to_string()];
    config.visual_qc.open_browser = false;
    let mut controller = SveaController::from_config(&config)?;

    let config_path = controller.open_visual_qc()?;
    assert!(config_path.is_file());
    assert!(controller.visual_qc_running());
    assert!(controller.steps().is_done(PipelineStep::OpenVisualQc));

    // Reopening restarts the server.
    controller.open_visual_qc()?;
    assert!(controller.visual_qc_running());

    assert!(controller.close_visual_qc());
    assert!(!controller.visual_qc_running());
    assert!(!controller.close_visual_qc());
    Ok(())
}
