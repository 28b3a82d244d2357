use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, SveaError};
use crate::layout::{LayoutDir, Reconfigure, WorkingDirectoryLayout};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5006/";
pub const DEFAULT_PROFILE: &str = "deep";
pub const SERVER_FILE_PREFIX: &str = "svea_visual_qc";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualQcFilters {
    pub month_list: Vec<u32>,
    pub ship_list: Vec<String>,
    pub serno_min: Option<u32>,
    pub serno_max: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisualQcSettings {
    /// Program that serves the visualization, usually inside its own
    /// virtual environment.
    pub runtime: Option<PathBuf>,
    /// Arguments placed before the rendered configuration path.
    pub runtime_args: Vec<String>,
    pub base_url: String,
    pub profile: String,
    pub filters: VisualQcFilters,
    pub open_browser: bool,
}

impl Default for VisualQcSettings {
    fn default() -> Self {
        Self {
            runtime: None,
            runtime_args: Vec::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            profile: DEFAULT_PROFILE.to_string(),
            filters: VisualQcFilters::default(),
            open_browser: true,
        }
    }
}

/// What the visualization service is started with.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VisualQcServerConfig {
    pub server_file_stem: String,
    pub data_directory: PathBuf,
    pub profile: String,
    pub filters: VisualQcFilters,
}

impl VisualQcServerConfig {
    pub fn url(&self, base_url: &str) -> String {
        format!("{base_url}{}", self.server_file_stem)
    }
}

/// Handle on a running visualization server. Dropping it stops the server.
#[derive(Debug)]
pub struct VisualQcServer {
    child: Option<Child>,
    url: String,
    config_path: PathBuf,
}

impl VisualQcServer {
    pub fn launch(
        program: &Path,
        args: &[String],
        config_path: &Path,
        url: impl Into<String>,
    ) -> Result<Self> {
        let child = Command::new(program)
            .args(args)
            .arg(config_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|err| SveaError::io(program, err))?;
        let server = Self {
            child: Some(child),
            url: url.into(),
            config_path: config_path.to_path_buf(),
        };
        info!(
            pid = server.pid(),
            url = %server.url,
            "Visual QC server started"
        );
        Ok(server)
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn is_running(&mut self) -> bool {
        match self.child.as_mut() {
            Some(child) => matches!(child.try_wait(), Ok(None)),
            None => false,
        }
    }

    pub fn stop(mut self) {
        self.terminate();
    }

    // Best effort: there is no confirmation that the server shut down cleanly.
    fn terminate(&mut self) {
        let Some(mut child) = self.child.take() else {
            return;
        };
        if let Err(err) = child.kill() {
            debug!("visual QC server already gone: {err}");
        }
        if let Err(err) = child.wait() {
            debug!("could not reap visual QC server: {err}");
        }
        info!(url = %self.url, "Visual QC server stopped");
    }
}

impl Drop for VisualQcServer {
    fn drop(&mut self) {
        self.terminate();
    }
}

/// Renders the server configuration and owns the server's lifetime.
#[derive(Debug, Default)]
pub struct VisualQc {
    settings: VisualQcSettings,
    data_directory: Option<PathBuf>,
    config_directory: Option<PathBuf>,
    server: Option<VisualQcServer>,
}

impl VisualQc {
    pub fn new(settings: VisualQcSettings) -> Self {
        Self {
            settings,
            ..Self::default()
        }
    }

    pub fn settings(&self) -> &VisualQcSettings {
        &self.settings
    }

    pub fn set_settings(&mut self, settings: VisualQcSettings) {
        self.settings = settings;
    }

    pub fn data_directory(&self) -> Option<&Path> {
        self.data_directory.as_deref()
    }

    pub fn server_file_stem(&self) -> String {
        format!("{SERVER_FILE_PREFIX}_{}", self.settings.profile)
    }

    pub fn url(&self) -> String {
        format!("{}{}", self.settings.base_url, self.server_file_stem())
    }

    pub fn server_config(&self) -> Result<VisualQcServerConfig> {
        let data_directory = self
            .data_directory
            .clone()
            .ok_or_else(|| SveaError::missing_files("No data directory for visual QC set"))?;
        Ok(VisualQcServerConfig {
            server_file_stem: self.server_file_stem(),
            data_directory,
            profile: self.settings.profile.clone(),
            filters: self.settings.filters.clone(),
        })
    }

    /// Writes the server configuration as JSON and returns its path.
    pub fn render(&self) -> Result<PathBuf> {
        let config = self.server_config()?;
        let directory = self
            .config_directory
            .as_deref()
            .ok_or_else(|| SveaError::missing_files("Working directory is not set"))?;
        fs::create_dir_all(directory).map_err(|err| SveaError::io(directory, err))?;
        let path = directory.join(format!("{}.json", config.server_file_stem));
        let bytes = serde_json::to_vec_pretty(&config)?;
        fs::write(&path, bytes).map_err(|err| SveaError::io(&path, err))?;
        debug!("Visual QC configuration written to {}", path.display());
        Ok(path)
    }

    /// Renders, launches and (optionally) opens a browser. A server that is
    /// already running is stopped first.
    pub fn open(&mut self) -> Result<PathBuf> {
        if self.server.is_some() {
            warn!("Visual QC server already running; restarting it");
            self.close();
        }
        let config_path = self.render()?;
        let runtime = self
            .settings
            .runtime
            .as_deref()
            .ok_or_else(|| SveaError::unconfigured("No visual QC runtime configured"))?;
        let url = self.url();
        let server =
            VisualQcServer::launch(runtime, &self.settings.runtime_args, &config_path, &url)?;
        if self.settings.open_browser {
            open_in_browser(&url);
        }
        self.server = Some(server);
        Ok(config_path)
    }

    /// Returns false when no server was running.
    pub fn close(&mut self) -> bool {
        match self.server.take() {
            Some(server) => {
                server.stop();
                true
            }
            None => false,
        }
    }

    pub fn is_running(&mut self) -> bool {
        self.server.as_mut().is_some_and(VisualQcServer::is_running)
    }
}

impl Reconfigure for VisualQc {
    fn reconfigure(&mut self, layout: &WorkingDirectoryLayout) -> Result<()> {
        self.data_directory = layout
            .dir(LayoutDir::StandardFormatQc)
            .map(Path::to_path_buf);
        self.config_directory = layout.dir(LayoutDir::VisualQc).map(Path::to_path_buf);
        Ok(())
    }
}

/// Opens `url` with `$BROWSER` or the platform opener. Failures are logged.
pub fn open_in_browser(url: &str) {
    let command = browser_command();
    let Some((program, args)) = command.split_first() else {
        return;
    };
    match Command::new(program)
        .args(args)
        .arg(url)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
    {
        Ok(_) => info!("Opened {url} with {program}"),
        Err(err) => warn!("could not open {url} with {program}: {err}"),
    }
}

fn browser_command() -> Vec<String> {
    if let Ok(value) = env::var("BROWSER") {
        if !value.trim().is_empty() {
            if let Ok(parts) = shell_words::split(&value) {
                if !parts.is_empty() {
                    return parts;
                }
            }
        }
    }
    if cfg!(target_os = "macos") {
        vec!["open".to_string()]
    } else if cfg!(windows) {
        vec![
            "cmd".to_string(),
            "/C".to_string(),
            "start".to_string(),
            String::new(),
        ]
    } else {
        vec!["xdg-open".to_string()]
    }
}
