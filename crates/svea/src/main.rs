use std::io::{self, BufRead};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use svea_core::config::{SveaConfig, CONFIG_ENV};
use svea_core::layout::Reconfigure;
use svea_core::visual_qc::VisualQc;
use svea_core::{FileCategory, FileSet, FileSource, SveaController, WorkingDirectoryLayout};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(author, version, about = "SVEA CTD processing controller", long_about = None)]
struct Cli {
    /// Path to svea.toml
    #[arg(long, global = true, env = CONFIG_ENV)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the directory layout derived from the working directory
    Layout(WorkingDirArgs),
    /// Copy files of one category into their working-directory folder
    Stage(StageArgs),
    /// Start the visual QC server for the QC'd files
    VisualQc(VisualQcArgs),
}

#[derive(Args, Debug)]
struct WorkingDirArgs {
    /// Overrides the configured working directory
    #[arg(long)]
    working_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct StageArgs {
    #[command(flatten)]
    working: WorkingDirArgs,

    #[arg(long, value_enum)]
    category: CategoryArg,

    /// Directory to scan or a single file
    #[arg(long)]
    source: PathBuf,

    /// Replace files already present in the target folder
    #[arg(long)]
    overwrite: bool,
}

#[derive(Args, Debug)]
struct VisualQcArgs {
    #[command(flatten)]
    working: WorkingDirArgs,

    /// Only write the server configuration and print the URL
    #[arg(long)]
    dry_run: bool,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum CategoryArg {
    Raw,
    Cnv,
    StandardFormat,
}

impl From<CategoryArg> for FileCategory {
    fn from(arg: CategoryArg) -> Self {
        match arg {
            CategoryArg::Raw => FileCategory::Raw,
            CategoryArg::Cnv => FileCategory::Cnv,
            CategoryArg::StandardFormat => FileCategory::StandardFormat,
        }
    }
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .json()
        .init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Layout(args) => {
            let layout = WorkingDirectoryLayout::new(working_dir(&config, &args)?);
            println!("{}", serde_json::to_string_pretty(&layout)?);
            Ok(())
        }
        Command::Stage(args) => stage(&config, args),
        Command::VisualQc(args) => visual_qc(&config, args),
    }
}

fn load_config(path: Option<&Path>) -> Result<SveaConfig> {
    let mut config = match path {
        Some(path) => SveaConfig::load(path)
            .with_context(|| format!("reading configuration {}", path.display()))?,
        None => SveaConfig::default(),
    };
    config.apply_env()?;
    Ok(config)
}

fn working_dir(config: &SveaConfig, args: &WorkingDirArgs) -> Result<PathBuf> {
    args.working_dir
        .clone()
        .or_else(|| config.working_directory.clone())
        .context("no working directory: pass --working-dir or set SVEA_WORKING_DIRECTORY")
}

fn stage(config: &SveaConfig, args: StageArgs) -> Result<()> {
    let layout = WorkingDirectoryLayout::new(working_dir(config, &args.working)?);
    let category = FileCategory::from(args.category);
    let target = layout.require(category.default_layout_dir())?;

    let mut files = FileSet::new(category);
    files.set_overwrite((config.overwrite || args.overwrite).into());
    files.assign(FileSource::from_path(&args.source))?;
    let report = files.relocate(target)?;
    info!(
        copied = report.copied.len(),
        skipped = report.skipped_existing.len(),
        "staged {} files",
        category.name()
    );
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn visual_qc(config: &SveaConfig, args: VisualQcArgs) -> Result<()> {
    let root = working_dir(config, &args.working)?;

    if args.dry_run {
        let mut visual_qc = VisualQc::new(config.visual_qc.clone());
        visual_qc.reconfigure(&WorkingDirectoryLayout::new(root))?;
        let path = visual_qc.render()?;
        println!("{}", path.display());
        println!("{}", visual_qc.url());
        return Ok(());
    }

    let mut controller = SveaController::from_config(config)?;
    controller.set_working_directory(root)?;
    controller.open_visual_qc()?;
    println!("Visual QC running at {}", controller.visual_qc_url());
    println!("Press Enter to stop the server.");

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    controller.close_visual_qc();
    Ok(())
}
