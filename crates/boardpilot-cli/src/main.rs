//! Boardpilot - board detection and safe sketch uploads
//!
//! The `boardpilot` command detects connected microcontroller boards,
//! gates uploads on board compatibility, and drives arduino-cli through
//! the compile/upload pipeline.
//!
//! ## Commands
//!
//! - `boards`: Detect and list connected boards
//! - `compile`: Compile a sketch for a board profile
//! - `upload`: Compile and flash a sketch through the gated pipeline
//! - `core` / `lib`: Manage toolchain cores and libraries
//! - `config`: Initialise toolchain config and board-manager URLs

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::warn;

use boardpilot_core::{
    catalog, init_tracing, BoardProfileId, CompatibilityRuleSet, ProgressSink, Severity,
    UploadJob,
};
use boardpilot_upload::{
    ArduinoCli, IdentityResolver, SketchStager, SystemPorts, UploadOrchestrator,
};

#[derive(Parser)]
#[command(name = "boardpilot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Detect boards and upload sketches safely", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Detect and list connected boards
    Boards {
        /// Only resolve this port
        #[arg(short, long)]
        port: Option<String>,
    },

    /// Compile a sketch for a board profile
    Compile {
        /// Path to the sketch source file
        #[arg(short, long)]
        file: PathBuf,

        /// Board profile id (vendor:arch:variant) or a board label like
        /// "Arduino Uno"
        #[arg(short, long)]
        board: String,
    },

    /// Compile and flash a sketch through the gated upload pipeline
    Upload {
        /// Path to the sketch source file
        #[arg(short, long)]
        file: PathBuf,

        /// Serial port to upload through
        #[arg(short, long)]
        port: String,

        /// Board profile id (vendor:arch:variant) or a board label
        #[arg(short, long)]
        board: String,

        /// Programmer label for UPDI-programmed families
        #[arg(long)]
        programmer: Option<String>,
    },

    /// Manage toolchain cores
    Core {
        #[command(subcommand)]
        action: CoreAction,
    },

    /// Manage toolchain libraries
    Lib {
        #[command(subcommand)]
        action: LibAction,
    },

    /// Toolchain configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum CoreAction {
    /// Refresh the board-manager index
    UpdateIndex,

    /// List installed cores
    List,

    /// Install a core (vendor:arch)
    Install { core_id: String },
}

#[derive(Subcommand)]
enum LibAction {
    /// Search the library index
    Search { query: String },

    /// List installed libraries
    List,

    /// Install a library
    Install {
        name: String,

        /// Pin a specific version
        #[arg(long)]
        version: Option<String>,
    },

    /// Uninstall a library
    Uninstall { name: String },

    /// Update a library
    Update { name: String },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Create the toolchain config file if it does not exist
    Init,

    /// Add a board-manager index URL
    AddUrl { url: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose, cli.json);

    match cli.command {
        Commands::Boards { port } => boards(port).await,
        Commands::Compile { file, board } => compile(file, &board).await,
        Commands::Upload {
            file,
            port,
            board,
            programmer,
        } => upload(file, port, &board, programmer).await,
        Commands::Core { action } => core(action).await,
        Commands::Lib { action } => lib(action).await,
        Commands::Config { action } => config(action).await,
    }
}

/// Accept either a raw profile id or a human board label.
fn parse_board(board: &str) -> Result<BoardProfileId> {
    if board.contains(':') {
        board
            .parse()
            .with_context(|| format!("invalid board profile id '{board}'"))
    } else {
        Ok(catalog::profile_for_label(board))
    }
}

async fn locate_toolchain() -> Result<Arc<ArduinoCli>> {
    let cli = ArduinoCli::locate()
        .await
        .context("cannot detect or upload without the arduino-cli toolchain")?;
    Ok(Arc::new(cli))
}

fn load_rules() -> CompatibilityRuleSet {
    let rules = CompatibilityRuleSet::builtin();
    for gap in rules.symmetry_gaps() {
        warn!("compatibility table: {gap}");
    }
    rules
}

async fn boards(port: Option<String>) -> Result<()> {
    let cli = locate_toolchain().await?;
    let resolver = IdentityResolver::new(cli, Arc::new(SystemPorts));

    let identities = match port {
        Some(port) => vec![resolver.resolve_one(&port).await],
        None => resolver.resolve_all().await,
    };

    if identities.is_empty() {
        println!("No boards detected");
        return Ok(());
    }

    for identity in identities {
        println!("{} on {}", identity.display_name, identity.port_name);
        println!("  profile:    {}", identity.profile);
        println!("  vendor:     {}", identity.vendor);
        println!("  product:    {}", identity.product);
        println!("  confidence: {:?}", identity.confidence);
    }
    Ok(())
}

async fn compile(file: PathBuf, board: &str) -> Result<()> {
    let profile = parse_board(board)?;
    let source = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read sketch '{}'", file.display()))?;

    let cli = locate_toolchain().await?;
    let (sink, printer) = stdout_sink();

    cli.ensure_core(&profile, &sink).await?;

    let stager = SketchStager::from_current_dir()?;
    let staged = stager.stage(&source)?;
    sink.info(format!("Compiling sketch for {profile}..."));
    let out = cli.compile(&profile, &staged.dir).await?;
    print!("{}", out.output);

    drop(sink);
    printer.await.ok();
    if !out.success() {
        bail!("compilation failed (exit code {})", out.exit_code);
    }
    Ok(())
}

async fn upload(
    file: PathBuf,
    port: String,
    board: &str,
    programmer: Option<String>,
) -> Result<()> {
    let profile = parse_board(board)?;
    let source = std::fs::read_to_string(&file)
        .with_context(|| format!("failed to read sketch '{}'", file.display()))?;

    let cli = locate_toolchain().await?;
    let (sink, printer) = stdout_sink();

    cli.ensure_core(&profile, &sink).await?;

    let orchestrator = UploadOrchestrator::new(
        Arc::clone(&cli),
        Arc::new(SystemPorts),
        load_rules(),
        SketchStager::from_current_dir()?,
    );

    let mut job = UploadJob::new(source, profile, port);
    if let Some(label) = programmer {
        job = job.with_programmer(label);
    }

    let report = orchestrator.run(&mut job, &sink).await;
    drop(sink);
    printer.await.ok();

    if !report.succeeded() {
        bail!(
            "upload did not complete (terminal phase: {:?})",
            report.outcome.phase()
        );
    }
    Ok(())
}

async fn core(action: CoreAction) -> Result<()> {
    let cli = locate_toolchain().await?;
    let out = match action {
        CoreAction::UpdateIndex => cli.core_update_index().await?,
        CoreAction::List => cli.core_list().await?,
        CoreAction::Install { core_id } => cli.core_install(&core_id).await?,
    };
    print!("{}", out.output);
    if !out.success() {
        bail!("toolchain exited with code {}", out.exit_code);
    }
    Ok(())
}

async fn lib(action: LibAction) -> Result<()> {
    let cli = locate_toolchain().await?;
    let out = match action {
        LibAction::Search { query } => cli.lib_search(&query).await?,
        LibAction::List => cli.lib_list().await?,
        LibAction::Install { name, version } => {
            cli.lib_install(&name, version.as_deref()).await?
        }
        LibAction::Uninstall { name } => cli.lib_uninstall(&name).await?,
        LibAction::Update { name } => cli.lib_update(&name).await?,
    };
    print!("{}", out.output);
    if !out.success() {
        bail!("toolchain exited with code {}", out.exit_code);
    }
    Ok(())
}

async fn config(action: ConfigAction) -> Result<()> {
    let cli = locate_toolchain().await?;
    let out = match action {
        ConfigAction::Init => cli.config_init().await?,
        ConfigAction::AddUrl { url } => cli.config_add_board_url(&url).await?,
    };
    print!("{}", out.output);
    if !out.success() {
        bail!("toolchain exited with code {}", out.exit_code);
    }
    Ok(())
}

/// A progress sink that prints events to stdout/stderr as they arrive,
/// plus the task draining it. Drop the sink to let the task finish.
fn stdout_sink() -> (ProgressSink, tokio::task::JoinHandle<()>) {
    let (sink, mut rx) = ProgressSink::channel();
    let printer = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event.severity {
                Severity::Info => println!("{}", event.message),
                Severity::Warning => println!("warning: {}", event.message),
                Severity::Error => eprintln!("error: {}", event.message),
            }
        }
    });
    (sink, printer)
}
