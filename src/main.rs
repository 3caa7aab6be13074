//! FilterFlow - Command line entry point
//!
//! Drives the sandboxed engine without the editor: inspect media, run raw
//! engine invocations, and build or browse the filter catalog.

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use filterflow_rs::{
    bridge::{ExecutionOutput, ExecutionRequest, ExecutionSession},
    catalog::{CatalogBuilder, FilterCatalog},
    config::{self, AppConfig, LoggingSettings},
    engine::WasmEngine,
    error::BridgeError,
};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "filterflow", version, about)]
struct Cli {
    /// Engine module (.wasm), overriding the configured one
    #[arg(long, global = true)]
    engine: Option<PathBuf>,

    /// Config file to use instead of the one in the app data dir
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Host directory mounted as the engine's root
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Inspect a media file and print its tracks as JSON.
    Inspect {
        file: PathBuf,
    },
    /// Run the engine with raw arguments, e.g. `exec -- -h filters`.
    Exec {
        #[arg(last = true, required = true)]
        args: Vec<String>,
    },
    /// Build or browse the filter catalog.
    Catalog {
        #[command(subcommand)]
        cmd: CatalogCommand,
    },
}

#[derive(Subcommand, Debug)]
enum CatalogCommand {
    /// Generate the catalog from the engine's help output.
    Build {
        /// Output JSON path (defaults to the configured catalog path)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// List the filters of a catalog file.
    Show {
        file: Option<PathBuf>,
    },
    /// Generate the codec catalog from `-h codecs`.
    Codecs {
        /// Output JSON path (defaults to codecs.json beside the filter catalog)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("load config '{}'", path.display()))?,
        None => AppConfig::load_or_default(),
    };
    if let Some(engine) = &cli.engine {
        config.engine.module_path = Some(engine.clone());
    }

    let _guard = init_logging(&config.logging);
    tracing::debug!("Using config {:?}", config);

    match cli.cmd {
        Command::Inspect { file } => cmd_inspect(&config, cli.root, file),
        Command::Exec { args } => cmd_exec(&config, cli.root, args),
        Command::Catalog {
            cmd: CatalogCommand::Build { out },
        } => cmd_catalog_build(&config, cli.root, out),
        Command::Catalog {
            cmd: CatalogCommand::Show { file },
        } => cmd_catalog_show(&config, file),
        Command::Catalog {
            cmd: CatalogCommand::Codecs { out },
        } => cmd_catalog_codecs(&config, cli.root, out),
    }
}

fn init_logging(settings: &LoggingSettings) -> Option<WorkerGuard> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&settings.filter));

    let mut guard = None;
    let file_layer = if settings.file_logging {
        match config::ensure_app_data_dir() {
            Ok(dir) => {
                let appender = tracing_appender::rolling::daily(dir.join("logs"), "filterflow.log");
                let (writer, g) = tracing_appender::non_blocking(appender);
                guard = Some(g);
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(writer),
                )
            }
            Err(e) => {
                eprintln!("file logging disabled: {}", e);
                None
            }
        }
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(file_layer)
        .init();

    guard
}

/// Mount the filesystem, compile the engine, and open a session
fn open_session(config: &AppConfig, root: Option<PathBuf>) -> anyhow::Result<ExecutionSession> {
    let root = root
        .or_else(|| config.filesystem.resolved_root())
        .context("no data directory for the engine filesystem")?;
    std::fs::create_dir_all(&root)
        .with_context(|| format!("create filesystem root '{}'", root.display()))?;

    let runtime = tokio::runtime::Runtime::new().context("start runtime")?;
    let engine = runtime
        .block_on(WasmEngine::load_async(
            config.engine.clone(),
            root.clone(),
            config.filesystem.guest_root.clone(),
        ))
        .context("load engine")?;

    Ok(ExecutionSession::open(Box::new(engine), config, Some(root))?)
}

fn cmd_inspect(config: &AppConfig, root: Option<PathBuf>, file: PathBuf) -> anyhow::Result<()> {
    let bytes = std::fs::read(&file).with_context(|| format!("read '{}'", file.display()))?;
    let session = open_session(config, root)?;

    let tracks = session
        .inspect(&bytes)
        .with_context(|| format!("inspect '{}'", file.display()))?;
    println!("{}", serde_json::to_string_pretty(&tracks)?);
    Ok(())
}

fn cmd_exec(config: &AppConfig, root: Option<PathBuf>, args: Vec<String>) -> anyhow::Result<()> {
    let session = open_session(config, root)?;

    match session.execute(ExecutionRequest::raw(args)) {
        Ok(ExecutionOutput::Log {
            lines, diagnostics, ..
        }) => {
            for line in &lines {
                println!("{}", line);
            }
            for line in &diagnostics {
                eprintln!("{}", line);
            }
            Ok(())
        }
        Ok(other) => {
            println!("{}", serde_json::to_string_pretty(&other)?);
            Ok(())
        }
        Err(BridgeError::EngineFailure { code }) => {
            eprintln!("engine exited with code {}", code);
            std::process::exit(code);
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_catalog_build(
    config: &AppConfig,
    root: Option<PathBuf>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let out = out
        .or_else(|| config.catalog_path())
        .context("no catalog output path")?;
    let session = open_session(config, root)?;

    let catalog = CatalogBuilder::new(&session).build()?;
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    catalog.save(&out)?;
    eprintln!("wrote {} filters to {}", catalog.len(), out.display());
    Ok(())
}

fn cmd_catalog_codecs(
    config: &AppConfig,
    root: Option<PathBuf>,
    out: Option<PathBuf>,
) -> anyhow::Result<()> {
    let out = out
        .or_else(|| config.codec_catalog_path())
        .context("no codec catalog output path")?;
    let session = open_session(config, root)?;

    let codecs = CatalogBuilder::new(&session).build_codecs()?;
    if let Some(parent) = out.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create output dir '{}'", parent.display()))?;
    }
    codecs.save(&out)?;
    eprintln!("wrote {} codecs to {}", codecs.len(), out.display());
    Ok(())
}

fn cmd_catalog_show(config: &AppConfig, file: Option<PathBuf>) -> anyhow::Result<()> {
    let path = file
        .or_else(|| config.catalog_path())
        .context("no catalog path")?;
    let catalog = FilterCatalog::load(&path)?;

    for filter in catalog.iter() {
        let inputs: Vec<&str> = filter
            .capabilities
            .input
            .stream_type
            .iter()
            .map(|st| st.as_str())
            .collect();
        println!(
            "{:<16} {:<28} options: {:<3} {}",
            filter.name,
            inputs.join(","),
            filter.editable_options().count(),
            filter.description
        );
    }
    Ok(())
}
