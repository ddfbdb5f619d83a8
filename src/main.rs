use clap::{CommandFactory, Parser};
use clap_complete::aot::generate;
use srvrig::cli::{Cli, Commands};
use srvrig::commands;
use srvrig::config::resolve::require_base_dir;
use srvrig::config::Settings;
use srvrig::orchestrator::{spawn_signal_listener, Controller, StartOutcome};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() {
    // Initialize tracing subscriber with env-filter support.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let base_dir = cli.global.base_dir;

    let result = match cli.command {
        Commands::Init => commands::init::run(base_dir.as_deref()),
        Commands::Clean { yes } => commands::clean::run(base_dir.as_deref(), yes),
        Commands::Start {
            app,
            env,
            skip_build,
        } => run_start(base_dir, &app, env.as_deref(), skip_build).await,
        Commands::Update { app } => commands::update::run(base_dir.as_deref(), &app).await,
        Commands::Ps => commands::ps::run(base_dir.as_deref()),
        Commands::Completions { shell } => {
            generate(shell, &mut Cli::command(), "srvrig", &mut std::io::stdout());
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run_start(
    base_dir: Option<PathBuf>,
    app: &str,
    env: Option<&str>,
    skip_build: bool,
) -> anyhow::Result<()> {
    let base = require_base_dir(base_dir.as_deref())?;
    let config = srvrig::config::load_validated(&base)?;
    let settings = Settings::resolve(&config, app, env)?;

    let cancel = CancellationToken::new();
    let signals = spawn_signal_listener(cancel.clone());
    let mut controller = Controller::new(settings, base, cancel).skip_build(skip_build);
    let outcome = controller.start().await;
    signals.abort();

    match outcome? {
        StartOutcome::Stopped => info!(instance = app, "instance stopped"),
        StartOutcome::Interrupted => info!(instance = app, "instance interrupted, registry cleaned up"),
    }
    Ok(())
}
