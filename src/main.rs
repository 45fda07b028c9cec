use clap::Parser;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// crtdeck — user-space driver and automation daemon for the Redragon SS-550
#[derive(Parser)]
#[command(name = "crtdeck", version, about)]
struct Cli {
    /// Path to the config file (JSON, shared with the configuration UI).
    #[arg(short, long, default_value = "/etc/crtdeck/config.json")]
    config: PathBuf,

    /// Enable JSON log output (for journald).
    #[arg(long)]
    json: bool,

    /// Validate config and exit.
    #[arg(long)]
    check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Init tracing.
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("crtdeck=info"));

    if cli.json {
        fmt().with_env_filter(filter).json().init();
    } else {
        fmt().with_env_filter(filter).init();
    }

    info!("crtdeck v{}", env!("CARGO_PKG_VERSION"));

    let config_path = cli
        .config
        .canonicalize()
        .unwrap_or_else(|_| cli.config.clone());

    if cli.check {
        let config = crtdeck::config::load(&config_path)?;
        println!(
            "config OK: {} pages, {} configured buttons",
            config.pages.len(),
            config
                .pages
                .iter()
                .map(|p| p.buttons.values().filter(|b| !b.is_blank()).count())
                .sum::<usize>(),
        );
        return Ok(());
    }

    // First run writes a starter config next to where the UI expects it.
    let config = crtdeck::config::load_or_init(&config_path)?;
    info!("loaded config: {} pages", config.pages.len());

    crtdeck::daemon::run(config, config_path).await?;

    Ok(())
}
