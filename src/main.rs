use anyhow::{Context as _, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use patchbot_auth::{Connections, HttpTokenEndpoint, Initialization, TokenLifecycleManager, flow};
use patchbot_config::{Config, LogConfig, LogFormat};
use patchbot_types::PlatformId;
use std::{
    ffi::OsStr,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    EnvFilter, fmt::writer::BoxMakeWriter, layer::SubscriberExt as _, util::SubscriberInitExt as _,
};

const STATUS_INTERVAL: Duration = Duration::from_secs(60);

#[derive(Parser, Debug)]
#[command(
    name = "patchbot",
    version,
    about = "Connect social platforms and keep their OAuth tokens fresh"
)]
struct Cli {
    /// Path to the YAML configuration file.
    #[arg(short, long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List platforms with their grant flow and whether they are enabled.
    Platforms,
    /// Print an authorization URL for inspection only.
    ///
    /// The URL's anti-forgery state is discarded when the command exits, so a
    /// redirect from it cannot complete. Use `connect` to authorize.
    AuthUrl {
        /// Platform name (tiktok / facebook / linkedin).
        platform: String,
    },
    /// Connect a platform and print its token status.
    Connect {
        /// Platform name (tiktok / facebook / linkedin).
        platform: String,
        /// Keep the connection alive (scheduled refreshes run) until Ctrl-C.
        #[arg(long)]
        hold: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).map_err(|e| anyhow!("config error: {e}"))?;
    let _guard = init_tracing(&config.log);

    match cli.command {
        Commands::Platforms => {
            cmd_platforms(&config);
            Ok(())
        }
        Commands::AuthUrl { platform } => cmd_auth_url(&config, &platform).await,
        Commands::Connect { platform, hold } => cmd_connect(&config, &platform, hold).await,
    }
}

/// Install the global subscriber. Keep the returned guard alive so buffered
/// file output is flushed on exit.
fn init_tracing(log: &LogConfig) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));

    let (writer, guard) = match &log.file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or(Path::new("."));
            let prefix = path.file_name().unwrap_or(OsStr::new("patchbot.log"));
            let (non_blocking, guard) =
                tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, prefix));
            (BoxMakeWriter::new(non_blocking), Some(guard))
        }
        None => (BoxMakeWriter::new(std::io::stderr), None),
    };

    let registry = tracing_subscriber::registry().with(filter);
    match log.format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(writer))
            .init(),
        LogFormat::Text => registry
            .with(tracing_subscriber::fmt::layer().with_writer(writer))
            .init(),
    }
    guard
}

fn parse_platform(name: &str) -> Result<PlatformId> {
    name.parse::<PlatformId>()
        .map_err(|e| anyhow!("unknown platform '{name}': {e}"))
}

fn cmd_platforms(config: &Config) {
    for platform in PlatformId::all() {
        let flow = patchbot_auth::PlatformProfile::for_platform(*platform).flow;
        let availability = match config.platforms.get(platform) {
            Some(p) if p.enabled => "enabled",
            Some(_) => "disabled",
            None => "not configured",
        };
        println!(
            "{:<10} {:<20} {availability}",
            platform.to_string(),
            flow.to_string()
        );
    }
}

async fn cmd_auth_url(config: &Config, name: &str) -> Result<()> {
    let platform = parse_platform(name)?;
    let connections = Connections::from_config(config, Arc::new(HttpTokenEndpoint::new()));
    let manager = managed(&connections, platform)?;
    if !manager.profile().flow.requires_redirect() {
        bail!("{platform} uses the client-credentials grant and has no authorization URL");
    }
    let credential = credential(config, platform)?;

    match manager.initialize(credential).await {
        Ok(Initialization::Redirect { url }) => {
            eprintln!("For inspection only; run `patchbot connect {platform}` to authorize.");
            println!("{url}");
            Ok(())
        }
        Ok(Initialization::Connected) => bail!("{platform} connected without a redirect"),
        Err(e) => Err(anyhow!("cannot build authorization URL: {e}")),
    }
}

async fn cmd_connect(config: &Config, name: &str, hold: bool) -> Result<()> {
    let platform = parse_platform(name)?;
    let connections = Connections::from_config(config, Arc::new(HttpTokenEndpoint::new()));
    let manager = managed(&connections, platform)?;
    let credential = credential(config, platform)?;
    if manager.profile().flow.requires_redirect() {
        eprintln!("Waiting for the {platform} authorization redirect (120 s)");
    }

    flow::connect(manager, credential)
        .await
        .map_err(|e| anyhow!("connect failed: {e}"))?;
    println!("{}", manager.status().summary());

    if hold {
        hold_connection(manager).await;
    }
    connections.disconnect_all();
    Ok(())
}

fn managed(connections: &Connections, platform: PlatformId) -> Result<&TokenLifecycleManager> {
    connections
        .get(platform)
        .with_context(|| format!("{platform} is not configured or is disabled"))
}

fn credential(config: &Config, platform: PlatformId) -> Result<patchbot_types::Credential> {
    config
        .platform(platform)
        .map(|p| p.credential(platform))
        .with_context(|| format!("{platform} is not configured or is disabled"))
}

async fn hold_connection(manager: &TokenLifecycleManager) {
    let mut events = manager.subscribe();
    let mut ticker = tokio::time::interval(STATUS_INTERVAL);
    ticker.tick().await;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    eprintln!("Holding the connection; press Ctrl-C to disconnect.");
    loop {
        tokio::select! {
            _ = &mut ctrl_c => {
                eprintln!("Disconnecting {}", manager.platform());
                break;
            }
            _ = ticker.tick() => println!("{}", manager.status().summary()),
            changed = events.changed() => {
                if changed.is_err() {
                    break;
                }
                let state = *events.borrow_and_update();
                tracing::info!(platform = %manager.platform(), %state, "connection state changed");
            }
        }
    }
}
