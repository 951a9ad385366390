//! Entry point of the whitelist portal.
//!
//! Loads the configuration, sets up logging and either runs the HTTP API
//! until a shutdown signal arrives or performs a one-off admin command.

mod cli;
mod config;
mod signals;

use tracing::{error, info};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use cli::{CliArgs, CliCommand};
use config::{AppConfig, LoggingSettings};
use signals::setup_signal_handlers;
use whitelist_server::store::Store;
use whitelist_server::PortalServer;

/// Initialize logging system
fn setup_logging(config: &LoggingSettings) -> anyhow::Result<()> {
    let log_level = config.level.as_str();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if config.json_format {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    } else {
        registry
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_file(false)
                    .with_line_number(false)
                    .with_thread_ids(true)
                    .with_thread_names(true),
            )
            .try_init()?;
    }

    info!("🔧 Logging initialized with level: {}", log_level);
    Ok(())
}

/// Loads the file and folds in environment and command-line overrides.
async fn load_config(args: &CliArgs) -> anyhow::Result<AppConfig> {
    let mut config = AppConfig::load_from_file(&args.config_path)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to load {}: {e}", args.config_path.display()))?;

    config.apply_env_overrides();

    if let Some(bind_address) = &args.bind_address {
        config.server.bind_address = bind_address.clone();
    }
    if let Some(log_level) = &args.log_level {
        config.logging.level = log_level.clone();
    }
    if let Some(database) = &args.database {
        config.database.path = database.clone();
    }
    if args.json_logs {
        config.logging.json_format = true;
    }

    config
        .validate()
        .map_err(|e| anyhow::anyhow!("Configuration validation failed: {e}"))?;
    Ok(config)
}

async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let portal_config = config
        .to_portal_config()
        .map_err(|e| anyhow::anyhow!("Invalid configuration: {e}"))?;

    info!("📋 Configuration Summary:");
    info!("  🌐 Bind address: {}", portal_config.bind_address);
    info!("  🗄️ Database: {}", config.database.path);
    info!("  🔗 Frontend: {}", portal_config.frontend_url);
    info!(
        "  📧 Mail: {}",
        config.mail.smtp_host.as_deref().unwrap_or("log only")
    );
    match portal_config.status.poll_interval {
        Some(interval) => info!("  📡 Status refresh every {}s", interval.as_secs()),
        None => info!("  📡 Status refresh on demand"),
    }

    let server = PortalServer::new(portal_config)?;

    info!("🛑 Press Ctrl+C to gracefully shutdown");
    server
        .start(async {
            if let Err(e) = setup_signal_handlers().await {
                error!("❌ Failed to listen for shutdown signals: {}", e);
            }
            info!("🛑 Shutdown signal received, initiating graceful shutdown...");
        })
        .await?;

    info!("👋 Whitelist portal stopped");
    Ok(())
}

fn create_admin(
    config: &AppConfig,
    username: &str,
    email: Option<&str>,
    password: &str,
) -> anyhow::Result<()> {
    let store = match config.database_path() {
        Some(path) => Store::open(&path)?,
        None => anyhow::bail!("Admins cannot be created in an in-memory database"),
    };
    let admin = whitelist_server::create_admin(&store, username, email, password)?;
    info!("✅ Created admin {} ({})", admin.username, admin.id);
    Ok(())
}

#[tokio::main(flavor = "multi_thread")]
async fn main() {
    let args = CliArgs::parse();

    let config = match load_config(&args).await {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ Failed to start application: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = setup_logging(&config.logging) {
        eprintln!("❌ Failed to initialize logging: {e:#}");
        std::process::exit(1);
    }

    let result = match &args.command {
        CliCommand::Serve => {
            display_banner();
            serve(config).await
        }
        CliCommand::CreateAdmin {
            username,
            email,
            password,
        } => create_admin(&config, username, email.as_deref(), password),
    };

    if let Err(e) = result {
        error!("❌ Application error: {:#}", e);
        std::process::exit(1);
    }
}

/// Display startup banner using proper logging
fn display_banner() {
    let version = option_env!("CARGO_PKG_VERSION").unwrap_or("UNK");

    info!("╔══════════════════════════════════════════╗");
    info!("║        ⛏️  MINECRAFT WHITELIST ⛏️          ║");
    info!("║              Portal v{:<10}          ║", version);
    info!("║                                          ║");
    info!("║  📧 Email verification                   ║");
    info!("║  🎓 Student and member access policies   ║");
    info!("║  📝 Appeals with admin review            ║");
    info!("║  📡 Live server status                   ║");
    info!("╚══════════════════════════════════════════╝");
}
