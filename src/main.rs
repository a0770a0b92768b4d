use clap::{Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use vyomai::{
    AppState, Config, create_router,
    email::{EmailMessage, ProviderKind},
    reset::ResetCodeStore,
    settings::{FileSettingsStore, SettingsStore},
    startup_checks,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Global options that apply to all commands
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: PathBuf,

    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the web server (default if no command specified)
    Serve {
        #[arg(short, long)]
        port: Option<u16>,

        #[arg(long)]
        host: Option<String>,

        /// Automatically quit after specified number of seconds (useful for testing)
        #[arg(long)]
        quit_after: Option<u64>,
    },

    /// Inspect and test email delivery
    #[command(subcommand)]
    Email(EmailCommands),

    /// Inspect site settings
    #[command(subcommand)]
    Settings(SettingsCommands),
}

#[derive(Subcommand, Debug)]
enum EmailCommands {
    /// Show which providers are configured and reachable
    Status,
    /// Check a provider's connection, or send a test email with --to
    Test {
        /// smtp, gmail or sendgrid (defaults to the configured primary)
        provider: Option<ProviderKind>,
        #[arg(long)]
        to: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum SettingsCommands {
    /// Print the settings document with secrets removed
    Show,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Set up logging first
    let level = match cli.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = load_config(&cli.config)?;

    match cli.command {
        Some(Commands::Email(cmd)) => handle_email_command(config, cmd).await,
        Some(Commands::Settings(SettingsCommands::Show)) => show_settings(&config).await,
        Some(Commands::Serve {
            port,
            host,
            quit_after,
        }) => run_server(config, port, host, quit_after).await,
        None => run_server(config, None, None, None).await,
    }
}

fn load_config(config_path: &Path) -> Result<Config, Box<dyn std::error::Error>> {
    if config_path.exists() {
        let config_content = std::fs::read_to_string(config_path)?;
        info!("Configuration loaded from: {:?}", config_path);
        Ok(toml_edit::de::from_str::<Config>(&config_content)?)
    } else {
        info!("Config file not found at {:?}, using defaults", config_path);
        Ok(Config::default())
    }
}

async fn handle_email_command(
    config: Config,
    cmd: EmailCommands,
) -> Result<(), Box<dyn std::error::Error>> {
    let state = AppState::from_config(config)?;

    match cmd {
        EmailCommands::Status => {
            let email_config = state.mailer.config_service().get_config().await;
            println!("Primary provider: {}", email_config.provider);
            println!(
                "Fallback order:   {}",
                email_config
                    .provider_priority
                    .iter()
                    .map(|p| p.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            println!("From:             {}", email_config.format_from());
            for (kind, status) in state.mailer.provider_statuses().await {
                match status.error {
                    None => println!("  {:<9} available", kind),
                    Some(error) => println!("  {:<9} unavailable: {}", kind, error),
                }
            }
        }
        EmailCommands::Test { provider, to } => {
            let result = match to {
                Some(to) => {
                    let message = EmailMessage::new(to, "Test email")
                        .with_text("This is a test email. Your email settings are working.");
                    state.mailer.send_email_with_result(&message).await
                }
                None => state.mailer.test_email_provider(provider).await,
            };

            if result.success {
                println!("{}: ok", result.provider);
            } else {
                eprintln!(
                    "{}: failed: {}",
                    result.provider,
                    result.error.unwrap_or_default()
                );
                std::process::exit(1);
            }
        }
    }

    Ok(())
}

async fn show_settings(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let mut settings = FileSettingsStore::new(config.settings.path.clone())
        .load()
        .await?;
    settings.admin.password_hash = None;

    print!("{}", toml_edit::ser::to_document(&settings)?);
    Ok(())
}

async fn run_server(
    config: Config,
    port: Option<u16>,
    host: Option<String>,
    quit_after: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    let host = host.unwrap_or(config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    info!("Starting {} server", config.app.name);
    info!("Settings file: {:?}", config.settings.path);
    info!("Environment: {:?}", config.app.environment);

    let state = AppState::from_config(config)?;

    match startup_checks::perform_startup_checks(&state.config, state.mailer.dispatcher().providers())
        .await
    {
        Ok(()) => info!("All startup checks passed"),
        Err(errors) => {
            for error in &errors {
                tracing::error!("Startup check failed: {}", error);
            }

            if errors.iter().any(|e| e.is_critical()) {
                tracing::error!("Critical startup check failed, exiting");
                return Err("Critical startup check failed".into());
            } else {
                tracing::warn!("Non-critical startup checks failed, continuing");
            }
        }
    }

    info!("Starting background reset code cleanup every 60 seconds");
    ResetCodeStore::start_background_cleanup(state.mailer.reset_codes().clone(), 60);

    let app = create_router(state);

    let addr = SocketAddr::from((host.parse::<std::net::IpAddr>()?, port));
    info!("Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Set up graceful shutdown
    let server = axum::serve(listener, app);
    let graceful = server.with_graceful_shutdown(shutdown_signal(quit_after));

    if let Err(e) = graceful.await {
        tracing::error!("Server error: {}", e);
    }

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal(quit_after: Option<u64>) {
    use tokio::signal;
    use tokio::time::{Duration, sleep};

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let quit_timer = async {
        if let Some(seconds) = quit_after {
            info!(
                "Server will automatically shut down after {} seconds",
                seconds
            );
            sleep(Duration::from_secs(seconds)).await;
            info!("Quit timer expired, shutting down");
        } else {
            std::future::pending::<()>().await
        }
    };

    tokio::select! {
        _ = ctrl_c => {
            info!("Shutdown signal received (Ctrl+C)");
        },
        _ = terminate => {
            info!("Shutdown signal received (SIGTERM)");
        },
        _ = quit_timer => {},
    }
}
