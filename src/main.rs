use clap::{Parser, Subcommand};
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use tracing::{Level, info};
use tracing_subscriber::FmtSubscriber;

use ipmark::{Config, create_app, startup_checks};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Env file holding PORT and the optional settings
    #[arg(short, long, default_value = ".env", global = true)]
    env_file: PathBuf,

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
        host: Option<IpAddr>,

        /// Automatically quit after specified number of seconds (useful for testing)
        #[arg(long)]
        quit_after: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

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

    match cli.command {
        Some(Commands::Serve {
            port,
            host,
            quit_after,
        }) => run_server(cli.env_file, port, host, quit_after).await,
        None => run_server(cli.env_file, None, None, None).await,
    }
}

async fn run_server(
    env_file: PathBuf,
    port: Option<u16>,
    host: Option<IpAddr>,
    quit_after: Option<u64>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Server is starting");

    let mut config = match Config::load(&env_file) {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Error loading configuration: {}", e);
            return Err(e.into());
        }
    };

    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(host) = host {
        config.server.host = host;
    }

    info!("Configuration loaded from: {:?}", env_file);
    info!("Images directory: {:?}", config.images.directory);
    info!("JPEG quality: {}", config.images.jpeg_quality);

    match startup_checks::perform_startup_checks(&config).await {
        Ok(()) => {}
        Err(errors) => {
            if errors.iter().any(|e| e.is_critical()) {
                for error in &errors {
                    tracing::error!("Startup check failed: {}", error);
                }
                tracing::error!("Critical startup check failed, exiting");
                return Err("Critical startup check failed".into());
            } else {
                tracing::warn!("Non-critical startup checks failed, continuing");
            }
        }
    }

    let addr = SocketAddr::from((config.server.host, config.server.port));
    let app = create_app(config).await;

    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Server listening on {}", addr);

    // Peer addresses feed the client identifier when no proxy header is present
    let app = app.into_make_service_with_connect_info::<SocketAddr>();

    let server = axum::serve(listener, app);
    let graceful = server.with_graceful_shutdown(shutdown_signal(quit_after));

    if let Err(e) = graceful.await {
        tracing::error!("Server error: {}", e);
        return Err(e.into());
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
