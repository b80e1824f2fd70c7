//! Asking Card CLI
//!
//! Entry point for running the real-time card sync server.

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod commands;

#[derive(Parser)]
#[command(name = "asking")]
#[command(author = "Asking Card Contributors")]
#[command(version)]
#[command(about = "Real-time sync server for Asking Card boards", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the WebSocket sync server
    Serve(ServeArgs),

    /// Print the settings `serve` would run with
    Config(ServeArgs),
}

/// Deployment flavor, mirrors `asking_server::HostingMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Separate web app; browser origins are checked
    Standalone,
    /// Combined deployment behind a proxy; any origin
    Container,
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Port to listen on
    #[arg(short, long, env = "SOCKET_PORT", default_value_t = asking_server::DEFAULT_PORT)]
    pub port: u16,

    /// Hosting mode
    #[arg(long, env = "ASKING_MODE", value_enum, default_value_t = Mode::Standalone)]
    pub mode: Mode,

    /// Headless mode: bind to 0.0.0.0 for remote access
    #[arg(long)]
    pub headless: bool,

    /// Browser origin allowed to connect in standalone mode (repeatable)
    #[arg(
        long = "allow-origin",
        env = "ASKING_ALLOWED_ORIGINS",
        value_delimiter = ','
    )]
    pub allow_origin: Vec<String>,

    /// Start with the welcome cards instead of an empty board
    #[arg(long, env = "ASKING_SEED")]
    pub seed: bool,

    /// Post new cards to the webhook
    #[arg(long, env = "DISCORD_NOTIFICATIONS_ENABLED")]
    pub notify: bool,

    /// Webhook endpoint for notifications
    #[arg(long, env = "DISCORD_WEBHOOK_URL")]
    pub webhook_url: Option<String>,

    /// Seconds before a webhook delivery is abandoned
    #[arg(long, default_value = "10")]
    pub notify_timeout_secs: u64,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Set up logging; RUST_LOG wins unless -v is given
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false),
        )
        .with(filter)
        .init();

    let result = match cli.command {
        Commands::Serve(args) => commands::serve(&args).await,
        Commands::Config(args) => commands::config(&args),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}
