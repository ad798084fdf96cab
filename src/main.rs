// Main entry point for the application

use clap::{Args, Parser, Subcommand};
use log::warn;
use rftx::client::{self, Backoff, Bounded, ProgressBarObserver, ResumeController};
use rftx::common::config::{ClientConfig, ServerConfig};
use rftx::common::types::TransferOutcome;
use rftx::server::Server;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

const MAX_BACKOFF: Duration = Duration::from_secs(30);

#[derive(Parser)]
#[command(name = "rftx")]
#[command(about = "Resumable file transfer over TCP", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start server to accept uploads and serve downloads
    Serve {
        /// Bind address (default: 0.0.0.0:8000)
        #[arg(long)]
        bind: Option<SocketAddr>,

        /// Directory that filenames are resolved against (default: .)
        #[arg(long)]
        root: Option<PathBuf>,

        /// Receive timeout in seconds (default: 30)
        #[arg(long)]
        timeout: Option<u64>,

        /// Maximum simultaneous connections
        #[arg(long)]
        max_connections: Option<usize>,

        /// JSON config file; flags override its values
        #[arg(long)]
        config: Option<PathBuf>,
    },

    /// Upload a file to the server, resuming across connection loss
    Upload {
        /// File to send
        file: String,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Download a file from the server, resuming across connection loss
    Download {
        /// File to fetch
        file: String,

        /// Continue an existing partial local file instead of replacing it
        #[arg(long)]
        resume: bool,

        #[command(flatten)]
        client: ClientArgs,
    },

    /// Check that the server is reachable
    Ping {
        #[command(flatten)]
        client: ClientArgs,
    },
}

#[derive(Args)]
struct ClientArgs {
    /// Server address (default: 127.0.0.1:8000)
    #[arg(long, short)]
    server: Option<String>,

    /// Receive timeout in seconds (default: 30)
    #[arg(long)]
    timeout: Option<u64>,

    /// Give up after this many attempts (default: never)
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Initial delay between attempts in milliseconds, doubling each retry
    #[arg(long)]
    backoff_ms: Option<u64>,

    /// JSON config file; flags override its values
    #[arg(long)]
    config: Option<PathBuf>,
}

impl ClientArgs {
    fn client_config(&self) -> Result<ClientConfig> {
        let mut config = match &self.config {
            Some(path) => ClientConfig::from_json_file(path)?,
            None => ClientConfig::default(),
        };
        if let Some(server) = &self.server {
            config.server_addr = server.clone();
        }
        if let Some(secs) = self.timeout {
            config = config.with_timeout(Duration::from_secs(secs))?;
        }
        Ok(config)
    }

    fn controller(&self, label: &str) -> Result<ResumeController> {
        let config = self.client_config()?;

        // Pre-flight check only; the controller keeps retrying regardless
        if let Err(e) = client::ping(&config) {
            warn!("Server {} is not reachable yet: {}", config.server_addr, e);
        }

        let controller = ResumeController::new(config);
        let controller = match (self.backoff_ms, self.max_attempts) {
            (Some(ms), max) => {
                let mut policy = Backoff::new(Duration::from_millis(ms), MAX_BACKOFF);
                if let Some(max) = max {
                    policy = policy.with_max_attempts(max);
                }
                controller.with_policy(policy)
            }
            (None, Some(max)) => controller.with_policy(Bounded::new(max, Duration::ZERO)),
            (None, None) => controller,
        };
        Ok(controller.with_observer(Arc::new(ProgressBarObserver::new(label))))
    }
}

fn report(outcome: TransferOutcome, file: &str, attempts: u32) -> ExitCode {
    match outcome {
        TransferOutcome::Completed => {
            println!("✅ {} transferred ({} attempt(s))", file, attempts);
            ExitCode::SUCCESS
        }
        TransferOutcome::Rejected(reason) => {
            eprintln!("❌ {} rejected: {}", file, reason);
            ExitCode::FAILURE
        }
        TransferOutcome::Retry(offset) => {
            eprintln!("❌ {} gave up after {} attempts at {} bytes", file, attempts, offset);
            ExitCode::FAILURE
        }
    }
}

fn serve(
    bind: Option<SocketAddr>,
    root: Option<PathBuf>,
    timeout: Option<u64>,
    max_connections: Option<usize>,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let mut config = match config_path {
        Some(path) => ServerConfig::from_json_file(&path)?,
        None => ServerConfig::default(),
    };
    if let Some(addr) = bind {
        config.listen_addr = addr;
    }
    if let Some(dir) = root {
        config.root_dir = dir;
    }
    if let Some(secs) = timeout {
        config = config.with_timeout(Duration::from_secs(secs))?;
    }
    if let Some(max) = max_connections {
        config = config.with_max_connections(max)?;
    }

    println!("=== RFTX File Server ===\n");
    println!("  Address: {}", config.listen_addr);
    println!("  Root Directory: {:?}", config.root_dir);
    println!("  Receive Timeout: {}s", config.timeout.as_secs());
    println!("  Max Connections: {}", config.max_connections);

    let server = Server::bind(config)?;
    println!("\nServer is running (press Ctrl+C to exit)...");
    server.run()?;
    Ok(())
}

fn main() -> Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            bind,
            root,
            timeout,
            max_connections,
            config,
        } => {
            serve(bind, root, timeout, max_connections, config)?;
            Ok(ExitCode::SUCCESS)
        }

        Commands::Upload { file, client: args } => {
            let mut controller = args.controller(&format!("Sending {}", file))?;
            let summary = controller.upload(Path::new(&file), &file, true);
            Ok(report(summary.outcome, &file, summary.attempts))
        }

        Commands::Download {
            file,
            resume,
            client: args,
        } => {
            let mut controller = args.controller(&format!("Receiving {}", file))?;
            let summary = controller.download(&file, Path::new(&file), !resume);
            Ok(report(summary.outcome, &file, summary.attempts))
        }

        Commands::Ping { client: args } => {
            let config = args.client_config()?;
            client::ping(&config)?;
            println!("✅ Server {} is reachable", config.server_addr);
            Ok(ExitCode::SUCCESS)
        }
    }
}
