use anyhow::{Context, Result};
use azscrape::azure::auth::default_credential;
use azscrape::azure::http::{format_arm_error, ArmHttpClient};
use azscrape::config::Config;
use azscrape::scrape::{Scrapper, ScrapperOptions};
use azscrape::server::{self, AppState};
use azscrape::sink::JsonLinesSink;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Inventory an Azure subscription
#[derive(Parser, Debug)]
#[command(name = "azscrape", version = azscrape::VERSION, about, long_about = None)]
struct Args {
    /// Log level for debugging (RUST_LOG takes precedence)
    #[arg(long, value_enum, default_value = "off", global = true)]
    log_level: LogLevel,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run one scrape and print every resource as a JSON line
    Scrape {
        /// Subscription to scrape
        #[arg(short, long)]
        subscription: Option<String>,

        /// Run deadline in seconds
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Also list the node pools of every discovered cluster
        #[arg(long)]
        node_pools: bool,
    },
    /// Serve the Azure Functions HTTP trigger
    Serve {
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,

        /// Also list node pools on every request
        #[arg(long)]
        node_pools: bool,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn to_tracing_level(self) -> Option<Level> {
        match self {
            LogLevel::Off => None,
            LogLevel::Error => Some(Level::ERROR),
            LogLevel::Warn => Some(Level::WARN),
            LogLevel::Info => Some(Level::INFO),
            LogLevel::Debug => Some(Level::DEBUG),
            LogLevel::Trace => Some(Level::TRACE),
        }
    }
}

fn setup_logging(level: LogLevel) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::new(level.to_tracing_level()?.as_str()),
    };

    let log_path = get_log_path();

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
    {
        Ok(file) => file,
        Err(e) => {
            eprintln!("Failed to open log file {:?}: {}", log_path, e);
            return None;
        },
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file);

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true)
        .init();

    tracing::info!("azscrape {} started with log level: {:?}", azscrape::VERSION, level);
    tracing::info!("Log file: {:?}", log_path);

    Some(guard)
}

fn get_log_path() -> PathBuf {
    if let Some(config_dir) = dirs::config_dir() {
        return config_dir.join("azscrape").join("azscrape.log");
    }
    if let Some(home) = dirs::home_dir() {
        return home.join(".azscrape").join("azscrape.log");
    }
    PathBuf::from("azscrape.log")
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let _log_guard = setup_logging(args.log_level);

    let mut config = Config::load();

    match args.command {
        Command::Scrape {
            subscription,
            timeout,
            node_pools,
        } => {
            if subscription.is_some() {
                config.subscription = subscription;
            }
            if timeout.is_some() {
                config.timeout_secs = timeout;
            }
            scrape(&config, node_pools).await
        },
        Command::Serve { port, node_pools } => {
            if port.is_some() {
                config.listen_port = port;
            }
            let port = config.effective_port();
            let http = ArmHttpClient::new(config.effective_timeout())?;
            let mut state = AppState::new(config, ScrapperOptions::default()).with_node_pools(node_pools);
            // Otherwise resolved on the first request that can obtain one
            match default_credential(&http) {
                Ok(credential) => state = state.with_credential(credential),
                Err(e) => tracing::warn!("No credential at startup: {:#}", e),
            }
            server::serve(state, port).await
        },
    }
}

async fn scrape(config: &Config, node_pools: bool) -> Result<()> {
    let http = ArmHttpClient::new(config.effective_timeout())?;
    let credential = default_credential(&http).context("failed to obtain a credential")?;

    let options = ScrapperOptions::default()
        .with_client_options(config.client_options())
        .with_timeout(config.effective_timeout());
    let scrapper = Scrapper::new(credential, &config.effective_subscription(), options)
        .context("unable to initialize scrapper")?;

    let sink = Arc::new(JsonLinesSink::stdout());
    let outcome = if node_pools {
        scrapper.run_with_node_pools(sink).await
    } else {
        scrapper.run(sink).await
    };

    outcome.map_err(|e| {
        tracing::error!("Scrape failed: {:#}", e);
        let summary = if e.is_fetch() && !e.is_cancellation() {
            let kind = e.kind().map(|k| k.to_string()).unwrap_or_default();
            format!("{}: {}", kind, format_arm_error(&anyhow::Error::new(e)))
        } else {
            e.to_string()
        };
        anyhow::anyhow!("scrapper failed: {}", summary)
    })
}
