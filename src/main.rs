use clap::{error::ErrorKind, Parser};
use dotenv::dotenv;
use serde::Serialize;
use std::process::ExitCode;
use std::time::Duration;
use tracing::debug;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use igscrape::commands;
use igscrape::error_utils::serialize_to_json_with_context;
use igscrape::instagram::{
    ClientConfig, InstagramClient, InstagramError, DEFAULT_USER_AGENT, INSTAGRAM_BASE_URL,
};
use igscrape::profile::{ErrorRecord, ProfileRecord};

#[derive(Parser, Debug)]
#[command(
    name = "igscrape",
    version,
    about = "Fetch an Instagram profile as JSON",
    long_about = "Fetch an Instagram profile's metadata and up to 12 recent posts, printed as a single JSON object on stdout"
)]
struct Cli {
    /// Instagram username (with or without @ symbol) or profile URL
    username: String,

    /// Base URL of the Instagram web API
    #[arg(long, env = "IGSCRAPE_BASE_URL", default_value = INSTAGRAM_BASE_URL, hide = true)]
    base_url: String,

    /// Per-request timeout in seconds
    #[arg(long, env = "IGSCRAPE_TIMEOUT", default_value = "15")]
    timeout: u64,

    /// User-Agent header sent with every request
    #[arg(long, env = "IGSCRAPE_USER_AGENT", default_value = DEFAULT_USER_AGENT, hide_default_value = true)]
    user_agent: String,

    /// Hard limit in seconds for the whole run, regardless of how many requests it makes
    #[arg(long, env = "IGSCRAPE_WATCHDOG", default_value = "60", hide = true)]
    watchdog: u64,

    /// Verbose output (logs go to stderr)
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    // Load environment variables from .env file
    dotenv().ok();

    let args = match Cli::try_parse() {
        Ok(args) => args,
        Err(err) => match err.kind() {
            ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => err.exit(),
            _ => return print_json(&ErrorRecord::usage(), ExitCode::FAILURE),
        },
    };

    // Initialize logging; stdout is reserved for the JSON result
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    let watchdog = Duration::from_secs(args.watchdog);
    let outcome = commands::fetch_profile::run_with_watchdog(watchdog, run(&args)).await;

    match outcome {
        Ok(record) => print_json(&record, ExitCode::SUCCESS),
        Err(err) => {
            debug!("Lookup failed: {err:?}");
            print_json(&ErrorRecord::from(&err), ExitCode::FAILURE)
        }
    }
}

async fn run(args: &Cli) -> Result<ProfileRecord, InstagramError> {
    let config = ClientConfig {
        base_url: args.base_url.clone(),
        timeout: Duration::from_secs(args.timeout),
        user_agent: args.user_agent.clone(),
    };

    let client = InstagramClient::new(&config)?;
    commands::fetch_profile::execute(&args.username, &client).await
}

/// Prints exactly one JSON object on stdout and hands back the exit code
fn print_json<T: Serialize>(data: &T, code: ExitCode) -> ExitCode {
    match serialize_to_json_with_context(data, "result") {
        Ok(json) => {
            println!("{json}");
            code
        }
        Err(e) => {
            eprintln!("{e:#}");
            ExitCode::FAILURE
        }
    }
}
