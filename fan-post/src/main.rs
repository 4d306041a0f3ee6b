//! fan-post - Post one message to Nostr, Bluesky and Mastodon at once

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use libfanpost::credentials::{CredentialStore, FileCredentialStore};
use libfanpost::input::read_content;
use libfanpost::logging::{LogFormat, LoggingConfig};
use libfanpost::platforms::PlatformAdapters;
use libfanpost::{ComposedPost, Config, Dispatcher, FanpostError, PlatformKind, Result};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Parser, Debug)]
#[command(name = "fan-post")]
#[command(version)]
#[command(about = "Post one message to Nostr, Bluesky and Mastodon at once")]
#[command(long_about = "\
fan-post - Post one message to Nostr, Bluesky and Mastodon at once

DESCRIPTION:
    fan-post checks the message against each platform's length limit,
    validates the stored credentials, then publishes to every selected
    platform concurrently. Each platform is reported separately; one
    platform failing never stops the others.

USAGE:
    fan-post \"Hello, fediverse and friends\"
    echo \"From a pipe\" | fan-post --platform nostr,mastodon
    fan-post --format json \"Machine-readable report\"

LIMITS (characters):
    nostr 800, mastodon 500, bluesky 300

EXIT CODES:
    0 - Posted to every selected platform
    1 - Posted nowhere, or configuration error
    2 - Credential error
    3 - Invalid input
    4 - Posted to some platforms but not all
")]
struct Cli {
    /// Content to post (reads from stdin if omitted or '-')
    content: Option<String>,

    /// Target platform(s), comma-separated (default: [defaults] in config)
    #[arg(short, long)]
    platform: Option<String>,

    /// Output format (text or json)
    #[arg(short, long, default_value = "text")]
    format: String,

    /// Configuration file (default: $FANPOST_CONFIG or ~/.config/fanpost/config.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Credentials file, overriding [credentials] path in config
    #[arg(long, value_name = "PATH")]
    credentials: Option<PathBuf>,

    /// Timeout per platform in seconds, overriding config and adapter defaults
    #[arg(long, value_name = "SECONDS")]
    timeout: Option<u64>,

    /// Log format (text, json or pretty)
    #[arg(long, value_name = "FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OutputFormat {
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = FanpostError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            _ => Err(FanpostError::InvalidInput(format!(
                "Invalid output format: '{}'. Valid options: text, json",
                s
            ))),
        }
    }
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env("warn", cli.verbose);
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.init();

    match run(cli).await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> Result<i32> {
    let format: OutputFormat = cli.format.parse()?;
    let content = read_content(cli.content.as_deref())?;

    let config = Config::load_from(cli.config.as_deref())?;

    let targets = match &cli.platform {
        Some(list) => PlatformKind::parse_list(list)?.into_iter().collect(),
        None => config.defaults.platforms.clone(),
    };
    let post = ComposedPost::new(content, targets)?;

    let store = match &cli.credentials {
        Some(path) => FileCredentialStore::new(path),
        None => FileCredentialStore::from_config_path(&config.credentials.path)?,
    };
    debug!("Reading credentials from {}", store.path().display());
    let targets: Vec<PlatformKind> = post.targets().iter().copied().collect();
    let credentials = store.load_set(&targets)?;

    let mut dispatch_config = config.dispatch_config();
    if let Some(secs) = cli.timeout {
        if secs == 0 {
            return Err(FanpostError::InvalidInput(
                "--timeout must be greater than zero".to_string(),
            ));
        }
        for kind in PlatformKind::ALL {
            dispatch_config = dispatch_config.with_platform_timeout(kind, Duration::from_secs(secs));
        }
    }

    let adapters = PlatformAdapters::from_config(&config)?;
    let dispatcher = Dispatcher::new(adapters, dispatch_config);

    let cancel = CancellationToken::new();
    setup_signal_handlers(cancel.clone())?;

    let report = dispatcher
        .dispatch_with_cancel(&post, &credentials, cancel)
        .await;

    match format {
        OutputFormat::Text => print!("{}", report.render_text()),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&report).map_err(|e| {
                FanpostError::InvalidInput(format!("Failed to encode report: {}", e))
            })?;
            println!("{}", json);
        }
    }

    Ok(report.status().exit_code())
}

/// Cancel the dispatch on SIGINT or SIGTERM
#[cfg(unix)]
fn setup_signal_handlers(cancel: CancellationToken) -> Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])
        .map_err(|e| FanpostError::InvalidInput(format!("Signal setup failed: {}", e)))?;

    std::thread::spawn(move || {
        if signals.forever().next().is_some() {
            info!("Received shutdown signal, cancelling pending attempts");
            cancel.cancel();
        }
    });

    Ok(())
}

#[cfg(not(unix))]
fn setup_signal_handlers(_cancel: CancellationToken) -> Result<()> {
    Ok(())
}
