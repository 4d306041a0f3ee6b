//! fan-check - Check a message against platform limits and stored credentials
//!
//! Nothing is posted and no network connection is made. The character counts
//! are the same ones fan-post enforces, so a message that passes here is not
//! rejected for length at dispatch time.

use std::path::PathBuf;

use clap::Parser;
use libfanpost::constraints::{self, ConstraintCheck};
use libfanpost::credentials::{validate, CredentialStore, FileCredentialStore, VerifiedCredential};
use libfanpost::input::read_content;
use libfanpost::logging::LoggingConfig;
use libfanpost::{Config, FanpostError, PlatformKind, Result};
use serde::Serialize;
use tracing::debug;

#[derive(Parser, Debug)]
#[command(name = "fan-check")]
#[command(version)]
#[command(about = "Check a message against platform limits and stored credentials without posting")]
#[command(long_about = "\
fan-check - Check a message against platform limits and stored credentials

DESCRIPTION:
    Shows how long the message is for each platform, how many characters
    remain, and whether the stored credentials for that platform are well
    formed. Nothing is posted and no network connection is made.

USAGE:
    fan-check \"Draft message\"
    cat draft.txt | fan-check --platform bluesky
    fan-check --skip-credentials --format json \"Just count\"

EXIT CODES:
    0 - Ready to post on every selected platform
    1 - At least one platform would be skipped, or configuration error
    3 - Invalid input
")]
struct Cli {
    /// Message to check (reads from stdin if omitted or '-')
    content: Option<String>,

    /// Platform(s) to check, comma-separated (default: [defaults] in config)
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

    /// Only count characters
    #[arg(long)]
    skip_credentials: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// State of one platform's stored credential
#[derive(Debug, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
enum CredentialStatus {
    Valid { account: String },
    Missing,
    Invalid { reason: String },
    Skipped,
}

impl CredentialStatus {
    fn is_ready(&self) -> bool {
        matches!(self, CredentialStatus::Valid { .. } | CredentialStatus::Skipped)
    }
}

#[derive(Debug, Serialize)]
struct PlatformCheck {
    platform: PlatformKind,
    length: usize,
    limit: usize,
    remaining: i64,
    within_limit: bool,
    credential: CredentialStatus,
}

impl PlatformCheck {
    fn is_ready(&self) -> bool {
        self.within_limit && self.credential.is_ready()
    }
}

fn main() {
    let cli = Cli::parse();
    LoggingConfig::from_env("warn", cli.verbose).init();

    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(e.exit_code());
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    let json = match cli.format.to_lowercase().as_str() {
        "text" => false,
        "json" => true,
        _ => {
            return Err(FanpostError::InvalidInput(format!(
                "Invalid output format: '{}'. Valid options: text, json",
                cli.format
            )))
        }
    };

    let content = read_content(cli.content.as_deref())?;
    let config = Config::load_from(cli.config.as_deref())?;

    let platforms: Vec<PlatformKind> = match &cli.platform {
        Some(list) => PlatformKind::parse_list(list)?.into_iter().collect(),
        None => config.defaults.platforms.clone(),
    };
    if platforms.is_empty() {
        return Err(FanpostError::InvalidInput(
            "At least one platform must be selected".to_string(),
        ));
    }

    let store = if cli.skip_credentials {
        None
    } else {
        Some(match &cli.credentials {
            Some(path) => FileCredentialStore::new(path),
            None => FileCredentialStore::from_config_path(&config.credentials.path)?,
        })
    };

    let checks = platforms
        .iter()
        .map(|kind| check_platform(*kind, &content, store.as_ref()))
        .collect::<Result<Vec<_>>>()?;

    if json {
        let encoded = serde_json::to_string_pretty(&checks).map_err(|e| {
            FanpostError::InvalidInput(format!("Failed to encode report: {}", e))
        })?;
        println!("{}", encoded);
    } else {
        for check in &checks {
            println!("{}", render(check));
        }
    }

    Ok(if checks.iter().all(PlatformCheck::is_ready) {
        0
    } else {
        1
    })
}

fn check_platform(
    kind: PlatformKind,
    content: &str,
    store: Option<&FileCredentialStore>,
) -> Result<PlatformCheck> {
    let length = constraints::measure(kind, content);
    let limit = constraints::limit_for(kind);
    let within_limit = matches!(constraints::check(kind, content), ConstraintCheck::WithinLimit);

    let credential = match store {
        None => CredentialStatus::Skipped,
        Some(store) => match store.load(kind)? {
            None => CredentialStatus::Missing,
            Some(credential) => match validate(kind, &credential) {
                Ok(verified) => CredentialStatus::Valid {
                    account: account_label(&verified),
                },
                Err(e) => CredentialStatus::Invalid {
                    reason: e.to_string(),
                },
            },
        },
    };
    debug!(platform = %kind, "{} of {} characters", length, limit);

    Ok(PlatformCheck {
        platform: kind,
        length,
        limit,
        remaining: constraints::remaining(kind, content),
        within_limit,
        credential,
    })
}

/// Public, non-secret name of the account a credential belongs to
fn account_label(credential: &VerifiedCredential) -> String {
    match credential {
        VerifiedCredential::Nostr(identity) => identity.npub(),
        VerifiedCredential::Bluesky(login) => login.handle().to_string(),
        VerifiedCredential::Mastodon(access) => access.instance_url(),
    }
}

fn render(check: &PlatformCheck) -> String {
    let count = if check.within_limit {
        format!("{}/{} ({} left)", check.length, check.limit, check.remaining)
    } else {
        format!(
            "{}/{} ({} over)",
            check.length,
            check.limit,
            -check.remaining
        )
    };

    let credential = match &check.credential {
        CredentialStatus::Valid { account } => format!("credentials ok ({})", account),
        CredentialStatus::Missing => "no credentials configured".to_string(),
        CredentialStatus::Invalid { reason } => format!("invalid credentials: {}", reason),
        CredentialStatus::Skipped => "credentials not checked".to_string(),
    };

    format!("{:<9} {:<22} {}", check.platform.name(), count, credential)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_within_limit() {
        let check = PlatformCheck {
            platform: PlatformKind::Bluesky,
            length: 12,
            limit: 300,
            remaining: 288,
            within_limit: true,
            credential: CredentialStatus::Missing,
        };
        let line = render(&check);
        assert!(line.starts_with("bluesky   12/300 (288 left)"));
        assert!(line.ends_with("no credentials configured"));
        assert!(!check.is_ready());
    }

    #[test]
    fn test_render_over_limit() {
        let check = PlatformCheck {
            platform: PlatformKind::Mastodon,
            length: 510,
            limit: 500,
            remaining: -10,
            within_limit: false,
            credential: CredentialStatus::Skipped,
        };
        assert!(render(&check).contains("510/500 (10 over)"));
        assert!(!check.is_ready());
    }

    #[test]
    fn test_credential_status_json() {
        let status = CredentialStatus::Invalid {
            reason: "handle must not be empty".to_string(),
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "invalid");
        assert_eq!(json["reason"], "handle must not be empty");
    }
}
