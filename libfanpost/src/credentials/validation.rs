//! Credential validation
//!
//! [`validate`] turns a raw [`Credential`] into a [`VerifiedCredential`] or
//! explains why it was rejected. Invalid input is rejected as-is: nothing is
//! trimmed, padded, truncated or otherwise repaired into something that
//! merely looks valid. No network calls happen here; whether a token is still
//! accepted by the remote service is only known when publishing.

use std::fmt;

use nostr_sdk::{FromBech32, Keys, SecretKey, ToBech32};
use secrecy::{ExposeSecret, SecretString};
use url::Url;

use crate::credentials::Credential;
use crate::error::CredentialError;
use crate::types::PlatformKind;

/// Length of a hex-encoded secp256k1 secret key
const NOSTR_HEX_KEY_LEN: usize = 64;

const NSEC_PREFIX: &str = "nsec1";
const NPUB_PREFIX: &str = "npub1";

/// Nostr signing keys parsed from a validated secret key
#[derive(Clone)]
pub struct NostrIdentity {
    keys: Keys,
}

impl NostrIdentity {
    pub fn keys(&self) -> &Keys {
        &self.keys
    }

    /// Public key in `npub1` form, or hex if encoding fails
    pub fn npub(&self) -> String {
        let public_key = self.keys.public_key();
        public_key
            .to_bech32()
            .unwrap_or_else(|_| public_key.to_hex())
    }
}

impl fmt::Debug for NostrIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NostrIdentity")
            .field("public_key", &self.npub())
            .finish()
    }
}

/// Bluesky login accepted by the validator
#[derive(Debug)]
pub struct BlueskyLogin {
    handle: String,
    app_password: SecretString,
}

impl BlueskyLogin {
    pub fn handle(&self) -> &str {
        &self.handle
    }

    pub(crate) fn app_password(&self) -> &str {
        self.app_password.expose_secret()
    }

    #[cfg(test)]
    pub(crate) fn for_tests(handle: &str, app_password: &str) -> Self {
        Self {
            handle: handle.to_string(),
            app_password: SecretString::from(app_password.to_string()),
        }
    }
}

/// Mastodon account access accepted by the validator
#[derive(Debug)]
pub struct MastodonAccess {
    instance: Url,
    access_token: SecretString,
}

impl MastodonAccess {
    /// Instance base URL without a trailing slash, e.g. `https://mastodon.social`
    pub fn instance_url(&self) -> String {
        self.instance.as_str().trim_end_matches('/').to_string()
    }

    pub(crate) fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }
}

/// A credential that passed validation
///
/// This is the only credential form platform adapters accept, and it can only
/// be produced by [`validate`].
#[derive(Debug)]
pub enum VerifiedCredential {
    Nostr(NostrIdentity),
    Bluesky(BlueskyLogin),
    Mastodon(MastodonAccess),
}

impl VerifiedCredential {
    pub fn kind(&self) -> PlatformKind {
        match self {
            VerifiedCredential::Nostr(_) => PlatformKind::Nostr,
            VerifiedCredential::Bluesky(_) => PlatformKind::Bluesky,
            VerifiedCredential::Mastodon(_) => PlatformKind::Mastodon,
        }
    }
}

/// Validate `credential` for use with `kind`
///
/// # Errors
///
/// Returns a `CredentialError` describing the first problem found. The error
/// is a plain value; callers decide whether it aborts anything.
pub fn validate(
    kind: PlatformKind,
    credential: &Credential,
) -> Result<VerifiedCredential, CredentialError> {
    if credential.kind() != kind {
        return Err(CredentialError::KindMismatch {
            expected: kind,
            actual: credential.kind(),
        });
    }

    match credential {
        Credential::Nostr { secret_key } => {
            let keys = parse_nostr_secret_key(secret_key.expose_secret())?;
            Ok(VerifiedCredential::Nostr(NostrIdentity { keys }))
        }
        Credential::Bluesky {
            handle,
            app_password,
        } => {
            validate_handle(handle)?;
            validate_secret("app_password", app_password.expose_secret())?;
            Ok(VerifiedCredential::Bluesky(BlueskyLogin {
                handle: handle.clone(),
                app_password: SecretString::from(app_password.expose_secret().to_string()),
            }))
        }
        Credential::Mastodon {
            instance,
            access_token,
        } => {
            let instance = parse_instance_url(instance)?;
            validate_secret("access_token", access_token.expose_secret())?;
            Ok(VerifiedCredential::Mastodon(MastodonAccess {
                instance,
                access_token: SecretString::from(access_token.expose_secret().to_string()),
            }))
        }
    }
}

/// Parse a Nostr secret key in one of its canonical encodings
///
/// Accepted forms are exactly 64 ASCII hex digits, or a lowercase bech32
/// string with the `nsec` prefix and a valid checksum. Either way the decoded
/// 32 bytes must be a valid secp256k1 secret key.
pub fn parse_nostr_secret_key(input: &str) -> Result<Keys, CredentialError> {
    if input.is_empty() {
        return Err(CredentialError::Empty {
            field: "secret_key",
        });
    }

    if input.starts_with(NPUB_PREFIX) {
        return Err(CredentialError::InvalidNostrKey(
            "this is a public key (npub); a secret key (nsec or hex) is required".to_string(),
        ));
    }

    if input.starts_with(NSEC_PREFIX) {
        let secret_key = SecretKey::from_bech32(input).map_err(|e| {
            CredentialError::InvalidNostrKey(format!("malformed nsec bech32 key: {}", e))
        })?;
        return Ok(Keys::new(secret_key));
    }

    if input.len() != NOSTR_HEX_KEY_LEN {
        return Err(CredentialError::InvalidNostrKey(format!(
            "expected {} hex characters or an nsec1 bech32 key, got {} characters",
            NOSTR_HEX_KEY_LEN,
            input.chars().count()
        )));
    }

    if !input.bytes().all(|b| b.is_ascii_hexdigit()) {
        return Err(CredentialError::InvalidNostrKey(
            "hex key contains non-hexadecimal characters".to_string(),
        ));
    }

    let secret_key = SecretKey::from_hex(input).map_err(|e| {
        CredentialError::InvalidNostrKey(format!("not a valid secp256k1 secret key: {}", e))
    })?;

    Ok(Keys::new(secret_key))
}

fn validate_handle(handle: &str) -> Result<(), CredentialError> {
    if handle.is_empty() {
        return Err(CredentialError::Empty { field: "handle" });
    }

    if handle.chars().any(char::is_whitespace) {
        return Err(CredentialError::InvalidField {
            field: "handle",
            reason: "must not contain whitespace".to_string(),
        });
    }

    if handle.starts_with('@') {
        return Err(CredentialError::InvalidField {
            field: "handle",
            reason: "write the handle without a leading '@' (e.g. alice.bsky.social)".to_string(),
        });
    }

    Ok(())
}

fn validate_secret(field: &'static str, value: &str) -> Result<(), CredentialError> {
    if value.trim().is_empty() {
        return Err(CredentialError::Empty { field });
    }

    if value.chars().any(char::is_whitespace) {
        return Err(CredentialError::InvalidField {
            field,
            reason: "must not contain whitespace".to_string(),
        });
    }

    Ok(())
}

/// Parse a Mastodon instance base URL
///
/// A bare host such as `mastodon.social` means `https://mastodon.social`.
/// The URL must not carry a path, query, fragment or userinfo.
fn parse_instance_url(raw: &str) -> Result<Url, CredentialError> {
    if raw.is_empty() {
        return Err(CredentialError::Empty { field: "instance" });
    }

    let invalid = |reason: String| CredentialError::InvalidField {
        field: "instance",
        reason,
    };

    if raw.trim() != raw {
        return Err(invalid(
            "must not have leading or trailing whitespace".to_string(),
        ));
    }

    let candidate = if raw.contains("://") {
        raw.to_string()
    } else {
        format!("https://{}", raw)
    };

    let url = Url::parse(&candidate).map_err(|e| invalid(format!("{} ({})", e, raw)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(invalid(format!(
            "unsupported scheme '{}', expected https",
            url.scheme()
        )));
    }

    if url.host_str().map_or(true, str::is_empty) {
        return Err(invalid("missing host".to_string()));
    }

    if !url.username().is_empty() || url.password().is_some() {
        return Err(invalid("must not contain user information".to_string()));
    }

    if url.path() != "/" || url.query().is_some() || url.fragment().is_some() {
        return Err(invalid(format!(
            "expected the instance base URL (e.g. https://mastodon.social), got {}",
            raw
        )));
    }

    Ok(url)
}
