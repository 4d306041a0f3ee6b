//! Bluesky platform implementation
//!
//! Talks XRPC to the account's PDS (or the `bsky.social` entryway) directly:
//!
//! 1. `com.atproto.server.createSession` exchanges handle and app password
//!    for an access token and the account DID.
//! 2. `com.atproto.repo.createRecord` writes an `app.bsky.feed.post` record
//!    into the account's repository.
//!
//! The `at://` URI of the created record is the remote post identifier.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;
use url::Url;

use crate::config::BlueskyConfig;
use crate::credentials::BlueskyLogin;
use crate::error::{ConfigError, PlatformError, Result};
use crate::platforms::{truncate_for_error, PublishOutcome, Publisher};
use crate::types::PlatformKind;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

const CREATE_SESSION: &str = "com.atproto.server.createSession";
const CREATE_RECORD: &str = "com.atproto.repo.createRecord";
const POST_COLLECTION: &str = "app.bsky.feed.post";

/// XRPC error codes that mean the session or login is not usable
const AUTH_ERROR_CODES: [&str; 4] = [
    "AuthenticationRequired",
    "InvalidToken",
    "ExpiredToken",
    "AccountTakedown",
];

pub struct BlueskyClient {
    http: Client,
    service: Url,
    timeout: Duration,
}

#[derive(Serialize)]
struct CreateSessionRequest<'a> {
    identifier: &'a str,
    password: &'a str,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionResponse {
    access_jwt: String,
    did: String,
}

struct Session {
    access_jwt: SecretString,
    did: String,
}

#[derive(Deserialize)]
struct CreateRecordResponse {
    uri: String,
}

/// Error body returned by XRPC endpoints
#[derive(Deserialize, Default)]
struct XrpcError {
    error: Option<String>,
    message: Option<String>,
}

impl BlueskyClient {
    /// Create a client for the service configured under `[bluesky]`
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the service URL is not an http(s) URL.
    pub fn from_config(config: &BlueskyConfig) -> Result<Self> {
        let service = Url::parse(&config.service).map_err(|e| ConfigError::InvalidValue {
            field: "bluesky.service".to_string(),
            reason: e.to_string(),
        })?;

        if !matches!(service.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "bluesky.service".to_string(),
                reason: format!("unsupported scheme '{}'", service.scheme()),
            }
            .into());
        }

        Self::new(service)
    }

    pub fn new(service: Url) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| PlatformError::Network(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            service,
            timeout: DEFAULT_TIMEOUT,
        })
    }

    pub fn service(&self) -> &Url {
        &self.service
    }

    fn endpoint(&self, nsid: &str) -> String {
        format!("{}/xrpc/{}", self.service.as_str().trim_end_matches('/'), nsid)
    }

    async fn create_session(&self, login: &BlueskyLogin) -> std::result::Result<Session, PlatformError> {
        let request = CreateSessionRequest {
            identifier: login.handle(),
            password: login.app_password(),
        };

        let response: CreateSessionResponse = self
            .call(CREATE_SESSION, None, &request, "authentication")
            .await?;

        Ok(Session {
            access_jwt: SecretString::from(response.access_jwt),
            did: response.did,
        })
    }

    async fn create_post(&self, session: &Session, text: &str) -> std::result::Result<String, PlatformError> {
        let body = json!({
            "repo": session.did,
            "collection": POST_COLLECTION,
            "record": {
                "$type": POST_COLLECTION,
                "text": text,
                "createdAt": Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        });

        let response: CreateRecordResponse = self
            .call(
                CREATE_RECORD,
                Some(session.access_jwt.expose_secret()),
                &body,
                "posting",
            )
            .await?;

        Ok(response.uri)
    }

    /// POST a JSON body to an XRPC procedure and decode the JSON reply
    async fn call<B, R>(
        &self,
        nsid: &str,
        bearer: Option<&str>,
        body: &B,
        context: &str,
    ) -> std::result::Result<R, PlatformError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let mut request = self.http.post(self.endpoint(nsid)).json(body);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| map_transport_error(&e, context))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| map_transport_error(&e, context))?;

        if !status.is_success() {
            return Err(map_status_error(status, &text, context));
        }

        serde_json::from_str(&text).map_err(|e| {
            PlatformError::Posting(format!(
                "Unexpected Bluesky response during {}: {} ({})",
                context,
                e,
                truncate_for_error(&text)
            ))
        })
    }
}

#[async_trait]
impl Publisher for BlueskyClient {
    type Credential = BlueskyLogin;

    fn kind(&self) -> PlatformKind {
        PlatformKind::Bluesky
    }

    fn default_timeout(&self) -> Duration {
        self.timeout
    }

    async fn publish(&self, credential: &BlueskyLogin, text: &str) -> PublishOutcome {
        debug!("Creating Bluesky session for {}", credential.handle());
        let session = self.create_session(credential).await?;

        debug!("Creating post record in {}", session.did);
        self.create_post(&session, text).await
    }
}

/// Map a non-success XRPC response to a `PlatformError`
fn map_status_error(status: StatusCode, body: &str, context: &str) -> PlatformError {
    let xrpc: XrpcError = serde_json::from_str(body).unwrap_or_default();
    let code = xrpc.error.as_deref().unwrap_or("");
    let detail = match (&xrpc.error, &xrpc.message) {
        (Some(error), Some(message)) => format!("{}: {}", error, message),
        (Some(error), None) => error.clone(),
        (None, Some(message)) => message.clone(),
        (None, None) => truncate_for_error(body),
    };

    if status == StatusCode::UNAUTHORIZED
        || status == StatusCode::FORBIDDEN
        || AUTH_ERROR_CODES.contains(&code)
    {
        return PlatformError::Authentication(format!(
            "Bluesky authentication failed during {} ({}): {}",
            context, status, detail
        ));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        return PlatformError::RateLimit(format!(
            "Bluesky rate limit exceeded during {}: {}",
            context, detail
        ));
    }

    if status.is_client_error() {
        return PlatformError::Validation(format!(
            "Bluesky rejected the request during {} ({}): {}",
            context, status, detail
        ));
    }

    if status.is_server_error() {
        return PlatformError::Network(format!(
            "Bluesky server error during {} ({}): {}",
            context, status, detail
        ));
    }

    PlatformError::Posting(format!(
        "Unexpected Bluesky response during {} ({}): {}",
        context, status, detail
    ))
}

fn map_transport_error(error: &reqwest::Error, context: &str) -> PlatformError {
    if error.is_timeout() {
        PlatformError::Timeout(format!(
            "Bluesky did not respond during {}: {}",
            context, error
        ))
    } else {
        PlatformError::Network(format!(
            "Could not reach Bluesky during {}: {}",
            context, error
        ))
    }
}
