use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::domain::ClassifyError;

const OAUTH_TOKEN_URL: &str = "https://oauth2.googleapis.com/token";
const METADATA_TOKEN_URL: &str =
    "http://metadata.google.internal/computeMetadata/v1/instance/service-accounts/default/token";
/// Tokens are treated as expired this long before their real deadline so
/// a request never departs with a token about to lapse mid-flight.
const EXPIRY_SKEW: Duration = Duration::from_secs(60);
const STATIC_TOKEN_LIFETIME: Duration = Duration::from_secs(3600);

/// Where access tokens come from, probed once at construction.
enum TokenSource {
    /// Fixed token handed in via `GOOGLE_OAUTH_ACCESS_TOKEN`.
    Static(String),
    /// gcloud application-default credentials (`authorized_user` JSON),
    /// exchanged through the standard refresh-token grant.
    AuthorizedUser {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    /// GCE/Cloud Run metadata server.
    Metadata,
}

#[derive(Clone)]
struct CachedToken {
    value: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        self.expires_at > Instant::now()
    }
}

#[derive(Deserialize)]
struct AdcFile {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    client_id: String,
    #[serde(default)]
    client_secret: String,
    #[serde(default)]
    refresh_token: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

/// Shared OAuth2 access-token cache for the Vertex AI adapters.
///
/// One instance serves every adapter of the provider family. The cache is
/// guarded by a mutex and re-checked after acquisition, so concurrent
/// callers observe at most one in-flight refresh. A 401 upstream should be
/// answered with [`invalidate`] followed by a single retry.
///
/// [`invalidate`]: GcpTokenManager::invalidate
pub struct GcpTokenManager {
    client: reqwest::Client,
    source: TokenSource,
    cache: Mutex<Option<CachedToken>>,
}

impl GcpTokenManager {
    /// Probe credential sources in order: a static token from
    /// `GOOGLE_OAUTH_ACCESS_TOKEN`, an application-default-credentials file
    /// (`GOOGLE_APPLICATION_CREDENTIALS` or the gcloud default path), and
    /// finally the metadata server.
    pub fn from_env() -> Result<Self, ClassifyError> {
        if let Ok(token) = std::env::var("GOOGLE_OAUTH_ACCESS_TOKEN") {
            if !token.is_empty() {
                debug!("Using static access token from the environment");
                return Ok(Self::with_source(TokenSource::Static(token)));
            }
        }

        if let Some(path) = Self::credentials_path() {
            let raw = std::fs::read_to_string(&path).map_err(|e| {
                ClassifyError::authentication(format!(
                    "failed to read credentials file {}: {e}",
                    path.display()
                ))
            })?;
            let adc: AdcFile = serde_json::from_str(&raw).map_err(|e| {
                ClassifyError::authentication(format!(
                    "failed to parse credentials file {}: {e}",
                    path.display()
                ))
            })?;
            if adc.kind != "authorized_user" {
                return Err(ClassifyError::authentication(format!(
                    "unsupported credential type \"{}\" in {}",
                    adc.kind,
                    path.display()
                )));
            }
            debug!("Using application-default credentials from {}", path.display());
            return Ok(Self::with_source(TokenSource::AuthorizedUser {
                client_id: adc.client_id,
                client_secret: adc.client_secret,
                refresh_token: adc.refresh_token,
            }));
        }

        debug!("No local credentials found, falling back to the metadata server");
        Ok(Self::with_source(TokenSource::Metadata))
    }

    /// Fixed-token manager, mainly for tests and short-lived jobs.
    pub fn with_static_token(token: impl Into<String>) -> Self {
        Self::with_source(TokenSource::Static(token.into()))
    }

    fn with_source(source: TokenSource) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(10))
                .build()
                .unwrap_or_default(),
            source,
            cache: Mutex::new(None),
        }
    }

    fn credentials_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("GOOGLE_APPLICATION_CREDENTIALS") {
            if !path.is_empty() {
                return Some(PathBuf::from(path));
            }
        }
        let default = dirs::config_dir()?
            .join("gcloud")
            .join("application_default_credentials.json");
        default.exists().then_some(default)
    }

    /// A token valid for at least [`EXPIRY_SKEW`] from now, refreshed on
    /// demand. The cache is re-checked under the lock: whoever loses the
    /// race reuses the winner's token.
    pub async fn get_token(&self) -> Result<String, ClassifyError> {
        let mut cache = self.cache.lock().await;
        if let Some(token) = cache.as_ref() {
            if token.is_fresh() {
                return Ok(token.value.clone());
            }
        }

        let fresh = self.fetch_token().await?;
        let value = fresh.value.clone();
        *cache = Some(fresh);
        Ok(value)
    }

    /// Drop the cached token so the next caller refreshes. Used after an
    /// upstream 401.
    pub async fn invalidate(&self) {
        *self.cache.lock().await = None;
    }

    async fn fetch_token(&self) -> Result<CachedToken, ClassifyError> {
        match &self.source {
            TokenSource::Static(token) => Ok(CachedToken {
                value: token.clone(),
                expires_at: Instant::now() + STATIC_TOKEN_LIFETIME,
            }),
            TokenSource::AuthorizedUser {
                client_id,
                client_secret,
                refresh_token,
            } => {
                debug!("Refreshing access token via the OAuth refresh grant");
                let response = self
                    .client
                    .post(OAUTH_TOKEN_URL)
                    .form(&[
                        ("client_id", client_id.as_str()),
                        ("client_secret", client_secret.as_str()),
                        ("refresh_token", refresh_token.as_str()),
                        ("grant_type", "refresh_token"),
                    ])
                    .send()
                    .await
                    .map_err(|e| {
                        ClassifyError::authentication(format!("token refresh failed: {e}"))
                    })?;
                Self::read_token_response(response).await
            }
            TokenSource::Metadata => {
                debug!("Fetching access token from the metadata server");
                let response = self
                    .client
                    .get(METADATA_TOKEN_URL)
                    .header("Metadata-Flavor", "Google")
                    .send()
                    .await
                    .map_err(|e| {
                        ClassifyError::authentication(format!(
                            "metadata server unreachable: {e}"
                        ))
                    })?;
                Self::read_token_response(response).await
            }
        }
    }

    async fn read_token_response(
        response: reqwest::Response,
    ) -> Result<CachedToken, ClassifyError> {
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!("Token endpoint returned {status}: {body}");
            return Err(ClassifyError::authentication(format!(
                "token endpoint returned {status}"
            )));
        }
        let token: TokenResponse = response.json().await.map_err(|e| {
            ClassifyError::authentication(format!("failed to parse token response: {e}"))
        })?;
        let lifetime = Duration::from_secs(token.expires_in).saturating_sub(EXPIRY_SKEW);
        Ok(CachedToken {
            value: token.access_token,
            expires_at: Instant::now() + lifetime,
        })
    }
}
