//! OAuth token management
//!
//! The grant type is decided once, from the configured credentials, when the
//! client is built. Afterwards [`TokenManager::ensure_token`] hands out a
//! bearer token, refreshing it when none is cached or the cached one expired.

use crate::client::transport::{HttpRequest, Transport};
use crate::config::AppConfig;
use crate::error::{RedditClientError, Result};
use log::{debug, info};
use reqwest::Method;
use serde::Deserialize;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use url::Url;

const INSTALLED_CLIENT_GRANT: &str = "https://oauth.reddit.com/grants/installed_client";
const DEFAULT_DEVICE_ID: &str = "DO_NOT_TRACK_THIS_DEVICE";

/// How new access tokens are obtained
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Credentials {
    /// A bare access token; it cannot be refreshed
    StaticToken,
    RefreshToken {
        client_id: String,
        client_secret: String,
        refresh_token: String,
    },
    Password {
        client_id: String,
        client_secret: String,
        username: String,
        password: String,
    },
    /// Application-only access for confidential clients
    ClientCredentials {
        client_id: String,
        client_secret: String,
    },
    /// Application-only access for installed apps
    InstalledClient { client_id: String, device_id: String },
}

impl Credentials {
    /// Pick the single grant the configuration describes, or fail fast
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let has_user = config.username.is_some() || config.password.is_some();
        let has_refresh = config.refresh_token.is_some();

        let client_id = match &config.client_id {
            Some(id) => id.clone(),
            None => {
                if config.client_secret.is_some() || has_user || has_refresh {
                    return Err(RedditClientError::InvalidCredentials(
                        "a client id is required to refresh tokens".to_string(),
                    ));
                }
                if config.access_token.is_some() {
                    return Ok(Credentials::StaticToken);
                }
                return Err(RedditClientError::InvalidCredentials(
                    "no access token or client credentials were supplied".to_string(),
                ));
            }
        };

        if has_refresh && has_user {
            return Err(RedditClientError::InvalidCredentials(
                "supply either a refresh token or a username/password pair, not both".to_string(),
            ));
        }

        if let Some(refresh_token) = &config.refresh_token {
            return Ok(Credentials::RefreshToken {
                client_id,
                client_secret: config.client_secret.clone().unwrap_or_default(),
                refresh_token: refresh_token.clone(),
            });
        }

        if has_user {
            return match (&config.username, &config.password, &config.client_secret) {
                (Some(username), Some(password), Some(client_secret)) => Ok(Credentials::Password {
                    client_id,
                    client_secret: client_secret.clone(),
                    username: username.clone(),
                    password: password.clone(),
                }),
                (_, _, None) => Err(RedditClientError::InvalidCredentials(
                    "the password grant requires a client secret".to_string(),
                )),
                _ => Err(RedditClientError::InvalidCredentials(
                    "username and password must be supplied together".to_string(),
                )),
            };
        }

        match &config.client_secret {
            Some(client_secret) if !client_secret.is_empty() => Ok(Credentials::ClientCredentials {
                client_id,
                client_secret: client_secret.clone(),
            }),
            _ => Ok(Credentials::InstalledClient {
                client_id,
                device_id: config
                    .device_id
                    .clone()
                    .unwrap_or_else(|| DEFAULT_DEVICE_ID.to_string()),
            }),
        }
    }

    pub fn can_refresh(&self) -> bool {
        !matches!(self, Credentials::StaticToken)
    }

    fn client_auth(&self) -> Option<(&str, &str)> {
        match self {
            Credentials::StaticToken => None,
            Credentials::RefreshToken {
                client_id,
                client_secret,
                ..
            }
            | Credentials::Password {
                client_id,
                client_secret,
                ..
            }
            | Credentials::ClientCredentials {
                client_id,
                client_secret,
            } => Some((client_id, client_secret)),
            Credentials::InstalledClient { client_id, .. } => Some((client_id, "")),
        }
    }

    fn grant_params(&self, scope: Option<&str>) -> Vec<(String, String)> {
        let mut params: Vec<(&str, &str)> = match self {
            Credentials::StaticToken => Vec::new(),
            Credentials::RefreshToken { refresh_token, .. } => vec![
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh_token.as_str()),
            ],
            Credentials::Password {
                username, password, ..
            } => vec![
                ("grant_type", "password"),
                ("username", username.as_str()),
                ("password", password.as_str()),
            ],
            Credentials::ClientCredentials { .. } => vec![("grant_type", "client_credentials")],
            Credentials::InstalledClient { device_id, .. } => vec![
                ("grant_type", INSTALLED_CLIENT_GRANT),
                ("device_id", device_id.as_str()),
            ],
        };
        if let (Some(scope), false) = (scope, matches!(self, Credentials::RefreshToken { .. })) {
            params.push(("scope", scope));
        }
        params
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }
}

/// Session-scoped token state
#[derive(Debug, Clone, Default)]
pub struct AuthState {
    pub access_token: Option<String>,
    pub expires_at: Option<Instant>,
    pub scope: Vec<String>,
}

/// A token handed to one request, with the expiry it had at hand-out time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerToken {
    pub value: String,
    pub expires_at: Option<Instant>,
}

impl BearerToken {
    /// Lifetime left at `now`; `None` when the expiry is unknown
    pub fn remaining_at(&self, now: Instant) -> Option<Duration> {
        self.expires_at
            .map(|expires_at| expires_at.saturating_duration_since(now))
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    expires_in: Option<u64>,
    scope: Option<String>,
    refresh_token: Option<String>,
    error: Option<serde_json::Value>,
    error_description: Option<String>,
}

pub struct TokenManager {
    credentials: Mutex<Credentials>,
    token_url: Url,
    scope: Option<String>,
    stale_threshold: Duration,
    state: Mutex<AuthState>,
}

impl TokenManager {
    pub fn new(config: &AppConfig) -> Result<Self> {
        let credentials = Credentials::from_config(config)?;
        let token_url = Url::parse(&config.token_url())?;

        let state = AuthState {
            access_token: config.access_token.clone(),
            expires_at: config
                .access_token
                .as_ref()
                .and(config.token_expires_in)
                .and_then(expiry_after),
            scope: Vec::new(),
        };

        debug!("Token manager configured for {}", grant_name(&credentials));

        Ok(Self {
            credentials: Mutex::new(credentials),
            token_url,
            scope: config.scope.clone(),
            stale_threshold: config.stale_token_threshold,
            state: Mutex::new(state),
        })
    }

    /// Return a usable bearer token, refreshing first if needed.
    ///
    /// The state lock is held across the refresh so concurrent callers that
    /// find the token expired wait for one refresh instead of issuing several.
    pub async fn ensure_token(&self, transport: &dyn Transport) -> Result<BearerToken> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        if let Some(value) = &state.access_token {
            let expired = state.expires_at.map_or(false, |expires_at| now > expires_at);
            if !expired {
                return Ok(BearerToken {
                    value: value.clone(),
                    expires_at: state.expires_at,
                });
            }
            debug!("Cached access token expired");
        }

        self.refresh(transport, &mut state).await
    }

    /// Drop the cached token so the next request refreshes, unless it is no longer `value`.
    /// Returns whether it was dropped.
    ///
    /// A concurrent caller may already have replaced a rejected token, and that
    /// replacement must survive.
    pub async fn invalidate_if_current(&self, value: &str) -> bool {
        let mut state = self.state.lock().await;
        if state.access_token.as_deref() != Some(value) {
            return false;
        }
        state.access_token = None;
        state.expires_at = None;
        true
    }

    /// A 401 on a token this close to expiry is a clock-skew race, not a credential failure
    pub fn is_stale_race(&self, token: &BearerToken, dispatched_at: Instant) -> bool {
        token
            .remaining_at(dispatched_at)
            .map_or(false, |remaining| remaining < self.stale_threshold)
    }

    pub async fn can_refresh(&self) -> bool {
        self.credentials.lock().await.can_refresh()
    }

    /// Snapshot of the current token state
    pub async fn state(&self) -> AuthState {
        self.state.lock().await.clone()
    }

    async fn refresh(&self, transport: &dyn Transport, state: &mut AuthState) -> Result<BearerToken> {
        let mut credentials = self.credentials.lock().await;
        let (client_id, client_secret) = match credentials.client_auth() {
            Some(auth) => auth,
            None => {
                return Err(RedditClientError::auth_failed(
                    "token_expired",
                    Some("the access token expired and no credentials were supplied to refresh it".to_string()),
                ))
            }
        };

        info!("Requesting a new access token ({})", grant_name(&credentials));

        let auth = base64::encode(format!("{}:{}", client_id, client_secret));
        let request = HttpRequest::new(Method::POST, self.token_url.clone())
            .header("Authorization", format!("Basic {}", auth))
            .form(credentials.grant_params(self.scope.as_deref()));

        let response = transport.send(request).await?;
        let parsed: Option<TokenResponse> = serde_json::from_str(&response.body).ok();

        let body = match parsed {
            Some(body) => body,
            None if !response.is_success() => {
                return Err(RedditClientError::auth_failed(
                    format!("token endpoint returned HTTP {}", response.status),
                    None,
                ))
            }
            None => {
                return Err(RedditClientError::malformed(
                    self.token_url.path(),
                    "token response is not JSON",
                ))
            }
        };

        if let Some(error) = &body.error {
            let error = match error {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(RedditClientError::auth_failed(error, body.error_description));
        }
        if !response.is_success() {
            return Err(RedditClientError::auth_failed(
                format!("token endpoint returned HTTP {}", response.status),
                body.error_description,
            ));
        }

        let access_token = body.access_token.ok_or_else(|| {
            RedditClientError::malformed(self.token_url.path(), "token response has no access_token")
        })?;

        if let (Some(new_refresh), Credentials::RefreshToken { refresh_token, .. }) =
            (body.refresh_token, &mut *credentials)
        {
            *refresh_token = new_refresh;
        }

        state.access_token = Some(access_token.clone());
        state.expires_at = body.expires_in.and_then(expiry_after);
        state.scope = body
            .scope
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        debug!("Access token refreshed with scopes: {:?}", state.scope);

        Ok(BearerToken {
            value: access_token,
            expires_at: state.expires_at,
        })
    }
}

/// Expiry instant `secs` from now; `None` (never expires) when it lies beyond the clock's range
fn expiry_after(secs: u64) -> Option<Instant> {
    Instant::now().checked_add(Duration::from_secs(secs))
}

fn grant_name(credentials: &Credentials) -> &'static str {
    match credentials {
        Credentials::StaticToken => "static token",
        Credentials::RefreshToken { .. } => "refresh_token grant",
        Credentials::Password { .. } => "password grant",
        Credentials::ClientCredentials { .. } => "client_credentials grant",
        Credentials::InstalledClient { .. } => "installed_client grant",
    }
}
