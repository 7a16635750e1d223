//! Reddit API client
//!
//! [`RedditClient::execute`] is the single path every API call takes:
//! rate gate, bearer token, transport, rate-limit bookkeeping, then the
//! response materializer. Transient failures on idempotent requests are
//! retried with exponential backoff, and a 401 caused by a token that expired
//! in flight is retried once with a fresh token.

pub mod auth;
pub mod rate_gate;
pub mod transport;

pub use auth::{AuthState, BearerToken, Credentials, TokenManager};
pub use rate_gate::{RateGate, RateWindow};
pub use transport::{HttpRequest, HttpResponse, ReqwestTransport, Transport};

use crate::config::AppConfig;
use crate::error::{RedditClientError, Result};
use crate::models::{
    listing_from_node, materialize, Listing, ModAction, Node, PageTransform, Submission, Thing,
};
use log::{debug, info, warn};
use rand::Rng;
use reqwest::Method;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use url::Url;

/// One call against the OAuth API, relative to `https://oauth.reddit.com/`
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    pub uri: String,
    pub query: BTreeMap<String, String>,
    pub form: Vec<(String, String)>,
}

impl ApiRequest {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            query: BTreeMap::new(),
            form: Vec::new(),
        }
    }

    pub fn get(uri: impl Into<String>) -> Self {
        Self::new(Method::GET, uri)
    }

    pub fn post(uri: impl Into<String>) -> Self {
        Self::new(Method::POST, uri)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    pub fn queries(mut self, query: BTreeMap<String, String>) -> Self {
        self.query.extend(query);
        self
    }

    pub fn form(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.push((key.into(), value.into()));
        self
    }

    /// Only these methods may be repeated without duplicating side effects
    pub fn is_idempotent(&self) -> bool {
        matches!(
            self.method,
            Method::GET | Method::HEAD | Method::PUT | Method::DELETE
        )
    }
}

struct ClientInner {
    config: AppConfig,
    transport: Arc<dyn Transport>,
    gate: RateGate,
    auth: TokenManager,
    base_url: Url,
}

/// Cheap to clone; clones share the rate window and the token
#[derive(Clone)]
pub struct RedditClient {
    inner: Arc<ClientInner>,
}

impl RedditClient {
    /// Build a client that talks to Reddit over HTTPS
    pub fn new(config: AppConfig) -> Result<Self> {
        debug!(
            "Creating RedditClient with user_agent: {}",
            config.user_agent
        );
        let transport = ReqwestTransport::new(&config.user_agent, config.request_timeout)?;
        Self::with_transport(config, Arc::new(transport))
    }

    /// Build a client on top of any transport
    pub fn with_transport(config: AppConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let auth = TokenManager::new(&config)?;
        let gate = RateGate::new(&config);
        let base_url = Url::parse(&config.oauth_base_url())?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                config,
                transport,
                gate,
                auth,
                base_url,
            }),
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    pub async fn rate_window(&self) -> RateWindow {
        self.inner.gate.window().await
    }

    pub async fn auth_state(&self) -> AuthState {
        self.inner.auth.state().await
    }

    /// Run one request through the full pipeline and materialize the response
    pub async fn execute(&self, request: ApiRequest) -> Result<Node> {
        let max_attempts = self.inner.config.max_retry_attempts.max(1);
        let mut attempt: u32 = 1;
        let mut stale_retry_spent = false;

        loop {
            self.inner.gate.admit().await?;
            let token = self
                .inner
                .auth
                .ensure_token(self.inner.transport.as_ref())
                .await?;

            let http_request = self.build_request(&request, &token)?;
            let dispatched_at = Instant::now();
            debug!("{} {} (attempt {})", request.method, request.uri, attempt);
            let response = self.inner.transport.send(http_request).await?;
            self.inner.gate.observe(&response).await;

            if response.is_success() {
                return self.materialize_response(&request, response);
            }
            let status = response.status;

            if status == 401
                && !stale_retry_spent
                && self.inner.auth.is_stale_race(&token, dispatched_at)
                && self.inner.auth.can_refresh().await
            {
                warn!(
                    "401 from {} with a token about to expire; refreshing and retrying",
                    request.uri
                );
                stale_retry_spent = true;
                if !self.inner.auth.invalidate_if_current(&token.value).await {
                    debug!("Token already replaced by a concurrent refresh");
                }
                continue;
            }

            if self.inner.config.retry_error_codes.contains(&status) {
                if request.is_idempotent() && attempt < max_attempts {
                    let delay = backoff_delay(attempt);
                    info!(
                        "{} returned {}; retrying in {:?} (attempt {} of {})",
                        request.uri,
                        status,
                        delay,
                        attempt + 1,
                        max_attempts
                    );
                    sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                return Err(RedditClientError::TransientServerError {
                    status,
                    endpoint: request.uri.clone(),
                    attempts: attempt,
                });
            }

            return Err(RedditClientError::ApiError {
                status,
                endpoint: request.uri.clone(),
                body: response.body,
            });
        }
    }

    fn build_request(&self, request: &ApiRequest, token: &BearerToken) -> Result<HttpRequest> {
        let mut url = self
            .inner
            .base_url
            .join(request.uri.trim_start_matches('/'))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("raw_json", "1");
            for (key, value) in &request.query {
                pairs.append_pair(key, value);
            }
        }

        let mut http_request = HttpRequest::new(request.method.clone(), url)
            .header("Authorization", format!("Bearer {}", token.value));
        if !request.form.is_empty() {
            http_request = http_request.form(request.form.clone());
        }
        Ok(http_request)
    }

    fn materialize_response(&self, request: &ApiRequest, response: HttpResponse) -> Result<Node> {
        if response.body.trim().is_empty() {
            return Ok(Node::Null);
        }
        let value: serde_json::Value = serde_json::from_str(&response.body).map_err(|e| {
            RedditClientError::malformed(&request.uri, format!("invalid JSON: {}", e))
        })?;

        let mut node = materialize(value);
        if request.method == Method::GET {
            if let Node::Thing(thing) = &mut node {
                if let Thing::Listing(listing) = &mut **thing {
                    listing.set_source(request.uri.clone(), request.query.clone());
                }
            }
        }
        Ok(node)
    }

    /// First page of any listing endpoint
    pub async fn get_listing(
        &self,
        uri: &str,
        query: BTreeMap<String, String>,
    ) -> Result<Listing<Thing>> {
        let node = self.execute(ApiRequest::get(uri).queries(query)).await?;
        listing_from_node(node, uri)
    }

    /// Look up things by fullname, at most 100 per call
    pub async fn get_info(&self, fullnames: &[&str]) -> Result<Listing<Thing>> {
        let mut query = BTreeMap::new();
        query.insert("id".to_string(), fullnames.join(","));
        self.get_listing("api/info", query).await
    }

    pub async fn get_new(&self, subreddit: Option<&str>) -> Result<Listing<Submission>> {
        let uri = match subreddit {
            Some(name) => format!("r/{}/new", name),
            None => "new".to_string(),
        };
        Ok(self.get_listing(&uri, BTreeMap::new()).await?.cast())
    }

    pub async fn get_hot(&self, subreddit: Option<&str>) -> Result<Listing<Submission>> {
        let uri = match subreddit {
            Some(name) => format!("r/{}/hot", name),
            None => "hot".to_string(),
        };
        Ok(self.get_listing(&uri, BTreeMap::new()).await?.cast())
    }

    /// Inbox items; comment replies and mentions arrive as comments beside the messages
    pub async fn get_inbox(&self) -> Result<Listing<Thing>> {
        self.get_listing("message/inbox", BTreeMap::new()).await
    }

    pub async fn get_moderation_log(&self, subreddit: &str) -> Result<Listing<ModAction>> {
        let uri = format!("r/{}/about/log", subreddit);
        Ok(self.get_listing(&uri, BTreeMap::new()).await?.cast())
    }

    /// Other submissions linking to the same URL
    pub async fn get_duplicates(&self, submission_id: &str) -> Result<Listing<Submission>> {
        let uri = format!("duplicates/{}", submission_id);
        let transform = PageTransform::ArrayElement(1);
        let node = self.execute(ApiRequest::get(&uri)).await?;
        Ok(transform
            .apply(node, &uri)?
            .with_source(uri, BTreeMap::new())
            .with_transform(transform)
            .cast())
    }

    /// A submission with its comment tree attached
    pub async fn get_submission(&self, id: &str) -> Result<Submission> {
        let uri = format!("comments/{}", id);
        match self.execute(ApiRequest::get(&uri)).await?.into_thing() {
            Some(Thing::Submission(submission)) => Ok(submission),
            _ => Err(RedditClientError::malformed(
                uri,
                "expected a submission followed by its comments",
            )),
        }
    }
}

/// `2^(attempt-1)` seconds, skewed slightly towards shorter waits
fn backoff_delay(attempt: u32) -> Duration {
    let base = 2f64.powi(attempt.saturating_sub(1).min(16) as i32);
    let jitter: f64 = rand::thread_rng().gen_range(-0.25..0.05);
    Duration::from_secs_f64(base * (1.0 + jitter))
}

/// Fail with [`RedditClientError::RedditErrors`] when `json.errors` is not empty
pub fn check_json_errors(node: &Node, endpoint: &str) -> Result<()> {
    let errors = node
        .get("json")
        .and_then(|json| json.get("errors"))
        .and_then(Node::as_array)
        .unwrap_or_default();
    if errors.is_empty() {
        return Ok(());
    }

    let errors = errors
        .iter()
        .map(|error| match error {
            Node::Array(parts) => parts
                .iter()
                .filter_map(Node::as_str)
                .collect::<Vec<_>>()
                .join(": "),
            other => other.to_plain().to_string(),
        })
        .collect();
    Err(RedditClientError::RedditErrors {
        endpoint: endpoint.to_string(),
        errors,
    })
}
