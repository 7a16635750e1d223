//! In-memory transport and fixtures shared by the integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use redpage::client::{HttpRequest, HttpResponse, Transport};
use redpage::{AppConfig, RedditClient, Result};
use serde_json::{json, Value};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

pub const TOKEN_HOST: &str = "www.reddit.com";

type Handler = Box<dyn Fn(&HttpRequest) -> HttpResponse + Send + Sync>;

/// Records every request and answers API calls from a handler closure.
/// Token requests get a fresh token unless the handler is told otherwise.
pub struct MockTransport {
    handler: Handler,
    token_handler: Mutex<Option<Handler>>,
    log: Mutex<Vec<(Instant, HttpRequest)>>,
}

impl MockTransport {
    pub fn new<F>(handler: F) -> Arc<Self>
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        Arc::new(Self {
            handler: Box::new(handler),
            token_handler: Mutex::new(None),
            log: Mutex::new(Vec::new()),
        })
    }

    /// Replay `responses` in order; once they run out every call gets a 500
    pub fn scripted(responses: Vec<HttpResponse>) -> Arc<Self> {
        let queue = Mutex::new(VecDeque::from(responses));
        Self::new(move |_| {
            queue
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| HttpResponse::new(500, "no scripted response left"))
        })
    }

    pub fn on_token<F>(&self, handler: F)
    where
        F: Fn(&HttpRequest) -> HttpResponse + Send + Sync + 'static,
    {
        *self.token_handler.lock().unwrap() = Some(Box::new(handler));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.log.lock().unwrap().iter().map(|(_, r)| r.clone()).collect()
    }

    /// Requests against the API, excluding the token endpoint
    pub fn api_requests(&self) -> Vec<HttpRequest> {
        self.requests().into_iter().filter(|r| !is_token_request(r)).collect()
    }

    pub fn token_requests(&self) -> Vec<HttpRequest> {
        self.requests().into_iter().filter(is_token_request).collect()
    }

    pub fn api_calls(&self) -> usize {
        self.api_requests().len()
    }

    pub fn token_calls(&self) -> usize {
        self.token_requests().len()
    }

    /// Instants at which API requests reached the transport
    pub fn api_dispatch_times(&self) -> Vec<Instant> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, r)| !is_token_request(r))
            .map(|(at, _)| *at)
            .collect()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        self.log.lock().unwrap().push((Instant::now(), request.clone()));
        if is_token_request(&request) {
            if let Some(handler) = self.token_handler.lock().unwrap().as_ref() {
                return Ok(handler(&request));
            }
            return Ok(token_response("fresh-token", 3600));
        }
        Ok((self.handler)(&request))
    }
}

pub fn is_token_request(request: &HttpRequest) -> bool {
    request.url.host_str() == Some(TOKEN_HOST)
}

pub fn bearer(request: &HttpRequest) -> Option<&str> {
    request
        .headers
        .iter()
        .find(|(name, _)| name == "Authorization")
        .and_then(|(_, value)| value.strip_prefix("Bearer "))
}

pub fn token_response(token: &str, expires_in: u64) -> HttpResponse {
    ok(json!({
        "access_token": token,
        "token_type": "bearer",
        "expires_in": expires_in,
        "scope": "read submit"
    }))
}

pub fn ok(body: Value) -> HttpResponse {
    HttpResponse::new(200, body.to_string())
}

pub fn status(code: u16) -> HttpResponse {
    HttpResponse::new(code, format!("{{\"message\": \"HTTP {}\"}}", code))
}

/// A bare access token that never expires
pub fn static_config() -> AppConfig {
    AppConfig {
        access_token: Some("test-token".to_string()),
        ..AppConfig::default()
    }
}

/// Refresh-token credentials with a pre-seeded access token
pub fn refreshable_config(token: &str, expires_in: Duration) -> AppConfig {
    AppConfig {
        client_id: Some("id".to_string()),
        client_secret: Some("secret".to_string()),
        refresh_token: Some("refresh".to_string()),
        access_token: Some(token.to_string()),
        token_expires_in: Some(expires_in.as_secs()),
        ..AppConfig::default()
    }
}

pub fn client(config: AppConfig, transport: &Arc<MockTransport>) -> RedditClient {
    RedditClient::with_transport(config, transport.clone()).unwrap()
}

pub fn post(id: &str) -> Value {
    json!({"kind": "t3", "data": {
        "id": id,
        "name": format!("t3_{}", id),
        "title": format!("post {}", id),
        "author": "poster",
        "subreddit": "rust",
        "created_utc": 1_700_000_000.0
    }})
}

pub fn comment(id: &str, parent: &str) -> Value {
    comment_with_replies(id, parent, json!(""))
}

pub fn comment_with_replies(id: &str, parent: &str, replies: Value) -> Value {
    json!({"kind": "t1", "data": {
        "id": id,
        "name": format!("t1_{}", id),
        "parent_id": parent,
        "link_id": "t3_post",
        "author": "commenter",
        "body": format!("comment {}", id),
        "score": 1,
        "replies": replies
    }})
}

pub fn message(id: &str) -> Value {
    json!({"kind": "t4", "data": {
        "id": id,
        "name": format!("t4_{}", id),
        "author": "sender",
        "subject": format!("subject {}", id),
        "body": format!("message {}", id)
    }})
}

pub fn more(name: &str, parent: &str, children: &[&str]) -> Value {
    json!({"kind": "more", "data": {
        "name": name,
        "id": name.trim_start_matches("t1_"),
        "parent_id": parent,
        "count": children.len(),
        "depth": 0,
        "children": children
    }})
}

pub fn listing(children: Vec<Value>, after: Option<&str>, before: Option<&str>) -> Value {
    json!({"kind": "Listing", "data": {
        "after": after,
        "before": before,
        "dist": children.len(),
        "children": children
    }})
}

/// Body of `comments/{id}`: the submission followed by its comment listing
pub fn comments_page(post_id: &str, comments: Vec<Value>) -> Value {
    json!([
        listing(vec![post(post_id)], None, None),
        listing(comments, None, None)
    ])
}

/// Body of `api/morechildren`
pub fn more_children(things: Vec<Value>) -> Value {
    json!({"json": {"errors": [], "data": {"things": things}}})
}

pub fn names<'a, I, T>(items: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a T>,
    T: redpage::RedditContent + 'a,
{
    items.into_iter().map(|item| item.name().to_string()).collect()
}

pub fn query(request: &HttpRequest, key: &str) -> Option<String> {
    request.query_param(key)
}
