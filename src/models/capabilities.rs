//! Actions shared by several content types
//!
//! Each capability is a small trait with default methods; a content type opts
//! in by implementing the trait, nothing else is required beyond
//! [`RedditContent::name`].

use super::{Comment, Node, PrivateMessage, RedditContent, Submission, Thing};
use crate::client::{check_json_errors, ApiRequest, RedditClient};
use crate::error::{RedditClientError, Result};
use async_trait::async_trait;
use log::debug;

#[async_trait]
pub trait Votable: RedditContent + Sync {
    /// `direction` is 1 (up), -1 (down) or 0 (clear)
    async fn vote(&self, client: &RedditClient, direction: i8) -> Result<()> {
        if !(-1..=1).contains(&direction) {
            return Err(RedditClientError::InvalidMethodCall(format!(
                "vote direction must be -1, 0 or 1, got {}",
                direction
            )));
        }
        debug!("Voting {} on {}", direction, self.name());
        client
            .execute(
                ApiRequest::post("api/vote")
                    .form("dir", direction.to_string())
                    .form("id", self.name()),
            )
            .await?;
        Ok(())
    }

    async fn upvote(&self, client: &RedditClient) -> Result<()> {
        self.vote(client, 1).await
    }

    async fn downvote(&self, client: &RedditClient) -> Result<()> {
        self.vote(client, -1).await
    }

    async fn unvote(&self, client: &RedditClient) -> Result<()> {
        self.vote(client, 0).await
    }
}

#[async_trait]
pub trait Replyable: RedditContent + Sync {
    /// Post a reply and return the created comment or message
    ///
    /// Needs a user grant with the `submit` scope; application-only tokens are refused by Reddit.
    async fn reply(&self, client: &RedditClient, text: &str) -> Result<Thing> {
        let mut node = client
            .execute(
                ApiRequest::post("api/comment")
                    .form("api_type", "json")
                    .form("thing_id", self.name())
                    .form("text", text),
            )
            .await?;
        check_json_errors(&node, "api/comment")?;

        let things = node
            .take("json")
            .and_then(|mut json| json.take("data"))
            .and_then(|mut data| data.take("things"));
        match things {
            Some(Node::Array(items)) => items
                .into_iter()
                .find_map(Node::into_thing)
                .ok_or_else(|| RedditClientError::malformed("api/comment", "no created thing returned")),
            _ => Err(RedditClientError::malformed(
                "api/comment",
                "missing json.data.things",
            )),
        }
    }
}

#[async_trait]
pub trait Removable: RedditContent + Sync {
    /// Remove as a moderator, optionally training the spam filter
    async fn remove(&self, client: &RedditClient, spam: bool) -> Result<()> {
        client
            .execute(
                ApiRequest::post("api/remove")
                    .form("id", self.name())
                    .form("spam", spam.to_string()),
            )
            .await?;
        Ok(())
    }

    async fn approve(&self, client: &RedditClient) -> Result<()> {
        client
            .execute(ApiRequest::post("api/approve").form("id", self.name()))
            .await?;
        Ok(())
    }
}

impl Votable for Comment {}
impl Replyable for Comment {}
impl Removable for Comment {}

impl Votable for Submission {}
impl Replyable for Submission {}
impl Removable for Submission {}

impl Replyable for PrivateMessage {}
impl Removable for PrivateMessage {}
