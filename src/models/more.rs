//! Comment stub expansion
//!
//! Reddit truncates large comment trees and leaves a `more` object in place of
//! the missing children. A [`MoreStub`] resolves them in one of two ways:
//!
//! * flat: `api/info` with up to 100 fullnames per request, chunks in flight
//!   together. Fast, but the returned comments carry no replies.
//! * tree: `api/morechildren` with up to 20 ids per request, strictly one
//!   request at a time. The response is a flat list that is stitched back into
//!   a tree; nested stubs the server leaves behind at the top level are
//!   expanded before the next chunk is requested.

use super::{strip_kind, Content, Listing, Node, Thing};
use crate::client::{check_json_errors, ApiRequest, RedditClient};
use crate::error::{RedditClientError, Result};
use futures_util::future::{try_join_all, BoxFuture, FutureExt};
use log::debug;
use serde::Serialize;
use serde_json::Value;
use std::collections::{HashMap, HashSet};

/// Name of the marker Reddit emits for a "continue this thread" link
pub const CONTINUE_THREAD_NAME: &str = "t1__";

/// Fullnames accepted by one `api/info` request
pub const MAX_API_INFO_AMOUNT: usize = 100;

/// Ids accepted by one `api/morechildren` request
pub const MAX_API_MORECHILDREN_AMOUNT: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MoreStub {
    pub name: String,
    pub count: u64,
    /// Ids still to fetch, without kind prefix
    #[serde(rename = "children")]
    pub child_ids: Vec<String>,
    pub parent_id: Option<String>,
    /// Submission the truncated tree belongs to
    #[serde(rename = "link_id")]
    pub root_id: Option<String>,
    pub depth: u64,
}

impl MoreStub {
    pub fn from_content(content: &Content) -> Self {
        let child_ids = content
            .get("children")
            .and_then(Node::as_array)
            .map(|children| {
                children
                    .iter()
                    .filter_map(Node::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Self {
            name: content.name().to_string(),
            count: content.get_i64("count").unwrap_or_default().max(0) as u64,
            child_ids,
            parent_id: content.get_str("parent_id").map(str::to_string),
            root_id: content.get_str("link_id").map(str::to_string),
            depth: content.get_i64("depth").unwrap_or_default().max(0) as u64,
        }
    }

    /// A "continue this thread" marker rather than a list of ids
    pub fn is_continuation(&self) -> bool {
        self.name == CONTINUE_THREAD_NAME && self.child_ids.is_empty()
    }

    pub fn is_resolved(&self) -> bool {
        self.child_ids.is_empty() && !self.is_continuation()
    }

    pub fn remaining(&self) -> usize {
        self.child_ids.len()
    }

    /// Forget the first `amount` ids once they have been fetched
    pub fn drain(&mut self, amount: usize) {
        let amount = amount.min(self.child_ids.len());
        self.child_ids.drain(..amount);
        self.count = self.count.saturating_sub(amount as u64);
    }

    pub fn to_plain_object(&self) -> Value {
        serde_json::to_value(self).unwrap_or_default()
    }

    /// Resolve the first `amount` child ids, preserving their order
    pub fn fetch_more<'a>(
        &'a self,
        client: &'a RedditClient,
        amount: usize,
        skip_replies: bool,
    ) -> BoxFuture<'a, Result<Vec<Thing>>> {
        async move {
            let ids: Vec<String> = self.child_ids.iter().take(amount).cloned().collect();
            if ids.is_empty() {
                return Ok(Vec::new());
            }
            debug!(
                "Expanding {} of {} children under {:?}",
                ids.len(),
                self.child_ids.len(),
                self.parent_id
            );

            if skip_replies {
                self.fetch_flat(client, ids).await
            } else {
                self.fetch_tree(client, ids).await
            }
        }
        .boxed()
    }

    async fn fetch_flat(&self, client: &RedditClient, ids: Vec<String>) -> Result<Vec<Thing>> {
        let prefix = self.child_prefix();
        let fullnames: Vec<String> = ids
            .iter()
            .map(|id| {
                if id.contains('_') {
                    id.clone()
                } else {
                    format!("{}{}", prefix, id)
                }
            })
            .collect();

        let requests = fullnames
            .chunks(MAX_API_INFO_AMOUNT)
            .map(move |chunk| async move {
                let names: Vec<&str> = chunk.iter().map(String::as_str).collect();
                let listing = client.get_info(&names).await?;
                Ok::<_, RedditClientError>(in_requested_order(listing.into_items(), chunk))
            });
        let pages = try_join_all(requests).await?;
        Ok(pages.into_iter().flatten().collect())
    }

    async fn fetch_tree(&self, client: &RedditClient, ids: Vec<String>) -> Result<Vec<Thing>> {
        let link_id = self
            .root_id
            .as_deref()
            .or(self.parent_id.as_deref())
            .ok_or_else(|| {
                RedditClientError::InvalidMethodCall(format!(
                    "comment stub {} has no root submission",
                    self.name
                ))
            })?;

        let mut resolved = Vec::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_API_MORECHILDREN_AMOUNT) {
            let request = ApiRequest::get("api/morechildren")
                .query("api_type", "json")
                .query("children", chunk.join(","))
                .query("link_id", link_id);
            let node = client.execute(request).await?;
            check_json_errors(&node, "api/morechildren")?;

            let things = things_of(node)?;
            let roots = build_replies_tree(things, self.root_id.as_deref());

            let mut expanded = Vec::with_capacity(roots.len());
            for root in roots {
                match root {
                    Thing::More(mut nested) => {
                        if nested.root_id.is_none() {
                            nested.root_id = self.root_id.clone();
                        }
                        expanded.extend(nested.fetch_everything(client).await?);
                    }
                    other => expanded.push(other),
                }
            }

            let position: HashMap<&str, usize> = chunk
                .iter()
                .enumerate()
                .map(|(index, id)| (id.as_str(), index))
                .collect();
            expanded.sort_by_key(|thing| {
                position
                    .get(strip_kind(thing.name()))
                    .copied()
                    .unwrap_or(usize::MAX)
            });
            resolved.extend(expanded);
        }
        Ok(resolved)
    }

    /// Expand a stub the server returned in place of part of a chunk
    async fn fetch_everything(&self, client: &RedditClient) -> Result<Vec<Thing>> {
        if self.is_continuation() {
            let replies = self.fetch_continuation(client).await?;
            return Ok(replies.fetch_all(client).await?.into_items());
        }
        self.fetch_more(client, usize::MAX, false).await
    }

    /// Load the replies hidden behind a "continue this thread" marker
    pub async fn fetch_continuation(&self, client: &RedditClient) -> Result<Listing<Thing>> {
        let (Some(root), Some(parent)) = (self.root_id.as_deref(), self.parent_id.as_deref())
        else {
            return Err(RedditClientError::InvalidMethodCall(
                "continuation marker without root and parent".to_string(),
            ));
        };

        let uri = format!("comments/{}", strip_kind(root));
        let node = client
            .execute(ApiRequest::get(&uri).query("comment", strip_kind(parent)))
            .await?;
        let Some(Thing::Submission(submission)) = node.into_thing() else {
            return Err(RedditClientError::malformed(uri, "expected a submission with comments"));
        };

        let focused = submission
            .comments
            .unwrap_or_default()
            .into_items()
            .into_iter()
            .find(|thing| thing.name() == parent);
        match focused {
            Some(Thing::Comment(comment)) => Ok(comment.replies),
            _ => {
                let mut empty = Listing::new();
                empty.mark_comment_list();
                Ok(empty)
            }
        }
    }

    fn child_prefix(&self) -> &'static str {
        if self.parent_id.as_deref().map_or(false, |p| p.starts_with("t4_")) {
            "t4_"
        } else {
            "t1_"
        }
    }
}

fn in_requested_order(items: Vec<Thing>, requested: &[String]) -> Vec<Thing> {
    let mut by_name: HashMap<String, Thing> = items
        .into_iter()
        .map(|thing| (thing.name().to_string(), thing))
        .collect();
    requested
        .iter()
        .filter_map(|name| by_name.remove(name))
        .collect()
}

/// `json.data.things` of a morechildren response
fn things_of(mut node: Node) -> Result<Vec<Thing>> {
    let things = node
        .take("json")
        .and_then(|mut json| json.take("data"))
        .and_then(|mut data| data.take("things"));
    match things {
        Some(Node::Array(items)) => Ok(items.into_iter().filter_map(Node::into_thing).collect()),
        _ => Err(RedditClientError::malformed(
            "api/morechildren",
            "missing json.data.things",
        )),
    }
}

/// Attach each item to its parent when the parent is part of the same batch
///
/// Reddit lists descendants after their ancestors, so walking the batch
/// backwards sees every child before its parent. Returns the items whose
/// parent is outside the batch, in batch order.
pub(crate) fn build_replies_tree(things: Vec<Thing>, root_id: Option<&str>) -> Vec<Thing> {
    let known: HashSet<String> = things
        .iter()
        .filter(|thing| thing.replies().is_some())
        .map(|thing| thing.name().to_string())
        .collect();

    let mut children: HashMap<String, (Vec<Thing>, Option<MoreStub>)> = HashMap::new();
    let mut roots = Vec::new();

    for mut thing in things.into_iter().rev() {
        if let Some((mut adopted, more)) = children.remove(thing.name()) {
            let root = thing.link_id().or(root_id).map(str::to_string);
            if let Some(replies) = thing.replies_mut() {
                adopted.reverse();
                replies.prepend_items(adopted);
                if let Some(mut more) = more {
                    if more.root_id.is_none() {
                        more.root_id = root;
                    }
                    replies.set_more(more);
                }
            }
        }

        let parent = thing
            .parent_id()
            .filter(|parent| known.contains(*parent))
            .map(str::to_string);
        match parent {
            Some(parent) => {
                let entry = children.entry(parent).or_default();
                match thing {
                    Thing::More(more) => entry.1 = Some(more),
                    other => entry.0.push(other),
                }
            }
            None => roots.push(thing),
        }
    }

    roots.reverse();
    roots
}
