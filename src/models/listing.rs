//! Cursor pager over a remote collection
//!
//! A [`Listing`] wraps the items materialized so far together with everything
//! needed to fetch the next page: the source URI and query, the `before` and
//! `after` cursors, the comment stub for reply listings and a lookahead buffer
//! holding items a previous page over-delivered.
//!
//! Growing a listing never mutates it; [`Listing::fetch_more`] returns a new
//! listing and leaves the receiver as a stable snapshot.

use super::{listing_from_node, Comment, ModAction, MoreStub, Node, PrivateMessage, Submission, Thing};
use crate::client::{ApiRequest, RedditClient};
use crate::error::Result;
use log::debug;
use std::collections::BTreeMap;
use std::ops::Index;

/// Largest `limit` the listing endpoints honour; anything above is silently replaced by a small default
pub const MAX_LISTING_LIMIT: usize = 100;

/// Sent as `count` so the server also returns a `before` cursor
const LISTING_COUNT: &str = "9999";

const PAGING_KEYS: [&str; 4] = ["limit", "count", "after", "before"];

/// Element types a listing can hold
pub trait ListingItem: Clone + Send + Sync + 'static {
    fn from_thing(thing: Thing) -> Option<Self>;
}

impl ListingItem for Thing {
    fn from_thing(thing: Thing) -> Option<Self> {
        Some(thing)
    }
}

impl ListingItem for Comment {
    fn from_thing(thing: Thing) -> Option<Self> {
        match thing {
            Thing::Comment(comment) => Some(comment),
            _ => None,
        }
    }
}

impl ListingItem for Submission {
    fn from_thing(thing: Thing) -> Option<Self> {
        match thing {
            Thing::Submission(submission) => Some(submission),
            _ => None,
        }
    }
}

impl ListingItem for PrivateMessage {
    fn from_thing(thing: Thing) -> Option<Self> {
        match thing {
            Thing::Message(message) => Some(message),
            _ => None,
        }
    }
}

impl ListingItem for ModAction {
    fn from_thing(thing: Thing) -> Option<Self> {
        match thing {
            Thing::ModAction(action) => Some(action),
            _ => None,
        }
    }
}

/// How to find the listing inside a raw page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PageTransform {
    /// The page is the listing
    #[default]
    Identity,
    /// The page is an array and the listing is one of its elements
    ArrayElement(usize),
}

impl PageTransform {
    pub fn apply(&self, node: Node, endpoint: &str) -> Result<Listing<Thing>> {
        match (self, node) {
            (PageTransform::Identity, node) => listing_from_node(node, endpoint),
            (PageTransform::ArrayElement(index), Node::Array(items)) => {
                let element = items.into_iter().nth(*index).unwrap_or(Node::Null);
                listing_from_node(element, endpoint)
            }
            // a two-element page the materializer already merged into one submission
            (PageTransform::ArrayElement(index), Node::Thing(thing)) => match *thing {
                Thing::Submission(submission) => {
                    let (submission, rest) = submission.into_parts();
                    if *index == 0 {
                        return Ok(Listing::from_page(vec![Thing::Submission(submission)], None, None));
                    }
                    let rest = rest.unwrap_or_default();
                    let (before, after) = (rest.before.clone(), rest.after.clone());
                    Ok(Listing::from_page(rest.into_items(), before, after))
                }
                other => listing_from_node(Node::thing(other), endpoint),
            },
            (PageTransform::ArrayElement(_), other) => listing_from_node(other, endpoint),
        }
    }
}

/// Expansion state of a reply listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyState {
    /// Only a stub; no reply has been materialized yet
    Unexpanded,
    PartiallyExpanded,
    FullyExpanded,
}

/// Arguments of [`Listing::fetch_more`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchOptions {
    pub amount: usize,
    /// Resolve comment stubs through the bulk lookup; the results carry no replies
    pub skip_replies: bool,
    /// Keep the items already in the listing
    pub append: bool,
}

impl FetchOptions {
    pub fn new(amount: usize) -> Self {
        Self {
            amount,
            skip_replies: false,
            append: true,
        }
    }

    pub fn all() -> Self {
        Self::new(usize::MAX)
    }

    pub fn skip_replies(mut self, skip_replies: bool) -> Self {
        self.skip_replies = skip_replies;
        self
    }

    pub fn append(mut self, append: bool) -> Self {
        self.append = append;
        self
    }
}

impl From<usize> for FetchOptions {
    fn from(amount: usize) -> Self {
        FetchOptions::new(amount)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Listing<T = Thing> {
    items: Vec<T>,
    before: Option<String>,
    after: Option<String>,
    uri: Option<String>,
    query: BTreeMap<String, String>,
    transform: PageTransform,
    is_comment_list: bool,
    more: Option<MoreStub>,
    lookahead: Vec<T>,
    /// Lookahead items precede the listing rather than follow it
    lookahead_backward: bool,
    /// At least one page has been seen; cursors mean nothing before that
    started: bool,
}

impl<T> Default for Listing<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            before: None,
            after: None,
            uri: None,
            query: BTreeMap::new(),
            transform: PageTransform::Identity,
            is_comment_list: false,
            more: None,
            lookahead: Vec::new(),
            lookahead_backward: false,
            started: false,
        }
    }
}

impl<T> Listing<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty listing that fetches its first page from `uri`
    pub fn placeholder(uri: impl Into<String>, query: BTreeMap<String, String>) -> Self {
        let mut listing = Self::new();
        listing.before = query.get("before").cloned();
        listing.after = query.get("after").cloned();
        listing.set_source(uri, query);
        listing
    }

    /// A listing holding one page that was already received
    pub fn from_page(items: Vec<T>, before: Option<String>, after: Option<String>) -> Self {
        Self {
            items,
            before,
            after,
            started: true,
            ..Self::default()
        }
    }

    pub fn with_source(mut self, uri: impl Into<String>, query: BTreeMap<String, String>) -> Self {
        self.set_source(uri, query);
        self
    }

    /// Remember the request template used for later pages
    pub fn set_source(&mut self, uri: impl Into<String>, mut query: BTreeMap<String, String>) {
        for key in PAGING_KEYS {
            query.remove(key);
        }
        self.uri = Some(uri.into());
        self.query = query;
    }

    pub fn with_transform(mut self, transform: PageTransform) -> Self {
        self.transform = transform;
        self
    }

    pub fn set_more(&mut self, more: MoreStub) {
        self.more = Some(more);
        self.is_comment_list = true;
    }

    pub(crate) fn mark_comment_list(&mut self) {
        self.is_comment_list = true;
    }

    pub(crate) fn prepend_items(&mut self, mut items: Vec<T>) {
        items.append(&mut self.items);
        self.items = items;
    }

    pub fn items(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }

    pub fn before(&self) -> Option<&str> {
        self.before.as_deref()
    }

    pub fn after(&self) -> Option<&str> {
        self.after.as_deref()
    }

    pub fn uri(&self) -> Option<&str> {
        self.uri.as_deref()
    }

    pub fn query(&self) -> &BTreeMap<String, String> {
        &self.query
    }

    pub fn is_comment_list(&self) -> bool {
        self.is_comment_list
    }

    pub fn more(&self) -> Option<&MoreStub> {
        self.more.as_ref()
    }

    pub(crate) fn more_mut(&mut self) -> Option<&mut MoreStub> {
        self.more.as_mut()
    }

    /// Items already fetched but not surfaced yet
    pub fn buffered(&self) -> usize {
        self.lookahead.len()
    }

    pub fn is_finished(&self) -> bool {
        if !self.lookahead.is_empty() {
            return false;
        }
        if self.is_comment_list {
            return self.more.as_ref().map_or(true, MoreStub::is_resolved);
        }
        match self.uri {
            None => true,
            Some(_) => self.started && self.before.is_none() && self.after.is_none(),
        }
    }

    pub fn reply_state(&self) -> ReplyState {
        let pending = !self.lookahead.is_empty()
            || self.more.as_ref().map_or(false, |more| !more.is_resolved());
        match (pending, self.items.is_empty()) {
            (false, _) => ReplyState::FullyExpanded,
            (true, true) => ReplyState::Unexpanded,
            (true, false) => ReplyState::PartiallyExpanded,
        }
    }

    fn is_backward(&self) -> bool {
        self.after.is_none() && self.before.is_some()
    }

    /// Move up to `amount` buffered items into the listing
    fn drain_lookahead(&mut self, amount: usize) -> usize {
        let take = amount.min(self.lookahead.len());
        if self.lookahead_backward {
            let split = self.lookahead.len() - take;
            let mut moved = self.lookahead.split_off(split);
            moved.append(&mut self.items);
            self.items = moved;
        } else {
            self.items.extend(self.lookahead.drain(..take));
        }
        take
    }
}

impl<T: ListingItem> Listing<T> {
    /// Fetch up to `amount` further items into a copy of this listing
    pub async fn fetch_more(
        &self,
        client: &RedditClient,
        options: impl Into<FetchOptions>,
    ) -> Result<Self> {
        let options = options.into();
        let mut next = self.clone();
        if !options.append {
            next.items.clear();
        }

        let mut remaining = options.amount;
        while remaining > 0 && !next.is_finished() {
            let cursors = (next.before.clone(), next.after.clone());
            let progress = if !next.lookahead.is_empty() {
                next.drain_lookahead(remaining)
            } else if next.is_comment_list {
                next.fetch_comment_page(client, remaining, options.skip_replies)
                    .await?
            } else {
                next.fetch_page(client, remaining).await?
            };

            // a page of other kinds still moves the cursors on
            if progress == 0 && (next.before.clone(), next.after.clone()) == cursors {
                break;
            }
            remaining = remaining.saturating_sub(progress);
        }
        Ok(next)
    }

    /// Fetch every remaining item
    pub async fn fetch_all(&self, client: &RedditClient) -> Result<Self> {
        self.fetch_more(client, FetchOptions::all()).await
    }

    /// One request against the source URI; returns how many items of `T` it delivered
    async fn fetch_page(&mut self, client: &RedditClient, remaining: usize) -> Result<usize> {
        let Some(uri) = self.uri.clone() else {
            return Ok(0);
        };
        let backward = self.is_backward();
        let limit = remaining.min(MAX_LISTING_LIMIT);

        let mut request = ApiRequest::get(&uri)
            .queries(self.query.clone())
            .query("limit", limit.to_string())
            .query("count", LISTING_COUNT);
        request = match (backward, &self.before, &self.after) {
            (true, Some(before), _) => request.query("before", before),
            (false, _, Some(after)) => request.query("after", after),
            _ => request,
        };

        let node = client.execute(request).await?;
        let page = self.transform.apply(node, &uri)?;
        let (page_before, page_after) = (page.before.clone(), page.after.clone());
        let raw = page.len();
        let mut items: Vec<T> = page.into_items().into_iter().filter_map(T::from_thing).collect();
        let received = items.len();
        self.started = true;
        debug!(
            "Listing page from {} delivered {} items ({} kept)",
            uri, raw, received
        );

        if raw == 0 {
            self.before = None;
            self.after = None;
            return Ok(0);
        }

        let take = received.min(remaining);
        if backward {
            let mut used = items.split_off(received - take);
            used.append(&mut self.items);
            self.items = used;
            self.lookahead = items;
            self.lookahead_backward = true;
            self.before = page_before;
            self.after = None;
        } else {
            self.lookahead = items.split_off(take);
            self.lookahead_backward = false;
            self.items.append(&mut items);
            self.after = page_after;
            self.before = None;
        }
        Ok(received)
    }

    /// Resolve part of the attached stub; returns how many identifiers were consumed
    async fn fetch_comment_page(
        &mut self,
        client: &RedditClient,
        remaining: usize,
        skip_replies: bool,
    ) -> Result<usize> {
        let Some(stub) = self.more.clone() else {
            return Ok(0);
        };

        if stub.is_continuation() {
            let replies = stub.fetch_continuation(client).await?;
            let adopted = replies.len();
            let more = replies.more.clone();
            self.items
                .extend(replies.into_items().into_iter().filter_map(T::from_thing));
            self.more = more;
            return Ok(adopted.max(1));
        }

        let take = remaining.min(stub.child_ids.len());
        let fetched = stub.fetch_more(client, take, skip_replies).await?;
        self.items
            .extend(fetched.into_iter().filter_map(T::from_thing));
        if let Some(more) = self.more.as_mut() {
            more.drain(take);
        }
        Ok(take)
    }
}

impl Listing<Thing> {
    /// Narrow the element type, dropping items of other kinds
    pub fn cast<U: ListingItem>(self) -> Listing<U> {
        Listing {
            items: self.items.into_iter().filter_map(U::from_thing).collect(),
            before: self.before,
            after: self.after,
            uri: self.uri,
            query: self.query,
            transform: self.transform,
            is_comment_list: self.is_comment_list,
            more: self.more,
            lookahead: self.lookahead.into_iter().filter_map(U::from_thing).collect(),
            lookahead_backward: self.lookahead_backward,
            started: self.started,
        }
    }
}

impl<T> Index<usize> for Listing<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<T> IntoIterator for Listing<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Listing<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn stub(ids: &[&str]) -> MoreStub {
        MoreStub {
            name: "t1_stub".to_string(),
            count: ids.len() as u64,
            child_ids: ids.iter().map(|id| id.to_string()).collect(),
            parent_id: Some("t3_post".to_string()),
            root_id: Some("t3_post".to_string()),
            depth: 0,
        }
    }

    fn thing(id: &str) -> Thing {
        Thing::Other {
            kind: "t1".to_string(),
            data: Node::from(json!({ "name": id })),
        }
    }

    #[test]
    fn test_placeholder_is_not_finished_until_first_page() {
        let mut query = BTreeMap::new();
        query.insert("limit".to_string(), "5".to_string());
        query.insert("after".to_string(), "t3_x".to_string());
        query.insert("sort".to_string(), "new".to_string());
        let listing: Listing = Listing::placeholder("r/rust/new", query);

        assert!(!listing.is_finished());
        assert_eq!(listing.after(), Some("t3_x"));
        assert_eq!(listing.query().len(), 1);
        assert_eq!(listing.query().get("sort").map(String::as_str), Some("new"));
    }

    #[test]
    fn test_regular_listing_finishes_when_cursors_are_gone() {
        let listing = Listing::from_page(vec![thing("a")], None, None);
        assert!(listing.is_finished());

        let sourced = listing.clone().with_source("r/rust/new", BTreeMap::new());
        assert!(sourced.is_finished());

        let paged = Listing::from_page(vec![thing("a")], None, Some("t3_a".to_string()))
            .with_source("r/rust/new", BTreeMap::new());
        assert!(!paged.is_finished());
    }

    #[test]
    fn test_comment_list_finishes_with_resolved_stub() {
        let mut listing: Listing = Listing::new();
        listing.set_more(stub(&["a", "b"]));
        assert!(!listing.is_finished());
        assert_eq!(listing.reply_state(), ReplyState::Unexpanded);

        listing.more_mut().unwrap().drain(2);
        assert!(listing.is_finished());
        assert_eq!(listing.reply_state(), ReplyState::FullyExpanded);
    }

    #[test]
    fn test_lookahead_blocks_finish_and_drains_in_order() {
        let mut listing = Listing::from_page(vec![thing("a")], None, None);
        listing.lookahead = vec![thing("b"), thing("c")];
        assert!(!listing.is_finished());

        assert_eq!(listing.drain_lookahead(1), 1);
        assert_eq!(listing.buffered(), 1);
        assert_eq!(listing.drain_lookahead(5), 1);
        let names: Vec<&str> = listing.iter().map(Thing::name).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert!(listing.is_finished());
    }

    #[test]
    fn test_backward_lookahead_prepends_nearest_items() {
        let mut listing = Listing::from_page(vec![thing("d")], None, None);
        listing.lookahead = vec![thing("a"), thing("b"), thing("c")];
        listing.lookahead_backward = true;

        listing.drain_lookahead(2);
        let names: Vec<&str> = listing.iter().map(Thing::name).collect();
        assert_eq!(names, vec!["b", "c", "d"]);
    }

    #[test]
    fn test_array_element_transform_unmerges_submission() {
        let node = Node::from(json!([
            {"kind": "Listing", "data": {"children": [
                {"kind": "t3", "data": {"name": "t3_orig"}}
            ]}},
            {"kind": "Listing", "data": {"children": [], "after": null}}
        ]));

        let dupes = PageTransform::ArrayElement(1).apply(node.clone(), "duplicates/orig").unwrap();
        assert!(dupes.is_empty());
        assert!(!dupes.is_comment_list());

        let original = PageTransform::ArrayElement(0).apply(node, "duplicates/orig").unwrap();
        assert_eq!(original.len(), 1);
        assert_eq!(original[0].name(), "t3_orig");
    }

    #[test]
    fn test_cast_keeps_matching_items() {
        let node = Node::from(json!({"kind": "Listing", "data": {"after": "t3_b", "children": [
            {"kind": "t3", "data": {"name": "t3_a", "title": "first"}},
            {"kind": "t1", "data": {"name": "t1_c"}}
        ]}}));
        let listing = listing_from_node(node, "r/rust/new").unwrap();
        let posts: Listing<Submission> = listing.cast();

        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title(), "first");
        assert_eq!(posts.after(), Some("t3_b"));
    }

    #[test]
    fn test_fetch_options_builders() {
        let options = FetchOptions::from(7_usize).skip_replies(true).append(false);
        assert_eq!(options.amount, 7);
        assert!(options.skip_replies);
        assert!(!options.append);
        assert_eq!(FetchOptions::all().amount, usize::MAX);
    }
}
