//! Domain objects produced from Reddit API responses
//!
//! Raw JSON is turned into a [`Node`] tree by the materializer. Wherever the
//! response carried a `{kind, data}` envelope, the tree holds a typed
//! [`Thing`] instead of the raw object.

use crate::client::{ApiRequest, RedditClient};
use crate::error::{RedditClientError, Result};
use async_trait::async_trait;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;

pub mod capabilities;
pub mod listing;
pub mod materialize;
pub mod more;

pub use capabilities::{Removable, Replyable, Votable};
pub use listing::{FetchOptions, Listing, ListingItem, PageTransform, ReplyState};
pub use materialize::materialize;
pub use more::MoreStub;

/// A materialized JSON value
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    Number(Number),
    String(String),
    Array(Vec<Node>),
    Object(BTreeMap<String, Node>),
    Thing(Box<Thing>),
}

impl Node {
    pub fn thing(thing: Thing) -> Self {
        Node::Thing(Box::new(thing))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Node::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Node::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Node::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Node::Number(n) => n.as_f64(),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Node::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Node]> {
        match self {
            Node::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_thing(&self) -> Option<&Thing> {
        match self {
            Node::Thing(thing) => Some(thing),
            _ => None,
        }
    }

    pub fn into_thing(self) -> Option<Thing> {
        match self {
            Node::Thing(thing) => Some(*thing),
            _ => None,
        }
    }

    /// Field lookup on an object node
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Object(map) => map.get(key),
            _ => None,
        }
    }

    /// Move a field out of an object node
    pub fn take(&mut self, key: &str) -> Option<Node> {
        match self {
            Node::Object(map) => map.remove(key),
            _ => None,
        }
    }

    /// Convert back into plain JSON; unfetched references collapse to their name
    pub fn to_plain(&self) -> Value {
        match self {
            Node::Null => Value::Null,
            Node::Bool(b) => Value::Bool(*b),
            Node::Number(n) => Value::Number(n.clone()),
            Node::String(s) => Value::String(s.clone()),
            Node::Array(items) => Value::Array(items.iter().map(Node::to_plain).collect()),
            Node::Object(map) => Value::Object(plain_map(map)),
            Node::Thing(thing) => match &**thing {
                Thing::Redditor(Redditor::Unfetched { name }) => Value::String(name.clone()),
                Thing::Subreddit(Subreddit::Unfetched { display_name }) => {
                    Value::String(display_name.clone())
                }
                other => other.to_plain_object(),
            },
        }
    }
}

impl From<Value> for Node {
    fn from(value: Value) -> Self {
        materialize(value)
    }
}

fn plain_map(map: &BTreeMap<String, Node>) -> Map<String, Value> {
    map.iter().map(|(k, v)| (k.clone(), v.to_plain())).collect()
}

/// Minimal capability shared by every named piece of Reddit content
pub trait RedditContent {
    /// Fullname (`t1_abc`) or, for subreddits and users, the display name
    fn name(&self) -> &str;

    fn to_plain_object(&self) -> Value;
}

/// Explicitly load the full representation of a piece of content
#[async_trait]
pub trait Fetch: Sized {
    async fn fetch(&self, client: &RedditClient) -> Result<Self>;
}

/// The fields of one `{kind, data}` envelope
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Content {
    fields: BTreeMap<String, Node>,
}

impl Content {
    pub fn new(fields: BTreeMap<String, Node>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &BTreeMap<String, Node> {
        &self.fields
    }

    pub fn get(&self, key: &str) -> Option<&Node> {
        self.fields.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Node::as_str)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Node::as_i64)
    }

    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Node::as_f64)
    }

    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Node::as_bool)
    }

    pub(crate) fn remove(&mut self, key: &str) -> Option<Node> {
        self.fields.remove(key)
    }

    pub fn name(&self) -> &str {
        self.get_str("name").unwrap_or_default()
    }

    /// Placeholder user stored under `key` (e.g. `author`)
    pub fn redditor(&self, key: &str) -> Option<&Redditor> {
        match self.get(key)?.as_thing()? {
            Thing::Redditor(redditor) => Some(redditor),
            _ => None,
        }
    }

    /// Placeholder subreddit stored under `key`
    pub fn subreddit(&self, key: &str) -> Option<&Subreddit> {
        match self.get(key)?.as_thing()? {
            Thing::Subreddit(subreddit) => Some(subreddit),
            _ => None,
        }
    }

    pub fn to_plain_object(&self) -> Value {
        Value::Object(plain_map(&self.fields))
    }
}

/// One materialized envelope
#[derive(Debug, Clone, PartialEq)]
pub enum Thing {
    Comment(Comment),
    Submission(Submission),
    Message(PrivateMessage),
    Redditor(Redditor),
    Subreddit(Subreddit),
    ModAction(ModAction),
    More(MoreStub),
    Listing(Listing<Thing>),
    Other { kind: String, data: Node },
}

impl Thing {
    pub fn kind(&self) -> &str {
        match self {
            Thing::Comment(_) => "t1",
            Thing::Redditor(_) => "t2",
            Thing::Submission(_) => "t3",
            Thing::Message(_) => "t4",
            Thing::Subreddit(_) => "t5",
            Thing::ModAction(_) => "modaction",
            Thing::More(_) => "more",
            Thing::Listing(_) => "Listing",
            Thing::Other { kind, .. } => kind,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Thing::Comment(c) => c.name(),
            Thing::Submission(s) => s.name(),
            Thing::Message(m) => m.name(),
            Thing::Redditor(r) => r.name(),
            Thing::Subreddit(s) => s.name(),
            Thing::ModAction(a) => a.name(),
            Thing::More(m) => &m.name,
            Thing::Listing(_) => "",
            Thing::Other { data, .. } => data.get("name").and_then(Node::as_str).unwrap_or_default(),
        }
    }

    /// Fullname of the item this one replies to
    pub fn parent_id(&self) -> Option<&str> {
        match self {
            Thing::Comment(c) => c.parent_id(),
            Thing::Message(m) => m.parent_id(),
            Thing::More(m) => m.parent_id.as_deref(),
            _ => None,
        }
    }

    pub fn as_comment(&self) -> Option<&Comment> {
        match self {
            Thing::Comment(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_submission(&self) -> Option<&Submission> {
        match self {
            Thing::Submission(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_more(&self) -> Option<&MoreStub> {
        match self {
            Thing::More(m) => Some(m),
            _ => None,
        }
    }

    /// Replies of a comment or message
    pub fn replies(&self) -> Option<&Listing<Thing>> {
        match self {
            Thing::Comment(c) => Some(&c.replies),
            Thing::Message(m) => Some(&m.replies),
            _ => None,
        }
    }

    pub(crate) fn replies_mut(&mut self) -> Option<&mut Listing<Thing>> {
        match self {
            Thing::Comment(c) => Some(&mut c.replies),
            Thing::Message(m) => Some(&mut m.replies),
            _ => None,
        }
    }

    /// Root submission of a comment
    pub(crate) fn link_id(&self) -> Option<&str> {
        match self {
            Thing::Comment(c) => c.link_id(),
            _ => None,
        }
    }

    pub fn to_plain_object(&self) -> Value {
        match self {
            Thing::Comment(c) => c.to_plain_object(),
            Thing::Submission(s) => s.to_plain_object(),
            Thing::Message(m) => m.to_plain_object(),
            Thing::Redditor(r) => r.to_plain_object(),
            Thing::Subreddit(s) => s.to_plain_object(),
            Thing::ModAction(a) => a.to_plain_object(),
            Thing::More(m) => m.to_plain_object(),
            Thing::Listing(l) => Value::Array(l.iter().map(Thing::to_plain_object).collect()),
            Thing::Other { data, .. } => data.to_plain(),
        }
    }
}

impl RedditContent for Thing {
    fn name(&self) -> &str {
        Thing::name(self)
    }

    fn to_plain_object(&self) -> Value {
        Thing::to_plain_object(self)
    }
}

/// Pull the `replies` field out of a comment or message and normalize it into a reply listing
fn take_replies(content: &mut Content, root_id: Option<&str>) -> Listing<Thing> {
    let mut replies = match content.remove("replies").and_then(Node::into_thing) {
        Some(Thing::Listing(listing)) => listing,
        _ => Listing::new(),
    };
    replies.mark_comment_list();
    if let (Some(more), Some(root)) = (replies.more_mut(), root_id) {
        if more.root_id.is_none() {
            more.root_id = Some(root.to_string());
        }
    }
    replies
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    content: Content,
    pub replies: Listing<Thing>,
}

impl Comment {
    pub fn from_content(mut content: Content) -> Self {
        let root = content.get_str("link_id").map(str::to_string);
        let replies = take_replies(&mut content, root.as_deref());
        Self { content, replies }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn body(&self) -> &str {
        self.content.get_str("body").unwrap_or_default()
    }

    pub fn author(&self) -> Option<&Redditor> {
        self.content.redditor("author")
    }

    pub fn score(&self) -> i64 {
        self.content.get_i64("score").unwrap_or_default()
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.content.get_str("parent_id")
    }

    pub fn link_id(&self) -> Option<&str> {
        self.content.get_str("link_id")
    }
}

impl RedditContent for Comment {
    fn name(&self) -> &str {
        self.content.name()
    }

    fn to_plain_object(&self) -> Value {
        let mut plain = self.content.to_plain_object();
        if let Value::Object(map) = &mut plain {
            map.insert(
                "replies".to_string(),
                Value::Array(self.replies.iter().map(Thing::to_plain_object).collect()),
            );
        }
        plain
    }
}

#[async_trait]
impl Fetch for Comment {
    async fn fetch(&self, client: &RedditClient) -> Result<Self> {
        match fetch_by_fullname(client, self.name()).await? {
            Thing::Comment(comment) => Ok(comment),
            other => Err(unexpected_kind("api/info", "t1", &other)),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    content: Content,
    /// Comment tree, present when the submission was loaded through its comments page
    pub comments: Option<Listing<Thing>>,
}

impl Submission {
    pub fn from_content(content: Content) -> Self {
        Self {
            content,
            comments: None,
        }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn id(&self) -> &str {
        self.content.get_str("id").unwrap_or_default()
    }

    pub fn title(&self) -> &str {
        self.content.get_str("title").unwrap_or_default()
    }

    pub fn author(&self) -> Option<&Redditor> {
        self.content.redditor("author")
    }

    pub fn subreddit(&self) -> Option<&Subreddit> {
        self.content.subreddit("subreddit")
    }

    pub fn url(&self) -> &str {
        self.content.get_str("url").unwrap_or_default()
    }

    pub fn created_utc(&self) -> f64 {
        self.content.get_f64("created_utc").unwrap_or_default()
    }

    pub fn score(&self) -> i64 {
        self.content.get_i64("score").unwrap_or_default()
    }

    pub fn num_comments(&self) -> i64 {
        self.content.get_i64("num_comments").unwrap_or_default()
    }

    pub fn is_self(&self) -> bool {
        self.content.get_bool("is_self").unwrap_or_default()
    }

    /// Split the submission from its merged comment listing
    pub fn into_parts(self) -> (Submission, Option<Listing<Thing>>) {
        (
            Submission {
                content: self.content,
                comments: None,
            },
            self.comments,
        )
    }
}

impl RedditContent for Submission {
    fn name(&self) -> &str {
        self.content.name()
    }

    fn to_plain_object(&self) -> Value {
        let mut plain = self.content.to_plain_object();
        if let (Value::Object(map), Some(comments)) = (&mut plain, &self.comments) {
            map.insert(
                "comments".to_string(),
                Value::Array(comments.iter().map(Thing::to_plain_object).collect()),
            );
        }
        plain
    }
}

#[async_trait]
impl Fetch for Submission {
    async fn fetch(&self, client: &RedditClient) -> Result<Self> {
        client.get_submission(self.id()).await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrivateMessage {
    content: Content,
    pub replies: Listing<Thing>,
}

impl PrivateMessage {
    pub fn from_content(mut content: Content) -> Self {
        let replies = take_replies(&mut content, None);
        Self { content, replies }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn subject(&self) -> &str {
        self.content.get_str("subject").unwrap_or_default()
    }

    pub fn body(&self) -> &str {
        self.content.get_str("body").unwrap_or_default()
    }

    pub fn author(&self) -> Option<&Redditor> {
        self.content.redditor("author")
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.content.get_str("parent_id")
    }
}

impl RedditContent for PrivateMessage {
    fn name(&self) -> &str {
        self.content.name()
    }

    fn to_plain_object(&self) -> Value {
        let mut plain = self.content.to_plain_object();
        if let Value::Object(map) = &mut plain {
            map.insert(
                "replies".to_string(),
                Value::Array(self.replies.iter().map(Thing::to_plain_object).collect()),
            );
        }
        plain
    }
}

#[async_trait]
impl Fetch for PrivateMessage {
    async fn fetch(&self, client: &RedditClient) -> Result<Self> {
        let node = client
            .execute(ApiRequest::get(format!("message/messages/{}", strip_kind(self.name()))))
            .await?;
        let listing = listing_from_node(node, "message/messages")?;
        listing
            .into_items()
            .into_iter()
            .find_map(|thing| match thing {
                Thing::Message(message) if message.name() == self.name() => Some(message),
                _ => None,
            })
            .ok_or_else(|| {
                RedditClientError::malformed("message/messages", "message not present in response")
            })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Redditor {
    Unfetched { name: String },
    Fetched(Content),
}

impl Redditor {
    pub fn unfetched(name: impl Into<String>) -> Self {
        Redditor::Unfetched { name: name.into() }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, Redditor::Fetched(_))
    }
}

impl RedditContent for Redditor {
    fn name(&self) -> &str {
        match self {
            Redditor::Unfetched { name } => name,
            Redditor::Fetched(content) => content.name(),
        }
    }

    fn to_plain_object(&self) -> Value {
        match self {
            Redditor::Unfetched { name } => serde_json::json!({ "name": name }),
            Redditor::Fetched(content) => content.to_plain_object(),
        }
    }
}

#[async_trait]
impl Fetch for Redditor {
    async fn fetch(&self, client: &RedditClient) -> Result<Self> {
        let uri = format!("user/{}/about", self.name());
        match client.execute(ApiRequest::get(&uri)).await?.into_thing() {
            Some(Thing::Redditor(redditor)) => Ok(redditor),
            Some(other) => Err(unexpected_kind(&uri, "t2", &other)),
            None => Err(RedditClientError::malformed(uri, "expected a t2 envelope")),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Subreddit {
    Unfetched { display_name: String },
    Fetched(Content),
}

impl Subreddit {
    pub fn unfetched(display_name: impl Into<String>) -> Self {
        Subreddit::Unfetched {
            display_name: display_name.into(),
        }
    }

    pub fn is_fetched(&self) -> bool {
        matches!(self, Subreddit::Fetched(_))
    }
}

impl RedditContent for Subreddit {
    fn name(&self) -> &str {
        match self {
            Subreddit::Unfetched { display_name } => display_name,
            Subreddit::Fetched(content) => content.get_str("display_name").unwrap_or_default(),
        }
    }

    fn to_plain_object(&self) -> Value {
        match self {
            Subreddit::Unfetched { display_name } => {
                serde_json::json!({ "display_name": display_name })
            }
            Subreddit::Fetched(content) => content.to_plain_object(),
        }
    }
}

#[async_trait]
impl Fetch for Subreddit {
    async fn fetch(&self, client: &RedditClient) -> Result<Self> {
        let uri = format!("r/{}/about", self.name());
        match client.execute(ApiRequest::get(&uri)).await?.into_thing() {
            Some(Thing::Subreddit(subreddit)) => Ok(subreddit),
            Some(other) => Err(unexpected_kind(&uri, "t5", &other)),
            None => Err(RedditClientError::malformed(uri, "expected a t5 envelope")),
        }
    }
}

/// One entry of a subreddit moderation log
#[derive(Debug, Clone, PartialEq)]
pub struct ModAction {
    content: Content,
}

impl ModAction {
    pub fn from_content(content: Content) -> Self {
        Self { content }
    }

    pub fn content(&self) -> &Content {
        &self.content
    }

    pub fn action(&self) -> &str {
        self.content.get_str("action").unwrap_or_default()
    }

    pub fn moderator(&self) -> Option<&Redditor> {
        self.content.redditor("mod")
    }

    pub fn target_author(&self) -> Option<&Redditor> {
        self.content.redditor("target_author")
    }

    pub fn created_utc(&self) -> f64 {
        self.content.get_f64("created_utc").unwrap_or_default()
    }
}

impl RedditContent for ModAction {
    fn name(&self) -> &str {
        self.content.get_str("id").unwrap_or_default()
    }

    fn to_plain_object(&self) -> Value {
        self.content.to_plain_object()
    }
}

/// `t3_abc` -> `abc`
pub(crate) fn strip_kind(fullname: &str) -> &str {
    fullname
        .split_once('_')
        .map(|(_, id)| id)
        .unwrap_or(fullname)
}

pub(crate) fn listing_from_node(node: Node, endpoint: &str) -> Result<Listing<Thing>> {
    match node.into_thing() {
        Some(Thing::Listing(listing)) => Ok(listing),
        Some(other) => Err(unexpected_kind(endpoint, "Listing", &other)),
        None => Err(RedditClientError::malformed(endpoint, "expected a Listing envelope")),
    }
}

fn unexpected_kind(endpoint: &str, expected: &str, got: &Thing) -> RedditClientError {
    RedditClientError::malformed(
        endpoint,
        format!("expected {} but received {}", expected, got.kind()),
    )
}

async fn fetch_by_fullname(client: &RedditClient, fullname: &str) -> Result<Thing> {
    let listing = client.get_info(&[fullname]).await?;
    listing
        .into_items()
        .into_iter()
        .next()
        .ok_or_else(|| RedditClientError::malformed("api/info", format!("{} not found", fullname)))
}
