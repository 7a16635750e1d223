//! Response materializer
//!
//! Walks an arbitrary JSON response and replaces `{kind, data}` envelopes with
//! typed [`Thing`]s, bare user names with [`Redditor`] placeholders and bare
//! subreddit names with [`Subreddit`] placeholders.

use super::{
    Comment, Content, Listing, ModAction, MoreStub, Node, PrivateMessage, Redditor, Submission,
    Subreddit, Thing,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Keys whose string value names a user
pub const USER_KEYS: [&str; 5] = ["author", "approved_by", "banned_by", "mod", "target_author"];

/// Keys whose string value names a subreddit
pub const SUBREDDIT_KEYS: [&str; 1] = ["subreddit"];

pub fn materialize(value: Value) -> Node {
    match value {
        Value::Null => Node::Null,
        Value::Bool(b) => Node::Bool(b),
        Value::Number(n) => Node::Number(n),
        Value::String(s) => Node::String(s),
        Value::Array(items) => merge_comment_page(items.into_iter().map(materialize).collect()),
        Value::Object(mut map) => {
            if is_envelope(&map) {
                let kind = match map.remove("kind") {
                    Some(Value::String(kind)) => kind,
                    _ => String::new(),
                };
                let data = map.remove("data").unwrap_or(Value::Null);
                Node::thing(thing_from_envelope(kind, data))
            } else {
                Node::Object(materialize_fields(map))
            }
        }
    }
}

fn is_envelope(map: &Map<String, Value>) -> bool {
    map.len() == 2 && matches!(map.get("kind"), Some(Value::String(_))) && map.contains_key("data")
}

fn materialize_fields(map: Map<String, Value>) -> BTreeMap<String, Node> {
    map.into_iter()
        .map(|(key, value)| {
            let node = match materialize(value) {
                Node::String(name) if USER_KEYS.contains(&key.as_str()) => {
                    Node::thing(Thing::Redditor(Redditor::unfetched(name)))
                }
                Node::String(name) if SUBREDDIT_KEYS.contains(&key.as_str()) => {
                    Node::thing(Thing::Subreddit(Subreddit::unfetched(name)))
                }
                other => other,
            };
            (key, node)
        })
        .collect()
}

fn thing_from_envelope(kind: String, data: Value) -> Thing {
    let fields = match data {
        Value::Object(map) => materialize_fields(map),
        other => {
            return Thing::Other {
                kind,
                data: materialize(other),
            }
        }
    };

    match kind.as_str() {
        "t1" => Thing::Comment(Comment::from_content(Content::new(fields))),
        "t2" => Thing::Redditor(Redditor::Fetched(Content::new(fields))),
        "t3" => Thing::Submission(Submission::from_content(Content::new(fields))),
        "t4" => Thing::Message(PrivateMessage::from_content(Content::new(fields))),
        "t5" => Thing::Subreddit(Subreddit::Fetched(Content::new(fields))),
        "modaction" => Thing::ModAction(ModAction::from_content(Content::new(fields))),
        "more" => Thing::More(MoreStub::from_content(&Content::new(fields))),
        "Listing" => Thing::Listing(listing_from_fields(fields)),
        _ => Thing::Other {
            kind,
            data: Node::Object(fields),
        },
    }
}

fn listing_from_fields(mut fields: BTreeMap<String, Node>) -> Listing<Thing> {
    let cursor = |node: Option<Node>| match node {
        Some(Node::String(s)) if !s.is_empty() => Some(s),
        _ => None,
    };
    let before = cursor(fields.remove("before"));
    let after = cursor(fields.remove("after"));

    let mut items: Vec<Thing> = match fields.remove("children") {
        Some(Node::Array(children)) => children
            .into_iter()
            .map(|child| match child {
                Node::Thing(thing) => *thing,
                other => Thing::Other {
                    kind: String::new(),
                    data: other,
                },
            })
            .collect(),
        _ => Vec::new(),
    };

    let more = match items.last() {
        Some(Thing::More(_)) => match items.pop() {
            Some(Thing::More(stub)) => Some(stub),
            _ => None,
        },
        _ => None,
    };

    let mut listing = Listing::from_page(items, before, after);
    if let Some(stub) = more {
        listing.set_more(stub);
    }
    listing
}

/// `[Listing[submission], Listing[comments...]]` becomes the submission with its comments attached
fn merge_comment_page(nodes: Vec<Node>) -> Node {
    if !is_comment_page(&nodes) {
        return Node::Array(nodes);
    }

    let mut nodes = nodes.into_iter();
    let (Some(Node::Thing(first)), Some(Node::Thing(second))) = (nodes.next(), nodes.next()) else {
        return Node::Array(Vec::new());
    };
    let (Thing::Listing(posts), Thing::Listing(mut comments)) = (*first, *second) else {
        return Node::Array(Vec::new());
    };
    let Some(Thing::Submission(mut submission)) = posts.into_items().into_iter().next() else {
        return Node::Array(Vec::new());
    };

    comments.mark_comment_list();
    if let Some(more) = comments.more_mut() {
        if more.root_id.is_none() {
            more.root_id = Some(submission.content().name().to_string());
        }
    }
    submission.comments = Some(comments);
    Node::thing(Thing::Submission(submission))
}

fn is_comment_page(nodes: &[Node]) -> bool {
    let [Node::Thing(first), Node::Thing(second)] = nodes else {
        return false;
    };
    match (first.as_ref(), second.as_ref()) {
        (Thing::Listing(posts), Thing::Listing(comments)) => {
            posts.len() == 1
                && matches!(posts.iter().next(), Some(Thing::Submission(_)))
                && comments
                    .iter()
                    .all(|item| matches!(item, Thing::Comment(_) | Thing::More(_)))
        }
        _ => false,
    }
}
