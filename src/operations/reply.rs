use crate::client::RedditClient;
use crate::error::{RedditClientError, Result};
use crate::models::{Comment, Content, Node, PrivateMessage, Replyable, Submission, Thing};
use log::{error, info};
use std::collections::BTreeMap;

/// Configuration options for replying to a post, comment or message
#[derive(Debug, Clone)]
pub struct ReplyOptions {
    /// Fullname of the parent: `t3_` for posts, `t1_` for comments, `t4_` for messages
    pub thing_id: String,
    /// Text content of the reply
    pub text: String,
}

/// Result of a reply operation
#[derive(Debug)]
pub struct ReplyResult {
    /// Whether the reply was successfully created
    pub success: bool,
    pub created: Option<Thing>,
    /// Formatted message for CLI output
    pub message: String,
}

pub struct ReplyOperation {
    options: ReplyOptions,
    client: RedditClient,
}

impl ReplyOperation {
    pub fn with_client(options: ReplyOptions, client: RedditClient) -> Self {
        Self { options, client }
    }

    pub async fn execute(&self) -> Result<ReplyResult> {
        info!("Replying to {}", self.options.thing_id);
        let target = reply_target(&self.options.thing_id)?;

        match target.reply(&self.client, &self.options.text).await {
            Ok(created) => {
                let permalink = match &created {
                    Thing::Comment(comment) => comment.content().get_str("permalink"),
                    _ => None,
                };
                let message = match permalink {
                    Some(permalink) => format!("Reply created: https://reddit.com{}", permalink),
                    None => format!("Reply created with ID: {}", created.name()),
                };
                Ok(ReplyResult {
                    success: true,
                    created: Some(created),
                    message,
                })
            }
            Err(err)
                if matches!(
                    err,
                    RedditClientError::RedditErrors { .. } | RedditClientError::ApiError { .. }
                ) =>
            {
                Ok(ReplyResult {
                    success: false,
                    created: None,
                    message: format!(
                        "Error creating reply: {}\n\nNote: Replying requires a user grant with the 'submit' scope.",
                        err
                    ),
                })
            }
            Err(err) => Err(err),
        }
    }
}

/// Local handle for the thing being replied to; only its fullname is needed
fn reply_target(thing_id: &str) -> Result<Box<dyn Replyable + Send>> {
    let mut fields = BTreeMap::new();
    fields.insert("name".to_string(), Node::String(thing_id.to_string()));
    let content = Content::new(fields);

    match thing_id.split_once('_').map(|(kind, _)| kind) {
        Some("t1") => Ok(Box::new(Comment::from_content(content))),
        Some("t3") => Ok(Box::new(Submission::from_content(content))),
        Some("t4") => Ok(Box::new(PrivateMessage::from_content(content))),
        _ => Err(RedditClientError::InvalidMethodCall(format!(
            "cannot reply to {}; expected a t1_, t3_ or t4_ fullname",
            thing_id
        ))),
    }
}

/// CLI handler function for reply command
pub async fn handle_reply_command_with_client(
    thing_id: String,
    text: String,
    client: RedditClient,
) -> Result<()> {
    let options = ReplyOptions { thing_id, text };

    let operation = ReplyOperation::with_client(options, client);
    match operation.execute().await {
        Ok(result) => {
            if result.success {
                println!("{}", result.message);
            } else {
                eprintln!("{}", result.message);
            }
            Ok(())
        }
        Err(err) => {
            error!("Error executing reply operation: {}", err);
            Err(err)
        }
    }
}
