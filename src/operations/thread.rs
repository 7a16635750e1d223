use super::truncate;
use crate::client::RedditClient;
use crate::error::Result;
use crate::models::{FetchOptions, Listing, RedditContent, Submission, Thing};
use log::{error, info};

/// Configuration options for loading a comment thread
#[derive(Debug, Clone)]
pub struct ThreadOptions {
    /// Submission id, with or without the `t3_` prefix
    pub submission_id: String,
    /// Upper bound on top-level stub children to expand; everything when unset
    pub limit: Option<usize>,
    /// Expand through the bulk lookup; replies of expanded comments are not loaded
    pub flat: bool,
}

#[derive(Debug)]
pub struct ThreadResult {
    pub submission: Submission,
    /// Comments materialized at any depth
    pub comment_count: usize,
    pub formatted_output: String,
}

/// Operation for loading and expanding the comment tree of a submission
pub struct ThreadOperation {
    options: ThreadOptions,
    client: RedditClient,
}

impl ThreadOperation {
    pub fn with_client(options: ThreadOptions, client: RedditClient) -> Self {
        Self { options, client }
    }

    pub async fn execute(&self) -> Result<ThreadResult> {
        let id = self
            .options
            .submission_id
            .trim_start_matches("t3_")
            .to_string();
        info!("Loading comment thread for t3_{}", id);

        let mut submission = self.client.get_submission(&id).await?;
        let comments = submission.comments.take().unwrap_or_default();

        let options = FetchOptions::new(self.options.limit.unwrap_or(usize::MAX))
            .skip_replies(self.options.flat);
        let comments = comments.fetch_more(&self.client, options).await?;

        let mut output = format!("{}\n{}\n", submission.title(), "=".repeat(40));
        let comment_count = render(&comments, 0, &mut output);
        if comment_count == 0 {
            output.push_str("No comments.\n");
        }

        submission.comments = Some(comments);
        Ok(ThreadResult {
            submission,
            comment_count,
            formatted_output: output,
        })
    }
}

/// Append an indented rendering of `replies`; returns the number of comments written
fn render(replies: &Listing<Thing>, depth: usize, output: &mut String) -> usize {
    let indent = "  ".repeat(depth);
    let mut written = 0;

    for thing in replies {
        let Thing::Comment(comment) = thing else {
            continue;
        };
        let author = comment.author().map(|a| a.name()).unwrap_or("[deleted]");
        let first_line = comment.body().lines().next().unwrap_or_default();
        output.push_str(&format!(
            "{}- u/{} ({}): {}\n",
            indent,
            author,
            comment.score(),
            truncate(first_line, 80)
        ));
        written += 1 + render(&comment.replies, depth + 1, output);
    }

    if let Some(more) = replies.more() {
        if more.is_continuation() {
            output.push_str(&format!("{}[continue this thread]\n", indent));
        } else if !more.is_resolved() {
            output.push_str(&format!("{}[{} more replies]\n", indent, more.remaining()));
        }
    }
    written
}

/// CLI handler function for thread command
pub async fn handle_thread_command_with_client(
    submission_id: String,
    limit: Option<usize>,
    flat: bool,
    client: RedditClient,
) -> Result<()> {
    let options = ThreadOptions {
        submission_id,
        limit,
        flat,
    };

    let operation = ThreadOperation::with_client(options, client);
    match operation.execute().await {
        Ok(result) => {
            print!("{}", result.formatted_output);
            Ok(())
        }
        Err(err) => {
            error!("Error loading thread: {}", err);
            Err(err)
        }
    }
}
