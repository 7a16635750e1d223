use super::{format_timestamp, truncate};
use crate::client::RedditClient;
use crate::config::AppConfig;
use crate::error::Result;
use crate::models::{RedditContent, Submission};
use log::{error, info};

/// Configuration options for fetching posts
#[derive(Debug, Clone)]
pub struct PostsOptions {
    /// The number of posts to retrieve
    pub count: usize,
    /// The name of the subreddit to fetch posts from (None for the front page)
    pub subreddit: Option<String>,
    /// Display posts in a brief, one-line format
    pub brief: bool,
}

impl Default for PostsOptions {
    fn default() -> Self {
        Self {
            count: 10,
            subreddit: None,
            brief: false,
        }
    }
}

/// Result of a posts fetch operation
#[derive(Debug)]
pub struct PostsResult {
    /// The number of posts found
    pub post_count: usize,
    /// Formatted output (for CLI display)
    pub formatted_output: String,
    pub posts: Vec<Submission>,
}

/// Operation for paging through new posts
pub struct PostsOperation {
    options: PostsOptions,
    client: RedditClient,
}

impl PostsOperation {
    /// Create a new posts operation with a client built from the environment
    pub fn new(options: PostsOptions) -> Result<Self> {
        let client = AppConfig::load().create_client()?;
        Ok(Self { options, client })
    }

    /// Create a new posts operation with a custom Reddit client
    pub fn with_client(options: PostsOptions, client: RedditClient) -> Self {
        Self { options, client }
    }

    /// Execute the posts operation
    pub async fn execute(&self) -> Result<PostsResult> {
        info!(
            "Fetching {} posts from {}",
            self.options.count,
            self.options.subreddit.as_deref().unwrap_or("the front page")
        );

        let mut listing = self.client.get_new(self.options.subreddit.as_deref()).await?;
        if listing.len() < self.options.count && !listing.is_finished() {
            listing = listing
                .fetch_more(&self.client, self.options.count - listing.len())
                .await?;
        }
        let posts: Vec<Submission> = listing.into_iter().take(self.options.count).collect();

        let mut output = String::new();
        if posts.is_empty() {
            output.push_str("No posts found.\n");
        } else {
            output.push_str(&format!("Found {} posts\n", posts.len()));
            if self.options.brief {
                self.format_brief_output(&posts, &mut output);

                output.push_str("\nPost Type Legend:\n");
                output.push_str("[T] = Text post\n");
                output.push_str("[L] = Link\n");
            } else {
                self.format_detailed_output(&posts, &mut output);
            }
        }

        Ok(PostsResult {
            post_count: posts.len(),
            formatted_output: output,
            posts,
        })
    }

    fn format_brief_output(&self, posts: &[Submission], output: &mut String) {
        let timezone = &self.client.config().display_timezone;
        for (i, post) in posts.iter().enumerate() {
            let timestamp_str = format_timestamp(post.created_utc(), timezone, "%H:%M");
            let post_type = if post.is_self() { "T" } else { "L" };
            let subreddit = post.subreddit().map(|s| s.name()).unwrap_or_default();

            output.push_str(&format!(
                "{:2}. [{}] [{}] {} r/{} | ID: {}\n",
                i + 1,
                post_type,
                timestamp_str,
                truncate(post.title(), 30),
                subreddit,
                post.name()
            ));
        }
    }

    fn format_detailed_output(&self, posts: &[Submission], output: &mut String) {
        let timezone = &self.client.config().display_timezone;
        for post in posts {
            let timestamp_str = format_timestamp(post.created_utc(), timezone, "%Y-%m-%d %H:%M:%S");
            let author = post.author().map(|a| a.name()).unwrap_or("[deleted]");

            output.push_str("\n============ POST =============\n");
            output.push_str(&format!("[{}] [{}]\n", timestamp_str, timezone));
            output.push_str(&format!("Thing ID: {} (use this for replying)\n", post.name()));
            output.push_str(&format!("Title: {}\n", post.title()));
            output.push_str(&format!("Author: u/{}\n", author));
            output.push_str(&format!(
                "Score: {} | Comments: {}\n",
                post.score(),
                post.num_comments()
            ));
            if !post.url().is_empty() {
                output.push_str(&format!("URL: {}\n", post.url()));
            }
            output.push_str("================================\n");
        }
    }
}

/// CLI handler function for posts command that accepts a preconfigured client
pub async fn handle_posts_command_with_client(
    count: usize,
    subreddit: Option<String>,
    brief: bool,
    client: RedditClient,
) -> Result<()> {
    let options = PostsOptions {
        count,
        subreddit,
        brief,
    };

    let operation = PostsOperation::with_client(options, client);
    match operation.execute().await {
        Ok(result) => {
            print!("{}", result.formatted_output);
            Ok(())
        }
        Err(err) => {
            error!("Error fetching posts: {}", err);
            Err(err)
        }
    }
}
