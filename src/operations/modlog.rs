use super::format_timestamp;
use crate::client::RedditClient;
use crate::error::Result;
use crate::models::{ModAction, RedditContent};
use log::{error, info};

#[derive(Debug, Clone)]
pub struct ModlogOptions {
    pub subreddit: String,
    pub count: usize,
}

#[derive(Debug)]
pub struct ModlogResult {
    pub actions: Vec<ModAction>,
    pub formatted_output: String,
}

/// Operation for paging through a subreddit moderation log
pub struct ModlogOperation {
    options: ModlogOptions,
    client: RedditClient,
}

impl ModlogOperation {
    pub fn with_client(options: ModlogOptions, client: RedditClient) -> Self {
        Self { options, client }
    }

    pub async fn execute(&self) -> Result<ModlogResult> {
        let subreddit = self.options.subreddit.trim_start_matches("r/");
        info!(
            "Fetching {} moderation log entries from r/{}",
            self.options.count, subreddit
        );

        let mut listing = self.client.get_moderation_log(subreddit).await?;
        if listing.len() < self.options.count && !listing.is_finished() {
            listing = listing
                .fetch_more(&self.client, self.options.count - listing.len())
                .await?;
        }
        let actions: Vec<ModAction> = listing.into_iter().take(self.options.count).collect();

        let timezone = &self.client.config().display_timezone;
        let mut output = String::new();
        for action in &actions {
            let target = action
                .target_author()
                .map(|t| format!(" u/{}", t.name()))
                .unwrap_or_default();
            output.push_str(&format!(
                "[{}] {} {}{}\n",
                format_timestamp(action.created_utc(), timezone, "%Y-%m-%d %H:%M"),
                action.moderator().map(|m| m.name()).unwrap_or("?"),
                action.action(),
                target
            ));
        }
        if actions.is_empty() {
            output.push_str("No moderation actions found.\n");
        }

        Ok(ModlogResult {
            actions,
            formatted_output: output,
        })
    }
}

/// CLI handler function for modlog command
pub async fn handle_modlog_command_with_client(
    subreddit: String,
    count: usize,
    client: RedditClient,
) -> Result<()> {
    let operation = ModlogOperation::with_client(ModlogOptions { subreddit, count }, client);
    match operation.execute().await {
        Ok(result) => {
            print!("{}", result.formatted_output);
            Ok(())
        }
        Err(err) => {
            error!("Error fetching moderation log: {}", err);
            Err(err)
        }
    }
}
