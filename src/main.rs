use clap::Parser;
use log::error;
use redpage::cli::{Cli, Commands};
use redpage::config::AppConfig;
use redpage::operations::{modlog, posts, reply, thread};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = AppConfig::load();

    let client = match config.create_client() {
        Ok(client) => client,
        Err(err) => {
            error!("Failed to create Reddit client: {}", err);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Commands::Posts {
            count,
            subreddit,
            brief,
        } => posts::handle_posts_command_with_client(count, subreddit, brief, client).await,
        Commands::Thread {
            submission_id,
            limit,
            flat,
        } => thread::handle_thread_command_with_client(submission_id, limit, flat, client).await,
        Commands::Reply { thing_id, text } => {
            reply::handle_reply_command_with_client(thing_id, text, client).await
        }
        Commands::Modlog { subreddit, count } => {
            modlog::handle_modlog_command_with_client(subreddit, count, client).await
        }
    };

    if result.is_err() {
        std::process::exit(1);
    }
}
