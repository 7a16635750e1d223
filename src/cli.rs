use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "redpage",
    version,
    about = "Page through Reddit listings and comment threads."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Command to fetch new posts from a subreddit or the front page.
    Posts {
        /// The number of posts to retrieve.
        #[arg(long, short, help = "Number of posts to retrieve", required = true)]
        count: usize,

        /// The name of the subreddit to fetch posts from.
        /// If not provided, posts from the front page will be retrieved.
        #[arg(long, short, help = "Subreddit name (optional)", required = false)]
        subreddit: Option<String>,

        /// Display posts in a brief, one-line format.
        #[arg(
            long,
            short,
            help = "Show posts in a brief one-line format",
            required = false
        )]
        brief: bool,
    },

    /// Load a submission and expand its comment tree.
    Thread {
        /// Submission id (with or without the t3_ prefix).
        #[arg(help = "Submission id", required = true)]
        submission_id: String,

        /// Maximum number of collapsed top-level comments to expand.
        #[arg(long, short, help = "Expand at most this many collapsed comments")]
        limit: Option<usize>,

        /// Expand collapsed comments without their replies (fewer requests).
        #[arg(long, help = "Use the bulk lookup instead of the tree expansion")]
        flat: bool,
    },

    /// Reply to a post, comment or private message.
    /// Requires a user grant (refresh token or username/password) with the 'submit' scope.
    Reply {
        /// Fullname of the parent thing.
        #[arg(help = "Thing id (t1_, t3_ or t4_ prefixed)", required = true)]
        thing_id: String,

        /// Text content of the reply.
        #[arg(help = "Reply text", required = true)]
        text: String,
    },

    /// Page through a subreddit moderation log.
    Modlog {
        /// The subreddit to read the log of.
        #[arg(help = "Subreddit name", required = true)]
        subreddit: String,

        /// The number of log entries to retrieve.
        #[arg(long, short, help = "Number of entries to retrieve", default_value = "25")]
        count: usize,
    },
}
