//! Reddit API client with lazy listings
//!
//! Listings page themselves on demand, collapsed comment trees are expanded
//! through `more` stubs, and every request goes through one pipeline that
//! handles the rate limit, token refresh and transient-error retries.

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod models;
pub mod operations;

pub use client::{ApiRequest, RedditClient, Transport};
pub use config::AppConfig;
pub use error::{RedditClientError, Result};
pub use models::{
    Comment, Fetch, FetchOptions, Listing, ModAction, MoreStub, Node, PrivateMessage,
    RedditContent, Redditor, Removable, Replyable, Submission, Subreddit, Thing, Votable,
};
