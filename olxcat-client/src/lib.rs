pub mod config;
pub mod helpers;
pub mod integrations;
pub mod jobs;
pub mod services;

pub use config::ClientConfig;
pub use jobs::change_feed::{ChangeFeed, ChangeFeedOptions, Subscription};
