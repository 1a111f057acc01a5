pub mod change_feed;

pub use change_feed::{ChangeFeed, ChangeFeedOptions, Subscription};
