pub mod auth_store;
pub mod backoff;
pub mod etag_cache;
pub mod recently_categorized;
pub mod session_store;
pub mod visibility;
