pub mod admin;
pub mod categories;
pub mod emails;
pub mod health;
pub mod reports;
pub mod subscriptions;

pub use admin::AdminService;
pub use categories::CategoryService;
pub use emails::EmailService;
pub use health::HealthService;
pub use reports::ReportsService;
pub use subscriptions::SubscriptionService;
