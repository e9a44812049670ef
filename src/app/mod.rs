pub mod auth;
pub mod directory;
pub mod dispatch;
pub mod notifications;
pub mod outbox;
pub mod recipients;
pub mod writer;
