pub mod models;
pub mod senders;
pub mod service;

pub use models::NotificationMessage;
pub use service::NotificationDispatcher;
