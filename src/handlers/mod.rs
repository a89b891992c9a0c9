mod chat;
mod contact;
mod health;
mod metrics;

pub use chat::chat_handler;
pub use contact::{chat_contact_handler, contact_handler};
pub use health::health_handler;
pub use metrics::metrics_handler;
