mod chat;
mod cors;
mod health;
mod metrics;

pub use chat::chat_handler;
pub use cors::cors_headers;
pub use health::health_handler;
pub use metrics::metrics_handler;
