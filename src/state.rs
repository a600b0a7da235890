use std::sync::Arc;

use crate::log_sink::LogSink;
use crate::rate_limit::RateLimiter;

// App's shared state
pub struct AppState {
    pub client: reqwest::Client,
    pub limiter: Arc<RateLimiter>,
    pub upstream_url: String,
    pub api_key: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub system_prompt: String,
    pub log_sink: Option<LogSink>, // None -> logging disabled
}
