use clap::Parser;

// CLI argument structure
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-gateway")]
#[command(about = "Rate-limited proxy between the chat widget and the DeepSeek API")]
pub struct Args {
    // Port to run the server on
    #[arg(short, long, default_value_t = 8080)]
    pub port: u16,

    // Base URL of the chat completions API
    #[arg(short, long, default_value = "https://api.deepseek.com/v1")]
    pub upstream_url: String,

    // Model to request upstream
    #[arg(short, long, default_value = "deepseek-chat")]
    pub model: String,

    // Sampling temperature
    #[arg(long, default_value_t = 0.8)]
    pub temperature: f32,

    // Completion token cap
    #[arg(long, default_value_t = 2000)]
    pub max_tokens: u32,

    // System prompt prepended to every conversation
    #[arg(
        long,
        default_value = "You are the site's chat assistant. Answer briefly and helpfully."
    )]
    pub system_prompt: String,

    // Rate limit max requests per window
    #[arg(long, default_value_t = 10)]
    pub rate_limit: u32,

    // Rate limit window in seconds
    #[arg(long, default_value_t = 300)]
    pub rate_window: u64,

    // Sweep interval for expired rate limit records, seconds
    #[arg(long, default_value_t = 60)]
    pub sweep_interval: u64,

    // Optional endpoint for best-effort conversation logging
    #[arg(long)]
    pub log_url: Option<String>,
}
