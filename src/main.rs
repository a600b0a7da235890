use axum::{
    Router, middleware,
    routing::{get, post},
};
use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod handlers;
mod log_sink;
mod metrics;
mod models;
mod rate_limit;
mod state;

use config::Args;
use handlers::{chat_handler, cors_headers, health_handler, metrics_handler};
use log_sink::LogSink;
use rate_limit::RateLimiter;
use state::AppState;

// this is main async function with tokio
#[tokio::main]
async fn main() {
    // parse cli arguments
    let args = Args::parse();

    // the key is required up front, not checked per request
    let api_key = match std::env::var("DEEPSEEK_API_KEY") {
        Ok(key) if !key.is_empty() => key,
        _ => {
            eprintln!("DEEPSEEK_API_KEY not configured");
            std::process::exit(1);
        }
    };

    let client = reqwest::Client::new();
    let limiter = Arc::new(RateLimiter::new(
        args.rate_limit,
        Duration::from_secs(args.rate_window),
    ));

    // creating shared state
    let state = Arc::new(AppState {
        client: client.clone(),
        limiter: Arc::clone(&limiter),
        upstream_url: args.upstream_url.clone(),
        api_key,
        model: args.model.clone(),
        temperature: args.temperature,
        max_tokens: args.max_tokens,
        system_prompt: args.system_prompt.clone(),
        log_sink: args.log_url.clone().map(|url| LogSink::new(client, url)),
    });

    // spawn the background sweep so the limiter store stays bounded
    tokio::spawn(rate_limit::sweep_task(
        limiter,
        Duration::from_secs(args.sweep_interval),
    ));

    // creating the router with routes
    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/api/chat", post(chat_handler)) // post route
        .route("/metrics", get(metrics_handler)) // metrics endpoint
        .layer(middleware::from_fn(cors_headers))
        .with_state(state);

    let addr = format!("0.0.0.0:{}", args.port);
    let listener = tokio::net::TcpListener::bind(&addr).await.unwrap();

    println!("Gateway running on http://localhost:{}", args.port);
    println!("Forwarding to {} (model: {})", args.upstream_url, args.model);
    println!(
        "Rate limit: {} requests per {} seconds",
        args.rate_limit, args.rate_window
    );
    if args.log_url.is_some() {
        println!("Conversation logging enabled");
    }

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await
    .unwrap();
}
