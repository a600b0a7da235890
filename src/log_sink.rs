// Best-effort conversation logging - fire and forget, never blocks a
// request and never fails one.

pub struct LogSink {
    client: reqwest::Client,
    url: String,
}

impl LogSink {
    pub fn new(client: reqwest::Client, url: String) -> Self {
        Self { client, url }
    }

    // Append one conversation turn keyed by session id. Runs in a spawned
    // task; errors are printed and dropped.
    pub fn record(&self, session_id: Option<&str>, prompt: &str, reply: &str) {
        let payload = serde_json::json!({
            "session_id": session_id.unwrap_or("anonymous"),
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "prompt": prompt,
            "reply": reply,
        });

        let client = self.client.clone();
        let url = self.url.clone();
        tokio::spawn(async move {
            if let Err(e) = client.post(&url).json(&payload).send().await {
                eprintln!("[LogSink] Failed to append turn: {}", e);
            }
        });
    }
}
