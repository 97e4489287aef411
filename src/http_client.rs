use once_cell::sync::Lazy;
use reqwest::Client;
use std::time::Duration;

/// Process-wide HTTP client shared by every provider, with connection pooling
pub static HTTP_CLIENT: Lazy<Client> = Lazy::new(|| {
    Client::builder()
        .user_agent(concat!("prompt-studio/", env!("CARGO_PKG_VERSION")))
        .timeout(Duration::from_secs(120)) // Image models can take a while
        .pool_max_idle_per_host(8)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .build()
        .expect("Failed to create HTTP client")
});
