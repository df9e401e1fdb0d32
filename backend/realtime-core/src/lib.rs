pub mod activation;
pub mod api_client;
pub mod auth;
pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod notifications;
pub mod pipeline;
pub mod protocol;
pub mod registry;

#[cfg(test)]
mod tests;

pub use context::RealtimeCore;

pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1:8001";
pub const DEFAULT_ENDPOINT: &str = const_format::concatcp!("ws://", DEFAULT_SERVER_HOST, "/ws");
pub const DEFAULT_API_BASE_URL: &str =
    const_format::concatcp!("http://", DEFAULT_SERVER_HOST, "/api/");
