pub mod api_client;
pub mod config;
pub mod connection;
pub mod listener;

pub use api_client::ApiClientError;
pub use config::ConfigError;
pub use connection::ConnectionError;
pub use listener::ListenerError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Connection(#[from] connection::ConnectionError),

    #[error(transparent)]
    Listener(#[from] listener::ListenerError),

    #[error(transparent)]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    ApiClient(#[from] api_client::ApiClientError),
}
