//! Shared building blocks for the realtime workspace.
//!
//! Everything here is free of runtime and transport concerns so that both the
//! core library and the monitor binary can depend on it:
//!
//! - [`ErrorLocation`] - call-site capture used by every error enum
//! - [`RedactedToken`] - credential wrapper that never leaks into logs
//! - [`HttpStatusCode`] - status categorisation for the ask client

pub mod error;
pub mod http_status;
pub mod redacted_token;


pub use error::error_location::ErrorLocation;
pub use error::redact_error::RedactError;
pub use http_status::HttpStatusCode;
pub use redacted_token::RedactedToken;
