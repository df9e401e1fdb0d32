use crate::auth::AuthWatch;
use crate::error::api_client::ApiClientError;
use crate::protocol::payloads::optional_string_or_number;

use common::{ErrorLocation, HttpStatusCode};

use std::panic::Location;
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::debug;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

const DEFAULT_TIMEOUT_DURATION: Duration = Duration::from_secs(30);
const ASK_ENDPOINT: &str = "ai/ask";
const DEFAULT_CATEGORY: &str = "All";

#[derive(Debug, Serialize)]
struct AskRequest<'a> {
    question: &'a str,
    category: &'a str,
}

/// Answer returned by the ask endpoint.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AskResponse {
    #[serde(default, deserialize_with = "optional_string_or_number")]
    pub id: Option<String>,
    #[serde(default)]
    pub answer: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default)]
    pub provenance: Value,
}

/// HTTP client for submitting questions.
///
/// The bearer token is read from the [`AuthWatch`] on every request, so a
/// client built before login picks up the token once it exists.
#[derive(Clone)]
pub struct AskClient {
    base_url: Url,
    client: Client,
    auth: AuthWatch,
}

impl AskClient {
    pub fn new(base_url_str: &str, auth: AuthWatch) -> Result<Self, ApiClientError> {
        let mut base_url = Url::parse(base_url_str)?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT_DURATION)
            .build()?;

        Ok(Self {
            base_url,
            client,
            auth,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Ask a question. `category` defaults to `"All"`.
    ///
    /// # Errors
    ///
    /// - [`ApiClientError::Server`] for any non-2xx status
    /// - [`ApiClientError::Http`] if the request cannot be sent
    /// - [`ApiClientError::Json`] if the body is not a valid answer
    pub async fn ask(
        &self,
        question: &str,
        category: Option<&str>,
    ) -> Result<AskResponse, ApiClientError> {
        let url = self.base_url.join(ASK_ENDPOINT)?;
        let body = AskRequest {
            question,
            category: category.unwrap_or(DEFAULT_CATEGORY),
        };

        let mut request = self.client.post(url).json(&body);
        if let Some(token) = self.auth.token() {
            request = request.bearer_auth(token.expose());
        }

        debug!("Submitting question ({} chars)", question.len());
        let response = request.send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiClientError::Server {
                status: HttpStatusCode::from(status.as_u16()),
                message: response.text().await.unwrap_or_default(),
                location: ErrorLocation::from(Location::caller()),
            });
        }

        let bytes = response.bytes().await?;
        let answer: AskResponse = serde_json::from_slice(&bytes)?;

        Ok(answer)
    }
}
