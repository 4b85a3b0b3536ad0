//! HTTP client for a running persona server.

use persona_core::{ErrorBody, HealthResponse, PersonaRequest, PersonaResponse};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server returned {status}: {body}")]
    Server { status: u16, body: String },
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Client for `POST /predict` and `GET /health`.
pub struct PredictClient {
    client: reqwest::Client,
    base_url: String,
}

impl PredictClient {
    /// `base_url` is like `http://localhost:8000`; a trailing slash is dropped.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Ask the server to classify a bio and its posts.
    pub async fn predict(&self, request: &PersonaRequest) -> Result<PersonaResponse, ClientError> {
        let url = format!("{}/predict", self.base_url);

        info!(url = %url, mode = request.mode.as_str(), "requesting prediction");
        let resp = self.client.post(&url).json(request).send().await?;
        let body = success_body(resp).await?;

        let prediction: PersonaResponse = serde_json::from_str(&body)?;
        info!(
            persona = %prediction.persona,
            confidence = prediction.confidence,
            "received prediction"
        );
        Ok(prediction)
    }

    pub async fn health(&self) -> Result<HealthResponse, ClientError> {
        let url = format!("{}/health", self.base_url);

        debug!(url = %url, "checking server health");
        let resp = self.client.get(&url).send().await?;
        let body = success_body(resp).await?;
        Ok(serde_json::from_str(&body)?)
    }
}

/// Body text of a 2xx response; anything else becomes `ClientError::Server`
/// carrying the server's `detail` message when it sent one.
async fn success_body(resp: reqwest::Response) -> Result<String, ClientError> {
    let status = resp.status();
    let body = resp.text().await?;
    if status.is_success() {
        return Ok(body);
    }
    let body = match serde_json::from_str::<ErrorBody>(&body) {
        Ok(err) => err.detail,
        Err(_) => body,
    };
    Err(ClientError::Server {
        status: status.as_u16(),
        body,
    })
}
