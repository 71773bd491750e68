//! Client for a running instance's revalidation endpoint.

use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use thiserror::Error;
use uidir_api_types::{RevalidateRequest, RevalidateResponse};

const REVALIDATE_PATH: &str = "api/revalidate";

#[derive(Debug, Error)]
pub enum RevalidateClientError {
    #[error("revalidation token is required (use UIDIR_REVALIDATION_TOKEN or revalidation.token)")]
    MissingToken,
    #[error("at least one --path is required")]
    NoPaths,
    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("server responded with {status}: {message}")]
    Server { status: StatusCode, message: String },
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: String,
}

#[derive(Clone, Debug)]
pub struct RevalidationClient {
    client: Client,
    endpoint: Url,
    token: String,
}

impl RevalidationClient {
    pub fn new(site: &str, token: String) -> Result<Self, RevalidateClientError> {
        if token.trim().is_empty() {
            return Err(RevalidateClientError::MissingToken);
        }
        let endpoint = Url::parse(site)?.join("/")?.join(REVALIDATE_PATH)?;
        let client = Client::builder().user_agent(Self::user_agent()).build()?;
        Ok(Self {
            client,
            endpoint,
            token,
        })
    }

    pub fn user_agent() -> &'static str {
        concat!("uidir/", env!("CARGO_PKG_VERSION"))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub async fn revalidate(
        &self,
        paths: Vec<String>,
    ) -> Result<RevalidateResponse, RevalidateClientError> {
        if paths.is_empty() {
            return Err(RevalidateClientError::NoPaths);
        }

        let response = self
            .client
            .post(self.endpoint.clone())
            .bearer_auth(&self.token)
            .json(&RevalidateRequest { paths })
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response.json::<RevalidateResponse>().await?);
        }

        let text = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBody>(&text)
            .map(|body| body.error.message)
            .unwrap_or(text);
        Err(RevalidateClientError::Server { status, message })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_is_rooted_at_site() {
        let client = RevalidationClient::new("https://ui.example.test/some/page", "t".into())
            .expect("client");
        assert_eq!(
            client.endpoint().as_str(),
            "https://ui.example.test/api/revalidate"
        );
    }

    #[test]
    fn blank_token_is_rejected() {
        assert!(matches!(
            RevalidationClient::new("https://ui.example.test", "  ".into()),
            Err(RevalidateClientError::MissingToken)
        ));
    }
}
