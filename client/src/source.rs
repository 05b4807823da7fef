use crate::error::ClientError;
use async_trait::async_trait;
use common::model::artifact::ArtifactKind;
use common::model::document::DocumentArtifacts;
use common::requests::{GenerateRequest, GenerateResponse};
use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::time::Duration;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the poller reads document state from.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Reads the current artifact record of a document.
    async fn fetch(&self, document_id: &str) -> Result<DocumentArtifacts, ClientError>;
}

/// HTTP client for the `/api/documents` endpoints of the backend.
pub struct HttpStatusSource {
    client: Client,
    base_url: String,
}

impl HttpStatusSource {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let client = Client::builder().build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, document_id: &str, path: &str) -> String {
        format!("{}/api/documents/{}{}", self.base_url, document_id, path)
    }

    /// Starts generation; waits for the result when `request.wait` is set.
    pub async fn generate(
        &self,
        document_id: &str,
        request: &GenerateRequest,
    ) -> Result<GenerateResponse, ClientError> {
        let mut builder = self
            .client
            .post(self.url(document_id, "/generate"))
            .json(request);
        // synchronous calls are bounded by the server deadline instead
        if !request.wait {
            builder = builder.timeout(REQUEST_TIMEOUT);
        }
        decode(document_id, builder.send().await?).await
    }

    pub async fn regenerate(
        &self,
        document_id: &str,
        kind: ArtifactKind,
    ) -> Result<GenerateResponse, ClientError> {
        let response = self
            .client
            .post(self.url(document_id, &format!("/regenerate/{}", kind)))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        decode(document_id, response).await
    }
}

#[async_trait]
impl StatusSource for HttpStatusSource {
    async fn fetch(&self, document_id: &str) -> Result<DocumentArtifacts, ClientError> {
        let response = self
            .client
            .get(self.url(document_id, "/status"))
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await?;
        decode(document_id, response).await
    }
}

async fn decode<T: DeserializeOwned>(
    document_id: &str,
    response: Response,
) -> Result<T, ClientError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(ClientError::NotFound(document_id.to_string()));
    }
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(ClientError::Status {
            status: status.as_u16(),
            body,
        });
    }
    Ok(response.json::<T>().await?)
}
