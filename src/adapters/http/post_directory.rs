//! HTTP client for the post service.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::PostServiceConfig;
use crate::domain::foundation::{DomainError, ErrorCode, PostId};
use crate::ports::PostDirectory;

/// Envelope the post service wraps every response in.
#[derive(Debug, Deserialize)]
struct ResponseEnvelope<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExistsPost {
    exists_post: bool,
}

/// `PostDirectory` backed by the post service's REST API.
#[derive(Clone)]
pub struct HttpPostDirectory {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPostDirectory {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, DomainError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| external(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &PostServiceConfig) -> Result<Self, DomainError> {
        Self::new(config.base_url.clone(), config.timeout())
    }

    fn exists_url(&self, post_id: &PostId) -> String {
        format!("{}/api/v1/post/{}/exists", self.base_url, post_id)
    }
}

#[async_trait]
impl PostDirectory for HttpPostDirectory {
    async fn post_exists(&self, post_id: &PostId) -> Result<bool, DomainError> {
        let url = self.exists_url(post_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| external(format!("Post service request failed: {}", e)))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Ok(false);
        }
        if !status.is_success() {
            return Err(external(format!("Post service returned {}", status))
                .with_detail("post_id", post_id.as_str()));
        }

        let body: ResponseEnvelope<ExistsPost> = response
            .json()
            .await
            .map_err(|e| external(format!("Invalid post service response: {}", e)))?;

        debug!(post_id = %post_id, exists = body.result.exists_post, "Post existence checked");
        Ok(body.result.exists_post)
    }
}

fn external(message: String) -> DomainError {
    DomainError::new(ErrorCode::ExternalServiceError, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exists_url_joins_base_and_id() {
        let directory =
            HttpPostDirectory::new("http://posts.local/", Duration::from_secs(3)).unwrap();
        let id = PostId::new("abc-123").unwrap();

        assert_eq!(
            directory.exists_url(&id),
            "http://posts.local/api/v1/post/abc-123/exists"
        );
    }

    #[test]
    fn response_envelope_parses() {
        let body: ResponseEnvelope<ExistsPost> =
            serde_json::from_str(r#"{"isSuccess":true,"result":{"existsPost":true}}"#).unwrap();

        assert!(body.result.exists_post);
    }

    #[tokio::test]
    async fn unreachable_service_is_external_error() {
        let directory =
            HttpPostDirectory::new("http://127.0.0.1:9", Duration::from_millis(200)).unwrap();

        let err = directory
            .post_exists(&PostId::new("p").unwrap())
            .await
            .unwrap_err();

        assert_eq!(err.code, ErrorCode::ExternalServiceError);
    }
}
