//! Client for the Lambda Runtime API.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::relay::InvocationContext;
use crate::{
    DEADLINE_MS_HEADER, FUNCTION_ERROR_TYPE_HEADER, INVOKED_FUNCTION_ARN_HEADER,
    REQUEST_ID_HEADER, RUNTIME_ROUTE, base_url,
};

#[derive(Debug, thiserror::Error)]
pub enum RuntimeError {
    #[error("AWS_LAMBDA_RUNTIME_API is not set: {0}")]
    Environment(#[from] std::io::Error),
    #[error("runtime API request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("runtime API returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("runtime API response has no {0} header")]
    MissingHeader(&'static str),
    #[error("invocation payload is not JSON: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Debug, Clone)]
pub struct Invocation {
    pub context: InvocationContext,
    pub payload: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorRequest<'a> {
    error_message: &'a str,
    error_type: &'a str,
}

#[derive(Debug, Clone)]
pub struct RuntimeApiClient {
    client: reqwest::Client,
    base_url: String,
}

impl RuntimeApiClient {
    /// `base_url` ends with the runtime route, e.g.
    /// `http://127.0.0.1:9001/2018-06-01/runtime`.
    #[must_use]
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        RuntimeApiClient {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn from_env(client: reqwest::Client) -> Result<Self, RuntimeError> {
        Ok(Self::new(client, base_url(RUNTIME_ROUTE)?))
    }

    /// Blocks until the platform hands over the next event.
    pub async fn next_invocation(&self) -> Result<Invocation, RuntimeError> {
        let url = format!("{}/invocation/next", self.base_url);
        let response = self.client.get(&url).send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let text = response.text().await?;
        if !status.is_success() {
            debug!("HTTP Error {} - Response: {}", status, text);
            return Err(RuntimeError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let header = |name: &'static str| {
            headers
                .get(name)
                .and_then(|value| value.to_str().ok())
                .map(String::from)
        };
        let request_id = header(REQUEST_ID_HEADER).ok_or(RuntimeError::MissingHeader(REQUEST_ID_HEADER))?;
        let context = InvocationContext {
            request_id,
            invoked_function_arn: header(INVOKED_FUNCTION_ARN_HEADER).unwrap_or_default(),
            deadline_ms: header(DEADLINE_MS_HEADER).and_then(|deadline| deadline.parse().ok()),
        };
        let payload = serde_json::from_str(&text).map_err(|e| {
            debug!("JSON parse error on invocation payload: {}", text);
            RuntimeError::Payload(e)
        })?;

        Ok(Invocation { context, payload })
    }

    pub async fn send_response<T: Serialize + Sync>(
        &self,
        request_id: &str,
        body: &T,
    ) -> Result<(), RuntimeError> {
        let url = format!("{}/invocation/{request_id}/response", self.base_url);
        self.post(&url, body, None).await
    }

    pub async fn send_error(
        &self,
        request_id: &str,
        error_type: &str,
        error_message: &str,
    ) -> Result<(), RuntimeError> {
        let url = format!("{}/invocation/{request_id}/error", self.base_url);
        let body = ErrorRequest {
            error_message,
            error_type,
        };
        self.post(&url, &body, Some(error_type)).await
    }

    /// Reports a startup failure. The platform stops the sandbox afterwards.
    pub async fn init_error(
        &self,
        error_type: &str,
        error_message: &str,
    ) -> Result<(), RuntimeError> {
        let url = format!("{}/init/error", self.base_url);
        let body = ErrorRequest {
            error_message,
            error_type,
        };
        self.post(&url, &body, Some(error_type)).await
    }

    async fn post<T: Serialize + Sync>(
        &self,
        url: &str,
        body: &T,
        error_type: Option<&str>,
    ) -> Result<(), RuntimeError> {
        let mut request = self.client.post(url).json(body);
        if let Some(error_type) = error_type {
            request = request.header(FUNCTION_ERROR_TYPE_HEADER, error_type);
        }
        let response = request.send().await?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            debug!("HTTP Error {} - Response: {}", status, body);
            Err(RuntimeError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }
}
