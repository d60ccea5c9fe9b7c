//! Minimal signed clients for the AWS APIs the relay calls.

pub mod cloudwatch_logs;
pub mod ses;
pub mod sigv4;
pub mod sns;

use std::sync::Arc;

use chrono::Utc;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::debug;

use crate::aws::sigv4::{RequestArgs, build_signed_headers};
use crate::config::{AwsConfig, get_aws_domain_by_region};

lazy_static! {
    static ref XML_CODE_REGEX: Regex =
        Regex::new(r"<Code>([^<]*)</Code>").expect("failed creating regex");
    static ref XML_MESSAGE_REGEX: Regex =
        Regex::new(r"<Message>([^<]*)</Message>").expect("failed creating regex");
}

#[derive(Debug, thiserror::Error)]
pub enum AwsError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("failed to sign request: {0}")]
    Signing(String),
    #[error("invalid endpoint url {0}")]
    Endpoint(String),
    #[error("{service} returned {status} {code}: {message}")]
    Service {
        service: &'static str,
        status: u16,
        code: String,
        message: String,
    },
    #[error("unexpected {service} response: {body}")]
    InvalidResponse { service: &'static str, body: String },
}

impl AwsError {
    /// The service error code, e.g. `ResourceNotFoundException`.
    #[must_use]
    pub fn code(&self) -> Option<&str> {
        match self {
            AwsError::Service { code, .. } => Some(code.as_str()),
            _ => None,
        }
    }
}

pub(crate) struct ServiceRequest<'a> {
    /// Signing name, also used to label errors.
    pub(crate) service: &'static str,
    /// First label of the regional host name.
    pub(crate) endpoint_prefix: &'static str,
    pub(crate) path: &'a str,
    pub(crate) content_type: &'a str,
    pub(crate) x_amz_target: Option<&'a str>,
    pub(crate) accept: Option<&'a str>,
    pub(crate) body: Vec<u8>,
}

/// Shared HTTP client and credentials for every service client.
#[derive(Clone, Debug)]
pub struct AwsClient {
    http: reqwest::Client,
    config: Arc<AwsConfig>,
}

impl AwsClient {
    #[must_use]
    pub fn new(http: reqwest::Client, config: Arc<AwsConfig>) -> Self {
        AwsClient { http, config }
    }

    /// Base URL and `host` header value for a service.
    fn endpoint(&self, endpoint_prefix: &str) -> Result<(String, String), AwsError> {
        if let Some(endpoint_url) = &self.config.endpoint_url {
            let url = reqwest::Url::parse(endpoint_url)
                .map_err(|err| AwsError::Endpoint(format!("{endpoint_url}: {err}")))?;
            let host = url
                .host_str()
                .ok_or_else(|| AwsError::Endpoint(endpoint_url.clone()))?;
            let host = match url.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
            return Ok((endpoint_url.trim_end_matches('/').to_string(), host));
        }

        let host = format!(
            "{}.{}.{}",
            endpoint_prefix,
            self.config.region,
            get_aws_domain_by_region(&self.config.region)
        );
        Ok((format!("https://{host}"), host))
    }

    pub(crate) async fn send(&self, request: ServiceRequest<'_>) -> Result<String, AwsError> {
        let (base_url, host) = self.endpoint(request.endpoint_prefix)?;

        let mut headers = build_signed_headers(
            &self.config,
            &RequestArgs {
                service: request.service,
                host: &host,
                path: request.path,
                content_type: request.content_type,
                body: &request.body,
                time: Utc::now(),
                x_amz_target: request.x_amz_target,
            },
        )?;
        if let Some(accept) = request.accept {
            headers.insert(
                ACCEPT,
                HeaderValue::from_str(accept).map_err(|err| AwsError::Signing(err.to_string()))?,
            );
        }

        let response = self
            .http
            .post(format!("{base_url}{}", request.path))
            .headers(headers)
            .body(request.body)
            .send()
            .await?;

        let status = response.status();
        let response_headers = response.headers().clone();
        let body = response.text().await?;

        if status.is_success() {
            Ok(body)
        } else {
            debug!("{} request failed with {}: {}", request.service, status, body);
            Err(service_error(
                request.service,
                status.as_u16(),
                &response_headers,
                &body,
            ))
        }
    }
}

/// Reads the error code and message from whichever protocol the service speaks:
/// the `x-amzn-ErrorType` header, a JSON body (`__type`, `code`, `Error.Code`)
/// or a query-protocol XML body.
fn service_error(service: &'static str, status: u16, headers: &HeaderMap, body: &str) -> AwsError {
    let json: Option<Value> = serde_json::from_str(body).ok();
    let json_field = |keys: &[&str]| -> Option<String> {
        let json = json.as_ref()?;
        keys.iter().find_map(|key| {
            json.get(key)
                .or_else(|| json.get("Error").and_then(|error| error.get(key)))
                .and_then(Value::as_str)
                .map(String::from)
        })
    };

    let code = headers
        .get("x-amzn-ErrorType")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(':').next())
        .map(String::from)
        .or_else(|| json_field(&["__type", "code", "Code"]))
        .or_else(|| {
            XML_CODE_REGEX
                .captures(body)
                .map(|captures| captures[1].to_string())
        })
        .map(|code| code.rsplit('#').next().unwrap_or_default().to_string())
        .unwrap_or_else(|| "Unknown".to_string());

    let message = json_field(&["message", "Message"])
        .or_else(|| {
            XML_MESSAGE_REGEX
                .captures(body)
                .map(|captures| captures[1].to_string())
        })
        .unwrap_or_else(|| body.to_string());

    AwsError::Service {
        service,
        status,
        code,
        message,
    }
}
