use async_trait::async_trait;
use serde_json::json;

use crate::aws::{AwsClient, AwsError, ServiceRequest};
use crate::dispatch::echo_log::{LogSink, SinkError};

const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";
const TARGET_PREFIX: &str = "Logs_20140328";

/// CloudWatch Logs over the JSON 1.1 protocol.
#[derive(Clone, Debug)]
pub struct CloudWatchLogsClient {
    client: AwsClient,
}

impl CloudWatchLogsClient {
    #[must_use]
    pub fn new(client: AwsClient) -> Self {
        CloudWatchLogsClient { client }
    }

    async fn call(&self, operation: &str, body: &serde_json::Value) -> Result<(), SinkError> {
        let target = format!("{TARGET_PREFIX}.{operation}");
        self.client
            .send(ServiceRequest {
                service: "logs",
                endpoint_prefix: "logs",
                path: "/",
                content_type: JSON_CONTENT_TYPE,
                x_amz_target: Some(&target),
                accept: None,
                body: body.to_string().into_bytes(),
            })
            .await
            .map(|_| ())
            .map_err(SinkError::from_aws)
    }
}

impl SinkError {
    fn from_aws(err: AwsError) -> Self {
        match err.code() {
            Some("ResourceNotFoundException") => SinkError::NotFound(err.to_string()),
            Some("ResourceAlreadyExistsException") => SinkError::AlreadyExists(err.to_string()),
            _ => SinkError::Other(err),
        }
    }
}

#[async_trait]
impl LogSink for CloudWatchLogsClient {
    async fn put_log_event(
        &self,
        group: &str,
        stream: &str,
        timestamp_ms: i64,
        text: &str,
    ) -> Result<(), SinkError> {
        self.call(
            "PutLogEvents",
            &json!({
                "logGroupName": group,
                "logStreamName": stream,
                "logEvents": [{ "timestamp": timestamp_ms, "message": text }],
            }),
        )
        .await
    }

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), SinkError> {
        self.call(
            "CreateLogStream",
            &json!({ "logGroupName": group, "logStreamName": stream }),
        )
        .await
    }

    async fn create_log_group(&self, group: &str) -> Result<(), SinkError> {
        self.call("CreateLogGroup", &json!({ "logGroupName": group }))
            .await
    }
}
