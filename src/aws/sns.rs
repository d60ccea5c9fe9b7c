use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use tracing::debug;

use crate::aws::{AwsClient, AwsError, ServiceRequest};
use crate::dispatch::{MessageId, Publisher};

const SNS_API_VERSION: &str = "2010-03-31";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

lazy_static! {
    static ref MESSAGE_ID_REGEX: Regex =
        Regex::new(r"<MessageId>([^<]+)</MessageId>").expect("failed creating regex");
}

/// SNS `Publish` over the query protocol.
#[derive(Clone, Debug)]
pub struct SnsClient {
    client: AwsClient,
}

impl SnsClient {
    #[must_use]
    pub fn new(client: AwsClient) -> Self {
        SnsClient { client }
    }
}

#[async_trait]
impl Publisher for SnsClient {
    async fn publish(
        &self,
        topic_arn: &str,
        subject: &str,
        body: &str,
    ) -> Result<MessageId, AwsError> {
        let form = publish_form(topic_arn, subject, body);
        debug!("Publishing {} bytes to {}", body.len(), topic_arn);

        let response = self
            .client
            .send(ServiceRequest {
                service: "sns",
                endpoint_prefix: "sns",
                path: "/",
                content_type: FORM_CONTENT_TYPE,
                x_amz_target: None,
                accept: Some("application/json"),
                body: form.into_bytes(),
            })
            .await?;

        parse_message_id(&response).ok_or(AwsError::InvalidResponse {
            service: "sns",
            body: response,
        })
    }
}

fn publish_form(topic_arn: &str, subject: &str, body: &str) -> String {
    url::form_urlencoded::Serializer::new(String::new())
        .append_pair("Action", "Publish")
        .append_pair("Version", SNS_API_VERSION)
        .append_pair("TopicArn", topic_arn)
        .append_pair("Subject", subject)
        .append_pair("Message", body)
        .finish()
}

/// SNS answers in JSON when asked to, and in XML otherwise.
fn parse_message_id(response: &str) -> Option<MessageId> {
    if let Ok(json) = serde_json::from_str::<Value>(response) {
        return json
            .pointer("/PublishResponse/PublishResult/MessageId")
            .and_then(Value::as_str)
            .map(String::from);
    }
    MESSAGE_ID_REGEX
        .captures(response)
        .map(|captures| captures[1].to_string())
}
