use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::aws::{AwsClient, AwsError, ServiceRequest};
use crate::dispatch::{Mailer, MessageId};

const CHARSET: &str = "UTF-8";

/// SES v2 `SendEmail` with a plain text body.
#[derive(Clone, Debug)]
pub struct SesClient {
    client: AwsClient,
}

impl SesClient {
    #[must_use]
    pub fn new(client: AwsClient) -> Self {
        SesClient { client }
    }
}

#[async_trait]
impl Mailer for SesClient {
    async fn send_mail(
        &self,
        from: &str,
        to: &[String],
        subject: &str,
        body: &str,
    ) -> Result<MessageId, AwsError> {
        let json_body = serde_json::json!({
            "FromEmailAddress": from,
            "Destination": { "ToAddresses": to },
            "Content": {
                "Simple": {
                    "Subject": { "Data": subject, "Charset": CHARSET },
                    "Body": { "Text": { "Data": body, "Charset": CHARSET } }
                }
            }
        });
        debug!("Sending mail from {} to {} recipients", from, to.len());

        let response = self
            .client
            .send(ServiceRequest {
                service: "ses",
                endpoint_prefix: "email",
                path: "/v2/email/outbound-emails",
                content_type: "application/json",
                x_amz_target: None,
                accept: None,
                body: json_body.to_string().into_bytes(),
            })
            .await?;

        let v: Value = serde_json::from_str(&response).map_err(|_| AwsError::InvalidResponse {
            service: "ses",
            body: response.clone(),
        })?;
        if let Some(message_id) = v["MessageId"].as_str() {
            Ok(message_id.to_string())
        } else {
            Err(AwsError::InvalidResponse {
                service: "ses",
                body: response,
            })
        }
    }
}
