//! Delivery of filtered log records to a notification channel.

pub mod echo_log;

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use tracing::{debug, error};

use crate::aws::AwsError;
use crate::awslogs::{LogBundle, LogRecord};

pub const TOPIC_SUBJECT: &str = "Log Alert";
pub const KEYWORD_TOPIC_SUBJECT: &str = "Log Alert: Matched Keyword";
pub const MAIL_SUBJECT: &str = "Log Update Notification";

/// Identifier assigned by the provider to an accepted message.
pub type MessageId = String;

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic_arn: &str, subject: &str, body: &str)
    -> Result<MessageId, AwsError>;
}

#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_mail(
        &self,
        from: &str,
        to: &[String],
        subject: &str,
        body: &str,
    ) -> Result<MessageId, AwsError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailMode {
    /// One mail holding every record.
    Aggregate,
    /// One mail per record.
    PerEvent,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Channel {
    Topic {
        topic_arn: String,
        subject: String,
    },
    Mailbox {
        from: String,
        to: Vec<String>,
        subject: String,
        mode: MailMode,
    },
}

impl Channel {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Channel::Topic { .. } => "SNS",
            Channel::Mailbox { .. } => "SES",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Channel::Topic { topic_arn, .. } => write!(f, "topic {topic_arn}"),
            Channel::Mailbox { to, .. } => write!(f, "mailbox {}", to.join(", ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub channel: &'static str,
    pub message_ids: Vec<MessageId>,
    /// The text sent, for single-message channels.
    pub body: Option<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to deliver to {channel}: {source}")]
    Delivery {
        channel: String,
        #[source]
        source: AwsError,
    },
    #[error("failed to render log event: {0}")]
    Render(#[from] serde_json::Error),
}

pub type DispatchResult = Result<Delivery, DispatchError>;

#[derive(Clone)]
pub struct Dispatcher {
    publisher: Arc<dyn Publisher>,
    mailer: Arc<dyn Mailer>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(publisher: Arc<dyn Publisher>, mailer: Arc<dyn Mailer>) -> Self {
        Dispatcher { publisher, mailer }
    }

    /// Sends `records` through `channel`. Callers never pass an empty list.
    pub async fn dispatch(
        &self,
        bundle: &LogBundle,
        records: &[LogRecord],
        channel: &Channel,
    ) -> DispatchResult {
        let delivery_error = |source: AwsError| {
            error!("Failed to deliver to {}: {}", channel, source);
            DispatchError::Delivery {
                channel: channel.to_string(),
                source,
            }
        };

        match channel {
            Channel::Topic { topic_arn, subject } => {
                let body = join_messages(records);
                let message_id = self
                    .publisher
                    .publish(topic_arn, subject, &body)
                    .await
                    .map_err(delivery_error)?;
                debug!("Published {} records as {}", records.len(), message_id);
                Ok(Delivery {
                    channel: channel.name(),
                    message_ids: vec![message_id],
                    body: Some(body),
                })
            }
            Channel::Mailbox {
                from,
                to,
                subject,
                mode: MailMode::Aggregate,
            } => {
                let body = join_messages(records);
                let message_id = self
                    .mailer
                    .send_mail(from, to, subject, &body)
                    .await
                    .map_err(delivery_error)?;
                Ok(Delivery {
                    channel: channel.name(),
                    message_ids: vec![message_id],
                    body: Some(body),
                })
            }
            Channel::Mailbox {
                from,
                to,
                subject,
                mode: MailMode::PerEvent,
            } => {
                let mut message_ids = Vec::with_capacity(records.len());
                for record in records {
                    let body = event_mail_body(bundle, record)?;
                    let message_id = self
                        .mailer
                        .send_mail(from, to, subject, &body)
                        .await
                        .map_err(delivery_error)?;
                    debug!("Mailed log event {:?} as {}", record.id, message_id);
                    message_ids.push(message_id);
                }
                Ok(Delivery {
                    channel: channel.name(),
                    message_ids,
                    body: None,
                })
            }
        }
    }
}

#[must_use]
pub fn join_messages(records: &[LogRecord]) -> String {
    records
        .iter()
        .map(|record| record.message.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn event_mail_body(bundle: &LogBundle, record: &LogRecord) -> Result<String, serde_json::Error> {
    Ok(format!(
        "Log Group: {}\nLog Stream: {}\nLog Event: {}\n",
        bundle.log_group,
        bundle.log_stream,
        to_pretty_json(record)?
    ))
}

fn to_pretty_json<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"    "));
    value.serialize(&mut serializer)?;
    // serde_json only ever writes UTF-8.
    Ok(String::from_utf8_lossy(&buf).into_owned())
}
