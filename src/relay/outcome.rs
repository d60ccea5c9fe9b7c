use serde::Serialize;

use crate::awslogs::decoder::DecodeError;
use crate::config::policy::ErrorPolicy;
use crate::dispatch::{Delivery, DispatchError};

#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("malformed log batch: {0}")]
    MalformedBatch(#[from] DecodeError),
    #[error(transparent)]
    Delivery(#[from] DispatchError),
}

/// Result of one invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Handled. `None` when there was nothing to send.
    Ok(Option<Delivery>),
    /// A failure a retry cannot fix, such as a malformed batch.
    Recovered(String),
    /// The alert was lost; a platform retry may deliver it.
    Fatal(String),
}

impl From<RelayError> for Outcome {
    fn from(err: RelayError) -> Self {
        match err {
            RelayError::MalformedBatch(_) => Outcome::Recovered(err.to_string()),
            RelayError::Delivery(_) => Outcome::Fatal(err.to_string()),
        }
    }
}

impl Outcome {
    /// Whether the invocation is reported to the platform as failed.
    #[must_use]
    pub fn is_failure(&self, policy: ErrorPolicy) -> bool {
        match (self, policy) {
            (Outcome::Ok(_), _)
            | (_, ErrorPolicy::Swallow)
            | (Outcome::Recovered(_), ErrorPolicy::RaiseFatal) => false,
            (Outcome::Fatal(_), _) | (Outcome::Recovered(_), ErrorPolicy::Raise) => true,
        }
    }

    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        match self {
            Outcome::Ok(_) => None,
            Outcome::Recovered(reason) | Outcome::Fatal(reason) => Some(reason),
        }
    }

    #[must_use]
    pub fn error_type(&self) -> &'static str {
        match self {
            Outcome::Ok(_) => "None",
            Outcome::Recovered(_) => "MalformedBatch",
            Outcome::Fatal(_) => "DeliveryError",
        }
    }

    /// Body of the invocation response.
    #[must_use]
    pub fn summary(&self) -> Summary<'_> {
        match self {
            Outcome::Ok(delivery) => Summary {
                outcome: "ok",
                message_ids: Some(
                    delivery
                        .as_ref()
                        .map(|d| d.message_ids.as_slice())
                        .unwrap_or_default(),
                ),
                reason: None,
            },
            Outcome::Recovered(reason) => Summary {
                outcome: "recovered",
                message_ids: None,
                reason: Some(reason.as_str()),
            },
            Outcome::Fatal(reason) => Summary {
                outcome: "fatal",
                message_ids: None,
                reason: Some(reason.as_str()),
            },
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary<'a> {
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_ids: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'a str>,
}
