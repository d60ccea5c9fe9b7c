use async_trait::async_trait;
use tracing::{debug, error};

use crate::aws::AwsError;

/// CloudWatch Logs destination of the audit trail.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EchoLogTarget {
    pub group: String,
    pub stream: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("log group or stream not found: {0}")]
    NotFound(String),
    #[error("log group or stream already exists: {0}")]
    AlreadyExists(String),
    #[error(transparent)]
    Other(#[from] AwsError),
}

#[async_trait]
pub trait LogSink: Send + Sync {
    async fn put_log_event(
        &self,
        group: &str,
        stream: &str,
        timestamp_ms: i64,
        text: &str,
    ) -> Result<(), SinkError>;

    async fn create_log_stream(&self, group: &str, stream: &str) -> Result<(), SinkError>;

    async fn create_log_group(&self, group: &str) -> Result<(), SinkError>;
}

/// Writes flushed audit text to a fixed log stream, creating the stream
/// (and its group) the first time it is missing.
#[derive(Clone, Copy)]
pub struct EchoLog<'a> {
    sink: &'a dyn LogSink,
    target: &'a EchoLogTarget,
}

impl<'a> EchoLog<'a> {
    #[must_use]
    pub fn new(sink: &'a dyn LogSink, target: &'a EchoLogTarget) -> Self {
        EchoLog { sink, target }
    }

    pub async fn write(&self, timestamp_ms: i64, text: &str) -> Result<(), SinkError> {
        let EchoLogTarget { group, stream } = self.target;
        match self
            .sink
            .put_log_event(group, stream, timestamp_ms, text)
            .await
        {
            Ok(()) => return Ok(()),
            Err(SinkError::NotFound(reason)) => {
                debug!("Echo log stream {}/{} missing: {}", group, stream, reason);
            }
            Err(e) => {
                error!("Failed to write echo log to {}/{}: {}", group, stream, e);
                return Err(e);
            }
        }

        if let Err(e) = self.create().await {
            error!("Failed to create echo log stream {}/{}: {}", group, stream, e);
            return Err(e);
        }

        // Single retry; a second failure is terminal.
        self.sink
            .put_log_event(group, stream, timestamp_ms, text)
            .await
            .inspect_err(|e| {
                error!(
                    "Failed to write echo log to {}/{} after creating it: {}",
                    group, stream, e
                );
            })
    }

    async fn create(&self) -> Result<(), SinkError> {
        let EchoLogTarget { group, stream } = self.target;
        match self.sink.create_log_stream(group, stream).await {
            Ok(()) | Err(SinkError::AlreadyExists(_)) => return Ok(()),
            Err(SinkError::NotFound(_)) => {
                debug!("Echo log group {} missing, creating it", group);
            }
            Err(e) => return Err(e),
        }

        match self.sink.create_log_group(group).await {
            Ok(()) | Err(SinkError::AlreadyExists(_)) => {}
            Err(e) => return Err(e),
        }
        match self.sink.create_log_stream(group, stream).await {
            Ok(()) | Err(SinkError::AlreadyExists(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}
