//! One invocation end to end: decode, filter, dispatch, then flush the audit
//! trail to the console or to the echo log.

pub mod audit;
pub mod outcome;

use std::sync::Arc;

use chrono::{FixedOffset, Utc};
use serde_json::Value;
use tracing::{debug, error, info};

use crate::awslogs::decoder::decode_payload;
use crate::awslogs::filter::filter;
use crate::config::policy::MissingKeywordPolicy;
use crate::config::{Config, ConfigError};
use crate::dispatch::echo_log::{EchoLog, EchoLogTarget, LogSink};
use crate::dispatch::{Channel, Delivery, Dispatcher};
use crate::relay::audit::AuditTrail;
use crate::relay::outcome::{Outcome, RelayError};

const AUDIT_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S %:z";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InvocationContext {
    pub request_id: String,
    pub invoked_function_arn: String,
    /// Epoch milliseconds
    pub deadline_ms: Option<u64>,
}

pub struct Relay {
    channel: Channel,
    keyword: Option<String>,
    missing_keyword: MissingKeywordPolicy,
    echo_log: Option<EchoLogTarget>,
    audit_offset: FixedOffset,
    dispatcher: Dispatcher,
    log_sink: Arc<dyn LogSink>,
}

impl Relay {
    pub fn new(
        config: &Config,
        dispatcher: Dispatcher,
        log_sink: Arc<dyn LogSink>,
    ) -> Result<Self, ConfigError> {
        Ok(Relay {
            channel: config.channel()?,
            keyword: config.keyword.clone().filter(|k| !k.is_empty()),
            missing_keyword: config.missing_keyword,
            echo_log: config.echo_log()?,
            audit_offset: config.audit_offset()?,
            dispatcher,
            log_sink,
        })
    }

    /// Handles one payload and always flushes the audit trail before returning.
    pub async fn handle(&self, payload: &Value, ctx: &InvocationContext) -> Outcome {
        let (outcome, trail) = self.evaluate(payload, ctx).await;
        self.flush(trail).await;
        outcome
    }

    /// Runs the pipeline and returns the outcome with the unflushed trail.
    pub async fn evaluate(&self, payload: &Value, ctx: &InvocationContext) -> (Outcome, AuditTrail) {
        let mut trail = AuditTrail::new();
        trail.push(format_args!(
            "Triggered at: {}, Source: {}",
            Utc::now()
                .with_timezone(&self.audit_offset)
                .format(AUDIT_TIME_FORMAT),
            ctx.invoked_function_arn
        ));

        let outcome = match self.process(payload, &mut trail).await {
            Ok(delivery) => Outcome::Ok(delivery),
            Err(err) => {
                error!("Error processing log event: {}", err);
                trail.push(format_args!("Error processing log event: {err}"));
                trail.push(format_args!("Triggered log data: {payload}"));
                Outcome::from(err)
            }
        };
        (outcome, trail)
    }

    async fn process(
        &self,
        payload: &Value,
        trail: &mut AuditTrail,
    ) -> Result<Option<Delivery>, RelayError> {
        let bundle = decode_payload(payload)?;
        if bundle.is_control_message() {
            debug!("Control message for {}", bundle.log_group);
            trail.push("Control message received, nothing to forward");
            return Ok(None);
        }

        for record in &bundle.log_events {
            trail.push(format_args!("Keys in log: {:?}", record.keys()));
        }

        let matched = filter(
            &bundle.log_events,
            self.keyword.as_deref(),
            self.missing_keyword,
        );
        if matched.is_empty() {
            match &self.keyword {
                Some(keyword) => trail.push(format_args!("No logs matched the keyword : {keyword}")),
                None => trail.push("No log events to forward"),
            }
            return Ok(None);
        }

        let delivery = self
            .dispatcher
            .dispatch(&bundle, &matched, &self.channel)
            .await?;
        info!(
            "Forwarded {} of {} log events via {}",
            matched.len(),
            bundle.log_events.len(),
            delivery.channel
        );
        match &self.channel {
            Channel::Topic { .. } => trail.push(format_args!(
                "Matched logs sent via SNS: {}",
                delivery.body.as_deref().unwrap_or_default()
            )),
            Channel::Mailbox { .. } => trail.push(format_args!(
                "Log events sent via SES: {:?}",
                delivery.message_ids
            )),
        }
        Ok(Some(delivery))
    }

    async fn flush(&self, trail: AuditTrail) {
        let text = trail.flush();
        match &self.echo_log {
            Some(target) => {
                let timestamp_ms = Utc::now().timestamp_millis();
                if let Err(e) = EchoLog::new(self.log_sink.as_ref(), target)
                    .write(timestamp_ms, &text)
                    .await
                {
                    error!("Audit trail not written to echo log: {}", e);
                }
            }
            None => println!("{text}"),
        }
    }
}
