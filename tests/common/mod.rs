#![allow(dead_code)]

use base64::prelude::*;
use flate2::Compression;
use flate2::write::GzEncoder;
use logrelay::aws::AwsClient;
use logrelay::config::AwsConfig;
use logrelay::relay::InvocationContext;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;

pub const FUNCTION_ARN: &str = "arn:aws:lambda:us-east-1:123456789012:function:relay";

/// Signed client whose every service call goes to `endpoint_url`.
pub fn aws_client(endpoint_url: &str) -> AwsClient {
    AwsClient::new(
        reqwest::Client::new(),
        Arc::new(AwsConfig {
            region: "us-east-1".to_string(),
            aws_access_key_id: "AKIDEXAMPLE".to_string(),
            aws_secret_access_key: "wJalrXUtnFEMI/K7MDENG+bPxRfiCYEXAMPLEKEY".to_string(),
            aws_session_token: "session-token".to_string(),
            function_name: "relay".to_string(),
            endpoint_url: Some(endpoint_url.to_string()),
        }),
    )
}

/// `{"awslogs": {"data": ...}}` holding one gzipped batch of `messages`.
pub fn log_batch(messages: &[&str]) -> Value {
    let events: Vec<Value> = messages
        .iter()
        .enumerate()
        .map(|(i, message)| {
            serde_json::json!({
                "id": format!("3759{i}"),
                "timestamp": 1_717_060_211_000_i64 + i64::try_from(i).unwrap_or_default(),
                "message": message,
            })
        })
        .collect();
    let document = serde_json::json!({
        "messageType": "DATA_MESSAGE",
        "owner": "123456789012",
        "logGroup": "/aws/lambda/checkout",
        "logStream": "2024/05/30/[$LATEST]abc",
        "subscriptionFilters": ["errors"],
        "logEvents": events,
    });

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(document.to_string().as_bytes())
        .expect("Failed compressing batch");
    let compressed = encoder.finish().expect("Failed compressing batch");
    serde_json::json!({ "awslogs": { "data": BASE64_STANDARD.encode(compressed) } })
}

pub fn invocation_context() -> InvocationContext {
    InvocationContext {
        request_id: "8476a536-e9f4-11e8-9739-2dfe598c3fcd".to_string(),
        invoked_function_arn: FUNCTION_ARN.to_string(),
        deadline_ms: Some(1_717_060_271_000),
    }
}
