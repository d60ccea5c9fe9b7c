use httpmock::prelude::*;
use logrelay::aws::{cloudwatch_logs::CloudWatchLogsClient, ses::SesClient, sns::SnsClient};
use logrelay::config::Config;
use logrelay::config::policy::ChannelKind;
use logrelay::dispatch::Dispatcher;
use logrelay::dispatch::echo_log::{EchoLog, EchoLogTarget, SinkError};
use logrelay::relay::Relay;
use logrelay::relay::outcome::Outcome;
use std::sync::Arc;

mod common;

fn relay(config: &Config, endpoint_url: &str) -> Relay {
    let aws_client = common::aws_client(endpoint_url);
    let dispatcher = Dispatcher::new(
        Arc::new(SnsClient::new(aws_client.clone())),
        Arc::new(SesClient::new(aws_client.clone())),
    );
    Relay::new(
        config,
        dispatcher,
        Arc::new(CloudWatchLogsClient::new(aws_client)),
    )
    .expect("Failed building relay")
}

#[tokio::test]
async fn test_matched_lines_are_published_to_sns() {
    let server = MockServer::start();
    let publish_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("content-type", "application/x-www-form-urlencoded; charset=utf-8")
            .header("accept", "application/json")
            .header("x-amz-security-token", "session-token")
            .header_exists("authorization")
            .header_exists("x-amz-date")
            .body_contains("Action=Publish")
            .body_contains("TopicArn=arn%3Aaws%3Asns%3Aus-east-1%3A123456789012%3Aalerts")
            .body_contains("Subject=Log+Alert%3A+Matched+Keyword")
            .body_contains("Message=error%3A+disk+full");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"PublishResponse":{"PublishResult":{"MessageId":"94f20ce6-13c5-43a0-9a9e-ca52d816e90b","SequenceNumber":null},"ResponseMetadata":{"RequestId":"f187a3c1-376f-11df-8963-01868b7c937a"}}}"#);
    });

    let config = Config {
        sns_topic_arn: Some("arn:aws:sns:us-east-1:123456789012:alerts".to_string()),
        keyword: Some("error".to_string()),
        ..Config::default()
    };
    let relay = relay(&config, &server.base_url());

    let outcome = relay
        .handle(
            &common::log_batch(&["error: disk full", "info: ok"]),
            &common::invocation_context(),
        )
        .await;

    publish_mock.assert();
    match outcome {
        Outcome::Ok(Some(delivery)) => {
            assert_eq!(delivery.channel, "SNS");
            assert_eq!(
                delivery.message_ids,
                vec!["94f20ce6-13c5-43a0-9a9e-ca52d816e90b".to_string()]
            );
            assert_eq!(delivery.body.as_deref(), Some("error: disk full"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_rejected_publish_is_fatal() {
    let server = MockServer::start();
    let publish_mock = server.mock(|when, then| {
        when.method(POST).path("/");
        then.status(404)
            .header("content-type", "text/xml")
            .body("<ErrorResponse><Error><Type>Sender</Type><Code>NotFound</Code><Message>Topic does not exist</Message></Error><RequestId>9dd01905</RequestId></ErrorResponse>");
    });

    let config = Config {
        sns_topic_arn: Some("arn:aws:sns:us-east-1:123456789012:gone".to_string()),
        ..Config::default()
    };
    let relay = relay(&config, &server.base_url());

    let outcome = relay
        .handle(
            &common::log_batch(&["error: disk full"]),
            &common::invocation_context(),
        )
        .await;

    publish_mock.assert_hits(1);
    match outcome {
        Outcome::Fatal(reason) => {
            assert!(reason.contains("sns returned 404 NotFound: Topic does not exist"));
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_one_mail_per_event() {
    let server = MockServer::start();
    let send_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/v2/email/outbound-emails")
            .header("content-type", "application/json")
            .header_exists("authorization")
            .body_contains(r#""FromEmailAddress":"alerts@example.com""#)
            .body_contains(r#""ToAddresses":["ops@example.com"]"#)
            .body_contains("Log Group: /aws/lambda/checkout");
        then.status(200)
            .header("content-type", "application/json")
            .body(r#"{"MessageId":"0100018fc5b3a7c1-ses"}"#);
    });

    let config = Config {
        channel: ChannelKind::MailboxPerEvent,
        mail_from: Some("alerts@example.com".to_string()),
        mail_to: vec!["ops@example.com".to_string()],
        ..Config::default()
    };
    let relay = relay(&config, &server.base_url());

    let outcome = relay
        .handle(
            &common::log_batch(&["error: disk full", "error: inode exhausted"]),
            &common::invocation_context(),
        )
        .await;

    send_mock.assert_hits(2);
    match outcome {
        Outcome::Ok(Some(delivery)) => assert_eq!(delivery.message_ids.len(), 2),
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[tokio::test]
async fn test_malformed_batch_never_reaches_sns() {
    let server = MockServer::start();
    let publish_mock = server.mock(|when, then| {
        when.method(POST).path("/");
        then.status(200);
    });

    let config = Config {
        sns_topic_arn: Some("arn:aws:sns:us-east-1:123456789012:alerts".to_string()),
        ..Config::default()
    };
    let relay = relay(&config, &server.base_url());

    let outcome = relay
        .handle(
            &serde_json::json!({ "awslogs": { "data": "bm90IGNvbXByZXNzZWQ=" } }),
            &common::invocation_context(),
        )
        .await;

    publish_mock.assert_hits(0);
    assert!(matches!(outcome, Outcome::Recovered(_)));
}

#[tokio::test]
async fn test_echo_log_creates_missing_stream_once() {
    let server = MockServer::start();
    let put_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "Logs_20140328.PutLogEvents")
            .header("content-type", "application/x-amz-json-1.1")
            .body_contains(r#""logGroupName":"relay-audit""#)
            .body_contains(r#""message":"Triggered at: now""#);
        then.status(400)
            .header("content-type", "application/x-amz-json-1.1")
            .body(r#"{"__type":"ResourceNotFoundException","message":"The specified log stream does not exist."}"#);
    });
    let create_stream_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "Logs_20140328.CreateLogStream")
            .body_contains(r#""logStreamName":"actions""#);
        then.status(200).body("{}");
    });
    let create_group_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "Logs_20140328.CreateLogGroup");
        then.status(200).body("{}");
    });

    let sink = CloudWatchLogsClient::new(common::aws_client(&server.base_url()));
    let target = EchoLogTarget {
        group: "relay-audit".to_string(),
        stream: "actions".to_string(),
    };
    let result = EchoLog::new(&sink, &target)
        .write(1_717_060_211_000, "Triggered at: now")
        .await;

    // The stream is created once and the put retried once; the second
    // NotFound is returned as is.
    assert!(matches!(result, Err(SinkError::NotFound(_))));
    put_mock.assert_hits(2);
    create_stream_mock.assert_hits(1);
    create_group_mock.assert_hits(0);
}

#[tokio::test]
async fn test_echo_log_tolerates_existing_group() {
    let server = MockServer::start();
    let put_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "Logs_20140328.PutLogEvents");
        then.status(400)
            .body(r#"{"__type":"ResourceNotFoundException","message":"The specified log group does not exist."}"#);
    });
    let create_stream_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "Logs_20140328.CreateLogStream");
        then.status(400)
            .body(r#"{"__type":"ResourceNotFoundException","message":"The specified log group does not exist."}"#);
    });
    let create_group_mock = server.mock(|when, then| {
        when.method(POST)
            .path("/")
            .header("x-amz-target", "Logs_20140328.CreateLogGroup");
        then.status(400)
            .body(r#"{"__type":"ResourceAlreadyExistsException","message":"The specified log group already exists"}"#);
    });

    let sink = CloudWatchLogsClient::new(common::aws_client(&server.base_url()));
    let target = EchoLogTarget {
        group: "relay-audit".to_string(),
        stream: "actions".to_string(),
    };
    let result = EchoLog::new(&sink, &target)
        .write(1_717_060_211_000, "audit")
        .await;

    // Creating the stream after the group still reports NotFound, which is
    // terminal; the put is never retried.
    assert!(matches!(result, Err(SinkError::NotFound(_))));
    put_mock.assert_hits(1);
    create_group_mock.assert_hits(1);
    create_stream_mock.assert_hits(2);
}
