pub mod aws;
pub mod log_level;
pub mod policy;

use std::env;
use std::path::Path;

use chrono::FixedOffset;
use figment::providers::{Format, Serialized, Yaml};
use figment::{Figment, providers::Env};
use serde::{Deserialize, Deserializer};
use serde_aux::field_attributes::deserialize_bool_from_anything;
use serde_json::Value;

pub use crate::config::aws::{AwsConfig, get_aws_domain_by_region};
use crate::config::log_level::LogLevel;
use crate::config::policy::{ChannelKind, ErrorPolicy, MissingKeywordPolicy};
use crate::dispatch::{
    Channel, KEYWORD_TOPIC_SUBJECT, MAIL_SUBJECT, MailMode, TOPIC_SUBJECT,
    echo_log::EchoLogTarget,
};
use crate::CONFIG_FILE_NAME;

/// Unprefixed variable names the first handlers were deployed with.
const LEGACY_ENV_KEYS: [&str; 4] = [
    "SNS_TOPIC_ARN",
    "LOG_GROUP_NAME",
    "LOG_STREAM_NAME",
    "LOG_SWITCH",
];

/// Read verbatim, highest precedence first. Figment's `Env` would parse
/// `[ERROR]` as an array and `007` as a number.
const KEYWORD_ENV_KEYS: [&str; 2] = ["LOGRELAY_KEYWORD", "KEYWORD"];

#[derive(Debug, PartialEq, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    pub log_level: LogLevel,
    pub channel: ChannelKind,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub sns_topic_arn: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub mail_from: Option<String>,
    #[serde(deserialize_with = "deserialize_address_list")]
    pub mail_to: Vec<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub subject: Option<String>,
    #[serde(deserialize_with = "deserialize_keyword")]
    pub keyword: Option<String>,
    pub missing_keyword: MissingKeywordPolicy,
    // Echo log
    #[serde(deserialize_with = "deserialize_bool_from_anything")]
    pub log_switch: bool,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub log_group_name: Option<String>,
    #[serde(deserialize_with = "deserialize_optional_string")]
    pub log_stream_name: Option<String>,
    pub error_policy: ErrorPolicy,
    pub audit_utc_offset_hours: i32,
    /// HTTP timeout in seconds
    pub http_timeout: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            log_level: LogLevel::default(),
            channel: ChannelKind::default(),
            sns_topic_arn: None,
            mail_from: None,
            mail_to: vec![],
            subject: None,
            keyword: None,
            missing_keyword: MissingKeywordPolicy::default(),
            log_switch: false,
            log_group_name: None,
            log_stream_name: None,
            error_policy: ErrorPolicy::default(),
            audit_utc_offset_hours: 0,
            http_timeout: 10,
        }
    }
}

#[derive(Debug, PartialEq, thiserror::Error)]
#[allow(clippy::module_name_repetitions)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    ParseError(String),
    #[error("missing required configuration value: {0}")]
    Missing(&'static str),
}

impl Config {
    /// Builds the notification channel selected by `channel`.
    pub fn channel(&self) -> Result<Channel, ConfigError> {
        match self.channel {
            ChannelKind::Topic => {
                let topic_arn = self
                    .sns_topic_arn
                    .clone()
                    .ok_or(ConfigError::Missing("sns_topic_arn"))?;
                let default_subject = if self.keyword.is_some() {
                    KEYWORD_TOPIC_SUBJECT
                } else {
                    TOPIC_SUBJECT
                };
                Ok(Channel::Topic {
                    topic_arn,
                    subject: self.subject_or(default_subject),
                })
            }
            ChannelKind::Mailbox | ChannelKind::MailboxPerEvent => {
                let from = self
                    .mail_from
                    .clone()
                    .ok_or(ConfigError::Missing("mail_from"))?;
                if self.mail_to.is_empty() {
                    return Err(ConfigError::Missing("mail_to"));
                }
                let mode = if self.channel == ChannelKind::Mailbox {
                    MailMode::Aggregate
                } else {
                    MailMode::PerEvent
                };
                Ok(Channel::Mailbox {
                    from,
                    to: self.mail_to.clone(),
                    subject: self.subject_or(MAIL_SUBJECT),
                    mode,
                })
            }
        }
    }

    /// The echo-log target, present only when `log_switch` is on.
    pub fn echo_log(&self) -> Result<Option<EchoLogTarget>, ConfigError> {
        if !self.log_switch {
            return Ok(None);
        }
        let group = self
            .log_group_name
            .clone()
            .ok_or(ConfigError::Missing("log_group_name"))?;
        let stream = self
            .log_stream_name
            .clone()
            .ok_or(ConfigError::Missing("log_stream_name"))?;
        Ok(Some(EchoLogTarget { group, stream }))
    }

    pub fn audit_offset(&self) -> Result<FixedOffset, ConfigError> {
        if !(-23..=23).contains(&self.audit_utc_offset_hours) {
            return Err(ConfigError::ParseError(format!(
                "audit_utc_offset_hours out of range: {}",
                self.audit_utc_offset_hours
            )));
        }
        FixedOffset::east_opt(self.audit_utc_offset_hours * 3600).ok_or_else(|| {
            ConfigError::ParseError(format!(
                "invalid audit_utc_offset_hours: {}",
                self.audit_utc_offset_hours
            ))
        })
    }

    /// Checks that every value required by the selected variant is present.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.channel()?;
        self.echo_log()?;
        self.audit_offset()?;
        Ok(())
    }

    fn subject_or(&self, default_subject: &str) -> String {
        self.subject
            .clone()
            .unwrap_or_else(|| default_subject.to_string())
    }
}

#[allow(clippy::module_name_repetitions)]
pub fn get_config(config_directory: &Path) -> Result<Config, ConfigError> {
    let path = config_directory.join(CONFIG_FILE_NAME);

    let mut figment = Figment::new()
        .merge(Yaml::file(&path))
        .merge(Env::raw().only(&LEGACY_ENV_KEYS))
        .merge(Env::prefixed("LOGRELAY_").ignore(&["KEYWORD"]));
    if let Some(keyword) = KEYWORD_ENV_KEYS.iter().find_map(|key| env::var(key).ok()) {
        figment = figment.merge(Serialized::default("keyword", keyword));
    }

    let config: Config = figment.extract().map_err(|err| {
        println!("Failed to parse logrelay config: {err}");
        ConfigError::ParseError(err.to_string())
    })?;

    config.validate()?;
    Ok(config)
}

fn deserialize_optional_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::String(s) => {
            if s.trim().is_empty() {
                Ok(None)
            } else {
                Ok(Some(s))
            }
        }
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Null => Ok(None),
        _ => Err(serde::de::Error::custom("expected a string")),
    }
}

// The keyword is a literal substring, so surrounding spaces are kept and only
// an empty value means "no keyword".
fn deserialize_keyword<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(s) if s.is_empty() => Ok(None),
        Value::String(s) => Ok(Some(s)),
        Value::Number(n) => Ok(Some(n.to_string())),
        Value::Bool(b) => Ok(Some(b.to_string())),
        Value::Null => Ok(None),
        _ => Err(serde::de::Error::custom("expected a string")),
    }
}

// Accepts "a@example.com, b@example.com" from the environment or a YAML list.
fn deserialize_address_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    let addresses = match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(String::from)
            .collect(),
        Value::Array(a) => a
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                _ => None,
            })
            .collect(),
        Value::Null => vec![],
        _ => {
            return Err(serde::de::Error::custom(
                "expected a comma separated string or a list of addresses",
            ));
        }
    };
    Ok(addresses)
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_missing_topic_arn() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            let config = get_config(Path::new("")).expect_err("should reject missing topic");
            assert_eq!(config, ConfigError::Missing("sns_topic_arn"));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_parse_legacy_env() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("SNS_TOPIC_ARN", "arn:aws:sns:ap-northeast-1:123456789012:alerts");
            jail.set_env("KEYWORD", "ERROR");
            jail.set_env("LOG_SWITCH", "true");
            jail.set_env("LOG_GROUP_NAME", "relay-audit");
            jail.set_env("LOG_STREAM_NAME", "actions");
            let config = get_config(Path::new("")).expect("should parse config");
            assert_eq!(
                config.sns_topic_arn,
                Some("arn:aws:sns:ap-northeast-1:123456789012:alerts".to_string())
            );
            assert_eq!(config.keyword, Some("ERROR".to_string()));
            assert!(config.log_switch);
            assert_eq!(
                config.echo_log().expect("echo log target"),
                Some(EchoLogTarget {
                    group: "relay-audit".to_string(),
                    stream: "actions".to_string(),
                })
            );
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_prefixed_env_wins_over_legacy() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("SNS_TOPIC_ARN", "arn:legacy");
            jail.set_env("LOGRELAY_SNS_TOPIC_ARN", "arn:prefixed");
            let config = get_config(Path::new("")).expect("should parse config");
            assert_eq!(config.sns_topic_arn, Some("arn:prefixed".to_string()));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_env_wins_over_yaml() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                CONFIG_FILE_NAME,
                r"
                sns_topic_arn: arn:yaml
                keyword: yaml-keyword
            ",
            )?;
            jail.set_env("LOGRELAY_KEYWORD", "env-keyword");
            let config = get_config(Path::new("")).expect("should parse config");
            assert_eq!(config.sns_topic_arn, Some("arn:yaml".to_string()));
            assert_eq!(config.keyword, Some("env-keyword".to_string()));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_empty_keyword_is_absent() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("SNS_TOPIC_ARN", "arn:topic");
            jail.set_env("KEYWORD", "");
            let config = get_config(Path::new("")).expect("should parse config");
            assert_eq!(config.keyword, None);
            assert_eq!(
                config.channel().expect("topic channel"),
                Channel::Topic {
                    topic_arn: "arn:topic".to_string(),
                    subject: TOPIC_SUBJECT.to_string(),
                }
            );
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_keyword_selects_matched_subject() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("SNS_TOPIC_ARN", "arn:topic");
            jail.set_env("KEYWORD", "error");
            let config = get_config(Path::new("")).expect("should parse config");
            assert_eq!(
                config.channel().expect("topic channel"),
                Channel::Topic {
                    topic_arn: "arn:topic".to_string(),
                    subject: "Log Alert: Matched Keyword".to_string(),
                }
            );
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_numeric_keyword() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("SNS_TOPIC_ARN", "arn:topic");
            jail.set_env("KEYWORD", "503");
            let config = get_config(Path::new("")).expect("should parse config");
            assert_eq!(config.keyword, Some("503".to_string()));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_keyword_is_taken_verbatim() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("SNS_TOPIC_ARN", "arn:topic");
            for keyword in ["[ERROR]", "007", "1.50", " error ", "true"] {
                jail.set_env("KEYWORD", keyword);
                let config = get_config(Path::new("")).expect("should parse config");
                assert_eq!(config.keyword, Some(keyword.to_string()));
            }
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_prefixed_keyword_wins_verbatim() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                CONFIG_FILE_NAME,
                r"
                sns_topic_arn: arn:yaml
                keyword: yaml-keyword
            ",
            )?;
            jail.set_env("KEYWORD", "legacy");
            jail.set_env("LOGRELAY_KEYWORD", "{level=ERROR}");
            let config = get_config(Path::new("")).expect("should parse config");
            assert_eq!(config.keyword, Some("{level=ERROR}".to_string()));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_yaml_keyword_without_env() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                CONFIG_FILE_NAME,
                r#"
                sns_topic_arn: arn:yaml
                keyword: "[WARN]"
            "#,
            )?;
            let config = get_config(Path::new("")).expect("should parse config");
            assert_eq!(config.keyword, Some("[WARN]".to_string()));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_mailbox_per_event() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("LOGRELAY_CHANNEL", "mailbox_per_event");
            jail.set_env("LOGRELAY_MAIL_FROM", "alerts@example.com");
            jail.set_env("LOGRELAY_MAIL_TO", "ops@example.com, oncall@example.com");
            let config = get_config(Path::new("")).expect("should parse config");
            assert_eq!(
                config.channel().expect("mailbox channel"),
                Channel::Mailbox {
                    from: "alerts@example.com".to_string(),
                    to: vec![
                        "ops@example.com".to_string(),
                        "oncall@example.com".to_string()
                    ],
                    subject: "Log Update Notification".to_string(),
                    mode: MailMode::PerEvent,
                }
            );
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_mailbox_list_from_yaml() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                CONFIG_FILE_NAME,
                r"
                channel: mailbox
                mail_from: alerts@example.com
                mail_to:
                  - ops@example.com
                subject: Nightly batch
            ",
            )?;
            let config = get_config(Path::new("")).expect("should parse config");
            assert_eq!(
                config.channel().expect("mailbox channel"),
                Channel::Mailbox {
                    from: "alerts@example.com".to_string(),
                    to: vec!["ops@example.com".to_string()],
                    subject: "Nightly batch".to_string(),
                    mode: MailMode::Aggregate,
                }
            );
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_mailbox_requires_recipients() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("LOGRELAY_CHANNEL", "mailbox");
            jail.set_env("LOGRELAY_MAIL_FROM", "alerts@example.com");
            let config = get_config(Path::new("")).expect_err("should reject config");
            assert_eq!(config, ConfigError::Missing("mail_to"));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_log_switch_requires_stream() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("SNS_TOPIC_ARN", "arn:topic");
            jail.set_env("LOG_SWITCH", "1");
            jail.set_env("LOG_GROUP_NAME", "relay-audit");
            let config = get_config(Path::new("")).expect_err("should reject config");
            assert_eq!(config, ConfigError::Missing("log_stream_name"));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_invalid_channel() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("LOGRELAY_CHANNEL", "pager");
            let config = get_config(Path::new("")).expect_err("should reject config");
            assert!(matches!(config, ConfigError::ParseError(_)));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_audit_offset_out_of_range() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("SNS_TOPIC_ARN", "arn:topic");
            jail.set_env("LOGRELAY_AUDIT_UTC_OFFSET_HOURS", "30");
            let config = get_config(Path::new("")).expect_err("should reject config");
            assert!(matches!(config, ConfigError::ParseError(_)));
            Ok(())
        });
    }

    #[test]
    #[serial]
    fn test_parse_default() {
        figment::Jail::expect_with(|jail| {
            jail.clear_env();
            jail.set_env("SNS_TOPIC_ARN", "arn:topic");
            let config = get_config(Path::new("")).expect("should parse config");
            assert_eq!(
                config,
                Config {
                    sns_topic_arn: Some("arn:topic".to_string()),
                    ..Config::default()
                }
            );
            assert_eq!(
                config.audit_offset().expect("offset"),
                FixedOffset::east_opt(0).expect("utc")
            );
            Ok(())
        });
    }
}
