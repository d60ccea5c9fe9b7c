use serde::Deserialize;

/// Which notification channel receives the forwarded log events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
    /// One SNS publish holding every forwarded message.
    #[default]
    Topic,
    /// One SES mail holding every forwarded message.
    Mailbox,
    /// One SES mail per log event, using the structured template.
    #[serde(alias = "mailbox_per_record")]
    MailboxPerEvent,
}

/// What the filter does when no keyword is configured, or the keyword is empty.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MissingKeywordPolicy {
    #[default]
    ForwardAll,
    MatchNothing,
}

/// How the invocation boundary reports a non-`Ok` outcome to the platform.
///
/// | policy        | Recovered | Fatal   |
/// |---------------|-----------|---------|
/// | `swallow`     | success   | success |
/// | `raise_fatal` | success   | failure |
/// | `raise`       | failure   | failure |
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorPolicy {
    Swallow,
    #[default]
    RaiseFatal,
    Raise,
}
