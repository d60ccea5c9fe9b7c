use crate::awslogs::LogRecord;
use crate::config::policy::MissingKeywordPolicy;

/// Keeps the records whose message contains `keyword` as a literal,
/// case-sensitive substring. An absent or empty keyword is resolved by
/// `policy`. Record order is preserved.
#[must_use]
pub fn filter(
    records: &[LogRecord],
    keyword: Option<&str>,
    policy: MissingKeywordPolicy,
) -> Vec<LogRecord> {
    match keyword.filter(|k| !k.is_empty()) {
        Some(keyword) => records
            .iter()
            .filter(|record| record.message.contains(keyword))
            .cloned()
            .collect(),
        None => match policy {
            MissingKeywordPolicy::ForwardAll => records.to_vec(),
            MissingKeywordPolicy::MatchNothing => Vec::new(),
        },
    }
}
