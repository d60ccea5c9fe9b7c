use std::fmt::Display;

/// Lines recorded while handling one invocation.
///
/// `flush` consumes the trail, so nothing can be appended afterwards and it
/// cannot be flushed twice.
#[derive(Debug, Default)]
pub struct AuditTrail {
    lines: Vec<String>,
}

impl AuditTrail {
    #[must_use]
    pub fn new() -> Self {
        AuditTrail::default()
    }

    pub fn push(&mut self, line: impl Display) {
        self.lines.push(line.to_string());
    }

    #[must_use]
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    #[must_use]
    pub fn flush(self) -> String {
        self.lines.join("\n")
    }
}
