//! Diagnostic accumulation.
//!
//! Malformed markup never aborts a run: every problem is recorded here,
//! processing continues, and the caller reads back the accumulated count
//! at the end. Only programming-contract violations panic.

/// Collects diagnostics for one processing run.
///
/// The count of recorded messages is the run's error count; the CLI uses
/// it as the process exit status.
#[derive(Debug, Default)]
pub struct Diagnostics {
    messages: Vec<String>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a diagnostic with no position information.
    pub fn report(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{}", message);
        self.messages.push(message);
    }

    /// Record a diagnostic tagged with the line number that `position`
    /// falls on within `context`.
    pub fn report_at(&mut self, position: usize, context: &str, message: impl Into<String>) {
        let end = position.min(context.len());
        let line = context[..end].bytes().filter(|&b| b == b'\n').count() + 1;
        self.report(format!("line {}: {}", line, message.into()));
    }

    pub fn error_count(&self) -> usize {
        self.messages.len()
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }

    /// All messages joined for display, one per line.
    pub fn render(&self) -> String {
        self.messages.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_accumulate() {
        let mut diags = Diagnostics::new();
        assert_eq!(diags.error_count(), 0);
        diags.report("first");
        diags.report("second");
        assert_eq!(diags.error_count(), 2);
        assert_eq!(diags.render(), "first\nsecond");
    }

    #[test]
    fn report_at_computes_line_numbers() {
        let mut diags = Diagnostics::new();
        let context = "one\ntwo\nthree";
        diags.report_at(context.find("three").unwrap(), context, "oops");
        assert_eq!(diags.messages()[0], "line 3: oops");
    }

    #[test]
    fn report_at_clamps_out_of_range_positions() {
        let mut diags = Diagnostics::new();
        diags.report_at(9999, "a\nb", "oops");
        assert_eq!(diags.messages()[0], "line 2: oops");
    }
}
