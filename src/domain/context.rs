use super::diagnostic::{DiagnosticRecord, NEWLINE, Severity};
use std::collections::VecDeque;

/// Ordered collection of every diagnostic raised while a transaction is built,
/// submitted and decoded.
///
/// Records are kept newest first. Records fetched from a shared logging sink
/// are staged with [`stage_external`](Self::stage_external) and only merged on
/// the next [`populate`](Self::populate), skipping any that describe an event
/// already present (same code and first parameter).
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    records: VecDeque<DiagnosticRecord>,
    staged: Vec<DiagnosticRecord>,
    highest: Option<Severity>,
    trace_formatting_errors: bool,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the formatting failure reason to degraded messages when
    /// rendering.
    pub fn with_trace_formatting_errors(mut self, enabled: bool) -> Self {
        self.trace_formatting_errors = enabled;
        self
    }

    pub fn set_trace_formatting_errors(&mut self, enabled: bool) {
        self.trace_formatting_errors = enabled;
    }

    pub fn traces_formatting_errors(&self) -> bool {
        self.trace_formatting_errors
    }

    /// Inserts a record ahead of all existing ones.
    pub fn add(&mut self, record: DiagnosticRecord) {
        self.highest = self.highest.max(Some(record.severity));
        self.records.push_front(record);
    }

    /// Inserts `records` ahead of all existing ones, keeping their relative
    /// order.
    pub fn add_all<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = DiagnosticRecord>,
    {
        let incoming: Vec<_> = records.into_iter().collect();
        for record in incoming.into_iter().rev() {
            self.add(record);
        }
    }

    /// Queues logger-sourced records for the next populate pass.
    pub fn stage_external<I>(&mut self, records: I)
    where
        I: IntoIterator<Item = DiagnosticRecord>,
    {
        self.staged.extend(records);
    }

    pub fn has_staged(&self) -> bool {
        !self.staged.is_empty()
    }

    /// Merges staged records, dropping those already recorded, and returns how
    /// many were merged.
    pub fn populate(&mut self) -> usize {
        let mut merged = 0;
        for record in std::mem::take(&mut self.staged) {
            if self.records.iter().any(|existing| existing.same_event(&record)) {
                continue;
            }
            self.add(record);
            merged += 1;
        }
        merged
    }

    /// Populates, then returns the highest severity recorded. `None` means no
    /// diagnostics at all.
    pub fn highest_severity(&mut self) -> Option<Severity> {
        self.populate();
        self.highest
    }

    /// Highest severity among merged records, without a populate pass.
    pub fn current_severity(&self) -> Option<Severity> {
        self.highest
    }

    pub fn is_fatal(&mut self) -> bool {
        self.highest_severity() == Some(Severity::Fatal)
    }

    /// Records at or above `min`, newest first.
    pub fn filter(&self, min: Severity) -> Vec<&DiagnosticRecord> {
        self.records.iter().filter(|r| r.severity >= min).collect()
    }

    /// The most recently added fatal record.
    pub fn first_fatal(&self) -> Option<&DiagnosticRecord> {
        self.records.iter().find(|r| r.is_fatal())
    }

    pub fn iter(&self) -> impl Iterator<Item = &DiagnosticRecord> {
        self.records.iter()
    }

    pub fn get(&self, index: usize) -> Option<&DiagnosticRecord> {
        self.records.get(index)
    }

    pub fn to_vec(&self) -> Vec<DiagnosticRecord> {
        self.records.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Renders every record at or above `min`, joined by `separator`.
    pub fn render(&self, min: Severity, separator: &str) -> String {
        self.filter(min)
            .into_iter()
            .map(|r| r.render(self.trace_formatting_errors))
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// [`render`](Self::render) with the platform newline as separator.
    pub fn render_lines(&self, min: Severity) -> String {
        self.render(min, NEWLINE)
    }

    pub fn render_record(&self, record: &DiagnosticRecord) -> String {
        record.render(self.trace_formatting_errors)
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.staged.clear();
        self.highest = None;
    }
}

impl Extend<DiagnosticRecord> for ErrorContext {
    fn extend<T: IntoIterator<Item = DiagnosticRecord>>(&mut self, iter: T) {
        for record in iter {
            self.add(record);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::diagnostic::DiagnosticKind;
    use proptest::prelude::*;
    use rand::seq::SliceRandom;

    fn record(severity: Severity, code: &str) -> DiagnosticRecord {
        DiagnosticRecord::new(severity, DiagnosticKind::Transaction, code)
    }

    fn codes(records: Vec<&DiagnosticRecord>) -> Vec<&str> {
        records.into_iter().map(|r| r.code.as_str()).collect()
    }

    #[test]
    fn test_warn_fatal_info_scenario() {
        let mut ctx = ErrorContext::new();
        ctx.add(record(Severity::Warn, "W"));
        ctx.add(record(Severity::Fatal, "F"));
        ctx.add(record(Severity::Info, "I"));

        assert_eq!(ctx.highest_severity(), Some(Severity::Fatal));
        assert_eq!(codes(ctx.filter(Severity::Error)), vec!["F"]);
        assert_eq!(ctx.len(), 3);
    }

    #[test]
    fn test_add_is_newest_first() {
        let mut ctx = ErrorContext::new();
        ctx.add(record(Severity::Info, "A"));
        ctx.add(record(Severity::Info, "B"));
        ctx.add(record(Severity::Info, "C"));
        assert_eq!(codes(ctx.filter(Severity::Debug)), vec!["C", "B", "A"]);
    }

    #[test]
    fn test_add_all_keeps_incoming_order_ahead_of_existing() {
        let mut ctx = ErrorContext::new();
        ctx.add(record(Severity::Info, "OLD"));
        ctx.add_all(vec![record(Severity::Info, "X"), record(Severity::Warn, "Y")]);
        assert_eq!(codes(ctx.filter(Severity::Debug)), vec!["X", "Y", "OLD"]);
        assert_eq!(ctx.current_severity(), Some(Severity::Warn));
    }

    #[test]
    fn test_empty_context_has_no_severity() {
        let mut ctx = ErrorContext::new();
        assert!(ctx.is_empty());
        assert_eq!(ctx.highest_severity(), None);
        assert_eq!(ctx.render_lines(Severity::Debug), "");
    }

    #[test]
    fn test_populate_merges_and_deduplicates_external_records() {
        let mut ctx = ErrorContext::new();
        ctx.add(record(Severity::Error, "TRANSPORT_FAILURE").with_param("timeout"));
        ctx.stage_external(vec![
            DiagnosticRecord::new(Severity::Fatal, DiagnosticKind::External, "TRANSPORT_FAILURE")
                .with_param("timeout"),
            DiagnosticRecord::new(Severity::Warn, DiagnosticKind::External, "SLOW_DNS"),
            DiagnosticRecord::new(Severity::Warn, DiagnosticKind::External, "SLOW_DNS"),
        ]);

        // staged records are invisible until populated
        assert_eq!(ctx.len(), 1);
        assert_eq!(ctx.current_severity(), Some(Severity::Error));

        assert_eq!(ctx.highest_severity(), Some(Severity::Error));
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.get(0).map(|r| r.code.as_str()), Some("SLOW_DNS"));
        assert!(!ctx.has_staged());
    }

    #[test]
    fn test_render_joins_with_separator() {
        let mut ctx = ErrorContext::new();
        ctx.add(record(Severity::Warn, "FIRST").with_template("first"));
        ctx.add(record(Severity::Debug, "NOISE").with_template("noise"));
        ctx.add(record(Severity::Error, "SECOND").with_template("second {0}").with_param("x"));

        assert_eq!(ctx.render(Severity::Warn, " | "), "[ERROR]second x | [WARN]first");
        assert_eq!(
            ctx.render_lines(Severity::Debug),
            ["[ERROR]second x", "[DEBUG]noise", "[WARN]first"].join(NEWLINE)
        );
    }

    #[test]
    fn test_bad_record_does_not_abort_rendering() {
        let mut ctx = ErrorContext::new().with_trace_formatting_errors(true);
        ctx.add(record(Severity::Info, "OK").with_template("fine"));
        ctx.add(record(Severity::Error, "BAD").with_template("{3}"));

        let text = ctx.render(Severity::Debug, "\n");
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("[ERROR]Message formatting error: "));
        assert_eq!(lines[1], "[INFO]fine");
    }

    #[test]
    fn test_first_fatal_is_most_recent() {
        let mut ctx = ErrorContext::new();
        ctx.add(record(Severity::Fatal, "OLDER"));
        ctx.add(record(Severity::Warn, "W"));
        ctx.add(record(Severity::Fatal, "NEWER"));
        assert_eq!(ctx.first_fatal().map(|r| r.code.as_str()), Some("NEWER"));
    }

    #[test]
    fn test_clear_resets_severity() {
        let mut ctx = ErrorContext::new();
        ctx.add(record(Severity::Fatal, "F"));
        ctx.stage_external(vec![record(Severity::Error, "E")]);
        ctx.clear();
        assert!(ctx.is_empty());
        assert_eq!(ctx.highest_severity(), None);
    }

    #[test]
    fn test_severity_independent_of_shuffled_order() {
        let mut records = vec![
            record(Severity::Debug, "D"),
            record(Severity::Error, "E"),
            record(Severity::Info, "I"),
            record(Severity::Warn, "W"),
        ];
        for _ in 0..20 {
            records.shuffle(&mut rand::thread_rng());
            let mut ctx = ErrorContext::new();
            ctx.extend(records.clone());
            assert_eq!(ctx.highest_severity(), Some(Severity::Error));
        }
    }

    fn severity_strategy() -> impl Strategy<Value = Severity> {
        prop_oneof![
            Just(Severity::Debug),
            Just(Severity::Info),
            Just(Severity::Warn),
            Just(Severity::Error),
            Just(Severity::Fatal),
        ]
    }

    proptest! {
        #[test]
        fn prop_highest_is_max_of_added(severities in proptest::collection::vec(severity_strategy(), 0..16)) {
            let mut ctx = ErrorContext::new();
            for (i, severity) in severities.iter().enumerate() {
                ctx.add(record(*severity, &i.to_string()));
            }
            prop_assert_eq!(ctx.highest_severity(), severities.iter().copied().max());
        }

        #[test]
        fn prop_filter_preserves_newest_first_order(
            severities in proptest::collection::vec(severity_strategy(), 0..16),
            min in severity_strategy(),
        ) {
            let mut ctx = ErrorContext::new();
            for (i, severity) in severities.iter().enumerate() {
                ctx.add(record(*severity, &i.to_string()));
            }
            let expected: Vec<String> = severities
                .iter()
                .enumerate()
                .rev()
                .filter(|(_, s)| **s >= min)
                .map(|(i, _)| i.to_string())
                .collect();
            let actual: Vec<String> = ctx.filter(min).into_iter().map(|r| r.code.clone()).collect();
            prop_assert_eq!(actual, expected);
        }
    }
}
