use crate::engine::{Failure, Outcome};
use super::record::AuditReport;
use super::Entry;

/// Output of a phase that is not allowed to reach the log yet, held so the
/// reporter can write it as one contiguous block later.
#[derive(Debug, Default)]
pub struct PhaseBuffer {
    label: String,
    entries: Vec<Entry>,
}

impl PhaseBuffer {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            entries: Vec::new(),
        }
    }

    pub fn push(&mut self, entry: Entry) {
        self.entries.push(entry);
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Totals of what is buffered so far.
    pub fn report(&self) -> AuditReport {
        let mut report = AuditReport::new();
        for entry in self.entries.iter().cloned() {
            entry.settle(&mut report);
        }
        report
    }

    pub(crate) fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

/// Phase-level failure for a worker that stopped abnormally.
pub(crate) fn crash_entry(label: impl Into<String>, reason: &str) -> Entry {
    Entry::checked(Outcome::Failure(Failure::top_level(label, &reason)), None)
}
