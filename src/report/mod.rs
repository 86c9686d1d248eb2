mod record;
mod line;
mod reporter;
mod buffer;

pub use record::{AuditReport, FailureRecord, UNAVAILABLE_KEY};
pub use line::Line;
pub use reporter::Reporter;
pub use buffer::PhaseBuffer;
pub(crate) use buffer::crash_entry;

use crate::engine::Outcome;
use crate::enrich::Enricher;

/// One line of phase output plus what it adds to the run totals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    line: Line,
    tally: Tally,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Tally {
    Nothing,
    Success,
    Failure(FailureRecord),
}

impl Entry {
    pub fn banner(label: impl Into<String>) -> Self {
        Self {
            line: Line::Banner(label.into()),
            tally: Tally::Nothing,
        }
    }

    /// Settle one outcome. Enrichment happens here, on whichever thread
    /// ran the check.
    pub fn checked(outcome: Outcome, enricher: Option<&dyn Enricher>) -> Self {
        match outcome {
            Outcome::Success { label } => Self {
                line: Line::Success(label),
                tally: Tally::Success,
            },
            Outcome::Failure(failure) => {
                let line = Line::Failure {
                    context: failure.context.clone(),
                    message: failure.message.clone(),
                };
                let record = match enricher {
                    Some(enricher) => enricher.enrich(failure),
                    None => FailureRecord::from(failure),
                };
                Self {
                    line,
                    tally: Tally::Failure(record),
                }
            }
        }
    }

    pub fn line(&self) -> &Line {
        &self.line
    }

    /// Count the entry and hand back its line.
    fn settle(self, report: &mut AuditReport) -> Line {
        match self.tally {
            Tally::Nothing => {}
            Tally::Success => report.record_success(),
            Tally::Failure(record) => report.record_failure(record),
        }
        self.line
    }
}
