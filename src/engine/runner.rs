use std::sync::Arc;
use tracing::{debug, info, warn};
use crate::enrich::Enricher;
use crate::error::{AuditError, Result};
use super::outcome::{Failure, Outcome};
use super::source::RecordSource;

/// Per-resource-type verification.
///
/// `check` may return `Err` for anything it does not handle itself; the
/// runner turns that into a failure attributed to `context(record)`.
pub trait Checker<R>: Send + Sync {
    fn context(&self, record: &R) -> String;

    fn check(&self, record: &R) -> Result<Outcome>;
}

/// Destination for phase output. Errors returned here are artifact I/O
/// errors and abort the run.
pub trait ReportSink {
    fn announce(&mut self, label: &str) -> Result<()>;

    fn record(&mut self, outcome: Outcome, enricher: Option<&dyn Enricher>) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PhaseStats {
    pub checked: usize,
    pub failed: usize,
    pub aborted: bool,
}

impl PhaseStats {
    fn observe(&mut self, outcome: &Outcome) {
        self.checked += 1;
        if !outcome.is_success() {
            self.failed += 1;
        }
    }
}

pub struct Phase<R> {
    label: String,
    source: Arc<dyn RecordSource<Record = R>>,
    checker: Box<dyn Checker<R>>,
    enricher: Option<Box<dyn Enricher>>,
}

impl<R> Phase<R> {
    pub fn new(
        label: impl Into<String>,
        source: Arc<dyn RecordSource<Record = R>>,
        checker: impl Checker<R> + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            source,
            checker: Box::new(checker),
            enricher: None,
        }
    }

    pub fn with_enricher(mut self, enricher: impl Enricher + 'static) -> Self {
        self.enricher = Some(Box::new(enricher));
        self
    }

    fn abort(&self, sink: &mut dyn ReportSink, err: &AuditError, stats: &mut PhaseStats) -> Result<()> {
        warn!(phase = %self.label, error = %err, "record source failed, ending phase");
        let outcome = Outcome::Failure(Failure::top_level(self.label.clone(), err));
        stats.observe(&outcome);
        stats.aborted = true;
        sink.record(outcome, self.enricher.as_deref())
    }
}

/// Object-safe view of a `Phase<R>` so phases over different record types
/// can be registered together.
pub trait AuditPhase: Send + Sync {
    fn label(&self) -> &str;

    fn run(&self, sink: &mut dyn ReportSink) -> Result<PhaseStats>;
}

impl<R> AuditPhase for Phase<R> {
    fn label(&self) -> &str {
        &self.label
    }

    fn run(&self, sink: &mut dyn ReportSink) -> Result<PhaseStats> {
        sink.announce(&self.label)?;
        debug!(phase = %self.label, "phase started");

        let mut stats = PhaseStats::default();
        let enricher = self.enricher.as_deref();

        let records = match self.source.records() {
            Ok(records) => records,
            Err(e) => {
                self.abort(sink, &e, &mut stats)?;
                return Ok(stats);
            }
        };

        for item in records {
            let record = match item {
                Ok(record) => record,
                Err(e) => match e.record_location() {
                    Some(location) => {
                        let outcome = Outcome::failure(location, e.to_string());
                        stats.observe(&outcome);
                        sink.record(outcome, enricher)?;
                        continue;
                    }
                    None => {
                        self.abort(sink, &e, &mut stats)?;
                        break;
                    }
                },
            };

            let outcome = match self.checker.check(&record) {
                Ok(outcome) => outcome,
                Err(e) => Outcome::Failure(Failure::top_level(self.checker.context(&record), &e)),
            };

            stats.observe(&outcome);
            sink.record(outcome, enricher)?;
        }

        info!(
            phase = %self.label,
            checked = stats.checked,
            failed = stats.failed,
            "phase completed"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{Identified, RecordIter, VecSource};

    #[derive(Debug, Clone)]
    struct Item {
        id: i64,
        readable: bool,
        broken_owner: bool,
    }

    impl Identified for Item {
        fn id(&self) -> i64 {
            self.id
        }
    }

    fn item(id: i64) -> Item {
        Item { id, readable: true, broken_owner: false }
    }

    struct ItemChecker;

    impl Checker<Item> for ItemChecker {
        fn context(&self, record: &Item) -> String {
            format!("Item ID {}", record.id)
        }

        fn check(&self, record: &Item) -> Result<Outcome> {
            if record.broken_owner {
                return Err(AuditError::InvalidRecord("owner lookup failed".into()));
            }
            if record.readable {
                Ok(Outcome::success(self.context(record)))
            } else {
                Ok(Outcome::failure(self.context(record), "decryption error"))
            }
        }
    }

    struct BrokenSource {
        yield_first: usize,
    }

    impl RecordSource for BrokenSource {
        type Record = Item;

        fn records(&self) -> Result<RecordIter<'_, Item>> {
            if self.yield_first == 0 {
                return Err(AuditError::Source("connection refused".into()));
            }
            let good = (1..=self.yield_first as i64).map(|id| Ok(item(id)));
            let bad = std::iter::once(Err(AuditError::Source("cursor lost".into())));
            let never = std::iter::once(Ok(item(999)));
            Ok(Box::new(good.chain(bad).chain(never)))
        }

        fn find(&self, _id: i64) -> Result<Option<Item>> {
            Ok(None)
        }
    }

    struct PatchySource;

    impl RecordSource for PatchySource {
        type Record = Item;

        fn records(&self) -> Result<RecordIter<'_, Item>> {
            let bad = AuditError::MalformedRecord {
                location: "items.jsonl line 2".into(),
                reason: "invalid JSON at column 9".into(),
            };
            Ok(Box::new(vec![Ok(item(1)), Err(bad), Ok(item(3))].into_iter()))
        }

        fn find(&self, _id: i64) -> Result<Option<Item>> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct CollectingSink {
        announced: Vec<String>,
        outcomes: Vec<Outcome>,
    }

    impl ReportSink for CollectingSink {
        fn announce(&mut self, label: &str) -> Result<()> {
            self.announced.push(label.to_string());
            Ok(())
        }

        fn record(&mut self, outcome: Outcome, _enricher: Option<&dyn Enricher>) -> Result<()> {
            self.outcomes.push(outcome);
            Ok(())
        }
    }

    #[test]
    fn test_run_mixed_outcomes() {
        let mut bad = item(4);
        bad.readable = false;
        let source = Arc::new(VecSource::new(vec![item(1), item(2), item(3), bad]));
        let phase = Phase::new("Checking Items", source, ItemChecker);

        let mut sink = CollectingSink::default();
        let stats = phase.run(&mut sink).unwrap();

        assert_eq!(sink.announced, vec!["Checking Items"]);
        assert_eq!(stats, PhaseStats { checked: 4, failed: 1, aborted: false });
        assert_eq!(sink.outcomes[3], Outcome::failure("Item ID 4", "decryption error"));
    }

    #[test]
    fn test_checker_error_becomes_top_level_failure_on_record() {
        let mut bad = item(7);
        bad.broken_owner = true;
        let source = Arc::new(VecSource::new(vec![bad, item(8)]));
        let phase = Phase::new("Checking Items", source, ItemChecker);

        let mut sink = CollectingSink::default();
        phase.run(&mut sink).unwrap();

        assert_eq!(
            sink.outcomes[0],
            Outcome::failure("Item ID 7", "Top-level error: Invalid record: owner lookup failed")
        );
        assert!(sink.outcomes[1].is_success());
    }

    #[test]
    fn test_wholesale_source_failure_is_one_phase_failure() {
        let phase = Phase::new("Checking Items", Arc::new(BrokenSource { yield_first: 0 }), ItemChecker);

        let mut sink = CollectingSink::default();
        let stats = phase.run(&mut sink).unwrap();

        assert!(stats.aborted);
        assert_eq!(sink.outcomes.len(), 1);
        assert_eq!(
            sink.outcomes[0],
            Outcome::failure("Checking Items", "Top-level error: Record source error: connection refused")
        );
    }

    #[test]
    fn test_source_failure_after_n_records_stops_phase() {
        let phase = Phase::new("Checking Items", Arc::new(BrokenSource { yield_first: 2 }), ItemChecker);

        let mut sink = CollectingSink::default();
        let stats = phase.run(&mut sink).unwrap();

        assert_eq!(stats, PhaseStats { checked: 3, failed: 1, aborted: true });
        assert_eq!(sink.outcomes.len(), 3);
        assert_eq!(
            sink.outcomes[2],
            Outcome::failure("Checking Items", "Top-level error: Record source error: cursor lost")
        );
    }

    #[test]
    fn test_malformed_entry_is_one_record_failure() {
        let phase = Phase::new("Checking Items", Arc::new(PatchySource), ItemChecker);

        let mut sink = CollectingSink::default();
        let stats = phase.run(&mut sink).unwrap();

        assert_eq!(stats, PhaseStats { checked: 3, failed: 1, aborted: false });
        assert_eq!(
            sink.outcomes[1],
            Outcome::failure("items.jsonl line 2", "Malformed record: invalid JSON at column 9")
        );
        assert_eq!(sink.outcomes[2], Outcome::success("Item ID 3"));
    }

    #[test]
    fn test_empty_source() {
        let source: Arc<VecSource<Item>> = Arc::new(VecSource::new(vec![]));
        let phase = Phase::new("Checking Items", source, ItemChecker);

        let mut sink = CollectingSink::default();
        let stats = phase.run(&mut sink).unwrap();

        assert_eq!(stats, PhaseStats::default());
        assert_eq!(sink.announced.len(), 1);
        assert!(sink.outcomes.is_empty());
    }
}
