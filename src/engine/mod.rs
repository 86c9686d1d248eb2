mod outcome;
mod source;
mod runner;
mod orchestrator;

pub use outcome::{Outcome, Failure, FailureSubject, TOP_LEVEL_PREFIX};
pub use source::{Identified, RecordIter, RecordSource, VecSource};
pub use runner::{Checker, ReportSink, Phase, AuditPhase, PhaseStats};
pub use orchestrator::Orchestrator;
