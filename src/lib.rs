pub mod error;
pub mod secret;
pub mod engine;
pub mod enrich;
pub mod report;
pub mod inventory;
pub mod config;

pub use error::{AuditError, Result};
pub use secret::{SealedValue, Revealed, KeyObject, NativeKey, WrappedKey};
pub use engine::{
    Outcome, Failure, FailureSubject, Identified, RecordSource, VecSource,
    Checker, Phase, AuditPhase, PhaseStats, ReportSink, Orchestrator,
};
pub use enrich::{Enricher, DeployKeyEnricher, DeployKeyContext, HasPublicKey, key_preview};
pub use report::{AuditReport, Entry, FailureRecord, Reporter, PhaseBuffer};
pub use inventory::{Inventory, JsonlSource, ResourceKind, build_phases};
pub use config::AuditConfig;
