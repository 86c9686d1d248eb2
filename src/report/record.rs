use serde::{Serialize, Serializer};
use crate::engine::Failure;
use crate::enrich::DeployKeyContext;
use crate::error::Result;

pub const UNAVAILABLE_KEY: &str = "Unavailable";

/// Persisted form of a failure, one element of the JSON report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FailureRecord {
    Generic {
        context: String,
        error: String,
    },
    DeployKey {
        id: i64,
        title: String,
        projects: Vec<String>,
        error: String,
        /// Truncated preview; `None` when the re-lookup found nothing usable.
        #[serde(rename = "key", serialize_with = "serialize_key")]
        fingerprint: Option<String>,
    },
}

fn serialize_key<S>(fingerprint: &Option<String>, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(fingerprint.as_deref().unwrap_or(UNAVAILABLE_KEY))
}

impl FailureRecord {
    pub fn generic(context: impl Into<String>, error: impl Into<String>) -> Self {
        FailureRecord::Generic {
            context: context.into(),
            error: error.into(),
        }
    }

    pub fn context(&self) -> String {
        match self {
            FailureRecord::Generic { context, .. } => context.clone(),
            FailureRecord::DeployKey { id, title, projects, .. } => DeployKeyContext {
                id: *id,
                title: title.clone(),
                projects: projects.clone(),
            }
            .to_string(),
        }
    }

    pub fn error(&self) -> &str {
        match self {
            FailureRecord::Generic { error, .. } | FailureRecord::DeployKey { error, .. } => error,
        }
    }

    pub fn fingerprint(&self) -> Option<&str> {
        match self {
            FailureRecord::DeployKey { fingerprint, .. } => fingerprint.as_deref(),
            FailureRecord::Generic { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            FailureRecord::Generic { .. } => "generic",
            FailureRecord::DeployKey { .. } => "deploy_key",
        }
    }
}

impl From<Failure> for FailureRecord {
    fn from(failure: Failure) -> Self {
        FailureRecord::generic(failure.context, failure.message)
    }
}

/// Counts and failures for a whole run. Totals are derived, so
/// `total_checks == successes + failures` and `failures == failure_records.len()`
/// cannot drift apart.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuditReport {
    successes: usize,
    failure_records: Vec<FailureRecord>,
}

impl AuditReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_success(&mut self) {
        self.successes += 1;
    }

    pub fn record_failure(&mut self, record: FailureRecord) {
        self.failure_records.push(record);
    }

    pub fn total_checks(&self) -> usize {
        self.successes + self.failures()
    }

    pub fn successes(&self) -> usize {
        self.successes
    }

    pub fn failures(&self) -> usize {
        self.failure_records.len()
    }

    pub fn has_failures(&self) -> bool {
        !self.failure_records.is_empty()
    }

    pub fn failure_records(&self) -> &[FailureRecord] {
        &self.failure_records
    }

    pub fn merge(&mut self, other: AuditReport) {
        self.successes += other.successes;
        self.failure_records.extend(other.failure_records);
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.failure_records)?)
    }
}
