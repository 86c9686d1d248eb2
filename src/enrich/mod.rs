mod deploy_key;

use crate::engine::Failure;
use crate::report::FailureRecord;

pub use deploy_key::{DeployKeyContext, DeployKeyEnricher, HasPublicKey, key_preview, DEFAULT_PREVIEW_LEN};

/// Type-specific post-processing of a failure. Must not fail: anything
/// that cannot be resolved is left out of the record.
pub trait Enricher: Send + Sync {
    fn enrich(&self, failure: Failure) -> FailureRecord;
}
