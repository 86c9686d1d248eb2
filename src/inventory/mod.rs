mod kind;
mod records;
mod source;
mod checks;

pub use kind::ResourceKind;
pub use records::{
    ProjectVariable, GroupVariable, RunnerToken, RunnerType, ClusterToken, DeployToken, DeployKey,
};
pub use source::{Inventory, JsonlSource};
pub use checks::{SecretBearing, SecretChecker, DeployKeyChecker, UNRECOGNIZED_KEY_PREFIX};

use std::sync::Arc;
use serde::de::DeserializeOwned;
use crate::engine::{Identified, Orchestrator, Phase};
use crate::enrich::DeployKeyEnricher;

/// Build the standard phase list for `kinds`, in audit order.
pub fn build_phases(inventory: &Inventory, kinds: &[ResourceKind], preview_len: usize) -> Orchestrator {
    let mut orchestrator = Orchestrator::new();

    for kind in ResourceKind::ALL.into_iter().filter(|k| kinds.contains(k)) {
        match kind {
            ResourceKind::ProjectVariables => {
                orchestrator.register(sealed_phase(kind, inventory.project_variables()));
            }
            ResourceKind::GroupVariables => {
                orchestrator.register(sealed_phase(kind, inventory.group_variables()));
            }
            ResourceKind::RunnerTokens => {
                orchestrator.register(sealed_phase(kind, inventory.runner_tokens()));
            }
            ResourceKind::ClusterTokens => {
                orchestrator.register(sealed_phase(kind, inventory.cluster_tokens()));
            }
            ResourceKind::DeployTokens => {
                orchestrator.register(sealed_phase(kind, inventory.deploy_tokens()));
            }
            ResourceKind::DeployKeys => {
                let keys = inventory.deploy_keys();
                let enricher = DeployKeyEnricher::new(keys.clone()).with_preview_len(preview_len);
                orchestrator.register(Phase::new(kind.label(), keys, DeployKeyChecker).with_enricher(enricher));
            }
        }
    }

    orchestrator
}

fn sealed_phase<R>(kind: ResourceKind, source: Arc<JsonlSource<R>>) -> Phase<R>
where
    R: SecretBearing + DeserializeOwned + Identified + 'static,
{
    Phase::new(kind.label(), source, SecretChecker::<R>::new())
}
