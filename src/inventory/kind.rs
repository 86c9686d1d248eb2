use std::fmt;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};

/// Secret-bearing resource types, in the order they are audited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    ProjectVariables,
    GroupVariables,
    RunnerTokens,
    ClusterTokens,
    DeployTokens,
    DeployKeys,
}

impl ResourceKind {
    pub const ALL: [ResourceKind; 6] = [
        ResourceKind::ProjectVariables,
        ResourceKind::GroupVariables,
        ResourceKind::RunnerTokens,
        ResourceKind::ClusterTokens,
        ResourceKind::DeployTokens,
        ResourceKind::DeployKeys,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            ResourceKind::ProjectVariables => "Checking CI/CD Project Variables",
            ResourceKind::GroupVariables => "Checking CI/CD Group Variables",
            ResourceKind::RunnerTokens => "Checking Runner Tokens",
            ResourceKind::ClusterTokens => "Checking Kubernetes Cluster Tokens",
            ResourceKind::DeployTokens => "Checking Deploy Tokens",
            ResourceKind::DeployKeys => "Checking Deploy Keys",
        }
    }

    /// File name prefix of the JSON Lines shards for this kind.
    pub fn stem(&self) -> &'static str {
        match self {
            ResourceKind::ProjectVariables => "project_variables",
            ResourceKind::GroupVariables => "group_variables",
            ResourceKind::RunnerTokens => "runner_tokens",
            ResourceKind::ClusterTokens => "cluster_tokens",
            ResourceKind::DeployTokens => "deploy_tokens",
            ResourceKind::DeployKeys => "deploy_keys",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.stem())
    }
}
