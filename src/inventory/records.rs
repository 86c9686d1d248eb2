use std::fmt;
use serde::Deserialize;
use crate::engine::Identified;
use crate::enrich::{DeployKeyContext, HasPublicKey};
use crate::secret::{KeyObject, SealedValue};

const UNKNOWN: &str = "unknown";

#[derive(Debug, Clone, Deserialize)]
pub struct ProjectVariable {
    pub id: i64,
    pub key: String,
    #[serde(default)]
    pub project_id: Option<i64>,
    #[serde(default)]
    pub project_path: Option<String>,
    #[serde(default)]
    pub value: SealedValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GroupVariable {
    pub id: i64,
    pub key: String,
    #[serde(default)]
    pub group_id: Option<i64>,
    #[serde(default)]
    pub group_path: Option<String>,
    #[serde(default)]
    pub value: SealedValue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunnerType {
    InstanceType,
    GroupType,
    ProjectType,
}

impl fmt::Display for RunnerType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerType::InstanceType => write!(f, "instance_type"),
            RunnerType::GroupType => write!(f, "group_type"),
            RunnerType::ProjectType => write!(f, "project_type"),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunnerToken {
    pub id: i64,
    pub runner_type: RunnerType,
    #[serde(default)]
    pub description: Option<String>,
    /// Path of the owning group or project; absent for instance runners.
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub token: SealedValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ClusterToken {
    pub id: i64,
    #[serde(default)]
    pub cluster_id: Option<i64>,
    #[serde(default)]
    pub cluster_name: Option<String>,
    #[serde(default)]
    pub token: SealedValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployToken {
    pub id: i64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub token: SealedValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeployKey {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub projects: Vec<String>,
    /// Public key text as stored, e.g. `ssh-ed25519 AAAA... user@host`.
    #[serde(default)]
    pub key: Option<String>,
}

impl ProjectVariable {
    pub fn describe(&self) -> String {
        let project = match (&self.project_path, self.project_id) {
            (Some(path), _) => path.clone(),
            (None, Some(id)) => format!("{UNKNOWN} (project ID {id})"),
            (None, None) => UNKNOWN.to_string(),
        };
        format!("Project Variable ID {} ({}) – Project: {}", self.id, self.key, project)
    }
}

impl GroupVariable {
    pub fn describe(&self) -> String {
        let group = match (&self.group_path, self.group_id) {
            (Some(path), _) => path.clone(),
            (None, Some(id)) => format!("{UNKNOWN} (group ID {id})"),
            (None, None) => UNKNOWN.to_string(),
        };
        format!("Group Variable ID {} ({}) – Group: {}", self.id, self.key, group)
    }
}

impl RunnerToken {
    pub fn describe(&self) -> String {
        let owner = match (&self.owner, self.runner_type) {
            (Some(owner), _) => owner.as_str(),
            (None, RunnerType::InstanceType) => "instance",
            (None, _) => UNKNOWN,
        };
        let mut label = format!("Runner ID {} ({}) – Owner: {}", self.id, self.runner_type, owner);
        if let Some(description) = self.description.as_deref().filter(|d| !d.is_empty()) {
            label.push_str(&format!(" – Description: {description}"));
        }
        label
    }
}

impl ClusterToken {
    pub fn describe(&self) -> String {
        let cluster = match (&self.cluster_name, self.cluster_id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => format!("Cluster #{id}"),
            (None, None) => UNKNOWN.to_string(),
        };
        format!("Cluster Token ID {} – Cluster: {}", self.id, cluster)
    }
}

impl DeployToken {
    pub fn describe(&self) -> String {
        format!(
            "Deploy Token ID {} – Name: {} – Username: {}",
            self.id,
            self.name.as_deref().unwrap_or(UNKNOWN),
            self.username.as_deref().unwrap_or(UNKNOWN)
        )
    }
}

impl DeployKey {
    pub fn context(&self) -> DeployKeyContext {
        DeployKeyContext {
            id: self.id,
            title: self.title.clone().unwrap_or_else(|| UNKNOWN.to_string()),
            projects: self.projects.clone(),
        }
    }
}

impl HasPublicKey for DeployKey {
    fn public_key(&self) -> KeyObject {
        KeyObject::parse(self.key.as_deref())
    }
}

macro_rules! identified {
    ($($ty:ty),*) => {
        $(impl Identified for $ty {
            fn id(&self) -> i64 {
                self.id
            }
        })*
    };
}

identified!(ProjectVariable, GroupVariable, RunnerToken, ClusterToken, DeployToken, DeployKey);
