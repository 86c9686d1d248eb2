use std::fs;
use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::enrich::DEFAULT_PREVIEW_LEN;
use crate::error::{AuditError, Result};
use crate::inventory::ResourceKind;

pub const DEFAULT_LOG_PATH: &str = "/tmp/gitlab_secrets_audit.log";
pub const DEFAULT_REPORT_PATH: &str = "/tmp/gitlab_secrets_audit_failures.json";
pub const DEFAULT_INVENTORY_DIR: &str = "./inventory";

/// Run settings. Every field is optional in the YAML file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditConfig {
    pub log_path: PathBuf,
    pub report_path: PathBuf,
    pub inventory_dir: PathBuf,
    pub concurrent: bool,
    pub preview_len: usize,
    pub console: bool,
    /// Empty means every resource kind.
    pub only: Vec<ResourceKind>,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            log_path: PathBuf::from(DEFAULT_LOG_PATH),
            report_path: PathBuf::from(DEFAULT_REPORT_PATH),
            inventory_dir: PathBuf::from(DEFAULT_INVENTORY_DIR),
            concurrent: false,
            preview_len: DEFAULT_PREVIEW_LEN,
            console: true,
            only: Vec::new(),
        }
    }
}

impl AuditConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .map_err(|e| AuditError::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: AuditConfig = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.preview_len == 0 {
            return Err(AuditError::Config("preview_len must be at least 1".into()));
        }
        if self.log_path == self.report_path {
            return Err(AuditError::Config(format!(
                "log and report cannot share a path ({})",
                self.log_path.display()
            )));
        }
        Ok(())
    }

    /// Kinds to audit, in audit order.
    pub fn kinds(&self) -> Vec<ResourceKind> {
        if self.only.is_empty() {
            ResourceKind::ALL.to_vec()
        } else {
            ResourceKind::ALL.into_iter().filter(|k| self.only.contains(k)).collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = AuditConfig::default();
        assert_eq!(config.log_path, PathBuf::from("/tmp/gitlab_secrets_audit.log"));
        assert_eq!(config.report_path, PathBuf::from("/tmp/gitlab_secrets_audit_failures.json"));
        assert_eq!(config.preview_len, 40);
        assert!(config.console);
        assert!(!config.concurrent);
        assert_eq!(config.kinds().len(), 6);
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let config = AuditConfig::from_yaml("concurrent: true\ninventory_dir: /srv/export\n").unwrap();
        assert!(config.concurrent);
        assert_eq!(config.inventory_dir, PathBuf::from("/srv/export"));
        assert_eq!(config.log_path, PathBuf::from(DEFAULT_LOG_PATH));
    }

    #[test]
    fn test_only_is_reordered_to_audit_order() {
        let config = AuditConfig::from_yaml("only: [deploy_keys, runner_tokens]").unwrap();
        assert_eq!(config.kinds(), vec![ResourceKind::RunnerTokens, ResourceKind::DeployKeys]);
    }

    #[test]
    fn test_unknown_kind_is_rejected() {
        let err = AuditConfig::from_yaml("only: [ssh_certs]").unwrap_err();
        assert!(matches!(err, AuditError::Yaml(_)));
    }

    #[test]
    fn test_shared_artifact_path_is_rejected() {
        let err = AuditConfig::from_yaml("log_path: /tmp/a\nreport_path: /tmp/a\n").unwrap_err();
        assert!(matches!(err, AuditError::Config(_)));
    }

    #[test]
    fn test_load_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.yaml");
        fs::write(&path, "preview_len: 12\nconsole: false\n").unwrap();

        let config = AuditConfig::load(&path).unwrap();
        assert_eq!(config.preview_len, 12);
        assert!(!config.console);
    }

    #[test]
    fn test_missing_file() {
        let err = AuditConfig::load("/nonexistent/audit.yaml").unwrap_err();
        assert!(err.to_string().starts_with("Configuration error: cannot read"));
    }
}
