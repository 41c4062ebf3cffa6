//! YAML configuration for the automation service.
//!
//! The file carries connection settings and the deployment-specific mappings
//! (service names to ops groups, process-code overrides, schedule overrides).
//! Credentials never live in the file: the Jira API token is read from the
//! environment variable named in `jira.token_env`.

use crate::confluence::ConfluenceClient;
use crate::error::{Result, SmsError};
use crate::jira::client::JiraClient;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// ConfigWarning / WarnLevel
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigWarning {
    pub level: WarnLevel,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    Warning,
    Error,
}

fn warning(message: impl Into<String>) -> ConfigWarning {
    ConfigWarning {
        level: WarnLevel::Warning,
        message: message.into(),
    }
}

fn error(message: impl Into<String>) -> ConfigWarning {
    ConfigWarning {
        level: WarnLevel::Error,
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// JiraConfig / ConfluenceConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JiraConfig {
    pub base_url: String,
    pub user: String,
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

fn default_token_env() -> String {
    "SMS_JIRA_TOKEN".to_string()
}

impl JiraConfig {
    pub fn token(&self) -> Result<String> {
        std::env::var(&self.token_env).map_err(|_| SmsError::TokenNotSet(self.token_env.clone()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfluenceConfig {
    pub base_url: String,
}

// ---------------------------------------------------------------------------
// ServerConfig / SchedulerConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Shared secret expected in the `X-Automation-Secret` header of webhook
    /// deliveries. No check is performed when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook_secret: Option<String>,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            webhook_secret: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Per-job cron overrides, keyed by job name.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub schedules: HashMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schedules: HashMap::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// StakeholderConfig / ProcessConfig
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StakeholderConfig {
    /// Service (or procurement lot) display name → ops group.
    #[serde(default)]
    pub service_groups: HashMap<String, String>,
    /// Group used when a ticket names no service or lot at all.
    #[serde(default = "default_fallback_group")]
    pub fallback_group: String,
    /// Extra group added for operational issue types.
    #[serde(default = "default_qa_group")]
    pub qa_group: String,
    #[serde(default = "default_qa_issue_types")]
    pub qa_issue_types: Vec<String>,
}

fn default_fallback_group() -> String {
    "fallback-ops".to_string()
}

fn default_qa_group() -> String {
    "ec-qa-team".to_string()
}

fn default_qa_issue_types() -> Vec<String> {
    [
        "Software Update",
        "Managed Software Update",
        "Infrastructure Software Update",
        "Issue",
        "Incident",
        "Data Protection Incident",
        "Security Incident",
        "Restore",
        "Disaster",
    ]
    .into_iter()
    .map(str::to_string)
    .collect()
}

impl Default for StakeholderConfig {
    fn default() -> Self {
        Self {
            service_groups: HashMap::new(),
            fallback_group: default_fallback_group(),
            qa_group: default_qa_group(),
            qa_issue_types: default_qa_issue_types(),
        }
    }
}

impl StakeholderConfig {
    pub fn group_for_service(&self, service: &str) -> Option<&str> {
        self.service_groups.get(service).map(String::as_str)
    }

    pub fn is_qa_issue_type(&self, issue_type: &str) -> bool {
        self.qa_issue_types.iter().any(|t| t == issue_type)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessConfig {
    /// Process name → code, for processes whose name carries no parenthesized
    /// abbreviation (or one that differs from the project key).
    #[serde(default)]
    pub code_overrides: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// SmsConfig (top-level)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    pub jira: JiraConfig,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confluence: Option<ConfluenceConfig>,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub stakeholders: StakeholderConfig,
    #[serde(default)]
    pub process: ProcessConfig,
}

impl SmsConfig {
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(SmsError::ConfigNotFound);
        }
        let text = std::fs::read_to_string(path)?;
        Ok(serde_yaml::from_str(&text)?)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_yaml::to_string(self)?)?;
        Ok(())
    }

    /// Starter config written by `sms config init`.
    pub fn example() -> Self {
        Self {
            jira: JiraConfig {
                base_url: "https://example.atlassian.net".to_string(),
                user: "automation@example.org".to_string(),
                token_env: default_token_env(),
            },
            confluence: Some(ConfluenceConfig {
                base_url: "https://example.atlassian.net".to_string(),
            }),
            server: ServerConfig::default(),
            scheduler: SchedulerConfig::default(),
            stakeholders: StakeholderConfig::default(),
            process: ProcessConfig::default(),
        }
    }

    pub fn jira_client(&self) -> Result<JiraClient> {
        let token = self.jira.token()?;
        Ok(JiraClient::new(&self.jira.base_url, &self.jira.user, token))
    }

    /// Confluence shares the Jira credentials (same Atlassian account).
    pub fn confluence_client(&self) -> Result<ConfluenceClient> {
        let confluence = self
            .confluence
            .as_ref()
            .ok_or(SmsError::ConfluenceNotConfigured)?;
        let token = self.jira.token()?;
        Ok(ConfluenceClient::new(
            &confluence.base_url,
            &self.jira.user,
            token,
        ))
    }

    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        if self.jira.base_url.trim().is_empty() {
            warnings.push(error("jira.base_url is empty"));
        }
        if self.jira.user.trim().is_empty() {
            warnings.push(error("jira.user is empty"));
        }
        if std::env::var(&self.jira.token_env).is_err() {
            warnings.push(warning(format!(
                "environment variable {} is not set",
                self.jira.token_env
            )));
        }
        if let Some(confluence) = &self.confluence {
            if confluence.base_url.trim().is_empty() {
                warnings.push(error("confluence.base_url is empty"));
            }
        }
        if self.stakeholders.fallback_group.trim().is_empty() {
            warnings.push(warning("stakeholders.fallback_group is empty"));
        }
        for (job, expression) in &self.scheduler.schedules {
            if cron::Schedule::from_str(expression).is_err() {
                warnings.push(error(format!(
                    "scheduler.schedules.{job}: invalid cron expression '{expression}'"
                )));
            }
        }

        warnings
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_missing_file_is_config_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = SmsConfig::load(&dir.path().join("sms.yaml")).unwrap_err();
        assert!(matches!(err, SmsError::ConfigNotFound));
    }

    #[test]
    fn save_then_load_preserves_mappings() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sms.yaml");

        let mut config = SmsConfig::example();
        config
            .stakeholders
            .service_groups
            .insert("Lot 1 - Helpdesk".to_string(), "lot1-ops-helpdesk".to_string());
        config
            .scheduler
            .schedules
            .insert("due-reviews".to_string(), "0 0 6 * * *".to_string());
        config.save(&path).unwrap();

        let loaded = SmsConfig::load(&path).unwrap();
        assert_eq!(
            loaded.stakeholders.group_for_service("Lot 1 - Helpdesk"),
            Some("lot1-ops-helpdesk")
        );
        assert_eq!(
            loaded.scheduler.schedules.get("due-reviews").map(String::as_str),
            Some("0 0 6 * * *")
        );
        assert_eq!(loaded.server.bind, "0.0.0.0:8080");
        assert!(loaded.scheduler.enabled);
    }

    #[test]
    fn minimal_yaml_uses_defaults() {
        let config: SmsConfig = serde_yaml::from_str(
            "jira:\n  base_url: https://jira.example.org\n  user: bot@example.org\n",
        )
        .unwrap();
        assert_eq!(config.jira.token_env, "SMS_JIRA_TOKEN");
        assert!(config.confluence.is_none());
        assert_eq!(config.stakeholders.fallback_group, "fallback-ops");
        assert!(config.stakeholders.is_qa_issue_type("Security Incident"));
        assert!(!config.stakeholders.is_qa_issue_type("Meeting"));
    }

    #[test]
    fn validate_flags_bad_cron_and_empty_urls() {
        let mut config = SmsConfig::example();
        config.jira.base_url = String::new();
        config
            .scheduler
            .schedules
            .insert("kpi-measurements".to_string(), "not a cron".to_string());

        let warnings = config.validate();
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("jira.base_url")));
        assert!(warnings
            .iter()
            .any(|w| w.level == WarnLevel::Error && w.message.contains("kpi-measurements")));
    }

    #[test]
    fn confluence_client_requires_configuration() {
        let mut config = SmsConfig::example();
        config.confluence = None;
        let err = config.confluence_client().unwrap_err();
        assert!(matches!(err, SmsError::ConfluenceNotConfigured));
    }
}
