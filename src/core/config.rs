//! Optional `<root>/config.toml` with dedup thresholds and project paths.

use crate::core::error::TeamError;
use crate::core::store::TeamRoot;
use serde::{Deserialize, Serialize};
use std::fs;

/// Similarity metric used when folding rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RuleSimilarity {
    /// `|A∩B| / min(|A|,|B|)`
    #[default]
    Overlap,
    /// `|A∩B| / |A∪B|`
    Jaccard,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct TeamConfig {
    pub rules: RulesConfig,
    pub journal: JournalConfig,
    pub project: ProjectConfig,
    pub lock: LockConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RulesConfig {
    pub dedup_threshold: f64,
    pub similarity: RuleSimilarity,
    pub promotion_threshold: u32,
}

impl Default for RulesConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: 0.7,
            similarity: RuleSimilarity::Overlap,
            promotion_threshold: 3,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct JournalConfig {
    pub dedup_threshold: f64,
}

impl Default for JournalConfig {
    fn default() -> Self {
        Self {
            dedup_threshold: 0.7,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project-relative working area for injected artifacts.
    pub brain_dir: String,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            brain_dir: ".agent/brain".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LockConfig {
    pub timeout_ms: u64,
    pub stale_after_secs: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 2000,
            stale_after_secs: 300,
        }
    }
}

/// Load `<root>/config.toml`. No file means defaults.
pub fn load_config(root: &TeamRoot) -> Result<TeamConfig, TeamError> {
    let config_path = root.config_file();
    if !config_path.exists() {
        return Ok(TeamConfig::default());
    }
    let content = fs::read_to_string(&config_path).map_err(TeamError::IoError)?;
    let config: TeamConfig = toml::from_str(&content)
        .map_err(|e| TeamError::ConfigError(format!("{}: {}", config_path.display(), e)))?;
    validate_config(&config)?;
    Ok(config)
}

fn validate_config(config: &TeamConfig) -> Result<(), TeamError> {
    for (key, value) in [
        ("rules.dedup_threshold", config.rules.dedup_threshold),
        ("journal.dedup_threshold", config.journal.dedup_threshold),
    ] {
        if !(0.0..=1.0).contains(&value) {
            return Err(TeamError::ConfigError(format!(
                "{} must be within 0.0..=1.0, got {}",
                key, value
            )));
        }
    }
    if config.project.brain_dir.trim().is_empty() {
        return Err(TeamError::ConfigError(
            "project.brain_dir must not be empty".to_string(),
        ));
    }
    Ok(())
}
