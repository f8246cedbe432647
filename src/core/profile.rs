//! Profile metadata and the three fact groups a scan produces.
//!
//! Every category is optional. `None` means "no signal" and is omitted when
//! written; older files that spell that as `"unknown"`, `""` or `null` read
//! back as `None` too.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Stack {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub languages: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub frontend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub database: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub css: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub testing: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub bundler: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub ci_cd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "flag")]
    pub containerized: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CodeStyle {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub naming: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub comments: Option<String>,
    #[serde(
        alias = "errors",
        skip_serializing_if = "Option::is_none",
        deserialize_with = "signal"
    )]
    pub error_handling: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub quotes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "flag")]
    pub semicolons: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub indent: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub function_length: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Architecture {
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub state_management: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", deserialize_with = "signal")]
    pub api_style: Option<String>,
}

/// Output of one project scan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectFacts {
    pub stack: Stack,
    pub code_style: CodeStyle,
    pub architecture: Architecture,
}

/// Contents of `team.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TeamProfile {
    pub name: String,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub scanned_from: Vec<String>,
    #[serde(default)]
    pub stack: Stack,
    #[serde(default)]
    pub code_style: CodeStyle,
    #[serde(default)]
    pub architecture: Architecture,
}

impl TeamProfile {
    pub fn new(name: &str, created_at: String) -> Self {
        Self {
            name: name.to_string(),
            created_at,
            scanned_from: Vec::new(),
            stack: Stack::default(),
            code_style: CodeStyle::default(),
            architecture: Architecture::default(),
        }
    }

    pub fn facts(&self) -> ProjectFacts {
        ProjectFacts {
            stack: self.stack.clone(),
            code_style: self.code_style.clone(),
            architecture: self.architecture.clone(),
        }
    }

    /// Replace facts and record `source` unless it is already the latest entry.
    pub fn apply_scan(&mut self, facts: ProjectFacts, source: &str) {
        self.stack = facts.stack;
        self.code_style = facts.code_style;
        self.architecture = facts.architecture;
        if self.scanned_from.last().map(String::as_str) != Some(source) {
            self.scanned_from.push(source.to_string());
        }
    }
}

fn signal<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) if !s.is_empty() && s != "unknown" => Some(s),
        Some(serde_json::Value::Bool(b)) => Some(b.to_string()),
        Some(serde_json::Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

fn flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Bool(b)) => Some(b),
        Some(serde_json::Value::String(s)) if s == "true" || s == "yes" => Some(true),
        Some(serde_json::Value::String(s)) if s == "false" || s == "no" => Some(false),
        _ => None,
    })
}
