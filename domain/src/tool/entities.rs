//! Tool capability descriptors

use crate::core::error::DomainError;
use crate::core::shell;
use crate::session::phase::RedTeamPhase;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Broad family of a security tool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    Discovery,
    Enumeration,
    Vulnerability,
    Web,
    Exploitation,
}

impl ToolCategory {
    pub fn as_str(&self) -> &str {
        match self {
            ToolCategory::Discovery => "discovery",
            ToolCategory::Enumeration => "enumeration",
            ToolCategory::Vulnerability => "vulnerability",
            ToolCategory::Web => "web",
            ToolCategory::Exploitation => "exploitation",
        }
    }
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// How a tool fulfils one intent
///
/// `template` contains `{name}` placeholders. Each placeholder is filled from
/// the proposal's parameters, falling back to `defaults`; values are
/// shell-quoted before substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentTemplate {
    /// Intent name (e.g., "host_discovery")
    pub intent: String,
    /// Command template (e.g., "nmap -sn {target}")
    pub template: String,
    #[serde(default)]
    pub description: String,
    /// Parameters the proposal must supply
    #[serde(default)]
    pub required_params: Vec<String>,
    /// Fallback values for optional placeholders
    #[serde(default)]
    pub defaults: BTreeMap<String, String>,
}

impl IntentTemplate {
    pub fn new(intent: impl Into<String>, template: impl Into<String>) -> Self {
        Self {
            intent: intent.into(),
            template: template.into(),
            description: String::new(),
            required_params: Vec::new(),
            defaults: BTreeMap::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_required(mut self, params: &[&str]) -> Self {
        self.required_params = params.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn with_default(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.defaults.insert(name.into(), value.into());
        self
    }

    /// Placeholder names in template order.
    pub fn placeholders(&self) -> Vec<String> {
        let mut names = Vec::new();
        let mut rest = self.template.as_str();
        while let Some(open) = rest.find('{') {
            let after = &rest[open + 1..];
            let Some(close) = after.find('}') else {
                break;
            };
            let name = &after[..close];
            if !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_') {
                names.push(name.to_string());
            }
            rest = &after[close + 1..];
        }
        names
    }

    /// Render the final command string.
    pub fn render(
        &self,
        params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<String, DomainError> {
        for required in &self.required_params {
            if !params.get(required).is_some_and(has_content) {
                return Err(DomainError::Template(format!(
                    "missing required parameter '{}' for intent '{}'",
                    required, self.intent
                )));
            }
        }

        let mut command = self.template.clone();
        for name in self.placeholders() {
            let value = match params.get(&name).filter(|v| has_content(v)) {
                Some(value) => param_to_string(&name, value)?,
                None => self.defaults.get(&name).cloned().ok_or_else(|| {
                    DomainError::Template(format!(
                        "no value for placeholder '{{{}}}' in intent '{}'",
                        name, self.intent
                    ))
                })?,
            };
            command = command.replace(&format!("{{{}}}", name), &shell::escape(&value));
        }
        Ok(command)
    }
}

fn has_content(value: &serde_json::Value) -> bool {
    match value {
        serde_json::Value::Null => false,
        serde_json::Value::String(s) => !s.trim().is_empty(),
        serde_json::Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn param_to_string(name: &str, value: &serde_json::Value) -> Result<String, DomainError> {
    match value {
        serde_json::Value::String(s) => Ok(s.trim().to_string()),
        serde_json::Value::Number(n) => Ok(n.to_string()),
        serde_json::Value::Bool(b) => Ok(b.to_string()),
        serde_json::Value::Array(items) => items
            .iter()
            .map(|item| match item {
                serde_json::Value::String(s) => Ok(s.trim().to_string()),
                serde_json::Value::Number(n) => Ok(n.to_string()),
                _ => Err(DomainError::Template(format!(
                    "parameter '{}' has a non-scalar list item",
                    name
                ))),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(|parts| parts.join(",")),
        _ => Err(DomainError::Template(format!(
            "parameter '{}' must be a string, number or list",
            name
        ))),
    }
}

/// Capability descriptor of a registered tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Unique tool name (e.g., "nmap")
    pub name: String,
    /// Executable looked up on PATH
    pub binary: String,
    pub category: ToolCategory,
    /// Phases the tool is offered in
    pub phases: Vec<RedTeamPhase>,
    #[serde(default)]
    pub intents: Vec<IntentTemplate>,
    /// Flag allowlist; empty means the flag layer is skipped
    #[serde(default)]
    pub safe_flags: Vec<String>,
    #[serde(default)]
    pub requires_root: bool,
    #[serde(default = "default_true")]
    pub network_active: bool,
    #[serde(default)]
    pub description: String,
}

fn default_true() -> bool {
    true
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, category: ToolCategory) -> Self {
        let name = name.into();
        Self {
            binary: name.clone(),
            name,
            category,
            phases: Vec::new(),
            intents: Vec::new(),
            safe_flags: Vec::new(),
            requires_root: false,
            network_active: true,
            description: String::new(),
        }
    }

    pub fn with_binary(mut self, binary: impl Into<String>) -> Self {
        self.binary = binary.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_phases(mut self, phases: &[RedTeamPhase]) -> Self {
        self.phases = phases.to_vec();
        self
    }

    pub fn with_intent(mut self, intent: IntentTemplate) -> Self {
        self.intents.push(intent);
        self
    }

    pub fn with_safe_flags(mut self, flags: &[&str]) -> Self {
        self.safe_flags = flags.iter().map(|f| f.to_string()).collect();
        self
    }

    pub fn requires_root(mut self) -> Self {
        self.requires_root = true;
        self
    }

    pub fn intent(&self, intent: &str) -> Option<&IntentTemplate> {
        self.intents.iter().find(|i| i.intent == intent)
    }

    pub fn supports_phase(&self, phase: RedTeamPhase) -> bool {
        self.phases.contains(&phase)
    }
}
