//! Registration table mapping intents to tools.

use super::entities::{IntentTemplate, ToolDescriptor};
use crate::core::error::DomainError;
use crate::session::phase::RedTeamPhase;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// An intent resolved to a concrete tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedIntent {
    pub tool: String,
    pub binary: String,
    pub template: IntentTemplate,
}

impl ResolvedIntent {
    pub fn render(
        &self,
        params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<String, DomainError> {
        self.template.render(params)
    }
}

/// Intent offered to the oracle for a phase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IntentSummary {
    pub intent: String,
    pub tool: String,
    pub description: String,
    pub required_params: Vec<String>,
    pub available: bool,
}

/// Tool registry.
///
/// Tools are kept in registration order. Registering a name twice replaces
/// the earlier descriptor in place, so manifest entries override built-ins.
#[derive(Debug, Clone, Default)]
pub struct ToolCatalog {
    tools: Vec<ToolDescriptor>,
    availability: BTreeMap<String, bool>,
}

impl ToolCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, descriptor: ToolDescriptor) {
        match self.tools.iter_mut().find(|t| t.name == descriptor.name) {
            Some(existing) => *existing = descriptor,
            None => self.tools.push(descriptor),
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<ToolDescriptor> {
        let index = self.tools.iter().position(|t| t.name == name)?;
        self.availability.remove(name);
        Some(self.tools.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.tools.iter().find(|t| t.name == name)
    }

    pub fn tools(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Record whether a tool's binary was found.
    pub fn set_available(&mut self, name: &str, available: bool) {
        if self.get(name).is_some() {
            self.availability.insert(name.to_string(), available);
        }
    }

    /// Unprobed tools count as available.
    pub fn is_available(&self, name: &str) -> bool {
        self.availability.get(name).copied().unwrap_or(true)
    }

    pub fn availability(&self) -> BTreeMap<String, bool> {
        self.tools
            .iter()
            .map(|t| (t.name.clone(), self.is_available(&t.name)))
            .collect()
    }

    /// Pick the tool for an intent: the first available provider, else the
    /// first registered one.
    pub fn resolve(&self, intent: &str) -> Option<ResolvedIntent> {
        let providers: Vec<_> = self
            .tools
            .iter()
            .filter_map(|tool| tool.intent(intent).map(|template| (tool, template)))
            .collect();
        let (tool, template) = providers
            .iter()
            .find(|(tool, _)| self.is_available(&tool.name))
            .or_else(|| providers.first())?;
        Some(ResolvedIntent {
            tool: tool.name.clone(),
            binary: tool.binary.clone(),
            template: (*template).clone(),
        })
    }

    /// Resolve and render in one step.
    pub fn render(
        &self,
        intent: &str,
        params: &BTreeMap<String, serde_json::Value>,
    ) -> Result<(ResolvedIntent, String), DomainError> {
        let resolved = self
            .resolve(intent)
            .ok_or_else(|| DomainError::Template(format!("no tool provides intent '{}'", intent)))?;
        let command = resolved.render(params)?;
        Ok((resolved, command))
    }

    /// Whether `params` satisfy the intent's template.
    pub fn validate(&self, intent: &str, params: &BTreeMap<String, serde_json::Value>) -> bool {
        self.render(intent, params).is_ok()
    }

    pub fn intents_for_phase(&self, phase: RedTeamPhase) -> Vec<IntentSummary> {
        let mut seen = BTreeSet::new();
        let mut summaries = Vec::new();
        for tool in self.tools.iter().filter(|t| t.supports_phase(phase)) {
            for template in &tool.intents {
                if !seen.insert(template.intent.clone()) {
                    continue;
                }
                if let Some(resolved) = self.resolve(&template.intent) {
                    summaries.push(IntentSummary {
                        intent: template.intent.clone(),
                        description: template.description.clone(),
                        required_params: template.required_params.clone(),
                        available: self.is_available(&resolved.tool),
                        tool: resolved.tool,
                    });
                }
            }
        }
        summaries
    }

    pub fn safe_flags(&self, binary: &str) -> Option<&[String]> {
        self.tools
            .iter()
            .find(|t| t.binary == binary || t.name == binary)
            .map(|t| t.safe_flags.as_slice())
            .filter(|flags| !flags.is_empty())
    }

    /// Flag allowlists keyed by binary file name, for tools that declare one.
    pub fn flag_whitelists(&self) -> BTreeMap<String, BTreeSet<String>> {
        self.tools
            .iter()
            .filter(|t| !t.safe_flags.is_empty())
            .map(|t| {
                let name = t.binary.rsplit('/').next().unwrap_or(&t.binary);
                (name.to_string(), t.safe_flags.iter().cloned().collect())
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::entities::ToolCategory;
    use serde_json::json;

    fn catalog() -> ToolCatalog {
        let mut catalog = ToolCatalog::new();
        catalog.register(
            ToolDescriptor::new("nmap", ToolCategory::Discovery)
                .with_phases(&[RedTeamPhase::Recon, RedTeamPhase::Enumeration])
                .with_safe_flags(&["-sn", "-sS", "-sV", "-p"])
                .with_intent(
                    IntentTemplate::new("port_scan_quick", "nmap -sS --top-ports 100 {target}")
                        .with_required(&["target"]),
                ),
        );
        catalog.register(
            ToolDescriptor::new("masscan", ToolCategory::Discovery)
                .with_phases(&[RedTeamPhase::Recon])
                .with_intent(
                    IntentTemplate::new("port_scan_quick", "masscan {target} -p1-1000")
                        .with_required(&["target"]),
                ),
        );
        catalog
    }

    fn target(value: &str) -> BTreeMap<String, serde_json::Value> {
        BTreeMap::from([("target".to_string(), json!(value))])
    }

    #[test]
    fn test_resolve_prefers_available_provider() {
        let mut catalog = catalog();
        assert_eq!(catalog.resolve("port_scan_quick").unwrap().tool, "nmap");

        catalog.set_available("nmap", false);
        assert_eq!(catalog.resolve("port_scan_quick").unwrap().tool, "masscan");

        catalog.set_available("masscan", false);
        assert_eq!(catalog.resolve("port_scan_quick").unwrap().tool, "nmap");
        assert!(catalog.resolve("ssh_brute").is_none());
    }

    #[test]
    fn test_render_and_validate() {
        let catalog = catalog();
        let (resolved, command) = catalog
            .render("port_scan_quick", &target("10.0.0.5"))
            .unwrap();
        assert_eq!(resolved.binary, "nmap");
        assert_eq!(command, "nmap -sS --top-ports 100 10.0.0.5");

        assert!(catalog.validate("port_scan_quick", &target("10.0.0.5")));
        assert!(!catalog.validate("port_scan_quick", &BTreeMap::new()));
        assert!(!catalog.validate("unknown_intent", &target("10.0.0.5")));
    }

    #[test]
    fn test_register_replaces_by_name() {
        let mut catalog = catalog();
        catalog.register(
            ToolDescriptor::new("nmap", ToolCategory::Discovery)
                .with_phases(&[RedTeamPhase::Recon])
                .with_intent(IntentTemplate::new("ping_sweep", "nmap -sn {target}")),
        );
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.tools()[0].name, "nmap");
        assert!(catalog.resolve("ping_sweep").is_some());
        assert_eq!(catalog.resolve("port_scan_quick").unwrap().tool, "masscan");
    }

    #[test]
    fn test_intents_for_phase_deduplicates() {
        let catalog = catalog();
        let recon = catalog.intents_for_phase(RedTeamPhase::Recon);
        assert_eq!(recon.len(), 1);
        assert_eq!(recon[0].tool, "nmap");
        assert!(catalog.intents_for_phase(RedTeamPhase::Exploitation).is_empty());
    }

    #[test]
    fn test_flag_whitelists_only_for_declared_tools() {
        let catalog = catalog();
        let whitelists = catalog.flag_whitelists();
        assert!(whitelists.contains_key("nmap"));
        assert!(!whitelists.contains_key("masscan"));
        assert!(catalog.safe_flags("masscan").is_none());
        assert_eq!(catalog.safe_flags("nmap").unwrap().len(), 4);
    }
}
