//! Tool catalog port
//!
//! Read-only view of the registered tools. The domain
//! [`ToolCatalog`] implements it directly; infrastructure only decides what
//! gets registered.

use gauntlet_domain::session::RedTeamPhase;
use gauntlet_domain::tool::{IntentSummary, ResolvedIntent, ToolCatalog};
use std::collections::{BTreeMap, BTreeSet};

pub trait ToolCatalogPort: Send + Sync {
    /// Intent → tool and command template.
    fn resolve(&self, intent: &str) -> Option<ResolvedIntent>;

    /// Whether `parameters` are enough to render the intent.
    fn validate(&self, intent: &str, parameters: &BTreeMap<String, serde_json::Value>) -> bool;

    fn intents_for_phase(&self, phase: RedTeamPhase) -> Vec<IntentSummary>;

    /// Binary presence per tool, as probed at load.
    fn availability(&self) -> BTreeMap<String, bool>;

    /// Safe-flag allowlists keyed by binary.
    fn flag_whitelists(&self) -> BTreeMap<String, BTreeSet<String>>;
}

impl ToolCatalogPort for ToolCatalog {
    fn resolve(&self, intent: &str) -> Option<ResolvedIntent> {
        ToolCatalog::resolve(self, intent)
    }

    fn validate(&self, intent: &str, parameters: &BTreeMap<String, serde_json::Value>) -> bool {
        ToolCatalog::validate(self, intent, parameters)
    }

    fn intents_for_phase(&self, phase: RedTeamPhase) -> Vec<IntentSummary> {
        ToolCatalog::intents_for_phase(self, phase)
    }

    fn availability(&self) -> BTreeMap<String, bool> {
        ToolCatalog::availability(self)
    }

    fn flag_whitelists(&self) -> BTreeMap<String, BTreeSet<String>> {
        ToolCatalog::flag_whitelists(self)
    }
}
