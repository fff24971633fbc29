//! Tool domain module
//!
//! Tools are not called by name. The oracle proposes an **intent** (e.g.
//! `service_detection`) plus parameters, and the catalog resolves it to a
//! registered tool whose [`IntentTemplate`] renders the final command.
//!
//! ```text
//! ┌──────────────┐    ┌──────────────┐    ┌──────────────┐
//! │ intent +     │───▶│ ToolCatalog  │───▶│ rendered     │
//! │ parameters   │    │ (resolve)    │    │ command      │
//! └──────────────┘    └──────┬───────┘    └──────────────┘
//!                            │
//!                            ├─ "host_discovery" → nmap
//!                            └─ "dir_enum"       → gobuster
//! ```
//!
//! # Key Types
//!
//! - [`ToolDescriptor`]: Name, binary, phases, intents and flag allowlist
//! - [`IntentTemplate`]: Command template with required parameters
//! - [`ToolCatalog`]: Registration table; a manifest entry overrides a
//!   built-in of the same name
//!
//! Availability of a binary is probed by infrastructure and stored in the
//! catalog only to guide resolution and to inform the oracle. It is never a
//! safety gate; see [`crate::safety`] for that.

pub mod catalog;
pub mod entities;

pub use catalog::{IntentSummary, ResolvedIntent, ToolCatalog};
pub use entities::{IntentTemplate, ToolCategory, ToolDescriptor};
