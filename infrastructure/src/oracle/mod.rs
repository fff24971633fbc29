//! Oracle adapters.
//!
//! - [`ProcessOracle`]: any program speaking JSON over stdin/stdout
//! - [`HeuristicOracle`]: rule-based, offline

pub mod heuristic;
pub mod instructions;
pub mod process;

pub use heuristic::HeuristicOracle;
pub use instructions::instructions;
pub use process::{EmptyOracleCommand, ProcessOracle};
