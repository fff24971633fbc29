//! Core domain concepts shared across all subdomains.
//!
//! - [`error::DomainError`]: domain-level errors
//! - [`shell`]: quoting and word splitting for rendered commands
//! - [`string`]: UTF-8 safe helpers used when previewing command output

pub mod error;
pub mod shell;
pub mod string;
