//! Output formatting for session reports and command results

pub mod console;
