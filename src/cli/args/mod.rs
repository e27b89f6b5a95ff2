//! Shared CLI argument types
//!
//! This module contains reusable argument structs that are flattened into
//! the top-level command using `#[command(flatten)]`.

mod extract;
mod global;

pub use extract::ExtractArgs;
pub use global::GlobalOptions;
