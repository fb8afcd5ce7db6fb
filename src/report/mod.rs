//! Report rendering.

pub mod generator;

pub use generator::{generate_failures_section, generate_json_report, generate_markdown_report};
