//! Declarative provisioning of a private network, one managed compute
//! instance and its weekday power schedule, emitted as a provisioning-engine
//! template.
//!
//! Flow: `spec` (validate inputs) -> `stack` (declare into a `graph`) ->
//! `render` (template) or `model` (plan summary).

pub mod diagnostics;
pub mod error;
pub mod graph;
pub mod model;
pub mod render;
pub mod spec;
pub mod stack;

pub type Result<T> = anyhow::Result<T>;
