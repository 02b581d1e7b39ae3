//! Typed build errors.
//!
//! Every variant is a build-time failure: graph construction stops at the first
//! one and nothing is emitted. They convert to `anyhow::Error` via `?`.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BuildError {
    // ── Input validation ─────────────────────────────────────────────────────

    #[error("invalid CIDR block '{value}': {reason}")]
    InvalidCidr { value: String, reason: String },

    #[error("invalid subnet mask /{mask} for block {block}: {reason}")]
    InvalidMask {
        block: String,
        mask: u8,
        reason: String,
    },

    #[error(
        "block {block} cannot fit {count} subnets of /{mask} \
         ({needed} addresses needed, {available} available)"
    )]
    SubnetsDoNotFit {
        block: String,
        mask: u8,
        count: usize,
        needed: u64,
        available: u64,
    },

    #[error("invalid {what} '{value}': must match {pattern}")]
    InvalidName {
        what: &'static str,
        value: String,
        pattern: &'static str,
    },

    #[error("resource name '{name}' is {len} characters, limit is {max}")]
    NameTooLong { name: String, len: usize, max: usize },

    #[error("resource name '{name}' starts with the reserved prefix '{prefix}'")]
    ReservedPrefix { name: String, prefix: &'static str },

    #[error("invalid cron expression '{value}': {reason}")]
    InvalidCron { value: String, reason: String },

    #[error("invalid timezone '{0}'")]
    InvalidTimezone(String),

    #[error("cannot read boot configuration {}: {source}", path.display())]
    BootPayloadUnreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    // ── Topology resolution ──────────────────────────────────────────────────

    #[error("unknown subnet group '{0}'")]
    UnknownSubnetGroup(String),

    #[error("subnet group '{0}' is not private; the workload must not be internet-routable")]
    SubnetGroupNotPrivate(String),

    #[error("availability zone count must be between 1 and {max}, got {count}")]
    InvalidZoneCount { count: u8, max: u8 },

    // ── Graph integrity ──────────────────────────────────────────────────────

    #[error("invalid logical id '{0}': must be non-empty and alphanumeric")]
    InvalidLogicalId(String),

    #[error("logical id '{0}' is declared twice")]
    DuplicateLogicalId(String),

    #[error("resource name '{name}' is used by both {first} and {second}")]
    DuplicateResourceName {
        name: String,
        first: String,
        second: String,
    },

    #[error("{from} references '{to}', which is not declared before it")]
    UnresolvedReference { from: String, to: String },

    #[error("{id} is a {actual}, expected {expected}")]
    UnexpectedResourceType {
        id: String,
        actual: String,
        expected: &'static str,
    },

    #[error("dependency cycle: {0}")]
    Cycle(String),
}
