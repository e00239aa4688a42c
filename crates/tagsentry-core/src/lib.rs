#![deny(missing_docs)]

//! # tagsentry-core — Foundational Types for TagSentry
//!
//! This crate defines the types every other crate in the workspace depends
//! on. It has no internal crate dependencies — only `serde`, `serde_json`,
//! `thiserror`, and `chrono` from the external ecosystem.
//!
//! ## Design Principles
//!
//! 1. **Newtype wrappers for domain primitives.** Every identifier is a
//!    distinct type. You cannot pass a [`PolicyId`] where a [`WorkflowId`]
//!    is expected, and a [`ResourceId`] is validated non-empty at
//!    construction time.
//!
//! 2. **Tag maps are explicit values, never aliased.** [`Tags`] merging is
//!    an operation that returns a new map ([`Tags::merged`]), with incoming
//!    entries taking precedence. No shared mutable tag state flows between
//!    evaluation and application.
//!
//! 3. **Validated construction.** [`Policy`] rules and [`ResourceId`]s fail
//!    fast with a [`ValidationError`] instead of carrying malformed data
//!    into the engine.
//!
//! 4. **[`TagSentryError`] hierarchy.** Structured errors with `thiserror` —
//!    no `Box<dyn Error>`, no `.unwrap()` outside tests.

pub mod error;
pub mod issue;
pub mod policy;
pub mod provider;
pub mod resource;
pub mod tags;
pub mod workflow;

// Re-export primary types at crate root for ergonomic imports.
pub use error::{
    ConnectorError, NotFoundError, StateError, StorageError, TagSentryError, ValidationError,
};
pub use issue::{ComplianceIssue, IssueSet};
pub use policy::{validate_required_tags, Policy, PolicyDraft, PolicyId, PolicyPatch, RequiredTagRule};
pub use provider::CloudProvider;
pub use resource::{ComplianceStatus, Resource, ResourceId};
pub use tags::Tags;
pub use workflow::{Workflow, WorkflowDetails, WorkflowId, WorkflowStatus, WorkflowType};
