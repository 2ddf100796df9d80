//! # erp-core
//!
//! Core types shared by every college ERP crate.
//!
//! - Entity structs for the audit log, number sequences, system settings and
//!   attachments
//! - Audit action enum and the tagged `(kind, id)` entity reference
//! - Field snapshots used for before/after audit state
//! - Sequence code templates (`{prefix}/{year:04d}/{seq:05d}`)
//! - The task-scoped actor context
//! - Cross-cutting error types

pub mod actor;
pub mod entities;
pub mod enums;
pub mod errors;
pub mod reference;
pub mod sequence;
pub mod snapshot;
