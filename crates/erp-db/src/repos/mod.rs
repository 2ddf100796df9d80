//! Repository modules.
//!
//! Each module adds methods to `ErpService` via `impl ErpService` blocks.

pub mod attachments;
pub mod audit;
pub mod sequence;
pub mod settings;
