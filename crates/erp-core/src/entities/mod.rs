//! Entity structs persisted by `erp-db`.
//!
//! All structs derive `Serialize`, `Deserialize`, and `JsonSchema` so they can
//! be printed by the CLI and dumped as schemas.

mod attachment;
mod audit;
mod sequence;
mod setting;

pub use attachment::Attachment;
pub use audit::AuditEntry;
pub use sequence::{IssuedNumber, SequenceCounter, SequenceDefinition};
pub use setting::Setting;
