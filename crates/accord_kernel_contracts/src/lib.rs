#![forbid(unsafe_code)]

pub mod common;
pub mod consent;
pub mod identity;
pub mod media;
pub mod oracle;

pub use common::{
    ContractViolation, ReasonCodeId, SchemaVersion, UnixTimeMs, Validate, MS_PER_DAY,
};
