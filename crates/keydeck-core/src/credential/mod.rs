//! Key registry: secret + metadata stores kept consistent

mod consistency;
mod registry;
mod types;

pub use consistency::{Inconsistency, RepairAction};
pub use registry::KeyRegistry;
pub use types::*;
