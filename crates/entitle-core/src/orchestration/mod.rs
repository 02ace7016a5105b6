//! The enable operation and its stages.

pub mod enable;
pub mod precondition;
pub mod reconcile;
pub mod result;

pub use enable::{ENABLE_LOCK_HOLDER, EnableOrchestrator};
pub use precondition::{EnablePolicy, check_preconditions};
pub use reconcile::StateDiff;
pub use result::assemble_result;
