//! Feed synchronization logic: ports and the reconciler.

pub mod ports;
pub mod reconciler;
