//! Keeps the local cache consistent with the backend.
//!
//! [`SyncCoordinator`] chooses between the online and offline paths, applies
//! optimistic updates with rollback, and publishes a [`ViewState`] that
//! front ends observe.

pub mod connectivity;
pub mod coordinator;
pub mod error;
pub mod locks;
pub mod merge;
#[cfg(test)]
pub(crate) mod test_support;
pub mod view;

pub use connectivity::{Connectivity, FixedConnectivity, HttpProbe};
pub use coordinator::SyncCoordinator;
pub use error::{SliceFailure, SyncError, SyncSlice};
pub use locks::EntityLocks;
pub use view::ViewState;
