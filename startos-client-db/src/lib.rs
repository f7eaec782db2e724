//! Local replica of the server database.
//!
//! A [`Store`] holds the document. The [`driver`] keeps it current by feeding a
//! [`PatchSource`] subscription through a [`Synchronizer`]; everything else
//! only reads and [watches](Store::watch) it.

pub mod driver;
pub mod packages;
pub mod source;
pub mod store;
pub mod sync;
pub mod watch;

pub use driver::{spawn, SyncHandle, SyncStatus};
pub use source::{PatchSource, PatchStream, PatchSubscription, SyncError};
pub use store::Store;
pub use sync::{PatchOutcome, ResyncReason, SyncConfig, Synchronizer};
pub use watch::Watch;
