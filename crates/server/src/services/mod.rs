//! Business logic services.
//!
//! # Services
//!
//! - `directory` - The [`CustomerDirectory`] seam over the customer store
//! - `customer_sync` - Find-or-create plus profile metadata

mod customer_sync;
mod directory;

pub use customer_sync::{CustomerSync, SyncOutcome};
pub use directory::CustomerDirectory;
