//! Domain types for the identity bridge.

pub mod customer;
pub mod email;
pub mod identity;
pub mod metadata;

pub use customer::{CustomerId, CustomerIdError, CustomerRecord, NewCustomer};
pub use email::{Email, EmailError};
pub use identity::{IdentityClaims, ProfileExtras};
pub use metadata::{MetadataEntry, PROFILE_NAMESPACE, SIGNUP_SOURCE_GOOGLE, profile_entries};
