//! Storage seam for customer lookups and writes.

use async_trait::async_trait;
use identity_bridge_core::{CustomerId, CustomerRecord, Email, MetadataEntry, NewCustomer};

use crate::shopify::DirectoryError;

/// Read/create access to the customer directory.
///
/// Implemented by [`crate::shopify::AdminClient`]; tests substitute an
/// in-memory directory.
#[async_trait]
pub trait CustomerDirectory: Send + Sync {
    /// Look up the customer registered under `email`.
    ///
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] if the lookup itself fails.
    async fn find_by_email(&self, email: &Email) -> Result<Option<CustomerRecord>, DirectoryError>;

    /// Create a customer with a verified email.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Validation`] with the first reported user
    /// error when the directory rejects the input.
    async fn create(&self, customer: &NewCustomer) -> Result<CustomerRecord, DirectoryError>;

    /// Write metadata entries on `owner`. An empty slice does nothing.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError::Validation`] with the first reported user
    /// error when the directory rejects an entry.
    async fn set_metadata(
        &self,
        owner: &CustomerId,
        entries: &[MetadataEntry],
    ) -> Result<(), DirectoryError>;
}
