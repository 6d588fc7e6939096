//! Find-or-create for signed-in customers.

use std::sync::Arc;

use identity_bridge_core::{
    CustomerId, CustomerRecord, IdentityClaims, NewCustomer, ProfileExtras, profile_entries,
};
use tracing::instrument;

use super::CustomerDirectory;
use crate::shopify::DirectoryError;

/// Result of [`CustomerSync::find_or_create`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncOutcome {
    /// The customer the identity maps to.
    pub customer_id: CustomerId,
    /// Whether the customer already existed.
    pub existed: bool,
    /// Whether the profile metadata write succeeded.
    pub metadata_saved: bool,
}

/// Maps an identity onto exactly one directory customer.
#[derive(Clone)]
pub struct CustomerSync {
    directory: Arc<dyn CustomerDirectory>,
}

impl CustomerSync {
    /// Create a sync service over `directory`.
    #[must_use]
    pub fn new(directory: Arc<dyn CustomerDirectory>) -> Self {
        Self { directory }
    }

    /// Find the customer for `claims.email`, creating it when missing, then
    /// record profile metadata.
    ///
    /// A failed metadata write is logged and reported through
    /// [`SyncOutcome::metadata_saved`]; it does not fail the sync.
    ///
    /// # Errors
    ///
    /// Returns a [`DirectoryError`] when the lookup or creation fails.
    #[instrument(skip_all, fields(email = %claims.email))]
    pub async fn find_or_create(
        &self,
        claims: &IdentityClaims,
        extras: &ProfileExtras,
    ) -> Result<SyncOutcome, DirectoryError> {
        let (record, existed) = match self.directory.find_by_email(&claims.email).await? {
            Some(record) => (record, true),
            None => self.create(claims).await?,
        };

        let entries = profile_entries(&record.id, claims, extras);
        let metadata_saved = match self.directory.set_metadata(&record.id, &entries).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(
                    customer_id = %record.id,
                    error = %e,
                    "Failed to save profile metadata"
                );
                false
            }
        };

        tracing::info!(
            customer_id = %record.id,
            legacy_id = record.id.legacy_id(),
            existed,
            metadata_saved,
            "Customer synced"
        );

        Ok(SyncOutcome {
            customer_id: record.id,
            existed,
            metadata_saved,
        })
    }

    /// Create the customer. A concurrent request may have created it between
    /// our lookup and this call; the directory then reports the email as
    /// taken and the record is fetched instead.
    async fn create(&self, claims: &IdentityClaims) -> Result<(CustomerRecord, bool), DirectoryError> {
        let new = NewCustomer {
            email: claims.email.clone(),
            first_name: claims.given_name.clone(),
            last_name: claims.family_name.clone(),
        };

        match self.directory.create(&new).await {
            Ok(record) => Ok((record, false)),
            Err(err) if err.is_taken() => {
                tracing::info!("Customer created concurrently, re-querying");
                match self.directory.find_by_email(&claims.email).await? {
                    Some(record) => Ok((record, true)),
                    None => Err(err),
                }
            }
            Err(err) => Err(err),
        }
    }
}
