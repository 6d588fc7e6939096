//! Customer directory records.
//!
//! The directory (Shopify) owns customers; this system only reads them and
//! creates them when missing.

use core::fmt;

use serde::{Deserialize, Serialize};

use super::email::Email;

/// Error returned when a customer id is blank.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
#[error("customer id cannot be empty")]
pub struct CustomerIdError;

/// Opaque directory identifier for a customer.
///
/// Shopify hands these out as global ids (`gid://shopify/Customer/123`). The
/// value is passed back verbatim; [`CustomerId::legacy_id`] is the short
/// numeric form used in log lines.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CustomerId(String);

impl CustomerId {
    /// Wrap a directory id.
    ///
    /// # Errors
    ///
    /// Returns [`CustomerIdError`] if the id is empty or whitespace.
    pub fn new(id: impl Into<String>) -> Result<Self, CustomerIdError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CustomerIdError);
        }
        Ok(Self(id))
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The trailing segment of a global id (`gid://shopify/Customer/42` → `42`).
    #[must_use]
    pub fn legacy_id(&self) -> &str {
        self.0.rsplit('/').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for CustomerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A customer as seen in the directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomerRecord {
    /// Directory id.
    pub id: CustomerId,
    /// Email on file. Shopify allows customers without one.
    pub email: Option<Email>,
}

/// Input for creating a customer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCustomer {
    /// Email address (unique in the directory).
    pub email: Email,
    /// Given name, possibly empty.
    pub first_name: String,
    /// Family name, possibly empty.
    pub last_name: String,
}
