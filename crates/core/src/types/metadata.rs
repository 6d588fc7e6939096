//! Namespaced key/value metadata attached to customers.

use serde::Serialize;

use super::customer::CustomerId;
use super::identity::{IdentityClaims, ProfileExtras};

/// Namespace for every entry this system writes.
pub const PROFILE_NAMESPACE: &str = "profile";

/// `signup_source` value for customers arriving through Google sign-in.
pub const SIGNUP_SOURCE_GOOGLE: &str = "google";

/// Shopify metafield type used for all entries.
const TEXT_FIELD_TYPE: &str = "single_line_text_field";

/// One metadata entry, serialized in the shape of Shopify's `MetafieldsSetInput`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetadataEntry {
    /// Customer the entry belongs to.
    pub owner_id: CustomerId,
    /// Grouping namespace.
    pub namespace: String,
    /// Key within the namespace.
    pub key: String,
    /// Value (text).
    pub value: String,
    #[serde(rename = "type")]
    kind: &'static str,
}

impl MetadataEntry {
    /// A text entry.
    #[must_use]
    pub fn text(
        owner_id: CustomerId,
        namespace: impl Into<String>,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        Self {
            owner_id,
            namespace: namespace.into(),
            key: key.into(),
            value: value.into(),
            kind: TEXT_FIELD_TYPE,
        }
    }
}

/// Entries recorded after a Google sign-in.
///
/// Always includes `signup_source`; `google_sub` when the token carried a
/// subject; caller extras when non-empty.
#[must_use]
pub fn profile_entries(
    owner: &CustomerId,
    claims: &IdentityClaims,
    extras: &ProfileExtras,
) -> Vec<MetadataEntry> {
    let mut entries = Vec::with_capacity(5);

    if let Some(sub) = claims.subject.as_deref().filter(|s| !s.is_empty()) {
        entries.push(MetadataEntry::text(
            owner.clone(),
            PROFILE_NAMESPACE,
            "google_sub",
            sub,
        ));
    }
    entries.push(MetadataEntry::text(
        owner.clone(),
        PROFILE_NAMESPACE,
        "signup_source",
        SIGNUP_SOURCE_GOOGLE,
    ));
    entries.extend(
        extras
            .fields()
            .map(|(key, value)| MetadataEntry::text(owner.clone(), PROFILE_NAMESPACE, key, value)),
    );

    entries
}
