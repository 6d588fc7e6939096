//! Identity claims produced by the identity exchange.

use serde::{Deserialize, Deserializer};

use super::email::Email;

/// Claims extracted from a Google id token.
///
/// Built once per request and dropped when the request completes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IdentityClaims {
    /// Verified email address.
    pub email: Email,
    /// Given name, empty when the provider did not share it.
    pub given_name: String,
    /// Family name, empty when the provider did not share it.
    pub family_name: String,
    /// Stable subject id at the provider.
    pub subject: Option<String>,
}

/// Optional profile fields a caller may send alongside the code.
///
/// Every field is stored as customer metadata when non-empty. Forms often
/// post numbers for phone or VAT fields, so any JSON scalar is accepted and
/// kept as text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ProfileExtras {
    /// Company name.
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub company: Option<String>,
    /// VAT / tax number.
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub vat: Option<String>,
    /// Phone number.
    #[serde(default, deserialize_with = "scalar_as_text")]
    pub phone: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Text(String),
    Integer(i64),
    Unsigned(u64),
    Float(f64),
    Bool(bool),
}

impl From<Scalar> for String {
    fn from(value: Scalar) -> Self {
        match value {
            Scalar::Text(s) => s,
            Scalar::Integer(n) => n.to_string(),
            Scalar::Unsigned(n) => n.to_string(),
            Scalar::Float(n) => n.to_string(),
            Scalar::Bool(b) => b.to_string(),
        }
    }
}

fn scalar_as_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Scalar>::deserialize(deserializer).map(|value| value.map(String::from))
}

impl ProfileExtras {
    /// Non-empty fields as `(key, value)` pairs, values trimmed.
    pub fn fields(&self) -> impl Iterator<Item = (&'static str, &str)> {
        [
            ("company", self.company.as_deref()),
            ("vat", self.vat.as_deref()),
            ("phone", self.phone.as_deref()),
        ]
        .into_iter()
        .filter_map(|(key, value)| {
            let value = value?.trim();
            (!value.is_empty()).then_some((key, value))
        })
    }
}
