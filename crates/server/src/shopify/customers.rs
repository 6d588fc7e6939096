//! Customer lookup, creation and metafield writes.

use async_trait::async_trait;
use identity_bridge_core::{CustomerId, CustomerRecord, Email, MetadataEntry, NewCustomer};
use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use super::{AdminClient, DirectoryError, UserErrorInfo};
use crate::services::CustomerDirectory;

const FIND_CUSTOMER_BY_EMAIL: &str = r"
query FindCustomerByEmail($query: String!) {
  customers(first: 1, query: $query) {
    edges { node { id email } }
  }
}";

const CUSTOMER_CREATE: &str = r"
mutation CustomerCreate($input: CustomerInput!) {
  customerCreate(input: $input) {
    customer { id email }
    userErrors { field message }
  }
}";

const METAFIELDS_SET: &str = r"
mutation MetafieldsSet($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    metafields { key }
    userErrors { field message code }
  }
}";

#[derive(Debug, Deserialize)]
struct CustomerNode {
    id: String,
    email: Option<String>,
}

impl TryFrom<CustomerNode> for CustomerRecord {
    type Error = DirectoryError;

    fn try_from(node: CustomerNode) -> Result<Self, Self::Error> {
        let id = CustomerId::new(node.id).map_err(|_| DirectoryError::MissingData("customer id"))?;
        let email = node.email.and_then(|e| Email::parse(&e).ok());
        Ok(Self { id, email })
    }
}

#[derive(Debug, Deserialize)]
struct FindData {
    customers: Connection,
}

#[derive(Debug, Deserialize)]
struct Connection {
    edges: Vec<Edge>,
}

#[derive(Debug, Deserialize)]
struct Edge {
    node: CustomerNode,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateData {
    customer_create: Option<CreatePayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreatePayload {
    customer: Option<CustomerNode>,
    #[serde(default)]
    user_errors: Vec<UserErrorInfo>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetafieldsSetData {
    metafields_set: Option<MetafieldsSetPayload>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetafieldsSetPayload {
    #[serde(default)]
    user_errors: Vec<UserErrorInfo>,
}

/// Customer search query matching `email` exactly.
///
/// The value is quoted so `+`, `:` and spaces are not read as search syntax.
fn email_search_query(email: &Email) -> String {
    let escaped = email.as_str().replace('\\', "\\\\").replace('"', "\\\"");
    format!("email:\"{escaped}\"")
}

fn first_user_error(errors: Vec<UserErrorInfo>) -> Result<(), DirectoryError> {
    match errors.into_iter().next() {
        Some(first) => Err(DirectoryError::Validation(first)),
        None => Ok(()),
    }
}

fn non_empty(s: &str) -> Option<&str> {
    let s = s.trim();
    (!s.is_empty()).then_some(s)
}

#[async_trait]
impl CustomerDirectory for AdminClient {
    #[instrument(skip_all, fields(email = %email))]
    async fn find_by_email(&self, email: &Email) -> Result<Option<CustomerRecord>, DirectoryError> {
        let data: FindData = self
            .execute(
                FIND_CUSTOMER_BY_EMAIL,
                json!({ "query": email_search_query(email) }),
            )
            .await?;

        let Some(edge) = data.customers.edges.into_iter().next() else {
            return Ok(None);
        };
        let record = CustomerRecord::try_from(edge.node)?;

        // Search is fuzzy on some shops; never hand back someone else's record.
        if let Some(found) = &record.email
            && !found.as_str().eq_ignore_ascii_case(email.as_str())
        {
            tracing::warn!(found = %found, "Customer search returned a different email");
            return Ok(None);
        }

        Ok(Some(record))
    }

    #[instrument(skip_all, fields(email = %customer.email))]
    async fn create(&self, customer: &NewCustomer) -> Result<CustomerRecord, DirectoryError> {
        let variables = json!({
            "input": {
                "email": customer.email.as_str(),
                "firstName": non_empty(&customer.first_name),
                "lastName": non_empty(&customer.last_name),
                "verifiedEmail": true,
            }
        });

        let data: CreateData = self.execute(CUSTOMER_CREATE, variables).await?;
        let payload = data
            .customer_create
            .ok_or(DirectoryError::MissingData("customerCreate"))?;

        first_user_error(payload.user_errors)?;

        let node = payload
            .customer
            .ok_or(DirectoryError::MissingData("customer"))?;
        let record = CustomerRecord::try_from(node)?;
        tracing::info!(customer_id = %record.id, "Created customer");
        Ok(record)
    }

    #[instrument(skip_all, fields(customer_id = %owner, count = entries.len()))]
    async fn set_metadata(
        &self,
        owner: &CustomerId,
        entries: &[MetadataEntry],
    ) -> Result<(), DirectoryError> {
        if entries.is_empty() {
            return Ok(());
        }

        let data: MetafieldsSetData = self
            .execute(METAFIELDS_SET, json!({ "metafields": entries }))
            .await?;
        let payload = data
            .metafields_set
            .ok_or(DirectoryError::MissingData("metafieldsSet"))?;

        first_user_error(payload.user_errors)
    }
}
