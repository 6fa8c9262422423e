//! Settings 2.0 schema registry: listing, cached detail fetch, and
//! owner-based-access-control enrichment (§4.6).

use crate::cache::{Cache, InMemoryCache};
use crate::error::Error;
use crate::http::DynatraceClient;
use crate::model::{Schema, UniquePropertyTuple};
use crate::retry::RetryProfile;
use reqwest::Method;
use serde::Deserialize;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
struct SchemaListEntry {
    #[serde(rename = "schemaId")]
    schema_id: String,
    #[serde(default)]
    ordered: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SchemaListResponse {
    #[serde(default)]
    items: Vec<SchemaListEntry>,
}

#[derive(Debug, Default, Deserialize)]
struct SchemaConstraint {
    #[serde(rename = "type")]
    constraint_type: String,
    #[serde(default, rename = "uniqueProperties")]
    unique_properties: Vec<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
struct SchemaDetailResponse {
    #[serde(default)]
    constraints: Vec<SchemaConstraint>,
    #[serde(default)]
    ordered: bool,
}

#[derive(Debug, Default, Deserialize)]
struct SchemaAclDetail {
    #[serde(default, rename = "ownerBasedAccessControl")]
    owner_based_access_control: bool,
}

/// One schema id paired with its `ordered` flag, as returned by listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaListing {
    pub schema_id: String,
    pub ordered: bool,
}

/// Caches schema detail (unique-property tuples, ordering, ACL flag) so
/// repeated lookups within one run hit memory instead of the network.
pub struct SchemaRegistry {
    client: DynatraceClient,
    cache: InMemoryCache<Schema>,
    acl_enabled: bool,
}

impl SchemaRegistry {
    #[must_use]
    pub fn new(client: DynatraceClient, acl_enabled: bool) -> Self {
        Self {
            client,
            cache: InMemoryCache::new(),
            acl_enabled,
        }
    }

    /// Lists every schema id with its `ordered` flag.
    ///
    /// # Errors
    /// Propagates transport failures.
    pub async fn list_schemas(&self, cancel: &CancellationToken) -> Result<Vec<SchemaListing>, Error> {
        let response = self
            .client
            .call_with_retry(Method::GET, "/api/v2/settings/schemas", &[], None, RetryProfile::Normal, cancel, |_| true)
            .await?;
        let parsed: SchemaListResponse = serde_json::from_str(&response.body)?;
        Ok(parsed
            .items
            .into_iter()
            .map(|item| SchemaListing {
                schema_id: item.schema_id,
                ordered: item.ordered,
            })
            .collect())
    }

    /// Returns the full schema record for `schema_id`, caching on first fetch.
    /// Only constraints of kind `UNIQUE` become `unique_properties` entries.
    ///
    /// # Errors
    /// Returns [`Error::schema`] if the schema does not exist or its detail
    /// cannot be fetched; propagates transport failures otherwise.
    pub async fn get_schema(&self, schema_id: &str, cancel: &CancellationToken) -> Result<Schema, Error> {
        if let Some(cached) = self.cache.get(schema_id).await {
            return Ok(cached);
        }

        let path = format!("/api/v2/settings/schemas/{schema_id}");
        let response = self
            .client
            .call_with_retry(Method::GET, &path, &[], None, RetryProfile::Normal, cancel, |e| e.status() != Some(404))
            .await
            .map_err(|e| {
                if e.status() == Some(404) {
                    Error::schema(format!("unknown schema '{schema_id}'"))
                } else {
                    e
                }
            })?;

        let detail: SchemaDetailResponse = serde_json::from_str(&response.body)?;
        let unique_properties: Vec<UniquePropertyTuple> = detail
            .constraints
            .into_iter()
            .filter(|c| c.constraint_type == "UNIQUE")
            .flat_map(|c| c.unique_properties)
            .collect();

        let acl_enabled = if self.acl_enabled {
            self.fetch_acl_flag(schema_id, cancel).await?
        } else {
            false
        };

        let schema = Schema {
            schema_id: schema_id.to_string(),
            ordered: detail.ordered,
            unique_properties,
            acl_enabled,
        };
        self.cache.set(schema_id.to_string(), schema.clone()).await;
        Ok(schema)
    }

    async fn fetch_acl_flag(&self, schema_id: &str, cancel: &CancellationToken) -> Result<bool, Error> {
        fetch_acl_flag(&self.client, schema_id, cancel).await
    }

    /// Enriches a listing with owner-based-access-control flags in parallel,
    /// each branch bounded by the client's process-wide concurrency limiter
    /// (§4.6, §5). A failure on any branch fails the whole listing.
    ///
    /// # Errors
    /// The first error observed across all spawned fetches.
    pub async fn enrich_with_acl(&self, schema_ids: &[String], cancel: &CancellationToken) -> Result<Vec<bool>, Error> {
        let mut joins = JoinSet::new();
        for (index, schema_id) in schema_ids.iter().enumerate() {
            let client = self.client.clone();
            let schema_id = schema_id.clone();
            let cancel = cancel.clone();
            joins.spawn(async move { (index, fetch_acl_flag(&client, &schema_id, &cancel).await) });
        }

        let mut flags = vec![false; schema_ids.len()];
        while let Some(joined) = joins.join_next().await {
            let (index, result) = joined.map_err(|e| Error::transport(format!("ACL enrichment task panicked: {e}"), None, None))?;
            flags[index] = result?;
        }
        Ok(flags)
    }
}

async fn fetch_acl_flag(client: &DynatraceClient, schema_id: &str, cancel: &CancellationToken) -> Result<bool, Error> {
    let path = format!("/api/v2/settings/schemas/{schema_id}");
    let query = [("fields".to_string(), "ownerBasedAccessControl".to_string())];
    let response = client
        .call_with_retry(Method::GET, &path, &query, None, RetryProfile::Normal, cancel, |_| true)
        .await?;
    let detail: SchemaAclDetail = serde_json::from_str(&response.body)?;
    Ok(detail.owner_based_access_control)
}
