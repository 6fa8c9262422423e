//! Classic Config API reconciler (§4.8): name- and id-keyed objects that
//! predate Settings 2.0.

use crate::cache::{Cache, InMemoryCache};
use crate::error::Error;
use crate::escape::json_safe_escape;
use crate::http::DynatraceClient;
use crate::model::{DynatraceEntity, Value};
use crate::pagination::{self, Page};
use crate::retry::{self, classifier::ClassifierInput, RetryProfile};
use reqwest::Method;
use serde::Deserialize;
use serde_json::{json, Value as JsonValue};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Picks the request/response shape a classic API id uses (§9 Design Notes).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassicDialect {
    Plain,
    CustomEquality,
    PutOnly,
    PositionQueryPrepend,
    IdInPayload,
    ApplicationMobile,
    MobileKeyUserActions,
    VersionAwareExtension,
    LocationHeaderResponse,
    BespokeResponseShape,
}

/// One table entry: an API id paired with its identity and wire behavior.
#[derive(Debug, Clone, Copy)]
pub struct ClassicApi {
    pub api_id: &'static str,
    pub single_configuration: bool,
    pub non_unique_name: bool,
    pub bypass_list_cache: bool,
    pub dialect: ClassicDialect,
}

const DEFAULT_API: ClassicApi = ClassicApi {
    api_id: "",
    single_configuration: false,
    non_unique_name: false,
    bypass_list_cache: false,
    dialect: ClassicDialect::Plain,
};

/// Static dispatch table (§9 Design Notes): adding an API is a table entry,
/// never a code branch. Unlisted ids fall back to [`DEFAULT_API`]'s plain
/// dialect.
const CLASSIC_APIS: &[ClassicApi] = &[
    ClassicApi {
        api_id: "extension",
        dialect: ClassicDialect::VersionAwareExtension,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "mobile-key-user-actions",
        dialect: ClassicDialect::MobileKeyUserActions,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "network-zone",
        dialect: ClassicDialect::PutOnly,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "calculated-metrics-log",
        dialect: ClassicDialect::PutOnly,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "user-action-and-session-properties-mobile",
        dialect: ClassicDialect::PutOnly,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "app-detection-rule",
        dialect: ClassicDialect::PositionQueryPrepend,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "dashboard",
        non_unique_name: true,
        bypass_list_cache: true,
        dialect: ClassicDialect::IdInPayload,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "dashboard-share-settings",
        dialect: ClassicDialect::IdInPayload,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "report",
        dialect: ClassicDialect::IdInPayload,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "service-detection-full-web-request",
        dialect: ClassicDialect::IdInPayload,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "service-detection-full-web-service",
        dialect: ClassicDialect::IdInPayload,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "application-mobile",
        bypass_list_cache: true,
        dialect: ClassicDialect::ApplicationMobile,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "application-web",
        bypass_list_cache: true,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "slo",
        dialect: ClassicDialect::BespokeResponseShape,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "synthetic-monitor",
        dialect: ClassicDialect::BespokeResponseShape,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "synthetic-location",
        dialect: ClassicDialect::BespokeResponseShape,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "aws-credentials",
        dialect: ClassicDialect::BespokeResponseShape,
        ..DEFAULT_API
    },
    ClassicApi {
        api_id: "key-user-actions-web",
        dialect: ClassicDialect::BespokeResponseShape,
        ..DEFAULT_API
    },
];

fn api_descriptor(api_id: &str) -> ClassicApi {
    CLASSIC_APIS.iter().copied().find(|a| a.api_id == api_id).unwrap_or(DEFAULT_API)
}

fn is_synthetic_api(api_id: &str) -> bool {
    api_id.starts_with("synthetic-")
}

fn is_application_api(api_id: &str) -> bool {
    api_id.starts_with("application-")
}

/// The known-timing-issue retry classes (§4.8), evaluated first-match-wins.
const CLASSIC_RETRY_RULES: &[retry::classifier::RetryClassRule] = &[
    retry::classifier::RetryClassRule {
        name: "unique-name-propagation",
        predicate: |i| i.body.contains("must have a unique name"),
        profile: RetryProfile::Normal,
    },
    retry::classifier::RetryClassRule {
        name: "request-attribute-propagation",
        predicate: |i| i.body.contains("must specify a known request attribute"),
        profile: RetryProfile::Long,
    },
    retry::classifier::RetryClassRule {
        name: "synthetic-not-ready",
        predicate: |i| is_synthetic_api(i.api_id) && (i.status == 404 || i.status >= 500),
        profile: RetryProfile::Normal,
    },
    retry::classifier::RetryClassRule {
        name: "credential-vault-not-ready",
        predicate: |i| i.api_id == "credential-vault" && i.status == 404,
        profile: RetryProfile::Normal,
    },
    retry::classifier::RetryClassRule {
        name: "application-not-ready",
        predicate: |i| (is_application_api(i.api_id) && i.status >= 400) || i.body.contains("unknown-applications"),
        profile: RetryProfile::VeryLong,
    },
    retry::classifier::RetryClassRule {
        name: "network-zones-disabled",
        predicate: |i| i.api_id == "network-zone" && (400..500).contains(&i.status) && i.body.contains("network zones are disabled"),
        profile: RetryProfile::Normal,
    },
    retry::classifier::RetryClassRule {
        name: "management-zone-not-found",
        predicate: |i| (i.api_id == "management-zone" || i.api_id == "slo") && i.status == 404,
        profile: RetryProfile::Normal,
    },
    retry::classifier::RetryClassRule {
        name: "calculated-metrics-selector-invalid",
        predicate: |i| i.api_id.starts_with("calculated-metrics") && i.body.contains("selector is invalid"),
        profile: RetryProfile::Normal,
    },
];

#[derive(Debug, Default, Deserialize)]
struct ClassicListResponse {
    #[serde(default)]
    values: Vec<Value>,
}

#[derive(Debug, Deserialize)]
struct CreateResponse {
    id: String,
}

fn error_body(err: &Error) -> String {
    if let Error::Internal { context: Some(ctx), .. } = err {
        if let Some(details) = &ctx.details {
            return details.get("body").and_then(JsonValue::as_str).unwrap_or_default().to_string();
        }
    }
    String::new()
}

fn name_from_payload(payload: &JsonValue) -> String {
    payload.get("name").and_then(JsonValue::as_str).unwrap_or_default().to_string()
}

fn extension_version_key(version: &str) -> (u32, u32) {
    let mut parts = version.split('.');
    let major = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    let minor = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
    (major, minor)
}

fn validate_dashboard_shape(api: &str, payload: &JsonValue) -> Result<(), Error> {
    if api == "dashboard" && payload.get("dashboardMetadata").is_some() {
        return Err(Error::input("dashboard payload uses the v2 shape; deploy it through the settings reconciler instead"));
    }
    Ok(())
}

/// Reconciles declared classic Config API objects against a tenant,
/// dispatching per-API behavior from the static [`CLASSIC_APIS`] table.
pub struct ClassicReconciler {
    client: DynatraceClient,
    list_cache: InMemoryCache<Arc<[Value]>>,
}

impl ClassicReconciler {
    #[must_use]
    pub fn new(client: DynatraceClient) -> Self {
        Self {
            client,
            list_cache: InMemoryCache::new(),
        }
    }

    /// Lists every object under `api`, honoring the list-cache-bypass
    /// exceptions (§4.8 List cache policy).
    ///
    /// # Errors
    /// Propagates transport failures.
    pub async fn list(&self, api: &str, cancel: &CancellationToken) -> Result<Vec<Value>, Error> {
        let descriptor = api_descriptor(api);
        if descriptor.bypass_list_cache {
            return self.list_raw(api, cancel).await;
        }
        if let Some(cached) = self.list_cache.get(api).await {
            return Ok(cached.to_vec());
        }
        let items = self.list_raw(api, cancel).await?;
        self.list_cache.set(api.to_string(), Arc::from(items.clone())).await;
        Ok(items)
    }

    async fn list_raw(&self, api: &str, cancel: &CancellationToken) -> Result<Vec<Value>, Error> {
        let path = format!("/api/config/v1/{api}");
        pagination::paginate(&path, vec![], move |query| async move {
            let path = format!("/api/config/v1/{api}");
            let response = self
                .client
                .call_with_retry(Method::GET, &path, &query, None, RetryProfile::Normal, cancel, |_| true)
                .await?;
            let page: ClassicListResponse = serde_json::from_str(&response.body)?;
            Ok((
                Page {
                    items: page.values,
                    next_page_key: None,
                },
                Some(response.status),
            ))
        })
        .await
    }

    /// Fetches a single object by id.
    ///
    /// # Errors
    /// Returns [`Error::not_found`] on HTTP 404; propagates other transport
    /// failures.
    pub async fn get(&self, api: &str, id: &str, cancel: &CancellationToken) -> Result<Value, Error> {
        let path = format!("/api/config/v1/{api}/{id}");
        let response = self
            .client
            .call_with_retry(Method::GET, &path, &[], None, RetryProfile::Normal, cancel, |e| e.status() != Some(404))
            .await
            .map_err(|e| {
                if e.status() == Some(404) {
                    Error::not_found(format!("classic object '{id}' not found in api '{api}'"))
                } else {
                    e
                }
            })?;
        Ok(serde_json::from_str(&response.body)?)
    }

    /// True if an object with `name` already exists under `api`.
    ///
    /// # Errors
    /// Propagates transport failures.
    pub async fn exists_by_name(&self, api: &str, name: &str, cancel: &CancellationToken) -> Result<bool, Error> {
        let descriptor = api_descriptor(api);
        if descriptor.single_configuration {
            return Ok(true);
        }
        let values = self.list(api, cancel).await?;
        Ok(values.iter().any(|v| v.name == name || json_safe_escape(&v.name) == name))
    }

    async fn find_existing(&self, api: &str, descriptor: &ClassicApi, name: &str, payload: &JsonValue, cancel: &CancellationToken) -> Result<Option<String>, Error> {
        if descriptor.single_configuration {
            return Ok(None);
        }
        let values = self.list(api, cancel).await?;

        if descriptor.dialect == ClassicDialect::CustomEquality {
            let declared_fields = payload.get("customFields");
            return Ok(match declared_fields {
                None => None,
                Some(_) => values.iter().find(|v| v.custom_fields.as_ref() == declared_fields).map(|v| v.id.clone()),
            });
        }

        let matches: Vec<&Value> = values.iter().filter(|v| v.name == name || json_safe_escape(&v.name) == name).collect();
        match matches.len() {
            0 => Ok(None),
            1 => Ok(Some(matches[0].id.clone())),
            _ => {
                warn!(api, name, count = matches.len(), "multiple objects share this name on a unique-name API; picking the first deterministically");
                Ok(Some(matches[0].id.clone()))
            }
        }
    }

    /// Identity resolution for name-keyed objects (§4.8). Skips lookup
    /// entirely for single-configuration APIs.
    ///
    /// # Errors
    /// Propagates transport and classification failures.
    pub async fn upsert_by_name(&self, api: &str, name: &str, payload: &JsonValue, cancel: &CancellationToken) -> Result<DynatraceEntity, Error> {
        let descriptor = api_descriptor(api);
        validate_dashboard_shape(api, payload)?;
        let existing_id = self.find_existing(api, &descriptor, name, payload, cancel).await?;
        self.submit(api, &descriptor, existing_id.as_deref(), payload, cancel).await
    }

    /// Non-unique name/id path (§4.8), used for APIs that permit duplicate
    /// names (e.g. dashboards).
    ///
    /// # Errors
    /// Propagates transport and classification failures.
    pub async fn upsert_by_non_unique_name_and_id(
        &self,
        api: &str,
        stable_id: &str,
        name: &str,
        payload: &JsonValue,
        update_non_unique_if_single: bool,
        cancel: &CancellationToken,
    ) -> Result<DynatraceEntity, Error> {
        validate_dashboard_shape(api, payload)?;
        let values = self.list(api, cancel).await?;
        let by_id = values.iter().find(|v| v.id == stable_id);
        let by_name: Vec<&Value> = values.iter().filter(|v| v.name == name).collect();

        let target = if let Some(existing) = by_id {
            existing.id.clone()
        } else if by_name.is_empty() {
            stable_id.to_string()
        } else if by_name.len() == 1 && update_non_unique_if_single {
            by_name[0].id.clone()
        } else {
            warn!(api, name, stable_id, "ambiguous non-unique-name match; creating a new row at the stable id");
            stable_id.to_string()
        };

        let descriptor = api_descriptor(api);
        self.submit(api, &descriptor, Some(target.as_str()), payload, cancel).await
    }

    /// Deletes `id` under `api`. A 404 is treated as already-absent success
    /// (§4.8 Classic delete), never surfaced as an error.
    ///
    /// # Errors
    /// Propagates transport failures other than 404.
    pub async fn delete(&self, api: &str, id: &str, cancel: &CancellationToken) -> Result<(), Error> {
        let path = format!("/api/config/v1/{api}/{id}");
        match self
            .client
            .call_with_retry(Method::DELETE, &path, &[], None, RetryProfile::Normal, cancel, |e| e.status() != Some(404))
            .await
        {
            Ok(_) => {
                self.list_cache.delete(api).await;
                Ok(())
            }
            Err(e) if e.status() == Some(404) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn submit(&self, api: &str, descriptor: &ClassicApi, existing_id: Option<&str>, payload: &JsonValue, cancel: &CancellationToken) -> Result<DynatraceEntity, Error> {
        if descriptor.dialect == ClassicDialect::MobileKeyUserActions {
            if let Some(id) = existing_id {
                return Ok(DynatraceEntity::new(id.to_string(), name_from_payload(payload)));
            }
        }

        let mut body = payload.clone();
        if descriptor.dialect == ClassicDialect::ApplicationMobile && existing_id.is_some() {
            if let JsonValue::Object(map) = &mut body {
                map.remove("applicationType");
            }
        }

        match descriptor.dialect {
            ClassicDialect::PutOnly => {
                let id = existing_id.map(str::to_string).unwrap_or_else(|| name_from_payload(payload));
                self.put(api, &id, &body, cancel).await
            }
            ClassicDialect::IdInPayload if existing_id.is_some() => {
                let id = existing_id.expect("checked by match guard");
                if let JsonValue::Object(map) = &mut body {
                    map.insert("id".to_string(), json!(id));
                }
                self.put(api, id, &body, cancel).await
            }
            _ => match existing_id {
                Some(id) => self.put(api, id, &body, cancel).await,
                None => self.create(api, descriptor, &body, cancel).await,
            },
        }
    }

    async fn put(&self, api: &str, id: &str, body: &JsonValue, cancel: &CancellationToken) -> Result<DynatraceEntity, Error> {
        let path = format!("/api/config/v1/{api}/{id}");
        let bytes = serde_json::to_vec(body)?;
        self.call_with_classified_retry(api, Method::PUT, &path, &[], Some(bytes), cancel).await?;
        self.list_cache.delete(api).await;
        let name = body.get("name").and_then(JsonValue::as_str).unwrap_or(id).to_string();
        Ok(DynatraceEntity::new(id.to_string(), name))
    }

    async fn create(&self, api: &str, descriptor: &ClassicApi, body: &JsonValue, cancel: &CancellationToken) -> Result<DynatraceEntity, Error> {
        let path = format!("/api/config/v1/{api}");
        let query: Vec<(String, String)> = if descriptor.dialect == ClassicDialect::PositionQueryPrepend {
            vec![("position".to_string(), "PREPEND".to_string())]
        } else {
            vec![]
        };
        let bytes = serde_json::to_vec(body)?;
        let response = self.call_with_classified_retry(api, Method::POST, &path, &query, Some(bytes), cancel).await?;
        self.list_cache.delete(api).await;

        let name = name_from_payload(body);

        if descriptor.dialect == ClassicDialect::LocationHeaderResponse {
            let location = response
                .headers
                .get("location")
                .and_then(|v| v.to_str().ok())
                .ok_or_else(|| Error::transport("create response missing Location header", Some(response.status), None))?;
            let id = location.rsplit('/').next().unwrap_or(location).to_string();
            return Ok(DynatraceEntity::new(id, name));
        }

        let parsed: CreateResponse = serde_json::from_str(&response.body)?;
        Ok(DynatraceEntity::new(parsed.id, name))
    }

    /// Runs one call, classifying a failure through [`CLASSIC_RETRY_RULES`]
    /// to pick a retry profile; unclassified failures surface immediately.
    async fn call_with_classified_retry(
        &self,
        api: &str,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<Vec<u8>>,
        cancel: &CancellationToken,
    ) -> Result<crate::http::RawResponse, Error> {
        match self.client.call(method.clone(), path, query, body.clone()).await {
            Ok(response) => Ok(response),
            Err(first_err) => {
                let status = first_err.status().unwrap_or(0);
                let body_text = error_body(&first_err);
                let input = ClassifierInput {
                    api_id: api,
                    status,
                    body: &body_text,
                };
                match retry::classifier::classify(CLASSIC_RETRY_RULES, &input) {
                    None => Err(first_err),
                    Some(profile) => {
                        retry::execute_with_retry(profile, cancel, |_| true, |_attempt| self.client.call(method.clone(), path, query, body.clone())).await
                    }
                }
            }
        }
    }

    /// Version-aware extension upload (§4.8): fetches the remote version,
    /// compares `major.minor` numerically, and uploads only if `local_version`
    /// is newer or the extension is missing remotely.
    ///
    /// # Errors
    /// Propagates transport failures other than a 404 on the version probe.
    pub async fn upload_extension(&self, extension_name: &str, local_version: &str, binary: Vec<u8>, cancel: &CancellationToken) -> Result<DynatraceEntity, Error> {
        let path = format!("/api/config/v1/extensions/{extension_name}");
        let remote_version = match self
            .client
            .call_with_retry(Method::GET, &path, &[], None, RetryProfile::Normal, cancel, |e| e.status() != Some(404))
            .await
        {
            Ok(response) => {
                #[derive(Deserialize)]
                struct ExtensionInfo {
                    version: String,
                }
                let info: ExtensionInfo = serde_json::from_str(&response.body)?;
                Some(info.version)
            }
            Err(e) if e.status() == Some(404) => None,
            Err(e) => return Err(e),
        };

        let should_upload = match &remote_version {
            None => true,
            Some(remote) => extension_version_key(local_version) > extension_version_key(remote),
        };

        if !should_upload {
            return Ok(DynatraceEntity::new(extension_name.to_string(), extension_name.to_string()));
        }

        let upload_path = "/api/config/v1/extensions".to_string();
        self.client
            .call_with_retry(Method::POST, &upload_path, &[], Some(binary), RetryProfile::Long, cancel, |_| true)
            .await?;
        self.list_cache.delete("extension").await;
        Ok(DynatraceEntity::new(extension_name.to_string(), extension_name.to_string()))
    }
}
