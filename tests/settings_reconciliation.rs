//! End-to-end Settings 2.0 reconciliation against a stubbed tenant: schema
//! fetch, identity resolution, and upsert wired together through
//! `SettingsReconciler` rather than any single module in isolation.

use monaco_reconcile::http::DynatraceClient;
use monaco_reconcile::model::{Coordinate, SettingsObject, SettingsUpsertOptions};
use monaco_reconcile::schema::SchemaRegistry;
use monaco_reconcile::settings::SettingsReconciler;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn settings_object() -> SettingsObject {
    SettingsObject {
        coordinate: Coordinate::new("project", "builtin:tags.auto-tagging", "config-id"),
        schema_id: "builtin:tags.auto-tagging".to_string(),
        schema_version: "1.0.0".to_string(),
        scope: "tenant".to_string(),
        content: serde_json::to_vec(&json!({"key_1": "value"})).unwrap(),
        origin_object_id: None,
    }
}

#[tokio::test]
async fn creates_a_new_object_when_no_remote_match_exists() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/settings/schemas/builtin:tags.auto-tagging"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ordered": false, "constraints": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/settings/objects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/settings/objects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"objectId": "new-1"}])))
        .mount(&server)
        .await;

    let client = DynatraceClient::with_concurrency(server.uri(), Arc::from("token"), 4);
    let reconciler = SettingsReconciler::new(client.clone(), SchemaRegistry::new(client, false));

    let entity = reconciler
        .upsert(&settings_object(), &SettingsUpsertOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(entity.id, "new-1");
}

#[tokio::test]
async fn updates_the_object_matching_its_external_id() {
    let server = MockServer::start().await;
    let coordinate = Coordinate::new("project", "builtin:tags.auto-tagging", "config-id");
    let external_id = monaco_reconcile::external_id::settings_external_id(&coordinate).unwrap();

    Mock::given(method("GET"))
        .and(path("/api/v2/settings/schemas/builtin:tags.auto-tagging"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ordered": false, "constraints": []})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/settings/objects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"objectId": "existing-1", "schemaId": "builtin:tags.auto-tagging", "scope": "tenant", "externalId": external_id, "value": {}}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v2/settings/objects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"objectId": "existing-1"}])))
        .mount(&server)
        .await;

    let client = DynatraceClient::with_concurrency(server.uri(), Arc::from("token"), 4);
    let reconciler = SettingsReconciler::new(client.clone(), SchemaRegistry::new(client, false));

    let entity = reconciler
        .upsert(&settings_object(), &SettingsUpsertOptions::default(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(entity.id, "existing-1");
}

#[tokio::test]
async fn ambiguous_unique_constraint_matches_surface_as_ambiguous_match_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v2/settings/schemas/builtin:tags.auto-tagging"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "ordered": false,
            "constraints": [{"type": "UNIQUE", "uniqueProperties": [["key_1"]]}],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v2/settings/objects"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"objectId": "dup-1", "schemaId": "builtin:tags.auto-tagging", "scope": "tenant", "value": {"key_1": "value"}},
                {"objectId": "dup-2", "schemaId": "builtin:tags.auto-tagging", "scope": "tenant", "value": {"key_1": "value"}},
            ]
        })))
        .mount(&server)
        .await;

    let client = DynatraceClient::with_concurrency(server.uri(), Arc::from("token"), 4);
    let reconciler = SettingsReconciler::new(client.clone(), SchemaRegistry::new(client, false));

    let err = reconciler
        .upsert(&settings_object(), &SettingsUpsertOptions::default(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), monaco_reconcile::error::ErrorKind::AmbiguousMatch);
}
