//! End-to-end classic Config API reconciliation: name-based identity
//! resolution, create-vs-update dispatch, and delete's 404-is-success rule,
//! exercised through `ClassicReconciler` against a stubbed tenant.

use monaco_reconcile::classic::ClassicReconciler;
use monaco_reconcile::http::DynatraceClient;
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn reconciler(server: &MockServer) -> ClassicReconciler {
    ClassicReconciler::new(DynatraceClient::with_concurrency(server.uri(), Arc::from("token"), 4))
}

#[tokio::test]
async fn creates_when_no_object_shares_the_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config/v1/alerting-profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"values": []})))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/config/v1/alerting-profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "new-1"})))
        .mount(&server)
        .await;

    let entity = reconciler(&server)
        .upsert_by_name("alerting-profile", "My Profile", &json!({"name": "My Profile"}), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(entity.id, "new-1");
}

#[tokio::test]
async fn updates_the_object_matching_its_name() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/config/v1/alerting-profile"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "values": [{"id": "existing-1", "name": "My Profile"}]
        })))
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path("/api/config/v1/alerting-profile/existing-1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&server)
        .await;

    let entity = reconciler(&server)
        .upsert_by_name("alerting-profile", "My Profile", &json!({"name": "My Profile"}), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(entity.id, "existing-1");
}

#[tokio::test]
async fn delete_treats_404_as_already_absent_success() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/config/v1/alerting-profile/missing"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    reconciler(&server).delete("alerting-profile", "missing", &CancellationToken::new()).await.unwrap();
}

#[tokio::test]
async fn v2_dashboard_payload_is_rejected() {
    let server = MockServer::start().await;
    let err = reconciler(&server)
        .upsert_by_name("dashboard", "My Dashboard", &json!({"dashboardMetadata": {}}), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), monaco_reconcile::error::ErrorKind::Input);
}
