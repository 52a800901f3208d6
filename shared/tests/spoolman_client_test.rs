// ============================================================================
// Spoolman Client Tests
// ============================================================================
//
// Runs `SpoolmanClient` against an axum stub of the inventory API bound to
// an ephemeral local port.
//
// ============================================================================

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use spool_relay_config::{InventoryConfig, LocationsSource};
use spool_relay_shared::{InventoryClient, InventoryError, SpoolmanClient};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

#[derive(Clone, Default)]
struct StubState {
    patches: Arc<Mutex<Vec<(String, Value)>>>,
}

async fn list_locations() -> Json<Value> {
    Json(json!(["shelf-3", "shelf-4"]))
}

async fn locations_setting() -> Json<Value> {
    Json(json!({
        "key": "locations",
        "value": "[\"shelf-3\",\"shelf-4\",\"dryer\"]",
        "is_set": true,
        "type": "array"
    }))
}

async fn get_spool(Path(id): Path<String>) -> Response {
    match id.as_str() {
        "42" => Json(json!({"id": 42, "location": "shelf-1", "remaining_weight": 812.5}))
            .into_response(),
        "7" => Json(json!({"id": 7})).into_response(),
        "garbled" => "<html>oops</html>".into_response(),
        "busy" => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        _ => (StatusCode::NOT_FOUND, Json(json!({"message": "Spool not found"}))).into_response(),
    }
}

async fn patch_spool(
    State(state): State<StubState>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    state.patches.lock().unwrap().push((id.clone(), body));
    match id.as_str() {
        "42" => Json(json!({"id": 42})).into_response(),
        "busy" => StatusCode::BAD_GATEWAY.into_response(),
        _ => (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"message": "Invalid location"})),
        )
            .into_response(),
    }
}

async fn spawn_stub() -> (String, StubState) {
    let state = StubState::default();
    let app = Router::new()
        .route("/api/v1/location", get(list_locations))
        .route("/api/v1/setting/locations", get(locations_setting))
        .route("/api/v1/spool/:id", get(get_spool).patch(patch_spool))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{}/api/v1", addr), state)
}

fn client(api_url: &str, locations_source: LocationsSource) -> SpoolmanClient {
    SpoolmanClient::new(&InventoryConfig {
        api_url: api_url.to_string(),
        locations_source,
        request_timeout_secs: 5,
    })
    .unwrap()
}

fn set(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[tokio::test]
async fn test_list_locations_from_location_endpoint() {
    let (url, _) = spawn_stub().await;
    let client = client(&url, LocationsSource::Location);

    let locations = client.list_locations(&CancellationToken::new()).await.unwrap();
    assert_eq!(locations, set(&["shelf-3", "shelf-4"]));
}

#[tokio::test]
async fn test_list_locations_from_setting_endpoint() {
    let (url, _) = spawn_stub().await;
    let client = client(&url, LocationsSource::Setting);

    let locations = client.list_locations(&CancellationToken::new()).await.unwrap();
    assert_eq!(locations, set(&["shelf-3", "shelf-4", "dryer"]));
}

#[tokio::test]
async fn test_get_spool() {
    let (url, _) = spawn_stub().await;
    let client = client(&url, LocationsSource::Location);
    let cancel = CancellationToken::new();

    let spool = client.get_spool(&cancel, "42").await.unwrap();
    assert_eq!(spool.spool_id, "42");
    assert_eq!(spool.location_id, "shelf-1");

    // A spool with no location reports an empty one
    let spool = client.get_spool(&cancel, "7").await.unwrap();
    assert_eq!(spool.location_id, "");
}

#[tokio::test]
async fn test_get_spool_errors() {
    let (url, _) = spawn_stub().await;
    let client = client(&url, LocationsSource::Location);
    let cancel = CancellationToken::new();

    assert_eq!(
        client.get_spool(&cancel, "1000").await,
        Err(InventoryError::NotFound("1000".to_string()))
    );
    assert!(matches!(
        client.get_spool(&cancel, "garbled").await,
        Err(InventoryError::Malformed(_))
    ));
    assert!(matches!(
        client.get_spool(&cancel, "busy").await,
        Err(InventoryError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_update_spool_location_sends_patch_body() {
    let (url, state) = spawn_stub().await;
    let client = client(&url, LocationsSource::Location);

    client
        .update_spool_location(&CancellationToken::new(), "42", "shelf-3")
        .await
        .unwrap();

    let patches = state.patches.lock().unwrap().clone();
    assert_eq!(
        patches,
        vec![("42".to_string(), json!({"location": "shelf-3"}))]
    );
}

#[tokio::test]
async fn test_update_spool_location_errors() {
    let (url, _) = spawn_stub().await;
    let client = client(&url, LocationsSource::Location);
    let cancel = CancellationToken::new();

    match client.update_spool_location(&cancel, "13", "shelf-3").await {
        Err(InventoryError::Rejected { status, body }) => {
            assert_eq!(status, 422);
            assert!(body.contains("Invalid location"));
        }
        other => panic!("expected Rejected, got {:?}", other),
    }

    assert!(matches!(
        client.update_spool_location(&cancel, "busy", "shelf-3").await,
        Err(InventoryError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_unreachable_api_is_unavailable() {
    // Bind then drop to get a local port with nothing listening
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = client(&format!("http://{}", addr), LocationsSource::Location);
    assert!(matches!(
        client.list_locations(&CancellationToken::new()).await,
        Err(InventoryError::Unavailable(_))
    ));
}

#[tokio::test]
async fn test_missing_endpoint_is_unavailable() {
    let (url, _) = spawn_stub().await;
    // Points one level too high, so /location is a 404
    let client = client(url.trim_end_matches("/v1"), LocationsSource::Location);

    assert!(matches!(
        client.list_locations(&CancellationToken::new()).await,
        Err(InventoryError::Unavailable(_))
    ));
}
