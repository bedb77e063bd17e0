//! Integration tests for the check-in backend.

use std::sync::Arc;

use chrono::FixedOffset;
use reqwest::Client;
use serde_json::{json, Value};
use tempfile::TempDir;

use crate::config::{Config, DailyResetPolicy, DemoExportPolicy, DuplicatePolicy};
use crate::db::{init_database, Repository};
use crate::models::Mode;
use crate::{create_router, AppState};

const API_KEY: &str = "test-api-key";
const ADMIN_PASSWORD: &str = "test-admin";

/// Test fixture for integration tests.
struct TestFixture {
    client: Client,
    base_url: String,
    _temp_dir: TempDir,
}

impl TestFixture {
    async fn new() -> Self {
        Self::with_psk(Some(API_KEY.to_string())).await
    }

    async fn with_psk(psk: Option<String>) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.sqlite");

        let pool = init_database(&db_path).await.expect("Failed to init DB");
        let repo = Arc::new(Repository::new(pool));
        repo.set_mode(Mode::Demo).await.expect("Failed to set mode");

        let config = Config {
            api_psk: psk.clone(),
            admin_password: Some(ADMIN_PASSWORD.to_string()),
            db_path,
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            log_level: "warn".to_string(),
            event_offset: FixedOffset::east_opt(8 * 3600).unwrap(),
            default_mode: Mode::Demo,
            daily_reset: DailyResetPolicy::Manual,
            duplicate_policy: DuplicatePolicy::Flag,
            demo_export: DemoExportPolicy::Include,
        };

        let app = create_router(AppState::new(repo, config));

        // Bind to random port
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind");
        let addr = listener.local_addr().expect("Failed to get addr");
        let base_url = format!("http://{}", addr);

        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        // Wait for server to start
        tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;

        let mut client_builder = Client::builder();
        if let Some(key) = psk {
            let mut headers = reqwest::header::HeaderMap::new();
            headers.insert("x-api-key", key.parse().unwrap());
            client_builder = client_builder.default_headers(headers);
        }

        TestFixture {
            client: client_builder.build().unwrap(),
            base_url,
            _temp_dir: temp_dir,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get(&self, path: &str) -> (u16, Value) {
        let resp = self.client.get(self.url(path)).send().await.unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn post(&self, path: &str, body: Value) -> (u16, Value) {
        let resp = self
            .client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .unwrap();
        let status = resp.status().as_u16();
        (status, resp.json().await.unwrap())
    }

    async fn upload_choir(&self) -> Value {
        let (status, body) = self
            .post(
                "/api/upload-roster",
                json!({
                    "activityName": "Spring Concert",
                    "participants": [
                        { "id": "P1", "name": "陳大文", "englishName": "Tai Man", "voicePart": "Tenor" },
                        { "id": "P2", "name": "李小明", "voicePart": "Bass", "isValid": false },
                        { "id": "P3", "name": "Wong, Mei", "voicePart": "Alto" }
                    ]
                }),
            )
            .await;
        assert_eq!(status, 200, "upload failed: {body}");
        body
    }

    async fn check_in(&self, id: &str) -> (u16, Value) {
        self.post("/api/check-in", json!({ "qrData": id })).await
    }
}

#[tokio::test]
async fn test_health_check() {
    let fixture = TestFixture::new().await;

    let resp = fixture
        .client
        .get(fixture.url("/health"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn test_auth_missing_and_invalid_psk() {
    let fixture = TestFixture::new().await;
    let anonymous = Client::new();

    let resp = anonymous
        .get(fixture.url("/api/participants"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);

    let resp = anonymous
        .get(fixture.url("/api/participants"))
        .header("x-api-key", "wrong-key")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 401);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let resp = anonymous
        .get(fixture.url("/api/participants"))
        .bearer_auth(API_KEY)
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    // Health stays open
    let resp = anonymous.get(fixture.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn test_no_psk_allows_all_requests() {
    let fixture = TestFixture::with_psk(None).await;

    let (status, body) = fixture.get("/api/total-people").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["totalPeople"], 0);
}

#[tokio::test]
async fn test_upload_roster_sets_activity_and_generation() {
    let fixture = TestFixture::new().await;

    let body = fixture.upload_choir().await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["totalPeople"], 3);
    assert_eq!(body["data"]["currentActivityName"], "Spring Concert");
    let generation = body["rosterGeneration"].as_i64().unwrap();
    assert_eq!(body["data"]["rosterGeneration"], generation);

    let (_, body) = fixture.get("/api/current-activity").await;
    assert_eq!(body["data"]["currentActivityName"], "Spring Concert");
    assert_eq!(body["rosterGeneration"], generation);

    let (_, body) = fixture.get("/api/total-people").await;
    assert_eq!(body["data"]["totalPeople"], 3);

    // A second upload bumps the generation
    let body = fixture.upload_choir().await;
    assert!(body["rosterGeneration"].as_i64().unwrap() > generation);
}

#[tokio::test]
async fn test_check_in_flow() {
    let fixture = TestFixture::new().await;
    fixture.upload_choir().await;

    let (status, body) = fixture.check_in("P1").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "accepted");
    assert_eq!(body["data"]["isDuplicate"], false);
    assert_eq!(body["data"]["dailyCheckInCount"], 1);
    assert_eq!(body["data"]["totalPeople"], 3);
    assert_eq!(body["data"]["participant"]["id"], "P1");
    assert_eq!(
        body["data"]["participant"]["checkIns"].as_array().unwrap().len(),
        1
    );

    // Ineligible participant: rejected, nothing counted
    let (status, body) = fixture.check_in("P2").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["reason"], "invalid");
    assert_eq!(body["data"]["dailyCheckInCount"], 1);

    // Same person again today: recorded, flagged, counted
    let (_, body) = fixture.check_in(" P1 ").await;
    assert_eq!(body["data"]["status"], "accepted");
    assert_eq!(body["data"]["isDuplicate"], true);
    assert_eq!(body["data"]["dailyCheckInCount"], 2);

    let (_, body) = fixture.get("/api/participants/P1").await;
    assert_eq!(body["data"]["checkIns"].as_array().unwrap().len(), 2);

    // Most recent check-in first, never-checked-in last in load order
    let (_, body) = fixture.get("/api/participants").await;
    let ids: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(ids, ["P1", "P2", "P3"]);
}

#[tokio::test]
async fn test_unknown_id_is_rejected_not_an_error() {
    let fixture = TestFixture::new().await;
    fixture.upload_choir().await;

    let (status, body) = fixture.check_in("NOPE").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["reason"], "notFound");
    assert_eq!(body["data"]["dailyCheckInCount"], 0);
    assert!(body["data"].get("participant").is_none());
}

#[tokio::test]
async fn test_check_in_validation_errors() {
    let fixture = TestFixture::new().await;
    fixture.upload_choir().await;

    let (status, body) = fixture
        .post(
            "/api/check-in",
            json!({ "id": "P1", "checkInTime": "yesterday at noon" }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    let (status, body) = fixture.check_in("   ").await;
    assert_eq!(status, 400);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

    // Nothing was recorded
    let (_, body) = fixture.get("/api/daily-check-in-count").await;
    assert_eq!(body["data"]["dailyCheckInCount"], 0);
}

#[tokio::test]
async fn test_failed_upload_keeps_previous_roster() {
    let fixture = TestFixture::new().await;
    let body = fixture.upload_choir().await;
    let generation = body["rosterGeneration"].clone();
    fixture.check_in("P1").await;

    let (status, body) = fixture
        .post(
            "/api/upload-roster",
            json!({
                "activityName": "Broken Upload",
                "participants": [
                    { "id": "X1", "name": "One" },
                    { "id": "X1", "name": "Two" }
                ]
            }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    assert_eq!(body["rosterGeneration"], generation);

    let (_, body) = fixture.get("/api/current-activity").await;
    assert_eq!(body["data"]["currentActivityName"], "Spring Concert");
    assert_eq!(body["rosterGeneration"], generation);

    let (status, body) = fixture.get("/api/participants/P1").await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["checkIns"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_participant_not_found() {
    let fixture = TestFixture::new().await;
    fixture.upload_choir().await;

    let (status, body) = fixture.get("/api/participants/NOPE").await;
    assert_eq!(status, 404);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_set_mode_requires_admin_password() {
    let fixture = TestFixture::new().await;

    let (_, body) = fixture.get("/api/mode").await;
    assert_eq!(body["data"]["isDemoMode"], true);

    let (status, body) = fixture
        .post("/api/set-mode", json!({ "isDemoMode": false }))
        .await;
    assert_eq!(status, 401);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");

    let (status, _) = fixture
        .post(
            "/api/set-mode",
            json!({ "isDemoMode": false, "password": "guess" }),
        )
        .await;
    assert_eq!(status, 401);

    let (_, body) = fixture.get("/api/mode").await;
    assert_eq!(body["data"]["isDemoMode"], true);

    let (status, body) = fixture
        .post(
            "/api/set-mode",
            json!({ "isDemoMode": false, "password": ADMIN_PASSWORD }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["isDemoMode"], false);

    let (_, body) = fixture.get("/api/mode").await;
    assert_eq!(body["data"]["isDemoMode"], false);
}

#[tokio::test]
async fn test_daily_counts_are_per_mode() {
    let fixture = TestFixture::new().await;
    fixture.upload_choir().await;

    fixture.check_in("P1").await;
    fixture.check_in("P3").await;

    let (status, _) = fixture
        .post(
            "/api/set-mode",
            json!({ "isDemoMode": false, "password": ADMIN_PASSWORD }),
        )
        .await;
    assert_eq!(status, 200);

    // The client's stale flag is ignored; the server mode decides
    let (_, body) = fixture
        .post("/api/check-in", json!({ "qrData": "P1", "isDemoMode": true }))
        .await;
    assert_eq!(body["data"]["dailyCheckInCount"], 1);

    let (_, body) = fixture.get("/api/daily-check-in-count").await;
    assert_eq!(body["data"]["dailyCheckInCount"], 1);
    assert_eq!(body["data"]["isDemoMode"], false);

    let (_, body) = fixture
        .get("/api/daily-check-in-count?isDemoMode=true")
        .await;
    assert_eq!(body["data"]["dailyCheckInCount"], 2);
    assert_eq!(body["data"]["isDemoMode"], true);

    // Reset only touches the requested partition
    let (status, body) = fixture
        .post("/api/reset-daily-check-in-count?isDemoMode=true", json!({}))
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["success"], true);

    let (_, body) = fixture
        .get("/api/daily-check-in-count?isDemoMode=true")
        .await;
    assert_eq!(body["data"]["dailyCheckInCount"], 0);
    let (_, body) = fixture.get("/api/daily-check-in-count").await;
    assert_eq!(body["data"]["dailyCheckInCount"], 1);

    // Histories are not touched by a counter reset
    let (_, body) = fixture.get("/api/participants/P1").await;
    assert_eq!(body["data"]["checkIns"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_clear_roster() {
    let fixture = TestFixture::new().await;
    let body = fixture.upload_choir().await;
    let generation = body["rosterGeneration"].as_i64().unwrap();
    fixture.check_in("P1").await;

    let (status, body) = fixture.post("/api/clear-roster", json!({})).await;
    assert_eq!(status, 200);
    assert_eq!(body["data"]["totalPeople"], 0);
    assert!(body["rosterGeneration"].as_i64().unwrap() > generation);

    let (_, body) = fixture.get("/api/participants").await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (_, body) = fixture.check_in("P1").await;
    assert_eq!(body["data"]["status"], "rejected");
    assert_eq!(body["data"]["reason"], "notFound");
}

#[tokio::test]
async fn test_export_csv() {
    let fixture = TestFixture::new().await;
    fixture.upload_choir().await;
    fixture
        .post(
            "/api/check-in",
            json!({ "qrData": "P1", "checkInTime": "2024-01-01T09:00:00Z" }),
        )
        .await;

    let resp = fixture
        .client
        .get(fixture.url("/api/export-checkins"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);

    let content_type = resp.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/csv"));
    let disposition = resp.headers()["content-disposition"]
        .to_str()
        .unwrap()
        .to_string();
    assert!(disposition.starts_with("attachment; filename=\"Spring_Concert_checkins_"));
    assert!(disposition.contains(".csv"));

    let csv = resp.text().await.unwrap();
    let lines: Vec<_> = csv
        .trim_start_matches('\u{feff}')
        .trim_end()
        .split("\r\n")
        .collect();
    assert_eq!(lines.len(), 4);
    assert!(lines[0].starts_with("id,name,"));
    assert!(lines[1].starts_with("P1,陳大文,Tai Man,Tenor,true,2024-01-01T09:00:00.000Z"));
    assert!(lines[1].contains("2024-01-01 17:00:00"));
    assert!(lines[3].starts_with("P3,\"Wong, Mei\""));
}

#[tokio::test]
async fn test_export_json() {
    let fixture = TestFixture::new().await;
    fixture.upload_choir().await;
    fixture.check_in("P1").await;
    fixture.check_in("P1").await;

    let (status, body) = fixture.get("/api/export-checkins?format=json").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);

    let data = &body["data"];
    assert_eq!(data["activityName"], "Spring Concert");
    assert_eq!(data["totalPeople"], 3);
    assert_eq!(data["totalCheckIns"], 2);
    assert_eq!(data["rosterGeneration"], body["rosterGeneration"]);

    let rows = data["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["mode"], "demo");
    assert!(rows[2]["checkInTime"].is_null());
}
