use std::net::TcpListener;
use std::path::Path;

use chunkwise_config::{ApiKeyConfig, ApiKeyRole, AppConfig, ChunkConfig, MigrationConfig};
use chunkwise_gateway::GatewayServer;
use chunkwise_security::hash_key;
use serde_json::{Value, json};

const ADMIN_KEY: &str = "admin-secret";
const VIEWER_KEY: &str = "viewer-secret";

/// Pick a random available port.
fn random_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind to random port");
    listener.local_addr().unwrap().port()
}

fn sql_chunk(id: &str, sql: &str) -> ChunkConfig {
    ChunkConfig {
        id: id.to_string(),
        name: format!("Chunk {id}"),
        sql: Some(sql.to_string()),
        sql_file: None,
    }
}

/// Config with a temp database, one admin and one viewer key, and a
/// `broken` migration whose second chunk has a syntax error.
fn test_config(port: u16, db_dir: &Path) -> AppConfig {
    let mut config = AppConfig::default();
    config.gateway.host = "127.0.0.1".to_string();
    config.gateway.port = port;
    config.database.path = Some(db_dir.join("app.db"));
    config.gateway.api_keys = vec![
        ApiKeyConfig {
            identity: "ops@example.com".into(),
            key_sha256: hash_key(ADMIN_KEY),
            role: ApiKeyRole::Admin,
        },
        ApiKeyConfig {
            identity: "dashboard@example.com".into(),
            key_sha256: hash_key(VIEWER_KEY),
            role: ApiKeyRole::Viewer,
        },
    ];
    config.migrations.push(MigrationConfig {
        name: "broken".into(),
        chunks: vec![
            sql_chunk("a", "CREATE TABLE IF NOT EXISTS broken_a (id INTEGER PRIMARY KEY);"),
            sql_chunk("b", "CREATE TABLE broken_b (id INTEGER,, name TEXT);"),
            sql_chunk("c", "CREATE TABLE IF NOT EXISTS broken_c (id INTEGER PRIMARY KEY);"),
        ],
        rollback_sql: Some("DROP TABLE IF EXISTS broken_a; DROP TABLE IF EXISTS broken_c;".into()),
        rollback_file: None,
        expected_tables: vec!["broken_a".into(), "broken_c".into()],
    });
    config
}

/// Start the gateway in the background and return its base URL.
async fn start_test_gateway(config: AppConfig) -> String {
    let port = config.gateway.port;
    tokio::spawn(async move {
        let server = GatewayServer::new(config);
        let _ = server.run().await;
    });

    // Wait for the server to be ready
    for _ in 0..50 {
        if TcpListener::bind(format!("127.0.0.1:{port}")).is_err() {
            break; // port is in use = server is up
        }
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    }

    format!("http://127.0.0.1:{port}")
}

async fn post(base: &str, key: &str, body: Value) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .post(format!("{base}/api/migrations"))
        .bearer_auth(key)
        .json(&body)
        .send()
        .await
        .expect("post failed");
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

async fn get(base: &str, key: &str, query: &str) -> (u16, Value) {
    let resp = reqwest::Client::new()
        .get(format!("{base}/api/migrations?{query}"))
        .header("x-api-key", key)
        .send()
        .await
        .expect("get failed");
    let status = resp.status().as_u16();
    (status, resp.json().await.unwrap())
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_gateway(test_config(random_port(), dir.path())).await;

    let resp = reqwest::get(format!("{base}/health"))
        .await
        .expect("health request failed");
    assert_eq!(resp.text().await.unwrap(), "ok");
}

#[tokio::test]
async fn status_endpoint_lists_migrations() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_gateway(test_config(random_port(), dir.path())).await;

    let body: Value = reqwest::get(format!("{base}/api/status"))
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(body["status"], "running");
    assert_eq!(body["default_migration"], "instagram_scraper_schema");
    assert_eq!(body["migrations"], json!(["instagram_scraper_schema", "broken"]));
    assert_eq!(body["history_initialized"], true);
}

#[tokio::test]
async fn requests_without_valid_key_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_gateway(test_config(random_port(), dir.path())).await;

    let resp = reqwest::get(format!("{base}/api/migrations?action=list"))
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 401);

    let (status, _) = get(&base, "wrong", "action=list").await;
    assert_eq!(status, 401);
}

#[tokio::test]
async fn viewer_can_read_but_not_run() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_gateway(test_config(random_port(), dir.path())).await;

    let (status, body) = get(&base, VIEWER_KEY, "action=list").await;
    assert_eq!(status, 200);
    assert_eq!(body["success"], true);
    assert_eq!(
        body["available_migrations"],
        json!(["instagram_scraper_schema", "broken"])
    );
    assert_eq!(body["chunks"][0]["id"], "hashtags");

    let (status, body) = post(&base, VIEWER_KEY, json!({"action": "run"})).await;
    assert_eq!(status, 403);
    assert!(body["error"].as_str().unwrap().contains("dashboard@example.com"));
}

#[tokio::test]
async fn full_run_of_builtin_migration_succeeds() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_gateway(test_config(random_port(), dir.path())).await;

    let (status, body) = post(&base, ADMIN_KEY, json!({"action": "init"})).await;
    assert_eq!(status, 200, "{body}");

    let (status, body) = post(&base, ADMIN_KEY, json!({"action": "run_full_migration"})).await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["success"], true);
    assert_eq!(body["chunks_executed"], 6);
    assert_eq!(body["results"][0]["chunk"], "hashtags");
    assert!(body["total_execution_time_ms"].is_number());

    let (_, tables) = get(&base, ADMIN_KEY, "action=tables").await;
    assert_eq!(tables["instagram_tables"].as_array().unwrap().len(), 4);

    let (_, history) = get(&base, ADMIN_KEY, "action=history").await;
    let history = history["history"].as_array().unwrap();
    assert_eq!(history.len(), 6);
    // newest first
    assert_eq!(history[0]["chunk_id"], "triggers");
    assert_eq!(history[0]["executed_by"], "ops@example.com");
}

#[tokio::test]
async fn failing_chunk_stops_run_and_can_be_inspected() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_gateway(test_config(random_port(), dir.path())).await;

    let (status, body) = post(
        &base,
        ADMIN_KEY,
        json!({"action": "run", "migration_name": "broken"}),
    )
    .await;
    assert_eq!(status, 500);
    assert_eq!(body["chunk"], "b");
    assert_eq!(body["chunk_name"], "Chunk b");
    assert!(body["details"].as_str().unwrap().contains("syntax error"));
    assert_eq!(body["chunks_executed"], 2);

    let (_, history) = get(&base, ADMIN_KEY, "action=execute-status&migration_name=broken").await;
    let records = history["history"].as_array().unwrap();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0]["chunk_id"], "b");
    assert_eq!(records[0]["success"], false);
    assert_eq!(records[1]["chunk_id"], "a");
    assert_eq!(history["available_chunks"].as_array().unwrap().len(), 3);

    let (status, check) = post(
        &base,
        ADMIN_KEY,
        json!({"action": "check-status", "migration_name": "broken"}),
    )
    .await;
    assert_eq!(status, 200);
    assert_eq!(check["state"]["state"], "failed");
    assert_eq!(check["state"]["chunk_id"], "b");
    assert_eq!(check["tables"][0]["exists"], true);
    assert_eq!(check["tables"][1]["exists"], false);

    // the failing chunk is still broken when re-run on its own
    let (status, body) = post(
        &base,
        ADMIN_KEY,
        json!({"action": "run_single_chunk", "migration_name": "broken", "chunk_id": "b"}),
    )
    .await;
    assert_eq!(status, 500);
    assert_eq!(body["error"], "chunk b failed");

    // later chunks can be applied individually
    let (status, body) = post(
        &base,
        ADMIN_KEY,
        json!({"action": "run_single_chunk", "migration_name": "broken", "chunk_id": "c"}),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["success"], true);
}

#[tokio::test]
async fn single_chunk_request_validation() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_gateway(test_config(random_port(), dir.path())).await;

    let (status, _) = post(&base, ADMIN_KEY, json!({"action": "run_single_chunk"})).await;
    assert_eq!(status, 400);

    let (status, _) = post(
        &base,
        ADMIN_KEY,
        json!({"action": "run_single_chunk", "chunk_id": "nope"}),
    )
    .await;
    assert_eq!(status, 404);

    let (status, _) = post(
        &base,
        ADMIN_KEY,
        json!({"action": "run", "migration_name": "unregistered"}),
    )
    .await;
    assert_eq!(status, 404);

    let (status, _) = post(&base, ADMIN_KEY, json!({"action": "explode"})).await;
    assert_eq!(status, 400);
}

#[tokio::test]
async fn malformed_commands_get_json_errors_after_auth() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_gateway(test_config(random_port(), dir.path())).await;

    let (status, body) = post(&base, ADMIN_KEY, json!({"migration_name": "broken"})).await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "validation error: action is required");

    let send_raw = |key: Option<&'static str>| {
        let mut req = reqwest::Client::new()
            .post(format!("{base}/api/migrations"))
            .header("content-type", "application/json")
            .body("{not json");
        if let Some(key) = key {
            req = req.bearer_auth(key);
        }
        req.send()
    };

    let resp = send_raw(Some(ADMIN_KEY)).await.unwrap();
    assert_eq!(resp.status().as_u16(), 400);
    let body: Value = resp.json().await.unwrap();
    assert!(body["error"].as_str().unwrap().contains("invalid request body"));

    let resp = send_raw(None).await.unwrap();
    assert_eq!(resp.status().as_u16(), 401);
}

#[tokio::test]
async fn execute_chunk_runs_adhoc_sql_with_tracking() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_gateway(test_config(random_port(), dir.path())).await;

    let (status, _) = post(
        &base,
        ADMIN_KEY,
        json!({"action": "execute-chunk", "chunk_id": "fix-1", "migration_name": "hotfix"}),
    )
    .await;
    assert_eq!(status, 400);

    let (status, body) = post(
        &base,
        ADMIN_KEY,
        json!({
            "action": "execute-chunk",
            "chunk_id": "fix-1",
            "migration_name": "hotfix",
            "sql": "CREATE TABLE IF NOT EXISTS hotfix_notes (id INTEGER PRIMARY KEY);",
        }),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["message"], "chunk fix-1 executed successfully");

    let (_, history) = get(&base, ADMIN_KEY, "action=history&migration_name=hotfix").await;
    assert_eq!(history["history"][0]["chunk_id"], "fix-1");
    assert_eq!(history["history"][0]["chunk_name"], "fix-1");
}

#[tokio::test]
async fn rollback_is_logged_separately() {
    let dir = tempfile::tempdir().unwrap();
    let base = start_test_gateway(test_config(random_port(), dir.path())).await;

    let (status, _) = post(&base, ADMIN_KEY, json!({"action": "run"})).await;
    assert_eq!(status, 200);

    let (status, _) = post(&base, ADMIN_KEY, json!({"action": "rollback"})).await;
    assert_eq!(status, 400);

    let (status, body) = post(
        &base,
        ADMIN_KEY,
        json!({"action": "rollback", "migration_name": "instagram_scraper_schema"}),
    )
    .await;
    assert_eq!(status, 200, "{body}");
    assert_eq!(body["success"], true);

    let (_, forward) = get(&base, ADMIN_KEY, "action=history&limit=100").await;
    assert_eq!(forward["history"].as_array().unwrap().len(), 6);

    let (_, rollback) = get(
        &base,
        ADMIN_KEY,
        "action=history&migration_name=instagram_scraper_schema_rollback",
    )
    .await;
    let records = rollback["history"].as_array().unwrap();
    assert_eq!(records.len(), 1);

    let (_, everything) = get(&base, VIEWER_KEY, "action=history&all=true&limit=100").await;
    let everything = everything["history"].as_array().unwrap();
    assert_eq!(everything.len(), 7);
    assert_eq!(
        everything[0]["migration_name"],
        "instagram_scraper_schema_rollback"
    );
    assert_eq!(records[0]["chunk_id"], "rollback");
    assert_eq!(records[0]["chunk_name"], "Full Rollback");

    let (_, check) = post(&base, ADMIN_KEY, json!({"action": "check-status"})).await;
    assert_eq!(check["state"]["state"], "rolled_back");
    assert_eq!(check["migration_name"], "instagram_scraper_schema");
    assert!(
        check["tables"]
            .as_array()
            .unwrap()
            .iter()
            .all(|t| t["exists"] == false)
    );
}
