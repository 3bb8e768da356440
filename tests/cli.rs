use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tempfile::TempDir;

fn scout_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_scout"))
}

fn write_config(tmp: &TempDir, myanimelist_base: &str) -> PathBuf {
    let config_content = format!(
        r#"[http]
user_agent = "scout-tests/1.0"

[myanimelist]
base_url = "{}"

[unionfansub]
username_env = "SCOUT_CLI_TEST_USERNAME"
password_env = "SCOUT_CLI_TEST_PASSWORD"
"#,
        myanimelist_base
    );
    let config_path = tmp.path().join("scout.toml");
    fs::write(&config_path, config_content).unwrap();
    config_path
}

fn run_scout(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = scout_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .env_remove("SCOUT_CLI_TEST_USERNAME")
        .env_remove("SCOUT_CLI_TEST_PASSWORD")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run scout binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

async fn fake_encyclopedia() -> String {
    let app = Router::new()
        .route(
            "/search/prefix.json",
            get(|| async {
                Json(json!({
                    "categories": [ { "type": "anime", "items": [
                        { "id": 52991, "name": "Sousou no Frieren",
                          "url": "https://myanimelist.net/anime/52991/Sousou_no_Frieren",
                          "payload": { "media_type": "TV", "start_year": 2023 } }
                    ] } ]
                }))
            }),
        )
        .route(
            "/anime/52991/Sousou_no_Frieren",
            get(|| async {
                axum::response::Html(
                    r#"<div class="leftside">
                         <div><span class="dark_text">Episodes:</span> 28</div>
                         <div><span class="dark_text">Demographic:</span> <a href="/g/27">Shounen</a></div>
                       </div>"#,
                )
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

#[test]
fn test_sources_lists_every_source() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(&tmp, "https://myanimelist.net");

    let (stdout, stderr, success) = run_scout(&config_path, &["sources"]);
    assert!(success, "sources failed: {}", stderr);
    assert!(stdout.contains("SOURCE"));
    assert!(stdout.contains("crunchyroll"));
    assert!(stdout.contains("myanimelist"));
    let forum_line = stdout
        .lines()
        .find(|l| l.starts_with("unionfansub"))
        .expect("forum row");
    assert!(forum_line.contains("false"));
}

#[test]
fn test_missing_config_file_uses_defaults() {
    let tmp = TempDir::new().unwrap();
    let (stdout, _, success) = run_scout(&tmp.path().join("absent.toml"), &["sources"]);
    assert!(success);
    assert!(stdout.contains("https://www.crunchyroll.com"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("scout.toml");
    fs::write(&config_path, "[myanimelist]\nbase_url = \"ftp://example.org\"\n").unwrap();

    let (_, stderr, success) = run_scout(&config_path, &["sources"]);
    assert!(!success);
    assert!(!stderr.is_empty());
}

#[test]
fn test_resolve_reports_forum_configuration_failure() {
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(&tmp, "https://myanimelist.net");

    let (stdout, stderr, success) =
        run_scout(&config_path, &["resolve", "Frieren", "--source", "unionfansub"]);
    assert!(!success, "every source failed, exit must be non-zero");
    assert!(stdout.contains("failed (configuration)"), "stdout: {}", stdout);
    assert!(stdout.contains("SCOUT_CLI_TEST_USERNAME"));
    assert!(stderr.contains("every source failed"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_search_myanimelist_prints_match_json() {
    let base = fake_encyclopedia().await;
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(&tmp, &base);

    let (stdout, stderr, success) = tokio::task::spawn_blocking(move || {
        run_scout(&config_path, &["search", "myanimelist", "Frieren"])
    })
    .await
    .unwrap();
    assert!(success, "search failed: {}", stderr);

    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["outcome"], "match");
    assert_eq!(value["result"]["record"]["title"], "Sousou no Frieren");
    assert_eq!(value["result"]["record"]["episodes"], 28);
    assert_eq!(value["result"]["record"]["demographic"], "Shonen");
    assert_eq!(value["result"]["record"]["source"], "myanimelist");
    drop(tmp);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_resolve_json_mixes_found_and_failed() {
    let base = fake_encyclopedia().await;
    let tmp = TempDir::new().unwrap();
    let config_path = write_config(&tmp, &base);

    let (stdout, stderr, success) = tokio::task::spawn_blocking(move || {
        run_scout(
            &config_path,
            &[
                "resolve",
                "Frieren",
                "--source",
                "myanimelist",
                "--source",
                "unionfansub",
                "--json",
            ],
        )
    })
    .await
    .unwrap();
    assert!(success, "resolve failed: {}", stderr);

    let reports: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    let reports = reports.as_array().unwrap();
    assert_eq!(reports.len(), 2);
    assert_eq!(reports[0]["source"], "myanimelist");
    assert_eq!(reports[0]["status"], "found");
    assert_eq!(reports[0]["record"]["title"], "Sousou no Frieren");
    assert_eq!(reports[1]["source"], "unionfansub");
    assert_eq!(reports[1]["status"], "failed");
    assert_eq!(reports[1]["kind"], "configuration");
    drop(tmp);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_search_failure_reports_error_kind() {
    let app = Router::new().route(
        "/search/prefix.json",
        get(|| async { axum::http::StatusCode::SERVICE_UNAVAILABLE }),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    let tmp = TempDir::new().unwrap();
    let config_path = write_config(&tmp, &format!("http://{}", addr));

    let (_, stderr, success) = tokio::task::spawn_blocking(move || {
        run_scout(&config_path, &["search", "myanimelist", "Frieren"])
    })
    .await
    .unwrap();
    assert!(!success);
    assert!(stderr.contains("myanimelist failed (transport)"), "stderr: {}", stderr);
    drop(tmp);
}
