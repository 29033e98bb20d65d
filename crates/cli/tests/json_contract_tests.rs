// Integration tests enforcing the stdout contract of the `tabsight` binary.
//
// stdout is always exactly one JSON document (or nothing, when the input
// could not be read); logs and error lines go to stderr.
//
// Run with: cargo test -p tabsight-cli --test json_contract_tests -- --nocapture

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tempfile::TempDir;

const KEY_VARS: [&str; 6] = [
    "OPENAI_API_KEY",
    "GROQ_API_KEY",
    "GEMINI_API_KEY",
    "TABSIGHT_OPENAI_KEY",
    "TABSIGHT_GROQ_KEY",
    "TABSIGHT_GEMINI_KEY",
];

/// Command with an isolated config dir and no API keys in the environment.
fn tabsight(home: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tabsight"));
    cmd.current_dir(env!("CARGO_MANIFEST_DIR"));
    cmd.env("XDG_CONFIG_HOME", home).env("HOME", home).env_remove("RUST_LOG");
    for var in KEY_VARS {
        cmd.env_remove(var);
    }
    cmd
}

fn request() -> serde_json::Value {
    serde_json::json!({
        "query": "show active users",
        "data": [
            {"name": "Ana", "score": 40, "active": true, "joined": "2024-01-05"},
            {"name": "Ben", "score": 90, "active": false, "joined": "2024-02-11"},
            {"name": "Cy", "score": 75, "active": true, "joined": "2024-03-20"}
        ],
        "columns": [
            {"key": "name", "label": "Name", "type": "string"},
            {"key": "score", "label": "Score", "type": "number"},
            {"key": "active", "label": "Active", "type": "boolean"},
            {"key": "joined", "label": "Joined", "type": "date"}
        ]
    })
}

fn write_request(dir: &TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("request.json");
    std::fs::write(&path, body).unwrap();
    path
}

/// Assert stdout is a single, parseable JSON value with no extra lines.
fn assert_single_json(output: &Output) -> serde_json::Value {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let trimmed = stdout.trim();
    assert!(
        !trimmed.is_empty(),
        "stdout should not be empty\nstderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_str(trimmed)
        .unwrap_or_else(|e| panic!("stdout must be one JSON value.\nParse error: {}\nstdout:\n{}", e, trimmed))
}

fn assert_exit(output: &Output, code: i32) {
    assert_eq!(
        output.status.code(),
        Some(code),
        "unexpected exit status\nstdout: {}\nstderr: {}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
}

// ===========================================================================
// tabsight query
// ===========================================================================

#[test]
fn query_offline_returns_result_envelope() {
    let home = TempDir::new().unwrap();
    let file = write_request(&home, &request().to_string());

    let output = tabsight(home.path())
        .args(["query", file.to_str().unwrap(), "--offline"])
        .output()
        .expect("tabsight query");

    assert_exit(&output, 0);
    let val = assert_single_json(&output);
    assert_eq!(val["success"], true);
    assert!(val["timestamp"].as_str().unwrap().ends_with('Z'));

    let result = &val["result"];
    assert_eq!(result["totalCount"], 2);
    assert_eq!(result["confidence"], 0.75);
    assert_eq!(result["query"], "show active users");
    let rows = result["rows"].as_array().unwrap();
    assert!(rows.iter().all(|r| r["active"] == true));
    let insights = result["insights"].as_array().unwrap();
    assert!(!insights.is_empty() && insights.len() <= 5);
    assert_eq!(insights[0]["type"], "summary");
}

#[test]
fn query_flag_replaces_request_query() {
    let home = TempDir::new().unwrap();
    let file = write_request(&home, &request().to_string());

    let output = tabsight(home.path())
        .args(["query", file.to_str().unwrap(), "--offline", "-q", "top performers"])
        .output()
        .expect("tabsight query -q");

    assert_exit(&output, 0);
    let val = assert_single_json(&output);
    let rows = val["result"]["rows"].as_array().unwrap();
    assert_eq!(val["result"]["query"], "top performers");
    assert_eq!(rows[0]["name"], "Ben");
    assert_eq!(rows[2]["name"], "Ana");
}

#[test]
fn query_reads_stdin() {
    let home = TempDir::new().unwrap();
    let mut child = tabsight(home.path())
        .args(["query", "-", "--offline", "--compact"])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("spawn tabsight");
    child
        .stdin
        .take()
        .unwrap()
        .write_all(request().to_string().as_bytes())
        .unwrap();
    let output = child.wait_with_output().unwrap();

    assert_exit(&output, 0);
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim().lines().count(), 1, "--compact prints one line");
    assert_eq!(assert_single_json(&output)["result"]["totalCount"], 2);
}

#[test]
fn query_limit_keeps_total_count() {
    let home = TempDir::new().unwrap();
    let mut body = request();
    body["query"] = serde_json::json!("");
    let file = write_request(&home, &body.to_string());

    let output = tabsight(home.path())
        .args(["query", file.to_str().unwrap(), "--offline", "--limit", "1"])
        .output()
        .expect("tabsight query --limit");

    assert_exit(&output, 0);
    let val = assert_single_json(&output);
    assert_eq!(val["result"]["rows"].as_array().unwrap().len(), 1);
    assert_eq!(val["result"]["totalCount"], 3);
}

#[test]
fn invalid_request_prints_rejection_and_exits_3() {
    let home = TempDir::new().unwrap();
    let file = write_request(&home, r#"{"query": "x", "columns": []}"#);

    let output = tabsight(home.path())
        .args(["query", file.to_str().unwrap(), "--offline"])
        .output()
        .expect("tabsight query (invalid)");

    assert_exit(&output, 3);
    let val = assert_single_json(&output);
    assert_eq!(val["success"], false);
    assert_eq!(val["error"], "Missing required field: data");
    assert!(val.get("result").is_none());

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error: Missing required field: data"), "stderr: {}", stderr);
    assert!(stderr.contains("hint:"), "stderr: {}", stderr);
}

#[test]
fn malformed_json_is_rejected() {
    let home = TempDir::new().unwrap();
    let file = write_request(&home, "{\"data\": [");

    let output = tabsight(home.path())
        .args(["query", file.to_str().unwrap(), "--offline"])
        .output()
        .expect("tabsight query (malformed)");

    assert_exit(&output, 3);
    let val = assert_single_json(&output);
    assert_eq!(val["error"], "Invalid request body");
    assert!(val["details"].is_string());
}

#[test]
fn unreadable_file_exits_4_with_empty_stdout() {
    let home = TempDir::new().unwrap();
    let missing = home.path().join("nope.json");

    let output = tabsight(home.path())
        .args(["query", missing.to_str().unwrap()])
        .output()
        .expect("tabsight query (missing file)");

    assert_exit(&output, 4);
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).starts_with("error: cannot read"));
}

// ===========================================================================
// tabsight insights / stats / health
// ===========================================================================

#[test]
fn insights_envelope_has_metadata() {
    let home = TempDir::new().unwrap();
    let file = write_request(&home, &request().to_string());

    let output = tabsight(home.path())
        .args(["insights", file.to_str().unwrap(), "--offline"])
        .output()
        .expect("tabsight insights");

    assert_exit(&output, 0);
    let val = assert_single_json(&output);
    let insights = val["insights"].as_array().unwrap();
    assert_eq!(val["metadata"]["totalRecords"], 3);
    assert_eq!(val["metadata"]["totalColumns"], 4);
    assert_eq!(val["metadata"]["insightCount"], insights.len());
    for insight in insights {
        let id = insight["id"].as_str().unwrap();
        assert!(id.starts_with("insight-"), "id: {}", id);
        let confidence = insight["confidence"].as_f64().unwrap();
        assert!((0.0..=1.0).contains(&confidence));
    }
}

#[test]
fn stats_prints_map_keyed_by_column() {
    let home = TempDir::new().unwrap();
    let file = write_request(&home, &request().to_string());

    let output = tabsight(home.path())
        .args(["stats", file.to_str().unwrap()])
        .output()
        .expect("tabsight stats");

    assert_exit(&output, 0);
    let val = assert_single_json(&output);
    assert_eq!(val["score"]["min"], 40.0);
    assert_eq!(val["score"]["max"], 90.0);
    assert_eq!(val["score"]["median"], 75.0);
    assert_eq!(val["active"]["trueCount"], 2);
    assert_eq!(val["name"]["uniqueCount"], 3);
}

#[test]
fn health_is_healthy_without_keys() {
    let home = TempDir::new().unwrap();

    let output = tabsight(home.path()).args(["health"]).output().expect("tabsight health");

    assert_exit(&output, 0);
    let val = assert_single_json(&output);
    assert_eq!(val["status"], "healthy");
    assert_eq!(val["service"], "Tabsight");
    assert_eq!(val["version"], "0.1.0");
    assert_eq!(val["aiProvider"], "none");
    assert_eq!(val["aiKeyPresent"], false);
    assert!(val["supportedDataTypes"].as_array().unwrap().contains(&serde_json::json!("currency")));
}

// ===========================================================================
// tabsight ai doctor
// ===========================================================================

#[test]
fn ai_doctor_disabled_exits_10() {
    let home = TempDir::new().unwrap();

    let output = tabsight(home.path())
        .args(["ai", "doctor", "--json"])
        .output()
        .expect("tabsight ai doctor");

    assert_exit(&output, 10);
    let val = assert_single_json(&output);
    assert_eq!(val["schema_version"], 1);
    assert_eq!(val["status"], "disabled");
    assert_eq!(val["blocking_reason"], "provider=none");
    assert_eq!(val["key"], "missing");
}

#[test]
fn ai_doctor_openai_key_auto_selects() {
    let home = TempDir::new().unwrap();

    let output = tabsight(home.path())
        .args(["ai", "doctor", "--json"])
        .env("OPENAI_API_KEY", "sk-test-not-real")
        .output()
        .expect("tabsight ai doctor");

    assert_exit(&output, 0);
    let val = assert_single_json(&output);
    assert_eq!(val["status"], "ready");
    assert_eq!(val["provider"], "openai");
    assert_eq!(val["auto_selected"], true);
    assert_eq!(val["model"], "gpt-4");
    assert_eq!(val["key"], "present");

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("sk-test-not-real"), "key must never be printed");
}

#[cfg(target_os = "linux")]
#[test]
fn ai_doctor_missing_key_exits_11() {
    let home = TempDir::new().unwrap();
    let config_dir = home.path().join("tabsight");
    std::fs::create_dir_all(&config_dir).unwrap();
    std::fs::write(config_dir.join("settings.json"), r#"{"ai": {"provider": "groq"}}"#).unwrap();

    let output = tabsight(home.path())
        .args(["ai", "doctor", "--json"])
        .output()
        .expect("tabsight ai doctor");

    assert_exit(&output, 11);
    let val = assert_single_json(&output);
    assert_eq!(val["status"], "missing_key");
    assert_eq!(val["provider"], "groq");
    assert!(val["blocking_reason"].as_str().unwrap().contains("TABSIGHT_GROQ_KEY"));
}
