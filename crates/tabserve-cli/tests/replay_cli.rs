//! Runs the tabserve-replay binary against event scripts

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

use serde_json::{json, Value as JsonValue};

fn demos() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../demos")
}

fn run(config: &PathBuf, script: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_tabserve-replay"))
        .arg("--config")
        .arg(config)
        .arg("--events")
        .arg("-")
        .env("RUST_LOG", "error")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .unwrap();

    child
        .stdin
        .take()
        .unwrap()
        .write_all(script.as_bytes())
        .unwrap();
    child.wait_with_output().unwrap()
}

fn results(output: &Output) -> Vec<JsonValue> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

#[test]
fn test_demo_session() {
    let output = Command::new(env!("CARGO_BIN_EXE_tabserve-replay"))
        .arg("--config")
        .arg(demos().join("server.toml"))
        .arg("--events")
        .arg(demos().join("session.jsonl"))
        .env("RUST_LOG", "error")
        .output()
        .unwrap();
    assert!(output.status.success());

    let results = results(&output);
    assert_eq!(results.len(), 4);

    assert_eq!(results[0]["type"], "schemaResult");

    assert_eq!(results[1]["id"], "all");
    assert_eq!(results[1]["countdown"], 0);
    assert_eq!(results[1]["data"].as_array().unwrap().len(), 3);
    assert_eq!(results[1]["data"][0]["latency"], json!(1.23));

    assert_eq!(results[2]["id"], "ticks");
    assert_eq!(
        results[2]["data"],
        json!([{"id": 2, "latency": 0.5}, {"id": 3, "latency": 0.75}])
    );

    assert_eq!(results[3]["id"], "ticks");
    assert_eq!(results[3]["data"], json!([{"id": 4, "latency": 2.0}]));
}

#[test]
fn test_invalid_transition_fails() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("server.toml");
    std::fs::write(
        &config,
        r#"schema = '{"values": [{"name": "id", "type": "integer"}]}'"#,
    )
    .unwrap();

    let output = run(&config, "{\"event\": \"endWindow\"}\n");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("line 1"));
}

#[test]
fn test_bad_schema_fails_setup() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("server.toml");
    std::fs::write(&config, r#"schema = '{"values": []}'"#).unwrap();

    let output = run(&config, "");
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("failed to set up server"));
}
