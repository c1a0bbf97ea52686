use std::path::Path;
use std::process::{Command, Output};

/// Run the binary against an isolated settings file.
fn run(settings: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_tribunal-assist"))
        .args(args)
        .env("TRIBUNAL_SETTINGS_PATH", settings)
        .env("TRIBUNAL_LOG_LEVEL", "error")
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to spawn tribunal-assist binary")
}

fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

#[test]
fn test_provider_defaults_and_persists() {
    let dir = tempfile::tempdir().unwrap();
    let settings = dir.path().join("settings.json");

    let output = run(&settings, &["provider", "show"]);
    assert!(output.status.success());
    assert_eq!(stdout(&output), "gemini");

    let output = run(&settings, &["provider", "set", "webllm"]);
    assert!(output.status.success());

    let output = run(&settings, &["provider", "show"]);
    assert_eq!(stdout(&output), "webllm");

    let saved = std::fs::read_to_string(&settings).unwrap();
    assert!(saved.contains("\"ai_provider\": \"webllm\""));
}

#[test]
fn test_unknown_provider_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&dir.path().join("settings.json"), &["provider", "set", "openai"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown provider"));
}

#[test]
fn test_key_is_stored_not_printed() {
    let dir = tempfile::tempdir().unwrap();
    let settings = dir.path().join("settings.json");

    let output = run(&settings, &["key", "set", "groq", "gsk_secret"]);
    assert!(output.status.success());
    assert!(!stdout(&output).contains("gsk_secret"));

    let saved = std::fs::read_to_string(&settings).unwrap();
    assert!(saved.contains("\"groq_api_key\": \"gsk_secret\""));
}

#[test]
fn test_cross_analysis_refused_on_local_provider() {
    let dir = tempfile::tempdir().unwrap();
    let settings = dir.path().join("settings.json");
    let analysis = dir.path().join("a.json");
    std::fs::write(&analysis, r#"{"summary": ["Warning letter"]}"#).unwrap();

    run(&settings, &["provider", "set", "webllm"]);
    let output = run(&settings, &["cross-analyze", analysis.to_str().unwrap()]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("not available with the webllm provider"), "stderr: {}", stderr);
}

#[test]
fn test_unknown_case_operation_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let output = run(&dir.path().join("settings.json"), &["case-op", "draft-et2-claim"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Unknown case operation"));
}
