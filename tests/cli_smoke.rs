/// CLI smoke tests: invoke the compiled binary, no network required.
/// Every test points HOME and RAGCHAT_DATA_DIR at a temp dir.
use assert_cmd::Command;
use tempfile::TempDir;

#[allow(deprecated)]
fn ragchat(home: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("ragchat").unwrap();
    cmd.env("HOME", home.path())
        .env("RAGCHAT_DATA_DIR", home.path().join("data"))
        .env("NO_COLOR", "1")
        .env_remove("XDG_CONFIG_HOME")
        .env_remove("XDG_DATA_HOME")
        .env_remove("GEMINI_API_KEY")
        .env_remove("RAGCHAT_EMBED_URL");
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let output = cmd.assert().success().get_output().stdout.clone();
    String::from_utf8_lossy(&output).to_string()
}

// ── Binary runs ──────────────────────────────────────────────────────────

#[test]
fn help_flag_exits_zero() {
    let tmp = TempDir::new().unwrap();
    ragchat(&tmp).arg("--help").assert().success();
}

#[test]
fn version_flag_exits_zero() {
    let tmp = TempDir::new().unwrap();
    ragchat(&tmp).arg("--version").assert().success();
}

// ── Auth ─────────────────────────────────────────────────────────────────

#[test]
fn auth_status_without_key_exits_zero() {
    let tmp = TempDir::new().unwrap();
    let out = stdout_of(ragchat(&tmp).args(["auth", "status"]));
    assert!(out.contains("No API key configured"), "got: {}", out);
}

#[test]
fn auth_set_key_then_status_shows_masked_key() {
    let tmp = TempDir::new().unwrap();
    ragchat(&tmp)
        .args(["auth", "set-key", "AIzaSyExampleKey1234"])
        .assert()
        .success();

    let out = stdout_of(ragchat(&tmp).args(["auth", "status"]));
    assert!(out.contains("1234"), "got: {}", out);
    assert!(!out.contains("AIzaSyExampleKey1234"), "key leaked: {}", out);

    ragchat(&tmp).args(["auth", "logout"]).assert().success();
    let out = stdout_of(ragchat(&tmp).args(["auth", "status"]));
    assert!(out.contains("No API key configured"), "got: {}", out);
}

#[test]
fn env_key_takes_effect() {
    let tmp = TempDir::new().unwrap();
    let out = stdout_of(
        ragchat(&tmp)
            .env("GEMINI_API_KEY", "env-key-abcd")
            .args(["auth", "status"]),
    );
    assert!(out.contains("environment variable"), "got: {}", out);
}

// ── RAG settings ─────────────────────────────────────────────────────────

#[test]
fn rag_defaults_to_enabled_server_mode() {
    let tmp = TempDir::new().unwrap();
    let out = stdout_of(ragchat(&tmp).args(["rag", "status"]));
    assert!(out.contains("enabled"), "got: {}", out);
    assert!(out.contains("server"), "got: {}", out);
}

#[test]
fn rag_mode_and_toggle_persist() {
    let tmp = TempDir::new().unwrap();
    ragchat(&tmp).args(["rag", "mode", "client"]).assert().success();
    ragchat(&tmp).args(["rag", "disable"]).assert().success();

    let out = stdout_of(ragchat(&tmp).args(["rag", "status"]));
    assert!(out.contains("disabled"), "got: {}", out);
    assert!(out.contains("client"), "got: {}", out);
    assert!(tmp.path().join("data").join("settings.json").exists());
}

#[test]
fn unknown_rag_mode_errors() {
    let tmp = TempDir::new().unwrap();
    ragchat(&tmp)
        .args(["rag", "mode", "hybrid"])
        .assert()
        .failure();
}

// ── Knowledge ────────────────────────────────────────────────────────────

#[test]
fn knowledge_status_on_fresh_dir_reports_empty_stores() {
    let tmp = TempDir::new().unwrap();
    let out = stdout_of(ragchat(&tmp).args(["knowledge", "status"]));
    assert!(out.contains("server"), "got: {}", out);
    assert!(out.contains("client"), "got: {}", out);
    assert!(out.contains("0 chunks"), "got: {}", out);
}

#[test]
fn knowledge_search_on_empty_store_exits_zero() {
    let tmp = TempDir::new().unwrap();
    let out = stdout_of(ragchat(&tmp).args(["knowledge", "search", "anything"]));
    assert!(out.contains("Knowledge base is empty"), "got: {}", out);
}

#[test]
fn knowledge_clear_writes_empty_store() {
    let tmp = TempDir::new().unwrap();
    ragchat(&tmp)
        .args(["knowledge", "clear", "--mode", "client"])
        .assert()
        .success();
    let path = tmp.path().join("data").join("local_vectors.json");
    assert_eq!(std::fs::read_to_string(path).unwrap().trim(), "[]");
}

#[test]
fn unreadable_store_can_still_be_inspected_and_cleared() {
    let tmp = TempDir::new().unwrap();
    let data = tmp.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    let store = data.join("vector_store.json");
    std::fs::write(
        &store,
        r#"[{"text":"two dims here","embedding":[1.0,0.0]},
            {"text":"three dims here","embedding":[1.0,0.0,0.0]}]"#,
    )
    .unwrap();

    let out = stdout_of(ragchat(&tmp).args(["knowledge", "status"]));
    assert!(out.contains("unreadable"), "got: {}", out);
    assert!(out.contains("0 chunks"), "client row should still report: {}", out);

    ragchat(&tmp)
        .args(["knowledge", "clear", "--mode", "client"])
        .assert()
        .success();
    ragchat(&tmp)
        .args(["knowledge", "clear", "--mode", "server"])
        .assert()
        .success();

    assert_eq!(std::fs::read_to_string(&store).unwrap().trim(), "[]");
    let out = stdout_of(ragchat(&tmp).args(["knowledge", "status"]));
    assert!(!out.contains("unreadable"), "got: {}", out);
}

// ── Graceful errors ──────────────────────────────────────────────────────

#[test]
fn ingest_missing_file_errors_not_panics() {
    let tmp = TempDir::new().unwrap();
    ragchat(&tmp)
        .args(["ingest", "does-not-exist.txt"])
        .assert()
        .failure();
}

#[test]
fn ingest_without_key_fails_and_writes_nothing() {
    let tmp = TempDir::new().unwrap();
    let doc = tmp.path().join("notes.txt");
    std::fs::write(&doc, "A paragraph long enough to be indexed.").unwrap();

    ragchat(&tmp)
        .arg("ingest")
        .arg(&doc)
        .assert()
        .failure();
    assert!(!tmp.path().join("data").join("vector_store.json").exists());
}

#[test]
fn chat_with_blank_message_errors() {
    let tmp = TempDir::new().unwrap();
    ragchat(&tmp)
        .args(["chat", "--message", "   "])
        .assert()
        .failure();
}

#[test]
fn quiet_and_verbose_flags_accepted() {
    let tmp = TempDir::new().unwrap();
    ragchat(&tmp)
        .args(["--quiet", "rag", "status"])
        .assert()
        .success();
    ragchat(&tmp)
        .args(["--verbose", "rag", "status"])
        .assert()
        .success();
}
