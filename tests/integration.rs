use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn docqa_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("docqa");
    path
}

const PASSAGES: &str = r#"[
  {
    "source_file": "iso_13849.pdf",
    "title": "ISO 13849-1:2015 - Safety of machinery",
    "url": "https://www.iso.org/standard/69883.html",
    "text": "ISO 13849-1 is an international standard that specifies safety requirements for safety-related parts of control systems.",
    "chunk_index": 0
  },
  {
    "source_file": "estop.pdf",
    "title": "Emergency Stop Design",
    "text": "Emergency stop devices must halt hazardous motion quickly. Operators reach the red button from each workstation.",
    "chunk_index": 0
  },
  {
    "source_file": "curtains.pdf",
    "title": "Light Curtain Guide",
    "text": "Light curtains detect intrusion into guarded zones and signal the controller to stop the machine.",
    "chunk_index": 0
  },
  {
    "source_file": "risk.pdf",
    "title": "Risk Assessment Basics",
    "text": "Risk assessment identifies hazards, estimates severity, and selects protective measures for each machine.",
    "chunk_index": 0
  },
  {
    "source_file": "risk.pdf",
    "title": "Risk Assessment Basics",
    "text": "   ",
    "chunk_index": 1
  }
]"#;

fn setup_test_env() -> (TempDir, PathBuf, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[db]
path = "{}/data/docqa.sqlite"

[retrieval]
similarity_threshold = 0.9

[embedding]
provider = "hash"
dims = 1024

[server]
bind = "127.0.0.1:0"
"#,
        root.display()
    );
    let config_path = config_dir.join("docqa.toml");
    fs::write(&config_path, config_content).unwrap();

    let passages_path = root.join("passages.json");
    fs::write(&passages_path, PASSAGES).unwrap();

    (tmp, config_path, passages_path)
}

fn run_docqa(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = docqa_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run docqa binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

/// init + import + embed pending.
fn setup_loaded() -> (TempDir, PathBuf) {
    let (tmp, config_path, passages_path) = setup_test_env();
    let (_, stderr, ok) = run_docqa(&config_path, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    let (_, stderr, ok) = run_docqa(&config_path, &["import", passages_path.to_str().unwrap()]);
    assert!(ok, "import failed: {}", stderr);
    let (_, stderr, ok) = run_docqa(&config_path, &["embed", "pending"]);
    assert!(ok, "embed failed: {}", stderr);
    (tmp, config_path)
}

#[test]
fn test_init_creates_database() {
    let (_tmp, config_path, _) = setup_test_env();

    let (stdout, stderr, success) = run_docqa(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path, _) = setup_test_env();

    let (_, _, success1) = run_docqa(&config_path, &["init"]);
    assert!(success1, "First init failed");
    let (_, _, success2) = run_docqa(&config_path, &["init"]);
    assert!(success2, "Second init failed (not idempotent)");
}

#[test]
fn test_import_skips_blank_passages() {
    let (_tmp, config_path, passages_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);

    let (stdout, stderr, success) =
        run_docqa(&config_path, &["import", passages_path.to_str().unwrap()]);
    assert!(success, "import failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("records: 5"));
    assert!(stdout.contains("upserted passages: 4"));
    assert!(stdout.contains("skipped: 1"));
    assert!(stdout.contains("ok"));
}

#[test]
fn test_import_twice_no_duplicates() {
    let (_tmp, config_path, passages_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);
    run_docqa(&config_path, &["import", passages_path.to_str().unwrap()]);
    run_docqa(&config_path, &["import", passages_path.to_str().unwrap()]);

    let (stdout, _, success) = run_docqa(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("Passages:    4"), "stats: {}", stdout);
}

#[test]
fn test_import_rejects_non_array() {
    let (tmp, config_path, _) = setup_test_env();
    run_docqa(&config_path, &["init"]);
    let bad = tmp.path().join("bad.json");
    fs::write(&bad, r#"{"source_file": "x.pdf"}"#).unwrap();

    let (_, stderr, success) = run_docqa(&config_path, &["import", bad.to_str().unwrap()]);
    assert!(!success);
    assert!(stderr.contains("JSON array"), "stderr: {}", stderr);
}

#[test]
fn test_embed_pending_then_up_to_date() {
    let (_tmp, config_path, passages_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);
    run_docqa(&config_path, &["import", passages_path.to_str().unwrap()]);

    let (stdout, _, _) = run_docqa(&config_path, &["embed", "pending", "--dry-run"]);
    assert!(stdout.contains("passages needing embeddings: 4"));

    let (stdout, stderr, success) = run_docqa(&config_path, &["embed", "pending"]);
    assert!(success, "embed failed: {}", stderr);
    assert!(stdout.contains("embedded: 4"));
    assert!(stdout.contains("failed: 0"));

    let (stdout, _, _) = run_docqa(&config_path, &["embed", "pending"]);
    assert!(stdout.contains("all passages up to date"));
}

#[test]
fn test_embed_rebuild_reembeds_everything() {
    let (_tmp, config_path) = setup_loaded();

    let (stdout, stderr, success) = run_docqa(&config_path, &["embed", "rebuild"]);
    assert!(success, "rebuild failed: {}", stderr);
    assert!(stdout.contains("cleared 4 existing embeddings"));
    assert!(stdout.contains("embedded: 4"));
}

#[test]
fn test_stats_reports_coverage() {
    let (_tmp, config_path) = setup_loaded();

    let (stdout, stderr, success) = run_docqa(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Sources:     4"));
    assert!(stdout.contains("Embedded:    4 / 4 (100%)"));
    assert!(stdout.contains("feature-hash-1024"));
}

#[test]
fn test_ask_baseline_abstains_below_threshold() {
    let (_tmp, config_path) = setup_loaded();

    let (stdout, stderr, success) = run_docqa(
        &config_path,
        &["ask", "What is ISO 13849-1?", "--json"],
    );
    assert!(success, "ask failed: {}", stderr);
    let response: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert!(response["answer"].is_null());
    assert_eq!(response["reranker_used"], false);
    let reason = response["reason"].as_str().unwrap();
    assert!(
        reason.contains("below confidence threshold (0.9)"),
        "reason: {}",
        reason
    );
    assert_eq!(
        response["contexts"][0]["source"],
        "ISO 13849-1:2015 - Safety of machinery"
    );
}

#[test]
fn test_ask_hybrid_answers_with_citation() {
    let (_tmp, config_path) = setup_loaded();

    let (stdout, stderr, success) = run_docqa(
        &config_path,
        &["ask", "What is ISO 13849-1?", "--mode", "hybrid", "--json"],
    );
    assert!(success, "ask failed: {}", stderr);
    let response: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["reranker_used"], true);
    let answer = response["answer"].as_str().unwrap();
    assert!(answer.contains("ISO 13849-1 is an international standard"));
    assert!(answer.contains("Sources: [1] ISO 13849-1:2015 - Safety of machinery"));
    assert!(response["reason"]
        .as_str()
        .unwrap()
        .starts_with("Answer generated from 1 sources"));
    assert!((response["contexts"][0]["score"].as_f64().unwrap() - 1.0).abs() < 1e-9);
}

#[test]
fn test_ask_k_limits_contexts() {
    let (_tmp, config_path) = setup_loaded();

    let (stdout, _, success) = run_docqa(
        &config_path,
        &["ask", "machine safety", "--mode", "hybrid", "--k", "2", "--json"],
    );
    assert!(success);
    let response: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["contexts"].as_array().unwrap().len(), 2);

    // k = 0 clamps up to one context.
    let (stdout, _, success) = run_docqa(
        &config_path,
        &["ask", "machine safety", "--k", "0", "--json"],
    );
    assert!(success);
    let response: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["contexts"].as_array().unwrap().len(), 1);
}

#[test]
fn test_ask_text_output() {
    let (_tmp, config_path) = setup_loaded();

    let (stdout, _, success) = run_docqa(
        &config_path,
        &["ask", "What is ISO 13849-1?", "--mode", "reranked"],
    );
    assert!(success);
    assert!(stdout.contains("Query: What is ISO 13849-1?"));
    assert!(stdout.contains("Mode: hybrid"));
    assert!(stdout.contains("Contexts:"));
}

#[test]
fn test_ask_empty_query_fails() {
    let (_tmp, config_path) = setup_loaded();

    let (_, stderr, success) = run_docqa(&config_path, &["ask", "   "]);
    assert!(!success);
    assert!(stderr.contains("query cannot be empty"), "stderr: {}", stderr);
}

#[test]
fn test_ask_unknown_mode_fails() {
    let (_tmp, config_path) = setup_loaded();

    let (_, stderr, success) = run_docqa(&config_path, &["ask", "guards", "--mode", "semantic"]);
    assert!(!success);
    assert!(stderr.contains("unknown mode 'semantic'"), "stderr: {}", stderr);
}

#[test]
fn test_ask_before_embedding_abstains() {
    let (_tmp, config_path, passages_path) = setup_test_env();
    run_docqa(&config_path, &["init"]);
    run_docqa(&config_path, &["import", passages_path.to_str().unwrap()]);

    let (stdout, stderr, success) = run_docqa(
        &config_path,
        &["ask", "What is ISO 13849-1?", "--mode", "hybrid", "--json"],
    );
    assert!(success, "ask failed: {}", stderr);
    let response: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(response["reason"], "No relevant contexts found");
    assert!(response["contexts"].as_array().unwrap().is_empty());
}

#[test]
fn test_compare_reports_both_modes() {
    let (_tmp, config_path) = setup_loaded();

    let (stdout, stderr, success) = run_docqa(
        &config_path,
        &["compare", "What is ISO 13849-1?", "How do light curtains work?"],
    );
    assert!(success, "compare failed: {}", stderr);
    assert!(stdout.contains("BASELINE"));
    assert!(stdout.contains("HYBRID"));
    assert!(stdout.contains("only hybrid answered"));
    assert!(stdout.contains("questions: 2"));
    assert!(stdout.contains("baseline answers: 0/2"));
}

#[test]
fn test_invalid_config_rejected() {
    let (tmp, _, _) = setup_test_env();
    let config_path = tmp.path().join("bad.toml");
    fs::write(
        &config_path,
        "[db]\npath = \"x.sqlite\"\n\n[retrieval]\nhybrid_alpha = 1.5\n",
    )
    .unwrap();

    let (_, stderr, success) = run_docqa(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("hybrid_alpha"), "stderr: {}", stderr);
}
