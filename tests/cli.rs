use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn ilabyaml_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_ilabyaml"))
}

fn write_config(root: &Path, completion: &str) -> PathBuf {
    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();
    let config_path = config_dir.join("ilabyaml.toml");
    fs::write(
        &config_path,
        format!(
            r#"[server]
bind = "127.0.0.1:0"

[completion]
{}
"#,
            completion
        ),
    )
    .unwrap();
    config_path
}

fn write_form(root: &Path, content: &str) -> PathBuf {
    let path = root.join("form.toml");
    fs::write(&path, content).unwrap();
    path
}

fn run_ilabyaml(config_path: &Path, args: &[&str], envs: &[(&str, &str)]) -> (String, String, bool) {
    let binary = ilabyaml_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path)
        .args(args)
        .envs(envs.iter().copied())
        .env_remove("RUST_LOG")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run ilabyaml binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

const FORM: &str = r#"
version = "2"
domain = "d"
created_by = "me"
repo = "r"
commit = "c1"
patterns = ["a.md", "b.md"]
instructions = "Five examples."
knowledge_seed = "Phoenix is a constellation."
"#;

#[test]
fn test_init_form_writes_defaults() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), r#"provider = "disabled""#);
    let form = tmp.path().join("form.toml");

    let (stdout, stderr, success) =
        run_ilabyaml(&config, &["init-form", form.to_str().unwrap()], &[]);
    assert!(success, "init-form failed: stdout={}, stderr={}", stdout, stderr);

    let content = fs::read_to_string(&form).unwrap();
    assert!(content.contains("domain = \"astronomy\""));
    assert!(content.contains("phoenix_constellation.md"));

    let (_, stderr, success) = run_ilabyaml(&config, &["init-form", form.to_str().unwrap()], &[]);
    assert!(!success, "second init-form should refuse to overwrite");
    assert!(stderr.contains("already exists"));

    let (_, _, success) =
        run_ilabyaml(&config, &["init-form", form.to_str().unwrap(), "--force"], &[]);
    assert!(success);
}

#[test]
fn test_defaults_prints_bundled_values() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), r#"provider = "disabled""#);

    let (stdout, stderr, success) = run_ilabyaml(&config, &["defaults"], &[]);
    assert!(success, "defaults failed: {}", stderr);
    assert!(stdout.contains("version = \"2\""));
    assert!(stdout.contains("system_instruction"));
}

#[test]
fn test_generate_with_disabled_provider_fails_without_output() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), r#"provider = "disabled""#);
    let form = write_form(tmp.path(), FORM);
    let out = tmp.path().join("out");

    let (_, stderr, success) = run_ilabyaml(
        &config,
        &[
            "generate",
            "--form",
            form.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ],
        &[],
    );
    assert!(!success);
    assert!(stderr.contains("Completion provider is disabled"), "stderr={}", stderr);
    assert!(!out.join("qna.yaml").exists());
}

#[test]
fn test_generate_rejects_missing_fields() {
    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), r#"provider = "disabled""#);
    let form = write_form(tmp.path(), "domain = \"\"\ncommit = \" \"\n");

    let (_, stderr, success) =
        run_ilabyaml(&config, &["generate", "--form", form.to_str().unwrap(), "--stdout"], &[]);
    assert!(!success);
    assert!(
        stderr.contains("Please fill in the following required fields: domain, commit"),
        "stderr={}",
        stderr
    );
}

#[test]
fn test_generate_end_to_end_against_mock_provider() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-cli-test")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{"choices":[{"index":0,"message":{"role":"assistant","content":"```yaml\nseed_examples:\n  - context: Phoenix\n```"}}]}"#,
        )
        .expect(1)
        .create();

    let tmp = TempDir::new().unwrap();
    let config = write_config(
        tmp.path(),
        &format!(
            "provider = \"openai\"\nbase_url = \"{}/v1\"\napi_key_env = \"ILABYAML_CLI_TEST_KEY\"\ntimeout_secs = 5",
            server.url()
        ),
    );
    let form = write_form(tmp.path(), FORM);
    let out = tmp.path().join("knowledge");

    let (stdout, stderr, success) = run_ilabyaml(
        &config,
        &[
            "generate",
            "--form",
            form.to_str().unwrap(),
            "--out",
            out.to_str().unwrap(),
        ],
        &[("ILABYAML_CLI_TEST_KEY", "sk-cli-test")],
    );
    assert!(success, "generate failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("qna.yaml"));

    let yaml = fs::read_to_string(out.join("qna.yaml")).unwrap();
    assert_eq!(
        yaml,
        "version: 2\ndomain: d\ncreated_by: me\nseed_examples:\n  - context: Phoenix\ndocument:\n  repo: r\n  commit: c1\n  patterns:\n    - a.md\n    - b.md"
    );
    mock.assert();
}

#[test]
fn test_generate_through_server_prints_document() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("POST", "/api/generate")
        .match_body(mockito::Matcher::PartialJson(serde_json::json!({
            "instructions": "Five examples.",
            "knowledgeSeed": "Phoenix is a constellation."
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"result":"```yaml\nseed_examples: []\n```"}"#)
        .expect(1)
        .create();

    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), r#"provider = "disabled""#);
    let form = write_form(tmp.path(), FORM);

    let (stdout, stderr, success) = run_ilabyaml(
        &config,
        &[
            "generate",
            "--form",
            form.to_str().unwrap(),
            "--server",
            &server.url(),
            "--stdout",
        ],
        &[],
    );
    assert!(success, "generate --server failed: stderr={}", stderr);
    assert!(stdout.starts_with("version: 2\ndomain: d\ncreated_by: me\nseed_examples: []\ndocument:"));
    assert!(stdout.contains("    - a.md\n    - b.md"));
    mock.assert();
}

#[test]
fn test_generate_through_server_surfaces_server_error() {
    let mut server = mockito::Server::new();
    server
        .mock("POST", "/api/generate")
        .with_status(500)
        .with_header("content-type", "application/json")
        .with_body(r#"{"error":"Request timed out after 50 seconds"}"#)
        .create();

    let tmp = TempDir::new().unwrap();
    let config = write_config(tmp.path(), r#"provider = "disabled""#);
    let form = write_form(tmp.path(), FORM);
    let out = tmp.path().join("out");

    let (_, stderr, success) = run_ilabyaml(
        &config,
        &[
            "generate",
            "--form",
            form.to_str().unwrap(),
            "--server",
            &server.url(),
            "--out",
            out.to_str().unwrap(),
        ],
        &[],
    );
    assert!(!success);
    assert!(stderr.contains("Request timed out after 50 seconds"), "stderr={}", stderr);
    assert!(!out.join("qna.yaml").exists());
}
