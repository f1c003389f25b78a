#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

/// The binary with a clean environment, so host variables never leak into
/// configuration.
fn devbot() -> Command {
    let mut cmd = Command::cargo_bin("devbot").unwrap();
    cmd.env_clear();
    cmd
}

fn config_file(yaml: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(yaml.as_bytes()).unwrap();
    file
}

// ---------------------------------------------------------------------------
// devbot parse
// ---------------------------------------------------------------------------

#[test]
fn parse_develop_prints_fields() {
    devbot()
        .args(["parse", "/develop", "my-repo の src/main.rs に ログ出力を追加"])
        .assert()
        .success()
        .stdout(predicate::str::contains("my-repo"))
        .stdout(predicate::str::contains("src/main.rs"))
        .stdout(predicate::str::contains("ログ出力を追加"));
}

#[test]
fn parse_json_is_tagged_by_kind() {
    let output = devbot()
        .args(["parse", "confluence-search", "認証 in:DEV", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["type"], "search");
    assert_eq!(value["query"], "認証");
    assert_eq!(value["scope"], "DEV");
}

#[test]
fn parse_malformed_text_shows_usage() {
    devbot()
        .args(["parse", "/develop", "just do it"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "/develop [リポジトリ名] の [ファイルパス] に [やってほしいこと]",
        ));
}

#[test]
fn parse_unknown_command_fails() {
    devbot()
        .args(["parse", "/deploy", "now"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown command"));
}

// ---------------------------------------------------------------------------
// devbot commands
// ---------------------------------------------------------------------------

#[test]
fn commands_lists_every_slash_command() {
    let output = devbot().arg("commands").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    for slash in [
        "/develop",
        "/design",
        "/develop-from-design",
        "/confluence-search",
        "/design-mcp",
    ] {
        assert!(stdout.contains(slash), "missing {slash} in:\n{stdout}");
    }
}

// ---------------------------------------------------------------------------
// devbot config check
// ---------------------------------------------------------------------------

#[test]
fn config_check_from_env() {
    devbot()
        .args(["config", "check"])
        .env("GITHUB_ACCESS_TOKEN", "ghp")
        .env("ANTHROPIC_API_KEY", "sk")
        .assert()
        .success()
        .stdout(predicate::str::contains("wiki"))
        .stdout(predicate::str::contains("disabled"))
        .stdout(predicate::str::contains("[warning]"));
}

#[test]
fn config_check_missing_token_fails() {
    devbot()
        .args(["config", "check"])
        .env("ANTHROPIC_API_KEY", "sk")
        .assert()
        .failure()
        .stderr(predicate::str::contains("GITHUB_ACCESS_TOKEN"));
}

#[test]
fn config_check_file_reports_errors() {
    let file = config_file(
        "github:\n  token: ghp\nanthropic:\n  api_key: sk\nconfluence:\n  space_key: \"\"\n",
    );
    devbot()
        .args(["config", "check", "--config"])
        .arg(file.path())
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] confluence.space_key is empty"));
}

#[test]
fn config_check_json_reports_integrations() {
    let file = config_file(
        "github:\n  token: ghp\nanthropic:\n  api_key: sk\n\
         confluence:\n  url: https://x.atlassian.net/wiki\n  username: me\n  api_token: t\n\
         mcp:\n  url: https://mcp.atlassian.com/v1/sse\n\
         slack:\n  signing_secret: s3cret\n",
    );
    let output = devbot()
        .args(["config", "check", "--json", "--config"])
        .arg(file.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["wiki"], true);
    assert_eq!(value["tool_routing"], true);
    assert_eq!(value["signature_verification"], true);
    assert_eq!(value["warnings"], serde_json::json!([]));
}
