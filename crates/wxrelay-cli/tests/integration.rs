#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn wxrelay(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("wxrelay").unwrap();
    cmd.current_dir(dir.path())
        .env("WXRELAY_CONFIG", dir.path().join("wxrelay.yaml"))
        .env_remove("RUST_LOG");
    cmd
}

/// Config with a redb cache inside the temp dir and unreachable upstreams.
fn write_config(dir: &TempDir, webhook: &str) {
    let yaml = format!(
        r#"cache:
  backend:
    type: redb
    path: {cache}
  retry_delay_ms: 10
http_timeout_secs: 2
signals:
  url: http://127.0.0.1:1/minds/ssb
  tracked_codes: [wts, tc8ne]
bulletins:
  url: http://127.0.0.1:1/bulletins
  tracked_codes: [MHEAD_C]
webhook:
  url: "{webhook}"
"#,
        cache = dir.path().join("cache.redb").display(),
    );
    std::fs::write(dir.path().join("wxrelay.yaml"), yaml).unwrap();
}

// ---------------------------------------------------------------------------
// wxrelay config
// ---------------------------------------------------------------------------

#[test]
fn config_show_fills_in_defaults() {
    let dir = TempDir::new().unwrap();
    wxrelay(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tracked_codes"))
        .stdout(predicate::str::contains("MHEAD_C"))
        .stdout(predicate::str::contains("port: 3000"));
}

#[test]
fn config_check_requires_a_file() {
    let dir = TempDir::new().unwrap();
    wxrelay(&dir)
        .args(["config", "check"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("config file not found"));
}

#[test]
fn config_check_reports_empty_webhook() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "");
    wxrelay(&dir)
        .args(["config", "check"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] webhook.url is empty"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn config_check_accepts_valid_file() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "http://127.0.0.1:1/hook");
    wxrelay(&dir)
        .args(["config", "check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn config_flag_overrides_env() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "http://127.0.0.1:1/hook");
    let other = dir.path().join("other.yaml");
    std::fs::write(&other, "http_timeout_secs: 42\n").unwrap();
    wxrelay(&dir)
        .args(["config", "show", "--json", "--config"])
        .arg(&other)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"http_timeout_secs\": 42"));
}

// ---------------------------------------------------------------------------
// wxrelay enable / disable / cache
// ---------------------------------------------------------------------------

#[test]
fn kill_switch_persists_in_cache_file() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "http://127.0.0.1:1/hook");

    wxrelay(&dir)
        .arg("disable")
        .assert()
        .success()
        .stdout(predicate::str::contains("Execution disabled"));

    let out = wxrelay(&dir)
        .args(["cache", "show", "--json"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let snapshot: serde_json::Value = serde_json::from_slice(&out).unwrap();
    assert_eq!(snapshot["execution_disabled"], true);
    assert_eq!(snapshot["entries"].as_array().unwrap().len(), 0);

    wxrelay(&dir)
        .arg("enable")
        .assert()
        .success()
        .stdout(predicate::str::contains("Execution enabled"));
    wxrelay(&dir)
        .args(["cache", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Execution: enabled"))
        .stdout(predicate::str::contains("No cache entries."));
}

#[test]
fn disabled_run_does_not_contact_the_feed() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "http://127.0.0.1:1/hook");
    wxrelay(&dir).arg("disable").assert().success();
    wxrelay(&dir)
        .args(["run", "signals"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Execution is disabled."));
}

#[test]
fn cache_clear_reports_removed_count() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "http://127.0.0.1:1/hook");
    wxrelay(&dir)
        .args(["cache", "clear", "bulletins"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared 0 bulletins cache entries."));
}

// ---------------------------------------------------------------------------
// wxrelay run
// ---------------------------------------------------------------------------

#[test]
fn run_rejects_unknown_job() {
    let dir = TempDir::new().unwrap();
    wxrelay(&dir)
        .args(["run", "radar"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown job 'radar'"));
}

#[test]
fn run_fails_when_feed_is_unreachable() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "http://127.0.0.1:1/hook");
    wxrelay(&dir)
        .args(["run", "signals", "--json"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("\"status\": \"aborted\""))
        .stderr(predicate::str::contains("signals cycle aborted"));
}
