#![allow(deprecated)]
use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn shipyard(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("shipyard").unwrap();
    cmd.current_dir(dir.path())
        .env("SHIPYARD_CONFIG", dir.path().join("shipyard.yaml"))
        .env_remove("SHIPYARD_CI_USERNAME")
        .env_remove("SHIPYARD_CI_PASSWORD")
        .env_remove("SHIPYARD_JENKINS_URL")
        .env_remove("SHIPYARD_API_TOKEN");
    cmd
}

fn write_config(dir: &TempDir, yaml: &str) {
    std::fs::write(dir.path().join("shipyard.yaml"), yaml).unwrap();
}

const VALID: &str = "\
server:
  port: 9000
  api_token: secret
ci:
  username: deployer
  password: hunter2
  base_url: http://jenkins.internal:8080
";

// ---------------------------------------------------------------------------
// config init
// ---------------------------------------------------------------------------

#[test]
fn init_writes_defaults() {
    let dir = TempDir::new().unwrap();
    shipyard(&dir)
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Wrote"));

    let text = std::fs::read_to_string(dir.path().join("shipyard.yaml")).unwrap();
    let value: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
    assert_eq!(value["server"]["port"].as_u64(), Some(8085));
    assert_eq!(value["ci"]["cluster_job"].as_str(), Some("deploy-cluster"));
    assert_eq!(value["billing"]["monthly_deploy_allowance"].as_u64(), Some(200));
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, VALID);

    shipyard(&dir)
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
    let text = std::fs::read_to_string(dir.path().join("shipyard.yaml")).unwrap();
    assert!(text.contains("deployer"));

    shipyard(&dir)
        .args(["config", "init", "--force"])
        .assert()
        .success();
    let text = std::fs::read_to_string(dir.path().join("shipyard.yaml")).unwrap();
    assert!(!text.contains("deployer"));
}

// ---------------------------------------------------------------------------
// config show / validate
// ---------------------------------------------------------------------------

#[test]
fn show_json_fills_defaults() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, VALID);

    let output = shipyard(&dir)
        .args(["config", "show", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["server"]["port"], 9000);
    assert_eq!(value["ci"]["queue_attempts"], 5);
    assert_eq!(value["ci"]["application_job"], "deploy-application");
}

#[test]
fn validate_accepts_complete_config() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, VALID);

    shipyard(&dir)
        .args(["config", "validate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Config is valid"));
}

#[test]
fn validate_fails_on_defaults() {
    let dir = TempDir::new().unwrap();
    shipyard(&dir).args(["config", "init"]).assert().success();

    shipyard(&dir)
        .args(["config", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[error] ci.username is empty"))
        .stdout(predicate::str::contains("no Jenkins address"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn missing_config_is_reported() {
    let dir = TempDir::new().unwrap();
    shipyard(&dir)
        .args(["config", "show"])
        .assert()
        .failure()
        .stderr(predicate::str::starts_with("error: failed to load config"))
        .stderr(predicate::str::contains("config file not found"));
}

// ---------------------------------------------------------------------------
// serve
// ---------------------------------------------------------------------------

#[test]
fn serve_refuses_invalid_config() {
    let dir = TempDir::new().unwrap();
    shipyard(&dir)
        .args(["serve", "--port", "0"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("ci.username is empty"))
        .stderr(predicate::str::contains("config validation found errors"));
}

#[test]
fn serve_flags_do_not_rewrite_config() {
    let dir = TempDir::new().unwrap();
    write_config(&dir, "ci:\n  username: deployer\n");

    // Still invalid without an address; the flag only fills the user.
    shipyard(&dir)
        .args(["serve", "--port", "0", "--ci-username", "other"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("no Jenkins address"))
        .stdout(predicate::str::contains("ci.username").not());

    let text = std::fs::read_to_string(dir.path().join("shipyard.yaml")).unwrap();
    assert!(text.contains("deployer"));
}
