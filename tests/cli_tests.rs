// End-to-end CLI tests. Each test runs in its own directory so the default
// sqlite://runbook.db lands in a fresh temp dir.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use tempfile::TempDir;

const DEFINITION: &str = r#"{
    "title": "Deploy",
    "steps": [
        { "title": "Checks", "type": "SE" },
        { "title": "Build", "type": "ST" },
        { "title": "Smoke test", "type": "ST", "startWithPrevious": true }
    ]
}"#;

fn workspace() -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(dir.path().join("runbook.toml"), "[cli]\nuser = \"ops\"\n").unwrap();
    std::fs::write(dir.path().join("deploy.json"), DEFINITION).unwrap();
    dir
}

fn runbook(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("runbook").unwrap();
    cmd.current_dir(dir.path()).env("RUST_LOG", "error");
    cmd
}

fn run_json(dir: &TempDir, args: &[&str]) -> Value {
    let output = runbook(dir).arg("--json").args(args).output().unwrap();
    assert!(
        output.status.success(),
        "runbook {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).unwrap()
}

#[test]
fn no_subcommand_shows_getting_started() {
    let dir = workspace();
    runbook(&dir)
        .assert()
        .success()
        .stdout(predicate::str::contains("runbook process create"))
        .stdout(predicate::str::contains("runbook serve"));
}

#[test]
fn help_lists_subcommands() {
    let dir = workspace();
    runbook(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("execution"))
        .stdout(predicate::str::contains("serve"));
}

#[test]
fn create_then_list_and_show() {
    let dir = workspace();
    let created = run_json(&dir, &["process", "create", "--file", "deploy.json"]);
    let id = created["meta"]["id"].as_str().unwrap().to_string();
    assert_eq!(created["meta"]["createdBy"], "ops");

    runbook(&dir)
        .args(["process", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Deploy"))
        .stdout(predicate::str::contains(id.as_str()));

    runbook(&dir)
        .args(["process", "show", &id])
        .assert()
        .success()
        .stdout(predicate::str::contains("[1] • Build"))
        .stdout(predicate::str::contains("starts with previous"));
}

#[test]
fn user_flag_overrides_config() {
    let dir = workspace();
    let created = run_json(
        &dir,
        &["--user", "carol", "process", "create", "--file", "deploy.json"],
    );
    assert_eq!(created["meta"]["createdBy"], "carol");
}

#[test]
fn update_records_a_new_revision() {
    let dir = workspace();
    let created = run_json(&dir, &["process", "create", "--file", "deploy.json"]);
    let id = created["meta"]["id"].as_str().unwrap().to_string();

    std::fs::write(
        dir.path().join("deploy.toml"),
        "title = \"Deploy v2\"\n\n[[steps]]\ntitle = \"Ship\"\ntype = \"ST\"\n",
    )
    .unwrap();
    let updated = run_json(&dir, &["process", "update", &id, "--file", "deploy.toml"]);
    assert_eq!(updated["title"], "Deploy v2");
    assert_eq!(updated["meta"]["id"], id.as_str());

    let history = run_json(&dir, &["process", "history", &id]);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0]["title"], "Deploy v2");
    assert_eq!(history[1]["title"], "Deploy");
}

#[test]
fn execution_marking_cascades_one_step() {
    let dir = workspace();
    let created = run_json(&dir, &["process", "create", "--file", "deploy.json"]);
    let id = created["meta"]["id"].as_str().unwrap().to_string();

    let execution = run_json(&dir, &["execution", "start", &id]);
    let exec_id = execution["id"].as_str().unwrap().to_string();
    assert_eq!(execution["state"], "started");

    run_json(
        &dir,
        &["execution", "mark", &exec_id, "--step", "1", "--as", "started"],
    );
    let marked = run_json(
        &dir,
        &["execution", "mark", &exec_id, "--step", "1", "--as", "done"],
    );
    assert_eq!(marked["process"]["steps"][1]["state"], "done");
    assert_eq!(marked["process"]["steps"][2]["state"], "active");
    assert_eq!(marked["process"]["steps"][2]["startedBy"], "ops");

    runbook(&dir)
        .args(["execution", "mark", &exec_id, "--step", "2", "--as", "done"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Execution complete"));

    let listed = run_json(&dir, &["execution", "list", &id]);
    assert_eq!(listed[0]["state"], "done");
}

#[test]
fn marking_a_section_fails() {
    let dir = workspace();
    let created = run_json(&dir, &["process", "create", "--file", "deploy.json"]);
    let id = created["meta"]["id"].as_str().unwrap().to_string();
    let execution = run_json(&dir, &["execution", "start", &id]);
    let exec_id = execution["id"].as_str().unwrap().to_string();

    runbook(&dir)
        .args(["execution", "mark", &exec_id, "--step", "0", "--as", "started"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("step_idx"));

    runbook(&dir)
        .args(["execution", "mark", &exec_id, "--step", "-1", "--as", "started"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("step_idx"));
}

#[test]
fn unknown_process_fails() {
    let dir = workspace();
    runbook(&dir)
        .args(["process", "show", "00000000-0000-4000-8000-000000000000"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}
