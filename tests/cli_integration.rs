use std::path::Path;
use std::process::{Command, Output};

use predicates::prelude::*;
use serde_json::Value;
use tempfile::tempdir;

fn run_crew_as(home: &Path, agent: Option<&str>, args: &[&str]) -> Output {
    let binary = assert_cmd::cargo::cargo_bin!("crew");
    let mut cmd = Command::new(binary);
    cmd.current_dir(home);
    cmd.env("CREW_HOME", home.join("state"));
    cmd.env("CREW_TEAM", "alpha");
    cmd.env_remove("CREW_AGENT");
    if let Some(agent) = agent {
        cmd.env("CREW_AGENT", agent);
    }
    cmd.arg("--format").arg("json");
    cmd.args(args);
    cmd.output().expect("crew command executes")
}

fn run_crew(home: &Path, args: &[&str]) -> Output {
    run_crew_as(home, None, args)
}

fn json_ok(output: Output) -> Value {
    assert!(
        output.status.success(),
        "crew failed:\nstdout:\n{}\nstderr:\n{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json stdout")
}

fn json_err(output: Output) -> Value {
    assert!(
        !output.status.success(),
        "expected failure, got:\n{}",
        String::from_utf8_lossy(&output.stdout)
    );
    // Log lines may precede the envelope, which is always last.
    let stderr = String::from_utf8_lossy(&output.stderr);
    let last = stderr.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or_default();
    serde_json::from_str(last).expect("valid json error envelope")
}

fn setup_team(home: &Path) {
    json_ok(run_crew(home, &["team", "create", "alpha", "-d", "test team"]));
    json_ok(run_crew(home, &["team", "add-member", "bob"]));
    json_ok(run_crew(home, &["team", "add-member", "carol", "--model", "small"]));
}

#[test]
fn team_roster_lifecycle() {
    let dir = tempdir().unwrap();
    setup_team(dir.path());

    let team = json_ok(run_crew(dir.path(), &["team", "show"]));
    assert_eq!(team["name"], "alpha");
    assert_eq!(team["description"], "test team");
    let names: Vec<&str> = team["members"]
        .as_array()
        .unwrap()
        .iter()
        .map(|m| m["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["team-lead", "bob", "carol"]);
    assert_eq!(team["members"][0]["agentType"], "lead");

    let updated = json_ok(run_crew(
        dir.path(),
        &["team", "update-member", "bob", "--tmux-pane-id", "%3"],
    ));
    assert_eq!(updated["tmuxPaneId"], "%3");

    let dup = json_err(run_crew(dir.path(), &["team", "add-member", "bob"]));
    assert_eq!(dup["error"], "invalid_state");

    let bad = json_err(run_crew(dir.path(), &["team", "add-member", "../evil"]));
    assert_eq!(bad["error"], "invalid_name");

    let lead = json_err(run_crew(dir.path(), &["team", "retire", "team-lead"]));
    assert_eq!(lead["error"], "invalid_state");

    json_ok(run_crew(dir.path(), &["team", "delete"]));
    let gone = json_err(run_crew(dir.path(), &["team", "show"]));
    assert_eq!(gone["error"], "team_not_found");
}

#[test]
fn task_plan_workflow_via_cli() {
    let dir = tempdir().unwrap();
    setup_team(dir.path());

    let task = json_ok(run_crew(
        dir.path(),
        &["task", "create", "Write docs", "--metadata", r#"{"area":"docs"}"#],
    ));
    assert_eq!(task["id"], "1");
    assert_eq!(task["status"], "pending");
    assert_eq!(task["metadata"]["area"], "docs");

    let rejected = json_err(run_crew(dir.path(), &["task", "approve", "1"]));
    assert_eq!(rejected["error"], "invalid_state");

    let planned = json_ok(run_crew(dir.path(), &["task", "plan", "1", "outline then write"]));
    assert_eq!(planned["status"], "planning");

    let no_feedback = json_err(run_crew(dir.path(), &["task", "reject", "1"]));
    assert_eq!(no_feedback["error"], "feedback_required");

    let feedback = json_ok(run_crew(
        dir.path(),
        &["task", "reject", "1", "--feedback", "add examples"],
    ));
    assert_eq!(feedback["status"], "planning");
    assert_eq!(feedback["planFeedback"], "add examples");

    let approved = json_ok(run_crew(dir.path(), &["task", "approve", "1"]));
    assert_eq!(approved["status"], "in_progress");
    assert_eq!(approved["planFeedback"], "");
}

#[test]
fn task_update_list_and_delete() {
    let dir = tempdir().unwrap();
    setup_team(dir.path());
    json_ok(run_crew(dir.path(), &["task", "create", "one"]));
    json_ok(run_crew(dir.path(), &["task", "create", "two"]));

    json_ok(run_crew(
        dir.path(),
        &["task", "update", "2", "--owner", "bob", "--status", "in_progress"],
    ));
    let owned = json_ok(run_crew(dir.path(), &["task", "list", "--owner", "bob"]));
    assert_eq!(owned.as_array().unwrap().len(), 1);
    assert_eq!(owned[0]["id"], "2");

    let released = json_ok(run_crew(dir.path(), &["task", "reset-owner", "bob"]));
    assert_eq!(released[0]["status"], "pending");
    assert!(released[0].get("owner").is_none());

    let deleted = json_ok(run_crew(dir.path(), &["task", "update", "1", "--status", "deleted"]));
    assert_eq!(deleted["status"], "deleted");
    let missing = json_err(run_crew(dir.path(), &["task", "show", "1"]));
    assert_eq!(missing["error"], "task_not_found");

    let all = json_ok(run_crew(dir.path(), &["task", "list"]));
    assert_eq!(all.as_array().unwrap().len(), 1);
}

#[test]
fn messaging_and_status_via_cli() {
    let dir = tempdir().unwrap();
    setup_team(dir.path());

    let report = json_ok(run_crew(dir.path(), &["inbox", "broadcast", "standup now"]));
    assert_eq!(report["delivered"].as_array().unwrap().len(), 2);
    assert!(report["failed"].as_array().unwrap().is_empty());

    json_ok(run_crew_as(dir.path(), Some("bob"), &["inbox", "send", "carol", "ping"]));

    let carol = json_ok(run_crew_as(dir.path(), Some("carol"), &["inbox", "read"]));
    assert_eq!(carol.as_array().unwrap().len(), 2);
    assert_eq!(carol[1]["from"], "bob");
    let again = json_ok(run_crew_as(dir.path(), Some("carol"), &["inbox", "read"]));
    assert!(again.as_array().unwrap().is_empty());

    let status = json_ok(run_crew_as(dir.path(), Some("carol"), &["status", "show"]));
    assert_eq!(status["ready"], true);
    assert_eq!(status["agentName"], "carol");

    let lead_inbox = json_ok(run_crew(dir.path(), &["inbox", "read", "--all"]));
    assert!(lead_inbox.as_array().unwrap().is_empty());

    let unknown = json_err(run_crew(dir.path(), &["inbox", "send", "mallory", "hi"]));
    assert_eq!(unknown["error"], "member_not_found");

    let beat = json_ok(run_crew_as(
        dir.path(),
        Some("bob"),
        &["status", "heartbeat", "--pid", "4242"],
    ));
    assert_eq!(beat["pid"], 4242);
    assert!(beat["lastHeartbeatAt"].as_i64().is_some());

    let none = json_ok(run_crew(dir.path(), &["status", "show", "nobody"]));
    assert!(none.is_null());
}

#[test]
fn pretty_format_prints_roster_and_board() {
    let dir = tempdir().unwrap();
    setup_team(dir.path());
    json_ok(run_crew(dir.path(), &["task", "create", "Write docs"]));

    let pretty = |args: &[&str]| {
        let mut cmd = assert_cmd::Command::new(assert_cmd::cargo::cargo_bin!("crew"));
        cmd.current_dir(dir.path())
            .env("CREW_HOME", dir.path().join("state"))
            .env("CREW_TEAM", "alpha")
            .env("NO_COLOR", "1")
            .arg("--format")
            .arg("pretty")
            .args(args);
        cmd
    };

    pretty(&["team", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("bob (teammate, model: -)"))
        .stdout(predicate::str::contains("carol (teammate, model: small)"));
    pretty(&["task", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Write docs"));
    pretty(&["task", "show", "9"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error: task 9 not found"));
}

#[test]
fn missing_team_reports_error_envelope() {
    let dir = tempdir().unwrap();
    let binary = assert_cmd::cargo::cargo_bin!("crew");
    let output = Command::new(binary)
        .current_dir(dir.path())
        .env("CREW_HOME", dir.path().join("state"))
        .env_remove("CREW_TEAM")
        .args(["task", "list"])
        .output()
        .expect("crew command executes");
    let err = json_err(output);
    assert_eq!(err["error"], "no_team");
}

#[cfg(unix)]
#[test]
fn completing_a_task_runs_hook_script() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    setup_team(dir.path());
    let hooks = dir.path().join(".crew").join("hooks");
    std::fs::create_dir_all(&hooks).unwrap();
    let out = dir.path().join("hook.out");
    let script = hooks.join("task_completed.sh");
    std::fs::write(
        &script,
        format!("#!/bin/sh\nprintf '%s' \"$CREW_TEAM\" > '{}'\n", out.display()),
    )
    .unwrap();
    std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

    json_ok(run_crew(dir.path(), &["task", "create", "ship it"]));
    json_ok(run_crew(dir.path(), &["task", "update", "1", "--status", "completed"]));

    assert_eq!(std::fs::read_to_string(&out).unwrap(), "alpha");
}
