//! End-to-end fork/merge workflow through the `rd` binary.
//!
//! Each test runs `rd` as a subprocess in an isolated temp directory with
//! its own config home so user settings never leak in.

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

// ---------------------------------------------------------------------------
// Test Harness
// ---------------------------------------------------------------------------

fn rd_cmd(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("rd"));
    cmd.current_dir(dir);
    cmd.env("REDRAFT_LOG", "off");
    cmd.env("XDG_CONFIG_HOME", dir.join(".config"));
    cmd.env("HOME", dir);
    cmd.env_remove("FORMAT");
    cmd
}

fn init_project(dir: &Path) {
    rd_cmd(dir).args(["init"]).assert().success();
}

/// Run `rd <args> --json`, assert success and parse stdout.
fn rd_json(dir: &Path, args: &[&str]) -> Value {
    let output = rd_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("rd should not crash");
    assert!(
        output.status.success(),
        "rd {args:?} failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("--json should produce valid JSON")
}

/// Run `rd <args> --json`, assert failure and return stderr.
fn rd_fails(dir: &Path, args: &[&str]) -> String {
    let output = rd_cmd(dir)
        .args(args)
        .arg("--json")
        .output()
        .expect("rd should not crash");
    assert!(!output.status.success(), "rd {args:?} unexpectedly succeeded");
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn create_article(dir: &Path) -> i64 {
    let json = rd_json(
        dir,
        &[
            "create",
            "--title",
            "Election night",
            "--body",
            "Polls close at eight.",
            "--meta",
            "views=10",
            "--term",
            "category=news",
        ],
    );
    json["id"].as_i64().expect("create output should have numeric id")
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[test]
fn fork_edit_review_publish_merges_back() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let original = create_article(dir.path());
    let original_s = original.to_string();

    let forked = rd_json(dir.path(), &["fork", &original_s]);
    assert_eq!(forked["action"], "fork");
    assert_eq!(forked["original"], original);
    let fork = forked["document"].as_i64().expect("fork id");
    assert_ne!(fork, original);
    let fork_s = fork.to_string();
    assert!(
        forked["redirect_url"]
            .as_str()
            .is_some_and(|url| url.contains(&format!("post={fork}")))
    );

    let fork_doc = rd_json(dir.path(), &["show", &fork_s]);
    assert_eq!(fork_doc["status"], "wpse-draft");
    assert_eq!(fork_doc["parent"], original);
    assert_eq!(fork_doc["meta"][0]["key"], "views");
    assert_eq!(fork_doc["terms"]["category"][0], "news");

    let err = rd_fails(dir.path(), &["fork", &original_s]);
    assert!(err.contains("E2003"), "stderr: {err}");

    rd_json(dir.path(), &["edit", &fork_s, "--body", "Polls closed; counting begins."]);
    let submitted = rd_json(dir.path(), &["submit", &fork_s]);
    assert_eq!(submitted["status"], "wpse-pending");

    let live = rd_json(dir.path(), &["show", &original_s]);
    assert_eq!(live["fields"]["body"], "Polls close at eight.");
    assert_eq!(live["open_fork"], fork);

    let published = rd_json(dir.path(), &["publish", &fork_s]);
    assert_eq!(published["action"], "merge");
    assert_eq!(published["document"], original);
    assert_eq!(published["notice"], "Your changes have been published.");

    let merged = rd_json(dir.path(), &["show", &original_s]);
    assert_eq!(merged["id"], original);
    assert_eq!(merged["status"], "publish");
    assert_eq!(merged["fields"]["body"], "Polls closed; counting begins.");
    assert_eq!(merged["fields"]["guid"], live["fields"]["guid"]);
    assert!(merged["open_fork"].is_null());
    assert_eq!(merged["can_fork"], true);
    assert!(
        merged["view_url"]
            .as_str()
            .is_some_and(|url| url.ends_with(&format!("/?p={original}")))
    );

    let retired = rd_json(dir.path(), &["show", &fork_s]);
    assert_eq!(retired["status"], "wpse-merged");

    let err = rd_fails(dir.path(), &["merge", &fork_s]);
    assert!(err.contains("E2004"), "stderr: {err}");

    let open = rd_json(dir.path(), &["list", "--forks"]);
    assert_eq!(open.as_array().map(Vec::len), Some(0));
}

#[test]
fn status_reports_lifecycle() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let original = create_article(dir.path()).to_string();
    let fork = rd_json(dir.path(), &["fork", &original])["document"]
        .as_i64()
        .expect("fork id")
        .to_string();

    let status = rd_json(dir.path(), &["status", &original]);
    assert_eq!(status["key"], "published");
    assert_eq!(status["can_fork"], false);
    assert!(status["blocker"].as_str().is_some_and(|r| r.contains("open fork")));

    let status = rd_json(dir.path(), &["status", &fork]);
    assert_eq!(status["key"], "draft-fork");
    assert_eq!(status["can_merge"], true);
}

#[test]
fn pending_fork_cannot_go_back_to_submit() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let original = create_article(dir.path()).to_string();
    let fork = rd_json(dir.path(), &["fork", &original])["document"]
        .as_i64()
        .expect("fork id")
        .to_string();

    rd_json(dir.path(), &["submit", &fork]);
    let err = rd_fails(dir.path(), &["submit", &fork]);
    assert!(err.contains("E2005"), "stderr: {err}");
}

#[test]
fn ordinary_document_publishes_in_place() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let created = rd_json(dir.path(), &["create", "--title", "Notes", "--status", "draft"]);
    let id = created["id"].as_i64().expect("id").to_string();

    let published = rd_json(dir.path(), &["publish", &id]);
    assert_eq!(published["action"], "publish");
    assert_eq!(published["status"], "publish");
}

#[test]
fn meta_and_terms_can_be_rewritten() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let id = create_article(dir.path()).to_string();

    let meta = rd_json(dir.path(), &["meta", "add", &id, "views", "11"]);
    assert_eq!(meta["meta"].as_array().map(Vec::len), Some(2));
    let cleared = rd_json(dir.path(), &["meta", "clear", &id]);
    assert_eq!(cleared["removed"], 2);

    let terms = rd_json(dir.path(), &["term", "set", &id, "post_tag", "sun", "heat", "sun"]);
    assert_eq!(terms["assigned"], 2);
    let shown = rd_json(dir.path(), &["show", &id]);
    assert_eq!(shown["terms"]["post_tag"], serde_json::json!(["sun", "heat"]));
}

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

#[test]
fn endpoints_require_a_matching_token() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let original = create_article(dir.path()).to_string();

    let err = rd_fails(dir.path(), &["api", "fork", &original, "--token", "not-a-token"]);
    assert!(err.contains("E4001"), "stderr: {err}");

    let merge_token = rd_json(dir.path(), &["token", "merge", &original]);
    let wrong_action = merge_token["token"].as_str().expect("token");
    let err = rd_fails(dir.path(), &["api", "fork", &original, "--token", wrong_action]);
    assert!(err.contains("E4001"), "stderr: {err}");

    let token = rd_json(dir.path(), &["token", "fork", &original]);
    let token = token["token"].as_str().expect("token").to_string();
    let response = rd_json(dir.path(), &["api", "fork", &original, "--token", &token]);
    assert_eq!(response["shouldRedirect"], true);
    assert!(response["redirectUrl"].as_str().is_some_and(|u| u.contains("action=edit")));
    assert!(
        response["message"]
            .as_str()
            .is_some_and(|m| m.starts_with("A draft has been created"))
    );

    let err = rd_fails(dir.path(), &["api", "fork", &original, "--token", &token]);
    assert!(err.contains("E2003"), "stderr: {err}");

    assert!(dir.path().join(".redraft/api.key").is_file());
}

#[test]
fn merge_endpoint_merges_the_fork() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let original = create_article(dir.path()).to_string();
    let fork = rd_json(dir.path(), &["fork", &original])["document"]
        .as_i64()
        .expect("fork id")
        .to_string();
    rd_json(dir.path(), &["edit", &fork, "--title", "Election night: results"]);

    let token = rd_json(dir.path(), &["token", "merge", &fork]);
    let token = token["token"].as_str().expect("token").to_string();
    let response = rd_json(dir.path(), &["api", "merge", &fork, "--token", &token]);
    assert_eq!(response["shouldRedirect"], true);
    assert_eq!(response["message"], "Your changes have been published.");

    let shown = rd_json(dir.path(), &["show", &original]);
    assert_eq!(shown["title"], "Election night: results");
}

#[test]
fn unknown_document_is_not_valid_for_endpoints() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let token = rd_json(dir.path(), &["token", "fork", "999"]);
    let token = token["token"].as_str().expect("token").to_string();

    let err = rd_fails(dir.path(), &["api", "fork", "999", "--token", &token]);
    assert!(err.contains("E2002"), "stderr: {err}");
    assert!(err.contains("not a valid document"), "stderr: {err}");
}

// ---------------------------------------------------------------------------
// Guard rails
// ---------------------------------------------------------------------------

#[test]
fn commands_outside_a_project_fail_with_not_initialized() {
    let dir = TempDir::new().expect("tempdir");
    rd_cmd(dir.path())
        .args(["list", "--json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn init_twice_requires_force() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    rd_cmd(dir.path())
        .args(["init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--force"));
    rd_cmd(dir.path()).args(["init", "--force"]).assert().success();
}

#[test]
fn status_field_cannot_be_edited() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let id = create_article(dir.path()).to_string();
    let err = rd_fails(dir.path(), &["edit", &id, "--field", "status=wpse-draft"]);
    assert!(err.contains("cannot be edited"), "stderr: {err}");
}

#[test]
fn forks_cannot_be_created_directly() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let err = rd_fails(dir.path(), &["create", "--title", "Sneaky", "--status", "wpse-draft"]);
    assert!(err.contains("reserved for forks"), "stderr: {err}");
}

#[test]
fn text_output_is_tab_separated() {
    let dir = TempDir::new().expect("tempdir");
    init_project(dir.path());
    let id = create_article(dir.path());
    rd_cmd(dir.path())
        .args(["list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(format!("{id}\tpublish\tElection night")));
}
