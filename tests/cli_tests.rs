//! Integration tests for the CLI interface

mod common;

use assert_cmd::Command;
use common::{sample_project, TestProject};
use predicates::prelude::*;

/// `covtree` isolated from the user's configuration and environment
fn covtree(project: &TestProject) -> Command {
    let mut cmd = Command::cargo_bin("covtree").unwrap();
    cmd.env("HOME", &project.home)
        .env("XDG_CONFIG_HOME", project.home.join(".config"))
        .env_remove("COVTREE_INTERPRETER")
        .env_remove("COVTREE_SCRIPT")
        .env_remove("COVTREE_DATA_DIR")
        .env_remove("COVTREE_EXTENSIONS")
        .env_remove("COVTREE_LOG")
        .arg("--no-progress");
    cmd
}

fn with_tool(cmd: &mut Command, project: &TestProject) {
    cmd.arg("--interpreter").arg("sh").arg("--script").arg(&project.script);
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("covtree").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("refresh"))
        .stdout(predicate::str::contains("erase"));
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("covtree").unwrap();
    cmd.arg("invalid-command")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_refresh_prints_text_report() {
    let project = sample_project().unwrap();
    let mut cmd = covtree(&project);
    with_tool(&mut cmd, &project);

    cmd.arg("refresh")
        .arg(&project.root)
        .assert()
        .success()
        .stdout(predicate::str::contains("Stmts"))
        .stdout(predicate::str::contains("  a.py"))
        .stdout(predicate::str::contains("75%  2"))
        .stdout(predicate::str::contains("sub/"))
        .stdout(predicate::str::contains(
            "error: exceptions.SyntaxError: invalid syntax (line 1)",
        ))
        .stdout(predicate::str::contains("site.py").not());
}

#[test]
fn test_refresh_json_report() {
    let project = sample_project().unwrap();
    let mut cmd = covtree(&project);
    with_tool(&mut cmd, &project);

    let output = cmd
        .arg("refresh")
        .arg(&project.root)
        .arg("--format")
        .arg("json")
        .output()
        .unwrap();
    assert!(output.status.success());

    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["collection"]["coverage_records"], 2);
    assert_eq!(value["collection"]["error_records"], 1);
    assert_eq!(value["collection"]["exit_status"]["kind"], "success");

    let root = &value["nodes"][0];
    assert_eq!(root["depth"], 0);
    assert_eq!(root["statements"], 8);
    assert_eq!(root["missed"], 2);
}

#[test]
fn test_refresh_show_selected_paths() {
    let project = sample_project().unwrap();
    let mut cmd = covtree(&project);
    with_tool(&mut cmd, &project);

    cmd.arg("refresh")
        .arg(&project.root)
        .arg("--show")
        .arg(project.root.join("sub"))
        .assert()
        .success()
        .stdout(predicate::str::contains(project.root.join("sub").display().to_string()))
        .stdout(predicate::str::contains("a.py").not());
}

#[test]
fn test_show_unknown_path_fails() {
    let project = sample_project().unwrap();
    let mut cmd = covtree(&project);
    with_tool(&mut cmd, &project);

    cmd.arg("refresh")
        .arg(&project.root)
        .arg("--show")
        .arg(project.root.join("notes.txt"))
        .assert()
        .code(7)
        .stderr(predicate::str::contains("E6000"));
}

#[test]
fn test_project_config_file_is_used() {
    let project = sample_project().unwrap();
    std::fs::write(
        project.root.join(".covtree.toml"),
        format!(
            "[tool]\ninterpreter = \"sh\"\nscript = \"{}\"\n",
            project.script.display()
        ),
    )
    .unwrap();

    covtree(&project)
        .arg("refresh")
        .arg(&project.root)
        .assert()
        .success()
        .stdout(predicate::str::contains("b.py"));
}

#[test]
fn test_explicit_config_and_env_override() {
    let project = sample_project().unwrap();
    let config = project.home.join("covtree.toml");
    std::fs::create_dir_all(&project.home).unwrap();
    std::fs::write(
        &config,
        "[tool]\ninterpreter = \"/nonexistent/python\"\nscript = \"/nonexistent/coverage.py\"\n",
    )
    .unwrap();

    covtree(&project)
        .env("COVTREE_INTERPRETER", "sh")
        .env("COVTREE_SCRIPT", &project.script)
        .arg("--config")
        .arg(&config)
        .arg("refresh")
        .arg(&project.root)
        .assert()
        .success()
        .stdout(predicate::str::contains("a.py"));
}

#[test]
fn test_missing_interpreter_configuration() {
    let project = sample_project().unwrap();

    covtree(&project)
        .arg("refresh")
        .arg(&project.root)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("E1001"));
}

#[test]
fn test_verbose_error_describes_code() {
    let project = sample_project().unwrap();

    covtree(&project)
        .arg("-v")
        .arg("refresh")
        .arg(&project.root)
        .assert()
        .code(2)
        .stderr(predicate::str::contains(
            "(No interpreter configured for the coverage tool)",
        ))
        .stderr(predicate::str::contains("Error chain:"));
}

#[test]
fn test_missing_script_file() {
    let project = sample_project().unwrap();

    covtree(&project)
        .arg("--interpreter")
        .arg("sh")
        .arg("--script")
        .arg(project.tool_dir.join("absent.sh"))
        .arg("refresh")
        .arg(&project.root)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("E1002"));
}

#[test]
fn test_root_must_be_directory() {
    let project = sample_project().unwrap();
    let mut cmd = covtree(&project);
    with_tool(&mut cmd, &project);

    cmd.arg("refresh")
        .arg(project.root.join("a.py"))
        .assert()
        .code(2)
        .stderr(predicate::str::contains("E1006"));
}

#[test]
fn test_missing_root_reports_no_data() {
    let project = sample_project().unwrap();
    let mut cmd = covtree(&project);
    with_tool(&mut cmd, &project);

    cmd.arg("refresh")
        .arg(project.root.join("gone"))
        .assert()
        .success()
        .stderr(predicate::str::contains("No source files found"));
}

#[test]
fn test_unstartable_interpreter_exit_code() {
    let project = sample_project().unwrap();

    covtree(&project)
        .arg("--interpreter")
        .arg("/nonexistent/covtree-interpreter")
        .arg("--script")
        .arg(&project.script)
        .arg("refresh")
        .arg(&project.root)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("E2001"));
}

#[test]
fn test_erase() {
    let project = sample_project().unwrap();
    std::fs::write(project.data_file(), "stale").unwrap();

    let mut cmd = covtree(&project);
    with_tool(&mut cmd, &project);
    cmd.current_dir(&project.root)
        .arg("erase")
        .assert()
        .success()
        .stdout(predicate::str::contains("Coverage data erased"));

    assert!(!project.data_file().exists());
    assert!(project.erased_marker().exists());
}

#[test]
fn test_verbose_logs_go_to_stderr() {
    let project = sample_project().unwrap();
    let mut cmd = covtree(&project);
    with_tool(&mut cmd, &project);

    cmd.arg("-v")
        .arg("refresh")
        .arg(&project.root)
        .arg("--format")
        .arg("json")
        .assert()
        .success()
        .stdout(predicate::str::starts_with("{"))
        .stderr(predicate::str::contains("DEBUG"));
}
