//! ---
//! nodeiam_section: "05-networking-external-interfaces"
//! nodeiam_subsection: "integration-tests"
//! nodeiam_type: "source"
//! nodeiam_scope: "code"
//! nodeiam_description: "Control CLI for planning node instance roles."
//! nodeiam_version: "v0.0.0-prealpha"
//! nodeiam_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::tempdir;

fn nodeiamctl(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("nodeiamctl").unwrap();
    cmd.current_dir(dir)
        .env_remove("NODEIAM_CONFIG")
        .env("NODEIAM_LOG", "error");
    cmd
}

#[test]
fn normalize_arn_prints_flattened_arn() {
    let dir = tempdir().unwrap();
    nodeiamctl(dir.path())
        .args(["normalize-arn", "arn:aws:iam::123:role/custom/path/MyRole"])
        .assert()
        .success()
        .stdout("arn:aws:iam::123:role/MyRole\n");
}

#[test]
fn plan_prints_role_and_addon_policies() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("nodeiam.toml"),
        r#"
partition = "aws"

[node_group.with_addon_policies]
auto_scaler = true
cert_manager = true
external_dns = true
"#,
    )
    .unwrap();

    nodeiamctl(dir.path())
        .args(["plan", "--managed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"NodeInstanceRole\""))
        .stdout(predicate::str::contains("PolicyAutoScaling"))
        .stdout(predicate::str::contains("PolicyCertManagerHostedZones"))
        .stdout(predicate::str::contains("PolicyExternalDNSChangeSet").not())
        .stdout(predicate::str::contains(
            "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly",
        ));
}

#[test]
fn plan_renders_yaml() {
    let dir = tempdir().unwrap();
    let request = dir.path().join("request.toml");
    fs::write(&request, "[node_group.with_addon_policies]\nxray = true\n").unwrap();

    nodeiamctl(dir.path())
        .args(["plan", "--output", "yaml", "--config"])
        .arg(&request)
        .assert()
        .success()
        .stdout(predicate::str::contains("PolicyXRay:"))
        .stdout(predicate::str::contains("${AWS::Partition}"));
}

#[test]
fn managed_policies_lists_arns() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("nodeiam.toml"),
        "partition = \"aws\"\n[cluster]\nwith_oidc = true\n",
    )
    .unwrap();

    nodeiamctl(dir.path())
        .args(["managed-policies", "--enable-ssm"])
        .assert()
        .success()
        .stdout(
            "arn:aws:iam::aws:policy/AmazonEC2ContainerRegistryReadOnly\n\
             arn:aws:iam::aws:policy/AmazonEKSWorkerNodePolicy\n\
             arn:aws:iam::aws:policy/AmazonSSMManagedInstanceCore\n",
        );
}

#[test]
fn malformed_attach_arn_fails_with_offending_arn() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("nodeiam.toml"),
        "[node_group]\nattach_policy_arns = [\"arn:aws:iam::123456789012:role\"]\n",
    )
    .unwrap();

    nodeiamctl(dir.path())
        .arg("plan")
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("malformed ARN"))
        .stderr(predicate::str::contains("arn:aws:iam::123456789012:role"));
}

#[test]
fn missing_request_file_is_reported() {
    let dir = tempdir().unwrap();
    nodeiamctl(dir.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("no role request files found"));
}

#[test]
fn explicit_config_does_not_fall_back_to_default_file() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("nodeiam.toml"), "partition = \"aws\"\n").unwrap();

    nodeiamctl(dir.path())
        .args(["plan", "--config", "missing.toml"])
        .assert()
        .failure()
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains("missing.toml"));
}

#[test]
fn misspelt_request_key_is_rejected() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("nodeiam.toml"),
        "[node_group.with_addon_policies]\nautoscaler = true\n",
    )
    .unwrap();

    nodeiamctl(dir.path())
        .arg("plan")
        .assert()
        .failure()
        .stderr(predicate::str::contains("autoscaler"));
}
