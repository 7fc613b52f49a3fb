use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;

const VALID: &str = r#"{ "channels": { "nucleus": { "name": "DAPI", "number": 0 } } }"#;
const NO_NUCLEUS: &str = r#"{ "channels": { "membrane": { "name": "CD45", "number": 1 } } }"#;

fn cellrun() -> Command {
    let mut command = Command::cargo_bin("cellrun").unwrap();
    command
        .env_remove("DEEPCELL_ACCESS_TOKEN")
        .env_remove("CELLRUN_WORKER")
        .env_remove("CELLRUN_DEVICE");
    command
}

fn dataset(root: &Path, name: &str, config: &str) {
    let dir = root.join(name);
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join(format!("{}.ome.tiff", name)), b"tiff").unwrap();
    std::fs::write(dir.join("config.json"), config).unwrap();
}

#[test]
fn test_help_lists_commands() {
    cellrun()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("discover"))
        .stdout(predicate::str::contains("prepare"))
        .stdout(predicate::str::contains("manifest"));
}

#[test]
fn test_manifest_valid() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifest.txt");
    std::fs::write(
        &path,
        "HBM279.TQRS.775 /pipeline_output/expr/reg001_expr.ome.tiff\nHBM279.TQRS.775 /pipelineConfig.json\n",
    )
    .unwrap();

    cellrun()
        .arg("manifest")
        .arg(&path)
        .assert()
        .success()
        .stdout("HBM279TQRS775\n");
}

#[test]
fn test_manifest_rejects_comments() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("manifest.txt");
    std::fs::write(&path, "# spleen\nHBM279.TQRS.775 /pipelineConfig.json\n").unwrap();

    cellrun()
        .arg("manifest")
        .arg(&path)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("ManifestError"));
}

#[test]
fn test_run_requires_token() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    cellrun()
        .arg("run")
        .arg(input.path())
        .arg(output.path())
        .args(["--annotation-url", "http://127.0.0.1:9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("DEEPCELL_ACCESS_TOKEN"));
}

#[test]
fn test_run_missing_root() {
    let output = tempfile::tempdir().unwrap();

    cellrun()
        .env("DEEPCELL_ACCESS_TOKEN", "token")
        .arg("run")
        .arg("/definitely/not/here")
        .arg(output.path())
        .args(["--annotation-url", "http://127.0.0.1:9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("RootError"));
}

#[test]
fn test_run_bad_worker_selector() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();

    cellrun()
        .env("DEEPCELL_ACCESS_TOKEN", "token")
        .env("CELLRUN_WORKER", "3/2")
        .arg("run")
        .arg(input.path())
        .arg(output.path())
        .args(["--annotation-url", "http://127.0.0.1:9"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("CELLRUN_WORKER"));
}

#[test]
fn test_run_skipped_only_succeeds() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    dataset(input.path(), "ds2", NO_NUCLEUS);

    cellrun()
        .env("DEEPCELL_ACCESS_TOKEN", "token")
        .arg("run")
        .arg(input.path())
        .arg(output.path())
        .args(["--annotation-url", "http://127.0.0.1:9"])
        .args(["--segment-command", "cellsam-segment-does-not-exist"])
        .assert()
        .code(0)
        .stdout(predicate::str::contains("SKIPPED=1"));

    assert!(output.path().join("ds2/ds2_summary.json").is_file());
    assert!(output.path().join("run_report.json").is_file());
}

#[test]
fn test_run_segmentation_failure_is_partial() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    dataset(input.path(), "ds1", VALID);
    dataset(input.path(), "ds2", NO_NUCLEUS);

    cellrun()
        .env("DEEPCELL_ACCESS_TOKEN", "token")
        .arg("run")
        .arg(input.path())
        .arg(output.path())
        .args(["--annotation-url", "http://127.0.0.1:9"])
        .args(["--segment-command", "cellsam-segment-does-not-exist"])
        .assert()
        .code(2)
        .stdout(predicate::str::contains("SEG_FAILED=1"))
        .stdout(predicate::str::contains("SKIPPED=1"));

    let summary = std::fs::read_to_string(output.path().join("ds1/ds1_summary.json")).unwrap();
    assert!(summary.contains("SEG_FAILED"));
    assert!(!output.path().join("ds1/ds1_segmented.tiff").exists());
}

#[test]
fn test_run_partitioned_report_name() {
    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    dataset(input.path(), "a", NO_NUCLEUS);
    dataset(input.path(), "b", NO_NUCLEUS);

    cellrun()
        .env("DEEPCELL_ACCESS_TOKEN", "token")
        .env("CELLRUN_WORKER", "1/2")
        .arg("run")
        .arg(input.path())
        .arg(output.path())
        .args(["--annotation-url", "http://127.0.0.1:9"])
        .assert()
        .code(0);

    assert!(output.path().join("run_report.worker-1-of-2.json").is_file());
    assert!(output.path().join("b/b_summary.json").is_file());
    assert!(!output.path().join("a").exists());
}

#[test]
fn test_discover_lists_verdicts() {
    let input = tempfile::tempdir().unwrap();
    dataset(input.path(), "ds1", VALID);
    dataset(input.path(), "ds2", NO_NUCLEUS);
    std::fs::create_dir_all(input.path().join("ds3")).unwrap();

    cellrun()
        .arg("discover")
        .arg(input.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("ds1\tPROCEED\tnucleus=0"))
        .stdout(predicate::str::contains("ds2\tSKIP\tmissing nucleus channel"))
        .stdout(predicate::str::contains("ds3").not());
}

#[test]
fn test_prepare_empty_raw_root() {
    let raw = tempfile::tempdir().unwrap();
    let input = tempfile::tempdir().unwrap();

    cellrun()
        .arg("prepare")
        .arg(raw.path())
        .arg(input.path().join("input-data"))
        .assert()
        .success();

    assert!(input.path().join("input-data").is_dir());
}

#[cfg(unix)]
#[test]
fn test_run_interrupt_finishes_current_dataset() {
    use std::os::unix::process::CommandExt;
    use std::process::Stdio;
    use std::time::Duration;

    use cellrun_core::im::LabelMask;

    let input = tempfile::tempdir().unwrap();
    let output = tempfile::tempdir().unwrap();
    let fixtures = tempfile::tempdir().unwrap();
    dataset(input.path(), "a", VALID);
    dataset(input.path(), "b", VALID);

    let mask = fixtures.path().join("mask.tiff");
    LabelMask::new(3, 1, vec![1, 0, 2]).unwrap().save(&mask).unwrap();

    // Slow segmentation that copies the fixture mask to the last argument
    let script = format!(
        "sleep 2; for last; do :; done; cp '{}' \"$last\"",
        mask.display()
    );

    // Own process group so the interrupt below mimics a terminal Ctrl-C
    let mut child = std::process::Command::new(assert_cmd::cargo::cargo_bin("cellrun"))
        .env("DEEPCELL_ACCESS_TOKEN", "token")
        .env_remove("CELLRUN_WORKER")
        .env_remove("CELLRUN_DEVICE")
        .arg("run")
        .arg(input.path())
        .arg(output.path())
        .args(["--annotation-url", "http://127.0.0.1:9", "--max-attempts", "1"])
        .args(["--segment-command", "sh"])
        .args(["--segment-arg", "-c", "--segment-arg", &script, "--segment-arg", "cellsam"])
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .process_group(0)
        .spawn()
        .unwrap();

    std::thread::sleep(Duration::from_millis(1000));

    let signalled = std::process::Command::new("sh")
        .arg("-c")
        .arg(format!("env kill -INT -- -{}", child.id()))
        .status()
        .unwrap();
    assert!(signalled.success());

    let status = child.wait().unwrap();
    assert_eq!(status.code(), Some(2));

    let summary = std::fs::read_to_string(output.path().join("a/a_summary.json")).unwrap();
    assert!(!summary.contains("SEG_FAILED"));
    assert!(output.path().join("a/a_segmented.tiff").is_file());
    assert!(!output.path().join("b").exists());

    let report = std::fs::read_to_string(output.path().join("run_report.json")).unwrap();
    assert!(report.contains("stopped"));
}
