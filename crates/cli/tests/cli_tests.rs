//! CLI integration tests

use serde_json::Value;
use std::process::{Command, Output};
use tempfile::TempDir;

/// Run the binary with an isolated home directory and no PGTUNE_* settings
fn pgtune(home: &TempDir, args: &[&str]) -> Output {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_pgtune"));
    cmd.args(args).env("HOME", home.path()).env_remove("RUST_LOG");
    for (key, _) in std::env::vars() {
        if key.starts_with("PGTUNE_") {
            cmd.env_remove(key);
        }
    }
    cmd.output().expect("Failed to execute command")
}

fn stdout_json(output: &Output) -> Value {
    serde_json::from_slice(&output.stdout).expect("stdout should be JSON")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let home = TempDir::new().unwrap();
    let output = pgtune(&home, &["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("PostgreSQL"), "Should describe the tool");
    assert!(stdout.contains("detect"), "Should show detect command");
    assert!(stdout.contains("tune"), "Should show tune command");
    assert!(stdout.contains("schema"), "Should show schema command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let home = TempDir::new().unwrap();
    let output = pgtune(&home, &["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("pgtune"), "Should show binary name");
}

#[test]
fn test_tune_web_16gb_json() {
    let home = TempDir::new().unwrap();
    let output = pgtune(
        &home,
        &[
            "tune",
            "--memory",
            "16GB",
            "--cpus",
            "8",
            "--os",
            "linux",
            "--disk-type",
            "ssd",
            "--pg-version",
            "16",
            "--workload",
            "web",
            "--format",
            "json",
        ],
    );
    assert!(
        output.status.success(),
        "tune failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let params = stdout_json(&output);
    assert_eq!(params["shared_buffers"], 4_294_967_296u64);
    assert_eq!(params["effective_cache_size"], 12_884_901_888u64);
    assert_eq!(params["maintenance_work_mem"], 1_073_741_824u64);
    assert_eq!(params["wal_buffers"], 16_777_216u64);
    assert_eq!(params["max_connections"], 200);
    assert_eq!(params["max_worker_processes"], 8);
    assert_eq!(params["max_parallel_workers_per_gather"], 4);
    assert_eq!(params["wal_level"], "replica");
    assert_eq!(params["huge_pages"], "off");
    assert_eq!(params["warnings"].as_array().map(Vec::len), Some(0));
}

#[test]
fn test_tune_overrides_and_cap() {
    let home = TempDir::new().unwrap();
    let output = pgtune(
        &home,
        &[
            "tune",
            "--memory",
            "8GB",
            "--cpus",
            "4",
            "--workload",
            "oltp",
            "--set",
            "shared_buffers=2GB",
            "--cap-connections",
            "150",
            "--format",
            "json",
        ],
    );
    assert!(
        output.status.success(),
        "tune failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let params = stdout_json(&output);
    assert_eq!(params["shared_buffers"], 2_147_483_648u64);
    assert_eq!(params["max_connections"], 150);

    let warnings: Vec<&str> = params["warnings"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(Value::as_str)
        .collect();
    assert!(warnings.iter().any(|w| w.contains("lowered from 300 to 150")));
    assert!(warnings.iter().any(|w| w.contains("shared_buffers pinned")));
}

#[test]
fn test_capped_run_matches_explicit_connection_count() {
    let home = TempDir::new().unwrap();
    let base = [
        "tune", "--memory", "8GB", "--cpus", "4", "--os", "linux", "--disk-type", "ssd",
        "--pg-version", "16", "--workload", "oltp", "--format", "json",
    ];

    let capped = pgtune(&home, &[&base[..], &["--cap-connections", "150"]].concat());
    let direct = pgtune(&home, &[&base[..], &["--max-connections", "150"]].concat());
    assert!(capped.status.success());
    assert!(direct.status.success());

    let capped = stdout_json(&capped);
    let direct = stdout_json(&direct);
    assert_eq!(capped["max_connections"], 150);
    assert_eq!(capped["work_mem"], direct["work_mem"]);
}

#[test]
fn test_tune_reads_config_file() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("pgtune.toml");
    std::fs::write(
        &path,
        "memory = \"64GB\"\ncpus = 16\nworkload = \"dw\"\ndisk_type = \"hdd\"\n",
    )
    .unwrap();

    let output = pgtune(
        &home,
        &["tune", "--config", path.to_str().unwrap(), "--format", "json"],
    );
    assert!(
        output.status.success(),
        "tune failed: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let params = stdout_json(&output);
    assert_eq!(params["default_statistics_target"], 500);
    assert_eq!(params["max_connections"], 40);
    assert_eq!(params["maintenance_work_mem"], 2_147_483_648u64);
    assert_eq!(params["huge_pages"], "try");
}

#[test]
fn test_flags_override_config_file() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("pgtune.toml");
    std::fs::write(&path, "memory = \"64GB\"\ncpus = 16\nworkload = \"dw\"\n").unwrap();

    let output = pgtune(
        &home,
        &[
            "tune",
            "--config",
            path.to_str().unwrap(),
            "--workload",
            "desktop",
            "--format",
            "json",
        ],
    );
    assert!(output.status.success());

    let params = stdout_json(&output);
    assert_eq!(params["max_connections"], 20);
    assert_eq!(params["wal_level"], "minimal");
}

#[test]
fn test_tune_table_output() {
    let home = TempDir::new().unwrap();
    let output = pgtune(&home, &["tune", "--memory", "128MB", "--cpus", "2"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success());
    assert!(stdout.contains("shared_buffers"));
    assert!(stdout.contains("32MB"));
    assert!(stdout.contains("Low memory"));
}

#[test]
fn test_invalid_workload_fails() {
    let home = TempDir::new().unwrap();
    let output = pgtune(
        &home,
        &["tune", "--memory", "4GB", "--cpus", "2", "--workload", "analytics"],
    );
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success(), "Unknown workload should fail");
    assert!(stderr.contains("analytics"), "Should name the bad value");
}

#[test]
fn test_zero_max_connections_fails() {
    let home = TempDir::new().unwrap();
    let output = pgtune(
        &home,
        &["tune", "--memory", "4GB", "--cpus", "2", "--max-connections", "0"],
    );
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(!output.status.success());
    assert!(stderr.contains("max_connections"));
}

#[test]
fn test_unknown_override_fails() {
    let home = TempDir::new().unwrap();
    let output = pgtune(
        &home,
        &["tune", "--memory", "4GB", "--cpus", "2", "--set", "fsync=off"],
    );
    assert!(!output.status.success());
}

#[test]
fn test_schema_json() {
    let home = TempDir::new().unwrap();
    let output = pgtune(&home, &["schema", "--format", "json"]);
    assert!(output.status.success());

    let schema = stdout_json(&output);
    let properties = schema["properties"].as_object().expect("properties");
    assert!(properties.contains_key("shared_buffers"));
    assert!(properties.contains_key("max_parallel_maintenance_workers"));
    assert!(properties.contains_key("warnings"));
}

#[test]
fn test_detect_json() {
    let home = TempDir::new().unwrap();
    let output = pgtune(&home, &["detect", "--format", "json"]);
    assert!(output.status.success());

    let snapshot = stdout_json(&output);
    assert!(snapshot["host"]["cpus"].as_u64().unwrap_or(0) >= 1);
    assert!(snapshot["host"]["memory"].as_u64().unwrap_or(0) > 0);
    assert!(snapshot["in_container"].is_boolean());
}

#[test]
fn test_metrics_file_is_written() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("pgtune.prom");
    let output = pgtune(
        &home,
        &[
            "tune",
            "--memory",
            "4GB",
            "--cpus",
            "2",
            "--metrics-file",
            path.to_str().unwrap(),
        ],
    );
    assert!(output.status.success());

    let text = std::fs::read_to_string(&path).unwrap();
    assert!(text.contains("pgtune_tuning_warnings"));
}
