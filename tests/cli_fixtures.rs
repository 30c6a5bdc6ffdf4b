use std::path::PathBuf;
use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_espresso_cli"))
}

fn fixture_file(name: &str) -> String {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("fixtures")
        .join(name)
        .to_string_lossy()
        .into_owned()
}

fn temp_path(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("espresso_cli_{}_{}", std::process::id(), name))
}

#[test]
fn simulate_fixture_succeeds() {
    let output = cli()
        .args(["simulate", "--fixture", "typical_shot"])
        .output()
        .expect("failed to run espresso_cli simulate");
    assert!(
        output.status.success(),
        "CLI exited with {:?}: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let json: Value = serde_json::from_str(stdout.trim()).expect("replay report JSON payload");
    assert_eq!(json["fixture"], "typical_shot");
    assert_eq!(json["shot_count"], 1);
    assert!(json.get("events").is_none());
}

#[test]
fn simulate_fixture_detects_mismatch() {
    let output = cli()
        .args([
            "simulate",
            "--fixture",
            "typical_shot",
            "--expect",
            &fixture_file("typical_shot_incorrect.expect.json"),
        ])
        .output()
        .expect("failed to run espresso_cli simulate");
    assert_eq!(output.status.code(), Some(2));

    let stderr = String::from_utf8(output.stderr).expect("stderr UTF-8");
    // Log lines share stderr; the pretty-printed diff starts at a bare `{`.
    let lines: Vec<&str> = stderr.lines().collect();
    let start = lines
        .iter()
        .position(|line| *line == "{")
        .expect("diff JSON on stderr");
    let diff: Value = serde_json::from_str(&lines[start..].join("\n")).expect("diff JSON payload");
    assert_eq!(diff["failures"][0]["index"], 0);
    assert_eq!(diff["failures"][0]["expected"]["duration_ms"], 20000);
}

#[test]
fn simulate_unknown_fixture_fails() {
    let output = cli()
        .args(["simulate", "--fixture", "no_such_fixture"])
        .output()
        .expect("failed to run espresso_cli simulate");
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn stream_emits_json_lines() {
    let output = cli()
        .args(["stream", "--fixture", "manual_override"])
        .output()
        .expect("failed to run espresso_cli stream");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    let kinds: Vec<String> = stdout
        .lines()
        .map(|line| {
            let json: Value = serde_json::from_str(line).expect("event JSON line");
            json["event"]["type"].as_str().unwrap_or_default().to_string()
        })
        .collect();
    assert_eq!(kinds, vec!["subscribed", "shot_started", "shot_finished"]);
}

#[test]
fn dump_fixtures_lists_shipped_scripts() {
    let output = cli()
        .arg("dump-fixtures")
        .output()
        .expect("failed to run espresso_cli dump-fixtures");
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).expect("stdout UTF-8");
    for name in [
        "background_mid_shot",
        "calibration_then_shot",
        "manual_override",
        "pre_infusion_shot",
        "typical_shot",
    ] {
        assert!(stdout.contains(name), "missing {name} in {stdout}");
    }
    assert!(!stdout.contains("typical_shot_incorrect"));
}

#[test]
fn settings_command_migrates_legacy_file() {
    let path = temp_path("legacy_settings.json");
    std::fs::write(
        &path,
        r#"{"calibrationSensitivity": "LOW", "calibrationBaseline": "0.08"}"#,
    )
    .expect("write legacy settings");

    let output = cli()
        .args(["settings", "--file"])
        .arg(&path)
        .args(["--set", "hysteresisLevel=300"])
        .output()
        .expect("failed to run espresso_cli settings");
    assert!(output.status.success());

    let json: Value = serde_json::from_slice(&output.stdout).expect("settings JSON payload");
    assert_eq!(json["version_before"], 0);
    assert_eq!(json["version_after"], 1);
    assert_eq!(json["settings"]["sensitivity"], 4);
    assert_eq!(json["settings"]["hysteresis"], 95);

    let _ = std::fs::remove_file(&path);
}
