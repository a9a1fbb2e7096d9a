mod common;

use common::{PlayProcess, TestStore, fixture_path, run_command};

// ============================================================================
// version
// ============================================================================

#[test]
fn version_human() {
    let output = run_command(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("escaperoom"), "{stdout}");
    assert!(stdout.contains("format-lock"), "{stdout}");
}

#[test]
fn version_json() {
    let output = run_command(&["version", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("version JSON should be valid");
    assert_eq!(parsed["name"], "escaperoom");
    assert_eq!(parsed["scenarios"][1], "debug-crypt");
}

// ============================================================================
// scenarios
// ============================================================================

#[test]
fn scenarios_list_json() {
    let output = run_command(&["scenarios", "list", "--format", "json"]);
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let entries = parsed.as_array().unwrap();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0]["id"], "format-lock");
    assert_eq!(entries[0]["stages"], 3);
    assert_eq!(entries[1]["totalSeconds"], 60 + 180 + 180);
}

#[test]
fn scenarios_show_prints_yaml() {
    let output = run_command(&["scenarios", "show", "debug-crypt"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("id: debug-crypt"), "{stdout}");
}

#[test]
fn scenarios_show_unknown_suggests() {
    let output = run_command(&["scenarios", "show", "debug-cryp"]);
    assert_eq!(output.status.code(), Some(64));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Did you mean 'debug-crypt'?"), "{stderr}");
}

#[test]
fn validate_valid_file() {
    let path = fixture_path("quick_quiz.yaml");
    let output = run_command(&["scenarios", "validate", path.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("(quick-quiz)"));
}

#[test]
fn validate_reports_every_error() {
    let path = fixture_path("broken.yaml");
    let output = run_command(&[
        "scenarios",
        "validate",
        "--format",
        "json",
        path.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let report = &parsed[0];
    assert_eq!(report["valid"], false);
    let paths: Vec<&str> = report["issues"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|i| i["path"].as_str())
        .collect();
    assert!(paths.contains(&"stages[0].time_limit_seconds"), "{paths:?}");
    assert!(paths.contains(&"stages[0].validator.forms[0][0]"), "{paths:?}");
    assert!(paths.contains(&"stages[0].icon_choice.correct_id"), "{paths:?}");
}

#[test]
fn validate_strict_fails_on_warnings() {
    let path = fixture_path("no_hint.yaml");
    let lenient = run_command(&["scenarios", "validate", path.to_str().unwrap()]);
    assert!(lenient.status.success());

    let strict = run_command(&["scenarios", "validate", "--strict", path.to_str().unwrap()]);
    assert_eq!(strict.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&strict.stdout).contains("Stage has no hint"));
}

#[test]
fn validate_missing_file() {
    let output = run_command(&[
        "scenarios",
        "validate",
        "/tmp/escaperoom_no_such_scenario.yaml",
    ]);
    assert_eq!(output.status.code(), Some(2));
}

// ============================================================================
// prefs
// ============================================================================

#[test]
fn prefs_set_then_show() {
    let dir = tempfile::tempdir().unwrap();
    let prefs = dir.path().join("prefs.json");
    let prefs = prefs.to_str().unwrap();

    let set = run_command(&["prefs", "--prefs", prefs, "set", "--theme", "light"]);
    assert!(set.status.success(), "{}", String::from_utf8_lossy(&set.stderr));

    let show = run_command(&["prefs", "--prefs", prefs, "show", "--format", "json"]);
    let parsed: serde_json::Value = serde_json::from_slice(&show.stdout).unwrap();
    assert_eq!(parsed["theme"], "light");
}

#[test]
fn prefs_set_requires_a_value() {
    let output = run_command(&["prefs", "set"]);
    assert_eq!(output.status.code(), Some(64));
}

// ============================================================================
// runs
// ============================================================================

#[test]
fn runs_require_store_url() {
    let output = run_command(&["runs", "list", "--scenario", "format-lock"]);
    assert_eq!(output.status.code(), Some(64));
}

#[tokio::test(flavor = "multi_thread")]
async fn runs_list_and_rename_against_store() {
    let server = TestStore::start().await;
    let url = server.url();

    let mut play = PlayProcess::spawn(&["--scenario", "debug-crypt", "--store-url", &url]);
    play.expect_line("Stage 1").await;
    play.send("icon debug").await;
    play.expect_line("Debugger unlocked").await;
    play.send("next").await;
    play.send(r#"answer {"a":1}"#).await;
    play.expect_line("Crypt seal broken").await;
    play.send("next").await;
    play.send(r#"answer parseInt("  042  ".trim())"#).await;
    play.expect_line("All stages cleared").await;
    play.send("save \"cli run\"").await;
    play.expect_line("Run saved").await;
    play.send("quit").await;
    assert!(play.finish().await.success());

    let url_for_cli = url.clone();
    let output = tokio::task::spawn_blocking(move || {
        run_command(&[
            "runs",
            "list",
            "--scenario",
            "debug-crypt",
            "--format",
            "json",
            "--store-url",
            &url_for_cli,
        ])
    })
    .await
    .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let runs: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let runs = runs.as_array().unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["displayName"], "cli run");
    let answers: Vec<&str> = runs[0]["stageAnswers"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|a| a["answer"].as_str())
        .collect();
    assert_eq!(answers, vec!["debug", r#"{"a":1}"#, r#"parseInt("  042  ".trim())"#]);

    let id = runs[0]["id"].as_str().unwrap().to_string();
    let (show_id, show_url) = (id.clone(), url.clone());
    let output = tokio::task::spawn_blocking(move || {
        run_command(&["runs", "show", &show_id, "--store-url", &show_url])
    })
    .await
    .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("cli run"), "{stdout}");
    assert!(stdout.contains("Debug Crypt (Medium) (debug-crypt)"), "{stdout}");

    let all_url = url.clone();
    let output = tokio::task::spawn_blocking(move || {
        run_command(&["runs", "list", "--format", "json", "--store-url", &all_url])
    })
    .await
    .unwrap();
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));
    let all: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(all.as_array().unwrap().len(), 1);

    let missing_url = url.clone();
    let output = tokio::task::spawn_blocking(move || {
        run_command(&["runs", "show", "no-such-run", "--store-url", &missing_url])
    })
    .await
    .unwrap();
    assert_eq!(output.status.code(), Some(4));

    let output = tokio::task::spawn_blocking(move || {
        run_command(&["runs", "rename", &id, "   ", "--store-url", &url])
    })
    .await
    .unwrap();
    assert_eq!(output.status.code(), Some(4));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Name cannot be empty."));
}

// ============================================================================
// play
// ============================================================================

#[tokio::test(flavor = "multi_thread")]
async fn play_gates_icon_stage() {
    let mut play = PlayProcess::spawn(&["--scenario", "debug-crypt"]);
    play.expect_line("Stage 1").await;

    play.send("answer debug").await;
    play.expect_line("Pick the correct icon first.").await;
    play.send("icon git").await;
    play.expect_line("Wrong icon").await;
    play.send("next").await;
    play.expect_line("Solve this stage first.").await;
    play.send("hint").await;
    play.expect_line("Hint: Think: debugging").await;
    play.send("quit").await;
    assert!(play.finish().await.success());
}

#[tokio::test(flavor = "multi_thread")]
async fn play_times_out() {
    let mut play = PlayProcess::spawn(&["--scenario", "format-lock"]);
    play.expect_line("Stage 1").await;
    play.send("apply 1s").await;
    play.expect_line("Timer set to 00:01").await;
    play.send("start").await;
    play.expect_line("Time's up!").await;
    play.send("answer function add(a,b){return a+b}").await;
    play.send("reset").await;
    play.expect_line("Stage 1").await;
    play.send("answer function add(a,b){return a+b}").await;
    play.expect_line("The vault accepts it").await;
    assert!(play.finish().await.success());
}

#[tokio::test(flavor = "multi_thread")]
async fn play_loads_extra_scenario_files() {
    let path = fixture_path("quick_quiz.yaml");
    let mut play = PlayProcess::spawn(&[
        "--scenario",
        "quick-quiz",
        "--scenario-file",
        path.to_str().unwrap(),
    ]);
    play.expect_line("Quick Quiz").await;
    play.send("answer  RUST ").await;
    play.expect_line("Correct.").await;
    play.send("next").await;
    play.send("answer 1.2.3").await;
    play.expect_line("All stages cleared").await;
    assert!(play.finish().await.success());
}

#[test]
fn play_unknown_scenario_exits_with_engine_error() {
    let output = run_command(&["play", "--scenario", "format-lok"]);
    assert_eq!(output.status.code(), Some(5));
    assert!(String::from_utf8_lossy(&output.stderr).contains("did you mean 'format-lock'"));
}
