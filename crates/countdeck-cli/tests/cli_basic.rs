//! Basic CLI E2E tests.
//!
//! Each test runs the built binary against its own temporary data directory.

use std::process::Command;

use tempfile::TempDir;

struct Sandbox {
    dir: TempDir,
}

impl Sandbox {
    fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("Failed to create temp dir"),
        }
    }

    /// Run a CLI command and return (stdout, stderr, exit code).
    fn run(&self, args: &[&str]) -> (String, String, i32) {
        let output = Command::new(env!("CARGO_BIN_EXE_countdeck"))
            .args(args)
            .env("COUNTDECK_DATA_DIR", self.dir.path())
            .env_remove("RUST_LOG")
            .output()
            .expect("Failed to execute CLI command");

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();
        let code = output.status.code().unwrap_or(-1);
        (stdout, stderr, code)
    }

    fn ok(&self, args: &[&str]) -> String {
        let (stdout, stderr, code) = self.run(args);
        assert_eq!(code, 0, "CLI command {args:?} failed: {stderr}");
        stdout
    }

    fn json(&self, args: &[&str]) -> serde_json::Value {
        serde_json::from_str(&self.ok(args)).expect("Failed to parse JSON output")
    }

    /// Add a timer and return its id.
    fn add(&self, name: &str, duration: u64, category: &str, extra: &[&str]) -> String {
        let duration = duration.to_string();
        let mut args = vec![
            "timer",
            "add",
            name,
            "--duration",
            duration.as_str(),
            "--category",
            category,
        ];
        args.extend_from_slice(extra);
        created_id(&self.ok(&args))
    }

    /// Add a timer relying on the configured defaults.
    fn add_default(&self, name: &str) -> String {
        created_id(&self.ok(&["timer", "add", name, "--duration", "10"]))
    }
}

fn created_id(stdout: &str) -> String {
    stdout
        .lines()
        .next()
        .and_then(|line| line.strip_prefix("Timer created: "))
        .expect("unexpected add output")
        .to_string()
}

#[test]
fn test_timer_add_and_list() {
    let sb = Sandbox::new();
    let id = sb.add("Plank", 60, "workout", &["--halfway-alert"]);

    let timers = sb.json(&["timer", "list", "--json"]);
    let timers = timers.as_array().unwrap();
    assert_eq!(timers.len(), 1);
    assert_eq!(timers[0]["id"], id.as_str());
    assert_eq!(timers[0]["name"], "Plank");
    assert_eq!(timers[0]["category"], "Workout");
    assert_eq!(timers[0]["status"], "Paused");
    assert_eq!(timers[0]["remainingTime"], 60);
    assert_eq!(timers[0]["halfwayAlertEnabled"], true);

    let plain = sb.ok(&["timer", "list"]);
    assert!(plain.contains("Plank"));
    assert!(plain.contains("01:00"));
}

#[test]
fn test_timer_add_rejects_bad_input() {
    let sb = Sandbox::new();
    let (_, stderr, code) = sb.run(&["timer", "add", "x", "--duration", "0"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("at least 1 second"));

    let (_, _, code) = sb.run(&["timer", "add", "   ", "--duration", "10"]);
    assert_ne!(code, 0);

    let (_, _, code) = sb.run(&["timer", "add", "x", "--duration", "10", "--category", "nap"]);
    assert_ne!(code, 0);

    let timers = sb.json(&["timer", "list", "--json"]);
    assert!(timers.as_array().unwrap().is_empty());
}

#[test]
fn test_timer_start_pause_reset() {
    let sb = Sandbox::new();
    let id = sb.add("Read", 30, "study", &[]);

    assert!(sb.ok(&["timer", "start", &id]).contains("Timer started"));
    assert!(sb.ok(&["timer", "start", &id]).contains("already running"));
    assert_eq!(sb.json(&["timer", "show", &id])["status"], "Running");

    assert!(sb.ok(&["timer", "pause", &id]).contains("Timer paused"));
    assert_eq!(sb.json(&["timer", "show", &id])["status"], "Paused");

    sb.ok(&["timer", "reset", &id]);
    let timer = sb.json(&["timer", "show", &id]);
    assert_eq!(timer["remainingTime"], 30);
    assert_eq!(timer["status"], "Paused");
}

#[test]
fn test_unknown_timer_fails() {
    let sb = Sandbox::new();
    let (_, stderr, code) = sb.run(&["timer", "start", "does-not-exist"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("not found"));
}

#[test]
fn test_category_list_and_bulk() {
    let sb = Sandbox::new();
    let a = sb.add("Squats", 20, "Workout", &[]);
    let b = sb.add("Lunges", 20, "Workout", &[]);
    let c = sb.add("Flashcards", 20, "Study", &[]);

    let out = sb.ok(&["category", "start-all", "workout"]);
    assert!(out.contains("Started 2 of 2 Workout timers"));
    assert_eq!(sb.json(&["timer", "show", &a])["status"], "Running");
    assert_eq!(sb.json(&["timer", "show", &b])["status"], "Running");
    assert_eq!(sb.json(&["timer", "show", &c])["status"], "Paused");

    let groups = sb.json(&["category", "list", "--json"]);
    let keys: Vec<&str> = groups.as_object().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys.len(), 4);
    assert_eq!(groups["Workout"].as_array().unwrap().len(), 2);
    assert_eq!(groups["Break"].as_array().unwrap().len(), 0);

    sb.ok(&["category", "pause-all", "Workout"]);
    assert_eq!(sb.json(&["timer", "show", &a])["status"], "Paused");
}

#[test]
fn test_run_completes_timer_and_records_history() {
    let sb = Sandbox::new();
    let id = sb.add("Sprint", 2, "Workout", &["--halfway-alert"]);
    sb.ok(&["timer", "start", &id]);

    let out = sb.ok(&["run", "--ticks", "3", "--interval-ms", "10", "--json"]);
    let events: Vec<serde_json::Value> = out
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0]["type"], "HalfwayReached");
    assert_eq!(events[1]["type"], "TimerCompleted");

    let timer = sb.json(&["timer", "show", &id]);
    assert_eq!(timer["status"], "Completed");
    assert_eq!(timer["remainingTime"], 0);

    let history = sb.json(&["history", "list", "--json"]);
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["name"], "Sprint");
    assert_eq!(history[0]["timerId"], id.as_str());

    let (_, stderr, code) = sb.run(&["timer", "start", &id]);
    assert_ne!(code, 0);
    assert!(stderr.contains("completed"));
}

#[test]
fn test_run_ephemeral_leaves_store_untouched() {
    let sb = Sandbox::new();
    let id = sb.add("Dry run", 5, "Break", &[]);
    sb.ok(&["timer", "start", &id]);

    sb.ok(&["run", "--ticks", "2", "--interval-ms", "10", "--ephemeral"]);
    assert_eq!(sb.json(&["timer", "show", &id])["remainingTime"], 5);
}

#[test]
fn test_clear_requires_confirmation() {
    let sb = Sandbox::new();
    sb.add("Keep", 10, "Other", &[]);

    let (_, _, code) = sb.run(&["clear"]);
    assert_ne!(code, 0);
    assert_eq!(sb.json(&["timer", "list", "--json"]).as_array().unwrap().len(), 1);

    sb.ok(&["clear", "--yes"]);
    assert!(sb.json(&["timer", "list", "--json"]).as_array().unwrap().is_empty());
    assert!(sb.json(&["history", "export"]).as_array().unwrap().is_empty());
}

#[test]
fn test_config_get_set_reset() {
    let sb = Sandbox::new();
    assert_eq!(sb.ok(&["config", "get", "scheduler.tick_interval_ms"]).trim(), "1000");

    sb.ok(&["config", "set", "timers.default_category", "Study"]);
    let id = sb.add_default("Default category");
    assert_eq!(sb.json(&["timer", "show", &id])["category"], "Study");

    let (_, _, code) = sb.run(&["config", "get", "no.such.key"]);
    assert_ne!(code, 0);

    sb.ok(&["config", "reset"]);
    let config = sb.json(&["config", "list"]);
    assert_eq!(config["timers"]["default_category"], "Workout");
}

#[test]
fn test_completions() {
    let sb = Sandbox::new();
    assert!(sb.ok(&["completions", "bash"]).contains("countdeck"));
}
