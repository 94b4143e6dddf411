use std::io::Write;
use std::process::{Command, Output, Stdio};

use serde_json::Value;

fn paramrun(args: &[&str], input: &str) -> Output {
    let mut child = Command::new(env!("CARGO_BIN_EXE_paramrun"))
        .args(args)
        .env_remove("PARAMRUN__PARALLELISM")
        .env_remove("PARAMRUN__DEBUG")
        .env_remove("PARAMRUN_LOG")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .expect("failed to start paramrun");

    child
        .stdin
        .take()
        .expect("stdin is piped")
        .write_all(input.as_bytes())
        .expect("failed to write input");

    child.wait_with_output().expect("failed to wait for paramrun")
}

fn results(output: &Output) -> Vec<Value> {
    String::from_utf8_lossy(&output.stdout)
        .lines()
        .map(|line| serde_json::from_str(line).expect("each line is a JSON object"))
        .collect()
}

#[test]
fn echo_one_record() {
    let output = paramrun(&["-p", "1", "echo", "{{name}}"], r#"{"name": "alice"}"#);
    assert!(output.status.success());

    let results = results(&output);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["outcome"], "SUCCESS");
    assert_eq!(results[0]["returncode"], 0);
    assert_eq!(results[0]["stdout"], "alice\n");
}

#[test]
fn zero_parallelism_is_rejected() {
    let output = paramrun(&["-p", "0", "echo", "{{name}}"], r#"{"name": "alice"}"#);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    assert!(String::from_utf8_lossy(&output.stderr).contains("at least one worker required"));
}

#[test]
fn bad_template_is_rejected() {
    let output = paramrun(&["echo", "{{name"], r#"{"name": "alice"}"#);
    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn flags_after_the_command_belong_to_it() {
    let output = paramrun(
        &["-p", "2", "sh", "-c", "echo {{n}}; exit {{n}}"],
        "{\"n\": 1}\n{\"n\": 2}\n",
    );
    assert!(output.status.success());

    let mut codes: Vec<i64> = results(&output)
        .iter()
        .map(|r| r["returncode"].as_i64().unwrap())
        .collect();
    codes.sort();
    assert_eq!(codes, vec![1, 2]);
}

#[test]
fn debug_adds_worker_and_program() {
    let output = paramrun(&["-d", "-p", "3", "echo", "{{.}}"], "1 2 3");
    assert!(output.status.success());

    let results = results(&output);
    assert_eq!(results.len(), 3);
    for result in results {
        assert!(result["worker-id"].as_u64().unwrap() < 3);
        assert!(result["prog"].as_str().unwrap().ends_with("echo"));
    }
}

#[test]
fn malformed_input_is_reported_in_band() {
    let output = paramrun(&["echo", "{{x}}"], r#"{"x": 1} {"x": oops} {"x": 3}"#);
    assert!(output.status.success());

    let results = results(&output);
    assert_eq!(results.len(), 2);
    let failures: Vec<&Value> = results.iter().filter(|r| r["outcome"] == "FAILURE").collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0]["returncode"], -4242);
}

#[test]
fn missing_config_file_is_reported() {
    let output = paramrun(&["-c", "/nonexistent/paramrun.toml", "echo", "{{x}}"], r#"{"x": 1}"#);
    assert!(output.status.success());
    assert_eq!(results(&output).len(), 1);

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Configuration file not found: /nonexistent/paramrun.toml"));
}

#[test]
fn quiet_log_level_hides_config_warning() {
    let output = paramrun(&["-l", "error", "-c", "/nonexistent/paramrun.toml", "echo", "x"], "1");
    assert!(output.status.success());
    assert!(!String::from_utf8_lossy(&output.stderr).contains("Configuration file not found"));
}
