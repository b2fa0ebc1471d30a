#![cfg(unix)]

use std::collections::BTreeMap;
use std::ffi::OsStr;
use std::fs;
use std::os::unix::ffi::OsStrExt;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use bunker_convert_sdk::{
    Client, ClientConfig, DevicePolicy, ExtraArgs, LintOptions, RunFlags, RunOptions, SdkError,
};
use tempfile::TempDir;

const FAKE_SCRIPT: &str = r#"#!/bin/sh
if [ -n "${FAKE_EXISTS+x}" ]; then
  if [ -e "$2" ]; then echo found; else echo missing; fi
  exit 0
fi
if [ -n "${FAKE_STDIN+x}" ]; then
  cat
  exit 0
fi
if [ -n "${FAKE_STDOUT+x}" ]; then
  printf '%s' "$FAKE_STDOUT"
else
  for arg in "$@"; do printf '%s\n' "$arg"; done
fi
if [ -n "${FAKE_STDERR+x}" ]; then
  printf '%s' "$FAKE_STDERR" >&2
fi
exit "${FAKE_EXIT:-0}"
"#;

// Written once per test process so no thread forks while the script is open for writing.
fn fake_binary() -> &'static Path {
    static BIN: OnceLock<(TempDir, PathBuf)> = OnceLock::new();
    let (_, path) = BIN.get_or_init(|| {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("bunker-convert");
        fs::write(&path, FAKE_SCRIPT).expect("write fake binary");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod");
        (dir, path)
    });
    path
}

fn client(env: &[(&str, &str)]) -> Client {
    let env: BTreeMap<String, String> = env
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    Client::new(ClientConfig {
        binary: fake_binary().to_string_lossy().into_owned(),
        env,
        ..ClientConfig::default()
    })
}

fn lines(stdout: &str) -> Vec<&str> {
    stdout.lines().collect()
}

#[test]
fn run_recipe_appends_prefixed_pairs() {
    let client = client(&[]);
    let options = RunOptions::new().extra_args(ExtraArgs::pairs([("format", "json")]));
    let result = client.run_recipe("r.yml", &options).expect("run succeeds");

    assert_eq!(lines(&result.stdout), vec!["run", "r.yml", "--format", "json"]);
    assert_eq!(result.args[0], fake_binary().to_string_lossy());
    assert_eq!(&result.args[1..], &["run", "r.yml", "--format", "json"]);
    assert!(result.success());
}

#[test]
fn run_recipe_keeps_dashed_keys() {
    let client = client(&[]);
    let options = RunOptions::new().extra_args(ExtraArgs::pairs([("-v", "1")]));
    let result = client.run_recipe("r.yml", &options).unwrap();
    assert_eq!(lines(&result.stdout), vec!["run", "r.yml", "-v", "1"]);
}

#[test]
fn run_flags_precede_extra_tokens() {
    let client = client(&[]);
    let options = RunOptions::new()
        .flags(RunFlags {
            dry_run: true,
            device_policy: Some(DevicePolicy::CpuOnly),
            ..RunFlags::default()
        })
        .extra_args(ExtraArgs::tokens(["--quality", "90"]));
    let result = client.run_recipe("recipes/web.yaml", &options).unwrap();
    assert_eq!(
        lines(&result.stdout),
        vec![
            "run",
            "recipes/web.yaml",
            "--dry-run",
            "--device-policy",
            "cpu-only",
            "--quality",
            "90"
        ]
    );
}

#[test]
fn nonzero_exit_with_check_reports_trimmed_stderr() {
    let client = client(&[("FAKE_EXIT", "1"), ("FAKE_STDERR", "  Error: bad recipe\n\n")]);
    let err = client
        .run_recipe("r.yml", &RunOptions::new())
        .expect_err("check is on by default");

    match &err {
        SdkError::ProcessFailed {
            operation,
            code,
            stderr,
        } => {
            assert_eq!(operation, "run");
            assert_eq!(*code, 1);
            assert_eq!(stderr, "Error: bad recipe");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(err.to_string().contains("Error: bad recipe"));
}

#[test]
fn nonzero_exit_without_check_returns_result() {
    let client = client(&[("FAKE_EXIT", "1"), ("FAKE_STDERR", "  boom \n")]);
    let result = client
        .run_recipe("r.yml", &RunOptions::new().check(false))
        .expect("unchecked run returns the result");
    assert_eq!(result.code, 1);
    assert_eq!(result.stderr, "  boom \n");
}

#[test]
fn config_check_default_applies_when_unset() {
    let config = ClientConfig {
        binary: fake_binary().to_string_lossy().into_owned(),
        env: BTreeMap::from([("FAKE_EXIT".to_string(), "4".to_string())]),
        check: false,
        ..ClientConfig::default()
    };
    let client = Client::new(config);
    let result = client.run_recipe("r.yml", &RunOptions::new()).unwrap();
    assert_eq!(result.code, 4);

    let err = client
        .run_recipe("r.yml", &RunOptions::new().check(true))
        .unwrap_err();
    assert_eq!(err.exit_code(), Some(4));
}

#[test]
fn inherited_output_is_not_captured() {
    let client = client(&[]);
    let result = client
        .run_recipe("r.yml", &RunOptions::new().capture_output(false))
        .unwrap();
    assert_eq!(result.code, 0);
    assert!(result.stdout.is_empty());
    assert!(result.stderr.is_empty());
}

#[test]
fn lint_lists_paths_then_extra_tokens() {
    let client = client(&[]);
    let options = LintOptions::new().extra_args(["--strict"]);
    let result = client.lint_recipes(&["a.yml", "b.yml"], &options).unwrap();
    assert_eq!(
        lines(&result.stdout),
        vec!["recipe", "lint", "a.yml", "b.yml", "--strict"]
    );
}

#[test]
fn lint_failure_names_operation() {
    let client = client(&[("FAKE_EXIT", "2"), ("FAKE_STDERR", "Lint failed for 1 recipe(s)\n")]);
    let err = client
        .lint_recipes(&[PathBuf::from("a.yml")], &LintOptions::new())
        .unwrap_err();
    assert_eq!(
        err.to_string(),
        "bunker-convert recipe lint failed with code 2: Lint failed for 1 recipe(s)"
    );
}

#[test]
fn list_stages_parses_bullets() {
    let client = client(&[("FAKE_STDOUT", "Available stages:\n- decode\n- resize\n- encode\n")]);
    assert_eq!(client.list_stages().unwrap(), vec!["decode", "resize", "encode"]);
}

#[test]
fn diff_distinguishes_differences_from_failures() {
    let equivalent = client(&[("FAKE_STDOUT", "Recipes match: a == b\n")]);
    assert!(equivalent.diff_recipes("a.yml", "b.yml").unwrap().equivalent);

    let differing = client(&[
        ("FAKE_EXIT", "1"),
        (
            "FAKE_STDOUT",
            "Recipe differences between 'a.yml' and 'b.yml':\n- Version mismatch: 1 vs 2\n",
        ),
    ]);
    let diff = differing.diff_recipes("a.yml", "b.yml").unwrap();
    assert!(!diff.equivalent);
    assert_eq!(diff.differences, vec!["Version mismatch: 1 vs 2"]);

    let broken = client(&[
        ("FAKE_EXIT", "1"),
        ("FAKE_STDOUT", ""),
        ("FAKE_STDERR", "Error: Failed to read recipe file: a.yml\n"),
    ]);
    let err = broken.diff_recipes("a.yml", "b.yml").unwrap_err();
    assert_eq!(err.exit_code(), Some(1));
}

#[test]
fn digest_and_version_parse_stdout() {
    let hex = "0123456789abcdef".repeat(4);
    let stdout = format!("{hex}  media/in.png\n");
    let hashing = client(&[("FAKE_STDOUT", stdout.as_str())]);
    let digest = hashing.digest("media/in.png", None).unwrap();
    assert_eq!(digest.hex, hex);
    assert_eq!(digest.path, PathBuf::from("media/in.png"));

    let garbled = client(&[("FAKE_STDOUT", "nothing useful\n")]);
    assert!(matches!(
        garbled.digest("media/in.png", None),
        Err(SdkError::UnexpectedOutput { .. })
    ));

    let versioned = client(&[("FAKE_STDOUT", "bunker-convert 0.1.0\n")]);
    assert_eq!(versioned.version().unwrap(), "0.1.0");
}

#[test]
fn new_recipe_defaults_destination() {
    let client = client(&[]);
    let path = client.new_recipe("web", None).unwrap();
    assert_eq!(path, PathBuf::from("recipes/web.yaml"));
}

#[test]
fn quick_convert_builds_to_syntax() {
    let client = client(&[]);
    let result = client
        .quick_convert(&["a.png", "b.png"], " webp ", Some(Path::new("out")))
        .unwrap();
    assert_eq!(
        lines(&result.stdout),
        vec!["a.png", "b.png", "to", "webp", "to", "out"]
    );
}

#[test]
fn metrics_count_calls_and_failures() {
    let ok = client(&[]);
    ok.run_recipe("r.yml", &RunOptions::new()).unwrap();

    let failing = client(&[("FAKE_EXIT", "1")]).with_metrics(ok.metrics().clone());
    failing
        .run_recipe("r.yml", &RunOptions::new().check(false))
        .unwrap();

    let snapshot = ok.metrics().snapshot();
    assert_eq!(snapshot.operations["run"].calls, 2);
    assert_eq!(snapshot.operations["run"].failures, 1);
}

#[test]
fn non_utf8_recipe_path_reaches_child_intact() {
    let temp = tempfile::tempdir().unwrap();
    let recipe = temp.path().join(OsStr::from_bytes(b"r\xff.yml"));
    fs::write(&recipe, "version: 1\n").unwrap();

    let client = client(&[("FAKE_EXISTS", "1")]);
    let result = client.run_recipe(&recipe, &RunOptions::new()).unwrap();
    assert_eq!(result.stdout, "found\n");
    assert!(result.args[2].ends_with("r\u{FFFD}.yml"));
}

#[test]
fn missing_binary_propagates_io_error() {
    fake_binary();
    let client = Client::with_binary("/nonexistent/bin/bunker-convert");
    match client.run_recipe("r.yml", &RunOptions::new()) {
        Err(SdkError::Io(err)) => assert_eq!(err.kind(), std::io::ErrorKind::NotFound),
        other => panic!("expected io error, got {other:?}"),
    }
}
