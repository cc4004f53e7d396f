//! End-to-end tests for the `ralc` binary.

use std::path::Path;
use std::process::{Command, Output};

// =============================================================================
// Test Helpers
// =============================================================================

const TOY_UNIT: &str = r#"{
    "declarations": [
        {"decl": "class", "name": "Toy", "classifier": {"family": 2, "genus": 15, "species": 0}},
        {"decl": "field", "owner": {"named": "Toy"}, "name": "count", "ty": {"named": "integer"}, "slot": 3},
        {"decl": "script", "owner": {"named": "Toy"}, "name": "push", "id": 1}
    ],
    "events": [
        {
            "classifier": {"family": 2, "genus": 15, "species": 0},
            "script": "push",
            "body": {"stmt": "assign",
                     "targets": {"field": {"base": {"id": "ownr"}, "field": "count"}},
                     "source": {"int": 4}}
        }
    ]
}"#;

const BROKEN_UNIT: &str = r#"{
    "install": {"stmt": "let", "names": ["a"], "init": {"id": "nope"},
                "pos": {"file": "bad.ral", "line": 3, "column": 7}}
}"#;

const TOY_CAOS: &str = "* Toy:push 1\nscrp 2 15 0 1\n\tsetv mv03 4\nendm\n";

fn ralc(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_ralc"))
        .args(args)
        .env("RUST_LOG", "off")
        .output()
        .expect("failed to run ralc")
}

fn write(dir: &Path, name: &str, contents: &str) -> String {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path.to_string_lossy().into_owned()
}

// =============================================================================
// Compile
// =============================================================================

#[test]
fn test_compile_to_stdout() {
    let dir = tempfile::tempdir().unwrap();
    let unit = write(dir.path(), "toy.json", TOY_UNIT);
    let out = ralc(&["compile", &unit, "--stdout"]);
    assert!(out.status.success(), "{}", String::from_utf8_lossy(&out.stderr));
    assert_eq!(String::from_utf8_lossy(&out.stdout), TOY_CAOS);
}

#[test]
fn test_compile_to_default_path() {
    let dir = tempfile::tempdir().unwrap();
    let unit = write(dir.path(), "toy.json", TOY_UNIT);
    let out = ralc(&["compile", &unit]);
    assert!(out.status.success());
    let written = std::fs::read_to_string(dir.path().join("toy.cos")).unwrap();
    assert_eq!(written, TOY_CAOS);
}

#[test]
fn test_compile_with_config() {
    let dir = tempfile::tempdir().unwrap();
    let unit = write(
        dir.path(),
        "loop.json",
        r#"{"install": {"stmt": "loop", "body": {"stmt": "break"}}}"#,
    );
    let config = write(dir.path(), "ral.toml", "label_prefix = \"top\"\n");
    let target = dir.path().join("loop.cos");
    let target = target.to_string_lossy();
    let out = ralc(&["compile", &unit, "--config", &config, "--out", &target]);
    assert!(out.status.success());
    let written = std::fs::read_to_string(dir.path().join("loop.cos")).unwrap();
    assert_eq!(
        written,
        "goto top0\nsubr top0\n\tgoto top1\ngoto top0\nsubr top1\n"
    );
}

// =============================================================================
// Failures
// =============================================================================

#[test]
fn test_errors_are_reported_and_fail() {
    let dir = tempfile::tempdir().unwrap();
    let unit = write(dir.path(), "bad.json", BROKEN_UNIT);
    let out = ralc(&["compile", &unit, "--stdout"]);
    assert_eq!(out.status.code(), Some(1));
    assert!(out.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(
        stderr.contains("bad.ral:3:7: error: install script: unknown identifier `nope`"),
        "{stderr}"
    );
    assert!(!dir.path().join("bad.cos").exists());
}

#[test]
fn test_json_diagnostics() {
    let dir = tempfile::tempdir().unwrap();
    let unit = write(dir.path(), "bad.json", BROKEN_UNIT);
    let out = ralc(&["check", &unit, "--json-diagnostics"]);
    assert_eq!(out.status.code(), Some(1));
    let diagnostics: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(diagnostics[0]["severity"], "error");
    assert_eq!(diagnostics[0]["pos"]["line"], 3);
}

#[test]
fn test_check_clean_unit() {
    let dir = tempfile::tempdir().unwrap();
    let unit = write(dir.path(), "toy.json", TOY_UNIT);
    let out = ralc(&["check", &unit]);
    assert!(out.status.success());
    assert!(out.stdout.is_empty());
    assert!(!dir.path().join("toy.cos").exists());
}

#[test]
fn test_malformed_unit() {
    let dir = tempfile::tempdir().unwrap();
    let unit = write(dir.path(), "junk.json", "{\"events\": 3}");
    let out = ralc(&["compile", &unit, "--stdout"]);
    assert_eq!(out.status.code(), Some(2));
}

#[test]
fn test_missing_config() {
    let dir = tempfile::tempdir().unwrap();
    let unit = write(dir.path(), "toy.json", TOY_UNIT);
    let missing = dir.path().join("none.toml");
    let out = ralc(&["compile", &unit, "--config", &missing.to_string_lossy()]);
    assert_eq!(out.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&out.stderr).contains("failed to read"));
}
