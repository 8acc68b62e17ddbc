//! CLI integration tests for the headless-form binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("headless-form"))
}

// Helper to create a temp JSON file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

const BASIC_SCHEMA: &str = r#"{
    "type": "object",
    "required": ["name"],
    "properties": {
        "name": {
            "type": "string",
            "title": "Name",
            "x-jsf-presentation": { "inputType": "text" }
        },
        "age": {
            "type": "number",
            "minimum": 18,
            "x-jsf-presentation": { "inputType": "number" }
        }
    }
}"#;

mod fields_command {
    use super::*;

    #[test]
    fn prints_field_tree() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", BASIC_SCHEMA);

        cmd()
            .args(["fields", schema.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""name":"name""#))
            .stdout(predicate::str::contains(r#""inputType":"text""#))
            .stdout(predicate::str::contains(r#""required":true"#));
    }

    #[test]
    fn pretty_output_is_indented() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", BASIC_SCHEMA);

        cmd()
            .args(["fields", schema.to_str().unwrap(), "--pretty"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[\n"));
    }

    #[test]
    fn strict_mode_rejects_missing_input_type() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{"type":"object","properties":{"name":{"type":"string"}}}"#,
        );

        cmd()
            .args(["fields", schema.to_str().unwrap()])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("name"));
    }

    #[test]
    fn lenient_mode_accepts_missing_input_type() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{"type":"object","properties":{"name":{"type":"string"}}}"#,
        );

        cmd()
            .args(["fields", schema.to_str().unwrap(), "--lenient"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""inputType":"text""#));
    }

    #[test]
    fn initial_values_seed_visibility() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(
            &dir,
            "schema.json",
            r#"{
                "type": "object",
                "properties": {
                    "has_pet": { "type": "string", "x-jsf-presentation": { "inputType": "text" } },
                    "pet_name": { "type": "string", "x-jsf-presentation": { "inputType": "text" } }
                },
                "allOf": [
                    {
                        "if": {
                            "properties": { "has_pet": { "const": "yes" } },
                            "required": ["has_pet"]
                        },
                        "then": {},
                        "else": { "properties": { "pet_name": false } }
                    }
                ]
            }"#,
        );
        let values = write_temp_file(&dir, "values.json", r#"{"has_pet":"yes"}"#);

        cmd()
            .args(["fields", schema.to_str().unwrap()])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""isVisible":false"#));

        cmd()
            .args([
                "fields",
                schema.to_str().unwrap(),
                "--initial-values",
                values.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""isVisible":false"#).not());
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_values_succeed() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", BASIC_SCHEMA);
        let values = write_temp_file(&dir, "values.json", r#"{"name":"Ada","age":30}"#);

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                values.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Valid"));
    }

    #[test]
    fn invalid_values_exit_with_code_1() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", BASIC_SCHEMA);
        let values = write_temp_file(&dir, "values.json", r#"{"age":17}"#);

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                values.to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Required field"))
            .stderr(predicate::str::contains("Must be greater or equal to 18"));
    }

    #[test]
    fn json_output_reports_errors_and_normalized_values() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", BASIC_SCHEMA);
        let values = write_temp_file(&dir, "values.json", r#"{}"#);

        cmd()
            .args([
                "validate",
                schema.to_str().unwrap(),
                values.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .code(1)
            .stdout(predicate::str::contains(r#""valid": false"#))
            .stdout(predicate::str::contains("Required field"));
    }
}

mod modify_command {
    use super::*;

    #[test]
    fn set_overrides_field_attributes() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", BASIC_SCHEMA);

        cmd()
            .args([
                "modify",
                schema.to_str().unwrap(),
                "--set",
                r#"name={"title":"Full legal name"}"#,
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Full legal name"));
    }

    #[test]
    fn unknown_field_warns_but_succeeds() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", BASIC_SCHEMA);

        cmd()
            .args([
                "modify",
                schema.to_str().unwrap(),
                "--set",
                r#"nope={"title":"X"}"#,
            ])
            .assert()
            .success()
            .stderr(predicate::str::contains("Warning"));
    }

    #[test]
    fn pluck_keeps_only_named_properties() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", BASIC_SCHEMA);

        cmd()
            .args(["modify", schema.to_str().unwrap(), "--pluck", "name"])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#""name""#))
            .stdout(predicate::str::contains(r#""age""#).not());
    }

    #[test]
    fn malformed_set_is_a_schema_error() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", BASIC_SCHEMA);

        cmd()
            .args(["modify", schema.to_str().unwrap(), "--set", "no-equals-sign"])
            .assert()
            .code(2);
    }
}

mod error_handling {
    use super::*;

    #[test]
    fn missing_file_exits_with_code_3() {
        cmd()
            .args(["fields", "/nonexistent/schema.json"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("Error"));
    }

    #[test]
    fn invalid_json_exits_with_code_2() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", "{not json");

        cmd()
            .args(["fields", schema.to_str().unwrap()])
            .assert()
            .code(2);
    }

    #[test]
    fn non_object_schema_exits_with_code_2() {
        let dir = TempDir::new().unwrap();
        let schema = write_temp_file(&dir, "schema.json", r#""just a string""#);

        cmd()
            .args(["fields", schema.to_str().unwrap()])
            .assert()
            .code(2);
    }
}

mod help_and_version {
    use super::*;

    #[test]
    fn help_lists_subcommands() {
        cmd()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("fields"))
            .stdout(predicate::str::contains("validate"))
            .stdout(predicate::str::contains("modify"));
    }

    #[test]
    fn version_prints() {
        cmd().arg("--version").assert().success();
    }

    #[test]
    fn missing_args_fail() {
        cmd().arg("validate").assert().failure();
    }
}
