//! CLI integration tests for the oas-validators binary.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("oas-validators"))
}

fn fixture(name: &str) -> String {
    format!("{}/tests/fixtures/{}", env!("CARGO_MANIFEST_DIR"), name)
}

// Helper to create a temp payload file
fn write_temp_file(dir: &TempDir, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    fs::write(&path, content).unwrap();
    path
}

mod endpoints_command {
    use super::*;

    #[test]
    fn lists_endpoints() {
        cmd()
            .args(["endpoints", &fixture("petstore.yaml")])
            .assert()
            .success()
            .stdout(predicate::str::contains(
                "GET /pets  (parameters, responses[200])",
            ))
            .stdout(predicate::str::contains("POST /pets  (parameters, body, responses[201])"))
            .stdout(predicate::str::contains("GET /pets/:petId"))
            .stdout(predicate::str::contains("5 endpoints"));
    }

    #[test]
    fn json_output() {
        let output = cmd()
            .args(["endpoints", &fixture("petstore.yaml"), "--json"])
            .output()
            .unwrap();
        assert!(output.status.success());

        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        let endpoints = value["endpoints"].as_array().unwrap();
        assert_eq!(endpoints.len(), 5);
        assert_eq!(endpoints[0]["path"], "/heartbeat");
        assert_eq!(endpoints[0]["parameters"], false);

        let get_pets = endpoints
            .iter()
            .find(|e| e["path"] == "/pets" && e["method"] == "get")
            .unwrap();
        assert_eq!(get_pets["parameters"], true);
        assert_eq!(get_pets["body"], false);
        assert_eq!(get_pets["responses"], serde_json::json!(["200"]));
    }

    #[test]
    fn options_file_in_yaml() {
        let dir = TempDir::new().unwrap();
        let options = write_temp_file(
            &dir,
            "options.yaml",
            "expectFormFieldsInBody: true\nbuildResponses: false\n",
        );

        cmd()
            .args([
                "endpoints",
                &fixture("form-data.yaml"),
                "--options",
                options.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("POST /api/login  (parameters, body)"))
            .stdout(predicate::str::contains("responses").not());
    }

    #[test]
    fn invalid_options_file() {
        let dir = TempDir::new().unwrap();
        let options = write_temp_file(&dir, "options.json", r#"{"buildResponses": "yes"}"#);

        cmd()
            .args([
                "endpoints",
                &fixture("petstore.yaml"),
                "--options",
                options.to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("invalid options file"));
    }

    #[test]
    fn missing_spec_is_io_error() {
        cmd()
            .args(["endpoints", "/nonexistent/petstore.yaml"])
            .assert()
            .code(3)
            .stderr(predicate::str::contains("Error:"));
    }

    #[test]
    fn unsupported_document() {
        let dir = TempDir::new().unwrap();
        let spec = write_temp_file(&dir, "spec.json", r#"{"swagger": "1.2", "paths": {}}"#);

        cmd()
            .args(["endpoints", spec.to_str().unwrap(), "--json"])
            .assert()
            .code(2)
            .stdout(predicate::str::contains(r#""valid":false"#));
    }
}

mod validate_command {
    use super::*;

    #[test]
    fn valid_parameters() {
        let dir = TempDir::new().unwrap();
        let params = write_temp_file(
            &dir,
            "params.json",
            r#"{"headers": {"API-Version": "1.0"}, "query": {"page": "1"}}"#,
        );

        cmd()
            .args([
                "validate",
                &fixture("petstore.yaml"),
                "--path",
                "/pets",
                "--method",
                "GET",
                "--params",
                params.to_str().unwrap(),
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("Valid"));
    }

    #[test]
    fn missing_header() {
        let dir = TempDir::new().unwrap();
        let params = write_temp_file(&dir, "params.json", r#"{"headers": {}}"#);

        cmd()
            .args([
                "validate",
                &fixture("petstore.yaml"),
                "--path",
                "/pets",
                "--method",
                "get",
                "--params",
                params.to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Validation failed:"))
            .stderr(predicate::str::contains(
                ".headers: should have required property 'api-version'",
            ));
    }

    #[test]
    fn body_errors_as_json() {
        let dir = TempDir::new().unwrap();
        let body = write_temp_file(&dir, "body.json", r#"{"tag": "tag"}"#);

        let output = cmd()
            .args([
                "validate",
                &fixture("petstore.yaml"),
                "--path",
                "/pets",
                "--method",
                "post",
                "--body",
                body.to_str().unwrap(),
                "--json",
            ])
            .output()
            .unwrap();
        assert_eq!(output.status.code(), Some(1));

        let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
        assert_eq!(value["valid"], false);
        let errors = value["errors"].as_array().unwrap();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0]["keyword"], "required");
        assert_eq!(errors[0]["params"]["missingProperty"], "name");
        assert_eq!(errors[0]["schemaPath"], "#/required");
    }

    #[test]
    fn response_body_and_headers() {
        let dir = TempDir::new().unwrap();
        let body = write_temp_file(&dir, "body.json", r#"[{"name": "rex"}]"#);
        let headers = write_temp_file(&dir, "headers.json", r#"{"X-Next": "/pets?page=2"}"#);

        cmd()
            .args([
                "validate",
                &fixture("petstore.yaml"),
                "--path",
                "/pets",
                "--method",
                "get",
                "--response",
                "200",
                "--body",
                body.to_str().unwrap(),
                "--headers",
                headers.to_str().unwrap(),
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains(r#"{"valid":true}"#));

        let body = write_temp_file(&dir, "bad.json", r#"{"name": "rex"}"#);
        cmd()
            .args([
                "validate",
                &fixture("petstore.yaml"),
                "--path",
                "/pets",
                "--method",
                "get",
                "--response",
                "200",
                "--body",
                body.to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("should be array"));
    }

    #[test]
    fn unknown_response_status() {
        let dir = TempDir::new().unwrap();
        let body = write_temp_file(&dir, "body.json", "{}");

        cmd()
            .args([
                "validate",
                &fixture("petstore.yaml"),
                "--path",
                "/pets",
                "--method",
                "get",
                "--response",
                "default",
                "--body",
                body.to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("no response validator for status default"));
    }

    #[test]
    fn unknown_endpoint() {
        let dir = TempDir::new().unwrap();
        let params = write_temp_file(&dir, "params.json", "{}");

        cmd()
            .args([
                "validate",
                &fixture("petstore.yaml"),
                "--path",
                "/owners",
                "--method",
                "get",
                "--params",
                params.to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("no endpoint get /owners"));
    }

    #[test]
    fn content_type_flag() {
        let dir = TempDir::new().unwrap();
        let params = write_temp_file(
            &dir,
            "params.json",
            r#"{"headers": {"api-version": "1.0", "content-type": "text/plain"}}"#,
        );
        let args = [
            "validate".to_string(),
            fixture("petstore.yaml"),
            "--path".to_string(),
            "/pets".to_string(),
            "--method".to_string(),
            "post".to_string(),
            "--params".to_string(),
            params.to_str().unwrap().to_string(),
        ];

        cmd().args(&args).assert().success();

        cmd()
            .args(&args)
            .arg("--content-type-validation")
            .assert()
            .code(1)
            .stderr(predicate::str::contains(
                "content-type must be one of application/json",
            ));
    }

    #[test]
    fn missing_upload_reported() {
        let dir = TempDir::new().unwrap();
        let params = write_temp_file(&dir, "params.json", r#"{"files": [{"fieldname": "other"}]}"#);

        cmd()
            .args([
                "validate",
                &fixture("form-data.yaml"),
                "--path",
                "/api/pets/import",
                "--method",
                "post",
                "--params",
                params.to_str().unwrap(),
            ])
            .assert()
            .code(1)
            .stderr(predicate::str::contains("Missing required files: sourceFile"));
    }

    #[test]
    fn unreadable_payload() {
        cmd()
            .args([
                "validate",
                &fixture("petstore.yaml"),
                "--path",
                "/pets",
                "--method",
                "post",
                "--body",
                "/nonexistent/body.json",
            ])
            .assert()
            .code(3);
    }

    #[test]
    fn malformed_payload() {
        let dir = TempDir::new().unwrap();
        let body = write_temp_file(&dir, "body.json", "{not json");

        cmd()
            .args([
                "validate",
                &fixture("petstore.yaml"),
                "--path",
                "/pets",
                "--method",
                "post",
                "--body",
                body.to_str().unwrap(),
            ])
            .assert()
            .code(2)
            .stderr(predicate::str::contains("parsing"));
    }

    #[test]
    fn target_required() {
        cmd()
            .args([
                "validate",
                &fixture("petstore.yaml"),
                "--path",
                "/pets",
                "--method",
                "get",
            ])
            .assert()
            .failure();
    }

    #[test]
    fn params_conflict_with_body() {
        let dir = TempDir::new().unwrap();
        let payload = write_temp_file(&dir, "payload.json", "{}");
        let payload = payload.to_str().unwrap();

        cmd()
            .args([
                "validate",
                &fixture("petstore.yaml"),
                "--path",
                "/pets",
                "--method",
                "post",
                "--params",
                payload,
                "--body",
                payload,
            ])
            .assert()
            .failure();
    }
}

#[test]
fn help_lists_subcommands() {
    cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("endpoints"))
        .stdout(predicate::str::contains("validate"));
}
