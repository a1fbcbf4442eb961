use std::process::{Command, Output};

fn run_cli(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_odoo-rpc"))
        .args(args)
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .env_remove("ODOO_URL")
        .env_remove("ODOO_DB")
        .env_remove("ODOO_USERNAME")
        .env_remove("ODOO_PASSWORD")
        .env("RUST_LOG", "off")
        .output()
        .expect("cli process should start")
}

#[test]
fn help_expected_subcommands_listed() {
    let output = run_cli(&["--help"]);

    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).expect("stdout should be utf8");
    for command in ["search-read", "fields", "create", "resolve"] {
        assert!(stdout.contains(command), "missing {command} in:\n{stdout}");
    }
}

#[test]
fn search_malformed_domain_expected_failure_before_connect() {
    let output = run_cli(&[
        "search",
        "--model",
        "res.partner",
        "--domain",
        r#"[["name", "="]]"#,
        "--url",
        "http://127.0.0.1:9",
    ]);

    assert!(!output.status.success());
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8(output.stderr).expect("stderr should be utf8");
    assert!(stderr.contains("invalid domain"), "stderr:\n{stderr}");
}

#[test]
fn create_invalid_relation_command_expected_failure_before_connect() {
    let output = run_cli(&[
        "create",
        "--model",
        "res.partner",
        "--values",
        r#"{"category_id": {"action": "update", "value": [1]}}"#,
    ]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("stderr should be utf8");
    assert!(stderr.contains("category_id"), "stderr:\n{stderr}");
}

#[test]
fn search_without_database_expected_configuration_error() {
    let output = run_cli(&["search", "--model", "res.partner", "--username", "admin"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).expect("stderr should be utf8");
    assert!(stderr.contains("ODOO_DB is not set"), "stderr:\n{stderr}");
}
