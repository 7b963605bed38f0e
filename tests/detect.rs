mod common;

use assert_cmd::Command;
use predicates::str::contains;
use serde_json::Value;

use common::TestWorkspace;

fn detect_report(path: &std::path::Path) -> Value {
    let output = Command::cargo_bin("qcparser")
        .expect("binary present")
        .args(["detect", "--file", path.to_str().unwrap()])
        .output()
        .expect("run detect");
    assert!(output.status.success(), "detect failed: {output:?}");
    serde_json::from_slice(&output.stdout).expect("parse detection report")
}

fn column(report: &Value, index: usize) -> (&str, &str) {
    let column = &report["columns"][index];
    (
        column["name"].as_str().expect("column name"),
        column["type"].as_str().expect("column type"),
    )
}

#[test]
fn detects_well_formed_csv_with_header() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("orders.csv", "name,age,active\nAlice,30,true\nBob,25,false\n");

    let report = detect_report(&input);

    assert_eq!(report["format"], "csv");
    assert_eq!(report["encoding"], "utf-8");
    assert_eq!(report["delimiter"]["codepoint"], ",");
    assert_eq!(report["has_header"], true);
    assert_eq!(report["field_count"], 3);
    assert_eq!(report["trim_fields"], true);
    assert_eq!(column(&report, 0), ("name", "TEXT"));
    assert_eq!(column(&report, 1), ("age", "INT"));
    assert_eq!(column(&report, 2), ("active", "BOOLEAN"));
    assert_eq!(report["preview"]["rows"], 2);
    assert_eq!(report["preview"]["data"][0]["name"], "Alice");
}

#[test]
fn detects_headerless_pipe_delimited_csv() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("data.txt", "10|3.14|hello\n20|2.71|world\n");

    let report = detect_report(&input);

    assert_eq!(report["delimiter"]["codepoint"], "|");
    assert_eq!(report["has_header"], false);
    assert_eq!(column(&report, 0), ("col1", "INT"));
    assert_eq!(column(&report, 1), ("col2", "DOUBLE"));
    assert_eq!(column(&report, 2), ("col3", "TEXT"));
}

#[test]
fn detects_jsonl_with_typed_columns() {
    let workspace = TestWorkspace::new();
    let input = workspace.write(
        "events.jsonl",
        "{\"id\":1,\"name\":\"A\"}\n{\"id\":2,\"name\":\"B\"}\n",
    );

    let report = detect_report(&input);

    assert_eq!(report["format"], "jsonl");
    assert_eq!(column(&report, 0), ("id", "INT"));
    assert_eq!(column(&report, 1), ("name", "TEXT"));
    assert_eq!(report["preview"]["rows"], 2);
    assert!(report["delimiter"].is_null());
}

#[test]
fn comments_and_blank_lines_do_not_change_detection() {
    let workspace = TestWorkspace::new();
    let commented = workspace.write("with.csv", "# generated\n\na,b,c\n1,2,3\n");
    let plain = workspace.write("without.csv", "a,b,c\n1,2,3\n");

    let with = detect_report(&commented);
    let without = detect_report(&plain);

    for key in ["format", "delimiter", "has_header", "field_count", "columns"] {
        assert_eq!(with[key], without[key], "field {key} diverged");
    }
    assert_eq!(with["comment"], "#");
}

#[test]
fn ambiguous_delimiters_are_reported() {
    let workspace = TestWorkspace::new();
    let rows: String = (0..10)
        .map(|i| format!("a{i},b;c{i},d;e\n"))
        .collect();
    let input = workspace.write("ambiguous.csv", &rows);

    let report = detect_report(&input);

    let codes: Vec<&str> = report["issues"]
        .as_array()
        .expect("issues array")
        .iter()
        .filter_map(|issue| issue["code"].as_str())
        .collect();
    assert!(codes.contains(&"AMBIGUOUS_DELIMITER"));
    let confidence = report["confidence"].as_f64().expect("confidence");
    assert!(confidence <= 0.85);
    assert!((0.0..=1.0).contains(&confidence));
}

#[test]
fn preview_rows_honor_the_flag() {
    let workspace = TestWorkspace::new();
    let rows: String = (0..30).map(|i| format!("{i},{i}\n")).collect();
    let input = workspace.write("long.csv", &rows);

    let output = Command::cargo_bin("qcparser")
        .expect("binary present")
        .args([
            "detect",
            "--file",
            input.to_str().unwrap(),
            "--max-preview-rows",
            "5",
        ])
        .output()
        .expect("run detect");
    assert!(output.status.success());
    let report: Value = serde_json::from_slice(&output.stdout).expect("parse report");

    assert_eq!(report["preview"]["rows"], 5);
    assert_eq!(
        report["preview"]["data"].as_array().map(Vec::len),
        Some(5)
    );
}

#[test]
fn detection_is_deterministic_across_runs() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("stable.csv", "x;y;z\n1;2;3\n4;5;6\n7;8;9\n");

    let mut first = detect_report(&input);
    let mut second = detect_report(&input);
    // duration fields are the only permitted difference
    for report in [&mut first, &mut second] {
        report["duration_ms"] = Value::from(0);
        report["sampled_meta"]["duration_ms"] = Value::from(0);
    }
    assert_eq!(first, second);
}

#[test]
fn missing_file_exits_with_code_three() {
    Command::cargo_bin("qcparser")
        .expect("binary present")
        .args(["detect", "--file", "/no/such/file.csv"])
        .assert()
        .code(3)
        .stderr(contains("FILE_NOT_FOUND"));
}

#[test]
fn missing_file_flag_exits_with_code_two() {
    Command::cargo_bin("qcparser")
        .expect("binary present")
        .arg("detect")
        .assert()
        .code(2)
        .stderr(contains("INPUT_REQUIRED"));
}

#[test]
fn invalid_utf8_fails_detection() {
    let workspace = TestWorkspace::new();
    let input = workspace.write_bytes("latin1.csv", b"name,city\nJos\xe9,Lyon\n");

    Command::cargo_bin("qcparser")
        .expect("binary present")
        .args(["detect", "--file", input.to_str().unwrap()])
        .assert()
        .code(4)
        .stderr(contains("ENCODING_NOT_UTF8"));
}

#[test]
fn bom_is_stripped_from_header_names() {
    let workspace = TestWorkspace::new();
    let input = workspace.write("bom.csv", "\u{feff}id,name\n1,Alice\n2,Bob\n3,Carol\n");

    let report = detect_report(&input);
    assert_eq!(report["has_header"], true);
    assert_eq!(column(&report, 0), ("id", "INT"));
}

#[test]
fn version_subcommand_prints_the_crate_version() {
    Command::cargo_bin("qcparser")
        .expect("binary present")
        .arg("version")
        .assert()
        .success()
        .stdout(contains(env!("CARGO_PKG_VERSION")));
}
