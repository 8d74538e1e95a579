use emprobe_core::grid::VectorGrid3;
use emprobe_core::mesh::RectilinearMesh;
use emprobe_core::output::{JsonFieldContainer, SpectralDataset, StructuredSink};
use num_complex::Complex64;
use serde_json::Value;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};
use tempfile::TempDir;

const MESH: &str = r#"{"lines": [[0, 1, 2, 3], [0, 1, 2], [0, 1, 2]], "grid_delta": 0.001}"#;

fn write_file(path: &Path, content: &str) {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("parent directory should be created");
    }
    fs::write(path, content).expect("file should be written");
}

fn run_emprobe(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_emprobe"))
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("emprobe should launch")
}

fn mode_config(expression: &str) -> String {
    format!(
        r#"{{
          "nyquist_steps": 100,
          "stages": [
            {{"type": "mode_match", "name": "port", "start": [0, 0, 1], "stop": [3, 2, 1],
              "mode_functions": ["{expression}", "0", "0"]}}
          ]
        }}"#
    )
}

#[test]
fn template_command_writes_one_row_per_plane_node() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config_path = temp.path().join("processing.json");
    let mesh_path = temp.path().join("mesh.json");
    let table_path = temp.path().join("out/template.txt");
    write_file(&config_path, &mode_config("1"));
    write_file(&mesh_path, MESH);

    let output = run_emprobe(&[
        "template",
        "--config",
        config_path.to_str().expect("path should be utf-8"),
        "--mesh",
        mesh_path.to_str().expect("path should be utf-8"),
        "--output",
        table_path.to_str().expect("path should be utf-8"),
    ]);

    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("Mode template 'port'"));

    let table = fs::read_to_string(&table_path).expect("table should be readable");
    let lines: Vec<&str> = table.lines().collect();
    assert_eq!(lines[0], "% i\tj\tk\tarea\tmode_x\tmode_y");
    assert_eq!(lines.len(), 1 + 4 * 3);

    let norm: f64 = lines[1..]
        .iter()
        .map(|line| {
            let columns: Vec<f64> = line
                .split('\t')
                .skip(3)
                .map(|value| value.parse().expect("column should parse"))
                .collect();
            columns[0] * (columns[1].powi(2) + columns[2].powi(2))
        })
        .sum();
    assert!((norm - 1.0).abs() < 1.0e-6, "template norm was {norm}");
}

#[test]
fn template_command_reports_expression_offset() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config_path = temp.path().join("processing.json");
    let mesh_path = temp.path().join("mesh.json");
    write_file(&config_path, &mode_config("sin(x) + foo"));
    write_file(&mesh_path, MESH);

    let output = run_emprobe(&[
        "template",
        "--config",
        config_path.to_str().expect("path should be utf-8"),
        "--mesh",
        mesh_path.to_str().expect("path should be utf-8"),
    ]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("ERROR: [INPUT.MODE_EXPRESSION]"),
        "stderr should carry the diagnostic, got: {stderr}"
    );
    assert!(stderr.contains("at character 9"));
}

#[test]
fn template_command_rejects_missing_mesh_file() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config_path = temp.path().join("processing.json");
    write_file(&config_path, &mode_config("1"));

    let output = run_emprobe(&[
        "template",
        "--config",
        config_path.to_str().expect("path should be utf-8"),
        "--mesh",
        temp.path().join("missing.json").to_str().expect("path should be utf-8"),
    ]);

    assert_eq!(output.status.code(), Some(3));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR: [IO.CLI]"));
}

#[test]
fn spectrum_command_summarizes_container_datasets() {
    let temp = TempDir::new().expect("tempdir should be created");
    let mesh = RectilinearMesh::uniform([2, 1, 1], 1.0).expect("mesh should build");
    let mut field = VectorGrid3::new([2, 1, 1]);
    field.component_mut(0)[[1, 0, 0]] = Complex64::new(6.0, 8.0);

    let mut container = JsonFieldContainer::new(temp.path(), "et");
    container
        .write_spectra(
            "E-Field",
            &mesh,
            &[SpectralDataset {
                index: 0,
                frequency: 1.5e9,
                scale: 0.5,
                field: &field,
            }],
        )
        .expect("container should be written");

    let output = run_emprobe(&[
        "spectrum",
        container.path().to_str().expect("path should be utf-8"),
        "--json",
    ]);
    assert!(
        output.status.success(),
        "command should succeed, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let parsed: Value =
        serde_json::from_slice(&output.stdout).expect("summary JSON should parse");
    assert_eq!(parsed[0]["dataset"], Value::from("/FieldData/FD/f0"));
    assert_eq!(parsed[0]["frequency"], Value::from(1.5e9));
    assert_eq!(parsed[0]["peak_magnitude"][0], Value::from(5.0));
}

#[test]
fn unknown_subcommand_exits_with_usage_code() {
    let output = run_emprobe(&["bogus"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(String::from_utf8_lossy(&output.stderr).contains("ERROR: [INPUT.CLI_USAGE]"));
}
