use super::CliError;
use anyhow::Context;
use emprobe_core::config::load_processing_config;
use emprobe_core::domain::{MeshType, ProbeError, tangential_axes};
use emprobe_core::mesh::{MeshGeometry, RectilinearMesh};
use emprobe_core::output::container::DATASET_GROUP;
use emprobe_core::output::{format_scientific_f64, load_container, write_text_artifact};
use emprobe_core::stages::{ModeMatchStage, Stage};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(clap::Args)]
pub(super) struct TemplateArgs {
    /// Processing configuration (JSON)
    #[arg(long)]
    config: PathBuf,

    /// Mesh description (JSON)
    #[arg(long)]
    mesh: PathBuf,

    /// Mode-match stage name; defaults to the first one in the config
    #[arg(long)]
    stage: Option<String>,

    /// Write the node table here instead of stdout
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(clap::Args)]
pub(super) struct SpectrumArgs {
    /// Container written by a structured frequency-domain stage
    #[arg(value_name = "CONTAINER")]
    container: PathBuf,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,
}

pub(super) fn run_template_command(args: TemplateArgs) -> Result<i32, CliError> {
    let config = load_processing_config(&args.config).map_err(ProbeError::from)?;
    let mesh = load_mesh(&args.mesh)?;

    let Some(stage_config) = config.find_mode_match(args.stage.as_deref()) else {
        let message = match &args.stage {
            Some(name) => format!("no mode_match stage named '{name}' in '{}'", args.config.display()),
            None => format!("no mode_match stage in '{}'", args.config.display()),
        };
        return Err(ProbeError::input_validation("INPUT.MODE_STAGE", message).into());
    };

    let mut stage = stage_config.build_stage(config.process_interval())?;
    stage
        .init(&mesh)
        .map_err(|reason| ProbeError::from(&reason))?;

    let table = render_template_table(&stage, &mesh);
    match &args.output {
        Some(path) => {
            write_text_artifact(path, &table)
                .with_context(|| format!("failed to write template table '{}'", path.display()))?;
            println!(
                "Mode template '{}' written to {}",
                stage.name(),
                path.display()
            );
        }
        None => print!("{table}"),
    }
    Ok(0)
}

fn load_mesh(path: &Path) -> Result<RectilinearMesh, CliError> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read mesh '{}'", path.display()))?;
    serde_json::from_str(&source).map_err(|source| {
        ProbeError::input_validation(
            "INPUT.MESH_PARSE",
            format!("failed to parse mesh '{}': {}", path.display(), source),
        )
        .into()
    })
}

fn axis_names(mesh: &dyn MeshGeometry) -> [&'static str; 3] {
    match mesh.mesh_type() {
        MeshType::Cartesian => ["x", "y", "z"],
        MeshType::Cylindrical => ["rho", "a", "z"],
    }
}

fn render_template_table(stage: &ModeMatchStage, mesh: &dyn MeshGeometry) -> String {
    let plane = stage.plane();
    let Some(normal) = stage.normal_axis() else {
        return String::new();
    };
    let names = axis_names(mesh);
    let [first, second] = tangential_axes(normal);
    let counts = plane.line_counts(normal);

    let mut out = String::new();
    out.push_str(&format!(
        "% i\tj\tk\tarea\tmode_{}\tmode_{}\n",
        names[first], names[second]
    ));
    for p in 0..counts[0] {
        for pp in 0..counts[1] {
            let pos = plane.node(normal, [p, pp]);
            out.push_str(&format!(
                "{}\t{}\t{}\t{}\t{}\t{}\n",
                pos[0],
                pos[1],
                pos[2],
                format_scientific_f64(mesh.node_area(normal, pos, false), 6),
                format_scientific_f64(stage.template(0)[[p, pp]], 9),
                format_scientific_f64(stage.template(1)[[p, pp]], 9),
            ));
        }
    }
    out
}

#[derive(Serialize)]
struct SpectrumSummary {
    dataset: String,
    field_name: String,
    frequency: f64,
    scale: f64,
    peak_magnitude: [f64; 3],
}

pub(super) fn run_spectrum_command(args: SpectrumArgs) -> Result<i32, CliError> {
    let document = load_container(&args.container)?;
    let summaries: Vec<SpectrumSummary> = document
        .ordered_datasets()
        .into_iter()
        .map(|(name, record)| SpectrumSummary {
            dataset: format!("{DATASET_GROUP}/{name}"),
            field_name: record.field_name.clone(),
            frequency: record.frequency,
            scale: record.scale,
            peak_magnitude: record.peak_magnitudes(),
        })
        .collect();

    if args.json {
        let rendered = serde_json::to_string_pretty(&summaries)
            .context("failed to encode spectrum summary")?;
        println!("{rendered}");
        return Ok(0);
    }

    println!("% dataset\tfield\tfrequency\tscale\tpeak_0\tpeak_1\tpeak_2");
    for summary in &summaries {
        println!(
            "{}\t{}\t{}\t{}\t{}\t{}\t{}",
            summary.dataset,
            summary.field_name,
            format_scientific_f64(summary.frequency, 6),
            format_scientific_f64(summary.scale, 6),
            format_scientific_f64(summary.peak_magnitude[0], 6),
            format_scientific_f64(summary.peak_magnitude[1], 6),
            format_scientific_f64(summary.peak_magnitude[2], 6),
        );
    }
    Ok(0)
}
