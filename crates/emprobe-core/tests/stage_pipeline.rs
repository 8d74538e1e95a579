use emprobe_core::config::ProcessingConfig;
use emprobe_core::engine::FieldEngine;
use emprobe_core::mesh::RectilinearMesh;
use emprobe_core::output::load_container;
use emprobe_core::stages::StageContext;
use std::f64::consts::PI;
use std::fs;
use tempfile::TempDir;

const DT: f64 = 1.0e-12;
const PERIOD_STEPS: f64 = 20.0;

/// x-polarized voltage oscillating with a 20-step period, growing along y.
struct OscillatingEngine {
    timestep: u64,
}

impl OscillatingEngine {
    fn frequency() -> f64 {
        1.0 / (PERIOD_STEPS * DT)
    }
}

impl FieldEngine for OscillatingEngine {
    fn timestep_count(&self) -> u64 {
        self.timestep
    }

    fn time(&self, dual: bool) -> f64 {
        let time = self.timestep as f64 * DT;
        if dual { time + DT / 2.0 } else { time }
    }

    fn voltage(&self, axis: usize, pos: [usize; 3]) -> f64 {
        if axis != 0 {
            return 0.0;
        }
        (2.0 * PI * Self::frequency() * self.time(false)).sin() * (1.0 + pos[1] as f64)
    }

    fn current(&self, _axis: usize, _pos: [usize; 3]) -> f64 {
        0.0
    }
}

fn config() -> ProcessingConfig {
    let source = format!(
        r#"{{
          "oversampling": 4,
          "nyquist_steps": 20,
          "stages": [
            {{"type": "frequency_domain", "name": "et", "frequencies": [0.0, {frequency}],
              "format": "structured"}},
            {{"type": "mode_match", "name": "port", "start": [0, 0, 1], "stop": [3, 2, 1],
              "mode_functions": ["1 + y", "0", "0"]}},
            {{"type": "frequency_domain", "name": "unused", "frequencies": []}}
          ]
        }}"#,
        frequency = OscillatingEngine::frequency()
    );
    serde_json::from_str(&source).expect("config should parse")
}

#[test]
fn driver_loop_feeds_both_stages_at_the_shared_interval() {
    let temp = TempDir::new().expect("tempdir should be created");
    let config = config();
    config.validate().expect("config should be valid");
    assert_eq!(config.process_interval().steps(), 5);

    let mesh = RectilinearMesh::uniform([4, 3, 3], 1.0).expect("mesh should build");
    let mut pipeline = config
        .build_pipeline(temp.path())
        .expect("pipeline should build");

    let disabled = pipeline.init_all(&mesh);
    assert_eq!(disabled.len(), 1);
    assert_eq!(disabled[0].code(), "INPUT.EMPTY_FREQUENCY_SET");

    let mut timestep = 0;
    let mut processed = 0;
    while timestep < 100 {
        let engine = OscillatingEngine { timestep };
        let next = pipeline.process(&StageContext::new(&engine, &mesh));
        assert_eq!(next, 5);
        processed += 1;
        timestep += next;
    }
    assert_eq!(processed, 20);

    let engine = OscillatingEngine { timestep };
    let report = pipeline.finalize_all(&StageContext::new(&engine, &mesh));
    assert!(report.warnings.is_empty(), "warnings: {:?}", report.warnings);

    let document = load_container(&temp.path().join("et.json")).expect("container should load");
    let datasets = document.ordered_datasets();
    assert_eq!(datasets.len(), 2);

    let (_, dc) = datasets[0];
    assert_eq!(dc.scale, 1.0 / 20.0);
    assert!(dc.peak_magnitudes()[0] < 1.0e-9);

    // Four samples per period over five periods: |sum| = 10 * amplitude.
    let (_, carrier) = datasets[1];
    let peak = carrier.peak_magnitudes();
    assert!((peak[0] - 1.5).abs() < 1.0e-9, "peak was {}", peak[0]);
    assert_eq!(peak[1], 0.0);

    let rows = fs::read_to_string(temp.path().join("port")).expect("integral rows should exist");
    let lines: Vec<&str> = rows.lines().collect();
    assert_eq!(lines[0], "% time\tvalue\tratio");
    assert_eq!(lines.len(), 1 + 20);
    for line in &lines[1..] {
        let ratio: f64 = line
            .split('\t')
            .nth(2)
            .expect("ratio column should exist")
            .parse()
            .expect("ratio should parse");
        assert!((0.0..=1.0 + 1.0e-12).contains(&ratio));
    }
}
