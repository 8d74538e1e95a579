use crate::domain::{FieldKind, ProbeError, ProbeResult};
use crate::output::{JsonFieldContainer, TextIntegralWriter, VtkSnapshotWriter};
use crate::schedule::{ProcessInterval, StageSchedule};
use crate::stages::{
    DEFAULT_PHASE_COUNT, FrequencyDomainStage, ModeMatchStage, SensorPlane, SpectralOutput,
    StagePipeline,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ProcessingConfig {
    #[serde(default = "default_oversampling")]
    pub oversampling: u32,
    /// Timesteps per Nyquist period of the excitation.
    pub nyquist_steps: u64,
    #[serde(default)]
    pub stages: Vec<StageConfig>,
}

fn default_oversampling() -> u32 {
    4
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StageConfig {
    FrequencyDomain(FrequencyDomainConfig),
    ModeMatch(ModeMatchConfig),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SpectralFormat {
    #[default]
    Snapshot,
    Structured,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct FrequencyDomainConfig {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub field_type: u8,
    pub frequencies: Vec<f64>,
    #[serde(default)]
    pub format: SpectralFormat,
    #[serde(default = "default_phase_count")]
    pub phase_count: usize,
    #[serde(default)]
    pub steps: Vec<u64>,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ModeMatchConfig {
    pub name: String,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default)]
    pub field_type: u8,
    pub start: [usize; 3],
    pub stop: [usize; 3],
    /// One expression per mesh axis.
    pub mode_functions: [String; 3],
    #[serde(default = "default_precision")]
    pub precision: usize,
    #[serde(default)]
    pub steps: Vec<u64>,
}

fn enabled_by_default() -> bool {
    true
}

fn default_phase_count() -> usize {
    DEFAULT_PHASE_COUNT
}

fn default_precision() -> usize {
    12
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read processing config '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to parse processing config '{}': {source}", path.display())]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("invalid processing config '{}': {message}", path.display())]
    Invalid { path: PathBuf, message: String },
}

impl From<ConfigError> for ProbeError {
    fn from(error: ConfigError) -> Self {
        match &error {
            ConfigError::Read { .. } => ProbeError::io_system("IO.CONFIG_READ", error.to_string()),
            ConfigError::Parse { .. } => {
                ProbeError::input_validation("INPUT.CONFIG_PARSE", error.to_string())
            }
            ConfigError::Invalid { .. } => {
                ProbeError::input_validation("INPUT.CONFIG_INVALID", error.to_string())
            }
        }
    }
}

pub fn load_processing_config(path: impl AsRef<Path>) -> Result<ProcessingConfig, ConfigError> {
    let path = path.as_ref();
    let source = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config: ProcessingConfig =
        serde_json::from_str(&source).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
    config.validate().map_err(|message| ConfigError::Invalid {
        path: path.to_path_buf(),
        message,
    })?;
    Ok(config)
}

impl StageConfig {
    pub fn name(&self) -> &str {
        match self {
            Self::FrequencyDomain(config) => &config.name,
            Self::ModeMatch(config) => &config.name,
        }
    }

    pub fn enabled(&self) -> bool {
        match self {
            Self::FrequencyDomain(config) => config.enabled,
            Self::ModeMatch(config) => config.enabled,
        }
    }

    fn field_type(&self) -> u8 {
        match self {
            Self::FrequencyDomain(config) => config.field_type,
            Self::ModeMatch(config) => config.field_type,
        }
    }
}

impl ProcessingConfig {
    pub fn process_interval(&self) -> ProcessInterval {
        ProcessInterval::from_nyquist(self.nyquist_steps, self.oversampling)
    }

    pub fn validate(&self) -> Result<(), String> {
        let mut names = BTreeSet::new();
        for stage in &self.stages {
            let name = stage.name();
            if name.trim().is_empty() {
                return Err("stage name must not be empty".to_string());
            }
            if !names.insert(name) {
                return Err(format!("stage name '{name}' is used more than once"));
            }
            if FieldKind::from_selector(stage.field_type()).is_none() {
                return Err(format!(
                    "stage '{name}' has field_type {}, expected 0 (electric) or 1 (magnetic)",
                    stage.field_type()
                ));
            }
            if let StageConfig::FrequencyDomain(config) = stage {
                if let Some(value) = config.frequencies.iter().find(|value| !value.is_finite()) {
                    return Err(format!("stage '{name}' has non-finite frequency {value}"));
                }
                if config.phase_count == 0 {
                    return Err(format!("stage '{name}' needs phase_count >= 1"));
                }
            }
        }
        Ok(())
    }

    pub fn find_mode_match(&self, name: Option<&str>) -> Option<&ModeMatchConfig> {
        self.stages.iter().find_map(|stage| match stage {
            StageConfig::ModeMatch(config) if name.is_none_or(|name| name == config.name) => {
                Some(config)
            }
            _ => None,
        })
    }

    /// Builds every enabled stage with file writers under `output_dir`.
    pub fn build_pipeline(&self, output_dir: &Path) -> ProbeResult<StagePipeline> {
        let interval = self.process_interval();
        let mut pipeline = StagePipeline::new(self.nyquist_steps);
        for stage in self.stages.iter().filter(|stage| stage.enabled()) {
            match stage {
                StageConfig::FrequencyDomain(config) => {
                    pipeline.push(config.build_stage(interval, output_dir)?);
                }
                StageConfig::ModeMatch(config) => {
                    let stage = config.build_stage(interval)?;
                    match TextIntegralWriter::create(
                        output_dir.join(&config.name),
                        &["value", "ratio"],
                        config.precision,
                    ) {
                        Ok(writer) => pipeline.push(stage.with_integral_sink(writer)),
                        Err(error) => {
                            tracing::warn!(
                                stage = %config.name,
                                code = error.code(),
                                "integral rows disabled: {}",
                                error.message()
                            );
                            pipeline.push(stage);
                        }
                    }
                }
            }
        }
        Ok(pipeline)
    }
}

fn field_kind(name: &str, selector: u8) -> ProbeResult<FieldKind> {
    FieldKind::from_selector(selector).ok_or_else(|| {
        ProbeError::input_validation(
            "INPUT.FIELD_TYPE",
            format!("stage '{name}' has unknown field_type {selector}"),
        )
    })
}

impl FrequencyDomainConfig {
    pub fn build_stage(&self, interval: ProcessInterval, output_dir: &Path) -> ProbeResult<FrequencyDomainStage> {
        let output = match self.format {
            SpectralFormat::Snapshot => SpectralOutput::Snapshot {
                sink: Box::new(VtkSnapshotWriter::new(output_dir)),
                phase_count: self.phase_count,
            },
            SpectralFormat::Structured => {
                SpectralOutput::structured(JsonFieldContainer::new(output_dir, self.name.clone()))
            }
        };
        Ok(FrequencyDomainStage::new(
            self.name.clone(),
            field_kind(&self.name, self.field_type)?,
            self.frequencies.clone(),
            StageSchedule::from_interval(interval).with_steps(self.steps.iter().copied()),
            output,
        ))
    }
}

impl ModeMatchConfig {
    /// Stage without an integral sink; attach one with
    /// [`ModeMatchStage::with_integral_sink`].
    pub fn build_stage(&self, interval: ProcessInterval) -> ProbeResult<ModeMatchStage> {
        Ok(ModeMatchStage::new(
            self.name.clone(),
            field_kind(&self.name, self.field_type)?,
            SensorPlane::new(self.start, self.stop),
            self.mode_functions.clone(),
            StageSchedule::from_interval(interval).with_steps(self.steps.iter().copied()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, SpectralFormat, StageConfig, load_processing_config};
    use crate::domain::{FieldKind, ProbeError, ProbeErrorCategory};
    use crate::mesh::RectilinearMesh;
    use crate::stages::Stage;
    use std::fs;
    use tempfile::TempDir;

    const CONFIG: &str = r#"{
        "oversampling": 1,
        "nyquist_steps": 40,
        "stages": [
            {"type": "frequency_domain", "name": "et", "frequencies": [1e9, 2e9], "format": "structured"},
            {"type": "mode_match", "name": "port", "field_type": 1, "start": [0, 0, 1], "stop": [2, 2, 1],
             "mode_functions": ["1", "0", "0"], "steps": [7]},
            {"type": "frequency_domain", "name": "off", "enabled": false, "frequencies": []}
        ]
    }"#;

    fn write_config(temp: &TempDir, content: &str) -> std::path::PathBuf {
        let path = temp.path().join("processing.json");
        fs::write(&path, content).expect("config should be written");
        path
    }

    #[test]
    fn config_loads_tagged_stages_with_defaults() {
        let temp = TempDir::new().expect("tempdir should be created");
        let config = load_processing_config(write_config(&temp, CONFIG)).expect("config should load");

        assert_eq!(config.process_interval().oversampling(), 2);
        assert_eq!(config.process_interval().steps(), 20);
        assert_eq!(config.stages.len(), 3);
        match &config.stages[0] {
            StageConfig::FrequencyDomain(stage) => {
                assert!(stage.enabled);
                assert_eq!(stage.format, SpectralFormat::Structured);
                assert_eq!(stage.phase_count, 21);
            }
            other => panic!("unexpected stage: {other:?}"),
        }
        let mode = config.find_mode_match(None).expect("mode stage should exist");
        assert_eq!(mode.name, "port");
        assert_eq!(mode.precision, 12);
        assert!(config.find_mode_match(Some("missing")).is_none());
    }

    #[test]
    fn pipeline_contains_only_enabled_stages() {
        let temp = TempDir::new().expect("tempdir should be created");
        let config = load_processing_config(write_config(&temp, CONFIG)).expect("config should load");
        let output = temp.path().join("out");

        let mut pipeline = config.build_pipeline(&output).expect("pipeline should build");
        assert_eq!(pipeline.len(), 2);
        let mesh = RectilinearMesh::uniform([3, 3, 3], 1.0).expect("mesh should build");
        assert!(pipeline.init_all(&mesh).is_empty());
        assert!(output.join("port").exists());

        let mode = config.find_mode_match(Some("port")).expect("mode stage should exist");
        let stage = mode
            .build_stage(config.process_interval())
            .expect("stage should build");
        assert_eq!(stage.field_kind(), FieldKind::Magnetic);
        assert!(stage.schedule().is_eligible(7));
        assert!(stage.schedule().is_eligible(20));
    }

    #[test]
    fn unopenable_integral_file_keeps_every_stage() {
        let temp = TempDir::new().expect("tempdir should be created");
        fs::write(temp.path().join("blocker"), "not a directory").expect("blocker should be written");
        let path = write_config(
            &temp,
            r#"{"nyquist_steps": 10, "stages": [
                {"type": "frequency_domain", "name": "et", "frequencies": [1.0], "format": "structured"},
                {"type": "mode_match", "name": "blocker/port", "start": [0, 0, 1], "stop": [2, 2, 1],
                 "mode_functions": ["1", "0", "0"]}
            ]}"#,
        );
        let config = load_processing_config(&path).expect("config should load");

        let mut pipeline = config
            .build_pipeline(temp.path())
            .expect("pipeline should build without the integral file");
        let names: Vec<&str> = pipeline.stages().map(|stage| stage.name()).collect();
        assert_eq!(names, vec!["et", "blocker/port"]);

        let mesh = RectilinearMesh::uniform([3, 3, 3], 1.0).expect("mesh should build");
        assert!(pipeline.init_all(&mesh).is_empty());
        assert_eq!(pipeline.active_count(), 2);
    }

    #[test]
    fn invalid_field_type_is_rejected_with_path() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = write_config(
            &temp,
            r#"{"nyquist_steps": 10, "stages": [
                {"type": "frequency_domain", "name": "et", "field_type": 2, "frequencies": [1.0]}
            ]}"#,
        );

        let error = load_processing_config(&path).expect_err("selector 2 should be rejected");
        assert!(matches!(error, ConfigError::Invalid { .. }));
        assert!(error.to_string().contains("field_type 2"));

        let error = ProbeError::from(error);
        assert_eq!(error.category(), ProbeErrorCategory::InputValidationError);
        assert_eq!(error.code(), "INPUT.CONFIG_INVALID");
    }

    #[test]
    fn duplicate_names_and_zero_phase_count_are_rejected() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = write_config(
            &temp,
            r#"{"nyquist_steps": 10, "stages": [
                {"type": "frequency_domain", "name": "et", "frequencies": [1.0]},
                {"type": "frequency_domain", "name": "et", "frequencies": [2.0]}
            ]}"#,
        );
        let error = load_processing_config(&path).expect_err("duplicate names should fail");
        assert!(error.to_string().contains("used more than once"));

        let path = write_config(
            &temp,
            r#"{"nyquist_steps": 10, "stages": [
                {"type": "frequency_domain", "name": "et", "frequencies": [1.0], "phase_count": 0}
            ]}"#,
        );
        let error = load_processing_config(&path).expect_err("zero phase count should fail");
        assert!(error.to_string().contains("phase_count"));
    }

    #[test]
    fn unreadable_and_malformed_files_map_to_distinct_errors() {
        let temp = TempDir::new().expect("tempdir should be created");
        let error = load_processing_config(temp.path().join("missing.json"))
            .expect_err("missing file should fail");
        assert!(matches!(error, ConfigError::Read { .. }));
        assert_eq!(ProbeError::from(error).category(), ProbeErrorCategory::IoSystemError);

        let path = write_config(&temp, "{\"stages\": [}");
        let error = load_processing_config(&path).expect_err("broken json should fail");
        assert!(matches!(error, ConfigError::Parse { .. }));
    }
}
