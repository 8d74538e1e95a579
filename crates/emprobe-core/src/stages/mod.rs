pub mod frequency_domain;
pub mod mode_match;
pub mod pipeline;

pub use frequency_domain::{FrequencyDomainStage, SpectralOutput, DEFAULT_PHASE_COUNT};
pub use mode_match::{ModeMatchStage, OverlapResult, SensorPlane, MODE_VARIABLES};
pub use pipeline::StagePipeline;

use crate::domain::{OutputArtifact, ProbeError, StageKind};
use crate::engine::FieldEngine;
use crate::mesh::MeshGeometry;
use crate::schedule::StageSchedule;

/// What a stage sees of the running simulation at one timestep.
#[derive(Clone, Copy)]
pub struct StageContext<'a> {
    pub engine: &'a dyn FieldEngine,
    pub mesh: &'a dyn MeshGeometry,
}

impl<'a> StageContext<'a> {
    pub fn new(engine: &'a dyn FieldEngine, mesh: &'a dyn MeshGeometry) -> Self {
        Self { engine, mesh }
    }

    pub fn timestep(&self) -> u64 {
        self.engine.timestep_count()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StageState {
    #[default]
    Uninitialized,
    Initialized,
    Accumulating,
    Finalized,
    Disabled,
}

impl StageState {
    pub const fn is_active(self) -> bool {
        matches!(self, Self::Initialized | Self::Accumulating)
    }
}

/// Why a stage switched itself off during `init`. Disabling never aborts
/// the run; the stage simply ignores every later hook.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StageDisabled {
    #[error("frequency set is empty")]
    EmptyFrequencySet,
    #[error("sensor region is not a surface (found dimension: {dimension})")]
    NotASurface { dimension: usize },
    #[error("sensor bound {index} on axis {axis} is outside the mesh ({lines} lines)")]
    OutsideMesh {
        axis: usize,
        index: usize,
        lines: usize,
    },
    #[error("failed to parse mode function '{expression}' for axis {axis} at character {position}: {message}")]
    ExpressionParse {
        axis: usize,
        expression: String,
        position: usize,
        message: String,
    },
    #[error("mode template has zero norm")]
    ZeroTemplateNorm,
}

impl StageDisabled {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::EmptyFrequencySet => "INPUT.EMPTY_FREQUENCY_SET",
            Self::NotASurface { .. } => "INPUT.SENSOR_NOT_SURFACE",
            Self::OutsideMesh { .. } => "INPUT.SENSOR_OUTSIDE_MESH",
            Self::ExpressionParse { .. } => "INPUT.MODE_EXPRESSION",
            Self::ZeroTemplateNorm => "COMPUTE.ZERO_TEMPLATE_NORM",
        }
    }
}

impl From<&StageDisabled> for ProbeError {
    fn from(reason: &StageDisabled) -> Self {
        match reason {
            StageDisabled::ZeroTemplateNorm => ProbeError::computation(reason.code(), reason.to_string()),
            _ => ProbeError::input_validation(reason.code(), reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct FinalizeReport {
    pub artifacts: Vec<OutputArtifact>,
    pub warnings: Vec<ProbeError>,
}

pub trait Stage {
    fn name(&self) -> &str;

    fn kind(&self) -> StageKind;

    fn state(&self) -> StageState;

    fn schedule(&self) -> &StageSchedule;

    /// Allocates buffers for `mesh`. A returned reason leaves the stage
    /// permanently disabled.
    fn init(&mut self, mesh: &dyn MeshGeometry) -> Result<(), StageDisabled>;

    fn is_eligible(&self, timestep: u64) -> bool {
        self.state().is_active() && self.schedule().is_eligible(timestep)
    }

    fn next_interval(&self, timestep: u64) -> Option<u64> {
        if !self.state().is_active() {
            return None;
        }
        self.schedule().next_interval(timestep)
    }

    /// Processes the current timestep if eligible and reports the distance to
    /// the next timestep the stage wants to see.
    fn step(&mut self, ctx: &StageContext<'_>) -> Option<u64>;

    fn finalize(&mut self, ctx: &StageContext<'_>) -> FinalizeReport;
}

/// Bookkeeping shared by every stage implementation.
#[derive(Debug, Clone)]
pub(crate) struct StageCore {
    pub(crate) name: String,
    pub(crate) schedule: StageSchedule,
    pub(crate) state: StageState,
    pub(crate) disabled: Option<StageDisabled>,
}

impl StageCore {
    pub(crate) fn new(name: impl Into<String>, schedule: StageSchedule) -> Self {
        Self {
            name: name.into(),
            schedule,
            state: StageState::Uninitialized,
            disabled: None,
        }
    }

    /// Result for a repeated `init`: the earlier outcome, or `None` when the
    /// stage still has to initialize.
    pub(crate) fn repeated_init(&self) -> Option<Result<(), StageDisabled>> {
        match (&self.state, &self.disabled) {
            (StageState::Uninitialized, _) => None,
            (_, Some(reason)) => Some(Err(reason.clone())),
            _ => Some(Ok(())),
        }
    }

    pub(crate) fn disable(&mut self, kind: StageKind, reason: StageDisabled) -> Result<(), StageDisabled> {
        tracing::warn!(
            stage = %self.name,
            kind = %kind,
            code = reason.code(),
            "stage disabled: {reason}"
        );
        self.state = StageState::Disabled;
        self.disabled = Some(reason.clone());
        Err(reason)
    }
}
