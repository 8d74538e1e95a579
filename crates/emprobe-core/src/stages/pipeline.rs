use super::{FinalizeReport, Stage, StageContext, StageState};
use crate::domain::ProbeError;
use crate::mesh::MeshGeometry;

/// Ordered set of stages driven together by the simulation loop.
pub struct StagePipeline {
    stages: Vec<Box<dyn Stage>>,
    max_interval: u64,
}

impl StagePipeline {
    /// `max_interval` bounds how far the driver may run ahead between calls
    /// to [`StagePipeline::process`].
    pub fn new(max_interval: u64) -> Self {
        Self {
            stages: Vec::new(),
            max_interval: max_interval.max(1),
        }
    }

    pub fn push(&mut self, stage: impl Stage + 'static) {
        self.stages.push(Box::new(stage));
    }

    pub fn push_boxed(&mut self, stage: Box<dyn Stage>) {
        self.stages.push(stage);
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    pub fn stages(&self) -> impl Iterator<Item = &dyn Stage> {
        self.stages.iter().map(|stage| stage.as_ref())
    }

    pub fn active_count(&self) -> usize {
        self.stages
            .iter()
            .filter(|stage| stage.state().is_active())
            .count()
    }

    /// Initializes every stage; disabled ones are reported and then skipped
    /// for the rest of the run.
    pub fn init_all(&mut self, mesh: &dyn MeshGeometry) -> Vec<ProbeError> {
        let mut disabled = Vec::new();
        for stage in &mut self.stages {
            if let Err(reason) = stage.init(mesh) {
                let error = ProbeError::from(&reason);
                disabled.push(ProbeError::new(
                    error.category(),
                    error.code(),
                    format!("{}: {}", stage.name(), error.message()),
                ));
            }
        }
        tracing::info!(
            stages = self.stages.len(),
            active = self.active_count(),
            "processing pipeline initialized"
        );
        disabled
    }

    /// Steps every active stage and returns the number of timesteps until the
    /// earliest stage wants to run again.
    pub fn process(&mut self, ctx: &StageContext<'_>) -> u64 {
        let mut next = self.max_interval;
        for stage in &mut self.stages {
            if !stage.state().is_active() {
                continue;
            }
            if let Some(step) = stage.step(ctx).filter(|step| *step > 0) {
                next = next.min(step);
            }
        }
        next
    }

    pub fn finalize_all(&mut self, ctx: &StageContext<'_>) -> FinalizeReport {
        let mut report = FinalizeReport::default();
        for stage in &mut self.stages {
            if stage.state() == StageState::Disabled {
                continue;
            }
            let stage_report = stage.finalize(ctx);
            report.artifacts.extend(stage_report.artifacts);
            report.warnings.extend(stage_report.warnings);
        }
        report
    }
}
