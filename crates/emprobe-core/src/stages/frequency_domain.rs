//! Running discrete Fourier transform of a full-grid field.
//!
//! Every eligible step adds `field(t) * exp(-i 2 pi f t)` into one complex
//! vector grid per tracked frequency. Finalize scales by `1/SampleCount` and
//! hands the spectra to the configured sink.

use super::{FinalizeReport, Stage, StageContext, StageCore, StageDisabled, StageState};
use crate::domain::{FieldKind, ProbeError, ProbeResult, StageKind};
use crate::grid::VectorGrid3;
use crate::mesh::MeshGeometry;
use crate::output::{SnapshotRequest, SnapshotSink, SpectralDataset, StructuredSink};
use crate::schedule::StageSchedule;
use num_complex::Complex64;
use std::f64::consts::PI;

pub const DEFAULT_PHASE_COUNT: usize = 21;

pub enum SpectralOutput {
    /// Phase-rotated real projections plus magnitude and phase maps.
    Snapshot {
        sink: Box<dyn SnapshotSink>,
        phase_count: usize,
    },
    /// Raw complex spectra with frequency and scale metadata.
    Structured { sink: Box<dyn StructuredSink> },
}

impl SpectralOutput {
    pub fn snapshot(sink: impl SnapshotSink + 'static) -> Self {
        Self::Snapshot {
            sink: Box::new(sink),
            phase_count: DEFAULT_PHASE_COUNT,
        }
    }

    pub fn structured(sink: impl StructuredSink + 'static) -> Self {
        Self::Structured {
            sink: Box::new(sink),
        }
    }
}

pub struct FrequencyDomainStage {
    core: StageCore,
    kind: FieldKind,
    frequencies: Vec<f64>,
    output: SpectralOutput,
    spectra: Vec<VectorGrid3<Complex64>>,
    sample_count: u64,
}

impl FrequencyDomainStage {
    pub fn new(
        name: impl Into<String>,
        kind: FieldKind,
        frequencies: Vec<f64>,
        schedule: StageSchedule,
        output: SpectralOutput,
    ) -> Self {
        Self {
            core: StageCore::new(name, schedule),
            kind,
            frequencies,
            output,
            spectra: Vec::new(),
            sample_count: 0,
        }
    }

    pub fn field_kind(&self) -> FieldKind {
        self.kind
    }

    pub fn frequencies(&self) -> &[f64] {
        &self.frequencies
    }

    pub fn sample_count(&self) -> u64 {
        self.sample_count
    }

    /// Accumulated, unnormalized spectrum at frequency index `index`.
    pub fn spectrum(&self, index: usize) -> Option<&VectorGrid3<Complex64>> {
        self.spectra.get(index)
    }

    /// Adds one time-domain sample taken at `time`.
    pub fn accumulate(&mut self, time: f64, field: &VectorGrid3<f64>) -> ProbeResult<()> {
        if !self.core.state.is_active() {
            return Err(ProbeError::internal(
                "RUN.STAGE_INACTIVE",
                format!("stage '{}' cannot accumulate in state {:?}", self.core.name, self.core.state),
            ));
        }
        if let Some(expected) = self.spectra.first().map(VectorGrid3::shape) {
            if field.shape() != expected {
                return Err(ProbeError::internal(
                    "RUN.FIELD_SHAPE",
                    format!(
                        "stage '{}' expects field shape {:?}, got {:?}",
                        self.core.name,
                        expected,
                        field.shape()
                    ),
                ));
            }
        }

        for (frequency, spectrum) in self.frequencies.iter().zip(&mut self.spectra) {
            let phase = Complex64::from_polar(1.0, -2.0 * PI * frequency * time);
            for axis in 0..3 {
                let target = spectrum.component_mut(axis).as_mut_slice();
                let source = field.component(axis).as_slice();
                for (acc, value) in target.iter_mut().zip(source) {
                    *acc += phase * *value;
                }
            }
        }
        self.sample_count += 1;
        self.core.state = StageState::Accumulating;
        Ok(())
    }

    fn write_snapshots(
        &mut self,
        mesh: &dyn MeshGeometry,
        interpolation: &str,
        report: &mut FinalizeReport,
    ) {
        let SpectralOutput::Snapshot { sink, phase_count } = &mut self.output else {
            return;
        };
        let scale = 1.0 / self.sample_count as f64;
        let field_name = self.kind.field_name();
        let phase_count = (*phase_count).max(1);

        for (frequency, spectrum) in self.frequencies.iter().zip(&self.spectra) {
            let prefix = format!("{}_f={frequency:.6}", self.core.name);
            let mut outputs = Vec::with_capacity(phase_count + 2);

            for phase in 0..phase_count {
                let rotation = Complex64::from_polar(1.0, 2.0 * PI * phase as f64 / phase_count as f64);
                let degrees = phase * 360 / phase_count;
                outputs.push((
                    format!("{prefix}_p={degrees:03}"),
                    spectrum.map(|value| (value * rotation).re * scale),
                    true,
                ));
            }
            outputs.push((
                format!("{prefix}_abs"),
                spectrum.map(|value| value.norm() * scale),
                false,
            ));
            outputs.push((format!("{prefix}_arg"), spectrum.map(|value| value.arg()), false));

            for (file_stem, field, vector_valued) in &outputs {
                let request = SnapshotRequest {
                    file_stem,
                    field_name,
                    interpolation,
                    field,
                    mesh,
                    vector_valued: *vector_valued,
                };
                match sink.write_snapshot(&request) {
                    Ok(artifact) => report.artifacts.push(artifact),
                    Err(error) => {
                        tracing::warn!(stage = %self.core.name, code = error.code(), "{}", error.message());
                        report.warnings.push(error);
                    }
                }
            }
        }
    }

    fn write_structured(&mut self, mesh: &dyn MeshGeometry, report: &mut FinalizeReport) {
        let SpectralOutput::Structured { sink } = &mut self.output else {
            return;
        };
        let scale = 1.0 / self.sample_count as f64;
        let datasets: Vec<SpectralDataset<'_>> = self
            .frequencies
            .iter()
            .zip(&self.spectra)
            .enumerate()
            .map(|(index, (frequency, field))| SpectralDataset {
                index,
                frequency: *frequency,
                scale,
                field,
            })
            .collect();

        match sink.write_spectra(self.kind.field_name(), mesh, &datasets) {
            Ok(artifact) => report.artifacts.push(artifact),
            Err(error) => {
                tracing::warn!(stage = %self.core.name, code = error.code(), "{}", error.message());
                report.warnings.push(error);
            }
        }
    }
}

impl Stage for FrequencyDomainStage {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn kind(&self) -> StageKind {
        StageKind::FrequencyDomain
    }

    fn state(&self) -> StageState {
        self.core.state
    }

    fn schedule(&self) -> &StageSchedule {
        &self.core.schedule
    }

    fn init(&mut self, mesh: &dyn MeshGeometry) -> Result<(), StageDisabled> {
        if let Some(outcome) = self.core.repeated_init() {
            return outcome;
        }
        if self.frequencies.is_empty() {
            return self.core.disable(StageKind::FrequencyDomain, StageDisabled::EmptyFrequencySet);
        }

        let shape = mesh.shape();
        self.spectra = self
            .frequencies
            .iter()
            .map(|_| VectorGrid3::new(shape))
            .collect();
        self.sample_count = 0;
        self.core.state = StageState::Initialized;
        tracing::info!(
            stage = %self.core.name,
            field = self.kind.field_name(),
            frequencies = self.frequencies.len(),
            shape = ?shape,
            interval = self.core.schedule.interval(),
            "frequency-domain stage initialized"
        );
        Ok(())
    }

    fn step(&mut self, ctx: &StageContext<'_>) -> Option<u64> {
        let timestep = ctx.timestep();
        if !self.is_eligible(timestep) {
            return self.next_interval(timestep);
        }

        let time = ctx.engine.time(self.kind.uses_dual_time());
        let field = ctx.engine.field_snapshot(ctx.mesh, self.kind);
        match self.accumulate(time, &field) {
            Ok(()) => tracing::debug!(
                stage = %self.core.name,
                timestep,
                time,
                samples = self.sample_count,
                "accumulated frequency-domain sample"
            ),
            Err(error) => tracing::warn!(stage = %self.core.name, code = error.code(), "{}", error.message()),
        }
        self.next_interval(timestep)
    }

    fn finalize(&mut self, ctx: &StageContext<'_>) -> FinalizeReport {
        let mut report = FinalizeReport::default();
        if !self.core.state.is_active() {
            return report;
        }
        self.core.state = StageState::Finalized;

        if self.sample_count == 0 {
            let warning = ProbeError::computation(
                "COMPUTE.NO_SAMPLES",
                format!("stage '{}' finished without any accumulated sample", self.core.name),
            );
            tracing::warn!(stage = %self.core.name, code = warning.code(), "{}", warning.message());
            report.warnings.push(warning);
            return report;
        }

        let interpolation = ctx.engine.interpolation_label().to_string();
        self.write_snapshots(ctx.mesh, &interpolation, &mut report);
        self.write_structured(ctx.mesh, &mut report);

        tracing::info!(
            stage = %self.core.name,
            samples = self.sample_count,
            artifacts = report.artifacts.len(),
            failures = report.warnings.len(),
            "frequency-domain stage finalized"
        );
        report
    }
}
