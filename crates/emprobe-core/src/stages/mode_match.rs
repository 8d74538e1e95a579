//! Overlap of the live field on a sensor plane with an analytic mode.
//!
//! The mode template is evaluated once at init from one expression per
//! tangential axis and normalized so that `sum(template^2 * area) == 1`.
//! Each eligible step then integrates `field * template * area` (the raw
//! overlap) and `field^2 * area` (the purity) over the plane.

use super::{FinalizeReport, Stage, StageContext, StageCore, StageDisabled, StageState};
use crate::domain::{FieldKind, MeshType, StageKind, tangential_axes};
use crate::expression::{ExpressionParser, FunctionParser, ModeExpression};
use crate::grid::Grid2;
use crate::mesh::MeshGeometry;
use crate::output::{IntegralRow, IntegralSink};
use crate::reconstruct;
use crate::schedule::StageSchedule;

/// Variable order handed to the expression parser.
pub const MODE_VARIABLES: [&str; 7] = ["x", "y", "z", "rho", "a", "r", "t"];

/// Axis-aligned index box that must collapse on exactly one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorPlane {
    start: [usize; 3],
    stop: [usize; 3],
}

impl SensorPlane {
    /// Bounds given in reverse order are swapped per axis.
    pub fn new(start: [usize; 3], stop: [usize; 3]) -> Self {
        let mut plane = Self { start, stop };
        for axis in 0..3 {
            if plane.start[axis] > plane.stop[axis] {
                std::mem::swap(&mut plane.start[axis], &mut plane.stop[axis]);
            }
        }
        plane
    }

    pub fn start(&self) -> [usize; 3] {
        self.start
    }

    pub fn stop(&self) -> [usize; 3] {
        self.stop
    }

    /// Number of axes the box extends along.
    pub fn dimension(&self) -> usize {
        (0..3).filter(|&axis| self.stop[axis] > self.start[axis]).count()
    }

    pub fn normal_axis(&self) -> Option<usize> {
        if self.dimension() != 2 {
            return None;
        }
        (0..3).find(|&axis| self.stop[axis] == self.start[axis])
    }

    /// Node counts along the two tangential axes of `normal`.
    pub fn line_counts(&self, normal: usize) -> [usize; 2] {
        tangential_axes(normal).map(|axis| self.stop[axis] - self.start[axis] + 1)
    }

    /// Mesh position of plane node `[p, pp]`.
    pub fn node(&self, normal: usize, [p, pp]: [usize; 2]) -> [usize; 3] {
        let [first, second] = tangential_axes(normal);
        let mut pos = self.start;
        pos[first] += p;
        pos[second] += pp;
        pos
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OverlapResult {
    pub value: f64,
    pub purity: f64,
    pub coupling_ratio: f64,
}

/// Values of [`MODE_VARIABLES`] at a primary-mesh node, in meters and radians.
pub fn mode_variables(mesh: &dyn MeshGeometry, pos: [usize; 3]) -> [f64; 7] {
    let scale = mesh.grid_delta();
    let line = |axis: usize| mesh.disc_line(axis, pos[axis], false);

    let (x, y, z, rho, a) = match mesh.mesh_type() {
        MeshType::Cartesian => {
            let (x, y, z) = (line(0) * scale, line(1) * scale, line(2) * scale);
            (x, y, z, x.hypot(y), y.atan2(x))
        }
        MeshType::Cylindrical => {
            let (rho, a, z) = (line(0) * scale, line(1), line(2) * scale);
            (rho * a.cos(), rho * a.sin(), z, rho, a)
        }
    };
    let r = (rho * rho + z * z).sqrt();
    let t = std::f64::consts::FRAC_PI_2 - (z / rho).atan();
    [x, y, z, rho, a, r, t]
}

pub struct ModeMatchStage {
    core: StageCore,
    kind: FieldKind,
    plane: SensorPlane,
    mode_functions: [String; 3],
    parser: Box<dyn ExpressionParser>,
    sink: Option<Box<dyn IntegralSink>>,
    normal: usize,
    template: [Grid2<f64>; 2],
    last_result: Option<OverlapResult>,
}

impl ModeMatchStage {
    /// `mode_functions` holds one expression per mesh axis; only the two
    /// tangential to the plane are used.
    pub fn new(
        name: impl Into<String>,
        kind: FieldKind,
        plane: SensorPlane,
        mode_functions: [String; 3],
        schedule: StageSchedule,
    ) -> Self {
        Self {
            core: StageCore::new(name, schedule),
            kind,
            plane,
            mode_functions,
            parser: Box::new(FunctionParser),
            sink: None,
            normal: 0,
            template: [Grid2::new([0, 0]), Grid2::new([0, 0])],
            last_result: None,
        }
    }

    pub fn with_parser(mut self, parser: impl ExpressionParser + 'static) -> Self {
        self.parser = Box::new(parser);
        self
    }

    pub fn with_integral_sink(mut self, sink: impl IntegralSink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    pub fn field_kind(&self) -> FieldKind {
        self.kind
    }

    pub fn plane(&self) -> SensorPlane {
        self.plane
    }

    pub fn normal_axis(&self) -> Option<usize> {
        self.has_template().then_some(self.normal)
    }

    /// Normalized template for tangential component `n` (0 or 1).
    pub fn template(&self, n: usize) -> &Grid2<f64> {
        &self.template[n]
    }

    pub fn last_result(&self) -> Option<OverlapResult> {
        self.last_result
    }

    fn has_template(&self) -> bool {
        !matches!(
            self.core.state,
            StageState::Uninitialized | StageState::Disabled
        )
    }

    fn parse_functions(&self) -> Result<[Box<dyn ModeExpression>; 2], StageDisabled> {
        let parse = |axis: usize| {
            let expression = &self.mode_functions[axis];
            self.parser
                .parse(expression, &MODE_VARIABLES)
                .map_err(|error| StageDisabled::ExpressionParse {
                    axis,
                    expression: expression.clone(),
                    position: error.position,
                    message: error.message,
                })
        };
        let [first, second] = tangential_axes(self.normal);
        Ok([parse(first)?, parse(second)?])
    }

    fn build_template(&mut self, mesh: &dyn MeshGeometry) -> Result<(), StageDisabled> {
        let functions = self.parse_functions()?;
        let shape = self.plane.line_counts(self.normal);
        let mut template = [Grid2::new(shape), Grid2::new(shape)];

        let mut norm = 0.0;
        for p in 0..shape[0] {
            for pp in 0..shape[1] {
                let pos = self.plane.node(self.normal, [p, pp]);
                let variables = mode_variables(mesh, pos);
                let area = mesh.node_area(self.normal, pos, false);
                for (grid, function) in template.iter_mut().zip(&functions) {
                    let value = function.evaluate(&variables);
                    let value = if value.is_finite() { value } else { 0.0 };
                    grid[[p, pp]] = value;
                    norm += value * value * area;
                }
            }
        }

        let norm = norm.sqrt();
        if norm == 0.0 || !norm.is_finite() {
            return Err(StageDisabled::ZeroTemplateNorm);
        }
        for grid in &mut template {
            grid.as_mut_slice().iter_mut().for_each(|value| *value /= norm);
        }
        self.template = template;
        Ok(())
    }

    /// Projects the current field onto the template. Returns zeros until a
    /// template exists.
    pub fn compute_overlap(&self, ctx: &StageContext<'_>) -> OverlapResult {
        if !self.has_template() {
            return OverlapResult::default();
        }
        let shape = self.plane.line_counts(self.normal);
        let axes = tangential_axes(self.normal);

        let mut value = 0.0;
        let mut purity = 0.0;
        for p in 0..shape[0] {
            for pp in 0..shape[1] {
                let pos = self.plane.node(self.normal, [p, pp]);
                let area = ctx.mesh.node_area(self.normal, pos, false);
                for (grid, axis) in self.template.iter().zip(axes) {
                    let field = reconstruct::node_value(ctx.engine, ctx.mesh, self.kind, axis, pos);
                    value += field * grid[[p, pp]] * area;
                    purity += field * field * area;
                }
            }
        }

        let coupling_ratio = if purity != 0.0 {
            value * value / purity
        } else {
            0.0
        };
        OverlapResult {
            value,
            purity,
            coupling_ratio,
        }
    }
}

impl Stage for ModeMatchStage {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn kind(&self) -> StageKind {
        StageKind::ModeMatch
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

        let Some(normal) = self.plane.normal_axis() else {
            let dimension = self.plane.dimension();
            return self
                .core
                .disable(StageKind::ModeMatch, StageDisabled::NotASurface { dimension });
        };
        for axis in 0..3 {
            let lines = mesh.number_of_lines(axis);
            if self.plane.stop[axis] >= lines {
                let reason = StageDisabled::OutsideMesh {
                    axis,
                    index: self.plane.stop[axis],
                    lines,
                };
                return self.core.disable(StageKind::ModeMatch, reason);
            }
        }

        self.normal = normal;
        if let Err(reason) = self.build_template(mesh) {
            return self.core.disable(StageKind::ModeMatch, reason);
        }

        self.core.state = StageState::Initialized;
        tracing::info!(
            stage = %self.core.name,
            field = self.kind.field_name(),
            normal,
            nodes = ?self.plane.line_counts(normal),
            "mode-match stage initialized"
        );
        Ok(())
    }

    fn step(&mut self, ctx: &StageContext<'_>) -> Option<u64> {
        let timestep = ctx.timestep();
        if !self.is_eligible(timestep) {
            return self.next_interval(timestep);
        }

        let result = self.compute_overlap(ctx);
        let time = ctx.engine.time(self.kind.uses_dual_time());
        if let Some(sink) = self.sink.as_mut() {
            let row = IntegralRow {
                time,
                values: vec![result.value, result.coupling_ratio],
            };
            if let Err(error) = sink.write_row(&row) {
                tracing::warn!(stage = %self.core.name, code = error.code(), "{}", error.message());
            }
        }
        tracing::debug!(
            stage = %self.core.name,
            timestep,
            time,
            value = result.value,
            ratio = result.coupling_ratio,
            "computed mode overlap"
        );

        self.last_result = Some(result);
        self.core.state = StageState::Accumulating;
        self.next_interval(timestep)
    }

    fn finalize(&mut self, _ctx: &StageContext<'_>) -> FinalizeReport {
        if !self.core.state.is_active() {
            return FinalizeReport::default();
        }
        self.core.state = StageState::Finalized;
        if let Some(result) = self.last_result {
            tracing::info!(
                stage = %self.core.name,
                value = result.value,
                ratio = result.coupling_ratio,
                "mode-match stage finalized"
            );
        }
        FinalizeReport::default()
    }
}
