use crate::domain::FieldKind;
use crate::grid::VectorGrid3;
use crate::mesh::MeshGeometry;
use crate::reconstruct;

/// Read-only view of the field-update engine after a completed timestep.
///
/// Voltages live on primary-mesh edges and currents on dual-mesh edges, both
/// addressed by the node index at the lower end of the edge.
pub trait FieldEngine {
    fn timestep_count(&self) -> u64;

    /// Simulation time of the current step; `dual` selects the half-step
    /// shifted time on which magnetic quantities are defined.
    fn time(&self, dual: bool) -> f64;

    fn voltage(&self, axis: usize, pos: [usize; 3]) -> f64;

    fn current(&self, axis: usize, pos: [usize; 3]) -> f64;

    fn interpolation_label(&self) -> &str {
        "Node Interpolation"
    }

    /// Full-grid node snapshot of one field.
    fn field_snapshot(&self, mesh: &dyn MeshGeometry, kind: FieldKind) -> VectorGrid3<f64> {
        reconstruct::field_snapshot(self, mesh, kind)
    }
}
