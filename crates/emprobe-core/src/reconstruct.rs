use crate::domain::{FieldKind, tangential_axes};
use crate::engine::FieldEngine;
use crate::grid::{VectorGrid3, positions};
use crate::mesh::MeshGeometry;

pub fn node_value<E: FieldEngine + ?Sized>(
    engine: &E,
    mesh: &dyn MeshGeometry,
    kind: FieldKind,
    axis: usize,
    pos: [usize; 3],
) -> f64 {
    match kind {
        FieldKind::Electric => electric_node_value(engine, mesh, axis, pos),
        FieldKind::Magnetic => magnetic_node_value(engine, mesh, axis, pos),
    }
}

/// Electric field along `axis` at a primary node, interpolated from the two
/// adjacent edge voltages. Zero on the first and last line of `axis` and
/// wherever an adjacent cell has zero width.
pub fn electric_node_value<E: FieldEngine + ?Sized>(
    engine: &E,
    mesh: &dyn MeshGeometry,
    axis: usize,
    pos: [usize; 3],
) -> f64 {
    let last = mesh.number_of_lines(axis).saturating_sub(1);
    if pos[axis] == 0 || pos[axis] >= last {
        return 0.0;
    }

    let mut down = pos;
    down[axis] -= 1;
    let delta = mesh.mesh_delta(axis, pos, false);
    let delta_down = mesh.mesh_delta(axis, down, false);
    if delta == 0.0 || delta_down == 0.0 {
        return 0.0;
    }

    let delta_rel = delta / (delta + delta_down);
    engine.voltage(axis, pos) * (1.0 - delta_rel) / delta
        + engine.voltage(axis, down) / delta_down * delta_rel
}

/// Magnetic field along `axis`, averaged over the four dual edges that
/// circle the node in the transverse plane.
pub fn magnetic_node_value<E: FieldEngine + ?Sized>(
    engine: &E,
    mesh: &dyn MeshGeometry,
    axis: usize,
    pos: [usize; 3],
) -> f64 {
    if pos[axis] == 0 || pos[axis] + 1 >= mesh.number_of_lines(axis) {
        return 0.0;
    }
    let [first, second] = tangential_axes(axis);
    if pos[first] + 1 >= mesh.number_of_lines(first)
        || pos[second] + 1 >= mesh.number_of_lines(second)
    {
        return 0.0;
    }

    let loop_value = |at: [usize; 3]| {
        let width = mesh.mesh_delta(axis, at, true);
        if width == 0.0 {
            0.0
        } else {
            engine.current(axis, at) / width
        }
    };

    let mut at = pos;
    let mut sum = loop_value(at);
    at[first] += 1;
    sum += loop_value(at);
    at[second] += 1;
    sum += loop_value(at);
    at[first] -= 1;
    sum += loop_value(at);
    sum / 4.0
}

pub fn field_snapshot<E: FieldEngine + ?Sized>(
    engine: &E,
    mesh: &dyn MeshGeometry,
    kind: FieldKind,
) -> VectorGrid3<f64> {
    let shape = mesh.shape();
    let mut snapshot = VectorGrid3::new(shape);
    for axis in 0..3 {
        let component = snapshot.component_mut(axis);
        for (value, pos) in component.as_mut_slice().iter_mut().zip(positions(shape)) {
            *value = node_value(engine, mesh, kind, axis, pos);
        }
    }
    snapshot
}
