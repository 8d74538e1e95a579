use super::{SnapshotRequest, SnapshotSink, write_text_artifact};
use crate::domain::{MeshType, OutputArtifact, ProbeError, ProbeResult};
use crate::grid::positions;
use std::path::{Path, PathBuf};

/// Legacy ASCII VTK. Cylindrical meshes are written as Cartesian points with
/// vector-valued fields rotated out of (rho, alpha, z).
#[derive(Debug, Clone)]
pub struct VtkSnapshotWriter {
    directory: PathBuf,
    precision: usize,
}

impl VtkSnapshotWriter {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            precision: 6,
        }
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn render(&self, request: &SnapshotRequest<'_>) -> String {
        let mesh = request.mesh;
        let shape = mesh.shape();
        let scale = mesh.grid_delta();
        let precision = self.precision;
        let mut out = String::new();

        out.push_str("# vtk DataFile Version 3.0\n");
        out.push_str(&format!(
            "Interpolation: {} | mesh scale: {}\n",
            request.interpolation, scale
        ));
        out.push_str("ASCII\n");

        let cylindrical = mesh.mesh_type() == MeshType::Cylindrical;
        if cylindrical {
            out.push_str("DATASET STRUCTURED_GRID\n");
            out.push_str(&format!("DIMENSIONS {} {} {}\n", shape[0], shape[1], shape[2]));
            out.push_str(&format!("POINTS {} double\n", shape.iter().product::<usize>()));
            for pos in vtk_order(shape) {
                let rho = mesh.disc_line(0, pos[0], false) * scale;
                let alpha = mesh.disc_line(1, pos[1], false);
                let z = mesh.disc_line(2, pos[2], false) * scale;
                out.push_str(&format!(
                    "{:.precision$e} {:.precision$e} {:.precision$e}\n",
                    rho * alpha.cos(),
                    rho * alpha.sin(),
                    z
                ));
            }
        } else {
            out.push_str("DATASET RECTILINEAR_GRID\n");
            out.push_str(&format!("DIMENSIONS {} {} {}\n", shape[0], shape[1], shape[2]));
            for (axis, label) in ["X", "Y", "Z"].iter().enumerate() {
                out.push_str(&format!("{label}_COORDINATES {} double\n", shape[axis]));
                let line = (0..shape[axis])
                    .map(|index| format!("{:.precision$e}", mesh.disc_line(axis, index, false) * scale))
                    .collect::<Vec<_>>()
                    .join(" ");
                out.push_str(&format!("{line}\n"));
            }
        }

        out.push_str(&format!("POINT_DATA {}\n", shape.iter().product::<usize>()));
        out.push_str(&format!("VECTORS {} double\n", request.field_name));
        let field = request.field;
        for pos in vtk_order(shape) {
            let mut vector = [
                field.component(0)[pos],
                field.component(1)[pos],
                field.component(2)[pos],
            ];
            if cylindrical && request.vector_valued {
                vector = rotate_to_cartesian(vector, mesh.disc_line(1, pos[1], false));
            }
            out.push_str(&format!(
                "{:.precision$e} {:.precision$e} {:.precision$e}\n",
                vector[0], vector[1], vector[2]
            ));
        }
        out
    }
}

impl SnapshotSink for VtkSnapshotWriter {
    fn write_snapshot(&mut self, request: &SnapshotRequest<'_>) -> ProbeResult<OutputArtifact> {
        let file_name = format!("{}.vtk", request.file_stem);
        let path = self.directory.join(&file_name);
        write_text_artifact(&path, &self.render(request)).map_err(|source| {
            ProbeError::io_system(
                "IO.SNAPSHOT_WRITE",
                format!("failed to write snapshot '{}': {}", path.display(), source),
            )
        })?;
        Ok(OutputArtifact::new(file_name))
    }
}

// VTK expects the first axis to vary fastest.
fn vtk_order(shape: [usize; 3]) -> impl Iterator<Item = [usize; 3]> {
    positions([shape[2], shape[1], shape[0]]).map(|[k, j, i]| [i, j, k])
}

fn rotate_to_cartesian([rho, alpha, z]: [f64; 3], angle: f64) -> [f64; 3] {
    let (sin, cos) = angle.sin_cos();
    [rho * cos - alpha * sin, rho * sin + alpha * cos, z]
}
