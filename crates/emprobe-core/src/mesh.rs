//! Mesh geometry queries consumed by the stages.
//!
//! Line coordinates are kept in drawing units and scaled by `grid_delta` on
//! the way out, so widths and areas are in meters. On a cylindrical mesh the
//! axes are (rho, alpha, z) and alpha coordinates are radians.

use crate::domain::MeshType;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("mesh axis {axis} has no lines")]
    EmptyAxis { axis: usize },
    #[error("mesh axis {axis} line {index} is not finite: {value}")]
    NonFiniteLine { axis: usize, index: usize, value: f64 },
    #[error("mesh axis {axis} must be strictly increasing, line {index} has {current} after {previous}")]
    NonIncreasing {
        axis: usize,
        index: usize,
        previous: f64,
        current: f64,
    },
    #[error("cylindrical mesh radius lines must be >= 0, got {value}")]
    NegativeRadius { value: f64 },
    #[error("grid delta must be finite and > 0, got {value}")]
    InvalidGridDelta { value: f64 },
}

pub trait MeshGeometry {
    fn mesh_type(&self) -> MeshType;

    /// Drawing-unit to meter scale.
    fn grid_delta(&self) -> f64;

    fn number_of_lines(&self, axis: usize) -> usize;

    /// Node coordinate in drawing units on the primary or dual mesh.
    fn disc_line(&self, axis: usize, index: usize, dual: bool) -> f64;

    /// Cell width in meters along `axis` at `pos`; zero outside the mesh.
    fn mesh_delta(&self, axis: usize, pos: [usize; 3], dual: bool) -> f64;

    /// Width of the cell a node owns, which is the cell width of the other mesh.
    fn node_width(&self, axis: usize, pos: [usize; 3], dual: bool) -> f64 {
        self.mesh_delta(axis, pos, !dual)
    }

    /// Differential area of a node on a plane with the given normal axis.
    fn node_area(&self, normal: usize, pos: [usize; 3], dual: bool) -> f64 {
        let [first, second] = crate::domain::tangential_axes(normal);
        self.node_width(first, pos, dual) * self.node_width(second, pos, dual)
    }

    fn shape(&self) -> [usize; 3] {
        [
            self.number_of_lines(0),
            self.number_of_lines(1),
            self.number_of_lines(2),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshDescription {
    pub lines: [Vec<f64>; 3],
    #[serde(default = "default_grid_delta")]
    pub grid_delta: f64,
    #[serde(default)]
    pub mesh_type: MeshType,
}

fn default_grid_delta() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "MeshDescription", into = "MeshDescription")]
pub struct RectilinearMesh {
    lines: [Vec<f64>; 3],
    grid_delta: f64,
    mesh_type: MeshType,
}

impl RectilinearMesh {
    pub fn new(lines: [Vec<f64>; 3], grid_delta: f64, mesh_type: MeshType) -> Result<Self, MeshError> {
        if !grid_delta.is_finite() || grid_delta <= 0.0 {
            return Err(MeshError::InvalidGridDelta { value: grid_delta });
        }
        for (axis, axis_lines) in lines.iter().enumerate() {
            validate_axis(axis, axis_lines)?;
        }
        if mesh_type == MeshType::Cylindrical {
            if let Some(&value) = lines[0].iter().find(|value| **value < 0.0) {
                return Err(MeshError::NegativeRadius { value });
            }
        }

        Ok(Self {
            lines,
            grid_delta,
            mesh_type,
        })
    }

    /// Evenly spaced Cartesian mesh starting at the origin.
    pub fn uniform(shape: [usize; 3], spacing: f64) -> Result<Self, MeshError> {
        let axis = |count: usize| (0..count).map(|index| index as f64 * spacing).collect();
        Self::new(
            [axis(shape[0]), axis(shape[1]), axis(shape[2])],
            1.0,
            MeshType::Cartesian,
        )
    }

    pub fn lines(&self, axis: usize) -> &[f64] {
        &self.lines[axis]
    }

    fn index_delta(&self, axis: usize, index: usize) -> f64 {
        let lines = &self.lines[axis];
        match lines.len() {
            0 | 1 => 0.0,
            count if index + 1 < count => lines[index + 1] - lines[index],
            count if index + 1 == count => lines[index] - lines[index - 1],
            _ => 0.0,
        }
    }

    // Dual cells are clipped to the mesh extent, so the end nodes own half a cell.
    fn index_width(&self, axis: usize, index: usize) -> f64 {
        let lines = &self.lines[axis];
        let count = lines.len();
        if count < 2 || index >= count {
            return 0.0;
        }
        if index == 0 {
            return (lines[1] - lines[0]) / 2.0;
        }
        if index + 1 == count {
            return (lines[index] - lines[index - 1]) / 2.0;
        }
        (lines[index + 1] - lines[index - 1]) / 2.0
    }

    fn radius(&self, pos: [usize; 3], dual: bool) -> f64 {
        self.disc_line(0, pos[0], dual) * self.grid_delta
    }
}

impl TryFrom<MeshDescription> for RectilinearMesh {
    type Error = MeshError;

    fn try_from(description: MeshDescription) -> Result<Self, Self::Error> {
        Self::new(description.lines, description.grid_delta, description.mesh_type)
    }
}

impl From<RectilinearMesh> for MeshDescription {
    fn from(mesh: RectilinearMesh) -> Self {
        Self {
            lines: mesh.lines,
            grid_delta: mesh.grid_delta,
            mesh_type: mesh.mesh_type,
        }
    }
}

impl MeshGeometry for RectilinearMesh {
    fn mesh_type(&self) -> MeshType {
        self.mesh_type
    }

    fn grid_delta(&self) -> f64 {
        self.grid_delta
    }

    fn number_of_lines(&self, axis: usize) -> usize {
        self.lines.get(axis).map_or(0, Vec::len)
    }

    fn disc_line(&self, axis: usize, index: usize, dual: bool) -> f64 {
        let lines = &self.lines[axis];
        let Some(&line) = lines.get(index) else {
            return 0.0;
        };
        if !dual {
            return line;
        }
        match lines.get(index + 1) {
            Some(next) => (line + next) / 2.0,
            None if index > 0 => line + (line - lines[index - 1]) / 2.0,
            None => line,
        }
    }

    fn mesh_delta(&self, axis: usize, pos: [usize; 3], dual: bool) -> f64 {
        if axis > 2 || pos[axis] >= self.lines[axis].len() {
            return 0.0;
        }
        let delta = if dual {
            self.index_width(axis, pos[axis])
        } else {
            self.index_delta(axis, pos[axis])
        };
        let delta = delta.abs() * self.grid_delta;
        if self.mesh_type == MeshType::Cylindrical && axis == 1 {
            return delta * self.radius(pos, dual);
        }
        delta
    }

    fn node_width(&self, axis: usize, pos: [usize; 3], dual: bool) -> f64 {
        if axis > 2 || pos[axis] >= self.lines[axis].len() {
            return 0.0;
        }
        let width = if dual {
            self.index_delta(axis, pos[axis])
        } else {
            self.index_width(axis, pos[axis])
        };
        let width = width.abs() * self.grid_delta;
        if self.mesh_type == MeshType::Cylindrical && axis == 1 {
            return width * self.radius(pos, dual);
        }
        width
    }
}

fn validate_axis(axis: usize, lines: &[f64]) -> Result<(), MeshError> {
    if lines.is_empty() {
        return Err(MeshError::EmptyAxis { axis });
    }
    for (index, &value) in lines.iter().enumerate() {
        if !value.is_finite() {
            return Err(MeshError::NonFiniteLine { axis, index, value });
        }
        if index > 0 && value <= lines[index - 1] {
            return Err(MeshError::NonIncreasing {
                axis,
                index,
                previous: lines[index - 1],
                current: value,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{MeshError, MeshGeometry, RectilinearMesh};
    use crate::domain::MeshType;
    use std::f64::consts::PI;

    fn graded_mesh() -> RectilinearMesh {
        RectilinearMesh::new(
            [vec![0.0, 1.0, 3.0, 6.0], vec![0.0, 2.0, 4.0], vec![0.0]],
            1.0e-3,
            MeshType::Cartesian,
        )
        .expect("mesh should build")
    }

    #[test]
    fn primary_deltas_use_forward_difference_with_backward_last_cell() {
        let mesh = graded_mesh();
        let deltas: Vec<f64> = (0..4)
            .map(|index| mesh.mesh_delta(0, [index, 0, 0], false))
            .collect();
        let expected = [1.0e-3, 2.0e-3, 3.0e-3, 3.0e-3];
        for (actual, expected) in deltas.iter().zip(expected) {
            assert!((actual - expected).abs() < 1.0e-15);
        }
        assert_eq!(mesh.mesh_delta(0, [4, 0, 0], false), 0.0);
    }

    #[test]
    fn node_widths_partition_the_axis_extent() {
        let mesh = graded_mesh();
        let total: f64 = (0..4).map(|index| mesh.node_width(0, [index, 0, 0], false)).sum();
        assert!((total - 6.0e-3).abs() < 1.0e-15);
    }

    #[test]
    fn dual_lines_sit_between_primary_lines() {
        let mesh = graded_mesh();
        assert_eq!(mesh.disc_line(0, 1, true), 2.0);
        assert_eq!(mesh.disc_line(0, 3, true), 7.5);
        assert_eq!(mesh.disc_line(2, 0, true), 0.0);
    }

    #[test]
    fn node_area_multiplies_tangential_widths() {
        let mesh = graded_mesh();
        let area = mesh.node_area(2, [1, 1, 0], false);
        assert!((area - 1.5e-3 * 2.0e-3).abs() < 1.0e-18);
    }

    #[test]
    fn cylindrical_angular_width_scales_with_radius() {
        let mesh = RectilinearMesh::new(
            [vec![1.0, 2.0, 3.0], vec![0.0, PI / 4.0, PI / 2.0], vec![0.0, 1.0]],
            1.0,
            MeshType::Cylindrical,
        )
        .expect("mesh should build");

        let width = mesh.mesh_delta(1, [1, 0, 0], false);
        assert!((width - 2.0 * PI / 4.0).abs() < 1.0e-12);
        let node = mesh.node_width(1, [2, 1, 0], false);
        assert!((node - 3.0 * PI / 4.0).abs() < 1.0e-12);
    }

    #[test]
    fn constructor_rejects_invalid_lines() {
        let error = RectilinearMesh::new(
            [vec![0.0, 1.0, 1.0], vec![0.0], vec![0.0]],
            1.0,
            MeshType::Cartesian,
        )
        .expect_err("duplicate line should fail");
        assert!(matches!(error, MeshError::NonIncreasing { axis: 0, index: 2, .. }));

        let error = RectilinearMesh::new(
            [vec![-1.0, 1.0], vec![0.0], vec![0.0]],
            1.0,
            MeshType::Cylindrical,
        )
        .expect_err("negative radius should fail");
        assert_eq!(error, MeshError::NegativeRadius { value: -1.0 });

        let error = RectilinearMesh::new([vec![], vec![0.0], vec![0.0]], 1.0, MeshType::Cartesian)
            .expect_err("empty axis should fail");
        assert_eq!(error, MeshError::EmptyAxis { axis: 0 });
    }

    #[test]
    fn mesh_description_deserializes_with_defaults() {
        let mesh: RectilinearMesh =
            serde_json::from_str(r#"{"lines": [[0, 1], [0, 1, 2], [0]]}"#)
                .expect("mesh json should parse");
        assert_eq!(mesh.shape(), [2, 3, 1]);
        assert_eq!(mesh.grid_delta(), 1.0);
        assert_eq!(mesh.mesh_type(), MeshType::Cartesian);
    }
}
