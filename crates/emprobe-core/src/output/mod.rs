pub mod container;
pub mod integral;
pub mod memory;
pub mod vtk;

pub use container::{ContainerDocument, JsonFieldContainer, SpectralRecord, load_container};
pub use integral::TextIntegralWriter;
pub use memory::{MemoryIntegralSink, MemorySnapshotSink, MemoryStructuredSink};
pub use vtk::VtkSnapshotWriter;

use crate::domain::{OutputArtifact, ProbeResult};
use crate::grid::VectorGrid3;
use crate::mesh::MeshGeometry;
use num_complex::Complex64;
use std::fs;
use std::path::Path;

/// One named real vector field over the full node grid.
pub struct SnapshotRequest<'a> {
    /// File name without extension; the sink adds its own.
    pub file_stem: &'a str,
    pub field_name: &'a str,
    pub interpolation: &'a str,
    pub field: &'a VectorGrid3<f64>,
    pub mesh: &'a dyn MeshGeometry,
    /// Whether the three components are a physical vector in mesh
    /// coordinates. Magnitude and phase maps are not.
    pub vector_valued: bool,
}

pub trait SnapshotSink {
    fn write_snapshot(&mut self, request: &SnapshotRequest<'_>) -> ProbeResult<OutputArtifact>;
}

/// Raw accumulated spectrum at one frequency. The physical field is
/// `field * scale`.
pub struct SpectralDataset<'a> {
    pub index: usize,
    pub frequency: f64,
    pub scale: f64,
    pub field: &'a VectorGrid3<Complex64>,
}

pub trait StructuredSink {
    fn write_spectra(
        &mut self,
        field_name: &str,
        mesh: &dyn MeshGeometry,
        datasets: &[SpectralDataset<'_>],
    ) -> ProbeResult<OutputArtifact>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct IntegralRow {
    pub time: f64,
    pub values: Vec<f64>,
}

pub trait IntegralSink {
    fn write_row(&mut self, row: &IntegralRow) -> ProbeResult<()>;
}

pub fn format_fixed_f64(value: f64, width: usize, precision: usize) -> String {
    format!("{value:>width$.precision$}")
}

pub fn format_scientific_f64(value: f64, precision: usize) -> String {
    format!("{value:.precision$e}")
}

pub fn normalize_text_artifact(content: &str) -> String {
    let mut normalized = content.replace("\r\n", "\n").replace('\r', "\n");
    if !normalized.is_empty() && !normalized.ends_with('\n') {
        normalized.push('\n');
    }
    normalized
}

pub fn write_text_artifact(path: &Path, content: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, normalize_text_artifact(content))
}

#[cfg(test)]
mod tests {
    use super::{format_fixed_f64, format_scientific_f64, normalize_text_artifact, write_text_artifact};
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn fixed_and_scientific_formatting_is_deterministic() {
        assert_eq!(format_fixed_f64(1.23, 10, 3), "     1.230");
        assert_eq!(format_scientific_f64(1500.0, 3), "1.500e3");
    }

    #[test]
    fn normalize_text_artifact_uses_canonical_line_endings() {
        assert_eq!(normalize_text_artifact("a\r\nb\rc"), "a\nb\nc\n");
        assert_eq!(normalize_text_artifact(""), "");
    }

    #[test]
    fn text_writes_create_parent_directories() {
        let temp = TempDir::new().expect("tempdir should be created");
        let path = temp.path().join("nested").join("rows.txt");

        write_text_artifact(&path, "1\t2").expect("write should succeed");
        let content = fs::read_to_string(&path).expect("artifact should be readable");
        assert_eq!(content, "1\t2\n");
    }
}
