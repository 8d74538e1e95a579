use super::{SpectralDataset, StructuredSink, write_text_artifact};
use crate::domain::{OutputArtifact, ProbeError, ProbeResult};
use crate::mesh::{MeshDescription, MeshGeometry};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

pub const DATASET_GROUP: &str = "/FieldData/FD";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerDocument {
    pub mesh: MeshDescription,
    #[serde(rename = "FieldData")]
    pub field_data: FieldData,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct FieldData {
    #[serde(rename = "FD")]
    pub datasets: BTreeMap<String, SpectralRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectralRecord {
    pub field_name: String,
    pub frequency: f64,
    pub scale: f64,
    pub shape: [usize; 3],
    /// Per component, values in node storage order.
    pub real: [Vec<f64>; 3],
    pub imag: [Vec<f64>; 3],
}

impl SpectralRecord {
    /// Largest normalized magnitude per component.
    pub fn peak_magnitudes(&self) -> [f64; 3] {
        std::array::from_fn(|axis| {
            self.real[axis]
                .iter()
                .zip(&self.imag[axis])
                .map(|(re, im)| re.hypot(*im) * self.scale)
                .fold(0.0, f64::max)
        })
    }
}

impl ContainerDocument {
    /// Datasets ordered by their numeric suffix.
    pub fn ordered_datasets(&self) -> Vec<(&str, &SpectralRecord)> {
        let mut datasets: Vec<_> = self
            .field_data
            .datasets
            .iter()
            .map(|(name, record)| (name.as_str(), record))
            .collect();
        datasets.sort_by_key(|(name, _)| {
            name.trim_start_matches('f').parse::<usize>().unwrap_or(usize::MAX)
        });
        datasets
    }
}

#[derive(Debug, Clone)]
pub struct JsonFieldContainer {
    directory: PathBuf,
    base_name: String,
}

impl JsonFieldContainer {
    pub fn new(directory: impl Into<PathBuf>, base_name: impl Into<String>) -> Self {
        Self {
            directory: directory.into(),
            base_name: base_name.into(),
        }
    }

    pub fn path(&self) -> PathBuf {
        self.directory.join(format!("{}.json", self.base_name))
    }
}

pub fn describe_mesh(mesh: &dyn MeshGeometry) -> MeshDescription {
    MeshDescription {
        lines: std::array::from_fn(|axis| {
            (0..mesh.number_of_lines(axis))
                .map(|index| mesh.disc_line(axis, index, false))
                .collect()
        }),
        grid_delta: mesh.grid_delta(),
        mesh_type: mesh.mesh_type(),
    }
}

impl StructuredSink for JsonFieldContainer {
    fn write_spectra(
        &mut self,
        field_name: &str,
        mesh: &dyn MeshGeometry,
        datasets: &[SpectralDataset<'_>],
    ) -> ProbeResult<OutputArtifact> {
        let mut field_data = FieldData::default();
        for dataset in datasets {
            let components = dataset.field.components();
            let record = SpectralRecord {
                field_name: field_name.to_string(),
                frequency: dataset.frequency,
                scale: dataset.scale,
                shape: dataset.field.shape(),
                real: std::array::from_fn(|axis| {
                    components[axis].as_slice().iter().map(|value| value.re).collect()
                }),
                imag: std::array::from_fn(|axis| {
                    components[axis].as_slice().iter().map(|value| value.im).collect()
                }),
            };
            field_data
                .datasets
                .insert(format!("f{}", dataset.index), record);
        }

        let document = ContainerDocument {
            mesh: describe_mesh(mesh),
            field_data,
        };
        let path = self.path();
        let content = serde_json::to_string_pretty(&document).map_err(|source| {
            ProbeError::internal(
                "IO.CONTAINER_ENCODE",
                format!("failed to encode container '{}': {}", path.display(), source),
            )
        })?;
        write_text_artifact(&path, &content).map_err(|source| {
            ProbeError::io_system(
                "IO.CONTAINER_WRITE",
                format!("failed to write container '{}': {}", path.display(), source),
            )
        })?;

        Ok(OutputArtifact::new(format!("{}.json", self.base_name)))
    }
}

pub fn load_container(path: &Path) -> ProbeResult<ContainerDocument> {
    let content = fs::read_to_string(path).map_err(|source| {
        ProbeError::io_system(
            "IO.CONTAINER_READ",
            format!("failed to read container '{}': {}", path.display(), source),
        )
    })?;
    serde_json::from_str(&content).map_err(|source| {
        ProbeError::input_validation(
            "INPUT.CONTAINER_PARSE",
            format!("failed to parse container '{}': {}", path.display(), source),
        )
    })
}
