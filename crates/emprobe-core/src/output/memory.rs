use super::{IntegralRow, IntegralSink, SnapshotRequest, SnapshotSink, SpectralDataset, StructuredSink};
use crate::domain::{OutputArtifact, ProbeError, ProbeResult};
use crate::grid::VectorGrid3;
use crate::mesh::MeshGeometry;
use num_complex::Complex64;
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSnapshot {
    pub file_stem: String,
    pub field_name: String,
    pub field: VectorGrid3<f64>,
}

/// Clones share their records, so a caller can keep a handle while a stage
/// owns the boxed sink.
#[derive(Debug, Clone, Default)]
pub struct MemorySnapshotSink {
    records: Rc<RefCell<Vec<RecordedSnapshot>>>,
    fail_stems: Rc<RefCell<Vec<String>>>,
}

impl MemorySnapshotSink {
    /// Makes writes whose file stem contains `pattern` fail with an I/O error.
    pub fn fail_when_stem_contains(&self, pattern: impl Into<String>) {
        self.fail_stems.borrow_mut().push(pattern.into());
    }

    pub fn records(&self) -> Vec<RecordedSnapshot> {
        self.records.borrow().clone()
    }

    pub fn file_stems(&self) -> Vec<String> {
        self.records
            .borrow()
            .iter()
            .map(|record| record.file_stem.clone())
            .collect()
    }
}

impl SnapshotSink for MemorySnapshotSink {
    fn write_snapshot(&mut self, request: &SnapshotRequest<'_>) -> ProbeResult<OutputArtifact> {
        if self
            .fail_stems
            .borrow()
            .iter()
            .any(|pattern| request.file_stem.contains(pattern.as_str()))
        {
            return Err(ProbeError::io_system(
                "IO.SNAPSHOT_WRITE",
                format!("refused snapshot '{}'", request.file_stem),
            ));
        }
        self.records.borrow_mut().push(RecordedSnapshot {
            file_stem: request.file_stem.to_string(),
            field_name: request.field_name.to_string(),
            field: request.field.clone(),
        });
        Ok(OutputArtifact::new(request.file_stem))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedSpectrum {
    pub index: usize,
    pub frequency: f64,
    pub scale: f64,
    pub field: VectorGrid3<Complex64>,
}

#[derive(Debug, Clone, Default)]
pub struct MemoryStructuredSink {
    spectra: Rc<RefCell<Vec<RecordedSpectrum>>>,
}

impl MemoryStructuredSink {
    pub fn spectra(&self) -> Vec<RecordedSpectrum> {
        self.spectra.borrow().clone()
    }
}

impl StructuredSink for MemoryStructuredSink {
    fn write_spectra(
        &mut self,
        field_name: &str,
        _mesh: &dyn MeshGeometry,
        datasets: &[SpectralDataset<'_>],
    ) -> ProbeResult<OutputArtifact> {
        let mut spectra = self.spectra.borrow_mut();
        for dataset in datasets {
            spectra.push(RecordedSpectrum {
                index: dataset.index,
                frequency: dataset.frequency,
                scale: dataset.scale,
                field: dataset.field.clone(),
            });
        }
        Ok(OutputArtifact::new(field_name))
    }
}

#[derive(Debug, Clone, Default)]
pub struct MemoryIntegralSink {
    rows: Rc<RefCell<Vec<IntegralRow>>>,
}

impl MemoryIntegralSink {
    pub fn rows(&self) -> Vec<IntegralRow> {
        self.rows.borrow().clone()
    }
}

impl IntegralSink for MemoryIntegralSink {
    fn write_row(&mut self, row: &IntegralRow) -> ProbeResult<()> {
        self.rows.borrow_mut().push(row.clone());
        Ok(())
    }
}
