use super::{IntegralRow, IntegralSink, format_scientific_f64};
use crate::domain::{ProbeError, ProbeResult};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Tab-separated time series, one row per processed step, behind a `%`
/// comment header naming the columns.
#[derive(Debug)]
pub struct TextIntegralWriter {
    path: PathBuf,
    precision: usize,
    writer: BufWriter<File>,
}

impl TextIntegralWriter {
    pub fn create(path: impl Into<PathBuf>, columns: &[&str], precision: usize) -> ProbeResult<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| write_error(&path, source))?;
        }
        let file = File::create(&path).map_err(|source| write_error(&path, source))?;
        let mut writer = BufWriter::new(file);

        let mut header = String::from("% time");
        for column in columns {
            header.push('\t');
            header.push_str(column);
        }
        writeln!(writer, "{header}").map_err(|source| write_error(&path, source))?;

        Ok(Self {
            path,
            precision,
            writer,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl IntegralSink for TextIntegralWriter {
    fn write_row(&mut self, row: &IntegralRow) -> ProbeResult<()> {
        let mut line = format_scientific_f64(row.time, self.precision);
        for value in &row.values {
            line.push('\t');
            line.push_str(&format_scientific_f64(*value, self.precision));
        }
        writeln!(self.writer, "{line}")
            .and_then(|()| self.writer.flush())
            .map_err(|source| write_error(&self.path, source))
    }
}

fn write_error(path: &Path, source: std::io::Error) -> ProbeError {
    ProbeError::io_system(
        "IO.INTEGRAL_WRITE",
        format!("failed to write integral rows '{}': {}", path.display(), source),
    )
}
