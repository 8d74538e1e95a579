pub mod errors;

pub use errors::{ProbeError, ProbeErrorCategory, ProbeResult};

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageKind {
    FrequencyDomain,
    ModeMatch,
}

impl StageKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FrequencyDomain => "FREQUENCY_DOMAIN",
            Self::ModeMatch => "MODE_MATCH",
        }
    }
}

impl Display for StageKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

/// Which staggered field a stage samples.
///
/// Electric values are reconstructed from edge voltages on the primary mesh,
/// magnetic values from face currents on the dual mesh half a timestep later.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    #[default]
    Electric,
    Magnetic,
}

impl FieldKind {
    pub const fn from_selector(selector: u8) -> Option<Self> {
        match selector {
            0 => Some(Self::Electric),
            1 => Some(Self::Magnetic),
            _ => None,
        }
    }

    pub const fn selector(self) -> u8 {
        match self {
            Self::Electric => 0,
            Self::Magnetic => 1,
        }
    }

    pub const fn field_name(self) -> &'static str {
        match self {
            Self::Electric => "E-Field",
            Self::Magnetic => "H-Field",
        }
    }

    pub const fn uses_dual_time(self) -> bool {
        matches!(self, Self::Magnetic)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeshType {
    #[default]
    Cartesian,
    Cylindrical,
}

impl MeshType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cartesian => "cartesian",
            Self::Cylindrical => "cylindrical",
        }
    }
}

/// Tangential axes of a plane with the given normal, in rotation order.
pub const fn tangential_axes(normal: usize) -> [usize; 2] {
    [(normal + 1) % 3, (normal + 2) % 3]
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputArtifact {
    pub relative_path: PathBuf,
}

impl OutputArtifact {
    pub fn new(relative_path: impl Into<PathBuf>) -> Self {
        Self {
            relative_path: relative_path.into(),
        }
    }
}
