pub mod config;
pub mod domain;
pub mod engine;
pub mod expression;
pub mod grid;
pub mod mesh;
pub mod output;
pub mod reconstruct;
pub mod schedule;
pub mod stages;

pub use domain::{
    FieldKind, MeshType, OutputArtifact, ProbeError, ProbeErrorCategory, ProbeResult, StageKind,
};
pub use engine::FieldEngine;
pub use grid::{Grid2, Grid3, VectorGrid3};
pub use mesh::{MeshGeometry, RectilinearMesh};
pub use schedule::{ProcessInterval, StageSchedule};
pub use stages::{
    FinalizeReport, FrequencyDomainStage, ModeMatchStage, OverlapResult, SensorPlane, Stage,
    StageContext, StageDisabled, StagePipeline, StageState,
};
