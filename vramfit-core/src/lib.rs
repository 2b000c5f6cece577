//! Memory sizing and hardware selection for LLM deployments.
//!
//! [`estimate`] turns a model shape, quantization choices, context length and
//! batch size into a VRAM breakdown. [`fit`] matches that requirement against
//! a GPU catalog and ranks the options. Both are pure functions over the
//! read-only catalogs in [`models`], [`hardware`] and [`compare`].

pub mod compare;
pub mod error;
pub mod estimate;
pub mod fit;
pub mod hardware;
pub mod models;

pub use error::{FitError, Result};
pub use estimate::{EstimateRequest, OverheadModel, VramEstimate, estimate_vram, estimate_vram_with};
pub use fit::{
    FitStatus, GpuRecommendation, MatchConfig, MatchPolicy, recommend_hardware,
    recommend_hardware_with,
};
pub use hardware::{HardwareCatalog, HardwareSpec};
pub use models::{ModelArchitecture, ModelDatabase};
