use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// How units of a given accelerator talk to each other.
/// Only PCIe is treated as bus-limited when scaling out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Interconnect {
    Pcie,
    Sxm,
    Nvlink,
    InfinityFabric,
}

impl Interconnect {
    pub fn label(&self) -> &'static str {
        match self {
            Interconnect::Pcie => "PCIe",
            Interconnect::Sxm => "SXM",
            Interconnect::Nvlink => "NVLink",
            Interconnect::InfinityFabric => "Infinity Fabric",
        }
    }
}

/// A cloud provider offering the hardware. Display only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Provider {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareSpec {
    pub name: String,
    pub manufacturer: String,
    pub vram_gb: f64,
    /// On-demand price for a single unit. `None` when no public price is known.
    #[serde(default)]
    pub price_per_hour: Option<f64>,
    pub interconnect: Interconnect,
    #[serde(default)]
    pub providers: Vec<Provider>,
}

impl HardwareSpec {
    pub fn primary_provider(&self) -> Option<&Provider> {
        self.providers.first()
    }
}

const GPUS_JSON: &str = include_str!("../data/gpus.json");

/// Read-only GPU catalog used for recommendations.
pub struct HardwareCatalog {
    gpus: Vec<HardwareSpec>,
}

impl HardwareCatalog {
    /// The catalog shipped with the binary.
    pub fn load() -> Result<Self> {
        Self::from_json(GPUS_JSON)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let gpus: Vec<HardwareSpec> = serde_json::from_str(json)?;
        Ok(HardwareCatalog { gpus })
    }

    /// Load a catalog with the same schema from disk.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| FitError::CatalogIo {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json(&text)?;
        tracing::info!(
            path = %path.display(),
            entries = catalog.gpus.len(),
            "loaded hardware catalog"
        );
        Ok(catalog)
    }

    pub fn gpus(&self) -> &[HardwareSpec] {
        &self.gpus
    }

    pub fn find(&self, name: &str) -> Option<&HardwareSpec> {
        self.gpus
            .iter()
            .find(|g| g.name.eq_ignore_ascii_case(name.trim()))
    }
}

/// Parse a human-readable memory size into decimal gigabytes.
/// Accepts "80", "80G", "80GB", "80000M", "1.5T" and the like.
/// Returns `None` if the input is malformed.
pub fn parse_memory_size(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    let num_end = s
        .find(|c: char| !c.is_ascii_digit() && c != '.')
        .unwrap_or(s.len());
    let (num_str, suffix) = s.split_at(num_end);
    let value: f64 = num_str.parse().ok()?;

    match suffix.trim().to_lowercase().as_str() {
        "g" | "gb" | "" => Some(value),
        "m" | "mb" => Some(value / 1000.0),
        "t" | "tb" => Some(value * 1000.0),
        _ => None,
    }
}
