use serde::Serialize;

use crate::error::{FitError, Result, require_non_negative, require_positive};
use crate::hardware::{HardwareSpec, Interconnect};

/// Share of nominal VRAM treated as addressable. The rest covers reserved
/// and non-addressable memory.
pub const DEFAULT_USABLE_FRACTION: f64 = 0.90;

/// Advisory attached to multi-unit PCIe configurations.
pub const PCIE_WARNING: &str = "PCIe — lower multi-GPU throughput";

/// What callers should show when no candidate survives the policy.
pub const MULTI_NODE_MESSAGE: &str =
    "Requires multi-node setup (8+ GPUs). Contact provider for availability.";

/// How safely a configuration meets the requirement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum FitStatus {
    Excellent,    // one unit, >20% headroom
    Good,         // several units, >20% headroom
    Tight,        // 10-20% headroom
    OomRisk,      // <10% headroom
    Insufficient, // one unit cannot hold the requirement
}

impl FitStatus {
    /// Ranking tier. Lower sorts first.
    pub fn tier(&self) -> u8 {
        match self {
            FitStatus::Excellent | FitStatus::Good => 0,
            FitStatus::Tight | FitStatus::OomRisk => 1,
            FitStatus::Insufficient => 2,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            FitStatus::Excellent => "Excellent",
            FitStatus::Good => "Good",
            FitStatus::Tight => "Tight",
            FitStatus::OomRisk => "OOM Risk",
            FitStatus::Insufficient => "Insufficient",
        }
    }

    pub fn emoji(&self) -> &'static str {
        match self {
            FitStatus::Excellent => "🟢",
            FitStatus::Good => "🟢",
            FitStatus::Tight => "🟡",
            FitStatus::OomRisk => "🟠",
            FitStatus::Insufficient => "🔴",
        }
    }
}

/// Extra filtering layered on top of the headroom algorithm for catalogs
/// sold in fixed node sizes.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConservativeLimits {
    /// GPU counts a node can be provisioned with, ascending.
    pub allowed_counts: Vec<u32>,
    /// Largest unit count allowed on PCIe hardware.
    pub pcie_max_count: u32,
    /// Candidates below this utilization are dropped as over-provisioned.
    pub min_utilization_pct: f64,
}

impl Default for ConservativeLimits {
    fn default() -> Self {
        ConservativeLimits {
            allowed_counts: vec![1, 2, 4, 8],
            pcie_max_count: 2,
            min_utilization_pct: 15.0,
        }
    }
}

impl ConservativeLimits {
    fn validate(&self) -> Result<()> {
        if self.allowed_counts.is_empty() || self.allowed_counts.contains(&0) {
            return Err(FitError::invalid(
                "allowed_counts",
                "must be a non-empty list of positive counts",
            ));
        }
        if self.pcie_max_count == 0 {
            return Err(FitError::invalid("pcie_max_count", "must be at least 1"));
        }
        require_non_negative("min_utilization_pct", self.min_utilization_pct)
    }

    /// Smallest allowed count that is at least `needed`.
    fn round_up(&self, needed: u32) -> Option<u32> {
        self.allowed_counts
            .iter()
            .copied()
            .filter(|&n| n >= needed)
            .min()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "policy", rename_all = "kebab-case")]
pub enum MatchPolicy {
    /// Every catalog entry is returned with its minimal GPU count.
    Headroom,
    Conservative(ConservativeLimits),
}

impl MatchPolicy {
    pub fn label(&self) -> &'static str {
        match self {
            MatchPolicy::Headroom => "headroom",
            MatchPolicy::Conservative(_) => "conservative",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "headroom" | "default" => Some(MatchPolicy::Headroom),
            "conservative" => Some(MatchPolicy::Conservative(ConservativeLimits::default())),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchConfig {
    pub usable_fraction: f64,
    pub policy: MatchPolicy,
}

impl Default for MatchConfig {
    fn default() -> Self {
        MatchConfig {
            usable_fraction: DEFAULT_USABLE_FRACTION,
            policy: MatchPolicy::Headroom,
        }
    }
}

impl MatchConfig {
    pub fn with_policy(policy: MatchPolicy) -> Self {
        MatchConfig {
            policy,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<()> {
        require_positive("usable_fraction", self.usable_fraction)?;
        if self.usable_fraction > 1.0 {
            return Err(FitError::invalid(
                "usable_fraction",
                format!("must be at most 1.0, got {}", self.usable_fraction),
            ));
        }
        if let MatchPolicy::Conservative(limits) = &self.policy {
            limits.validate()?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GpuRecommendation {
    pub hardware: HardwareSpec,
    pub gpu_count: u32,
    pub total_available_gb: f64,
    pub utilization_pct: f64,
    pub headroom_pct: f64,
    pub fit_status: FitStatus,
    /// `None` when the hardware has no known price.
    pub estimated_price_per_hour: Option<f64>,
    pub warning: Option<String>,
}

/// Rank the catalog against a memory requirement with the default config.
pub fn recommend_hardware(
    required_gb: f64,
    catalog: &[HardwareSpec],
) -> Result<Vec<GpuRecommendation>> {
    recommend_hardware_with(required_gb, catalog, &MatchConfig::default())
}

pub fn recommend_hardware_with(
    required_gb: f64,
    catalog: &[HardwareSpec],
    config: &MatchConfig,
) -> Result<Vec<GpuRecommendation>> {
    require_positive("required_vram_gb", required_gb)?;
    config.validate()?;

    let mut recs = Vec::with_capacity(catalog.len());
    for gpu in catalog {
        if !gpu.vram_gb.is_finite() || gpu.vram_gb <= 0.0 {
            tracing::warn!(gpu = %gpu.name, vram_gb = gpu.vram_gb, "skipping catalog entry without VRAM capacity");
            continue;
        }

        let needed = minimal_gpu_count(required_gb, gpu.vram_gb, config.usable_fraction)?;
        let rec = match &config.policy {
            MatchPolicy::Headroom => Some(evaluate(
                required_gb,
                gpu,
                needed,
                config.usable_fraction,
            )),
            MatchPolicy::Conservative(limits) => {
                refine_conservative(required_gb, gpu, needed, config.usable_fraction, limits)
            }
        };
        if let Some(rec) = rec {
            recs.push(rec);
        }
    }

    tracing::debug!(
        required_gb,
        policy = config.policy.label(),
        candidates = recs.len(),
        "ranked hardware"
    );
    Ok(rank_recommendations(recs))
}

/// Smallest count whose usable capacity covers `required_gb`, at least 1.
fn minimal_gpu_count(required_gb: f64, vram_gb: f64, usable_fraction: f64) -> Result<u32> {
    let usable = vram_gb * usable_fraction;
    let count = (required_gb / usable).ceil().max(1.0);
    if !count.is_finite() || count > u32::MAX as f64 {
        return Err(FitError::invalid(
            "required_vram_gb",
            format!("{} GB cannot be covered by any count of {} GB units", required_gb, vram_gb),
        ));
    }
    Ok(count as u32)
}

fn evaluate(
    required_gb: f64,
    gpu: &HardwareSpec,
    gpu_count: u32,
    usable_fraction: f64,
) -> GpuRecommendation {
    let total_available_gb = gpu.vram_gb * gpu_count as f64;
    let utilization_pct = required_gb / total_available_gb * 100.0;
    let headroom_pct = (total_available_gb - required_gb) / total_available_gb * 100.0;
    let needs_multi = required_gb > gpu.vram_gb * usable_fraction;

    GpuRecommendation {
        hardware: gpu.clone(),
        gpu_count,
        total_available_gb,
        utilization_pct,
        headroom_pct,
        fit_status: classify_fit(needs_multi, gpu_count, headroom_pct),
        estimated_price_per_hour: gpu.price_per_hour.map(|p| p * gpu_count as f64),
        warning: None,
    }
}

/// Headroom banding. `needs_multi` is set when one unit's usable capacity
/// is below the requirement.
fn classify_fit(needs_multi: bool, gpu_count: u32, headroom_pct: f64) -> FitStatus {
    if needs_multi {
        if gpu_count == 1 {
            FitStatus::Insufficient
        } else if headroom_pct > 20.0 {
            FitStatus::Good
        } else if headroom_pct >= 10.0 {
            FitStatus::Tight
        } else {
            FitStatus::OomRisk
        }
    } else if headroom_pct > 20.0 {
        FitStatus::Excellent
    } else if headroom_pct >= 10.0 {
        FitStatus::Tight
    } else {
        FitStatus::OomRisk
    }
}

fn refine_conservative(
    required_gb: f64,
    gpu: &HardwareSpec,
    needed: u32,
    usable_fraction: f64,
    limits: &ConservativeLimits,
) -> Option<GpuRecommendation> {
    let Some(gpu_count) = limits.round_up(needed) else {
        tracing::debug!(gpu = %gpu.name, needed, "needs more GPUs than a single node allows");
        return None;
    };

    let is_pcie = gpu.interconnect == Interconnect::Pcie;
    if is_pcie && gpu_count > limits.pcie_max_count {
        tracing::debug!(gpu = %gpu.name, gpu_count, "PCIe scale-out beyond limit");
        return None;
    }

    let mut rec = evaluate(required_gb, gpu, gpu_count, usable_fraction);
    if rec.utilization_pct < limits.min_utilization_pct {
        tracing::debug!(
            gpu = %gpu.name,
            utilization_pct = rec.utilization_pct,
            "over-provisioned"
        );
        return None;
    }
    if is_pcie && gpu_count > 1 {
        rec.warning = Some(PCIE_WARNING.to_string());
    }
    Some(rec)
}

/// Status tier first, then ascending utilization, then name.
pub fn rank_recommendations(recs: Vec<GpuRecommendation>) -> Vec<GpuRecommendation> {
    let mut ranked = recs;
    ranked.sort_by(|a, b| {
        a.fit_status
            .tier()
            .cmp(&b.fit_status.tier())
            .then_with(|| a.utilization_pct.total_cmp(&b.utilization_pct))
            .then_with(|| a.hardware.name.cmp(&b.hardware.name))
    });
    ranked
}

/// Column to sort the recommendation table by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortColumn {
    Name,
    Vram,
    GpuCount,
    Utilization,
    Price,
}

impl SortColumn {
    pub fn label(&self) -> &str {
        match self {
            SortColumn::Name => "GPU",
            SortColumn::Vram => "VRAM",
            SortColumn::GpuCount => "GPUs",
            SortColumn::Utilization => "Utilization",
            SortColumn::Price => "$/hour",
        }
    }

    pub fn next(&self) -> Self {
        match self {
            SortColumn::Name => SortColumn::Vram,
            SortColumn::Vram => SortColumn::GpuCount,
            SortColumn::GpuCount => SortColumn::Utilization,
            SortColumn::Utilization => SortColumn::Price,
            SortColumn::Price => SortColumn::Name,
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "name" | "gpu" => Some(SortColumn::Name),
            "vram" | "memory" => Some(SortColumn::Vram),
            "count" | "gpus" | "gpu-count" => Some(SortColumn::GpuCount),
            "utilization" | "util" => Some(SortColumn::Utilization),
            "price" | "cost" => Some(SortColumn::Price),
            _ => None,
        }
    }
}

/// Re-sort a ranked list by a table column. Entries without a price sort
/// last in either direction.
pub fn sort_recommendations(
    recs: Vec<GpuRecommendation>,
    column: SortColumn,
    ascending: bool,
) -> Vec<GpuRecommendation> {
    let mut sorted = recs;
    sorted.sort_by(|a, b| {
        let directed = |ord: std::cmp::Ordering| if ascending { ord } else { ord.reverse() };
        match column {
            SortColumn::Name => directed(a.hardware.name.cmp(&b.hardware.name)),
            SortColumn::Vram => directed(a.hardware.vram_gb.total_cmp(&b.hardware.vram_gb)),
            SortColumn::GpuCount => directed(a.gpu_count.cmp(&b.gpu_count)),
            SortColumn::Utilization => directed(a.utilization_pct.total_cmp(&b.utilization_pct)),
            SortColumn::Price => match (a.estimated_price_per_hour, b.estimated_price_per_hour) {
                (Some(pa), Some(pb)) => directed(pa.total_cmp(&pb)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            },
        }
    });
    sorted
}
