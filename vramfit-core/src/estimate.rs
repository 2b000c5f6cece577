//! VRAM estimation: weights + KV-cache + runtime overhead.
//!
//! All figures are decimal gigabytes (bytes / 1e9), which is how the
//! hardware catalog quotes capacities.

use serde::Serialize;

use crate::error::{Result, require_non_negative, require_nonzero, require_positive};
use crate::models::{ModelArchitecture, quant_bits};

const BYTES_PER_GB: f64 = 1e9;

/// How framework/runtime overhead is modelled on top of the raw allocations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "model", rename_all = "kebab-case")]
pub enum OverheadModel {
    /// Overhead as a fraction of each primary allocation.
    Split {
        weight_fraction: f64,
        kv_fraction: f64,
    },
    /// A fixed base plus a fraction of the weights. Charges nothing to the
    /// KV-cache.
    Flat { base_gb: f64, weight_fraction: f64 },
}

impl OverheadModel {
    pub const DEFAULT_WEIGHT_FRACTION: f64 = 0.10;
    pub const DEFAULT_KV_FRACTION: f64 = 0.02;
    pub const FLAT_BASE_GB: f64 = 0.5;
    pub const FLAT_WEIGHT_FRACTION: f64 = 0.02;

    /// 0.5 GB + 2% of weights.
    pub fn flat() -> Self {
        OverheadModel::Flat {
            base_gb: Self::FLAT_BASE_GB,
            weight_fraction: Self::FLAT_WEIGHT_FRACTION,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            OverheadModel::Split { .. } => "split",
            OverheadModel::Flat { .. } => "flat",
        }
    }

    /// Parse a policy name as accepted on the command line.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "split" | "default" => Some(Self::default()),
            "flat" => Some(Self::flat()),
            _ => None,
        }
    }

    fn validate(&self) -> Result<()> {
        match *self {
            OverheadModel::Split {
                weight_fraction,
                kv_fraction,
            } => {
                require_non_negative("weight_overhead_fraction", weight_fraction)?;
                require_non_negative("kv_overhead_fraction", kv_fraction)
            }
            OverheadModel::Flat {
                base_gb,
                weight_fraction,
            } => {
                require_non_negative("overhead_base_gb", base_gb)?;
                require_non_negative("weight_overhead_fraction", weight_fraction)
            }
        }
    }

    /// Returns (weight overhead, kv overhead) in bytes.
    fn apply(&self, weights_bytes: f64, kv_cache_bytes: f64) -> (f64, f64) {
        match *self {
            OverheadModel::Split {
                weight_fraction,
                kv_fraction,
            } => (weights_bytes * weight_fraction, kv_cache_bytes * kv_fraction),
            OverheadModel::Flat {
                base_gb,
                weight_fraction,
            } => (base_gb * BYTES_PER_GB + weights_bytes * weight_fraction, 0.0),
        }
    }
}

impl Default for OverheadModel {
    fn default() -> Self {
        OverheadModel::Split {
            weight_fraction: Self::DEFAULT_WEIGHT_FRACTION,
            kv_fraction: Self::DEFAULT_KV_FRACTION,
        }
    }
}

/// Fully resolved estimator input.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct EstimateRequest {
    /// Raw parameter count (not billions).
    pub param_count: f64,
    pub layers: u32,
    pub kv_heads: u32,
    pub head_dim: u32,
    pub weight_bits: u32,
    pub kv_bits: u32,
    pub sequence_length: u32,
    pub batch_size: u32,
}

impl EstimateRequest {
    /// Build a request from a preset and quantization codes.
    /// Unknown codes fall back to 16 bits (logged).
    pub fn for_model(
        arch: &ModelArchitecture,
        weight_quant: &str,
        kv_quant: &str,
        sequence_length: u32,
        batch_size: u32,
    ) -> Self {
        EstimateRequest {
            param_count: arch.param_count(),
            layers: arch.layers,
            kv_heads: arch.kv_heads,
            head_dim: arch.head_dim,
            weight_bits: quant_bits(weight_quant),
            kv_bits: quant_bits(kv_quant),
            sequence_length,
            batch_size,
        }
    }

    fn validate(&self) -> Result<()> {
        require_positive("param_count", self.param_count)?;
        require_nonzero("layers", self.layers)?;
        require_nonzero("kv_heads", self.kv_heads)?;
        require_nonzero("head_dim", self.head_dim)?;
        require_nonzero("weight_bits", self.weight_bits)?;
        require_nonzero("kv_bits", self.kv_bits)?;
        require_nonzero("sequence_length", self.sequence_length)?;
        require_nonzero("batch_size", self.batch_size)
    }
}

/// Memory breakdown in GB.
/// `total_gb` is always the sum of the four components.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct VramEstimate {
    pub weights_gb: f64,
    pub kv_cache_gb: f64,
    pub weight_overhead_gb: f64,
    pub kv_overhead_gb: f64,
    pub total_gb: f64,
}

impl VramEstimate {
    /// Combined runtime overhead.
    pub fn overhead_gb(&self) -> f64 {
        self.weight_overhead_gb + self.kv_overhead_gb
    }
}

/// Estimate memory for a fully specified request.
pub fn estimate(req: &EstimateRequest, overhead: OverheadModel) -> Result<VramEstimate> {
    req.validate()?;
    overhead.validate()?;

    let weights_bytes = req.param_count * (req.weight_bits as f64 / 8.0);
    // Keys and values are cached separately, hence the 2.
    let kv_cache_bytes = 2.0
        * req.layers as f64
        * req.kv_heads as f64
        * req.head_dim as f64
        * req.sequence_length as f64
        * req.batch_size as f64
        * (req.kv_bits as f64 / 8.0);
    let (weight_overhead_bytes, kv_overhead_bytes) = overhead.apply(weights_bytes, kv_cache_bytes);

    let weights_gb = weights_bytes / BYTES_PER_GB;
    let kv_cache_gb = kv_cache_bytes / BYTES_PER_GB;
    let weight_overhead_gb = weight_overhead_bytes / BYTES_PER_GB;
    let kv_overhead_gb = kv_overhead_bytes / BYTES_PER_GB;
    let total_gb = weights_gb + kv_cache_gb + weight_overhead_gb + kv_overhead_gb;

    tracing::debug!(
        overhead = overhead.label(),
        weights_gb,
        kv_cache_gb,
        total_gb,
        "computed VRAM estimate"
    );

    Ok(VramEstimate {
        weights_gb,
        kv_cache_gb,
        weight_overhead_gb,
        kv_overhead_gb,
        total_gb,
    })
}

/// Estimate memory for a preset with the default (split) overhead model.
pub fn estimate_vram(
    arch: &ModelArchitecture,
    weight_quant: &str,
    kv_quant: &str,
    sequence_length: u32,
    batch_size: u32,
) -> Result<VramEstimate> {
    estimate_vram_with(
        arch,
        weight_quant,
        kv_quant,
        sequence_length,
        batch_size,
        OverheadModel::default(),
    )
}

pub fn estimate_vram_with(
    arch: &ModelArchitecture,
    weight_quant: &str,
    kv_quant: &str,
    sequence_length: u32,
    batch_size: u32,
    overhead: OverheadModel,
) -> Result<VramEstimate> {
    let req = EstimateRequest::for_model(arch, weight_quant, kv_quant, sequence_length, batch_size);
    estimate(&req, overhead)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::FitError;

    // ────────────────────────────────────────────────────────────────────
    // Helpers
    // ────────────────────────────────────────────────────────────────────

    fn test_arch() -> ModelArchitecture {
        ModelArchitecture {
            name: "Test 7B".to_string(),
            params_b: 7.0,
            layers: 32,
            kv_heads: 8,
            head_dim: 128,
        }
    }

    fn test_request(weight_bits: u32, kv_bits: u32, seq: u32, batch: u32) -> EstimateRequest {
        EstimateRequest {
            param_count: 7e9,
            layers: 32,
            kv_heads: 8,
            head_dim: 128,
            weight_bits,
            kv_bits,
            sequence_length: seq,
            batch_size: batch,
        }
    }

    fn assert_close(actual: f64, expected: f64) {
        let tol = 1e-9 * expected.abs().max(1.0);
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}"
        );
    }

    fn sum_of_parts(e: &VramEstimate) -> f64 {
        e.weights_gb + e.kv_cache_gb + e.weight_overhead_gb + e.kv_overhead_gb
    }

    // ────────────────────────────────────────────────────────────────────
    // Split overhead model
    // ────────────────────────────────────────────────────────────────────

    #[test]
    fn test_int8_weights_fp16_kv() {
        let e = estimate(&test_request(8, 16, 8192, 1), OverheadModel::default()).unwrap();
        assert_close(e.weights_gb, 7.0);
        // 2 * 32 * 8 * 128 * 8192 * 1 * 2 bytes
        assert_close(e.kv_cache_gb, 1.073741824);
        assert_close(e.weight_overhead_gb, 0.7);
        assert_close(e.kv_overhead_gb, 0.02147483648);
        assert_close(e.total_gb, 8.79521666048);
    }

    #[test]
    fn test_fp16_weights_double_int8() {
        let int8 = estimate(&test_request(8, 16, 8192, 1), OverheadModel::default()).unwrap();
        let fp16 = estimate(&test_request(16, 16, 8192, 1), OverheadModel::default()).unwrap();
        assert_close(fp16.weights_gb, 14.0);
        assert_close(fp16.weights_gb, int8.weights_gb * 2.0);
        assert_close(fp16.weight_overhead_gb, int8.weight_overhead_gb * 2.0);
        assert_close(fp16.kv_cache_gb, int8.kv_cache_gb);
    }

    #[test]
    fn test_total_is_sum_of_parts() {
        for (w, kv, seq, batch) in [(4, 4, 512, 1), (8, 16, 8192, 4), (32, 32, 131072, 128)] {
            for overhead in [OverheadModel::default(), OverheadModel::flat()] {
                let e = estimate(&test_request(w, kv, seq, batch), overhead).unwrap();
                assert_close(e.total_gb, sum_of_parts(&e));
                assert!(e.weights_gb >= 0.0 && e.kv_cache_gb >= 0.0);
                assert!(e.weight_overhead_gb >= 0.0 && e.kv_overhead_gb >= 0.0);
            }
        }
    }

    #[test]
    fn test_doubling_batch_doubles_kv() {
        let one = estimate(&test_request(8, 16, 4096, 3), OverheadModel::default()).unwrap();
        let two = estimate(&test_request(8, 16, 4096, 6), OverheadModel::default()).unwrap();
        assert_close(two.kv_cache_gb, one.kv_cache_gb * 2.0);
        assert_close(two.kv_overhead_gb, one.kv_overhead_gb * 2.0);
        assert_close(two.weights_gb, one.weights_gb);
    }

    #[test]
    fn test_monotonic_in_inputs() {
        let base = test_request(8, 8, 2048, 2);
        let total = |r: EstimateRequest| estimate(&r, OverheadModel::default()).unwrap().total_gb;
        let t0 = total(base);

        assert!(total(EstimateRequest { sequence_length: 4096, ..base }) >= t0);
        assert!(total(EstimateRequest { batch_size: 3, ..base }) >= t0);
        assert!(total(EstimateRequest { weight_bits: 16, ..base }) >= t0);
        assert!(total(EstimateRequest { kv_bits: 16, ..base }) >= t0);
    }

    #[test]
    fn test_zero_overhead_fractions() {
        let overhead = OverheadModel::Split {
            weight_fraction: 0.0,
            kv_fraction: 0.0,
        };
        let e = estimate(&test_request(16, 16, 1024, 1), overhead).unwrap();
        assert_eq!(e.overhead_gb(), 0.0);
        assert_close(e.total_gb, e.weights_gb + e.kv_cache_gb);
    }

    // ────────────────────────────────────────────────────────────────────
    // Flat overhead model
    // ────────────────────────────────────────────────────────────────────

    #[test]
    fn test_flat_overhead() {
        let e = estimate(&test_request(8, 16, 8192, 1), OverheadModel::flat()).unwrap();
        // 0.5 GB + 2% of 7 GB
        assert_close(e.weight_overhead_gb, 0.64);
        assert_eq!(e.kv_overhead_gb, 0.0);
        assert_close(e.overhead_gb(), 0.64);
        assert_close(e.total_gb, 7.0 + 1.073741824 + 0.64);
    }

    #[test]
    fn test_overhead_model_parse() {
        assert_eq!(OverheadModel::parse("split"), Some(OverheadModel::default()));
        assert_eq!(OverheadModel::parse("FLAT"), Some(OverheadModel::flat()));
        assert_eq!(OverheadModel::parse("lumped"), None);
    }

    // ────────────────────────────────────────────────────────────────────
    // Validation
    // ────────────────────────────────────────────────────────────────────

    #[test]
    fn test_rejects_zero_fields() {
        let base = test_request(8, 16, 8192, 1);
        let cases = [
            ("layers", EstimateRequest { layers: 0, ..base }),
            ("kv_heads", EstimateRequest { kv_heads: 0, ..base }),
            ("head_dim", EstimateRequest { head_dim: 0, ..base }),
            ("weight_bits", EstimateRequest { weight_bits: 0, ..base }),
            ("kv_bits", EstimateRequest { kv_bits: 0, ..base }),
            ("sequence_length", EstimateRequest { sequence_length: 0, ..base }),
            ("batch_size", EstimateRequest { batch_size: 0, ..base }),
            ("param_count", EstimateRequest { param_count: 0.0, ..base }),
            ("param_count", EstimateRequest { param_count: -7e9, ..base }),
            ("param_count", EstimateRequest { param_count: f64::NAN, ..base }),
        ];
        for (field, req) in cases {
            let err = estimate(&req, OverheadModel::default()).unwrap_err();
            assert_eq!(err.field(), Some(field));
        }
    }

    #[test]
    fn test_rejects_negative_overhead() {
        let overhead = OverheadModel::Split {
            weight_fraction: -0.1,
            kv_fraction: 0.02,
        };
        let err = estimate(&test_request(8, 16, 8192, 1), overhead).unwrap_err();
        assert!(matches!(err, FitError::InvalidParameter { field: "weight_overhead_fraction", .. }));

        let flat = OverheadModel::Flat {
            base_gb: -0.5,
            weight_fraction: 0.02,
        };
        let err = estimate(&test_request(8, 16, 8192, 1), flat).unwrap_err();
        assert_eq!(err.field(), Some("overhead_base_gb"));
    }

    // ────────────────────────────────────────────────────────────────────
    // Preset entry points
    // ────────────────────────────────────────────────────────────────────

    #[test]
    fn test_estimate_vram_from_preset() {
        let e = estimate_vram(&test_arch(), "INT8", "FP16", 8192, 1).unwrap();
        assert_close(e.weights_gb, 7.0);
        assert_close(e.kv_cache_gb, 1.073741824);
    }

    #[test]
    fn test_unknown_quant_uses_16_bits() {
        let fallback = estimate_vram(&test_arch(), "Q4_K_M", "FP16", 4096, 1).unwrap();
        let fp16 = estimate_vram(&test_arch(), "FP16", "FP16", 4096, 1).unwrap();
        assert_eq!(fallback, fp16);
    }

    #[test]
    fn test_estimate_vram_with_flat() {
        let split = estimate_vram(&test_arch(), "INT4", "INT8", 2048, 1).unwrap();
        let flat =
            estimate_vram_with(&test_arch(), "INT4", "INT8", 2048, 1, OverheadModel::flat()).unwrap();
        assert_close(flat.weights_gb, split.weights_gb);
        assert_close(flat.kv_cache_gb, split.kv_cache_gb);
        assert!(flat.weight_overhead_gb > split.weight_overhead_gb);
    }

    #[test]
    fn test_preset_zero_batch_rejected() {
        let err = estimate_vram(&test_arch(), "INT8", "FP16", 8192, 0).unwrap_err();
        assert_eq!(err.field(), Some("batch_size"));
    }
}
