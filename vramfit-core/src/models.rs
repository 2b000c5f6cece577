use serde::{Deserialize, Serialize};

use crate::error::{FitError, Result};

/// Bit width used when a quantization code is not recognised.
pub const DEFAULT_QUANT_BITS: u32 = 16;

/// A precision the weights or the KV-cache can be stored at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QuantizationOption {
    pub code: &'static str,
    pub label: &'static str,
    pub bits: u32,
}

/// Quantization levels ordered from widest to narrowest.
pub const QUANTIZATION_OPTIONS: &[QuantizationOption] = &[
    QuantizationOption {
        code: "FP32",
        label: "FP32 (32-bit)",
        bits: 32,
    },
    QuantizationOption {
        code: "FP16",
        label: "FP16 (16-bit)",
        bits: 16,
    },
    QuantizationOption {
        code: "BF16",
        label: "BF16 (16-bit)",
        bits: 16,
    },
    QuantizationOption {
        code: "INT8",
        label: "INT8 (8-bit)",
        bits: 8,
    },
    QuantizationOption {
        code: "INT4",
        label: "INT4 (4-bit)",
        bits: 4,
    },
];

/// Strict lookup of a quantization code (case-insensitive).
pub fn find_quantization(code: &str) -> Result<&'static QuantizationOption> {
    let code = code.trim();
    QUANTIZATION_OPTIONS
        .iter()
        .find(|q| q.code.eq_ignore_ascii_case(code))
        .ok_or_else(|| FitError::UnknownQuantization {
            code: code.to_string(),
        })
}

/// Bit width for a quantization code.
/// Unknown codes resolve to `DEFAULT_QUANT_BITS` and log a warning.
pub fn quant_bits(code: &str) -> u32 {
    match find_quantization(code) {
        Ok(q) => q.bits,
        Err(_) => {
            tracing::warn!(
                code,
                fallback_bits = DEFAULT_QUANT_BITS,
                "unknown quantization code, falling back to default bit width"
            );
            DEFAULT_QUANT_BITS
        }
    }
}

/// Transformer shape needed for memory estimation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArchitecture {
    pub name: String,
    /// Parameter count in billions.
    pub params_b: f64,
    pub layers: u32,
    pub kv_heads: u32,
    pub head_dim: u32,
}

impl ModelArchitecture {
    /// Raw parameter count.
    pub fn param_count(&self) -> f64 {
        self.params_b * 1e9
    }

    /// Human-readable size like "7B", "7.6B" or "1.8T".
    pub fn size_label(&self) -> String {
        if self.params_b >= 1000.0 {
            format!("{}T", trim_float(self.params_b / 1000.0))
        } else {
            format!("{}B", trim_float(self.params_b))
        }
    }
}

fn trim_float(v: f64) -> String {
    let s = format!("{:.2}", v);
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

const MODELS_JSON: &str = include_str!("../data/models.json");

/// Read-only set of model presets, embedded at build time.
pub struct ModelDatabase {
    models: Vec<ModelArchitecture>,
}

impl ModelDatabase {
    pub fn load() -> Result<Self> {
        Self::from_json(MODELS_JSON)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let models: Vec<ModelArchitecture> = serde_json::from_str(json)?;
        Ok(ModelDatabase { models })
    }

    pub fn get_all_models(&self) -> &[ModelArchitecture] {
        &self.models
    }

    /// Exact name match, ignoring case.
    pub fn find(&self, name: &str) -> Option<&ModelArchitecture> {
        let name = name.trim();
        self.models
            .iter()
            .find(|m| m.name.eq_ignore_ascii_case(name))
    }

    /// Like `find`, but fails with `UnknownModel`.
    pub fn get(&self, name: &str) -> Result<&ModelArchitecture> {
        self.find(name).ok_or_else(|| FitError::UnknownModel {
            name: name.to_string(),
        })
    }

    /// Substring search over preset names.
    pub fn search(&self, query: &str) -> Vec<&ModelArchitecture> {
        let query_lower = query.to_lowercase();
        self.models
            .iter()
            .filter(|m| m.name.to_lowercase().contains(&query_lower))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    // ────────────────────────────────────────────────────────────────────
    // Quantization tests
    // ────────────────────────────────────────────────────────────────────

    #[test]
    fn test_quant_bits_known_codes() {
        assert_eq!(quant_bits("FP32"), 32);
        assert_eq!(quant_bits("FP16"), 16);
        assert_eq!(quant_bits("BF16"), 16);
        assert_eq!(quant_bits("INT8"), 8);
        assert_eq!(quant_bits("INT4"), 4);
    }

    #[test]
    fn test_quant_bits_case_insensitive() {
        assert_eq!(quant_bits("int4"), 4);
        assert_eq!(quant_bits(" Int8 "), 8);
    }

    #[test]
    fn test_quant_bits_unknown_falls_back() {
        assert_eq!(quant_bits("Q4_K_M"), DEFAULT_QUANT_BITS);
        assert_eq!(quant_bits(""), DEFAULT_QUANT_BITS);
    }

    #[derive(Clone, Default)]
    struct CapturedLogs(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLogs {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl CapturedLogs {
        fn text(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    fn quant_bits_logged(code: &str) -> (u32, String) {
        let logs = CapturedLogs::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        let bits = tracing::subscriber::with_default(subscriber, || quant_bits(code));
        (bits, logs.text())
    }

    #[test]
    fn test_quant_bits_fallback_emits_warning() {
        let (bits, logs) = quant_bits_logged("Q4_K_M");
        assert_eq!(bits, DEFAULT_QUANT_BITS);
        assert!(logs.contains("WARN"), "no warning logged: {logs:?}");
        assert!(logs.contains("Q4_K_M"));
        assert!(logs.contains("fallback_bits=16"));
    }

    #[test]
    fn test_quant_bits_known_code_is_silent() {
        let (bits, logs) = quant_bits_logged("INT8");
        assert_eq!(bits, 8);
        assert!(logs.is_empty(), "unexpected log output: {logs:?}");
    }

    #[test]
    fn test_find_quantization_strict() {
        assert_eq!(find_quantization("bf16").unwrap().code, "BF16");
        let err = find_quantization("FP12").unwrap_err();
        assert!(matches!(err, FitError::UnknownQuantization { ref code } if code == "FP12"));
    }

    #[test]
    fn test_quantization_options_descending() {
        for pair in QUANTIZATION_OPTIONS.windows(2) {
            assert!(pair[0].bits >= pair[1].bits);
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // ModelArchitecture tests
    // ────────────────────────────────────────────────────────────────────

    #[test]
    fn test_param_count() {
        let arch = ModelArchitecture {
            name: "Test".to_string(),
            params_b: 7.0,
            layers: 32,
            kv_heads: 8,
            head_dim: 128,
        };
        assert_eq!(arch.param_count(), 7e9);
    }

    #[test]
    fn test_size_label() {
        let mut arch = ModelArchitecture {
            name: "Test".to_string(),
            params_b: 7.6,
            layers: 28,
            kv_heads: 4,
            head_dim: 128,
        };
        assert_eq!(arch.size_label(), "7.6B");
        arch.params_b = 70.0;
        assert_eq!(arch.size_label(), "70B");
        arch.params_b = 1800.0;
        assert_eq!(arch.size_label(), "1.8T");
    }

    // ────────────────────────────────────────────────────────────────────
    // ModelDatabase tests
    // ────────────────────────────────────────────────────────────────────

    #[test]
    fn test_model_database_load() {
        let db = ModelDatabase::load().unwrap();
        assert!(!db.get_all_models().is_empty());
        for m in db.get_all_models() {
            assert!(m.params_b > 0.0, "{} has no params", m.name);
            assert!(m.layers > 0 && m.kv_heads > 0 && m.head_dim > 0);
        }
    }

    #[test]
    fn test_find_preset() {
        let db = ModelDatabase::load().unwrap();
        let mistral = db.find("mistral 7b").unwrap();
        assert_eq!(mistral.layers, 32);
        assert_eq!(mistral.kv_heads, 8);
        assert_eq!(mistral.head_dim, 128);
        assert!(db.find("Mistral").is_none());
    }

    #[test]
    fn test_get_unknown_model() {
        let db = ModelDatabase::load().unwrap();
        let err = db.get("Nonexistent 3B").unwrap_err();
        assert!(matches!(err, FitError::UnknownModel { .. }));
    }

    #[test]
    fn test_search() {
        let db = ModelDatabase::load().unwrap();
        let results = db.search("qwen");
        assert!(results.len() >= 4);
        assert_eq!(results.len(), db.search("QWEN").len());
    }

    #[test]
    fn test_from_json_rejects_malformed() {
        let err = ModelDatabase::from_json("[{\"name\": 1}]").err().unwrap();
        assert!(matches!(err, FitError::CatalogParse { .. }));
    }
}
