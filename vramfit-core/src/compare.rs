//! Side-by-side accelerator comparison: sort, filter, leaders per column.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AcceleratorSpec {
    pub hardware: String,
    pub manufacturer: String,
    /// "GPU", "TPU", ...
    pub kind: String,
    pub primary_workload: String,
    #[serde(default)]
    pub secondary_workload: Option<String>,
    /// ISO date, so lexical order is chronological.
    pub release_date: String,
    pub petaflops_fp16: f64,
    /// Zero when FP8 is unsupported or unpublished.
    pub petaflops_fp8: f64,
    pub memory_gb: f64,
    pub bandwidth_tbs: f64,
    /// Zero when unpublished.
    pub power_w: f64,
    pub foundry: String,
}

/// Sortable column of the comparison table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareField {
    Hardware,
    Manufacturer,
    Kind,
    ReleaseDate,
    PetaflopsFp16,
    PetaflopsFp8,
    Memory,
    Bandwidth,
    Power,
}

enum FieldValue<'a> {
    Text(&'a str),
    Number(f64),
}

impl CompareField {
    pub const NUMERIC: &'static [CompareField] = &[
        CompareField::PetaflopsFp16,
        CompareField::PetaflopsFp8,
        CompareField::Memory,
        CompareField::Bandwidth,
        CompareField::Power,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            CompareField::Hardware => "Hardware",
            CompareField::Manufacturer => "Manufacturer",
            CompareField::Kind => "Type",
            CompareField::ReleaseDate => "Released",
            CompareField::PetaflopsFp16 => "PF FP16",
            CompareField::PetaflopsFp8 => "PF FP8",
            CompareField::Memory => "Memory (GB)",
            CompareField::Bandwidth => "BW (TB/s)",
            CompareField::Power => "Power (W)",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().as_str() {
            "hardware" | "name" => Some(CompareField::Hardware),
            "manufacturer" | "vendor" => Some(CompareField::Manufacturer),
            "kind" | "type" => Some(CompareField::Kind),
            "release" | "release-date" | "date" => Some(CompareField::ReleaseDate),
            "fp16" | "petaflops16" => Some(CompareField::PetaflopsFp16),
            "fp8" | "petaflops8" => Some(CompareField::PetaflopsFp8),
            "memory" | "vram" => Some(CompareField::Memory),
            "bandwidth" | "bw" => Some(CompareField::Bandwidth),
            "power" => Some(CompareField::Power),
            _ => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        Self::NUMERIC.contains(self)
    }

    fn value<'a>(&self, spec: &'a AcceleratorSpec) -> FieldValue<'a> {
        match self {
            CompareField::Hardware => FieldValue::Text(&spec.hardware),
            CompareField::Manufacturer => FieldValue::Text(&spec.manufacturer),
            CompareField::Kind => FieldValue::Text(&spec.kind),
            CompareField::ReleaseDate => FieldValue::Text(&spec.release_date),
            CompareField::PetaflopsFp16 => FieldValue::Number(spec.petaflops_fp16),
            CompareField::PetaflopsFp8 => FieldValue::Number(spec.petaflops_fp8),
            CompareField::Memory => FieldValue::Number(spec.memory_gb),
            CompareField::Bandwidth => FieldValue::Number(spec.bandwidth_tbs),
            CompareField::Power => FieldValue::Number(spec.power_w),
        }
    }

    /// Numeric value of the column, `None` for text columns.
    pub fn number(&self, spec: &AcceleratorSpec) -> Option<f64> {
        match self.value(spec) {
            FieldValue::Number(n) => Some(n),
            FieldValue::Text(_) => None,
        }
    }

    fn compare(&self, a: &AcceleratorSpec, b: &AcceleratorSpec) -> Ordering {
        match (self.value(a), self.value(b)) {
            (FieldValue::Text(x), FieldValue::Text(y)) => x.to_lowercase().cmp(&y.to_lowercase()),
            (FieldValue::Number(x), FieldValue::Number(y)) => x.total_cmp(&y),
            // A field is either always text or always numeric.
            _ => Ordering::Equal,
        }
    }
}

const ACCELERATORS_JSON: &str = include_str!("../data/accelerators.json");

pub struct AcceleratorDatabase {
    accelerators: Vec<AcceleratorSpec>,
}

impl AcceleratorDatabase {
    pub fn load() -> Result<Self> {
        let accelerators: Vec<AcceleratorSpec> = serde_json::from_str(ACCELERATORS_JSON)?;
        Ok(AcceleratorDatabase { accelerators })
    }

    pub fn get_all(&self) -> &[AcceleratorSpec] {
        &self.accelerators
    }
}

/// Sorted copy of `rows`. The sort is stable.
pub fn sort_accelerators(
    rows: &[AcceleratorSpec],
    field: CompareField,
    ascending: bool,
) -> Vec<AcceleratorSpec> {
    let mut sorted = rows.to_vec();
    sorted.sort_by(|a, b| {
        let ord = field.compare(a, b);
        if ascending { ord } else { ord.reverse() }
    });
    sorted
}

/// Rows made by any of `manufacturers`. An empty filter keeps everything.
pub fn filter_by_manufacturers(
    rows: &[AcceleratorSpec],
    manufacturers: &[String],
) -> Vec<AcceleratorSpec> {
    if manufacturers.is_empty() {
        return rows.to_vec();
    }
    rows.iter()
        .filter(|r| {
            manufacturers
                .iter()
                .any(|m| m.eq_ignore_ascii_case(&r.manufacturer))
        })
        .cloned()
        .collect()
}

/// Sorted, de-duplicated manufacturer names.
pub fn manufacturers(rows: &[AcceleratorSpec]) -> Vec<String> {
    let mut names: Vec<String> = rows.iter().map(|r| r.manufacturer.clone()).collect();
    names.sort();
    names.dedup();
    names
}

/// Distinct values held by the `count` highest rows of a numeric column.
/// Ties can make the result shorter than `count`. Text columns yield nothing.
pub fn top_values(rows: &[AcceleratorSpec], field: CompareField, count: usize) -> Vec<f64> {
    let mut values: Vec<f64> = rows.iter().filter_map(|r| field.number(r)).collect();
    values.sort_by(|a, b| b.total_cmp(a));
    values.truncate(count);
    values.dedup();
    values
}
