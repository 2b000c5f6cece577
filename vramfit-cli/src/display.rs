use colored::*;
use tabled::{Table, Tabled, settings::Style};
use vramfit_core::compare::{self, AcceleratorSpec, CompareField};
use vramfit_core::estimate::{EstimateRequest, OverheadModel, VramEstimate};
use vramfit_core::fit::{FitStatus, GpuRecommendation, MULTI_NODE_MESSAGE, MatchConfig};
use vramfit_core::hardware::HardwareSpec;
use vramfit_core::models::{ModelArchitecture, QuantizationOption};

/// Leaders highlighted per numeric column of the comparison table.
const TOP_N: usize = 3;

#[derive(Tabled)]
struct BreakdownRow {
    #[tabled(rename = "Component")]
    component: String,
    #[tabled(rename = "GB")]
    gb: String,
    #[tabled(rename = "Share")]
    share: String,
}

#[derive(Tabled)]
struct RecommendationRow {
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "GPU")]
    name: String,
    #[tabled(rename = "VRAM")]
    vram: String,
    #[tabled(rename = "GPUs")]
    count: String,
    #[tabled(rename = "Total")]
    total: String,
    #[tabled(rename = "Util %")]
    utilization: String,
    #[tabled(rename = "$/hour")]
    price: String,
    #[tabled(rename = "Provider")]
    provider: String,
    #[tabled(rename = "Note")]
    note: String,
}

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    name: String,
    #[tabled(rename = "Size")]
    size: String,
    #[tabled(rename = "Layers")]
    layers: u32,
    #[tabled(rename = "KV Heads")]
    kv_heads: u32,
    #[tabled(rename = "Head Dim")]
    head_dim: u32,
}

#[derive(Tabled)]
struct QuantRow {
    #[tabled(rename = "Code")]
    code: String,
    #[tabled(rename = "Label")]
    label: String,
    #[tabled(rename = "Bits")]
    bits: u32,
}

#[derive(Tabled)]
struct GpuRow {
    #[tabled(rename = "GPU")]
    name: String,
    #[tabled(rename = "Vendor")]
    manufacturer: String,
    #[tabled(rename = "VRAM")]
    vram: String,
    #[tabled(rename = "Interconnect")]
    interconnect: String,
    #[tabled(rename = "$/hour")]
    price: String,
    #[tabled(rename = "Providers")]
    providers: String,
}

#[derive(Tabled)]
struct AcceleratorRow {
    #[tabled(rename = "Hardware")]
    hardware: String,
    #[tabled(rename = "Vendor")]
    manufacturer: String,
    #[tabled(rename = "Type")]
    kind: String,
    #[tabled(rename = "Released")]
    release_date: String,
    #[tabled(rename = "PF FP16")]
    fp16: String,
    #[tabled(rename = "PF FP8")]
    fp8: String,
    #[tabled(rename = "Memory (GB)")]
    memory: String,
    #[tabled(rename = "BW (TB/s)")]
    bandwidth: String,
    #[tabled(rename = "Power (W)")]
    power: String,
    #[tabled(rename = "Workload")]
    workload: String,
}

fn format_price(price: Option<f64>) -> String {
    match price {
        Some(p) => format!("${:.2}", p),
        None => "-".to_string(),
    }
}

fn status_text(status: FitStatus) -> String {
    let label = match status {
        FitStatus::Excellent | FitStatus::Good => status.label().green(),
        FitStatus::Tight => status.label().yellow(),
        FitStatus::OomRisk => status.label().truecolor(255, 165, 0),
        FitStatus::Insufficient => status.label().red(),
    };
    format!("{} {}", status.emoji(), label)
}

pub fn display_estimate(
    name: &str,
    req: &EstimateRequest,
    overhead: OverheadModel,
    estimate: &VramEstimate,
) {
    println!("\n{}", format!("=== {} ===", name).bold().cyan());
    println!();
    println!(
        "{}: {:.1}B",
        "Parameters".bold(),
        req.param_count / 1e9
    );
    println!(
        "{}: {} layers, {} KV heads x {} dims",
        "Shape".bold(),
        req.layers,
        req.kv_heads,
        req.head_dim
    );
    println!(
        "{}: weights {}-bit, KV-cache {}-bit",
        "Precision".bold(),
        req.weight_bits,
        req.kv_bits
    );
    println!(
        "{}: {} tokens x {} sequence(s)",
        "Context".bold(),
        req.sequence_length,
        req.batch_size
    );
    println!("{}: {}", "Overhead model".bold(), overhead.label());
    println!();

    let share = |gb: f64| format!("{:.1}%", gb / estimate.total_gb * 100.0);
    let mut rows = vec![
        BreakdownRow {
            component: "Weights".to_string(),
            gb: format!("{:.2}", estimate.weights_gb),
            share: share(estimate.weights_gb),
        },
        BreakdownRow {
            component: "KV-cache".to_string(),
            gb: format!("{:.2}", estimate.kv_cache_gb),
            share: share(estimate.kv_cache_gb),
        },
        BreakdownRow {
            component: "Weight overhead".to_string(),
            gb: format!("{:.2}", estimate.weight_overhead_gb),
            share: share(estimate.weight_overhead_gb),
        },
    ];
    if estimate.kv_overhead_gb > 0.0 {
        rows.push(BreakdownRow {
            component: "KV overhead".to_string(),
            gb: format!("{:.2}", estimate.kv_overhead_gb),
            share: share(estimate.kv_overhead_gb),
        });
    }
    rows.push(BreakdownRow {
        component: "Total".bold().to_string(),
        gb: format!("{:.2}", estimate.total_gb).bold().to_string(),
        share: "100.0%".to_string(),
    });

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn display_recommendations(
    required_gb: f64,
    config: &MatchConfig,
    recs: &[GpuRecommendation],
) {
    println!("\n{}", "=== GPU Recommendations ===".bold().cyan());
    println!(
        "Required: {:.2} GB  (usable fraction {:.0}%, {} policy)\n",
        required_gb,
        config.usable_fraction * 100.0,
        config.policy.label()
    );

    if recs.is_empty() {
        println!("{}", MULTI_NODE_MESSAGE.yellow());
        return;
    }

    let rows: Vec<RecommendationRow> = recs
        .iter()
        .map(|r| RecommendationRow {
            status: status_text(r.fit_status),
            name: r.hardware.name.clone(),
            vram: format!("{:.0} GB", r.hardware.vram_gb),
            count: format!("{}x", r.gpu_count),
            total: format!("{:.0} GB", r.total_available_gb),
            utilization: format!("{:.1}%", r.utilization_pct),
            price: format_price(r.estimated_price_per_hour),
            provider: r
                .hardware
                .primary_provider()
                .map(|p| p.name.clone())
                .unwrap_or_else(|| "-".to_string()),
            note: r.warning.clone().unwrap_or_default(),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn display_models(models: &[ModelArchitecture]) {
    println!("\n{}", "=== Model Presets ===".bold().cyan());
    println!("Total models: {}\n", models.len());

    let rows: Vec<ModelRow> = models
        .iter()
        .map(|m| ModelRow {
            name: m.name.clone(),
            size: m.size_label(),
            layers: m.layers,
            kv_heads: m.kv_heads,
            head_dim: m.head_dim,
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn display_quants(quants: &[QuantizationOption]) {
    println!("\n{}", "=== Quantization Options ===".bold().cyan());

    let rows: Vec<QuantRow> = quants
        .iter()
        .map(|q| QuantRow {
            code: q.code.to_string(),
            label: q.label.to_string(),
            bits: q.bits,
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn display_gpus(gpus: &[HardwareSpec]) {
    println!("\n{}", "=== GPU Catalog ===".bold().cyan());
    println!("Total GPUs: {}\n", gpus.len());

    let rows: Vec<GpuRow> = gpus
        .iter()
        .map(|g| GpuRow {
            name: g.name.clone(),
            manufacturer: g.manufacturer.clone(),
            vram: format!("{:.0} GB", g.vram_gb),
            interconnect: g.interconnect.label().to_string(),
            price: format_price(g.price_per_hour),
            providers: g
                .providers
                .iter()
                .map(|p| p.name.as_str())
                .collect::<Vec<_>>()
                .join(", "),
        })
        .collect();

    let table = Table::new(rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

pub fn display_accelerators(rows: &[AcceleratorSpec], sorted_by: CompareField, vendors: &[String]) {
    println!("\n{}", "=== Accelerator Comparison ===".bold().cyan());
    println!(
        "Sorted by {}  |  Vendors: {}\n",
        sorted_by.label(),
        vendors.join(", ")
    );

    if rows.is_empty() {
        println!("{}", "No accelerators match the selected manufacturers.".yellow());
        return;
    }

    let leaders: Vec<(CompareField, Vec<f64>)> = CompareField::NUMERIC
        .iter()
        .map(|&f| (f, compare::top_values(rows, f, TOP_N)))
        .collect();

    let cell = |spec: &AcceleratorSpec, field: CompareField, decimals: usize| -> String {
        let Some(v) = field.number(spec) else {
            return String::new();
        };
        if v == 0.0 {
            return "-".to_string();
        }
        let text = format!("{:.*}", decimals, v);
        let is_leader = leaders
            .iter()
            .any(|(f, top)| *f == field && top.contains(&v));
        if is_leader {
            text.green().bold().to_string()
        } else {
            text
        }
    };

    let table_rows: Vec<AcceleratorRow> = rows
        .iter()
        .map(|a| AcceleratorRow {
            hardware: a.hardware.clone(),
            manufacturer: a.manufacturer.clone(),
            kind: a.kind.clone(),
            release_date: a.release_date.clone(),
            fp16: cell(a, CompareField::PetaflopsFp16, 2),
            fp8: cell(a, CompareField::PetaflopsFp8, 2),
            memory: cell(a, CompareField::Memory, 0),
            bandwidth: cell(a, CompareField::Bandwidth, 2),
            power: cell(a, CompareField::Power, 0),
            workload: match &a.secondary_workload {
                Some(second) => format!("{} / {}", a.primary_workload, second),
                None => a.primary_workload.clone(),
            },
        })
        .collect();

    let table = Table::new(table_rows).with(Style::rounded()).to_string();
    println!("{}", table);
}

// ────────────────────────────────────────────────────────────────────
// JSON output for scripts and other tools
// ────────────────────────────────────────────────────────────────────

fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).expect("JSON serialization failed")
    );
}

pub fn display_json_estimate(
    name: &str,
    req: &EstimateRequest,
    overhead: OverheadModel,
    estimate: &VramEstimate,
) {
    print_json(&serde_json::json!({
        "model": name,
        "request": request_json(req, overhead),
        "estimate": estimate_json(estimate),
    }));
}

pub fn display_json_recommendations(
    required_gb: f64,
    config: &MatchConfig,
    estimated: Option<&(String, EstimateRequest, OverheadModel, VramEstimate)>,
    recs: &[GpuRecommendation],
) {
    let recommendations: Vec<serde_json::Value> = recs.iter().map(recommendation_json).collect();
    let mut output = serde_json::json!({
        "required_vram_gb": round2(required_gb),
        "usable_fraction": config.usable_fraction,
        "policy": config.policy.label(),
        "recommendations": recommendations,
    });
    if let Some((name, req, overhead, estimate)) = estimated {
        output["model"] = serde_json::json!(name);
        output["request"] = request_json(req, *overhead);
        output["estimate"] = estimate_json(estimate);
    }
    if recs.is_empty() {
        output["message"] = serde_json::json!(MULTI_NODE_MESSAGE);
    }
    print_json(&output);
}

pub fn display_json_models(models: &[ModelArchitecture]) {
    print_json(&serde_json::json!({ "models": models }));
}

pub fn display_json_quants(quants: &[QuantizationOption]) {
    print_json(&serde_json::json!({ "quantizations": quants }));
}

pub fn display_json_gpus(gpus: &[HardwareSpec]) {
    print_json(&serde_json::json!({ "gpus": gpus }));
}

pub fn display_json_accelerators(rows: &[AcceleratorSpec]) {
    print_json(&serde_json::json!({ "accelerators": rows }));
}

fn request_json(req: &EstimateRequest, overhead: OverheadModel) -> serde_json::Value {
    serde_json::json!({
        "params_b": round2(req.param_count / 1e9),
        "layers": req.layers,
        "kv_heads": req.kv_heads,
        "head_dim": req.head_dim,
        "weight_bits": req.weight_bits,
        "kv_bits": req.kv_bits,
        "sequence_length": req.sequence_length,
        "batch_size": req.batch_size,
        "overhead": overhead,
    })
}

fn estimate_json(estimate: &VramEstimate) -> serde_json::Value {
    serde_json::json!({
        "weights_gb": round2(estimate.weights_gb),
        "kv_cache_gb": round2(estimate.kv_cache_gb),
        "weight_overhead_gb": round2(estimate.weight_overhead_gb),
        "kv_overhead_gb": round2(estimate.kv_overhead_gb),
        "total_gb": round2(estimate.total_gb),
    })
}

fn recommendation_json(rec: &GpuRecommendation) -> serde_json::Value {
    serde_json::json!({
        "gpu": rec.hardware.name,
        "manufacturer": rec.hardware.manufacturer,
        "vram_gb": rec.hardware.vram_gb,
        "interconnect": rec.hardware.interconnect,
        "gpu_count": rec.gpu_count,
        "total_available_gb": round2(rec.total_available_gb),
        "utilization_pct": round1(rec.utilization_pct),
        "headroom_pct": round1(rec.headroom_pct),
        "fit_status": rec.fit_status,
        "fit_label": rec.fit_status.label(),
        "estimated_price_per_hour": rec.estimated_price_per_hour.map(round2),
        "providers": rec.hardware.providers,
        "warning": rec.warning,
    })
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
