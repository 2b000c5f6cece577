mod display;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt};
use vramfit_core::compare::{self, AcceleratorDatabase, CompareField};
use vramfit_core::estimate::{self, EstimateRequest, OverheadModel};
use vramfit_core::fit::{self, MatchConfig, MatchPolicy, SortColumn};
use vramfit_core::hardware::{self, HardwareCatalog};
use vramfit_core::models::{self, ModelDatabase};
use vramfit_core::{FitError, Result};

#[derive(Parser)]
#[command(name = "vramfit")]
#[command(about = "Size GPU memory for LLM deployments and pick the hardware that fits", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Output results as JSON (for tool integration)
    #[arg(long, global = true)]
    json: bool,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// List model presets
    Models,

    /// List quantization options
    Quants,

    /// List the GPU catalog
    Gpus {
        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// Estimate VRAM for a model configuration
    Estimate(ModelArgs),

    /// Estimate VRAM and rank GPUs that can hold it
    Recommend {
        #[command(flatten)]
        model: ModelArgs,

        #[command(flatten)]
        matching: MatchArgs,

        #[command(flatten)]
        catalog: CatalogArgs,
    },

    /// Compare accelerator specifications
    Compare {
        /// Column to sort by: hardware, manufacturer, type, release, fp16, fp8, memory, bandwidth, power
        #[arg(long, default_value = "release")]
        sort: String,

        /// Sort ascending (default is descending)
        #[arg(long)]
        asc: bool,

        /// Only show these manufacturers (repeatable)
        #[arg(short, long = "manufacturer", value_name = "NAME")]
        manufacturers: Vec<String>,
    },
}

#[derive(Args, Clone, Default)]
struct CatalogArgs {
    /// Use a GPU catalog JSON file instead of the built-in one
    #[arg(long, value_name = "PATH")]
    catalog: Option<std::path::PathBuf>,
}

#[derive(Args, Clone)]
struct ModelArgs {
    /// Model preset name (see `vramfit models`)
    #[arg(short, long, default_value = "Mistral 7B")]
    model: String,

    /// Weight quantization: FP32, FP16, BF16, INT8, INT4
    #[arg(short, long = "weight-quant", default_value = "INT8")]
    weight_quant: String,

    /// KV-cache quantization: FP32, FP16, BF16, INT8, INT4
    #[arg(short, long = "kv-quant", default_value = "FP16")]
    kv_quant: String,

    /// Context length in tokens
    #[arg(short, long, default_value = "8192", value_parser = clap::value_parser!(u32).range(1..))]
    context: u32,

    /// Concurrent sequences
    #[arg(short, long, default_value = "1", value_parser = clap::value_parser!(u32).range(1..))]
    batch: u32,

    /// Overhead model: split (10% weights + 2% KV) or flat (0.5 GB + 2% weights)
    #[arg(long, default_value = "split")]
    overhead: String,

    /// Override parameter count (billions)
    #[arg(long, value_name = "BILLIONS")]
    params: Option<f64>,

    /// Override layer count
    #[arg(long)]
    layers: Option<u32>,

    /// Override KV head count
    #[arg(long)]
    kv_heads: Option<u32>,

    /// Override head dimension
    #[arg(long)]
    head_dim: Option<u32>,
}

impl Default for ModelArgs {
    fn default() -> Self {
        ModelArgs {
            model: "Mistral 7B".to_string(),
            weight_quant: "INT8".to_string(),
            kv_quant: "FP16".to_string(),
            context: 8192,
            batch: 1,
            overhead: "split".to_string(),
            params: None,
            layers: None,
            kv_heads: None,
            head_dim: None,
        }
    }
}

#[derive(Args, Clone)]
struct MatchArgs {
    /// Matching policy: headroom, or conservative (1/2/4/8 GPUs, PCIe max 2, 15% utilization floor)
    #[arg(long, default_value = "headroom")]
    policy: String,

    /// Share of nominal VRAM considered usable
    #[arg(long, default_value_t = fit::DEFAULT_USABLE_FRACTION)]
    usable_fraction: f64,

    /// Skip estimation and match this requirement directly (e.g. "100", "100G", "80000M")
    #[arg(long, value_name = "SIZE")]
    vram: Option<String>,

    /// Re-sort the table: name, vram, gpus, utilization, price
    #[arg(long)]
    sort: Option<String>,

    /// Sort descending when --sort is given
    #[arg(long)]
    desc: bool,

    /// Limit number of results
    #[arg(short = 'n', long, value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    limit: Option<usize>,
}

impl Default for MatchArgs {
    fn default() -> Self {
        MatchArgs {
            policy: "headroom".to_string(),
            usable_fraction: fit::DEFAULT_USABLE_FRACTION,
            vram: None,
            sort: None,
            desc: false,
            limit: None,
        }
    }
}

fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_catalog(args: &CatalogArgs) -> Result<HardwareCatalog> {
    match &args.catalog {
        Some(p) => HardwareCatalog::from_path(p),
        None => HardwareCatalog::load(),
    }
}

/// Resolve the preset and apply any shape overrides.
fn resolve_request(args: &ModelArgs) -> Result<(String, EstimateRequest)> {
    let db = ModelDatabase::load()?;
    let arch = db.get(&args.model)?;
    let mut req = EstimateRequest::for_model(
        arch,
        &args.weight_quant,
        &args.kv_quant,
        args.context,
        args.batch,
    );

    let customized = args.params.is_some()
        || args.layers.is_some()
        || args.kv_heads.is_some()
        || args.head_dim.is_some();
    if let Some(params) = args.params {
        req.param_count = params * 1e9;
    }
    if let Some(layers) = args.layers {
        req.layers = layers;
    }
    if let Some(kv_heads) = args.kv_heads {
        req.kv_heads = kv_heads;
    }
    if let Some(head_dim) = args.head_dim {
        req.head_dim = head_dim;
    }

    let name = if customized {
        format!("{} (custom)", arch.name)
    } else {
        arch.name.clone()
    };
    Ok((name, req))
}

fn resolve_overhead(name: &str) -> Result<OverheadModel> {
    OverheadModel::parse(name).ok_or_else(|| FitError::InvalidParameter {
        field: "overhead",
        reason: format!("expected 'split' or 'flat', got '{}'", name),
    })
}

fn resolve_match_config(args: &MatchArgs) -> Result<MatchConfig> {
    let policy = MatchPolicy::parse(&args.policy).ok_or_else(|| FitError::InvalidParameter {
        field: "policy",
        reason: format!("expected 'headroom' or 'conservative', got '{}'", args.policy),
    })?;
    Ok(MatchConfig {
        usable_fraction: args.usable_fraction,
        policy,
    })
}

fn run_estimate(args: &ModelArgs, json: bool) -> Result<()> {
    let (name, req) = resolve_request(args)?;
    let overhead = resolve_overhead(&args.overhead)?;
    let estimate = estimate::estimate(&req, overhead)?;

    if json {
        display::display_json_estimate(&name, &req, overhead, &estimate);
    } else {
        display::display_estimate(&name, &req, overhead, &estimate);
    }
    Ok(())
}

fn run_recommend(
    model: &ModelArgs,
    matching: &MatchArgs,
    json: bool,
    catalog_args: &CatalogArgs,
) -> Result<()> {
    let catalog = load_catalog(catalog_args)?;
    let config = resolve_match_config(matching)?;

    let (required_gb, estimated) = match &matching.vram {
        Some(size) => {
            let gb = hardware::parse_memory_size(size).ok_or_else(|| FitError::InvalidParameter {
                field: "vram",
                reason: format!("could not parse '{}'. Expected format: 100, 100G, 80000M, 1.5T", size),
            })?;
            (gb, None)
        }
        None => {
            let (name, req) = resolve_request(model)?;
            let overhead = resolve_overhead(&model.overhead)?;
            let estimate = estimate::estimate(&req, overhead)?;
            (estimate.total_gb, Some((name, req, overhead, estimate)))
        }
    };

    let mut recs = fit::recommend_hardware_with(required_gb, catalog.gpus(), &config)?;

    if let Some(ref col) = matching.sort {
        match SortColumn::parse(col) {
            Some(column) => recs = fit::sort_recommendations(recs, column, !matching.desc),
            None => tracing::warn!(
                sort = %col,
                "unknown sort column, keeping ranked order (expected name, vram, gpus, utilization, price)"
            ),
        }
    }
    if let Some(n) = matching.limit {
        recs.truncate(n);
    }

    if json {
        display::display_json_recommendations(required_gb, &config, estimated.as_ref(), &recs);
    } else {
        if let Some((name, req, overhead, estimate)) = &estimated {
            display::display_estimate(name, req, *overhead, estimate);
        }
        display::display_recommendations(required_gb, &config, &recs);
    }
    Ok(())
}

fn run_compare(sort: &str, asc: bool, manufacturers: &[String], json: bool) -> Result<()> {
    let db = AcceleratorDatabase::load()?;
    let field = CompareField::parse(sort).ok_or_else(|| FitError::InvalidParameter {
        field: "sort",
        reason: format!("unknown comparison column '{}'", sort),
    })?;

    let rows = compare::filter_by_manufacturers(db.get_all(), manufacturers);
    let rows = compare::sort_accelerators(&rows, field, asc);

    if json {
        display::display_json_accelerators(&rows);
    } else {
        display::display_accelerators(&rows, field, &compare::manufacturers(db.get_all()));
    }
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let Some(command) = cli.command else {
        // Default: the calculator with its stock inputs
        return run_recommend(
            &ModelArgs::default(),
            &MatchArgs::default(),
            cli.json,
            &CatalogArgs::default(),
        );
    };

    match command {
        Commands::Models => {
            let db = ModelDatabase::load()?;
            if cli.json {
                display::display_json_models(db.get_all_models());
            } else {
                display::display_models(db.get_all_models());
            }
        }

        Commands::Quants => {
            if cli.json {
                display::display_json_quants(models::QUANTIZATION_OPTIONS);
            } else {
                display::display_quants(models::QUANTIZATION_OPTIONS);
            }
        }

        Commands::Gpus { catalog } => {
            let catalog = load_catalog(&catalog)?;
            if cli.json {
                display::display_json_gpus(catalog.gpus());
            } else {
                display::display_gpus(catalog.gpus());
            }
        }

        Commands::Estimate(args) => run_estimate(&args, cli.json)?,

        Commands::Recommend {
            model,
            matching,
            catalog,
        } => run_recommend(&model, &matching, cli.json, &catalog)?,

        Commands::Compare {
            sort,
            asc,
            manufacturers,
        } => run_compare(&sort, asc, &manufacturers, cli.json)?,
    }
    Ok(())
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        if let FitError::UnknownModel { name } = &e {
            suggest_models(name);
        }
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn suggest_models(name: &str) {
    let Ok(db) = ModelDatabase::load() else {
        return;
    };
    let first_word = name.split_whitespace().next().unwrap_or(name);
    let matches = db.search(first_word);
    if !matches.is_empty() {
        eprintln!("Did you mean one of:");
        for m in matches {
            eprintln!("  - {}", m.name);
        }
    }
}
