//! CFLP command line

use std::{
    fs::File,
    io::{self, BufReader, BufWriter},
    path::PathBuf,
};

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use cflp::{
    config::{ConstraintFamily, RunConfig, RunOverrides},
    constraints::{IndexBase, SideConstraintSet},
    loader::{LoadOptions, load_file_with, write_instance},
    pipeline,
    prep::{orlib, rules},
    report::Report,
    solvers::Backend,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "cflp", about = "Capacitated facility location solver", long_about = None)]
struct Cli {
    /// Default log level; `RUST_LOG` takes precedence
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Solve an instance file and print the report
    Solve(SolveArgs),

    /// Convert an OR-Library capacitated warehouse file to the instance format
    Convert(ConvertArgs),
}

#[derive(Debug, Args)]
struct SolveArgs {
    /// Instance file
    file: PathBuf,

    /// YAML run configuration
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Time budget in seconds
    #[arg(short, long)]
    time_limit: Option<f64>,

    /// Solver backend
    #[arg(short, long, value_enum)]
    backend: Option<Backend>,

    /// Enable a constraint family (repeatable)
    #[arg(long, value_enum)]
    enable: Vec<ConstraintFamily>,

    /// Disable a constraint family (repeatable)
    #[arg(long, value_enum)]
    disable: Vec<ConstraintFamily>,

    /// Side-constraint indices in the file start at one
    #[arg(long)]
    one_based: bool,
}

impl SolveArgs {
    fn overrides(&self) -> RunOverrides {
        RunOverrides {
            time_limit_secs: self.time_limit,
            backend: self.backend,
            enable: self.enable.clone(),
            disable: self.disable.clone(),
        }
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            index_base: if self.one_based {
                IndexBase::One
            } else {
                IndexBase::Zero
            },
        }
    }
}

#[derive(Debug, Args)]
struct ConvertArgs {
    /// OR-Library `cap*.txt` file
    input: PathBuf,

    /// Instance file to write
    output: PathBuf,

    /// Prohibit neighbouring customer pairs `(1, 2), (3, 4), ...`
    #[arg(long)]
    sequential_pairs: bool,

    /// Prohibit every pair among customers `STEP, 2 * STEP, ...` below the customer count
    #[arg(long)]
    multiples_of: Option<usize>,

    /// Make warehouse `i` depend on warehouse `i + OFFSET`
    #[arg(long)]
    dependency_offset: Option<usize>,

    /// Number of warehouses given a dependency
    #[arg(long, default_value_t = 5)]
    dependency_count: usize,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    match cli.command {
        Commands::Solve(args) => run_solve(&args),
        Commands::Convert(args) => run_convert(&args),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .compact()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(io::stderr)
        .init();
}

fn run_solve(args: &SolveArgs) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => RunConfig::from_file(path)
            .with_context(|| format!("loading configuration {}", path.display()))?,
        None => RunConfig::default(),
    };

    config
        .apply_overrides(&args.overrides())
        .context("applying command line overrides")?;

    let loaded = load_file_with(&args.file, args.load_options())
        .with_context(|| format!("loading instance {}", args.file.display()))?;

    let outcome = pipeline::solve(&loaded, &config)?;

    info!(
        variables = outcome.stats.variables,
        constraints = outcome.stats.total_constraints(),
        skipped_side_constraints = outcome.invalid_entries.len(),
        "model statistics"
    );

    if !outcome.violations.is_empty() {
        warn!(
            count = outcome.violations.len(),
            "reported plan failed post-solve checks"
        );
    }

    Report::new(&loaded.instance, &outcome.solution)
        .with_elapsed(outcome.elapsed)
        .write_to(io::stdout().lock())?;

    Ok(())
}

fn run_convert(args: &ConvertArgs) -> Result<()> {
    let input = File::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;

    let instance = orlib::convert(BufReader::new(input))
        .with_context(|| format!("converting {}", args.input.display()))?;

    let customers = instance.customer_count();
    let mut pairs = Vec::new();

    if args.sequential_pairs {
        pairs.extend(rules::sequential_pairs(customers));
    }

    if let Some(step) = args.multiples_of {
        pairs.extend(rules::multiples_pairs(step, customers));
    }

    let dependencies = args
        .dependency_offset
        .map(|offset| {
            rules::offset_dependencies(args.dependency_count, offset, instance.warehouse_count())
        })
        .unwrap_or_default();

    let mut side = SideConstraintSet::new();
    rules::extend(&mut side, pairs, dependencies);

    let output = File::create(&args.output)
        .with_context(|| format!("creating {}", args.output.display()))?;

    write_instance(&instance, &side, BufWriter::new(output))?;

    info!(
        warehouses = instance.warehouse_count(),
        customers,
        output = %args.output.display(),
        "wrote instance"
    );

    Ok(())
}
