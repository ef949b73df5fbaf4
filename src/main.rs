use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::{error, info, warn};

use wage_recon::app::ports::ReconciliationOutputPort;
use wage_recon::app::reconcile_use_case::{ReconcileUseCase, ReconciliationRun};
use wage_recon::config::{PipelineConfig, CONFIG_ENV, DB_ENV};
use wage_recon::infra::{load_csv, InMemoryOutputAdapter, SqliteOutputAdapter};
use wage_recon::observability;
use wage_recon::pipeline::processing::wage_unit::{annualize, WageUnit};

const DEFAULT_DB_PATH: &str = "data/wage_recon.db";

#[derive(Parser)]
#[command(name = "wage_recon")]
#[command(about = "Reconcile disclosed wages against local occupational wage benchmarks")]
#[command(version = "0.1.0")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline over two CSV files and save the result to SQLite
    Run {
        /// Wage disclosure CSV (one row per filing)
        #[arg(long)]
        observations: PathBuf,
        /// Occupational wage survey CSV
        #[arg(long)]
        references: PathBuf,
        /// TOML config file (defaults to $WAGE_RECON_CONFIG, then built-in defaults)
        #[arg(long)]
        config: Option<PathBuf>,
        /// SQLite database path (defaults to $WAGE_RECON_DB, then data/wage_recon.db)
        #[arg(long)]
        db: Option<PathBuf>,
        /// Keep the output in memory instead of writing the database
        #[arg(long)]
        dry_run: bool,
        /// Number of combined rows to print
        #[arg(long, default_value_t = 10)]
        preview: usize,
        /// Print Prometheus metrics after the run
        #[arg(long)]
        print_metrics: bool,
    },
    /// Annualize a single wage amount
    Annualize {
        #[arg(allow_hyphen_values = true)]
        amount: f64,
        /// hour, week, month or year (anything else is taken as annual)
        unit: String,
    },
    /// Print the effective configuration as TOML
    ShowConfig {
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

fn resolve_config(path: Option<PathBuf>) -> wage_recon::Result<PipelineConfig> {
    match path.or_else(|| std::env::var_os(CONFIG_ENV).map(PathBuf::from)) {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            PipelineConfig::load(path)
        }
        None => Ok(PipelineConfig::default()),
    }
}

fn print_summary(run: &ReconciliationRun, preview: usize) {
    let record = &run.record;
    let output = &run.output;
    println!("\n📊 Reconciliation Results (run {}):", record.run_id);
    println!("   Observations kept: {}", record.observation_rows);
    println!("   References kept: {}", record.reference_rows);
    println!("   Combined rows: {}", record.reconciled_rows);
    println!("   Data quality issues: {}", output.diagnostics.data_quality.total());
    for warning in &output.diagnostics.warnings {
        println!("   ⚠️  {}", warning);
    }

    println!("\n   Rows per stage:");
    for stage in &output.diagnostics.stages {
        println!(
            "     {:<12} {:<14} {:>8} -> {:<8}",
            stage.side, stage.stage, stage.input_rows, stage.output_rows
        );
    }

    if preview > 0 && !output.reconciled.is_empty() {
        println!("\n   First {} combined rows:", preview.min(output.reconciled.len()));
        println!(
            "     {:<10} {:<40} {:>12} {:>12} {:>12}",
            "code", "title", "annual", "local avg", "diff"
        );
        for row in output.reconciled.iter().take(preview) {
            let diff = row
                .wage_diff
                .map(|d| format!("{:.2}", d))
                .unwrap_or_else(|| "-".to_string());
            println!(
                "     {:<10} {:<40} {:>12.2} {:>12.2} {:>12}",
                row.occupation_code,
                row.occupation_title.as_deref().unwrap_or("-"),
                row.annual_wage,
                row.avg_local_wage,
                diff
            );
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    observability::init_logging();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            observations,
            references,
            config,
            db,
            dry_run,
            preview,
            print_metrics,
        } => {
            if print_metrics {
                observability::init_metrics()?;
            }
            let config = resolve_config(config)?;

            println!("🔄 Loading input tables...");
            let observation_table = load_csv(&observations)?;
            let reference_table = load_csv(&references)?;

            let output: Box<dyn ReconciliationOutputPort> = if dry_run {
                Box::new(InMemoryOutputAdapter::new())
            } else {
                let db_path = db
                    .or_else(|| std::env::var_os(DB_ENV).map(PathBuf::from))
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_DB_PATH));
                println!("💾 Writing results to {}", db_path.display());
                Box::new(SqliteOutputAdapter::open(&db_path, config.output.clone())?)
            };

            let mut use_case = ReconcileUseCase::new(config, output);
            match use_case.execute(&observation_table, &reference_table).await {
                Ok(run) => {
                    print_summary(&run, preview);
                    println!("\n✅ Reconciliation completed successfully");
                }
                Err(e) => {
                    error!("Reconciliation failed: {}", e);
                    println!("❌ Reconciliation failed ({}): {}", use_case.state(), e);
                    return Err(e.into());
                }
            }

            if print_metrics {
                if let Some(text) = observability::render_metrics() {
                    println!("\n{}", text);
                }
            }
        }
        Commands::Annualize { amount, unit } => {
            if WageUnit::parse(&unit).is_none() {
                warn!("Unrecognized wage unit '{}'; amount taken as annual", unit);
            }
            println!("{:.2}", annualize(amount, Some(unit.as_str())));
        }
        Commands::ShowConfig { config } => {
            let config = resolve_config(config)?;
            print!("{}", config.to_toml()?);
        }
    }
    Ok(())
}
