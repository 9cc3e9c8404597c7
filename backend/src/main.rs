//! LT Check CLI - rebuild the demand/supply ledger and query availability
//!
//! # Main Commands
//!
//! ```bash
//! ltcheck serve                     # Start HTTP server (port 3000)
//! ltcheck rebuild -o ledger.csv     # Rebuild and export the ledger
//! ltcheck reference SO-1001         # Lines and shortfall of one order
//! ltcheck assign A100 25 --site Main
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! ltcheck decompose "S50, including X, 2xY"   # Show a parsed kit description
//! ltcheck matrices                            # Show default options and feed matrices
//! ```
//!
//! Feed locations come from `LTCHECK_*` environment variables (or `.env`) and
//! can be overridden per run with the flags below.

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use ltcheck::api::logs::LOG_BROADCASTER;
use ltcheck::api::types::non_blank;
use ltcheck::api::{start_server, AppState};
use ltcheck::cache::{LedgerSnapshot, LedgerStore};
use ltcheck::config::{ServerConfig, SourcePaths};
use ltcheck::parser::write_ledger_csv;
use ltcheck::transform::{
    operations_description, parse_description, rebuild_from_paths, ReconcileOptions,
};

#[derive(Parser)]
#[command(name = "ltcheck")]
#[command(about = "Reconcile sales, purchase and shipping feeds into an availability ledger", long_about = None)]
struct Cli {
    #[command(flatten)]
    sources: SourceArgs,

    /// Reconcile options JSON (kit prefix, excluded models, feed matrices)
    #[arg(long, global = true)]
    options: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct SourceArgs {
    /// Open sales orders export
    #[arg(long, global = true)]
    sales_orders: Option<PathBuf>,

    /// Open purchase orders export
    #[arg(long, global = true)]
    purchase_orders: Option<PathBuf>,

    /// Vendor shipping schedule export
    #[arg(long, global = true)]
    shipping_schedule: Option<PathBuf>,

    /// Item alias table
    #[arg(long, global = true)]
    item_aliases: Option<PathBuf>,

    /// On-hand inventory report
    #[arg(long, global = true)]
    on_hand: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Rebuild the ledger and export it
    Rebuild {
        /// Output file, .csv or .json (default: CSV on stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Show every line of one reference number
    Reference {
        /// QuickBooks reference number
        reference: String,
    },

    /// Show the ledger lines of one item, grouped by site
    Item {
        item: String,

        /// Only this site
        #[arg(long)]
        site: Option<String>,
    },

    /// Earliest date a quantity of an item is available
    Assign {
        item: String,

        need_qty: f64,

        #[arg(long)]
        site: Option<String>,
    },

    /// Parse a kit description
    Decompose {
        /// Description text
        text: String,

        /// Model code used when the text names no item
        #[arg(long, default_value = "")]
        model: String,
    },

    /// Show the default reconcile options, feed matrices included
    Matrices {
        /// List the cleaning operations instead
        #[arg(long)]
        operations: bool,
    },

    /// Start HTTP server
    Serve {
        /// Port to listen on (default: LTCHECK_PORT or 3000)
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let paths = cli.sources.resolve();

    let result = match load_options(cli.options.as_deref()) {
        Err(e) => Err(e),
        Ok(options) => match cli.command {
            Commands::Rebuild { output } => cmd_rebuild(&paths, &options, output.as_deref()),
            Commands::Reference { reference } => cmd_reference(&paths, &options, &reference),
            Commands::Item { item, site } => {
                cmd_item(&paths, &options, &item, non_blank(site.as_deref()))
            }
            Commands::Assign {
                item,
                need_qty,
                site,
            } => cmd_assign(&paths, &options, &item, need_qty, non_blank(site.as_deref())),
            Commands::Decompose { text, model } => cmd_decompose(&text, &model),
            Commands::Matrices { operations } => cmd_matrices(&options, operations),
            Commands::Serve { port } => cmd_serve(paths, options, port).await,
        },
    };

    if let Err(e) = result {
        eprintln!("✗ Error: {}", e);
        std::process::exit(1);
    }
}

impl SourceArgs {
    fn resolve(&self) -> SourcePaths {
        let env = SourcePaths::from_env();
        SourcePaths {
            sales_orders: self.sales_orders.clone().unwrap_or(env.sales_orders),
            purchase_orders: self.purchase_orders.clone().unwrap_or(env.purchase_orders),
            shipping_schedule: self.shipping_schedule.clone().unwrap_or(env.shipping_schedule),
            item_aliases: self.item_aliases.clone().unwrap_or(env.item_aliases),
            on_hand: self.on_hand.clone().or(env.on_hand),
        }
    }
}

fn load_options(path: Option<&Path>) -> Result<ReconcileOptions, Box<dyn std::error::Error>> {
    match path {
        Some(p) => Ok(ReconcileOptions::from_file(p)?),
        None => Ok(ReconcileOptions::default()),
    }
}

/// Rebuild with the log echo off so stdout stays machine-readable.
fn build_quiet(
    paths: &SourcePaths,
    options: &ReconcileOptions,
) -> Result<LedgerSnapshot, Box<dyn std::error::Error>> {
    LOG_BROADCASTER.set_echo(false);
    let output = rebuild_from_paths(paths, options)?;
    let snapshot = LedgerSnapshot::new(output);
    eprintln!("{} ledger entries", snapshot.ledger.len());
    Ok(snapshot)
}

fn cmd_rebuild(
    paths: &SourcePaths,
    options: &ReconcileOptions,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = output else {
        let snapshot = build_quiet(paths, options)?;
        write_ledger_csv(std::io::stdout().lock(), &snapshot.ledger)?;
        return Ok(());
    };

    let snapshot = LedgerSnapshot::new(rebuild_from_paths(paths, options)?);
    let is_json = path
        .extension()
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));

    if is_json {
        fs::write(path, serde_json::to_string_pretty(&snapshot.ledger)?)?;
    } else {
        ltcheck::parser::write_ledger_csv_file(path, &snapshot.ledger)?;
    }

    let report = &snapshot.report;
    eprintln!("\n📊 SUMMARY");
    for feed in &report.feeds {
        eprintln!(
            "   {:<18} {} read, {} kept, {} skipped",
            feed.feed.as_str(),
            feed.rows_read,
            feed.rows_kept,
            feed.rows_skipped
        );
    }
    eprintln!("   Kit lines:         {}", report.kit_lines);
    eprintln!("   Recovered POs:     {}", report.recovered_refs.len());
    eprintln!("   Ledger entries:    {}", report.ledger_entries);
    eprintln!("💾 Ledger written to: {}", path.display());
    Ok(())
}

fn cmd_reference(
    paths: &SourcePaths,
    options: &ReconcileOptions,
    reference: &str,
) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = build_quiet(paths, options)?;
    let summary = snapshot
        .projector()
        .reference_summary(reference.trim())
        .ok_or_else(|| format!("Reference not found: {}", reference))?;
    print_json(&summary)
}

fn cmd_item(
    paths: &SourcePaths,
    options: &ReconcileOptions,
    item: &str,
    site: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let snapshot = build_quiet(paths, options)?;
    let projector = snapshot.projector();
    match site {
        Some(site) => print_json(&projector.lookup_by_item(item, Some(site))),
        None => print_json(&projector.item_rows_by_site(item)),
    }
}

fn cmd_assign(
    paths: &SourcePaths,
    options: &ReconcileOptions,
    item: &str,
    need_qty: f64,
    site: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    if !(need_qty > 0.0) {
        return Err("Need qty must be > 0".into());
    }
    let snapshot = build_quiet(paths, options)?;
    let projection = snapshot.projector().project_availability(item, need_qty, site);

    match projection.earliest_date {
        Some(date) => eprintln!("✓ {} x {} available on {}", need_qty, item, date),
        None => eprintln!("! {} x {} not covered by the ledger", need_qty, item),
    }
    print_json(&projection)
}

fn cmd_decompose(text: &str, model: &str) -> Result<(), Box<dyn std::error::Error>> {
    print_json(&parse_description(text, model))
}

fn cmd_matrices(
    options: &ReconcileOptions,
    operations: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if operations {
        println!("{}", operations_description());
        return Ok(());
    }
    print_json(options)
}

async fn cmd_serve(
    paths: SourcePaths,
    options: ReconcileOptions,
    port: Option<u16>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = ServerConfig::from_env();
    if let Some(port) = port {
        config.port = port;
    }

    let state = Arc::new(AppState {
        store: LedgerStore::new(),
        sources: paths,
        options,
    });

    // Serve even when the first load fails; data endpoints answer 503 until a reload succeeds
    let loader = state.clone();
    let initial = tokio::task::spawn_blocking(move || {
        loader.store.reload(&loader.sources, &loader.options).map(|_| ())
    })
    .await?;
    if let Err(e) = initial {
        eprintln!("! Initial load failed: {}", e);
    }

    start_server(config, state).await
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
