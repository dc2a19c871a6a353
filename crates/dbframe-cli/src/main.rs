//! dbframe CLI: inspect and query a read-only SQLite database.

use clap::{Parser, Subcommand};
use dbframe_core::config::CacheConfig;
use dbframe_core::types::Value;
use dbframe_exec::Database;
use dbframe_planner::parse_query;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "dbframe")]
#[command(about = "Table/column views over a read-only SQLite database", long_about = None)]
struct Cli {
    /// Database file (.db, .sqlite, .sqlite3) or SQL script (.sql)
    database: PathBuf,

    /// Disable result memoization
    #[arg(long)]
    no_cache: bool,

    /// Run the cache population sweep on open
    #[arg(long)]
    populate_cache: bool,

    /// Per-entry cache cap in megabytes (overrides env)
    #[arg(long, value_name = "MB")]
    max_item_size: Option<f64>,

    /// Total cache cap in megabytes (overrides env)
    #[arg(long, value_name = "MB")]
    max_dict_size: Option<f64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tables with their shape
    Tables,

    /// Summarize every column of a table
    Describe {
        /// Table name
        table: String,
    },

    /// Run a YAML query document and print rows as CSV
    Query {
        /// Path to the query YAML file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Show the SQL a YAML query document compiles to
    Explain {
        /// Path to the query YAML file
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Run the cache population sweep and print cache statistics
    Populate,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("dbframe=info")),
        )
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = CacheConfig::from_env();
    apply_flags(
        &mut config,
        cli.no_cache,
        cli.populate_cache,
        cli.max_item_size,
        cli.max_dict_size,
    );

    let mut db = Database::open(&cli.database, config)?;
    tracing::debug!(path = %cli.database.display(), tables = db.catalog().len(), "opened");

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let result = match &cli.command {
        Commands::Tables => list_tables(&db, &mut out),
        Commands::Describe { table } => describe_table(&db, table, &mut out),
        Commands::Query { file } => run_query(&db, &read_doc(file)?, &mut out),
        Commands::Explain { file } => explain_query(&db, &read_doc(file)?, &mut out),
        Commands::Populate => populate(&db, &mut out),
    };
    db.close()?;
    result
}

/// CLI flags take priority over whatever `from_env` produced.
fn apply_flags(
    cfg: &mut CacheConfig,
    no_cache: bool,
    populate: bool,
    max_item_size: Option<f64>,
    max_dict_size: Option<f64>,
) {
    if no_cache {
        cfg.enabled = false;
    }
    if populate {
        cfg.populate = true;
    }
    if let Some(mb) = max_item_size {
        cfg.max_item_size_mb = mb;
    }
    if let Some(mb) = max_dict_size {
        cfg.max_dict_size_mb = mb;
    }
}

fn read_doc(path: &Path) -> Result<String, Box<dyn std::error::Error>> {
    fs::read_to_string(path).map_err(|e| format!("cannot read {}: {}", path.display(), e).into())
}

fn list_tables(db: &Database, out: &mut dyn Write) -> Result<(), Box<dyn std::error::Error>> {
    for table in db.tables()? {
        let (rows, cols) = table.shape()?;
        let kind = table.kind();
        writeln!(out, "{}\t{}\t{} rows\t{} columns", table.name(), kind, rows, cols)?;
    }
    Ok(())
}

fn describe_table(
    db: &Database,
    name: &str,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let table = db.table(name)?;
    writeln!(out, "{}", table.name())?;
    for (column, fields) in table.describe()? {
        let sql_type = table.column(&column)?.sql_type().to_string();
        let rendered: Vec<String> = fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, cell(v)))
            .collect();
        writeln!(out, "  {} ({}): {}", column, sql_type, rendered.join(", "))?;
    }
    Ok(())
}

fn run_query(db: &Database, yaml: &str, out: &mut dyn Write) -> Result<(), Box<dyn std::error::Error>> {
    let view = db.view(parse_query(yaml, db.catalog())?)?;
    let mut rows = view.rows()?;
    let mut writer = csv::Writer::from_writer(out);
    writer.write_record(rows.columns())?;
    let mut n = 0usize;
    for row in rows.iter()? {
        let row = row?;
        writer.write_record(row.values().iter().map(cell))?;
        n += 1;
    }
    writer.flush()?;
    tracing::info!(rows = n, "query finished");
    Ok(())
}

fn explain_query(
    db: &Database,
    yaml: &str,
    out: &mut dyn Write,
) -> Result<(), Box<dyn std::error::Error>> {
    let view = db.view(parse_query(yaml, db.catalog())?)?;
    let compiled = view.compile()?;
    writeln!(out, "{}", compiled.sql)?;
    if !compiled.params.is_empty() {
        writeln!(out)?;
        writeln!(out, "Parameters:")?;
        for (i, p) in compiled.params.iter().enumerate() {
            writeln!(out, "  ?{} = {} ({})", i + 1, p, p.type_name())?;
        }
    }
    Ok(())
}

fn populate(db: &Database, out: &mut dyn Write) -> Result<(), Box<dyn std::error::Error>> {
    let report = db.populate_cache()?;
    writeln!(out, "{}", serde_json::to_string_pretty(&report)?)?;
    writeln!(out, "{}", serde_json::to_string_pretty(&db.cache_stats())?)?;
    Ok(())
}

/// Reals keep a fraction digit so they stay distinguishable from integers.
fn cell(v: &Value) -> String {
    match v {
        Value::Null => String::new(),
        Value::Float(f) => format!("{f:?}"),
        other => other.to_string(),
    }
}
