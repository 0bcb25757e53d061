use clap::{Parser, Subcommand, Args};
use anyhow::{Result, anyhow};
use std::path::PathBuf;

use heapdb::{TupleDesc, Type};

#[derive(Parser)]
#[command(name = "heapdb")]
#[command(about = "heapdb: inspect and load page-oriented heap files", long_about = None)]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Create the data directory and a default config
    Init,
    /// Show configuration and data directory
    Status,
    /// Show page and slot usage of a heap file
    Inspect(TableArgs),
    /// Print every tuple of a heap file
    Scan(ScanArgs),
    /// Insert one row into a heap file
    Insert(InsertArgs),
}

#[derive(Args)]
pub struct TableArgs {
    /// Heap file to open (created if missing)
    pub file: PathBuf,
    /// Comma-separated column list, e.g. "id:int,name:string"
    #[arg(long)]
    pub schema: String,
}

#[derive(Args)]
pub struct ScanArgs {
    #[command(flatten)]
    pub table: TableArgs,
    #[arg(long)]
    pub limit: Option<usize>,
}

#[derive(Args)]
pub struct InsertArgs {
    #[command(flatten)]
    pub table: TableArgs,
    /// One value per column
    #[arg(required = true)]
    pub values: Vec<String>,
}

/// Parses "type,type" or "name:type,name:type".
pub fn parse_schema(spec: &str) -> Result<TupleDesc> {
    let mut types = Vec::new();
    let mut names = Vec::new();
    for column in spec.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        let (name, col_type) = match column.split_once(':') {
            Some((name, col_type)) => (Some(name.trim().to_string()), col_type),
            None => (None, column),
        };
        types.push(col_type.parse::<Type>()?);
        names.push(name);
    }
    if types.is_empty() {
        return Err(anyhow!("schema must name at least one column"));
    }
    Ok(TupleDesc::new(types, names))
}
