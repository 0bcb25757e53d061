mod cli;

use clap::Parser;
use cli::{Cli, Commands, InsertArgs, ScanArgs, TableArgs};
use heapdb::core::config::{Config, ConfigManager};
use heapdb::{Database, DbFileIterator, Field, HeapFile, PageId, Permissions, TransactionId, Tuple};
use logly::prelude::*;
use std::sync::Arc;

fn main() {
    if let Err(e) = run_app() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run_app() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config_manager = ConfigManager::new()?;
    let config = config_manager.load_config()?;

    let logger = Arc::new(Logger::new());
    let mut logger_config = LoggerConfig::default();
    logger_config.color = config.logging.color;
    logger.configure(logger_config);

    if config.logging.log_to_file {
        logger.add_sink(SinkConfig {
            path: Some(config_manager.log_path(&config)),
            rotation: Some("daily".to_string()),
            retention: Some(7),
            async_write: true,
            ..Default::default()
        })?;
    }

    match &cli.command {
        Commands::Init => run_init(&config_manager, &logger),
        Commands::Status => print_status(&config_manager, &config),
        Commands::Inspect(args) => run_inspect(args, &config, logger.clone()),
        Commands::Scan(args) => run_scan(args, &config, logger.clone()),
        Commands::Insert(args) => run_insert(args, &config, logger.clone()),
    }
}

fn run_init(manager: &ConfigManager, logger: &Logger) -> anyhow::Result<()> {
    logger.info("Initializing heapdb...".to_string())?;
    manager.init()?;
    logger.success(format!("Initialized {:?}", manager.root_dir))?;
    logger.info(format!("  Config: {:?}", manager.config_path()))?;
    Ok(())
}

fn print_status(manager: &ConfigManager, config: &Config) -> anyhow::Result<()> {
    println!("heapdb v{}", env!("CARGO_PKG_VERSION"));
    println!("Config Path: {:?}", manager.config_path());
    println!("Data Directory: {:?}", manager.data_dir());
    println!(
        "Buffer Pool: {} pages ({} KB)",
        config.storage.buffer_pool_size,
        (config.storage.buffer_pool_size * config.storage.page_size) / 1024
    );
    println!("Page Size: {} bytes", config.storage.page_size);
    Ok(())
}

fn open_table(args: &TableArgs, config: &Config, logger: Arc<Logger>) -> anyhow::Result<(Database, Arc<HeapFile>)> {
    let desc = cli::parse_schema(&args.schema)?;
    let name = args
        .file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("table")
        .to_string();

    let db = Database::with_logger(&config.storage, logger);
    let table_id = db.create_table(&name, &args.file, desc)?;
    let file = db.catalog().database_file(table_id)?;
    Ok((db, file))
}

fn run_inspect(args: &TableArgs, config: &Config, logger: Arc<Logger>) -> anyhow::Result<()> {
    let (db, file) = open_table(args, config, logger)?;
    let tid = TransactionId::new();
    let num_pages = file.num_pages()?;

    println!("Table: {} (id {})", file.identity(), file.id());
    println!("Schema: {}", file.tuple_desc());
    println!("Pages: {}", num_pages);

    let mut total = 0;
    for page_no in 0..num_pages {
        let page = db
            .buffer_pool()
            .get_page(tid, PageId::new(file.id(), page_no), Permissions::ReadOnly)?;
        let guard = page.read();
        total += guard.num_tuples();
        println!(
            "  page {:>5}: {:>5} live, {:>5} empty of {}",
            page_no,
            guard.num_tuples(),
            guard.num_empty_slots(),
            guard.capacity()
        );
    }
    println!("Tuples: {}", total);
    Ok(())
}

fn run_scan(args: &ScanArgs, config: &Config, logger: Arc<Logger>) -> anyhow::Result<()> {
    let (db, file) = open_table(&args.table, config, logger)?;
    let limit = args.limit.unwrap_or(usize::MAX);

    let mut it = file.iterator(db.buffer_pool(), TransactionId::new());
    it.open()?;
    let mut count = 0;
    while count < limit && it.has_next()? {
        println!("{}", it.next()?);
        count += 1;
    }
    it.close();
    Ok(())
}

fn run_insert(args: &InsertArgs, config: &Config, logger: Arc<Logger>) -> anyhow::Result<()> {
    let (db, file) = open_table(&args.table, config, logger.clone())?;
    let desc = file.tuple_desc().clone();
    if args.values.len() != desc.num_fields() {
        anyhow::bail!("expected {} values, got {}", desc.num_fields(), args.values.len());
    }

    let mut fields = Vec::with_capacity(args.values.len());
    for (i, raw) in args.values.iter().enumerate() {
        let field_type = desc
            .field_type(i)
            .ok_or_else(|| anyhow::anyhow!("no column at index {}", i))?;
        fields.push(Field::parse(field_type, raw)?);
    }

    let tid = TransactionId::new();
    let mut tuple = Tuple::with_fields(desc, fields)?;
    db.buffer_pool().insert_tuple(tid, file.id(), &mut tuple)?;
    db.buffer_pool().flush_pages(tid)?;
    file.sync()?;

    if let Some(rid) = tuple.record_id() {
        logger.success(format!("Inserted row at {}", rid))?;
    }
    Ok(())
}
