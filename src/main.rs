//! memorydb-demo - scripted record operations against a MemoryDB cluster
//!
//! Reads the cluster settings, connects, upserts JSON and Hash records,
//! reads them back, deletes some and shuts down.

use anyhow::{Context, Result};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

use memorydb_records::config::{connection_config, CliArgs};
use memorydb_records::{ClusterClient, ConnectionConfig, PropertySource, RecordService};

// Sample data
const RECORD1_KEY: &str = "customer:111";
const RECORD1_VALUE: &str = r#"{"name":{"first": "First1", "last": "Last1"}, "address": "111 Test Street, Test City, Test State, Test Country", "phone": "+1 111-111-1111", "email": "first1last1@test.com"}"#;
const RECORD2_KEY: &str = "customer:222";
const RECORD2_VALUE: &str = r#"{"name":{"first": "First2", "last": "Last2"}, "address": "222 Test Street, Test City, Test State, Test Country", "phone": "+1 222-222-2222", "email": "first2last2@test.com"}"#;
const RECORD3_KEY: &str = "customer:333";
const RECORD3_VALUE: &str = r#"{"first_name": "First3", "last_name": "Last3", "address": "333 Test Street, Test City, Test State, Test Country", "phone": "+1 333-333-3333", "email": "first3last3@test.com"}"#;
const RECORD4_KEY: &str = "customer:444";

fn setup_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else if verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

fn load_config(args: &CliArgs) -> Result<ConnectionConfig> {
    info!("Reading config file {:?}...", args.config_file);
    let mut source = PropertySource::from_path(&args.config_file)?;
    if args.env_overrides {
        source = source.with_env_overrides(connection_config::ALL_KEYS);
    }
    let config = ConnectionConfig::load(&source)?;
    info!("Completed reading config file.");
    Ok(config)
}

fn run_scenario(service: &RecordService) -> Result<()> {
    // JSON records
    println!("{}", service.upsert_json_record(RECORD1_KEY, RECORD1_VALUE)?);
    println!("{}", service.upsert_json_record(RECORD2_KEY, RECORD2_VALUE)?);
    println!("Value = {}", service.get_json_record(RECORD1_KEY, None)?);
    println!(
        "Value = {}",
        service.get_json_record(RECORD1_KEY, Some(".name.first"))?
    );
    println!(
        "Value = {}",
        service.get_json_record(RECORD1_KEY, Some(".address"))?
    );

    // Hash records
    println!("{}", service.upsert_hash_record(RECORD3_KEY, RECORD3_VALUE)?);
    println!("Value = {}", service.get_hash_record(RECORD3_KEY, None)?);
    println!(
        "Value = {}",
        service.get_hash_record(RECORD3_KEY, Some("first_name"))?
    );
    println!(
        "Value = {}",
        service.get_hash_record(RECORD3_KEY, Some("address"))?
    );

    // Deletes
    println!("{}", service.delete_record(RECORD1_KEY)?);
    println!("Value = {}", service.get_record(RECORD1_KEY)?);
    println!("{}", service.delete_record(RECORD4_KEY)?);

    Ok(())
}

fn run() -> Result<()> {
    let args = CliArgs::parse_args();
    setup_logging(args.verbose, args.quiet);

    let config = load_config(&args).context("Configuration error")?;
    let client = ClusterClient::connect(&config).context("Failed to connect to cluster")?;
    let service = RecordService::new(client);

    let result = run_scenario(&service);
    service.shutdown();
    result
}

fn main() {
    if let Err(e) = run() {
        error!("Error: {:#}", e);
        std::process::exit(1);
    }
}
