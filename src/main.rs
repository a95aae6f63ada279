mod config;
mod core;
mod db;
mod error;
mod explorer;
mod rpc;
mod signals;
pub mod tags;

use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::core::RiskAnalysisResult;
use crate::core::address;
use crate::core::analyzer::Analyzer;
use crate::db::SharedDatabase;
use crate::explorer::ExploreOptions;
use crate::rpc::{Balance, EtherscanClient, RecentTransaction, TokenBalance};
use crate::tags::{TagStore, WalletLabel, normalize_tags};

const USAGE: &str = "\
Usage:
  ethrisk <address> [config.toml]              analyze an address
  ethrisk tag <address> <tag1,tag2> [config]   add an administrative tag row";

/// Everything printed for one analyzed address.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddressReport {
    address: String,
    balance: Balance,
    token_balances: Vec<TokenBalance>,
    wallet_label: Option<WalletLabel>,
    transaction_count: Option<u64>,
    first_transaction: Option<DateTime<Utc>>,
    recent_transactions: Vec<RecentTransaction>,
    risk_assessment: RiskAnalysisResult,
}

#[tokio::main]
async fn main() {
    // Logs go to stderr; stdout carries the JSON report.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("ethrisk=info")),
        )
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let outcome = match args.first().map(String::as_str) {
        Some("tag") if args.len() >= 3 => {
            add_tag(&args[1], &args[2], args.get(3).map(String::as_str).unwrap_or("config.toml"))
        }
        Some(addr) if addr != "tag" && addr != "-h" && addr != "--help" => {
            analyze(addr, args.get(1).map(String::as_str).unwrap_or("config.toml")).await
        }
        _ => {
            eprintln!("{USAGE}");
            std::process::exit(2);
        }
    };

    if let Err(e) = outcome {
        eprintln!("❌ {e}");
        std::process::exit(1);
    }
}

fn open_database(config: &Config) -> Result<SharedDatabase, Box<dyn std::error::Error>> {
    let db_path = Path::new(&config.database.path);
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let db = SharedDatabase::open(db_path)?;
    info!("Database opened at {}", config.database.path);
    Ok(db)
}

/// Build the tag store once: CSV into SQLite, then SQLite into memory.
fn load_tag_store(config: &Config, db: Option<&SharedDatabase>) -> TagStore {
    let Some(db) = db else {
        warn!("No database available, continuing with an empty tag store");
        return TagStore::empty();
    };

    if let Some(ref csv_path) = config.database.tags_csv {
        let csv_path = Path::new(csv_path);
        if csv_path.exists() {
            match db.load_tags_from_csv(csv_path) {
                Ok(count) => info!("Loaded {count} address tags from {}", csv_path.display()),
                Err(e) => warn!("Failed to load address tags CSV: {e}"),
            }
        } else {
            warn!("Tag table {} not found", csv_path.display());
        }
    }

    TagStore::load_from_db(db)
}

fn add_tag(address: &str, tag_list: &str, config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    let address = address::normalize(address)?;
    let config = Config::load(config_path);
    let db = open_database(&config)?;

    let added = normalize_tags(tag_list.split(','));
    if added.is_empty() {
        return Err("no tags given".into());
    }
    let existing = db.lookup_tags(&address)?.unwrap_or_default();
    let tags = normalize_tags(existing.iter().chain(added.iter()).map(String::as_str));
    db.insert_tags(&address, &tags, Some("admin"))?;
    println!("Tagged {address}: {}", tags.join(", "));
    Ok(())
}

async fn analyze(input: &str, config_path: &str) -> Result<(), Box<dyn std::error::Error>> {
    // Reject malformed input before anything else runs.
    let address = address::normalize(input)?;

    let config = Config::load(config_path);
    info!("Analysis config: {:?}", config.analysis);

    let db = match open_database(&config) {
        Ok(db) => Some(db),
        Err(e) => {
            warn!("Failed to open database, tags and caching disabled: {e}");
            None
        }
    };
    let tag_store = Arc::new(load_tag_store(&config, db.as_ref()));

    let client = Arc::new(EtherscanClient::new(&config.explorer, config.analysis.hop_tx_limit)?);
    let options = ExploreOptions {
        max_hops: config.analysis.max_hops,
        hop_delay: config.analysis.hop_delay(),
    };
    let analyzer = Analyzer::new(tag_store, client.clone(), options);

    info!("Collecting data for {address}");
    let (balance, tokens, recent, tx_count, first_tx) = tokio::join!(
        client.balance(&address),
        client.token_balances(&address),
        client.txlist(&address, config.analysis.recent_tx_limit),
        client.transaction_count(&address),
        client.first_transaction(&address),
    );

    let balance = balance.unwrap_or_else(|e| {
        warn!("Balance lookup failed: {e}");
        Balance::zero()
    });
    let token_balances = tokens.unwrap_or_else(|e| {
        warn!("Token balance lookup failed: {e}");
        Vec::new()
    });
    let recent = recent
        .map_err(|e| warn!("Transaction list fetch failed: {e}"))
        .ok();
    let tx_count = tx_count.map_err(|e| warn!("Transaction count lookup failed: {e}")).ok();
    let first_tx = first_tx
        .map_err(|e| warn!("First transaction lookup failed: {e}"))
        .ok()
        .flatten();

    let cache_ttl = config.cache.ttl();
    let cached = match (&db, config.cache.enabled) {
        (Some(db), true) => db
            .cached_assessment(&address, cache_ttl)
            .map_err(|e| warn!("Assessment cache read failed: {e}"))
            .ok()
            .flatten(),
        _ => None,
    };

    let risk_assessment = match cached {
        Some(result) => {
            info!("Using cached assessment for {address}");
            result
        }
        None => {
            let result = analyzer.analyze(&address, recent.as_deref()).await?;
            if let (Some(db), true) = (&db, config.cache.enabled) {
                if let Err(e) = db.store_assessment(&result) {
                    warn!("Failed to cache assessment: {e}");
                }
            }
            result
        }
    };

    let recent_transactions = recent
        .iter()
        .flatten()
        .map(|tx| RecentTransaction::new(&address, tx, client.eth_price_usd()))
        .collect();

    let report = AddressReport {
        wallet_label: analyzer.tags().label_for(&address),
        address,
        balance,
        token_balances,
        transaction_count: tx_count,
        first_transaction: first_tx,
        recent_transactions,
        risk_assessment,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
