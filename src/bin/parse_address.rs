// src/bin/parse_address.rs
use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use landplot_lib::matching::address::parse_address;
use landplot_lib::matching::db::fetch_reference_table;
use landplot_lib::matching::settlement::{MatchStrategy, SettlementMatcher};
use landplot_lib::utils::db_connect::connect;
use landplot_lib::utils::env::load_env;

#[derive(Parser)]
#[command(author, version, about = "Parse one address and match it against the settlement reference table", long_about = None)]
struct ParseArgs {
    /// Free-text postal address
    address: String,

    /// Settlement tie-break: first | prefer_exact
    #[arg(long)]
    strategy: Option<MatchStrategy>,

    /// Only parse, skip the database lookup
    #[arg(long)]
    no_db: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    load_env();
    let args = ParseArgs::parse();

    let parsed = parse_address(&args.address);
    info!("Detected district: '{}'", parsed.detected_district_name);
    info!("Detected settlement: '{}'", parsed.detected_settlement_name);
    if args.no_db {
        println!("{}", serde_json::to_string_pretty(&parsed).context("Failed to serialize parse result")?);
        return Ok(());
    }

    let pool = connect().await.context("Failed to connect to database")?;
    let table = fetch_reference_table(&pool)
        .await
        .context("Failed to load settlement reference table")?;
    let matcher = SettlementMatcher::new(table, args.strategy.unwrap_or_else(MatchStrategy::from_env));

    let matched = matcher.match_location(&parsed);
    let candidates = matcher.rank_candidates(&parsed);
    for (i, c) in candidates.iter().enumerate() {
        info!(
            "  {}. {} ({}) score {:.3}",
            i + 1,
            c.settlement_name,
            c.district_name.as_deref().unwrap_or("?"),
            c.score
        );
    }

    let output = serde_json::json!({
        "parsed": parsed,
        "matched": matched,
        "candidates": candidates,
    });
    println!("{}", serde_json::to_string_pretty(&output).context("Failed to serialize match result")?);
    Ok(())
}
