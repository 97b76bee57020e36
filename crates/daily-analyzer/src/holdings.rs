use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use portfolio_manager::{HoldingLedger, SellEvent};
use serde::Deserialize;

/// One line of `holdings.json`: a purchase and, if it was sold, the sale.
#[derive(Debug, Deserialize)]
struct HoldingRecord {
    symbol: String,
    purchase_date: NaiveDate,
    purchase_price: f64,
    quantity: f64,
    #[serde(default)]
    sell: Option<SellEvent>,
}

/// Replays `path` into a ledger. A missing file yields an empty ledger.
pub fn load_ledger(path: &Path) -> Result<HoldingLedger> {
    let mut ledger = HoldingLedger::new();
    if !path.exists() {
        return Ok(ledger);
    }

    let raw = std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let records: Vec<HoldingRecord> =
        serde_json::from_str(&raw).with_context(|| format!("Failed to parse {}", path.display()))?;

    for record in records {
        let id = ledger
            .open(&record.symbol, record.purchase_date, record.purchase_price, record.quantity)
            .with_context(|| format!("Invalid holding for {}", record.symbol))?;
        if let Some(sell) = record.sell {
            ledger
                .close(id, sell)
                .with_context(|| format!("Invalid sale for {}", record.symbol))?;
        }
    }

    tracing::info!(
        "Loaded {} holdings ({} open) from {}",
        ledger.len(),
        ledger.active().len(),
        path.display()
    );
    Ok(ledger)
}
