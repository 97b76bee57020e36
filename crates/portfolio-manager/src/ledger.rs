use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;

use crate::models::*;

/// In-memory book of holdings keyed by a monotonically increasing id.
#[derive(Debug)]
pub struct HoldingLedger {
    holdings: BTreeMap<u64, Holding>,
    next_id: u64,
}

impl HoldingLedger {
    pub fn new() -> Self {
        Self {
            holdings: BTreeMap::new(),
            next_id: 1,
        }
    }

    /// Records a purchase and returns the new holding's id.
    pub fn open(
        &mut self,
        symbol: impl Into<String>,
        purchase_date: NaiveDate,
        price: f64,
        quantity: f64,
    ) -> Result<u64, LedgerError> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(LedgerError::InvalidInput("symbol must not be empty".to_string()));
        }
        if !is_positive(price) || !is_positive(quantity) {
            return Err(LedgerError::InvalidInput(format!(
                "purchase price and quantity must be positive, got {} x {}",
                price, quantity
            )));
        }

        let id = self.next_id;
        self.next_id = id + 1;

        tracing::info!("Opened holding {}: {} {} at {} on {}", id, quantity, symbol, price, purchase_date);
        self.holdings
            .insert(id, Holding::open(id, symbol, purchase_date, price, quantity));
        Ok(id)
    }

    /// Closes holding `id` and returns its realized profit/loss.
    pub fn close(&mut self, id: u64, sell: SellEvent) -> Result<f64, LedgerError> {
        let holding = self.holdings.get_mut(&id).ok_or(LedgerError::UnknownHolding(id))?;

        match holding.close(&sell) {
            Ok(pnl) => {
                tracing::info!(
                    "Closed holding {} ({}) at {} on {}: realized {:.2}",
                    id,
                    holding.symbol(),
                    sell.price,
                    sell.date,
                    pnl
                );
                Ok(pnl)
            }
            Err(e) => {
                tracing::warn!("Rejected sell for holding {}: {}", id, e);
                Err(e)
            }
        }
    }

    pub fn get(&self, id: u64) -> Option<&Holding> {
        self.holdings.get(&id)
    }

    pub fn active(&self) -> Vec<&Holding> {
        self.holdings.values().filter(|h| h.is_open()).collect()
    }

    pub fn closed(&self) -> Vec<&Holding> {
        self.holdings.values().filter(|h| !h.is_open()).collect()
    }

    /// Symbols with at least one open holding.
    pub fn held_symbols(&self) -> BTreeSet<String> {
        self.active().iter().map(|h| h.symbol().to_string()).collect()
    }

    pub fn total_realized_pnl(&self) -> f64 {
        self.holdings.values().filter_map(|h| h.realized_pnl()).sum()
    }

    pub fn len(&self) -> usize {
        self.holdings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holdings.is_empty()
    }
}

impl Default for HoldingLedger {
    fn default() -> Self {
        Self::new()
    }
}
