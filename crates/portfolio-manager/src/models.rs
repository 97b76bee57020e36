use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HoldingStatus {
    Open,
    Closed,
}

/// Sell order closing a holding.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SellEvent {
    pub date: NaiveDate,
    pub price: f64,
    pub quantity: f64,
}

/// A position bought once and sold at most once.
///
/// Sell fields and realized P/L are set together on the OPEN to CLOSED
/// transition and never change afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Holding {
    id: u64,
    symbol: String,
    purchase_date: NaiveDate,
    purchase_price: f64,
    quantity: f64,
    status: HoldingStatus,
    sell_date: Option<NaiveDate>,
    sell_price: Option<f64>,
    realized_pnl: Option<f64>,
}

impl Holding {
    pub(crate) fn open(id: u64, symbol: String, purchase_date: NaiveDate, purchase_price: f64, quantity: f64) -> Self {
        Self {
            id,
            symbol,
            purchase_date,
            purchase_price,
            quantity,
            status: HoldingStatus::Open,
            sell_date: None,
            sell_price: None,
            realized_pnl: None,
        }
    }

    /// Validates `sell` and closes the holding. On error nothing changes.
    pub(crate) fn close(&mut self, sell: &SellEvent) -> Result<f64, LedgerError> {
        if self.status == HoldingStatus::Closed {
            return Err(LedgerError::InvalidTransition {
                id: self.id,
                from: self.status,
            });
        }
        if !is_positive(sell.price) || !is_positive(sell.quantity) {
            return Err(LedgerError::InvalidInput(format!(
                "sell price and quantity must be positive, got {} x {}",
                sell.price, sell.quantity
            )));
        }
        if sell.date < self.purchase_date {
            return Err(LedgerError::InvalidInput(format!(
                "sell date {} precedes purchase date {}",
                sell.date, self.purchase_date
            )));
        }
        if sell.quantity != self.quantity {
            return Err(LedgerError::QuantityMismatch {
                held: self.quantity,
                requested: sell.quantity,
            });
        }

        let pnl = (sell.price - self.purchase_price) * self.quantity;
        self.status = HoldingStatus::Closed;
        self.sell_date = Some(sell.date);
        self.sell_price = Some(sell.price);
        self.realized_pnl = Some(pnl);
        Ok(pnl)
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn purchase_date(&self) -> NaiveDate {
        self.purchase_date
    }

    pub fn purchase_price(&self) -> f64 {
        self.purchase_price
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn status(&self) -> HoldingStatus {
        self.status
    }

    pub fn sell_date(&self) -> Option<NaiveDate> {
        self.sell_date
    }

    pub fn sell_price(&self) -> Option<f64> {
        self.sell_price
    }

    pub fn realized_pnl(&self) -> Option<f64> {
        self.realized_pnl
    }

    pub fn cost_basis(&self) -> f64 {
        self.purchase_price * self.quantity
    }

    pub fn is_open(&self) -> bool {
        self.status == HoldingStatus::Open
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LedgerError {
    #[error("Invalid transition: holding {id} is already {from:?}")]
    InvalidTransition { id: u64, from: HoldingStatus },

    #[error("Unknown holding: {0}")]
    UnknownHolding(u64),

    #[error("Quantity mismatch: holding has {held}, sell requested {requested}")]
    QuantityMismatch { held: f64, requested: f64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

pub(crate) fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}
