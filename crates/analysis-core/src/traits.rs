use async_trait::async_trait;
use chrono::NaiveDate;

use crate::{AnalysisError, FundamentalSnapshot, PriceSeries};

/// Upstream data provider consumed by the batch evaluator.
///
/// Implementations may return an empty series or an empty snapshot; the
/// engines classify missing history and missing metrics themselves.
#[async_trait]
pub trait MarketDataSource: Send + Sync {
    async fn get_price_series(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceSeries, AnalysisError>;

    async fn get_fundamental_snapshot(&self, symbol: &str) -> Result<FundamentalSnapshot, AnalysisError>;
}
