//! Trade cost model for paired CEX/DEX fills.

use serde::{Deserialize, Serialize};

use crate::config::FeeSchedule;

/// Itemized costs for one simulated paired fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostBreakdown {
    pub cex_fee: f64,
    pub dex_fee: f64,
    pub gas_fee: f64,
    pub slippage_cost: f64,
    pub total: f64,
}

/// Applies a `FeeSchedule` to candidate trades.
pub struct CostModel {
    fees: FeeSchedule,
}

impl CostModel {
    pub fn new(fees: FeeSchedule) -> Self {
        Self { fees }
    }

    pub fn fees(&self) -> &FeeSchedule {
        &self.fees
    }

    /// Itemize costs for a fill of `size` base units.
    ///
    /// Venue fees scale with that venue's own notional. Gas is flat per
    /// trade regardless of size. Slippage is charged on the higher of
    /// the two venue prices.
    pub fn breakdown(&self, size: f64, cex_price: f64, dex_price: f64) -> CostBreakdown {
        let cex_fee = size * cex_price * self.fees.cex;
        let dex_fee = size * dex_price * self.fees.dex;
        let gas_fee = self.fees.gas;
        let slippage_cost = size * cex_price.max(dex_price) * self.fees.slippage;
        CostBreakdown {
            cex_fee,
            dex_fee,
            gas_fee,
            slippage_cost,
            total: cex_fee + dex_fee + gas_fee + slippage_cost,
        }
    }

    /// Profit triple for a candidate with the given spread.
    ///
    /// # Returns
    /// (gross_profit, total_cost, net_profit)
    pub fn net_profit(
        &self,
        spread: f64,
        size: f64,
        cex_price: f64,
        dex_price: f64,
    ) -> (f64, f64, f64) {
        let gross = spread.abs() * size;
        let total = self.breakdown(size, cex_price, dex_price).total;
        (gross, total, gross - total)
    }
}
