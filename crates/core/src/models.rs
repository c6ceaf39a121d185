//! Domain records shared by ingestion, detectors, and the engine.

use chrono::{NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One order as supplied by the ingestion layer. Never mutated by the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawTransaction {
    pub date: NaiveDateTime,
    pub revenue: Decimal,
    /// Reported profit for the order, when the source carries it.
    pub profit_per_order: Option<Decimal>,
    pub gross_margin: Option<Decimal>,
    pub marketing_cost: Option<Decimal>,
    pub opex_allocated: Option<Decimal>,
}

/// Where a transaction's profit figure came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProfitSource {
    /// `profit_per_order` was present.
    Reported,
    /// `gross_margin - marketing_cost - opex_allocated`, missing terms as zero.
    Derived,
}

impl RawTransaction {
    /// Creates a transaction with reported profit and marketing cost.
    #[must_use]
    pub fn new(
        date: NaiveDateTime,
        revenue: Decimal,
        profit_per_order: Decimal,
        marketing_cost: Decimal,
    ) -> Self {
        Self {
            date,
            revenue,
            profit_per_order: Some(profit_per_order),
            gross_margin: None,
            marketing_cost: Some(marketing_cost),
            opex_allocated: None,
        }
    }

    /// Calendar day of the order.
    #[must_use]
    pub fn day(&self) -> NaiveDate {
        self.date.date()
    }

    /// Profit for the order and the branch that produced it.
    #[must_use]
    pub fn profit(&self) -> (Decimal, ProfitSource) {
        match self.profit_per_order {
            Some(reported) => (reported, ProfitSource::Reported),
            None => {
                let derived = self.gross_margin.unwrap_or_default()
                    - self.marketing_cost.unwrap_or_default()
                    - self.opex_allocated.unwrap_or_default();
                (derived, ProfitSource::Derived)
            }
        }
    }
}

/// One row per calendar day present in the input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyOperations {
    pub date: NaiveDate,
    /// Sum of revenue over the day's orders.
    pub revenue: f64,
    /// Mean profit per order.
    pub profit: f64,
    /// Mean marketing cost over the orders that report one; NaN when none do.
    pub cac: f64,
}

/// The three daily metrics the detectors look at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Metric {
    Revenue,
    Profit,
    Cac,
}

impl Metric {
    pub const ALL: [Self; 3] = [Self::Revenue, Self::Profit, Self::Cac];

    #[must_use]
    pub fn value(self, day: &DailyOperations) -> f64 {
        match self {
            Self::Revenue => day.revenue,
            Self::Profit => day.profit,
            Self::Cac => day.cac,
        }
    }

    /// Column of this metric across all days.
    #[must_use]
    pub fn series(self, days: &[DailyOperations]) -> Vec<f64> {
        days.iter().map(|d| self.value(d)).collect()
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Revenue => "revenue",
            Self::Profit => "profit",
            Self::Cac => "cac",
        }
    }
}

/// Model estimate for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub date: NaiveDate,
    pub predicted: f64,
    pub lower: f64,
    pub upper: f64,
}

impl ForecastPoint {
    /// True when `actual` falls strictly outside `[lower, upper]`.
    #[must_use]
    pub fn is_breach(&self, actual: f64) -> bool {
        actual < self.lower || actual > self.upper
    }
}
