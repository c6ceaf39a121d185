//! Collapses order-level transactions into one row per calendar day.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use salesops_core::{AnomalyError, DailyOperations, ProfitSource, RawTransaction};
use tracing::{debug, info};

#[derive(Default)]
struct DayAccumulator {
    revenue: Decimal,
    profit: Decimal,
    marketing_cost: Decimal,
    /// Orders that reported a marketing cost; the CAC denominator.
    costed_orders: u32,
    orders: u32,
}

pub struct DailyAggregator;

impl DailyAggregator {
    /// Groups transactions by calendar day.
    ///
    /// Revenue is summed; profit per order and marketing cost are averaged.
    /// Orders without a marketing cost are left out of the CAC mean, and a
    /// day where no order reports one gets a NaN CAC. Days without orders are
    /// absent rather than zero-filled. Output is sorted ascending by date.
    ///
    /// # Errors
    ///
    /// Returns [`AnomalyError::EmptyInput`] when `transactions` is empty.
    pub fn aggregate(transactions: &[RawTransaction]) -> Result<Vec<DailyOperations>, AnomalyError> {
        if transactions.is_empty() {
            return Err(AnomalyError::EmptyInput);
        }

        let mut by_day: BTreeMap<NaiveDate, DayAccumulator> = BTreeMap::new();
        let mut derived_profit = 0usize;

        for tx in transactions {
            let (profit, source) = tx.profit();
            if source == ProfitSource::Derived {
                derived_profit += 1;
            }

            let acc = by_day.entry(tx.day()).or_default();
            acc.revenue += tx.revenue;
            acc.profit += profit;
            if let Some(cost) = tx.marketing_cost {
                acc.marketing_cost += cost;
                acc.costed_orders += 1;
            }
            acc.orders += 1;
        }

        if derived_profit > 0 {
            debug!(
                derived_profit,
                total = transactions.len(),
                "profit derived from gross margin for transactions without profit_per_order"
            );
        }

        let days: Vec<DailyOperations> = by_day
            .into_iter()
            .map(|(date, acc)| {
                let orders = Decimal::from(acc.orders);
                let cac = if acc.costed_orders == 0 {
                    f64::NAN
                } else {
                    to_f64(acc.marketing_cost / Decimal::from(acc.costed_orders))
                };
                DailyOperations {
                    date,
                    revenue: to_f64(acc.revenue),
                    profit: to_f64(acc.profit / orders),
                    cac,
                }
            })
            .collect();

        info!(
            transactions = transactions.len(),
            days = days.len(),
            "aggregated transactions into daily operations"
        );

        Ok(days)
    }
}

fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDateTime;
    use rust_decimal_macros::dec;

    fn at(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2025, 1, day)
            .unwrap()
            .and_hms_opt(hour, 15, 0)
            .unwrap()
    }

    #[test]
    fn empty_input_is_rejected() {
        assert_eq!(
            DailyAggregator::aggregate(&[]),
            Err(AnomalyError::EmptyInput)
        );
    }

    #[test]
    fn sums_revenue_and_averages_profit_and_cac() {
        let txs = vec![
            RawTransaction::new(at(5, 9), dec!(100), dec!(10), dec!(20)),
            RawTransaction::new(at(5, 17), dec!(300), dec!(30), dec!(0)),
            RawTransaction::new(at(6, 12), dec!(50), dec!(-5), dec!(60)),
        ];

        let days = DailyAggregator::aggregate(&txs).unwrap();

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2025, 1, 5).unwrap());
        assert!((days[0].revenue - 400.0).abs() < 1e-9);
        assert!((days[0].profit - 20.0).abs() < 1e-9);
        assert!((days[0].cac - 10.0).abs() < 1e-9);
        assert!((days[1].profit + 5.0).abs() < 1e-9);
        assert!((days[1].cac - 60.0).abs() < 1e-9);
    }

    #[test]
    fn output_is_sorted_and_gaps_are_not_filled() {
        let txs = vec![
            RawTransaction::new(at(20, 9), dec!(1), dec!(1), dec!(1)),
            RawTransaction::new(at(3, 9), dec!(2), dec!(1), dec!(1)),
            RawTransaction::new(at(11, 9), dec!(3), dec!(1), dec!(1)),
        ];

        let days = DailyAggregator::aggregate(&txs).unwrap();
        let dates: Vec<u32> = days.iter().map(|d| chrono::Datelike::day(&d.date)).collect();
        assert_eq!(dates, vec![3, 11, 20]);
    }

    #[test]
    fn one_order_per_day_is_idempotent() {
        let txs: Vec<RawTransaction> = (1..=12)
            .map(|d| {
                RawTransaction::new(
                    at(d, 8),
                    Decimal::from(100 + d),
                    Decimal::from(d) - dec!(4),
                    Decimal::from(d * 3),
                )
            })
            .collect();

        let days = DailyAggregator::aggregate(&txs).unwrap();

        assert_eq!(days.len(), txs.len());
        for (day, tx) in days.iter().zip(&txs) {
            assert_eq!(day.date, tx.day());
            assert!((day.revenue - to_f64(tx.revenue)).abs() < 1e-9);
            assert!((day.profit - to_f64(tx.profit().0)).abs() < 1e-9);
            assert!((day.cac - to_f64(tx.marketing_cost.unwrap_or_default())).abs() < 1e-9);
        }
    }

    #[test]
    fn derived_profit_feeds_the_mean() {
        let tx = RawTransaction {
            date: at(2, 10),
            revenue: dec!(200),
            profit_per_order: None,
            gross_margin: Some(dec!(60)),
            marketing_cost: Some(dec!(15)),
            opex_allocated: Some(dec!(5)),
        };
        let days = DailyAggregator::aggregate(&[tx]).unwrap();
        assert!((days[0].profit - 40.0).abs() < 1e-9);
        assert!((days[0].cac - 15.0).abs() < 1e-9);
    }

    #[test]
    fn missing_marketing_cost_is_left_out_of_cac() {
        let mut uncosted = RawTransaction::new(at(7, 18), dec!(80), dec!(8), dec!(0));
        uncosted.marketing_cost = None;
        let txs = vec![
            RawTransaction::new(at(7, 9), dec!(100), dec!(10), dec!(30)),
            RawTransaction::new(at(7, 12), dec!(120), dec!(12), dec!(50)),
            uncosted,
        ];

        let days = DailyAggregator::aggregate(&txs).unwrap();

        // (30 + 50) / 2, not / 3
        assert!((days[0].cac - 40.0).abs() < 1e-9, "cac was {}", days[0].cac);
        assert!((days[0].profit - 10.0).abs() < 1e-9);
    }

    #[test]
    fn day_without_any_marketing_cost_has_nan_cac() {
        let tx = RawTransaction {
            date: at(9, 10),
            revenue: dec!(200),
            profit_per_order: None,
            gross_margin: Some(dec!(60)),
            marketing_cost: None,
            opex_allocated: Some(dec!(5)),
        };
        let days = DailyAggregator::aggregate(&[tx]).unwrap();
        assert!(days[0].cac.is_nan());
        // the missing cost still counts as zero inside the profit derivation
        assert!((days[0].profit - 55.0).abs() < 1e-9);
    }
}
