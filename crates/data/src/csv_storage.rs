use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::Writer;
use rust_decimal::Decimal;
use salesops_core::RawTransaction;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use std::str::FromStr;

/// Timestamp layouts accepted in the `date` column, tried in order.
const DATETIME_FORMATS: [&str; 3] = ["%Y-%m-%d %H:%M", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// Raw CSV row. Unknown columns (city, items_count, ...) are ignored.
#[derive(Debug, Deserialize)]
struct TransactionRow {
    date: String,
    revenue: String,
    #[serde(default)]
    profit_per_order: Option<String>,
    #[serde(default)]
    gross_margin: Option<String>,
    #[serde(default)]
    marketing_cost: Option<String>,
    #[serde(default)]
    opex_allocated: Option<String>,
}

impl TransactionRow {
    fn into_transaction(self) -> Result<RawTransaction> {
        Ok(RawTransaction {
            date: parse_timestamp(&self.date)?,
            revenue: parse_amount("revenue", &self.revenue)?,
            profit_per_order: parse_optional_amount("profit_per_order", self.profit_per_order)?,
            gross_margin: parse_optional_amount("gross_margin", self.gross_margin)?,
            marketing_cost: parse_optional_amount("marketing_cost", self.marketing_cost)?,
            opex_allocated: parse_optional_amount("opex_allocated", self.opex_allocated)?,
        })
    }
}

pub struct CsvStorage;

impl CsvStorage {
    /// Reads transactions from a CSV file with a header row.
    ///
    /// Required columns: `date`, `revenue`. Optional: `profit_per_order`,
    /// `gross_margin`, `marketing_cost`, `opex_allocated`.
    ///
    /// # Errors
    /// Returns error if the file cannot be opened, a row is malformed, or a
    /// date or amount fails to parse. The failing line is named in the error.
    pub fn read_transactions(path: impl AsRef<Path>) -> Result<Vec<RawTransaction>> {
        let path = path.as_ref();
        let mut reader = csv::Reader::from_path(path)
            .with_context(|| format!("Failed to open CSV file: {}", path.display()))?;

        let mut transactions = Vec::new();
        for (index, result) in reader.deserialize::<TransactionRow>().enumerate() {
            // header is line 1
            let line = index + 2;
            let row = result.with_context(|| format!("Malformed row at line {line}"))?;
            let tx = row
                .into_transaction()
                .with_context(|| format!("Invalid transaction at line {line}"))?;
            transactions.push(tx);
        }

        tracing::info!(
            path = %path.display(),
            rows = transactions.len(),
            "loaded transactions"
        );
        Ok(transactions)
    }

    /// Writes a header and rows of pre-rendered cells.
    ///
    /// # Errors
    /// Returns error if file cannot be created or writing fails
    pub fn write_table(path: impl AsRef<Path>, header: &[&str], rows: &[Vec<String>]) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create CSV file: {}", path.display()))?;
        let mut writer = Writer::from_writer(file);

        writer.write_record(header)?;
        for row in rows {
            writer.write_record(row)?;
        }

        writer.flush()?;
        Ok(())
    }
}

/// Parses the `date` column in any of the accepted layouts.
///
/// # Errors
/// Returns error when no layout matches.
pub fn parse_timestamp(raw: &str) -> Result<NaiveDateTime> {
    let raw = raw.trim();

    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(raw, format) {
            return Ok(ts);
        }
    }
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.naive_utc());
    }
    if let Ok(day) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(day.and_time(chrono::NaiveTime::MIN));
    }

    Err(anyhow!("Unrecognised timestamp: {raw:?}"))
}

fn parse_amount(column: &str, raw: &str) -> Result<Decimal> {
    Decimal::from_str(raw.trim())
        .or_else(|_| Decimal::from_scientific(raw.trim()))
        .with_context(|| format!("Invalid {column} value: {raw:?}"))
}

fn parse_optional_amount(column: &str, raw: Option<String>) -> Result<Option<Decimal>> {
    match raw.as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(value) => parse_amount(column, value).map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;
    use rust_decimal_macros::dec;
    use std::io::Write;

    fn write_csv(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    // ============================================
    // parse_timestamp
    // ============================================

    #[test]
    fn parses_generator_layout() {
        let ts = parse_timestamp("2025-04-02 21:07").unwrap();
        assert_eq!(ts.date(), NaiveDate::from_ymd_opt(2025, 4, 2).unwrap());
        assert_eq!(ts.hour(), 21);
        assert_eq!(ts.minute(), 7);
    }

    #[test]
    fn parses_rfc3339_and_bare_dates() {
        let ts = parse_timestamp("2025-04-02T21:07:00Z").unwrap();
        assert_eq!(ts.hour(), 21);

        let ts = parse_timestamp("2025-04-02").unwrap();
        assert_eq!(ts.hour(), 0);
    }

    #[test]
    fn rejects_garbage_timestamp() {
        assert!(parse_timestamp("yesterday").is_err());
    }

    // ============================================
    // read_transactions
    // ============================================

    #[test]
    fn reads_generator_columns_and_ignores_extras() {
        let file = write_csv(
            "transaction_id,customer_id,date,revenue,cogs,gross_margin,marketing_source,marketing_cost,opex_allocated,items_count,city\n\
             t1,c1,2025-01-03 10:15,250.50,180.00,70.50,paid,120.25,20.00,3,Pune\n\
             t2,c2,2025-01-03 18:40,99.99,70.00,29.99,organic,0.0,15.50,1,Delhi\n",
        );

        let txs = CsvStorage::read_transactions(file.path()).unwrap();

        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].revenue, dec!(250.50));
        assert_eq!(txs[0].profit_per_order, None);
        assert_eq!(txs[0].gross_margin, Some(dec!(70.50)));
        assert_eq!(txs[1].marketing_cost, Some(dec!(0)));
        // 29.99 - 0 - 15.50
        assert_eq!(txs[1].profit().0, dec!(14.49));
    }

    #[test]
    fn reads_reported_profit_column() {
        let file = write_csv(
            "date,revenue,profit_per_order,marketing_cost\n\
             2025-01-03 10:15,100,12.5,30\n\
             2025-01-04 09:00,80,,10\n",
        );

        let txs = CsvStorage::read_transactions(file.path()).unwrap();

        assert_eq!(txs[0].profit_per_order, Some(dec!(12.5)));
        assert_eq!(txs[1].profit_per_order, None);
    }

    #[test]
    fn bad_amount_names_the_line() {
        let file = write_csv(
            "date,revenue,marketing_cost\n\
             2025-01-03 10:15,100,5\n\
             2025-01-04 10:15,lots,5\n",
        );

        let err = CsvStorage::read_transactions(file.path()).unwrap_err();
        assert!(format!("{err:#}").contains("line 3"), "error was {err:#}");
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(CsvStorage::read_transactions("/nonexistent/transactions.csv").is_err());
    }

    // ============================================
    // write_table
    // ============================================

    #[test]
    fn writes_header_and_rows() {
        let file = tempfile::NamedTempFile::new().unwrap();
        CsvStorage::write_table(
            file.path(),
            &["date", "revenue"],
            &[vec!["2025-01-03".into(), "350.49".into()]],
        )
        .unwrap();

        let written = std::fs::read_to_string(file.path()).unwrap();
        assert_eq!(written, "date,revenue\n2025-01-03,350.49\n");
    }
}
