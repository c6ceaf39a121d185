use salesops_data::{CsvStorage, DailyAggregator};
use std::io::Write;

#[test]
fn csv_to_daily_operations() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "date,revenue,gross_margin,marketing_cost,opex_allocated").unwrap();
    writeln!(file, "2025-02-01 09:10,200,60,20,10").unwrap();
    writeln!(file, "2025-02-01 13:45,100,30,0,10").unwrap();
    writeln!(file, "2025-02-03 11:00,400,100,40,20").unwrap();
    file.flush().unwrap();

    let txs = CsvStorage::read_transactions(file.path()).expect("read");
    let days = DailyAggregator::aggregate(&txs).expect("aggregate");

    assert_eq!(days.len(), 2);

    let first = &days[0];
    assert!((first.revenue - 300.0).abs() < 1e-9);
    // profits 30 and 20, mean 25
    assert!((first.profit - 25.0).abs() < 1e-9);
    assert!((first.cac - 10.0).abs() < 1e-9);

    let second = &days[1];
    assert_eq!(second.date.to_string(), "2025-02-03");
    assert!((second.profit - 40.0).abs() < 1e-9);
}

#[test]
fn header_only_file_cannot_be_aggregated() {
    let mut file = tempfile::NamedTempFile::new().expect("temp file");
    writeln!(file, "date,revenue,marketing_cost").unwrap();
    file.flush().unwrap();

    let txs = CsvStorage::read_transactions(file.path()).expect("read");
    assert!(txs.is_empty());
    assert!(DailyAggregator::aggregate(&txs).is_err());
}
