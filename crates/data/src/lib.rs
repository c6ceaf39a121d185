//! Data ingestion for the sales operations anomaly engine.
//!
//! This crate provides:
//! - CSV loading of order-level transactions and CSV table export
//! - The daily aggregator that turns orders into `DailyOperations`

pub mod aggregate;
pub mod csv_storage;

pub use aggregate::DailyAggregator;
pub use csv_storage::{parse_timestamp, CsvStorage};
