//! Output strategies for reports, statuses and forecasts.
//!
//! The renderer is picked per invocation from `--format` and passed down
//! explicitly.

#![allow(clippy::format_push_string)]

use std::collections::BTreeSet;

use anyhow::Result;
use clap::ValueEnum;
use salesops_core::AnomalyError;
use salesops_detectors::{Detector, DetectorFamily};
use salesops_engine::{AnomalyReport, RevenueForecast};
use serde_json::json;

const RULE: &str = "═══════════════════════════════════════════════════════════════\n";
const THIN_RULE: &str = "───────────────────────────────────────────────────────────────\n";

/// Model-based detectors whose status is worth reporting.
const MODEL_DETECTORS: [Detector; 2] = [Detector::IsolationForest, Detector::ForecastInterval];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

pub trait ReportRenderer {
    fn render_report(&self, report: &AnomalyReport) -> Result<String>;

    /// Renders a soft pipeline outcome such as insufficient history.
    fn render_status(&self, error: &AnomalyError) -> Result<String>;

    fn render_forecast(&self, forecast: &RevenueForecast) -> Result<String>;
}

#[must_use]
pub fn renderer_for(format: OutputFormat) -> Box<dyn ReportRenderer> {
    match format {
        OutputFormat::Text => Box::new(TextRenderer),
        OutputFormat::Json => Box::new(JsonRenderer),
    }
}

/// Human-oriented tables.
pub struct TextRenderer;

impl TextRenderer {
    fn banner(output: &mut String, title: &str) {
        output.push('\n');
        output.push_str(RULE);
        output.push_str(&format!("{title:^63}\n"));
        output.push_str(RULE);
        output.push('\n');
    }

    fn section(output: &mut String, title: &str) {
        output.push_str(title);
        output.push('\n');
        output.push_str(THIN_RULE);
    }
}

impl ReportRenderer for TextRenderer {
    fn render_report(&self, report: &AnomalyReport) -> Result<String> {
        let mut output = String::new();
        Self::banner(&mut output, "ANOMALY REPORT");

        Self::section(&mut output, "Window");
        if let (Some(first), Some(last)) = (report.rows().first(), report.rows().last()) {
            output.push_str(&format!("From:                  {}\n", first.day.date));
            output.push_str(&format!("To:                    {}\n", last.day.date));
        }
        output.push_str(&format!("Days:                  {}\n", report.len()));
        output.push('\n');

        Self::section(&mut output, "Detector Summary");
        for (detector, count) in report.summary().iter() {
            output.push_str(&format!("{:<28}{count:>6}\n", detector.label()));
        }
        output.push('\n');

        let degraded: Vec<(Detector, &str)> = report.degraded().collect();
        if !degraded.is_empty() {
            Self::section(&mut output, "Degraded Detectors");
            for (detector, reason) in degraded {
                output.push_str(&format!("{:<28}{reason}\n", detector.label()));
            }
            output.push('\n');
        }

        let flagged = report.flagged();
        Self::section(&mut output, "Flagged Days");
        if flagged.is_empty() {
            output.push_str("No anomalies flagged in the current window.\n");
            return Ok(output);
        }
        output.push_str(&format!(
            "{:<12}{:>12}{:>10}{:>10}  {}\n",
            "Date", "Revenue", "Profit", "CAC", "Detectors"
        ));
        for day in &flagged {
            let labels: Vec<&str> = day.detectors.iter().map(Detector::label).collect();
            output.push_str(&format!(
                "{:<12}{:>12.2}{:>10.2}{:>10.2}  {}\n",
                day.date.to_string(),
                day.revenue,
                day.profit,
                day.cac,
                labels.join(", ")
            ));
        }
        output.push('\n');

        Self::section(&mut output, "Suggested Next Steps");
        for family in fired_families(report) {
            output.push_str(&format!("- {}\n", family.suggestion()));
        }

        Ok(output)
    }

    fn render_status(&self, error: &AnomalyError) -> Result<String> {
        Ok(format!("{}\n", error.status_message()))
    }

    fn render_forecast(&self, forecast: &RevenueForecast) -> Result<String> {
        let mut output = String::new();
        Self::banner(&mut output, "REVENUE FORECAST");

        Self::section(&mut output, "History");
        output.push_str(&format!("Days:                  {}\n", forecast.actuals.len()));
        let breaches = forecast
            .actuals
            .iter()
            .zip(&forecast.history)
            .filter(|(day, point)| point.is_breach(day.revenue))
            .count();
        output.push_str(&format!("Outside interval:      {breaches}\n"));
        output.push('\n');

        Self::section(&mut output, "Projection");
        output.push_str(&format!(
            "{:<12}{:>12}{:>12}{:>12}\n",
            "Date", "Predicted", "Lower", "Upper"
        ));
        for point in &forecast.future {
            output.push_str(&format!(
                "{:<12}{:>12.2}{:>12.2}{:>12.2}\n",
                point.date.to_string(),
                point.predicted,
                point.lower,
                point.upper
            ));
        }

        Ok(output)
    }
}

/// Machine-readable output.
pub struct JsonRenderer;

impl ReportRenderer for JsonRenderer {
    fn render_report(&self, report: &AnomalyReport) -> Result<String> {
        let statuses: serde_json::Map<String, serde_json::Value> = MODEL_DETECTORS
            .iter()
            .map(|d| -> Result<(String, serde_json::Value)> {
                Ok((d.column().to_string(), serde_json::to_value(report.status(*d))?))
            })
            .collect::<Result<_>>()?;

        let value = json!({
            "status": "ok",
            "days": report.len(),
            "summary": report.summary(),
            "detectors": statuses,
            "flagged": report.flagged(),
            "rows": report.rows(),
        });
        Ok(serde_json::to_string_pretty(&value)?)
    }

    fn render_status(&self, error: &AnomalyError) -> Result<String> {
        let value = match error {
            AnomalyError::InsufficientHistory { days, required } => json!({
                "status": "insufficient_history",
                "days": days,
                "required": required,
                "message": error.status_message(),
            }),
            other => json!({
                "status": "error",
                "message": other.to_string(),
            }),
        };
        Ok(serde_json::to_string_pretty(&value)?)
    }

    fn render_forecast(&self, forecast: &RevenueForecast) -> Result<String> {
        Ok(serde_json::to_string_pretty(forecast)?)
    }
}

/// Families of the detectors that fired anywhere in the window, deduplicated.
fn fired_families(report: &AnomalyReport) -> Vec<DetectorFamily> {
    let fired: BTreeSet<usize> = report
        .flagged()
        .iter()
        .flat_map(|day| day.detectors.iter().map(Detector::index))
        .collect();

    let mut families: Vec<DetectorFamily> = Vec::new();
    for index in fired {
        let family = Detector::ALL[index].family();
        if !families.contains(&family) {
            families.push(family);
        }
    }
    families
}
