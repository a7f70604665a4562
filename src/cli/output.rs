//! Output formatting for CLI commands

use anyhow::{Context, Result};
use clap::ValueEnum;
use serde::Serialize;

use crate::domain::CertificatePair;
use crate::lifecycle::SweepReport;

/// Output format options
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
    Yaml,
}

/// Print data as JSON
pub fn print_json<T: Serialize>(data: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(data).context("Failed to serialize to JSON")?;
    println!("{}", json);
    Ok(())
}

/// Print data as YAML
pub fn print_yaml<T: Serialize>(data: &T) -> Result<()> {
    let yaml = serde_yaml::to_string(data).context("Failed to serialize to YAML")?;
    println!("{}", yaml);
    Ok(())
}

/// Text rendering of a certificate pair
pub fn format_certificate_pair(domain: &str, pair: &CertificatePair) -> String {
    format!(
        "Domain: {}\n\nCLIENT CERTIFICATE\n{}\nISSUER CERTIFICATE\n{}",
        domain,
        pair.client_cert.trim_end(),
        pair.issuer_cert.trim_end()
    )
}

pub fn print_certificate_pair(domain: &str, pair: &CertificatePair, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{}", format_certificate_pair(domain, pair));
            Ok(())
        }
        OutputFormat::Json => print_json(pair),
        OutputFormat::Yaml => print_yaml(pair),
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FailureView<'a> {
    domain: &'a str,
    kind: &'static str,
    message: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReportView<'a> {
    sweep: &'a str,
    succeeded: &'a [String],
    skipped: &'a [String],
    failed: Vec<FailureView<'a>>,
}

fn report_view<'a>(sweep: &'a str, report: &'a SweepReport) -> ReportView<'a> {
    ReportView {
        sweep,
        succeeded: &report.succeeded,
        skipped: &report.skipped,
        failed: report
            .failed
            .iter()
            .map(|(domain, err)| FailureView { domain, kind: err.kind(), message: err.to_string() })
            .collect(),
    }
}

/// Text rendering of a sweep report
pub fn format_report(sweep: &str, report: &SweepReport) -> String {
    let mut out = format!(
        "{}: {} succeeded, {} failed, {} skipped",
        sweep,
        report.succeeded.len(),
        report.failed.len(),
        report.skipped.len()
    );
    for domain in &report.succeeded {
        out.push_str(&format!("\n  ok      {}", domain));
    }
    for (domain, err) in &report.failed {
        out.push_str(&format!("\n  failed  {}: {}", domain, err));
    }
    out
}

pub fn print_report(sweep: &str, report: &SweepReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Text => {
            println!("{}", format_report(sweep, report));
            Ok(())
        }
        OutputFormat::Json => print_json(&report_view(sweep, report)),
        OutputFormat::Yaml => print_yaml(&report_view(sweep, report)),
    }
}
