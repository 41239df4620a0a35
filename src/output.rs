//! Console output of a monitoring run

use crate::checks::{MalwareStatus, Severity, UptimeStatus};
use crate::error::{Error, Result};
use crate::report::CheckResult;
use comfy_table::{
    Attribute, Cell, CellAlignment, Color, ContentArrangement, Table, presets::UTF8_FULL,
};
use std::io::Write;
use std::str::FromStr;

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable table output
    #[default]
    Human,
    /// JSON output
    Json,
    /// No output (silent mode)
    None,
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(Self::Human),
            "json" => Ok(Self::Json),
            "none" => Ok(Self::None),
            _ => Err(Error::InvalidOutputFormat(s.to_string())),
        }
    }
}

/// Write the results of a run to the console
pub fn output_results<W: Write>(
    results: &[CheckResult],
    format: OutputFormat,
    writer: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Human => output_human(results, writer),
        OutputFormat::Json => output_json(results, writer),
        OutputFormat::None => Ok(()),
    }
}

/// Output JSON format
fn output_json<W: Write>(results: &[CheckResult], writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, results)?;
    writeln!(writer).map_err(Error::OutputFailed)?;
    Ok(())
}

/// Output human-readable table format
fn output_human<W: Write>(results: &[CheckResult], writer: &mut W) -> Result<()> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(
            [
                "Site",
                "PHP",
                "WordPress",
                "SSL",
                "Expires",
                "Performance",
                "Malware",
                "Uptime",
                "Outdated",
            ]
            .into_iter()
            .map(|h| Cell::new(h).add_attribute(Attribute::Bold)),
        );

    for result in results {
        add_result_row(&mut table, result);
    }

    writeln!(writer, "{}", table).map_err(Error::OutputFailed)
}

fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Green => Color::Green,
        Severity::Orange => Color::Yellow,
        Severity::Red => Color::Red,
    }
}

/// Add a row for a site to the table
fn add_result_row(table: &mut Table, result: &CheckResult) {
    let expiry_color = severity_color(result.ssl_expiry_severity);

    let malware_cell = match result.malware_status {
        MalwareStatus::Clean => Cell::new("Clean").fg(Color::Green),
        MalwareStatus::MalwareFound => Cell::new("Found").fg(Color::Red),
        MalwareStatus::ScanFailed => Cell::new("Failed").fg(Color::DarkGrey),
    };

    let uptime_cell = match result.uptime_status {
        UptimeStatus::Online => Cell::new("Online").fg(Color::Green),
        UptimeStatus::Error => Cell::new("Error").fg(Color::Red),
    };

    let outdated = result.outdated_count();
    let outdated_cell = Cell::new(outdated)
        .fg(if outdated > 0 { Color::Yellow } else { Color::Green })
        .set_alignment(CellAlignment::Center);

    table.add_row(vec![
        Cell::new(&result.url),
        Cell::new(&result.php_version),
        Cell::new(&result.wp_version),
        Cell::new(result.ssl_status()).fg(expiry_color),
        Cell::new(&result.ssl_expiry_date).fg(expiry_color),
        Cell::new(result.performance_score).set_alignment(CellAlignment::Center),
        malware_cell.set_alignment(CellAlignment::Center),
        uptime_cell.set_alignment(CellAlignment::Center),
        outdated_cell,
    ]);
}
