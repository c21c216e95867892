//! Output formatting module.
//!
//! Renders a [`ResultTable`] as plain text, JSON, or CSV. Rendering only
//! reads the table, so the same table always renders the same bytes.

use crate::scanner::{ResultGroup, ResultTable};
use console::style;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::io::{self, Write};

/// Output format for results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable plain text
    #[default]
    Plain,
    /// JSON structured output
    Json,
    /// CSV format for data analysis
    Csv,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain => write!(f, "plain"),
            Self::Json => write!(f, "json"),
            Self::Csv => write!(f, "csv"),
        }
    }
}

/// Write the table in the requested format.
pub fn write_report<W: Write>(table: &ResultTable, format: OutputFormat, out: &mut W) -> io::Result<()> {
    match format {
        OutputFormat::Plain => write_plain(table, out),
        OutputFormat::Json => write_json(table, out),
        OutputFormat::Csv => write_csv(table, out),
    }
}

/// One block per address, each bucket listed in ascending port order.
fn write_plain<W: Write>(table: &ResultTable, out: &mut W) -> io::Result<()> {
    if table.is_empty() {
        writeln!(out, "{}", style("No results.").dim())?;
        return Ok(());
    }

    for group in table.groups() {
        write_group(group, out)?;
    }

    let summary = table.summary();
    writeln!(
        out,
        "{} {} addresses, {} ports: {} opened, {} closed, {} unresponsive",
        style("Summary:").bold(),
        summary.addresses,
        summary.total(),
        style(summary.opened).green().bold(),
        style(summary.closed).red(),
        style(summary.unresponsive).yellow()
    )
}

fn write_group<W: Write>(group: &ResultGroup, out: &mut W) -> io::Result<()> {
    writeln!(out, "{}", style(group.address).cyan().bold())?;
    writeln!(out, "  opened port:       {}", style(port_list(&group.opened)).green())?;
    writeln!(out, "  closed port:       {}", style(port_list(&group.closed)).red())?;
    writeln!(
        out,
        "  unresponsive port: {}",
        style(port_list(&group.unresponsive)).yellow()
    )?;
    writeln!(out)
}

fn port_list(ports: &BTreeSet<u16>) -> String {
    let parts: Vec<String> = ports.iter().map(u16::to_string).collect();
    format!("[{}]", parts.join(", "))
}

fn write_json<W: Write>(table: &ResultTable, out: &mut W) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, table)?;
    writeln!(out)
}

fn write_csv<W: Write>(table: &ResultTable, out: &mut W) -> io::Result<()> {
    let mut wtr = csv::Writer::from_writer(out);
    wtr.write_record(["address", "port", "state"])?;

    for group in table.groups() {
        let address = group.address.to_string();
        for (port, state) in group.entries() {
            let (port, state) = (port.to_string(), state.to_string());
            wtr.write_record([address.as_str(), port.as_str(), state.as_str()])?;
        }
    }

    wtr.flush()
}

/// Print an error message.
pub fn print_error(msg: &str) {
    eprintln!("{} {}", style("Error:").red().bold(), msg);
}

/// Print a warning message.
pub fn print_warning(msg: &str) {
    eprintln!("{} {}", style("Warning:").yellow().bold(), msg);
}
