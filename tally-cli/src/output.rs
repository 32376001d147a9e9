use anyhow::{Context, Result};
use clap::ValueEnum;
use rust_decimal::Decimal;
use std::io::Write;

use tally_core::{Column, Transaction};
use tally_ingest::BatchReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Format {
    /// Aligned text with a per-file summary.
    Table,
    Csv,
    Json,
}

pub fn write_report<W: Write>(report: &BatchReport, format: Format, out: W) -> Result<()> {
    match format {
        Format::Table => write_table(report, out),
        Format::Csv => write_csv(report.transactions(), out),
        Format::Json => write_json(report.transactions(), out),
    }
}

fn cells(txn: &Transaction) -> Vec<String> {
    Column::ALL.iter().map(|c| txn.get(*c).to_string()).collect()
}

/// Header plus one record per row, every canonical column in order.
pub fn write_csv<'a, W: Write>(rows: impl Iterator<Item = &'a Transaction>, out: W) -> Result<()> {
    let mut w = csv::Writer::from_writer(out);
    w.write_record(Column::names()).context("write csv header")?;
    for txn in rows {
        w.write_record(cells(txn)).context("write csv row")?;
    }
    w.flush().context("flush csv")?;
    Ok(())
}

pub fn write_json<'a, W: Write>(rows: impl Iterator<Item = &'a Transaction>, out: W) -> Result<()> {
    let rows: Vec<&Transaction> = rows.collect();
    serde_json::to_writer_pretty(out, &rows).context("write json")?;
    Ok(())
}

fn write_table<W: Write>(report: &BatchReport, mut out: W) -> Result<()> {
    let header: Vec<String> = Column::names().map(String::from).collect();
    let body: Vec<Vec<String>> = report.transactions().map(cells).collect();

    let mut widths: Vec<usize> = header.iter().map(String::len).collect();
    for row in &body {
        for (w, cell) in widths.iter_mut().zip(row) {
            *w = (*w).max(cell.chars().count());
        }
    }

    for row in std::iter::once(&header).chain(&body) {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, &w)| format!("{cell:<w$}"))
            .collect();
        writeln!(out, "{}", line.join("  ").trim_end())?;
    }

    writeln!(out)?;
    for (path, table) in &report.tables {
        writeln!(
            out,
            "{}: {} rows, total {}",
            path.display(),
            table.len(),
            table.total()
        )?;
    }
    for path in &report.skipped {
        writeln!(out, "{}: skipped (no handler)", path.display())?;
    }
    for (path, err) in &report.failed {
        writeln!(out, "{}: failed: {err}", path.display())?;
    }
    let grand: Decimal = report.tables.values().map(|t| t.total()).sum();
    writeln!(
        out,
        "{} files, {} rows, total {grand}",
        report.files_seen(),
        report.total_rows()
    )?;
    Ok(())
}
