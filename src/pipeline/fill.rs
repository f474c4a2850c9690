//! Workbook fill: project a normalized table onto the template grid.
//!
//! The projection is purely positional. Column labels go to the
//! configured header row, data records to consecutive rows below, both
//! starting at column A. The template's own header text is overwritten
//! with the extracted labels on purpose: the model's column names are the
//! ground truth for what was actually transcribed.
//!
//! Writes that land on a non-anchor member of a merged region are skipped
//! by [`SheetGrid::set`]; each skip is logged at WARN with its coordinates
//! and counted in the report, never silently dropped.

use crate::error::Scan2SheetError;
use crate::pipeline::normalize::NormalizedTable;
use crate::workbook::{CellValue, SheetGrid, WriteOutcome};
use chrono::Local;
use std::path::{Path, PathBuf};
use tracing::warn;
use uuid::Uuid;

/// What the populate pass did.
#[derive(Debug, Clone, Copy, Default)]
pub struct FillReport {
    /// Data rows written (header row not counted).
    pub rows_written: usize,
    /// Individual cell writes that landed, headers included.
    pub cells_written: usize,
    /// Writes refused by the merged-cell rule.
    pub skipped_merged_cells: usize,
}

/// Write the table into the grid.
///
/// `header_row` and `first_data_row` are 1-based, matching how operators
/// read their templates; the grid itself is 0-based.
pub fn populate(
    grid: &mut SheetGrid,
    table: &NormalizedTable,
    header_row: u32,
    first_data_row: u32,
) -> Result<FillReport, Scan2SheetError> {
    let mut report = FillReport::default();

    // Rows are 1-based in config; a raw 0 is treated as row 1.
    let header_row0 = header_row.saturating_sub(1);
    let data_row0 = first_data_row.saturating_sub(1);

    for (j, label) in table.columns.iter().enumerate() {
        let col = col_index(j)?;
        record_write(
            grid.set(header_row0, col, CellValue::Text(label.clone())),
            header_row0,
            col,
            &mut report,
        );
    }

    for (i, row) in table.rows.iter().enumerate() {
        let target_row = data_row0 + i as u32;
        for (j, cell) in row.iter().enumerate() {
            let col = col_index(j)?;
            record_write(
                grid.set(target_row, col, CellValue::Text(cell.clone())),
                target_row,
                col,
                &mut report,
            );
        }
    }

    report.rows_written = table.rows.len();
    Ok(report)
}

fn record_write(outcome: WriteOutcome, row: u32, col: u16, report: &mut FillReport) {
    match outcome {
        WriteOutcome::Written => report.cells_written += 1,
        WriteOutcome::SkippedMerged => {
            warn!(
                "Skipped write at row {}, col {}: non-anchor cell of a merged region",
                row + 1,
                col + 1
            );
            report.skipped_merged_cells += 1;
        }
    }
}

fn col_index(j: usize) -> Result<u16, Scan2SheetError> {
    u16::try_from(j).map_err(|_| {
        Scan2SheetError::Internal(format!("column index {j} exceeds worksheet limits"))
    })
}

/// A fresh output path for one request:
/// `<output_dir>/filled_<template stem>_<timestamp>_<suffix>.xlsx`.
///
/// The per-request random suffix closes the race where two requests for
/// the same template land within the same clock second.
pub fn unique_output_path(output_dir: &Path, template_id: &str) -> PathBuf {
    let stem = Path::new(template_id)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("output");
    let stamp = Local::now().format("%Y%m%d_%H%M%S");
    let suffix = &Uuid::new_v4().simple().to_string()[..8];
    output_dir.join(format!("filled_{stem}_{stamp}_{suffix}.xlsx"))
}
