//! In-memory model of a template worksheet.
//!
//! The template file on disk is **never opened for writing**. A request
//! loads the template's active sheet into a [`SheetGrid`] (cell values plus
//! merged regions, via `calamine`), mutates the grid in memory, and
//! persists it as a brand-new workbook (via `rust_xlsxwriter`). Two
//! simultaneous requests against the same template therefore never contend
//! for a file handle.
//!
//! ## Merged regions
//!
//! A merged region is writable only through its anchor (top-left) cell.
//! [`SheetGrid::set`] enforces this: a write aimed at a non-anchor member
//! returns [`WriteOutcome::SkippedMerged`] and leaves the grid untouched,
//! so a template's merged title banner survives a populate pass whose
//! rectangle overlaps it. Skips are reported to the caller, not swallowed.

use crate::error::Scan2SheetError;
use calamine::{open_workbook, Data, Reader, Xlsx};
use rust_xlsxwriter::{Format, Workbook};
use std::collections::BTreeMap;
use std::path::Path;

/// A cell value the grid can hold.
///
/// Template cells keep their native type when copied; values produced by
/// the normalizer are always `Text` (the pipeline never type-coerces
/// extracted data).
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Bool(bool),
}

/// A rectangular merged region, 0-based, inclusive on both ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeRegion {
    pub first_row: u32,
    pub first_col: u16,
    pub last_row: u32,
    pub last_col: u16,
}

impl MergeRegion {
    /// Whether the cell at (row, col) lies inside this region.
    pub fn contains(&self, row: u32, col: u16) -> bool {
        row >= self.first_row && row <= self.last_row && col >= self.first_col && col <= self.last_col
    }

    /// The anchor (top-left) cell — the only writable member.
    pub fn anchor(&self) -> (u32, u16) {
        (self.first_row, self.first_col)
    }
}

/// Result of a single cell write attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// The value was stored.
    Written,
    /// The target is a non-anchor member of a merged region; nothing was
    /// stored.
    SkippedMerged,
}

/// The mutable working copy of a template's active sheet.
#[derive(Debug, Clone)]
pub struct SheetGrid {
    sheet_name: String,
    /// Sparse cell store; `BTreeMap` keeps serialisation order stable.
    cells: BTreeMap<(u32, u16), CellValue>,
    merges: Vec<MergeRegion>,
}

impl SheetGrid {
    /// Load the first worksheet of a template workbook.
    ///
    /// Read-only access: the file handle is dropped before this returns.
    pub fn load(path: &Path) -> Result<Self, Scan2SheetError> {
        let unreadable = |detail: String| Scan2SheetError::TemplateUnreadable {
            path: path.to_path_buf(),
            detail,
        };

        let mut workbook: Xlsx<std::io::BufReader<std::fs::File>> =
            open_workbook(path).map_err(|e: calamine::XlsxError| unreadable(e.to_string()))?;
        workbook
            .load_merged_regions()
            .map_err(|e| unreadable(format!("failed to load merged regions: {e}")))?;

        let sheet_names = workbook.sheet_names();
        let name = sheet_names
            .first()
            .cloned()
            .ok_or_else(|| unreadable("workbook has no sheets".into()))?;

        let range = workbook
            .worksheet_range(&name)
            .map_err(|e| unreadable(format!("failed to read sheet '{name}': {e}")))?;

        let merged_dimensions = workbook
            .worksheet_merge_cells(&name)
            .unwrap_or(Ok(Vec::new()))
            .unwrap_or_default();

        let mut merges = Vec::with_capacity(merged_dimensions.len());
        for dim in &merged_dimensions {
            merges.push(MergeRegion {
                first_row: dim.start.0,
                first_col: col_u16(dim.start.1, path)?,
                last_row: dim.end.0,
                last_col: col_u16(dim.end.1, path)?,
            });
        }

        let mut cells = BTreeMap::new();
        let (row_off, col_off) = range.start().unwrap_or((0, 0));
        for (r, row) in range.rows().enumerate() {
            for (c, cell) in row.iter().enumerate() {
                let value = match cell {
                    Data::Empty => continue,
                    Data::String(s) => CellValue::Text(s.clone()),
                    Data::Float(f) => CellValue::Number(*f),
                    Data::Int(i) => CellValue::Number(*i as f64),
                    Data::Bool(b) => CellValue::Bool(*b),
                    // DateTime, ISO strings, and cell errors keep their
                    // display form; the fill pass never touches them.
                    other => CellValue::Text(other.to_string()),
                };
                let abs_row = row_off + r as u32;
                let abs_col = col_u16(col_off + c as u32, path)?;
                cells.insert((abs_row, abs_col), value);
            }
        }

        Ok(Self {
            sheet_name: name,
            cells,
            merges,
        })
    }

    /// Write a value at 0-based (row, col), honouring the merged-cell rule.
    pub fn set(&mut self, row: u32, col: u16, value: CellValue) -> WriteOutcome {
        let non_anchor_merge = self
            .merges
            .iter()
            .find(|m| m.contains(row, col) && m.anchor() != (row, col));
        if non_anchor_merge.is_some() {
            return WriteOutcome::SkippedMerged;
        }
        self.cells.insert((row, col), value);
        WriteOutcome::Written
    }

    /// Read back a cell value, if any.
    pub fn get(&self, row: u32, col: u16) -> Option<&CellValue> {
        self.cells.get(&(row, col))
    }

    /// The merged regions of the sheet.
    pub fn merges(&self) -> &[MergeRegion] {
        &self.merges
    }

    /// The worksheet name carried over from the template.
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Persist the grid as a new workbook at `path`.
    ///
    /// Merge ranges are emitted first with empty text, then every cell
    /// value — including merge anchors, whose later write replaces the
    /// placeholder. This is the write order `rust_xlsxwriter` expects.
    pub fn save(&self, path: &Path) -> Result<(), Scan2SheetError> {
        let save_err = |detail: String| Scan2SheetError::WorkbookSave {
            path: path.to_path_buf(),
            detail,
        };

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&self.sheet_name)
            .map_err(|e| save_err(format!("invalid sheet name: {e}")))?;

        let merge_format = Format::new();
        for m in &self.merges {
            // A one-cell "merge" is not a merge; rust_xlsxwriter rejects it.
            if m.anchor() == (m.last_row, m.last_col) {
                continue;
            }
            worksheet
                .merge_range(m.first_row, m.first_col, m.last_row, m.last_col, "", &merge_format)
                .map_err(|e| save_err(format!("merge_range failed: {e}")))?;
        }

        for (&(row, col), value) in &self.cells {
            match value {
                CellValue::Text(s) => worksheet.write_string(row, col, s),
                CellValue::Number(n) => worksheet.write_number(row, col, *n),
                CellValue::Bool(b) => worksheet.write_boolean(row, col, *b),
            }
            .map_err(|e| save_err(format!("write at ({row},{col}) failed: {e}")))?;
        }

        workbook.save(path).map_err(|e| save_err(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
impl SheetGrid {
    /// Bare grid for unit tests that don't want a file on disk.
    pub(crate) fn empty_for_tests(sheet_name: &str, merges: Vec<MergeRegion>) -> Self {
        Self {
            sheet_name: sheet_name.to_string(),
            cells: BTreeMap::new(),
            merges,
        }
    }
}

/// Column indices come out of calamine as `u32`; worksheets cap out at
/// 16 384 columns, so anything larger means a corrupt template.
fn col_u16(col: u32, path: &Path) -> Result<u16, Scan2SheetError> {
    u16::try_from(col).map_err(|_| Scan2SheetError::TemplateUnreadable {
        path: path.to_path_buf(),
        detail: format!("column index {col} out of range"),
    })
}
