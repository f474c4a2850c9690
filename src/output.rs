//! Output types returned by the fill pipeline.

use crate::pipeline::normalize::NormalizedTable;
use serde::Serialize;
use std::path::PathBuf;

/// The result of one successful fill request.
#[derive(Debug, Clone, Serialize)]
pub struct FillOutput {
    /// Where the filled workbook copy was persisted.
    ///
    /// Always a fresh path: template stem + timestamp + per-request
    /// suffix, so concurrent or repeated requests never collide and the
    /// template file itself is never touched.
    pub output_path: PathBuf,

    /// The normalized table that was written.
    ///
    /// Returned so callers can render a preview or audit what the model
    /// produced without reopening the workbook.
    pub table: NormalizedTable,

    /// Run statistics.
    pub stats: FillStats,
}

/// Statistics for one fill request.
#[derive(Debug, Clone, Default, Serialize)]
pub struct FillStats {
    /// Data rows written into the workbook copy.
    pub rows_written: usize,

    /// Columns in the normalized table.
    pub columns: usize,

    /// Individual cell writes that landed (headers + data).
    pub cells_written: usize,

    /// Writes skipped because the target cell is a non-anchor member of a
    /// merged region.
    ///
    /// A handful of skips in the header row is normal (the template's
    /// banner). A count approaching `rows_written * columns` means the
    /// schema and the template disagree about geometry — worth a look.
    pub skipped_merged_cells: usize,

    /// Prompt tokens consumed by the vision call (0 in replay mode).
    pub input_tokens: usize,

    /// Completion tokens produced by the vision call (0 in replay mode).
    pub output_tokens: usize,

    /// Wall-clock duration of the vision call in milliseconds.
    pub ocr_duration_ms: u64,

    /// Wall-clock duration of template load + populate + save.
    pub fill_duration_ms: u64,

    /// End-to-end duration for the request.
    pub total_duration_ms: u64,
}
