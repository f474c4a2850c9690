//! # scan2sheet
//!
//! Fill Excel report templates from photographed shop-floor registers
//! using Vision Language Models (VLMs).
//!
//! ## Why this crate?
//!
//! Factories keep daily production registers on paper — grinding logs,
//! MPI inspection sheets, shot-blasting tallies — and someone retypes
//! them into Excel every shift. Conventional OCR struggles with ruled
//! tables and handwriting; a VLM reads the photographed page like a
//! human would. This crate sends the scan to a VLM with a schema-specific
//! prompt, carves the JSON table out of the reply, and writes it into a
//! fresh copy of the matching report template, merged title banner and
//! all.
//!
//! ## Pipeline Overview
//!
//! ```text
//! scan (JPEG/PNG)
//!  │
//!  ├─ 1. Template  pick the schema + prompt for the template id
//!  ├─ 2. Input     resolve local file or download from URL
//!  ├─ 3. Encode    image → base64 ImageData
//!  ├─ 4. OCR       one vision call to gpt-4o / claude / gemini / …
//!  ├─ 5. Extract   isolate the JSON array from the model's reply
//!  ├─ 6. Normalize ragged records → one rectangular table
//!  └─ 7. Fill      project the table onto a copy of the template
//! ```
//!
//! Stages 5–7 are deterministic and synchronous; the vision call is the
//! only suspension point, made exactly once per request.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scan2sheet::{transcribe, FillConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / GEMINI_API_KEY
//!     let config = FillConfig::default();
//!     let output = transcribe("GRINDING.xlsx", "scan.jpg", &config).await?;
//!     println!("{}", output.output_path.display());
//!     eprintln!("{} rows, {} merged-cell skips",
//!         output.stats.rows_written,
//!         output.stats.skipped_merged_cells);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `scan2sheet` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! scan2sheet = { version = "0.3", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod registry;
pub mod transcribe;
pub mod workbook;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{FillConfig, FillConfigBuilder};
pub use error::{Scan2SheetError, Stage};
pub use output::{FillOutput, FillStats};
pub use pipeline::normalize::NormalizedTable;
pub use progress::{FillProgressCallback, NoopProgressCallback, ProgressCallback};
pub use registry::{MatchRule, TemplateDescriptor, TemplateRegistry};
pub use transcribe::{fill_from_response, list_templates, transcribe, transcribe_sync};
pub use workbook::{CellValue, MergeRegion, SheetGrid, WriteOutcome};
