//! Pipeline stages for the scan-to-spreadsheet fill.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different JSON isolation strategy)
//! without touching other stages.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ encode ──▶ ocr ──▶ extract ──▶ normalize ──▶ fill
//! (URL/path) (base64)  (VLM)  (JSON scan)  (table)    (workbook copy)
//! ```
//!
//! 1. [`input`]     — canonicalise the user-supplied path or URL to a local
//!    image file and reject non-image bytes up front
//! 2. [`encode`]    — re-encode and base64-wrap the image for the multimodal
//!    API request body
//! 3. [`ocr`]       — the single vision call; the only stage with network
//!    I/O and the only suspension point in a request
//! 4. [`extract`]   — isolate the JSON array of records from whatever prose
//!    the model wrapped around it
//! 5. [`normalize`] — shape heterogeneous records into one rectangular table
//! 6. [`fill`]      — project the table onto an in-memory copy of the
//!    template worksheet

pub mod encode;
pub mod extract;
pub mod fill;
pub mod input;
pub mod normalize;
pub mod ocr;
