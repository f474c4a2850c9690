//! Error types for the scan2sheet library.
//!
//! Every error is **terminal for the current request**: the pipeline never
//! retries a stage internally. Retry, if desired, is a caller-level concern
//! (re-submit the image). What the caller *does* get is stage identity —
//! [`Scan2SheetError::stage`] names the pipeline stage that failed, which
//! narrows whether the fault lies in the input, the external OCR service,
//! or the local template file.

use std::path::PathBuf;
use thiserror::Error;

/// The pipeline stage a request was in when it failed.
///
/// One request walks these stages in order, each exactly once:
///
/// ```text
/// TemplateResolution → InputResolution → OcrCall → JsonIsolation
///                    → Normalization → WorkbookFill
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub enum Stage {
    /// Template id lookup and template file existence check.
    TemplateResolution,
    /// Image path/URL resolution, format sniffing, and encoding.
    InputResolution,
    /// The single vision-model call (the only network suspension point).
    OcrCall,
    /// Carving the JSON array out of the free-text model response.
    JsonIsolation,
    /// Parsing records and aligning them into a rectangular table.
    Normalization,
    /// Loading the template grid, writing cells, persisting the copy.
    WorkbookFill,
}

impl Stage {
    /// Stable lowercase name, used in logs and CLI error output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::TemplateResolution => "template-resolution",
            Stage::InputResolution => "input-resolution",
            Stage::OcrCall => "ocr-call",
            Stage::JsonIsolation => "json-isolation",
            Stage::Normalization => "normalization",
            Stage::WorkbookFill => "workbook-fill",
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All errors returned by the scan2sheet library.
#[derive(Debug, Error)]
pub enum Scan2SheetError {
    // ── Input errors (client's fault, nothing to retry) ───────────────────
    /// No template file with the requested id exists in the template directory.
    #[error("Template '{id}' not found in '{dir}'\nRun with --list-templates to see what is available.")]
    TemplateNotFound { id: String, dir: PathBuf },

    /// Image file was not found at the given path.
    #[error("Image file not found: '{path}'\nCheck the path exists and is readable.")]
    ImageNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// The file exists and was read, but is not a JPEG or PNG image.
    #[error("File is not a JPEG or PNG image: '{path}'\nFirst bytes: {magic:?}")]
    NotAnImage { path: PathBuf, magic: [u8; 4] },

    /// The file is a format this pipeline deliberately does not handle.
    #[error("Unsupported input '{path}': {detail}")]
    UnsupportedInput { path: PathBuf, detail: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// Could not decode or re-encode the image bytes.
    #[error("Image encoding failed for '{path}': {detail}")]
    ImageEncoding { path: PathBuf, detail: String },

    // ── Upstream errors (OCR service, surfaced verbatim, not retried) ─────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("Vision provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The vision API returned an error. Single-shot call, not retried.
    #[error("OCR call failed: {detail}")]
    OcrFailed { detail: String },

    /// The single vision call exceeded the configured timeout.
    #[error("OCR call timed out after {secs}s\nIncrease --api-timeout, or re-submit the image.")]
    OcrTimeout { secs: u64 },

    /// The vision API answered, but with an empty message body.
    #[error("OCR service returned an empty response")]
    EmptyResponse,

    // ── Extraction errors ─────────────────────────────────────────────────
    /// No substring of the response looks like a JSON array of objects.
    #[error("No JSON array found in the OCR response.\nResponse began: {snippet:?}")]
    NoJsonArray { snippet: String },

    // ── Normalization errors ──────────────────────────────────────────────
    /// An array was isolated but it is not a valid list of flat records.
    #[error("OCR response is not a valid array of flat records: {detail}")]
    MalformedRecords { detail: String },

    // ── Write errors ──────────────────────────────────────────────────────
    /// The template workbook could not be opened or read.
    #[error("Failed to read template workbook '{path}': {detail}")]
    TemplateUnreadable { path: PathBuf, detail: String },

    /// The filled workbook could not be serialised or saved.
    #[error("Failed to save filled workbook '{path}': {detail}")]
    WorkbookSave { path: PathBuf, detail: String },

    /// Could not create a directory or write an auxiliary file.
    #[error("Failed to write '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Scan2SheetError {
    /// The pipeline stage this error belongs to.
    ///
    /// `InvalidConfig` and `Internal` surface before (or outside) the state
    /// machine; they are attributed to the earliest stage so callers always
    /// get a stage name.
    pub fn stage(&self) -> Stage {
        use Scan2SheetError::*;
        match self {
            TemplateNotFound { .. } => Stage::TemplateResolution,
            ImageNotFound { .. }
            | PermissionDenied { .. }
            | InvalidInput { .. }
            | NotAnImage { .. }
            | UnsupportedInput { .. }
            | DownloadFailed { .. }
            | DownloadTimeout { .. }
            | ImageEncoding { .. } => Stage::InputResolution,
            ProviderNotConfigured { .. } | OcrFailed { .. } | OcrTimeout { .. }
            | EmptyResponse => Stage::OcrCall,
            NoJsonArray { .. } => Stage::JsonIsolation,
            MalformedRecords { .. } => Stage::Normalization,
            TemplateUnreadable { .. } | WorkbookSave { .. } | OutputWriteFailed { .. } => {
                Stage::WorkbookFill
            }
            InvalidConfig(_) | Internal(_) => Stage::TemplateResolution,
        }
    }
}
