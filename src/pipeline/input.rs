//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! ## Why download to a temp file?
//!
//! Downloading to a `TempDir` keeps the rest of the pipeline working on
//! plain paths while ensuring cleanup happens automatically when
//! `ResolvedInput` is dropped, even if the process panics. We sniff the
//! image magic bytes before returning so callers get a meaningful error
//! rather than a garbage base64 payload silently confusing the model.
//! PDFs are recognised and rejected with their own error: a scanned form
//! wrapped in a PDF is a common user mistake and deserves a pointed hint.

use crate::error::Scan2SheetError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::{debug, info};

/// The resolved input — either a local path or a downloaded temp file.
#[derive(Debug)]
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; image downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the image file regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Resolve the input string to a local image file path.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Scan2SheetError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Resolve a local file path, validating existence and image magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, Scan2SheetError> {
    let path = PathBuf::from(path_str);

    if !path.exists() {
        return Err(Scan2SheetError::ImageNotFound { path });
    }

    // Check read permission by attempting to open
    match std::fs::File::open(&path) {
        Ok(mut f) => {
            use std::io::Read;
            let mut magic = [0u8; 4];
            if f.read_exact(&mut magic).is_ok() {
                validate_magic(&magic, &path)?;
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(Scan2SheetError::PermissionDenied { path });
        }
        Err(_) => {
            return Err(Scan2SheetError::ImageNotFound { path });
        }
    }

    debug!("Resolved local image: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download a URL to a temporary directory and return the path.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Scan2SheetError> {
    info!("Downloading image from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| Scan2SheetError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            Scan2SheetError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            Scan2SheetError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(Scan2SheetError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let filename = extract_filename(url);

    let temp_dir = TempDir::new().map_err(|e| Scan2SheetError::Internal(e.to_string()))?;
    let file_path = temp_dir.path().join(&filename);

    let bytes = response
        .bytes()
        .await
        .map_err(|e| Scan2SheetError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    if bytes.len() >= 4 {
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&bytes[..4]);
        validate_magic(&magic, &file_path)?;
    }

    tokio::fs::write(&file_path, &bytes)
        .await
        .map_err(|e| Scan2SheetError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded to: {}", file_path.display());

    Ok(ResolvedInput::Downloaded {
        path: file_path,
        _temp_dir: temp_dir,
    })
}

/// Accept JPEG and PNG; reject PDFs with a dedicated error; everything
/// else is "not an image".
fn validate_magic(magic: &[u8; 4], path: &Path) -> Result<(), Scan2SheetError> {
    const JPEG: [u8; 3] = [0xFF, 0xD8, 0xFF];
    const PNG: [u8; 4] = [0x89, 0x50, 0x4E, 0x47];

    if magic[..3] == JPEG || *magic == PNG {
        return Ok(());
    }
    if magic == b"%PDF" {
        return Err(Scan2SheetError::UnsupportedInput {
            path: path.to_path_buf(),
            detail: "PDF input is not supported; rasterise the page to JPEG or PNG first".into(),
        });
    }
    Err(Scan2SheetError::NotAnImage {
        path: path.to_path_buf(),
        magic: *magic,
    })
}

/// Extract a reasonable filename from the URL.
fn extract_filename(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.jpg".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/scan.jpg"));
        assert!(is_url("http://example.com/scan.jpg"));
        assert!(!is_url("/tmp/scan.jpg"));
        assert!(!is_url("scan.jpg"));
        assert!(!is_url(""));
    }

    #[test]
    fn test_magic_accepts_jpeg_and_png() {
        let p = Path::new("x.jpg");
        assert!(validate_magic(&[0xFF, 0xD8, 0xFF, 0xE0], p).is_ok());
        assert!(validate_magic(&[0xFF, 0xD8, 0xFF, 0xE1], p).is_ok());
        assert!(validate_magic(&[0x89, 0x50, 0x4E, 0x47], p).is_ok());
    }

    #[test]
    fn test_magic_rejects_pdf_with_hint() {
        let err = validate_magic(b"%PDF", Path::new("scan.pdf")).unwrap_err();
        assert!(matches!(err, Scan2SheetError::UnsupportedInput { .. }));
    }

    #[test]
    fn test_magic_rejects_garbage() {
        let err = validate_magic(b"MZ\x00\x00", Path::new("scan.exe")).unwrap_err();
        assert!(matches!(err, Scan2SheetError::NotAnImage { .. }));
    }

    #[test]
    fn test_missing_local_file() {
        let err = resolve_local("/definitely/not/here.jpg").unwrap_err();
        assert!(matches!(err, Scan2SheetError::ImageNotFound { .. }));
    }

    #[test]
    fn test_extract_filename() {
        assert_eq!(
            extract_filename("https://example.com/scans/form.png"),
            "form.png"
        );
        assert_eq!(extract_filename("https://example.com/"), "downloaded.jpg");
    }
}
