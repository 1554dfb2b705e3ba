//! Uploaded file storage.
//!
//! Files land under the uploads directory with timestamp-random names and
//! are served back via the static file route. Uploads are capped at 5 MB
//! and restricted to PDF/JPG/JPEG/PNG, checked against both the filename
//! and the file's magic bytes.

use std::path::Path;

use rand::Rng;
use thiserror::Error;

/// Upload size cap (5 MB), matching the client-side limit.
pub const MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;

const ALLOWED_EXTENSIONS: &[&str] = &["pdf", "jpg", "jpeg", "png"];

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("File exceeds {MAX_UPLOAD_BYTES} byte limit ({0} bytes)")]
    TooLarge(usize),

    #[error("Only PDF, JPG, PNG allowed (got {0})")]
    UnsupportedType(String),

    #[error("Storage failed: {0}")]
    Io(#[from] std::io::Error),
}

/// Validate and persist an upload. Returns the URL path the file is served
/// from, e.g. `/uploads/prescriptions/1693305600000-482910472.pdf`.
pub fn store_upload(
    uploads_dir: &Path,
    subdir: &str,
    original_name: &str,
    bytes: &[u8],
) -> Result<String, MediaError> {
    if bytes.len() > MAX_UPLOAD_BYTES {
        return Err(MediaError::TooLarge(bytes.len()));
    }

    let ext = validated_extension(original_name, bytes)?;

    let dir = uploads_dir.join(subdir);
    std::fs::create_dir_all(&dir)?;

    let unique: u32 = rand::thread_rng().gen();
    let file_name = format!(
        "{}-{}.{}",
        chrono::Utc::now().timestamp_millis(),
        unique,
        ext
    );
    std::fs::write(dir.join(&file_name), bytes)?;

    Ok(format!("/uploads/{subdir}/{file_name}"))
}

/// Check the claimed extension, its MIME type, and the magic bytes agree on
/// an allowed format. Returns the canonical extension to store under.
fn validated_extension(original_name: &str, bytes: &[u8]) -> Result<&'static str, MediaError> {
    let claimed = Path::new(original_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    if !ALLOWED_EXTENSIONS.contains(&claimed.as_str()) {
        return Err(MediaError::UnsupportedType(claimed));
    }

    let mime = mime_guess::from_path(original_name).first_or_octet_stream();
    match (mime.type_().as_str(), mime.subtype().as_str()) {
        ("application", "pdf") | ("image", "jpeg") | ("image", "png") => {}
        (t, s) => return Err(MediaError::UnsupportedType(format!("{t}/{s}"))),
    }

    match detect_format(bytes) {
        Some(detected) => Ok(detected),
        None => Err(MediaError::UnsupportedType("unrecognized content".into())),
    }
}

/// Detect file format from magic bytes.
fn detect_format(bytes: &[u8]) -> Option<&'static str> {
    if bytes.len() >= 3 && bytes[0..3] == [0xFF, 0xD8, 0xFF] {
        Some("jpg")
    } else if bytes.len() >= 8 && bytes[0..8] == [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A] {
        Some("png")
    } else if bytes.len() >= 5 && &bytes[0..5] == b"%PDF-" {
        Some("pdf")
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00];

    #[test]
    fn stores_and_names_png() {
        let dir = tempfile::tempdir().unwrap();
        let url = store_upload(dir.path(), "images", "scan.png", PNG_MAGIC).unwrap();
        assert!(url.starts_with("/uploads/images/"));
        assert!(url.ends_with(".png"));

        let stored = dir.path().join(url.trim_start_matches("/uploads/"));
        assert!(stored.exists());
    }

    #[test]
    fn rejects_oversized() {
        let dir = tempfile::tempdir().unwrap();
        let mut big = vec![0u8; MAX_UPLOAD_BYTES + 1];
        big[0..5].copy_from_slice(b"%PDF-");
        let err = store_upload(dir.path(), "prescriptions", "big.pdf", &big).unwrap_err();
        assert!(matches!(err, MediaError::TooLarge(_)));
    }

    #[test]
    fn rejects_disallowed_extension() {
        let dir = tempfile::tempdir().unwrap();
        let err = store_upload(dir.path(), "prescriptions", "notes.txt", b"hello").unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedType(_)));
    }

    #[test]
    fn rejects_extension_content_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        // .png name over arbitrary bytes
        let err = store_upload(dir.path(), "images", "fake.png", b"MZ\x90\x00").unwrap_err();
        assert!(matches!(err, MediaError::UnsupportedType(_)));
    }

    #[test]
    fn detects_jpeg_magic() {
        assert_eq!(detect_format(&[0xFF, 0xD8, 0xFF, 0xE0]), Some("jpg"));
        assert_eq!(detect_format(b"%PDF-1.7"), Some("pdf"));
        assert_eq!(detect_format(&[0x00, 0x01]), None);
    }
}
