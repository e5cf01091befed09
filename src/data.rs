use anyhow::{Context, Result, anyhow};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const PDF_MIME: &str = "application/pdf";
pub const PNG_MIME: &str = "image/png";
pub const TEXT_MIME: &str = "text/plain";

#[derive(Debug, Clone)]
pub struct DataAttachment {
    pub bytes: Vec<u8>,
    pub mime: String,
    pub name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct DataInfo {
    pub mime: String,
    pub name: Option<String>,
}

impl DataAttachment {
    pub fn info(&self) -> DataInfo {
        DataInfo {
            mime: self.mime.clone(),
            name: self.name.clone(),
        }
    }

    pub fn is_pdf(&self) -> bool {
        self.mime == PDF_MIME
    }
}

/// Raised when a file falls outside what the model is asked to read.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum UploadError {
    #[error("unsupported file type '{mime}' (expected an image or a PDF document)")]
    Unsupported { mime: String },
    #[error("unable to detect the type of '{name}'; pass --data-mime")]
    Undetected { name: String },
    #[error("file is empty")]
    Empty,
}

pub fn is_accepted_mime(mime: &str) -> bool {
    let mime = mime.trim().to_lowercase();
    mime.starts_with("image/") || mime == PDF_MIME
}

pub fn ensure_accepted(mime: &str) -> Result<(), UploadError> {
    if is_accepted_mime(mime) {
        Ok(())
    } else {
        Err(UploadError::Unsupported {
            mime: mime.to_string(),
        })
    }
}

pub fn load_attachment(path: &Path, mime_hint: Option<&str>) -> Result<DataAttachment> {
    let bytes = std::fs::read(path)
        .with_context(|| format!("failed to read data file: {}", path.display()))?;
    let name = path
        .file_name()
        .and_then(|value| value.to_str())
        .map(|value| value.to_string());
    Ok(attachment_from_bytes(bytes, mime_hint, name.as_deref())?)
}

/// Builds an attachment from raw bytes. A declared mime wins over sniffing;
/// without one the bytes, then the file extension, decide.
pub fn attachment_from_bytes(
    bytes: Vec<u8>,
    mime_hint: Option<&str>,
    name: Option<&str>,
) -> Result<DataAttachment, UploadError> {
    if bytes.is_empty() {
        return Err(UploadError::Empty);
    }
    let declared = mime_hint
        .map(|value| value.trim())
        .filter(|value| !value.is_empty() && !value.eq_ignore_ascii_case("auto"));
    let mime = match declared {
        Some(value) => normalize_declared_mime(value),
        None => detect_mime(&bytes, name.map(PathBuf::from).as_deref()).ok_or_else(|| {
            UploadError::Undetected {
                name: name.unwrap_or("stdin").to_string(),
            }
        })?,
    };
    ensure_accepted(&mime)?;
    Ok(DataAttachment {
        bytes,
        mime,
        name: name.map(|value| value.to_string()),
    })
}

pub fn sniff_mime(bytes: &[u8]) -> Option<String> {
    let kind = infer::get(bytes)?;
    Some(kind.mime_type().to_string())
}

fn detect_mime(bytes: &[u8], path: Option<&Path>) -> Option<String> {
    if let Some(detected) = sniff_mime(bytes) {
        return Some(detected);
    }
    let ext = path
        .and_then(|path| path.extension())
        .and_then(|value| value.to_str())
        .map(|value| value.to_lowercase())?;
    mime_from_extension(&ext).map(|value| value.to_string())
}

fn normalize_declared_mime(value: &str) -> String {
    let lower = value.to_lowercase();
    match lower.as_str() {
        "pdf" => PDF_MIME.to_string(),
        "png" => PNG_MIME.to_string(),
        "jpg" | "jpeg" => "image/jpeg".to_string(),
        "gif" => "image/gif".to_string(),
        "webp" => "image/webp".to_string(),
        "bmp" => "image/bmp".to_string(),
        "tiff" | "tif" => "image/tiff".to_string(),
        "txt" | "text" => TEXT_MIME.to_string(),
        _ => lower,
    }
}

fn mime_from_extension(ext: &str) -> Option<&'static str> {
    match ext {
        "pdf" => Some(PDF_MIME),
        "txt" => Some(TEXT_MIME),
        "png" => Some(PNG_MIME),
        "jpg" | "jpeg" => Some("image/jpeg"),
        "webp" => Some("image/webp"),
        "gif" => Some("image/gif"),
        "bmp" => Some("image/bmp"),
        "tiff" | "tif" => Some("image/tiff"),
        "heic" => Some("image/heic"),
        _ => None,
    }
}

pub fn decode_base64(encoded: &str) -> Result<Vec<u8>> {
    use base64::Engine;
    use base64::engine::general_purpose::STANDARD as BASE64;

    let trimmed = encoded.trim();
    let payload = match trimmed.split_once(";base64,") {
        Some((prefix, rest)) if prefix.starts_with("data:") => rest,
        _ => trimmed,
    };
    BASE64
        .decode(payload)
        .map_err(|err| anyhow!("invalid base64 payload: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_HEADER: &[u8] = &[0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A, 0, 0, 0, 0x0D];

    #[test]
    fn declared_text_plain_is_rejected() {
        let err = attachment_from_bytes(b"hello".to_vec(), Some("text/plain"), Some("a.txt"))
            .unwrap_err();
        assert_eq!(
            err,
            UploadError::Unsupported {
                mime: "text/plain".to_string()
            }
        );
    }

    #[test]
    fn accepts_images_and_pdf_only() {
        assert!(is_accepted_mime("image/png"));
        assert!(is_accepted_mime("image/svg+xml"));
        assert!(is_accepted_mime("application/pdf"));
        assert!(!is_accepted_mime("application/pdf+zip"));
        assert!(!is_accepted_mime("text/plain"));
        assert!(!is_accepted_mime("application/octet-stream"));
    }

    #[test]
    fn sniffs_png_without_declared_type() {
        let attachment = attachment_from_bytes(PNG_HEADER.to_vec(), None, Some("scan")).unwrap();
        assert_eq!(attachment.mime, PNG_MIME);
        assert_eq!(attachment.name.as_deref(), Some("scan"));
    }

    #[test]
    fn falls_back_to_extension() {
        let err = attachment_from_bytes(b"plain words".to_vec(), Some("auto"), Some("notes.txt"))
            .unwrap_err();
        assert!(matches!(err, UploadError::Unsupported { .. }));

        let err = attachment_from_bytes(b"plain words".to_vec(), None, Some("notes")).unwrap_err();
        assert!(matches!(err, UploadError::Undetected { .. }));
    }

    #[test]
    fn declared_shorthand_is_normalized() {
        let attachment = attachment_from_bytes(b"%PDF-1.7".to_vec(), Some("pdf"), None).unwrap();
        assert!(attachment.is_pdf());
    }

    #[test]
    fn decodes_plain_and_data_uri_base64() {
        assert_eq!(decode_base64("aGk=").unwrap(), b"hi");
        assert_eq!(decode_base64("data:image/png;base64,aGk=").unwrap(), b"hi");
        assert!(decode_base64("***").is_err());
    }
}
