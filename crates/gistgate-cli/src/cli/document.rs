//! Turn files on disk into [`DocumentContent`].
//!
//! Known binary types (PDF, images, office formats) are base64-encoded; other
//! files are sent as text when they are valid UTF-8.

use std::path::Path;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use gistgate_types::llm::DocumentContent;

/// MIME type for extensions that are always sent as binary attachments.
fn binary_mime_type(extension: &str) -> Option<&'static str> {
    let mime = match extension {
        "pdf" => "application/pdf",
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "docx" => "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        "xlsx" => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
        "pptx" => "application/vnd.openxmlformats-officedocument.presentationml.presentation",
        _ => return None,
    };
    Some(mime)
}

/// Build document content from raw bytes.
pub fn document_from_bytes(filename: &str, bytes: Vec<u8>) -> DocumentContent {
    let extension = Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();

    if let Some(mime_type) = binary_mime_type(&extension) {
        return DocumentContent::binary(filename, mime_type, STANDARD.encode(&bytes));
    }

    match String::from_utf8(bytes) {
        Ok(text) => DocumentContent::text(filename, text),
        Err(e) => DocumentContent::binary(
            filename,
            "application/octet-stream",
            STANDARD.encode(e.as_bytes()),
        ),
    }
}

pub async fn load_document(path: &Path) -> Result<DocumentContent> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let document = document_from_bytes(&filename, bytes);
    tracing::debug!(?document, "document loaded");
    Ok(document)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pdf_is_base64_encoded() {
        let doc = document_from_bytes("Report.PDF", b"%PDF-1.7".to_vec());
        assert_eq!(
            doc,
            DocumentContent::binary("Report.PDF", "application/pdf", "JVBERi0xLjc=")
        );
    }

    #[test]
    fn test_utf8_file_is_text() {
        let doc = document_from_bytes("notes.md", "# Titre\nÉté".as_bytes().to_vec());
        assert_eq!(doc, DocumentContent::text("notes.md", "# Titre\nÉté"));
    }

    #[test]
    fn test_unknown_binary_falls_back_to_octet_stream() {
        let doc = document_from_bytes("blob.bin", vec![0xff, 0xfe, 0x00]);
        assert!(matches!(
            doc,
            DocumentContent::Binary { ref mime_type, .. } if mime_type == "application/octet-stream"
        ));
    }

    #[tokio::test]
    async fn test_load_document_reads_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("a.txt");
        std::fs::write(&path, "hello").unwrap();
        let doc = load_document(&path).await.unwrap();
        assert_eq!(doc, DocumentContent::text("a.txt", "hello"));
        assert!(load_document(&tmp.path().join("missing.txt")).await.is_err());
    }
}
