//! Text extraction: PDF bytes → concatenated page text.
//!
//! Pages are visited in document order and their text appended with no added
//! separator. Only the text survives; layout and page boundaries are dropped.
//! Parsing is CPU-bound, so async callers should go through
//! [`extract_file`] which runs on the blocking pool.

use crate::error::ExtractionError;
use lopdf::Document;
use std::path::Path;
use tracing::debug;

/// Text pulled out of one PDF.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedText {
    pub text: String,
    pub page_count: usize,
}

/// Extract the text of every page from in-memory PDF bytes.
///
/// Documents protected only by an owner password open with the empty user
/// password, as in any PDF viewer. A document with no pages yields empty text.
pub fn extract_text(bytes: &[u8]) -> Result<ExtractedText, ExtractionError> {
    let bytes = locate_header(bytes)?;

    let mut doc = Document::load_mem(bytes).map_err(|e| ExtractionError::Corrupt {
        detail: e.to_string(),
    })?;

    if doc.is_encrypted() {
        doc.decrypt("").map_err(|e| {
            debug!("Empty user password rejected: {}", e);
            ExtractionError::Encrypted
        })?;
        debug!("Opened owner-password-only document");
    }

    // get_pages() is keyed by 1-based page number, so iteration is in page order.
    let pages = doc.get_pages();
    let mut text = String::new();
    for page_num in pages.keys() {
        let page_text = doc
            .extract_text(&[*page_num])
            .map_err(|e| ExtractionError::Page {
                page: *page_num,
                detail: e.to_string(),
            })?;
        text.push_str(&page_text);
    }

    debug!("Extracted {} chars from {} pages", text.len(), pages.len());
    Ok(ExtractedText {
        text,
        page_count: pages.len(),
    })
}

/// Read a staged file and extract its text on the blocking thread pool.
pub async fn extract_file(path: &Path) -> Result<ExtractedText, ExtractionError> {
    let bytes = tokio::fs::read(path).await?;
    tokio::task::spawn_blocking(move || extract_text(&bytes))
        .await
        .map_err(|e| ExtractionError::Corrupt {
            detail: format!("extraction task aborted: {}", e),
        })?
}

/// Readers accept a header preceded by junk within the first KiB; object
/// offsets are then relative to the header.
const HEADER_SEARCH_WINDOW: usize = 1024;

fn locate_header(bytes: &[u8]) -> Result<&[u8], ExtractionError> {
    let window = &bytes[..bytes.len().min(HEADER_SEARCH_WINDOW)];
    match window.windows(5).position(|w| w == b"%PDF-") {
        Some(0) => Ok(bytes),
        Some(offset) => {
            debug!("Skipping {} bytes before the PDF header", offset);
            Ok(&bytes[offset..])
        }
        None => Err(ExtractionError::NotAPdf {
            magic: bytes.iter().take(4).copied().collect(),
        }),
    }
}

/// Build a minimal text-only PDF, one page per entry.
///
/// Used by the test suites to produce real documents without fixtures.
#[doc(hidden)]
pub fn sample_pdf(pages: &[&str]) -> Vec<u8> {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! { "F1" => font_id },
    });

    let mut kids = Vec::with_capacity(pages.len());
    for line in pages {
        let content = Content {
            operations: vec![
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), Object::Integer(12)]),
                Operation::new("Td", vec![Object::Integer(72), Object::Integer(720)]),
                Operation::new("Tj", vec![Object::string_literal(*line)]),
                Operation::new("ET", vec![]),
            ],
        };
        let encoded = content.encode().unwrap_or_default();
        let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
        });
        kids.push(Object::from(page_id));
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
            "Resources" => resources_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(595),
                Object::Integer(842),
            ],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    // Writing to a Vec cannot fail.
    let _ = doc.save_to(&mut out);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pages_are_concatenated_in_order() {
        let pdf = sample_pdf(&["Tenant shall pay rent.", "Landlord may terminate at will."]);
        let out = extract_text(&pdf).unwrap();
        assert_eq!(out.page_count, 2);

        let first = out.text.find("Tenant shall pay rent.").expect("page 1 text");
        let second = out
            .text
            .find("Landlord may terminate at will.")
            .expect("page 2 text");
        assert!(first < second);
    }

    #[test]
    fn text_equals_concatenation_of_single_pages() {
        let a = extract_text(&sample_pdf(&["Alpha clause."])).unwrap().text;
        let b = extract_text(&sample_pdf(&["Beta clause."])).unwrap().text;
        let both = extract_text(&sample_pdf(&["Alpha clause.", "Beta clause."]))
            .unwrap()
            .text;
        assert_eq!(both, format!("{a}{b}"));
    }

    #[test]
    fn non_pdf_bytes_are_rejected() {
        let err = extract_text(b"hello world, not a pdf").unwrap_err();
        match err {
            ExtractionError::NotAPdf { magic } => assert_eq!(magic, b"hell".to_vec()),
            other => panic!("expected NotAPdf, got {other:?}"),
        }
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(matches!(
            extract_text(&[]),
            Err(ExtractionError::NotAPdf { .. })
        ));
    }

    #[test]
    fn truncated_pdf_is_corrupt() {
        let err = extract_text(b"%PDF-1.5\n%garbage").unwrap_err();
        assert!(
            matches!(err, ExtractionError::Corrupt { .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn owner_password_only_pdf_is_readable() {
        let pdf = include_bytes!("../../tests/fixtures/owner_only.pdf");
        let out = extract_text(pdf).unwrap();
        assert_eq!(out.page_count, 2);

        let first = out.text.find("Tenant shall pay rent.").expect("page 1 text");
        let second = out
            .text
            .find("Landlord may terminate at will.")
            .expect("page 2 text");
        assert!(first < second);
    }

    #[test]
    fn user_password_pdf_is_encrypted_error() {
        let pdf = include_bytes!("../../tests/fixtures/user_password.pdf");
        let err = extract_text(pdf).unwrap_err();
        assert!(matches!(err, ExtractionError::Encrypted), "got {err:?}");
    }

    #[test]
    fn zero_page_document_yields_empty_text() {
        let out = extract_text(&sample_pdf(&[])).unwrap();
        assert_eq!(out.page_count, 0);
        assert_eq!(out.text, "");
    }

    #[test]
    fn leading_junk_before_header_is_skipped() {
        let mut pdf = b"\r\n\x00junk from a mail gateway\n".to_vec();
        pdf.extend_from_slice(&sample_pdf(&["Clause 7 applies."]));
        let out = extract_text(&pdf).unwrap();
        assert!(out.text.contains("Clause 7 applies."));
    }

    #[test]
    fn header_beyond_search_window_is_not_a_pdf() {
        let mut pdf = vec![b' '; HEADER_SEARCH_WINDOW];
        pdf.extend_from_slice(&sample_pdf(&["Too late."]));
        assert!(matches!(
            extract_text(&pdf),
            Err(ExtractionError::NotAPdf { .. })
        ));
    }

    #[tokio::test]
    async fn extract_file_reads_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.pdf");
        std::fs::write(&path, sample_pdf(&["On disk."])).unwrap();
        let out = extract_file(&path).await.unwrap();
        assert!(out.text.contains("On disk."));
    }

    #[tokio::test]
    async fn extract_file_reports_missing_file_as_io() {
        let dir = tempfile::tempdir().unwrap();
        let err = extract_file(&dir.path().join("missing.pdf")).await.unwrap_err();
        assert!(matches!(err, ExtractionError::Io(_)));
    }
}
