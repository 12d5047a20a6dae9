//! Decoding of uploaded label and TDS payloads into evidence sources.
//!
//! Failures here are never fatal to a request: the caller logs and drops the
//! offending source, and the pipeline continues with reduced evidence.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use lopdf::{Document, Object, ObjectId};

/// Minimum non-whitespace characters before extracted PDF text counts as a
/// usable label transcript. Sparser documents are treated as scans.
pub(crate) const MIN_EXTRACTED_CHARS: usize = 120;

#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("invalid base64 payload: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("unreadable pdf: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("data url is not a base64-encoded image: {0}")]
    UnsupportedImage(String),
    #[error("document yields no extractable content")]
    NoContent,
}

/// Outcome of turning an uploaded label PDF into usable evidence.
#[derive(Debug, Clone, PartialEq)]
pub enum LabelEvidence {
    /// Machine-readable text layer.
    Text(String),
    /// Scanned document; the embedded first-page raster re-encoded as a data URL.
    Image { data_url: String },
}

/// Decodes a base64 payload, tolerating the line breaks and padding quirks
/// browsers introduce.
pub fn decode_base64(payload: &str) -> Result<Vec<u8>, DocumentError> {
    let compact: String = payload
        .chars()
        .filter(|c| !c.is_ascii_whitespace())
        .collect();
    Ok(BASE64.decode(compact.as_bytes())?)
}

/// Validates that a data URL carries a base64-encoded image payload.
pub fn validate_image_data_url(url: &str) -> Result<(), DocumentError> {
    let rest = url
        .strip_prefix("data:")
        .ok_or_else(|| DocumentError::UnsupportedImage("missing data: prefix".to_string()))?;

    let Some((header, payload)) = rest.split_once(',') else {
        return Err(DocumentError::UnsupportedImage(
            "missing comma separator".to_string(),
        ));
    };

    let Some(media_type) = header.strip_suffix(";base64") else {
        return Err(DocumentError::UnsupportedImage(
            "payload is not base64-encoded".to_string(),
        ));
    };

    let mime: mime::Mime = media_type
        .parse()
        .map_err(|_| DocumentError::UnsupportedImage(format!("bad media type '{media_type}'")))?;
    if mime.type_() != mime::IMAGE {
        return Err(DocumentError::UnsupportedImage(format!(
            "media type '{mime}' is not an image"
        )));
    }

    if payload.trim().is_empty() {
        return Err(DocumentError::UnsupportedImage("empty payload".to_string()));
    }

    Ok(())
}

/// Extracts label evidence from a PDF: the text layer when dense enough,
/// otherwise the first-page embedded JPEG (scanned labels are usually one
/// full-page DCTDecode raster).
pub fn label_evidence_from_pdf(bytes: &[u8]) -> Result<LabelEvidence, DocumentError> {
    let doc = Document::load_mem(bytes)?;
    let text = extract_all_text(&doc);

    if non_whitespace_len(&text) >= MIN_EXTRACTED_CHARS {
        return Ok(LabelEvidence::Text(text));
    }

    if let Some(jpeg) = first_page_jpeg(&doc) {
        let data_url = format!("data:image/jpeg;base64,{}", BASE64.encode(&jpeg));
        return Ok(LabelEvidence::Image { data_url });
    }

    if non_whitespace_len(&text) > 0 {
        Ok(LabelEvidence::Text(text))
    } else {
        Err(DocumentError::NoContent)
    }
}

/// Extracts the full text layer of a PDF, e.g. for TDS uploads.
pub fn text_from_pdf(bytes: &[u8]) -> Result<String, DocumentError> {
    let doc = Document::load_mem(bytes)?;
    let text = extract_all_text(&doc);
    if non_whitespace_len(&text) == 0 {
        return Err(DocumentError::NoContent);
    }
    Ok(text)
}

/// Interprets an uploaded file as either a PDF (by magic bytes) or UTF-8 text.
pub fn text_from_upload(bytes: Vec<u8>) -> Result<String, DocumentError> {
    if bytes.starts_with(b"%PDF") {
        return text_from_pdf(&bytes);
    }

    match String::from_utf8(bytes) {
        Ok(text) if non_whitespace_len(&text) > 0 => Ok(text),
        _ => Err(DocumentError::NoContent),
    }
}

pub(crate) fn non_whitespace_len(text: &str) -> usize {
    text.chars().filter(|c| !c.is_whitespace()).count()
}

fn extract_all_text(doc: &Document) -> String {
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    if pages.is_empty() {
        return String::new();
    }
    doc.extract_text(&pages).unwrap_or_default()
}

/// Walks the first page resources for image XObjects carrying a DCTDecode
/// filter and returns the largest stream, which for scanned labels is the
/// page raster itself already in JPEG form.
fn first_page_jpeg(doc: &Document) -> Option<Vec<u8>> {
    let first_page = doc.get_pages().values().next().copied()?;
    let xobjects = page_xobjects(doc, first_page)?;

    let mut best: Option<Vec<u8>> = None;
    for (_name, entry) in xobjects.iter() {
        let stream = match entry {
            Object::Reference(id) => match doc.get_object(*id) {
                Ok(Object::Stream(stream)) => stream,
                _ => continue,
            },
            Object::Stream(stream) => stream,
            _ => continue,
        };

        let is_image = matches!(stream.dict.get(b"Subtype"), Ok(Object::Name(n)) if n == b"Image");
        if !is_image || !has_dct_filter(stream.dict.get(b"Filter").ok()) {
            continue;
        }

        if best.as_ref().map_or(true, |b| stream.content.len() > b.len()) {
            best = Some(stream.content.clone());
        }
    }

    best
}

fn page_xobjects(doc: &Document, page_id: ObjectId) -> Option<lopdf::Dictionary> {
    let page = match doc.get_object(page_id) {
        Ok(Object::Dictionary(dict)) => dict,
        _ => return None,
    };

    let resources = match page.get(b"Resources") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Dictionary(dict)) => dict.clone(),
            _ => return None,
        },
        Ok(Object::Dictionary(dict)) => dict.clone(),
        _ => return None,
    };

    match resources.get(b"XObject") {
        Ok(Object::Reference(id)) => match doc.get_object(*id) {
            Ok(Object::Dictionary(dict)) => Some(dict.clone()),
            _ => None,
        },
        Ok(Object::Dictionary(dict)) => Some(dict.clone()),
        _ => None,
    }
}

fn has_dct_filter(filter: Option<&Object>) -> bool {
    match filter {
        Some(Object::Name(name)) => name == b"DCTDecode",
        Some(Object::Array(entries)) => entries
            .iter()
            .any(|entry| matches!(entry, Object::Name(n) if n == b"DCTDecode")),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_base64_tolerates_line_breaks() {
        let encoded = "aGVs\nbG8g\r\nd29ybGQ=";
        let decoded = decode_base64(encoded).expect("valid base64");
        assert_eq!(decoded, b"hello world");
    }

    #[test]
    fn decode_base64_rejects_garbage() {
        assert!(decode_base64("not!!valid@@base64").is_err());
    }

    #[test]
    fn image_data_url_accepted() {
        assert!(validate_image_data_url("data:image/png;base64,iVBORw0KGgo=").is_ok());
        assert!(validate_image_data_url("data:image/jpeg;base64,/9j/4AAQ").is_ok());
    }

    #[test]
    fn non_image_data_url_rejected() {
        let err = validate_image_data_url("data:application/pdf;base64,JVBERi0x")
            .expect_err("pdf media type rejected");
        assert!(matches!(err, DocumentError::UnsupportedImage(_)));
    }

    #[test]
    fn data_url_without_base64_marker_rejected() {
        assert!(validate_image_data_url("data:image/svg+xml,<svg/>").is_err());
        assert!(validate_image_data_url("http://example.com/label.png").is_err());
    }

    #[test]
    fn upload_routing_prefers_pdf_magic() {
        let text = text_from_upload(b"plain technical data sheet".to_vec()).expect("utf8 text");
        assert_eq!(text, "plain technical data sheet");

        // Truncated PDF header routes into the PDF parser and fails there.
        assert!(text_from_upload(b"%PDF-1.7 garbage".to_vec()).is_err());
    }

    #[test]
    fn whitespace_only_upload_is_no_content() {
        let err = text_from_upload(b"  \n\t  ".to_vec()).expect_err("no content");
        assert!(matches!(err, DocumentError::NoContent));
    }

    #[test]
    fn non_whitespace_len_counts_chars() {
        assert_eq!(non_whitespace_len(" a\n b\t c "), 3);
        assert_eq!(non_whitespace_len("   "), 0);
    }
}
