use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use tracing::{debug, warn};

use crate::error::Error;

pub const PDF_MIME: &str = "application/pdf";
pub const DOCX_MIME: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const TEXT_MIME: &str = "text/plain";

/// Decodes the payload of a base64 data URL (`data:<mime>;base64,<payload>`)
/// as produced by the browser's FileReader.
pub fn decode_data_url(data_url: &str) -> Result<Vec<u8>, Error> {
    let Some((_, payload)) = data_url.split_once(',') else {
        return Err(Error::Input(
            "fileDataUrl is not a base64 data URL".to_string(),
        ));
    };
    BASE64
        .decode(payload)
        .map_err(|e| Error::Input(format!("fileDataUrl payload is not valid base64: {e}")))
}

/// Converts raw document bytes into plain text.
///
/// Dispatch is on the declared MIME type, with a filename-suffix fallback
/// for `.docx` because browsers regularly under-report the Word MIME type.
/// Unknown formats get one last-resort strict UTF-8 decode. Pure, single
/// attempt, no retry.
pub fn extract_text(bytes: &[u8], file_type: &str, file_name: &str) -> Result<String, Error> {
    let text = match file_type {
        PDF_MIME => {
            debug!("extracting text from PDF '{file_name}'");
            pdf_extract::extract_text_from_mem(bytes)
                .map_err(|e| Error::Extraction(format!("could not read the PDF document: {e}")))?
        }
        t if t == DOCX_MIME || file_name.ends_with(".docx") => {
            debug!("extracting text from DOCX '{file_name}'");
            extract_docx(bytes)?
        }
        t if t == TEXT_MIME || file_name.ends_with(".txt") => {
            String::from_utf8_lossy(bytes).into_owned()
        }
        other => {
            warn!("unsupported file type '{other}' for '{file_name}', trying plain text");
            let fallback = String::from_utf8(bytes.to_vec())
                .map_err(|_| Error::UnsupportedFormat(other.to_string()))?;
            if fallback.trim().is_empty() {
                return Err(Error::UnsupportedFormat(other.to_string()));
            }
            fallback
        }
    };

    if text.trim().is_empty() {
        return Err(Error::EmptyDocument);
    }
    Ok(text)
}

/// Joins the text runs of every paragraph in the document body.
fn extract_docx(bytes: &[u8]) -> Result<String, Error> {
    use docx_rs::{DocumentChild, ParagraphChild, RunChild, read_docx};

    let docx = read_docx(bytes)
        .map_err(|e| Error::Extraction(format!("could not read the Word document: {e}")))?;

    let mut paragraphs: Vec<String> = Vec::new();
    for child in docx.document.children.iter() {
        if let DocumentChild::Paragraph(paragraph) = child {
            let paragraph_text: String = paragraph
                .children
                .iter()
                .filter_map(|pc| {
                    if let ParagraphChild::Run(run) = pc {
                        Some(
                            run.children
                                .iter()
                                .filter_map(|rc| {
                                    if let RunChild::Text(t) = rc {
                                        Some(t.text.clone())
                                    } else {
                                        None
                                    }
                                })
                                .collect::<Vec<_>>()
                                .join(""),
                        )
                    } else {
                        None
                    }
                })
                .collect::<Vec<_>>()
                .join("");

            if !paragraph_text.is_empty() {
                paragraphs.push(paragraph_text);
            }
        }
    }

    Ok(paragraphs.join("\n"))
}
