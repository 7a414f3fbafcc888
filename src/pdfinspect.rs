use lopdf::{Document as LoDocument, Object as LoObject};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PdfInspectErrorCode {
    PdfParseFailed,
    PdfEncryptedUnsupported,
    PdfEmptyOrNoPages,
    PdfIoError,
}

impl PdfInspectErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PdfInspectErrorCode::PdfParseFailed => "PDF_PARSE_FAILED",
            PdfInspectErrorCode::PdfEncryptedUnsupported => "PDF_ENCRYPTED_UNSUPPORTED",
            PdfInspectErrorCode::PdfEmptyOrNoPages => "PDF_EMPTY_OR_NO_PAGES",
            PdfInspectErrorCode::PdfIoError => "PDF_IO_ERROR",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PdfInspectError {
    pub code: PdfInspectErrorCode,
    pub message: String,
}

impl std::fmt::Display for PdfInspectError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code.as_str(), self.message)
    }
}

impl std::error::Error for PdfInspectError {}

/// What a certificate reader would check first: version, page count, page size, fonts.
#[derive(Debug, Clone, PartialEq)]
pub struct PdfInspectReport {
    pub pdf_version: String,
    pub page_count: usize,
    pub encrypted: bool,
    pub file_size_bytes: usize,
    /// Width and height of the first page's MediaBox, in points.
    pub page_size: Option<(f32, f32)>,
    /// BaseFont names of every font dictionary, sorted and deduplicated.
    pub base_fonts: Vec<String>,
    pub title: Option<String>,
}

impl PdfInspectReport {
    /// True for a single A4 portrait page, within a hundredth of a point.
    pub fn is_single_a4_page(&self) -> bool {
        self.page_count == 1
            && self.page_size.is_some_and(|(w, h)| {
                (w - 595.28).abs() < 0.01 && (h - 841.89).abs() < 0.01
            })
    }
}

pub fn inspect_pdf_bytes(bytes: &[u8]) -> Result<PdfInspectReport, PdfInspectError> {
    let pdf = LoDocument::load_mem(bytes).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfParseFailed,
        message: err.to_string(),
    })?;

    let pages = pdf.get_pages();
    let page_size = pages
        .values()
        .next()
        .and_then(|page_id| media_box_size(&pdf, *page_id));

    let mut base_fonts: Vec<String> = pdf
        .objects
        .values()
        .filter_map(|object| {
            let dict = object.as_dict().ok()?;
            let kind = dict.get(b"Type").ok()?.as_name().ok()?;
            if kind != b"Font" {
                return None;
            }
            let base = dict.get(b"BaseFont").ok()?.as_name().ok()?;
            Some(String::from_utf8_lossy(base).into_owned())
        })
        .collect();
    base_fonts.sort();
    base_fonts.dedup();

    Ok(PdfInspectReport {
        pdf_version: pdf.version.clone(),
        page_count: pages.len(),
        encrypted: pdf.is_encrypted(),
        file_size_bytes: bytes.len(),
        page_size,
        base_fonts,
        title: info_title(&pdf),
    })
}

pub fn inspect_pdf_path(path: &Path) -> Result<PdfInspectReport, PdfInspectError> {
    let data = std::fs::read(path).map_err(|err| PdfInspectError {
        code: PdfInspectErrorCode::PdfIoError,
        message: err.to_string(),
    })?;
    inspect_pdf_bytes(&data)
}

/// Rejects encrypted or empty files; everything downstream assumes at least one page.
pub fn require_readable_certificate(report: &PdfInspectReport) -> Result<(), PdfInspectError> {
    if report.encrypted {
        return Err(PdfInspectError {
            code: PdfInspectErrorCode::PdfEncryptedUnsupported,
            message: "encrypted pdf files are not supported".to_string(),
        });
    }
    if report.page_count == 0 {
        return Err(PdfInspectError {
            code: PdfInspectErrorCode::PdfEmptyOrNoPages,
            message: "pdf has no pages".to_string(),
        });
    }
    Ok(())
}

fn media_box_size(pdf: &LoDocument, page_id: lopdf::ObjectId) -> Option<(f32, f32)> {
    let page = pdf.get_object(page_id).ok()?.as_dict().ok()?;
    let media_box = page.get(b"MediaBox").ok()?.as_array().ok()?;
    let nums: Vec<f32> = media_box.iter().filter_map(number).collect();
    let &[x0, y0, x1, y1] = nums.as_slice() else {
        return None;
    };
    Some(((x1 - x0).abs(), (y1 - y0).abs()))
}

fn number(object: &LoObject) -> Option<f32> {
    match object {
        LoObject::Integer(value) => Some(*value as f32),
        LoObject::Real(value) => Some(*value),
        _ => None,
    }
}

fn info_title(pdf: &LoDocument) -> Option<String> {
    let info_id = pdf.trailer.get(b"Info").ok()?.as_reference().ok()?;
    let info = pdf.get_object(info_id).ok()?.as_dict().ok()?;
    match info.get(b"Title").ok()? {
        LoObject::String(bytes, _) => Some(decode_text_string(bytes)),
        _ => None,
    }
}

fn decode_text_string(bytes: &[u8]) -> String {
    match bytes {
        [0xFE, 0xFF, rest @ ..] => {
            let units: Vec<u16> = rest
                .chunks_exact(2)
                .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
                .collect();
            String::from_utf16_lossy(&units)
        }
        _ => bytes.iter().map(|b| *b as char).collect(),
    }
}
