//! Plain-text extraction from uploaded files.
//!
//! Callers supply raw bytes plus a declared type (a MIME type, or a file
//! name whose extension identifies the format). Extraction either yields the
//! whole document text or fails; there is no partial output.
//!
//! | Format | Backend |
//! |--------|---------|
//! | Plain text, Markdown | UTF-8, falling back to Latin-1 |
//! | PDF | `pdf-extract` |
//! | DOCX, PPTX, XLSX | `zip` + `quick-xml` |

use std::io::Read;
use std::panic::{catch_unwind, AssertUnwindSafe};

use quick_xml::events::Event;
use thiserror::Error;

pub const MIME_TEXT: &str = "text/plain";
pub const MIME_MARKDOWN: &str = "text/markdown";
pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str =
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_PPTX: &str =
    "application/vnd.openxmlformats-officedocument.presentationml.presentation";
pub const MIME_XLSX: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

const XLSX_MAX_SHEETS: usize = 100;
const XLSX_MAX_CELLS_PER_SHEET: usize = 100_000;
/// Zip-bomb guard for a single decompressed archive entry.
const MAX_XML_ENTRY_BYTES: u64 = 50 * 1024 * 1024;

#[derive(Debug, Error)]
pub enum ExtractError {
    #[error("unsupported file type: {0}")]
    UnsupportedFormat(String),

    #[error("corrupt {format} file: {reason}")]
    CorruptFile {
        format: &'static str,
        reason: String,
    },
}

impl ExtractError {
    fn corrupt(format: &'static str, reason: impl ToString) -> Self {
        ExtractError::CorruptFile {
            format,
            reason: reason.to_string(),
        }
    }
}

/// Formats the extractor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentType {
    PlainText,
    Markdown,
    Pdf,
    Docx,
    Pptx,
    Xlsx,
}

impl DocumentType {
    /// Resolve a declared MIME type, falling back to the file extension when
    /// the MIME type is absent or generic (`application/octet-stream`).
    pub fn resolve(declared: Option<&str>, file_name: Option<&str>) -> Result<Self, ExtractError> {
        let mime = declared
            .map(|d| d.split(';').next().unwrap_or(d).trim().to_ascii_lowercase())
            .filter(|d| !d.is_empty() && d != "application/octet-stream");

        if let Some(mime) = &mime {
            if let Some(t) = Self::from_mime(mime) {
                return Ok(t);
            }
        }
        if let Some(t) = file_name.and_then(Self::from_file_name) {
            return Ok(t);
        }

        let described = mime
            .or_else(|| file_name.map(str::to_string))
            .unwrap_or_else(|| "unknown".to_string());
        Err(ExtractError::UnsupportedFormat(described))
    }

    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime {
            MIME_TEXT => Some(DocumentType::PlainText),
            MIME_MARKDOWN | "text/x-markdown" => Some(DocumentType::Markdown),
            MIME_PDF => Some(DocumentType::Pdf),
            MIME_DOCX => Some(DocumentType::Docx),
            MIME_PPTX => Some(DocumentType::Pptx),
            MIME_XLSX => Some(DocumentType::Xlsx),
            _ => None,
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        let ext = name.rsplit_once('.')?.1.to_ascii_lowercase();
        match ext.as_str() {
            "txt" | "text" => Some(DocumentType::PlainText),
            "md" | "markdown" => Some(DocumentType::Markdown),
            "pdf" => Some(DocumentType::Pdf),
            "docx" => Some(DocumentType::Docx),
            "pptx" => Some(DocumentType::Pptx),
            "xlsx" => Some(DocumentType::Xlsx),
            _ => None,
        }
    }

    pub fn mime(&self) -> &'static str {
        match self {
            DocumentType::PlainText => MIME_TEXT,
            DocumentType::Markdown => MIME_MARKDOWN,
            DocumentType::Pdf => MIME_PDF,
            DocumentType::Docx => MIME_DOCX,
            DocumentType::Pptx => MIME_PPTX,
            DocumentType::Xlsx => MIME_XLSX,
        }
    }
}

/// Extract plain text from `bytes` of the given type.
pub fn extract_text(bytes: &[u8], doc_type: DocumentType) -> Result<String, ExtractError> {
    match doc_type {
        DocumentType::PlainText | DocumentType::Markdown => Ok(decode_text(bytes)),
        DocumentType::Pdf => extract_pdf(bytes),
        DocumentType::Docx => extract_docx(bytes),
        DocumentType::Pptx => extract_pptx(bytes),
        DocumentType::Xlsx => extract_xlsx(bytes),
    }
}

/// UTF-8 if valid (BOM stripped), otherwise Latin-1, which accepts any byte.
fn decode_text(bytes: &[u8]) -> String {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => s.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

fn extract_pdf(bytes: &[u8]) -> Result<String, ExtractError> {
    // pdf-extract panics on some malformed inputs instead of returning Err.
    match catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_from_mem(bytes))) {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(ExtractError::corrupt("PDF", e)),
        Err(_) => Err(ExtractError::corrupt("PDF", "parser aborted on malformed input")),
    }
}

type Archive<'a> = zip::ZipArchive<std::io::Cursor<&'a [u8]>>;

fn open_archive<'a>(bytes: &'a [u8], format: &'static str) -> Result<Archive<'a>, ExtractError> {
    zip::ZipArchive::new(std::io::Cursor::new(bytes)).map_err(|e| ExtractError::corrupt(format, e))
}

/// Read one archive entry with a size cap. `Ok(None)` if the entry is absent.
fn read_entry(
    archive: &mut Archive<'_>,
    name: &str,
    format: &'static str,
) -> Result<Option<Vec<u8>>, ExtractError> {
    let entry = match archive.by_name(name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => return Ok(None),
        Err(e) => return Err(ExtractError::corrupt(format, e)),
    };
    let mut out = Vec::new();
    entry
        .take(MAX_XML_ENTRY_BYTES)
        .read_to_end(&mut out)
        .map_err(|e| ExtractError::corrupt(format, e))?;
    if out.len() as u64 >= MAX_XML_ENTRY_BYTES {
        return Err(ExtractError::corrupt(
            format,
            format!("{} exceeds {} bytes", name, MAX_XML_ENTRY_BYTES),
        ));
    }
    Ok(Some(out))
}

/// Archive entries matching `prefix<N>.xml`, in numeric order.
fn numbered_entries(archive: &Archive<'_>, prefix: &str) -> Vec<String> {
    let mut names: Vec<String> = archive
        .file_names()
        .filter(|n| n.starts_with(prefix) && n.ends_with(".xml"))
        .map(str::to_string)
        .collect();
    names.sort_by_key(|name| {
        name[prefix.len()..]
            .trim_end_matches(".xml")
            .parse::<u32>()
            .unwrap_or(u32::MAX)
    });
    names
}

fn extract_docx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes, "DOCX")?;
    let xml = read_entry(&mut archive, "word/document.xml", "DOCX")?
        .ok_or_else(|| ExtractError::corrupt("DOCX", "word/document.xml not found"))?;
    collect_text_runs(&xml, "DOCX")
}

fn extract_pptx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes, "PPTX")?;
    let mut out = String::new();
    for name in numbered_entries(&archive, "ppt/slides/slide") {
        let Some(xml) = read_entry(&mut archive, &name, "PPTX")? else {
            continue;
        };
        let text = collect_text_runs(&xml, "PPTX")?;
        if !out.is_empty() && !text.is_empty() {
            out.push('\n');
        }
        out.push_str(text.trim_end());
    }
    Ok(out)
}

/// Concatenate `<*:t>` text runs, ending each `<*:p>` paragraph with a
/// newline. Works for both WordprocessingML and DrawingML.
fn collect_text_runs(xml: &[u8], format: &'static str) -> Result<String, ExtractError> {
    let mut out = String::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) if e.local_name().as_ref() == b"t" => in_text = true,
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().map_err(|e| ExtractError::corrupt(format, e))?;
                out.push_str(&text);
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::corrupt(format, e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(out)
}

fn extract_xlsx(bytes: &[u8]) -> Result<String, ExtractError> {
    let mut archive = open_archive(bytes, "XLSX")?;
    let shared = match read_entry(&mut archive, "xl/sharedStrings.xml", "XLSX")? {
        Some(xml) => read_shared_strings(&xml)?,
        None => Vec::new(),
    };

    let mut sheets = Vec::new();
    for name in numbered_entries(&archive, "xl/worksheets/sheet")
        .into_iter()
        .take(XLSX_MAX_SHEETS)
    {
        if let Some(xml) = read_entry(&mut archive, &name, "XLSX")? {
            let cells = read_sheet_cells(&xml, &shared)?;
            if !cells.is_empty() {
                sheets.push(cells.join(" "));
            }
        }
    }
    Ok(sheets.join("\n"))
}

fn read_shared_strings(xml: &[u8]) -> Result<Vec<String>, ExtractError> {
    let mut strings = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut current: Option<String> = None;
    let mut in_text = false;
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"si" => current = Some(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                if let Some(s) = current.as_mut() {
                    let text = te.unescape().map_err(|e| ExtractError::corrupt("XLSX", e))?;
                    s.push_str(&text);
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"t" => in_text = false,
                b"si" => strings.extend(current.take()),
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::corrupt("XLSX", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(strings)
}

/// Cell values of one worksheet: shared strings are resolved, inline strings
/// and literal values are kept as written.
fn read_sheet_cells(xml: &[u8], shared: &[String]) -> Result<Vec<String>, ExtractError> {
    let mut cells = Vec::new();
    let mut reader = quick_xml::Reader::from_reader(xml);
    let mut buf = Vec::new();
    let mut shared_cell = false;
    let mut in_value = false;
    while cells.len() < XLSX_MAX_CELLS_PER_SHEET {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"c" => {
                    shared_cell = e.attributes().flatten().any(|a| {
                        a.key.local_name().as_ref() == b"t" && a.value.as_ref() == b"s"
                    });
                }
                b"v" | b"t" => in_value = true,
                _ => {}
            },
            Ok(Event::Text(te)) if in_value => {
                let raw = te.unescape().map_err(|e| ExtractError::corrupt("XLSX", e))?;
                let value = raw.trim();
                if shared_cell {
                    if let Some(s) = value.parse::<usize>().ok().and_then(|i| shared.get(i)) {
                        cells.push(s.clone());
                    }
                } else if !value.is_empty() {
                    cells.push(value.to_string());
                }
            }
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"v" | b"t" => in_value = false,
                b"c" => shared_cell = false,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(ExtractError::corrupt("XLSX", e)),
            _ => {}
        }
        buf.clear();
    }
    Ok(cells)
}
