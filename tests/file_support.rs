//! Integration tests for multi-format ingest.
//!
//! Each format goes through `ingest_document` into a real store and is then
//! found again by lexical search.

use std::io::Write;

use lexrag::error::RagError;
use lexrag::ingest::{ingest_document, IngestRequest};
use lexrag_core::score::ScoringPolicy;
use lexrag_core::search::{retrieve, RetrieveParams};
use lexrag_core::store::memory::InMemoryStore;
use lexrag_core::store::Store;

const LIMIT: usize = 1 << 20;

/// Minimal PDF with one text object. Builds body then xref with correct
/// byte offsets.
fn minimal_pdf_with_phrase() -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"%PDF-1.4\n");
    let o1 = out.len();
    out.extend_from_slice(b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n");
    let o2 = out.len();
    out.extend_from_slice(b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n");
    let o3 = out.len();
    out.extend_from_slice(b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] /Contents 4 0 R /Resources << /Font << /F1 5 0 R >> >> >> endobj\n");
    let o4 = out.len();
    out.extend_from_slice(b"4 0 obj << /Length 47 >> stream\nBT /F1 12 Tf 100 700 Td (lexical test phrase) Tj ET\nendstream endobj\n");
    let o5 = out.len();
    out.extend_from_slice(
        b"5 0 obj << /Type /Font /Subtype /Type1 /BaseFont /Helvetica >> endobj\n",
    );
    let xref_start = out.len();
    out.extend_from_slice(b"xref\n0 6\n");
    out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
    for offset in [o1, o2, o3, o4, o5] {
        out.extend_from_slice(format!("{:010} 00000 n \n", offset).as_bytes());
    }
    out.extend_from_slice(b"trailer << /Size 6 /Root 1 0 R >>\nstartxref\n");
    out.extend_from_slice(format!("{}\n", xref_start).as_bytes());
    out.extend_from_slice(b"%%EOF\n");
    out
}

fn zip_with(entries: &[(&str, String)]) -> Vec<u8> {
    let mut buf = Vec::new();
    {
        let mut zip = zip::ZipWriter::new(std::io::Cursor::new(&mut buf));
        for (name, body) in entries {
            zip.start_file(*name, zip::write::SimpleFileOptions::default())
                .unwrap();
            zip.write_all(body.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }
    buf
}

fn minimal_docx_with_text(phrase: &str) -> Vec<u8> {
    zip_with(&[(
        "word/document.xml",
        format!(
            "<?xml version=\"1.0\"?><w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body><w:p><w:r><w:t>{}</w:t></w:r></w:p></w:body></w:document>",
            phrase
        ),
    )])
}

fn minimal_pptx_with_slides(slides: &[&str]) -> Vec<u8> {
    let entries: Vec<(String, String)> = slides
        .iter()
        .enumerate()
        .map(|(i, text)| {
            (
                format!("ppt/slides/slide{}.xml", i + 1),
                format!(
                    "<?xml version=\"1.0\"?><p:sld xmlns:p=\"http://schemas.openxmlformats.org/presentationml/2006/main\" xmlns:a=\"http://schemas.openxmlformats.org/drawingml/2006/main\"><p:cSld><p:spTree><p:sp><p:txBody><a:p><a:r><a:t>{}</a:t></a:r></a:p></p:txBody></p:sp></p:spTree></p:cSld></p:sld>",
                    text
                ),
            )
        })
        .collect();
    let borrowed: Vec<(&str, String)> = entries
        .iter()
        .map(|(n, b)| (n.as_str(), b.clone()))
        .collect();
    zip_with(&borrowed)
}

fn minimal_xlsx() -> Vec<u8> {
    zip_with(&[
        (
            "xl/sharedStrings.xml",
            "<?xml version=\"1.0\"?><sst xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><si><t>quarterly revenue</t></si></sst>".to_string(),
        ),
        (
            "xl/worksheets/sheet1.xml",
            "<?xml version=\"1.0\"?><worksheet xmlns=\"http://schemas.openxmlformats.org/spreadsheetml/2006/main\"><sheetData><row r=\"1\"><c r=\"A1\" t=\"s\"><v>0</v></c><c r=\"B1\"><v>4200</v></c></row></sheetData></worksheet>".to_string(),
        ),
    ])
}

fn request(bytes: Vec<u8>, content_type: Option<&str>, file_name: &str) -> IngestRequest {
    IngestRequest {
        bytes,
        content_type: content_type.map(str::to_string),
        file_name: Some(file_name.to_string()),
        chunk_size: 500,
        overlap: 100,
    }
}

fn top_text(store: &InMemoryStore, query: &str) -> String {
    let params = RetrieveParams::new(1, ScoringPolicy::Raw).unwrap();
    let result = retrieve(store, query, &params);
    let hit = result.iter().next().expect("no hits");
    assert!(hit.score > 0.0, "no chunk matched {:?}", query);
    hit.chunk.text.clone()
}

#[test]
fn docx_ingest_and_search() {
    let store = InMemoryStore::new();
    ingest_document(
        &store,
        request(minimal_docx_with_text("office test phrase"), None, "report.docx"),
        LIMIT,
    )
    .unwrap();
    ingest_document(&store, request(b"unrelated".to_vec(), None, "x.txt"), LIMIT).unwrap();

    assert!(top_text(&store, "office phrase").contains("office test phrase"));
}

#[test]
fn pptx_slides_in_order() {
    let store = InMemoryStore::new();
    let report = ingest_document(
        &store,
        request(
            minimal_pptx_with_slides(&["first slide", "second slide", "third slide"]),
            None,
            "deck.pptx",
        ),
        LIMIT,
    )
    .unwrap();
    assert_eq!(report.chunks, 1);

    let text = top_text(&store, "slide");
    let first = text.find("first").unwrap();
    let second = text.find("second").unwrap();
    let third = text.find("third").unwrap();
    assert!(first < second && second < third, "got: {}", text);
}

#[test]
fn xlsx_shared_strings_and_values() {
    let store = InMemoryStore::new();
    ingest_document(&store, request(minimal_xlsx(), None, "numbers.xlsx"), LIMIT).unwrap();
    let text = top_text(&store, "revenue");
    assert!(text.contains("quarterly revenue"));
    assert!(text.contains("4200"));
}

#[test]
fn latin1_text_is_decoded() {
    let store = InMemoryStore::new();
    // "café crème" in Latin-1
    let bytes = vec![b'c', b'a', b'f', 0xE9, b' ', b'c', b'r', 0xE8, b'm', b'e'];
    ingest_document(&store, request(bytes, Some("text/plain"), "menu.txt"), LIMIT).unwrap();
    assert_eq!(top_text(&store, "café"), "café crème");
}

#[test]
fn declared_type_is_recorded() {
    let store = InMemoryStore::new();
    let report = ingest_document(
        &store,
        request(b"# Title\n\nbody".to_vec(), Some("text/markdown"), "readme.md"),
        LIMIT,
    )
    .unwrap();
    let doc = store.document(&report.document_id).unwrap();
    assert_eq!(doc.content_type, "text/markdown");
    assert_eq!(doc.name, "readme.md");
}

#[test]
fn pdf_never_panics_and_is_all_or_nothing() {
    let store = InMemoryStore::new();
    let outcome = ingest_document(
        &store,
        request(minimal_pdf_with_phrase(), Some("application/pdf"), "spec.pdf"),
        LIMIT,
    );
    match outcome {
        Ok(report) => assert_eq!(store.size(), report.chunks),
        Err(err) => {
            assert_eq!(err.code(), "corrupt_file");
            assert_eq!(store.document_count(), 0);
        }
    }
}

#[test]
fn truncated_office_file_is_corrupt() {
    let store = InMemoryStore::new();
    let mut bytes = minimal_docx_with_text("never stored");
    bytes.truncate(bytes.len() / 2);
    let err = ingest_document(&store, request(bytes, None, "broken.docx"), LIMIT).unwrap_err();
    assert!(matches!(err, RagError::Extraction(_)));
    assert_eq!(err.code(), "corrupt_file");
    assert_eq!(store.document_count(), 0);
}

#[test]
fn max_size_is_enforced() {
    let store = InMemoryStore::new();
    let err = ingest_document(
        &store,
        request(vec![b'a'; 101], Some("text/plain"), "big.txt"),
        100,
    )
    .unwrap_err();
    assert_eq!(err.code(), "payload_too_large");
    assert_eq!(store.document_count(), 0);
}
