//! PDF discovery, page text extraction, and chunking.
//!
//! Extraction is synchronous (`lopdf` parses whole documents in memory); the pipeline runs it
//! on the blocking pool.

use super::chunking::TextSplitter;
use super::types::{ExtractionError, TextChunk};
use lopdf::Document;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Text of a single PDF page.
#[derive(Debug, Clone)]
pub struct PageText {
    /// Source document.
    pub source: PathBuf,
    /// 1-based page number.
    pub page: u32,
    /// Extracted text, whitespace-normalized per line.
    pub text: String,
}

/// Everything produced by one extraction run.
#[derive(Debug, Clone, Default)]
pub struct Extraction {
    /// Number of PDFs read.
    pub documents: usize,
    /// Number of pages read.
    pub pages: usize,
    /// Chunks in document, page, then position order.
    pub chunks: Vec<TextChunk>,
}

/// List the PDFs directly inside `dir`, sorted by path.
///
/// Only regular files whose extension is `pdf` (any case) are returned; subdirectories are not
/// descended into.
pub fn find_pdfs(dir: &Path) -> Result<Vec<PathBuf>, ExtractionError> {
    let mut pdfs = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|error| {
            let path = error.path().unwrap_or(dir).to_path_buf();
            let source = error
                .into_io_error()
                .unwrap_or_else(|| std::io::Error::other("directory traversal failed"));
            ExtractionError::Io { path, source }
        })?;
        if entry.file_type().is_file() && is_pdf(entry.path()) {
            pdfs.push(entry.into_path());
        }
    }
    pdfs.sort();
    Ok(pdfs)
}

fn is_pdf(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Load a PDF and return the text of each page in page order.
pub fn load_pages(path: &Path) -> Result<Vec<PageText>, ExtractionError> {
    let pdf_error = |source| ExtractionError::Pdf {
        path: path.to_path_buf(),
        source,
    };

    let document = Document::load(path).map_err(|source| match source {
        lopdf::Error::IO(io) => ExtractionError::Io {
            path: path.to_path_buf(),
            source: io,
        },
        other => pdf_error(other),
    })?;

    let mut pages = Vec::new();
    for page_number in document.get_pages().into_keys() {
        let raw = document.extract_text(&[page_number]).map_err(pdf_error)?;
        pages.push(PageText {
            source: path.to_path_buf(),
            page: page_number,
            text: normalize_page_text(&raw),
        });
    }
    Ok(pages)
}

/// Collapse runs of spaces inside lines and drop blank lines produced by text positioning.
fn normalize_page_text(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Load every PDF in `files` and split each page with `splitter`.
pub fn extract_files(
    files: &[PathBuf],
    splitter: &TextSplitter,
) -> Result<Extraction, ExtractionError> {
    let mut extraction = Extraction::default();
    for path in files {
        tracing::info!(path = %path.display(), "Extracting text from PDF");
        let pages = load_pages(path)?;
        extraction.documents += 1;
        extraction.pages += pages.len();
        for page in pages {
            extraction
                .chunks
                .extend(splitter.split(&page.text).into_iter().map(|text| TextChunk {
                    text,
                    source: page.source.clone(),
                    page: page.page,
                }));
        }
    }
    tracing::info!(
        documents = extraction.documents,
        pages = extraction.pages,
        chunks = extraction.chunks.len(),
        "Text extraction completed"
    );
    Ok(extraction)
}

/// Load every PDF directly inside `dir` and split it into chunks.
///
/// Fails with [`ExtractionError::NoDocuments`] when the directory holds no PDFs.
pub fn extract_directory(
    dir: &Path,
    splitter: &TextSplitter,
) -> Result<Extraction, ExtractionError> {
    let files = find_pdfs(dir)?;
    if files.is_empty() {
        return Err(ExtractionError::NoDocuments(dir.to_path_buf()));
    }
    extract_files(&files, splitter)
}
