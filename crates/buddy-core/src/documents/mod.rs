// ABOUTME: Document store: uploaded files as extracted text plus per-chat focus selections
// ABOUTME: Ingestion runs extractors on blocking tasks; resolve_context feeds prompt assembly

pub mod extract;

pub use extract::{DocumentKind, Extraction, Extractor};

use crate::error::{BuddyError, Result};
use crate::models::{ContextBlock, Document};
use std::collections::HashMap;
use std::sync::Arc;

/// Separator placed between serialized document blocks
pub const CONTEXT_SEPARATOR: &str = "\n---\n";

/// Converts uploads into `Document`s. Cheap to clone; holds no store state,
/// so callers can extract without locking the store.
#[derive(Clone)]
pub struct Ingestor {
    extractors: HashMap<DocumentKind, Arc<dyn Extractor>>,
    max_document_chars: usize,
}

impl Ingestor {
    /// Ingestor with the built-in extractors
    pub fn new(max_document_chars: usize) -> Self {
        let mut extractors: HashMap<DocumentKind, Arc<dyn Extractor>> = HashMap::new();
        extractors.insert(DocumentKind::Text, Arc::new(extract::TextExtractor));
        extractors.insert(DocumentKind::Pdf, Arc::new(extract::PdfExtractor));
        extractors.insert(DocumentKind::Docx, Arc::new(extract::DocxExtractor));
        extractors.insert(DocumentKind::Spreadsheet, Arc::new(extract::XlsxExtractor));
        Self {
            extractors,
            max_document_chars,
        }
    }

    /// Replace the extractor for one kind
    pub fn register(&mut self, kind: DocumentKind, extractor: Arc<dyn Extractor>) {
        self.extractors.insert(kind, extractor);
    }

    /// Extract one upload into a new `Document`
    pub async fn ingest(&self, name: &str, bytes: Vec<u8>) -> Result<Document> {
        let extension = extract::extension_of(name);
        let kind = match extension.as_deref().and_then(DocumentKind::from_extension) {
            Some(kind) => kind,
            None if std::str::from_utf8(&bytes).is_ok() => DocumentKind::Text,
            None => {
                return Err(BuddyError::UnsupportedFormat(
                    extension.unwrap_or_else(|| name.to_string()),
                ))
            }
        };
        let extractor = self
            .extractors
            .get(&kind)
            .cloned()
            .ok_or_else(|| BuddyError::UnsupportedFormat(format!("{:?}", kind)))?;

        let byte_len = bytes.len();
        let owned_name = name.to_string();
        let extraction = tokio::task::spawn_blocking(move || extractor.extract(&owned_name, &bytes))
            .await
            .map_err(|e| BuddyError::extraction(name, format!("extractor task failed: {}", e)))??;

        let content = truncate_chars(&extraction.text, self.max_document_chars);
        let mut document = Document::new(
            name.to_string(),
            content,
            byte_len,
            extension.unwrap_or_else(|| "file".to_string()),
        );
        document.pages = extraction.pages;
        tracing::debug!(
            document = %document.name,
            kind = ?kind,
            chars = document.content.chars().count(),
            "Extracted document"
        );
        Ok(document)
    }

    /// Extract several uploads. A failing file does not stop the others.
    pub async fn ingest_batch(&self, files: Vec<(String, Vec<u8>)>) -> BatchResult {
        let mut result = BatchResult::default();
        for (name, bytes) in files {
            match self.ingest(&name, bytes).await {
                Ok(document) => result.documents.push(document),
                Err(e) => {
                    tracing::warn!(document = %name, error = %e, "Skipping upload");
                    result.failures.push((name, e));
                }
            }
        }
        result
    }
}

/// Outcome of a multi-file upload
#[derive(Debug, Default)]
pub struct BatchResult {
    pub documents: Vec<Document>,
    pub failures: Vec<(String, BuddyError)>,
}

/// Uploaded documents and the focus selection of each chat
pub struct DocumentStore {
    documents: Vec<Document>,
    focus: HashMap<String, Vec<String>>,
    ingestor: Ingestor,
    max_context_documents: Option<usize>,
}

impl DocumentStore {
    pub fn new(max_document_chars: usize, max_context_documents: Option<usize>) -> Self {
        Self::with_ingestor(Ingestor::new(max_document_chars), max_context_documents)
    }

    pub fn with_ingestor(ingestor: Ingestor, max_context_documents: Option<usize>) -> Self {
        Self {
            documents: Vec::new(),
            focus: HashMap::new(),
            ingestor,
            max_context_documents,
        }
    }

    /// A clone of the ingestor, for extraction outside a store lock
    pub fn ingestor(&self) -> Ingestor {
        self.ingestor.clone()
    }

    pub fn register_extractor(&mut self, kind: DocumentKind, extractor: Arc<dyn Extractor>) {
        self.ingestor.register(kind, extractor);
    }

    /// Extract and add one upload
    pub async fn ingest(&mut self, name: &str, bytes: Vec<u8>) -> Result<Document> {
        let document = self.ingestor.ingest(name, bytes).await?;
        self.add(document.clone());
        Ok(document)
    }

    /// Extract and add several uploads, in completion order
    pub async fn ingest_batch(&mut self, files: Vec<(String, Vec<u8>)>) -> BatchResult {
        let result = self.ingestor.ingest_batch(files).await;
        for document in &result.documents {
            self.add(document.clone());
        }
        result
    }

    /// Add an already extracted document
    pub fn add(&mut self, document: Document) {
        self.documents.push(document);
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    pub fn document(&self, document_id: &str) -> Option<&Document> {
        self.documents.iter().find(|d| d.id == document_id)
    }

    /// Remove a document and purge it from every selection. Idempotent.
    pub fn remove(&mut self, document_id: &str) -> Option<Document> {
        for selection in self.focus.values_mut() {
            selection.retain(|id| id != document_id);
        }
        let position = self.documents.iter().position(|d| d.id == document_id)?;
        Some(self.documents.remove(position))
    }

    /// Select the document for a chat, or deselect it if already selected.
    /// Returns whether it is selected afterwards.
    pub fn toggle_focus(&mut self, chat_id: &str, document_id: &str) -> Result<bool> {
        self.require(document_id)?;
        let selection = self.focus.entry(chat_id.to_string()).or_default();
        if let Some(position) = selection.iter().position(|id| id == document_id) {
            selection.remove(position);
            Ok(false)
        } else {
            selection.push(document_id.to_string());
            Ok(true)
        }
    }

    /// Replace a chat's selection. Duplicates collapse; unknown ids reject the whole call.
    pub fn set_focus(&mut self, chat_id: &str, document_ids: &[String]) -> Result<()> {
        for id in document_ids {
            self.require(id)?;
        }
        let mut selection: Vec<String> = Vec::with_capacity(document_ids.len());
        for id in document_ids {
            if !selection.contains(id) {
                selection.push(id.clone());
            }
        }
        self.focus.insert(chat_id.to_string(), selection);
        Ok(())
    }

    pub fn selection(&self, chat_id: &str) -> &[String] {
        self.focus.get(chat_id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn clear_focus(&mut self, chat_id: &str) {
        self.focus.remove(chat_id);
    }

    /// Drop the selection of a deleted chat
    pub fn forget_chat(&mut self, chat_id: &str) {
        self.focus.remove(chat_id);
    }

    /// Documents feeding the next prompt of a chat: its selection in
    /// selection order, or every document (capped) when nothing is selected.
    pub fn resolve_context(&self, chat_id: &str) -> Vec<ContextBlock> {
        let selection = self.selection(chat_id);
        if selection.is_empty() {
            let limit = self.max_context_documents.unwrap_or(usize::MAX);
            return self
                .documents
                .iter()
                .take(limit)
                .map(block_of)
                .collect();
        }
        selection
            .iter()
            .filter_map(|id| self.document(id))
            .map(block_of)
            .collect()
    }

    fn require(&self, document_id: &str) -> Result<()> {
        if self.document(document_id).is_some() {
            Ok(())
        } else {
            Err(BuddyError::DocumentNotFound(document_id.to_string()))
        }
    }
}

fn block_of(document: &Document) -> ContextBlock {
    ContextBlock {
        name: document.name.clone(),
        text: document.content.clone(),
    }
}

/// Serialize context blocks for the prompt, each tagged with its file name
pub fn render_context(blocks: &[ContextBlock], max_chars_per_document: usize) -> String {
    blocks
        .iter()
        .map(|b| {
            format!(
                "[FICHEIRO: {}]\n{}",
                b.name,
                truncate_chars(&b.text, max_chars_per_document)
            )
        })
        .collect::<Vec<_>>()
        .join(CONTEXT_SEPARATOR)
}

/// First `max` characters of `text`
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((end, _)) => text[..end].to_string(),
        None => text.to_string(),
    }
}
