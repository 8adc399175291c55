// ABOUTME: Document generation adapter: typed file descriptors in, downloadable blobs out
// ABOUTME: OfficeGenerator writes DOCX/PPTX/XLSX packages and PDFs; BlobStore owns the bytes behind handles

mod docx;
mod pdf;
mod pptx;
mod xlsx;

use crate::error::{BuddyError, Result};
use crate::i18n::Strings;
use crate::models::{BlobHandle, Chat, FileFormat, GeneratedFile, Role};
use crate::tools::FileDescriptor;
use std::collections::HashMap;
use std::io::{Cursor, Write};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Accent color used for titles and assistant headings
pub(crate) const BRAND_COLOR: &str = "CA0607";

/// Base name used when a requested name sanitizes to nothing
pub const DEFAULT_BASE_NAME: &str = "opco_buddy";

/// Bytes of a generated file before it is registered in a `BlobStore`
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratedBlob {
    pub file_name: String,
    pub format: FileFormat,
    pub bytes: Vec<u8>,
}

/// Turns a validated file descriptor into a file
pub trait DocumentGenerator: Send + Sync {
    fn generate(&self, descriptor: &FileDescriptor) -> Result<GeneratedBlob>;

    /// Whole-chat transcript as a DOCX
    fn transcript(&self, chat: &Chat, strings: &Strings) -> Result<GeneratedBlob>;
}

/// Built-in generator for every document format
#[derive(Debug, Default, Clone, Copy)]
pub struct OfficeGenerator;

impl DocumentGenerator for OfficeGenerator {
    fn generate(&self, descriptor: &FileDescriptor) -> Result<GeneratedBlob> {
        let format = descriptor.format;
        let bytes = match format {
            FileFormat::Docx => docx::build(&docx::blocks_for(descriptor))?,
            FileFormat::Pptx => pptx::build(descriptor)?,
            FileFormat::Xlsx => xlsx::build(&xlsx::rows_for(descriptor))?,
            FileFormat::Pdf => pdf::build(descriptor),
            FileFormat::Image => {
                return Err(BuddyError::ToolExecution(
                    "images come from the image model, not the document generator".to_string(),
                ))
            }
        };
        Ok(GeneratedBlob {
            file_name: safe_file_name(&descriptor.file_name, format.extension()),
            format,
            bytes,
        })
    }

    fn transcript(&self, chat: &Chat, strings: &Strings) -> Result<GeneratedBlob> {
        let mut blocks = Vec::new();
        for message in &chat.messages {
            let (label, color) = match message.role {
                Role::User => (strings.user_label, "666666"),
                Role::Assistant => (strings.assistant_label, BRAND_COLOR),
            };
            let stamp = message
                .timestamp
                .with_timezone(&chrono::Local)
                .format("%Y-%m-%d %H:%M:%S");
            blocks.push(docx::Block::Run {
                text: format!("{} ({})", label, stamp),
                bold: true,
                color: Some(color),
            });
            for line in message.content.split('\n') {
                blocks.push(docx::Block::Paragraph(line.to_string()));
            }
            blocks.push(docx::Block::Rule);
        }
        Ok(GeneratedBlob {
            file_name: transcript_file_name(&chat.title),
            format: FileFormat::Docx,
            bytes: docx::build(&blocks)?,
        })
    }
}

/// `opco_buddy_chat_<title>.docx` with whitespace runs turned into underscores
pub fn transcript_file_name(title: &str) -> String {
    let base: String = title
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .chars()
        .map(|c| if c == '/' || c == '\\' { '_' } else { c })
        .collect();
    safe_file_name(&format!("opco_buddy_chat_{}", base), "docx")
}

/// Strip any directory part and a trailing `.ext` (any case), replace
/// characters file systems reject, then append `.ext`.
pub fn safe_file_name(name: &str, ext: &str) -> String {
    let file = name.rsplit(['/', '\\']).next().unwrap_or(name).trim();
    let suffix = format!(".{}", ext.to_lowercase());
    let base = if file.to_lowercase().ends_with(&suffix) {
        // Lowercasing can change byte lengths, so cut by characters
        let keep = file.chars().count() - suffix.chars().count();
        file.chars().take(keep).collect::<String>()
    } else {
        file.to_string()
    };
    let cleaned: String = base
        .trim()
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    let base = if cleaned.is_empty() {
        DEFAULT_BASE_NAME
    } else {
        cleaned
    };
    format!("{}.{}", base, ext)
}

/// A file held for download
#[derive(Debug, Clone, PartialEq)]
pub struct StoredBlob {
    pub name: String,
    pub format: FileFormat,
    pub bytes: Vec<u8>,
}

/// Generated file bytes addressed by handle. Handles are released
/// explicitly when their chat is deleted or the session shuts down.
#[derive(Default)]
pub struct BlobStore {
    blobs: Mutex<HashMap<BlobHandle, StoredBlob>>,
}

impl BlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<BlobHandle, StoredBlob>> {
        self.blobs.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register bytes and return the artifact that refers to them
    pub fn insert(&self, blob: GeneratedBlob) -> GeneratedFile {
        let handle = BlobHandle::new();
        let file = GeneratedFile {
            name: blob.file_name.clone(),
            handle,
            format: blob.format,
        };
        self.lock().insert(
            handle,
            StoredBlob {
                name: blob.file_name,
                format: blob.format,
                bytes: blob.bytes,
            },
        );
        file
    }

    /// Bytes behind a handle; None once released (or after a restart)
    pub fn get(&self, handle: &BlobHandle) -> Option<StoredBlob> {
        self.lock().get(handle).cloned()
    }

    /// Release handles; returns how many were live
    pub fn release(&self, handles: &[BlobHandle]) -> usize {
        let mut blobs = self.lock();
        handles.iter().filter(|h| blobs.remove(*h).is_some()).count()
    }

    /// Release everything
    pub fn clear(&self) -> usize {
        let mut blobs = self.lock();
        let count = blobs.len();
        blobs.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Escape text for XML element content and attributes, dropping
/// characters XML 1.0 cannot carry
pub(crate) fn xml_escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\t' | '\n' | '\r' => out.push(c),
            c if (c as u32) < 0x20 => {}
            '\u{FFFE}' | '\u{FFFF}' => {}
            c => out.push(c),
        }
    }
    out
}

/// Zip a set of package parts, in order
pub(crate) fn zip_package(parts: &[(String, String)]) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    {
        let mut zip = zip::ZipWriter::new(&mut buffer);
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated);
        for (path, content) in parts {
            zip.start_file(path.as_str(), options)?;
            zip.write_all(content.as_bytes())?;
        }
        zip.finish()?;
    }
    Ok(buffer.into_inner())
}

pub(crate) const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::documents::extract::{read_xlsx_sheets, DocxExtractor, Extractor, PdfExtractor};
    use crate::i18n::Language;
    use crate::models::Message;
    use crate::tools::{Section, Slide};

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("report", "docx"), "report.docx");
        assert_eq!(safe_file_name("report.DOCX", "docx"), "report.docx");
        assert_eq!(safe_file_name("report.docx.docx", "docx"), "report.docx.docx");
        assert_eq!(safe_file_name("../../etc/passwd", "pdf"), "passwd.pdf");
        assert_eq!(safe_file_name("a:b?", "xlsx"), "a_b_.xlsx");
        assert_eq!(safe_file_name("", "pptx"), "opco_buddy.pptx");
        assert_eq!(safe_file_name(".pdf", "pdf"), "opco_buddy.pdf");
        assert_eq!(safe_file_name("Relatório final", "pdf"), "Relatório final.pdf");
    }

    #[test]
    fn test_transcript_file_name() {
        assert_eq!(
            transcript_file_name("NOVA  PESQUISA de\tteste"),
            "opco_buddy_chat_NOVA_PESQUISA_de_teste.docx"
        );
        assert_eq!(transcript_file_name("a/b"), "opco_buddy_chat_a_b.docx");
    }

    #[test]
    fn test_xml_escape() {
        assert_eq!(xml_escape("a<b>&\"c'\u{1}"), "a&lt;b&gt;&amp;&quot;c&apos;");
    }

    #[test]
    fn test_blob_store_lifecycle() {
        let store = BlobStore::new();
        let file = store.insert(GeneratedBlob {
            file_name: "a.pdf".into(),
            format: FileFormat::Pdf,
            bytes: vec![1, 2, 3],
        });
        assert_eq!(file.name, "a.pdf");
        assert_eq!(store.get(&file.handle).unwrap().bytes, vec![1, 2, 3]);
        assert_eq!(store.len(), 1);

        assert_eq!(store.release(&[file.handle, BlobHandle::new()]), 1);
        assert!(store.get(&file.handle).is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_blob_store_survives_poisoned_lock() {
        let store = BlobStore::new();
        std::thread::scope(|s| {
            let _ = s
                .spawn(|| {
                    let _guard = store.blobs.lock().unwrap();
                    panic!("poison");
                })
                .join();
        });
        assert!(store.blobs.is_poisoned());

        let file = store.insert(GeneratedBlob {
            file_name: "a.docx".into(),
            format: FileFormat::Docx,
            bytes: vec![7],
        });
        assert_eq!(store.get(&file.handle).unwrap().bytes, vec![7]);
        assert_eq!(store.clear(), 1);
    }

    #[test]
    fn test_xlsx_round_trips_table() {
        let mut descriptor = FileDescriptor::new(FileFormat::Xlsx, "data.xlsx", "Data");
        descriptor.table_rows = vec![
            vec!["a".into(), "b".into()],
            vec!["1".into(), "2".into()],
        ];
        let blob = OfficeGenerator.generate(&descriptor).unwrap();
        assert_eq!(blob.file_name, "data.xlsx");
        assert_eq!(blob.format, FileFormat::Xlsx);
        let sheets = read_xlsx_sheets(&blob.bytes).unwrap();
        assert_eq!(sheets, vec![vec![vec!["a", "b"], vec!["1", "2"]]]);
    }

    #[test]
    fn test_xlsx_without_table_has_no_data_cell() {
        let descriptor = FileDescriptor::new(FileFormat::Xlsx, "empty", "Empty");
        let blob = OfficeGenerator.generate(&descriptor).unwrap();
        let sheets = read_xlsx_sheets(&blob.bytes).unwrap();
        assert_eq!(sheets, vec![vec![vec!["No Data"]]]);
    }

    #[test]
    fn test_docx_contains_title_sections_and_body() {
        let mut descriptor = FileDescriptor::new(FileFormat::Docx, "brief", "Briefing & Plan");
        descriptor.body_text = Some("line one\nline two".into());
        descriptor.sections = vec![Section {
            heading: "Risks".into(),
            body: "Few".into(),
        }];
        let blob = OfficeGenerator.generate(&descriptor).unwrap();
        assert_eq!(blob.file_name, "brief.docx");
        let text = DocxExtractor.extract("brief.docx", &blob.bytes).unwrap().text;
        assert!(text.starts_with("Briefing & Plan\n"));
        assert!(text.contains("line one\nline two"));
        assert!(text.contains("Risks\nFew"));
    }

    #[test]
    fn test_pptx_has_cover_plus_one_slide_per_entry() {
        let mut descriptor = FileDescriptor::new(FileFormat::Pptx, "deck.pptx", "Strategy");
        descriptor.slides = vec![
            Slide {
                title: "One".into(),
                bullets: vec!["a".into()],
                footer: None,
            },
            Slide {
                title: "Two".into(),
                bullets: vec![],
                footer: Some("page".into()),
            },
        ];
        let blob = OfficeGenerator.generate(&descriptor).unwrap();
        let mut archive = zip::ZipArchive::new(Cursor::new(blob.bytes)).unwrap();
        let slides = archive
            .file_names()
            .filter(|n| n.starts_with("ppt/slides/slide") && n.ends_with(".xml"))
            .count();
        assert_eq!(slides, 3);
        let mut cover = String::new();
        std::io::Read::read_to_string(
            &mut archive.by_name("ppt/slides/slide1.xml").unwrap(),
            &mut cover,
        )
        .unwrap();
        assert!(cover.contains("Strategy"));
    }

    #[test]
    fn test_pdf_text_is_extractable() {
        let mut descriptor = FileDescriptor::new(FileFormat::Pdf, "summary", "Resumo (2024)");
        descriptor.body_text = Some("Olá mundo".into());
        let blob = OfficeGenerator.generate(&descriptor).unwrap();
        assert_eq!(blob.file_name, "summary.pdf");
        let text = PdfExtractor.extract("summary.pdf", &blob.bytes).unwrap().text;
        assert_eq!(text, "Resumo (2024)\nOlá mundo");
    }

    #[test]
    fn test_image_format_is_rejected() {
        let descriptor = FileDescriptor::new(FileFormat::Image, "x", "x");
        assert!(matches!(
            OfficeGenerator.generate(&descriptor),
            Err(BuddyError::ToolExecution(_))
        ));
    }

    #[test]
    fn test_transcript_lists_every_message() {
        let strings = Language::Portuguese.strings();
        let mut chat = Chat::new(strings);
        chat.title = "Plano anual".into();
        chat.messages.push(Message::user("Pergunta".into()));
        chat.messages.push(Message::assistant("Resposta\nsegunda linha".into()));

        let blob = OfficeGenerator.transcript(&chat, strings).unwrap();
        assert_eq!(blob.file_name, "opco_buddy_chat_Plano_anual.docx");
        let text = DocxExtractor.extract("t.docx", &blob.bytes).unwrap().text;
        assert_eq!(text.matches("UTILIZADOR (").count(), 1);
        assert_eq!(text.matches("OPCO BUDDY (").count(), 2);
        assert!(text.contains("Resposta\nsegunda linha"));
    }
}
