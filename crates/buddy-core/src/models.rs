// ABOUTME: Data models for buddy-core
// ABOUTME: Chat, Message, Document, artifacts, charts and citations with their serde shape

use crate::i18n::Strings;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Maximum characters kept in a reply-to snippet
pub const REPLY_SNIPPET_CHARS: usize = 100;

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

/// Who authored a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// An image attached by the user or returned by the image model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineImage {
    pub mime_type: String,
    /// Base64 payload
    pub data: String,
}

/// Soft reference to an earlier message in the same chat
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRef {
    pub message_id: String,
    pub snippet: String,
    pub role: Role,
}

impl ReplyRef {
    pub fn to_message(message: &Message) -> Self {
        Self {
            message_id: message.id.clone(),
            snippet: message.content.chars().take(REPLY_SNIPPET_CHARS).collect(),
            role: message.role,
        }
    }
}

/// Output format of a generated artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Pdf,
    Docx,
    Pptx,
    Xlsx,
    Image,
}

impl FileFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            FileFormat::Pdf => "pdf",
            FileFormat::Docx => "docx",
            FileFormat::Pptx => "pptx",
            FileFormat::Xlsx => "xlsx",
            FileFormat::Image => "png",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            FileFormat::Pdf => "application/pdf",
            FileFormat::Docx => {
                "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
            }
            FileFormat::Pptx => {
                "application/vnd.openxmlformats-officedocument.presentationml.presentation"
            }
            FileFormat::Xlsx => "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            FileFormat::Image => "image/png",
        }
    }

    /// Parse a document format tag. Images are never requested by tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().trim_start_matches('.').to_lowercase().as_str() {
            "pdf" => Some(FileFormat::Pdf),
            "docx" | "doc" | "word" => Some(FileFormat::Docx),
            "pptx" | "ppt" | "powerpoint" => Some(FileFormat::Pptx),
            "xlsx" | "xls" | "excel" => Some(FileFormat::Xlsx),
            _ => None,
        }
    }
}

/// Opaque reference to generated bytes held in a `BlobStore`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobHandle(pub Uuid);

impl BlobHandle {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BlobHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for BlobHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "blob:{}", self.0)
    }
}

/// A downloadable file attached to an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedFile {
    pub name: String,
    pub handle: BlobHandle,
    pub format: FileFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Pie,
}

impl ChartKind {
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.trim().to_lowercase().as_str() {
            "bar" | "column" => Some(ChartKind::Bar),
            "line" | "area" => Some(ChartKind::Line),
            "pie" | "donut" | "doughnut" => Some(ChartKind::Pie),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub label: String,
    pub value: f64,
}

/// Chart the presentation layer renders next to a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartDescriptor {
    pub kind: ChartKind,
    pub title: String,
    pub points: Vec<ChartPoint>,
}

/// Web citation returned alongside a search-grounded answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroundingSource {
    pub title: String,
    pub uri: String,
}

/// A chat message (user or assistant)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context_files: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<InlineImage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<ReplyRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub generated_files: Vec<GeneratedFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart: Option<ChartDescriptor>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sources: Vec<GroundingSource>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl Message {
    fn with_role(role: Role, content: String) -> Self {
        Self {
            id: new_id(),
            role,
            content,
            timestamp: Utc::now(),
            context_files: Vec::new(),
            image: None,
            reply_to: None,
            generated_files: Vec::new(),
            chart: None,
            sources: Vec::new(),
            is_error: false,
        }
    }

    pub fn user(content: String) -> Self {
        Self::with_role(Role::User, content)
    }

    pub fn assistant(content: String) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Synthetic greeting every new chat starts with
    pub fn welcome(strings: &Strings) -> Self {
        Self::assistant(strings.welcome.to_string())
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }

    /// Apply a partial update in place
    pub fn apply(&mut self, patch: MessagePatch) {
        if let Some(content) = patch.content {
            self.content = content;
        }
        if let Some(delta) = patch.append {
            self.content.push_str(&delta);
        }
        self.generated_files.extend(patch.push_files);
        if let Some(chart) = patch.chart {
            self.chart = Some(chart);
        }
        if let Some(sources) = patch.sources {
            self.sources = sources;
        }
        if let Some(is_error) = patch.is_error {
            self.is_error = is_error;
        }
    }
}

/// Partial update of a message's mutable fields. Id, role and timestamp never change.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessagePatch {
    /// Replace the content
    pub content: Option<String>,
    /// Append to the content (applied after `content`)
    pub append: Option<String>,
    pub push_files: Vec<GeneratedFile>,
    pub chart: Option<ChartDescriptor>,
    pub sources: Option<Vec<GroundingSource>>,
    pub is_error: Option<bool>,
}

impl MessagePatch {
    pub fn append(delta: impl Into<String>) -> Self {
        Self {
            append: Some(delta.into()),
            ..Default::default()
        }
    }

    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Default::default()
        }
    }

    pub fn file(file: GeneratedFile) -> Self {
        Self {
            push_files: vec![file],
            ..Default::default()
        }
    }

    pub fn chart(chart: ChartDescriptor) -> Self {
        Self {
            chart: Some(chart),
            ..Default::default()
        }
    }

    pub fn error(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            is_error: Some(true),
            ..Default::default()
        }
    }
}

/// A chat session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub title: String,
    pub messages: Vec<Message>,
    pub created_at: DateTime<Utc>,
}

impl Chat {
    pub fn new(strings: &Strings) -> Self {
        Self {
            id: new_id(),
            title: strings.new_chat.to_string(),
            messages: vec![Message::welcome(strings)],
            created_at: Utc::now(),
        }
    }

    pub fn message(&self, message_id: &str) -> Option<&Message> {
        self.messages.iter().find(|m| m.id == message_id)
    }

    pub fn message_mut(&mut self, message_id: &str) -> Option<&mut Message> {
        self.messages.iter_mut().find(|m| m.id == message_id)
    }

    /// Every blob handle referenced by this chat's messages
    pub fn blob_handles(&self) -> Vec<BlobHandle> {
        self.messages
            .iter()
            .flat_map(|m| m.generated_files.iter().map(|f| f.handle))
            .collect()
    }

    /// True if the user has not written anything yet
    pub fn is_pristine(&self) -> bool {
        self.messages.len() == 1 && self.messages[0].role == Role::Assistant
    }
}

/// A rendered page of a visual document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageImage {
    pub page: u32,
    pub mime_type: String,
    pub data: String,
}

/// An uploaded source document after text extraction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: String,
    pub name: String,
    pub content: String,
    /// Human readable size of the uploaded bytes, e.g. "12.4KB"
    pub size: String,
    /// Detected extension, lowercase ("file" when none)
    pub kind: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pages: Vec<PageImage>,
    pub created_at: DateTime<Utc>,
}

impl Document {
    pub fn new(name: String, content: String, byte_len: usize, kind: String) -> Self {
        Self {
            id: new_id(),
            name,
            content,
            size: size_label(byte_len),
            kind,
            pages: Vec::new(),
            created_at: Utc::now(),
        }
    }
}

/// One document's contribution to a prompt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContextBlock {
    pub name: String,
    pub text: String,
}

/// Size label with one decimal of kilobytes: 10 bytes -> "0.0KB"
pub fn size_label(bytes: usize) -> String {
    format!("{:.1}KB", bytes as f64 / 1024.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Language;

    #[test]
    fn test_message_user() {
        let msg = Message::user("Hello".to_string());
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.is_user());
        assert!(!msg.is_error);
        assert!(!msg.id.is_empty());
    }

    #[test]
    fn test_message_ids_unique() {
        let a = Message::assistant(String::new());
        let b = Message::assistant(String::new());
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_apply_patch_keeps_identity() {
        let mut msg = Message::assistant(String::new());
        let id = msg.id.clone();
        let ts = msg.timestamp;

        msg.apply(MessagePatch::append("Hel"));
        msg.apply(MessagePatch::append("lo"));
        assert_eq!(msg.content, "Hello");

        msg.apply(MessagePatch::error("boom"));
        assert_eq!(msg.content, "boom");
        assert!(msg.is_error);
        assert_eq!(msg.id, id);
        assert_eq!(msg.role, Role::Assistant);
        assert_eq!(msg.timestamp, ts);
    }

    #[test]
    fn test_apply_patch_appends_files_in_order() {
        let mut msg = Message::assistant(String::new());
        let first = GeneratedFile {
            name: "a.pdf".into(),
            handle: BlobHandle::new(),
            format: FileFormat::Pdf,
        };
        let second = GeneratedFile {
            name: "b.xlsx".into(),
            handle: BlobHandle::new(),
            format: FileFormat::Xlsx,
        };
        msg.apply(MessagePatch::file(first.clone()));
        msg.apply(MessagePatch::file(second.clone()));
        assert_eq!(msg.generated_files, vec![first, second]);
    }

    #[test]
    fn test_new_chat_has_welcome() {
        let strings = Language::English.strings();
        let chat = Chat::new(strings);
        assert_eq!(chat.title, "NEW SEARCH");
        assert_eq!(chat.messages.len(), 1);
        assert_eq!(chat.messages[0].role, Role::Assistant);
        assert_eq!(chat.messages[0].content, strings.welcome);
        assert!(chat.is_pristine());
    }

    #[test]
    fn test_size_label() {
        assert_eq!(size_label(10), "0.0KB");
        assert_eq!(size_label(1024), "1.0KB");
        assert_eq!(size_label(1536), "1.5KB");
        assert_eq!(size_label(0), "0.0KB");
    }

    #[test]
    fn test_reply_ref_snippet_is_bounded() {
        let long = Message::assistant("x".repeat(500));
        let reply = ReplyRef::to_message(&long);
        assert_eq!(reply.snippet.chars().count(), REPLY_SNIPPET_CHARS);
        assert_eq!(reply.message_id, long.id);
        assert_eq!(reply.role, Role::Assistant);
    }

    #[test]
    fn test_format_tags() {
        assert_eq!(FileFormat::from_tag("XLSX"), Some(FileFormat::Xlsx));
        assert_eq!(FileFormat::from_tag(".pptx"), Some(FileFormat::Pptx));
        assert_eq!(FileFormat::from_tag("word"), Some(FileFormat::Docx));
        assert_eq!(FileFormat::from_tag("png"), None);
        assert_eq!(FileFormat::Image.extension(), "png");
    }

    #[test]
    fn test_message_serde_omits_empty_optionals() {
        let msg = Message::user("hi".to_string());
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "user");
        assert!(json.get("contextFiles").is_none());
        assert!(json.get("isError").is_none());
        assert!(json.get("generatedFiles").is_none());
    }
}
