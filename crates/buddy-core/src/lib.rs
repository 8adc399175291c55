// ABOUTME: Core library for opco-buddy - chats, documents, turn lifecycle, backend, file generation
// ABOUTME: Embedded by hosts that render the session; no process-wide state

pub mod backend;
pub mod chats;
pub mod config;
pub mod documents;
pub mod error;
pub mod generate;
pub mod i18n;
pub mod models;
pub mod persist;
pub mod session;
pub mod tools;

pub use backend::{Backend, BackendEvent, GeminiBackend, GeminiConfig};
pub use chats::ChatStore;
pub use config::{Config, SearchMode};
pub use documents::{DocumentStore, Extractor, Ingestor};
pub use error::{BuddyError, Result};
pub use generate::{BlobStore, DocumentGenerator, OfficeGenerator};
pub use i18n::Language;
pub use models::{Chat, Document, GeneratedFile, Message, Role};
pub use persist::{FileStore, KeyValueStore, MemoryStore};
pub use session::{Buddy, IgnoreReason, SendRequest, SessionObserver, TurnOutcome, TurnPhase};
pub use tools::{FileDescriptor, ToolCall};
