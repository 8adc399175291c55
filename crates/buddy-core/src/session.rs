// ABOUTME: Request lifecycle controller: one Buddy per application context owning stores, backend and blobs
// ABOUTME: Drives each turn from dispatch through streaming and tool calls to a terminal outcome, with cancellation

use crate::backend::{Backend, BackendEvent, Content, ContentRole, GenerationRequest, Part, ToolSet};
use crate::chats::ChatStore;
use crate::config::{Config, ContextConfig, SearchMode};
use crate::documents::{render_context, BatchResult, DocumentStore};
use crate::error::{BuddyError, Result};
use crate::generate::{BlobStore, DocumentGenerator, GeneratedBlob, OfficeGenerator, StoredBlob};
use crate::i18n::{Language, Strings};
use crate::models::{
    BlobHandle, Chat, Document, FileFormat, GeneratedFile, GroundingSource, InlineImage, Message,
    MessagePatch, ReplyRef, Role,
};
use crate::persist::KeyValueStore;
use crate::tools::{function_declarations, ToolCall};
use base64::Engine;
use futures::StreamExt;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio_util::sync::CancellationToken;

/// Label that introduces the user's words after the document context
const USER_PREFIX: &str = "Utilizador";

/// Where a turn currently is. Terminal states are reported as a `TurnOutcome`
/// and the chat returns to `Idle`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Dispatched,
    Streaming,
    ToolCallPending,
    ToolCallRunning,
}

/// Why a send did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// No text and no image
    EmptyInput,
    /// A turn is already in flight for this chat
    Busy,
}

/// How a turn ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Ignored(IgnoreReason),
    Complete,
    Cancelled,
    /// Carries the underlying request error; the chat shows the localized message
    Failed(String),
}

/// One user submission
#[derive(Debug, Clone, Default)]
pub struct SendRequest {
    /// Target chat; the active chat when `None`
    pub chat_id: Option<String>,
    pub text: String,
    pub image: Option<InlineImage>,
    /// Id of an earlier message in the same chat
    pub reply_to: Option<String>,
}

impl SendRequest {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Callback interface for hosts that render session state
pub trait SessionObserver: Send + Sync {
    fn on_messages_changed(&self, chat_id: &str);
    fn on_phase_changed(&self, chat_id: &str, phase: TurnPhase);
    /// Localized progress line, `None` when the turn goes idle
    fn on_status(&self, chat_id: &str, status: Option<&str>);
}

/// Internal state for an in-flight turn
struct ActiveTurn {
    id: u64,
    cancel: CancellationToken,
    message_id: Option<String>,
    phase: TurnPhase,
}

/// Removes the turn entry when the send future finishes or is dropped
struct TurnSlot<'a> {
    turns: &'a Mutex<HashMap<String, ActiveTurn>>,
    chat_id: String,
    turn_id: u64,
}

impl Drop for TurnSlot<'_> {
    fn drop(&mut self) {
        let mut turns = lock(self.turns);
        if turns.get(&self.chat_id).map(|t| t.id) == Some(self.turn_id) {
            turns.remove(&self.chat_id);
        }
    }
}

fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// The per-application OPCO Buddy context.
///
/// All methods take `&self`; wrap in an `Arc` to cancel from another task
/// while `send` is running. Locks are never held across an await.
pub struct Buddy {
    chats: RwLock<ChatStore>,
    documents: RwLock<DocumentStore>,
    backend: Arc<dyn Backend>,
    generator: Arc<dyn DocumentGenerator>,
    blobs: BlobStore,
    /// Transcript exports, released with their chat
    exports: Mutex<HashMap<String, Vec<BlobHandle>>>,
    turns: Mutex<HashMap<String, ActiveTurn>>,
    next_turn: AtomicU64,
    observer: RwLock<Option<Arc<dyn SessionObserver>>>,
    search_mode: RwLock<SearchMode>,
    context: ContextConfig,
}

impl Buddy {
    /// Restore chats from `storage` and wire the stores to `backend`
    pub fn new(config: &Config, storage: Arc<dyn KeyValueStore>, backend: Arc<dyn Backend>) -> Self {
        let chats = ChatStore::restore(storage, &config.storage.key, config.language);
        let documents = DocumentStore::new(
            config.context.max_document_chars,
            config.context.max_context_documents,
        );
        tracing::info!(
            backend = backend.name(),
            chats = chats.chats().len(),
            "Buddy session ready"
        );
        Self {
            chats: RwLock::new(chats),
            documents: RwLock::new(documents),
            backend,
            generator: Arc::new(OfficeGenerator),
            blobs: BlobStore::new(),
            exports: Mutex::new(HashMap::new()),
            turns: Mutex::new(HashMap::new()),
            next_turn: AtomicU64::new(1),
            observer: RwLock::new(None),
            search_mode: RwLock::new(config.search.mode),
            context: config.context.clone(),
        }
    }

    /// Replace the document generator
    pub fn with_generator(mut self, generator: Arc<dyn DocumentGenerator>) -> Self {
        self.generator = generator;
        self
    }

    /// Replace the document store, e.g. one with extra extractors registered
    pub fn with_documents(self, documents: DocumentStore) -> Self {
        *write(&self.documents) = documents;
        self
    }

    pub fn set_observer(&self, observer: Arc<dyn SessionObserver>) {
        *write(&self.observer) = Some(observer);
    }

    fn observer(&self) -> Option<Arc<dyn SessionObserver>> {
        read(&self.observer).clone()
    }

    fn notify_messages(&self, chat_id: &str) {
        if let Some(cb) = self.observer() {
            cb.on_messages_changed(chat_id);
        }
    }

    fn notify_status(&self, chat_id: &str, status: Option<&str>) {
        if let Some(cb) = self.observer() {
            cb.on_status(chat_id, status);
        }
    }

    // =========================================================================
    // Chats
    // =========================================================================

    pub fn chats(&self) -> Vec<Chat> {
        read(&self.chats).chats().to_vec()
    }

    pub fn chat(&self, chat_id: &str) -> Option<Chat> {
        read(&self.chats).chat(chat_id).cloned()
    }

    pub fn active_chat(&self) -> Chat {
        read(&self.chats).active_chat().clone()
    }

    pub fn active_chat_id(&self) -> String {
        read(&self.chats).active_id().to_string()
    }

    pub fn message(&self, chat_id: &str, message_id: &str) -> Option<Message> {
        read(&self.chats).message(chat_id, message_id).cloned()
    }

    pub fn create_chat(&self) -> Chat {
        let chat = write(&self.chats).create_chat();
        self.notify_messages(&chat.id);
        chat
    }

    pub fn select_chat(&self, chat_id: &str) -> Result<()> {
        write(&self.chats).select_chat(chat_id)
    }

    pub fn rename_chat(&self, chat_id: &str, title: &str) -> Result<()> {
        write(&self.chats).rename_chat(chat_id, title)
    }

    /// Delete a chat, cancelling its turn and releasing its artifacts and focus selection
    pub fn delete_chat(&self, chat_id: &str) -> Result<()> {
        self.cancel_chat(chat_id);
        let removed = write(&self.chats).delete_chat(chat_id)?;
        let mut handles = removed.blob_handles();
        handles.extend(lock(&self.exports).remove(chat_id).unwrap_or_default());
        let released = self.blobs.release(&handles);
        write(&self.documents).forget_chat(chat_id);
        tracing::debug!(chat_id = %chat_id, released, "Released chat artifacts");
        Ok(())
    }

    pub fn language(&self) -> Language {
        read(&self.chats).language()
    }

    fn strings(&self) -> &'static Strings {
        self.language().strings()
    }

    /// Switch language and re-localize chats nobody has written in yet
    pub fn set_language(&self, language: Language) {
        write(&self.chats).set_language(language);
        tracing::debug!(language = language.code(), "Language changed");
    }

    pub fn search_mode(&self) -> SearchMode {
        *read(&self.search_mode)
    }

    pub fn set_search_mode(&self, mode: SearchMode) {
        *write(&self.search_mode) = mode;
    }

    // =========================================================================
    // Documents
    // =========================================================================

    /// Extract and add one file
    pub async fn upload(&self, name: &str, bytes: Vec<u8>) -> Result<Document> {
        let ingestor = read(&self.documents).ingestor();
        let document = ingestor.ingest(name, bytes).await?;
        write(&self.documents).add(document.clone());
        Ok(document)
    }

    /// Extract several files; failures are reported per file
    pub async fn upload_batch(&self, files: Vec<(String, Vec<u8>)>) -> BatchResult {
        let ingestor = read(&self.documents).ingestor();
        let result = ingestor.ingest_batch(files).await;
        let mut documents = write(&self.documents);
        for document in &result.documents {
            documents.add(document.clone());
        }
        result
    }

    pub fn documents(&self) -> Vec<Document> {
        read(&self.documents).documents().to_vec()
    }

    /// Idempotent; the id leaves every selection
    pub fn remove_document(&self, document_id: &str) -> Option<Document> {
        write(&self.documents).remove(document_id)
    }

    pub fn toggle_focus(&self, chat_id: &str, document_id: &str) -> Result<bool> {
        write(&self.documents).toggle_focus(chat_id, document_id)
    }

    pub fn set_focus(&self, chat_id: &str, document_ids: &[String]) -> Result<()> {
        write(&self.documents).set_focus(chat_id, document_ids)
    }

    pub fn focus(&self, chat_id: &str) -> Vec<String> {
        read(&self.documents).selection(chat_id).to_vec()
    }

    // =========================================================================
    // Artifacts
    // =========================================================================

    pub fn blob(&self, handle: &BlobHandle) -> Option<StoredBlob> {
        self.blobs.get(handle)
    }

    /// Artifacts currently held in memory
    pub fn live_blobs(&self) -> usize {
        self.blobs.len()
    }

    /// Render a chat as a DOCX transcript
    pub async fn export_chat(&self, chat_id: &str) -> Result<GeneratedFile> {
        let chat = self
            .chat(chat_id)
            .ok_or_else(|| BuddyError::ChatNotFound(chat_id.to_string()))?;
        let strings = self.strings();
        let generator = self.generator.clone();
        let blob = tokio::task::spawn_blocking(move || generator.transcript(&chat, strings))
            .await
            .map_err(|e| BuddyError::ToolExecution(e.to_string()))??;
        let file = self.blobs.insert(blob);
        {
            // Chat list before exports, the order delete_chat takes them in
            let chats = read(&self.chats);
            let mut exports = lock(&self.exports);
            if chats.chat(chat_id).is_none() {
                self.blobs.release(&[file.handle]);
                return Err(BuddyError::ChatNotFound(chat_id.to_string()));
            }
            exports.entry(chat_id.to_string()).or_default().push(file.handle);
        }
        tracing::debug!(chat_id = %chat_id, file = %file.name, "Exported chat transcript");
        Ok(file)
    }

    /// Cancel every turn and release every artifact
    pub fn shutdown(&self) {
        for turn in lock(&self.turns).values() {
            turn.cancel.cancel();
        }
        lock(&self.exports).clear();
        let released = self.blobs.clear();
        read(&self.chats).save();
        tracing::info!(released, "Buddy session shut down");
    }

    // =========================================================================
    // Turn lifecycle
    // =========================================================================

    /// Current phase of a chat's turn
    pub fn phase(&self, chat_id: &str) -> TurnPhase {
        lock(&self.turns)
            .get(chat_id)
            .map(|t| t.phase)
            .unwrap_or(TurnPhase::Idle)
    }

    /// Id of the assistant placeholder the running turn is filling
    pub fn pending_message(&self, chat_id: &str) -> Option<String> {
        lock(&self.turns)
            .get(chat_id)
            .and_then(|t| t.message_id.clone())
    }

    pub fn is_busy(&self, chat_id: &str) -> bool {
        lock(&self.turns).contains_key(chat_id)
    }

    /// Cancel the active chat's turn; returns whether a turn was in flight
    pub fn cancel(&self) -> bool {
        let chat_id = self.active_chat_id();
        self.cancel_chat(&chat_id)
    }

    pub fn cancel_chat(&self, chat_id: &str) -> bool {
        let turns = lock(&self.turns);
        match turns.get(chat_id) {
            Some(turn) => {
                tracing::debug!(chat_id = %chat_id, turn = turn.id, "Cancelling turn");
                turn.cancel.cancel();
                true
            }
            None => false,
        }
    }

    fn set_phase(&self, chat_id: &str, turn_id: u64, phase: TurnPhase) {
        {
            let mut turns = lock(&self.turns);
            match turns.get_mut(chat_id) {
                Some(turn) if turn.id == turn_id && turn.phase != phase => turn.phase = phase,
                _ => return,
            }
        }
        tracing::debug!(chat_id = %chat_id, turn = turn_id, phase = ?phase, "Turn phase");
        if let Some(cb) = self.observer() {
            cb.on_phase_changed(chat_id, phase);
        }
    }

    /// Patch the turn's placeholder only while the turn is live. Late data
    /// for a cancelled or replaced turn is dropped.
    fn apply_if_current(
        &self,
        chat_id: &str,
        turn_id: u64,
        message_id: &str,
        patch: MessagePatch,
    ) -> bool {
        let turns = lock(&self.turns);
        let live = turns
            .get(chat_id)
            .map(|t| t.id == turn_id && !t.cancel.is_cancelled())
            .unwrap_or(false);
        if !live {
            return false;
        }
        let applied = write(&self.chats).patch_in_memory(chat_id, message_id, patch);
        drop(turns);
        match applied {
            Ok(()) => {
                self.notify_messages(chat_id);
                true
            }
            Err(e) => {
                tracing::warn!(chat_id = %chat_id, error = %e, "Dropping update for vanished message");
                false
            }
        }
    }

    /// Run one turn to its terminal state.
    ///
    /// Empty input and a busy chat are ignored. An unknown chat or reply
    /// target is an error and leaves the chat untouched. Everything after
    /// the user message is appended ends in `Complete`, `Cancelled` or
    /// `Failed`; request failures are reported on the assistant message,
    /// not as `Err`.
    pub async fn send(&self, request: SendRequest) -> Result<TurnOutcome> {
        let text = request.text.trim().to_string();
        if text.is_empty() && request.image.is_none() {
            return Ok(TurnOutcome::Ignored(IgnoreReason::EmptyInput));
        }
        let chat_id = request.chat_id.unwrap_or_else(|| self.active_chat_id());

        // COMPOSING: reserve the chat before touching it
        let turn_id = self.next_turn.fetch_add(1, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        {
            let mut turns = lock(&self.turns);
            if turns.contains_key(&chat_id) {
                tracing::debug!(chat_id = %chat_id, "Turn already in flight, ignoring send");
                return Ok(TurnOutcome::Ignored(IgnoreReason::Busy));
            }
            turns.insert(
                chat_id.clone(),
                ActiveTurn {
                    id: turn_id,
                    cancel: cancel.clone(),
                    message_id: None,
                    phase: TurnPhase::Dispatched,
                },
            );
        }
        let slot = TurnSlot {
            turns: &self.turns,
            chat_id: chat_id.clone(),
            turn_id,
        };

        let strings = self.strings();
        let blocks = read(&self.documents).resolve_context(&chat_id);
        let (user_message, history, reply) = {
            let chats = read(&self.chats);
            let chat = chats
                .chat(&chat_id)
                .ok_or_else(|| BuddyError::ChatNotFound(chat_id.clone()))?;
            let reply = match &request.reply_to {
                Some(target) => Some(ReplyRef::to_message(
                    chat.message(target)
                        .ok_or_else(|| BuddyError::ReplyTargetNotFound(target.clone()))?,
                )),
                None => None,
            };
            let mut message = Message::user(text.clone());
            message.context_files = blocks.iter().map(|b| b.name.clone()).collect();
            message.image = request.image.clone();
            message.reply_to = reply.clone();
            let history = history_contents(&chat.messages, self.context.history_window);
            (message, history, reply)
        };

        let placeholder = Message::assistant(String::new());
        let message_id = placeholder.id.clone();
        {
            let mut chats = write(&self.chats);
            chats.append_message(&chat_id, user_message)?;
            chats.auto_title(&chat_id, &text, self.context.title_max_chars)?;
            chats.append_message(&chat_id, placeholder)?;
        }
        if let Some(turn) = lock(&self.turns).get_mut(&chat_id) {
            turn.message_id = Some(message_id.clone());
        }
        self.notify_messages(&chat_id);
        if let Some(cb) = self.observer() {
            cb.on_phase_changed(&chat_id, TurnPhase::Dispatched);
        }
        self.notify_status(&chat_id, Some(strings.loading));

        // DISPATCHED
        let mut contents = history;
        contents.push(prompt_content(
            &render_context(&blocks, self.context.max_chars_per_document),
            reply.as_ref(),
            request.image.as_ref(),
            &text,
        ));
        let tools = match self.search_mode() {
            SearchMode::Tools => ToolSet::Functions(function_declarations()),
            SearchMode::Web => ToolSet::WebSearch,
        };
        let generation = GenerationRequest {
            system_instruction: strings.system_prompt.to_string(),
            contents,
            tools,
        };
        tracing::debug!(
            chat_id = %chat_id,
            turn = turn_id,
            documents = blocks.len(),
            contents = generation.contents.len(),
            "Dispatching turn"
        );

        let turn = Turn {
            chat_id: &chat_id,
            turn_id,
            message_id: &message_id,
            cancel: &cancel,
            strings,
        };
        let outcome = self.drive(&turn, generation).await;

        match &outcome {
            TurnOutcome::Failed(reason) => {
                tracing::error!(chat_id = %chat_id, turn = turn_id, error = %reason, "Turn failed");
                // The turn is over, so write directly rather than through the live guard
                if let Err(e) = write(&self.chats).patch_in_memory(
                    &chat_id,
                    &message_id,
                    MessagePatch::error(strings.error_message),
                ) {
                    tracing::warn!(chat_id = %chat_id, error = %e, "Failed to mark turn as failed");
                }
            }
            TurnOutcome::Cancelled => {
                tracing::debug!(chat_id = %chat_id, turn = turn_id, "Turn cancelled");
            }
            _ => {
                tracing::debug!(chat_id = %chat_id, turn = turn_id, "Turn complete");
            }
        }

        read(&self.chats).save();
        drop(slot);
        self.notify_messages(&chat_id);
        self.notify_status(&chat_id, None);
        if let Some(cb) = self.observer() {
            cb.on_phase_changed(&chat_id, TurnPhase::Idle);
        }
        Ok(outcome)
    }

    /// Consume the backend stream, then run tool calls in order
    async fn drive(&self, turn: &Turn<'_>, request: GenerationRequest) -> TurnOutcome {
        let stream = tokio::select! {
            _ = turn.cancel.cancelled() => return TurnOutcome::Cancelled,
            result = self.backend.generate(request) => result,
        };
        let mut stream = match stream {
            Ok(s) => s,
            Err(e) => return TurnOutcome::Failed(e.to_string()),
        };

        let mut calls: Vec<(String, serde_json::Value)> = Vec::new();
        let mut sources: Vec<GroundingSource> = Vec::new();
        loop {
            tokio::select! {
                _ = turn.cancel.cancelled() => {
                    return TurnOutcome::Cancelled;
                }
                event = stream.next() => {
                    match event {
                        Some(BackendEvent::Text(delta)) => {
                            self.set_phase(turn.chat_id, turn.turn_id, TurnPhase::Streaming);
                            if !turn.apply(self, MessagePatch::append(delta)) {
                                return TurnOutcome::Cancelled;
                            }
                        }
                        Some(BackendEvent::FunctionCall { name, args }) => {
                            tracing::debug!(chat_id = %turn.chat_id, tool = %name, "Tool call received");
                            calls.push((name, args));
                        }
                        Some(BackendEvent::Grounding(found)) => {
                            for source in found {
                                if !sources.iter().any(|s| s.uri == source.uri) {
                                    sources.push(source);
                                }
                            }
                        }
                        Some(BackendEvent::Error(message)) => {
                            return TurnOutcome::Failed(message);
                        }
                        Some(BackendEvent::Done) | None => break,
                    }
                }
            }
        }

        if !calls.is_empty() {
            self.set_phase(turn.chat_id, turn.turn_id, TurnPhase::ToolCallPending);
        }
        for (name, args) in calls {
            if turn.cancel.is_cancelled() {
                return TurnOutcome::Cancelled;
            }
            self.set_phase(turn.chat_id, turn.turn_id, TurnPhase::ToolCallRunning);
            match ToolCall::parse(&name, &args) {
                Ok(call) => {
                    if let Err(e) = self.run_tool(turn, call).await {
                        tracing::warn!(chat_id = %turn.chat_id, tool = %name, error = %e, "Tool call failed");
                    }
                }
                Err(e) => {
                    tracing::warn!(chat_id = %turn.chat_id, tool = %name, error = %e, "Skipping malformed tool call");
                }
            }
        }
        if turn.cancel.is_cancelled() {
            return TurnOutcome::Cancelled;
        }

        let mut finish = MessagePatch::default();
        if !sources.is_empty() {
            finish.sources = Some(sources);
        }
        let empty = self
            .message(turn.chat_id, turn.message_id)
            .map(|m| m.content.trim().is_empty())
            .unwrap_or(true);
        if empty {
            finish.content = Some(turn.strings.empty_response.to_string());
        }
        if finish != MessagePatch::default() && !turn.apply(self, finish) {
            return TurnOutcome::Cancelled;
        }
        TurnOutcome::Complete
    }

    /// Execute one validated tool call and attach its result
    async fn run_tool(&self, turn: &Turn<'_>, call: ToolCall) -> Result<()> {
        match call {
            ToolCall::CorporateFile(descriptor) => {
                self.notify_status(turn.chat_id, Some(turn.strings.exporting));
                let generator = self.generator.clone();
                let blob = tokio::task::spawn_blocking(move || generator.generate(&descriptor))
                    .await
                    .map_err(|e| BuddyError::ToolExecution(e.to_string()))??;
                self.attach(turn, blob);
            }
            ToolCall::Chart(chart) => {
                turn.apply(self, MessagePatch::chart(chart));
            }
            ToolCall::Infographic {
                prompt,
                aspect_ratio,
            } => {
                self.notify_status(turn.chat_id, Some(turn.strings.generating_image));
                let image = tokio::select! {
                    _ = turn.cancel.cancelled() => return Ok(()),
                    image = self.backend.generate_image(&prompt, &aspect_ratio) => image?,
                };
                let bytes = base64::engine::general_purpose::STANDARD
                    .decode(image.data.as_bytes())
                    .map_err(|e| BuddyError::ToolExecution(format!("invalid image data: {}", e)))?;
                self.attach(
                    turn,
                    GeneratedBlob {
                        file_name: format!(
                            "infographic_{}.png",
                            chrono::Utc::now().timestamp_millis()
                        ),
                        format: FileFormat::Image,
                        bytes,
                    },
                );
            }
            ToolCall::Unknown(name) => {
                tracing::warn!(chat_id = %turn.chat_id, tool = %name, "Ignoring undeclared tool");
            }
        }
        Ok(())
    }

    /// Register a blob and attach it, or drop it if the turn was cancelled meanwhile
    fn attach(&self, turn: &Turn<'_>, blob: GeneratedBlob) {
        let file = self.blobs.insert(blob);
        tracing::debug!(chat_id = %turn.chat_id, file = %file.name, "Generated artifact");
        let handle = file.handle;
        if !turn.apply(self, MessagePatch::file(file)) {
            self.blobs.release(&[handle]);
        }
    }
}

/// Identity of the running turn, threaded through the drive loop
struct Turn<'a> {
    chat_id: &'a str,
    turn_id: u64,
    message_id: &'a str,
    cancel: &'a CancellationToken,
    strings: &'static Strings,
}

impl Turn<'_> {
    fn apply(&self, buddy: &Buddy, patch: MessagePatch) -> bool {
        buddy.apply_if_current(self.chat_id, self.turn_id, self.message_id, patch)
    }
}

/// The last `window` usable messages in chat order, as request contents.
/// Error messages and empty placeholders are skipped, and the replay never
/// opens with a model entry.
fn history_contents(messages: &[Message], window: usize) -> Vec<Content> {
    let usable: Vec<&Message> = messages
        .iter()
        .filter(|m| !m.is_error && !m.content.trim().is_empty())
        .collect();
    let start = usable.len().saturating_sub(window);
    usable[start..]
        .iter()
        .skip_while(|m| m.role == Role::Assistant)
        .map(|m| match m.role {
            Role::User => Content::user_text(m.content.clone()),
            Role::Assistant => Content::model_text(m.content.clone()),
        })
        .collect()
}

/// The new user turn: document context, reply snippet, image, then the text
fn prompt_content(
    context: &str,
    reply: Option<&ReplyRef>,
    image: Option<&InlineImage>,
    text: &str,
) -> Content {
    let mut prompt = String::new();
    if !context.is_empty() {
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }
    if let Some(reply) = reply {
        let role = match reply.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        prompt.push_str(&format!("[Em resposta a ({}): \"{}\"]\n\n", role, reply.snippet));
    }
    prompt.push_str(&format!("{}: {}", USER_PREFIX, text));

    let mut parts = Vec::new();
    if let Some(image) = image {
        parts.push(Part::InlineData {
            mime_type: image.mime_type.clone(),
            data: image.data.clone(),
        });
    }
    parts.push(Part::Text(prompt));
    Content {
        role: ContentRole::User,
        parts,
    }
}
